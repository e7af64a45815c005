//! Per-line rows handed to the spreadsheet collaborator for a group export.

use crate::{
    group_registry::Group,
    ridership::{aggregate_by_line, filter_by_date_range, filter_by_group, LineAggregate, RidershipRecord},
    types::{DateRange, LineCode},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub line_code: LineCode,
    pub company:   String,
    pub predicted: f64,
    pub realized:  f64,
    pub diff:      f64,
    pub percent:   f64,
}

impl From<&LineAggregate> for ExportRow {
    fn from(agg: &LineAggregate) -> Self {
        Self {
            line_code: agg.line_code.clone(),
            company:   agg.company_label(),
            predicted: agg.predicted,
            realized:  agg.realized,
            diff:      agg.diff(),
            percent:   agg.performance(),
        }
    }
}

/// One row per member line over `range`, sorted by line code. Members
/// without records in the range get a zeroed row.
pub fn export_group(records: &[RidershipRecord], group: &Group, range: &DateRange) -> Vec<ExportRow> {
    let scoped = filter_by_date_range(&filter_by_group(records, group), range);
    let aggregates = aggregate_by_line(&scoped);
    group
        .lines
        .iter()
        .map(|code| match aggregates.get(code) {
            Some(agg) => ExportRow::from(agg),
            None => ExportRow::from(&LineAggregate::empty(code)),
        })
        .collect()
}

/// The same rows split per day: one row set for each date that has data,
/// ascending, each sorted by line code.
pub fn export_group_daily(
    records: &[RidershipRecord],
    group:   &Group,
    range:   &DateRange,
) -> BTreeMap<NaiveDate, Vec<ExportRow>> {
    let mut per_day: BTreeMap<NaiveDate, Vec<RidershipRecord>> = BTreeMap::new();
    for r in filter_by_date_range(&filter_by_group(records, group), range) {
        per_day.entry(r.date).or_default().push(r);
    }
    per_day
        .into_iter()
        .map(|(date, day)| {
            let rows = aggregate_by_line(&day).values().map(ExportRow::from).collect();
            (date, rows)
        })
        .collect()
}
