//! Raw daily ridership records and the aggregation primitives over them.
//!
//! RULE: Nothing else in the crate aggregates raw records directly.
//! Every function here is a pure function of its input slice; duplicates
//! for the same (line, date) are summed, never overwritten.

use crate::{
    group_registry::Group,
    types::{DateRange, LineCode, UNSPECIFIED_COMPANY},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Separator used by composite company strings ("VIA SUL / VIA NORTE").
pub const COMPANY_SEPARATOR: &str = " / ";

/// One ingested fact: passengers predicted and realized for a line on a day.
/// Absent numeric fields default to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidershipRecord {
    pub line_code: LineCode,
    #[serde(default)]
    pub line_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub predicted_passengers: f64,
    #[serde(default)]
    pub realized_passengers: f64,
}

/// Realized over predicted, as a percentage. 0 when nothing was predicted.
pub fn performance_percent(predicted: f64, realized: f64) -> f64 {
    if predicted == 0.0 {
        0.0
    } else {
        realized / predicted * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAggregate {
    pub line_code: LineCode,
    /// Most recent non-empty name seen for the line.
    pub line_name: Option<String>,
    pub predicted: f64,
    pub realized:  f64,
    pub companies: BTreeSet<String>,
}

impl LineAggregate {
    pub fn empty(line_code: &str) -> Self {
        Self {
            line_code: line_code.to_string(),
            line_name: None,
            predicted: 0.0,
            realized:  0.0,
            companies: BTreeSet::new(),
        }
    }

    pub fn diff(&self) -> f64 {
        self.realized - self.predicted
    }

    pub fn performance(&self) -> f64 {
        performance_percent(self.predicted, self.realized)
    }

    /// Companies joined back into the composite display form.
    pub fn company_label(&self) -> String {
        self.companies
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(COMPANY_SEPARATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAggregate {
    pub company:    String,
    pub predicted:  f64,
    pub realized:   f64,
    pub line_codes: BTreeSet<LineCode>,
}

impl CompanyAggregate {
    pub fn diff(&self) -> f64 {
        self.realized - self.predicted
    }

    pub fn performance(&self) -> f64 {
        performance_percent(self.predicted, self.realized)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub predicted: f64,
    pub realized:  f64,
}

/// System-wide totals for the macro dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroSummary {
    pub total_predicted: f64,
    pub total_realized:  f64,
    pub diff:            f64,
    pub performance:     f64,
    pub daily:           BTreeMap<NaiveDate, DailyTotals>,
}

// ── Aggregation primitives ────────────────────────────────────────────────

/// Sum predicted/realized per line and union the companies that operate it.
/// Composite company strings are split on `" / "`.
pub fn aggregate_by_line(records: &[RidershipRecord]) -> BTreeMap<LineCode, LineAggregate> {
    let mut lines: BTreeMap<LineCode, LineAggregate> = BTreeMap::new();
    for r in records {
        let entry = lines
            .entry(r.line_code.clone())
            .or_insert_with(|| LineAggregate::empty(&r.line_code));
        entry.predicted += r.predicted_passengers;
        entry.realized += r.realized_passengers;
        if let Some(name) = r.line_name.as_deref().filter(|n| !n.trim().is_empty()) {
            entry.line_name = Some(name.trim().to_string());
        }
        if let Some(company) = r.company.as_deref() {
            for part in company.split(COMPANY_SEPARATOR) {
                let part = part.trim();
                if !part.is_empty() {
                    entry.companies.insert(part.to_string());
                }
            }
        }
    }
    lines
}

/// Sum predicted/realized per company. Records without a company are
/// bucketed under [`UNSPECIFIED_COMPANY`].
pub fn aggregate_by_company(records: &[RidershipRecord]) -> BTreeMap<String, CompanyAggregate> {
    let mut companies: BTreeMap<String, CompanyAggregate> = BTreeMap::new();
    for r in records {
        let name = company_key(r);
        let entry = companies
            .entry(name.to_string())
            .or_insert_with(|| CompanyAggregate {
                company:    name.to_string(),
                predicted:  0.0,
                realized:   0.0,
                line_codes: BTreeSet::new(),
            });
        entry.predicted += r.predicted_passengers;
        entry.realized += r.realized_passengers;
        entry.line_codes.insert(r.line_code.clone());
    }
    companies
}

pub fn aggregate_by_date(records: &[RidershipRecord]) -> BTreeMap<NaiveDate, DailyTotals> {
    let mut days: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();
    for r in records {
        let day = days.entry(r.date).or_default();
        day.predicted += r.predicted_passengers;
        day.realized += r.realized_passengers;
    }
    days
}

pub fn filter_by_group(records: &[RidershipRecord], group: &Group) -> Vec<RidershipRecord> {
    records
        .iter()
        .filter(|r| group.lines.contains(&r.line_code))
        .cloned()
        .collect()
}

/// Records of one line with `start <= date <= end`.
pub fn filter_by_line_and_date_range(
    records:   &[RidershipRecord],
    line_code: &str,
    range:     &DateRange,
) -> Vec<RidershipRecord> {
    records
        .iter()
        .filter(|r| r.line_code == line_code && range.contains(r.date))
        .cloned()
        .collect()
}

pub fn filter_by_date_range(records: &[RidershipRecord], range: &DateRange) -> Vec<RidershipRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect()
}

pub fn macro_summary(records: &[RidershipRecord]) -> MacroSummary {
    let daily = aggregate_by_date(records);
    let total_predicted: f64 = records.iter().map(|r| r.predicted_passengers).sum();
    let total_realized: f64 = records.iter().map(|r| r.realized_passengers).sum();
    MacroSummary {
        total_predicted,
        total_realized,
        diff: total_realized - total_predicted,
        performance: performance_percent(total_predicted, total_realized),
        daily,
    }
}

/// Company cards, largest realized volume first.
pub fn companies_by_realized(records: &[RidershipRecord]) -> Vec<CompanyAggregate> {
    let mut companies: Vec<CompanyAggregate> =
        aggregate_by_company(records).into_values().collect();
    companies.sort_by(|a, b| b.realized.total_cmp(&a.realized));
    companies
}

/// Per-line drill-down of one company, largest realized volume first.
pub fn company_detail(records: &[RidershipRecord], company: &str) -> Vec<LineAggregate> {
    let own: Vec<RidershipRecord> = records
        .iter()
        .filter(|r| company_key(r) == company)
        .cloned()
        .collect();
    let mut lines: Vec<LineAggregate> = aggregate_by_line(&own).into_values().collect();
    lines.sort_by(|a, b| b.realized.total_cmp(&a.realized));
    lines
}

fn company_key(record: &RidershipRecord) -> &str {
    record
        .company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNSPECIFIED_COMPANY)
}

// ── Store ──────────────────────────────────────────────────────────────────

/// The raw records of the active date range. Immutable between refreshes.
#[derive(Debug, Clone, Default)]
pub struct RidershipStore {
    records: Vec<RidershipRecord>,
}

impl RidershipStore {
    pub fn new(records: Vec<RidershipRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RidershipRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn by_line(&self) -> BTreeMap<LineCode, LineAggregate> {
        aggregate_by_line(&self.records)
    }

    pub fn by_company(&self) -> BTreeMap<String, CompanyAggregate> {
        aggregate_by_company(&self.records)
    }

    pub fn by_date(&self) -> BTreeMap<NaiveDate, DailyTotals> {
        aggregate_by_date(&self.records)
    }

    pub fn in_group(&self, group: &Group) -> Vec<RidershipRecord> {
        filter_by_group(&self.records, group)
    }

    pub fn for_line(&self, line_code: &str, range: &DateRange) -> Vec<RidershipRecord> {
        filter_by_line_and_date_range(&self.records, line_code, range)
    }

    pub fn summary(&self) -> MacroSummary {
        macro_summary(&self.records)
    }

    /// Every distinct line code present in the records, ascending.
    pub fn line_codes(&self) -> BTreeSet<LineCode> {
        self.records.iter().map(|r| r.line_code.clone()).collect()
    }
}
