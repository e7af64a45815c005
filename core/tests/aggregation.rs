//! Aggregation primitive tests.
//!
//! Tests cover: per-line sums with composite companies, the unspecified
//! company bucket, daily totals, filters, and zero-prediction performance.

use chrono::NaiveDate;
use ridership_core::{
    group_registry::Group,
    ridership::{
        aggregate_by_company, aggregate_by_date, aggregate_by_line, companies_by_realized,
        company_detail, filter_by_group, filter_by_line_and_date_range, macro_summary,
        performance_percent, RidershipRecord, RidershipStore,
    },
    types::{DateRange, UNSPECIFIED_COMPANY},
};
use std::collections::BTreeSet;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn rec(line: &str, company: Option<&str>, d: u32, predicted: f64, realized: f64) -> RidershipRecord {
    RidershipRecord {
        line_code:            line.to_string(),
        line_name:            None,
        company:              company.map(str::to_string),
        date:                 day(d),
        predicted_passengers: predicted,
        realized_passengers:  realized,
    }
}

fn sample() -> Vec<RidershipRecord> {
    vec![
        rec("L1", Some("ALFA / BETA"), 1, 100.0, 80.0),
        rec("L1", Some("GAMA"), 1, 50.0, 70.0),
        rec("L1", Some("ALFA"), 2, 100.0, 130.0),
        rec("L2", None, 1, 40.0, 10.0),
        rec("L3", Some("BETA"), 3, 0.0, 25.0),
    ]
}

#[test]
fn line_totals_sum_duplicates_and_union_companies() {
    let lines = aggregate_by_line(&sample());
    let l1 = &lines["L1"];
    assert_eq!(l1.predicted, 250.0);
    assert_eq!(l1.realized, 280.0);
    let expected: BTreeSet<String> = ["ALFA", "BETA", "GAMA"].iter().map(|s| s.to_string()).collect();
    assert_eq!(l1.companies, expected, "composite companies must be split and unioned");
    assert_eq!(l1.company_label(), "ALFA / BETA / GAMA");
    assert!(lines["L2"].companies.is_empty());
}

#[test]
fn records_without_company_go_to_unspecified() {
    let companies = aggregate_by_company(&sample());
    let unspecified = companies
        .get(UNSPECIFIED_COMPANY)
        .expect("unspecified bucket present");
    assert_eq!(unspecified.realized, 10.0);
    assert!(unspecified.line_codes.contains("L2"));
}

#[test]
fn company_cards_and_drill_down_are_ordered_by_realized() {
    let cards = companies_by_realized(&sample());
    let realized: Vec<f64> = cards.iter().map(|c| c.realized).collect();
    let mut sorted = realized.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(realized, sorted);

    let alfa = company_detail(&sample(), "ALFA");
    assert_eq!(alfa.len(), 1);
    assert_eq!(alfa[0].line_code, "L1");
    assert_eq!(alfa[0].realized, 130.0);
}

#[test]
fn daily_totals_cover_every_day_with_data() {
    let days = aggregate_by_date(&sample());
    assert_eq!(days.len(), 3);
    assert_eq!(days[&day(1)].predicted, 190.0);
    assert_eq!(days[&day(1)].realized, 160.0);
    assert_eq!(days[&day(3)].realized, 25.0);
}

#[test]
fn filters_are_inclusive_and_group_scoped() {
    let records = sample();
    let range = DateRange::new(day(1), day(2)).unwrap();
    let l1 = filter_by_line_and_date_range(&records, "L1", &range);
    assert_eq!(l1.len(), 3);

    let only_day_two = DateRange::new(day(2), day(2)).unwrap();
    assert_eq!(filter_by_line_and_date_range(&records, "L1", &only_day_two).len(), 1);

    let group = Group {
        id:    1,
        name:  "Norte".into(),
        color: "#000000".into(),
        lines: ["L2", "L3", "L9"].iter().map(|s| s.to_string()).collect(),
    };
    let scoped = filter_by_group(&records, &group);
    assert_eq!(scoped.len(), 2);
    assert!(scoped.iter().all(|r| r.line_code != "L1"));
}

#[test]
fn zero_prediction_yields_zero_performance() {
    assert_eq!(performance_percent(0.0, 25.0), 0.0);
    let lines = aggregate_by_line(&sample());
    let l3 = lines["L3"].performance();
    assert!(l3.is_finite());
    assert_eq!(l3, 0.0);
}

#[test]
fn macro_summary_matches_store_view() {
    let store = RidershipStore::new(sample());
    let summary = macro_summary(store.records());
    assert_eq!(summary, store.summary());
    assert_eq!(summary.total_predicted, 290.0);
    assert_eq!(summary.total_realized, 315.0);
    assert_eq!(summary.diff, 25.0);
    assert_eq!(store.line_codes().len(), 3);
}
