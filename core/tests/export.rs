//! Group export tests.
//!
//! Tests cover: one row per member line sorted by code, zeroed rows for
//! dataless members, range scoping, and the per-day layout.

use chrono::NaiveDate;
use ridership_core::{
    export::{export_group, export_group_daily},
    group_registry::{Group, DEFAULT_GROUP_COLOR},
    ridership::RidershipRecord,
    types::DateRange,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn rec(line: &str, company: &str, d: u32, predicted: f64, realized: f64) -> RidershipRecord {
    RidershipRecord {
        line_code:            line.to_string(),
        line_name:            None,
        company:              Some(company.to_string()),
        date:                 day(d),
        predicted_passengers: predicted,
        realized_passengers:  realized,
    }
}

fn group(lines: &[&str]) -> Group {
    Group {
        id:    1,
        name:  "Bloco 1".into(),
        color: DEFAULT_GROUP_COLOR.into(),
        lines: lines.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn dataless_member_gets_a_zeroed_row() {
    let records = vec![rec("L1", "ALFA", 1, 100.0, 80.0), rec("L1", "ALFA", 2, 100.0, 130.0)];
    let range = DateRange::new(day(1), day(31)).unwrap();
    let rows = export_group(&records, &group(&["L2", "L1"]), &range);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].line_code, "L1");
    assert_eq!(rows[0].predicted, 200.0);
    assert_eq!(rows[0].realized, 210.0);
    assert_eq!(rows[0].diff, 10.0);
    assert_eq!(rows[0].percent, 105.0);
    assert_eq!(rows[0].company, "ALFA");

    assert_eq!(rows[1].line_code, "L2");
    assert_eq!(rows[1].predicted, 0.0);
    assert_eq!(rows[1].realized, 0.0);
    assert_eq!(rows[1].percent, 0.0);
    assert_eq!(rows[1].company, "");
}

#[test]
fn export_ignores_non_members_and_out_of_range_days() {
    let records = vec![
        rec("L1", "ALFA", 1, 10.0, 10.0),
        rec("L1", "ALFA", 9, 99.0, 99.0),
        rec("L3", "BETA", 1, 50.0, 50.0),
    ];
    let range = DateRange::new(day(1), day(5)).unwrap();
    let rows = export_group(&records, &group(&["L1"]), &range);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].realized, 10.0);
}

#[test]
fn daily_export_has_one_sheet_per_day_with_data() {
    let records = vec![
        rec("L2", "BETA", 2, 20.0, 25.0),
        rec("L1", "ALFA", 2, 10.0, 5.0),
        rec("L1", "ALFA", 1, 10.0, 12.0),
        rec("L1", "GAMA", 1, 1.0, 1.0),
    ];
    let range = DateRange::new(day(1), day(3)).unwrap();
    let sheets = export_group_daily(&records, &group(&["L1", "L2"]), &range);

    let dates: Vec<NaiveDate> = sheets.keys().copied().collect();
    assert_eq!(dates, vec![day(1), day(2)], "day 3 has no data and no sheet");

    let first = &sheets[&day(1)];
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].company, "ALFA / GAMA");
    assert_eq!(first[0].realized, 13.0);

    let second: Vec<&str> = sheets[&day(2)].iter().map(|r| r.line_code.as_str()).collect();
    assert_eq!(second, vec!["L1", "L2"]);
}
