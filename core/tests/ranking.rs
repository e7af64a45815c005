//! Ranking tests.
//!
//! Tests cover: strict sign filtering, ordering by magnitude, truncation,
//! stable ties and group labels.

use chrono::NaiveDate;
use ridership_core::{
    group_registry::{GroupRegistry, MembershipAction},
    ranking::{top_n, Direction},
    ridership::{aggregate_by_line, RidershipRecord},
    types::UNGROUPED_LABEL,
};

fn rec(line: &str, predicted: f64, realized: f64) -> RidershipRecord {
    RidershipRecord {
        line_code:            line.to_string(),
        line_name:            None,
        company:              None,
        date:                 NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        predicted_passengers: predicted,
        realized_passengers:  realized,
    }
}

fn records() -> Vec<RidershipRecord> {
    vec![
        rec("A", 100.0, 150.0), // +50
        rec("B", 100.0, 100.0), //   0
        rec("C", 100.0, 40.0),  // -60
        rec("D", 100.0, 110.0), // +10
        rec("E", 100.0, 150.0), // +50, ties with A
        rec("F", 100.0, 95.0),  //  -5
        rec("G", 100.0, 300.0), // +200
    ]
}

#[test]
fn gains_are_strictly_positive_and_descending() {
    let lines = aggregate_by_line(&records());
    let gains = top_n(lines.values(), 5, Direction::Gain, &GroupRegistry::new());
    let codes: Vec<&str> = gains.iter().map(|r| r.line_code.as_str()).collect();
    assert_eq!(codes, vec!["G", "A", "E", "D"], "ties keep line code order");
    assert!(gains.iter().all(|r| r.diff > 0.0));
}

#[test]
fn losses_are_strictly_negative_and_ascending() {
    let lines = aggregate_by_line(&records());
    let losses = top_n(lines.values(), 5, Direction::Loss, &GroupRegistry::new());
    let codes: Vec<&str> = losses.iter().map(|r| r.line_code.as_str()).collect();
    assert_eq!(codes, vec!["C", "F"]);
    assert!(losses.iter().all(|r| r.diff < 0.0));
    assert!(!codes.contains(&"B"), "zero-diff lines appear in neither ranking");
}

#[test]
fn ranking_truncates_to_n() {
    let lines = aggregate_by_line(&records());
    let gains = top_n(lines.values(), 2, Direction::Gain, &GroupRegistry::new());
    assert_eq!(gains.len(), 2);
    assert_eq!(gains[0].line_code, "G");
    assert!(top_n(lines.values(), 0, Direction::Gain, &GroupRegistry::new()).is_empty());
}

#[test]
fn entries_carry_group_name_or_ungrouped() {
    let mut groups = GroupRegistry::new();
    let g = groups.create_group("Expresso").unwrap();
    groups.set_membership(g.id, "G", MembershipAction::Add).unwrap();

    let lines = aggregate_by_line(&records());
    let gains = top_n(lines.values(), 5, Direction::Gain, &groups);
    assert_eq!(gains[0].group_name.as_deref(), Some("Expresso"));
    assert_eq!(gains[1].group_name, None);
    assert_eq!(gains[1].group_label(), UNGROUPED_LABEL);
    assert_eq!(gains[0].percent, 300.0);
}
