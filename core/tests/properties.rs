//! Property tests for the aggregation, window, membership and ranking
//! invariants.
//!
//! Passenger counts are whole numbers so that sums are exact whatever the
//! input order.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use ridership_core::{
    group_registry::{GroupRegistry, MembershipAction},
    impact::{ImpactCalculator, Scope},
    ranking::{top_n, Direction},
    ridership::{aggregate_by_line, RidershipRecord},
};

const LINES: &[&str] = &["L1", "L2", "L3", "L4", "L5", "L6"];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn record_strategy() -> impl Strategy<Value = RidershipRecord> {
    (0..LINES.len(), 0u64..60, 0u32..5_000, 0u32..5_000).prop_map(|(line, offset, predicted, realized)| {
        RidershipRecord {
            line_code:            LINES[line].to_string(),
            line_name:            None,
            company:              None,
            date:                 epoch() + Days::new(offset),
            predicted_passengers: f64::from(predicted),
            realized_passengers:  f64::from(realized),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn line_totals_ignore_input_order(
        records in prop::collection::vec(record_strategy(), 1..120),
        rotate in 0usize..120,
    ) {
        let mut shuffled = records.clone();
        shuffled.reverse();
        let k = rotate % shuffled.len();
        shuffled.rotate_left(k);

        let a = aggregate_by_line(&records);
        let b = aggregate_by_line(&shuffled);
        prop_assert_eq!(&a, &b);

        for (code, agg) in &a {
            let own = records.iter().filter(|r| &r.line_code == code);
            let predicted: f64 = own.clone().map(|r| r.predicted_passengers).sum();
            let realized: f64 = own.map(|r| r.realized_passengers).sum();
            prop_assert_eq!(agg.predicted, predicted);
            prop_assert_eq!(agg.realized, realized);
        }
    }

    #[test]
    fn windows_are_contiguous_and_full_length(
        records in prop::collection::vec(record_strategy(), 0..60),
        base_offset in 0u64..3_650,
        window in 1i64..60,
        line in 0..LINES.len(),
    ) {
        let calc = ImpactCalculator::new(&records);
        let base = epoch() + Days::new(base_offset);
        for scope in [Scope::System, Scope::Line(LINES[line].to_string())] {
            let w = calc.compute_window(&scope, base, window).unwrap();
            prop_assert_eq!(w.before.len() as i64, window);
            prop_assert_eq!(w.after.len() as i64, window);
            prop_assert_eq!(w.before.last().map(|d| d.date), base.pred_opt());
            prop_assert_eq!(w.after.first().map(|d| d.date), Some(base));
            let dates: Vec<NaiveDate> = w.before.iter().chain(&w.after).map(|d| d.date).collect();
            for pair in dates.windows(2) {
                prop_assert_eq!(pair[0].succ_opt(), Some(pair[1]));
            }
            prop_assert!(w.percent_delta().is_finite());
            if w.avg_before == 0.0 {
                prop_assert_eq!(w.percent_delta(), 0.0);
            }
        }
    }

    #[test]
    fn no_line_is_ever_in_two_groups(
        ops in prop::collection::vec((0usize..4, 0..LINES.len(), any::<bool>()), 0..80),
    ) {
        let mut reg = GroupRegistry::new();
        let ids: Vec<i64> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| reg.create_group(name).unwrap().id)
            .collect();

        for (group, line, add) in ops {
            let action = if add { MembershipAction::Add } else { MembershipAction::Remove };
            let before = reg.owner_of(LINES[line]).map(|g| g.id);
            match reg.set_membership(ids[group], LINES[line], action) {
                Ok(_) => {}
                Err(_) => {
                    // Only a conflicting add may fail, and it changes nothing.
                    prop_assert!(add);
                    prop_assert_eq!(reg.owner_of(LINES[line]).map(|g| g.id), before);
                }
            }
            prop_assert!(reg.duplicated_lines().is_empty());
        }

        for line in LINES {
            let holders = reg.groups().filter(|g| g.lines.contains(*line)).count();
            prop_assert!(holders <= 1);
            prop_assert_eq!(holders == 1, reg.owner_of(line).is_some());
        }
    }

    #[test]
    fn rankings_respect_sign(
        records in prop::collection::vec(record_strategy(), 0..80),
        n in 0usize..8,
    ) {
        let lines = aggregate_by_line(&records);
        let groups = GroupRegistry::new();
        let gains = top_n(lines.values(), n, Direction::Gain, &groups);
        let losses = top_n(lines.values(), n, Direction::Loss, &groups);
        prop_assert!(gains.len() <= n && losses.len() <= n);
        prop_assert!(gains.iter().all(|r| r.diff > 0.0));
        prop_assert!(losses.iter().all(|r| r.diff < 0.0));
        prop_assert!(gains.windows(2).all(|p| p[0].diff >= p[1].diff));
        prop_assert!(losses.windows(2).all(|p| p[0].diff <= p[1].diff));
    }
}
