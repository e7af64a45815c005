//! Daily series of a single line with the short-term trend heuristic.

use crate::{
    ridership::{aggregate_by_date, filter_by_line_and_date_range, DailyTotals, RidershipRecord},
    types::{DateRange, LineCode},
};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineDay {
    pub date:      NaiveDate,
    pub predicted: f64,
    pub realized:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDetail {
    pub line_code:      LineCode,
    /// Ascending by date.
    pub days:           Vec<LineDay>,
    pub total_realized: f64,
    pub avg_daily:      f64,
    /// `None` while there are too few days to compare.
    pub trend:          Option<Trend>,
}

/// Compare the realized sum of the last `span` days with the `span` days
/// before them. The change must exceed `threshold_ratio` of the series
/// total to count as a movement.
pub fn trend(realized: &[f64], span: usize, threshold_ratio: f64) -> Option<Trend> {
    if span == 0 || realized.len() < span * 2 {
        return None;
    }
    let total: f64 = realized.iter().sum();
    let n = realized.len();
    let recent: f64 = realized[n - span..].iter().sum();
    let older: f64 = realized[n - 2 * span..n - span].iter().sum();
    let diff = recent - older;
    let threshold = total * threshold_ratio;
    Some(if diff > threshold {
        Trend::Rising
    } else if diff < -threshold {
        Trend::Falling
    } else {
        Trend::Stable
    })
}

pub fn line_detail(
    records:         &[RidershipRecord],
    line_code:       &str,
    range:           &DateRange,
    weekday:         Option<Weekday>,
    trend_span:      usize,
    threshold_ratio: f64,
) -> LineDetail {
    let own = filter_by_line_and_date_range(records, line_code, range);
    let days: Vec<LineDay> = aggregate_by_date(&own)
        .into_iter()
        .filter(|(date, _)| weekday.map_or(true, |w| date.weekday() == w))
        .map(|(date, DailyTotals { predicted, realized })| LineDay { date, predicted, realized })
        .collect();

    let realized: Vec<f64> = days.iter().map(|d| d.realized).collect();
    let total_realized: f64 = realized.iter().sum();
    let avg_daily = if days.is_empty() {
        0.0
    } else {
        total_realized / days.len() as f64
    };

    LineDetail {
        line_code: line_code.to_string(),
        trend: trend(&realized, trend_span, threshold_ratio),
        days,
        total_realized,
        avg_daily,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_needs_two_spans() {
        assert_eq!(trend(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, 0.05), None);
    }

    #[test]
    fn trend_detects_rise_and_fall() {
        let rising = [10.0, 10.0, 10.0, 20.0, 20.0, 20.0];
        assert_eq!(trend(&rising, 3, 0.05), Some(Trend::Rising));

        let falling = [20.0, 20.0, 20.0, 10.0, 10.0, 10.0];
        assert_eq!(trend(&falling, 3, 0.05), Some(Trend::Falling));
    }

    #[test]
    fn small_moves_are_stable() {
        // total 603, threshold 30.15, diff 3
        let flat = [100.0, 100.0, 100.0, 101.0, 101.0, 101.0];
        assert_eq!(trend(&flat, 3, 0.05), Some(Trend::Stable));
    }
}
