//! Top/bottom-N lines by absolute deviation from the prediction.

use crate::{
    group_registry::GroupRegistry,
    ridership::LineAggregate,
    types::{LineCode, UNGROUPED_LABEL},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Lines that carried more passengers than predicted.
    Gain,
    /// Lines that carried fewer passengers than predicted.
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLine {
    pub line_code:  LineCode,
    pub group_name: Option<String>,
    pub predicted:  f64,
    pub realized:   f64,
    pub diff:       f64,
    pub percent:    f64,
}

impl RankedLine {
    pub fn group_label(&self) -> &str {
        self.group_name.as_deref().unwrap_or(UNGROUPED_LABEL)
    }
}

/// Keep lines whose diff is strictly on the requested side of zero, order
/// them by magnitude (stable, so ties keep input order) and keep `n`.
pub fn top_n<'a, I>(
    aggregates: I,
    n:          usize,
    direction:  Direction,
    groups:     &GroupRegistry,
) -> Vec<RankedLine>
where
    I: IntoIterator<Item = &'a LineAggregate>,
{
    let mut ranked: Vec<RankedLine> = aggregates
        .into_iter()
        .filter(|agg| match direction {
            Direction::Gain => agg.diff() > 0.0,
            Direction::Loss => agg.diff() < 0.0,
        })
        .map(|agg| RankedLine {
            line_code:  agg.line_code.clone(),
            group_name: groups.owner_of(&agg.line_code).map(|g| g.name.clone()),
            predicted:  agg.predicted,
            realized:   agg.realized,
            diff:       agg.diff(),
            percent:    agg.performance(),
        })
        .collect();

    match direction {
        Direction::Gain => ranked.sort_by(|a, b| b.diff.total_cmp(&a.diff)),
        Direction::Loss => ranked.sort_by(|a, b| a.diff.total_cmp(&b.diff)),
    }
    ranked.truncate(n);
    ranked
}
