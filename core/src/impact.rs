//! Before/after impact windows anchored on an action date.
//!
//! WINDOW LAYOUT for base date B and length W:
//!   before = [B - W, B - 1]   (W days, strictly before B)
//!   after  = [B, B + W - 1]   (W days, starting on B)
//!
//! Every day of both halves is present; a day without records counts as 0
//! and still counts in the denominator of the averages. Sparse data
//! therefore pulls an average down instead of being skipped.

use crate::{
    action_ledger::{Action, ActionLedger},
    error::{RidershipError, RidershipResult},
    ridership::RidershipRecord,
    types::{parse_iso_date, ActionId, DateRange, LineCode},
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Window length used by the global impact ledger.
pub const LEDGER_WINDOW_DAYS: u32 = 7;

/// Longest accepted window, in days on each side of the base date.
pub const MAX_WINDOW_DAYS: u32 = 366;

/// System deltas smaller than this (in absolute value) yield a 0%
/// contribution.
pub const CONTRIBUTION_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "line_code", rename_all = "snake_case")]
pub enum Scope {
    Line(LineCode),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub date:  NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactWindow {
    pub scope:              Scope,
    pub base_date:          NaiveDate,
    pub window_length_days: u32,
    pub before:             Vec<DailyValue>,
    pub after:              Vec<DailyValue>,
    pub avg_before:         f64,
    pub avg_after:          f64,
}

impl ImpactWindow {
    pub fn diff(&self) -> f64 {
        self.avg_after - self.avg_before
    }

    pub fn percent_delta(&self) -> f64 {
        percent_delta(self.avg_before, self.avg_after)
    }
}

/// `(after - before) / before × 100`, or 0 when `before` is 0.
pub fn percent_delta(avg_before: f64, avg_after: f64) -> f64 {
    if avg_before == 0.0 {
        0.0
    } else {
        (avg_after - avg_before) / avg_before * 100.0
    }
}

/// A line's share of a concurrent system-wide change, in percent.
pub fn compute_contribution(line: &ImpactWindow, system: &ImpactWindow) -> f64 {
    let system_diff = system.diff();
    if system_diff.abs() < CONTRIBUTION_FLOOR {
        0.0
    } else {
        line.diff() / system_diff * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactStatus {
    #[serde(rename = "Melhorou")]
    Improved,
    #[serde(rename = "Piorou")]
    Worsened,
    #[serde(rename = "Estável")]
    Stable,
}

impl ImpactStatus {
    pub fn from_diff(diff: f64) -> Self {
        if diff > 0.0 {
            Self::Improved
        } else if diff < 0.0 {
            Self::Worsened
        } else {
            Self::Stable
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Improved => "Melhorou",
            Self::Worsened => "Piorou",
            Self::Stable   => "Estável",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub action_id:  ActionId,
    pub line_code:  LineCode,
    pub date:       NaiveDate,
    pub comment:    String,
    pub avg_before: f64,
    pub avg_after:  f64,
    pub diff:       f64,
    pub percent:    f64,
    pub status:     ImpactStatus,
}

/// Headline figures of an impact ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_actions: usize,
    pub improved:      usize,
    /// Sum of every entry's diff.
    pub total_diff:    f64,
    /// Mean of every entry's percent; 0 for an empty ledger.
    pub avg_percent:   f64,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[ImpactEntry]) -> Self {
        let total_actions = entries.len();
        let improved = entries
            .iter()
            .filter(|e| e.status == ImpactStatus::Improved)
            .count();
        let total_diff = entries.iter().map(|e| e.diff).sum();
        let avg_percent = if total_actions == 0 {
            0.0
        } else {
            entries.iter().map(|e| e.percent).sum::<f64>() / total_actions as f64
        };
        Self { total_actions, improved, total_diff, avg_percent }
    }
}

/// A line window next to the system window over the same dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeImpact {
    pub line:           ImpactWindow,
    pub system:         ImpactWindow,
    pub line_percent:   f64,
    pub system_percent: f64,
    pub contribution:   f64,
}

/// Reject window lengths below one day or above [`MAX_WINDOW_DAYS`].
pub fn validate_window(window_length_days: i64) -> RidershipResult<u32> {
    if window_length_days < 1 {
        return Err(RidershipError::validation(format!(
            "window length must be at least 1 day, got {window_length_days}"
        )));
    }
    match u32::try_from(window_length_days) {
        Ok(window) if window <= MAX_WINDOW_DAYS => Ok(window),
        _ => Err(RidershipError::validation(format!(
            "window length {window_length_days} exceeds {MAX_WINDOW_DAYS} days"
        ))),
    }
}

/// Validate raw query parameters. A missing window falls back to
/// `default_window`; a missing or malformed base date is rejected.
pub fn parse_impact_params(
    base_date:      Option<&str>,
    window:         Option<i64>,
    default_window: u32,
) -> RidershipResult<(NaiveDate, u32)> {
    let raw = base_date.ok_or_else(|| RidershipError::validation("base date is required"))?;
    let base_date = parse_iso_date(raw)?;
    let window = validate_window(window.unwrap_or(i64::from(default_window)))?;
    Ok((base_date, window))
}

/// The inclusive span `[B - W, B + W - 1]` a window reads from.
pub fn window_span(base_date: NaiveDate, window_length_days: u32) -> RidershipResult<DateRange> {
    let days = u64::from(window_length_days);
    let start = base_date
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| out_of_calendar(base_date, window_length_days))?;
    let end = base_date
        .checked_add_days(Days::new(days.saturating_sub(1)))
        .ok_or_else(|| out_of_calendar(base_date, window_length_days))?;
    DateRange::new(start, end)
}

fn out_of_calendar(base_date: NaiveDate, window: u32) -> RidershipError {
    RidershipError::validation(format!(
        "a {window}-day window around {base_date} leaves the supported calendar"
    ))
}

/// Daily realized totals indexed per line and for the whole system.
#[derive(Debug, Clone, Default)]
pub struct ImpactCalculator {
    system: BTreeMap<NaiveDate, f64>,
    lines:  HashMap<LineCode, BTreeMap<NaiveDate, f64>>,
}

impl ImpactCalculator {
    pub fn new(records: &[RidershipRecord]) -> Self {
        let mut calc = Self::default();
        for r in records {
            *calc.system.entry(r.date).or_insert(0.0) += r.realized_passengers;
            *calc
                .lines
                .entry(r.line_code.clone())
                .or_default()
                .entry(r.date)
                .or_insert(0.0) += r.realized_passengers;
        }
        calc
    }

    pub fn compute_window(
        &self,
        scope:              &Scope,
        base_date:          NaiveDate,
        window_length_days: i64,
    ) -> RidershipResult<ImpactWindow> {
        let window = validate_window(window_length_days)?;
        let span = window_span(base_date, window)?;

        let series = match scope {
            Scope::System => Some(&self.system),
            Scope::Line(code) => self.lines.get(code),
        };
        let value_on = |date: NaiveDate| -> f64 {
            series.and_then(|s| s.get(&date)).copied().unwrap_or(0.0)
        };

        let mut before = Vec::with_capacity(window as usize);
        let mut after = Vec::with_capacity(window as usize);
        for (i, date) in span.start.iter_days().take(2 * window as usize).enumerate() {
            let point = DailyValue { date, value: value_on(date) };
            if i < window as usize {
                before.push(point);
            } else {
                after.push(point);
            }
        }

        let avg_before = before.iter().map(|d| d.value).sum::<f64>() / f64::from(window);
        let avg_after = after.iter().map(|d| d.value).sum::<f64>() / f64::from(window);

        log::debug!(
            "impact window {scope:?} base={base_date} w={window}: before={avg_before:.1} after={avg_after:.1}"
        );

        Ok(ImpactWindow {
            scope: scope.clone(),
            base_date,
            window_length_days: window,
            before,
            after,
            avg_before,
            avg_after,
        })
    }

    /// Window anchored on an action's implementation date.
    pub fn window_for_action(&self, action: &Action, window_length_days: i64) -> RidershipResult<ImpactWindow> {
        let base_date = action.implementation_date.ok_or_else(|| {
            RidershipError::validation(format!(
                "action {} has no implementation date to anchor an impact window",
                action.id
            ))
        })?;
        self.compute_window(&Scope::Line(action.line_code.clone()), base_date, window_length_days)
    }

    /// Seven-day before/after comparison for every dated action whose
    /// implementation date falls in `range` (all dated actions when `None`),
    /// newest first.
    pub fn compute_global_impact_ledger(
        &self,
        actions: &ActionLedger,
        range:   Option<&DateRange>,
    ) -> Vec<ImpactEntry> {
        let mut entries = Vec::new();
        for action in actions.dated_actions(range) {
            let window = match self.window_for_action(action, i64::from(LEDGER_WINDOW_DAYS)) {
                Ok(w) => w,
                Err(e) => {
                    log::warn!("skipping action {} in impact ledger: {e}", action.id);
                    continue;
                }
            };
            let diff = window.diff();
            entries.push(ImpactEntry {
                action_id:  action.id,
                line_code:  action.line_code.clone(),
                date:       window.base_date,
                comment:    action.comment.clone(),
                avg_before: window.avg_before,
                avg_after:  window.avg_after,
                diff,
                percent:    window.percent_delta(),
                status:     ImpactStatus::from_diff(diff),
            });
        }
        entries
    }

    pub fn comparative(
        &self,
        line_code:          &str,
        base_date:          NaiveDate,
        window_length_days: i64,
    ) -> RidershipResult<ComparativeImpact> {
        let line = self.compute_window(&Scope::Line(line_code.to_string()), base_date, window_length_days)?;
        let system = self.compute_window(&Scope::System, base_date, window_length_days)?;
        Ok(ComparativeImpact {
            line_percent:   line.percent_delta(),
            system_percent: system.percent_delta(),
            contribution:   compute_contribution(&line, &system),
            line,
            system,
        })
    }
}
