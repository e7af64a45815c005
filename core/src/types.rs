//! Shared primitive types used across the whole crate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RidershipError, RidershipResult};

/// Stable code of a bus line, e.g. "8000-10" or "042".
pub type LineCode = String;

pub type GroupId = i64;

pub type ActionId = i64;

/// Identity supplied by the authentication collaborator.
pub type UserId = i64;

/// Label used when a record carries no operating company.
pub const UNSPECIFIED_COMPANY: &str = "Unspecified";

/// Label used when a line belongs to no group.
pub const UNGROUPED_LABEL: &str = "Ungrouped";

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end:   NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> RidershipResult<Self> {
        if start > end {
            return Err(RidershipError::validation(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of ISO dates as received from query parameters.
    pub fn parse(start: &str, end: &str) -> RidershipResult<Self> {
        Self::new(parse_iso_date(start)?, parse_iso_date(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(raw: &str) -> RidershipResult<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RidershipError::validation("date is required"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|e| RidershipError::validation(format!("invalid date '{trimmed}': {e}")))
}

/// The identity of whoever issues a mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id:    UserId,
    pub privileged: bool,
}
