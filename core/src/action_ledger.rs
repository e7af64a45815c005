//! Operational actions recorded against lines.
//!
//! An action is immutable except for its impact conclusion. Actions
//! without an implementation date are kept but can never anchor an
//! impact window.

use crate::{
    error::{RidershipError, RidershipResult},
    types::{ActionId, DateRange, LineCode, UserId},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id:                  ActionId,
    pub line_code:           LineCode,
    pub comment:             String,
    pub implementation_date: Option<NaiveDate>,
    pub author_id:           Option<UserId>,
    pub created_at:          NaiveDateTime,
    pub impact_conclusion:   Option<String>,
}

/// Display order: implementation date descending with undated actions
/// last, then newest id first. The first action in this order is the
/// default selection of the impact view.
pub fn display_order(a: &Action, b: &Action) -> Ordering {
    match (a.implementation_date, b.implementation_date) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.id.cmp(&a.id))
}

#[derive(Debug, Clone, Default)]
pub struct ActionLedger {
    actions: BTreeMap<ActionId, Action>,
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self {
            actions: actions.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    /// Record a new action. `created_at` is supplied by the caller; the
    /// ledger keeps no clock of its own.
    pub fn add_action(
        &mut self,
        line_code:           &str,
        comment:             &str,
        implementation_date: Option<NaiveDate>,
        author_id:           Option<UserId>,
        created_at:          NaiveDateTime,
    ) -> RidershipResult<Action> {
        let line_code = line_code.trim();
        if line_code.is_empty() {
            return Err(RidershipError::validation("line code is required"));
        }
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(RidershipError::validation("comment must not be empty"));
        }

        let id = self.actions.keys().next_back().map_or(1, |last| last + 1);
        let action = Action {
            id,
            line_code: line_code.to_string(),
            comment: comment.to_string(),
            implementation_date,
            author_id,
            created_at,
            impact_conclusion: None,
        };
        self.actions.insert(id, action.clone());
        log::info!("action {id} recorded for line {line_code}");
        Ok(action)
    }

    /// Replace the impact conclusion. An empty (or blank) text clears it.
    pub fn update_conclusion(&mut self, action_id: ActionId, text: &str) -> RidershipResult<&Action> {
        let action = self
            .actions
            .get_mut(&action_id)
            .ok_or(RidershipError::NotFound { entity: "action", id: action_id })?;
        action.impact_conclusion = if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        };
        Ok(action)
    }

    /// Remove an action. Privilege checks belong to the caller.
    pub fn delete_action(&mut self, action_id: ActionId) -> RidershipResult<Action> {
        let removed = self
            .actions
            .remove(&action_id)
            .ok_or(RidershipError::NotFound { entity: "action", id: action_id })?;
        log::info!("action {action_id} deleted");
        Ok(removed)
    }

    pub fn get(&self, action_id: ActionId) -> Option<&Action> {
        self.actions.get(&action_id)
    }

    pub fn list_for_line(&self, line_code: &str) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self
            .actions
            .values()
            .filter(|a| a.line_code == line_code)
            .collect();
        actions.sort_by(|a, b| display_order(a, b));
        actions
    }

    pub fn default_selection(&self, line_code: &str) -> Option<&Action> {
        self.list_for_line(line_code).into_iter().next()
    }

    /// Dated actions, optionally restricted to an implementation-date range,
    /// newest first (ties: latest created first, then highest id).
    pub fn dated_actions(&self, range: Option<&DateRange>) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self
            .actions
            .values()
            .filter(|a| match (a.implementation_date, range) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(date), Some(r)) => r.contains(date),
            })
            .collect();
        actions.sort_by(|a, b| {
            b.implementation_date
                .cmp(&a.implementation_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        actions
    }

    pub fn all(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
