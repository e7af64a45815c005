//! The session: every collection the analytics work on, owned explicitly.
//!
//! RULES:
//!   - Nothing outside a `Session` holds ridership, group or action state.
//!   - `refresh` is all-or-nothing. A failed fetch keeps the previous
//!     collections and the previous dashboard.
//!   - Mutations run against a copy of the registry/ledger, persist through
//!     the repository, and only then replace the live copy. A validation or
//!     persistence failure leaves the session untouched.
//!   - Writes are last-write-wins; there is no concurrency token.

use crate::{
    action_ledger::{Action, ActionLedger},
    config::AnalyticsConfig,
    error::{RidershipError, RidershipResult},
    export::{export_group, export_group_daily, ExportRow},
    group_registry::{DeleteOutcome, Group, GroupRegistry, LineAvailability, MembershipAction, MembershipOutcome},
    impact::{
        parse_impact_params, validate_window, window_span, ComparativeImpact, ImpactCalculator,
        ImpactEntry, ImpactWindow, LedgerSummary, Scope, LEDGER_WINDOW_DAYS,
    },
    ingest::ImportKind,
    line_detail::{line_detail, LineDetail},
    ranking::{top_n, Direction, RankedLine},
    repository::Repository,
    ridership::{
        aggregate_by_line, companies_by_realized, company_detail, CompanyAggregate, LineAggregate,
        MacroSummary, RidershipRecord, RidershipStore,
    },
    types::{ActionId, Actor, DateRange, GroupId, UserId},
};
use chrono::{NaiveDate, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything the macro view shows for the active date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub range:      DateRange,
    pub summary:    MacroSummary,
    /// Largest realized volume first.
    pub companies:  Vec<CompanyAggregate>,
    /// Line code order.
    pub lines:      Vec<LineAggregate>,
    pub top_gains:  Vec<RankedLine>,
    pub top_losses: Vec<RankedLine>,
}

impl Dashboard {
    fn build(config: &AnalyticsConfig, range: DateRange, store: &RidershipStore, groups: &GroupRegistry) -> Self {
        let by_line = store.by_line();
        let top_gains = top_n(by_line.values(), config.ranking_size, Direction::Gain, groups);
        let top_losses = top_n(by_line.values(), config.ranking_size, Direction::Loss, groups);
        Self {
            range,
            summary: store.summary(),
            companies: companies_by_realized(store.records()),
            lines: by_line.into_values().collect(),
            top_gains,
            top_losses,
        }
    }
}

/// Impact ledger entries with their headline figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactLedger {
    pub entries: Vec<ImpactEntry>,
    pub summary: LedgerSummary,
}

pub struct Session<R: Repository> {
    config:         AnalyticsConfig,
    repo:           R,
    range:          Option<DateRange>,
    store:          RidershipStore,
    groups:         GroupRegistry,
    actions:        ActionLedger,
    selected_group: Option<GroupId>,
    dashboard:      Option<Dashboard>,
}

impl<R: Repository> Session<R> {
    /// Start a session over `repo` with its groups, known lines and actions
    /// already loaded, so ids and name checks see what is stored. Records
    /// stay empty until the first `refresh`.
    pub fn open(config: AnalyticsConfig, repo: R) -> RidershipResult<Self> {
        let mut session = Self {
            config,
            repo,
            range: None,
            store: RidershipStore::default(),
            groups: GroupRegistry::new(),
            actions: ActionLedger::new(),
            selected_group: None,
            dashboard: None,
        };
        session.refresh_catalog()?;
        Ok(session)
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    // ── Refresh ────────────────────────────────────────────────

    /// Fetch everything for `range` and rebuild the dashboard.
    pub fn refresh(&mut self, range: DateRange) -> RidershipResult<&Dashboard> {
        let records = self.repo.load_records(Some(&range))?;
        let mut groups = GroupRegistry::from_groups(self.repo.load_groups()?)?;
        groups.set_known_lines(self.repo.load_known_lines()?);
        let actions = ActionLedger::from_actions(self.repo.load_actions()?);

        let store = RidershipStore::new(records);
        let dashboard = Dashboard::build(&self.config, range, &store, &groups);
        log::debug!(
            "refresh {}..{}: {} records, {} groups, {} actions",
            range.start,
            range.end,
            store.len(),
            groups.len(),
            actions.len()
        );

        if self.selected_group.is_some_and(|id| groups.get(id).is_none()) {
            self.selected_group = None;
        }
        self.range = Some(range);
        self.store = store;
        self.groups = groups;
        self.actions = actions;
        let dashboard: &Dashboard = self.dashboard.insert(dashboard);
        Ok(dashboard)
    }

    /// Reload groups, known lines and actions without touching the
    /// records of the active range. All-or-nothing like `refresh`.
    pub fn refresh_catalog(&mut self) -> RidershipResult<()> {
        let mut groups = GroupRegistry::from_groups(self.repo.load_groups()?)?;
        groups.set_known_lines(self.repo.load_known_lines()?);
        let actions = ActionLedger::from_actions(self.repo.load_actions()?);
        if self.selected_group.is_some_and(|id| groups.get(id).is_none()) {
            self.selected_group = None;
        }
        self.groups = groups;
        self.actions = actions;
        self.rebuild_dashboard();
        Ok(())
    }

    /// Rebuild the dashboard from in-memory state after a group change,
    /// since ranking rows carry group names.
    fn rebuild_dashboard(&mut self) {
        if let Some(range) = self.range {
            self.dashboard = Some(Dashboard::build(&self.config, range, &self.store, &self.groups));
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn records(&self) -> &RidershipStore {
        &self.store
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn actions(&self) -> &ActionLedger {
        &self.actions
    }

    // ── Groups ─────────────────────────────────────────────────

    pub fn create_group(&mut self, name: &str) -> RidershipResult<Group> {
        let mut next = self.groups.clone();
        let group = next.create_group(name)?;
        self.repo.insert_group(&group)?;
        self.groups = next;
        Ok(group)
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> RidershipResult<Group> {
        let mut next = self.groups.clone();
        let group = next.rename_group(id, name)?.clone();
        self.repo.rename_group(id, &group.name)?;
        self.groups = next;
        self.rebuild_dashboard();
        Ok(group)
    }

    /// Delete a group. When it was the selected group the selection is
    /// cleared.
    pub fn delete_group(&mut self, id: GroupId) -> RidershipResult<DeleteOutcome> {
        let mut next = self.groups.clone();
        let outcome = next.delete_group(id, self.selected_group)?;
        self.repo.delete_group(id)?;
        self.groups = next;
        if outcome.reset_selection {
            self.selected_group = None;
        }
        self.rebuild_dashboard();
        Ok(outcome)
    }

    pub fn set_membership(
        &mut self,
        group_id:  GroupId,
        line_code: &str,
        action:    MembershipAction,
    ) -> RidershipResult<MembershipOutcome> {
        let mut next = self.groups.clone();
        let outcome = next.set_membership(group_id, line_code, action)?;
        if outcome.changed() {
            let line_code = line_code.trim();
            match action {
                MembershipAction::Add => self.repo.add_member(group_id, line_code)?,
                MembershipAction::Remove => self.repo.remove_member(group_id, line_code)?,
            }
            self.groups = next;
            self.rebuild_dashboard();
        }
        Ok(outcome)
    }

    pub fn select_group(&mut self, id: Option<GroupId>) -> RidershipResult<()> {
        if let Some(id) = id {
            if self.groups.get(id).is_none() {
                return Err(RidershipError::NotFound { entity: "group", id });
            }
        }
        self.selected_group = id;
        Ok(())
    }

    pub fn selected_group(&self) -> Option<&Group> {
        self.selected_group.and_then(|id| self.groups.get(id))
    }

    /// Per-line rows of the active range, restricted to the selected group
    /// when there is one. Line code order.
    pub fn group_table(&self) -> Vec<LineAggregate> {
        let by_line = match self.selected_group() {
            Some(group) => aggregate_by_line(&self.store.in_group(group)),
            None => self.store.by_line(),
        };
        by_line.into_values().collect()
    }

    pub fn line_availability(&self) -> Vec<LineAvailability> {
        self.groups.line_availability()
    }

    // ── Actions ────────────────────────────────────────────────

    pub fn add_action(
        &mut self,
        line_code:           &str,
        comment:             &str,
        implementation_date: Option<NaiveDate>,
        author_id:           Option<UserId>,
    ) -> RidershipResult<Action> {
        let mut next = self.actions.clone();
        let action = next.add_action(
            line_code,
            comment,
            implementation_date,
            author_id,
            Utc::now().naive_utc(),
        )?;
        self.repo.insert_action(&action)?;
        self.actions = next;
        Ok(action)
    }

    pub fn update_conclusion(&mut self, action_id: ActionId, text: &str) -> RidershipResult<Action> {
        let mut next = self.actions.clone();
        let action = next.update_conclusion(action_id, text)?.clone();
        self.repo
            .update_conclusion(action_id, action.impact_conclusion.as_deref())?;
        self.actions = next;
        Ok(action)
    }

    pub fn delete_action(&mut self, actor: &Actor, action_id: ActionId) -> RidershipResult<Action> {
        require_privilege(actor, "delete actions")?;
        let mut next = self.actions.clone();
        let removed = next.delete_action(action_id)?;
        self.repo.delete_action(action_id)?;
        self.actions = next;
        Ok(removed)
    }

    // ── Ridership data ─────────────────────────────────────────

    /// Persist imported records, then reload the active range if there is
    /// one. Returns the number of rows written.
    pub fn import_records(&mut self, records: &[RidershipRecord], kind: ImportKind) -> RidershipResult<usize> {
        let written = self.repo.upsert_records(records, kind)?;
        if let Some(range) = self.range {
            self.refresh(range)?;
        }
        Ok(written)
    }

    /// Remove every ridership record. Groups and actions survive.
    pub fn wipe(&mut self, actor: &Actor) -> RidershipResult<usize> {
        require_privilege(actor, "wipe ridership data")?;
        let removed = self.repo.wipe_ridership()?;
        log::info!("user {} wiped {removed} ridership rows", actor.user_id);
        self.store = RidershipStore::default();
        self.groups.set_known_lines(Vec::new());
        self.rebuild_dashboard();
        Ok(removed)
    }

    // ── Impact ─────────────────────────────────────────────────

    fn calculator_for(&self, base_date: NaiveDate, window: u32) -> RidershipResult<ImpactCalculator> {
        let span = window_span(base_date, window)?;
        let records = self.repo.load_records(Some(&span))?;
        Ok(ImpactCalculator::new(&records))
    }

    /// Before/after window of one line. `window` falls back to the
    /// configured default.
    pub fn line_impact(
        &self,
        line_code: &str,
        base_date: Option<&str>,
        window:    Option<i64>,
    ) -> RidershipResult<ImpactWindow> {
        let line_code = required_line(line_code)?;
        let (base_date, window) = parse_impact_params(base_date, window, self.config.default_window_days)?;
        self.calculator_for(base_date, window)?
            .compute_window(&Scope::Line(line_code.to_string()), base_date, i64::from(window))
    }

    pub fn system_impact(&self, base_date: Option<&str>, window: Option<i64>) -> RidershipResult<ImpactWindow> {
        let (base_date, window) = parse_impact_params(base_date, window, self.config.default_window_days)?;
        self.calculator_for(base_date, window)?
            .compute_window(&Scope::System, base_date, i64::from(window))
    }

    pub fn comparative_impact(
        &self,
        line_code: &str,
        base_date: Option<&str>,
        window:    Option<i64>,
    ) -> RidershipResult<ComparativeImpact> {
        let line_code = required_line(line_code)?;
        let (base_date, window) = parse_impact_params(base_date, window, self.config.default_window_days)?;
        self.calculator_for(base_date, window)?
            .comparative(line_code, base_date, i64::from(window))
    }

    /// Window anchored on a recorded action.
    pub fn action_impact(&self, action_id: ActionId, window: Option<i64>) -> RidershipResult<ImpactWindow> {
        let action = self
            .actions
            .get(action_id)
            .ok_or(RidershipError::NotFound { entity: "action", id: action_id })?;
        let window = validate_window(window.unwrap_or(i64::from(self.config.default_window_days)))?;
        let base_date = action.implementation_date.ok_or_else(|| {
            RidershipError::validation(format!("action {action_id} has no implementation date"))
        })?;
        self.calculator_for(base_date, window)?
            .window_for_action(action, i64::from(window))
    }

    /// Seven-day impact of every dated action in `range` (all when `None`).
    pub fn impact_ledger(&self, range: Option<&DateRange>) -> RidershipResult<ImpactLedger> {
        let dated = self.actions.dated_actions(range);
        let (Some(first), Some(last)) = (
            dated.iter().filter_map(|a| a.implementation_date).min(),
            dated.iter().filter_map(|a| a.implementation_date).max(),
        ) else {
            return Ok(ImpactLedger::default());
        };

        let span = DateRange::new(
            window_span(first, LEDGER_WINDOW_DAYS)?.start,
            window_span(last, LEDGER_WINDOW_DAYS)?.end,
        )?;
        let records = self.repo.load_records(Some(&span))?;
        let entries = ImpactCalculator::new(&records).compute_global_impact_ledger(&self.actions, range);
        let summary = LedgerSummary::from_entries(&entries);
        Ok(ImpactLedger { entries, summary })
    }

    // ── Drill-downs ────────────────────────────────────────────

    /// Daily series and trend of one line over the active range.
    pub fn line_detail(&self, line_code: &str, weekday: Option<Weekday>) -> RidershipResult<LineDetail> {
        let line_code = required_line(line_code)?;
        let range = self.active_range()?;
        Ok(line_detail(
            self.store.records(),
            line_code,
            &range,
            weekday,
            self.config.trend_span_days,
            self.config.trend_threshold_ratio,
        ))
    }

    pub fn company_detail(&self, company: &str) -> RidershipResult<Vec<LineAggregate>> {
        let company = company.trim();
        if company.is_empty() {
            return Err(RidershipError::validation("company is required"));
        }
        self.active_range()?;
        Ok(company_detail(self.store.records(), company))
    }

    fn active_range(&self) -> RidershipResult<DateRange> {
        self.range
            .ok_or_else(|| RidershipError::validation("no date range loaded; refresh first"))
    }

    // ── Export ─────────────────────────────────────────────────

    pub fn export_group(&self, group_id: GroupId, range: &DateRange) -> RidershipResult<Vec<ExportRow>> {
        let group = self.group(group_id)?;
        let records = self.repo.load_records(Some(range))?;
        Ok(export_group(&records, group, range))
    }

    pub fn export_group_daily(
        &self,
        group_id: GroupId,
        range:    &DateRange,
    ) -> RidershipResult<BTreeMap<NaiveDate, Vec<ExportRow>>> {
        let group = self.group(group_id)?;
        let records = self.repo.load_records(Some(range))?;
        Ok(export_group_daily(&records, group, range))
    }

    fn group(&self, id: GroupId) -> RidershipResult<&Group> {
        self.groups
            .get(id)
            .ok_or(RidershipError::NotFound { entity: "group", id })
    }
}

fn require_privilege(actor: &Actor, what: &str) -> RidershipResult<()> {
    if actor.privileged {
        Ok(())
    } else {
        log::warn!("user {} denied: {what}", actor.user_id);
        Err(RidershipError::Unauthorized(format!(
            "user {} is not allowed to {what}",
            actor.user_id
        )))
    }
}

fn required_line(line_code: &str) -> RidershipResult<&str> {
    let line_code = line_code.trim();
    if line_code.is_empty() {
        return Err(RidershipError::validation("line code is required"));
    }
    Ok(line_code)
}
