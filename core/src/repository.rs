//! The persistence collaborator as seen by the session.
//!
//! Reads return plain collections; the session rebuilds its registries from
//! them. Writes mirror one already-validated in-memory mutation each.

use crate::{
    action_ledger::Action,
    error::RidershipResult,
    group_registry::Group,
    ingest::ImportKind,
    ridership::RidershipRecord,
    types::{ActionId, DateRange, GroupId, LineCode},
};

pub trait Repository {
    /// Records whose date falls in `range` (every record when `None`).
    fn load_records(&self, range: Option<&DateRange>) -> RidershipResult<Vec<RidershipRecord>>;

    /// Groups with their member lines.
    fn load_groups(&self) -> RidershipResult<Vec<Group>>;

    fn load_actions(&self) -> RidershipResult<Vec<Action>>;

    /// Every line code the system knows about, ascending.
    fn load_known_lines(&self) -> RidershipResult<Vec<LineCode>>;

    // ── Groups ─────────────────────────────────────────────────

    fn insert_group(&mut self, group: &Group) -> RidershipResult<()>;

    fn rename_group(&mut self, id: GroupId, name: &str) -> RidershipResult<()>;

    /// Delete a group and its membership rows.
    fn delete_group(&mut self, id: GroupId) -> RidershipResult<()>;

    fn add_member(&mut self, group_id: GroupId, line_code: &str) -> RidershipResult<()>;

    fn remove_member(&mut self, group_id: GroupId, line_code: &str) -> RidershipResult<()>;

    // ── Actions ────────────────────────────────────────────────

    fn insert_action(&mut self, action: &Action) -> RidershipResult<()>;

    fn update_conclusion(&mut self, id: ActionId, conclusion: Option<&str>) -> RidershipResult<()>;

    fn delete_action(&mut self, id: ActionId) -> RidershipResult<()>;

    // ── Ridership ──────────────────────────────────────────────

    /// Write imported records atomically. Only the column named by `kind`
    /// is replaced on existing (date, line, company) rows. Returns the
    /// number of rows written.
    fn upsert_records(&mut self, records: &[RidershipRecord], kind: ImportKind) -> RidershipResult<usize>;

    /// Remove every ridership record. Returns the number removed.
    fn wipe_ridership(&mut self) -> RidershipResult<usize>;
}
