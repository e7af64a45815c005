//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The session calls it through the `Repository` trait; no other module
//! executes SQL.

use crate::{
    action_ledger::Action,
    error::RidershipResult,
    group_registry::Group,
    ingest::ImportKind,
    repository::Repository,
    ridership::RidershipRecord,
    types::{ActionId, DateRange, GroupId, LineCode},
};
use rusqlite::Connection;

mod actions;
mod groups;
mod ridership;

pub struct RidershipDb {
    conn: Connection,
}

impl RidershipDb {
    pub fn open(path: &str) -> RidershipResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RidershipResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RidershipResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}

impl Repository for RidershipDb {
    fn load_records(&self, range: Option<&DateRange>) -> RidershipResult<Vec<RidershipRecord>> {
        self.records_in(range)
    }

    fn load_groups(&self) -> RidershipResult<Vec<Group>> {
        self.list_groups()
    }

    fn load_actions(&self) -> RidershipResult<Vec<Action>> {
        self.list_actions()
    }

    fn load_known_lines(&self) -> RidershipResult<Vec<LineCode>> {
        self.distinct_line_codes()
    }

    fn insert_group(&mut self, group: &Group) -> RidershipResult<()> {
        self.write_group(group)
    }

    fn rename_group(&mut self, id: GroupId, name: &str) -> RidershipResult<()> {
        self.write_group_name(id, name)
    }

    fn delete_group(&mut self, id: GroupId) -> RidershipResult<()> {
        self.remove_group(id)
    }

    fn add_member(&mut self, group_id: GroupId, line_code: &str) -> RidershipResult<()> {
        self.insert_member(group_id, line_code)
    }

    fn remove_member(&mut self, group_id: GroupId, line_code: &str) -> RidershipResult<()> {
        self.delete_member(group_id, line_code)
    }

    fn insert_action(&mut self, action: &Action) -> RidershipResult<()> {
        self.write_action(action)
    }

    fn update_conclusion(&mut self, id: ActionId, conclusion: Option<&str>) -> RidershipResult<()> {
        self.write_conclusion(id, conclusion)
    }

    fn delete_action(&mut self, id: ActionId) -> RidershipResult<()> {
        self.remove_action(id)
    }

    fn upsert_records(&mut self, records: &[RidershipRecord], kind: ImportKind) -> RidershipResult<usize> {
        self.import_records(records, kind)
    }

    fn wipe_ridership(&mut self) -> RidershipResult<usize> {
        self.delete_all_records()
    }
}
