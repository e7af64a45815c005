//! Line group and membership queries.

use super::RidershipDb;
use crate::{
    error::{RidershipError, RidershipResult},
    group_registry::Group,
    types::GroupId,
};
use rusqlite::params;
use std::collections::{BTreeMap, BTreeSet};

impl RidershipDb {
    pub(super) fn list_groups(&self) -> RidershipResult<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color FROM line_groups ORDER BY id")?;
        let mut groups: BTreeMap<GroupId, Group> = stmt
            .query_map([], |r| {
                Ok(Group {
                    id:    r.get(0)?,
                    name:  r.get(1)?,
                    color: r.get(2)?,
                    lines: BTreeSet::new(),
                })
            })?
            .map(|g| g.map(|g| (g.id, g)))
            .collect::<Result<_, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT group_id, line_code FROM line_group_members ORDER BY line_code")?;
        let members = stmt
            .query_map([], |r| Ok((r.get::<_, GroupId>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (group_id, line_code) in members {
            if let Some(group) = groups.get_mut(&group_id) {
                group.lines.insert(line_code);
            }
        }
        Ok(groups.into_values().collect())
    }

    pub(super) fn write_group(&self, group: &Group) -> RidershipResult<()> {
        self.conn.execute(
            "INSERT INTO line_groups (id, name, color) VALUES (?1, ?2, ?3)",
            params![group.id, group.name, group.color],
        )?;
        for line in &group.lines {
            self.insert_member(group.id, line)?;
        }
        Ok(())
    }

    pub(super) fn write_group_name(&self, id: GroupId, name: &str) -> RidershipResult<()> {
        let changed = self.conn.execute(
            "UPDATE line_groups SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        if changed == 0 {
            return Err(RidershipError::NotFound { entity: "group", id });
        }
        Ok(())
    }

    /// Membership rows go with the group (ON DELETE CASCADE).
    pub(super) fn remove_group(&self, id: GroupId) -> RidershipResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM line_groups WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(RidershipError::NotFound { entity: "group", id });
        }
        Ok(())
    }

    pub(super) fn insert_member(&self, group_id: GroupId, line_code: &str) -> RidershipResult<()> {
        self.conn.execute(
            "INSERT INTO line_group_members (group_id, line_code) VALUES (?1, ?2)",
            params![group_id, line_code],
        )?;
        Ok(())
    }

    pub(super) fn delete_member(&self, group_id: GroupId, line_code: &str) -> RidershipResult<()> {
        self.conn.execute(
            "DELETE FROM line_group_members WHERE group_id = ?1 AND line_code = ?2",
            params![group_id, line_code],
        )?;
        Ok(())
    }
}
