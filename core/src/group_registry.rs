//! Operator-defined groups ("blocos") of lines.
//!
//! INVARIANT: a line code belongs to at most one group at any time.
//! Membership only changes through `set_membership`; the owner index is
//! kept in step with the groups' line sets.

use crate::{
    error::{RidershipError, RidershipResult},
    types::{GroupId, LineCode},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_GROUP_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id:    GroupId,
    pub name:  String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub lines: BTreeSet<LineCode>,
}

fn default_color() -> String {
    DEFAULT_GROUP_COLOR.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOutcome {
    Added,
    AlreadyMember,
    Removed,
    NotMember,
}

impl MembershipOutcome {
    /// Whether the call changed anything that must be persisted.
    pub fn changed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

/// Result of deleting a group. `reset_selection` tells the caller that the
/// group it was viewing no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed:         Group,
    pub reset_selection: bool,
}

/// A known line and the group currently owning it, for selection grids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAvailability {
    pub line_code:  LineCode,
    pub owner_id:   Option<GroupId>,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups:      BTreeMap<GroupId, Group>,
    owners:      BTreeMap<LineCode, GroupId>,
    known_lines: BTreeSet<LineCode>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted groups. Rejects input in which a
    /// line appears in two groups.
    pub fn from_groups(groups: Vec<Group>) -> RidershipResult<Self> {
        let mut registry = Self::new();
        for group in groups {
            for line in &group.lines {
                if let Some(owner) = registry.owners.get(line) {
                    let owner_name = registry.groups[owner].name.clone();
                    return Err(RidershipError::Conflict {
                        line_code: line.clone(),
                        owner_id: *owner,
                        owner_name,
                    });
                }
                registry.owners.insert(line.clone(), group.id);
            }
            registry.groups.insert(group.id, group);
        }
        Ok(registry)
    }

    pub fn create_group(&mut self, name: &str) -> RidershipResult<Group> {
        let name = self.validate_name(name, None)?;
        let id = self.groups.keys().next_back().map_or(1, |last| last + 1);
        let group = Group {
            id,
            name,
            color: default_color(),
            lines: BTreeSet::new(),
        };
        self.groups.insert(id, group.clone());
        log::info!("group created: id={id} name={}", group.name);
        Ok(group)
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> RidershipResult<&Group> {
        let name = self.validate_name(name, Some(id))?;
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(RidershipError::NotFound { entity: "group", id })?;
        group.name = name;
        Ok(group)
    }

    /// Remove a group and release every line it owned.
    pub fn delete_group(
        &mut self,
        id:       GroupId,
        selected: Option<GroupId>,
    ) -> RidershipResult<DeleteOutcome> {
        let removed = self
            .groups
            .remove(&id)
            .ok_or(RidershipError::NotFound { entity: "group", id })?;
        for line in &removed.lines {
            self.owners.remove(line);
        }
        log::info!("group deleted: id={id} released {} lines", removed.lines.len());
        Ok(DeleteOutcome {
            reset_selection: selected == Some(id),
            removed,
        })
    }

    /// Add a line to, or remove it from, a group.
    ///
    /// `Add` fails with a conflict naming the current owner when another
    /// group holds the line; it is a no-op when the target already holds it.
    /// `Remove` is a no-op when the line is not a member.
    pub fn set_membership(
        &mut self,
        group_id:  GroupId,
        line_code: &str,
        action:    MembershipAction,
    ) -> RidershipResult<MembershipOutcome> {
        let line_code = line_code.trim();
        if line_code.is_empty() {
            return Err(RidershipError::validation("line code is required"));
        }
        if !self.groups.contains_key(&group_id) {
            return Err(RidershipError::NotFound { entity: "group", id: group_id });
        }

        let outcome = match action {
            MembershipAction::Add => match self.owners.get(line_code).copied() {
                Some(owner) if owner == group_id => MembershipOutcome::AlreadyMember,
                Some(owner) => {
                    return Err(RidershipError::Conflict {
                        line_code:  line_code.to_string(),
                        owner_id:   owner,
                        owner_name: self.groups[&owner].name.clone(),
                    });
                }
                None => {
                    self.owners.insert(line_code.to_string(), group_id);
                    if let Some(group) = self.groups.get_mut(&group_id) {
                        group.lines.insert(line_code.to_string());
                    }
                    MembershipOutcome::Added
                }
            },
            MembershipAction::Remove => {
                if self.owners.get(line_code) == Some(&group_id) {
                    self.owners.remove(line_code);
                    if let Some(group) = self.groups.get_mut(&group_id) {
                        group.lines.remove(line_code);
                    }
                    MembershipOutcome::Removed
                } else {
                    MembershipOutcome::NotMember
                }
            }
        };

        log::debug!("membership group={group_id} line={line_code} {action:?} -> {outcome:?}");
        Ok(outcome)
    }

    pub fn owner_of(&self, line_code: &str) -> Option<&Group> {
        self.owners.get(line_code).and_then(|id| self.groups.get(id))
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Groups in id order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Groups ordered by name, as listed in the management view.
    pub fn groups_by_name(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.values().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Replace the externally sourced catalogue of known line codes.
    pub fn set_known_lines<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = LineCode>,
    {
        self.known_lines = lines.into_iter().collect();
    }

    /// All known line codes, ascending, regardless of membership.
    pub fn list_available_lines(&self) -> &BTreeSet<LineCode> {
        &self.known_lines
    }

    pub fn line_availability(&self) -> Vec<LineAvailability> {
        self.known_lines
            .iter()
            .map(|code| {
                let owner = self.owner_of(code);
                LineAvailability {
                    line_code:  code.clone(),
                    owner_id:   owner.map(|g| g.id),
                    owner_name: owner.map(|g| g.name.clone()),
                }
            })
            .collect()
    }

    /// Scan every group and return the line codes found in more than one.
    /// Empty when the exclusivity invariant holds.
    pub fn duplicated_lines(&self) -> Vec<LineCode> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut dupes: BTreeSet<LineCode> = BTreeSet::new();
        for group in self.groups.values() {
            for line in &group.lines {
                if !seen.insert(line.as_str()) {
                    dupes.insert(line.clone());
                }
            }
        }
        dupes.into_iter().collect()
    }

    fn validate_name(&self, name: &str, renaming: Option<GroupId>) -> RidershipResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RidershipError::validation("group name must not be empty"));
        }
        let taken = self
            .groups
            .values()
            .any(|g| g.name == name && Some(g.id) != renaming);
        if taken {
            return Err(RidershipError::validation(format!(
                "a group named '{name}' already exists"
            )));
        }
        Ok(name.to_string())
    }
}
