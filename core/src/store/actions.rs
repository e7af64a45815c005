//! Operational action queries.

use super::RidershipDb;
use crate::{
    action_ledger::Action,
    error::{RidershipError, RidershipResult},
    types::ActionId,
};
use rusqlite::params;

impl RidershipDb {
    pub(super) fn list_actions(&self) -> RidershipResult<Vec<Action>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, line_code, comment, implementation_date, author_id,
                    created_at, impact_conclusion
             FROM line_actions ORDER BY id",
        )?;
        let actions = stmt
            .query_map([], |r| {
                Ok(Action {
                    id:                  r.get(0)?,
                    line_code:           r.get(1)?,
                    comment:             r.get(2)?,
                    implementation_date: r.get(3)?,
                    author_id:           r.get(4)?,
                    created_at:          r.get(5)?,
                    impact_conclusion:   r.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(actions)
    }

    pub(super) fn write_action(&self, a: &Action) -> RidershipResult<()> {
        self.conn.execute(
            "INSERT INTO line_actions (
                id, line_code, comment, implementation_date, author_id,
                created_at, impact_conclusion
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                a.id,
                a.line_code,
                a.comment,
                a.implementation_date,
                a.author_id,
                a.created_at,
                a.impact_conclusion,
            ],
        )?;
        Ok(())
    }

    pub(super) fn write_conclusion(&self, id: ActionId, conclusion: Option<&str>) -> RidershipResult<()> {
        let changed = self.conn.execute(
            "UPDATE line_actions SET impact_conclusion = ?1 WHERE id = ?2",
            params![conclusion, id],
        )?;
        if changed == 0 {
            return Err(RidershipError::NotFound { entity: "action", id });
        }
        Ok(())
    }

    pub(super) fn remove_action(&self, id: ActionId) -> RidershipResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM line_actions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(RidershipError::NotFound { entity: "action", id });
        }
        Ok(())
    }
}
