//! Achievement persistence: insert-if-absent unlocks and listing.

use super::{Database, now_ms};
use crate::achievements::AchievementRule;
use crate::types::Achievement;
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_achievement_row(row: &Row) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        icon: row.get("icon")?,
        user_id: row.get("user_id")?,
        task_id: row.get("task_id")?,
        unlocked_at: row.get("unlocked_at")?,
    })
}

impl Database {
    /// Unlock an achievement for a user. The `(name, user_id)` unique index
    /// makes this idempotent: re-triggering an unlocked rule is a no-op.
    ///
    /// Returns the new row, or `None` when the achievement was already held.
    pub fn unlock_achievement(
        &self,
        user_id: i64,
        rule: &AchievementRule,
        task_id: Option<i64>,
    ) -> Result<Option<Achievement>> {
        let now = now_ms();

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO achievements (name, description, icon, user_id, task_id, unlocked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![rule.name, rule.description, rule.icon, user_id, task_id, now],
            )?;
            if inserted == 0 {
                return Ok(None);
            }

            Ok(Some(Achievement {
                id: conn.last_insert_rowid(),
                name: rule.name.to_string(),
                description: Some(rule.description.to_string()),
                icon: Some(rule.icon.to_string()),
                user_id,
                task_id,
                unlocked_at: now,
            }))
        })
    }

    /// List a user's achievements, most recently unlocked first.
    pub fn list_achievements(&self, user_id: i64) -> Result<Vec<Achievement>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM achievements WHERE user_id = ?1
                 ORDER BY unlocked_at DESC, id DESC",
            )?;

            let achievements = stmt
                .query_map(params![user_id], parse_achievement_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(achievements)
        })
    }
}
