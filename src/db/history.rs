//! Field-level change history for tasks.
//!
//! History is a diagnostic side channel: appends are best-effort and a
//! failed insert never fails the task update that produced it.

use super::{Database, now_ms};
use crate::types::{HistoryEntry, Task};
use anyhow::Result;
use rusqlite::params;
use tracing::warn;

/// Compute the per-field differences between a pre-update snapshot and the
/// resolved post-update task. Values are compared typed, then rendered to
/// text for storage; a field the update resolved to its old value produces
/// no entry.
fn field_changes(
    before: &Task,
    after: &Task,
) -> Vec<(&'static str, Option<String>, Option<String>)> {
    let mut changes = Vec::new();

    if before.title != after.title {
        changes.push((
            "title",
            Some(before.title.clone()),
            Some(after.title.clone()),
        ));
    }
    if before.description != after.description {
        changes.push((
            "description",
            before.description.clone(),
            after.description.clone(),
        ));
    }
    if before.status != after.status {
        changes.push((
            "status",
            Some(before.status.clone()),
            Some(after.status.clone()),
        ));
    }
    if before.priority != after.priority {
        changes.push((
            "priority",
            Some(before.priority.as_str().to_string()),
            Some(after.priority.as_str().to_string()),
        ));
    }
    if before.completed != after.completed {
        changes.push((
            "completed",
            Some(before.completed.to_string()),
            Some(after.completed.to_string()),
        ));
    }
    if before.deadline != after.deadline {
        changes.push((
            "deadline",
            before.deadline.clone(),
            after.deadline.clone(),
        ));
    }

    changes
}

impl Database {
    /// Append one history row per changed field. Returns how many rows were
    /// written; an individual append failure is logged and skipped.
    pub fn record_task_changes(
        &self,
        task_id: i64,
        before: &Task,
        after: &Task,
    ) -> Result<usize> {
        let changes = field_changes(before, after);
        if changes.is_empty() {
            return Ok(0);
        }

        let now = now_ms();

        self.with_conn(|conn| {
            let mut appended = 0;
            for (field, old_value, new_value) in changes {
                let result = conn.execute(
                    "INSERT INTO task_history (task_id, field_changed, old_value, new_value, changed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![task_id, field, old_value, new_value, now],
                );
                match result {
                    Ok(_) => appended += 1,
                    Err(e) => {
                        warn!(task_id, field, error = %e, "Failed to append history entry");
                    }
                }
            }
            Ok(appended)
        })
    }

    /// Get the change history for a task, newest first.
    pub fn task_history(&self, task_id: i64) -> Result<Vec<HistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, field_changed, old_value, new_value, changed_at
                 FROM task_history
                 WHERE task_id = ?1
                 ORDER BY changed_at DESC, id DESC",
            )?;

            let entries = stmt
                .query_map(params![task_id], |row| {
                    Ok(HistoryEntry {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        field_changed: row.get(2)?,
                        old_value: row.get(3)?,
                        new_value: row.get(4)?,
                        changed_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(entries)
        })
    }
}
