//! Task CRUD and the partial-update merge.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{Priority, Task, TaskDraft, TaskPatch};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

/// Default XP for a task when the creator does not pick a value.
pub const XP_DEFAULT: i64 = 10;

/// Status a freshly created task starts in.
pub const STATUS_DEFAULT: &str = "todo";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        priority: Priority::from_str(&priority).unwrap_or_default(),
        xp: row.get("xp")?,
        completed: row.get("completed")?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
        deadline: row.get("deadline")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;

    let result = stmt.query_row(params![task_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a new task from a draft.
    pub fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        if draft.title.trim().is_empty() {
            return Err(ApiError::missing_field("title").into());
        }
        let xp = draft.xp.unwrap_or(XP_DEFAULT);
        if xp < 0 {
            return Err(ApiError::invalid_value("xp", "xp must be non-negative").into());
        }

        let now = now_ms();
        let priority = draft.priority.unwrap_or_default();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (title, description, status, priority, xp, completed, created_at, deadline)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                params![
                    &draft.title,
                    &draft.description,
                    STATUS_DEFAULT,
                    priority.as_str(),
                    xp,
                    now,
                    &draft.deadline,
                ],
            )?;
            let task_id = conn.last_insert_rowid();

            Ok(Task {
                id: task_id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                status: STATUS_DEFAULT.to_string(),
                priority,
                xp,
                completed: false,
                created_at: now,
                completed_at: None,
                deadline: draft.deadline.clone(),
            })
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List all tasks, newest first.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Delete a task. Returns the number of rows removed (0 for an unknown
    /// id). History rows are left in place as orphans, and achievements
    /// earned through the task are never revoked.
    pub fn delete_task(&self, task_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(deleted)
        })
    }

    /// Count tasks currently marked completed.
    pub fn completed_task_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE completed = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Apply a partial update to a task.
    ///
    /// Omitted fields are left unchanged; an explicit null clears
    /// `description` or `deadline`. The first transition to completed stamps
    /// `completed_at`; it is never re-stamped or cleared afterwards.
    ///
    /// Returns the pre-update snapshot alongside the updated task so the
    /// caller can diff them and detect the completion edge.
    pub fn apply_patch(&self, task_id: i64, patch: &TaskPatch) -> Result<(Task, Task)> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let before = get_task_internal(&tx, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            let new_title = patch.title.clone().unwrap_or_else(|| before.title.clone());
            if new_title.trim().is_empty() {
                return Err(ApiError::invalid_value("title", "title must not be empty").into());
            }
            let new_description = match &patch.description {
                Some(explicit) => explicit.clone(),
                None => before.description.clone(),
            };
            let new_status = patch.status.clone().unwrap_or_else(|| before.status.clone());
            let new_priority = patch.priority.unwrap_or(before.priority);
            let new_completed = patch.completed.unwrap_or(before.completed);
            let new_deadline = match &patch.deadline {
                Some(explicit) => explicit.clone(),
                None => before.deadline.clone(),
            };

            let completed_at = if new_completed && before.completed_at.is_none() {
                Some(now)
            } else {
                before.completed_at
            };

            tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, status = ?3, priority = ?4,
                    completed = ?5, completed_at = ?6, deadline = ?7
                 WHERE id = ?8",
                params![
                    new_title,
                    new_description,
                    new_status,
                    new_priority.as_str(),
                    new_completed,
                    completed_at,
                    new_deadline,
                    task_id,
                ],
            )?;

            tx.commit()?;

            let after = Task {
                id: task_id,
                title: new_title,
                description: new_description,
                status: new_status,
                priority: new_priority,
                completed: new_completed,
                completed_at,
                deadline: new_deadline,
                ..before.clone()
            };

            Ok((before, after))
        })
    }
}
