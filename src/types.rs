//! Core types for questlog.

use serde::{Deserialize, Deserializer, Serialize};

/// Task priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A tracked work item.
///
/// `xp` is fixed at creation time and awarded to the user when the task
/// first transitions to completed. `completed_at` is stamped on that
/// transition and never cleared by later edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Priority,
    pub xp: i64,
    pub completed: bool,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    /// ISO-8601 date string supplied by the client, stored as-is.
    pub deadline: Option<String>,
}

/// Input for creating a task. Also the shape the LLM generation flow
/// produces; a generated draft is returned to the client, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub xp: Option<i64>,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Partial update for a task.
///
/// An absent field means "leave unchanged". For the clearable fields
/// (`description`, `deadline`) an explicit JSON `null` means "clear";
/// the double `Option` preserves that distinction through serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<String>>,
}

/// Deserialize a present-but-possibly-null field as `Some(Option<T>)`,
/// leaving `None` for fields the caller omitted entirely.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// The singleton user whose progression the service tracks.
///
/// `level == xp / 100 + 1` holds after every progression step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub xp: i64,
    pub level: i64,
    pub created_at: i64,
}

/// A one-time unlockable badge. At most one row exists per
/// `(name, user_id)`; achievements are never revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub unlocked_at: i64,
}

/// An immutable audit record of one field's value change on one update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: i64,
}

/// Everything a task update produced, so the HTTP layer can shape a
/// response without re-deriving business logic.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub task: Task,
    pub history_appended: usize,
    pub xp_awarded: i64,
    pub leveled_up: bool,
    pub achievements_unlocked: Vec<Achievement>,
    /// Side-effect failures that were logged but did not block the update.
    pub effect_errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_str() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_str(p.as_str()), Some(p));
        }
        assert_eq!(Priority::from_str("urgent"), None);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: TaskPatch = serde_json::from_str(r#"{"title": "new"}"#).unwrap();
        assert_eq!(patch.title.as_deref(), Some("new"));
        assert!(patch.description.is_none());

        let patch: TaskPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));

        let patch: TaskPatch = serde_json::from_str(r#"{"description": "d"}"#).unwrap();
        assert_eq!(patch.description, Some(Some("d".to_string())));
    }

    #[test]
    fn patch_defaults_to_no_changes() {
        let patch: TaskPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.title.is_none());
        assert!(patch.status.is_none());
        assert!(patch.priority.is_none());
        assert!(patch.completed.is_none());
        assert!(patch.deadline.is_none());
    }
}
