//! The task update pipeline: merge, history, XP, level, achievements.
//!
//! [`apply_task_update`] is the single entry point the HTTP layer calls for
//! task edits. The primary mutation fails hard; every derived effect is
//! best-effort, logged on failure, and reported through
//! [`UpdateOutcome::effect_errors`] so a successful update is never masked
//! by a failed side channel.

use crate::achievements;
use crate::db::Database;
use crate::types::{TaskPatch, UpdateOutcome};
use anyhow::Result;
use tracing::warn;

/// XP required per level tier.
pub const XP_PER_LEVEL: i64 = 100;

/// Derive the level for an XP total.
pub fn level_for_xp(xp: i64) -> i64 {
    xp / XP_PER_LEVEL + 1
}

/// Apply a partial update to a task and run the derived effects in order:
/// history diff, then (only when the update flips `completed` from false to
/// true) XP award, level recompute, and achievement evaluation.
///
/// The completion edge is detected against the pre-update snapshot, so
/// re-submitting `completed: true` on an already-completed task awards
/// nothing.
pub fn apply_task_update(
    db: &Database,
    user_id: i64,
    task_id: i64,
    patch: &TaskPatch,
) -> Result<UpdateOutcome> {
    let (before, after) = db.apply_patch(task_id, patch)?;

    let mut outcome = UpdateOutcome {
        task: after.clone(),
        history_appended: 0,
        xp_awarded: 0,
        leveled_up: false,
        achievements_unlocked: Vec::new(),
        effect_errors: Vec::new(),
    };

    match db.record_task_changes(task_id, &before, &after) {
        Ok(appended) => outcome.history_appended = appended,
        Err(e) => {
            warn!(task_id, error = %e, "History recording failed");
            outcome.effect_errors.push(format!("history: {e}"));
        }
    }

    let completed_edge = patch.completed == Some(true) && !before.completed;
    if !completed_edge {
        return Ok(outcome);
    }

    // The award is the task's xp as fixed at creation time.
    let user = match db.add_xp(user_id, after.xp) {
        Ok(user) => user,
        Err(e) => {
            // Without the fresh total, deriving a level or evaluating
            // achievements would work from stale state; stop here.
            warn!(user_id, task_id, error = %e, "XP award failed");
            outcome.effect_errors.push(format!("xp: {e}"));
            return Ok(outcome);
        }
    };
    outcome.xp_awarded = after.xp;

    let new_level = level_for_xp(user.xp);
    if new_level <= user.level {
        return Ok(outcome);
    }
    outcome.leveled_up = true;

    if let Err(e) = db.set_level(user_id, new_level) {
        warn!(user_id, new_level, error = %e, "Level persist failed");
        outcome.effect_errors.push(format!("level: {e}"));
    }

    let completed_count = match db.completed_task_count() {
        Ok(count) => count,
        Err(e) => {
            warn!(user_id, error = %e, "Completed-task count failed, skipping achievements");
            outcome.effect_errors.push(format!("achievements: {e}"));
            return Ok(outcome);
        }
    };

    for rule in achievements::evaluate(completed_count, user.xp) {
        match db.unlock_achievement(user_id, rule, Some(task_id)) {
            Ok(Some(unlocked)) => outcome.achievements_unlocked.push(unlocked),
            Ok(None) => {} // already held
            Err(e) => {
                warn!(user_id, rule = rule.name, error = %e, "Achievement unlock failed");
                outcome
                    .effect_errors
                    .push(format!("achievement {}: {e}", rule.name));
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_derivation() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(120), 2);
        assert_eq!(level_for_xp(250), 3);
    }
}
