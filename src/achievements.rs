//! Achievement rules.
//!
//! Rules are a stateless function of the current aggregates; idempotence of
//! the actual unlock (and the guarantee that a badge is never revoked) lives
//! at the storage layer.

/// A single unlockable badge and its display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementRule {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

pub const FIRST_TASK: AchievementRule = AchievementRule {
    name: "First Task",
    description: "Complete your first task",
    icon: "task",
};

pub const XP_FIGHTER: AchievementRule = AchievementRule {
    name: "XP Fighter",
    description: "Earn 100 XP",
    icon: "star",
};

pub const MARATHONER: AchievementRule = AchievementRule {
    name: "Marathoner",
    description: "Complete 10 tasks",
    icon: "runner",
};

/// Evaluate every rule against the current aggregates and return the
/// satisfied ones.
pub fn evaluate(completed_task_count: i64, user_xp: i64) -> Vec<&'static AchievementRule> {
    let mut satisfied = Vec::new();

    if completed_task_count == 1 {
        satisfied.push(&FIRST_TASK);
    }
    if user_xp >= 100 {
        satisfied.push(&XP_FIGHTER);
    }
    if completed_task_count >= 10 {
        satisfied.push(&MARATHONER);
    }

    satisfied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_satisfies_first_task_only() {
        let satisfied = evaluate(1, 60);
        assert_eq!(satisfied, vec![&FIRST_TASK]);
    }

    #[test]
    fn first_task_requires_exactly_one_completion() {
        assert!(!evaluate(2, 60).contains(&&FIRST_TASK));
        assert!(!evaluate(0, 60).contains(&&FIRST_TASK));
    }

    #[test]
    fn xp_fighter_at_100_xp() {
        assert!(evaluate(2, 100).contains(&&XP_FIGHTER));
        assert!(evaluate(2, 250).contains(&&XP_FIGHTER));
        assert!(!evaluate(2, 99).contains(&&XP_FIGHTER));
    }

    #[test]
    fn marathoner_at_ten_completions() {
        assert!(evaluate(10, 0).contains(&&MARATHONER));
        assert!(evaluate(25, 0).contains(&&MARATHONER));
        assert!(!evaluate(9, 0).contains(&&MARATHONER));
    }

    #[test]
    fn tenth_completion_can_satisfy_several_rules() {
        let satisfied = evaluate(10, 100);
        assert_eq!(satisfied, vec![&XP_FIGHTER, &MARATHONER]);
    }

    #[test]
    fn nothing_satisfied_below_every_threshold() {
        assert!(evaluate(0, 0).is_empty());
        assert!(evaluate(2, 40).is_empty());
    }
}
