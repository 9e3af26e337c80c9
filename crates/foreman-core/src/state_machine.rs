//! Task lifecycle table.
//!
//! Every state change in the store goes through [`check_transition`]; the
//! database layer calls it before writing so that an illegal transition is
//! never persisted.

use crate::{
    error::{OrchestratorError, Result},
    models::{TaskState, Transition},
};

impl TaskState {
    /// Returns whether the lifecycle allows moving from `self` to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        use TaskState::*;

        matches!(
            (self, target),
            (Pending, Claimed)
                | (Claimed, InProgress)
                | (InProgress, Validating)
                | (Validating, Completed | Blocked | Failed)
                | (Blocked, Pending)
                | (Claimed | InProgress | Validating, Pending | Failed)
        )
    }
}

/// Rejects a transition that is not in the lifecycle table.
pub fn check_transition(task_id: u64, from: TaskState, to: TaskState) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrchestratorError::IllegalTransition { task_id, from, to })
    }
}

/// Where a recoverable failure or an expired lease sends a task.
///
/// Returns the target state and the retry count to store with it. A task
/// whose budget is spent goes to `failed` with its count unchanged, so the
/// count never exceeds `max_retries`.
pub fn retry_target(retry_count: u32, max_retries: u32) -> (TaskState, u32) {
    if retry_count < max_retries {
        (TaskState::Pending, retry_count + 1)
    } else {
        (TaskState::Failed, retry_count)
    }
}

/// Replays a recorded history and checks that it is a valid path from
/// `pending`.
pub fn validate_history(history: &[Transition]) -> Result<()> {
    let mut current = TaskState::Pending;
    for transition in history {
        if transition.from != current {
            return Err(OrchestratorError::invalid_input("history").with_reason(format!(
                "transition {} starts at {} but the task was {}",
                transition.id,
                transition.from.as_str(),
                current.as_str()
            )));
        }
        check_transition(transition.task_id, transition.from, transition.to)?;
        current = transition.to;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    fn step(id: u64, from: TaskState, to: TaskState) -> Transition {
        Transition {
            id,
            task_id: 7,
            from,
            to,
            actor: "worker-1".to_string(),
            reason: String::new(),
            at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_happy_path_is_allowed() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Claimed));
        assert!(TaskState::Claimed.can_transition_to(TaskState::InProgress));
        assert!(TaskState::InProgress.can_transition_to(TaskState::Validating));
        assert!(TaskState::Validating.can_transition_to(TaskState::Completed));
    }

    #[test]
    fn test_terminal_states_never_move() {
        for target in TaskState::ALL {
            assert!(!TaskState::Completed.can_transition_to(target));
            assert!(!TaskState::Failed.can_transition_to(target));
        }
    }

    #[test]
    fn test_shortcuts_are_rejected() {
        assert!(!TaskState::Pending.can_transition_to(TaskState::Completed));
        assert!(!TaskState::Pending.can_transition_to(TaskState::InProgress));
        assert!(!TaskState::InProgress.can_transition_to(TaskState::Completed));
        assert!(!TaskState::Blocked.can_transition_to(TaskState::Claimed));
        assert!(!TaskState::Claimed.can_transition_to(TaskState::Blocked));

        let err = check_transition(3, TaskState::Pending, TaskState::Completed).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::IllegalTransition {
                task_id: 3,
                from: TaskState::Pending,
                to: TaskState::Completed
            }
        ));
    }

    #[test]
    fn test_leased_states_can_expire() {
        for from in [TaskState::Claimed, TaskState::InProgress, TaskState::Validating] {
            assert!(from.can_transition_to(TaskState::Pending));
            assert!(from.can_transition_to(TaskState::Failed));
        }
    }

    #[test]
    fn test_retry_target_respects_budget() {
        assert_eq!(retry_target(0, 2), (TaskState::Pending, 1));
        assert_eq!(retry_target(1, 2), (TaskState::Pending, 2));
        assert_eq!(retry_target(2, 2), (TaskState::Failed, 2));
        assert_eq!(retry_target(0, 0), (TaskState::Failed, 0));
    }

    #[test]
    fn test_validate_history_accepts_retry_loop() {
        let history = vec![
            step(1, TaskState::Pending, TaskState::Claimed),
            step(2, TaskState::Claimed, TaskState::InProgress),
            step(3, TaskState::InProgress, TaskState::Validating),
            step(4, TaskState::Validating, TaskState::Blocked),
            step(5, TaskState::Blocked, TaskState::Pending),
            step(6, TaskState::Pending, TaskState::Claimed),
            step(7, TaskState::Claimed, TaskState::Pending),
        ];
        assert!(validate_history(&history).is_ok());
        assert!(validate_history(&[]).is_ok());
    }

    #[test]
    fn test_validate_history_rejects_gaps() {
        let history = vec![
            step(1, TaskState::Pending, TaskState::Claimed),
            step(2, TaskState::InProgress, TaskState::Validating),
        ];
        assert!(matches!(
            validate_history(&history),
            Err(OrchestratorError::InvalidInput { .. })
        ));

        let history = vec![step(1, TaskState::Pending, TaskState::Validating)];
        assert!(matches!(
            validate_history(&history),
            Err(OrchestratorError::IllegalTransition { .. })
        ));
    }
}
