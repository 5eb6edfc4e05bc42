//! Retention planning: which turns to trim and which to bring back.

use omni_types::{RetentionPolicy, StatusSnapshot};

use crate::locator::RenderedTurn;
use crate::thread::Thread;

/// Operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAction {
    /// Hide or replace.
    Trim,
    /// Undo an earlier hide.
    Restore,
}

impl TurnAction {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Restore => "restore",
        }
    }
}

/// One queued operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOp {
    /// What to do.
    pub action: TurnAction,
    /// Target turn.
    pub turn: RenderedTurn,
}

/// Ordered ops plus the expected end state.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPlan {
    /// Trims oldest first, then restores.
    pub ops: Vec<PlannedOp>,
    /// Every turn with the visibility it has once the ops are applied.
    pub final_turns: Vec<RenderedTurn>,
    /// Status to report once applied.
    pub status: StatusSnapshot,
}

impl RetentionPlan {
    /// True when the document already matches the policy.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Compute the plan for `thread` under `policy`.
///
/// Without overflow nothing is trimmed. With overflow every turn before the
/// oldest kept round is trimmed, plus auxiliary turns inside the kept region
/// when `preserve_auxiliary` is off. Turns this engine hid that the policy now
/// keeps are restored; placeholders cannot be.
#[must_use]
pub fn plan_retention(thread: &Thread, policy: &RetentionPolicy) -> RetentionPlan {
    let layout = thread.layout();
    let keep = policy.effective_keep_rounds();
    let cut = layout.cut_index(keep);

    let should_trim = |index: usize, turn: &RenderedTurn| match cut {
        Some(cut) if index < cut => true,
        Some(_) => turn.role.is_auxiliary() && !policy.preserve_auxiliary,
        None => false,
    };

    let mut trims = Vec::new();
    let mut restores = Vec::new();
    let mut final_turns = Vec::with_capacity(thread.turns().len());
    for (index, turn) in thread.turns().iter().enumerate() {
        let trim = should_trim(index, turn);
        let hidden_by_engine = !turn.visible && !turn.placeholder;
        if trim && turn.visible {
            trims.push(PlannedOp {
                action: TurnAction::Trim,
                turn: turn.clone(),
            });
        } else if !trim && hidden_by_engine {
            restores.push(PlannedOp {
                action: TurnAction::Restore,
                turn: turn.clone(),
            });
        }
        let mut after = turn.clone();
        after.visible = !trim && !turn.placeholder;
        final_turns.push(after);
    }

    let visible_rounds = visible_round_count(thread, &final_turns);
    let status = StatusSnapshot::new(thread.round_count(), visible_rounds, keep).with_tier(thread.tier());
    trims.extend(restores);
    RetentionPlan {
        ops: trims,
        final_turns,
        status,
    }
}

fn visible_round_count(thread: &Thread, final_turns: &[RenderedTurn]) -> usize {
    let mut rounds: Vec<usize> = final_turns
        .iter()
        .filter(|turn| turn.visible && !turn.role.is_auxiliary())
        .filter_map(|turn| thread.round_of(turn.sequence_index))
        .collect();
    rounds.dedup();
    rounds.len()
}

#[cfg(test)]
mod tests {
    use omni_types::{ConfidenceTier, Role};

    use super::*;
    use crate::host::NodeRef;
    use crate::locator::LocateResult;

    fn thread(roles: &[(Role, bool)]) -> Thread {
        let turns = roles
            .iter()
            .enumerate()
            .map(|(i, &(role, visible))| RenderedTurn {
                element: NodeRef::new(i as u64 + 1),
                role,
                stable_id: format!("t{i}"),
                sequence_index: i,
                visible,
                placeholder: false,
            })
            .collect();
        Thread::build(LocateResult {
            turns,
            tier: ConfidenceTier::MessageAttributes,
        })
    }

    #[test]
    fn trims_oldest_rounds_only() {
        let t = thread(&[
            (Role::User, true),
            (Role::Assistant, true),
            (Role::User, true),
            (Role::Tool, true),
            (Role::Assistant, true),
        ]);
        let plan = plan_retention(&t, &RetentionPolicy::keeping(1));
        let trimmed: Vec<usize> = plan.ops.iter().map(|op| op.turn.sequence_index).collect();
        assert_eq!(trimmed, vec![0, 1]);
        assert_eq!(plan.status.visible_rounds, 1);
        assert_eq!(plan.status.trimmed_rounds, 1);
    }

    #[test]
    fn auxiliary_in_kept_region_follows_policy() {
        let t = thread(&[
            (Role::User, true),
            (Role::Assistant, true),
            (Role::User, true),
            (Role::Tool, true),
            (Role::Assistant, true),
        ]);
        let policy = RetentionPolicy {
            preserve_auxiliary: false,
            ..RetentionPolicy::keeping(1)
        };
        let plan = plan_retention(&t, &policy);
        let trimmed: Vec<usize> = plan.ops.iter().map(|op| op.turn.sequence_index).collect();
        assert_eq!(trimmed, vec![0, 1, 3]);
    }

    #[test]
    fn relaxed_policy_restores_hidden_turns() {
        let t = thread(&[
            (Role::User, false),
            (Role::Assistant, false),
            (Role::User, true),
            (Role::Assistant, true),
        ]);
        let plan = plan_retention(&t, &RetentionPolicy::keeping(5));
        assert!(plan.ops.iter().all(|op| op.action == TurnAction::Restore));
        assert_eq!(plan.ops.len(), 2);
        assert_eq!(plan.status.visible_rounds, 2);
    }

    #[test]
    fn within_budget_is_a_noop() {
        let t = thread(&[(Role::User, true), (Role::Assistant, true)]);
        assert!(plan_retention(&t, &RetentionPolicy::keeping(3)).is_noop());
    }
}
