//! Pure scheduling decision. The controller gathers the inputs, this maps
//! them to what should happen next, the controller acts on the answer.

use crate::guards::{GuardBlock, GuardReport};

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not bound to any root.
    #[default]
    Idle,
    /// Bound and observing.
    Bound,
    /// A batch is being applied.
    Applying,
}

impl Phase {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Bound => "bound",
            Self::Applying => "applying",
        }
    }
}

/// Scheduling mode while bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingMode {
    /// First moments after binding: evaluate synchronously, cheap locating.
    #[default]
    Boot,
    /// Debounced and frame-aligned.
    Steady,
}

impl SchedulingMode {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Steady => "steady",
        }
    }
}

/// What asked for an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Just bound to a root.
    Bind,
    /// Genuine host mutation.
    Mutation,
    /// Debounce window elapsed.
    DebounceElapsed,
    /// Frame boundary reached.
    Frame,
    /// Periodic catch-up of a latched run.
    Flush,
    /// Streaming just finished.
    StreamFinished,
    /// Policy changed.
    PolicyChanged,
    /// Explicit request.
    RunNow,
}

impl Trigger {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "bind",
            Self::Mutation => "mutation",
            Self::DebounceElapsed => "debounce_elapsed",
            Self::Frame => "frame",
            Self::Flush => "flush",
            Self::StreamFinished => "stream_finished",
            Self::PolicyChanged => "policy_changed",
            Self::RunNow => "run_now",
        }
    }
}

/// Why a run was latched instead of executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchReason {
    /// A batch is in flight.
    Applying,
    /// A guard blocked.
    Guard(GuardBlock),
}

impl LatchReason {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applying => "applying",
            Self::Guard(block) => block.as_str(),
        }
    }
}

/// Scheduling answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    Ignore,
    /// Remember the run and retry on the next flush.
    Latch(LatchReason),
    /// Evaluate immediately.
    EvaluateNow,
    /// Start or extend the trailing debounce.
    Debounce,
    /// Evaluate at the next frame boundary.
    AwaitFrame,
}

/// Everything [`decide`] looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionInput {
    /// Current phase.
    pub phase: Phase,
    /// Current mode.
    pub mode: SchedulingMode,
    /// What asked.
    pub trigger: Trigger,
    /// Forced runs skip the scroll guard.
    pub forced: bool,
    /// Guard snapshot.
    pub guards: GuardReport,
}

/// Map inputs to a decision.
#[must_use]
pub fn decide(input: &DecisionInput) -> Decision {
    match input.phase {
        Phase::Idle => return Decision::Ignore,
        Phase::Applying => return Decision::Latch(LatchReason::Applying),
        Phase::Bound => {}
    }
    match input.guards.blocker(input.forced) {
        Some(GuardBlock::Disabled) => return Decision::Ignore,
        Some(block) => return Decision::Latch(LatchReason::Guard(block)),
        None => {}
    }
    match (input.mode, input.trigger) {
        (SchedulingMode::Steady, Trigger::Mutation) => Decision::Debounce,
        (SchedulingMode::Steady, Trigger::DebounceElapsed) => Decision::AwaitFrame,
        _ => Decision::EvaluateNow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(phase: Phase, mode: SchedulingMode, trigger: Trigger) -> DecisionInput {
        DecisionInput {
            phase,
            mode,
            trigger,
            forced: false,
            guards: GuardReport {
                enabled: true,
                ..GuardReport::default()
            },
        }
    }

    #[test]
    fn boot_evaluates_mutations_synchronously() {
        let i = input(Phase::Bound, SchedulingMode::Boot, Trigger::Mutation);
        assert_eq!(decide(&i), Decision::EvaluateNow);
    }

    #[test]
    fn steady_debounces_then_waits_for_a_frame() {
        let i = input(Phase::Bound, SchedulingMode::Steady, Trigger::Mutation);
        assert_eq!(decide(&i), Decision::Debounce);
        let i = DecisionInput {
            trigger: Trigger::DebounceElapsed,
            ..i
        };
        assert_eq!(decide(&i), Decision::AwaitFrame);
        let i = DecisionInput {
            trigger: Trigger::Frame,
            ..i
        };
        assert_eq!(decide(&i), Decision::EvaluateNow);
    }

    #[test]
    fn guards_latch_and_busy_phase_latches() {
        let mut i = input(Phase::Bound, SchedulingMode::Steady, Trigger::Mutation);
        i.guards.streaming = true;
        assert_eq!(
            decide(&i),
            Decision::Latch(LatchReason::Guard(GuardBlock::Streaming))
        );
        i.phase = Phase::Applying;
        assert_eq!(decide(&i), Decision::Latch(LatchReason::Applying));
        i.phase = Phase::Idle;
        assert_eq!(decide(&i), Decision::Ignore);
    }
}
