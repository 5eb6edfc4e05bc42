//! Deadline set owned by one controller. Nothing here sleeps; the driver
//! asks for the next deadline and calls back when it has passed.

use std::collections::BTreeMap;

/// Every timer the controller may arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Re-validate the binding (coalesced per frame).
    RebindCheck,
    /// Boot window ends.
    BootToSteady,
    /// Next batch slice.
    BatchSlice,
    /// Trailing debounce elapsed.
    Debounce,
    /// Next visual frame.
    Frame,
    /// Periodic catch-up of a latched pending run.
    Flush,
    /// Typing grace ends.
    TypingHold,
    /// Suppression watchdog.
    Watchdog,
}

impl TimerKind {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RebindCheck => "rebind_check",
            Self::BootToSteady => "boot_to_steady",
            Self::BatchSlice => "batch_slice",
            Self::Debounce => "debounce",
            Self::Frame => "frame",
            Self::Flush => "flush",
            Self::TypingHold => "typing_hold",
            Self::Watchdog => "watchdog",
        }
    }
}

/// Armed deadlines, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    deadlines: BTreeMap<TimerKind, u64>,
}

impl TimerSet {
    /// Arm or re-arm `kind` at `at_ms`.
    pub fn arm(&mut self, kind: TimerKind, at_ms: u64) {
        self.deadlines.insert(kind, at_ms);
    }

    /// Arm `kind` unless it is already armed earlier.
    pub fn arm_earliest(&mut self, kind: TimerKind, at_ms: u64) {
        let entry = self.deadlines.entry(kind).or_insert(at_ms);
        *entry = (*entry).min(at_ms);
    }

    /// Disarm `kind`.
    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    /// Disarm everything.
    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    /// True when `kind` is armed.
    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    /// Deadline of `kind`.
    #[must_use]
    pub fn deadline(&self, kind: TimerKind) -> Option<u64> {
        self.deadlines.get(&kind).copied()
    }

    /// Earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().copied().min()
    }

    /// Disarm and return every timer due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<TimerKind> {
        let mut due: Vec<(u64, TimerKind)> = self
            .deadlines
            .iter()
            .filter(|&(_, &at)| at <= now_ms)
            .map(|(&kind, &at)| (at, kind))
            .collect();
        due.sort_unstable();
        for (_, kind) in &due {
            self.deadlines.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }

    /// True when any of `kinds` is armed.
    #[must_use]
    pub fn any_armed(&self, kinds: &[TimerKind]) -> bool {
        kinds.iter().any(|kind| self.is_armed(*kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_timers_come_out_in_deadline_order() {
        let mut timers = TimerSet::default();
        timers.arm(TimerKind::Flush, 30);
        timers.arm(TimerKind::Debounce, 10);
        timers.arm(TimerKind::Frame, 50);
        timers.arm_earliest(TimerKind::Debounce, 40);
        assert_eq!(timers.next_deadline(), Some(10));
        assert_eq!(timers.take_due(30), vec![TimerKind::Debounce, TimerKind::Flush]);
        assert_eq!(timers.next_deadline(), Some(50));
        timers.cancel_all();
        assert!(timers.next_deadline().is_none());
    }
}
