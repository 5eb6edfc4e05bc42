//! Round accounting shared by the payload pruner and the view engine.
//!
//! Both layers must count rounds identically, so the counting rule lives here
//! once: a round starts at every user turn; when a sequence has no user turn at
//! all, every visible (non-auxiliary) turn is its own round.

use crate::{Role, clamp_keep_rounds};

/// Index layout of an ordered role sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundLayout {
    delimiters: Vec<usize>,
    visible: Vec<usize>,
    auxiliary: Vec<usize>,
    len: usize,
}

impl RoundLayout {
    /// Classify an ordered sequence of roles (oldest first).
    pub fn from_roles<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        let mut layout = Self::default();
        for (index, role) in roles.into_iter().enumerate() {
            if role.is_auxiliary() {
                layout.auxiliary.push(index);
            } else {
                layout.visible.push(index);
                if role.is_delimiter() {
                    layout.delimiters.push(index);
                }
            }
            layout.len = index + 1;
        }
        layout
    }

    /// Number of entries classified.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing was classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices of user turns.
    #[must_use]
    pub fn delimiters(&self) -> &[usize] {
        &self.delimiters
    }

    /// Indices of non-auxiliary turns.
    #[must_use]
    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    /// True when at least one auxiliary entry is present.
    #[must_use]
    pub fn has_auxiliary(&self) -> bool {
        !self.auxiliary.is_empty()
    }

    /// Delimiter count, or visible count when there are no delimiters.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.round_starts().len()
    }

    /// No user turn, and an auxiliary entry precedes the first visible one.
    ///
    /// Trimming such a sequence is ambiguous; callers leave it untouched.
    #[must_use]
    pub fn has_undelimited_auxiliary_prefix(&self) -> bool {
        if !self.delimiters.is_empty() {
            return false;
        }
        match (self.auxiliary.first(), self.visible.first()) {
            (Some(aux), Some(vis)) => aux < vis,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Index where the oldest kept round starts, or `None` when nothing overflows.
    ///
    /// `keep_rounds` is clamped into `1..=100`.
    #[must_use]
    pub fn cut_index(&self, keep_rounds: usize) -> Option<usize> {
        let keep = clamp_keep_rounds(keep_rounds);
        let count = self.round_count();
        if count <= keep || self.has_undelimited_auxiliary_prefix() {
            return None;
        }
        self.round_starts().get(count - keep).copied()
    }

    /// Rounds that remain after keeping `keep_rounds`.
    #[must_use]
    pub fn rounds_kept(&self, keep_rounds: usize) -> usize {
        if self.cut_index(keep_rounds).is_some() {
            clamp_keep_rounds(keep_rounds)
        } else {
            self.round_count()
        }
    }

    /// Zero-based round containing `index`; `None` for entries before the first round.
    #[must_use]
    pub fn round_of(&self, index: usize) -> Option<usize> {
        match self.round_starts().partition_point(|&start| start <= index) {
            0 => None,
            n => Some(n - 1),
        }
    }

    fn round_starts(&self) -> &[usize] {
        if self.delimiters.is_empty() {
            &self.visible
        } else {
            &self.delimiters
        }
    }
}
