//! Mutation suppression around the engine's own writes.
//!
//! Suppression is a reference count plus a time-boxed window. Overlapping
//! batches each hold a ticket; observation of host mutations only counts as
//! genuine again once every ticket is returned and the window has expired.
//! A watchdog clears a refcount stuck past its window and bumps the
//! generation so late tickets are ignored.

use crate::host::{Host, MutationKind, MutationRecord};
use crate::markers::{PLACEHOLDER_ATTR, STYLE_ATTR, is_engine_attr};

/// Proof of one `begin`. Return it with [`Suppression::end`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a suppression ticket must be returned with Suppression::end"]
pub struct SuppressionTicket {
    generation: u64,
}

/// Refcounted suppression state.
#[derive(Debug, Clone)]
pub struct Suppression {
    window_ms: u64,
    refcount: u32,
    window_until_ms: u64,
    generation: u64,
}

impl Suppression {
    /// Suppression with a `window_ms` safety window.
    #[must_use]
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            refcount: 0,
            window_until_ms: 0,
            generation: 0,
        }
    }

    /// Enter a suppressed section.
    pub fn begin(&mut self, now_ms: u64) -> SuppressionTicket {
        self.refcount = self.refcount.saturating_add(1);
        self.extend(now_ms);
        SuppressionTicket {
            generation: self.generation,
        }
    }

    /// Push the window out while a long operation runs.
    pub fn extend(&mut self, now_ms: u64) {
        self.window_until_ms = self.window_until_ms.max(now_ms.saturating_add(self.window_ms));
    }

    /// Leave a suppressed section. Returns false for tickets from before a watchdog reset.
    pub fn end(&mut self, ticket: SuppressionTicket) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                event = "window.suppression.stale_ticket",
                ticket_generation = ticket.generation,
                generation = self.generation,
                "ignoring suppression ticket from a previous generation"
            );
            return false;
        }
        self.refcount = self.refcount.saturating_sub(1);
        true
    }

    /// True while any section is open or the window has not expired.
    #[must_use]
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.refcount > 0 || now_ms < self.window_until_ms
    }

    /// Open sections.
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// End of the current window.
    #[must_use]
    pub fn window_until_ms(&self) -> u64 {
        self.window_until_ms
    }

    /// Ticket generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clear a refcount stuck past its window. Returns true when it fired.
    pub fn watchdog(&mut self, now_ms: u64) -> bool {
        if self.refcount == 0 || now_ms < self.window_until_ms {
            return false;
        }
        tracing::warn!(
            event = "window.suppression.watchdog_reset",
            refcount = self.refcount,
            generation = self.generation,
            "suppression window expired with open sections; resetting"
        );
        self.refcount = 0;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    /// Drop all state; outstanding tickets become stale.
    pub fn reset(&mut self) {
        self.refcount = 0;
        self.window_until_ms = 0;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// True when `record` is explained entirely by the engine's own writes.
#[must_use]
pub fn is_engine_echo(host: &dyn Host, record: &MutationRecord) -> bool {
    match &record.kind {
        MutationKind::Attribute { name } if is_engine_attr(name) => true,
        MutationKind::Attribute { name } if name == STYLE_ATTR => {
            crate::markers::ENGINE_ATTRS
                .iter()
                .any(|attr| host.has_attribute(record.target, attr))
        }
        MutationKind::ChildList { added, .. } => {
            !added.is_empty()
                && added
                    .iter()
                    .all(|&node| host.has_attribute(node, PLACEHOLDER_ATTR))
        }
        MutationKind::Attribute { .. } | MutationKind::CharacterData => false,
    }
}
