//! Execution Batcher: time-sliced application of a retention plan.
//!
//! Ops run oldest first in slices bounded by the host clock. Every op checks
//! liveness before touching the document; nodes the host removed meanwhile
//! are counted and skipped, and host write errors never stop the batch.

use std::collections::VecDeque;

use omni_types::{StatusSnapshot, TrimMode};

use crate::host::{Host, NodeRef};
use crate::plan::{PlannedOp, RetentionPlan, TurnAction};
use crate::scroll::ScrollAnchor;
use crate::strategy::{StyleLedger, TrimOutcome, TrimStrategy, strategy_for};
use crate::suppression::SuppressionTicket;
use crate::sweep::{sweep_orphan_controls, sweep_shells};

/// Slice result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Ops remain; schedule another slice.
    Pending,
    /// Queue empty; call [`BatchRun::finish`].
    Drained,
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Ops that changed the document.
    pub applied: usize,
    /// Ops already in the requested state.
    pub already_applied: usize,
    /// Ops whose node the host removed.
    pub skipped_stale: usize,
    /// Host write failures.
    pub failed: usize,
    /// Restores the strategy cannot perform.
    pub unsupported: usize,
    /// Slices used.
    pub slices: usize,
    /// Shells collapsed.
    pub shells_collapsed: usize,
    /// Shells expanded again.
    pub shells_restored: usize,
    /// Orphan controls collapsed.
    pub controls_hidden: usize,
    /// Orphan controls expanded again.
    pub controls_restored: usize,
}

/// Everything the controller needs once a batch is finished.
#[derive(Debug)]
pub struct FinishedBatch {
    /// Counters.
    pub report: BatchReport,
    /// Status of the plan that was applied.
    pub status: StatusSnapshot,
    /// Suppression ticket to return.
    pub ticket: SuppressionTicket,
}

/// One in-flight batch.
#[derive(Debug)]
pub struct BatchRun {
    queue: VecDeque<PlannedOp>,
    final_turns: Vec<crate::locator::RenderedTurn>,
    status: StatusSnapshot,
    mode: TrimMode,
    scroll: Option<ScrollAnchor>,
    ticket: SuppressionTicket,
    report: BatchReport,
}

impl BatchRun {
    /// Start a batch for `plan`.
    #[must_use]
    pub fn new(
        plan: RetentionPlan,
        mode: TrimMode,
        scroll: Option<ScrollAnchor>,
        ticket: SuppressionTicket,
    ) -> Self {
        Self {
            queue: plan.ops.into(),
            final_turns: plan.final_turns,
            status: plan.status,
            mode,
            scroll,
            ticket,
            report: BatchReport::default(),
        }
    }

    /// Ops still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Counters so far.
    #[must_use]
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// Apply ops until the queue drains or `budget_ms` of host time is spent.
    /// At least one op runs per slice.
    pub fn run_slice(
        &mut self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        budget_ms: u64,
    ) -> SliceOutcome {
        let strategy = strategy_for(self.mode);
        let started = host.now_ms();
        self.report.slices += 1;
        while let Some(op) = self.queue.pop_front() {
            self.apply(host, strategy, ledger, &op);
            if self.queue.is_empty() {
                break;
            }
            if host.now_ms().saturating_sub(started) >= budget_ms {
                tracing::trace!(
                    event = "window.batch.slice_yield",
                    remaining = self.queue.len(),
                    "slice budget spent; yielding"
                );
                return SliceOutcome::Pending;
            }
        }
        SliceOutcome::Drained
    }

    fn apply(
        &mut self,
        host: &mut dyn Host,
        strategy: &dyn TrimStrategy,
        ledger: &mut StyleLedger,
        op: &PlannedOp,
    ) {
        if !op.turn.is_live(host) {
            tracing::debug!(
                event = "window.batch.skip_stale",
                turn = %op.turn.stable_id,
                action = op.action.as_str(),
                "turn detached before it could be processed"
            );
            self.report.skipped_stale += 1;
            return;
        }
        let result = match op.action {
            TurnAction::Trim => strategy.trim(host, ledger, &op.turn),
            TurnAction::Restore => strategy.restore(host, ledger, &op.turn),
        };
        match result {
            Ok(TrimOutcome::Applied) => self.report.applied += 1,
            Ok(TrimOutcome::AlreadyApplied) => self.report.already_applied += 1,
            Ok(TrimOutcome::Unsupported) => self.report.unsupported += 1,
            Err(err) => {
                tracing::warn!(
                    event = "window.batch.op_failed",
                    turn = %op.turn.stable_id,
                    action = op.action.as_str(),
                    error = %err,
                    "host write failed; continuing batch"
                );
                self.report.failed += 1;
            }
        }
    }

    /// Sweep, restore scroll and hand back the ticket.
    pub fn finish(
        mut self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        scope: NodeRef,
    ) -> FinishedBatch {
        if self.mode == TrimMode::Hide {
            let shells = sweep_shells(host, ledger, &self.final_turns);
            self.report.shells_collapsed = shells.collapsed;
            self.report.shells_restored = shells.restored;
            self.report.failed += shells.failed;
        }
        if host.is_connected(scope) {
            let controls = sweep_orphan_controls(host, ledger, scope, &self.final_turns);
            self.report.controls_hidden = controls.collapsed;
            self.report.controls_restored = controls.restored;
            self.report.failed += controls.failed;
        }
        if let Some(anchor) = self.scroll
            && let Err(err) = anchor.restore(host)
        {
            tracing::warn!(event = "window.scroll.restore_failed", error = %err, "scroll restore failed");
        }
        ledger.prune_detached(host);
        FinishedBatch {
            report: self.report,
            status: self.status,
            ticket: self.ticket,
        }
    }
}
