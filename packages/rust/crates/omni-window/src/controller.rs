//! Retention Controller: binds to the conversation root, watches it, and
//! decides when to evaluate and apply the retention policy.
//!
//! The controller is a plain state machine. It never sleeps and never spawns;
//! callers feed it [`Event`]s, call [`RetentionController::advance`] once the
//! [`RetentionController::next_deadline`] has passed, and drain
//! [`ControllerOutput`]s. Time is whatever monotonic millisecond clock the
//! caller uses, as long as it is used consistently.

use omni_types::{RetentionPolicy, StatusSnapshot, TrimMode};

use crate::batch::{BatchReport, BatchRun, SliceOutcome};
use crate::binding::{Binding, TeardownReason, find_scope_root};
use crate::config::EngineConfig;
use crate::guards::{GuardReport, StreamingGuard, TypingGuard, is_scrolled_up};
use crate::host::{Host, MutationKind, MutationRecord, NodeRef, ObserverHandle};
use crate::locator::{LocateCost, MessageLocator};
use crate::markers::{CONTROL_ATTR, HIDDEN_ATTR, SHELL_ATTR};
use crate::plan::{RetentionPlan, plan_retention};
use crate::scheduler::{Decision, DecisionInput, LatchReason, Phase, SchedulingMode, Trigger, decide};
use crate::scroll::ScrollAnchor;
use crate::strategy::{StyleLedger, expand};
use crate::suppression::{Suppression, is_engine_echo};
use crate::sweep::{SweepReport, sweep_orphan_controls, sweep_shells};
use crate::thread::Thread;
use crate::timers::{TimerKind, TimerSet};

/// Client-side navigation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// `history.pushState`.
    PushState,
    /// `history.replaceState`.
    ReplaceState,
    /// Back/forward.
    PopState,
    /// Fragment change.
    HashChange,
}

/// Inbound signals.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Observer records for the bound root.
    Mutations(Vec<MutationRecord>),
    /// The user typed in the composer.
    ComposerInput,
    /// The reader scrolled.
    Scroll,
    /// Page-wide structural change outside the bound root.
    DocumentChanged,
    /// Client-side navigation.
    Navigation(NavigationKind),
    /// New policy.
    PolicyChanged(RetentionPolicy),
    /// Evaluate now.
    RunNow,
    /// Restore everything and unbind.
    Teardown,
}

/// Outbound signals.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerOutput {
    /// Bound to a root.
    Bound {
        /// Observed root.
        root: NodeRef,
    },
    /// Binding dropped.
    TornDown {
        /// Why.
        reason: TeardownReason,
    },
    /// A batch finished.
    BatchCompleted(BatchReport),
    /// Evaluation completed.
    Status(StatusSnapshot),
    /// No locator tier recognised the page.
    LayoutNotRecognized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingRun {
    policy: RetentionPolicy,
    forced: bool,
}

impl PendingRun {
    fn merge(existing: Option<Self>, next: Self) -> Self {
        match existing {
            Some(previous) => Self {
                policy: next.policy,
                forced: previous.forced || next.forced,
            },
            None => next,
        }
    }
}

/// Timers that keep the controller busy.
const ACTIVE_TIMERS: [TimerKind; 5] = [
    TimerKind::RebindCheck,
    TimerKind::BatchSlice,
    TimerKind::Debounce,
    TimerKind::Frame,
    TimerKind::Flush,
];

/// Live retention state machine for one document.
#[derive(Debug)]
pub struct RetentionController {
    config: EngineConfig,
    policy: RetentionPolicy,
    phase: Phase,
    binding: Option<Binding>,
    timers: TimerSet,
    suppression: Suppression,
    typing: TypingGuard,
    streaming: StreamingGuard,
    locator: MessageLocator,
    ledger: StyleLedger,
    batch: Option<BatchRun>,
    scheduled: Option<PendingRun>,
    debounce_started_ms: Option<u64>,
    pending: Option<PendingRun>,
    navigated: bool,
    last_action_ms: Option<u64>,
    last_status: Option<StatusSnapshot>,
    evaluations: u64,
    outputs: Vec<ControllerOutput>,
}

impl RetentionController {
    /// Unbound controller.
    #[must_use]
    pub fn new(config: EngineConfig, policy: RetentionPolicy) -> Self {
        Self {
            config,
            policy: policy.normalized(),
            phase: Phase::Idle,
            binding: None,
            timers: TimerSet::default(),
            suppression: Suppression::new(config.suppression_window_ms),
            typing: TypingGuard::new(config.typing_grace_ms),
            streaming: StreamingGuard::default(),
            locator: MessageLocator::new(config.locator_settings()),
            ledger: StyleLedger::default(),
            batch: None,
            scheduled: None,
            debounce_started_ms: None,
            pending: None,
            navigated: false,
            last_action_ms: None,
            last_status: None,
            evaluations: 0,
            outputs: Vec::new(),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Policy in effect.
    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Scheduling mode while bound.
    #[must_use]
    pub fn mode(&self) -> Option<SchedulingMode> {
        self.binding.as_ref().map(|b| b.mode)
    }

    /// Bound root.
    #[must_use]
    pub fn bound_root(&self) -> Option<NodeRef> {
        self.binding.as_ref().map(|b| b.root)
    }

    /// Live observer.
    #[must_use]
    pub fn observer(&self) -> Option<ObserverHandle> {
        self.binding.as_ref().and_then(|b| b.observer)
    }

    /// Last emitted status.
    #[must_use]
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.last_status
    }

    /// Suppression state.
    #[must_use]
    pub fn suppression(&self) -> &Suppression {
        &self.suppression
    }

    /// Completed locate-and-plan passes.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// True while a latched run waits for a flush.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the last evaluation ran.
    #[must_use]
    pub fn last_action_ms(&self) -> Option<u64> {
        self.last_action_ms
    }

    /// Deadline of one timer.
    #[must_use]
    pub fn timer_deadline(&self, kind: TimerKind) -> Option<u64> {
        self.timers.deadline(kind)
    }

    /// Earliest armed timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// True when no batch runs and nothing is scheduled.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.batch.is_none() && !self.timers.any_armed(&ACTIVE_TIMERS)
    }

    /// Take queued outputs.
    pub fn drain_outputs(&mut self) -> Vec<ControllerOutput> {
        std::mem::take(&mut self.outputs)
    }

    /// Bind if not bound yet.
    pub fn start(&mut self, host: &mut dyn Host, now_ms: u64) {
        if self.binding.is_none() {
            self.try_bind(host, now_ms);
        }
    }

    /// Feed one event.
    pub fn handle(&mut self, host: &mut dyn Host, event: Event, now_ms: u64) {
        match event {
            Event::Mutations(records) => self.on_mutations(host, &records, now_ms),
            Event::ComposerInput => {
                self.typing.record_input(now_ms);
                if let Some(until) = self.typing.hold_until() {
                    self.timers.arm(TimerKind::TypingHold, until);
                }
            }
            Event::Scroll => {
                if self.pending.is_some() && !is_scrolled_up(host, self.config.scroll_pin_threshold_px) {
                    self.timers.arm_earliest(TimerKind::Flush, now_ms);
                }
            }
            Event::DocumentChanged => self.schedule_rebind_check(now_ms),
            Event::Navigation(kind) => {
                tracing::debug!(event = "window.controller.navigation", kind = ?kind, "navigation observed");
                self.navigated = true;
                self.locator.invalidate_all();
                self.schedule_rebind_check(now_ms);
            }
            Event::PolicyChanged(policy) => self.set_policy(host, policy, now_ms),
            Event::RunNow => self.run_now(host, now_ms),
            Event::Teardown => self.teardown(host, now_ms),
        }
    }

    /// Run every timer due at `now_ms`.
    pub fn advance(&mut self, host: &mut dyn Host, now_ms: u64) {
        for _ in 0..self.config.max_timer_iterations {
            let due = self.timers.take_due(now_ms);
            if due.is_empty() {
                return;
            }
            for kind in due {
                tracing::trace!(event = "window.controller.timer", timer = kind.as_str(), now_ms, "timer fired");
                self.on_timer(host, kind, now_ms);
            }
        }
        tracing::warn!(
            event = "window.controller.timer_cap",
            cap = self.config.max_timer_iterations,
            "timer iteration cap reached; deferring remaining timers"
        );
    }

    /// Pull queued records from hosts that buffer them.
    pub fn pump(&mut self, host: &mut dyn Host, now_ms: u64) {
        let Some(observer) = self.observer() else {
            return;
        };
        let records = host.take_records(observer);
        if !records.is_empty() {
            self.on_mutations(host, &records, now_ms);
        }
    }

    /// Replace the policy. Disabling restores every trimmed turn and unbinds.
    pub fn set_policy(&mut self, host: &mut dyn Host, policy: RetentionPolicy, now_ms: u64) {
        let policy = policy.normalized();
        let previous = std::mem::replace(&mut self.policy, policy);
        tracing::info!(
            event = "window.controller.policy_changed",
            keep_rounds = policy.keep_rounds,
            enabled = policy.enabled,
            trim_mode = policy.trim_mode.as_str(),
            "retention policy updated"
        );
        if !policy.enabled {
            if self.binding.is_some() {
                self.restore_all(host, now_ms);
                self.unbind(host, TeardownReason::Disabled);
            }
            return;
        }
        if self.binding.is_none() {
            self.try_bind(host, now_ms);
            return;
        }
        if policy != previous {
            self.request(host, Trigger::PolicyChanged, PendingRun { policy, forced: true }, now_ms);
        }
    }

    /// Forced evaluation, binding first when needed.
    pub fn run_now(&mut self, host: &mut dyn Host, now_ms: u64) {
        if self.binding.is_none() {
            self.try_bind(host, now_ms);
            return;
        }
        let run = PendingRun {
            policy: self.policy,
            forced: true,
        };
        self.request(host, Trigger::RunNow, run, now_ms);
    }

    /// Restore every turn this engine collapsed, then unbind.
    pub fn teardown(&mut self, host: &mut dyn Host, now_ms: u64) {
        self.restore_all(host, now_ms);
        self.unbind(host, TeardownReason::Requested);
    }

    fn current_run(&self, forced: bool) -> PendingRun {
        PendingRun {
            policy: self.policy,
            forced,
        }
    }

    fn on_mutations(&mut self, host: &mut dyn Host, records: &[MutationRecord], now_ms: u64) {
        let Some(root) = self.bound_root() else {
            return;
        };
        let genuine: Vec<&MutationRecord> = records
            .iter()
            .filter(|record| !is_engine_echo(&*host, record))
            .collect();
        if genuine.is_empty() {
            tracing::trace!(
                event = "window.controller.echo_dropped",
                records = records.len(),
                "mutation batch was our own echo"
            );
            return;
        }
        if genuine
            .iter()
            .any(|r| matches!(r.kind, MutationKind::ChildList { .. }))
        {
            self.locator.invalidate_all();
        }
        if !host.is_connected(root) {
            self.schedule_rebind_check(now_ms);
            return;
        }
        self.request(host, Trigger::Mutation, self.current_run(false), now_ms);
    }

    fn on_timer(&mut self, host: &mut dyn Host, kind: TimerKind, now_ms: u64) {
        match kind {
            TimerKind::RebindCheck => self.rebind_check(host, now_ms),
            TimerKind::BootToSteady => {
                if let Some(binding) = self.binding.as_mut() {
                    binding.mode = SchedulingMode::Steady;
                    tracing::info!(
                        event = "window.controller.steady",
                        root = %binding.root,
                        "boot window over; switching to steady scheduling"
                    );
                }
            }
            TimerKind::BatchSlice => self.continue_batch(host, now_ms),
            TimerKind::Debounce => {
                self.debounce_started_ms = None;
                let run = self.scheduled.unwrap_or_else(|| self.current_run(false));
                self.request(host, Trigger::DebounceElapsed, run, now_ms);
            }
            TimerKind::Frame => {
                let run = self.scheduled.unwrap_or_else(|| self.current_run(false));
                self.request(host, Trigger::Frame, run, now_ms);
            }
            TimerKind::Flush => self.flush(host, now_ms),
            TimerKind::TypingHold => {
                if !self.typing.is_holding(now_ms) {
                    self.flush(host, now_ms);
                }
            }
            TimerKind::Watchdog => {
                if !self.suppression.watchdog(now_ms) && self.suppression.refcount() > 0 {
                    self.timers
                        .arm(TimerKind::Watchdog, self.suppression.window_until_ms());
                }
            }
        }
    }

    fn request(&mut self, host: &mut dyn Host, trigger: Trigger, run: PendingRun, now_ms: u64) {
        let sample = self.streaming.sample(host);
        let (trigger, run) = if sample.finished {
            (Trigger::StreamFinished, PendingRun { forced: true, ..run })
        } else {
            (trigger, run)
        };
        let guards = GuardReport {
            enabled: run.policy.enabled && self.policy.enabled,
            streaming: sample.streaming,
            suppressed: self.suppression.is_active(now_ms),
            typing: self.typing.is_holding(now_ms),
            scrolled_up: run.policy.pause_when_scrolled_up
                && is_scrolled_up(host, self.config.scroll_pin_threshold_px),
        };
        let input = DecisionInput {
            phase: self.phase,
            mode: self.mode().unwrap_or_default(),
            trigger,
            forced: run.forced,
            guards,
        };
        let decision = decide(&input);
        tracing::trace!(
            event = "window.controller.decision",
            trigger = trigger.as_str(),
            phase = self.phase.as_str(),
            decision = ?decision,
            "scheduling decision"
        );
        match decision {
            Decision::Ignore => {}
            Decision::Latch(reason) => self.latch(run, reason, now_ms),
            Decision::EvaluateNow => self.evaluate(host, run, now_ms),
            Decision::Debounce => self.debounce(run, now_ms),
            Decision::AwaitFrame => {
                self.scheduled = Some(PendingRun::merge(self.scheduled, run));
                self.timers
                    .arm_earliest(TimerKind::Frame, self.config.next_frame(now_ms));
            }
        }
    }

    fn debounce(&mut self, run: PendingRun, now_ms: u64) {
        self.scheduled = Some(PendingRun::merge(self.scheduled, run));
        if self.timers.is_armed(TimerKind::Frame) {
            return;
        }
        let first = *self.debounce_started_ms.get_or_insert(now_ms);
        let at = now_ms
            .saturating_add(self.config.debounce_ms)
            .min(first.saturating_add(self.config.debounce_max_wait_ms))
            .max(now_ms);
        self.timers.arm(TimerKind::Debounce, at);
    }

    fn latch(&mut self, run: PendingRun, reason: LatchReason, now_ms: u64) {
        let run = match self.scheduled.take() {
            Some(scheduled) => PendingRun::merge(Some(scheduled), run),
            None => run,
        };
        self.pending = Some(PendingRun::merge(self.pending, run));
        if !self.timers.is_armed(TimerKind::Flush) {
            self.timers
                .arm(TimerKind::Flush, now_ms.saturating_add(self.config.flush_interval_ms));
        }
        tracing::debug!(
            event = "window.controller.latched",
            reason = reason.as_str(),
            forced = run.forced,
            "evaluation latched for catch-up"
        );
    }

    fn flush(&mut self, host: &mut dyn Host, now_ms: u64) {
        let Some(run) = self.pending.take() else {
            return;
        };
        tracing::debug!(event = "window.controller.flush", "flushing latched evaluation");
        self.request(host, Trigger::Flush, PendingRun { forced: true, ..run }, now_ms);
    }

    fn evaluate(&mut self, host: &mut dyn Host, run: PendingRun, now_ms: u64) {
        let Some((root, mode)) = self.binding.as_ref().map(|b| (b.root, b.mode)) else {
            return;
        };
        if !host.is_connected(root) {
            self.pending = Some(PendingRun::merge(self.pending, run));
            self.schedule_rebind_check(now_ms);
            return;
        }
        self.scheduled = None;
        self.debounce_started_ms = None;
        self.timers.cancel(TimerKind::Debounce);
        self.timers.cancel(TimerKind::Frame);

        let cost = match mode {
            SchedulingMode::Boot => LocateCost::Cheap,
            SchedulingMode::Steady => LocateCost::Full,
        };
        let located = self.locator.locate(host, root, now_ms, cost);
        self.evaluations += 1;
        self.last_action_ms = Some(now_ms);

        if located.is_unrecognized() {
            self.report_unrecognized(run.policy);
            return;
        }
        if let Some(binding) = self.binding.as_mut() {
            binding.unrecognized_reported = false;
        }
        if located.turns.len() < self.config.min_turns {
            tracing::debug!(
                event = "window.controller.deferred",
                turns = located.turns.len(),
                "too few turns located; deferring"
            );
            return;
        }

        let thread = Thread::build(located);
        let plan = plan_retention(&thread, &run.policy);
        tracing::debug!(
            event = "window.controller.evaluated",
            mode = mode.as_str(),
            tier = thread.tier().as_str(),
            turns = thread.turns().len(),
            total_rounds = plan.status.total_rounds,
            ops = plan.ops.len(),
            forced = run.forced,
            "retention evaluated"
        );
        if plan.is_noop() {
            self.reconcile_leftovers(host, &plan, run.policy.trim_mode);
            self.emit_status(plan.status);
            return;
        }
        self.start_batch(host, plan, run, now_ms);
    }

    fn report_unrecognized(&mut self, policy: RetentionPolicy) {
        if let Some(binding) = self.binding.as_mut()
            && !binding.unrecognized_reported
        {
            binding.unrecognized_reported = true;
            tracing::warn!(
                event = "window.locator.layout_unrecognized",
                root = %binding.root,
                "no locator tier recognised the conversation; leaving it untouched"
            );
            self.outputs.push(ControllerOutput::LayoutNotRecognized);
        }
        self.emit_status(StatusSnapshot::unrecognized(policy.effective_keep_rounds()));
    }

    fn start_batch(&mut self, host: &mut dyn Host, plan: RetentionPlan, run: PendingRun, now_ms: u64) {
        let ticket = self.suppression.begin(now_ms);
        self.timers
            .arm(TimerKind::Watchdog, self.suppression.window_until_ms());

        let scroll = ScrollAnchor::capture(host, self.config.scroll_pin_threshold_px);
        tracing::info!(
            event = "window.batch.started",
            ops = plan.ops.len(),
            trim_mode = run.policy.trim_mode.as_str(),
            keep_rounds = run.policy.keep_rounds,
            "applying retention batch"
        );
        self.batch = Some(BatchRun::new(plan, run.policy.trim_mode, scroll, ticket));
        self.phase = Phase::Applying;
        self.continue_batch(host, now_ms);
    }

    fn continue_batch(&mut self, host: &mut dyn Host, now_ms: u64) {
        if self.batch.is_none() {
            return;
        }
        // Records queued since the previous slice are the host's; they latch a catch-up.
        self.pump(host, now_ms);
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        self.suppression.extend(now_ms);
        self.timers
            .arm(TimerKind::Watchdog, self.suppression.window_until_ms());
        let outcome = batch.run_slice(host, &mut self.ledger, self.config.slice_budget_ms);
        self.discard_own_records(host);
        match outcome {
            SliceOutcome::Pending => {
                self.timers.arm(
                    TimerKind::BatchSlice,
                    now_ms.saturating_add(self.config.slice_gap_ms.max(1)),
                );
            }
            SliceOutcome::Drained => self.finish_batch(host, now_ms),
        }
    }

    fn finish_batch(&mut self, host: &mut dyn Host, now_ms: u64) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        let Some(root) = self.bound_root() else {
            return;
        };
        let finished = batch.finish(host, &mut self.ledger, root);
        self.discard_own_records(host);
        self.suppression.end(finished.ticket);
        if self.suppression.refcount() == 0 {
            self.timers.cancel(TimerKind::Watchdog);
        }
        self.locator.invalidate_all();
        self.phase = Phase::Bound;

        let report = finished.report;
        tracing::info!(
            event = "window.batch.completed",
            applied = report.applied,
            skipped_stale = report.skipped_stale,
            failed = report.failed,
            slices = report.slices,
            shells_collapsed = report.shells_collapsed,
            controls_hidden = report.controls_hidden,
            visible_rounds = finished.status.visible_rounds,
            total_rounds = finished.status.total_rounds,
            "retention batch completed"
        );
        self.outputs.push(ControllerOutput::BatchCompleted(report));
        self.emit_status(finished.status);
        if self.pending.is_some() {
            self.timers.arm_earliest(
                TimerKind::Flush,
                now_ms.saturating_add(self.config.flush_interval_ms),
            );
        }
    }

    /// Drop records written by the engine itself since the last drain.
    ///
    /// Slices and sweeps run synchronously, so everything queued right after
    /// one of them is ours.
    fn discard_own_records(&mut self, host: &mut dyn Host) {
        let Some(observer) = self.observer() else {
            return;
        };
        let own = host.take_records(observer);
        if !own.is_empty() {
            tracing::trace!(
                event = "window.controller.echo_dropped",
                records = own.len(),
                "dropped records of our own writes"
            );
        }
    }

    /// Re-run the shell and control sweeps after an evaluation that needed no ops.
    ///
    /// A reply can arrive inside a shell without changing the round layout.
    fn reconcile_leftovers(&mut self, host: &mut dyn Host, plan: &RetentionPlan, mode: TrimMode) {
        let Some(root) = self.bound_root() else {
            return;
        };
        if self.ledger.is_empty() {
            return;
        }
        let shells = if mode == TrimMode::Hide {
            sweep_shells(host, &mut self.ledger, &plan.final_turns)
        } else {
            SweepReport::default()
        };
        let controls = sweep_orphan_controls(host, &mut self.ledger, root, &plan.final_turns);
        self.discard_own_records(host);
        self.ledger.prune_detached(&*host);
        let changed = shells.collapsed + shells.restored + controls.collapsed + controls.restored;
        if changed > 0 {
            tracing::debug!(
                event = "window.sweep.reconciled",
                shells_collapsed = shells.collapsed,
                shells_restored = shells.restored,
                controls_hidden = controls.collapsed,
                controls_restored = controls.restored,
                "shells and controls reconciled without a batch"
            );
        }
    }

    fn emit_status(&mut self, status: StatusSnapshot) {
        self.last_status = Some(status);
        self.outputs.push(ControllerOutput::Status(status));
    }

    fn schedule_rebind_check(&mut self, now_ms: u64) {
        self.timers
            .arm_earliest(TimerKind::RebindCheck, self.config.next_frame(now_ms));
    }

    fn rebind_check(&mut self, host: &mut dyn Host, now_ms: u64) {
        let applying = self.phase == Phase::Applying;
        let navigated = std::mem::take(&mut self.navigated);
        let reason = self
            .binding
            .as_ref()
            .and_then(|b| b.staleness(&*host, navigated, applying));
        if let Some(reason) = reason {
            self.unbind(host, reason);
            self.try_bind(host, now_ms);
        } else if self.binding.is_none() {
            self.try_bind(host, now_ms);
        }
    }

    fn try_bind(&mut self, host: &mut dyn Host, now_ms: u64) {
        if !self.policy.enabled {
            return;
        }
        let Some(root) = find_scope_root(host) else {
            tracing::debug!(event = "window.controller.no_root", "no conversation root found");
            return;
        };
        let observer = match host.observe(root) {
            Ok(observer) => observer,
            Err(err) => {
                tracing::warn!(
                    event = "window.controller.observe_failed",
                    root = %root,
                    error = %err,
                    "could not observe conversation root"
                );
                return;
            }
        };
        self.binding = Some(Binding::new(root, observer, now_ms));
        self.phase = Phase::Bound;
        self.timers.arm(
            TimerKind::BootToSteady,
            now_ms.saturating_add(self.config.boot_window_ms),
        );
        tracing::info!(event = "window.controller.bound", root = %root, "bound to conversation root");
        self.outputs.push(ControllerOutput::Bound { root });
        self.request(host, Trigger::Bind, self.current_run(false), now_ms);
    }

    fn unbind(&mut self, host: &mut dyn Host, reason: TeardownReason) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        if let Some(observer) = binding.observer {
            host.disconnect(observer);
        }
        self.timers.cancel_all();
        self.locator.invalidate_all();
        self.batch = None;
        self.scheduled = None;
        self.pending = None;
        self.debounce_started_ms = None;
        self.suppression.reset();
        self.streaming.reset();
        self.phase = Phase::Idle;
        tracing::info!(
            event = "window.controller.torn_down",
            root = %binding.root,
            reason = reason.as_str(),
            "binding torn down"
        );
        self.outputs.push(ControllerOutput::TornDown { reason });
    }

    fn restore_all(&mut self, host: &mut dyn Host, now_ms: u64) {
        let Some(root) = self.bound_root() else {
            return;
        };
        self.batch = None;
        let ticket = self.suppression.begin(now_ms);
        if let Some(observer) = self.binding.as_mut().and_then(|b| b.observer.take()) {
            host.disconnect(observer);
        }
        let mut restored = 0usize;
        let mut failed = 0usize;
        if host.is_connected(root) {
            for node in host.descendants(root) {
                for marker in [HIDDEN_ATTR, SHELL_ATTR, CONTROL_ATTR] {
                    match expand(host, &mut self.ledger, node, marker) {
                        Ok(true) => restored += 1,
                        Ok(false) => {}
                        Err(err) => {
                            failed += 1;
                            tracing::warn!(
                                event = "window.controller.restore_failed",
                                node = %node,
                                error = %err,
                                "could not restore element"
                            );
                        }
                    }
                }
            }
        }
        self.suppression.end(ticket);
        self.locator.invalidate_all();
        tracing::info!(
            event = "window.controller.restored",
            restored,
            failed,
            "restored every element this engine collapsed"
        );
    }
}
