//! omni-window: live view retention engine.
//!
//! Converges an already-rendered, continuously mutating conversation to a
//! retention policy without reloading it. The document is foreign: it is only
//! reached through the [`Host`] trait, and every handle is re-validated before
//! use.
//!
//! Pipeline: [`MessageLocator`] finds rendered turns, [`Thread`] orders and
//! tags them, [`plan_retention`] picks what to trim or restore, and the
//! [`RetentionController`] decides when that may happen and hands the plan to
//! a time-sliced [`BatchRun`]. [`run_controller`] drives it all on tokio time.

mod batch;
mod binding;
mod classify;
mod config;
mod controller;
mod document;
mod driver;
mod guards;
mod host;
mod locator;
pub mod markers;
mod plan;
mod scheduler;
mod scroll;
mod selector;
mod strategy;
mod suppression;
mod sweep;
mod thread;
mod timers;

pub use batch::{BatchReport, BatchRun, FinishedBatch, SliceOutcome};
pub use binding::{Binding, TeardownReason, find_scope_root};
pub use classify::{RoleSource, classify_role, stable_id};
pub use config::EngineConfig;
pub use controller::{ControllerOutput, Event, NavigationKind, RetentionController};
pub use document::{DocumentFixture, ElementFixture, MemoryDocument};
pub use driver::run_controller;
pub use guards::{GuardBlock, GuardReport, StreamSample, StreamingGuard, TypingGuard, is_scrolled_up};
pub use host::{Host, HostError, MutationKind, MutationRecord, NodeRef, ObserverHandle, ScrollMetrics};
pub use locator::{LocateCost, LocateResult, LocatorSettings, MessageLocator, RenderedTurn};
pub use plan::{PlannedOp, RetentionPlan, TurnAction, plan_retention};
pub use scheduler::{Decision, DecisionInput, LatchReason, Phase, SchedulingMode, Trigger, decide};
pub use scroll::ScrollAnchor;
pub use selector::{Matcher, outermost};
pub use strategy::{HideStrategy, PlaceholderStrategy, StyleLedger, TrimOutcome, TrimStrategy, strategy_for};
pub use suppression::{Suppression, SuppressionTicket, is_engine_echo};
pub use sweep::{SweepReport, common_ancestor, sweep_orphan_controls, sweep_shells};
pub use thread::Thread;
pub use timers::{TimerKind, TimerSet};
