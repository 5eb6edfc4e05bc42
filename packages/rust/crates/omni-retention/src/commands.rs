//! Command bodies shared by the CLI and the integration tests.

use anyhow::{Context, Result};
use omni_prune::{PayloadOutcome, PruneStats, prune_payload};
use omni_types::{RetentionPolicy, StatusSnapshot, TrimMode};
use omni_window::{EngineConfig, MemoryDocument, RetentionController, run_controller};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::RuntimeSettings;

/// Timers keep running this long after the simulated session ends.
pub const SIMULATION_DRAIN_MS: u64 = 10_000;

/// Outcome of pruning one payload.
#[derive(Debug, Clone)]
pub struct PruneReport {
    /// Serialized payload (rewritten or original).
    pub output: String,
    /// Before/after counts.
    pub stats: PruneStats,
    /// False when the payload came back unchanged.
    pub pruned: bool,
}

/// Prune a raw JSON conversation payload.
///
/// # Errors
///
/// Fails when the input is not JSON or does not have the conversation shape.
pub fn prune_json(input: &str, keep_rounds: usize, pretty: bool) -> Result<PruneReport> {
    let value: Value = serde_json::from_str(input).context("conversation payload is not valid JSON")?;
    let outcome = prune_payload(value, keep_rounds).context("conversation payload rejected")?;
    let pruned = matches!(outcome, PayloadOutcome::Pruned { .. });
    let stats = outcome.stats();
    let payload = outcome.into_payload();
    let output = if pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .context("failed to encode payload")?;

    if pruned {
        tracing::info!(
            event = "prune.applied",
            rounds_total = stats.rounds_total,
            rounds_kept = stats.rounds_kept,
            nodes_total = stats.nodes_total,
            nodes_kept = stats.nodes_kept,
            "conversation payload pruned"
        );
    } else {
        tracing::info!(
            event = "prune.unchanged",
            rounds_total = stats.rounds_total,
            keep_rounds,
            "conversation payload left unchanged"
        );
    }
    Ok(PruneReport { output, stats, pruned })
}

/// Final state of a simulated session.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Last status the controller published.
    pub status: Option<StatusSnapshot>,
    /// Locate-and-plan passes run.
    pub evaluations: u64,
    /// Engine writes applied to the document.
    pub writes: usize,
}

/// Load a document fixture and run the async driver on it until quiescent.
///
/// # Errors
///
/// Fails when the fixture is not a valid document.
pub async fn simulate(fixture: &str, policy: RetentionPolicy, config: EngineConfig) -> Result<SimulationReport> {
    let mut document = MemoryDocument::from_json(fixture).context("invalid document fixture")?;
    let controller = RetentionController::new(config, policy);
    let (events, receiver) = mpsc::unbounded_channel();
    let (status, status_rx) = watch::channel(None);
    drop(events);

    let controller = run_controller(&mut document, controller, receiver, status, SIMULATION_DRAIN_MS).await;
    tracing::debug!(
        event = "retention.simulate.finished",
        drain_ms = SIMULATION_DRAIN_MS,
        quiescent = controller.is_quiescent(),
        "simulation finished"
    );
    let status = *status_rx.borrow();
    Ok(SimulationReport {
        status,
        evaluations: controller.evaluations(),
        writes: document.write_count(),
    })
}

/// Policy from `settings` with command-line overrides applied.
///
/// Out-of-range values in settings files are clamped; an explicit
/// `keep_rounds` is checked instead.
///
/// # Errors
///
/// Fails when `keep_rounds` is outside `1..=100`.
pub fn policy_with_overrides(
    settings: &RuntimeSettings,
    keep_rounds: Option<usize>,
    trim_mode: Option<TrimMode>,
) -> Result<RetentionPolicy> {
    let mut policy = settings.policy();
    if let Some(keep_rounds) = keep_rounds {
        policy.keep_rounds = keep_rounds;
        policy.validate().context("--keep-rounds rejected")?;
    }
    if let Some(trim_mode) = trim_mode {
        policy.trim_mode = trim_mode;
    }
    Ok(policy)
}

/// Settings as the engine will see them.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    /// Retention policy.
    pub policy: RetentionPolicy,
    /// Engine timing.
    pub engine: EngineConfig,
}

impl ResolvedSettings {
    /// Resolve `settings`, applying defaults to unset fields.
    #[must_use]
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            policy: settings.policy(),
            engine: settings.engine_config(),
        }
    }
}
