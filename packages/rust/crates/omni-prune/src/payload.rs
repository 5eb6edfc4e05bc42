//! Network payload boundary: `{mapping, current_node, root, ...}` in, same shape out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PruneError;
use crate::graph::ConversationGraph;
use crate::prune::{PruneOutcome, PruneStats, prune};

/// Conversation payload. Fields other than the three below are carried through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPayload {
    /// Node mapping.
    pub mapping: ConversationGraph,
    /// Leaf of the active chain.
    pub current_node: String,
    /// Tree root, when the host sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Every other top-level field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationPayload {
    /// Decode a payload value, filling node ids from mapping keys.
    ///
    /// # Errors
    ///
    /// Returns [`PruneError::Shape`] when `mapping`/`current_node` are missing or
    /// malformed and [`PruneError::IdMismatch`] when a node id disagrees with its key.
    pub fn from_value(value: Value) -> Result<Self, PruneError> {
        let Value::Object(object) = &value else {
            return Err(PruneError::Shape("payload is not a JSON object".to_string()));
        };
        if !object.get("mapping").is_some_and(Value::is_object) {
            return Err(PruneError::Shape("`mapping` must be an object".to_string()));
        }
        if !object.get("current_node").is_some_and(Value::is_string) {
            return Err(PruneError::Shape("`current_node` must be a string".to_string()));
        }
        let mut payload: Self =
            serde_json::from_value(value).map_err(|error| PruneError::Shape(error.to_string()))?;
        for (key, node) in payload.mapping.entries_mut() {
            if node.id.is_empty() {
                node.id.clone_from(key);
            } else if node.id != *key {
                return Err(PruneError::IdMismatch {
                    key: key.clone(),
                    id: node.id.clone(),
                });
            }
        }
        Ok(payload)
    }
}

/// Result of [`prune_payload`].
#[derive(Debug, Clone)]
pub enum PayloadOutcome {
    /// Payload returned untouched.
    Unchanged {
        /// Original payload value.
        payload: Value,
        /// Counts for telemetry.
        stats: PruneStats,
    },
    /// Payload rewritten.
    Pruned {
        /// Rewritten payload value.
        payload: Value,
        /// Counts for telemetry.
        stats: PruneStats,
    },
}

impl PayloadOutcome {
    /// Payload of either variant.
    #[must_use]
    pub fn into_payload(self) -> Value {
        match self {
            Self::Unchanged { payload, .. } | Self::Pruned { payload, .. } => payload,
        }
    }

    /// Counts of either variant.
    #[must_use]
    pub fn stats(&self) -> PruneStats {
        match self {
            Self::Unchanged { stats, .. } | Self::Pruned { stats, .. } => *stats,
        }
    }
}

/// Prune a conversation payload value to `keep_rounds` rounds.
///
/// # Errors
///
/// Shape violations are surfaced, never swallowed; see [`ConversationPayload::from_value`].
pub fn prune_payload(value: Value, keep_rounds: usize) -> Result<PayloadOutcome, PruneError> {
    let payload = ConversationPayload::from_value(value.clone())?;
    match prune(&payload.mapping, &payload.current_node, keep_rounds) {
        PruneOutcome::Unchanged(stats) => Ok(PayloadOutcome::Unchanged {
            payload: value,
            stats,
        }),
        PruneOutcome::Pruned(pruned) => {
            let rewritten = ConversationPayload {
                mapping: pruned.graph,
                current_node: pruned.new_current,
                root: Some(pruned.new_root),
                extra: payload.extra,
            };
            Ok(PayloadOutcome::Pruned {
                payload: serde_json::to_value(rewritten)?,
                stats: pruned.stats,
            })
        }
    }
}

/// Rewrite a raw response body. `Ok(None)` means "deliver the original bytes".
///
/// # Errors
///
/// Returns [`PruneError::Json`] for bodies that are not JSON and the shape errors
/// of [`prune_payload`].
pub fn rewrite_body(body: &[u8], keep_rounds: usize) -> Result<Option<Vec<u8>>, PruneError> {
    let value: Value = serde_json::from_slice(body)?;
    match prune_payload(value, keep_rounds)? {
        PayloadOutcome::Unchanged { stats, .. } => {
            tracing::debug!(
                event = "prune.body.unchanged",
                rounds_total = stats.rounds_total,
                keep_rounds,
                "conversation body within retention policy"
            );
            Ok(None)
        }
        PayloadOutcome::Pruned { payload, stats } => {
            tracing::info!(
                event = "prune.body.rewritten",
                rounds_total = stats.rounds_total,
                rounds_kept = stats.rounds_kept,
                nodes_total = stats.nodes_total,
                nodes_kept = stats.nodes_kept,
                "conversation body pruned before render"
            );
            Ok(Some(serde_json::to_vec(&payload)?))
        }
    }
}
