//! Keep the most recent rounds of the active chain.

use omni_types::{Role, RoundLayout, clamp_keep_rounds};
use serde::{Deserialize, Serialize};

use crate::graph::{ConversationGraph, ConversationNode};

/// Counts reported for every prune call, changed or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneStats {
    /// Rounds on the output chain.
    pub rounds_kept: usize,
    /// Rounds on the input chain.
    pub rounds_total: usize,
    /// Nodes on the output chain, anchor included.
    pub nodes_kept: usize,
    /// Nodes on the input chain, anchor included.
    pub nodes_total: usize,
}

/// Rewritten conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedConversation {
    /// Simple chain: anchor (if any) followed by surviving visible nodes.
    pub graph: ConversationGraph,
    /// Anchor id, or the first survivor when there is no anchor.
    pub new_root: String,
    /// Last survivor.
    pub new_current: String,
    /// Before/after counts.
    pub stats: PruneStats,
}

/// Result of [`prune`].
#[derive(Debug, Clone, PartialEq)]
pub enum PruneOutcome {
    /// Input left as is; counts still reported.
    Unchanged(PruneStats),
    /// Input rewritten.
    Pruned(PrunedConversation),
}

impl PruneOutcome {
    /// Counts of either variant.
    #[must_use]
    pub fn stats(&self) -> PruneStats {
        match self {
            Self::Unchanged(stats) => *stats,
            Self::Pruned(pruned) => pruned.stats,
        }
    }

    /// True for [`PruneOutcome::Unchanged`].
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged(_))
    }
}

/// Keep the last `keep_rounds` rounds of the chain ending at `current`.
///
/// Fails closed: a missing `current`, a cyclic parent chain, an ambiguous chain
/// (no user turn but an auxiliary-only prefix) or an empty surviving slice all
/// return [`PruneOutcome::Unchanged`]. The output never contains auxiliary nodes.
#[must_use]
pub fn prune(graph: &ConversationGraph, current: &str, keep_rounds: usize) -> PruneOutcome {
    let keep = clamp_keep_rounds(keep_rounds);
    let Some(chain) = graph.active_chain(current) else {
        return PruneOutcome::Unchanged(PruneStats::default());
    };

    let anchor = chain.first().copied().filter(|head| head.role().is_none());
    let body = &chain[usize::from(anchor.is_some())..];
    let roles: Vec<Role> = body
        .iter()
        .map(|node| node.role().unwrap_or(Role::Unknown))
        .collect();
    let layout = RoundLayout::from_roles(roles.iter().copied());
    let unchanged = PruneStats {
        rounds_kept: layout.round_count(),
        rounds_total: layout.round_count(),
        nodes_kept: chain.len(),
        nodes_total: chain.len(),
    };

    if layout.has_undelimited_auxiliary_prefix() {
        tracing::debug!(
            event = "prune.skipped.ambiguous_prefix",
            rounds_total = unchanged.rounds_total,
            "chain has no user turn and starts with auxiliary nodes; left untouched"
        );
        return PruneOutcome::Unchanged(unchanged);
    }
    let cut = match layout.cut_index(keep) {
        Some(cut) => cut,
        None if !layout.has_auxiliary() => return PruneOutcome::Unchanged(unchanged),
        None => 0,
    };

    let survivors: Vec<&ConversationNode> = body[cut..]
        .iter()
        .zip(&roles[cut..])
        .filter(|(_, role)| !role.is_auxiliary())
        .map(|(node, _)| *node)
        .collect();
    let (Some(first), Some(last)) = (survivors.first(), survivors.last()) else {
        return PruneOutcome::Unchanged(unchanged);
    };

    let rounds_kept = RoundLayout::from_roles(
        survivors
            .iter()
            .map(|node| node.role().unwrap_or(Role::Unknown)),
    )
    .round_count();
    let stats = PruneStats {
        rounds_kept,
        rounds_total: layout.round_count(),
        nodes_kept: survivors.len() + usize::from(anchor.is_some()),
        nodes_total: chain.len(),
    };
    let new_root = anchor.map_or_else(|| first.id.clone(), |a| a.id.clone());
    let new_current = last.id.clone();
    let pruned = relink(anchor, &survivors);

    tracing::debug!(
        event = "prune.applied",
        keep_rounds = keep,
        rounds_total = stats.rounds_total,
        rounds_kept = stats.rounds_kept,
        nodes_total = stats.nodes_total,
        nodes_kept = stats.nodes_kept,
        anchored = anchor.is_some(),
        "conversation chain pruned"
    );
    PruneOutcome::Pruned(PrunedConversation {
        graph: pruned,
        new_root,
        new_current,
        stats,
    })
}

fn relink(anchor: Option<&ConversationNode>, survivors: &[&ConversationNode]) -> ConversationGraph {
    let mut graph = ConversationGraph::new();
    let mut previous: Option<String> = None;
    if let Some(anchor) = anchor {
        let mut node = anchor.clone();
        node.children = survivors.first().map(|s| vec![s.id.clone()]).unwrap_or_default();
        previous = Some(node.id.clone());
        graph.insert(node);
    }
    for (position, survivor) in survivors.iter().enumerate() {
        let mut node = (*survivor).clone();
        node.parent = previous.take();
        node.children = survivors
            .get(position + 1)
            .map(|next| vec![next.id.clone()])
            .unwrap_or_default();
        previous = Some(node.id.clone());
        graph.insert(node);
    }
    graph
}
