//! Conversation graph as delivered by the host: `id → node`, linked by parent ids.

use std::collections::{BTreeMap, HashSet};

use omni_types::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const HIDDEN_FLAG: &str = "is_visually_hidden_from_conversation";
const THINKING_CONTENT_TYPES: [&str; 3] = ["thoughts", "reasoning_recap", "reasoning"];

/// One node of the conversation tree. Unknown fields round-trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    /// Node id; filled from the mapping key when absent.
    #[serde(default)]
    pub id: String,
    /// Parent id; `None` on the tree root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Ordered child ids.
    #[serde(default)]
    pub children: Vec<String>,
    /// Opaque message payload; `None`/`null` on structural nodes.
    #[serde(default)]
    pub message: Option<Value>,
    /// Every other field the host sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationNode {
    /// Build a node with an optional author role. Used by tests and fixtures.
    #[must_use]
    pub fn new(id: &str, parent: Option<&str>, role: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            children: Vec::new(),
            message: role.map(|role| {
                serde_json::json!({
                    "id": id,
                    "author": { "role": role },
                    "content": { "content_type": "text", "parts": [] },
                })
            }),
            extra: Map::new(),
        }
    }

    /// Role of the node, or `None` when roleless (no message or no author role).
    ///
    /// Assistant messages carrying reasoning content classify as `Thinking`; messages
    /// the host hides from the transcript classify as `System`.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        let message = self.message.as_ref()?.as_object()?;
        let raw = message.get("author")?.get("role")?.as_str()?;
        let hidden = message
            .get("metadata")
            .and_then(|meta| meta.get(HIDDEN_FLAG))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if hidden {
            return Some(Role::System);
        }
        let role = Role::parse(raw);
        let content_type = message
            .get("content")
            .and_then(|content| content.get("content_type"))
            .and_then(Value::as_str);
        if role == Role::Assistant
            && content_type.is_some_and(|ct| THINKING_CONTENT_TYPES.contains(&ct))
        {
            return Some(Role::Thinking);
        }
        Some(role)
    }
}

/// Conversation nodes keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationGraph {
    nodes: BTreeMap<String, ConversationNode>,
}

impl ConversationGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes, wiring each parent's `children` in insertion order.
    #[must_use]
    pub fn from_chain_nodes(nodes: Vec<ConversationNode>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert(node);
        }
        let links: Vec<(String, String)> = graph
            .nodes
            .values()
            .filter_map(|node| node.parent.clone().map(|parent| (parent, node.id.clone())))
            .collect();
        for (parent, child) in links {
            if let Some(node) = graph.nodes.get_mut(&parent)
                && !node.children.contains(&child)
            {
                node.children.push(child);
            }
        }
        graph
    }

    /// Insert or replace a node under its id.
    pub fn insert(&mut self, node: ConversationNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Node by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConversationNode> {
        self.nodes.get(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ConversationNode> {
        self.nodes.values()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut ConversationNode)> {
        self.nodes.iter_mut()
    }

    /// Root-to-leaf chain ending at `current`, oldest first.
    ///
    /// Returns `None` when `current` is absent or the parent chain is cyclic. The walk
    /// is capped at the graph size. A parent id naming an absent node ends the chain.
    #[must_use]
    pub fn active_chain(&self, current: &str) -> Option<Vec<&ConversationNode>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut chain = Vec::new();
        let mut cursor = Some(current);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id) else {
                if chain.is_empty() {
                    return None;
                }
                break;
            };
            if !visited.insert(id) || chain.len() >= self.nodes.len() {
                tracing::debug!(
                    event = "prune.chain.cycle_detected",
                    current,
                    at = id,
                    walked = chain.len(),
                    "parent chain is cyclic; leaving payload untouched"
                );
                return None;
            }
            chain.push(node);
            cursor = node.parent.as_deref();
        }
        chain.reverse();
        Some(chain)
    }
}
