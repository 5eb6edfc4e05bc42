//! Host document abstraction.
//!
//! The engine never owns the rendered conversation. It holds [`NodeRef`]
//! relations into a tree the host may replace or recycle at any time, and
//! re-validates them (`is_connected`) before every use.

use std::fmt;

use thiserror::Error;

/// Weak handle to a host element. Carries no liveness guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(u64);

impl NodeRef {
    /// Wrap a host-assigned id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Host-assigned id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Live mutation observer registration. At most one per binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

impl ObserverHandle {
    /// Wrap a host-assigned id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Host-assigned id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children added to / removed from `target`.
    ChildList {
        /// Inserted nodes.
        added: Vec<NodeRef>,
        /// Removed nodes (already detached).
        removed: Vec<NodeRef>,
    },
    /// Attribute `name` changed on `target` (inline style reports as `style`).
    Attribute {
        /// Attribute name.
        name: String,
    },
    /// Text content of `target` changed.
    CharacterData,
}

/// One observed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node the mutation happened on (parent for child-list changes).
    pub target: NodeRef,
    /// Mutation detail.
    pub kind: MutationKind,
}

impl MutationRecord {
    /// Child-list record.
    #[must_use]
    pub fn child_list(target: NodeRef, added: Vec<NodeRef>, removed: Vec<NodeRef>) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList { added, removed },
        }
    }

    /// Attribute record.
    #[must_use]
    pub fn attribute(target: NodeRef, name: &str) -> Self {
        Self {
            target,
            kind: MutationKind::Attribute {
                name: name.to_string(),
            },
        }
    }
}

/// Scroll container geometry in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Current offset from the top.
    pub scroll_top: f64,
    /// Total scrollable height.
    pub scroll_height: f64,
    /// Viewport height.
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Pixels between the viewport bottom and the content bottom.
    #[must_use]
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.client_height - self.scroll_top).max(0.0)
    }

    /// Largest valid `scroll_top`.
    #[must_use]
    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// Host write failures. All are per-node and non-fatal to a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The node is no longer in the document.
    #[error("{0} is detached from the document")]
    Detached(NodeRef),

    /// The host refused the write.
    #[error("host rejected write on {node}: {reason}")]
    Rejected {
        /// Target node.
        node: NodeRef,
        /// Host explanation.
        reason: String,
    },

    /// No observer could be registered.
    #[error("observer unavailable: {0}")]
    ObserverUnavailable(String),
}

/// Foreign document the engine observes and writes into.
///
/// Reads are cheap except [`Host::box_height`], which may force layout.
pub trait Host {
    /// Host monotonic clock in milliseconds; used for slice budgets.
    fn now_ms(&self) -> u64;

    /// Document root element.
    fn document_root(&self) -> NodeRef;

    /// True when `node` is still attached under the document root.
    fn is_connected(&self, node: NodeRef) -> bool;

    /// Parent element.
    fn parent(&self, node: NodeRef) -> Option<NodeRef>;

    /// Child elements in document order.
    fn children(&self, node: NodeRef) -> Vec<NodeRef>;

    /// Lowercase tag name; `None` for unknown nodes.
    fn tag_name(&self, node: NodeRef) -> Option<String>;

    /// Attribute value.
    fn attribute(&self, node: NodeRef, name: &str) -> Option<String>;

    /// Character count of the text content (subtree).
    fn text_len(&self, node: NodeRef) -> usize;

    /// Rendered height in pixels. May force layout.
    fn box_height(&self, node: NodeRef) -> f64;

    /// Inline style property value.
    fn inline_style(&self, node: NodeRef, property: &str) -> Option<String>;

    /// Set an attribute.
    ///
    /// # Errors
    ///
    /// [`HostError::Detached`] when the node is gone; [`HostError::Rejected`] on refusal.
    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) -> Result<(), HostError>;

    /// Remove an attribute.
    ///
    /// # Errors
    ///
    /// [`HostError::Detached`] when the node is gone.
    fn remove_attribute(&mut self, node: NodeRef, name: &str) -> Result<(), HostError>;

    /// Set (`Some`) or clear (`None`) an inline style property.
    ///
    /// # Errors
    ///
    /// [`HostError::Detached`] when the node is gone.
    fn set_inline_style(
        &mut self,
        node: NodeRef,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError>;

    /// Replace `node` with a new empty element carrying `attributes`; returns the new node.
    ///
    /// # Errors
    ///
    /// [`HostError::Detached`] when the node is gone or has no parent.
    fn replace_with_marker(
        &mut self,
        node: NodeRef,
        tag: &str,
        attributes: &[(&str, String)],
    ) -> Result<NodeRef, HostError>;

    /// Element that scrolls the conversation.
    fn scroll_container(&self) -> Option<NodeRef>;

    /// Geometry of a scroll container.
    fn scroll_metrics(&self, container: NodeRef) -> Option<ScrollMetrics>;

    /// Move a scroll container.
    ///
    /// # Errors
    ///
    /// [`HostError::Detached`] when the container is gone.
    fn set_scroll_top(&mut self, container: NodeRef, top: f64) -> Result<(), HostError>;

    /// Start observing the subtree of `root`.
    ///
    /// # Errors
    ///
    /// [`HostError::ObserverUnavailable`] when the host cannot observe `root`.
    fn observe(&mut self, root: NodeRef) -> Result<ObserverHandle, HostError>;

    /// Stop an observer. Unknown handles are ignored.
    fn disconnect(&mut self, handle: ObserverHandle);

    /// True while `handle` is registered.
    fn is_observing(&self, handle: ObserverHandle) -> bool;

    /// Drain queued records of `handle`. Hosts that push records as events return nothing.
    fn take_records(&mut self, handle: ObserverHandle) -> Vec<MutationRecord>;

    /// True when `node` has attribute `name`.
    fn has_attribute(&self, node: NodeRef, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    fn contains(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Descendants of `node` in document order, `node` excluded.
    fn descendants(&self, node: NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = self.children(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    /// False when the node or the inline style hides it from rendering.
    fn is_rendered(&self, node: NodeRef) -> bool {
        !self.has_attribute(node, "hidden")
            && self
                .inline_style(node, "display")
                .is_none_or(|display| display.trim() != "none")
    }
}
