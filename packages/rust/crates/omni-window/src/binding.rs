//! Scope root discovery and binding state.

use crate::host::{Host, NodeRef, ObserverHandle};
use crate::markers::TEST_ID_ATTR;
use crate::scheduler::SchedulingMode;
use crate::selector::Matcher;

/// Candidate conversation roots, most specific first.
const SCOPE_ROOTS: [Matcher; 4] = [
    Matcher::HasAttr("data-conversation-root"),
    Matcher::AttrEquals(TEST_ID_ATTR, "conversation-thread"),
    Matcher::Tag("main"),
    Matcher::AttrEquals("role", "main"),
];

/// Conversation root the engine should observe, if the page has one.
#[must_use]
pub fn find_scope_root(host: &dyn Host) -> Option<NodeRef> {
    let document = host.document_root();
    SCOPE_ROOTS
        .iter()
        .find_map(|matcher| matcher.find_first(host, document))
}

/// Why a binding was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Bound root left the document.
    RootDetached,
    /// Observer disappeared.
    ObserverLost,
    /// Host swapped the conversation container.
    ContainerSwapped,
    /// Client-side navigation.
    Navigation,
    /// Policy switched off.
    Disabled,
    /// Explicit teardown.
    Requested,
}

impl TeardownReason {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RootDetached => "root_detached",
            Self::ObserverLost => "observer_lost",
            Self::ContainerSwapped => "container_swapped",
            Self::Navigation => "navigation",
            Self::Disabled => "disabled",
            Self::Requested => "requested",
        }
    }
}

/// Live binding to one scope root.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Observed root (weak).
    pub root: NodeRef,
    /// Observer; `None` once a restore has disconnected it.
    pub observer: Option<ObserverHandle>,
    /// When the binding was made.
    pub bound_at_ms: u64,
    /// Current scheduling mode.
    pub mode: SchedulingMode,
    /// "Layout not recognized" already reported for this binding.
    pub unrecognized_reported: bool,
}

impl Binding {
    /// Fresh binding in boot mode.
    #[must_use]
    pub fn new(root: NodeRef, observer: ObserverHandle, now_ms: u64) -> Self {
        Self {
            root,
            observer: Some(observer),
            bound_at_ms: now_ms,
            mode: SchedulingMode::Boot,
            unrecognized_reported: false,
        }
    }

    /// Reason this binding must be replaced, if any.
    ///
    /// A missing observer only counts once no batch is in flight.
    #[must_use]
    pub fn staleness(&self, host: &dyn Host, navigated: bool, applying: bool) -> Option<TeardownReason> {
        if navigated {
            return Some(TeardownReason::Navigation);
        }
        if !host.is_connected(self.root) {
            return Some(TeardownReason::RootDetached);
        }
        let observer_alive = self.observer.is_some_and(|o| host.is_observing(o));
        if !observer_alive && !applying {
            return Some(TeardownReason::ObserverLost);
        }
        if find_scope_root(host).is_some_and(|root| root != self.root) {
            return Some(TeardownReason::ContainerSwapped);
        }
        None
    }
}
