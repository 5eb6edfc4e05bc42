//! omni-prune: conversation tree pruner for network payloads.
//!
//! Rewrites a tree-shaped conversation payload before the host renders it so
//! that only the most recent N rounds (user request plus responses) survive.
//! Only the active root-to-leaf chain is walked; auxiliary nodes
//! (system/tool/thinking) are dropped and a roleless chain head is kept as the
//! anchor of the rewritten chain.
//!
//! ```rust,ignore
//! use omni_prune::rewrite_body;
//!
//! if let Some(bytes) = rewrite_body(&body, 10)? {
//!     // deliver `bytes` instead of `body`
//! }
//! ```

mod error;
mod graph;
mod payload;
mod prune;

pub use error::PruneError;
pub use graph::{ConversationGraph, ConversationNode};
pub use payload::{ConversationPayload, PayloadOutcome, prune_payload, rewrite_body};
pub use prune::{PruneOutcome, PruneStats, PrunedConversation, prune};
