//! Error types for payload pruning.
//!
//! Follows ODF-REP: Library crates use `thiserror` for explicit error enums.

use thiserror::Error;

/// Error types for the payload boundary.
///
/// Ambiguous graphs (missing current node, cyclic parents) are not errors; they
/// leave the payload unchanged. These variants are contract violations the
/// caller must see.
#[derive(Error, Debug)]
pub enum PruneError {
    /// Payload does not have the conversation shape.
    #[error("Unexpected payload shape: {0}")]
    Shape(String),

    /// A mapping entry disagrees with its own id.
    #[error("Mapping key {key} holds node id {id}")]
    IdMismatch {
        /// Key in `mapping`.
        key: String,
        /// `id` field of the node under that key.
        id: String,
    },

    /// Body is not valid JSON or could not be re-encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
