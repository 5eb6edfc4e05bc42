//! omni-types - Shared type definitions for omni-retention
//!
//! This crate provides the data structures used by both retention layers:
//! the network-side conversation pruner (`omni-prune`) and the view-side
//! retention engine (`omni-window`).
//!
//! # Schema Singularity
//! Policy and status types derive `schemars::JsonSchema` so the settings and
//! status shapes have one authoritative definition.

#![allow(clippy::doc_markdown)]

mod rounds;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use rounds::RoundLayout;

/// Smallest accepted `keep_rounds`.
pub const MIN_KEEP_ROUNDS: usize = 1;
/// Largest accepted `keep_rounds`.
pub const MAX_KEEP_ROUNDS: usize = 100;
/// `keep_rounds` used when nothing is configured.
pub const DEFAULT_KEEP_ROUNDS: usize = 10;

/// Result type with retention-specific error
pub type RetentionResult<T> = Result<T, RetentionError>;

/// Unified error type for policy and configuration handling
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum RetentionError {
    /// A policy field is outside its accepted range
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Configuration loading/parsing failures
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human request; the only round delimiter.
    User,
    /// Model response.
    Assistant,
    /// System or host-injected context.
    System,
    /// Tool call or tool result.
    Tool,
    /// Model reasoning / thoughts.
    Thinking,
    /// Present but unclassifiable.
    Unknown,
}

impl Role {
    /// Parse a host role string. Unrecognised values map to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Self::User,
            "assistant" | "model" => Self::Assistant,
            "system" | "developer" => Self::System,
            "tool" | "function" => Self::Tool,
            "thinking" | "thoughts" | "reasoning" => Self::Thinking,
            _ => Self::Unknown,
        }
    }

    /// String form used in markers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
            Self::Thinking => "thinking",
            Self::Unknown => "unknown",
        }
    }

    /// System, tool and thinking turns never count toward `keep_rounds`.
    #[must_use]
    pub const fn is_auxiliary(self) -> bool {
        matches!(self, Self::System | Self::Tool | Self::Thinking)
    }

    /// A user turn starts a new round.
    #[must_use]
    pub const fn is_delimiter(self) -> bool {
        matches!(self, Self::User)
    }
}

/// How the view engine removes trimmed turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrimMode {
    /// Collapse the turn in place; reversible when the policy relaxes.
    #[default]
    Hide,
    /// Replace the turn with a minimal id/role marker; frees the subtree.
    Placeholder,
}

impl TrimMode {
    /// Parse a settings value (`hide` / `placeholder`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hide" | "collapse" => Some(Self::Hide),
            "placeholder" | "remove" => Some(Self::Placeholder),
            _ => None,
        }
    }

    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Placeholder => "placeholder",
        }
    }
}

/// Retention policy snapshot. Copied at scheduling time; never mutated during an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetentionPolicy {
    /// Number of most-recent rounds to keep (1..=100).
    pub keep_rounds: usize,
    /// Keep auxiliary turns that sit inside the kept region.
    pub preserve_auxiliary: bool,
    /// Defer non-forced trims while the reader is scrolled away from the bottom.
    pub pause_when_scrolled_up: bool,
    /// Master switch.
    pub enabled: bool,
    /// Removal strategy for the view engine.
    #[serde(default)]
    pub trim_mode: TrimMode,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_rounds: DEFAULT_KEEP_ROUNDS,
            preserve_auxiliary: true,
            pause_when_scrolled_up: false,
            enabled: true,
            trim_mode: TrimMode::Hide,
        }
    }
}

impl RetentionPolicy {
    /// Policy keeping `keep_rounds` rounds with defaults elsewhere.
    #[must_use]
    pub fn keeping(keep_rounds: usize) -> Self {
        Self {
            keep_rounds,
            ..Self::default()
        }
    }

    /// `keep_rounds` clamped into the accepted range.
    #[must_use]
    pub fn effective_keep_rounds(&self) -> usize {
        clamp_keep_rounds(self.keep_rounds)
    }

    /// Copy with `keep_rounds` clamped into range.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            keep_rounds: self.effective_keep_rounds(),
            ..self
        }
    }

    /// Reject out-of-range values instead of clamping them.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::InvalidPolicy`] when `keep_rounds` is outside `1..=100`.
    pub fn validate(&self) -> RetentionResult<()> {
        if (MIN_KEEP_ROUNDS..=MAX_KEEP_ROUNDS).contains(&self.keep_rounds) {
            Ok(())
        } else {
            Err(RetentionError::InvalidPolicy(format!(
                "keep_rounds={} outside {MIN_KEEP_ROUNDS}..={MAX_KEEP_ROUNDS}",
                self.keep_rounds
            )))
        }
    }
}

/// Clamp a raw `keep_rounds` into `1..=100`.
#[must_use]
pub fn clamp_keep_rounds(keep_rounds: usize) -> usize {
    keep_rounds.clamp(MIN_KEEP_ROUNDS, MAX_KEEP_ROUNDS)
}

/// Which locator tier recognised the rendered conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Explicit message id / author-role attributes.
    MessageAttributes,
    /// Turn test ids or `article` elements.
    TestIdAria,
    /// Densest child list heuristic.
    Structural,
    /// Nothing recognised.
    #[default]
    None,
}

impl ConfidenceTier {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageAttributes => "message_attributes",
            Self::TestIdAria => "test_id_aria",
            Self::Structural => "structural",
            Self::None => "none",
        }
    }
}

/// Status emitted after each completed evaluation, for a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    /// Rounds found in the conversation (visible and trimmed).
    pub total_rounds: usize,
    /// Rounds left visible after the evaluation.
    pub visible_rounds: usize,
    /// Rounds hidden or replaced.
    pub trimmed_rounds: usize,
    /// Policy `keep_rounds` in effect.
    pub keep_rounds: usize,
    /// Locator tier the turns came from.
    #[serde(default)]
    pub tier: ConfidenceTier,
    /// False when no locator tier recognised the layout.
    pub layout_recognized: bool,
}

impl StatusSnapshot {
    /// Snapshot for a recognised layout.
    #[must_use]
    pub fn new(total_rounds: usize, visible_rounds: usize, keep_rounds: usize) -> Self {
        Self {
            total_rounds,
            visible_rounds,
            trimmed_rounds: total_rounds.saturating_sub(visible_rounds),
            keep_rounds,
            tier: ConfidenceTier::None,
            layout_recognized: true,
        }
    }

    /// Same snapshot tagged with the locator tier.
    #[must_use]
    pub fn with_tier(self, tier: ConfidenceTier) -> Self {
        Self { tier, ..self }
    }

    /// Snapshot reporting an unrecognised layout; nothing was trimmed.
    #[must_use]
    pub fn unrecognized(keep_rounds: usize) -> Self {
        Self {
            keep_rounds,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_maps_unknown_strings() {
        assert_eq!(Role::parse("User"), Role::User);
        assert_eq!(Role::parse(" assistant "), Role::Assistant);
        assert_eq!(Role::parse("critic"), Role::Unknown);
        assert!(Role::Tool.is_auxiliary());
        assert!(!Role::Unknown.is_auxiliary());
    }

    #[test]
    fn policy_clamps_and_validates() {
        let policy = RetentionPolicy::keeping(0);
        assert_eq!(policy.effective_keep_rounds(), 1);
        assert!(policy.validate().is_err());
        assert_eq!(RetentionPolicy::keeping(500).normalized().keep_rounds, 100);
        assert!(RetentionPolicy::keeping(5).validate().is_ok());
    }

    #[test]
    fn trim_mode_parse_accepts_aliases() {
        assert_eq!(TrimMode::parse("collapse"), Some(TrimMode::Hide));
        assert_eq!(TrimMode::parse("PLACEHOLDER"), Some(TrimMode::Placeholder));
        assert_eq!(TrimMode::parse("delete-all"), None);
    }
}
