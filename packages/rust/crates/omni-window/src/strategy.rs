//! Trim strategies: how a turn leaves the rendered view.

use std::collections::HashMap;

use omni_types::TrimMode;

use crate::host::{Host, HostError, NodeRef};
use crate::locator::RenderedTurn;
use crate::markers::{
    AUTHOR_ROLE_ATTR, COLLAPSE_STYLES, HIDDEN_ATTR, MESSAGE_ID_ATTR, PLACEHOLDER_ATTR, TEST_ID_ATTR,
};

/// Result of one strategy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    /// The document changed.
    Applied,
    /// Already in the requested state.
    AlreadyApplied,
    /// The strategy cannot do this.
    Unsupported,
}

/// Inline style values overwritten by a collapse, for exact reversal.
#[derive(Debug, Clone, Default)]
pub struct StyleLedger {
    saved: HashMap<NodeRef, Vec<(&'static str, Option<String>)>>,
}

impl StyleLedger {
    /// Nodes with saved styles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// True when nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// True when `node` has saved styles.
    #[must_use]
    pub fn contains(&self, node: NodeRef) -> bool {
        self.saved.contains_key(&node)
    }

    /// Forget nodes that are no longer attached.
    pub fn prune_detached(&mut self, host: &dyn Host) {
        self.saved.retain(|node, _| host.is_connected(*node));
    }
}

/// Collapse `node` and tag it with `marker`. Returns false when already tagged.
///
/// Styles are written before the marker so a half-applied collapse is retried.
pub(crate) fn collapse(
    host: &mut dyn Host,
    ledger: &mut StyleLedger,
    node: NodeRef,
    marker: &str,
    value: &str,
) -> Result<bool, HostError> {
    if host.has_attribute(node, marker) {
        return Ok(false);
    }
    if !host.is_connected(node) {
        return Err(HostError::Detached(node));
    }
    let previous = COLLAPSE_STYLES
        .iter()
        .map(|(property, _)| (*property, host.inline_style(node, property)))
        .collect();
    ledger.saved.entry(node).or_insert(previous);
    for (property, collapsed) in COLLAPSE_STYLES {
        host.set_inline_style(node, property, Some(collapsed))?;
    }
    host.set_attribute(node, marker, value)?;
    Ok(true)
}

/// Undo [`collapse`]. Returns false when `node` carries no `marker`.
pub(crate) fn expand(
    host: &mut dyn Host,
    ledger: &mut StyleLedger,
    node: NodeRef,
    marker: &str,
) -> Result<bool, HostError> {
    if !host.has_attribute(node, marker) {
        return Ok(false);
    }
    let previous = ledger.saved.remove(&node).unwrap_or_default();
    for (property, _) in COLLAPSE_STYLES {
        let value = previous
            .iter()
            .find(|(saved, _)| *saved == property)
            .and_then(|(_, value)| value.clone());
        host.set_inline_style(node, property, value.as_deref())?;
    }
    host.remove_attribute(node, marker)?;
    Ok(true)
}

/// How trimmed turns are removed from view.
pub trait TrimStrategy {
    /// Remove `turn` from view.
    ///
    /// # Errors
    ///
    /// Host write failures; the caller counts and skips them.
    fn trim(
        &self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError>;

    /// Bring `turn` back.
    ///
    /// # Errors
    ///
    /// Host write failures; the caller counts and skips them.
    fn restore(
        &self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError>;
}

/// Reversible in-place collapse.
#[derive(Debug, Clone, Copy, Default)]
pub struct HideStrategy;

impl TrimStrategy for HideStrategy {
    fn trim(
        &self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError> {
        let changed = collapse(host, ledger, turn.element, HIDDEN_ATTR, turn.role.as_str())?;
        Ok(if changed {
            TrimOutcome::Applied
        } else {
            TrimOutcome::AlreadyApplied
        })
    }

    fn restore(
        &self,
        host: &mut dyn Host,
        ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError> {
        let changed = expand(host, ledger, turn.element, HIDDEN_ATTR)?;
        Ok(if changed {
            TrimOutcome::Applied
        } else {
            TrimOutcome::AlreadyApplied
        })
    }
}

/// Destructive replacement with an id/role marker; frees the subtree.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderStrategy;

impl TrimStrategy for PlaceholderStrategy {
    fn trim(
        &self,
        host: &mut dyn Host,
        _ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError> {
        if host.has_attribute(turn.element, PLACEHOLDER_ATTR) {
            return Ok(TrimOutcome::AlreadyApplied);
        }
        let tag = host.tag_name(turn.element).unwrap_or_else(|| "div".to_string());
        let mut attributes = vec![
            (MESSAGE_ID_ATTR, turn.stable_id.clone()),
            (AUTHOR_ROLE_ATTR, turn.role.as_str().to_string()),
            (PLACEHOLDER_ATTR, "1".to_string()),
        ];
        if let Some(test_id) = host.attribute(turn.element, TEST_ID_ATTR) {
            attributes.push((TEST_ID_ATTR, test_id));
        }
        host.replace_with_marker(turn.element, &tag, &attributes)?;
        Ok(TrimOutcome::Applied)
    }

    fn restore(
        &self,
        _host: &mut dyn Host,
        _ledger: &mut StyleLedger,
        turn: &RenderedTurn,
    ) -> Result<TrimOutcome, HostError> {
        tracing::info!(
            event = "window.strategy.restore_unsupported",
            turn = %turn.stable_id,
            "placeholder turns cannot be restored without a reload"
        );
        Ok(TrimOutcome::Unsupported)
    }
}

/// Strategy for `mode`.
#[must_use]
pub fn strategy_for(mode: TrimMode) -> &'static dyn TrimStrategy {
    match mode {
        TrimMode::Hide => &HideStrategy,
        TrimMode::Placeholder => &PlaceholderStrategy,
    }
}

#[cfg(test)]
mod tests {
    use omni_types::Role;

    use super::*;
    use crate::document::MemoryDocument;

    fn turn(element: NodeRef) -> RenderedTurn {
        RenderedTurn {
            element,
            role: Role::Assistant,
            stable_id: "m1".to_string(),
            sequence_index: 0,
            visible: true,
            placeholder: false,
        }
    }

    #[test]
    fn hide_round_trips_previous_inline_styles() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let node = doc.append_element(root, "div", &[]);
        doc.set_inline_style(node, "margin", Some("4px")).unwrap();
        let mut ledger = StyleLedger::default();

        let t = turn(node);
        assert_eq!(HideStrategy.trim(&mut doc, &mut ledger, &t), Ok(TrimOutcome::Applied));
        assert_eq!(doc.inline_style(node, "display").as_deref(), Some("none"));
        assert_eq!(HideStrategy.trim(&mut doc, &mut ledger, &t), Ok(TrimOutcome::AlreadyApplied));

        assert_eq!(HideStrategy.restore(&mut doc, &mut ledger, &t), Ok(TrimOutcome::Applied));
        assert_eq!(doc.inline_style(node, "margin").as_deref(), Some("4px"));
        assert_eq!(doc.inline_style(node, "display"), None);
        assert!(!doc.has_attribute(node, HIDDEN_ATTR));
        assert!(ledger.is_empty());
    }

    #[test]
    fn placeholder_replaces_and_cannot_restore() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let node = doc.append_element(root, "article", &[(TEST_ID_ATTR, "conversation-turn-1")]);
        let mut ledger = StyleLedger::default();
        let t = turn(node);

        assert_eq!(PlaceholderStrategy.trim(&mut doc, &mut ledger, &t), Ok(TrimOutcome::Applied));
        assert!(!doc.is_connected(node));
        let marker = doc.find_by_attr(PLACEHOLDER_ATTR, "1").unwrap();
        assert_eq!(doc.attribute(marker, MESSAGE_ID_ATTR).as_deref(), Some("m1"));
        assert_eq!(doc.tag_name(marker).as_deref(), Some("article"));
        assert_eq!(
            PlaceholderStrategy.restore(&mut doc, &mut ledger, &t),
            Ok(TrimOutcome::Unsupported)
        );
    }
}
