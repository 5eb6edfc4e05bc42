//! Post-batch cleanup: turn shells and orphan controls.
//!
//! Hosts wrap each message in one or more shell elements and render some
//! controls (retry, regenerate, model switch) outside the message itself.
//! Once turns are collapsed those leftovers still take space, so they are
//! collapsed too, and expanded again when a visible turn returns.

use std::collections::HashMap;

use crate::guards::STREAMING_MARKERS;
use crate::host::{Host, NodeRef};
use crate::locator::RenderedTurn;
use crate::markers::{CONTROL_ATTR, MESSAGE_ID_ATTR, SHELL_ATTR, TEST_ID_ATTR};
use crate::selector::Matcher;
use crate::strategy::{StyleLedger, collapse, expand};

/// Controls tied to a message.
pub const ORPHAN_CONTROL_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::AttrContains("aria-label", "retry"),
    Matcher::AttrContains("aria-label", "regenerate"),
    Matcher::AttrContains("aria-label", "switch model"),
    Matcher::AttrEquals(TEST_ID_ATTR, "regenerate-turn-action-button"),
    Matcher::AttrEquals(TEST_ID_ATTR, "model-switcher-dropdown-button"),
]);

/// Attributes a control may use to reference its message.
const CONTROL_REFERENCE_ATTRS: [&str; 3] = [MESSAGE_ID_ATTR, "data-turn-id", "aria-controls"];

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Elements collapsed.
    pub collapsed: usize,
    /// Elements expanded again.
    pub restored: usize,
    /// Host write failures.
    pub failed: usize,
}

impl SweepReport {
    fn count(&mut self, result: Result<bool, crate::host::HostError>, collapsing: bool) {
        match result {
            Ok(true) if collapsing => self.collapsed += 1,
            Ok(true) => self.restored += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(event = "window.sweep.write_failed", error = %err, "sweep write failed");
                self.failed += 1;
            }
        }
    }
}

/// Lowest element containing every node in `nodes`.
#[must_use]
pub fn common_ancestor(host: &dyn Host, nodes: &[NodeRef]) -> Option<NodeRef> {
    let (first, rest) = nodes.split_first()?;
    let mut chain = Vec::new();
    let mut cursor = host.parent(*first);
    while let Some(node) = cursor {
        chain.push(node);
        cursor = host.parent(node);
    }
    // chain runs from the nearest parent up; keep the deepest one containing all
    chain
        .into_iter()
        .find(|&candidate| rest.iter().all(|&node| host.contains(candidate, node)))
}

/// Collapse shells that hold no visible turn; expand ones that hold one again.
pub fn sweep_shells(
    host: &mut dyn Host,
    ledger: &mut StyleLedger,
    turns: &[RenderedTurn],
) -> SweepReport {
    let mut report = SweepReport::default();
    let live: Vec<&RenderedTurn> = turns.iter().filter(|t| t.is_live(&*host)).collect();
    let elements: Vec<NodeRef> = live.iter().map(|t| t.element).collect();
    let Some(list) = common_ancestor(host, &elements) else {
        return report;
    };

    let shells = host.children(list);
    // Shells after the last one holding a visible turn are the live tail: a
    // reply shell the host inserted before its message streams in.
    let tail_start = shells
        .iter()
        .rposition(|&shell| {
            live.iter()
                .any(|t| t.visible && (t.element == shell || host.contains(shell, t.element)))
        })
        .map_or(shells.len(), |index| index + 1);

    for (index, shell) in shells.into_iter().enumerate() {
        if elements.contains(&shell) {
            continue;
        }
        let held: Vec<&&RenderedTurn> = live
            .iter()
            .filter(|t| host.contains(shell, t.element))
            .collect();
        let has_visible = held.iter().any(|t| t.visible);
        let streaming = STREAMING_MARKERS.any_within(host, shell);
        let tail = index >= tail_start;
        if has_visible || streaming || (tail && held.is_empty()) {
            report.count(expand(host, ledger, shell, SHELL_ATTR), false);
            continue;
        }
        let empty_spacer = held.is_empty() && host.text_len(shell) == 0;
        if !held.is_empty() || empty_spacer {
            report.count(collapse(host, ledger, shell, SHELL_ATTR, "1"), true);
        }
    }
    report
}

/// Collapse retry/regenerate/model controls that no visible turn owns.
pub fn sweep_orphan_controls(
    host: &mut dyn Host,
    ledger: &mut StyleLedger,
    scope: NodeRef,
    turns: &[RenderedTurn],
) -> SweepReport {
    let mut report = SweepReport::default();
    let controls = ORPHAN_CONTROL_MARKERS.find_all(host, scope);
    if controls.is_empty() {
        return report;
    }
    let order: HashMap<NodeRef, usize> = host
        .descendants(scope)
        .into_iter()
        .enumerate()
        .map(|(position, node)| (node, position))
        .collect();
    let last_visible = turns
        .iter()
        .rev()
        .find(|t| t.visible)
        .and_then(|t| order.get(&t.element).copied());

    for control in controls {
        let inside = turns.iter().find(|t| host.contains(t.element, control));
        if inside.is_some_and(|t| !t.visible) {
            // collapsed along with its turn
            continue;
        }
        let referenced = CONTROL_REFERENCE_ATTRS
            .iter()
            .filter_map(|attr| host.attribute(control, attr))
            .any(|id| turns.iter().any(|t| t.visible && t.stable_id == id));
        let tied = inside.is_some() || referenced;
        let referencing_hidden = CONTROL_REFERENCE_ATTRS
            .iter()
            .filter_map(|attr| host.attribute(control, attr))
            .any(|id| turns.iter().any(|t| !t.visible && t.stable_id == id));
        let follows_visible = last_visible
            .zip(order.get(&control).copied())
            .is_some_and(|(anchor, position)| position > anchor);

        if tied || (!referencing_hidden && follows_visible) {
            report.count(expand(host, ledger, control, CONTROL_ATTR), false);
        } else {
            report.count(collapse(host, ledger, control, CONTROL_ATTR, "1"), true);
        }
    }
    report
}
