//! Role classification for located turns.
//!
//! Explicit host attributes win. Without them the structure of the turn is
//! inspected for tool, reasoning and control markers; anything left over is
//! `Unknown`, which counts as visible content but never as a round delimiter.

use omni_types::Role;

use crate::host::{Host, NodeRef};
use crate::markers::{AUTHOR_ROLE_ATTR, MESSAGE_ID_ATTR, TEST_ID_ATTR, TURN_ROLE_ATTR};
use crate::selector::Matcher;

/// Where a role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Role attribute on the turn or its first descendant carrying one.
    Attribute,
    /// Structural marker inside the turn.
    Structural,
    /// Nothing matched.
    Default,
}

const ROLE_ATTRS: [&str; 2] = [AUTHOR_ROLE_ATTR, TURN_ROLE_ATTR];

const TOOL_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::HasAttr("data-tool-call"),
    Matcher::AttrContains(TEST_ID_ATTR, "tool-call"),
    Matcher::AttrContains(TEST_ID_ATTR, "tool-result"),
    Matcher::ClassToken("tool-call"),
]);

const THINKING_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::AttrContains(TEST_ID_ATTR, "reasoning"),
    Matcher::AttrContains(TEST_ID_ATTR, "thinking"),
    Matcher::AttrContains("aria-label", "thought for"),
    Matcher::ClassToken("thinking"),
]);

const ASSISTANT_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::AttrEquals(TEST_ID_ATTR, "copy-turn-action-button"),
    Matcher::AttrContains("aria-label", "copy"),
    Matcher::AttrContains("aria-label", "regenerate"),
    Matcher::AttrEquals("role", "log"),
    Matcher::HasAttr("aria-live"),
]);

const USER_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::AttrContains("aria-label", "edit message"),
    Matcher::AttrContains(TEST_ID_ATTR, "user-message"),
    Matcher::ClassToken("user-message"),
]);

/// Classify one turn element.
#[must_use]
pub fn classify_role(host: &dyn Host, turn: NodeRef) -> (Role, RoleSource) {
    if let Some(role) = attribute_role(host, turn) {
        return (role, RoleSource::Attribute);
    }
    let structural = [
        (TOOL_MARKERS, Role::Tool),
        (THINKING_MARKERS, Role::Thinking),
        (USER_MARKERS, Role::User),
        (ASSISTANT_MARKERS, Role::Assistant),
    ];
    for (matcher, role) in structural {
        if matcher.any_within(host, turn) {
            return (role, RoleSource::Structural);
        }
    }
    tracing::debug!(
        event = "window.locator.role_unknown",
        node = %turn,
        "turn role not recognised; counting as unknown"
    );
    (Role::Unknown, RoleSource::Default)
}

fn attribute_role(host: &dyn Host, turn: NodeRef) -> Option<Role> {
    let on_node = ROLE_ATTRS
        .iter()
        .find_map(|name| host.attribute(turn, name));
    let raw = on_node.or_else(|| {
        host.descendants(turn).into_iter().find_map(|node| {
            ROLE_ATTRS
                .iter()
                .find_map(|name| host.attribute(node, name))
        })
    })?;
    match Role::parse(&raw) {
        Role::Unknown => None,
        role => Some(role),
    }
}

/// Stable id of a turn: host message id, then test id, then the node handle.
#[must_use]
pub fn stable_id(host: &dyn Host, turn: NodeRef) -> String {
    host.attribute(turn, MESSAGE_ID_ATTR)
        .or_else(|| {
            Matcher::HasAttr(MESSAGE_ID_ATTR)
                .find_first(host, turn)
                .and_then(|node| host.attribute(node, MESSAGE_ID_ATTR))
        })
        .or_else(|| host.attribute(turn, TEST_ID_ATTR))
        .unwrap_or_else(|| turn.to_string())
}
