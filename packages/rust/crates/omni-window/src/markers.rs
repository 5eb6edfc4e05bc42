//! Attribute names the engine reads from and writes into the host document.

/// Host message id.
pub const MESSAGE_ID_ATTR: &str = "data-message-id";
/// Host author role.
pub const AUTHOR_ROLE_ATTR: &str = "data-message-author-role";
/// Alternate host role attribute.
pub const TURN_ROLE_ATTR: &str = "data-turn";
/// Host test id.
pub const TEST_ID_ATTR: &str = "data-testid";

/// Set on turns collapsed by the hide strategy.
pub const HIDDEN_ATTR: &str = "data-retention-hidden";
/// Set on placeholder markers that replaced a turn.
pub const PLACEHOLDER_ATTR: &str = "data-retention-placeholder";
/// Set on turn shells collapsed by the shell sweep.
pub const SHELL_ATTR: &str = "data-retention-shell";
/// Set on orphan controls collapsed after their turn was trimmed.
pub const CONTROL_ATTR: &str = "data-retention-control";

/// Attributes only the engine writes.
pub const ENGINE_ATTRS: [&str; 4] = [HIDDEN_ATTR, PLACEHOLDER_ATTR, SHELL_ATTR, CONTROL_ATTR];

/// Attribute hosts report inline style changes under.
pub const STYLE_ATTR: &str = "style";

/// Inline properties the collapse writes, with their collapsed values.
pub const COLLAPSE_STYLES: [(&str, &str); 6] = [
    ("display", "none"),
    ("height", "0px"),
    ("min-height", "0px"),
    ("margin", "0px"),
    ("padding", "0px"),
    ("overflow", "hidden"),
];

/// True when `name` is one of the engine's own marker attributes.
#[must_use]
pub fn is_engine_attr(name: &str) -> bool {
    ENGINE_ATTRS.contains(&name)
}
