//! Tiny element matchers. Hosts expose no selector engine, so every query the
//! engine makes is one of these predicates evaluated over [`Host`] reads.

use crate::host::{Host, NodeRef};

/// Element predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Tag name equals (lowercase).
    Tag(&'static str),
    /// Attribute is present.
    HasAttr(&'static str),
    /// Attribute equals value.
    AttrEquals(&'static str, &'static str),
    /// Attribute starts with value.
    AttrPrefix(&'static str, &'static str),
    /// Attribute contains value, ASCII case-insensitive.
    AttrContains(&'static str, &'static str),
    /// Whitespace-separated `class` token.
    ClassToken(&'static str),
    /// Any of the inner matchers.
    AnyOf(&'static [Matcher]),
}

impl Matcher {
    /// Evaluate against one element.
    #[must_use]
    pub fn matches(&self, host: &dyn Host, node: NodeRef) -> bool {
        match *self {
            Self::Tag(tag) => host.tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag)),
            Self::HasAttr(name) => host.has_attribute(node, name),
            Self::AttrEquals(name, value) => host.attribute(node, name).is_some_and(|v| v == value),
            Self::AttrPrefix(name, prefix) => host
                .attribute(node, name)
                .is_some_and(|v| v.starts_with(prefix)),
            Self::AttrContains(name, needle) => host.attribute(node, name).is_some_and(|v| {
                v.to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase())
            }),
            Self::ClassToken(token) => host
                .attribute(node, "class")
                .is_some_and(|class| class.split_whitespace().any(|t| t == token)),
            Self::AnyOf(inner) => inner.iter().any(|m| m.matches(host, node)),
        }
    }

    /// Matching descendants of `scope` in document order, `scope` excluded.
    #[must_use]
    pub fn find_all(&self, host: &dyn Host, scope: NodeRef) -> Vec<NodeRef> {
        host.descendants(scope)
            .into_iter()
            .filter(|&node| self.matches(host, node))
            .collect()
    }

    /// First matching descendant of `scope`.
    #[must_use]
    pub fn find_first(&self, host: &dyn Host, scope: NodeRef) -> Option<NodeRef> {
        host.descendants(scope)
            .into_iter()
            .find(|&node| self.matches(host, node))
    }

    /// True when `scope` itself or any descendant matches.
    #[must_use]
    pub fn any_within(&self, host: &dyn Host, scope: NodeRef) -> bool {
        self.matches(host, scope) || self.find_first(host, scope).is_some()
    }
}

/// Drop every candidate that has another candidate as an ancestor.
#[must_use]
pub fn outermost(host: &dyn Host, candidates: Vec<NodeRef>) -> Vec<NodeRef> {
    let set: std::collections::HashSet<NodeRef> = candidates.iter().copied().collect();
    candidates
        .into_iter()
        .filter(|&node| {
            let mut cursor = host.parent(node);
            while let Some(current) = cursor {
                if set.contains(&current) {
                    return false;
                }
                cursor = host.parent(current);
            }
            true
        })
        .collect()
}
