//! Message Locator: tiered discovery of rendered turns under a scope root.
//!
//! Tiers are tried from most to least specific and the first one clearing its
//! minimum candidate count wins. Results are cached per (scope, cost) for a
//! short TTL; bumping the epoch drops every entry at once.

use std::collections::HashMap;

use omni_types::{ConfidenceTier, Role};

use crate::classify::{classify_role, stable_id};
use crate::host::{Host, NodeRef};
use crate::markers::{AUTHOR_ROLE_ATTR, HIDDEN_ATTR, MESSAGE_ID_ATTR, PLACEHOLDER_ATTR, TEST_ID_ATTR};
use crate::selector::{Matcher, outermost};

/// One rendered message. Holds only a weak element handle.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTurn {
    /// Host element.
    pub element: NodeRef,
    /// Classified role.
    pub role: Role,
    /// Host id or a handle-derived fallback.
    pub stable_id: String,
    /// Document-order position within the located set.
    pub sequence_index: usize,
    /// False when hidden or replaced by this engine.
    pub visible: bool,
    /// True for placeholder markers standing in for a removed turn.
    pub placeholder: bool,
}

impl RenderedTurn {
    /// True while the element is still attached.
    #[must_use]
    pub fn is_live(&self, host: &dyn Host) -> bool {
        host.is_connected(self.element)
    }
}

/// How much layout work a locate pass may force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocateCost {
    /// No box measurements (boot mode).
    Cheap,
    /// Height filter enabled.
    Full,
}

/// Locate output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocateResult {
    /// Turns in document order.
    pub turns: Vec<RenderedTurn>,
    /// Tier that produced them.
    pub tier: ConfidenceTier,
}

impl LocateResult {
    /// True when no tier recognised the layout.
    #[must_use]
    pub fn is_unrecognized(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Locator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorSettings {
    /// Cache lifetime.
    pub cache_ttl_ms: u64,
    /// Minimum text length of a structural candidate.
    pub min_text_len: usize,
    /// Structural candidates taller than this share of the page are layout chrome.
    pub max_height_fraction: f64,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 50,
            min_text_len: 1,
            max_height_fraction: 0.9,
        }
    }
}

struct SelectorTier {
    tier: ConfidenceTier,
    matcher: Matcher,
    min_candidates: usize,
}

const SELECTOR_TIERS: [SelectorTier; 2] = [
    SelectorTier {
        tier: ConfidenceTier::MessageAttributes,
        matcher: Matcher::AnyOf(&[
            Matcher::HasAttr(MESSAGE_ID_ATTR),
            Matcher::HasAttr(AUTHOR_ROLE_ATTR),
        ]),
        min_candidates: 1,
    },
    SelectorTier {
        tier: ConfidenceTier::TestIdAria,
        matcher: Matcher::AnyOf(&[
            Matcher::AttrPrefix(TEST_ID_ATTR, "conversation-turn-"),
            Matcher::Tag("article"),
        ]),
        min_candidates: 2,
    },
];

const STRUCTURAL_MIN_CANDIDATES: usize = 2;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: LocateResult,
    cached_at_ms: u64,
    epoch: u64,
}

/// Cached, tiered turn locator.
#[derive(Debug, Clone)]
pub struct MessageLocator {
    settings: LocatorSettings,
    cache: HashMap<(NodeRef, LocateCost), CacheEntry>,
    epoch: u64,
}

impl MessageLocator {
    /// Locator with the given tuning.
    #[must_use]
    pub fn new(settings: LocatorSettings) -> Self {
        Self {
            settings,
            cache: HashMap::new(),
            epoch: 0,
        }
    }

    /// Current cache epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every cached result.
    pub fn invalidate_all(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.cache.clear();
    }

    /// Locate turns under `scope`.
    pub fn locate(
        &mut self,
        host: &dyn Host,
        scope: NodeRef,
        now_ms: u64,
        cost: LocateCost,
    ) -> LocateResult {
        let key = (scope, cost);
        if let Some(entry) = self.cache.get(&key)
            && entry.epoch == self.epoch
            && now_ms.saturating_sub(entry.cached_at_ms) < self.settings.cache_ttl_ms
            && entry.result.turns.iter().all(|turn| turn.is_live(host))
        {
            tracing::trace!(event = "window.locator.cache_hit", scope = %scope, "locator cache hit");
            return entry.result.clone();
        }

        let result = self.locate_uncached(host, scope, cost);
        tracing::debug!(
            event = "window.locator.located",
            scope = %scope,
            tier = result.tier.as_str(),
            turns = result.turns.len(),
            "located rendered turns"
        );
        self.cache.insert(
            key,
            CacheEntry {
                result: result.clone(),
                cached_at_ms: now_ms,
                epoch: self.epoch,
            },
        );
        result
    }

    fn locate_uncached(&self, host: &dyn Host, scope: NodeRef, cost: LocateCost) -> LocateResult {
        if !host.is_connected(scope) {
            return LocateResult::default();
        }
        for tier in &SELECTOR_TIERS {
            let candidates = outermost(host, tier.matcher.find_all(host, scope));
            // Placeholders carry tier attributes but cannot qualify a tier alone.
            let live = candidates
                .iter()
                .filter(|&&node| !host.has_attribute(node, PLACEHOLDER_ATTR))
                .count();
            if live >= tier.min_candidates {
                return build_result(host, candidates, tier.tier);
            }
        }
        let candidates = self.structural_candidates(host, scope, cost);
        if candidates.len() >= STRUCTURAL_MIN_CANDIDATES {
            return build_result(host, candidates, ConfidenceTier::Structural);
        }
        LocateResult::default()
    }

    fn structural_candidates(&self, host: &dyn Host, scope: NodeRef, cost: LocateCost) -> Vec<NodeRef> {
        let min_text = self.settings.min_text_len;
        let engine_marked =
            |node: NodeRef| host.has_attribute(node, HIDDEN_ATTR) || host.has_attribute(node, PLACEHOLDER_ATTR);
        let counts_as_content =
            |node: NodeRef| engine_marked(node) || host.text_len(node) >= min_text;

        let mut best: Option<(NodeRef, usize)> = None;
        for list in std::iter::once(scope).chain(host.descendants(scope)) {
            let dense = host
                .children(list)
                .into_iter()
                .filter(|&child| counts_as_content(child))
                .count();
            if dense > best.map_or(0, |(_, n)| n) {
                best = Some((list, dense));
            }
        }
        let Some((list, _)) = best else {
            return Vec::new();
        };

        let page_height = match cost {
            LocateCost::Cheap => None,
            LocateCost::Full => host
                .scroll_container()
                .and_then(|c| host.scroll_metrics(c))
                .map(|m| m.scroll_height),
        };
        host.children(list)
            .into_iter()
            .filter(|&child| {
                if engine_marked(child) {
                    return true;
                }
                if host.text_len(child) < min_text || !host.is_rendered(child) {
                    return false;
                }
                page_height.is_none_or(|page| {
                    host.box_height(child) < page * self.settings.max_height_fraction
                })
            })
            .collect()
    }
}

impl Default for MessageLocator {
    fn default() -> Self {
        Self::new(LocatorSettings::default())
    }
}

fn build_result(host: &dyn Host, elements: Vec<NodeRef>, tier: ConfidenceTier) -> LocateResult {
    let turns = elements
        .into_iter()
        .enumerate()
        .map(|(sequence_index, element)| {
            let placeholder = host.has_attribute(element, PLACEHOLDER_ATTR);
            let role = if placeholder {
                host.attribute(element, AUTHOR_ROLE_ATTR)
                    .map_or(Role::Unknown, |raw| Role::parse(&raw))
            } else {
                classify_role(host, element).0
            };
            RenderedTurn {
                element,
                role,
                stable_id: stable_id(host, element),
                sequence_index,
                visible: !placeholder && !host.has_attribute(element, HIDDEN_ATTR),
                placeholder,
            }
        })
        .collect();
    LocateResult { turns, tier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;

    fn article_doc(count: usize) -> (MemoryDocument, NodeRef) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let main = doc.append_element(root, "main", &[]);
        for i in 0..count {
            let id = format!("conversation-turn-{i}");
            let turn = doc.append_element(main, "article", &[(TEST_ID_ATTR, &id)]);
            doc.set_text(turn, "text");
        }
        (doc, main)
    }

    #[test]
    fn test_id_tier_needs_two_candidates() {
        let (doc, main) = article_doc(1);
        let mut locator = MessageLocator::default();
        let result = locator.locate(&doc, main, 0, LocateCost::Cheap);
        assert_eq!(result.tier, ConfidenceTier::None);
        assert!(result.is_unrecognized());

        let (doc, main) = article_doc(3);
        let result = MessageLocator::default().locate(&doc, main, 0, LocateCost::Cheap);
        assert_eq!(result.tier, ConfidenceTier::TestIdAria);
        assert_eq!(result.turns.len(), 3);
    }

    #[test]
    fn cache_expires_and_epoch_invalidates() {
        let (mut doc, main) = article_doc(2);
        let mut locator = MessageLocator::default();
        assert_eq!(locator.locate(&doc, main, 0, LocateCost::Full).turns.len(), 2);

        let extra = doc.append_element(main, "article", &[]);
        doc.set_text(extra, "more");
        assert_eq!(locator.locate(&doc, main, 10, LocateCost::Full).turns.len(), 2);
        assert_eq!(locator.locate(&doc, main, 60, LocateCost::Full).turns.len(), 3);

        let another = doc.append_element(main, "article", &[]);
        doc.set_text(another, "again");
        locator.invalidate_all();
        assert_eq!(locator.locate(&doc, main, 61, LocateCost::Full).turns.len(), 4);
    }

    #[test]
    fn detached_turn_is_a_cache_miss() {
        let (mut doc, main) = article_doc(3);
        let mut locator = MessageLocator::default();
        let first = locator.locate(&doc, main, 0, LocateCost::Cheap);
        doc.remove(first.turns[0].element);
        assert_eq!(locator.locate(&doc, main, 1, LocateCost::Cheap).turns.len(), 2);
    }

    #[test]
    fn nested_matches_reduce_to_outermost() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let outer = doc.append_element(root, "div", &[(MESSAGE_ID_ATTR, "a")]);
        doc.append_element(outer, "div", &[(AUTHOR_ROLE_ATTR, "user")]);
        let result = MessageLocator::default().locate(&doc, root, 0, LocateCost::Cheap);
        assert_eq!(result.turns.len(), 1);
        assert_eq!(result.turns[0].element, outer);
        assert_eq!(result.turns[0].role, Role::User);
    }
}
