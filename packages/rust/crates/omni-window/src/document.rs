//! In-memory [`Host`] used by the CLI simulator and the test suites.
//!
//! Elements live in an arena and are never freed; a removed element simply
//! loses its parent, so stale [`NodeRef`]s stay safe to query and report
//! `is_connected == false`. Every engine write advances the manual clock by
//! `write_cost_ms`, which lets callers exercise time slicing.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::host::{
    Host, HostError, MutationKind, MutationRecord, NodeRef, ObserverHandle, ScrollMetrics,
};

/// Serialized element tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementFixture {
    /// Tag name.
    pub tag: String,
    /// Attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Inline style properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    /// Own text content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Intrinsic height in pixels, excluding children.
    #[serde(default)]
    pub height: f64,
    /// Marks the conversation scroll container.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scroll_container: bool,
    /// Child elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementFixture>,
}

/// Serialized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFixture {
    /// Viewport height of the scroll container.
    #[serde(default = "default_client_height")]
    pub client_height: f64,
    /// Clock advance per engine write.
    #[serde(default)]
    pub write_cost_ms: u64,
    /// Start scrolled to the bottom.
    #[serde(default = "default_pinned")]
    pub pinned_to_bottom: bool,
    /// Document root element.
    pub body: ElementFixture,
}

fn default_client_height() -> f64 {
    800.0
}

fn default_pinned() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    height: f64,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

#[derive(Debug, Clone)]
struct Observer {
    root: NodeRef,
    records: Vec<MutationRecord>,
}

/// Arena-backed document.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    elements: Vec<Element>,
    root: NodeRef,
    scroll_container: Option<NodeRef>,
    client_height: f64,
    scroll_top: f64,
    clock_ms: u64,
    write_cost_ms: u64,
    observers: BTreeMap<u64, Observer>,
    next_observer: u64,
    writes: usize,
    rejected: HashSet<NodeRef>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Empty document with a `body` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: vec![Element {
                tag: "body".to_string(),
                ..Element::default()
            }],
            root: NodeRef::new(0),
            scroll_container: None,
            client_height: default_client_height(),
            scroll_top: 0.0,
            clock_ms: 0,
            write_cost_ms: 0,
            observers: BTreeMap::new(),
            next_observer: 1,
            writes: 0,
            rejected: HashSet::new(),
        }
    }

    /// Build from a fixture.
    #[must_use]
    pub fn from_fixture(fixture: &DocumentFixture) -> Self {
        let mut doc = Self::new();
        doc.client_height = fixture.client_height;
        doc.write_cost_ms = fixture.write_cost_ms;
        let root = doc.root;
        doc.fill(root, &fixture.body);
        if fixture.pinned_to_bottom {
            doc.scroll_to_bottom();
        }
        doc
    }

    /// Parse a JSON fixture.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed fixtures.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let fixture: DocumentFixture = serde_json::from_str(raw)?;
        Ok(Self::from_fixture(&fixture))
    }

    /// Serialize the connected tree back into a fixture.
    #[must_use]
    pub fn to_fixture(&self) -> DocumentFixture {
        DocumentFixture {
            client_height: self.client_height,
            write_cost_ms: self.write_cost_ms,
            pinned_to_bottom: false,
            body: self.export(self.root),
        }
    }

    /// Root element.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        self.root
    }

    /// Append a child element; observers see a child-list record.
    pub fn append_element(&mut self, parent: NodeRef, tag: &str, attrs: &[(&str, &str)]) -> NodeRef {
        let node = self.alloc(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            parent: Some(parent),
            ..Element::default()
        });
        if let Some(element) = self.element_mut(parent) {
            element.children.push(node);
        }
        self.record(MutationRecord::child_list(parent, vec![node], Vec::new()));
        node
    }

    /// Replace own text; observers see a character-data record.
    pub fn set_text(&mut self, node: NodeRef, text: &str) {
        if let Some(element) = self.element_mut(node) {
            element.text = text.to_string();
            self.record(MutationRecord {
                target: node,
                kind: MutationKind::CharacterData,
            });
        }
    }

    /// Set intrinsic height (layout only, no record).
    pub fn set_height(&mut self, node: NodeRef, height: f64) {
        if let Some(element) = self.element_mut(node) {
            element.height = height;
        }
    }

    /// Host-side attribute write; costs no clock and is observed like any other.
    pub fn host_set_attribute(&mut self, node: NodeRef, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.to_string(), value.to_string());
            self.record(MutationRecord::attribute(node, name));
        }
    }

    /// Host-side attribute removal.
    pub fn host_remove_attribute(&mut self, node: NodeRef, name: &str) {
        if let Some(element) = self.element_mut(node)
            && element.attributes.remove(name).is_some()
        {
            self.record(MutationRecord::attribute(node, name));
        }
    }

    /// Detach `node` from its parent; observers see a child-list record.
    pub fn remove(&mut self, node: NodeRef) {
        let Some(parent) = self.element(node).and_then(|e| e.parent) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|&child| child != node);
        }
        if let Some(element) = self.element_mut(node) {
            element.parent = None;
        }
        self.record(MutationRecord::child_list(parent, Vec::new(), vec![node]));
    }

    /// Mark the conversation scroll container.
    pub fn set_scroll_container(&mut self, node: NodeRef, client_height: f64) {
        self.scroll_container = Some(node);
        self.client_height = client_height;
    }

    /// Pin the scroll container to the bottom.
    pub fn scroll_to_bottom(&mut self) {
        if let Some(metrics) = self.scroll_container.and_then(|c| self.scroll_metrics(c)) {
            self.scroll_top = metrics.max_scroll_top();
        }
    }

    /// Reader scroll (not an engine write).
    pub fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top.max(0.0);
    }

    /// Current clamped scroll offset.
    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        self.scroll_container
            .and_then(|c| self.scroll_metrics(c))
            .map_or(0.0, |m| m.scroll_top)
    }

    /// Advance the manual clock.
    pub fn advance(&mut self, ms: u64) {
        self.clock_ms = self.clock_ms.saturating_add(ms);
    }

    /// Set the manual clock.
    pub fn set_now(&mut self, ms: u64) {
        self.clock_ms = ms;
    }

    /// Clock advance per engine write.
    pub fn set_write_cost(&mut self, ms: u64) {
        self.write_cost_ms = ms;
    }

    /// Engine writes performed so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Make every engine write to `node` fail with [`HostError::Rejected`].
    pub fn reject_writes_on(&mut self, node: NodeRef) {
        self.rejected.insert(node);
    }

    /// First connected element whose attribute `name` equals `value`.
    #[must_use]
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeRef> {
        self.descendants(self.root)
            .into_iter()
            .find(|&node| self.attribute(node, name).is_some_and(|v| v == value))
    }

    /// Queued records of an observer, without draining.
    #[must_use]
    pub fn queued_records(&self, handle: ObserverHandle) -> usize {
        self.observers.get(&handle.raw()).map_or(0, |o| o.records.len())
    }

    fn fill(&mut self, node: NodeRef, fixture: &ElementFixture) {
        if let Some(element) = self.element_mut(node) {
            element.tag = fixture.tag.to_ascii_lowercase();
            element.attributes.clone_from(&fixture.attributes);
            element.styles.clone_from(&fixture.style);
            element.text.clone_from(&fixture.text);
            element.height = fixture.height;
        }
        if fixture.scroll_container {
            self.scroll_container = Some(node);
        }
        for child in &fixture.children {
            let child_ref = self.alloc(Element {
                parent: Some(node),
                ..Element::default()
            });
            if let Some(element) = self.element_mut(node) {
                element.children.push(child_ref);
            }
            self.fill(child_ref, child);
        }
    }

    fn export(&self, node: NodeRef) -> ElementFixture {
        let Some(element) = self.element(node) else {
            return ElementFixture::default();
        };
        ElementFixture {
            tag: element.tag.clone(),
            attributes: element.attributes.clone(),
            style: element.styles.clone(),
            text: element.text.clone(),
            height: element.height,
            scroll_container: self.scroll_container == Some(node),
            children: element.children.iter().map(|&c| self.export(c)).collect(),
        }
    }

    fn alloc(&mut self, element: Element) -> NodeRef {
        let node = NodeRef::new(self.elements.len() as u64);
        self.elements.push(element);
        node
    }

    fn element(&self, node: NodeRef) -> Option<&Element> {
        usize::try_from(node.raw())
            .ok()
            .and_then(|index| self.elements.get(index))
    }

    fn element_mut(&mut self, node: NodeRef) -> Option<&mut Element> {
        usize::try_from(node.raw())
            .ok()
            .and_then(|index| self.elements.get_mut(index))
    }

    fn layout_height(&self, node: NodeRef) -> f64 {
        let Some(element) = self.element(node) else {
            return 0.0;
        };
        if !self.is_rendered(node) {
            return 0.0;
        }
        element.height
            + element
                .children
                .iter()
                .map(|&child| self.layout_height(child))
                .sum::<f64>()
    }

    fn subtree_text_len(&self, node: NodeRef) -> usize {
        self.element(node).map_or(0, |element| {
            element.text.chars().count()
                + element
                    .children
                    .iter()
                    .map(|&child| self.subtree_text_len(child))
                    .sum::<usize>()
        })
    }

    fn record(&mut self, record: MutationRecord) {
        let roots: Vec<(u64, NodeRef)> = self.observers.iter().map(|(k, o)| (*k, o.root)).collect();
        for (key, root) in roots {
            if self.contains(root, record.target)
                && let Some(observer) = self.observers.get_mut(&key)
            {
                observer.records.push(record.clone());
            }
        }
    }

    fn begin_write(&mut self, node: NodeRef) -> Result<(), HostError> {
        if !self.is_connected(node) {
            return Err(HostError::Detached(node));
        }
        if self.rejected.contains(&node) {
            return Err(HostError::Rejected {
                node,
                reason: "write rejected by document".to_string(),
            });
        }
        self.clock_ms = self.clock_ms.saturating_add(self.write_cost_ms);
        self.writes += 1;
        Ok(())
    }
}

impl Host for MemoryDocument {
    fn now_ms(&self) -> u64 {
        self.clock_ms
    }

    fn document_root(&self) -> NodeRef {
        self.root
    }

    fn is_connected(&self, node: NodeRef) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.element(current).and_then(|e| e.parent);
        }
        false
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.element(node).and_then(|e| e.parent)
    }

    fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.element(node).map(|e| e.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: NodeRef) -> Option<String> {
        self.element(node).map(|e| e.tag.clone())
    }

    fn attribute(&self, node: NodeRef, name: &str) -> Option<String> {
        self.element(node).and_then(|e| e.attributes.get(name).cloned())
    }

    fn text_len(&self, node: NodeRef) -> usize {
        self.subtree_text_len(node)
    }

    fn box_height(&self, node: NodeRef) -> f64 {
        if self.is_connected(node) {
            self.layout_height(node)
        } else {
            0.0
        }
    }

    fn inline_style(&self, node: NodeRef, property: &str) -> Option<String> {
        self.element(node).and_then(|e| e.styles.get(property).cloned())
    }

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) -> Result<(), HostError> {
        self.begin_write(node)?;
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.to_string(), value.to_string());
        }
        self.record(MutationRecord::attribute(node, name));
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeRef, name: &str) -> Result<(), HostError> {
        self.begin_write(node)?;
        let removed = self
            .element_mut(node)
            .and_then(|element| element.attributes.remove(name))
            .is_some();
        if removed {
            self.record(MutationRecord::attribute(node, name));
        }
        Ok(())
    }

    fn set_inline_style(
        &mut self,
        node: NodeRef,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), HostError> {
        self.begin_write(node)?;
        if let Some(element) = self.element_mut(node) {
            match value {
                Some(value) => {
                    element.styles.insert(property.to_string(), value.to_string());
                }
                None => {
                    element.styles.remove(property);
                }
            }
        }
        self.record(MutationRecord::attribute(node, "style"));
        Ok(())
    }

    fn replace_with_marker(
        &mut self,
        node: NodeRef,
        tag: &str,
        attributes: &[(&str, String)],
    ) -> Result<NodeRef, HostError> {
        self.begin_write(node)?;
        let parent = self.parent(node).ok_or(HostError::Detached(node))?;
        let marker = self.alloc(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            parent: Some(parent),
            ..Element::default()
        });
        if let Some(element) = self.element_mut(parent) {
            for child in &mut element.children {
                if *child == node {
                    *child = marker;
                }
            }
        }
        if let Some(element) = self.element_mut(node) {
            element.parent = None;
        }
        self.record(MutationRecord::child_list(parent, vec![marker], vec![node]));
        Ok(marker)
    }

    fn scroll_container(&self) -> Option<NodeRef> {
        self.scroll_container.filter(|&c| self.is_connected(c))
    }

    fn scroll_metrics(&self, container: NodeRef) -> Option<ScrollMetrics> {
        if self.scroll_container != Some(container) || !self.is_connected(container) {
            return None;
        }
        let scroll_height = self.layout_height(container).max(self.client_height);
        let mut metrics = ScrollMetrics {
            scroll_top: 0.0,
            scroll_height,
            client_height: self.client_height,
        };
        metrics.scroll_top = self.scroll_top.clamp(0.0, metrics.max_scroll_top());
        Some(metrics)
    }

    fn set_scroll_top(&mut self, container: NodeRef, top: f64) -> Result<(), HostError> {
        let metrics = self
            .scroll_metrics(container)
            .ok_or(HostError::Detached(container))?;
        self.scroll_top = top.clamp(0.0, metrics.max_scroll_top());
        Ok(())
    }

    fn observe(&mut self, root: NodeRef) -> Result<ObserverHandle, HostError> {
        if !self.is_connected(root) {
            return Err(HostError::ObserverUnavailable(format!("{root} is detached")));
        }
        let handle = ObserverHandle::new(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            handle.raw(),
            Observer {
                root,
                records: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn disconnect(&mut self, handle: ObserverHandle) {
        self.observers.remove(&handle.raw());
    }

    fn is_observing(&self, handle: ObserverHandle) -> bool {
        self.observers.contains_key(&handle.raw())
    }

    fn take_records(&mut self, handle: ObserverHandle) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&handle.raw())
            .map(|observer| std::mem::take(&mut observer.records))
            .unwrap_or_default()
    }
}
