//! An arena-based DOM with a provenance side table.
//!
//! Nodes are addressed by [`NodeId`]; relationships are indices, not
//! references. The round-trip record of each node ([`DataParsoid`]) and any
//! extension metadata (`data-mw`) live in side tables keyed by node id rather
//! than in the attribute list, so the HTML and the provenance data can be
//! written out and read back independently.

pub use bundle::PageBundle;
pub use data::{DataParsoid, DomSourceRange, Syntax};
use crate::wikitext::OffsetType;
use indexmap::IndexMap;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

mod bundle;
mod data;
mod html;

pub use html::HtmlOptions;

/// A source of unique document generations.
static GENERATION: AtomicU64 = AtomicU64::new(1);

/// A type-safe index into a [`Document`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: NodeId = NodeId(0);
}

/// Element data.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    /// The lowercase local name.
    pub name: String,
    /// Attributes, in insertion order.
    pub attributes: IndexMap<String, String>,
}

/// The kind of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// The root of a detached fragment.
    DocumentFragment,
    /// An element.
    Element(Element),
    /// Text content.
    Text(String),
    /// A comment.
    Comment(String),
}

impl NodeKind {
    /// Returns true for nodes which hold character data (text and
    /// comments).
    #[inline]
    pub fn contains_character_data(&self) -> bool {
        matches!(self, NodeKind::Text(_) | NodeKind::Comment(_))
    }
}

/// A node in the arena.
#[derive(Clone, Debug, PartialEq)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A document or document fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// All nodes ever created, attached or not.
    nodes: Vec<Node>,
    /// The node which contains the page content.
    body: NodeId,
    /// Round-trip records.
    data: HashMap<NodeId, DataParsoid>,
    /// Extension metadata.
    mw: HashMap<NodeId, serde_json::Value>,
    /// Identifies the lineage of this document. Clones share a generation,
    /// so node ids are comparable between a document and its clones.
    generation: u64,
    /// The unit used by the source ranges in this document.
    pub offset_type: OffsetType,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document containing an empty `<body>`.
    pub fn new() -> Self {
        let mut doc = Self::with_root(NodeKind::Document);
        let body = doc.create_element("body");
        doc.append_child(NodeId::ROOT, body);
        doc.body = body;
        doc
    }

    /// Creates an empty document fragment.
    pub fn fragment() -> Self {
        Self::with_root(NodeKind::DocumentFragment)
    }

    fn with_root(kind: NodeKind) -> Self {
        Self {
            nodes: vec![Node {
                kind,
                parent: None,
                children: vec![],
            }],
            body: NodeId::ROOT,
            data: HashMap::new(),
            mw: HashMap::new(),
            generation: GENERATION.fetch_add(1, Ordering::Relaxed),
            offset_type: OffsetType::Byte,
        }
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// The node which contains the content: `<body>` for documents, or the
    /// root for fragments.
    #[inline]
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Returns true if node ids in `other` refer to the same nodes as in
    /// this document, because one was cloned from the other.
    #[inline]
    pub fn shares_identity_with(&self, other: &Document) -> bool {
        self.generation == other.generation
    }

    /// Returns true if `id` was allocated by this document.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: vec![],
        });
        id
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Element(Element {
            name: name.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Creates a detached comment.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// The kind of the node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// The mutable kind of the node.
    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    /// The element data, if the node is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The mutable element data, if the node is an element.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.kind_mut(id) {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The element name, if the node is an element.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    /// Returns true if the node is an element with one of the given names.
    pub fn is_element(&self, id: NodeId, names: &[&str]) -> bool {
        self.name(id).is_some_and(|name| names.contains(&name))
    }

    /// The text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true if the node is a comment.
    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Comment(_))
    }

    /// Gets an attribute value.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    /// Sets an attribute value.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)
            .and_then(|element| element.attributes.shift_remove(name))
    }

    /// Returns true if the space-separated `typeof` attribute contains a
    /// word starting with `prefix`.
    pub fn has_type_of(&self, id: NodeId, prefix: &str) -> bool {
        self.type_of(id, prefix).is_some()
    }

    /// Finds the first word of the `typeof` attribute starting with
    /// `prefix`.
    pub fn type_of(&self, id: NodeId, prefix: &str) -> Option<&str> {
        self.attr(id, "typeof")?
            .split_ascii_whitespace()
            .find(|word| word.starts_with(prefix))
    }

    /// Returns true if the node is an atomic wrapper around content
    /// generated by a template or extension.
    pub fn is_encapsulation_wrapper(&self, id: NodeId) -> bool {
        self.has_type_of(id, "mw:Transclusion") || self.has_type_of(id, "mw:Extension/")
    }

    /// The parent of the node.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The children of the node.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The first child of the node.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// The last child of the node.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// The position of the node in its parent.
    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// The next sibling of the node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// The previous sibling of the node.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        index
            .checked_sub(1)
            .and_then(|index| self.children(parent).get(index).copied())
    }

    /// Iterates over the ancestors of the node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.parent(id), |id| self.parent(*id))
    }

    /// Collects the descendants of the node in document order, excluding
    /// the node itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = self.children(id).iter().rev().copied().collect::<Vec<_>>();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Detaches the node from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Appends `child` to `parent`, detaching it from its old parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Inserts `child` into `parent` before `reference`, or at the end if
    /// there is no reference node.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|reference| children.iter().position(|id| *id == reference))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Inserts `child` into the parent of `reference`, after it.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) {
        if let Some(parent) = self.parent(reference) {
            let next = self.next_sibling(reference);
            self.insert_before(parent, child, next);
        }
    }

    /// Concatenates all text below the node.
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeKind::Text(text) = self.kind(id) {
            return text.clone();
        }

        self.descendants(id)
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    /// The round-trip record of the node, if it has one.
    #[inline]
    pub fn data(&self, id: NodeId) -> Option<&DataParsoid> {
        self.data.get(&id)
    }

    /// The round-trip record of the node, created if it does not exist.
    pub fn data_mut(&mut self, id: NodeId) -> &mut DataParsoid {
        self.data.entry(id).or_default()
    }

    /// Replaces the round-trip record of the node.
    pub fn set_data(&mut self, id: NodeId, data: DataParsoid) {
        self.data.insert(id, data);
    }

    /// The source range of the node, if it has a reliable one.
    pub fn dsr(&self, id: NodeId) -> Option<DomSourceRange> {
        self.data(id).and_then(|data| data.dsr)
    }

    /// The extension metadata of the node.
    #[inline]
    pub fn data_mw(&self, id: NodeId) -> Option<&serde_json::Value> {
        self.mw.get(&id)
    }

    /// Replaces the extension metadata of the node.
    pub fn set_data_mw(&mut self, id: NodeId, value: serde_json::Value) {
        self.mw.insert(id, value);
    }

    /// Deep-copies a node from another document into this one, returning
    /// the new detached node. Round-trip records are copied without source
    /// ranges, since those belong to the other document’s source.
    pub fn import(&mut self, other: &Document, id: NodeId) -> NodeId {
        let kind = match other.kind(id) {
            NodeKind::Document | NodeKind::DocumentFragment => NodeKind::DocumentFragment,
            kind => kind.clone(),
        };
        let copy = self.alloc(kind);
        if let Some(data) = other.data(id) {
            self.data.insert(
                copy,
                DataParsoid {
                    dsr: None,
                    tsr: None,
                    end_tsr: None,
                    ..data.clone()
                },
            );
        }
        if let Some(mw) = other.data_mw(id) {
            self.mw.insert(copy, mw.clone());
        }
        for child in other.children(id) {
            let child = self.import(other, *child);
            self.append_child(copy, child);
        }
        copy
    }

    /// Drops every source range in the subtree rooted at `id`, including
    /// `id` itself.
    pub fn clear_dsr(&mut self, id: NodeId) {
        for node in core::iter::once(id).chain(self.descendants(id)) {
            if let Some(data) = self.data.get_mut(&node) {
                data.dsr = None;
            }
        }
    }
}
