//! Structural comparison of an edited document against its original.
//!
//! Children are matched by the longest common subsequence, using node
//! identity when the edited document is a clone of the original and shallow
//! equality otherwise. Unmatched children between two matches are paired up
//! by position when they are of the same kind, so a changed text run is
//! seen as modified instead of as a deletion and an insertion.
//!
//! HTML embedded in the `data-mw` of an extension wrapper is compared after
//! a trip through the document writer, so spelling differences in that HTML
//! do not count as changes.
//!
//! Marks are kept in a side table for the serializer’s working copy of the
//! edited document. Every deleted original child leaves a placeholder
//! element in the working copy, so the serializer knows not to reuse the
//! source around it.

use crate::{
    dom::{Document, HtmlOptions, NodeId, NodeKind},
    ext::Registry,
};
use serde_json::Value;
use std::collections::HashMap;

bitflags::bitflags! {
    /// What changed about a node of the edited document.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DiffMarks: u8 {
        /// The node has no counterpart in the original document.
        const INSERTED = 1 << 0;
        /// The content of a wrapper changed, but its `data-mw` did not.
        const MODIFIED_WRAPPER = 1 << 1;
        /// The node itself changed: its name, attributes, text, or
        /// `data-mw`.
        const MODIFIED = 1 << 2;
        /// Something below the node changed.
        const SUBTREE_CHANGED = 1 << 3;
        /// A child was inserted or deleted.
        const CHILDREN_CHANGED = 1 << 4;
    }
}

/// The `typeof` of a deleted-node placeholder.
pub(super) const DELETED: &str = "mw:DiffMarker/deleted";

/// Marks by node of the working copy. Unchanged nodes have no entry.
pub(super) type Marks = HashMap<NodeId, DiffMarks>;

/// Compares `work` against `original`, inserting placeholders for deleted
/// nodes into `work`.
pub(super) fn diff(registry: &Registry, original: &Document, work: &mut Document) -> Marks {
    let mut differ = Differ {
        registry,
        original,
        identity: work.shares_identity_with(original),
        marks: Marks::new(),
    };
    let (old, new) = (original.body(), work.body());
    differ.node(old, work, new);
    log::debug!("{} nodes changed", differ.marks.len());
    differ.marks
}

struct Differ<'a> {
    registry: &'a Registry,
    original: &'a Document,
    /// Node ids are shared between the two documents.
    identity: bool,
    marks: Marks,
}

impl Differ<'_> {
    /// Compares a matched pair of nodes. Returns true if anything changed.
    fn node(&mut self, old: NodeId, work: &mut Document, new: NodeId) -> bool {
        let mut marks = DiffMarks::empty();
        if !self.same_node(old, work, new) {
            marks |= DiffMarks::MODIFIED;
        }

        if work.is_encapsulation_wrapper(new) {
            let options = HtmlOptions::default();
            if !marks.contains(DiffMarks::MODIFIED)
                && self.original.inner_html(old, &options) != work.inner_html(new, &options)
            {
                marks |= DiffMarks::MODIFIED_WRAPPER;
            }
        } else {
            marks |= self.children(old, work, new);
        }

        if marks.is_empty() {
            false
        } else {
            self.marks.insert(new, marks);
            true
        }
    }

    /// Compares the children of a matched pair of nodes.
    fn children(&mut self, old: NodeId, work: &mut Document, new: NodeId) -> DiffMarks {
        let old_children = self.original.children(old).to_vec();
        let new_children = work.children(new).to_vec();
        let matches = lcs(&old_children, &new_children, |a, b| {
            if self.identity {
                a == b
            } else {
                self.same_node(a, work, b)
            }
        });

        let mut marks = DiffMarks::empty();
        let mut deleted = vec![];
        let (mut i, mut j) = (0, 0);
        let end = (old_children.len(), new_children.len());
        for (oi, nj) in matches.into_iter().chain(core::iter::once(end)) {
            let mut olds = old_children[i..oi].iter().copied().peekable();
            let mut news = new_children[j..nj].iter().copied().peekable();
            loop {
                match (olds.peek().copied(), news.peek().copied()) {
                    (Some(o), Some(n)) if same_kind(self.original, o, work, n) => {
                        olds.next();
                        news.next();
                        if self.node(o, work, n) {
                            marks |= DiffMarks::SUBTREE_CHANGED;
                        }
                    }
                    (Some(_), next) => {
                        olds.next();
                        deleted.push(next.or_else(|| new_children.get(nj).copied()));
                        marks |= DiffMarks::CHILDREN_CHANGED;
                    }
                    (None, Some(n)) => {
                        news.next();
                        // A moved node keeps its old range, which no longer
                        // says where it is
                        if work.dsr(n).is_some() {
                            work.data_mut(n).dsr = None;
                        }
                        self.marks.insert(n, DiffMarks::INSERTED);
                        marks |= DiffMarks::CHILDREN_CHANGED;
                    }
                    (None, None) => break,
                }
            }

            if oi < old_children.len() && self.node(old_children[oi], work, new_children[nj]) {
                marks |= DiffMarks::SUBTREE_CHANGED;
            }
            (i, j) = (oi + 1, nj + 1);
        }

        for before in deleted {
            let marker = work.create_element("meta");
            work.set_attr(marker, "typeof", DELETED);
            work.insert_before(new, marker, before);
        }

        if marks.contains(DiffMarks::CHILDREN_CHANGED) {
            marks |= DiffMarks::SUBTREE_CHANGED;
        }
        marks
    }

    /// Returns true if two nodes are the same, not counting their children.
    fn same_node(&self, old: NodeId, work: &Document, new: NodeId) -> bool {
        if self.original.kind(old) != work.kind(new) {
            return false;
        }
        match (self.original.data_mw(old), work.data_mw(new)) {
            (Some(a), Some(b)) if a != b => match (self.normalized_mw(a), self.normalized_mw(b)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (a, b) => a == b,
        }
    }

    /// Rewrites the HTML embedded in the `data-mw` of an extension wrapper.
    fn normalized_mw(&self, mw: &Value) -> Option<Value> {
        let handler = self.registry.get(mw.get("name")?.as_str()?)?;
        let mut mw = mw.clone();
        handler.process_attribute_embedded_dom(&mut mw, &mut |html| match Document::from_html(html) {
            Ok(doc) => *html = doc.inner_html(doc.body(), &HtmlOptions::default()),
            Err(err) => log::debug!("embedded html left as is: {err}"),
        });
        Some(mw)
    }
}

/// Returns true if two nodes can be compared as old and new versions of
/// each other.
fn same_kind(a_doc: &Document, a: NodeId, b_doc: &Document, b: NodeId) -> bool {
    match (a_doc.kind(a), b_doc.kind(b)) {
        (NodeKind::Element(a), NodeKind::Element(b)) => a.name == b.name,
        (NodeKind::Text(_), NodeKind::Text(_)) | (NodeKind::Comment(_), NodeKind::Comment(_)) => true,
        _ => false,
    }
}

/// Finds the longest common subsequence of two lists, as pairs of indices.
fn lcs<T: Copy>(a: &[T], b: &[T], mut eq: impl FnMut(T, T) -> bool) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let mut table = vec![0_usize; (n + 1) * (m + 1)];
    let at = |i: usize, j: usize| i * (m + 1) + j;
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[at(i, j)] = if eq(a[i], b[j]) {
                table[at(i + 1, j + 1)] + 1
            } else {
                table[at(i + 1, j)].max(table[at(i, j + 1)])
            };
        }
    }

    let mut pairs = vec![];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if eq(a[i], b[j]) {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[at(i + 1, j)] >= table[at(i, j + 1)] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(texts: &[&str]) -> Document {
        let mut doc = Document::new();
        for text in texts {
            let p = doc.create_element("p");
            let text = doc.create_text(*text);
            doc.append_child(doc.body(), p);
            doc.append_child(p, text);
        }
        doc
    }

    #[test]
    fn longest_common_subsequence() {
        let pairs = lcs(&[1, 2, 3, 4], &[1, 3, 5, 4], |a, b| a == b);
        assert_eq!(pairs, [(0, 0), (2, 1), (3, 3)]);
        assert!(lcs::<u8>(&[], &[1], |a, b| a == b).is_empty());
    }

    #[test]
    fn identical() {
        let original = paragraphs(&["a", "b"]);
        let mut work = original.clone();
        assert!(diff(&Registry::with_builtins(), &original, &mut work).is_empty());
        let mut work = paragraphs(&["a", "b"]);
        assert!(diff(&Registry::with_builtins(), &original, &mut work).is_empty());
    }

    #[test]
    fn modified_text() {
        let original = paragraphs(&["a", "b"]);
        let mut work = original.clone();
        let p = work.children(work.body())[1];
        let text = work.first_child(p).unwrap();
        if let NodeKind::Text(text) = work.kind_mut(text) {
            *text = "c".into();
        }

        let marks = diff(&Registry::with_builtins(), &original, &mut work);
        assert_eq!(marks.get(&text), Some(&DiffMarks::MODIFIED));
        assert_eq!(marks.get(&p), Some(&DiffMarks::SUBTREE_CHANGED));
        assert_eq!(marks.get(&work.children(work.body())[0]), None);
        assert_eq!(marks.get(&work.body()), Some(&DiffMarks::SUBTREE_CHANGED));
    }

    #[test]
    fn insertions_and_deletions() {
        let original = paragraphs(&["a", "b", "c"]);
        let mut work = original.clone();
        let b = work.children(work.body())[1];
        work.detach(b);
        let h = work.create_element("h2");
        work.append_child(work.body(), h);

        let marks = diff(&Registry::with_builtins(), &original, &mut work);
        let children = work.children(work.body()).to_vec();
        assert_eq!(children.len(), 4);
        assert_eq!(work.attr(children[1], "typeof"), Some(DELETED));
        assert_eq!(marks.get(&h), Some(&DiffMarks::INSERTED));
        assert!(marks[&work.body()].contains(DiffMarks::CHILDREN_CHANGED | DiffMarks::SUBTREE_CHANGED));
    }

    #[test]
    fn embedded_html() {
        let mut original = Document::new();
        let sup = original.create_element("sup");
        original.set_attr(sup, "typeof", "mw:Extension/ref");
        original.set_data_mw(sup, serde_json::json!({ "name": "ref", "body": { "html": "<b class='a'>x</b>" } }));
        original.append_child(original.body(), sup);
        let registry = Registry::with_builtins();

        let mut work = original.clone();
        work.set_data_mw(sup, serde_json::json!({ "name": "ref", "body": { "html": "<b class=\"a\">x</b>" } }));
        assert!(diff(&registry, &original, &mut work).is_empty());

        work.set_data_mw(sup, serde_json::json!({ "name": "ref", "body": { "html": "<b class=\"a\">y</b>" } }));
        assert_eq!(diff(&registry, &original, &mut work).get(&sup), Some(&DiffMarks::MODIFIED));
    }

    #[test]
    fn wrappers() {
        let mut original = Document::new();
        let span = original.create_element("span");
        original.set_attr(span, "typeof", "mw:Transclusion");
        original.set_data_mw(span, serde_json::json!({ "parts": [] }));
        let text = original.create_text("x");
        original.append_child(original.body(), span);
        original.append_child(span, text);

        let mut work = original.clone();
        if let NodeKind::Text(text) = work.kind_mut(text) {
            *text = "y".into();
        }
        let marks = diff(&Registry::with_builtins(), &original, &mut work);
        assert_eq!(marks.get(&span), Some(&DiffMarks::MODIFIED_WRAPPER));
        assert_eq!(marks.get(&text), None);
    }
}
