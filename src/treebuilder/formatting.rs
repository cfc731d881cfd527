//! The list of active formatting elements.

use super::stack::OpenElements;
use crate::dom::{Document, NodeId};

/// Elements which are re-opened when content follows their implicit close.
pub(super) const FORMATTING: &[&str] = &[
    "b", "big", "code", "em", "font", "i", "nobr", "s", "small", "strike", "strong", "tt", "u",
];

/// An entry in the list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Entry {
    /// The start of a table cell or caption. Formatting never crosses one.
    Marker,
    /// A formatting element.
    Element(NodeId),
}

/// The list of active formatting elements.
#[derive(Debug, Default)]
pub(super) struct ActiveFormatting {
    items: Vec<Entry>,
}

impl ActiveFormatting {
    /// Adds a formatting element.
    pub fn push(&mut self, id: NodeId) {
        self.items.push(Entry::Element(id));
    }

    /// Adds a marker.
    pub fn push_marker(&mut self) {
        self.items.push(Entry::Marker);
    }

    /// Removes everything up to and including the last marker.
    pub fn clear_to_marker(&mut self) {
        while let Some(entry) = self.items.pop() {
            if entry == Entry::Marker {
                break;
            }
        }
    }

    /// Removes an element.
    pub fn remove(&mut self, id: NodeId) {
        self.items.retain(|entry| *entry != Entry::Element(id));
    }

    /// Finds the last element named `name` after the last marker.
    pub fn find(&self, doc: &Document, name: &str) -> Option<NodeId> {
        self.items.iter().rev().find_map(|entry| match entry {
            Entry::Marker => Some(None),
            Entry::Element(id) if doc.is_element(*id, &[name]) => Some(Some(*id)),
            Entry::Element(_) => None,
        })?
    }

    /// The elements which were closed implicitly and have to be re-opened
    /// before new content, outermost first. Each is returned with its index
    /// so that it can be replaced by its clone.
    pub fn to_reconstruct(&self, stack: &OpenElements) -> Vec<(usize, NodeId)> {
        let mut out = vec![];
        for (index, entry) in self.items.iter().enumerate().rev() {
            match entry {
                Entry::Element(id) if !stack.contains(*id) => out.push((index, *id)),
                _ => break,
            }
        }
        out.reverse();
        out
    }

    /// Replaces the element at `index` with its re-opened clone.
    pub fn replace(&mut self, index: usize, id: NodeId) {
        self.items[index] = Entry::Element(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers() {
        let mut doc = Document::new();
        let b = doc.create_element("b");
        let i = doc.create_element("i");
        let mut list = ActiveFormatting::default();
        list.push(b);
        list.push_marker();
        list.push(i);
        assert_eq!(list.find(&doc, "i"), Some(i));
        assert_eq!(list.find(&doc, "b"), None);

        let mut stack = OpenElements::new(doc.body());
        assert_eq!(list.to_reconstruct(&stack), [(2, i)]);
        stack.push(i);
        assert!(list.to_reconstruct(&stack).is_empty());

        list.clear_to_marker();
        assert_eq!(list.find(&doc, "b"), Some(b));
        list.remove(b);
        assert_eq!(list.find(&doc, "b"), None);
    }
}
