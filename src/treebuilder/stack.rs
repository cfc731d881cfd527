//! The stack of open elements.

use crate::dom::{Document, NodeId};

/// Which elements hide an element further down the stack from an "in scope"
/// check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum ScopeKind {
    /// The baseline scope.
    InScope,
    /// Scope for `<p>`, which also stops at `<button>`.
    Button,
    /// Scope for list items, which also stops at lists.
    ListItem,
    /// Scope for table parts, which only stops at tables.
    Table,
}

impl ScopeKind {
    /// Returns true if an element named `name` is a boundary of this scope.
    fn is_boundary(self, name: &str) -> bool {
        let base = || {
            matches!(
                name,
                "applet" | "body" | "caption" | "html" | "marquee" | "object" | "table" | "td" | "template" | "th"
            )
        };
        match self {
            ScopeKind::InScope => base(),
            ScopeKind::Button => base() || name == "button",
            ScopeKind::ListItem => base() || matches!(name, "ol" | "ul"),
            ScopeKind::Table => matches!(name, "body" | "html" | "table" | "template"),
        }
    }
}

/// The stack of open elements. The bottom entry is the element everything
/// is built into, which is never popped.
#[derive(Debug)]
pub(super) struct OpenElements {
    items: Vec<NodeId>,
}

impl OpenElements {
    /// Creates a stack with `root` at the bottom.
    pub fn new(root: NodeId) -> Self {
        Self { items: vec![root] }
    }

    /// The current node.
    #[inline]
    pub fn current(&self) -> NodeId {
        self.items[self.items.len() - 1]
    }

    /// Pushes an element.
    #[inline]
    pub fn push(&mut self, id: NodeId) {
        self.items.push(id);
    }

    /// Pops the current node, unless it is the root.
    pub fn pop(&mut self) -> Option<NodeId> {
        if self.items.len() > 1 { self.items.pop() } else { None }
    }

    /// The number of open elements above the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.items.len() - 1
    }

    /// Returns true if `id` is open.
    pub fn contains(&self, id: NodeId) -> bool {
        self.items.contains(&id)
    }

    /// The stack position of `id`.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.items.iter().rposition(|item| *item == id)
    }

    /// The element at a stack position.
    #[inline]
    pub fn get(&self, index: usize) -> NodeId {
        self.items[index]
    }

    /// Finds the topmost element with one of the given names, unless a
    /// boundary of `scope` comes first.
    pub fn find_in_scope(&self, doc: &Document, names: &[&str], scope: ScopeKind) -> Option<usize> {
        for index in (1..self.items.len()).rev() {
            let Some(name) = doc.name(self.items[index]) else {
                continue;
            };
            if names.contains(&name) {
                return Some(index);
            }
            if scope.is_boundary(name) {
                return None;
            }
        }
        None
    }

    /// Returns true if `id` is open and no boundary of `scope` is above it.
    pub fn is_in_scope(&self, doc: &Document, id: NodeId, scope: ScopeKind) -> bool {
        for index in (1..self.items.len()).rev() {
            let item = self.items[index];
            if item == id {
                return true;
            }
            if doc.name(item).is_some_and(|name| scope.is_boundary(name)) {
                return false;
            }
        }
        false
    }

    /// The nearest open table.
    pub fn table(&self, doc: &Document) -> Option<NodeId> {
        self.items.iter().rev().copied().find(|id| doc.is_element(*id, &["table"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes() {
        let mut doc = Document::new();
        let mut stack = OpenElements::new(doc.body());
        let p = doc.create_element("p");
        let table = doc.create_element("table");
        let li = doc.create_element("li");
        let ul = doc.create_element("ul");

        stack.push(li);
        stack.push(p);
        assert_eq!(stack.find_in_scope(&doc, &["p"], ScopeKind::Button), Some(2));
        assert_eq!(stack.find_in_scope(&doc, &["li"], ScopeKind::ListItem), Some(1));

        stack.push(ul);
        assert_eq!(stack.find_in_scope(&doc, &["li"], ScopeKind::ListItem), None);
        assert_eq!(stack.find_in_scope(&doc, &["li"], ScopeKind::InScope), Some(1));

        stack.push(table);
        assert!(!stack.is_in_scope(&doc, p, ScopeKind::InScope));
        assert_eq!(stack.table(&doc), Some(table));
        assert_eq!(stack.depth(), 4);

        while stack.pop().is_some() {}
        assert_eq!(stack.current(), doc.body());
    }
}
