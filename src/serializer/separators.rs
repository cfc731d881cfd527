//! Line breaks between freshly written siblings.
//!
//! Wikitext block constructs are delimited by line breaks, so two siblings
//! which are written from scratch need the right number of newlines between
//! them. Separators between nodes which keep their source positions come
//! from the original source instead.

use crate::dom::{Document, NodeId, Syntax};

/// Elements which start at the start of a line.
const LINE_START: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "p", "table", "ul", "ol", "dl", "li", "dt", "dd", "tr", "td",
    "th", "caption", "pre",
];

/// Elements which end their line.
const LINE_END: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "hr", "p", "table", "ul", "ol", "dl", "pre"];

/// Returns true if `node` must start at the start of a line when written
/// as wikitext.
pub(super) fn starts_line(doc: &Document, node: NodeId) -> bool {
    let same_line = doc
        .data(node)
        .is_some_and(|data| data.stx == Some(Syntax::Row) || data.is_html());
    !same_line && doc.is_element(node, LINE_START)
}

fn ends_line(doc: &Document, node: NodeId) -> bool {
    let html = doc.data(node).is_some_and(|data| data.is_html());
    !html && doc.is_element(node, LINE_END)
}

/// The number of newlines required between `prev` and `next`.
pub(super) fn between(doc: &Document, prev: Option<NodeId>, next: NodeId) -> usize {
    let Some(prev) = prev else {
        return 0;
    };
    if doc.text(next).is_some_and(|text| text.starts_with('\n')) {
        return 0;
    }

    let inline_next = doc.text(next).is_some() || !doc.is_element(next, LINE_START);
    if doc.is_element(prev, &["p"]) && !doc.data(prev).is_some_and(|data| data.is_html())
        && (doc.is_element(next, &["p"]) || inline_next)
    {
        2
    } else if ends_line(doc, prev) || starts_line(doc, next) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks() {
        let mut doc = Document::new();
        let h = doc.create_element("h2");
        let p = doc.create_element("p");
        let q = doc.create_element("p");
        let text = doc.create_text("\n");
        let span = doc.create_element("span");
        let td = doc.create_element("td");
        doc.data_mut(td).stx = Some(Syntax::Row);

        assert_eq!(between(&doc, None, h), 0);
        assert_eq!(between(&doc, Some(h), p), 1);
        assert_eq!(between(&doc, Some(p), q), 2);
        assert_eq!(between(&doc, Some(p), span), 2);
        assert_eq!(between(&doc, Some(h), text), 0);
        assert_eq!(between(&doc, Some(span), h), 1);
        assert_eq!(between(&doc, Some(span), span), 0);
        assert_eq!(between(&doc, Some(td), td), 0);
        assert!(!starts_line(&doc, td));
    }
}
