//! Moves line breaks out of the end of elements which had no end tag.
//!
//! A table cell or list item without an end tag ends at the next line, so
//! the tree builder puts the line break inside it. The line break belongs to
//! the separator between the element and whatever follows, so it is moved
//! up to the first ancestor which was closed by its own end tag.

use crate::{
    dom::{Document, NodeId, NodeKind},
    env::Session,
    wikitext::Span,
};

/// Elements which can end without an end tag.
const MIGRATE_FROM: &[&str] = &[
    "caption", "dd", "dl", "dt", "li", "ol", "pre", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

pub(super) fn run(_: &Session<'_>, doc: &mut Document, _: bool) {
    visit(doc, doc.body());
}

fn visit(doc: &mut Document, node: NodeId) {
    for child in doc.children(node).to_vec() {
        if doc.element(child).is_some() && !doc.is_encapsulation_wrapper(child) {
            visit(doc, child);
        }
    }

    let explicit_end = doc
        .data(node)
        .and_then(|data| data.end_tsr)
        .is_some_and(|end| !end.is_empty());
    if !doc.is_element(node, MIGRATE_FROM) || explicit_end || doc.parent(node).is_none() {
        return;
    }

    let mut moved = vec![];
    while let Some(last) = doc.last_child(node) {
        let Some(text) = doc.text(last) else {
            break;
        };
        let keep = text.trim_end_matches('\n').len();
        if keep == text.len() {
            break;
        } else if keep == 0 {
            doc.detach(last);
            moved.push(last);
        } else {
            moved.push(split_off(doc, last, keep));
            break;
        }
    }

    let mut anchor = node;
    for text in moved.into_iter().rev() {
        doc.insert_after(anchor, text);
        anchor = text;
    }
}

/// Splits a text node at byte offset `at`, returning a new detached node
/// with the end of the text.
fn split_off(doc: &mut Document, node: NodeId, at: usize) -> NodeId {
    let tail = match doc.kind_mut(node) {
        NodeKind::Text(text) => text.split_off(at),
        _ => String::new(),
    };
    let tail_len = tail.len();
    let split = doc.create_text(tail);
    if let Some(tsr) = doc.data(node).and_then(|data| data.tsr) {
        let mid = tsr.end.saturating_sub(tail_len);
        doc.data_mut(node).tsr = Some(Span::new(tsr.start, mid));
        doc.data_mut(split).tsr = Some(Span::new(mid, tsr.end));
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_cells() {
        let mut doc = Document::new();
        let table = doc.create_element("table");
        let tr = doc.create_element("tr");
        let td = doc.create_element("td");
        let text = doc.create_text("x\n\n");
        doc.data_mut(table).end_tsr = Some(Span::new(6, 8));
        doc.data_mut(text).tsr = Some(Span::new(3, 6));
        doc.append_child(doc.body(), table);
        doc.append_child(table, tr);
        doc.append_child(tr, td);
        doc.append_child(td, text);

        let body = doc.body();
        visit(&mut doc, body);
        assert_eq!(doc.children(table).len(), 2);
        assert_eq!(doc.text(text), Some("x"));
        assert_eq!(doc.data(text).unwrap().tsr, Some(Span::new(3, 4)));
        let moved = doc.children(table)[1];
        assert_eq!(doc.text(moved), Some("\n\n"));
        assert_eq!(doc.data(moved).unwrap().tsr, Some(Span::new(4, 6)));
    }

    #[test]
    fn explicit_end_tags() {
        let mut doc = Document::new();
        let li = doc.create_element("li");
        let text = doc.create_text("a\n");
        doc.data_mut(li).end_tsr = Some(Span::new(2, 7));
        doc.append_child(doc.body(), li);
        doc.append_child(li, text);

        let body = doc.body();
        visit(&mut doc, body);
        assert_eq!(doc.children(li), [text]);
        assert_eq!(doc.text(text), Some("a\n"));
    }
}
