//! Source range computation.
//!
//! Ranges are computed bottom-up from the token source ranges recorded by
//! the tree builder. A node with no reliable provenance gets no range:
//!
//! * nodes moved by foster parenting, and everything inside them;
//! * content of extension and transclusion wrappers, which comes from some
//!   other source (the wrapper itself covers the whole construct);
//! * elements created without any token, unless they were implied by the
//!   tree builder and their content has ranges.
//!
//! A missing child range never invalidates its parent. A child range which
//! falls outside of its parent or overlaps an earlier sibling is dropped.

use crate::{
    dom::{DataParsoid, Document, DomSourceRange, NodeId, NodeKind},
    env::Session,
};

pub(super) fn run(session: &Session<'_>, doc: &mut Document, top_level: bool) {
    let body = doc.body();
    let ranges = children(session, doc, body);
    let dsr = top_level.then(|| DomSourceRange::new(0, session.source().len(), Some(0), Some(0)));
    if let Some(dsr) = dsr {
        validate(session, doc, body, &ranges, dsr);
    }
    doc.data_mut(body).dsr = dsr;
}

/// Computes the ranges of every child of `node`.
fn children(session: &Session<'_>, doc: &mut Document, node: NodeId) -> Vec<Option<DomSourceRange>> {
    let children = doc.children(node).to_vec();
    children
        .into_iter()
        .map(|child| compute(session, doc, child))
        .collect()
}

/// Computes the range of `node` and everything below it.
fn compute(session: &Session<'_>, doc: &mut Document, node: NodeId) -> Option<DomSourceRange> {
    let data = doc.data(node).cloned().unwrap_or_default();
    let dsr = match doc.kind(node) {
        NodeKind::Text(_) | NodeKind::Comment(_) => data.tsr.map(DomSourceRange::from_span),
        NodeKind::Element(_) if data.fostered => {
            doc.clear_dsr(node);
            None
        }
        NodeKind::Element(_) if doc.is_encapsulation_wrapper(node) => {
            doc.clear_dsr(node);
            data.tsr.map(|tsr| {
                let widths = data.ext_tag_offsets.unwrap_or_default();
                DomSourceRange::new(tsr.start, tsr.end, widths.open_width, widths.close_width)
            })
        }
        NodeKind::Element(_) => element(session, doc, node, &data),
        _ => None,
    };
    doc.data_mut(node).dsr = dsr;
    dsr
}

/// Computes the range of an element.
fn element(session: &Session<'_>, doc: &mut Document, node: NodeId, data: &DataParsoid) -> Option<DomSourceRange> {
    let ranges = children(session, doc, node);
    let open = if data.auto_inserted_start { None } else { data.tsr };
    if open.is_none() && !data.auto_inserted_start {
        return None;
    }

    let first = ranges.iter().flatten().next().map(|range| range.start);
    let last = ranges.iter().flatten().last().map(|range| range.end);
    let start = open
        .map(|tsr| tsr.start)
        .or(first)
        .or(data.end_tsr.map(|tsr| tsr.start))?;
    let open_width = open.map_or(0, |tsr| tsr.len());
    let (end, close_width) = match data.end_tsr {
        Some(end) => (end.end, end.len()),
        None => (last.unwrap_or(start + open_width).max(start + open_width), 0),
    };

    if end < start + open_width + close_width {
        log::debug!("inconsistent range for <{}>: {start}..{end}", doc.name(node).unwrap_or_default());
        return None;
    }
    let dsr = DomSourceRange::new(start, end, Some(open_width), Some(close_width));
    validate(session, doc, node, &ranges, dsr);
    Some(dsr)
}

/// Drops the range of any child which does not fit inside `dsr` after its
/// previous sibling.
fn validate(session: &Session<'_>, doc: &mut Document, node: NodeId, ranges: &[Option<DomSourceRange>], dsr: DomSourceRange) {
    let mut cursor = dsr.inner_start();
    let end = dsr.inner_end();
    for (child, range) in doc.children(node).to_vec().into_iter().zip(ranges) {
        let Some(range) = range else {
            continue;
        };
        if range.start < cursor || range.end > end {
            session.lint(
                "dsr-ordering",
                Some(range.span()),
                format!("source range {}..{} outside of {cursor}..{end}", range.start, range.end),
            );
            doc.clear_dsr(child);
        } else {
            cursor = range.end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        env::{Collector, Env, NoTemplates, Options},
        ext::Registry,
        pipeline, treebuilder,
        wikitext::{Frame, StartRule},
    };

    fn dsr_of(source: &str, f: impl FnOnce(&Document) -> NodeId) -> Option<DomSourceRange> {
        let _ = env_logger::try_init();
        let registry = Registry::with_builtins();
        let collector = Collector::default();
        let env = Env::new(&CONFIG, &registry, &NoTemplates, &collector, Options::default());
        let session = Session::new(&env, source);
        let frame = Frame::root("Test", source);
        let tokens = env.tokenizer().tokenize(source, StartRule::Document).unwrap();
        let tokens = pipeline::run(&session, &frame, tokens);
        let mut doc = treebuilder::build(&session, tokens);
        super::super::newlines::run(&session, &mut doc, true);
        run(&session, &mut doc, true);
        let node = f(&doc);
        doc.dsr(node)
    }

    #[test]
    fn headings_and_paragraphs() {
        let dsr = dsr_of("=foo=\nbar", |doc| doc.first_child(doc.body()).unwrap());
        assert_eq!(dsr, Some(DomSourceRange::new(0, 5, Some(1), Some(1))));
        let dsr = dsr_of("=foo=\nbar", |doc| doc.last_child(doc.body()).unwrap());
        assert_eq!(dsr, Some(DomSourceRange::new(6, 9, Some(0), Some(0))));
    }

    #[test]
    fn implied_table_sections() {
        let source = "{|\n|x\n|}";
        let table = |doc: &Document| doc.first_child(doc.body()).unwrap();
        assert_eq!(dsr_of(source, table), Some(DomSourceRange::new(0, 8, Some(2), Some(2))));
        let tbody = |doc: &Document| doc.children(table(doc))[1];
        assert_eq!(dsr_of(source, tbody), Some(DomSourceRange::new(3, 5, Some(0), Some(0))));
        let td = |doc: &Document| doc.first_child(doc.first_child(tbody(doc)).unwrap()).unwrap();
        assert_eq!(dsr_of(source, td), Some(DomSourceRange::new(3, 5, Some(1), Some(0))));
    }

    #[test]
    fn fostered_content() {
        let holder = |doc: &Document| doc.first_child(doc.body()).unwrap();
        assert_eq!(dsr_of("{|\nfoo\n|}", holder), None);
        let text = |doc: &Document| doc.first_child(holder(doc)).unwrap();
        assert_eq!(dsr_of("{|\nfoo\n|}", text), None);
        let table = |doc: &Document| doc.last_child(doc.body()).unwrap();
        assert_eq!(
            dsr_of("{|\nfoo\n|}", table),
            Some(DomSourceRange::new(0, 9, Some(2), Some(2)))
        );
    }

    #[test]
    fn extension_wrappers() {
        let source = "a <nowiki>''b''</nowiki>";
        let wrapper = |doc: &Document| doc.last_child(doc.first_child(doc.body()).unwrap()).unwrap();
        assert_eq!(
            dsr_of(source, wrapper),
            Some(DomSourceRange::new(2, 24, Some(8), Some(9)))
        );
        let content = |doc: &Document| doc.first_child(wrapper(doc)).unwrap();
        assert_eq!(dsr_of(source, content), None);
    }
}
