//! Final clean up of tree builder flags and trimmable whitespace.

use super::is_rendering_transparent;
use crate::{
    dom::{Document, NodeId, NodeKind},
    env::Session,
    wikitext::VOID_TAGS,
};

/// Elements whose end tag is never written in wikitext syntax.
const NO_CLOSING_TAG: &[&str] = &["pre", "li", "dt", "dd", "hr", "tr", "td", "th", "caption"];

/// Elements whose leading and trailing spaces are not part of the content
/// when written in wikitext syntax.
const TRIMMABLE: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "li", "dt", "dd", "td", "th", "caption"];

pub(super) fn run(session: &Session<'_>, doc: &mut Document, _: bool) {
    for node in doc.descendants(doc.body()) {
        let Some(data) = doc.data(node).filter(|_| doc.element(node).is_some()) else {
            continue;
        };
        let (html, auto_start, auto_end, tsr) =
            (data.is_html(), data.auto_inserted_start, data.auto_inserted_end, data.tsr);

        if auto_end && !html && doc.is_element(node, NO_CLOSING_TAG) {
            doc.data_mut(node).auto_inserted_end = false;
        } else if auto_end && html && !auto_start {
            let name = doc.name(node).unwrap_or_default();
            if !VOID_TAGS.contains(name) {
                session.lint("missing-end-tag", tsr, format!("<{name}> is never closed"));
            }
        }

        if !html && doc.is_element(node, TRIMMABLE) {
            trim(doc, node);
        }
    }
}

/// What was found at one end of an element.
#[derive(Debug, Default)]
struct Trimmed {
    /// The number of trimmed space bytes.
    len: usize,
    /// Trimming skipped over something which renders nothing, so the count
    /// does not describe the whole gap.
    unreliable: bool,
}

impl Trimmed {
    fn to_ws(&self) -> isize {
        if self.unreliable { -1 } else { isize::try_from(self.len).unwrap_or(isize::MAX) }
    }
}

/// Removes spaces and tabs from the start and end of an element, and
/// records how many were removed.
fn trim(doc: &mut Document, node: NodeId) {
    let leading = trim_end(doc, node, true);
    let trailing = trim_end(doc, node, false);
    if let Some(dsr) = doc.data_mut(node).dsr.as_mut() {
        dsr.leading_ws = leading.to_ws();
        dsr.trailing_ws = trailing.to_ws();
    }
}

fn trim_end(doc: &mut Document, node: NodeId, leading: bool) -> Trimmed {
    let is_space = |c: char| c == ' ' || c == '\t';
    let mut trimmed = Trimmed::default();
    let mut skipped = false;
    let children = doc.children(node).to_vec();
    let ordered: Box<dyn Iterator<Item = NodeId>> = if leading {
        Box::new(children.into_iter())
    } else {
        Box::new(children.into_iter().rev())
    };

    for child in ordered {
        if let Some(text) = doc.text(child) {
            if text.chars().all(is_space) {
                trimmed.len += text.len();
                trimmed.unreliable = skipped;
                doc.detach(child);
                continue;
            }

            let kept = if leading { text.trim_start_matches(is_space) } else { text.trim_end_matches(is_space) };
            let removed = text.len() - kept.len();
            if removed > 0 {
                let kept = kept.to_string();
                if let NodeKind::Text(text) = doc.kind_mut(child) {
                    *text = kept;
                }
                if let Some(dsr) = doc.data_mut(child).dsr.as_mut() {
                    if leading {
                        dsr.start += removed;
                    } else {
                        dsr.end -= removed;
                    }
                }
                trimmed.len += removed;
                trimmed.unreliable = skipped;
            }
            break;
        } else if is_rendering_transparent(doc, child) {
            skipped = true;
        } else {
            break;
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        env::{Collector, Env, Event, NoTemplates, Options},
        ext::Registry,
        postprocess::{dsr, newlines},
        wikitext::{Frame, StartRule},
    };

    fn build(source: &str, collector: &Collector) -> Document {
        let _ = env_logger::try_init();
        let registry = Registry::default();
        let env = Env::new(&CONFIG, &registry, &NoTemplates, collector, Options::default());
        let session = Session::new(&env, source);
        let frame = Frame::root("Test", source);
        let tokens = env.tokenizer().tokenize(source, StartRule::Document).unwrap();
        let tokens = crate::pipeline::run(&session, &frame, tokens);
        let mut doc = crate::treebuilder::build(&session, tokens);
        newlines::run(&session, &mut doc, true);
        dsr::run(&session, &mut doc, true);
        run(&session, &mut doc, true);
        doc
    }

    #[test]
    fn trims_headings() {
        let doc = build("= foo =", &Collector::default());
        let h1 = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.text_content(h1), "foo");
        let dsr = doc.dsr(h1).unwrap();
        assert_eq!((dsr.leading_ws, dsr.trailing_ws), (1, 1));
        let text = doc.first_child(h1).unwrap();
        assert_eq!(doc.dsr(text).unwrap().span(), crate::wikitext::Span::new(2, 5));
    }

    #[test]
    fn comments_make_counts_unreliable() {
        let doc = build("* <!--c--> a", &Collector::default());
        let li = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
        let dsr = doc.dsr(li).unwrap();
        assert_eq!(dsr.leading_ws, -1);
        assert_eq!(doc.text_content(li), "a");
    }

    #[test]
    fn auto_inserted_end() {
        let collector = Collector::default();
        let doc = build("*a", &collector);
        let li = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
        assert!(!doc.data(li).unwrap().auto_inserted_end);
        assert!(collector.take().is_empty());

        let doc = build("<div>a", &collector);
        let div = doc.first_child(doc.body()).unwrap();
        assert!(doc.data(div).unwrap().auto_inserted_end);
        assert!(matches!(
            collector.take().as_slice(),
            [Event::Lint { kind: "missing-end-tag", .. }]
        ));
    }
}
