//! Selective serialization of a document back to wikitext.
//!
//! A document which came from wikitext remembers where every node came from.
//! When the original document and its source are available, the edited
//! document is compared against the original and every node which did not
//! change is written by copying its original source. Nodes which changed
//! are written from scratch by the tag handlers, which reuse as much of the
//! recorded syntax as they can. Without an original, the whole document is
//! written from scratch.

use crate::{
    Result,
    dom::{Document, DomSourceRange, NodeId, NodeKind},
    env::Env,
    ext::SerializerHost,
    wikitext::Span,
};

mod diff;
mod escape;
mod handlers;
mod separators;

pub use diff::DiffMarks;
use diff::{DELETED, Marks};
use escape::TextContext;

/// The original version of an edited document.
#[derive(Clone, Copy, Debug)]
pub struct Original<'a> {
    /// The document as it was built from `source`.
    pub doc: &'a Document,
    /// The wikitext the document was built from.
    pub source: &'a str,
}

/// The serializer state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Nothing has been done yet.
    Unvisited,
    /// The document has been compared against the original.
    Diffed,
    /// Output is being written.
    Emitting,
    /// The output is complete.
    Done,
}

/// Converts a document to wikitext, reusing the source of everything which
/// is unchanged from `original`.
pub fn serialize(env: &Env<'_>, doc: &Document, original: Option<&Original<'_>>) -> Result<String> {
    let mut serializer = Serializer::new(env, doc, original.map(|original| original.source));
    if let Some(original) = original {
        serializer.diff(original.doc);
    }
    serializer.run()
}

/// Serializer state for one document.
struct Serializer<'a> {
    /// The environment.
    env: &'a Env<'a>,
    /// A working copy of the edited document, with placeholders for deleted
    /// nodes.
    doc: Document,
    /// The original source, if there is an original document.
    source: Option<&'a str>,
    /// Change marks by node of `doc`.
    marks: Marks,
    /// The current state.
    state: State,
    /// The output.
    out: String,
    /// The number of newlines required before the next output.
    pending: usize,
    /// Where text is currently written.
    cx: TextContext,
    /// The source offset after the last node written, if the output is in
    /// step with the original source there.
    cursor: Option<usize>,
    /// The output length directly after list bullets.
    item_start: Option<usize>,
    /// The output length directly after a table cell marker.
    cell_start: Option<usize>,
    /// The depth of nested output captures.
    captures: usize,
}

impl<'a> Serializer<'a> {
    fn new(env: &'a Env<'a>, doc: &Document, source: Option<&'a str>) -> Self {
        Self {
            env,
            doc: doc.clone(),
            source,
            marks: Marks::new(),
            state: State::Unvisited,
            out: String::new(),
            pending: 0,
            cx: TextContext::default(),
            cursor: None,
            item_start: None,
            cell_start: None,
            captures: 0,
        }
    }

    fn transition(&mut self, to: State) {
        log::trace!("serializer: {:?} -> {to:?}", self.state);
        self.state = to;
    }

    /// Compares the working copy against the original document.
    fn diff(&mut self, original: &Document) {
        debug_assert_eq!(self.state, State::Unvisited);
        if let Some(source) = self.source {
            restore_ranges(&mut self.doc, source);
        }
        self.marks = diff::diff(self.env.registry, original, &mut self.doc);
        self.transition(State::Diffed);
    }

    fn run(mut self) -> Result<String> {
        self.transition(State::Emitting);
        let body = self.doc.body();
        self.node(body)?;
        self.transition(State::Done);
        Ok(self.out)
    }

    /// The change marks of a node.
    fn mark(&self, node: NodeId) -> DiffMarks {
        self.marks.get(&node).copied().unwrap_or_default()
    }

    /// Returns true if the serializer is comparing against an original.
    fn has_original(&self) -> bool {
        self.source.is_some()
    }

    /// The source range of a node, if it can be used to copy source.
    fn source_range(&self, node: NodeId) -> Option<DomSourceRange> {
        let source = self.source?;
        let dsr = self.doc.dsr(node)?;
        (dsr.start <= dsr.end && source.is_char_boundary(dsr.start) && source.is_char_boundary(dsr.end))
            .then_some(dsr)
            .filter(|dsr| dsr.end <= source.len())
    }

    /// Writes one node.
    fn node(&mut self, node: NodeId) -> Result {
        if self.doc.has_type_of(node, DELETED) {
            self.cursor = None;
            return Ok(());
        }
        if self.is_skipped(node) {
            return Ok(());
        }

        let marks = self.mark(node);
        let dsr = self.source_range(node);

        if let Some(text) = self.doc.text(node).filter(|text| text.chars().all(|c| c == '\n')) {
            if self.before_trailing_deletion(node) {
                self.cursor = None;
                return Ok(());
            }
            if self.after_deletion(node) {
                let missing = text.len().saturating_sub(trailing_newlines(&self.out));
                self.emit(&"\n".repeat(missing));
                self.cursor = dsr.map(|dsr| dsr.end);
                return Ok(());
            }
        }

        match (dsr, self.cursor) {
            (Some(dsr), Some(cursor))
                if cursor <= dsr.start
                    && !marks.contains(DiffMarks::INSERTED)
                    && self.gap_is_clear(node, cursor, dsr.start) =>
            {
                self.emit_source(cursor, dsr.start);
            }
            _ => {
                let prev = self.previous_written(node);
                let newlines = separators::between(&self.doc, prev, node);
                self.require_newlines(newlines);
            }
        }

        if let Some(dsr) = dsr
            && marks.is_empty()
        {
            log::trace!("copying {}..{} for {node:?}", dsr.start, dsr.end);
            self.emit_source(dsr.start, dsr.end);
            self.cursor = Some(dsr.end);
            return Ok(());
        }

        if let Some(dsr) = dsr
            && !marks.intersects(DiffMarks::INSERTED | DiffMarks::MODIFIED | DiffMarks::MODIFIED_WRAPPER)
            && self.reuses_tags(node, &dsr)
        {
            self.emit_source(dsr.start, dsr.inner_start());
            self.cursor = Some(dsr.inner_start());
            self.with_context(node, |this| this.children(node))?;
            if let Some(cursor) = self.cursor.filter(|cursor| *cursor <= dsr.inner_end()) {
                self.emit_source(cursor, dsr.inner_end());
            }
            self.emit_source(dsr.inner_end(), dsr.end);
            self.cursor = Some(dsr.end);
            return Ok(());
        }

        self.cursor = None;
        self.write(node)?;
        self.cursor = if marks.contains(DiffMarks::INSERTED) { None } else { dsr.map(|dsr| dsr.end) };
        Ok(())
    }

    /// Writes the children of a node.
    fn children(&mut self, node: NodeId) -> Result {
        for child in self.doc.children(node).to_vec() {
            self.node(child)?;
        }
        Ok(())
    }

    /// Returns true if the start and end syntax of an element can be copied
    /// from the source while its content is written separately.
    fn reuses_tags(&self, node: NodeId, dsr: &DomSourceRange) -> bool {
        dsr.has_valid_tag_widths()
            && self.doc.element(node).is_some()
            && !self.doc.is_element(node, &["a", "link", "meta"])
            && !self.doc.is_encapsulation_wrapper(node)
            && !self.doc.has_type_of(node, "mw:Entity")
            && !self.doc.has_type_of(node, "mw:LanguageVariant")
            && !(self.doc.is_element(node, &["pre"]) && !self.doc.data(node).is_some_and(|data| data.is_html()))
    }

    /// Returns true if a node is not written at all.
    fn is_skipped(&self, node: NodeId) -> bool {
        let generated = self
            .doc
            .data_mw(node)
            .and_then(|mw| mw.get("autoGenerated"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if generated {
            return true;
        }

        // Fostered content is part of the source of the table it came from
        let fostered = self.doc.data(node).is_some_and(|data| data.fostered);
        if fostered && self.mark(node).is_empty() {
            let mut next = self.doc.next_sibling(node);
            while let Some(sibling) = next {
                if !self.doc.data(sibling).is_some_and(|data| data.fostered) {
                    return self.doc.is_element(sibling, &["table"])
                        && self.mark(sibling).is_empty()
                        && self.source_range(sibling).is_some();
                }
                next = self.doc.next_sibling(sibling);
            }
        }
        false
    }

    /// Returns true if the previous sibling of a node is a deletion
    /// placeholder.
    fn after_deletion(&self, node: NodeId) -> bool {
        self.doc
            .previous_sibling(node)
            .is_some_and(|prev| self.doc.has_type_of(prev, DELETED))
    }

    /// Returns true if a node is followed only by deletion placeholders, and
    /// at least one of them.
    fn before_trailing_deletion(&self, node: NodeId) -> bool {
        let mut next = self.doc.next_sibling(node);
        let mut deleted = false;
        while let Some(sibling) = next {
            if !self.doc.has_type_of(sibling, DELETED) {
                return false;
            }
            deleted = true;
            next = self.doc.next_sibling(sibling);
        }
        deleted
    }

    /// Returns true if no sibling of `node` has source which starts inside
    /// `start..end`. Otherwise that source belongs to a node which has moved.
    fn gap_is_clear(&self, node: NodeId, start: usize, end: usize) -> bool {
        let Some(parent) = self.doc.parent(node) else {
            return true;
        };
        self.doc.children(parent).iter().all(|sibling| {
            *sibling == node
                || self
                    .source_range(*sibling)
                    .is_none_or(|range| !(start..end).contains(&range.start))
        })
    }

    /// The closest previous sibling which was written.
    fn previous_written(&self, node: NodeId) -> Option<NodeId> {
        let mut prev = self.doc.previous_sibling(node);
        while let Some(sibling) = prev {
            if !self.doc.has_type_of(sibling, DELETED) && !self.is_skipped(sibling) {
                return Some(sibling);
            }
            prev = self.doc.previous_sibling(sibling);
        }
        None
    }

    /// Returns true if the next output starts a line.
    fn at_sol(&self) -> bool {
        self.pending > 0 || self.out.ends_with('\n') || (self.out.is_empty() && self.captures == 0)
    }

    /// Requires at least `count` newlines before the next output.
    fn require_newlines(&mut self, count: usize) {
        self.pending = self.pending.max(count);
    }

    /// Writes output, preceded by any required newlines.
    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.pending > 0 {
            if !self.out.is_empty() || self.captures > 0 {
                let have = trailing_newlines(&self.out) + (text.len() - text.trim_start_matches('\n').len());
                for _ in have..self.pending {
                    self.out.push('\n');
                }
            }
            self.pending = 0;
        }
        self.out += text;
    }

    /// Copies a range of the original source.
    fn emit_source(&mut self, start: usize, end: usize) {
        if let Some(text) = self.source.and_then(|source| source.get(start..end)) {
            self.emit(text);
        }
    }

    /// Runs `f` with the text context of `node`.
    fn with_context(&mut self, node: NodeId, f: impl FnOnce(&mut Self) -> Result) -> Result {
        let saved = self.cx;
        self.cx = handlers::context_for(&self.doc, node, self.cx);
        let result = f(self);
        self.cx = saved;
        result
    }

    /// Runs `f` with a fresh output buffer and returns what it wrote.
    fn capture(&mut self, f: impl FnOnce(&mut Self) -> Result) -> Result<String> {
        let out = core::mem::take(&mut self.out);
        let pending = core::mem::take(&mut self.pending);
        let cursor = self.cursor.take();
        self.captures += 1;
        let result = f(self);
        self.captures -= 1;
        let captured = core::mem::replace(&mut self.out, out);
        self.pending = pending;
        self.cursor = cursor;
        result.map(|()| captured)
    }

    /// Writes the text of a node from scratch.
    fn text(&mut self, text: &str) {
        let mut cx = self.cx;
        cx.list_item_start = self.item_start == Some(self.out.len()) && self.pending == 0;
        cx.cell_start = self.cell_start == Some(self.out.len()) && self.pending == 0;
        if text.starts_with('\'') {
            self.separate_quotes();
        }
        let escaped = escape::escape_text(self.env.tokenizer(), text, self.at_sol(), cx);
        self.emit(&escaped);
    }

    /// Writes a node from scratch.
    fn write(&mut self, node: NodeId) -> Result {
        match self.doc.kind(node) {
            NodeKind::Document | NodeKind::DocumentFragment => self.children(node),
            NodeKind::Text(text) => {
                let text = text.clone();
                self.text(&text);
                Ok(())
            }
            NodeKind::Comment(comment) => {
                let comment = format!("<!--{}-->", comment.replace("-->", "--&gt;"));
                self.emit(&comment);
                Ok(())
            }
            NodeKind::Element(_) => self.with_context(node, |this| this.element(node)),
        }
    }
}

/// Converts nested HTML, such as the body of a reference, with a fresh
/// serializer.
struct Host<'a> {
    env: &'a Env<'a>,
}

impl SerializerHost for Host<'_> {
    fn html_to_wikitext(&self, html: &str) -> Result<String> {
        let doc = Document::from_html(html)?;
        serialize(self.env, &doc, None)
    }
}

fn trailing_newlines(text: &str) -> usize {
    text.len() - text.trim_end_matches('\n').len()
}

/// Gives source ranges back to text and comment nodes which lost them on a
/// trip through HTML, wherever the source at the expected position still
/// matches.
fn restore_ranges(doc: &mut Document, source: &str) {
    let body = doc.body();
    restore_children(doc, body, source);
}

fn restore_children(doc: &mut Document, node: NodeId, source: &str) {
    if doc.is_encapsulation_wrapper(node) || doc.has_type_of(node, "mw:LanguageVariant") {
        return;
    }

    let children = doc.children(node).to_vec();
    if let Some(dsr) = doc.dsr(node).filter(DomSourceRange::has_valid_tag_widths) {
        let leading = usize::try_from(dsr.leading_ws).unwrap_or(0);
        let trailing = usize::try_from(dsr.trailing_ws).unwrap_or(0);
        let end = dsr.inner_end().saturating_sub(trailing);
        let mut cursor = Some(dsr.inner_start() + leading);
        for (index, child) in children.iter().copied().enumerate() {
            if let Some(range) = doc.dsr(child) {
                cursor = Some(range.end);
                continue;
            }
            let expected = match doc.kind(child) {
                NodeKind::Text(text) => text.clone(),
                NodeKind::Comment(comment) => format!("<!--{comment}-->"),
                _ => {
                    cursor = None;
                    continue;
                }
            };
            let Some(start) = cursor else {
                continue;
            };
            let bound = children
                .get(index + 1)
                .and_then(|next| doc.dsr(*next))
                .map_or(end, |next| next.start);
            let stop = start + expected.len();
            if stop <= bound && source.get(start..stop) == Some(expected.as_str()) {
                doc.data_mut(child).dsr = Some(DomSourceRange::from_span(Span::new(start, stop)));
                cursor = Some(stop);
            } else {
                cursor = None;
            }
        }
    }

    for child in children {
        if doc.element(child).is_some() {
            restore_children(doc, child, source);
        }
    }
}
