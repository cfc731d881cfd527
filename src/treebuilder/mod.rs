//! Tree construction.
//!
//! This follows the HTML5 tree construction algorithm for the parts of it
//! which wikitext can reach: implied end tags, implicit table sections,
//! foster parenting, and re-opening of formatting elements. The token
//! stream is already well-formed for most wikitext constructs, so the
//! interesting work is in keeping track of which tags came from the source
//! and which were made up along the way.
//!
//! Every node remembers the source range of the token which opened it (and
//! closed it, for elements). Elements which were opened or closed without a
//! token of their own are flagged, since the serializer must not write
//! syntax for them.

use crate::{
    dom::{DataParsoid, Document, NodeId, NodeKind},
    env::Session,
    pipeline::template_title,
    wikitext::{BLOCK_TAGS, Extension, Span, Tag, Text, Token, Transclusion, VOID_TAGS, title_href},
};
use formatting::{ActiveFormatting, FORMATTING};
use serde_json::{Map, Value};
use stack::{OpenElements, ScopeKind};

mod formatting;
mod stack;

/// Start tags which close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "details", "dialog", "dir", "div", "dl",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "summary", "table", "ul",
];

/// Elements whose content model is table structure only.
const TABLE_CONTEXT: &[&str] = &["table", "tbody", "tfoot", "thead", "tr"];

/// Elements which are only valid inside a table.
const TABLE_PARTS: &[&str] = &["caption", "tbody", "td", "tfoot", "th", "thead", "tr"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// The `typeof` of the placeholder left for a stray end tag.
pub(crate) const STRIPPED_TAG: &str = "mw:Placeholder/StrippedTag";

/// Returns true if `node` is a holder made up for text which was moved out
/// of a table.
pub(crate) fn is_foster_holder(doc: &Document, node: NodeId) -> bool {
    doc.is_element(node, &["span"])
        && doc
            .data(node)
            .is_some_and(|data| data.fostered && data.auto_inserted_start && data.auto_inserted_end)
}

/// Builds a document from the output of the token pipeline.
pub fn build(session: &Session<'_>, tokens: Vec<Token>) -> Document {
    TreeBuilder::new(Some(session)).run(tokens)
}

/// Builds a document from HTML tokens. `data-parsoid` and `data-mw`
/// attributes are moved into the side tables.
pub(crate) fn build_html(tokens: Vec<Token>) -> Document {
    TreeBuilder::new(None).run(tokens)
}

/// Tree construction state.
struct TreeBuilder<'a> {
    /// The conversion session, when building from wikitext.
    session: Option<&'a Session<'a>>,
    /// The document being built.
    doc: Document,
    /// The stack of open elements.
    open: OpenElements,
    /// The list of active formatting elements.
    formatting: ActiveFormatting,
}

impl<'a> TreeBuilder<'a> {
    fn new(session: Option<&'a Session<'a>>) -> Self {
        let doc = Document::new();
        let open = OpenElements::new(doc.body());
        Self {
            session,
            doc,
            open,
            formatting: ActiveFormatting::default(),
        }
    }

    fn run(mut self, tokens: Vec<Token>) -> Document {
        for token in tokens {
            self.process(token);
        }
        while self.pop_implicit().is_some() {}
        self.doc
    }

    fn process(&mut self, token: Token) {
        match token {
            Token::Text(text) => self.insert_text(text.value, text.tsr),
            Token::NewLine(tsr) => self.insert_text("\n".to_string(), tsr),
            Token::Comment(text) => self.insert_comment(text),
            Token::StartTag(tag) => self.start_tag(tag, false),
            Token::SelfClosingTag(tag) => self.start_tag(tag, true),
            Token::EndTag(tag) => self.end_tag(tag),
            Token::Eof(_) => while self.pop_implicit().is_some() {},
            Token::ExtensionPlaceholder(ext) => self.insert_extension(*ext),
            Token::TemplateFragmentMarker(tpl) => self.insert_transclusion(*tpl),
        }
    }

    fn lint(&self, kind: &'static str, tsr: Option<Span>, message: impl Into<String>) {
        if let Some(session) = self.session {
            session.lint(kind, tsr, message);
        }
    }

    /// Returns true if the current node can only hold table structure.
    fn in_table_context(&self) -> bool {
        self.doc.is_element(self.open.current(), TABLE_CONTEXT)
    }

    /// Returns true if a table part would be valid here.
    fn in_table(&self) -> bool {
        self.open.find_in_scope(&self.doc, &["table"], ScopeKind::Table).is_some()
    }

    /// Where new content goes. Fostered content goes before the nearest
    /// table.
    fn location(&self, foster: bool) -> (NodeId, Option<NodeId>) {
        if foster
            && let Some(table) = self.open.table(&self.doc)
            && let Some(parent) = self.doc.parent(table)
        {
            (parent, Some(table))
        } else {
            (self.open.current(), None)
        }
    }

    /// Inserts a node at the current location. Fostered elements are
    /// flagged themselves; fostered text goes into a holder.
    fn insert(&mut self, node: NodeId, foster: bool) {
        match self.location(foster) {
            (parent, Some(table)) if self.doc.element(node).is_none() => {
                let holder = match self.foster_holder(table) {
                    Some(holder) => holder,
                    None => {
                        let holder = self.doc.create_element("span");
                        let data = self.doc.data_mut(holder);
                        data.fostered = true;
                        data.auto_inserted_start = true;
                        data.auto_inserted_end = true;
                        self.doc.insert_before(parent, holder, Some(table));
                        holder
                    }
                };
                self.doc.append_child(holder, node);
            }
            (parent, Some(table)) => {
                self.doc.insert_before(parent, node, Some(table));
                self.doc.data_mut(node).fostered = true;
            }
            (parent, None) => self.doc.insert_before(parent, node, None),
        }
    }

    /// The holder of text fostered out of `table`, if there is one yet.
    fn foster_holder(&self, table: NodeId) -> Option<NodeId> {
        self.doc
            .previous_sibling(table)
            .filter(|prev| is_foster_holder(&self.doc, *prev))
    }

    fn insert_text(&mut self, value: String, tsr: Option<Span>) {
        if value.is_empty() {
            return;
        }

        let whitespace = value.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        if !whitespace {
            self.reconstruct_formatting();
        }
        let foster = !whitespace && self.in_table_context();
        if foster {
            self.lint("fostered", tsr, "text moved out of a table");
        }

        let (parent, before) = self.location(foster);
        let previous = match before {
            Some(table) => self.foster_holder(table).and_then(|holder| self.doc.last_child(holder)),
            None => self.doc.last_child(parent),
        };
        if let Some(previous) = previous
            && self.doc.text(previous).is_some()
        {
            let merged = match (self.doc.data(previous).and_then(|data| data.tsr), tsr) {
                (Some(a), Some(b)) if a.end == b.start => Some(Some(a.merge(b))),
                (None, None) => Some(None),
                // Whatever came between the two was moved out of the table
                _ if before.is_none() && self.in_table_context() => Some(None),
                _ => None,
            };
            if let Some(merged) = merged {
                if let NodeKind::Text(text) = self.doc.kind_mut(previous) {
                    text.push_str(&value);
                }
                self.doc.data_mut(previous).tsr = merged;
                return;
            }
        }

        let node = self.doc.create_text(value);
        self.doc.data_mut(node).tsr = tsr;
        self.insert(node, foster);
    }

    fn insert_comment(&mut self, text: Text) {
        let node = self.doc.create_comment(text.value);
        self.doc.data_mut(node).tsr = text.tsr;
        self.insert(node, false);
    }

    /// Re-opens formatting elements which were closed implicitly.
    fn reconstruct_formatting(&mut self) {
        for (index, original) in self.formatting.to_reconstruct(&self.open) {
            let Some(element) = self.doc.element(original).cloned() else {
                continue;
            };
            let clone = self.doc.create_element(&element.name);
            if let Some(clone) = self.doc.element_mut(clone) {
                clone.attributes = element.attributes;
            }
            let stx = self.doc.data(original).and_then(|data| data.stx);
            let data = self.doc.data_mut(clone);
            data.auto_inserted_start = true;
            data.stx = stx;
            let foster = self.in_table_context();
            self.insert(clone, foster);
            self.open.push(clone);
            self.formatting.replace(index, clone);
        }
    }

    fn start_tag(&mut self, tag: Tag, self_closing: bool) {
        let name = tag.name.clone();
        let name = name.as_str();
        match name {
            "html" | "head" => return,
            "body" => {
                if self.session.is_none() {
                    self.apply_attributes(self.doc.body(), &tag);
                }
                return;
            }
            _ => {}
        }

        let table_part = TABLE_PARTS.contains(&name) && self.in_table();
        if table_part {
            self.prepare_table_part(name);
        } else {
            if CLOSES_P.contains(&name)
                && let Some(index) = self.open.find_in_scope(&self.doc, &["p"], ScopeKind::Button)
            {
                self.pop_until(index);
            }
            match name {
                "li" => self.close_list_item(&["li"]),
                "dd" | "dt" => self.close_list_item(&["dd", "dt"]),
                _ if HEADINGS.contains(&name) && self.doc.is_element(self.open.current(), HEADINGS) => {
                    self.lint("misnested-tag", tag.data.tsr, format!("<{name}> inside a heading"));
                    self.pop_implicit();
                }
                _ => {}
            }
            if !BLOCK_TAGS.contains(name) {
                self.reconstruct_formatting();
            }
        }

        let foster = !table_part && self.in_table_context();
        if foster {
            self.lint("fostered", tag.data.tsr, format!("<{name}> moved out of a table"));
        }
        let tsr = tag.data.tsr;
        let node = self.create_element(&tag);
        self.insert(node, foster);

        if self_closing || VOID_TAGS.contains(name) {
            self.doc.data_mut(node).end_tsr = tsr.map(|tsr| Span::at(tsr.end));
            return;
        }
        self.open.push(node);
        if FORMATTING.contains(&name) {
            self.formatting.push(node);
        }
        if matches!(name, "td" | "th" | "caption") {
            self.formatting.push_marker();
        }
    }

    /// Closes whatever has to be closed before a table part can be
    /// inserted, and inserts any implied table sections.
    fn prepare_table_part(&mut self, name: &str) {
        match name {
            "td" | "th" => {
                if let Some(index) = self.open.find_in_scope(&self.doc, &["td", "th"], ScopeKind::Table) {
                    self.pop_until(index);
                }
                self.clear_to(&["tr", "tbody", "tfoot", "thead", "table"]);
                if self.doc.is_element(self.open.current(), &["table"]) {
                    self.insert_implicit("tbody");
                }
                if !self.doc.is_element(self.open.current(), &["tr"]) {
                    self.insert_implicit("tr");
                }
            }
            "tr" => {
                if let Some(index) = self.open.find_in_scope(&self.doc, &["td", "th", "caption"], ScopeKind::Table) {
                    self.pop_until(index);
                }
                self.clear_to(&["tbody", "tfoot", "thead", "table"]);
                if self.doc.is_element(self.open.current(), &["table"]) {
                    self.insert_implicit("tbody");
                }
            }
            _ => {
                if let Some(index) = self.open.find_in_scope(&self.doc, &["td", "th", "caption"], ScopeKind::Table) {
                    self.pop_until(index);
                }
                self.clear_to(&["table"]);
            }
        }
    }

    /// Inserts and opens an element which has no token.
    fn insert_implicit(&mut self, name: &str) {
        let node = self.doc.create_element(name);
        self.doc.data_mut(node).auto_inserted_start = true;
        self.insert(node, false);
        self.open.push(node);
    }

    /// Pops elements until the current node has one of the given names.
    fn clear_to(&mut self, names: &[&str]) {
        while !self.doc.is_element(self.open.current(), names) && self.pop_implicit().is_some() {}
    }

    /// Closes an open list item, unless some other block is in the way.
    fn close_list_item(&mut self, names: &[&str]) {
        for index in (1..=self.open.depth()).rev() {
            let Some(name) = self.doc.name(self.open.get(index)) else {
                continue;
            };
            if names.contains(&name) {
                self.pop_until(index);
                return;
            }
            if BLOCK_TAGS.contains(name) && !matches!(name, "address" | "div" | "p") {
                return;
            }
        }
    }

    fn end_tag(&mut self, tag: Tag) {
        let name = tag.name.clone();
        let name = name.as_str();
        match name {
            "html" | "head" | "body" => {}
            "p" => self.close_named(tag, &["p"], ScopeKind::Button),
            "li" => self.close_named(tag, &["li"], ScopeKind::ListItem),
            "table" => self.close_named(tag, &["table"], ScopeKind::Table),
            _ if TABLE_PARTS.contains(&name) => self.close_named(tag, &[name], ScopeKind::Table),
            _ if FORMATTING.contains(&name) => self.formatting_end_tag(tag),
            _ => self.close_named(tag, &[name], ScopeKind::InScope),
        }
    }

    /// Closes the nearest element with one of the given names, or reports
    /// the end tag as stray.
    fn close_named(&mut self, tag: Tag, names: &[&str], scope: ScopeKind) {
        match self.open.find_in_scope(&self.doc, names, scope) {
            Some(index) => self.close_element(index, tag),
            None => self.stray_end_tag(&tag),
        }
    }

    /// Reports an end tag which closes nothing. When building from
    /// wikitext, its source is kept in a placeholder.
    fn stray_end_tag(&mut self, tag: &Tag) {
        self.lint("stray-end-tag", tag.data.tsr, format!("</{}>", tag.name));
        let Some(session) = self.session else {
            return;
        };
        let Some(tsr) = tag.data.tsr.filter(|tsr| !tsr.is_empty()) else {
            return;
        };
        let Some(src) = session.source().source().get(tsr.into_range()) else {
            return;
        };

        let meta = self.doc.create_element("meta");
        self.doc.set_attr(meta, "typeof", STRIPPED_TAG);
        let data = self.doc.data_mut(meta);
        data.tsr = Some(tsr);
        data.end_tsr = Some(Span::at(tsr.end));
        data.src = Some(src.to_string());
        let foster = self.in_table_context();
        self.insert(meta, foster);
    }

    /// Handles the end tag of a formatting element. Elements opened inside
    /// it which are still open are closed and re-opened after it.
    fn formatting_end_tag(&mut self, tag: Tag) {
        let Some(element) = self.formatting.find(&self.doc, &tag.name) else {
            let names = [tag.name.clone()];
            let names = names.iter().map(String::as_str).collect::<Vec<_>>();
            self.close_named(tag, &names, ScopeKind::InScope);
            return;
        };

        let Some(index) = self.open.position(element) else {
            self.formatting.remove(element);
            self.stray_end_tag(&tag);
            return;
        };
        if !self.open.is_in_scope(&self.doc, element, ScopeKind::InScope) {
            self.stray_end_tag(&tag);
            return;
        }
        if element != self.open.current() {
            self.lint("misnested-tag", tag.data.tsr, format!("</{}>", tag.name));
            if let Some(data) = self.doc.data(element).cloned() {
                self.doc.set_data(element, DataParsoid { restructured: true, ..data });
            }
        }
        self.close_element(index, tag);
    }

    /// Closes the element at stack position `index` with its own end tag.
    fn close_element(&mut self, index: usize, tag: Tag) {
        self.pop_until(index + 1);
        let Some(node) = self.open.pop() else {
            return;
        };
        let data = self.doc.data_mut(node);
        data.end_tsr = tag.data.tsr;
        data.auto_inserted_end = tag.data.auto_inserted_end;
        if tag.data.end_tag_src.is_some() {
            data.end_tag_src = tag.data.end_tag_src;
        }
        self.formatting.remove(node);
        if self.doc.is_element(node, &["td", "th", "caption"]) {
            self.formatting.clear_to_marker();
        }
    }

    /// Pops every element at stack position `index` and above.
    fn pop_until(&mut self, index: usize) {
        while self.open.depth() >= index.max(1) && self.pop_implicit().is_some() {}
    }

    /// Pops the current node, which was closed without an end tag.
    fn pop_implicit(&mut self) -> Option<NodeId> {
        let node = self.open.pop()?;
        self.doc.data_mut(node).auto_inserted_end = true;
        if self.doc.is_element(node, &["td", "th", "caption"]) {
            self.formatting.clear_to_marker();
        }
        Some(node)
    }

    /// Creates an element from a start tag.
    fn create_element(&mut self, tag: &Tag) -> NodeId {
        let node = self.doc.create_element(&tag.name);
        self.doc.set_data(node, (*tag.data).clone());
        self.apply_attributes(node, tag);
        if self.session.is_some()
            && matches!(self.doc.attr(node, "rel"), Some("mw:WikiLink" | "mw:ExtLink"))
            && let Some(href) = self.doc.attr(node, "href").map(str::to_string)
        {
            self.doc.data_mut(node).a.insert("href".to_string(), href);
        }
        node
    }

    /// Copies the attributes of a tag to an element. When reading HTML,
    /// round-trip data goes to the side tables instead.
    fn apply_attributes(&mut self, node: NodeId, tag: &Tag) {
        for attr in &tag.attributes {
            let value = attr.value_text();
            if self.session.is_none() {
                match attr.name.as_str() {
                    "data-parsoid" => {
                        match serde_json::from_str::<DataParsoid>(&value) {
                            Ok(data) => self.doc.set_data(node, data),
                            Err(err) => log::warn!("ignoring invalid data-parsoid: {err}"),
                        }
                        continue;
                    }
                    "data-mw" => {
                        match serde_json::from_str::<Value>(&value) {
                            Ok(mw) => self.doc.set_data_mw(node, mw),
                            Err(err) => log::warn!("ignoring invalid data-mw: {err}"),
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            if self.doc.attr(node, &attr.name).is_none() {
                self.doc.set_attr(node, &attr.name, value);
            }
        }
    }

    fn insert_extension(&mut self, mut ext: Extension) {
        let mw = extension_data_mw(&ext);
        let type_of = format!("mw:Extension/{}", ext.name);
        self.insert_wrapper(ext.expansion.take(), type_of, mw, *ext.data);
    }

    fn insert_transclusion(&mut self, mut tpl: Transclusion) {
        let mw = template_data_mw(&tpl);
        let mut data = DataParsoid::with_tsr(tpl.tsr);
        data.src = Some(core::mem::take(&mut tpl.src));
        self.insert_wrapper(tpl.expansion.take(), "mw:Transclusion".to_string(), mw, data);
    }

    /// Inserts the expansion of an extension tag or template as one atomic
    /// wrapper element. A lone element becomes the wrapper itself; anything
    /// else is wrapped in a new `<span>` or `<div>`.
    fn insert_wrapper(&mut self, expansion: Option<Document>, type_of: String, mut mw: Value, data: DataParsoid) {
        let expansion = expansion.unwrap_or_else(Document::fragment);
        let children = expansion.children(expansion.body()).to_vec();
        let wrapper = match children.as_slice() {
            [only] if expansion.element(*only).is_some() => self.doc.import(&expansion, *only),
            _ => {
                let block = children
                    .iter()
                    .any(|child| expansion.name(*child).is_some_and(|name| BLOCK_TAGS.contains(name)));
                let wrapper = self.doc.create_element(if block { "div" } else { "span" });
                for child in children {
                    let child = self.doc.import(&expansion, child);
                    self.doc.append_child(wrapper, child);
                }
                wrapper
            }
        };

        let type_of = match self.doc.attr(wrapper, "typeof") {
            Some(inner) => format!("{type_of} {inner}"),
            None => type_of,
        };
        self.doc.set_attr(wrapper, "typeof", type_of);
        if let (Value::Object(outer), Some(Value::Object(inner))) = (&mut mw, self.doc.data_mw(wrapper)) {
            for (key, value) in inner {
                outer.insert(key.clone(), value.clone());
            }
        }
        self.doc.set_data_mw(wrapper, mw);
        self.doc.set_data(wrapper, data);

        let name = self.doc.name(wrapper).unwrap_or_default().to_string();
        let table_part = TABLE_PARTS.contains(&name.as_str()) && self.in_table();
        if table_part {
            self.prepare_table_part(&name);
        } else if !BLOCK_TAGS.contains(name.as_str()) {
            self.reconstruct_formatting();
        }
        let foster = !table_part && self.in_table_context();
        self.insert(wrapper, foster);
    }
}

/// The `data-mw` of an extension wrapper, before the handler adds to it.
pub(crate) fn extension_data_mw(ext: &Extension) -> Value {
    let attrs = ext
        .attributes
        .iter()
        .map(|attr| (attr.name.clone(), Value::String(attr.value_text())))
        .collect::<Map<_, _>>();
    let mut mw = Map::new();
    mw.insert("name".into(), Value::String(ext.name.clone()));
    mw.insert("attrs".into(), Value::Object(attrs));
    if let Some(content) = &ext.content {
        let mut body = Map::new();
        body.insert("extsrc".into(), Value::String(content.clone()));
        mw.insert("body".into(), Value::Object(body));
    }
    Value::Object(mw)
}

/// The `data-mw` of a transclusion wrapper. Positional parameters are
/// numbered from 1.
pub(crate) fn template_data_mw(tpl: &Transclusion) -> Value {
    let mut params = Map::new();
    let mut position = 0;
    for (name, value) in &tpl.params {
        let name = name.clone().unwrap_or_else(|| {
            position += 1;
            position.to_string()
        });
        params.insert(name, serde_json::json!({ "wt": value }));
    }
    let target = tpl.target.trim();
    serde_json::json!({
        "parts": [{
            "template": {
                "target": { "wt": target, "href": title_href(&template_title(target)) },
                "params": params,
                "i": 0
            }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        dom::HtmlOptions,
        env::{Collector, Env, NoTemplates, Options},
        ext::Registry,
        pipeline,
        wikitext::{Frame, StartRule},
    };

    fn tree(source: &str, registry: &Registry, collector: &Collector) -> Document {
        let _ = env_logger::try_init();
        let env = Env::new(&CONFIG, registry, &NoTemplates, collector, Options::default());
        let session = Session::new(&env, source);
        let frame = Frame::root("Test", source);
        let tokens = env.tokenizer().tokenize(source, StartRule::Document).unwrap();
        let tokens = pipeline::run(&session, &frame, tokens);
        build(&session, tokens)
    }

    fn html(doc: &Document) -> String {
        doc.inner_html(doc.body(), &HtmlOptions::default())
    }

    #[test]
    fn paragraphs_and_lists() {
        let collector = Collector::default();
        let doc = tree("a\n\n*b", &Registry::default(), &collector);
        assert_eq!(html(&doc), "<p>a</p>\n\n<ul><li>b</li></ul>");
        assert!(collector.take().is_empty());
    }

    #[test]
    fn implicit_table_sections() {
        let collector = Collector::default();
        let doc = tree("{|\n|x\n|}", &Registry::default(), &collector);
        assert_eq!(html(&doc), "<table>\n<tbody><tr><td>x\n</td></tr></tbody></table>");

        let table = doc.first_child(doc.body()).unwrap();
        let tbody = doc.children(table)[1];
        let data = doc.data(tbody).unwrap();
        assert!(data.auto_inserted_start && data.auto_inserted_end);
        let table_data = doc.data(table).unwrap();
        assert_eq!(table_data.tsr, Some(Span::new(0, 2)));
        assert_eq!(table_data.end_tsr, Some(Span::new(6, 8)));
    }

    #[test]
    fn foster_parenting() {
        let collector = Collector::default();
        let doc = tree("{|\nfoo\n|}", &Registry::default(), &collector);
        assert_eq!(html(&doc), "<span>foo</span><table>\n\n</table>");
        let holder = doc.first_child(doc.body()).unwrap();
        assert!(is_foster_holder(&doc, holder));
        let text = doc.first_child(holder).unwrap();
        assert!(!doc.data(text).is_some_and(|data| data.fostered));
        let table = doc.last_child(doc.body()).unwrap();
        assert_eq!(doc.children(table).len(), 1);
        assert!(collector.take().iter().any(|event| matches!(
            event,
            crate::env::Event::Lint { kind: "fostered", .. }
        )));
    }

    #[test]
    fn misnested_formatting() {
        let collector = Collector::default();
        let doc = tree("<b>a<i>b</b>c</i>", &Registry::default(), &collector);
        assert_eq!(html(&doc), "<p><b>a<i>b</i></b><i>c</i></p>");
        let p = doc.first_child(doc.body()).unwrap();
        let clone = doc.children(p)[1];
        assert!(doc.data(clone).unwrap().auto_inserted_start);
        assert!(collector.take().iter().any(|event| matches!(
            event,
            crate::env::Event::Lint { kind: "misnested-tag", .. }
        )));
    }

    #[test]
    fn stray_end_tag() {
        let collector = Collector::default();
        let doc = tree("a</span>b", &Registry::default(), &collector);
        assert_eq!(html(&doc), "<p>a<meta typeof=\"mw:Placeholder/StrippedTag\">b</p>");
        let p = doc.first_child(doc.body()).unwrap();
        let data = doc.data(doc.children(p)[1]).unwrap();
        assert_eq!(data.src.as_deref(), Some("</span>"));
        assert_eq!(data.tsr, Some(Span::new(1, 8)));
        assert_eq!(
            collector.take(),
            [crate::env::Event::Lint {
                kind: "stray-end-tag",
                range: Some((1, 8)),
                message: "</span>".into()
            }]
        );
    }

    #[test]
    fn stray_end_tags_in_html() {
        let doc = build_html(vec![
            Token::text("a", None),
            Token::EndTag(Tag::new("span", vec![], Some(Span::new(1, 8)))),
            Token::text("b", None),
        ]);
        assert_eq!(html(&doc), "ab");
    }

    #[test]
    fn extension_wrapper() {
        let collector = Collector::default();
        let doc = tree("<nowiki>''x''</nowiki>", &Registry::with_builtins(), &collector);
        let p = doc.first_child(doc.body()).unwrap();
        let wrapper = doc.first_child(p).unwrap();
        assert_eq!(doc.name(wrapper), Some("span"));
        assert_eq!(doc.attr(wrapper, "typeof"), Some("mw:Extension/nowiki"));
        assert_eq!(doc.text_content(wrapper), "''x''");
        let mw = doc.data_mw(wrapper).unwrap();
        assert_eq!(mw["name"], "nowiki");
        assert_eq!(mw["body"]["extsrc"], "''x''");
        assert_eq!(doc.data(wrapper).unwrap().src.as_deref(), Some("<nowiki>''x''</nowiki>"));
    }
}
