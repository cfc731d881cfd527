//! Writing elements from scratch.

use super::{DiffMarks, Host, Serializer, escape::TextContext};
use crate::{
    Error, Result,
    dom::{DataParsoid, Document, NodeId, Syntax},
    ext::{handler_error, tag_source},
    treebuilder::{extension_data_mw, is_foster_holder, template_data_mw},
    wikitext::{StartRule, Token, VOID_TAGS, title_href},
};
use percent_encoding::percent_decode_str;
use serde_json::Value;

/// How an element is written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Handler {
    /// Only the content is written.
    Children,
    Heading(usize),
    ListItem,
    Table,
    Caption,
    Row,
    Cell,
    Rule,
    /// Italic or bold, with its quote marker.
    Quote(&'static str),
    /// Preformatted text, written with a leading space on every line.
    Pre,
    WikiLink,
    ExtLink,
    MagicLink,
    Category,
    BehaviorSwitch,
    Entity,
    LanguageVariant,
    Transclusion,
    Extension,
    /// Source kept for something which renders nothing.
    Placeholder,
    /// Literal HTML tags.
    Html,
}

/// Handlers of elements with a wikitext shorthand, by tag name.
static HANDLERS: phf::Map<&'static str, Handler> = phf::phf_map! {
    "body" => Handler::Children,
    "p" => Handler::Children,
    "ul" => Handler::Children,
    "ol" => Handler::Children,
    "dl" => Handler::Children,
    "tbody" => Handler::Children,
    "thead" => Handler::Children,
    "tfoot" => Handler::Children,
    "h1" => Handler::Heading(1),
    "h2" => Handler::Heading(2),
    "h3" => Handler::Heading(3),
    "h4" => Handler::Heading(4),
    "h5" => Handler::Heading(5),
    "h6" => Handler::Heading(6),
    "li" => Handler::ListItem,
    "dt" => Handler::ListItem,
    "dd" => Handler::ListItem,
    "table" => Handler::Table,
    "caption" => Handler::Caption,
    "tr" => Handler::Row,
    "td" => Handler::Cell,
    "th" => Handler::Cell,
    "hr" => Handler::Rule,
    "pre" => Handler::Pre,
    "i" => Handler::Quote("''"),
    "b" => Handler::Quote("'''"),
};

/// The text context inside `node`.
pub(super) fn context_for(doc: &Document, node: NodeId, mut cx: TextContext) -> TextContext {
    match doc.name(node) {
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => cx.heading = true,
        Some("table") => {
            cx.table = true;
            cx.table_cell = false;
        }
        Some(name @ ("td" | "th" | "caption")) => {
            cx.table_cell = true;
            cx.header_cell = name == "th";
        }
        Some("dt") => cx.definition_term = true,
        Some("dd" | "li") => cx.definition_term = false,
        Some("pre") => cx.pre = true,
        Some("a") => match doc.attr(node, "rel") {
            Some("mw:WikiLink") => cx.link_text = true,
            Some("mw:ExtLink") => cx.ext_link_text = true,
            _ => {}
        },
        _ => {}
    }
    cx
}

impl Serializer<'_> {
    /// Writes an element from scratch.
    pub(super) fn element(&mut self, node: NodeId) -> Result {
        let handler = self.handler(node);
        log::trace!("writing <{}> as {handler:?}", self.doc.name(node).unwrap_or_default());
        match handler {
            Handler::Children => self.children(node),
            Handler::Heading(level) => self.heading(node, level),
            Handler::ListItem => self.list_item(node),
            Handler::Table => self.table(node),
            Handler::Caption => {
                self.emit("|+");
                self.cell_content(node)
            }
            Handler::Row => self.row(node),
            Handler::Cell => self.cell(node),
            Handler::Rule => {
                let extra = self.doc.data(node).and_then(|data| data.extra_dashes).unwrap_or(0);
                self.emit(&"-".repeat(4 + extra));
                Ok(())
            }
            Handler::Quote(marker) => {
                self.separate_quotes();
                self.emit(marker);
                self.children(node)?;
                self.separate_quotes();
                self.emit(marker);
                Ok(())
            }
            Handler::Pre => self.pre(node),
            Handler::WikiLink => self.wikilink(node),
            Handler::ExtLink => self.extlink(node),
            Handler::MagicLink => {
                let text = self.doc.text_content(node);
                self.emit(&text);
                Ok(())
            }
            Handler::Category => self.category(node),
            Handler::BehaviorSwitch => self.behavior_switch(node),
            Handler::Entity => self.entity(node),
            Handler::LanguageVariant => self.language_variant(node),
            Handler::Transclusion => self.transclusion(node),
            Handler::Extension => self.extension(node),
            Handler::Placeholder => {
                match self.record(node).src {
                    Some(src) => self.emit(&src),
                    None => log::debug!("placeholder without source"),
                }
                Ok(())
            }
            Handler::Html => self.html(node),
        }
    }

    fn handler(&self, node: NodeId) -> Handler {
        let doc = &self.doc;
        if doc.has_type_of(node, "mw:Transclusion") {
            return Handler::Transclusion;
        }
        if doc.has_type_of(node, "mw:Extension/") {
            return Handler::Extension;
        }
        if doc.has_type_of(node, "mw:Entity") {
            return Handler::Entity;
        }
        if doc.has_type_of(node, "mw:LanguageVariant") || doc.attr(node, "data-mw-variant").is_some() {
            return Handler::LanguageVariant;
        }
        if doc.has_type_of(node, "mw:Placeholder") {
            return Handler::Placeholder;
        }
        if is_foster_holder(doc, node) {
            return Handler::Children;
        }

        let data = doc.data(node);
        if data.is_some_and(|data| data.stx == Some(Syntax::MagicLink)) {
            return Handler::MagicLink;
        }
        if data.is_some_and(DataParsoid::is_html) {
            return Handler::Html;
        }

        let name = doc.name(node).unwrap_or_default();
        match (name, doc.attr(node, "rel")) {
            ("a", Some("mw:WikiLink")) => return Handler::WikiLink,
            ("a", Some("mw:ExtLink")) => return Handler::ExtLink,
            ("link", Some("mw:PageProp/Category")) => return Handler::Category,
            _ => {}
        }
        if name == "meta"
            && doc
                .attr(node, "property")
                .is_some_and(|property| property.starts_with("mw:PageProp/"))
        {
            return Handler::BehaviorSwitch;
        }
        HANDLERS.get(name).copied().unwrap_or(Handler::Html)
    }

    /// The record of a node, or an empty one.
    fn record(&self, node: NodeId) -> DataParsoid {
        self.doc.data(node).cloned().unwrap_or_default()
    }

    /// The whitespace trimmed from the start and end of an element.
    fn trimmed_ws(&self, node: NodeId) -> (usize, usize) {
        self.doc.dsr(node).map_or((0, 0), |dsr| {
            (usize::try_from(dsr.leading_ws).unwrap_or(0), usize::try_from(dsr.trailing_ws).unwrap_or(0))
        })
    }

    /// The attributes of an element as `name="value"` pairs, each with a
    /// leading space.
    fn attributes(&self, node: NodeId) -> String {
        let Some(element) = self.doc.element(node) else {
            return String::new();
        };
        element
            .attributes
            .iter()
            .filter(|(name, _)| !matches!(name.as_str(), "data-mw-variant" | "data-mw" | "data-parsoid"))
            .map(|(name, value)| format!(" {name}=\"{}\"", html_escape::encode_double_quoted_attribute(value)))
            .collect()
    }

    fn heading(&mut self, node: NodeId, level: usize) -> Result {
        let marker = "=".repeat(level);
        let (leading, trailing) = self.trimmed_ws(node);
        self.emit(&marker);
        if self.doc.children(node).is_empty() {
            self.emit("<nowiki></nowiki>");
        } else {
            self.emit(&" ".repeat(leading));
            self.children(node)?;
            self.emit(&" ".repeat(trailing));
        }
        self.emit(&marker);
        Ok(())
    }

    fn list_item(&mut self, node: NodeId) -> Result {
        let same_line = self.doc.data(node).is_some_and(|data| data.stx == Some(Syntax::Row));
        let nested = self
            .doc
            .first_child(node)
            .is_some_and(|child| self.doc.is_element(child, &["ul", "ol", "dl"]));

        if same_line {
            self.emit(":");
        } else if !nested {
            let bullets = self.bullets(node);
            self.emit(&bullets);
        }
        self.item_start = Some(self.out.len());
        let (leading, _) = self.trimmed_ws(node);
        self.emit(&" ".repeat(leading));
        self.children(node)
    }

    /// The bullets of a list item, outermost list first.
    fn bullets(&self, node: NodeId) -> String {
        let mut bullets = vec![];
        let mut item = Some(node);
        while let Some(current) = item {
            let Some(list) = self.doc.parent(current) else {
                break;
            };
            let bullet = match (self.doc.name(list), self.doc.name(current)) {
                (Some("ul"), Some("li")) => '*',
                (Some("ol"), Some("li")) => '#',
                (Some("dl"), Some("dt")) => ';',
                (Some("dl"), Some("dd")) => ':',
                _ => break,
            };
            bullets.push(bullet);
            item = self
                .doc
                .parent(list)
                .filter(|parent| self.doc.is_element(*parent, &["li", "dt", "dd"]));
        }
        bullets.into_iter().rev().collect()
    }

    fn table(&mut self, node: NodeId) -> Result {
        let attributes = self.attributes(node);
        self.emit(&format!("{{|{attributes}"));
        self.require_newlines(1);
        self.children(node)?;
        self.require_newlines(1);
        self.emit("|}");
        Ok(())
    }

    fn row(&mut self, node: NodeId) -> Result {
        let data = self.record(node);
        let attributes = self.attributes(node);
        let implicit = data.auto_inserted_start
            || (attributes.is_empty() && data.dsr.is_none() && data.tsr.is_none() && self.is_first_row(node));
        if !implicit {
            self.emit(&format!("|-{attributes}"));
            self.require_newlines(1);
        }
        self.children(node)
    }

    fn is_first_row(&self, node: NodeId) -> bool {
        let Some(table) = self.doc.ancestors(node).find(|id| self.doc.is_element(*id, &["table"])) else {
            return true;
        };
        self.doc
            .descendants(table)
            .into_iter()
            .find(|id| self.doc.is_element(*id, &["tr"]))
            == Some(node)
    }

    fn cell(&mut self, node: NodeId) -> Result {
        let same_line = self.doc.data(node).is_some_and(|data| data.stx == Some(Syntax::Row));
        let marker = match (self.doc.is_element(node, &["th"]), same_line) {
            (false, false) => "|",
            (false, true) => "||",
            (true, false) => "!",
            (true, true) => "!!",
        };
        self.emit(marker);
        self.cell_content(node)
    }

    fn cell_content(&mut self, node: NodeId) -> Result {
        let attributes = self.attributes(node);
        if attributes.is_empty() {
            self.cell_start = Some(self.out.len());
        } else {
            let separator = self.record(node).attr_sep_src.unwrap_or_else(|| "|".to_string());
            self.emit(&format!("{attributes} {separator}"));
        }
        let (leading, _) = self.trimmed_ws(node);
        self.emit(&" ".repeat(leading));
        self.children(node)
    }

    /// Writes `<nowiki/>` if the output ends with an apostrophe, which
    /// would otherwise run into the next quote marker.
    pub(super) fn separate_quotes(&mut self) {
        if self.pending == 0 && self.out.ends_with('\'') {
            self.emit("<nowiki/>");
        }
    }

    fn pre(&mut self, node: NodeId) -> Result {
        let children = self.doc.children(node).to_vec();
        let content = self.capture(|this| {
            for child in children {
                // The source between two lines holds the leading space
                this.cursor = None;
                this.node(child)?;
            }
            Ok(())
        })?;
        if content.split('\n').any(|line| line.trim().is_empty()) {
            return self.html(node);
        }
        self.emit(&format!(" {}", content.replace('\n', "\n ")));
        Ok(())
    }

    fn wikilink(&mut self, node: NodeId) -> Result {
        let href = self.doc.attr(node, "href").unwrap_or_default().to_string();
        let data = self.record(node);
        let tail = data.tail.clone().filter(|tail| !tail.is_empty());

        if self.doc.children(node).iter().all(|child| self.doc.text(*child).is_some()) {
            let text = self.doc.text_content(node);
            if self.is_plain_target(&text) && title_href(&text) == href {
                self.emit(&format!("[[{text}]]"));
                return Ok(());
            }
            if let Some(tail) = &tail
                && let Some(stem) = text.strip_suffix(tail.as_str())
                && self.is_plain_target(stem)
                && title_href(stem) == href
            {
                self.emit(&format!("[[{stem}]]{tail}"));
                return Ok(());
            }
        }

        let target = match data.start_tag_src.as_deref() {
            Some(src) if data.stx == Some(Syntax::Piped) && data.a.get("href") == Some(&href) => src
                .trim_start_matches("[[")
                .strip_suffix('|')
                .map_or_else(|| decode_href(&href), str::to_string),
            _ => decode_href(&href),
        };

        let mut children = self.doc.children(node).to_vec();
        let trailing = tail.filter(|tail| {
            children
                .last()
                .is_some_and(|last| self.doc.text(*last) == Some(tail.as_str()) && self.doc.dsr(*last).is_none())
        });
        if trailing.is_some() {
            children.pop();
        }
        let label = self.capture(|this| {
            for child in children {
                this.node(child)?;
            }
            Ok(())
        })?;

        if label.is_empty() {
            self.emit(&format!("[[{target}]]"));
        } else {
            self.emit(&format!("[[{target}|{label}]]"));
        }
        if let Some(trailing) = trailing {
            self.emit(&trailing);
        }
        Ok(())
    }

    /// Returns true if `text` can be written as a link target as is.
    fn is_plain_target(&self, text: &str) -> bool {
        !text.is_empty()
            && !text.contains(['|', '[', ']', '{', '}', '<', '>', '\n'])
            && self.env.tokenizer().tokenize(text, StartRule::LinkTarget).is_ok()
    }

    fn extlink(&mut self, node: NodeId) -> Result {
        let href = self.doc.attr(node, "href").unwrap_or_default().to_string();
        let free = self.doc.data(node).is_some_and(|data| data.stx == Some(Syntax::Url))
            || self.doc.attr(node, "class").is_some_and(|class| class.contains("external free"));
        if free && self.doc.text_content(node) == href {
            self.emit(&href);
            return Ok(());
        }

        if self.doc.children(node).is_empty() {
            self.emit(&format!("[{href}]"));
        } else {
            let label = self.capture(|this| this.children(node))?;
            self.emit(&format!("[{href} {label}]"));
        }
        Ok(())
    }

    fn category(&mut self, node: NodeId) -> Result {
        let href = self.doc.attr(node, "href").unwrap_or_default().to_string();
        let (title, sort) = match href.split_once('#') {
            Some((title, sort)) => (title, Some(percent_decode_str(sort).decode_utf8_lossy().into_owned())),
            None => (href.as_str(), None),
        };

        if let Some(src) = self.record(node).src
            && category_matches(&src, title, sort.as_deref())
        {
            self.emit(&src);
            return Ok(());
        }

        let mut out = format!("[[{}", decode_href(title));
        if let Some(sort) = sort {
            out.push('|');
            out += &sort;
        }
        out += "]]";
        self.emit(&out);
        Ok(())
    }

    fn behavior_switch(&mut self, node: NodeId) -> Result {
        let name = self
            .doc
            .attr(node, "property")
            .and_then(|property| property.strip_prefix("mw:PageProp/"))
            .unwrap_or_default()
            .to_string();
        let out = match self.record(node).src {
            Some(src) if src.eq_ignore_ascii_case(&format!("__{name}__")) => src,
            _ => format!("__{}__", name.to_ascii_uppercase()),
        };
        self.emit(&out);
        Ok(())
    }

    fn entity(&mut self, node: NodeId) -> Result {
        let text = self.doc.text_content(node);
        match self.record(node).src {
            Some(src) if html_escape::decode_html_entities(&src) == text => self.emit(&src),
            _ => self.text(&text),
        }
        Ok(())
    }

    fn language_variant(&mut self, node: NodeId) -> Result {
        let data = self.record(node);
        let value = self.doc.attr(node, "data-mw-variant").map(str::to_string);
        if let Some(src) = &data.src
            && value.as_ref() == data.a.get("data-mw-variant")
        {
            self.emit(src);
            return Ok(());
        }

        match value.and_then(|value| serde_json::from_str::<Value>(&value).ok()) {
            Some(value) => self.emit(&variant_source(&value, &data.fl)),
            None => {
                log::warn!("language variant without a readable data-mw-variant");
                if let Some(src) = &data.src {
                    self.emit(src);
                }
            }
        }
        Ok(())
    }

    /// Returns true if the stored source of a wrapper still describes it.
    ///
    /// With an original document, this is true unless the wrapper’s
    /// `data-mw` changed. Without one, the stored source is read again and
    /// compared with the `data-mw`.
    fn wrapper_is_current(&self, node: NodeId, src: &str) -> bool {
        if self.has_original() {
            return !self.mark(node).intersects(DiffMarks::MODIFIED | DiffMarks::INSERTED);
        }

        let Some(mw) = self.doc.data_mw(node) else {
            return false;
        };
        let tokenizer = self.env.tokenizer();
        if self.doc.has_type_of(node, "mw:Transclusion") {
            let Ok(tokens) = tokenizer.tokenize(src, StartRule::Inline) else {
                return false;
            };
            let Some(tpl) = tokens.iter().find_map(|token| match token {
                Token::TemplateFragmentMarker(tpl) => Some(tpl),
                _ => None,
            }) else {
                return false;
            };
            let stored = template_data_mw(tpl);
            ["/parts/0/template/target/wt", "/parts/0/template/params"]
                .iter()
                .all(|pointer| stored.pointer(pointer) == mw.pointer(pointer))
        } else {
            let Ok(tokens) = tokenizer.tokenize(src, StartRule::ExtensionTag) else {
                return false;
            };
            let Some(Token::ExtensionPlaceholder(ext)) = tokens.first() else {
                return false;
            };
            let stored = extension_data_mw(ext);
            let same_body = match mw.pointer("/body/extsrc") {
                Some(body) => stored.pointer("/body/extsrc") == Some(body),
                None => true,
            };
            same_body && stored.get("name") == mw.get("name") && stored.get("attrs") == mw.get("attrs")
        }
    }

    fn transclusion(&mut self, node: NodeId) -> Result {
        let src = self.record(node).src;
        if let Some(src) = &src
            && self.wrapper_is_current(node, src)
        {
            self.emit(src);
            return Ok(());
        }

        match self.doc.data_mw(node).and_then(transclusion_source) {
            Some(out) => self.emit(&out),
            None => match src {
                Some(src) => self.emit(&src),
                None => log::warn!("transclusion without parts or source"),
            },
        }
        Ok(())
    }

    fn extension(&mut self, node: NodeId) -> Result {
        let src = self.record(node).src;
        if let Some(src) = &src
            && self.wrapper_is_current(node, src)
        {
            self.emit(src);
            return Ok(());
        }

        let mw = self.doc.data_mw(node).cloned().unwrap_or(Value::Null);
        let name = mw
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| {
                self.doc
                    .type_of(node, "mw:Extension/")
                    .and_then(|type_of| type_of.strip_prefix("mw:Extension/"))
            })
            .unwrap_or_default()
            .to_string();

        let env = self.env;
        let Some(handler) = env.registry.get(&name) else {
            return match src {
                Some(src) => {
                    self.emit(&src);
                    Ok(())
                }
                None => Err(Error::MissingHandler(name)),
            };
        };

        let host = Host { env };
        let out = match handler
            .dom_to_wikitext(&host, &self.doc, node)
            .map_err(|err| handler_error(&name, err))?
        {
            Some(out) => out,
            None => tag_source(&name, mw.get("attrs"), mw.pointer("/body/extsrc").and_then(Value::as_str)),
        };

        if self.is_extension_tag(&name, &out) {
            self.emit(&out);
        } else if let Some(src) = src {
            log::warn!("<{name}> handler wrote something which is not a <{name}> tag; keeping the stored source");
            self.emit(&src);
        } else {
            log::warn!("<{name}> handler wrote something which is not a <{name}> tag");
            self.emit(&out);
        }
        Ok(())
    }

    /// Returns true if `text` is exactly one `name` extension tag.
    fn is_extension_tag(&self, name: &str, text: &str) -> bool {
        match self.env.tokenizer().tokenize(text, StartRule::ExtensionTag).as_deref() {
            Ok([Token::ExtensionPlaceholder(ext), rest @ ..]) => {
                ext.name.eq_ignore_ascii_case(name) && rest.iter().all(|token| matches!(token, Token::Eof(_)))
            }
            _ => false,
        }
    }

    fn html(&mut self, node: NodeId) -> Result {
        let data = self.record(node);
        let modified = self.mark(node).intersects(DiffMarks::MODIFIED | DiffMarks::INSERTED);
        let name = self.doc.name(node).unwrap_or_default().to_string();
        let written = data.src_tag_name.clone().unwrap_or_else(|| name.clone());

        let start = match data.start_tag_src.clone() {
            Some(src) if !modified => src,
            _ => {
                let close = if data.self_close { " /" } else { "" };
                format!("<{written}{}{close}>", self.attributes(node))
            }
        };
        self.emit(&start);
        if VOID_TAGS.contains(name.as_str()) || data.self_close {
            return Ok(());
        }

        self.children(node)?;
        if data.auto_inserted_end && data.is_html() {
            return Ok(());
        }
        let end = match data.end_tag_src {
            Some(src) if !modified => src,
            _ => format!("</{written}>"),
        };
        self.emit(&end);
        Ok(())
    }
}

/// Converts a relative link back to a page title.
fn decode_href(href: &str) -> String {
    let title = href.strip_prefix("./").unwrap_or(href);
    percent_decode_str(title).decode_utf8_lossy().replace('_', " ")
}

/// Returns true if the category link source `src` links to `title` with the
/// sort key `sort`.
fn category_matches(src: &str, title: &str, sort: Option<&str>) -> bool {
    let Some(inner) = src.strip_prefix("[[").and_then(|inner| inner.strip_suffix("]]")) else {
        return false;
    };
    let (target, src_sort) = match inner.split_once('|') {
        Some((target, sort)) => (target, Some(sort)),
        None => (inner, None),
    };
    let Some((_, name)) = target.trim().split_once(':') else {
        return false;
    };
    title_href(&format!("Category:{}", name.trim())) == title && src_sort == sort
}

/// Writes a transclusion from its `data-mw` parts.
fn transclusion_source(mw: &Value) -> Option<String> {
    let mut out = String::new();
    for part in mw.get("parts")?.as_array()? {
        if let Some(text) = part.as_str() {
            out += text;
            continue;
        }
        let template = part.get("template")?;
        out += "{{";
        out += template.pointer("/target/wt")?.as_str()?;
        if let Some(Value::Object(params)) = template.get("params") {
            let mut position = 1;
            for (name, param) in params {
                let value = param.get("wt").and_then(Value::as_str).unwrap_or_default();
                out.push('|');
                if *name == position.to_string() && !value.contains('=') {
                    position += 1;
                } else {
                    out += name;
                    out.push('=');
                }
                out += value;
            }
        }
        out += "}}";
    }
    Some(out)
}

/// Writes language variant markup from its `data-mw-variant`.
fn variant_source(value: &Value, fl: &[String]) -> String {
    let text = |value: Option<&Value>, key: &str| {
        let text = value.and_then(|value| value.get(key)).and_then(Value::as_str).unwrap_or_default();
        html_escape::decode_html_entities(text).into_owned()
    };

    let mut flags = if fl.is_empty() {
        [("add", "A"), ("remove", "-"), ("title", "T"), ("describe", "D")]
            .into_iter()
            .filter(|(key, _)| value.get(*key) == Some(&Value::Bool(true)))
            .map(|(_, flag)| flag.to_string())
            .collect::<Vec<_>>()
    } else {
        fl.to_vec()
    };

    let body = if let Some(name) = value.get("name") {
        if !flags.iter().any(|flag| flag == "N") {
            flags.push("N".to_string());
        }
        text(Some(name), "t")
    } else if let Some(Value::Array(entries)) = value.get("twoway") {
        entries
            .iter()
            .map(|entry| format!("{}:{}", text(Some(entry), "l"), text(Some(entry), "t")))
            .collect::<Vec<_>>()
            .join(";")
    } else if let Some(Value::Array(entries)) = value.get("oneway") {
        entries
            .iter()
            .map(|entry| format!("{}=>{}:{}", text(Some(entry), "f"), text(Some(entry), "l"), text(Some(entry), "t")))
            .collect::<Vec<_>>()
            .join(";")
    } else {
        text(value.get("disabled"), "t")
    };

    if flags.is_empty() {
        format!("-{{{body}}}-")
    } else {
        format!("-{{{}|{body}}}-", flags.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hrefs() {
        assert_eq!(decode_href("./Foo_bar%C3%A9"), "Foo baré");
        assert!(category_matches("[[Category:Foo bar|x]]", "./Category:Foo_bar", Some("x")));
        assert!(!category_matches("[[Category:Foo]]", "./Category:Foo", Some("x")));
        assert!(!category_matches("[[Category:Foo]]", "./Category:Bar", None));
    }

    #[test]
    fn transclusions() {
        let mw = json!({
            "parts": [{
                "template": {
                    "target": { "wt": "echo" },
                    "params": { "1": { "wt": "a" }, "name": { "wt": "b" }, "3": { "wt": "c" } },
                    "i": 0
                }
            }]
        });
        assert_eq!(transclusion_source(&mw).as_deref(), Some("{{echo|a|name=b|3=c}}"));
        assert_eq!(transclusion_source(&json!({})), None);
    }

    #[test]
    fn variants() {
        let value = json!({ "twoway": [{ "l": "sr-ec", "t": "&lt;a&gt;" }, { "l": "sr-el", "t": "b" }] });
        assert_eq!(variant_source(&value, &[]), "-{sr-ec:<a>;sr-el:b}-");
        let value = json!({ "add": true, "oneway": [{ "f": "x", "l": "sr-el", "t": "y" }] });
        assert_eq!(variant_source(&value, &[]), "-{A|x=>sr-el:y}-");
        assert_eq!(variant_source(&json!({ "disabled": { "t": "z" } }), &[]), "-{z}-");
        assert_eq!(variant_source(&json!({ "name": { "t": "n" } }), &[]), "-{N|n}-");
    }

    #[test]
    fn contexts() {
        let mut doc = Document::new();
        let h = doc.create_element("h2");
        let a = doc.create_element("a");
        doc.set_attr(a, "rel", "mw:WikiLink");
        let cx = context_for(&doc, h, TextContext::default());
        assert!(cx.heading && !cx.link_text);
        let cx = context_for(&doc, a, cx);
        assert!(cx.heading && cx.link_text);

        let th = doc.create_element("th");
        let dt = doc.create_element("dt");
        let dd = doc.create_element("dd");
        let cx = context_for(&doc, th, TextContext::default());
        assert!(cx.table_cell && cx.header_cell);
        let cx = context_for(&doc, dt, cx);
        assert!(cx.definition_term);
        assert!(!context_for(&doc, dd, cx).definition_term);
    }
}
