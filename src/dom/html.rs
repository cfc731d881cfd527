//! HTML output and input.
//!
//! Output is plain HTML5 with the side tables either left out or written
//! inline as `data-parsoid` and `data-mw` attributes. Input is read with a
//! small tag-soup reader and rebuilt with the tree builder, so that
//! documents written by this module come back with the same structure.

use super::{Document, NodeId, NodeKind};
use crate::{
    Error, Result, treebuilder,
    wikitext::{Attribute, Text, Token, VOID_TAGS},
};
use std::fmt::Write as _;

/// HTML output options.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlOptions {
    /// Write round-trip records and extension metadata inline as
    /// `data-parsoid` and `data-mw` attributes.
    pub inline_data: bool,
}

impl Document {
    /// Writes the whole document as HTML.
    pub fn to_html(&self, options: &HtmlOptions) -> String {
        let mut out = String::from("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/></head>");
        if self.body() == self.root() {
            out += "<body>";
            out += &self.inner_html(self.root(), options);
            out += "</body>";
        } else {
            self.write_node(&mut out, self.body(), options);
        }
        out += "</html>";
        out
    }

    /// Writes the children of a node as HTML.
    pub fn inner_html(&self, node: NodeId, options: &HtmlOptions) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(&mut out, *child, options);
        }
        out
    }

    fn write_node(&self, out: &mut String, node: NodeId, options: &HtmlOptions) {
        match self.kind(node) {
            NodeKind::Document | NodeKind::DocumentFragment => {
                for child in self.children(node) {
                    self.write_node(out, *child, options);
                }
            }
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(&text.replace("-->", "--&gt;"));
                out.push_str("-->");
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attributes {
                    write_attr(out, name, value);
                }
                if options.inline_data {
                    self.write_inline_data(out, node);
                }
                out.push('>');
                if VOID_TAGS.contains(element.name.as_str()) {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(out, *child, options);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }

    fn write_inline_data(&self, out: &mut String, node: NodeId) {
        if let Some(data) = self.data(node).filter(|data| !data.is_empty()) {
            match serde_json::to_string(data) {
                Ok(json) => write_attr(out, "data-parsoid", &json),
                Err(err) => log::warn!("could not write data-parsoid: {err}"),
            }
        }
        if let Some(mw) = self.data_mw(node) {
            write_attr(out, "data-mw", &mw.to_string());
        }
    }

    /// Reads an HTML document or fragment.
    ///
    /// Only the content of `<body>` is kept. Inline `data-parsoid` and
    /// `data-mw` attributes are moved into the side tables.
    pub fn from_html(html: &str) -> Result<Document> {
        let tokens = reader::document(html).map_err(|err| Error::Html(err.to_string()))?;
        let mut tokens = body_tokens(tokens);
        tokens.push(Token::Eof(None));
        Ok(treebuilder::build_html(tokens))
    }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", html_escape::encode_double_quoted_attribute(value));
}

/// Keeps the tokens inside `<body>`, or everything outside of `<head>` if
/// there is no `<body>` tag.
fn body_tokens(tokens: Vec<Token>) -> Vec<Token> {
    if let Some(start) = tokens.iter().position(|token| token.is_start_tag("body")) {
        let end = tokens
            .iter()
            .rposition(|token| token.is_end_tag("body"))
            .filter(|end| *end > start)
            .unwrap_or(tokens.len());
        return tokens.into_iter().take(end).skip(start).collect();
    }

    let mut in_head = false;
    tokens
        .into_iter()
        .filter(|token| {
            if token.is_start_tag("head") {
                in_head = true;
            } else if token.is_end_tag("head") {
                in_head = false;
                return false;
            }
            !in_head && !token.is_start_tag("html") && !token.is_end_tag("html")
        })
        .collect()
}

fn decode(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

peg::parser! { grammar reader() for str {
    /// A whole document, as a flat token list.
    pub rule document() -> Vec<Token>
    = items:item()* ![_]
    { items.into_iter().flatten().collect() }

    rule item() -> Option<Token>
    = doctype() { None }
    / c:comment() { Some(c) }
    / t:end_tag() { Some(t) }
    / t:start_tag() { Some(t) }
    / t:text() { Some(t) }

    //////////////////////////////////////////////////////////////////////////
    // Markup
    //////////////////////////////////////////////////////////////////////////

    rule doctype()
    = "<!" !"--" [^'>']* ">"

    rule comment() -> Token
    = "<!--" c:$((!"-->" [_])*) ("-->" / ![_])
    { Token::Comment(Text { value: c.replace("--&gt;", "-->"), tsr: None }) }

    rule end_tag() -> Token
    = "</" n:name() [^'>']* ">"
    { Token::end_tag(&n, None) }

    rule start_tag() -> Token
    = "<" n:name() attrs:attribute()* _ close:"/"? ">"
    {
        if close.is_some() {
            Token::self_closing_tag(&n, attrs, None)
        } else {
            Token::start_tag(&n, attrs, None)
        }
    }

    rule name() -> String
    = n:$(['a'..='z' | 'A'..='Z'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | ':']*)
    { n.to_ascii_lowercase() }

    rule attribute() -> Attribute
    = _ n:$([^ ' ' | '\t' | '\n' | '\r' | '\x0c' | '/' | '>' | '=' | '"' | '\'']+)
      v:(_ "=" _ v:attr_value() { v })?
    { Attribute::new(&n.to_ascii_lowercase(), v.unwrap_or_default()) }

    rule attr_value() -> String
    = "\"" v:$([^'"']*) "\"" { decode(v) }
    / "'" v:$([^'\'']*) "'" { decode(v) }
    / v:$([^ ' ' | '\t' | '\n' | '\r' | '\x0c' | '>']+) { decode(v) }

    rule text() -> Token
    = v:$([^'<']+ / "<")
    { Token::text(decode(v), None) }

    rule _ = [' ' | '\t' | '\n' | '\r' | '\x0c']*
}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomSourceRange;
    use serde_json::json;

    #[test]
    fn write_plain() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attr(p, "title", "a \"b\" & c");
        let text = doc.create_text("x < y");
        let br = doc.create_element("br");
        let comment = doc.create_comment("c");
        doc.append_child(doc.body(), p);
        doc.append_child(p, text);
        doc.append_child(p, br);
        doc.append_child(p, comment);
        doc.data_mut(p).dsr = Some(DomSourceRange::new(0, 5, Some(0), Some(0)));

        assert_eq!(
            doc.inner_html(doc.body(), &HtmlOptions::default()),
            r#"<p title="a &quot;b&quot; &amp; c">x &lt; y<br><!--c--></p>"#
        );
        let inline = doc.inner_html(doc.body(), &HtmlOptions { inline_data: true });
        assert!(inline.contains("data-parsoid=\"{&quot;dsr&quot;:[0,5,0,0]}\""), "{inline}");
    }

    #[test]
    fn read_back() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "typeof", "mw:Extension/ref");
        doc.set_data_mw(div, json!({ "name": "ref" }));
        doc.data_mut(div).dsr = Some(DomSourceRange::new(2, 9, Some(5), Some(6)));
        let text = doc.create_text("a&b");
        doc.append_child(doc.body(), div);
        doc.append_child(div, text);

        let html = doc.to_html(&HtmlOptions { inline_data: true });
        let read = Document::from_html(&html).unwrap();
        let div = read.first_child(read.body()).unwrap();
        assert_eq!(read.name(div), Some("div"));
        assert_eq!(read.attr(div, "data-parsoid"), None);
        assert_eq!(read.dsr(div), Some(DomSourceRange::new(2, 9, Some(5), Some(6))));
        assert_eq!(read.data_mw(div), Some(&json!({ "name": "ref" })));
        assert_eq!(read.text_content(div), "a&b");
    }

    #[test]
    fn fragments() {
        let doc = Document::from_html("a<b>c</b><!-- x --><br/>d &amp; e").unwrap();
        assert_eq!(
            doc.inner_html(doc.body(), &HtmlOptions::default()),
            "a<b>c</b><!-- x --><br>d &amp; e"
        );
    }

    #[test]
    fn unclosed_tags() {
        let doc = Document::from_html("<ul><li>a<li>b</ul>").unwrap();
        assert_eq!(
            doc.inner_html(doc.body(), &HtmlOptions::default()),
            "<ul><li>a</li><li>b</li></ul>"
        );
    }
}
