//! The `<ref>` and `<references>` extension tags.
//!
//! A `<ref>` becomes a footnote marker whose content is stored as HTML in
//! `data-mw`. The markers are numbered, and the `<references>` lists are
//! filled, by the references post-processor once the whole page has been
//! built, since numbering depends on every other reference in the page.

use super::{ExtArgs, ExtensionContext, ExtensionTagHandler, SerializerHost, WhitespacePolicy, tag_source};
use crate::{
    Result,
    dom::{Document, HtmlOptions, NodeId},
};
use serde_json::{Value, json};

/// The `<ref>` handler.
#[derive(Debug, Default)]
pub struct Ref;

impl ExtensionTagHandler for Ref {
    fn source_to_dom(&self, cx: &ExtensionContext<'_>, content: Option<&str>, args: &ExtArgs) -> Result<Document> {
        let mut doc = Document::fragment();
        let sup = doc.create_element("sup");
        doc.set_attr(sup, "class", "mw-ref reference");
        if let Some(group) = args.get("group").filter(|group| !group.is_empty()) {
            doc.set_attr(sup, "data-mw-group", group);
        }
        let a = doc.create_element("a");
        doc.set_attr(a, "href", "");
        let label = doc.create_element("span");
        doc.set_attr(label, "class", "mw-reflink-text");
        let text = doc.create_text("[?]");
        doc.append_child(doc.root(), sup);
        doc.append_child(sup, a);
        doc.append_child(a, label);
        doc.append_child(label, text);

        if let Some(content) = content.filter(|content| !content.trim().is_empty()) {
            let body = cx.parse(content, true)?;
            let html = body.inner_html(body.body(), &HtmlOptions::default());
            doc.set_data_mw(sup, json!({ "body": { "html": html } }));
        }

        Ok(doc)
    }

    fn dom_to_wikitext(&self, host: &dyn SerializerHost, doc: &Document, node: NodeId) -> Result<Option<String>> {
        let Some(data_mw) = doc.data_mw(node) else {
            return Ok(None);
        };
        let body = match data_mw.pointer("/body/html").and_then(Value::as_str) {
            Some(html) => Some(host.html_to_wikitext(html)?),
            None => None,
        };
        Ok(Some(tag_source("ref", data_mw.get("attrs"), body.as_deref())))
    }

    fn attribute_policy(&self, name: &str) -> WhitespacePolicy {
        match name {
            "follow" => WhitespacePolicy::Trim,
            _ => WhitespacePolicy::Default,
        }
    }

    fn process_attribute_embedded_dom(&self, data_mw: &mut Value, f: &mut dyn FnMut(&mut String)) {
        if let Some(Value::String(html)) = data_mw.pointer_mut("/body/html") {
            f(html);
        }
    }
}

/// The `<references>` handler.
#[derive(Debug, Default)]
pub struct References;

impl ExtensionTagHandler for References {
    fn source_to_dom(&self, _: &ExtensionContext<'_>, _: Option<&str>, args: &ExtArgs) -> Result<Document> {
        let mut doc = Document::fragment();
        let div = doc.create_element("div");
        doc.set_attr(div, "class", "mw-references-wrap");
        let ol = doc.create_element("ol");
        doc.set_attr(ol, "class", "mw-references references");
        if let Some(group) = args.get("group").filter(|group| !group.is_empty()) {
            doc.set_attr(ol, "data-mw-group", group);
        }
        doc.append_child(doc.root(), div);
        doc.append_child(div, ol);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl SerializerHost for Echo {
        fn html_to_wikitext(&self, html: &str) -> Result<String> {
            Ok(format!("wt({html})"))
        }
    }

    #[test]
    fn ref_to_wikitext() {
        let mut doc = Document::new();
        let sup = doc.create_element("sup");
        doc.append_child(doc.body(), sup);
        doc.set_data_mw(
            sup,
            json!({ "name": "ref", "attrs": { "name": "a" }, "body": { "html": "x" } }),
        );
        assert_eq!(
            Ref.dom_to_wikitext(&Echo, &doc, sup).unwrap().as_deref(),
            Some("<ref name=\"a\">wt(x)</ref>")
        );

        doc.set_data_mw(sup, json!({ "name": "ref", "attrs": { "name": "a" } }));
        assert_eq!(
            Ref.dom_to_wikitext(&Echo, &doc, sup).unwrap().as_deref(),
            Some("<ref name=\"a\" />")
        );
    }

    #[test]
    fn embedded_html() {
        let mut data_mw = json!({ "body": { "html": "<b>x</b>" } });
        Ref.process_attribute_embedded_dom(&mut data_mw, &mut |html| html.make_ascii_uppercase());
        assert_eq!(data_mw, json!({ "body": { "html": "<B>X</B>" } }));
    }
}
