//! The `<nowiki>` extension tag.
//!
//! Inside `<nowiki>`, no wikitext is recognised except character references.

use super::{ExtArgs, ExtensionContext, ExtensionTagHandler, SerializerHost};
use crate::{
    Result,
    dom::{Document, NodeId},
    wikitext::{StartRule, Token},
};

/// The `<nowiki>` handler.
#[derive(Debug, Default)]
pub struct Nowiki;

impl ExtensionTagHandler for Nowiki {
    fn source_to_dom(&self, cx: &ExtensionContext<'_>, content: Option<&str>, _: &ExtArgs) -> Result<Document> {
        let mut doc = Document::fragment();
        let span = doc.create_element("span");
        doc.append_child(doc.root(), span);
        let Some(content) = content else {
            return Ok(doc);
        };

        let tokens = cx.session().env.tokenizer().tokenize(content, StartRule::Nowiki)?;
        let mut text = String::new();
        for token in tokens {
            if let Token::Text(t) = token {
                text += &t.value;
            }
        }
        if !text.is_empty() {
            let text = doc.create_text(text);
            doc.append_child(span, text);
        }
        Ok(doc)
    }

    fn dom_to_wikitext(&self, _: &dyn SerializerHost, doc: &Document, node: NodeId) -> Result<Option<String>> {
        let text = doc.text_content(node);
        if text.is_empty() {
            return Ok(Some("<nowiki/>".into()));
        }
        Ok(Some(format!("<nowiki>{}</nowiki>", escape(&text))))
    }
}

/// Encodes the characters which would end the tag or be read as a character
/// reference.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out += "&lt;",
            '>' => out += "&gt;",
            '&' => out += "&amp;",
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("''a'' <b>&amp;"), "''a'' &lt;b&gt;&amp;amp;");
    }
}
