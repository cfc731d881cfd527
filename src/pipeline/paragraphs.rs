//! Paragraph wrapping.
//!
//! Runs of inline content at the top level are wrapped in `<p>`. A blank
//! line or a block-level construct ends a paragraph. Line breaks, comments,
//! whitespace, and other things which do not render on their own are held
//! back until it is known which side of a paragraph boundary they belong on.

use super::{Degraded, Stage};
use crate::{
    dom::Document,
    wikitext::{BLOCK_TAGS, Span, Tag, Token, VOID_TAGS},
};

/// How a token affects paragraphs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Class {
    /// Ends any paragraph.
    Block,
    /// Belongs in a paragraph.
    Inline,
    /// Can go inside or outside of a paragraph.
    Transparent,
    /// A line break.
    NewLine,
    /// The end of the input.
    Eof,
}

/// Wraps top-level inline content in paragraphs.
#[derive(Debug, Default)]
pub(super) struct Paragraphs {
    /// Names of the open block elements.
    blocks: Vec<String>,
    /// Whether a paragraph is open.
    in_p: bool,
    /// Held back tokens.
    pending: Vec<Token>,
    /// The number of line breaks in `pending`.
    newlines: usize,
    /// The end of the last token written to the open paragraph.
    last_end: Option<usize>,
}

impl Stage for Paragraphs {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        let class = classify(&token);
        let top_level = self.blocks.is_empty();
        match class {
            Class::Eof => {
                self.close_p(out);
                self.flush(out);
                out.push(token);
            }
            Class::Block => {
                self.close_p(out);
                self.flush(out);
                self.track_block(&token);
                out.push(token);
            }
            Class::NewLine if top_level => {
                self.pending.push(token);
                self.newlines += 1;
                if self.newlines >= 2 {
                    self.close_p(out);
                }
            }
            Class::Transparent if top_level && (!self.in_p || !self.pending.is_empty()) => {
                self.pending.push(token);
            }
            _ if !top_level => {
                self.flush(out);
                out.push(token);
            }
            _ => {
                if self.in_p {
                    let pending = core::mem::take(&mut self.pending);
                    for token in pending {
                        self.push_in_p(token, out);
                    }
                    self.newlines = 0;
                } else {
                    self.open_p(&token, out);
                }
                self.push_in_p(token, out);
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) {
        self.close_p(out);
        self.flush(out);
    }
}

impl Paragraphs {
    /// Opens a paragraph before `next`. Held back tokens before the last
    /// line break stay outside of it.
    fn open_p(&mut self, next: &Token, out: &mut Vec<Token>) {
        let split = self
            .pending
            .iter()
            .rposition(|token| matches!(token, Token::NewLine(_)))
            .map_or(0, |index| index + 1);
        let inside = self.pending.split_off(split);
        out.append(&mut self.pending);
        self.newlines = 0;

        let start = inside.first().unwrap_or(next).tsr().map(|tsr| Span::at(tsr.start));
        out.push(Token::StartTag(Tag::new("p", vec![], start)));
        self.in_p = true;
        self.last_end = start.map(|start| start.start);
        for token in inside {
            self.push_in_p(token, out);
        }
    }

    /// Writes a token inside the open paragraph.
    fn push_in_p(&mut self, token: Token, out: &mut Vec<Token>) {
        if let Some(tsr) = token.tsr() {
            self.last_end = Some(tsr.end);
        }
        out.push(token);
    }

    /// Closes the open paragraph, if there is one.
    fn close_p(&mut self, out: &mut Vec<Token>) {
        if core::mem::take(&mut self.in_p) {
            let end = self.last_end.take().map(Span::at);
            out.push(Token::EndTag(Tag::new("p", vec![], end)));
        }
    }

    /// Writes any held back tokens.
    fn flush(&mut self, out: &mut Vec<Token>) {
        out.append(&mut self.pending);
        self.newlines = 0;
    }

    /// Keeps track of which block elements are open.
    fn track_block(&mut self, token: &Token) {
        match token {
            Token::StartTag(tag) if !VOID_TAGS.contains(tag.name.as_str()) => {
                self.blocks.push(tag.name.clone());
            }
            Token::EndTag(tag) => {
                if let Some(index) = self.blocks.iter().rposition(|name| *name == tag.name) {
                    self.blocks.truncate(index);
                }
            }
            _ => {}
        }
    }
}

/// Classifies a token.
fn classify(token: &Token) -> Class {
    match token {
        Token::Eof(_) => Class::Eof,
        Token::NewLine(_) => Class::NewLine,
        Token::Comment(_) => Class::Transparent,
        Token::Text(text) if text.value.chars().all(|c| c == ' ' || c == '\t') => Class::Transparent,
        Token::Text(_) => Class::Inline,
        Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosingTag(tag) => {
            if BLOCK_TAGS.contains(tag.name.as_str()) {
                Class::Block
            } else if is_page_property(tag) {
                Class::Transparent
            } else {
                Class::Inline
            }
        }
        Token::ExtensionPlaceholder(ext) => expansion_class(ext.expansion.as_ref()),
        Token::TemplateFragmentMarker(tpl) => expansion_class(tpl.expansion.as_ref()),
    }
}

/// Category links and behavior switches render nothing where they are
/// written.
fn is_page_property(tag: &Tag) -> bool {
    matches!(tag.name.as_str(), "link" | "meta")
        && tag
            .attr("rel")
            .or_else(|| tag.attr("property"))
            .is_some_and(|value| value.starts_with("mw:PageProp/"))
}

/// An expansion is block content if it starts with a block element.
fn expansion_class(doc: Option<&Document>) -> Class {
    let block = doc.is_some_and(|doc| {
        doc.children(doc.body())
            .iter()
            .find_map(|child| doc.name(*child))
            .is_some_and(|name| BLOCK_TAGS.contains(name))
    });
    if block { Class::Block } else { Class::Inline }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        wikitext::{StartRule, Tokenizer},
    };

    fn paragraphs(source: &str) -> (String, Vec<Token>) {
        let tokens = Tokenizer::new(&CONFIG).tokenize(source, StartRule::Document).unwrap();
        let mut stage = Paragraphs::default();
        let mut out = vec![];
        for token in tokens {
            stage.transform(token, &mut out).unwrap();
        }
        stage.finish(&mut out);
        let text = out
            .iter()
            .map(|token| match token {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(text) => text.value.clone(),
                Token::Comment(text) => format!("<!--{}-->", text.value),
                Token::NewLine(_) => "\n".into(),
                _ => String::new(),
            })
            .collect();
        (text, out)
    }

    #[test]
    fn blank_lines() {
        assert_eq!(paragraphs("a\nb").0, "<p>a\nb</p>");
        assert_eq!(paragraphs("a\n\nb").0, "<p>a</p>\n\n<p>b</p>");
        assert_eq!(paragraphs("a\n").0, "<p>a</p>\n");
    }

    #[test]
    fn blocks() {
        assert_eq!(paragraphs("=h=\nfoo").0, "<h1>h</h1>\n<p>foo</p>");
        assert_eq!(paragraphs("foo\n----").0, "<p>foo</p>\n");
        assert_eq!(paragraphs("{|\n|x\n|}").0, "<table>\n<td>x\n</table>");
    }

    #[test]
    fn held_back_tokens() {
        assert_eq!(paragraphs("<!--c-->\nfoo").0, "<!--c-->\n<p>foo</p>");
        assert_eq!(paragraphs("<!--c-->foo").0, "<p><!--c-->foo</p>");
        assert_eq!(paragraphs("foo <!--c-->").0, "<p>foo <!--c--></p>");
    }

    #[test]
    fn paragraph_ranges() {
        let (_, out) = paragraphs("ab\n\ncd");
        assert_eq!(out[0].tsr(), Some(Span::at(0)));
        assert_eq!(out[2].tsr(), Some(Span::at(2)));
        assert_eq!(out[5].tsr(), Some(Span::at(4)));
        assert_eq!(out[7].tsr(), Some(Span::at(6)));
    }
}
