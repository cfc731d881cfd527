//! Tokens produced by the tokenizer and consumed by the pipeline.

use super::codemap::Span;
use crate::dom::{DataParsoid, Document};

/// A wikitext token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// An opening tag.
    StartTag(Tag),
    /// A closing tag.
    EndTag(Tag),
    /// A tag with no content.
    SelfClosingTag(Tag),
    /// Text content.
    Text(Text),
    /// An HTML comment. The value is the raw content between the delimiters.
    Comment(Text),
    /// A line break.
    NewLine(Option<Span>),
    /// The end of the input.
    Eof(Option<Span>),
    /// An extension tag which has not been expanded yet.
    ExtensionPlaceholder(Box<Extension>),
    /// A template call which has not been expanded yet.
    TemplateFragmentMarker(Box<Transclusion>),
}

impl Token {
    /// Creates a text token.
    pub fn text(value: impl Into<String>, tsr: Option<Span>) -> Self {
        Self::Text(Text {
            value: value.into(),
            tsr,
        })
    }

    /// Creates a tag token with the given name and source range.
    pub fn start_tag(name: &str, attributes: Vec<Attribute>, tsr: Option<Span>) -> Self {
        Self::StartTag(Tag::new(name, attributes, tsr))
    }

    /// Creates an end tag token with the given name and source range.
    pub fn end_tag(name: &str, tsr: Option<Span>) -> Self {
        Self::EndTag(Tag::new(name, vec![], tsr))
    }

    /// Creates a self-closing tag token.
    pub fn self_closing_tag(name: &str, attributes: Vec<Attribute>, tsr: Option<Span>) -> Self {
        Self::SelfClosingTag(Tag::new(name, attributes, tsr))
    }

    /// The source range of the token, if it is known.
    pub fn tsr(&self) -> Option<Span> {
        match self {
            Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosingTag(tag) => tag.data.tsr,
            Token::Text(text) | Token::Comment(text) => text.tsr,
            Token::NewLine(tsr) | Token::Eof(tsr) => *tsr,
            Token::ExtensionPlaceholder(ext) => ext.data.tsr,
            Token::TemplateFragmentMarker(tpl) => tpl.tsr,
        }
    }

    /// The tag, if this is a tag token.
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosingTag(tag) => Some(tag),
            _ => None,
        }
    }

    /// Returns true if this is a start tag named `name`.
    pub fn is_start_tag(&self, name: &str) -> bool {
        matches!(self, Token::StartTag(tag) if tag.name == name)
    }

    /// Returns true if this is an end tag named `name`.
    pub fn is_end_tag(&self, name: &str) -> bool {
        matches!(self, Token::EndTag(tag) if tag.name == name)
    }

    /// Drops every source range held by this token.
    ///
    /// Tokens produced in a nested frame have no position in the page
    /// source.
    pub fn strip_tsr(&mut self) {
        match self {
            Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosingTag(tag) => {
                tag.data.tsr = None;
                tag.data.src = None;
                for attr in &mut tag.attributes {
                    attr.strip_tsr();
                }
            }
            Token::Text(text) | Token::Comment(text) => text.tsr = None,
            Token::NewLine(tsr) | Token::Eof(tsr) => *tsr = None,
            Token::ExtensionPlaceholder(ext) => {
                ext.data.tsr = None;
                ext.body = None;
                for attr in &mut ext.attributes {
                    attr.strip_tsr();
                }
            }
            Token::TemplateFragmentMarker(tpl) => tpl.tsr = None,
        }
    }
}

/// A tag token payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    /// The normalised (lowercase) tag name.
    pub name: String,
    /// Attributes, in source order.
    pub attributes: Vec<Attribute>,
    /// Provenance.
    pub data: Box<DataParsoid>,
}

impl Tag {
    /// Creates a new tag.
    pub fn new(name: &str, attributes: Vec<Attribute>, tsr: Option<Span>) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            data: Box::new(DataParsoid::with_tsr(tsr)),
        }
    }

    /// Finds the flattened value of an attribute.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(Attribute::value_text)
    }

    /// Adds a plain string attribute.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }
}

/// A text payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Text {
    /// The text.
    pub value: String,
    /// The source range.
    pub tsr: Option<Span>,
}

/// A tag attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,
    /// The value. Not flattened, since it may contain nested markup.
    pub value: Vec<Token>,
    /// The source range of the whole `name=value` pair.
    pub src: Option<Span>,
}

impl Attribute {
    /// Creates a new attribute with a plain text value.
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: vec![Token::text(value, None)],
            src: None,
        }
    }

    /// Flattens the attribute value to a string.
    pub fn value_text(&self) -> String {
        flatten_text(&self.value)
    }

    fn strip_tsr(&mut self) {
        self.src = None;
        for token in &mut self.value {
            token.strip_tsr();
        }
    }
}

/// An extension tag.
///
/// ```wikitext
/// <ref name="a">Content</ref>
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    /// The lowercased tag name.
    pub name: String,
    /// Attributes of the start tag.
    pub attributes: Vec<Attribute>,
    /// The source range of the body. `None` for `<tag/>`.
    pub body: Option<Span>,
    /// The body text. `None` for `<tag/>`.
    pub content: Option<String>,
    /// Provenance. `src` holds the complete tag source, `tsr` its range, and
    /// `ext_tag_offsets` the widths of the start and end tags.
    pub data: Box<DataParsoid>,
    /// The expanded content, once an extension handler has run.
    pub expansion: Option<Document>,
}

/// A template call.
///
/// ```wikitext
/// {{Name|positional|key=value}}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Transclusion {
    /// The template target, as written.
    pub target: String,
    /// Parameters as `(name, value)`. Positional parameters have no name.
    pub params: Vec<(Option<String>, String)>,
    /// The complete source of the call.
    pub src: String,
    /// The source range of the call.
    pub tsr: Option<Span>,
    /// The expanded content, once the template has been fetched.
    pub expansion: Option<Document>,
}

/// Concatenates the text of a token sequence, ignoring any markup.
pub fn flatten_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out += &text.value,
            Token::NewLine(_) => out.push('\n'),
            _ => {}
        }
    }
    out
}
