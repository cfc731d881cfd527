//! The extension tag contract.
//!
//! An extension tag is the one place in wikitext where the body of a tag is
//! not wikitext (or, sometimes, is wikitext, but only as far as the extension
//! says so). The tokenizer treats the whole tag as an opaque placeholder and
//! the pipeline asks the registered handler to turn it into a document
//! fragment. On the way back, the serializer asks the same handler to turn the
//! fragment into source again.
//!
//! A handler can also declare how the whitespace of each of its attributes is
//! normalised. This is applied generically by the attribute pipeline stage,
//! so individual handlers never have to do it themselves.

use crate::{
    Error, Result,
    dom::{Document, NodeId},
    env::Session,
    pipeline,
    wikitext::{Attribute, Frame, Span},
};
use indexmap::IndexMap;
use std::{borrow::Cow, collections::HashMap};
use unicase::UniCase;

mod cite;
mod nowiki;

pub use cite::{References, Ref};
pub use nowiki::Nowiki;
pub(crate) use nowiki::escape as escape_nowiki;

/// How the whitespace in an attribute value is normalised.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WhitespacePolicy {
    /// Leading and trailing whitespace is removed.
    Trim,
    /// Leading and trailing whitespace is removed, and inner runs of
    /// whitespace are collapsed to a single space.
    Normalize,
    /// The value is used as written.
    KeepSpaces,
    /// The same as [`WhitespacePolicy::Normalize`].
    #[default]
    Default,
}

/// Normalises an attribute value according to `policy`.
pub fn normalize_value(value: &str, policy: WhitespacePolicy) -> Cow<'_, str> {
    match policy {
        WhitespacePolicy::KeepSpaces => Cow::Borrowed(value),
        WhitespacePolicy::Trim => Cow::Borrowed(value.trim_matches(is_ws)),
        WhitespacePolicy::Normalize | WhitespacePolicy::Default => {
            let trimmed = value.trim_matches(is_ws);
            if trimmed.contains(|c| is_ws(c) && c != ' ') || trimmed.contains("  ") {
                Cow::Owned(trimmed.split(is_ws).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" "))
            } else {
                Cow::Borrowed(trimmed)
            }
        }
    }
}

#[inline]
fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// The normalised attributes of an extension tag.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtArgs(IndexMap<String, String>);

impl ExtArgs {
    /// Flattens and normalises extension tag attributes using the policy
    /// declared by `handler`.
    pub fn new(attributes: &[Attribute], handler: &dyn ExtensionTagHandler) -> Self {
        Self(
            attributes
                .iter()
                .map(|attr| {
                    let value = attr.value_text();
                    let value = normalize_value(&value, handler.attribute_policy(&attr.name));
                    (attr.name.clone(), value.into_owned())
                })
                .collect(),
        )
    }

    /// Gets the value of an attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterates over the attributes in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Converts the attributes to a JSON object for `data-mw`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Services available to an extension handler while it converts its source.
pub struct ExtensionContext<'a> {
    /// The conversion session.
    session: &'a Session<'a>,
    /// The frame which contains the extension tag.
    frame: &'a Frame<'a>,
    /// The extension tag name.
    name: &'a str,
    /// The source range of the extension tag in its frame.
    tsr: Option<Span>,
}

impl<'a> ExtensionContext<'a> {
    /// Creates a new context for the extension tag `name`.
    pub(crate) fn new(session: &'a Session<'a>, frame: &'a Frame<'a>, name: &'a str, tsr: Option<Span>) -> Self {
        Self {
            session,
            frame,
            name,
            tsr,
        }
    }

    /// The conversion session.
    #[inline]
    pub fn session(&self) -> &'a Session<'a> {
        self.session
    }

    /// The extension tag name.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Converts nested wikitext to a document.
    ///
    /// The nested wikitext has no position in the page source, so nothing in
    /// the returned document has a source range.
    pub fn parse(&self, source: &str, inline: bool) -> Result<Document> {
        let title = format!("{}/<{}>", self.frame.title(), self.name);
        let frame = self.frame.child(
            &title,
            source,
            self.tsr.unwrap_or_default(),
            self.session.env.options.max_depth,
        )?;
        pipeline::nested_document(self.session, &frame, inline)
    }
}

/// Services available to an extension handler while it converts its
/// document back to source.
pub trait SerializerHost {
    /// Converts an HTML fragment to wikitext.
    fn html_to_wikitext(&self, html: &str) -> Result<String>;
}

/// A handler for one extension tag.
pub trait ExtensionTagHandler: Send + Sync {
    /// Converts the body of the extension tag to a document fragment. The
    /// content of the fragment’s body becomes the content of the wrapper.
    ///
    /// If the first element of the fragment has `data-mw`, its members are
    /// merged into the `data-mw` of the wrapper.
    fn source_to_dom(&self, cx: &ExtensionContext<'_>, content: Option<&str>, args: &ExtArgs) -> Result<Document>;

    /// Converts a wrapper back to source. Returning `None` uses the generic
    /// conversion from `data-mw`.
    fn dom_to_wikitext(&self, _host: &dyn SerializerHost, _doc: &Document, _node: NodeId) -> Result<Option<String>> {
        Ok(None)
    }

    /// The whitespace policy for the attribute `name`.
    fn attribute_policy(&self, _name: &str) -> WhitespacePolicy {
        WhitespacePolicy::Default
    }

    /// Applies `f` to every HTML string embedded in `data_mw`, so that
    /// embedded HTML can be compared and normalised like the rest of the
    /// document.
    fn process_attribute_embedded_dom(&self, _data_mw: &mut serde_json::Value, _f: &mut dyn FnMut(&mut String)) {}
}

/// Extension tag handlers, by tag name.
#[derive(Default)]
pub struct Registry {
    /// Handlers keyed by case-insensitive tag name.
    handlers: HashMap<UniCase<String>, Box<dyn ExtensionTagHandler>>,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Registry {
    /// Creates a registry with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("nowiki", Nowiki);
        registry.register("ref", Ref);
        registry.register("references", References);
        registry
    }

    /// Registers a handler for `name`, replacing any existing handler.
    pub fn register(&mut self, name: &str, handler: impl ExtensionTagHandler + 'static) {
        self.handlers
            .insert(UniCase::new(name.to_string()), Box::new(handler));
    }

    /// Gets the handler for `name`.
    pub fn get(&self, name: &str) -> Option<&dyn ExtensionTagHandler> {
        self.handlers
            .get(&UniCase::new(name.to_string()))
            .map(Box::as_ref)
    }

    /// Iterates over the registered tag names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|name| name.as_str())
    }
}

/// Writes the source of an extension tag from its `data-mw` attributes and
/// body.
pub(crate) fn tag_source(name: &str, attrs: Option<&serde_json::Value>, body: Option<&str>) -> String {
    let mut out = format!("<{name}");
    if let Some(serde_json::Value::Object(attrs)) = attrs {
        for (key, value) in attrs {
            let value = match value {
                serde_json::Value::String(value) => Cow::Borrowed(value.as_str()),
                value => Cow::Owned(value.to_string()),
            };
            out += &format!(" {key}=\"{}\"", html_escape::encode_double_quoted_attribute(&value));
        }
    }
    match body {
        Some(body) => out += &format!(">{body}</{name}>"),
        None => out += " />",
    }
    out
}

/// Wraps an error from the handler of `name`. Errors which already name an
/// extension are passed through unchanged.
pub(crate) fn handler_error(name: &str, err: Error) -> Error {
    match err {
        err @ Error::Extension { .. } => err,
        err => Error::Extension {
            name: name.to_string(),
            source: Box::new(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies() {
        let value = "  a \n b\tc ";
        assert_eq!(normalize_value(value, WhitespacePolicy::KeepSpaces), value);
        assert_eq!(normalize_value(value, WhitespacePolicy::Trim), "a \n b\tc");
        assert_eq!(normalize_value(value, WhitespacePolicy::Normalize), "a b c");
        assert_eq!(normalize_value(value, WhitespacePolicy::Default), "a b c");
        assert!(matches!(normalize_value(" a b ", WhitespacePolicy::Default), Cow::Borrowed("a b")));
    }

    #[test]
    fn handler_errors() {
        let err = handler_error("ref", Error::Html("bad".into()));
        assert!(matches!(&err, Error::Extension { name, .. } if name == "ref"));
        assert!(matches!(handler_error("references", err), Error::Extension { name, .. } if name == "ref"));
    }

    #[test]
    fn registry() {
        let registry = Registry::with_builtins();
        assert!(registry.get("REF").is_some());
        assert!(registry.get("poem").is_none());
        let mut names = registry.names().collect::<Vec<_>>();
        names.sort_unstable();
        assert_eq!(names, ["nowiki", "ref", "references"]);
    }

    #[test]
    fn args() {
        let attributes = [Attribute::new("name", "  a  b "), Attribute::new("group", "g")];
        let args = ExtArgs::new(&attributes, &Ref);
        assert_eq!(args.get("name"), Some("a b"));
        assert_eq!(args.iter().map(|(k, _)| k).collect::<Vec<_>>(), ["name", "group"]);
        assert_eq!(args.to_json(), serde_json::json!({ "name": "a b", "group": "g" }));
    }
}
