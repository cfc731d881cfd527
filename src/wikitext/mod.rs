//! Wikitext tokenizer.

pub use codemap::{FileMap, OffsetType, Span, Spanned};
pub use config::{BLOCK_TAGS, Configuration, ConfigurationSource, HTML5_TAGS, MagicLinks, VOID_TAGS};
pub use frame::{Error as FrameError, Frame};
pub(crate) use parser::title_href;
pub(crate) use peg::str::LineCol;
pub use token::{Attribute, Extension, Tag, Text, Token, Transclusion, flatten_text};
use std::{cell::Cell, collections::HashSet};

mod codemap;
mod config;
mod frame;
mod parser;
#[cfg(test)]
mod tests;
mod token;

/// A tokenizer error.
pub type Error = peg::error::ParseError<LineCol>;

/// The production to start tokenizing from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartRule {
    /// A complete document, starting at the start of a line.
    Document,
    /// Inline content which is not at the start of a line.
    Inline,
    /// The content of a `<nowiki>`, where only entities are recognised.
    Nowiki,
    /// A single complete extension tag.
    ExtensionTag,
    /// A bare link target.
    LinkTarget,
    /// The content of a table cell, immediately after its `|`.
    TableCell,
}

/// A wikitext tokenizer.
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
    /// The configuration for the tokenizer.
    config: &'a Configuration,
    /// Lowercased names of every tag which is treated as an extension tag.
    extension_tags: HashSet<String>,
}

impl<'a> Tokenizer<'a> {
    /// Creates a new tokenizer with the given configuration.
    pub fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            extension_tags: config.extension_tags.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    /// Adds extra extension tag names which are not part of the site
    /// configuration.
    #[must_use]
    pub fn with_extension_tags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extension_tags
            .extend(names.into_iter().map(|name| name.as_ref().to_ascii_lowercase()));
        self
    }

    /// The configuration used by this tokenizer.
    #[inline]
    pub fn config(&self) -> &'a Configuration {
        self.config
    }

    /// Returns true if `name` is the name of an extension tag.
    pub fn is_extension_tag(&self, name: &str) -> bool {
        self.extension_tags.contains(&name.to_ascii_lowercase())
    }

    /// Tokenizes `source` starting from the given production.
    ///
    /// The token stream always ends with [`Token::Eof`], except for the
    /// [`StartRule::ExtensionTag`] and [`StartRule::LinkTarget`] rules, which
    /// fail unless the whole input is a single construct.
    pub fn tokenize(&self, source: &str, rule: StartRule) -> Result<Vec<Token>, Error> {
        let globals = Globals::default();
        log::trace!("tokenizing {} bytes from {rule:?}", source.len());
        match rule {
            StartRule::Document => parser::wikitext::document(source, self, &globals),
            StartRule::Inline => parser::wikitext::inline(source, self, &globals),
            StartRule::Nowiki => parser::wikitext::nowiki(source, self, &globals),
            StartRule::ExtensionTag => parser::wikitext::extension_tag_only(source, self, &globals),
            StartRule::LinkTarget => parser::wikitext::link_target(source, self, &globals),
            StartRule::TableCell => parser::wikitext::table_cell(source, self, &globals),
        }
    }
}

/// Global tokenizer state.
#[derive(Debug, Default)]
struct Globals {
    /// The number of tables which are open at the current position. Table
    /// rows and cells are only recognised inside a table.
    table_depth: Cell<usize>,
}
