//! Bidirectional conversion between wikitext and an HTML DOM which carries
//! enough source provenance to reproduce the original wikitext.
//!
//! The forward direction runs the wikitext through the tokenizer, the token
//! pipeline, the tree builder, and the DOM post-processors. The reverse
//! direction serializes a (possibly edited) DOM, reusing original source for
//! everything which did not change.

pub mod config;
pub mod dom;
pub mod env;
pub mod ext;
pub mod pipeline;
pub mod postprocess;
pub mod serializer;
#[cfg(test)]
mod tests;
pub mod treebuilder;
pub mod wikitext;

pub use dom::{Document, NodeId};
pub use env::{Env, Options, Session};
pub use serializer::Original;
use wikitext::{Frame, StartRule};

/// A conversion error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tokenizer could not match a required production.
    #[error("syntax error: {0}")]
    Syntax(#[from] wikitext::Error),

    /// A template could not be expanded.
    #[error(transparent)]
    Frame(#[from] wikitext::FrameError),

    /// An extension handler failed.
    #[error("extension <{name}> failed: {source}")]
    Extension {
        /// The extension tag name.
        name: String,
        /// The error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// An extension wrapper has no handler and no stored source.
    #[error("no serialization handler for <{0}>")]
    MissingHandler(String),

    /// A JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTML input could not be read.
    #[error("html error: {0}")]
    Html(String),

    /// A write to a buffer failed.
    #[error("fmt error: {0}")]
    Fmt(#[from] core::fmt::Error),
}

/// The result type for conversions.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Converts wikitext to an annotated document.
pub fn wikitext_to_dom(env: &Env<'_>, source: &str) -> Result<Document> {
    let session = Session::new(env, source);
    let _flush = session.begin();

    let frame = Frame::root(&env.options.title, source);
    let tokens = env.tokenizer().tokenize(source, StartRule::Document)?;
    let tokens = pipeline::run(&session, &frame, tokens);
    let mut doc = treebuilder::build(&session, tokens);
    doc.offset_type = wikitext::OffsetType::Byte;
    postprocess::run(&session, &mut doc, true);
    Ok(doc)
}

/// Converts an annotated document back to wikitext.
///
/// If the original document and its source are given, unchanged parts of
/// the document reuse the original source.
pub fn dom_to_wikitext(env: &Env<'_>, doc: &Document, original: Option<&Original<'_>>) -> Result<String> {
    serializer::serialize(env, doc, original)
}
