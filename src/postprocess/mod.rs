//! DOM post-processing.
//!
//! These passes run in order over a freshly built document. Only the source
//! range pass writes `dsr`; every later pass which moves nodes around drops
//! the ranges of what it moved instead of fixing them up.

use crate::{dom::Document, env::Session};

mod cleanup;
mod dsr;
mod lang_variant;
mod newlines;
mod references;

pub use lang_variant::{MarkupGuesser, ScriptGuesser, VariantGuesser};

/// A post-processing pass.
type Pass = fn(&Session<'_>, &mut Document, bool);

/// Every pass, in the order they run.
const PASSES: &[(&str, Pass)] = &[
    ("migrate-trailing-newlines", newlines::run),
    ("dsr", dsr::run),
    ("cleanup", cleanup::run),
    ("lang-variant", lang_variant::run),
    ("references", references::run),
];

/// Runs every pass over `doc`. `top_level` is false for documents which
/// will be embedded in another document.
pub fn run(session: &Session<'_>, doc: &mut Document, top_level: bool) {
    for (name, pass) in PASSES {
        log::trace!("running {name} pass");
        pass(session, doc, top_level);
    }
}

/// Returns true if the node renders nothing where it is written.
pub(crate) fn is_rendering_transparent(doc: &Document, id: crate::dom::NodeId) -> bool {
    doc.is_comment(id)
        || (doc.is_element(id, &["link", "meta"])
            && doc
                .attr(id, "rel")
                .or_else(|| doc.attr(id, "property"))
                .is_some_and(|value| value.starts_with("mw:PageProp/")))
}
