//! The token transform pipeline.
//!
//! Each stage sees the complete output of the stage before it, one token at
//! a time. Stage state lives in the stage itself and is dropped with it, so
//! nothing leaks between runs.
//!
//! A stage which is handed a token it cannot make sense of does not abort
//! the run. The token is degraded to the text it was written as and the
//! observer is told about it.

use crate::{
    Result,
    dom::Document,
    env::Session,
    postprocess, treebuilder,
    wikitext::{Frame, StartRule, Token, flatten_text},
};

mod attributes;
mod extensions;
mod lists;
mod paragraphs;
mod pre;
mod quotes;

use attributes::Attributes;
use extensions::Extensions;
use lists::Lists;
use paragraphs::Paragraphs;
use pre::IndentPre;
use quotes::Quotes;

pub(crate) use extensions::template_title;

/// A token which a stage could not process.
#[derive(Debug)]
pub struct Degraded {
    /// The token.
    pub token: Token,
    /// Why it could not be processed.
    pub reason: String,
}

/// A single pipeline stage.
pub trait Stage {
    /// The name of the stage, for diagnostics.
    fn name(&self) -> &'static str;

    /// Transforms one token, writing the result to `out`.
    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded>;

    /// Called once after the last token.
    fn finish(&mut self, _out: &mut Vec<Token>) {}
}

/// Runs every stage over the tokens of `frame`.
pub fn run(session: &Session<'_>, frame: &Frame<'_>, tokens: Vec<Token>) -> Vec<Token> {
    let tokens = expand(session, frame, tokens);
    let tokens = apply(session, frame, &mut IndentPre::default(), tokens);
    let tokens = apply(session, frame, &mut Paragraphs::default(), tokens);
    apply(session, frame, &mut Attributes::new(session.env.registry), tokens)
}

/// Runs the stages which do not depend on the block structure of the page:
/// extension and template expansion, quotes, and lists.
pub(crate) fn expand(session: &Session<'_>, frame: &Frame<'_>, tokens: Vec<Token>) -> Vec<Token> {
    let tokens = apply(session, frame, &mut Extensions::new(session, frame), tokens);
    let tokens = apply(session, frame, &mut Quotes::default(), tokens);
    apply(session, frame, &mut Lists::default(), tokens)
}

/// Runs a single stage.
fn apply(session: &Session<'_>, frame: &Frame<'_>, stage: &mut dyn Stage, tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Err(Degraded { token, reason }) = stage.transform(token, &mut out) {
            session.degrade(stage.name(), reason);
            out.push(degrade(frame.source(), token));
        }
    }
    stage.finish(&mut out);
    log::trace!("{}: {} tokens", stage.name(), out.len());
    out
}

/// Converts a token to the text it was written as.
fn degrade(source: &str, token: Token) -> Token {
    let tsr = token.tsr();
    if let Some(text) = tsr.and_then(|tsr| source.get(tsr.into_range())) {
        return Token::text(text, tsr);
    }

    let text = match &token {
        Token::ExtensionPlaceholder(ext) => ext.data.src.clone().unwrap_or_default(),
        Token::TemplateFragmentMarker(tpl) => tpl.src.clone(),
        token => flatten_text(core::slice::from_ref(token)),
    };
    Token::text(text, None)
}

/// Converts wikitext from a nested frame into a document with no source
/// ranges.
///
/// Paragraphs are left to the page which contains the nested content, so
/// that an inline template stays in the paragraph it is used in.
pub(crate) fn nested_document(session: &Session<'_>, frame: &Frame<'_>, inline: bool) -> Result<Document> {
    let rule = if inline { StartRule::Inline } else { StartRule::Document };
    let tokens = session.env.tokenizer().tokenize(frame.source(), rule)?;
    let tokens = expand(session, frame, tokens);
    let mut tokens = apply(session, frame, &mut Attributes::new(session.env.registry), tokens);
    for token in &mut tokens {
        token.strip_tsr();
    }
    let mut doc = treebuilder::build(session, tokens);
    postprocess::run(session, &mut doc, false);
    doc.clear_dsr(doc.root());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        env::{Collector, Env, Event, NoTemplates, Options},
        ext::Registry,
        wikitext::Span,
    };

    /// Fails every tag token.
    struct Picky;

    impl Stage for Picky {
        fn name(&self) -> &'static str {
            "picky"
        }

        fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
            if token.tag().is_some() {
                Err(Degraded {
                    token,
                    reason: "no tags".into(),
                })
            } else {
                out.push(token);
                Ok(())
            }
        }
    }

    #[test]
    fn degraded_pass_through() {
        let _ = env_logger::try_init();
        let registry = Registry::default();
        let collector = Collector::default();
        let env = Env::new(&CONFIG, &registry, &NoTemplates, &collector, Options::default());
        let source = "a<b>c";
        let session = Session::new(&env, source);
        let frame = Frame::root("A", source);
        let tokens = env.tokenizer().tokenize(source, StartRule::Document).unwrap();
        let out = apply(&session, &frame, &mut Picky, tokens);
        assert_eq!(out[1], Token::text("<b>", Some(Span::new(1, 4))));
        assert_eq!(
            collector.take(),
            [Event::Degraded {
                stage: "picky",
                message: "no tags".into()
            }]
        );
    }
}
