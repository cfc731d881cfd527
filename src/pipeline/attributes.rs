//! Attribute value normalisation.
//!
//! Extension tags declare how whitespace in each of their attributes is
//! treated. That is applied here, once, for every extension, so handlers
//! never see un-normalised values. Other tags keep their values as written.

use super::{Degraded, Stage};
use crate::{
    ext::{Registry, WhitespacePolicy, normalize_value},
    wikitext::{Attribute, Span, Token},
};
use either::Either;

/// Normalises attribute values.
pub(super) struct Attributes<'a> {
    /// Extension handlers, which own the whitespace policies.
    registry: &'a Registry,
}

impl<'a> Attributes<'a> {
    /// Creates a new attribute stage.
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }
}

impl Stage for Attributes<'_> {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn transform(&mut self, mut token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        match &mut token {
            Token::StartTag(tag) | Token::SelfClosingTag(tag) => {
                for attr in &mut tag.attributes {
                    normalize(attr, WhitespacePolicy::KeepSpaces);
                }
            }
            Token::ExtensionPlaceholder(ext) => {
                let handler = self.registry.get(&ext.name);
                for attr in &mut ext.attributes {
                    let policy = handler.map_or(WhitespacePolicy::Default, |handler| {
                        handler.attribute_policy(&attr.name)
                    });
                    normalize(attr, policy);
                }
            }
            _ => {}
        }
        out.push(token);
        Ok(())
    }
}

/// Either the whole value as one string, or the value tokens when they
/// contain markup.
fn leaf_text(value: &[Token]) -> Either<String, &[Token]> {
    let mut text = String::new();
    for token in value {
        match token {
            Token::Text(leaf) => text += &leaf.value,
            _ => return Either::Right(value),
        }
    }
    Either::Left(text)
}

/// Merges adjacent text leaves of an attribute value and normalises them.
fn normalize(attr: &mut Attribute, policy: WhitespacePolicy) {
    match leaf_text(&attr.value) {
        Either::Left(text) => {
            let tsr = attr.value.iter().filter_map(Token::tsr).reduce(Span::merge);
            let value = normalize_value(&text, policy).into_owned();
            attr.value = if value.is_empty() && attr.value.is_empty() {
                vec![]
            } else {
                vec![Token::text(value, tsr)]
            };
        }
        Either::Right(tokens) => {
            let mut merged = Vec::<Token>::with_capacity(tokens.len());
            for token in tokens.iter().cloned() {
                if let Token::Text(next) = &token
                    && let Some(Token::Text(prev)) = merged.last_mut()
                {
                    prev.value += &next.value;
                    prev.tsr = match (prev.tsr, next.tsr) {
                        (Some(a), Some(b)) => Some(a.merge(b)),
                        _ => None,
                    };
                    continue;
                }
                merged.push(token);
            }
            trim_leaves(&mut merged, policy);
            attr.value = merged;
        }
    }
}

/// Applies a whitespace policy to the text leaves of a value which also
/// contains markup. Only the outer edges are trimmed, since whitespace
/// between a leaf and nested markup is significant.
fn trim_leaves(value: &mut [Token], policy: WhitespacePolicy) {
    if policy == WhitespacePolicy::KeepSpaces {
        return;
    }

    let last = value.len().saturating_sub(1);
    for (index, token) in value.iter_mut().enumerate() {
        let Token::Text(leaf) = token else {
            continue;
        };
        let mut text = leaf.value.as_str();
        if index == 0 {
            text = text.trim_start();
        }
        if index == last {
            text = text.trim_end();
        }
        let text = if matches!(policy, WhitespacePolicy::Normalize | WhitespacePolicy::Default) {
            collapse(text)
        } else {
            text.to_string()
        };
        leaf.value = text;
    }
}

/// Collapses runs of whitespace to single spaces without trimming.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::Tag;

    fn attr(value: Vec<Token>) -> Attribute {
        Attribute {
            name: "x".into(),
            value,
            src: None,
        }
    }

    #[test]
    fn text_values() {
        let mut a = attr(vec![Token::text(" a ", None), Token::text(" \n b", None)]);
        normalize(&mut a, WhitespacePolicy::Normalize);
        assert_eq!(a.value, [Token::text("a b", None)]);

        let mut a = attr(vec![Token::text(" a  b ", None)]);
        normalize(&mut a, WhitespacePolicy::KeepSpaces);
        assert_eq!(a.value_text(), " a  b ");

        let mut a = attr(vec![Token::text(" a  b ", None)]);
        normalize(&mut a, WhitespacePolicy::Trim);
        assert_eq!(a.value_text(), "a  b");
    }

    #[test]
    fn markup_values() {
        // A value which is only markup is left alone
        let only = vec![Token::StartTag(Tag::new("b", vec![], None))];
        let mut a = attr(only.clone());
        normalize(&mut a, WhitespacePolicy::Normalize);
        assert_eq!(a.value, only);

        let mut a = attr(vec![
            Token::text("  a", None),
            Token::text("  b ", None),
            Token::StartTag(Tag::new("b", vec![], None)),
            Token::text(" c  ", None),
        ]);
        normalize(&mut a, WhitespacePolicy::Normalize);
        assert_eq!(a.value.len(), 3);
        assert_eq!(a.value[0], Token::text("a b ", None));
        assert_eq!(a.value[2], Token::text(" c", None));
    }

    #[test]
    fn extension_policies() {
        let registry = Registry::with_builtins();
        let mut stage = Attributes::new(&registry);
        let tokens = crate::wikitext::Tokenizer::new(&crate::config::CONFIG)
            .tokenize("<ref follow=\" a  b \" name=\" c  d \">x</ref>", crate::wikitext::StartRule::Inline)
            .unwrap();
        let mut out = vec![];
        for token in tokens {
            stage.transform(token, &mut out).unwrap();
        }
        let Token::ExtensionPlaceholder(ext) = &out[0] else {
            panic!("not an extension: {:?}", out[0]);
        };
        assert_eq!(ext.attributes[0].value_text(), "a  b");
        assert_eq!(ext.attributes[1].value_text(), "c d");
    }
}
