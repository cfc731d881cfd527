//! Language variant markup.
//!
//! ```wikitext
//! -{sr-ec:Београд;sr-el:Beograd}-
//! ```
//!
//! The tokenizer only records the source of each construct. This pass
//! parses it into `data-mw-variant` and shows the text for one variant:
//! the requested variant if there is one, or else the variant the page is
//! guessed to be written in.

use crate::{
    dom::{Document, NodeId},
    env::{GuesserKind, Session},
};
use serde_json::{Map, Value, json};

/// Guesses which variant a page was written in.
pub trait VariantGuesser {
    /// Returns the guessed variant out of `variants`, if there is enough
    /// evidence for one.
    fn guess(&self, doc: &Document, variants: &[&str]) -> Option<String>;
}

/// Guesses the variant which is used most often in the page’s own variant
/// markup.
#[derive(Debug, Default)]
pub struct MarkupGuesser;

impl VariantGuesser for MarkupGuesser {
    fn guess(&self, doc: &Document, variants: &[&str]) -> Option<String> {
        let mut counts = vec![0_usize; variants.len()];
        for node in variant_nodes(doc) {
            let Some(Ok(value)) = doc.attr(node, "data-mw-variant").map(serde_json::from_str::<Value>) else {
                continue;
            };
            let entries = value
                .get("twoway")
                .or_else(|| value.get("oneway"))
                .and_then(Value::as_array);
            for entry in entries.into_iter().flatten() {
                let code = entry.get("l").and_then(Value::as_str);
                if let Some(index) = variants.iter().position(|variant| Some(*variant) == code) {
                    counts[index] += 1;
                }
            }
        }
        pick(variants, &counts)
    }
}

/// Guesses the variant whose script is used by the most characters of the
/// page text.
#[derive(Debug, Default)]
pub struct ScriptGuesser;

/// A writing system.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Script {
    Cyrillic,
    Han,
    Latin,
}

impl Script {
    /// The script of a variant code, from its suffix.
    fn of_variant(code: &str) -> Option<Self> {
        let suffix = code.rsplit_once('-').map_or(code, |(_, suffix)| suffix);
        match suffix.to_ascii_lowercase().as_str() {
            "ec" | "cyrl" => Some(Self::Cyrillic),
            "el" | "latn" => Some(Self::Latin),
            "hans" | "hant" | "cn" | "tw" | "hk" | "sg" | "mo" | "my" => Some(Self::Han),
            _ => None,
        }
    }

    /// The script of a character.
    fn of_char(c: char) -> Option<Self> {
        match c {
            '\u{0400}'..='\u{052f}' => Some(Self::Cyrillic),
            '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' => Some(Self::Han),
            'a'..='z' | 'A'..='Z' | '\u{00c0}'..='\u{024f}' => Some(Self::Latin),
            _ => None,
        }
    }
}

impl VariantGuesser for ScriptGuesser {
    fn guess(&self, doc: &Document, variants: &[&str]) -> Option<String> {
        let scripts = variants.iter().map(|code| Script::of_variant(code)).collect::<Vec<_>>();
        let mut counts = vec![0_usize; variants.len()];
        for c in doc.text_content(doc.body()).chars() {
            let Some(script) = Script::of_char(c) else {
                continue;
            };
            if let Some(index) = scripts.iter().position(|s| *s == Some(script)) {
                counts[index] += 1;
            }
        }
        pick(variants, &counts)
    }
}

/// The variant with the highest non-zero count. Ties go to the earlier
/// variant.
fn pick(variants: &[&str], counts: &[usize]) -> Option<String> {
    let (index, count) = counts
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, count)| **count)?;
    (*count > 0).then(|| variants[index].to_string())
}

fn variant_nodes(doc: &Document) -> Vec<NodeId> {
    doc.descendants(doc.body())
        .into_iter()
        .filter(|node| doc.has_type_of(*node, "mw:LanguageVariant"))
        .collect()
}

/// A parsed variant construct.
#[derive(Debug, PartialEq)]
struct Rule {
    /// Flags, in source order.
    flags: Vec<String>,
    /// The `data-mw-variant` value.
    value: Value,
    /// Whether the construct renders anything.
    hidden: bool,
}

pub(super) fn run(session: &Session<'_>, doc: &mut Document, _: bool) {
    let nodes = variant_nodes(doc);
    if nodes.is_empty() {
        return;
    }

    let variants = session.env.config.variants;
    let mut rules = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let src = doc.data(*node).and_then(|data| data.src.clone()).unwrap_or_default();
        let rule = parse(&src, variants);
        let value = rule.value.to_string();
        doc.set_attr(*node, "data-mw-variant", value.clone());
        let data = doc.data_mut(*node);
        data.fl = rule.flags.clone();
        data.a.insert("data-mw-variant".to_string(), value);
        rules.push(rule);
    }

    let shown = session.env.options.target_variant.clone().or_else(|| {
        let guesser: &dyn VariantGuesser = match session.env.options.variant_guesser {
            GuesserKind::Markup => &MarkupGuesser,
            GuesserKind::Script => &ScriptGuesser,
        };
        guesser.guess(doc, variants)
    });
    log::debug!("showing language variant {shown:?}");

    for (node, rule) in nodes.into_iter().zip(rules) {
        for child in doc.children(node).to_vec() {
            doc.detach(child);
        }
        if rule.hidden {
            if let Some(element) = doc.element_mut(node) {
                element.name = "meta".to_string();
            }
        } else if let Some(text) = shown_text(&rule.value, shown.as_deref()) {
            let text = doc.create_text(text);
            doc.append_child(node, text);
        }
        doc.clear_dsr(node);
    }
}

/// Splits `text` at every `sep` which is not inside nested variant markup.
fn split_top(text: &str, sep: char) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0_usize;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        match c {
            '-' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                depth += 1;
                chars.next();
            }
            '}' if depth > 0 && chars.peek().is_some_and(|(_, next)| *next == '-') => {
                depth -= 1;
                chars.next();
            }
            c if c == sep && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parses the source of one variant construct.
fn parse(src: &str, variants: &[&str]) -> Rule {
    let body = src
        .strip_prefix("-{")
        .and_then(|body| body.strip_suffix("}-"))
        .unwrap_or(src);

    let parts = split_top(body, '|');
    let (flags, text) = match parts.as_slice() {
        [flags, ..] if parts.len() > 1 && looks_like_flags(flags) => {
            let flags = flags
                .split(';')
                .map(str::trim)
                .filter(|flag| !flag.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            (flags, &body[parts[0].len() + 1..])
        }
        _ => (vec![], body),
    };

    let mut value = Map::new();
    let mut hidden = false;
    for flag in &flags {
        let key = match flag.as_str() {
            "A" => "add",
            "H" => {
                hidden = true;
                "add"
            }
            "-" => {
                hidden = true;
                "remove"
            }
            "T" => {
                hidden = true;
                "title"
            }
            "D" => "describe",
            "R" | "N" => continue,
            _ => "error",
        };
        value.insert(key.into(), Value::Bool(true));
    }

    let escape = |text: &str| html_escape::encode_text(text).into_owned();
    let mut pieces = split_top(text, ';');
    if pieces.len() > 1 && pieces.last().is_some_and(|last| last.trim().is_empty()) {
        pieces.pop();
    }
    let twoway = pieces
        .iter()
        .map(|piece| {
            let (code, text) = piece.split_once(':')?;
            let code = code.trim();
            (variants.contains(&code) && !code.contains("=>"))
                .then(|| json!({ "l": code, "t": escape(text) }))
        })
        .collect::<Option<Vec<_>>>();
    let oneway = pieces
        .iter()
        .map(|piece| {
            let (from, rest) = piece.split_once("=>")?;
            let (code, text) = rest.split_once(':')?;
            let code = code.trim();
            variants
                .contains(&code)
                .then(|| json!({ "f": escape(from.trim()), "l": code, "t": escape(text) }))
        })
        .collect::<Option<Vec<_>>>();

    let plain = flags.iter().any(|flag| flag == "R");
    let name = flags.iter().any(|flag| flag == "N");
    match (twoway, oneway) {
        _ if name => {
            value.insert("name".into(), json!({ "t": escape(text) }));
        }
        (Some(twoway), _) if !plain => {
            value.insert("twoway".into(), Value::Array(twoway));
        }
        (_, Some(oneway)) if !plain => {
            value.insert("oneway".into(), Value::Array(oneway));
        }
        _ => {
            value.insert("disabled".into(), json!({ "t": escape(text) }));
        }
    }

    Rule {
        flags,
        value: Value::Object(value),
        hidden,
    }
}

/// Returns true if `text` is a list of variant flags.
fn looks_like_flags(text: &str) -> bool {
    !text.trim().is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || matches!(c, ';' | '-' | '+' | '$' | ' '))
}

/// The text shown for `variant`.
fn shown_text(value: &Value, variant: Option<&str>) -> Option<String> {
    let html = if let Some(t) = value.pointer("/disabled/t").or_else(|| value.pointer("/name/t")) {
        t.as_str()
    } else if let Some(Value::Array(entries)) = value.get("twoway") {
        entries
            .iter()
            .find(|entry| variant.is_some() && entry.get("l").and_then(Value::as_str) == variant)
            .or_else(|| entries.first())
            .and_then(|entry| entry.get("t"))
            .and_then(Value::as_str)
    } else if let Some(Value::Array(entries)) = value.get("oneway") {
        entries
            .iter()
            .find(|entry| variant.is_some() && entry.get("l").and_then(Value::as_str) == variant)
            .and_then(|entry| entry.get("t"))
            .or_else(|| entries.first().and_then(|entry| entry.get("f")))
            .and_then(Value::as_str)
    } else {
        None
    }?;
    Some(html_escape::decode_html_entities(html).into_owned())
}
