//! Tokenizer configuration data.

// This code is loosely based on `parse_wiki_text`. The upstream copyright is:
//
// SPDX-License-Identifier: MIT
// SPDX-FileCopyright: Copyright 2019 Fredrik Portström and other contributors

use fancy_regex::{Regex, RegexBuilder};
use phf::Set;

/// Enabled magic links.
///
/// There will only ever be these three kinds of magic links.
#[derive(Clone, Copy, Debug)]
pub struct MagicLinks {
    /// ISBN magic links.
    pub isbn: bool,
    /// PubMed magic links.
    pub pmid: bool,
    /// RFC magic links.
    pub rfc: bool,
}

/// Site specific configuration of a wiki.
#[derive(Debug)]
pub struct ConfigurationSource {
    /// Words that can appear between `__` and `__`, lowercased.
    pub behavior_switch_words: Set<&'static str>,

    /// Names and aliases of the category namespace, lowercased.
    pub category_namespaces: Set<&'static str>,

    /// Tag names of registered extension tags, lowercased.
    pub extension_tags: Set<&'static str>,

    /// Whether `-{ }-` language converter markup is recognised.
    pub language_conversion_enabled: bool,

    /// A regular expression that matches link trails, in the PHP PCRE pattern
    /// format.
    pub link_trail: &'static str,

    /// The kinds of extra magic links which are enabled.
    pub magic_links: MagicLinks,

    /// Protocols that can be used for external links, lowercased.
    pub protocols: Set<&'static str>,

    /// The list of allowable bytes in an article title, in a format suitable
    /// for interpolation into a PHP PCRE character set pattern.
    pub valid_title_bytes: &'static str,

    /// Language variant codes of the content language, in preference order.
    pub variants: &'static [&'static str],
}

/// Processed configuration data for the tokenizer.
#[derive(Debug)]
pub struct Configuration {
    /// A compiled regular expression that matches link trails.
    pub(crate) link_trail_pattern: Regex,
    /// Configuration source.
    source: &'static ConfigurationSource,
    /// A lookup table for valid title bytes.
    pub valid_title_bytes: BitMap,
}

impl core::ops::Deref for Configuration {
    type Target = ConfigurationSource;

    fn deref(&self) -> &Self::Target {
        self.source
    }
}

impl Configuration {
    /// Allocates and returns a new configuration based on the given site
    /// specific configuration.
    pub fn new(source: &'static ConfigurationSource) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            link_trail_pattern: link_trail_regex(source.link_trail)?,
            source,
            valid_title_bytes: char_class_to_bitmap(source.valid_title_bytes.bytes()),
        })
    }

    /// Returns true if `name` is a category namespace name or alias.
    pub fn is_category_namespace(&self, name: &str) -> bool {
        let name = name.trim().replace('_', " ").to_lowercase();
        self.category_namespaces.contains(name.as_str())
    }

    /// Returns true if every byte of `title` is legal in a page title.
    pub fn is_valid_title(&self, title: &str) -> bool {
        !title.trim().is_empty() && title.bytes().all(|b| self.valid_title_bytes.contains(b))
    }
}

/// A simple bitmap.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitMap([u8; 32]);

impl BitMap {
    /// Returns true if the bitmap contains the given byte.
    pub fn contains(&self, byte: u8) -> bool {
        self.0[usize::from(byte / 8)] & (1 << (byte & 7)) != 0
    }
}

/// Converts a PCRE character class to a bitmap.
///
/// Only the escapes which appear in real title character classes are
/// understood; anything else is taken literally.
fn char_class_to_bitmap(bytes: impl Iterator<Item = u8>) -> BitMap {
    #[inline]
    fn nibble(b: u8) -> u8 {
        (b & 0xf) + 9 * (b >> 6)
    }

    fn value(iter: &mut core::iter::Peekable<impl Iterator<Item = u8>>) -> Option<u8> {
        match iter.next()? {
            b'\\' => Some(match iter.next() {
                None => b'\\',
                Some(b'x') => {
                    if let Some(hi) = iter.next_if(u8::is_ascii_hexdigit)
                        && let Some(lo) = iter.next_if(u8::is_ascii_hexdigit)
                    {
                        nibble(hi) << 4 | nibble(lo)
                    } else {
                        b'x'
                    }
                }
                Some(b'n') => b'\n',
                Some(b'r') => b'\r',
                Some(b't') => b'\t',
                Some(b) => b,
            }),
            b => Some(b),
        }
    }

    let mut bits = [0; 32];
    let mut set = |b| bits[usize::from(b / 8)] |= 1_u8 << (b & 7);
    let mut iter = bytes.peekable();

    while let Some(b) = value(&mut iter) {
        set(b);
        if iter.next_if(|b| *b == b'-').is_some() {
            if let Some(next) = value(&mut iter) {
                for b in b..=next {
                    set(b);
                }
            } else {
                set(b'-');
            }
        }
    }

    BitMap(bits)
}

/// Creates a link trail regular expression from the given PHP-style pattern.
// `fancy_regex` is required because some wikis (ca.wiktionary.org) use a
// lookahead in their link trail.
fn link_trail_regex(link_trail: &str) -> Result<Regex, fancy_regex::Error> {
    let (pattern, flags) = link_trail
        .chars()
        .next()
        .and_then(|term| link_trail[term.len_utf8()..].rsplit_once(term))
        .unwrap_or((link_trail, ""));

    // The end-anchored capture is unused, so drop it
    let pattern = pattern.strip_suffix("(.*)$").unwrap_or(pattern);

    RegexBuilder::new(pattern)
        .dot_matches_new_line(flags.contains('s'))
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build()
}

/// HTML5 tags allowed in wikitext.
pub static HTML5_TAGS: Set<&str> = phf::phf_set! {
    // Explicit `<a>` tags are forbidden in wikitext.
    "abbr",
    "b", "bdi", "bdo", "big", "blockquote", "br",
    "caption", "center", "cite", "code",
    "data", "dd", "del", "dfn", "div", "dl", "dt",
    "em",
    "font",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "p", "pre",
    "q",
    "rb", "rp", "rt", "rtc", "ruby",
    "s", "samp", "small", "span", "strike", "strong", "sub", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt",
    "u", "ul",
    "var",
    "wbr",
};

/// Elements which never have content or an end tag.
pub static VOID_TAGS: Set<&str> = phf::phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
};

/// Elements which interrupt paragraphs.
pub static BLOCK_TAGS: Set<&str> = phf::phf_set! {
    "address", "article", "aside", "blockquote", "caption", "center", "dd",
    "details", "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hgroup", "hr", "li", "listing", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
    "ul",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_bytes() {
        let map = char_class_to_bitmap(" %!\\-0-9:A-Z\\\\a-z~\\x80-\\xFF+".bytes());
        for b in b"a9Z ~-:+\\\x80\xff" {
            assert!(map.contains(*b), "{}", *b as char);
        }
        for b in b"[]{}|#<>" {
            assert!(!map.contains(*b), "{}", *b as char);
        }
    }

    #[test]
    fn link_trail() {
        let re = link_trail_regex("/^([a-z]+)(.*)$/sD").unwrap();
        let m = re.find("abc def").unwrap().unwrap();
        assert_eq!(m.as_str(), "abc");
        assert!(re.find("-abc").unwrap().is_none());
    }
}
