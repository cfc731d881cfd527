//! Site configuration.
//!
//! Wikitext documents are not self-encapsulated and cannot be tokenized
//! without out-of-band configuration data. Most of this configuration data
//! can be acquired by querying the MediaWiki API for a given installation.

use crate::wikitext::{Configuration, ConfigurationSource, MagicLinks};
use std::sync::LazyLock;

/// The static source configuration for the default installation.
static CONFIG_SOURCE: ConfigurationSource = ConfigurationSource {
    behavior_switch_words: phf::phf_set! {
        "notoc", "nogallery", "forcetoc", "toc", "noeditsection", "newsectionlink",
        "nonewsectionlink", "hiddencat", "expectunusedcategory", "expectunusedtemplate",
        "index", "noindex", "staticredirect", "notitleconvert", "nocontentconvert",
        "noglobal", "disambiguation", "archivedtalk", "notalk", "expectedunconnectedpage"
    },
    category_namespaces: phf::phf_set! {
        "category"
    },
    extension_tags: phf::phf_set! {
        "nowiki", "ref", "references", "gallery", "indicator", "poem", "math",
        "syntaxhighlight", "source", "templatestyles", "templatedata", "section",
        "imagemap", "inputbox", "timeline", "hiero", "chem", "ce", "score",
        "categorytree", "charinsert", "graph", "mapframe", "maplink", "langconvert"
    },
    language_conversion_enabled: true,
    link_trail: "/^([a-z]+)(.*)$/sD",
    magic_links: MagicLinks {
        isbn: true,
        pmid: true,
        rfc: true,
    },
    protocols: phf::phf_set! {
        "bitcoin:", "ftp://", "ftps://", "geo:", "git://", "gopher://", "http://",
        "https://", "irc://", "ircs://", "magnet:", "mailto:", "matrix:", "mms://",
        "news:", "nntp://", "redis://", "sftp://", "sip:", "sips:", "sms:", "ssh://",
        "svn://", "tel:", "telnet://", "urn:", "worldwind://", "xmpp:", "//"
    },
    valid_title_bytes: " %!\"$&'()*,\\-.\\/0-9:;=?@A-Z\\\\^_`a-z~\\x80-\\xFF+",
    variants: &["sr-ec", "sr-el"],
};

/// The installation configuration, suitable for runtime use.
pub static CONFIG: LazyLock<Configuration> = LazyLock::new(|| {
    Configuration::new(&CONFIG_SOURCE).expect("built-in link trail pattern is valid")
});
