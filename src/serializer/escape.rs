//! Escaping of freshly written text.
//!
//! Text which came from the DOM rather than from the original source may
//! look like markup once it is written out. Anything the tokenizer would
//! read as more than plain text is wrapped in `<nowiki>`. Line-anchored
//! syntax (list bullets, headings, rules, table lines) is checked by hand,
//! since it depends on where the text lands in the output.

use crate::{
    ext::escape_nowiki,
    wikitext::{StartRule, Token, Tokenizer},
};
use regex::Regex;
use std::sync::LazyLock;

/// Where a text run is written.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct TextContext {
    /// The run directly follows list bullets.
    pub list_item_start: bool,
    /// The run directly follows a table cell marker.
    pub cell_start: bool,
    /// The run is inside a heading.
    pub heading: bool,
    /// The run is inside a table.
    pub table: bool,
    /// The run is inside a table cell, where `||` starts a new cell.
    pub table_cell: bool,
    /// The run is inside a header cell, where `!!` also starts a new cell.
    pub header_cell: bool,
    /// The run is inside a definition term, where `:` starts the
    /// definition.
    pub definition_term: bool,
    /// The run is inside an indented preformatted block.
    pub pre: bool,
    /// The run is the label of a wikilink.
    pub link_text: bool,
    /// The run is the label of an external link.
    pub ext_link_text: bool,
}

/// Characters and words which may start markup somewhere in a line.
static PROBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[\]{}<>'&_~:|!=-]|(?i:[a-z]+:|ISBN|RFC|PMID)").unwrap()
});

/// Wraps `text` in `<nowiki>`.
pub(super) fn nowiki(text: &str) -> String {
    if text.is_empty() {
        return "<nowiki/>".into();
    }
    format!("<nowiki>{}</nowiki>", escape_nowiki(text))
}

/// Escapes a text run. `sol` is true if the run starts at the start of a
/// line.
pub(super) fn escape_text(tokenizer: &Tokenizer<'_>, text: &str, sol: bool, cx: TextContext) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.split('\n').enumerate() {
        let mut cx = cx;
        if index > 0 {
            out.push('\n');
            cx.list_item_start = false;
            cx.cell_start = false;
        }
        let at_sol = (sol || index > 0) && !cx.pre;
        out += &escape_line(tokenizer, line, at_sol, cx);
    }
    out
}

fn escape_line(tokenizer: &Tokenizer<'_>, line: &str, sol: bool, cx: TextContext) -> String {
    if line.is_empty() {
        return String::new();
    }
    let rest = |line: &str| {
        let cx = TextContext {
            list_item_start: false,
            cell_start: false,
            ..cx
        };
        escape_line(tokenizer, line, false, cx)
    };

    if sol || cx.list_item_start {
        let bullets = line.len() - line.trim_start_matches(['*', '#', ':', ';']).len();
        if bullets > 0 {
            return nowiki(&line[..bullets]) + &rest(&line[bullets..]);
        }
    }

    if sol {
        let dashes = line.len() - line.trim_start_matches('-').len();
        let trimmed = line.trim_end();
        if dashes >= 4
            || (line.starts_with('=') && trimmed.len() > 1 && trimmed.ends_with('='))
            || line.starts_with("{|")
            || (cx.table && line.trim_start().starts_with(['|', '!']))
        {
            return nowiki(line);
        }
        if line.starts_with(' ') && !line.trim_start_matches(' ').is_empty() {
            return nowiki(" ") + &rest(&line[1..]);
        }
    }

    if cx.cell_start {
        if line.starts_with(['-', '+', '}', '|', '!']) {
            return nowiki(&line[..1]) + &rest(&line[1..]);
        }
        if line.contains('|') {
            return nowiki(line);
        }
    }
    if cx.table_cell && (line.contains("||") || (cx.header_cell && line.contains("!!"))) {
        return nowiki(line);
    }
    if cx.definition_term && line.contains(':') {
        return nowiki(line);
    }

    if cx.heading && (line.starts_with('=') || line.ends_with('=')) {
        return nowiki(line);
    }
    if (cx.link_text && (line.contains("]]") || line.contains('|')))
        || (cx.ext_link_text && line.contains(']'))
    {
        return nowiki(line);
    }
    if !PROBE.is_match(line) {
        return line.to_string();
    }

    let rule = if cx.table_cell { StartRule::TableCell } else { StartRule::Inline };
    let plain = tokenizer.tokenize(line, rule).is_ok_and(|tokens| {
        tokens
            .iter()
            .all(|token| matches!(token, Token::Text(_) | Token::NewLine(_) | Token::Eof(_)))
    });
    if plain { line.to_string() } else { nowiki(line) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG;

    fn escape(text: &str, sol: bool, cx: TextContext) -> String {
        escape_text(&Tokenizer::new(&CONFIG), text, sol, cx)
    }

    #[test]
    fn plain_text() {
        assert_eq!(escape("foo bar", true, TextContext::default()), "foo bar");
        assert_eq!(escape("a - b: c!", false, TextContext::default()), "a - b: c!");
        assert_eq!(escape("1 < 2 & 3", false, TextContext::default()), "1 < 2 & 3");
    }

    #[test]
    fn inline_markup() {
        assert_eq!(escape("''a''", false, TextContext::default()), "<nowiki>''a''</nowiki>");
        assert_eq!(escape("[[a]]", false, TextContext::default()), "<nowiki>[[a]]</nowiki>");
        assert_eq!(escape("{{a}}", false, TextContext::default()), "<nowiki>{{a}}</nowiki>");
        assert_eq!(escape("<b>", false, TextContext::default()), "<nowiki>&lt;b&gt;</nowiki>");
        assert_eq!(escape("&amp;", false, TextContext::default()), "<nowiki>&amp;amp;</nowiki>");
    }

    #[test]
    fn line_start() {
        assert_eq!(escape("*foo", true, TextContext::default()), "<nowiki>*</nowiki>foo");
        assert_eq!(escape("*foo", false, TextContext::default()), "*foo");
        let item = TextContext {
            list_item_start: true,
            ..Default::default()
        };
        assert_eq!(escape("#foo", false, item), "<nowiki>#</nowiki>foo");
        assert_eq!(escape("----", true, TextContext::default()), "<nowiki>----</nowiki>");
        assert_eq!(escape("=a=", true, TextContext::default()), "<nowiki>=a=</nowiki>");
        assert_eq!(escape("a\n*b", false, TextContext::default()), "a\n<nowiki>*</nowiki>b");
    }

    #[test]
    fn contexts() {
        let heading = TextContext {
            heading: true,
            ..Default::default()
        };
        assert_eq!(escape("a=", false, heading), "<nowiki>a=</nowiki>");
        let link = TextContext {
            link_text: true,
            ..Default::default()
        };
        assert_eq!(escape("a|b", false, link), "<nowiki>a|b</nowiki>");
        let cell = TextContext {
            table: true,
            table_cell: true,
            ..Default::default()
        };
        assert_eq!(escape("a||b", false, cell), "<nowiki>a||b</nowiki>");
        assert_eq!(escape("|a", true, cell), "<nowiki>|a</nowiki>");
        assert_eq!(escape("a!!b", false, cell), "a!!b");
        let header = TextContext {
            header_cell: true,
            ..cell
        };
        assert_eq!(escape("a!!b", false, header), "<nowiki>a!!b</nowiki>");
        let term = TextContext {
            definition_term: true,
            ..Default::default()
        };
        assert_eq!(escape("a:b", false, term), "<nowiki>a:b</nowiki>");
    }

    #[test]
    fn cell_start() {
        let start = TextContext {
            table: true,
            table_cell: true,
            cell_start: true,
            ..Default::default()
        };
        assert_eq!(escape("-x", false, start), "<nowiki>-</nowiki>x");
        assert_eq!(escape("}x", false, start), "<nowiki>}</nowiki>x");
        assert_eq!(escape("+x", false, start), "<nowiki>+</nowiki>x");
        assert_eq!(escape("a|b", false, start), "<nowiki>a|b</nowiki>");
        assert_eq!(escape("x\n-y", false, start), "x\n-y");
    }

    #[test]
    fn leading_space() {
        assert_eq!(escape(" a", true, TextContext::default()), "<nowiki> </nowiki>a");
        assert_eq!(escape("a\n b", false, TextContext::default()), "a\n<nowiki> </nowiki>b");
        assert_eq!(escape(" a", false, TextContext::default()), " a");
        assert_eq!(escape("  ", true, TextContext::default()), "  ");
        let pre = TextContext {
            pre: true,
            ..Default::default()
        };
        assert_eq!(escape(" a\n*b", true, pre), " a\n*b");
    }
}
