//! Bold and italic quote pairing.
//!
//! Apostrophe runs can only be paired once a whole line has been seen, since
//! whether `'''` is bold or an apostrophe followed by italic depends on how
//! many other runs there are on the same line.

use super::{Degraded, Stage};
use crate::wikitext::{Span, Tag, Token};

/// The open formatting at a point in a line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum State {
    /// Nothing is open.
    #[default]
    None,
    /// Italic is open.
    I,
    /// Bold is open.
    B,
    /// Bold is open inside italic.
    Ib,
    /// Italic is open inside bold.
    Bi,
    /// A five-quote run opened both, and the order is not known yet.
    Both,
}

/// Pairs `mw-quote` markers into `<i>` and `<b>` tags, one line at a time.
#[derive(Debug, Default)]
pub(super) struct Quotes {
    /// Tokens of the current line.
    line: Vec<Token>,
    /// Whether the current line has any quote markers.
    has_quotes: bool,
}

impl Stage for Quotes {
    fn name(&self) -> &'static str {
        "quotes"
    }

    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        if is_line_end(&token) {
            self.flush(out);
            out.push(token);
            return Ok(());
        }

        if let Token::SelfClosingTag(tag) = &token
            && tag.name == "mw-quote"
        {
            let valid = matches!(tag.attr("value").as_deref(), Some("2" | "3" | "5"));
            if !valid || tag.data.tsr.is_some_and(|tsr| !matches!(tsr.len(), 2 | 3 | 5)) {
                return Err(Degraded {
                    reason: format!("malformed quote marker {:?}", tag.attr("value")),
                    token,
                });
            }
            self.has_quotes = true;
        }
        self.line.push(token);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) {
        self.flush(out);
    }
}

impl Quotes {
    /// Pairs the quotes of the current line and writes the line to `out`.
    fn flush(&mut self, out: &mut Vec<Token>) {
        let mut line = core::mem::take(&mut self.line);
        if !core::mem::take(&mut self.has_quotes) {
            out.append(&mut line);
            return;
        }

        balance(&mut line);

        let mut state = State::None;
        // The position of the two start tags emitted for a five-quote run
        let mut both_at = None;
        let mut last_end = None;
        for token in line {
            if let Some(tsr) = token.tsr() {
                last_end = Some(tsr.end);
            }
            let Some((len, tsr)) = quote_len(&token) else {
                out.push(token);
                continue;
            };
            let start = tsr.map(|tsr| tsr.start);
            let at = |offset: usize, width: usize| start.map(|start| Span::new(start + offset, start + offset + width));
            let zero = |offset: usize| start.map(|start| Span::at(start + offset));

            state = match (len, state) {
                (2, State::I) => {
                    out.push(end("i", at(0, 2), false));
                    State::None
                }
                (2, State::Bi) => {
                    out.push(end("i", at(0, 2), false));
                    State::B
                }
                (2, State::Ib) => {
                    out.push(end("b", zero(0), true));
                    out.push(end("i", at(0, 2), false));
                    out.push(start_tag("b", zero(2), true));
                    State::B
                }
                (2, State::Both) => {
                    swap_both(out, both_at.take());
                    out.push(end("i", at(0, 2), false));
                    State::B
                }
                (2, State::None | State::B) => {
                    out.push(start_tag("i", at(0, 2), false));
                    if state == State::B { State::Bi } else { State::I }
                }
                (3, State::B) => {
                    out.push(end("b", at(0, 3), false));
                    State::None
                }
                (3, State::Bi) => {
                    out.push(end("i", zero(0), true));
                    out.push(end("b", at(0, 3), false));
                    out.push(start_tag("i", zero(3), true));
                    State::I
                }
                (3, State::Ib) => {
                    out.push(end("b", at(0, 3), false));
                    State::I
                }
                (3, State::Both) => {
                    both_at = None;
                    out.push(end("b", at(0, 3), false));
                    State::I
                }
                (3, State::None | State::I) => {
                    out.push(start_tag("b", at(0, 3), false));
                    if state == State::I { State::Ib } else { State::B }
                }
                (_, State::B) => {
                    out.push(end("b", at(0, 3), false));
                    out.push(start_tag("i", at(3, 2), false));
                    State::I
                }
                (_, State::I) => {
                    out.push(end("i", at(0, 2), false));
                    out.push(start_tag("b", at(2, 3), false));
                    State::B
                }
                (_, State::Bi) => {
                    out.push(end("i", at(0, 2), false));
                    out.push(end("b", at(2, 3), false));
                    State::None
                }
                (_, State::Ib) => {
                    out.push(end("b", at(0, 3), false));
                    out.push(end("i", at(3, 2), false));
                    State::None
                }
                (_, State::Both) => {
                    both_at = None;
                    out.push(end("b", at(0, 3), false));
                    out.push(end("i", at(3, 2), false));
                    State::None
                }
                (_, State::None) => {
                    both_at = Some(out.len());
                    out.push(start_tag("i", at(0, 2), false));
                    out.push(start_tag("b", at(2, 3), false));
                    State::Both
                }
            };
        }

        // Anything still open is closed at the end of the line
        let eol = last_end.map(Span::at);
        match state {
            State::None => {}
            State::I => out.push(end("i", eol, true)),
            State::B => out.push(end("b", eol, true)),
            State::Ib => {
                out.push(end("b", eol, true));
                out.push(end("i", eol, true));
            }
            State::Bi => {
                out.push(end("i", eol, true));
                out.push(end("b", eol, true));
            }
            State::Both => {
                swap_both(out, both_at);
                out.push(end("i", eol, true));
                out.push(end("b", eol, true));
            }
        }
    }
}

/// Returns true for tokens which end the scope of quotes.
fn is_line_end(token: &Token) -> bool {
    match token {
        Token::NewLine(_) | Token::Eof(_) => true,
        Token::StartTag(tag) => matches!(tag.name.as_str(), "td" | "th" | "tr" | "caption"),
        Token::EndTag(tag) => {
            matches!(tag.name.as_str(), "table" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
        }
        _ => false,
    }
}

/// The length and source range of a quote marker.
fn quote_len(token: &Token) -> Option<(usize, Option<Span>)> {
    match token {
        Token::SelfClosingTag(tag) if tag.name == "mw-quote" => {
            let len = tag.attr("value")?.parse().ok()?;
            Some((len, tag.data.tsr))
        }
        _ => None,
    }
}

/// When a line has an odd number of both bold and italic runs, converts one
/// bold run into an apostrophe followed by italic.
///
/// A bold run after a single-letter word is preferred, then one after a
/// longer word, then one after a space.
fn balance(line: &mut Vec<Token>) {
    let (mut italics, mut bolds) = (0, 0);
    for token in line.iter() {
        match quote_len(token) {
            Some((2, _)) => italics += 1,
            Some((3, _)) => bolds += 1,
            Some((5, _)) => {
                italics += 1;
                bolds += 1;
            }
            _ => {}
        }
    }
    if italics % 2 == 0 || bolds % 2 == 0 {
        return;
    }

    let (mut single_letter, mut multi_letter, mut space) = (None, None, None);
    for (index, token) in line.iter().enumerate() {
        if !matches!(quote_len(token), Some((3, _))) {
            continue;
        }
        let before = match index.checked_sub(1).map(|i| &line[i]) {
            Some(Token::Text(text)) => text.value.as_str(),
            _ => "",
        };
        let mut chars = before.chars().rev();
        let x1 = chars.next().unwrap_or(' ');
        let x2 = chars.next().unwrap_or(' ');
        if x1 == ' ' {
            space.get_or_insert(index);
        } else if x2 == ' ' {
            single_letter.get_or_insert(index);
            break;
        } else {
            multi_letter.get_or_insert(index);
        }
    }

    let Some(index) = single_letter.or(multi_letter).or(space) else {
        return;
    };
    let tsr = line[index].tsr();
    let apostrophe = Token::text("'", tsr.map(|tsr| Span::new(tsr.start, tsr.start + 1)));
    let italic = Tag::new("mw-quote", vec![], tsr.map(|tsr| Span::new(tsr.start + 1, tsr.end)))
        .with_attr("value", "2");
    line[index] = Token::SelfClosingTag(italic);
    line.insert(index, apostrophe);
}

/// Reorders the two start tags of an unresolved five-quote run so that bold
/// is outside italic.
fn swap_both(out: &mut [Token], at: Option<usize>) {
    let Some(at) = at else {
        return;
    };
    let (Some(Token::StartTag(i)), Some(Token::StartTag(b))) = (out.get(at), out.get(at + 1)) else {
        return;
    };
    let start = i.data.tsr.map(|tsr| tsr.start);
    let mut b = b.clone();
    let mut i = i.clone();
    b.data.tsr = start.map(|start| Span::new(start, start + 3));
    i.data.tsr = start.map(|start| Span::new(start + 3, start + 5));
    out[at] = Token::StartTag(b);
    out[at + 1] = Token::StartTag(i);
}

/// A start tag. Synthetic tags have no source of their own.
fn start_tag(name: &str, tsr: Option<Span>, synthetic: bool) -> Token {
    let mut tag = Tag::new(name, vec![], tsr);
    tag.data.auto_inserted_start = synthetic;
    Token::StartTag(tag)
}

/// An end tag. Synthetic tags have no source of their own.
fn end(name: &str, tsr: Option<Span>, synthetic: bool) -> Token {
    let mut tag = Tag::new(name, vec![], tsr);
    tag.data.auto_inserted_end = synthetic;
    Token::EndTag(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CONFIG, wikitext::{StartRule, Tokenizer}};

    fn quotes(source: &str) -> String {
        let tokens = Tokenizer::new(&CONFIG).tokenize(source, StartRule::Document).unwrap();
        let mut stage = Quotes::default();
        let mut out = vec![];
        for token in tokens {
            stage.transform(token, &mut out).unwrap();
        }
        stage.finish(&mut out);
        out.iter()
            .map(|token| match token {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(text) => text.value.clone(),
                Token::NewLine(_) => "\n".into(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn simple() {
        assert_eq!(quotes("''a'' '''b'''"), "<i>a</i> <b>b</b>");
        assert_eq!(quotes("''a\nb''"), "<i>a</i>\nb<i></i>");
        assert_eq!(quotes("'''''a''' b''"), "<i><b>a</b> b</i>");
        assert_eq!(quotes("'''''a'' b'''"), "<b><i>a</i> b</b>");
        assert_eq!(quotes("''a'''b''c'''"), "<i>a<b>b</b></i><b>c</b>");
    }

    #[test]
    fn odd_counts() {
        // One italic and one bold: the bold after the single-letter word
        // becomes an apostrophe and italic
        assert_eq!(quotes("''a l'''b"), "<i>a l'</i>b");
        assert_eq!(quotes("''''a''''"), "'<b>a'</b>");
    }

    #[test]
    fn source_ranges() {
        let tokens = Tokenizer::new(&CONFIG).tokenize("''a''", StartRule::Document).unwrap();
        let mut stage = Quotes::default();
        let mut out = vec![];
        for token in tokens {
            stage.transform(token, &mut out).unwrap();
        }
        assert_eq!(out[0].tsr(), Some(Span::new(0, 2)));
        assert_eq!(out[2].tsr(), Some(Span::new(3, 5)));
    }
}
