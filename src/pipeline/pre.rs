//! Indented preformatted text.
//!
//! A line which starts with a space and has something other than whitespace
//! on it is preformatted. Consecutive preformatted lines share one `<pre>`,
//! whose start tag is the leading space of its first line. The leading
//! spaces of the other lines are dropped from the content.
//!
//! A block tag anywhere on a line cancels it, and the line is written as it
//! was. Lines inside a literal `<pre>` tag are left alone.

use super::{Degraded, Stage};
use crate::wikitext::{BLOCK_TAGS, Span, Tag, Token};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum State {
    /// At the start of a line.
    #[default]
    Sol,
    /// After the leading space of a line, before any content.
    Space,
    /// Collecting a line with content.
    Line,
    /// After a preformatted line and its line break.
    Multiline,
    /// Nothing to do until the next line.
    Ignore,
}

/// Turns indented lines into `<pre>` blocks.
#[derive(Debug, Default)]
pub(super) struct IndentPre {
    state: State,
    /// The number of open literal `<pre>` tags.
    literal: usize,
    /// The content of the completed lines of the current block, with the
    /// line breaks between them.
    block: Vec<Token>,
    /// The start of the current block.
    start: Option<usize>,
    /// The end of the content of the current block.
    end: Option<usize>,
    /// The start of the current line.
    line_start: Option<usize>,
    /// The current line as it was written.
    raw: Vec<Token>,
    /// The current line without its leading space.
    content: Vec<Token>,
    /// The line break after the last line of the current block.
    newline: Option<Token>,
}

impl Stage for IndentPre {
    fn name(&self) -> &'static str {
        "indent-pre"
    }

    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        if self.literal > 0 {
            if is_literal_pre(&token, false) {
                self.literal -= 1;
            } else if is_literal_pre(&token, true) {
                self.literal += 1;
            }
            out.push(token);
            return Ok(());
        }
        if is_literal_pre(&token, true) {
            self.literal += 1;
        }

        match self.state {
            State::Sol => self.at_sol(token, out),
            State::Space => match token {
                Token::NewLine(_) | Token::Eof(_) => {
                    self.cancel_line(out);
                    self.state = if matches!(token, Token::NewLine(_)) { State::Sol } else { State::Ignore };
                    out.push(token);
                }
                token if is_block(&token) => {
                    self.cancel_line(out);
                    self.state = State::Ignore;
                    out.push(token);
                }
                token if is_transparent(&token) => {
                    self.raw.push(token.clone());
                    self.content.push(token);
                }
                token => {
                    self.raw.push(token.clone());
                    self.content.push(token);
                    self.state = State::Line;
                }
            },
            State::Line => match token {
                Token::NewLine(_) => {
                    self.end_line();
                    self.newline = Some(token);
                    self.state = State::Multiline;
                }
                Token::Eof(_) => {
                    self.end_line();
                    self.close_block(out);
                    self.state = State::Ignore;
                    out.push(token);
                }
                token if is_block(&token) => {
                    self.cancel_line(out);
                    self.state = State::Ignore;
                    out.push(token);
                }
                token => {
                    self.raw.push(token.clone());
                    self.content.push(token);
                }
            },
            State::Multiline => {
                if starts_with_space(&token) {
                    self.start_line(token, out);
                } else {
                    self.close_block(out);
                    self.at_sol(token, out);
                }
            }
            State::Ignore => {
                if matches!(token, Token::NewLine(_)) {
                    self.state = State::Sol;
                }
                out.push(token);
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) {
        match self.state {
            State::Space => self.cancel_line(out),
            State::Line => {
                self.end_line();
                self.close_block(out);
            }
            _ => self.close_block(out),
        }
        self.state = State::Sol;
    }
}

impl IndentPre {
    fn at_sol(&mut self, token: Token, out: &mut Vec<Token>) {
        if starts_with_space(&token) {
            self.start_line(token, out);
            return;
        }
        self.state = match token {
            Token::NewLine(_) => State::Sol,
            _ => State::Ignore,
        };
        out.push(token);
    }

    /// Starts a line with a text token which starts with a space.
    fn start_line(&mut self, token: Token, out: &mut Vec<Token>) {
        let Token::Text(text) = &token else {
            out.push(token);
            return;
        };
        self.line_start = text.tsr.map(|tsr| tsr.start);
        let rest = &text.value[1..];
        let has_content = !rest.trim_start_matches([' ', '\t']).is_empty();
        if !rest.is_empty() {
            let tsr = text.tsr.map(|tsr| Span::new(tsr.start + 1, tsr.end));
            self.content.push(Token::text(rest, tsr));
        }
        self.raw.push(token);
        self.state = if has_content { State::Line } else { State::Space };
    }

    /// Moves the current line into the block.
    fn end_line(&mut self) {
        if self.block.is_empty() {
            self.start = self.line_start;
        } else if let Some(newline) = self.newline.take() {
            self.block.push(newline);
        }
        if let Some(end) = self.content.iter().rev().find_map(Token::tsr) {
            self.end = Some(end.end);
        }
        self.block.append(&mut self.content);
        self.raw.clear();
    }

    /// Gives up on the current line, which is written as it was after the
    /// block before it.
    fn cancel_line(&mut self, out: &mut Vec<Token>) {
        self.close_block(out);
        out.append(&mut self.raw);
        self.content.clear();
    }

    /// Writes the current block, if there is one, and the line break after
    /// it.
    fn close_block(&mut self, out: &mut Vec<Token>) {
        if !self.block.is_empty() {
            let start = self.start.take().map(|start| Span::new(start, start + 1));
            out.push(Token::StartTag(Tag::new("pre", vec![], start)));
            out.append(&mut self.block);
            let end = self.end.take().map(Span::at);
            out.push(Token::EndTag(Tag::new("pre", vec![], end)));
        }
        out.extend(self.newline.take());
    }
}

fn starts_with_space(token: &Token) -> bool {
    matches!(token, Token::Text(text) if text.value.starts_with(' '))
}

fn is_block(token: &Token) -> bool {
    match token {
        Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosingTag(tag) => {
            BLOCK_TAGS.contains(tag.name.as_str())
        }
        _ => false,
    }
}

/// Whitespace and comments, which do not make a line preformatted on their
/// own.
fn is_transparent(token: &Token) -> bool {
    match token {
        Token::Comment(_) => true,
        Token::Text(text) => text.value.chars().all(|c| c == ' ' || c == '\t'),
        _ => false,
    }
}

/// Returns true if `token` is the start (or end) tag of a literal `<pre>`.
fn is_literal_pre(token: &Token, start: bool) -> bool {
    match token {
        Token::StartTag(tag) if start => tag.name == "pre" && tag.data.is_html(),
        Token::EndTag(tag) if !start => tag.name == "pre" && tag.data.is_html(),
        _ => false,
    }
}
