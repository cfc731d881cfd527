//! List nesting.
//!
//! The tokenizer only knows about individual list items and their bullets.
//! This stage compares the bullets of each item with those of the item on
//! the previous line and opens and closes lists to match.

use super::{Degraded, Stage};
use crate::{
    dom::{DataParsoid, Syntax},
    wikitext::{Span, Tag, Token},
};

/// The container and item tag names for a bullet.
fn tag_names(bullet: char) -> (&'static str, &'static str) {
    match bullet {
        '*' => ("ul", "li"),
        '#' => ("ol", "li"),
        ';' => ("dl", "dt"),
        _ => ("dl", "dd"),
    }
}

/// Converts `listItem` markers into nested lists.
#[derive(Debug, Default)]
pub(super) struct Lists {
    /// The bullet of the open item at each open level.
    open: Vec<char>,
    /// A line break after a list item, held until it is known whether the
    /// next line continues the list.
    pending_newline: Option<Token>,
}

impl Stage for Lists {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        let token = match token {
            Token::SelfClosingTag(tag) if tag.name == "listItem" => {
                let bullets = tag.attr("bullets").filter(|bullets| {
                    !bullets.is_empty() && bullets.chars().all(|c| matches!(c, '*' | '#' | ':' | ';'))
                });
                return match bullets {
                    Some(bullets) => {
                        self.item(&bullets, *tag.data, out);
                        Ok(())
                    }
                    None => Err(Degraded {
                        reason: "list item without bullets".into(),
                        token: Token::SelfClosingTag(tag),
                    }),
                };
            }
            token => token,
        };

        if self.open.is_empty() {
            out.push(token);
            return Ok(());
        }

        match token {
            Token::NewLine(_) if self.pending_newline.is_none() => {
                self.pending_newline = Some(token);
            }
            Token::Eof(tsr) => {
                self.close_all(tsr.map(|tsr| tsr.start), out);
                out.push(token);
            }
            token if self.pending_newline.is_some() => {
                let at = self.pending_newline.as_ref().and_then(|nl| nl.tsr()).map(|tsr| tsr.start);
                self.close_all(at, out);
                out.push(token);
            }
            token => out.push(token),
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Token>) {
        let at = self.pending_newline.as_ref().and_then(|nl| nl.tsr()).map(|tsr| tsr.start);
        self.close_all(at, out);
    }
}

impl Lists {
    /// Handles a list item with the given bullets.
    fn item(&mut self, bullets: &str, data: DataParsoid, out: &mut Vec<Token>) {
        let new = bullets.chars().collect::<Vec<_>>();
        let tsr = data.tsr;
        // Everything closed before this item is closed at the end of the
        // previous line, or where this item starts if it is on the same line
        let close_at = self
            .pending_newline
            .as_ref()
            .and_then(Token::tsr)
            .or(tsr)
            .map(|tsr| Span::at(tsr.start));

        let mut common = self
            .open
            .iter()
            .zip(&new)
            .take_while(|(old, new)| old == new)
            .count();
        // The last level only has to match the kind of list, since `;` and
        // `:` are items of the same list
        if common < self.open.len()
            && common + 1 == new.len()
            && tag_names(self.open[common]).0 == tag_names(new[common]).0
        {
            common += 1;
        }

        while self.open.len() > common {
            self.close_level(close_at, out);
        }

        let same_level = common == new.len() && common != 0;
        if same_level {
            let bullet = self.open[common - 1];
            out.push(Token::EndTag(Tag::new(tag_names(bullet).1, vec![], close_at)));
        }

        if let Some(newline) = self.pending_newline.take() {
            out.push(newline);
        }

        let open_at = tsr.map(|tsr| Span::at(tsr.start));
        if same_level {
            self.open[common - 1] = new[common - 1];
        } else {
            for bullet in &new[common..] {
                out.push(Token::StartTag(Tag::new(tag_names(*bullet).0, vec![], open_at)));
                self.open.push(*bullet);
                if self.open.len() < new.len() {
                    out.push(Token::StartTag(Tag::new(tag_names(*bullet).1, vec![], open_at)));
                }
            }
        }

        // The innermost item owns the bullets
        let bullet = new[new.len() - 1];
        let mut item = Tag::new(tag_names(bullet).1, vec![], tsr);
        item.data.stx = data.stx.filter(|stx| *stx == Syntax::Row);
        out.push(Token::StartTag(item));
    }

    /// Closes the innermost open list.
    fn close_level(&mut self, at: Option<Span>, out: &mut Vec<Token>) {
        if let Some(bullet) = self.open.pop() {
            let (list, item) = tag_names(bullet);
            out.push(Token::EndTag(Tag::new(item, vec![], at)));
            out.push(Token::EndTag(Tag::new(list, vec![], at)));
        }
    }

    /// Closes every open list at the position `at`, then writes any held
    /// line break.
    fn close_all(&mut self, at: Option<usize>, out: &mut Vec<Token>) {
        let at = at.map(Span::at);
        while !self.open.is_empty() {
            self.close_level(at, out);
        }
        if let Some(newline) = self.pending_newline.take() {
            out.push(newline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        wikitext::{StartRule, Tokenizer},
    };

    fn lists(source: &str) -> (String, Vec<Token>) {
        let tokens = Tokenizer::new(&CONFIG).tokenize(source, StartRule::Document).unwrap();
        let mut stage = Lists::default();
        let mut out = vec![];
        for token in tokens {
            stage.transform(token, &mut out).unwrap();
        }
        stage.finish(&mut out);
        let text = out
            .iter()
            .map(|token| match token {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(text) => text.value.clone(),
                Token::NewLine(_) => "\n".into(),
                _ => String::new(),
            })
            .collect();
        (text, out)
    }

    #[test]
    fn nesting() {
        assert_eq!(lists("*a\n*b").0, "<ul><li>a</li>\n<li>b</li></ul>");
        assert_eq!(
            lists("*a\n**b\n*c").0,
            "<ul><li>a\n<ul><li>b</li></ul></li>\n<li>c</li></ul>"
        );
        assert_eq!(lists("*a\n#b").0, "<ul><li>a</li></ul>\n<ol><li>b</li></ol>");
        assert_eq!(lists("**a").0, "<ul><li><ul><li>a</li></ul></li></ul>");
    }

    #[test]
    fn definitions() {
        assert_eq!(lists(";a:b").0, "<dl><dt>a</dt><dd>b</dd></dl>");
        assert_eq!(lists(";a\n:b").0, "<dl><dt>a</dt>\n<dd>b</dd></dl>");
    }

    #[test]
    fn ends_at_other_content() {
        let (text, out) = lists("*a\nb");
        assert_eq!(text, "<ul><li>a</li></ul>\nb");
        // The list is closed where the line ends
        assert_eq!(out[3].tsr(), Some(Span::at(2)));
        assert_eq!(out[2].tsr(), Some(Span::new(1, 2)));
    }

    #[test]
    fn item_ranges() {
        let (_, out) = lists("*a\n**b");
        // <ul> <li> a NL <ul> <li>
        assert_eq!(out[0].tsr(), Some(Span::at(0)));
        assert_eq!(out[1].tsr(), Some(Span::new(0, 1)));
        assert_eq!(out[4].tsr(), Some(Span::at(3)));
        assert_eq!(out[5].tsr(), Some(Span::new(3, 5)));
    }
}
