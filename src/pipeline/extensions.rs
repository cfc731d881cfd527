//! Expansion of extension tags and templates.

use super::{Degraded, Stage, nested_document};
use crate::{
    Result,
    dom::Document,
    env::Session,
    ext::{ExtArgs, ExtensionContext, handler_error},
    wikitext::{Extension, Frame, Token, Transclusion},
};

/// Fills in the expansion of every extension placeholder and template
/// marker.
pub(super) struct Extensions<'a> {
    /// The conversion session.
    session: &'a Session<'a>,
    /// The frame the tokens came from.
    frame: &'a Frame<'a>,
}

impl<'a> Extensions<'a> {
    /// Creates a new extension stage for tokens from `frame`.
    pub fn new(session: &'a Session<'a>, frame: &'a Frame<'a>) -> Self {
        Self { session, frame }
    }

    /// Runs the handler for an extension tag. Extension tags with no handler
    /// expand to an empty `<span>`.
    fn expand_extension(&self, ext: &Extension) -> Result<Document> {
        let Some(handler) = self.session.env.registry.get(&ext.name) else {
            log::debug!("no handler for <{}>", ext.name);
            let mut doc = Document::fragment();
            let span = doc.create_element("span");
            doc.append_child(doc.root(), span);
            return Ok(doc);
        };

        let args = ExtArgs::new(&ext.attributes, handler);
        let cx = ExtensionContext::new(self.session, self.frame, &ext.name, ext.data.tsr);
        handler
            .source_to_dom(&cx, ext.content.as_deref(), &args)
            .map_err(|err| handler_error(&ext.name, err))
    }

    /// Fetches and converts a template. Parser functions and templates
    /// which do not exist expand to nothing.
    fn expand_template(&self, tpl: &Transclusion) -> Result<Document> {
        let target = tpl.target.trim();
        if target.starts_with('#') || target.contains("{{") {
            return Ok(Document::fragment());
        }

        let title = template_title(target);
        let Some(source) = self.session.env.data_access.fetch_template(&title) else {
            log::debug!("template {title} does not exist");
            return Ok(Document::fragment());
        };
        let source = substitute_arguments(&source, &tpl.params);
        let frame = self.frame.child(
            &title,
            &source,
            tpl.tsr.unwrap_or_default(),
            self.session.env.options.max_depth,
        )?;
        nested_document(self.session, &frame, false)
    }
}

impl Stage for Extensions<'_> {
    fn name(&self) -> &'static str {
        "extensions"
    }

    fn transform(&mut self, token: Token, out: &mut Vec<Token>) -> Result<(), Degraded> {
        match token {
            Token::ExtensionPlaceholder(mut ext) => match self.expand_extension(&ext) {
                Ok(doc) => {
                    ext.expansion = Some(doc);
                    out.push(Token::ExtensionPlaceholder(ext));
                }
                Err(err) => {
                    return Err(Degraded {
                        reason: format!("<{}>: {err}", ext.name),
                        token: Token::ExtensionPlaceholder(ext),
                    });
                }
            },
            Token::TemplateFragmentMarker(mut tpl) => {
                let doc = self.expand_template(&tpl).unwrap_or_else(|err| {
                    self.session.degrade("extensions", format!("{{{{{}}}}}: {err}", tpl.target));
                    Document::fragment()
                });
                tpl.expansion = Some(doc);
                out.push(Token::TemplateFragmentMarker(tpl));
            }
            token => out.push(token),
        }
        Ok(())
    }
}

/// The page title of a template target.
pub(crate) fn template_title(target: &str) -> String {
    let target = target.replace('_', " ");
    if let Some(target) = target.strip_prefix(':') {
        return target.trim().to_string();
    }

    let mut chars = target.chars();
    let target = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    if target.contains(':') {
        target
    } else {
        format!("Template:{target}")
    }
}

/// Replaces `{{{name}}}` and `{{{name|default}}}` in a template with the
/// values of its arguments. Positional arguments are numbered from 1.
fn substitute_arguments(source: &str, params: &[(Option<String>, String)]) -> String {
    // The last argument with a name wins
    let lookup = |name: &str| {
        let mut position = 0;
        let mut found = None;
        for (key, value) in params {
            let matches = match key {
                Some(key) => key == name,
                None => {
                    position += 1;
                    position.to_string() == name
                }
            };
            if matches {
                found = Some(value.as_str());
            }
        }
        found
    };

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{{") {
        out += &rest[..start];
        let after = &rest[start + 3..];
        let Some(end) = after.find("}}}") else {
            out += &rest[start..];
            return out;
        };
        let inner = &after[..end];
        let (name, default) = match inner.split_once('|') {
            Some((name, default)) => (name.trim(), Some(default)),
            None => (inner.trim(), None),
        };
        match lookup(name).or(default) {
            Some(value) => out += value,
            None => out += &rest[start..start + 3 + end + 3],
        }
        rest = &after[end + 3..];
    }
    out + rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles() {
        assert_eq!(template_title("foo bar"), "Template:Foo bar");
        assert_eq!(template_title("User:Foo"), "User:Foo");
        assert_eq!(template_title(":main_page"), "main page");
    }

    #[test]
    fn arguments() {
        let params = [
            (None, "a".to_string()),
            (Some("x".to_string()), "b".to_string()),
            (None, "c".to_string()),
        ];
        assert_eq!(
            substitute_arguments("{{{1}}}-{{{x}}}-{{{2}}}-{{{3|d}}}-{{{4}}}", &params),
            "a-b-c-d-{{{4}}}"
        );
        assert_eq!(substitute_arguments("{{{1", &params), "{{{1");
    }
}
