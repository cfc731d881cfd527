//! A parsing expression grammar for Wikitext documents.
//!
//! This grammar converts the Wikitext document into a flat token stream which
//! requires additional context-aware processing later. Every token which
//! corresponds to source text carries its source range.

// Clippy: Most of the arguments are hidden. It is not possible to apply
// this annotation directly to the parser because rust-peg does not understand
// it.
#![allow(clippy::too_many_arguments)]

// This code is heavily adapted from the Parsoid grammar at
// <https://github.com/wikimedia/mediawiki-services-parsoid>
// based on
// Git-Commit-ID: 9cc7fc706b727c392b53fe7fe571747901424065
//
// The upstream copyright is:
//
// SPDX-License-Identifier: GPL-2.0-or-later

use super::{
    Globals, Tokenizer,
    codemap::Span,
    config::{Configuration, HTML5_TAGS},
    token::{Attribute, Extension, Tag, Text, Token, Transclusion, flatten_text},
};
use crate::dom::{DataParsoid, DomSourceRange, Syntax};
use core::iter;
use peg::RuleResult;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

peg::parser! { pub(super) grammar wikitext(state: &Tokenizer<'_>, globals: &Globals) for str {
    /// The top-level start rule.
    pub rule document() -> Vec<Token>
    = ctx:({ Context::default() })
      t:(!eof() t:block(&ctx) { t })*
      e:eof_token()
    { reduce(t, e) }

    /// Inline content which does not start at the start of a line.
    pub rule inline() -> Vec<Token>
    = ctx:({ Context::default() })
      t:(!eof() t:(inline_line(&ctx) / t:newline_token() { vec![t] }) { t })*
      e:eof_token()
    { reduce(t, e) }

    /// Content where only character references are recognised.
    pub rule nowiki() -> Vec<Token>
    = t:(
        htmlentity()
        / s:position!() v:$([^'&']+ / "&") e:position!() { vec![text(v, s, e)] }
      )*
      e:eof_token()
    { reduce(t, e) }

    /// A single extension tag and nothing else.
    pub rule extension_tag_only() -> Vec<Token>
    = t:extension_tag() eof()
    { vec![t] }

    /// A bare link target and nothing else.
    pub rule link_target() -> Vec<Token>
    = s:position!() t:$(link_target_char()+) e:position!() eof()
      &assert(is_link_target(state.config(), t), "link target")
    { vec![text(t, s, e), Token::Eof(Some(Span::at(e)))] }

    /// The content of a table cell, immediately after the `|` which opens
    /// the cell. Anything which would be read as cell attributes or as a new
    /// cell produces a `td` start tag.
    pub rule table_cell() -> Vec<Token>
    = ctx:({ Context::default().with_table_cell() })
      s:position!()
      a:table_cell_attributes()?
      e:position!()
      t:(!eof() t:(
        inline_line(&ctx)
        / s:position!() "||" e:position!() { vec![Token::start_tag("td", vec![], Some(Span::new(s, e)))] }
        / t:newline_token() { vec![t] }
      ) { t })*
      eof:eof_token()
    {
        let head = a.map(|a| vec![Token::start_tag("td", a, Some(Span::new(s, e)))]);
        reduce(head.into_iter().chain(t), eof)
    }

    ////////////////
    // Block flow //
    ////////////////

    /// A block is either a line-anchored construct, a run of inline content,
    /// or a line break.
    rule block(ctx: &Context) -> Vec<Token>
    = sol() t:block_line(ctx) { t }
    / inline_line(ctx)
    / t:newline_token() { vec![t] }

    /// A block item that is anchored to the start of a line (headings, list
    /// items, horizontal rules, tables).
    rule block_line(ctx: &Context) -> Vec<Token>
    = heading(ctx)
    / list_item(ctx)
    / hr()
    / &[' '|'\t'|'{'|'|'|'!']
      t:table_line(ctx) { t }

    /// A run of inline content up to the next inline terminator.
    rule inline_line(ctx: &Context) -> Vec<Token>
    = t:(!inline_breaks(ctx) t:inline_element(ctx) { t })+
    { t.into_iter().flatten().collect() }

    /// Matches the start of a line without consuming anything.
    rule sol()
    = &#{|input, pos| if pos == 0 || input.as_bytes().get(pos - 1) == Some(&b'\n') {
        RuleResult::Matched(pos, ())
      } else {
        RuleResult::Failed
      }}

    ///////////////////////
    // Block-level items //
    ///////////////////////

    /// A heading.
    ///
    /// ```wikitext
    /// == Heading ==
    /// ```
    rule heading(ctx: &Context) -> Vec<Token>
    = s:position!()
      open:$("="+)
      c:inline_line(&ctx.with_h())?
      cs:position!()
      close:$("="+)
      ce:position!()
      spc:space_or_comment()*
      &eolf()
    { make_heading(s, open, c.unwrap_or_default(), cs, close, ce, spc) }

    /// A horizontal rule.
    ///
    /// ```wikitext
    /// ----
    /// ```
    rule hr() -> Vec<Token>
    = s:position!() "----" d:$("-"*) e:position!()
    {
        let mut tag = Tag::new("hr", vec![], Some(Span::new(s, e)));
        if !d.is_empty() {
            tag.data.extra_dashes = Some(d.len());
        }
        vec![Token::SelfClosingTag(tag)]
    }

    /// A list item. Definition terms may be followed by a definition on the
    /// same line.
    ///
    /// ```wikitext
    /// *# Item
    /// ; Term : Definition
    /// ```
    rule list_item(ctx: &Context) -> Vec<Token>
    = s:position!()
      bullets:$(['*'|'#'|':'|';']+)
      e:position!()
      c:inline_line(&if bullets.ends_with(';') { ctx.with_colon() } else { ctx.clone() })?
      dd:(
        &assert(bullets.ends_with(';'), "definition term")
        ds:position!() ":" de:position!() c:inline_line(ctx)?
        { (ds, de, c.unwrap_or_default()) }
      )?
    {
        let mut out = vec![list_item_token(bullets.to_string(), s, e)];
        out.extend(c.into_iter().flatten());
        if let Some((ds, de, c)) = dd {
            let bullets = format!("{}:", &bullets[..bullets.len() - 1]);
            let mut item = list_item_token(bullets, ds, de);
            if let Token::SelfClosingTag(tag) = &mut item {
                tag.data.stx = Some(Syntax::Row);
            }
            out.push(item);
            out.extend(c);
        }
        out
    }

    ////////////
    // Tables //
    ////////////

    /// A line of table syntax.
    rule table_line(ctx: &Context) -> Vec<Token>
    = t:table_start() { vec![t] }
    / &assert(globals.table_depth.get() > 0, "in table")
      t:(
        t:table_end() { vec![t] }
        / t:table_row() { vec![t] }
        / table_caption(ctx)
        / table_data_line(ctx)
        / table_heading_line(ctx)
      )
    { t }

    /// ```wikitext
    /// {| class="wikitable"
    /// ```
    rule table_start() -> Token
    = s:position!() space()* "{|" a:table_attributes() [^'\n'|'\r']* e:position!()
    {
        globals.table_depth.set(globals.table_depth.get() + 1);
        Token::start_tag("table", a, Some(Span::new(s, e)))
    }

    /// ```wikitext
    /// |}
    /// ```
    rule table_end() -> Token
    = s:position!() space()* "|}" e:position!()
    {
        globals.table_depth.set(globals.table_depth.get().saturating_sub(1));
        Token::end_tag("table", Some(Span::new(s, e)))
    }

    /// ```wikitext
    /// |- style="color: red"
    /// ```
    rule table_row() -> Token
    = s:position!() space()* "|-" "-"* a:table_attributes() [^'\n'|'\r']* e:position!()
    { Token::start_tag("tr", a, Some(Span::new(s, e))) }

    /// ```wikitext
    /// |+ Caption
    /// ```
    rule table_caption(ctx: &Context) -> Vec<Token>
    = s:position!() space()* "|+" t:table_cell_tag(&ctx.with_table_cell(), "caption", s, false)
    { t }

    /// ```wikitext
    /// | Cell || class="x" | Cell
    /// ```
    rule table_data_line(ctx: &Context) -> Vec<Token>
    = s:position!() space()* "|" !['}'|'+'|'-']
      first:table_cell_tag(&ctx.with_table_cell(), "td", s, false)
      rest:(s:position!() "||" t:table_cell_tag(&ctx.with_table_cell(), "td", s, true) { t })*
    { first.into_iter().chain(rest.into_iter().flatten()).collect() }

    /// ```wikitext
    /// ! Heading !! Heading
    /// ```
    rule table_heading_line(ctx: &Context) -> Vec<Token>
    = s:position!() space()* "!"
      first:table_cell_tag(&ctx.with_table_head(), "th", s, false)
      rest:(s:position!() ("!!" / "||") t:table_cell_tag(&ctx.with_table_head(), "th", s, true) { t })*
    { first.into_iter().chain(rest.into_iter().flatten()).collect() }

    /// The attributes and content of a single cell. `s` is the start of the
    /// cell delimiter, which has already been consumed.
    rule table_cell_tag(ctx: &Context, name: &'static str, s: usize, row: bool) -> Vec<Token>
    = a:table_cell_attributes()?
      e:position!()
      c:inline_line(ctx)?
    {
        let mut tag = Tag::new(name, a.unwrap_or_default(), Some(Span::new(s, e)));
        if row {
            tag.data.stx = Some(Syntax::Row);
        }
        iter::once(Token::StartTag(tag)).chain(c.into_iter().flatten()).collect()
    }

    /// Cell attributes followed by the `|` which separates them from the
    /// content.
    rule table_cell_attributes() -> Vec<Attribute>
    = a:table_attributes() space()* "|" !"|"
    {? if a.is_empty() { Err("cell attributes") } else { Ok(a) } }

    /// Attributes of a table construct.
    rule table_attributes() -> Vec<Attribute>
    = a:(space()* a:table_attribute() { a })*
    { a }

    rule table_attribute() -> Attribute
    = s:position!()
      name:$([^' '|'\t'|'\n'|'\r'|'='|'|'|'!'|'"'|'\''|'<'|'>'|'['|']'|'{'|'}'|'/']+)
      v:(space()* "=" space()* v:table_attribute_value() { v })?
      e:position!()
    { make_attribute(name, v, s, e) }

    rule table_attribute_value() -> Token
    = "\"" s:position!() v:$([^'"'|'\n'|'\r']*) e:position!() "\"" { attribute_text(v, s, e) }
    / "'" s:position!() v:$([^'\''|'\n'|'\r']*) e:position!() "'" { attribute_text(v, s, e) }
    / s:position!() v:$([^' '|'\t'|'\n'|'\r'|'|']+) e:position!() { attribute_text(v, s, e) }

    //////////////////
    // Inline items //
    //////////////////

    /// A single inline construct.
    rule inline_element(ctx: &Context) -> Vec<Token>
    = t:comment() { vec![t] }
    / &"<" t:(
        t:extension_tag() { t }
        / t:html_tag() { t }
      ) { vec![t] }
    / &"[[" t:wikilink(ctx) { t }
    / &"[" t:extlink(ctx) { t }
    / &"{{{" s:position!() v:$("{{{" (!"}}}" [_])* "}}}") e:position!() { vec![text(v, s, e)] }
    / &"{{" t:template() { vec![t] }
    / &"-{" t:lang_variant() { vec![t] }
    / &"''" t:quote() { t }
    / &"&" t:htmlentity() { t }
    / &"__" t:behavior_switch() { vec![t] }
    / autourl()
    / magic_link()
    / t:text_run() { vec![t] }
    / s:position!() c:$([_]) e:position!() { vec![text(c, s, e)] }

    /// Plain text. Alphanumeric runs are split from other text so that a URL
    /// or magic link is only recognised at the start of a word.
    rule text_run() -> Token
    = s:position!()
      v:$(['a'..='z'|'A'..='Z'|'0'..='9']+ / (![ 'a'..='z'|'A'..='Z'|'0'..='9'] text_char())+)
      e:position!()
    { text(v, s, e) }

    rule text_char()
    = [^'\n'|'\r'|'['|']'|'{'|'}'|'<'|'&'|'\''|'-'|'_'|':'|'|'|'!'|'=']

    /// ```wikitext
    /// [[Target|Label]]trail
    /// ```
    rule wikilink(ctx: &Context) -> Vec<Token>
    = s:position!()
      "[["
      ts:position!()
      target:$(link_target_char()+)
      &assert(is_link_target(state.config(), target), "link target")
      c:("|" cs:position!() c:inline_line(&ctx.with_linkdesc())? { (cs, c.unwrap_or_default()) })?
      "]]"
      ce:position!()
      trail:link_trail()
      e:position!()
      i:input()
    { make_wikilink(state.config(), i, s, target, ts, c, ce, trail, e) }

    rule link_target_char()
    = [^'|'|'['|']'|'{'|'}'|'<'|'>'|'\n'|'\r']

    /// Text immediately following a wikilink which becomes part of the link.
    rule link_trail() -> Option<&'input str>
    = #{|input, pos| match state.config().link_trail_pattern.find(&input[pos..]) {
        Ok(Some(m)) if m.start() == 0 && !m.as_str().is_empty() => {
            RuleResult::Matched(pos + m.end(), Some(&input[pos..pos + m.end()]))
        }
        _ => RuleResult::Matched(pos, None),
      }}

    /// ```wikitext
    /// [https://example.com Label]
    /// ```
    rule extlink(ctx: &Context) -> Vec<Token>
    = s:position!()
      "["
      url:$(url_protocol() url_char()+)
      space()*
      cs:position!()
      c:inline_line(&ctx.with_extlink())?
      ce:position!()
      "]"
      e:position!()
      i:input()
    {
        let content = c.unwrap_or_default();
        let class = if content.is_empty() { "external autonumber" } else { "external text" };
        let mut tag = Tag::new("a", vec![], Some(Span::new(s, cs)))
            .with_attr("rel", "mw:ExtLink")
            .with_attr("href", url)
            .with_attr("class", class);
        tag.data.start_tag_src = Some(i[s..cs].to_string());
        iter::once(Token::StartTag(tag))
            .chain(content)
            .chain(iter::once(Token::end_tag("a", Some(Span::new(ce, e)))))
            .collect()
    }

    rule url_protocol()
    = #{|input, pos| match match_protocol(state.config(), &input[pos..]) {
        Some(protocol) => RuleResult::Matched(pos + protocol.len(), ()),
        None => RuleResult::Failed,
      }}

    rule url_char()
    = [c if is_url_char(c)]

    /// A bare URL.
    rule autourl() -> Vec<Token>
    = s:position!()
      e:#{|input, pos| scan_autourl(state.config(), input, pos)}
      i:input()
    {
        let url = &i[s..e];
        let mut tag = Tag::new("a", vec![], Some(Span::at(s)))
            .with_attr("rel", "mw:ExtLink")
            .with_attr("href", url)
            .with_attr("class", "external free");
        tag.data.stx = Some(Syntax::Url);
        vec![Token::StartTag(tag), text(url, s, e), Token::end_tag("a", Some(Span::at(e)))]
    }

    /// ```wikitext
    /// ISBN 978-0-12-345678-9
    /// RFC 1234
    /// PMID 1234
    /// ```
    rule magic_link() -> Vec<Token>
    = s:position!()
      kind:$("RFC" / "PMID")
      &assert(if kind == "RFC" { state.config().magic_links.rfc } else { state.config().magic_links.pmid }, "magic link enabled")
      [' '|'\u{a0}']+
      id:$(['0'..='9']+)
      !['a'..='z'|'A'..='Z'|'0'..='9'|'_']
      e:position!()
      i:input()
    { make_magic_link(kind, id, &i[s..e], s, e) }
    / s:position!()
      "ISBN"
      &assert(state.config().magic_links.isbn, "magic link enabled")
      [' '|'\u{a0}']+
      isbn:$(['0'..='9'] ([' '|'-']? ['0'..='9'])+ ([' '|'-']? ['x'|'X'])?)
      !['a'..='z'|'A'..='Z'|'0'..='9'|'_']
      e:position!()
      i:input()
    {?
        let digits = isbn.chars().filter(char::is_ascii_alphanumeric).collect::<String>();
        if matches!(digits.len(), 10 | 13) {
            Ok(make_magic_link("ISBN", &digits.to_ascii_uppercase(), &i[s..e], s, e))
        } else {
            Err("ISBN length")
        }
    }

    /// A template call. Calls are not expanded here, only delimited.
    ///
    /// ```wikitext
    /// {{Name|arg|key=value}}
    /// ```
    rule template() -> Token
    = s:position!()
      src:$("{{" !"{" template_body() "}}")
      e:position!()
    {? make_template(src, s, e) }

    rule template_body()
    = ( "{{{" (!"}}}" [_])* "}}}"
      / "{{" template_body() "}}"
      / "[[" (!"]]" [_])* "]]"
      / !"}}" [_]
      )*

    /// Language converter markup. The content is interpreted later.
    ///
    /// ```wikitext
    /// -{zh-hans:foo;zh-hant:bar}-
    /// ```
    rule lang_variant() -> Token
    = &assert(state.config().language_conversion_enabled, "language conversion")
      s:position!()
      src:$("-{" lang_variant_body() "}-")
      e:position!()
    {
        let mut tag = Tag::new("span", vec![], Some(Span::new(s, e)))
            .with_attr("typeof", "mw:LanguageVariant");
        tag.data.src = Some(src.to_string());
        Token::SelfClosingTag(tag)
    }

    rule lang_variant_body()
    = ("-{" lang_variant_body() "}-" / !"}-" [_])*

    /// A run of apostrophes. These are paired into `<i>` and `<b>` later,
    /// once a whole line has been seen.
    rule quote() -> Vec<Token>
    = s:position!() "''" "'"* e:position!()
    { quote_tokens(s, e) }

    /// A behavior switch.
    ///
    /// ```wikitext
    /// __NOTOC__
    /// ```
    rule behavior_switch() -> Token
    = s:position!()
      "__" name:$(['a'..='z'|'A'..='Z'|'0'..='9']+) "__"
      &assert(state.config().behavior_switch_words.contains(name.to_ascii_lowercase().as_str()), "behavior switch")
      e:position!()
    {
        let mut tag = Tag::new("meta", vec![], Some(Span::new(s, e)))
            .with_attr("property", format!("mw:PageProp/{}", name.to_ascii_lowercase()));
        tag.data.src = Some(format!("__{name}__"));
        Token::SelfClosingTag(tag)
    }

    ///////////////////////
    // XML-like elements //
    ///////////////////////

    /// An extension tag. The body is opaque to the tokenizer.
    ///
    /// ```wikitext
    /// <ref name="a">Body</ref>
    /// ```
    rule extension_tag() -> Token
    = s:position!()
      "<" name:$(['a'..='z'|'A'..='Z'] [^' '|'\t'|'\n'|'\r'|'\x0c'|'/'|'>'|'\0']*)
      &assert(state.is_extension_tag(name), "extension tag")
      a:tag_attributes()
      sc:"/"?
      ">"
      oe:position!()
      body:#{|input, pos| if sc.is_some() {
        RuleResult::Matched(pos, None)
      } else if let Some((cs, ce)) = find_end_tag(&input[pos..], name) {
        RuleResult::Matched(pos + ce, Some((Span::new(pos, pos + cs), pos + ce)))
      } else {
        RuleResult::Failed
      }}
      e:position!()
      i:input()
    { make_extension(i, name, a, s, oe, body.map(|(body, _)| body), e) }

    /// A literal HTML tag.
    ///
    /// ```wikitext
    /// <span class="a">
    /// ```
    rule html_tag() -> Token
    = s:position!()
      "<" end:"/"? name:$(['a'..='z'|'A'..='Z'] ['a'..='z'|'A'..='Z'|'0'..='9']*)
      &assert(HTML5_TAGS.contains(name.to_ascii_lowercase().as_str()), "html tag")
      a:tag_attributes()
      sc:"/"?
      ">"
      e:position!()
      i:input()
    { make_html_tag(&i[s..e], name, end.is_some(), a, sc.is_some(), s, e) }

    rule tag_attributes() -> Vec<Attribute>
    = a:(space_or_newline()+ a:tag_attribute() { a })* space_or_newline()*
    { a }

    rule tag_attribute() -> Attribute
    = s:position!()
      name:$([^' '|'\t'|'\n'|'\r'|'\x0c'|'/'|'>'|'='|'\0']+)
      v:(space_or_newline()* "=" space_or_newline()* v:tag_attribute_value() { v })?
      e:position!()
    { make_attribute(name, v, s, e) }

    rule tag_attribute_value() -> Token
    = "\"" s:position!() v:$([^'"']*) e:position!() "\"" { attribute_text(v, s, e) }
    / "'" s:position!() v:$([^'\'']*) e:position!() "'" { attribute_text(v, s, e) }
    / s:position!() v:$((!("/"? ">") [^' '|'\t'|'\n'|'\r'|'\x0c'])+) e:position!() { attribute_text(v, s, e) }

    ///////////////
    // Terminals //
    ///////////////

    /// An HTML comment.
    rule comment() -> Token
    = s:position!() "<!--" c:$((!"-->" [_])*) ("-->" / eof()) e:position!()
    { Token::Comment(Text { value: c.to_string(), tsr: Some(Span::new(s, e)) }) }

    /// An HTML character reference.
    rule htmlentity() -> Vec<Token>
    = s:position!()
      m:$("&" ("#" ['x'|'X'] ['0'..='9'|'a'..='f'|'A'..='F']+ / "#" ['0'..='9']+ / ['a'..='z'|'A'..='Z'|'0'..='9']+) ";")
      e:position!()
    { entity_tokens(m, s, e) }

    rule newline_token() -> Token
    = s:position!() newline() e:position!()
    { Token::NewLine(Some(Span::new(s, e))) }

    rule eof_token() -> Token
    = s:position!() eof()
    { Token::Eof(Some(Span::at(s))) }

    /// A newline.
    rule newline() = "\r"? "\n"

    /// Whitespace or a comment which may trail a line-anchored construct.
    rule space_or_comment() -> Token
    = s:position!() v:$(space()+) e:position!() { text(v, s, e) }
    / comment()

    /// Non-line-ending whitespace.
    rule space() = [' '|'\t']

    /// Characters that match the PCRE "\s" class.
    rule space_or_newline() = [' '|'\t'|'\n'|'\r'|'\x0c']

    /// A positive lookahead for the end of input.
    rule eof() = ![_]

    /// Any newline or end of file.
    rule eolf() = newline() / eof()

    /// The complete input, for actions which need to slice it.
    rule input() -> &'input str
    = #{|input, pos| RuleResult::Matched(pos, input)}

    /// Inline terminators for the current context.
    rule inline_breaks(ctx: &Context)
    = #{|input, pos| inline_breaks(input, pos, ctx)}

    /// Emits an error if `cond` is false.
    rule assert(cond: bool, msg: &'static str)
    = {? if cond { Ok(()) } else { Err(msg) }}
}}

/// Parser context information required for correct handling of inline
/// terminators (via `inline_breaks`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
struct Context {
    /// In an external link.
    extlink: bool,
    /// In a block heading.
    h: bool,
    /// In a wikilink label.
    linkdesc: bool,
    /// In a table cell.
    table_cell: bool,
    /// In a table heading cell.
    table_head: bool,
    /// In a production where a `:` is an inline terminator.
    colon: bool,
}

impl Context {
    /// Makes `:` an inline terminator.
    fn with_colon(&self) -> Self {
        let mut this = self.clone();
        this.colon = true;
        this
    }

    /// Makes `]` an inline terminator.
    fn with_extlink(&self) -> Self {
        let mut this = self.clone();
        this.extlink = true;
        this
    }

    /// Makes the context a block heading.
    fn with_h(&self) -> Self {
        let mut this = self.clone();
        this.h = true;
        this
    }

    /// Makes the context a wikilink label. A `:` inside a label never ends a
    /// definition term.
    fn with_linkdesc(&self) -> Self {
        let mut this = self.clone();
        this.linkdesc = true;
        this.colon = false;
        this
    }

    /// Makes `||` an inline terminator.
    fn with_table_cell(&self) -> Self {
        let mut this = self.clone();
        this.table_cell = true;
        this
    }

    /// Makes `||` and `!!` inline terminators.
    fn with_table_head(&self) -> Self {
        let mut this = self.with_table_cell();
        this.table_head = true;
        this
    }
}

/// Characters which must be encoded in a link `href`.
const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'|');

/// Returns `Matched` if the input at `pos` is an inline terminator in the
/// given context.
fn inline_breaks(input: &str, pos: usize, ctx: &Context) -> RuleResult<()> {
    let rest = &input[pos..];
    let breaks = match rest.as_bytes().first() {
        None | Some(b'\n') => true,
        Some(b'\r') => rest[1..].starts_with('\n'),
        Some(b'=') => ctx.h && heading_ends(rest),
        Some(b':') => ctx.colon,
        Some(b']') => ctx.extlink || (ctx.linkdesc && rest.starts_with("]]")),
        Some(b'|') => ctx.table_cell && rest.starts_with("||"),
        Some(b'!') => ctx.table_head && rest.starts_with("!!"),
        _ => false,
    };

    if breaks {
        RuleResult::Matched(pos, ())
    } else {
        RuleResult::Failed
    }
}

/// Returns true if the `=` run at the start of `rest` is followed only by
/// whitespace and comments until the end of the line.
fn heading_ends(rest: &str) -> bool {
    let mut rest = rest.trim_start_matches('=');
    loop {
        rest = rest.trim_start_matches([' ', '\t']);
        if let Some(comment) = rest.strip_prefix("<!--") {
            match comment.find("-->") {
                Some(end) => rest = &comment[end + 3..],
                None => return true,
            }
        } else {
            return rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n");
        }
    }
}

/// Finds the end tag `</tag_name>` in `input`, returning the range of the
/// end tag.
fn find_end_tag(input: &str, tag_name: &str) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let mut offset = 0;
    while let Some(index) = memchr::memmem::find(&bytes[offset..], b"</") {
        let start = offset + index;
        let name_end = start + 2 + tag_name.len();
        if bytes.len() >= name_end && bytes[start + 2..name_end].eq_ignore_ascii_case(tag_name.as_bytes()) {
            let after = &input[name_end..];
            let trimmed = after.trim_start_matches([' ', '\t', '\n', '\r']);
            if trimmed.starts_with('>') {
                let end = name_end + (after.len() - trimmed.len()) + 1;
                return Some((start, end));
            }
        }
        offset = start + 2;
    }
    None
}

/// Returns true if `target` can be the target of a wikilink.
fn is_link_target(config: &Configuration, target: &str) -> bool {
    let title = target.split_once('#').map_or(target, |(title, _)| title);
    let title = title.trim().trim_start_matches(':');
    if title.is_empty() {
        target.trim_start().starts_with('#')
    } else {
        config.is_valid_title(title)
    }
}

/// Converts a page title to a relative link.
pub(crate) fn title_href(title: &str) -> String {
    let title = title.trim().trim_start_matches(':').replace(' ', "_");
    let mut chars = title.chars();
    let title = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("./{}", utf8_percent_encode(&title, HREF_ENCODE))
}

/// Finds the longest configured protocol at the start of `rest`.
fn match_protocol(config: &Configuration, rest: &str) -> Option<&'static str> {
    config
        .protocols
        .iter()
        .copied()
        .filter(|protocol| {
            rest.len() >= protocol.len()
                && rest.as_bytes()[..protocol.len()].eq_ignore_ascii_case(protocol.as_bytes())
        })
        .max_by_key(|protocol| protocol.len())
}

#[inline]
fn is_url_char(c: char) -> bool {
    !matches!(c, ' ' | '\t' | '\n' | '\r' | '[' | ']' | '<' | '>' | '"' | '{' | '}' | '|')
        && !c.is_control()
}

/// Finds the end of a bare URL at `pos`. Trailing punctuation is not part of
/// the URL, and neither is a trailing `)` unless the URL contains a `(`.
fn scan_autourl(config: &Configuration, input: &str, pos: usize) -> RuleResult<usize> {
    let rest = &input[pos..];
    let Some(protocol) = match_protocol(config, rest) else {
        return RuleResult::Failed;
    };
    // Protocol-relative URLs are only links inside brackets
    if protocol == "//" {
        return RuleResult::Failed;
    }

    let body = &rest[protocol.len()..];
    let mut end = body.find(|c| !is_url_char(c)).unwrap_or(body.len());
    // Two apostrophes start a quote, not more URL
    if let Some(quote) = body[..end].find("''") {
        end = quote;
    }
    while let Some(last) = body[..end].chars().next_back() {
        let strip = matches!(last, '.' | ',' | ';' | ':' | '!' | '?' | '\'')
            || (last == ')' && !body[..end].contains('('));
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }

    if end == 0 {
        RuleResult::Failed
    } else {
        let end = pos + protocol.len() + end;
        RuleResult::Matched(end, end)
    }
}

#[inline]
fn text(value: &str, start: usize, end: usize) -> Token {
    Token::text(value, Some(Span::new(start, end)))
}

/// Concatenates blocks of tokens, merging adjacent text.
fn reduce(blocks: impl IntoIterator<Item = Vec<Token>>, eof: Token) -> Vec<Token> {
    let mut out = Vec::<Token>::new();
    for token in blocks.into_iter().flatten().chain(iter::once(eof)) {
        if let Token::Text(next) = &token
            && let Some(Token::Text(prev)) = out.last_mut()
            && let (Some(a), Some(b)) = (prev.tsr, next.tsr)
            && a.end == b.start
        {
            prev.value += &next.value;
            prev.tsr = Some(a.merge(b));
            continue;
        }
        out.push(token);
    }
    out
}

fn list_item_token(bullets: String, start: usize, end: usize) -> Token {
    Token::self_closing_tag(
        "listItem",
        vec![Attribute::new("bullets", bullets)],
        Some(Span::new(start, end)),
    )
}

/// Builds heading tokens. Unbalanced `=` become text inside the heading.
fn make_heading(
    start: usize,
    open: &str,
    content: Vec<Token>,
    close_start: usize,
    close: &str,
    end: usize,
    trailing: Vec<Token>,
) -> Vec<Token> {
    let level = open.len().min(close.len()).min(6);
    let name = format!("h{level}");
    let mut out = vec![Token::start_tag(&name, vec![], Some(Span::new(start, start + level)))];
    if open.len() > level {
        out.push(text(&open[level..], start + level, start + open.len()));
    }
    out.extend(content);
    if close.len() > level {
        out.push(text(&close[level..], close_start, end - level));
    }
    out.push(Token::end_tag(&name, Some(Span::new(end - level, end))));
    out.extend(trailing);
    out
}

/// Builds wikilink or category tokens.
fn make_wikilink(
    config: &Configuration,
    input: &str,
    start: usize,
    target: &str,
    target_start: usize,
    content: Option<(usize, Vec<Token>)>,
    close_end: usize,
    trail: Option<&str>,
    end: usize,
) -> Vec<Token> {
    let trimmed = target.trim();
    if let Some((ns, name)) = trimmed.split_once(':')
        && config.is_category_namespace(ns)
    {
        let mut href = title_href(&format!("Category:{}", name.trim()));
        if let Some((_, sort)) = &content {
            let sort = flatten_text(sort);
            href = format!("{href}#{}", utf8_percent_encode(&sort, HREF_ENCODE));
        }
        let mut tag = Tag::new("link", vec![], Some(Span::new(start, close_end)))
            .with_attr("rel", "mw:PageProp/Category")
            .with_attr("href", href);
        tag.data.src = Some(input[start..close_end].to_string());
        let mut out = vec![Token::SelfClosingTag(tag)];
        if let Some(trail) = trail {
            out.push(text(trail, close_end, end));
        }
        return out;
    }

    let open_end = content.as_ref().map_or(target_start, |(content_start, _)| *content_start);
    let mut tag = Tag::new("a", vec![], Some(Span::new(start, open_end)))
        .with_attr("rel", "mw:WikiLink")
        .with_attr("href", title_href(target));
    tag.data.start_tag_src = Some(input[start..open_end].to_string());
    tag.data.end_tag_src = Some("]]".to_string());
    tag.data.tail = trail.map(str::to_string);

    let mut out = vec![];
    let children = match content {
        Some((_, content)) => {
            tag.data.stx = Some(Syntax::Piped);
            content
        }
        None => vec![text(target, target_start, target_start + target.len())],
    };
    out.push(Token::StartTag(tag));
    out.extend(children);
    if let Some(trail) = trail {
        out.push(Token::text(trail, None));
    }
    out.push(Token::end_tag("a", Some(Span::new(close_end - 2, end))));
    out
}

/// Builds ISBN, RFC, and PMID link tokens.
fn make_magic_link(kind: &str, id: &str, src: &str, start: usize, end: usize) -> Vec<Token> {
    let (rel, href) = match kind {
        "ISBN" => ("mw:WikiLink", format!("./Special:BookSources/{id}")),
        "RFC" => ("mw:ExtLink", format!("https://datatracker.ietf.org/doc/html/rfc{id}")),
        _ => ("mw:ExtLink", format!("//www.ncbi.nlm.nih.gov/pubmed/{id}?dopt=Abstract")),
    };
    let mut tag = Tag::new("a", vec![], Some(Span::at(start)))
        .with_attr("rel", rel)
        .with_attr("href", href)
        .with_attr("class", format!("mw-magiclink-{}", kind.to_ascii_lowercase()));
    tag.data.stx = Some(Syntax::MagicLink);
    tag.data.src = Some(src.to_string());
    vec![
        Token::StartTag(tag),
        text(src, start, end),
        Token::end_tag("a", Some(Span::at(end))),
    ]
}

/// Splits a template call into its target and arguments.
fn make_template(src: &str, start: usize, end: usize) -> Result<Token, &'static str> {
    let body = &src[2..src.len() - 2];
    let mut parts = split_arguments(body).into_iter();
    let target = parts.next().unwrap_or_default().trim();
    if target.is_empty() {
        return Err("template target");
    }

    let params = parts
        .map(|part| match split_top_level(part, '=') {
            Some((name, value)) if !name.contains('\n') => {
                (Some(name.trim().to_string()), value.trim().to_string())
            }
            _ => (None, part.to_string()),
        })
        .collect();

    Ok(Token::TemplateFragmentMarker(Box::new(Transclusion {
        target: target.to_string(),
        params,
        src: src.to_string(),
        tsr: Some(Span::new(start, end)),
        expansion: None,
    })))
}

/// Splits a template body at every `|` which is not nested inside another
/// template or a link.
fn split_arguments(body: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut rest = body;
    while let Some((head, tail)) = split_top_level(rest, '|') {
        parts.push(head);
        rest = tail;
    }
    parts.push(rest);
    parts
}

/// Splits at the first `delimiter` which is not nested in braces or
/// brackets.
fn split_top_level(body: &str, delimiter: char) -> Option<(&str, &str)> {
    let bytes = body.as_bytes();
    let mut depth = 0_usize;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'{' | b'[' if bytes.get(index + 1) == Some(&bytes[index]) => {
                depth += 1;
                index += 2;
                continue;
            }
            b'}' | b']' if depth > 0 && bytes.get(index + 1) == Some(&bytes[index]) => {
                depth -= 1;
                index += 2;
                continue;
            }
            b if depth == 0 && char::from(b) == delimiter => {
                return Some((&body[..index], &body[index + 1..]));
            }
            _ => {}
        }
        index += 1;
    }
    None
}

/// Converts a run of apostrophes into a quote marker. Four apostrophes are
/// one literal apostrophe followed by bold; more than five are literal
/// apostrophes followed by bold italic.
fn quote_tokens(start: usize, end: usize) -> Vec<Token> {
    let (extra, len) = match end - start {
        4 => (1, 3),
        n if n > 5 => (n - 5, 5),
        n => (0, n),
    };
    let mut out = vec![];
    if extra != 0 {
        out.push(text(&"'".repeat(extra), start, start + extra));
    }
    out.push(Token::self_closing_tag(
        "mw-quote",
        vec![Attribute::new("value", len.to_string())],
        Some(Span::new(start + extra, end)),
    ));
    out
}

/// Converts a character reference to an entity wrapper, or to text if it is
/// not a known entity.
fn entity_tokens(source: &str, start: usize, end: usize) -> Vec<Token> {
    let decoded = html_escape::decode_html_entities(source);
    if decoded == source {
        return vec![text(source, start, end)];
    }

    let mut tag = Tag::new("span", vec![], Some(Span::new(start, end)))
        .with_attr("typeof", "mw:Entity");
    tag.data.src = Some(source.to_string());
    vec![
        Token::StartTag(tag),
        Token::text(decoded, None),
        Token::end_tag("span", Some(Span::at(end))),
    ]
}

/// Builds an attribute. A value-less attribute has an empty value.
fn make_attribute(name: &str, value: Option<Token>, start: usize, end: usize) -> Attribute {
    Attribute {
        name: name.to_ascii_lowercase(),
        value: value.into_iter().collect(),
        src: Some(Span::new(start, end)),
    }
}

fn attribute_text(value: &str, start: usize, end: usize) -> Token {
    text(&html_escape::decode_html_entities(value), start, end)
}

/// Builds an extension placeholder.
fn make_extension(
    input: &str,
    name: &str,
    attributes: Vec<Attribute>,
    start: usize,
    open_end: usize,
    body: Option<Span>,
    end: usize,
) -> Token {
    let close_width = body.map_or(0, |body| end - body.end);
    let mut data = DataParsoid::with_tsr(Some(Span::new(start, end)));
    data.src = Some(input[start..end].to_string());
    data.ext_tag_offsets = Some(DomSourceRange::new(
        start,
        end,
        Some(open_end - start),
        Some(close_width),
    ));
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        data.src_tag_name = Some(name.to_string());
    }
    Token::ExtensionPlaceholder(Box::new(Extension {
        name: name.to_ascii_lowercase(),
        attributes,
        body,
        content: body.map(|body| input[body.into_range()].to_string()),
        data: Box::new(data),
        expansion: None,
    }))
}

/// Builds a literal HTML tag.
fn make_html_tag(
    src: &str,
    name: &str,
    is_end: bool,
    attributes: Vec<Attribute>,
    self_close: bool,
    start: usize,
    end: usize,
) -> Token {
    let lower = name.to_ascii_lowercase();
    let mut tag = Tag::new(&lower, attributes, Some(Span::new(start, end)));
    tag.data.stx = Some(Syntax::Html);
    if lower != name {
        tag.data.src_tag_name = Some(name.to_string());
    }
    if is_end {
        tag.data.end_tag_src = Some(src.to_string());
        Token::EndTag(tag)
    } else {
        tag.data.start_tag_src = Some(src.to_string());
        tag.data.self_close = self_close;
        if self_close {
            Token::SelfClosingTag(tag)
        } else {
            Token::StartTag(tag)
        }
    }
}
