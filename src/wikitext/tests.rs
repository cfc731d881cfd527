use super::*;
use crate::config::CONFIG;

fn tokenize(source: &str, rule: StartRule) -> Vec<Token> {
    let _ = env_logger::try_init();
    Tokenizer::new(&CONFIG).tokenize(source, rule).unwrap()
}

fn describe(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| match token {
            Token::StartTag(tag) => format!("<{}>", tag.name),
            Token::EndTag(tag) => format!("</{}>", tag.name),
            Token::SelfClosingTag(tag) => format!("<{}/>", tag.name),
            Token::Text(text) => format!("{:?}", text.value),
            Token::Comment(text) => format!("<!--{}-->", text.value),
            Token::NewLine(_) => "NL".into(),
            Token::Eof(_) => "EOF".into(),
            Token::ExtensionPlaceholder(ext) => format!("ext:{}", ext.name),
            Token::TemplateFragmentMarker(tpl) => format!("tpl:{}", tpl.target),
        })
        .collect()
}

fn tsrs(tokens: &[Token]) -> Vec<Option<(usize, usize)>> {
    tokens.iter().map(|t| t.tsr().map(|s| (s.start, s.end))).collect()
}

#[test]
fn heading() {
    let tokens = tokenize("== A ==", StartRule::Document);
    assert_eq!(describe(&tokens), ["<h2>", "\" A \"", "</h2>", "EOF"]);
    assert_eq!(
        tsrs(&tokens),
        [Some((0, 2)), Some((2, 5)), Some((5, 7)), Some((7, 7))]
    );

    let tokens = tokenize("==a=", StartRule::Document);
    assert_eq!(describe(&tokens), ["<h1>", "\"=a\"", "</h1>", "EOF"]);
    assert_eq!(tokens[1].tsr(), Some(Span::new(1, 3)));

    let tokens = tokenize("a == b ==", StartRule::Document);
    assert_eq!(describe(&tokens), ["\"a == b ==\"", "EOF"]);
}

#[test]
fn lists() {
    let tokens = tokenize("*a\n#b", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["<listItem/>", "\"a\"", "NL", "<listItem/>", "\"b\"", "EOF"]
    );
    assert_eq!(tokens[3].tag().unwrap().attr("bullets").as_deref(), Some("#"));

    let tokens = tokenize(";a:b", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["<listItem/>", "\"a\"", "<listItem/>", "\"b\"", "EOF"]
    );
    let dd = tokens[2].tag().unwrap();
    assert_eq!(dd.attr("bullets").as_deref(), Some(":"));
    assert_eq!(dd.data.stx, Some(crate::dom::Syntax::Row));
    assert_eq!(dd.data.tsr, Some(Span::new(2, 3)));
}

#[test]
fn wikilinks() {
    let tokens = tokenize("[[Foo bar|baz]]s", StartRule::Document);
    assert_eq!(describe(&tokens), ["<a>", "\"baz\"", "\"s\"", "</a>", "EOF"]);
    let tag = tokens[0].tag().unwrap();
    assert_eq!(tag.attr("href").as_deref(), Some("./Foo_bar"));
    assert_eq!(tag.data.tail.as_deref(), Some("s"));
    assert_eq!(
        tsrs(&tokens),
        [Some((0, 10)), Some((10, 13)), None, Some((13, 16)), Some((16, 16))]
    );

    let tokens = tokenize("[[Category:Foo]]", StartRule::Document);
    assert_eq!(describe(&tokens), ["<link/>", "EOF"]);
    assert_eq!(
        tokens[0].tag().unwrap().attr("href").as_deref(),
        Some("./Category:Foo")
    );

    let tokens = tokenize("[[a{b]]", StartRule::Document);
    assert_eq!(describe(&tokens), ["\"[[a{b]]\"", "EOF"]);
}

#[test]
fn external_links() {
    let tokens = tokenize("[http://example.com Ex] see http://a.b/c.", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["<a>", "\"Ex\"", "</a>", "\" see \"", "<a>", "\"http://a.b/c\"", "</a>", "\".\"", "EOF"]
    );
    let free = tokens[4].tag().unwrap();
    assert_eq!(free.data.stx, Some(crate::dom::Syntax::Url));
    assert_eq!(free.data.tsr, Some(Span::at(28)));

    let tokens = tokenize("RFC 1234", StartRule::Document);
    assert_eq!(describe(&tokens), ["<a>", "\"RFC 1234\"", "</a>", "EOF"]);

    let tokens = tokenize("XRFC 1234", StartRule::Document);
    assert_eq!(describe(&tokens), ["\"XRFC 1234\"", "EOF"]);
}

#[test]
fn tables() {
    let tokens = tokenize("{|\n|a||b\n|}", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["<table>", "NL", "<td>", "\"a\"", "<td>", "\"b\"", "NL", "</table>", "EOF"]
    );
    assert_eq!(tokens[2].tsr(), Some(Span::new(3, 4)));
    assert_eq!(tokens[4].tsr(), Some(Span::new(5, 7)));
    assert_eq!(
        tokens[4].tag().unwrap().data.stx,
        Some(crate::dom::Syntax::Row)
    );

    let tokens = tokenize("{|\n| class=\"x\" | a\n|}", StartRule::Document);
    let td = tokens[2].tag().unwrap();
    assert_eq!(td.attr("class").as_deref(), Some("x"));

    // Not a table cell outside of a table
    let tokens = tokenize("|a||b", StartRule::Document);
    assert_eq!(describe(&tokens), ["\"|a||b\"", "EOF"]);
}

#[test]
fn table_cell_rule() {
    let tokens = tokenize("a|b", StartRule::TableCell);
    assert!(tokens[0].is_start_tag("td"));
    let tokens = tokenize("a||b", StartRule::TableCell);
    assert!(tokens.iter().any(|t| t.is_start_tag("td")));
    let tokens = tokenize("a b", StartRule::TableCell);
    assert_eq!(describe(&tokens), ["\"a b\"", "EOF"]);
}

#[test]
fn extension_tags() {
    let tokens = tokenize("<ref name=\"a\">x</ref>", StartRule::Document);
    let Token::ExtensionPlaceholder(ext) = &tokens[0] else {
        panic!("not an extension: {tokens:?}");
    };
    assert_eq!(ext.name, "ref");
    assert_eq!(ext.content.as_deref(), Some("x"));
    assert_eq!(ext.attributes[0].value_text(), "a");
    let offsets = ext.data.ext_tag_offsets.unwrap();
    assert_eq!((offsets.open_width, offsets.close_width), (Some(14), Some(6)));

    let tokens = tokenize("<references />", StartRule::ExtensionTag);
    assert_eq!(describe(&tokens), ["ext:references"]);
    assert!(
        Tokenizer::new(&CONFIG)
            .tokenize("<ref>x</ref>y", StartRule::ExtensionTag)
            .is_err()
    );

    let tokens = tokenize("<nowiki>''a''</nowiki>", StartRule::Document);
    assert_eq!(describe(&tokens), ["ext:nowiki", "EOF"]);
}

#[test]
fn inline_constructs() {
    let tokens = tokenize("''a'''b", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["<mw-quote/>", "\"a\"", "<mw-quote/>", "\"b\"", "EOF"]
    );

    let tokens = tokenize("a&amp;b&bogus;", StartRule::Document);
    assert_eq!(
        describe(&tokens),
        ["\"a\"", "<span>", "\"&\"", "</span>", "\"b&bogus;\"", "EOF"]
    );

    let tokens = tokenize("<!-- c -->__NOTOC__<b class=x>", StartRule::Document);
    assert_eq!(describe(&tokens), ["<!-- c -->", "<meta/>", "<b>", "EOF"]);
    let b = tokens[2].tag().unwrap();
    assert!(b.data.is_html());
    assert_eq!(b.data.start_tag_src.as_deref(), Some("<b class=x>"));

    let tokens = tokenize("-{a}-", StartRule::Document);
    assert_eq!(describe(&tokens), ["<span/>", "EOF"]);
}

#[test]
fn templates() {
    let tokens = tokenize("{{a|b|c = d|{{e|f}}}}", StartRule::Document);
    let Token::TemplateFragmentMarker(tpl) = &tokens[0] else {
        panic!("not a template: {tokens:?}");
    };
    assert_eq!(tpl.target, "a");
    assert_eq!(
        tpl.params,
        [
            (None, "b".to_string()),
            (Some("c".to_string()), "d".to_string()),
            (None, "{{e|f}}".to_string()),
        ]
    );
    assert_eq!(tpl.tsr, Some(Span::new(0, 21)));

    let tokens = tokenize("{{{1}}}", StartRule::Document);
    assert_eq!(describe(&tokens), ["\"{{{1}}}\"", "EOF"]);
}
