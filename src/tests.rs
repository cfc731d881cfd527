//! End-to-end conversions in both directions.

use crate::{
    Document, Error, NodeId, Original,
    config::CONFIG,
    dom::{DomSourceRange, HtmlOptions, NodeKind},
    dom_to_wikitext,
    env::{Collector, Env, NoTemplates, Options},
    ext::Registry,
    wikitext::OffsetType,
    wikitext_to_dom,
};
use serde_json::json;

const SAMPLES: &[&str] = &[
    "",
    "plain text",
    "=foo=\nbar",
    "== Head ==\nSome ''text'' here.\n\n* one\n* two\n",
    "a\n\n\nb  c",
    "{|\n|x\n|}",
    "{| class=\"wikitable\"\n|-\n! a !! b\n|-\n| c || d\n|}",
    ";term:definition\n#one\n#*two\n",
    "[[Foo|bar]]s and [[baz]]ed [http://example.com link] http://example.org",
    "ISBN 978-0-12-345678-9 and RFC 1234",
    "x <nowiki>''y''</nowiki> z &amp; &nbsp;",
    "<div class=\"a\">b<br/>c</div>\n----\n<!-- comment -->",
    "a {{echo|x|k=v}} b",
    "[[Category:Things|key]]__NOTOC__",
    "-{zh-hans:a;zh-hant:b}- tail",
    " pre\n formatted\n\nafter",
];

fn with_env<T>(f: impl FnOnce(&Env<'_>) -> T) -> T {
    let _ = env_logger::try_init();
    let registry = Registry::with_builtins();
    let collector = Collector::default();
    let env = Env::new(&CONFIG, &registry, &NoTemplates, &collector, Options::default());
    f(&env)
}

fn replace_text(doc: &mut Document, node: NodeId, text: &str) {
    if let NodeKind::Text(value) = doc.kind_mut(node) {
        *value = text.to_string();
    }
}

/// Finds the first text node with the given content.
fn find_text(doc: &Document, text: &str) -> NodeId {
    doc.descendants(doc.body())
        .into_iter()
        .find(|node| doc.text(*node) == Some(text))
        .unwrap()
}

#[test]
fn unchanged_documents_keep_their_source() {
    with_env(|env| {
        for source in SAMPLES {
            let doc = wikitext_to_dom(env, source).unwrap();
            let original = Original { doc: &doc, source };
            assert_eq!(&dom_to_wikitext(env, &doc, Some(&original)).unwrap(), source);
        }
    });
}

#[test]
fn fresh_serialization() {
    with_env(|env| {
        for source in ["=foo=\nbar", "{|\n|x\n|}", "a ''b'' [[Foo|bar]] c", "a {{echo|x}} b", " a\n b\n\nc"] {
            let doc = wikitext_to_dom(env, source).unwrap();
            assert_eq!(dom_to_wikitext(env, &doc, None).unwrap(), source);
        }
    });
}

#[test]
fn edits_stay_local() {
    with_env(|env| {
        let source = "= A =\n\n[[foo|bar]]  x\n";
        let doc = wikitext_to_dom(env, source).unwrap();
        let mut edited = doc.clone();
        let text = find_text(&edited, "A");
        replace_text(&mut edited, text, "B");

        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &edited, Some(&original)).unwrap(), "= B =\n\n[[foo|bar]]  x\n");
    });
}

#[test]
fn deleted_paragraph() {
    with_env(|env| {
        let source = "a\n\nb\n\nc";
        let doc = wikitext_to_dom(env, source).unwrap();
        let mut edited = doc.clone();
        let b = find_text(&edited, "b");
        let p = edited.parent(b).unwrap();
        edited.detach(p);

        let original = Original { doc: &doc, source };
        let out = dom_to_wikitext(env, &edited, Some(&original)).unwrap();
        assert!(out.starts_with("a\n\n"), "{out:?}");
        assert!(out.ends_with('c'), "{out:?}");
        assert!(!out.contains('b'), "{out:?}");
    });
}

#[test]
fn edited_wrappers() {
    with_env(|env| {
        let source = "x <nowiki>''y''</nowiki> z";
        let doc = wikitext_to_dom(env, source).unwrap();
        let mut edited = doc.clone();
        let text = find_text(&edited, "''y''");
        let wrapper = edited.parent(text).unwrap();
        replace_text(&mut edited, text, "''w''");
        edited.set_data_mw(wrapper, json!({ "name": "nowiki", "attrs": {}, "body": { "extsrc": "''w''" } }));
        let original = Original { doc: &doc, source };
        assert_eq!(
            dom_to_wikitext(env, &edited, Some(&original)).unwrap(),
            "x <nowiki>''w''</nowiki> z"
        );

        let source = "a {{echo|x}} b";
        let doc = wikitext_to_dom(env, source).unwrap();
        let mut edited = doc.clone();
        let wrapper = edited
            .descendants(edited.body())
            .into_iter()
            .find(|node| edited.has_type_of(*node, "mw:Transclusion"))
            .unwrap();
        let mut mw = edited.data_mw(wrapper).cloned().unwrap();
        mw["parts"][0]["template"]["params"]["1"]["wt"] = json!("y");
        edited.set_data_mw(wrapper, mw);
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &edited, Some(&original)).unwrap(), "a {{echo|y}} b");
        assert_eq!(dom_to_wikitext(env, &edited, None).unwrap(), "a {{echo|y}} b");
    });
}

#[test]
fn missing_handler() {
    with_env(|env| {
        let doc = Document::from_html(r#"<p><span typeof="mw:Extension/poem" data-mw='{"name":"poem"}'></span></p>"#)
            .unwrap();
        assert!(matches!(dom_to_wikitext(env, &doc, None), Err(Error::MissingHandler(name)) if name == "poem"));
    });
}

/// Checks that the children of every element with known tag widths lie in
/// order inside its content range.
fn check_ranges(doc: &Document, node: NodeId) {
    if let Some(dsr) = doc.dsr(node).filter(DomSourceRange::has_valid_tag_widths) {
        let mut cursor = dsr.inner_start();
        for child in doc.children(node) {
            if let Some(range) = doc.dsr(*child) {
                assert!(range.start >= cursor && range.end <= dsr.inner_end(), "{range:?} in {dsr:?}");
                assert!(range.start <= range.end);
                cursor = range.end;
            }
        }
    }
    for child in doc.children(node) {
        check_ranges(doc, *child);
    }
}

#[test]
fn source_ranges_nest() {
    with_env(|env| {
        for source in SAMPLES {
            let doc = wikitext_to_dom(env, source).unwrap();
            let body = doc.dsr(doc.body()).unwrap();
            assert_eq!((body.start, body.end), (0, source.len()));
            check_ranges(&doc, doc.body());
        }
    });
}

#[test]
fn idempotent() {
    with_env(|env| {
        for html in ["<p>a</p><p>b</p>", "<h2>x</h2><ul><li>*y</li></ul>", "<p>''q''</p>"] {
            let doc = Document::from_html(html).unwrap();
            let once = dom_to_wikitext(env, &doc, None).unwrap();
            let doc = wikitext_to_dom(env, &once).unwrap();
            let twice = dom_to_wikitext(env, &doc, None).unwrap();
            assert_eq!(once, twice);
        }
    });
}

#[test]
fn html_reload() {
    let sources = [
        "plain text",
        "=foo=\nbar",
        "== Head ==\nSome ''text'' here.\n\n* one\n* two\n",
        "{|\n|x\n|}",
        "x <nowiki>''y''</nowiki> z &amp; &nbsp;",
        "<div class=\"a\">b<br/>c</div>\n----\n<!-- comment -->",
        "a {{echo|x|k=v}} b",
    ];
    with_env(|env| {
        for source in sources {
            let doc = wikitext_to_dom(env, source).unwrap();
            let html = doc.to_html(&HtmlOptions { inline_data: true });
            let reloaded = Document::from_html(&html).unwrap();
            let original = Original { doc: &doc, source };
            assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), source);
        }
    });
}

#[test]
fn bundle_reload() {
    with_env(|env| {
        let source = "== Head ==\nSome ''text'' here.\n\n* one\n* two\n";
        let doc = wikitext_to_dom(env, source).unwrap();
        let bundle = doc.to_page_bundle(source, OffsetType::Ucs2);
        let json = serde_json::to_string(&bundle).unwrap();
        let bundle = serde_json::from_str(&json).unwrap();
        let reloaded = Document::from_page_bundle(&bundle, source).unwrap();

        let original = Original { doc: &reloaded, source };
        assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), source);

        let mut edited = reloaded.clone();
        let text = find_text(&edited, " here.");
        replace_text(&mut edited, text, " there.");
        let original = Original { doc: &doc, source };
        assert_eq!(
            dom_to_wikitext(env, &edited, Some(&original)).unwrap(),
            "== Head ==\nSome ''text'' there.\n\n* one\n* two\n"
        );
    });
}

#[test]
fn reordered_list_items() {
    with_env(|env| {
        let source = "* one\n* two\n* three\n\npara";
        let doc = wikitext_to_dom(env, source).unwrap();
        let mut edited = doc.clone();
        let ul = edited
            .descendants(edited.body())
            .into_iter()
            .find(|node| edited.is_element(*node, &["ul"]))
            .unwrap();
        let items = edited
            .children(ul)
            .iter()
            .copied()
            .filter(|node| edited.is_element(*node, &["li"]))
            .collect::<Vec<_>>();
        edited.insert_before(ul, items[2], Some(items[0]));

        let original = Original { doc: &doc, source };
        assert_eq!(
            dom_to_wikitext(env, &edited, Some(&original)).unwrap(),
            "* three\n* one\n* two\n\npara"
        );
    });
}

#[test]
fn fostered_text_after_reload() {
    with_env(|env| {
        let source = "{|\nfoo\n|}";
        let doc = wikitext_to_dom(env, source).unwrap();
        let html = doc.to_html(&HtmlOptions { inline_data: true });
        let reloaded = Document::from_html(&html).unwrap();
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), source);

        let source = "{|\nfoo\n|}\n\npara";
        let doc = wikitext_to_dom(env, source).unwrap();
        let html = doc.to_html(&HtmlOptions { inline_data: true });
        let mut reloaded = Document::from_html(&html).unwrap();
        let text = find_text(&reloaded, "para");
        replace_text(&mut reloaded, text, "text");
        let original = Original { doc: &doc, source };
        assert_eq!(
            dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(),
            "{|\nfoo\n|}\n\ntext"
        );
    });
}

#[test]
fn stray_end_tags_after_reload() {
    with_env(|env| {
        let source = "\n]]</span></nowiki>";
        let doc = wikitext_to_dom(env, source).unwrap();
        let html = doc.to_html(&HtmlOptions { inline_data: true });
        let reloaded = Document::from_html(&html).unwrap();
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), source);

        let source = "a</span>b\n\nc";
        let doc = wikitext_to_dom(env, source).unwrap();
        let html = doc.to_html(&HtmlOptions { inline_data: true });
        let mut reloaded = Document::from_html(&html).unwrap();
        assert_eq!(dom_to_wikitext(env, &reloaded, None).unwrap(), source);
        let text = find_text(&reloaded, "c");
        replace_text(&mut reloaded, text, "d");
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), "a</span>b\n\nd");
    });
}

#[test]
fn author_ids_survive_bundles() {
    with_env(|env| {
        let source = "<div id=\"mw1\">x</div>\n\n<span id=\"mw0\">y</span>";
        let doc = wikitext_to_dom(env, source).unwrap();
        let bundle = doc.to_page_bundle(source, OffsetType::Byte);
        let reloaded = Document::from_page_bundle(&bundle, source).unwrap();
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &reloaded, Some(&original)).unwrap(), source);

        let mut edited = reloaded.clone();
        let text = find_text(&edited, "x");
        replace_text(&mut edited, text, "z");
        assert_eq!(
            dom_to_wikitext(env, &edited, Some(&original)).unwrap(),
            "<div id=\"mw1\">z</div>\n\n<span id=\"mw0\">y</span>"
        );
    });
}

#[test]
fn indented_pre() {
    with_env(|env| {
        let source = " a\n b\n\nc";
        let doc = wikitext_to_dom(env, source).unwrap();
        let pre = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.name(pre), Some("pre"));
        assert_eq!(doc.text_content(pre), "a\nb");
        assert_eq!(doc.dsr(pre), Some(DomSourceRange::new(0, 5, Some(1), Some(0))));

        let mut edited = doc.clone();
        let text = find_text(&edited, "b");
        replace_text(&mut edited, text, "x");
        let original = Original { doc: &doc, source };
        assert_eq!(dom_to_wikitext(env, &edited, Some(&original)).unwrap(), " a\n x\n\nc");
    });
}

#[test]
fn escaped_html_edits() {
    with_env(|env| {
        for (html, expected) in [
            ("<p> a</p>", "<nowiki> </nowiki>a"),
            ("<p><i>a</i><i>b</i></p>", "''a''<nowiki/>''b''"),
            ("<p><i>b</i>'c</p>", "''b''<nowiki/>'c"),
            ("<dl><dt>a:b</dt></dl>", ";<nowiki>a:b</nowiki>"),
        ] {
            let doc = Document::from_html(html).unwrap();
            let wikitext = dom_to_wikitext(env, &doc, None).unwrap();
            assert_eq!(wikitext, expected);
            let reparsed = wikitext_to_dom(env, &wikitext).unwrap();
            assert_eq!(reparsed.text_content(reparsed.body()), doc.text_content(doc.body()), "{wikitext}");
        }
    });
}
