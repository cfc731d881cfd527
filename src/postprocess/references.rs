//! Footnote numbering and reference lists.
//!
//! Footnotes are numbered per group in page order. A footnote which reuses
//! the name of an earlier one in the same group gets the same number. Each
//! `<references>` list takes every footnote of its group seen so far; any
//! group with footnotes left at the end of the page gets a generated list.
//!
//! Footnote markers and lists are atomic wrappers, so filling them in does
//! not touch any source range.

use crate::{
    dom::{Document, NodeId},
    env::Session,
};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::HashMap;

/// One footnote.
#[derive(Debug)]
struct Note {
    /// The unique part of the footnote’s element ids.
    key: String,
    /// The content, as HTML.
    html: Option<String>,
    /// The number of markers which point to this footnote.
    uses: usize,
}

/// The footnotes of one group which have not been listed yet.
#[derive(Debug, Default)]
struct Group {
    notes: Vec<Note>,
    by_name: HashMap<String, usize>,
}

/// Footnote state for a page.
#[derive(Debug, Default)]
struct Notes {
    /// Unlisted footnotes by group name.
    groups: IndexMap<String, Group>,
    /// The number of footnotes seen on the page.
    count: usize,
}

pub(super) fn run(_: &Session<'_>, doc: &mut Document, top_level: bool) {
    if !top_level {
        return;
    }

    let mut notes = Notes::default();
    for node in doc.descendants(doc.body()) {
        if doc.has_type_of(node, "mw:Extension/references") {
            let group = group_of(doc, node, "ol");
            let list = notes.groups.shift_remove(&group).unwrap_or_default();
            fill_list(doc, node, list);
        } else if doc.has_type_of(node, "mw:Extension/ref") {
            notes.add(doc, node);
        }
    }

    for (group, list) in core::mem::take(&mut notes.groups) {
        if list.notes.is_empty() {
            continue;
        }
        log::debug!("generating reference list for group {group:?}");
        let wrapper = create_list(doc, &group);
        doc.append_child(doc.body(), wrapper);
        fill_list(doc, wrapper, list);
    }
}

/// The group of a footnote marker or list.
fn group_of(doc: &Document, node: NodeId, inner: &str) -> String {
    let from_attr = |id: NodeId| doc.attr(id, "data-mw-group").map(str::to_string);
    from_attr(node)
        .or_else(|| find(doc, node, inner, None).and_then(from_attr))
        .or_else(|| {
            doc.data_mw(node)
                .and_then(|mw| mw.pointer("/attrs/group"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// Finds the first descendant element named `name`, optionally with the
/// class `class`.
fn find(doc: &Document, node: NodeId, name: &str, class: Option<&str>) -> Option<NodeId> {
    core::iter::once(node).chain(doc.descendants(node)).find(|id| {
        doc.is_element(*id, &[name])
            && class.is_none_or(|class| {
                doc.attr(*id, "class")
                    .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            })
    })
}

impl Notes {
    /// Numbers a footnote marker.
    fn add(&mut self, doc: &mut Document, node: NodeId) {
        let group_name = group_of(doc, node, "sup");
        let mw = doc.data_mw(node);
        let name = mw
            .and_then(|mw| mw.pointer("/attrs/name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let html = mw
            .and_then(|mw| mw.pointer("/body/html"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let group = self.groups.entry(group_name.clone()).or_default();
        let index = match name.as_ref().and_then(|name| group.by_name.get(name)) {
            Some(index) => *index,
            None => {
                self.count += 1;
                let key = match &name {
                    Some(name) => format!("{}-{}", name.replace(' ', "_"), self.count),
                    None => self.count.to_string(),
                };
                group.notes.push(Note { key, html: None, uses: 0 });
                if let Some(name) = name {
                    group.by_name.insert(name, group.notes.len() - 1);
                }
                group.notes.len() - 1
            }
        };

        let note = &mut group.notes[index];
        if note.html.is_none() {
            note.html = html;
        }
        let id = if note.uses == 0 {
            format!("cite_ref-{}", note.key)
        } else {
            format!("cite_ref-{}_{}", note.key, note.uses)
        };
        note.uses += 1;
        let href = format!("#cite_note-{}", note.key);
        let label = if group_name.is_empty() {
            format!("[{}]", index + 1)
        } else {
            format!("[{group_name} {}]", index + 1)
        };

        doc.set_attr(node, "id", id);
        if let Some(a) = find(doc, node, "a", None) {
            doc.set_attr(a, "href", href);
        }
        if let Some(span) = find(doc, node, "span", Some("mw-reflink-text")) {
            replace_children(doc, span);
            let text = doc.create_text(label);
            doc.append_child(span, text);
        }
    }
}

fn replace_children(doc: &mut Document, node: NodeId) {
    for child in doc.children(node).to_vec() {
        doc.detach(child);
    }
}

/// Creates a generated list wrapper for `group`.
fn create_list(doc: &mut Document, group: &str) -> NodeId {
    let div = doc.create_element("div");
    doc.set_attr(div, "class", "mw-references-wrap");
    doc.set_attr(div, "typeof", "mw:Extension/references");
    let attrs = if group.is_empty() { json!({}) } else { json!({ "group": group }) };
    doc.set_data_mw(div, json!({ "name": "references", "attrs": attrs, "autoGenerated": true }));
    let ol = doc.create_element("ol");
    doc.set_attr(ol, "class", "mw-references references");
    if !group.is_empty() {
        doc.set_attr(ol, "data-mw-group", group);
    }
    doc.append_child(div, ol);
    div
}

/// Writes the footnotes of a group into a list wrapper.
fn fill_list(doc: &mut Document, wrapper: NodeId, group: Group) {
    let Some(ol) = find(doc, wrapper, "ol", None) else {
        log::warn!("reference list without <ol>");
        return;
    };
    replace_children(doc, ol);

    for note in group.notes {
        let li = doc.create_element("li");
        doc.set_attr(li, "id", format!("cite_note-{}", note.key));
        let backlink = doc.create_element("span");
        doc.set_attr(backlink, "class", "mw-cite-backlink");
        let a = doc.create_element("a");
        doc.set_attr(a, "href", format!("#cite_ref-{}", note.key));
        let arrow = doc.create_text("↑");
        let space = doc.create_text(" ");
        let text = doc.create_element("span");
        doc.set_attr(text, "class", "mw-reference-text");
        doc.append_child(ol, li);
        doc.append_child(li, backlink);
        doc.append_child(backlink, a);
        doc.append_child(a, arrow);
        doc.append_child(li, space);
        doc.append_child(li, text);

        let Some(html) = note.html else {
            continue;
        };
        match Document::from_html(&html) {
            Ok(body) => {
                for child in body.children(body.body()).to_vec() {
                    let child = doc.import(&body, child);
                    doc.append_child(text, child);
                }
            }
            Err(err) => {
                log::warn!("could not read footnote content: {err}");
                let child = doc.create_text(html);
                doc.append_child(text, child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CONFIG,
        env::{Collector, Env, NoTemplates, Options},
        ext::Registry,
    };

    fn convert(source: &str) -> Document {
        let _ = env_logger::try_init();
        let registry = Registry::with_builtins();
        let collector = Collector::default();
        let env = Env::new(&CONFIG, &registry, &NoTemplates, &collector, Options::default());
        crate::wikitext_to_dom(&env, source).unwrap()
    }

    fn refs(doc: &Document) -> Vec<NodeId> {
        doc.descendants(doc.body())
            .into_iter()
            .filter(|id| doc.has_type_of(*id, "mw:Extension/ref"))
            .collect()
    }

    #[test]
    fn numbering() {
        let doc = convert("a<ref>x</ref> b<ref name=n>y</ref><ref name=n />\n<references />");
        let labels = refs(&doc)
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect::<Vec<_>>();
        assert_eq!(labels, ["[1]", "[2]", "[2]"]);

        let markers = refs(&doc);
        assert_eq!(doc.attr(markers[1], "id"), Some("cite_ref-n-2"));
        assert_eq!(doc.attr(markers[2], "id"), Some("cite_ref-n-2_1"));

        let list = doc.last_child(doc.body()).unwrap();
        let ol = find(&doc, list, "ol", None).unwrap();
        assert_eq!(doc.children(ol).len(), 2);
        let first = doc.children(ol)[0];
        assert_eq!(doc.attr(first, "id"), Some("cite_note-1"));
        assert_eq!(doc.text_content(first), "↑ x");
    }

    #[test]
    fn generated_list() {
        let doc = convert("a<ref group=g>x</ref>");
        assert_eq!(doc.text_content(refs(&doc)[0]), "[g 1]");
        let list = doc.last_child(doc.body()).unwrap();
        assert_eq!(doc.data_mw(list).unwrap()["autoGenerated"], true);
        assert_eq!(doc.data_mw(list).unwrap()["attrs"]["group"], "g");
        assert!(doc.dsr(list).is_none());
    }
}
