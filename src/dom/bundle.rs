//! Page bundles: HTML with the side tables stored next to it instead of
//! inline.
//!
//! Every element with a round-trip record or extension metadata gets an
//! `id`. Elements which already have a unique `id` keep it; the others get
//! a generated one (`mw` followed by a base-36 counter), which is flagged in
//! the element’s round-trip record and removed again when the bundle is
//! read. Source ranges are written in the requested offset unit and
//! converted back to bytes when the bundle is read.

use super::{DataParsoid, Document, DomSourceRange, HtmlOptions};
use crate::{
    Result,
    wikitext::{FileMap, OffsetType},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// The version of the HTML content model.
pub const CONTENT_VERSION: &str = "2.8.0";

/// HTML with separately stored round-trip data.
///
/// Both `parsoid.ids` and `mw.ids` are JSON objects keyed by element id.
/// Older bundle layouts write `mw.ids` as an array; this one always writes
/// the keyed form.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PageBundle {
    /// The HTML document.
    pub html: String,
    /// Round-trip records by element id.
    pub parsoid: ParsoidData,
    /// Extension metadata by element id.
    pub mw: MwData,
    /// The content model version.
    pub version: String,
}

/// Round-trip records of a bundle.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsoidData {
    /// The number of generated ids.
    pub counter: usize,
    /// Records by element id.
    pub ids: IndexMap<String, DataParsoid>,
    /// The unit of every source range in `ids`.
    pub offset_type: OffsetType,
}

/// Extension metadata of a bundle.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MwData {
    /// Metadata by element id.
    pub ids: IndexMap<String, Value>,
}

impl Document {
    /// Splits the document into HTML and separately stored round-trip data,
    /// with source ranges in the given unit. `source` is the wikitext the
    /// document was built from.
    pub fn to_page_bundle(&self, source: &str, offset_type: OffsetType) -> PageBundle {
        let map = FileMap::new(source);
        let mut doc = self.clone();
        let mut bundle = PageBundle {
            html: String::new(),
            parsoid: ParsoidData {
                offset_type,
                ..Default::default()
            },
            mw: MwData::default(),
            version: CONTENT_VERSION.to_string(),
        };

        let nodes = core::iter::once(doc.body()).chain(doc.descendants(doc.body()));
        let elements = nodes.filter(|id| doc.element(*id).is_some()).collect::<Vec<_>>();
        let mut used = elements
            .iter()
            .filter_map(|id| doc.attr(*id, "id"))
            .map(str::to_string)
            .collect::<HashSet<_>>();
        let mut taken = HashSet::new();

        for node in elements {
            let mut data = doc.data(node).filter(|data| !data.is_empty()).cloned();
            let mw = doc.data_mw(node).cloned();
            if data.is_none() && mw.is_none() {
                continue;
            }

            let id = match doc.attr(node, "id") {
                Some(id) if !taken.contains(id) => id.to_string(),
                _ => {
                    let id = next_id(&mut bundle.parsoid.counter, &used);
                    doc.set_attr(node, "id", id.clone());
                    used.insert(id.clone());
                    data.get_or_insert_default().auto_id = true;
                    id
                }
            };
            taken.insert(id.clone());

            if let Some(mut data) = data {
                data.dsr = data.dsr.map(|dsr| convert_dsr(&map, dsr, offset_type));
                if let Some(ext) = data.ext_tag_offsets {
                    data.ext_tag_offsets = Some(convert_dsr(&map, ext, offset_type));
                }
                bundle.parsoid.ids.insert(id.clone(), data);
            }
            if let Some(mw) = mw {
                bundle.mw.ids.insert(id, mw);
            }
        }

        bundle.html = doc.to_html(&HtmlOptions::default());
        bundle
    }

    /// Reads a page bundle. `source` is the wikitext the bundle was built
    /// from, needed to convert source ranges back to bytes.
    pub fn from_page_bundle(bundle: &PageBundle, source: &str) -> Result<Document> {
        let map = FileMap::new(source);
        let from = bundle.parsoid.offset_type;
        let mut doc = Document::from_html(&bundle.html)?;

        for node in doc.descendants(doc.root()) {
            let Some(id) = doc.attr(node, "id").map(str::to_string) else {
                continue;
            };
            if let Some(data) = bundle.parsoid.ids.get(&id) {
                let mut data = data.clone();
                data.dsr = data.dsr.map(|dsr| to_bytes(&map, dsr, from));
                data.ext_tag_offsets = data.ext_tag_offsets.map(|ext| to_bytes(&map, ext, from));
                if core::mem::take(&mut data.auto_id) {
                    doc.remove_attr(node, "id");
                }
                doc.set_data(node, data);
            }
            if let Some(mw) = bundle.mw.ids.get(&id) {
                doc.set_data_mw(node, mw.clone());
            }
        }

        Ok(doc)
    }
}

/// Generates the next unused id.
fn next_id(counter: &mut usize, used: &HashSet<String>) -> String {
    loop {
        let id = format!("mw{}", base36(*counter));
        *counter += 1;
        if !used.contains(&id) {
            return id;
        }
    }
}

fn base36(mut n: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = vec![];
    loop {
        out.push(DIGITS[n % 36]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Converts a byte range to another unit. Tag widths are converted as
/// ranges so that multi-byte characters inside tags are counted correctly.
fn convert_dsr(map: &FileMap<'_>, dsr: DomSourceRange, to: OffsetType) -> DomSourceRange {
    let open_end = dsr.open_width.map(|width| dsr.start + width);
    let close_start = dsr.close_width.map(|width| dsr.end.saturating_sub(width));
    let mut offsets = [dsr.start, dsr.end, open_end.unwrap_or(dsr.start), close_start.unwrap_or(dsr.end)];
    map.convert_offsets(&mut offsets, to);
    let [start, end, open_end_at, close_start_at] = offsets;
    DomSourceRange {
        start,
        end,
        open_width: open_end.map(|_| open_end_at - start),
        close_width: close_start.map(|_| end - close_start_at),
        ..dsr
    }
}

/// Converts a range in another unit back to bytes.
fn to_bytes(map: &FileMap<'_>, dsr: DomSourceRange, from: OffsetType) -> DomSourceRange {
    let start = map.to_byte_offset(dsr.start, from);
    let end = map.to_byte_offset(dsr.end, from);
    let width = |width: Option<usize>, at: usize, sign: isize| {
        width.map(|width| {
            let other = if sign > 0 {
                map.to_byte_offset(at + width, from)
            } else {
                map.to_byte_offset(at.saturating_sub(width), from)
            };
            other.abs_diff(if sign > 0 { start } else { end })
        })
    };
    DomSourceRange {
        start,
        end,
        open_width: width(dsr.open_width, dsr.start, 1),
        close_width: width(dsr.close_width, dsr.end, -1),
        ..dsr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(source: &str) -> Document {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text(source);
        doc.append_child(doc.body(), p);
        doc.append_child(p, text);
        doc.data_mut(p).dsr = Some(DomSourceRange::new(0, source.len(), Some(0), Some(0)));
        doc.data_mut(text).dsr = Some(DomSourceRange::from_span(crate::wikitext::Span::new(0, source.len())));
        doc
    }

    #[test]
    fn ids() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(36), "10");

        let mut doc = sample("abc");
        let span = doc.create_element("span");
        doc.set_attr(span, "id", "mw0");
        doc.set_data_mw(span, json!({ "x": 1 }));
        doc.append_child(doc.body(), span);

        let bundle = doc.to_page_bundle("abc", OffsetType::Byte);
        let p = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.attr(p, "id"), None);
        assert_eq!(bundle.parsoid.ids.keys().collect::<Vec<_>>(), ["mw1"]);
        assert!(bundle.parsoid.ids["mw1"].auto_id);
        assert_eq!(bundle.mw.ids.keys().collect::<Vec<_>>(), ["mw0"]);
        assert_eq!(bundle.mw.ids["mw0"], json!({ "x": 1 }));
        assert!(bundle.html.contains(r#"<p id="mw1">"#), "{}", bundle.html);

        let read = Document::from_page_bundle(&bundle, "abc").unwrap();
        let [p, span] = read.children(read.body()) else {
            panic!("{:?}", read.children(read.body()));
        };
        assert_eq!(read.attr(*p, "id"), None);
        assert!(!read.data(*p).unwrap().auto_id);
        assert_eq!(read.attr(*span, "id"), Some("mw0"));
        assert_eq!(read.data_mw(*span), Some(&json!({ "x": 1 })));
    }

    #[test]
    fn author_ids() {
        let mut doc = Document::new();
        for (name, id) in [("div", "mw1"), ("span", "mw0")] {
            let node = doc.create_element(name);
            doc.set_attr(node, "id", id);
            doc.data_mut(node).stx = Some(crate::dom::Syntax::Html);
            doc.append_child(doc.body(), node);
        }
        let bundle = doc.to_page_bundle("", OffsetType::Byte);
        assert_eq!(bundle.parsoid.counter, 0);
        let read = Document::from_page_bundle(&bundle, "").unwrap();
        let ids = read.children(read.body()).iter().map(|node| read.attr(*node, "id")).collect::<Vec<_>>();
        assert_eq!(ids, [Some("mw1"), Some("mw0")]);
    }

    #[test]
    fn offsets() {
        let source = "é𝄞x";
        let doc = sample(source);
        let bundle = doc.to_page_bundle(source, OffsetType::Ucs2);
        let p = &bundle.parsoid.ids["mw0"];
        assert_eq!(p.dsr, Some(DomSourceRange::new(0, 4, Some(0), Some(0))));
        let bundle = doc.to_page_bundle(source, OffsetType::Char);
        assert_eq!(bundle.parsoid.ids["mw0"].dsr, Some(DomSourceRange::new(0, 3, Some(0), Some(0))));

        let read = Document::from_page_bundle(&bundle, source).unwrap();
        let p = read.first_child(read.body()).unwrap();
        assert_eq!(read.dsr(p), Some(DomSourceRange::new(0, source.len(), Some(0), Some(0))));
        assert_eq!(read.attr(p, "id"), None);
        assert_eq!(read.text_content(p), source);
    }
}
