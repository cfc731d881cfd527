//! Per-node provenance records.

use crate::wikitext::Span;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeSeq};

/// The source range of a DOM node, with the widths of its opening and
/// closing syntax.
///
/// ```text
/// ''italic''
/// ^^      ^^ open_width = 2, close_width = 2
/// ^^^^^^^^^^ start..end
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DomSourceRange {
    /// The offset of the first byte of the node’s source.
    pub start: usize,
    /// The offset after the last byte of the node’s source.
    pub end: usize,
    /// The width of the opening syntax, if it is known.
    pub open_width: Option<usize>,
    /// The width of the closing syntax, if it is known.
    pub close_width: Option<usize>,
    /// Positive: the number of whitespace characters trimmed after the
    /// opening syntax. Negative: non-whitespace inline content (a comment or
    /// category link) directly touches the opening syntax.
    pub leading_ws: isize,
    /// The same as `leading_ws`, for the closing syntax.
    pub trailing_ws: isize,
}

impl DomSourceRange {
    /// Creates a new range.
    pub fn new(start: usize, end: usize, open_width: Option<usize>, close_width: Option<usize>) -> Self {
        Self {
            start,
            end,
            open_width,
            close_width,
            leading_ws: 0,
            trailing_ws: 0,
        }
    }

    /// Creates a range from a token source range, with unknown widths.
    pub fn from_span(span: Span) -> Self {
        Self::new(span.start, span.end, None, None)
    }

    /// The complete source range.
    #[inline]
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Returns true if both tag widths are known and fit inside the range.
    pub fn has_valid_tag_widths(&self) -> bool {
        match (self.open_width, self.close_width) {
            (Some(open), Some(close)) => {
                self.start <= self.end && open + close <= self.end - self.start
            }
            _ => false,
        }
    }

    /// The start of the content between the opening and closing syntax.
    pub fn inner_start(&self) -> usize {
        self.start + self.open_width.unwrap_or(0)
    }

    /// The end of the content between the opening and closing syntax.
    pub fn inner_end(&self) -> usize {
        self.end.saturating_sub(self.close_width.unwrap_or(0))
    }

    /// The range of the content between the opening and closing syntax.
    pub fn inner_range(&self) -> Span {
        Span::new(self.inner_start(), self.inner_end().max(self.inner_start()))
    }

    /// The range of the opening syntax.
    pub fn open_range(&self) -> Option<Span> {
        self.open_width
            .map(|width| Span::new(self.start, self.start + width))
    }

    /// The range of the closing syntax.
    pub fn close_range(&self) -> Option<Span> {
        self.close_width
            .map(|width| Span::new(self.end - width, self.end))
    }

    /// Returns a copy of this range shifted by `amount`.
    pub fn offset(&self, amount: isize) -> Self {
        Self {
            start: self.start.saturating_add_signed(amount),
            end: self.end.saturating_add_signed(amount),
            ..*self
        }
    }
}

impl Serialize for DomSourceRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ws = self.leading_ws != 0 || self.trailing_ws != 0;
        let mut seq = serializer.serialize_seq(Some(if ws { 6 } else { 4 }))?;
        seq.serialize_element(&self.start)?;
        seq.serialize_element(&self.end)?;
        seq.serialize_element(&self.open_width)?;
        seq.serialize_element(&self.close_width)?;
        if ws {
            seq.serialize_element(&self.leading_ws)?;
            seq.serialize_element(&self.trailing_ws)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DomSourceRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Option<i64>>::deserialize(deserializer)?;
        if !matches!(values.len(), 2 | 4 | 6) {
            return Err(de::Error::invalid_length(values.len(), &"2, 4, or 6 elements"));
        }

        let offset = |i: usize| -> Result<Option<usize>, D::Error> {
            values
                .get(i)
                .copied()
                .flatten()
                .map(|v| usize::try_from(v).map_err(de::Error::custom))
                .transpose()
        };
        let ws = |i: usize| -> Result<isize, D::Error> {
            values.get(i).copied().flatten().map_or(Ok(0), |v| {
                isize::try_from(v).map_err(de::Error::custom)
            })
        };

        let missing = || -> D::Error { de::Error::custom("dsr offsets must not be null") };
        Ok(Self {
            start: offset(0)?.ok_or_else(missing)?,
            end: offset(1)?.ok_or_else(missing)?,
            open_width: offset(2)?,
            close_width: offset(3)?,
            leading_ws: ws(4)?,
            trailing_ws: ws(5)?,
        })
    }
}

/// The syntactic form a node was written in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    /// Literal HTML tags instead of a wikitext shorthand.
    Html,
    /// A table cell written on the same line as the previous cell (`||`),
    /// or a definition written on the same line as its term (`;a:b`).
    Row,
    /// A link with separate target and text.
    Piped,
    /// An ISBN, RFC, or PMID magic link.
    MagicLink,
    /// A bare URL.
    Url,
}

/// The round-trip record for a node.
///
/// This is kept in a side table of the owning [`Document`](super::Document)
/// and is never part of the node’s own attributes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataParsoid {
    /// The node’s source range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsr: Option<DomSourceRange>,

    /// The source range of the token which opened the node.
    #[serde(skip)]
    pub tsr: Option<Span>,

    /// The source range of the token which closed the node.
    #[serde(skip)]
    pub end_tsr: Option<Span>,

    /// The syntax variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stx: Option<Syntax>,

    /// The original source of a construct which is re-emitted verbatim when
    /// its rendering is unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// The tag name as written, when it differs from the normalised name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_tag_name: Option<String>,

    /// The tag was written as `<tag/>`.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub self_close: bool,

    /// The tag had no closing syntax in the source.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub no_close: bool,

    /// The start tag was inserted by the tree builder.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub auto_inserted_start: bool,

    /// The end tag was inserted by the tree builder.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub auto_inserted_end: bool,

    /// The node was moved out of a table by foster parenting.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub fostered: bool,

    /// Link trail text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<String>,

    /// Link prefix text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// The source of the opening syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_tag_src: Option<String>,

    /// The source of the closing syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_tag_src: Option<String>,

    /// The source of the separator between table cell attributes and
    /// content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_sep_src: Option<String>,

    /// Dashes after the first four of a horizontal rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_dashes: Option<usize>,

    /// The widths of an extension tag’s own start and end tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_tag_offsets: Option<DomSourceRange>,

    /// Language variant flags in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fl: Vec<String>,

    /// Shadow copy of the attributes as they were when the node was built.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub a: IndexMap<String, String>,

    /// The element’s `id` was generated for a page bundle.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub auto_id: bool,

    /// The node was rearranged after it was built, so any source range
    /// below it is unreliable.
    #[serde(skip)]
    pub restructured: bool,
}

impl DataParsoid {
    /// Creates a record for a token with the given source range.
    pub fn with_tsr(tsr: Option<Span>) -> Self {
        Self {
            tsr,
            ..Default::default()
        }
    }

    /// Returns true if the node was written as literal HTML.
    #[inline]
    pub fn is_html(&self) -> bool {
        self.stx == Some(Syntax::Html)
    }

    /// Returns true if the record holds nothing worth persisting.
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                tsr: self.tsr,
                end_tsr: self.end_tsr,
                restructured: self.restructured,
                ..Default::default()
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsr_json() {
        let dsr = DomSourceRange::new(0, 10, Some(2), Some(2));
        assert_eq!(serde_json::to_string(&dsr).unwrap(), "[0,10,2,2]");

        let dsr = DomSourceRange {
            leading_ws: 1,
            ..DomSourceRange::new(0, 10, Some(1), None)
        };
        assert_eq!(serde_json::to_string(&dsr).unwrap(), "[0,10,1,null,1,0]");

        let dsr = serde_json::from_str::<DomSourceRange>("[3,5]").unwrap();
        assert_eq!(dsr, DomSourceRange::new(3, 5, None, None));
        let dsr = serde_json::from_str::<DomSourceRange>("[3,9,1,1,-1,2]").unwrap();
        assert_eq!((dsr.leading_ws, dsr.trailing_ws), (-1, 2));

        assert!(serde_json::from_str::<DomSourceRange>("[3]").is_err());
        assert!(serde_json::from_str::<DomSourceRange>("[null,3]").is_err());
    }

    #[test]
    fn dsr_widths() {
        let dsr = DomSourceRange::new(4, 14, Some(2), Some(3));
        assert!(dsr.has_valid_tag_widths());
        assert_eq!(dsr.inner_range(), Span::new(6, 11));
        assert_eq!(dsr.open_range(), Some(Span::new(4, 6)));
        assert_eq!(dsr.close_range(), Some(Span::new(11, 14)));
        assert_eq!(dsr.offset(-4).span(), Span::new(0, 10));
        assert!(!DomSourceRange::new(0, 3, Some(2), Some(2)).has_valid_tag_widths());
        assert!(!DomSourceRange::new(0, 3, None, Some(0)).has_valid_tag_widths());
    }

    #[test]
    fn data_parsoid_json() {
        let dp = DataParsoid {
            dsr: Some(DomSourceRange::new(0, 5, Some(1), Some(0))),
            tsr: Some(Span::new(0, 1)),
            stx: Some(Syntax::Html),
            auto_inserted_end: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&dp).unwrap(),
            r#"{"dsr":[0,5,1,0],"stx":"html","autoInsertedEnd":true}"#
        );
        let back = serde_json::from_str::<DataParsoid>(&serde_json::to_string(&dp).unwrap()).unwrap();
        assert_eq!(back.dsr, dp.dsr);
        assert!(back.tsr.is_none());
        assert!(DataParsoid::with_tsr(Some(Span::new(1, 2))).is_empty());
    }
}
