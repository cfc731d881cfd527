//! Source positions for wikitext buffers, heavily adapted from
//! [codemap](https://crates.io/crates/codemap).

use peg::str::LineCol;
use serde::{Deserialize, Serialize};

/// A range of text within a string.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Span {
    /// The position in the codemap representing the first byte of the span.
    pub start: usize,

    /// The position after the last byte of the span.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Creates an empty span at the given position.
    #[inline]
    pub fn at(pos: usize) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    /// Returns true if this span is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }

    /// The length of the span, in bytes.
    #[inline]
    pub fn len(self) -> usize {
        self.end - self.start
    }

    /// Creates a span that encloses both `self` and `other`.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    /// Converts the span into a range that can be used for string indexing.
    // This is not just using `From<core::ops::Range<usize>` because type
    // resolution fails in common use with `.into()` which eliminates any
    // benefit of using a standard conversion trait
    pub fn into_range(self) -> core::ops::Range<usize> {
        self.start..self.end
    }
}

/// Associate a Span with a value of arbitrary type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Spanned<T> {
    /// The value.
    pub node: T,
    /// The span.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Creates a new [`Spanned`].
    #[inline]
    pub fn new(node: T, start: usize, end: usize) -> Self {
        Self {
            node,
            span: Span { start, end },
        }
    }
}

impl<T> core::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.node
    }
}

/// The unit used when offsets leave the library.
///
/// Internally, every offset is a byte offset into UTF-8 source. External
/// consumers written in other environments often count UTF-16 code units or
/// Unicode scalar values instead.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetType {
    /// UTF-8 bytes.
    #[default]
    Byte,
    /// UTF-16 code units.
    Ucs2,
    /// Unicode scalar values.
    Char,
}

impl core::str::FromStr for OffsetType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "byte" => Ok(Self::Byte),
            "ucs2" => Ok(Self::Ucs2),
            "char" => Ok(Self::Char),
            _ => Err("expected one of 'byte', 'ucs2', 'char'"),
        }
    }
}

/// A record of a source file’s lines.
#[derive(Clone)]
pub struct FileMap<'a> {
    /// The source file.
    source: &'a str,

    /// Byte positions of line beginnings.
    lines: Vec<usize>,
}

impl core::fmt::Debug for FileMap<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut limit = 100.min(self.source.len());
        while !self.source.is_char_boundary(limit) {
            limit += 1;
        }

        f.debug_struct("FileMap")
            .field(
                "source",
                &format!(
                    "{}{}",
                    &self.source[..limit],
                    if self.source.len() > limit { "…" } else { "" }
                ),
            )
            .finish()
    }
}

impl core::ops::Deref for FileMap<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.source
    }
}

impl<'a> FileMap<'a> {
    /// Creates a new file map for the given source.
    pub fn new(source: &'a str) -> Self {
        let lines = core::iter::once(0)
            .chain(memchr::memchr_iter(b'\n', source.as_bytes()).map(|p| p + 1))
            .collect();

        Self { source, lines }
    }

    /// The complete source text.
    #[inline]
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Gets the line and column of a byte position.
    ///
    /// # Panics
    ///
    /// * If `pos` is not with this file's span
    /// * If `pos` points to a byte in the middle of a UTF-8 character
    pub fn find_line_col(&self, pos: usize) -> LineCol {
        let line = self.find_line(pos);
        let column = self.source[self.lines[line]..pos].chars().count();
        LineCol {
            line: line + 1,
            column: column + 1,
            offset: pos,
        }
    }

    /// Gets the 0-indexed line number of a byte position.
    fn find_line(&self, pos: usize) -> usize {
        assert!(pos <= self.source.len());
        match self.lines.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    /// Converts a byte offset into an offset of the given type.
    ///
    /// Offsets which point into the middle of a character are rounded down
    /// to the start of that character.
    pub fn convert_offset(&self, pos: usize, to: OffsetType) -> usize {
        let mut offsets = [pos];
        self.convert_offsets(&mut offsets, to);
        offsets[0]
    }

    /// Converts a batch of byte offsets into offsets of the given type, in
    /// place, with a single scan of the source.
    pub fn convert_offsets(&self, offsets: &mut [usize], to: OffsetType) {
        if to == OffsetType::Byte {
            return;
        }

        let mut order = (0..offsets.len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| offsets[i]);

        let mut converted = 0;
        let mut chars = self.source.char_indices().peekable();
        for i in order {
            let target = offsets[i].min(self.source.len());
            while let Some((_, c)) = chars.next_if(|(at, _)| *at < target) {
                converted += unit_len(c, to);
            }
            offsets[i] = converted;
        }
    }

    /// Converts an offset of the given type back into a byte offset.
    pub fn to_byte_offset(&self, pos: usize, from: OffsetType) -> usize {
        if from == OffsetType::Byte {
            return pos.min(self.source.len());
        }

        let mut units = 0;
        for (at, c) in self.source.char_indices() {
            if units >= pos {
                return at;
            }
            units += unit_len(c, from);
        }
        self.source.len()
    }
}

/// The number of units a character occupies in the given offset space.
#[inline]
fn unit_len(c: char, unit: OffsetType) -> usize {
    match unit {
        OffsetType::Byte => c.len_utf8(),
        OffsetType::Ucs2 => c.len_utf16(),
        OffsetType::Char => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col() {
        let map = FileMap::new("ab\ncd\n\nef");
        assert_eq!(map.find_line_col(0).line, 1);
        assert_eq!(map.find_line_col(4).line, 2);
        assert_eq!(map.find_line_col(4).column, 2);
        assert_eq!(map.find_line_col(7).line, 4);
    }

    #[test]
    fn offsets() {
        // 'é' is 2 bytes, 1 UTF-16 unit; '𝄞' is 4 bytes, 2 UTF-16 units
        let map = FileMap::new("aé𝄞b");
        let mut offsets = [7, 0, 3, 1];
        map.convert_offsets(&mut offsets, OffsetType::Ucs2);
        assert_eq!(offsets, [4, 0, 2, 1]);

        let mut offsets = [7, 3];
        map.convert_offsets(&mut offsets, OffsetType::Char);
        assert_eq!(offsets, [3, 2]);

        assert_eq!(map.convert_offset(8, OffsetType::Char), 4);
        assert_eq!(map.to_byte_offset(4, OffsetType::Ucs2), 7);
        assert_eq!(map.to_byte_offset(3, OffsetType::Char), 7);
        assert_eq!(map.to_byte_offset(9, OffsetType::Char), 8);
    }

    #[test]
    fn spans() {
        let a = Span::new(2, 4);
        assert_eq!(a.merge(Span::new(6, 8)), Span::new(2, 8));
        assert!(Span::at(3).is_empty());
        assert_eq!(a.len(), 2);
    }
}
