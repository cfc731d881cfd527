//! Expansion contexts.

use super::codemap::{FileMap, Span};

/// A frame expansion error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A template tried to include itself.
    #[error("template loop detected: {0}")]
    Loop(String),

    /// The expansion tree is deeper than the configured limit.
    #[error("expansion depth limit exceeded: {0}")]
    DepthExceeded(String),
}

/// An expansion context: the top-level page, or a template or extension body
/// nested somewhere beneath it.
///
/// Every frame has its own coordinate space; token offsets are only
/// meaningful relative to the frame which produced them.
#[derive(Debug)]
pub struct Frame<'a> {
    /// The title of the page or template the source came from.
    title: &'a str,
    /// The source text of this frame.
    source: FileMap<'a>,
    /// The frame which spawned this one.
    parent: Option<&'a Frame<'a>>,
    /// The source range in the parent frame which caused this expansion.
    origin: Option<Span>,
    /// The number of ancestors.
    depth: usize,
}

impl<'a> Frame<'a> {
    /// Creates a new top-level frame.
    pub fn root(title: &'a str, source: &'a str) -> Self {
        Self {
            title,
            source: FileMap::new(source),
            parent: None,
            origin: None,
            depth: 0,
        }
    }

    /// Creates a new child frame for an expansion of `title` which was
    /// requested by the text at `origin` in this frame.
    pub fn child<'b>(
        &'b self,
        title: &'b str,
        source: &'b str,
        origin: Span,
        max_depth: usize,
    ) -> Result<Frame<'b>, Error> {
        if self.depth + 1 > max_depth {
            return Err(Error::DepthExceeded(self.backtrace(title)));
        }

        if self.ancestors().any(|frame| frame.title == title) {
            return Err(Error::Loop(self.backtrace(title)));
        }

        Ok(Frame {
            title,
            source: FileMap::new(source),
            parent: Some(self),
            origin: Some(origin),
            depth: self.depth + 1,
        })
    }

    /// The title of this frame.
    #[inline]
    pub fn title(&self) -> &'a str {
        self.title
    }

    /// The source text of this frame.
    #[inline]
    pub fn source(&self) -> &FileMap<'a> {
        &self.source
    }

    /// The number of ancestor frames.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if this is the top-level frame.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Maps a range in this frame to the range in the top-level frame which
    /// is responsible for it.
    ///
    /// For the root frame this is the identity. For a nested frame, the
    /// best answer available is the outermost origin, since nested source
    /// does not exist in the page text.
    pub fn root_range(&self, span: Span) -> Span {
        let mut range = span;
        let mut frame = self;
        while let (Some(parent), Some(origin)) = (frame.parent, frame.origin) {
            range = origin;
            frame = parent;
        }
        range
    }

    /// Iterates over this frame and its ancestors, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Frame<'a>> {
        core::iter::successors(Some(self), |frame| frame.parent)
    }

    /// Formats the chain of frames, with a new title appended.
    fn backtrace(&self, next: &str) -> String {
        let mut titles = self.ancestors().map(|frame| frame.title).collect::<Vec<_>>();
        titles.reverse();
        titles.push(next);
        titles.join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_range() {
        let root = Frame::root("Page", "a {{T}} b");
        let child = root.child("Template:T", "{{U}}", Span::new(2, 7), 10).unwrap();
        let grandchild = child.child("Template:U", "x", Span::new(0, 5), 10).unwrap();
        assert_eq!(root.root_range(Span::new(0, 1)), Span::new(0, 1));
        assert_eq!(grandchild.root_range(Span::new(0, 1)), Span::new(2, 7));
        assert_eq!(grandchild.depth(), 2);
        assert!(!grandchild.is_root());
    }

    #[test]
    fn recursion() {
        let root = Frame::root("Page", "{{T}}");
        let child = root.child("Template:T", "{{T}}", Span::new(0, 5), 10).unwrap();
        let err = child.child("Template:T", "", Span::new(0, 5), 10).unwrap_err();
        assert!(matches!(err, Error::Loop(_)));
        assert_eq!(
            err.to_string(),
            "template loop detected: Page → Template:T → Template:T"
        );

        let err = root.child("Template:T", "", Span::new(0, 5), 0).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded(_)));
    }
}
