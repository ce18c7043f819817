//! Byte ranges inside the text a stage is rewriting.
//!
//! Stages never see the original document: each one works on the output of
//! the stage before it. A `Span` is therefore only meaningful relative to the
//! string it was computed against, and is used to cut that string apart
//! (environment bodies, brace groups) or to point a diagnostic at the
//! offending construct.

/// A byte range in a stage's working text.
///
/// Both ends are byte offsets, `[start, end)`.
///
/// # Example
///
/// ```rust
/// use texpaper_core::span::Span;
///
/// let span = Span::new(2, 7);
/// assert_eq!(span.len(), 5);
/// assert_eq!(span.slice("a \\emph{x} b"), "\\emph");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: usize,
    /// Ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span from byte offsets.
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of this span in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if this span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Borrow the covered text.
    ///
    /// Spans are produced at ASCII delimiters (`\`, `{`, `}`, `[`, `]`), so
    /// both ends fall on char boundaries of the text they were computed
    /// against.
    #[inline]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}
