use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Span` records a half-open range `[start, end)` of positions in some input. What a position
/// means depends on the input: a byte in a grammar file, a symbol in a character level parse, or a
/// token index in a token level parse. The `Span` holds no reference to the input itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span starting at position `start` and ending at position `end`.
    ///
    /// # Panics
    ///
    /// If `end` is less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            panic!("Span starts ({}) after it ends ({})!", start, end);
        }
        Span { start, end }
    }

    /// First position covered by the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Position immediately after the span.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of positions covered by the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if this `Span` covers no positions, or `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Implemented for errors and warnings which can point at one or more places in their input.
pub trait Spanned: fmt::Display {
    /// Returns the spans associated with the error, always containing at least 1 span.
    ///
    /// Refer to [SpansKind] via [spanskind](Self::spanskind) for the meaning and interpretation
    /// of spans and their ordering.
    fn spans(&self) -> &[Span];
    /// Returns the `SpansKind` associated with this error.
    fn spanskind(&self) -> SpansKind;
}

/// Indicates how to interpret the spans of an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpansKind {
    /// The first span is the first occurrence, and a span for each subsequent occurrence.
    DuplicationError,
    /// Contains a single span at the site of the error.
    Error,
}

#[cfg(test)]
mod test {
    use super::Span;

    #[test]
    fn test_span_accessors() {
        let s = Span::new(2, 5);
        assert_eq!(s.start(), 2);
        assert_eq!(s.end(), 5);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert!(Span::new(4, 4).is_empty());
        assert_eq!(s.to_string(), "2..5");
    }

    #[test]
    fn test_span_order() {
        let mut v = vec![Span::new(3, 4), Span::new(1, 9), Span::new(1, 2)];
        v.sort();
        assert_eq!(v, vec![Span::new(1, 2), Span::new(1, 9), Span::new(3, 4)]);
    }

    #[test]
    #[should_panic]
    fn test_inverted_span() {
        Span::new(5, 4);
    }
}
