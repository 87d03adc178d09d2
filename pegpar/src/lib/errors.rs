use std::{error::Error, fmt};

use pegram::{NewlineCache, Span};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What sort of problem a [`ParseError`] records.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorKind {
    /// The input did not match the grammar.
    Syntax,
    /// A grammar specific diagnostic, raised by an [`Expr::Error`](pegram::Expr::Error).
    User(u16),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "Syntax error"),
            ErrorKind::User(code) => write!(f, "User error {}", code),
        }
    }
}

/// Records a single parse error. The span is in terms of the positions of whatever input was
/// being parsed (symbols, or for a front end, characters).
///
/// `ParseError`s are ordered by their span and then their kind.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseError {
    span: Span,
    kind: ErrorKind,
}

impl ParseError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        ParseError { span, kind }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Return a description of this error with its start as a line and column in `src`, where
    /// positions are `char` indices into `src`.
    pub fn pp(&self, nlc: &NewlineCache, src: &str) -> String {
        let off = src
            .char_indices()
            .nth(self.span.start())
            .map(|(i, _)| i)
            .unwrap_or(src.len());
        match nlc.byte_to_line_num_and_col_num(src, off) {
            Some((line, col)) => format!("{} at line {} column {}", self.kind, line, col),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

impl Error for ParseError {}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::{ErrorKind, ParseError};
    use pegram::{NewlineCache, Span};

    #[test]
    fn test_display() {
        let e = ParseError::new(ErrorKind::Syntax, Span::new(3, 4));
        assert_eq!(e.to_string(), "Syntax error at 3..4");
        let e = ParseError::new(ErrorKind::User(7), Span::new(0, 0));
        assert_eq!(e.to_string(), "User error 7 at 0..0");
    }

    #[test]
    fn test_order() {
        let mut errs = vec![
            ParseError::new(ErrorKind::User(1), Span::new(2, 5)),
            ParseError::new(ErrorKind::Syntax, Span::new(2, 3)),
            ParseError::new(ErrorKind::Syntax, Span::new(0, 9)),
        ];
        errs.sort();
        assert_eq!(
            errs.iter().map(|e| e.span()).collect::<Vec<_>>(),
            vec![Span::new(0, 9), Span::new(2, 3), Span::new(2, 5)]
        );
    }

    #[test]
    fn test_pp() {
        let src = "ab\nλd";
        let nlc = NewlineCache::from_str(src).unwrap();
        let e = ParseError::new(ErrorKind::Syntax, Span::new(4, 5));
        assert_eq!(e.pp(&nlc, src), "Syntax error at line 2 column 2");
        let e = ParseError::new(ErrorKind::Syntax, Span::new(5, 5));
        assert_eq!(e.pp(&nlc, src), "Syntax error at line 2 column 3");
    }
}
