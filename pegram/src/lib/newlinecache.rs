//! Mapping byte offsets in a text to human readable line and column numbers.

use std::str::FromStr;

use crate::Span;

/// Caches the offsets of every line start in a text so that byte offsets (e.g. those in grammar
/// file errors, or those derived from a parse over characters) can be reported as 1-based
/// `(line, column)` pairs. Text can be supplied incrementally with [`feed`](Self::feed).
#[derive(Clone, Debug)]
pub struct NewlineCache {
    /// The byte offset of the start of each line. The first line always starts at 0.
    line_starts: Vec<usize>,
    /// Bytes seen since the last newline.
    trailing_bytes: usize,
}

impl Default for NewlineCache {
    fn default() -> Self {
        NewlineCache::new()
    }
}

impl FromStr for NewlineCache {
    type Err = ();

    fn from_str(src: &str) -> Result<Self, ()> {
        let mut nlc = NewlineCache::new();
        nlc.feed(src);
        Ok(nlc)
    }
}

impl NewlineCache {
    pub fn new() -> Self {
        NewlineCache {
            line_starts: vec![0],
            trailing_bytes: 0,
        }
    }

    /// Feed more text into the cache. `src` is treated as if it were concatenated onto all text
    /// previously fed.
    pub fn feed(&mut self, src: &str) {
        let base = self.input_length();
        for (off, c) in src.char_indices() {
            if c == '\n' {
                self.line_starts.push(base + off + 1);
                self.trailing_bytes = 0;
            } else {
                self.trailing_bytes += c.len_utf8();
            }
        }
    }

    fn last_line_start(&self) -> usize {
        self.line_starts[self.line_starts.len() - 1]
    }

    /// Total number of bytes fed so far.
    fn input_length(&self) -> usize {
        self.last_line_start() + self.trailing_bytes
    }

    /// Convert a byte offset into a 1-based line number. Returns `None` if `byte` is beyond the
    /// end of the text fed so far.
    pub fn byte_to_line_num(&self, byte: usize) -> Option<usize> {
        if byte > self.input_length() {
            return None;
        }
        // `line_starts` is sorted and always contains 0, so the partition point is at least 1.
        Some(self.line_starts.partition_point(|&start| start <= byte))
    }

    /// Convert a 1-based line number into the byte offset of the start of that line.
    fn line_num_to_byte(&self, line_num: usize) -> Option<usize> {
        if line_num == 0 || line_num > self.line_starts.len() {
            None
        } else {
            Some(self.line_starts[line_num - 1])
        }
    }

    /// Convert a byte offset into the byte offset of the start of its line.
    pub fn byte_to_line_byte(&self, byte: usize) -> Option<usize> {
        self.byte_to_line_num(byte)
            .and_then(|line_num| self.line_num_to_byte(line_num))
    }

    /// Convert `byte` into 1-based `(line, column)` numbers, where columns count characters and
    /// `\r\n` counts as a single character. `src` must be exactly the text previously fed.
    /// Returns `None` if `byte` is out of range or `src` is not the text that was fed.
    pub fn byte_to_line_num_and_col_num(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if byte > self.input_length() || src.len() != self.input_length() {
            return None;
        }
        let line_num = self.byte_to_line_num(byte)?;
        let line_byte = self.line_num_to_byte(line_num)?;
        let mut column = 1;
        let mut prev = None;
        for (off, c) in src[line_byte..].char_indices() {
            if line_byte + off >= byte {
                break;
            }
            if !(prev == Some('\r') && c == '\n') {
                column += 1;
            }
            prev = Some(c);
        }
        if prev == Some('\r') && src[byte..].starts_with('\n') {
            column -= 1;
        }
        Some((line_num, column))
    }

    /// Returns the byte offsets `(start, end)` of the lines `span` touches: `start` is the start of
    /// the line containing `span.start()` and `end` is the end (excluding the newline) of the line
    /// containing `span.end()`. Offsets beyond the text are clamped to its end.
    pub fn span_line_bytes(&self, span: Span) -> (usize, usize) {
        let len = self.input_length();
        let start = self.byte_to_line_byte(span.start().min(len)).unwrap_or(0);
        let end_line = self.byte_to_line_num(span.end().min(len)).unwrap_or(1);
        let end = if end_line < self.line_starts.len() {
            self.line_starts[end_line] - 1
        } else {
            len
        };
        (start, end)
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::NewlineCache;
    use crate::Span;

    fn line_cols(feed: &[&str]) -> Vec<(usize, usize)> {
        let mut nlc = NewlineCache::new();
        let mut src = String::new();
        for f in feed {
            nlc.feed(f);
            src.push_str(f);
        }
        src.char_indices()
            .map(|(off, _)| nlc.byte_to_line_num_and_col_num(&src, off).unwrap())
            .collect()
    }

    #[test]
    fn test_line_cols() {
        let abc = vec![(1, 1), (1, 2), (1, 3)];
        assert_eq!(line_cols(&["abc"]), abc);
        assert_eq!(line_cols(&["a", "bc"]), abc);
        assert_eq!(line_cols(&["a\n", "b"]), vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(line_cols(&["a", "\nb"]), vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(line_cols(&["♠♥\n♦"]), vec![(1, 1), (1, 2), (1, 3), (2, 1)]);
        assert_eq!(line_cols(&["", "", ""]), vec![]);
    }

    #[test]
    fn test_crlf_is_one_column() {
        assert_eq!(
            line_cols(&["a\r\n", "b"]),
            vec![(1, 1), (1, 2), (1, 2), (2, 1)]
        );
        assert_eq!(line_cols(&["a\r", "\nb"]), vec![(1, 1), (1, 2), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_end_of_input() {
        let src = "ab\ncd";
        let nlc = NewlineCache::from_str(src).unwrap();
        assert_eq!(nlc.byte_to_line_num_and_col_num(src, 5), Some((2, 3)));
        assert_eq!(nlc.byte_to_line_num_and_col_num(src, 6), None);
        assert_eq!(nlc.byte_to_line_num_and_col_num("ab\ncde", 1), None);
        assert_eq!(nlc.byte_to_line_num(6), None);
    }

    #[test]
    fn test_span_line_bytes() {
        let src = "\naaaaaabbb\nbbb\nbbbb\n";
        let nlc = NewlineCache::from_str(src).unwrap();
        assert_eq!(nlc.span_line_bytes(Span::new(7, 19)), (1, 19));
        assert_eq!(nlc.span_line_bytes(Span::new(11, 12)), (11, 14));
        assert_eq!(nlc.span_line_bytes(Span::new(20, 20)), (20, 20));
        assert_eq!(nlc.byte_to_line_byte(13), Some(11));
    }
}
