use std::path::Path;

use pegpar::ParseError;
use pegram::{NewlineCache, Span, Spanned, SpansKind};
use unicode_width::UnicodeWidthStr;

/// Renders errors against the text they refer to: a `file:line:col` location, then each source
/// line the error touches with the offending part underlined.
pub struct SpannedDiagnosticFormatter<'a> {
    src: &'a str,
    path: &'a Path,
    nlc: NewlineCache,
}

impl<'a> SpannedDiagnosticFormatter<'a> {
    pub fn new(src: &'a str, path: &'a Path) -> Self {
        let mut nlc = NewlineCache::new();
        nlc.feed(src);
        Self { src, path, nlc }
    }

    pub fn ordinal(v: usize) -> String {
        let suffix = match ((11..=13).contains(&(v % 100)), v % 10) {
            (false, 1) => "st",
            (false, 2) => "nd",
            (false, 3) => "rd",
            _ => "th",
        };
        format!("{v}{suffix}")
    }

    /// Returns "msg at path/file:5:6" if a (byte) span is given, otherwise "msg in path/file".
    pub fn file_location_msg(&self, msg: &str, span: Option<Span>) -> String {
        if let Some(span) = span {
            let (line, col) = self
                .nlc
                .byte_to_line_num_and_col_num(self.src, span.start())
                .unwrap_or((0, 0));
            format!("{} at {}:{line}:{col}", msg, self.path.display())
        } else {
            format!("{} in {}", msg, self.path.display())
        }
    }

    /// Convert a span of `char` indices (as reported by a parse over `src.chars()`) into a span
    /// of byte offsets.
    pub fn char_span_to_bytes(&self, span: Span) -> Span {
        let byte = |c| {
            self.src
                .char_indices()
                .nth(c)
                .map(|(i, _)| i)
                .unwrap_or(self.src.len())
        };
        Span::new(byte(span.start()), byte(span.end()))
    }

    /// Print the line number and source text of every line intersecting `span`, underlining the
    /// part of each covered by `span` with `underline_c`. `s` follows the last underline.
    pub fn underline_span_with_text(&self, span: Span, s: String, underline_c: char) -> String {
        self.prefixed_underline_span_with_text("", span, s, underline_c)
    }

    /// As [`underline_span_with_text`](Self::underline_span_with_text), but with `prefix`
    /// (at most 3 characters, normally `...` to mark a gap between lines) written in the line
    /// number column of the underline.
    pub fn prefixed_underline_span_with_text(
        &self,
        prefix: &str,
        mut span: Span,
        s: String,
        underline_c: char,
    ) -> String {
        assert!(prefix.len() <= "0| ".len());
        let mut out = String::new();
        let (start_byte, end_byte) = self.nlc.span_line_bytes(span);
        let text = &self.src[start_byte..end_byte];
        // An empty span at the very end of the text sits on an empty line.
        let lines = if text.is_empty() {
            vec![""]
        } else {
            text.lines().collect::<Vec<_>>()
        };
        let mut source_lines = lines.into_iter().peekable();
        while let Some(source_line) = source_lines.next() {
            let (line_start_byte, _) = self.nlc.span_line_bytes(span);
            let offset = span.start() - line_start_byte;
            let underline_span = Span::new(
                span.start(),
                span.end()
                    .min(span.start() + source_line.len().saturating_sub(offset)),
            );
            let line_num = self.nlc.byte_to_line_num(span.start()).unwrap_or(0);
            out.push_str(&format!("{}| {}\n", line_num, source_line));
            let line_num_digits = line_num.to_string().len();
            out.push_str(prefix);
            out.push_str(&" ".repeat(
                UnicodeWidthStr::width(&self.src[line_start_byte..underline_span.start()])
                    + (line_num_digits + "| ".len() - prefix.len()),
            ));
            let width =
                UnicodeWidthStr::width(&self.src[underline_span.start()..underline_span.end()]);
            // Empty spans still get a marker.
            out.push_str(&underline_c.to_string().repeat(width.max(1)));

            if source_lines.peek().is_none() {
                out.push_str(&format!(" {}", &s));
            } else {
                out.push('\n');
                span = Span::new(line_start_byte + source_line.len() + 1, span.end());
            }
        }
        out
    }

    /// Render an error from an EBNF grammar file (whose spans are byte offsets).
    pub fn format_spanned(&self, e: &impl Spanned) -> String {
        let mut out = String::new();
        let mut spans = e.spans().iter().enumerate().peekable();
        while let Some((span_num, span)) = spans.next() {
            let line = self.nlc.byte_to_line_num(span.start()).unwrap_or(0);
            let next_line = spans
                .peek()
                .map(|(_, s)| self.nlc.byte_to_line_num(s.start()).unwrap_or(line))
                .unwrap_or(line);
            let dots = if next_line > line + 1 { "..." } else { "" };
            if span_num == 0 {
                out.push_str(&self.prefixed_underline_span_with_text(
                    dots,
                    *span,
                    e.to_string(),
                    '^',
                ));
            } else {
                let s = match e.spanskind() {
                    SpansKind::DuplicationError => {
                        format!("{} occurrence", Self::ordinal(span_num + 1))
                    }
                    SpansKind::Error => {
                        unreachable!("Should contain a single span at the site of the error")
                    }
                };
                out.push('\n');
                out.push_str(&self.prefixed_underline_span_with_text(dots, *span, s, '-'));
            }
        }
        out
    }

    /// Render a parse error over this formatter's text.
    pub fn format_parse_error(&self, e: &ParseError) -> String {
        self.underline_span_with_text(
            self.char_span_to_bytes(e.span()),
            e.kind().to_string(),
            '^',
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pegpar::ErrorKind;
    use pegram::EbnfGrammar;
    use std::path::PathBuf;

    #[test]
    fn ordinals() {
        assert_eq!(
            [1, 2, 3, 4, 11, 12, 13, 21, 22, 101, 111]
                .iter()
                .map(|v| SpannedDiagnosticFormatter::ordinal(*v))
                .collect::<Vec<_>>(),
            vec![
                "1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "101st",
                "111th"
            ]
        );
    }

    #[test]
    fn duplicate_rule() {
        let src = "r = 'a';\nq = r;\nr = 'c';\n";
        let path = PathBuf::from("g.ebnf");
        let errs = EbnfGrammar::new(src).unwrap_err();
        assert_eq!(errs.len(), 1);
        let formatter = SpannedDiagnosticFormatter::new(src, &path);
        assert_eq!(
            formatter.file_location_msg("Error", errs[0].spans().first().copied()),
            "Error at g.ebnf:1:1"
        );
        assert_eq!(
            format!("\n{}", formatter.format_spanned(&errs[0])),
            r"
1| r = 'a';
...^ Duplicated rule
3| r = 'c';
   - 2nd occurrence"
        );
    }

    #[test]
    fn multiline_parse_error() {
        let src = "ab\ncd\n";
        let path = PathBuf::from("in");
        let formatter = SpannedDiagnosticFormatter::new(src, &path);
        let e = ParseError::new(ErrorKind::Syntax, Span::new(1, 4));
        assert_eq!(
            format!("\n{}", formatter.format_parse_error(&e)),
            r"
1| ab
    ^
2| cd
   ^ Syntax error"
        );
    }

    #[test]
    fn parse_error_at_end() {
        let src = "1 +\n";
        let path = PathBuf::from("in");
        let formatter = SpannedDiagnosticFormatter::new(src, &path);
        let e = ParseError::new(ErrorKind::Syntax, Span::new(4, 4));
        let bspan = formatter.char_span_to_bytes(e.span());
        assert_eq!(
            formatter.file_location_msg(&e.kind().to_string(), Some(bspan)),
            "Syntax error at in:2:1"
        );
        assert_eq!(formatter.format_parse_error(&e), "2| \n   ^ Syntax error");
    }

    #[test]
    fn parse_error_unicode() {
        let src = "λ€x";
        let path = PathBuf::from("t");
        let formatter = SpannedDiagnosticFormatter::new(src, &path);
        let e = ParseError::new(ErrorKind::User(3), Span::new(1, 2));
        let bspan = formatter.char_span_to_bytes(e.span());
        assert_eq!(bspan, Span::new(2, 5));
        assert_eq!(
            formatter.file_location_msg(&e.kind().to_string(), Some(bspan)),
            "User error 3 at t:1:2"
        );
        assert_eq!(
            formatter.format_parse_error(&e),
            "1| λ€x\n    ^ User error 3"
        );
    }
}
