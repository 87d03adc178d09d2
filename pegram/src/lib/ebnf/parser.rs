use std::{error::Error, fmt};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use super::ast::{Decl, EbnfExpr, GrammarAST};
use crate::{Span, Spanned, SpansKind, grammar::GrammarBuildErrorKind};

type EbnfResult<T> = Result<T, EbnfGrammarError>;

/// The various different possible EBNF grammar errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EbnfGrammarErrorKind {
    IllegalName,
    IllegalString,
    InvalidEscape,
    /// A `..` range whose bounds are not single characters, or whose lower bound is greater than
    /// its upper bound.
    InvalidRange,
    /// A repetition count which is too large or is not followed by `*`.
    InvalidRepetition,
    IncompleteComment,
    MissingAssignment,
    MissingTerminator,
    /// A group was not closed with the given delimiter.
    MissingDelimiter(char),
    ExpectedExpression,
    PrematureEnd,
    DuplicateRule,
    DuplicateToken,
    NoStartRule,
    UnknownRuleRef(String),
    UnknownToken(String),
    /// A character range used in a rule which is matched against tokens.
    RangeOutsideToken,
    /// The grammar could not be assembled.
    Build(GrammarBuildErrorKind),
}

/// Any error from reading an EBNF grammar returns an instance of this struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EbnfGrammarError {
    pub(crate) kind: EbnfGrammarErrorKind,
    /// Byte offsets into the grammar source. There is always at least one span.
    pub(crate) spans: Vec<Span>,
}

impl Error for EbnfGrammarError {}

impl fmt::Display for EbnfGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for EbnfGrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EbnfGrammarErrorKind::IllegalName => "Illegal name",
            EbnfGrammarErrorKind::IllegalString => "Illegal string",
            EbnfGrammarErrorKind::InvalidEscape => "Invalid escape sequence",
            EbnfGrammarErrorKind::InvalidRange => "Invalid character range",
            EbnfGrammarErrorKind::InvalidRepetition => "Invalid repetition",
            EbnfGrammarErrorKind::IncompleteComment => "Incomplete comment",
            EbnfGrammarErrorKind::MissingAssignment => "Missing '=', '::=' or ':'",
            EbnfGrammarErrorKind::MissingTerminator => "Missing ';'",
            EbnfGrammarErrorKind::MissingDelimiter(c) => {
                return write!(f, "Missing '{}'", c);
            }
            EbnfGrammarErrorKind::ExpectedExpression => "Expected an expression",
            EbnfGrammarErrorKind::PrematureEnd => "File ends prematurely",
            EbnfGrammarErrorKind::DuplicateRule => "Duplicated rule",
            EbnfGrammarErrorKind::DuplicateToken => "Duplicated token",
            EbnfGrammarErrorKind::NoStartRule => "No start rule specified",
            EbnfGrammarErrorKind::UnknownRuleRef(name) => {
                return write!(f, "Unknown reference to rule '{}'", name);
            }
            EbnfGrammarErrorKind::UnknownToken(name) => {
                return write!(f, "Unknown token '{}'", name);
            }
            EbnfGrammarErrorKind::RangeOutsideToken => {
                "Character ranges can only be used in tokens and the rules they reference"
            }
            EbnfGrammarErrorKind::Build(k) => return write!(f, "{}", k),
        };
        write!(f, "{}", s)
    }
}

impl EbnfGrammarError {
    pub fn kind(&self) -> &EbnfGrammarErrorKind {
        &self.kind
    }
}

impl Spanned for EbnfGrammarError {
    fn spans(&self) -> &[Span] {
        self.spans.as_slice()
    }

    fn spanskind(&self) -> SpansKind {
        match self.kind {
            EbnfGrammarErrorKind::DuplicateRule | EbnfGrammarErrorKind::DuplicateToken => {
                SpansKind::DuplicationError
            }
            _ => SpansKind::Error,
        }
    }
}

pub(crate) struct EbnfParser {
    src: String,
    ast: GrammarAST,
    /// The key is the span of the first declaration of a rule; the value contains one span for
    /// every later declaration of the same rule.
    duplicate_rule_spans: IndexMap<Span, Vec<Span>>,
    duplicate_token_spans: IndexMap<Span, Vec<Span>>,
}

lazy_static! {
    // Hyphens may appear inside names but not at either end, so `a - b` is an exclusion.
    static ref RE_NAME: Regex = Regex::new(r"^[a-zA-Z_](?:[a-zA-Z0-9_]|-[a-zA-Z0-9_])*").unwrap();
}

/// The actual parser is intended to be entirely opaque from outside users.
impl EbnfParser {
    pub(crate) fn new(src: String) -> EbnfParser {
        EbnfParser {
            src,
            ast: GrammarAST::new(),
            duplicate_rule_spans: IndexMap::new(),
            duplicate_token_spans: IndexMap::new(),
        }
    }

    pub(crate) fn parse(&mut self) -> Result<usize, Vec<EbnfGrammarError>> {
        // We pass around an index into the *bytes* of self.src. We guarantee that at all times
        // this points to the beginning of a UTF-8 character.
        let r = self.parse_decls(0);
        let mut errors = Vec::new();
        for (orig_span, spans) in &self.duplicate_token_spans {
            errors.push(EbnfGrammarError {
                kind: EbnfGrammarErrorKind::DuplicateToken,
                spans: std::iter::once(*orig_span).chain(spans.iter().copied()).collect(),
            });
        }
        for (orig_span, spans) in &self.duplicate_rule_spans {
            errors.push(EbnfGrammarError {
                kind: EbnfGrammarErrorKind::DuplicateRule,
                spans: std::iter::once(*orig_span).chain(spans.iter().copied()).collect(),
            });
        }
        match r {
            Err(e) => {
                errors.push(e);
                Err(errors)
            }
            Ok(_) if !errors.is_empty() => Err(errors),
            Ok(i) => Ok(i),
        }
    }

    pub(crate) fn ast(self) -> GrammarAST {
        self.ast
    }

    fn parse_decls(&mut self, mut i: usize) -> EbnfResult<usize> {
        i = self.parse_ws(i)?;
        while i < self.src.len() {
            i = self.parse_decl(i)?;
            i = self.parse_ws(i)?;
        }
        Ok(i)
    }

    fn parse_decl(&mut self, i: usize) -> EbnfResult<usize> {
        let (is_token, name_start) = match self.lookahead_is("%", i) {
            Some(j) => (true, j),
            None => (false, i),
        };
        let (j, name) = self.parse_name(name_start)?;
        let span = Span::new(i, j);
        let mut i = self.parse_ws(j)?;
        i = match self
            .lookahead_is("::=", i)
            .or_else(|| self.lookahead_is("=", i))
            .or_else(|| self.lookahead_is(":", i))
        {
            Some(j) => j,
            None => return Err(self.mk_error(EbnfGrammarErrorKind::MissingAssignment, i)),
        };
        i = self.parse_ws(i)?;
        let (j, body) = self.parse_choice(i)?;
        i = self.parse_ws(j)?;
        let j = match self.lookahead_is(";", i) {
            Some(j) => j,
            None if i == self.src.len() => {
                return Err(self.mk_error(EbnfGrammarErrorKind::PrematureEnd, i));
            }
            None => return Err(self.mk_error(EbnfGrammarErrorKind::MissingTerminator, i)),
        };
        let (decls, dups) = if is_token {
            (&mut self.ast.tokens, &mut self.duplicate_token_spans)
        } else {
            (&mut self.ast.rules, &mut self.duplicate_rule_spans)
        };
        match decls.get(&name) {
            Some(orig) => dups.entry(orig.span).or_default().push(span),
            None => {
                decls.insert(name.clone(), Decl { name, span, body });
            }
        }
        Ok(j)
    }

    fn parse_choice(&mut self, i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let (mut i, first) = self.parse_seq(i)?;
        let mut alts = vec![first];
        loop {
            let j = self.parse_ws(i)?;
            match self.lookahead_is("|", j) {
                Some(k) => {
                    let (k, e) = self.parse_seq(k)?;
                    alts.push(e);
                    i = k;
                }
                None => break,
            }
        }
        if alts.len() == 1 {
            Ok((i, alts.pop().unwrap()))
        } else {
            Ok((i, EbnfExpr::Choice(alts)))
        }
    }

    fn parse_seq(&mut self, mut i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let mut items = Vec::new();
        loop {
            let mut j = self.parse_ws(i)?;
            if j == self.src.len()
                || [";", "|", ")", "]", "}"]
                    .iter()
                    .any(|s| self.src[j..].starts_with(s))
            {
                break;
            }
            if !items.is_empty() {
                if let Some(k) = self.lookahead_is(",", j) {
                    j = self.parse_ws(k)?;
                }
            }
            let (k, e) = self.parse_exclude(j)?;
            items.push(e);
            i = k;
        }
        match items.len() {
            0 => {
                let j = self.parse_ws(i)?;
                if j == self.src.len() {
                    Err(self.mk_error(EbnfGrammarErrorKind::PrematureEnd, j))
                } else {
                    Err(self.mk_error(EbnfGrammarErrorKind::ExpectedExpression, j))
                }
            }
            1 => Ok((i, items.pop().unwrap())),
            _ => Ok((i, EbnfExpr::Seq(items))),
        }
    }

    fn parse_exclude(&mut self, i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let (i, e) = self.parse_unary(i)?;
        let j = self.parse_ws(i)?;
        match self.lookahead_is("-", j) {
            Some(k) => {
                let k = self.parse_ws(k)?;
                let (k, ex) = self.parse_unary(k)?;
                Ok((k, EbnfExpr::Exclude(Box::new(e), Box::new(ex))))
            }
            None => Ok((i, e)),
        }
    }

    /// Parse an atom with any number of prefix operators (including `n *`) before it and postfix
    /// operators immediately (i.e. without intervening whitespace) after it.
    fn parse_unary(&mut self, i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let digits = self.src[i..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.src.len() - i);
        if digits > 0 {
            let n = self.src[i..i + digits]
                .parse::<usize>()
                .map_err(|_| self.mk_error(EbnfGrammarErrorKind::InvalidRepetition, i))?;
            let j = self.parse_ws(i + digits)?;
            let j = match self.lookahead_is("*", j) {
                Some(j) => self.parse_ws(j)?,
                None => return Err(self.mk_error(EbnfGrammarErrorKind::InvalidRepetition, j)),
            };
            let (j, e) = self.parse_unary(j)?;
            return Ok((j, EbnfExpr::Repeat(Box::new(e), n)));
        }
        if let Some(c) = self.src[i..].chars().next() {
            if "?*+&!".contains(c) {
                let j = self.parse_ws(i + c.len_utf8())?;
                let (j, e) = self.parse_unary(j)?;
                return Ok((j, apply_op(c, e)));
            }
        }
        let (mut i, mut e) = self.parse_atom(i)?;
        while let Some(c) = self.src[i..].chars().next() {
            if !"?*+&!".contains(c) {
                break;
            }
            e = apply_op(c, e);
            i += c.len_utf8();
        }
        Ok((i, e))
    }

    fn parse_atom(&mut self, i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let c = match self.src[i..].chars().next() {
            Some(c) => c,
            None => return Err(self.mk_error(EbnfGrammarErrorKind::PrematureEnd, i)),
        };
        match c {
            '(' => self.parse_group(i, ')'),
            '[' => {
                let (j, e) = self.parse_group(i, ']')?;
                Ok((j, EbnfExpr::Optional(Box::new(e))))
            }
            '{' => {
                let (j, e) = self.parse_group(i, '}')?;
                Ok((j, EbnfExpr::ZeroOrMore(Box::new(e))))
            }
            '%' => {
                let (j, n) = self.parse_name(i + 1)?;
                Ok((j, EbnfExpr::Token(n, Span::new(i, j))))
            }
            '\'' | '"' => self.parse_literal(i),
            '_' if !self.src[i + 1..]
                .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok((i + 1, EbnfExpr::Any(Span::new(i, i + 1))))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let (j, n) = self.parse_name(i)?;
                Ok((j, EbnfExpr::Name(n, Span::new(i, j))))
            }
            _ => Err(self.mk_error(EbnfGrammarErrorKind::ExpectedExpression, i)),
        }
    }

    fn parse_group(&mut self, i: usize, close: char) -> EbnfResult<(usize, EbnfExpr)> {
        debug_assert!(close.len_utf8() == 1);
        let j = self.parse_ws(i + 1)?;
        let (j, e) = self.parse_choice(j)?;
        let j = self.parse_ws(j)?;
        if self.src[j..].starts_with(close) {
            Ok((j + 1, e))
        } else if j == self.src.len() {
            Err(self.mk_error(EbnfGrammarErrorKind::PrematureEnd, j))
        } else {
            Err(self.mk_error(EbnfGrammarErrorKind::MissingDelimiter(close), j))
        }
    }

    /// Parse a character or string literal, and a range if the literal is followed by `..`.
    fn parse_literal(&mut self, i: usize) -> EbnfResult<(usize, EbnfExpr)> {
        let (j, s) = self.parse_string(i)?;
        let k = self.parse_ws(j)?;
        if let Some(l) = self.lookahead_is("..", k) {
            let l = self.parse_ws(l)?;
            let (m, hi) = match self.src[l..].chars().next() {
                Some('\'') | Some('"') => self.parse_string(l)?,
                _ => return Err(self.mk_error(EbnfGrammarErrorKind::InvalidRange, l)),
            };
            let span = Span::new(i, m);
            let mut lo_cs = s.chars();
            let mut hi_cs = hi.chars();
            return match (lo_cs.next(), lo_cs.next(), hi_cs.next(), hi_cs.next()) {
                (Some(lo), None, Some(hi), None) if lo <= hi => {
                    Ok((m, EbnfExpr::Range(lo, hi, span)))
                }
                _ => Err(EbnfGrammarError {
                    kind: EbnfGrammarErrorKind::InvalidRange,
                    spans: vec![span],
                }),
            };
        }
        let span = Span::new(i, j);
        let mut cs = s.chars();
        match (cs.next(), cs.next()) {
            (Some(c), None) => Ok((j, EbnfExpr::Char(c, span))),
            _ => Ok((j, EbnfExpr::String(s, span))),
        }
    }

    fn parse_name(&self, i: usize) -> EbnfResult<(usize, String)> {
        match RE_NAME.find(&self.src[i..]) {
            Some(m) => {
                assert_eq!(m.start(), 0);
                Ok((i + m.end(), self.src[i..i + m.end()].to_string()))
            }
            None => Err(self.mk_error(EbnfGrammarErrorKind::IllegalName, i)),
        }
    }

    /// Parse a quoted string, allowing escape characters.
    fn parse_string(&mut self, i: usize) -> EbnfResult<(usize, String)> {
        let qc = match self.src[i..].chars().next() {
            Some(c @ '\'') | Some(c @ '"') => c,
            _ => return Err(self.mk_error(EbnfGrammarErrorKind::IllegalString, i)),
        };
        debug_assert!('"'.len_utf8() == 1 && '\''.len_utf8() == 1);
        let mut s = String::new();
        let mut j = i + 1;
        while let Some(c) = self.src[j..].chars().next() {
            match c {
                '\n' | '\r' => break,
                x if x == qc => return Ok((j + 1, s)),
                '\\' => {
                    let (k, esc) = self.parse_escape(j)?;
                    s.push(esc);
                    j = k;
                }
                _ => {
                    s.push(c);
                    j += c.len_utf8();
                }
            }
        }
        Err(EbnfGrammarError {
            kind: EbnfGrammarErrorKind::IllegalString,
            spans: vec![Span::new(i, j)],
        })
    }

    /// Parse the escape sequence starting with the backslash at `i`.
    fn parse_escape(&self, i: usize) -> EbnfResult<(usize, char)> {
        let err = || self.mk_error(EbnfGrammarErrorKind::InvalidEscape, i);
        let c = match self.src[i + 1..].chars().next() {
            Some(c) => c,
            None => return Err(err()),
        };
        let simple = match c {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\u{0B}'),
            '0' => Some('\0'),
            '"' | '\'' | '\\' => Some(c),
            _ => None,
        };
        if let Some(e) = simple {
            return Ok((i + 2, e));
        }
        let digits = match c {
            'x' => 2,
            'u' => 4,
            _ => return Err(err()),
        };
        let start = i + 2;
        let hex = self.src.get(start..start + digits).ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(|c| (start + digits, c))
            .ok_or_else(err)
    }

    /// Skip whitespace and `(* ... *)` comments from `i` onwards.
    fn parse_ws(&mut self, mut i: usize) -> EbnfResult<usize> {
        while let Some(c) = self.src[i..].chars().next() {
            if c.is_whitespace() {
                i += c.len_utf8();
            } else if self.src[i..].starts_with("(*") {
                match self.src[i + 2..].find("*)") {
                    Some(off) => i = i + 2 + off + 2,
                    None => {
                        return Err(EbnfGrammarError {
                            kind: EbnfGrammarErrorKind::IncompleteComment,
                            spans: vec![Span::new(i, self.src.len())],
                        });
                    }
                }
            } else {
                break;
            }
        }
        Ok(i)
    }

    fn lookahead_is(&self, s: &'static str, i: usize) -> Option<usize> {
        if self.src[i..].starts_with(s) {
            Some(i + s.len())
        } else {
            None
        }
    }

    fn mk_error(&self, k: EbnfGrammarErrorKind, off: usize) -> EbnfGrammarError {
        EbnfGrammarError {
            kind: k,
            spans: vec![Span::new(off, off)],
        }
    }
}

fn apply_op(op: char, e: EbnfExpr) -> EbnfExpr {
    let e = Box::new(e);
    match op {
        '?' => EbnfExpr::Optional(e),
        '*' => EbnfExpr::ZeroOrMore(e),
        '+' => EbnfExpr::OneOrMore(e),
        '&' => EbnfExpr::And(e),
        '!' => EbnfExpr::Not(e),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod test {
    use super::{
        super::ast::{EbnfExpr, GrammarAST},
        EbnfGrammarError, EbnfGrammarErrorKind, EbnfParser,
    };
    use crate::{Span, Spanned, SpansKind, newlinecache::NewlineCache};

    fn parse(s: &str) -> Result<GrammarAST, Vec<EbnfGrammarError>> {
        let mut ep = EbnfParser::new(s.to_string());
        ep.parse()?;
        Ok(ep.ast())
    }

    fn body<'a>(ast: &'a GrammarAST, n: &str) -> &'a EbnfExpr {
        match ast.rules.get(n) {
            Some(d) => &d.body,
            None => &ast.tokens[n].body,
        }
    }

    fn name(n: &str, start: usize) -> EbnfExpr {
        EbnfExpr::Name(n.to_owned(), Span::new(start, start + n.len()))
    }

    fn single_err(src: &str) -> EbnfGrammarError {
        let mut errs = parse(src).unwrap_err();
        assert_eq!(errs.len(), 1, "{:?}", errs);
        errs.pop().unwrap()
    }

    macro_rules! line_col {
        ($src:ident, $span: expr) => {{
            let mut line_cache = NewlineCache::new();
            line_cache.feed(&$src);
            line_cache
                .byte_to_line_num_and_col_num(&$src, $span.start())
                .unwrap()
        }};
    }

    #[test]
    fn test_rule_and_token() {
        let src = "%num = '0'..'9'+;\nsum = num '+' num;";
        let ast = parse(src).unwrap();
        assert_eq!(ast.tokens.len(), 1);
        assert_eq!(ast.tokens["num"].span, Span::new(0, 4));
        assert_eq!(
            body(&ast, "num"),
            &EbnfExpr::OneOrMore(Box::new(EbnfExpr::Range('0', '9', Span::new(7, 15))))
        );
        assert_eq!(
            body(&ast, "sum"),
            &EbnfExpr::Seq(vec![
                name("num", 24),
                EbnfExpr::Char('+', Span::new(28, 31)),
                name("num", 32),
            ])
        );
        assert_eq!(ast.start().unwrap().name, "sum");
    }

    #[test]
    fn test_assignment_forms() {
        let ast = parse("a ::= 'x'; b : 'y'; c = 'z';").unwrap();
        assert_eq!(
            ast.rules.keys().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_operators() {
        let ast = parse("r = !'a' b* | &c? , [d] {e} - 'x';").unwrap();
        let not_a = EbnfExpr::Not(Box::new(EbnfExpr::Char('a', Span::new(5, 8))));
        let b = EbnfExpr::ZeroOrMore(Box::new(name("b", 9)));
        let c = EbnfExpr::And(Box::new(EbnfExpr::Optional(Box::new(name("c", 15)))));
        let d = EbnfExpr::Optional(Box::new(name("d", 21)));
        let e = EbnfExpr::Exclude(
            Box::new(EbnfExpr::ZeroOrMore(Box::new(name("e", 25)))),
            Box::new(EbnfExpr::Char('x', Span::new(30, 33))),
        );
        assert_eq!(
            body(&ast, "r"),
            &EbnfExpr::Choice(vec![
                EbnfExpr::Seq(vec![not_a, b]),
                EbnfExpr::Seq(vec![c, d, e])
            ])
        );
    }

    #[test]
    fn test_prefix_and_postfix() {
        let ast = parse("r = *a b+;").unwrap();
        assert_eq!(
            body(&ast, "r"),
            &EbnfExpr::Seq(vec![
                EbnfExpr::ZeroOrMore(Box::new(name("a", 5))),
                EbnfExpr::OneOrMore(Box::new(name("b", 7))),
            ])
        );
    }

    #[test]
    fn test_any_and_names() {
        let ast = parse("r = _ _x my-rule %tok; _x = 'a'; my-rule = 'b'; %tok = 'c';").unwrap();
        assert_eq!(
            body(&ast, "r"),
            &EbnfExpr::Seq(vec![
                EbnfExpr::Any(Span::new(4, 5)),
                name("_x", 6),
                name("my-rule", 9),
                EbnfExpr::Token("tok".to_owned(), Span::new(17, 21)),
            ])
        );
    }

    #[test]
    fn test_escapes() {
        let ast = parse(r#"r = "a\n\t\"\\\x41é" '\'' '\0';"#).unwrap();
        match body(&ast, "r") {
            EbnfExpr::Seq(es) => {
                assert!(matches!(&es[0], EbnfExpr::String(s, _) if s == "a\n\t\"\\Aé"));
                assert!(matches!(es[1], EbnfExpr::Char('\'', _)));
                assert!(matches!(es[2], EbnfExpr::Char('\0', _)));
            }
            e => panic!("{:?}", e),
        }
        let e = single_err(r"r = 'a\q';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidEscape);
        assert_eq!(e.spans, vec![Span::new(6, 6)]);
        let e = single_err(r"r = '\x4';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidEscape);
    }

    #[test]
    fn test_comments() {
        let ast = parse("(* a comment *) r = (* another *) 'a' (* x *) ;").unwrap();
        assert_eq!(body(&ast, "r"), &EbnfExpr::Char('a', Span::new(34, 37)));
        let src = "r = 'a';\n(* unfinished";
        let e = single_err(src);
        assert_eq!(e.kind, EbnfGrammarErrorKind::IncompleteComment);
        assert_eq!(line_col!(src, e.spans[0]), (2, 1));
    }

    #[test]
    fn test_missing_pieces() {
        let e = single_err("r 'a';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::MissingAssignment);
        assert_eq!(e.spans, vec![Span::new(2, 2)]);
        let e = single_err("r = 'a' )");
        assert_eq!(e.kind, EbnfGrammarErrorKind::MissingTerminator);
        let e = single_err("r = 'a'");
        assert_eq!(e.kind, EbnfGrammarErrorKind::PrematureEnd);
        let e = single_err("r = ('a' | 'b';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::MissingDelimiter(')'));
        let e = single_err("r = ;");
        assert_eq!(e.kind, EbnfGrammarErrorKind::ExpectedExpression);
        let e = single_err("r = 'a' | ;");
        assert_eq!(e.kind, EbnfGrammarErrorKind::ExpectedExpression);
        let e = single_err("1r = 'a';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::IllegalName);
        let e = single_err("r = 'abc\n';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::IllegalString);
        assert_eq!(e.spans, vec![Span::new(4, 8)]);
    }

    #[test]
    fn test_repeat() {
        let ast = parse("r = 3 * 'a'+ 'b' ; q = 2*(r | 'c') ;").unwrap();
        match body(&ast, "r") {
            EbnfExpr::Seq(es) => match &es[0] {
                EbnfExpr::Repeat(e, 3) => assert!(matches!(**e, EbnfExpr::OneOrMore(_))),
                e => panic!("{:?}", e),
            },
            e => panic!("{:?}", e),
        }
        assert!(matches!(
            body(&ast, "q"),
            EbnfExpr::Repeat(e, 2) if matches!(**e, EbnfExpr::Choice(_))
        ));
        let e = single_err("r = 3 'a' ;");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidRepetition);
        assert_eq!(e.spans, vec![Span::new(6, 6)]);
        let e = single_err("r = 99999999999999999999999 * 'a' ;");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidRepetition);
    }

    #[test]
    fn test_ranges() {
        let e = single_err("%t = 'z'..'a';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidRange);
        assert_eq!(e.spans, vec![Span::new(5, 13)]);
        let e = single_err("%t = 'ab'..'z';");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidRange);
        let e = single_err("%t = 'a'..z;");
        assert_eq!(e.kind, EbnfGrammarErrorKind::InvalidRange);
        let ast = parse("%t = 'a' .. \"f\";").unwrap();
        assert!(matches!(body(&ast, "t"), EbnfExpr::Range('a', 'f', _)));
    }

    #[test]
    fn test_duplicates() {
        let src = "r = 'a';\n%t = 'b';\nr = 'c';\n%t = 'd';\nr = 'e';";
        let errs = parse(src).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].kind, EbnfGrammarErrorKind::DuplicateToken);
        assert_eq!(errs[0].spans(), &[Span::new(9, 11), Span::new(28, 30)]);
        assert_eq!(errs[1].kind, EbnfGrammarErrorKind::DuplicateRule);
        assert_eq!(errs[1].spanskind(), SpansKind::DuplicationError);
        assert_eq!(
            errs[1]
                .spans()
                .iter()
                .map(|s| line_col!(src, s))
                .collect::<Vec<_>>(),
            vec![(1, 1), (3, 1), (5, 1)]
        );
    }
}
