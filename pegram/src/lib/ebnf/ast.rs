use indexmap::{IndexMap, IndexSet};

use super::parser::{EbnfGrammarError, EbnfGrammarErrorKind};
use crate::Span;

/// An expression as written in an EBNF grammar file. Names are unresolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EbnfExpr {
    Char(char, Span),
    String(String, Span),
    Range(char, char, Span),
    Any(Span),
    /// A bare name: a rule if one of that name exists, otherwise a token.
    Name(String, Span),
    /// A `%name` reference, which always denotes a token.
    Token(String, Span),
    Seq(Vec<EbnfExpr>),
    Choice(Vec<EbnfExpr>),
    ZeroOrMore(Box<EbnfExpr>),
    OneOrMore(Box<EbnfExpr>),
    Optional(Box<EbnfExpr>),
    /// `n * e`: exactly `n` repetitions of `e`.
    Repeat(Box<EbnfExpr>, usize),
    And(Box<EbnfExpr>),
    Not(Box<EbnfExpr>),
    Exclude(Box<EbnfExpr>, Box<EbnfExpr>),
}

impl EbnfExpr {
    /// Calls `f` on every sub-expression of `self` (including `self`) in pre-order.
    pub fn walk<'a, F: FnMut(&'a EbnfExpr)>(&'a self, f: &mut F) {
        f(self);
        match self {
            EbnfExpr::Char(..)
            | EbnfExpr::String(..)
            | EbnfExpr::Range(..)
            | EbnfExpr::Any(_)
            | EbnfExpr::Name(..)
            | EbnfExpr::Token(..) => (),
            EbnfExpr::Seq(es) | EbnfExpr::Choice(es) => {
                for e in es {
                    e.walk(f);
                }
            }
            EbnfExpr::ZeroOrMore(e)
            | EbnfExpr::OneOrMore(e)
            | EbnfExpr::Optional(e)
            | EbnfExpr::Repeat(e, _)
            | EbnfExpr::And(e)
            | EbnfExpr::Not(e) => e.walk(f),
            EbnfExpr::Exclude(e, ex) => {
                e.walk(f);
                ex.walk(f);
            }
        }
    }
}

/// A `name = expr ;` or `%name = expr ;` declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Decl {
    pub name: String,
    /// The span of the declared name (including any leading `%`).
    pub span: Span,
    pub body: EbnfExpr,
}

/// An EBNF grammar file as parsed, before name resolution.
#[derive(Debug, Default)]
pub struct GrammarAST {
    /// Token declarations in the order they were written.
    pub tokens: IndexMap<String, Decl>,
    /// Rule declarations in the order they were written.
    pub rules: IndexMap<String, Decl>,
}

impl GrammarAST {
    pub fn new() -> Self {
        GrammarAST::default()
    }

    /// The start rule: the first rule which no token refers to, directly or indirectly.
    pub fn start(&self) -> Option<&Decl> {
        let char_rules = self.char_rules();
        self.rules
            .iter()
            .find(|(n, _)| !char_rules.contains(n.as_str()))
            .map(|(_, d)| d)
    }

    /// Is `name` a token which produces no token when matched?
    pub fn is_skipped_token(name: &str) -> bool {
        name.starts_with('_')
    }

    /// The rules reachable from the start rule (start rule first). These are the rules which
    /// operate over tokens.
    pub fn parser_rules(&self) -> IndexSet<&str> {
        let mut seen = IndexSet::new();
        if let Some(d) = self.start() {
            seen.insert(d.name.as_str());
        }
        let mut i = 0;
        while i < seen.len() {
            let name = seen[i];
            self.rules[name].body.walk(&mut |e| {
                if let EbnfExpr::Name(n, _) = e {
                    if let Some((_, k, _)) = self.rules.get_full(n) {
                        seen.insert(k.as_str());
                    }
                }
            });
            i += 1;
        }
        seen
    }

    /// The rules reachable from token declarations. These are the rules which operate over
    /// characters.
    pub fn char_rules(&self) -> IndexSet<&str> {
        let mut seen = IndexSet::new();
        let mut todo = self.tokens.values().map(|d| &d.body).collect::<Vec<_>>();
        while let Some(body) = todo.pop() {
            body.walk(&mut |e| {
                if let EbnfExpr::Name(n, _) = e {
                    if let Some((_, k, d)) = self.rules.get_full(n) {
                        if seen.insert(k.as_str()) {
                            todo.push(&d.body);
                        }
                    }
                }
            });
        }
        seen
    }

    /// Check that every name refers to something, and that there is something to parse with.
    pub fn complete_and_validate(&self) -> Result<(), Vec<EbnfGrammarError>> {
        let mut errs = Vec::new();
        if self.start().is_none() {
            errs.push(EbnfGrammarError {
                kind: EbnfGrammarErrorKind::NoStartRule,
                spans: vec![Span::new(0, 0)],
            });
        }
        for d in self.tokens.values().chain(self.rules.values()) {
            d.body.walk(&mut |e| match e {
                EbnfExpr::Name(n, span)
                    if !self.rules.contains_key(n) && !self.tokens.contains_key(n) =>
                {
                    errs.push(EbnfGrammarError {
                        kind: EbnfGrammarErrorKind::UnknownRuleRef(n.clone()),
                        spans: vec![*span],
                    });
                }
                EbnfExpr::Token(n, span) if !self.tokens.contains_key(n) => {
                    errs.push(EbnfGrammarError {
                        kind: EbnfGrammarErrorKind::UnknownToken(n.clone()),
                        spans: vec![*span],
                    });
                }
                _ => (),
            });
        }
        for name in self.parser_rules() {
            self.rules[name].body.walk(&mut |e| {
                if let EbnfExpr::Range(_, _, span) = e {
                    errs.push(EbnfGrammarError {
                        kind: EbnfGrammarErrorKind::RangeOutsideToken,
                        spans: vec![*span],
                    });
                }
            });
        }
        if errs.is_empty() { Ok(()) } else { Err(errs) }
    }
}
