use std::fmt::{self, Debug, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{RIdx, TIdx};

/// Where parsing continues after an [`Expr::ErrorResume`] has found its synchronisation point.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResumePolicy {
    /// Continue immediately before the synchronisation point, which is left unconsumed.
    SkipTo,
    /// Continue immediately after the synchronisation point.
    #[default]
    SkipAfter,
}

/// A parsing expression over symbols of type `SymT`.
///
/// Expressions are plain values: they have no identity and are immutable once built. Recursion is
/// only possible through [`Expr::Rule`], which refers to a rule in a
/// [`Grammar`](crate::Grammar)'s arena by handle.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr<SymT, StorageT = u32> {
    /// Matches one symbol equal to the given symbol.
    Terminal(SymT),
    /// Matches each of the given symbols in order.
    String(Vec<SymT>),
    /// Matches one symbol in the inclusive range `[lo, hi]`.
    Range(SymT, SymT),
    /// Matches one symbol that is a member of the set.
    Set(Vec<SymT>),
    /// Matches any one symbol.
    Any,
    /// Matches (without consuming anything) only at the end of the input.
    End,
    Seq(Vec<Expr<SymT, StorageT>>),
    /// Ordered choice: the first alternative to succeed wins.
    Choice(Vec<Expr<SymT, StorageT>>),
    /// Longest match: every alternative is tried and the one which consumes the most input wins,
    /// with ties going to the earliest.
    Longest(Vec<Expr<SymT, StorageT>>),
    /// Matches the child exactly `n` times in sequence.
    Repeat(Box<Expr<SymT, StorageT>>, usize),
    ZeroOrMore(Box<Expr<SymT, StorageT>>),
    OneOrMore(Box<Expr<SymT, StorageT>>),
    Optional(Box<Expr<SymT, StorageT>>),
    /// Positive lookahead.
    And(Box<Expr<SymT, StorageT>>),
    /// Negative lookahead.
    Not(Box<Expr<SymT, StorageT>>),
    Rule(RIdx<StorageT>),
    /// If the child matches, record a match node labelled with the tag whose children are the
    /// match nodes the child produced.
    Tag(Box<Expr<SymT, StorageT>>, TIdx<StorageT>),
    /// Parse `primary` then `sync`. If either fails, skip input until `sync` matches, recording
    /// a committed syntax error over the skipped input.
    ErrorResume {
        primary: Box<Expr<SymT, StorageT>>,
        sync: Box<Expr<SymT, StorageT>>,
        policy: ResumePolicy,
    },
    /// Record a user defined error with the given `code` and succeed. If `skip` is given, input is
    /// skipped up to (but not including) the first place `skip` matches and the error covers the
    /// skipped input.
    Error {
        code: u16,
        skip: Option<Box<Expr<SymT, StorageT>>>,
    },
}

pub fn term<SymT, StorageT>(sym: SymT) -> Expr<SymT, StorageT> {
    Expr::Terminal(sym)
}

pub fn string<SymT, StorageT, I: IntoIterator<Item = SymT>>(syms: I) -> Expr<SymT, StorageT> {
    Expr::String(syms.into_iter().collect())
}

pub fn range<SymT, StorageT>(lo: SymT, hi: SymT) -> Expr<SymT, StorageT> {
    Expr::Range(lo, hi)
}

/// A set of symbols. The set is stored sorted and without duplicates.
pub fn set<SymT: Ord, StorageT, I: IntoIterator<Item = SymT>>(syms: I) -> Expr<SymT, StorageT> {
    let mut v = syms.into_iter().collect::<Vec<_>>();
    v.sort();
    v.dedup();
    Expr::Set(v)
}

pub fn any<SymT, StorageT>() -> Expr<SymT, StorageT> {
    Expr::Any
}

pub fn end<SymT, StorageT>() -> Expr<SymT, StorageT> {
    Expr::End
}

pub fn seq<SymT, StorageT>(exprs: Vec<Expr<SymT, StorageT>>) -> Expr<SymT, StorageT> {
    Expr::Seq(exprs)
}

pub fn choice<SymT, StorageT>(exprs: Vec<Expr<SymT, StorageT>>) -> Expr<SymT, StorageT> {
    Expr::Choice(exprs)
}

pub fn longest<SymT, StorageT>(exprs: Vec<Expr<SymT, StorageT>>) -> Expr<SymT, StorageT> {
    Expr::Longest(exprs)
}

pub fn repeat<SymT, StorageT>(e: Expr<SymT, StorageT>, n: usize) -> Expr<SymT, StorageT> {
    Expr::Repeat(Box::new(e), n)
}

pub fn zero_or_more<SymT, StorageT>(e: Expr<SymT, StorageT>) -> Expr<SymT, StorageT> {
    Expr::ZeroOrMore(Box::new(e))
}

pub fn one_or_more<SymT, StorageT>(e: Expr<SymT, StorageT>) -> Expr<SymT, StorageT> {
    Expr::OneOrMore(Box::new(e))
}

pub fn optional<SymT, StorageT>(e: Expr<SymT, StorageT>) -> Expr<SymT, StorageT> {
    Expr::Optional(Box::new(e))
}

pub fn and<SymT, StorageT>(e: Expr<SymT, StorageT>) -> Expr<SymT, StorageT> {
    Expr::And(Box::new(e))
}

pub fn not<SymT, StorageT>(e: Expr<SymT, StorageT>) -> Expr<SymT, StorageT> {
    Expr::Not(Box::new(e))
}

/// Matches `e` provided that `excluded` does not match at the same position.
pub fn exclude<SymT, StorageT>(
    e: Expr<SymT, StorageT>,
    excluded: Expr<SymT, StorageT>,
) -> Expr<SymT, StorageT> {
    Expr::Seq(vec![not(excluded), e])
}

pub fn rule<SymT, StorageT>(ridx: RIdx<StorageT>) -> Expr<SymT, StorageT> {
    Expr::Rule(ridx)
}

pub fn tag<SymT, StorageT>(e: Expr<SymT, StorageT>, tidx: TIdx<StorageT>) -> Expr<SymT, StorageT> {
    Expr::Tag(Box::new(e), tidx)
}

pub fn error_resume<SymT, StorageT>(
    primary: Expr<SymT, StorageT>,
    sync: Expr<SymT, StorageT>,
    policy: ResumePolicy,
) -> Expr<SymT, StorageT> {
    Expr::ErrorResume {
        primary: Box::new(primary),
        sync: Box::new(sync),
        policy,
    }
}

pub fn error<SymT, StorageT>(code: u16, skip: Option<Expr<SymT, StorageT>>) -> Expr<SymT, StorageT> {
    Expr::Error {
        code,
        skip: skip.map(Box::new),
    }
}

impl<SymT, StorageT> Expr<SymT, StorageT> {
    /// Sequence `self` followed by `next`. Nested sequences are flattened.
    pub fn then(self, next: Expr<SymT, StorageT>) -> Self {
        match self {
            Expr::Seq(mut v) => {
                v.push(next);
                Expr::Seq(v)
            }
            e => Expr::Seq(vec![e, next]),
        }
    }

    /// Ordered choice of `self` then `alt`. Nested choices are flattened.
    pub fn or(self, alt: Expr<SymT, StorageT>) -> Self {
        match self {
            Expr::Choice(mut v) => {
                v.push(alt);
                Expr::Choice(v)
            }
            e => Expr::Choice(vec![e, alt]),
        }
    }

    pub fn many(self) -> Self {
        zero_or_more(self)
    }

    pub fn many1(self) -> Self {
        one_or_more(self)
    }

    pub fn opt(self) -> Self {
        optional(self)
    }

    pub fn tag(self, tidx: TIdx<StorageT>) -> Self {
        tag(self, tidx)
    }

    /// Recover from errors in `self` by skipping past `sync` (see [`Expr::ErrorResume`]).
    pub fn resume_at(self, sync: Expr<SymT, StorageT>) -> Self {
        error_resume(self, sync, ResumePolicy::SkipAfter)
    }

    /// Recover from errors in `self` by skipping to, but not past, `sync`.
    pub fn resume_before(self, sync: Expr<SymT, StorageT>) -> Self {
        error_resume(self, sync, ResumePolicy::SkipTo)
    }

    /// Calls `f` on every sub-expression of `self` (including `self`) in pre-order.
    pub fn walk<'a, F: FnMut(&'a Expr<SymT, StorageT>)>(&'a self, f: &mut F) {
        f(self);
        match self {
            Expr::Terminal(_)
            | Expr::String(_)
            | Expr::Range(..)
            | Expr::Set(_)
            | Expr::Any
            | Expr::End
            | Expr::Rule(_)
            | Expr::Error { skip: None, .. } => (),
            Expr::Seq(es) | Expr::Choice(es) | Expr::Longest(es) => {
                for e in es {
                    e.walk(f);
                }
            }
            Expr::Repeat(e, _)
            | Expr::ZeroOrMore(e)
            | Expr::OneOrMore(e)
            | Expr::Optional(e)
            | Expr::And(e)
            | Expr::Not(e)
            | Expr::Tag(e, _)
            | Expr::Error { skip: Some(e), .. } => e.walk(f),
            Expr::ErrorResume { primary, sync, .. } => {
                primary.walk(f);
                sync.walk(f);
            }
        }
    }
}

impl<SymT: Debug, StorageT: Copy> Expr<SymT, StorageT> {
    /// Write `self` in an EBNF-like notation, using `rn` and `tn` to name rules and tags.
    pub fn write_with<W: Write>(
        &self,
        w: &mut W,
        rn: &dyn Fn(RIdx<StorageT>) -> String,
        tn: &dyn Fn(TIdx<StorageT>) -> String,
    ) -> fmt::Result {
        match self {
            Expr::Terminal(s) => write!(w, "{:?}", s),
            Expr::String(syms) => {
                w.write_char('<')?;
                for (i, s) in syms.iter().enumerate() {
                    if i > 0 {
                        w.write_char(' ')?;
                    }
                    write!(w, "{:?}", s)?;
                }
                w.write_char('>')
            }
            Expr::Range(lo, hi) => write!(w, "{:?}..{:?}", lo, hi),
            Expr::Set(syms) => {
                w.write_str("set(")?;
                for (i, s) in syms.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    write!(w, "{:?}", s)?;
                }
                w.write_char(')')
            }
            Expr::Any => w.write_char('_'),
            Expr::End => w.write_char('$'),
            Expr::Seq(es) => {
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        w.write_char(' ')?;
                    }
                    e.write_operand(w, rn, tn, matches!(e, Expr::Choice(_)))?;
                }
                Ok(())
            }
            Expr::Choice(es) => {
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        w.write_str(" | ")?;
                    }
                    e.write_with(w, rn, tn)?;
                }
                Ok(())
            }
            Expr::Longest(es) => {
                w.write_str("longest(")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    e.write_with(w, rn, tn)?;
                }
                w.write_char(')')
            }
            Expr::Repeat(e, n) => {
                write!(w, "{} * ", n)?;
                e.write_operand(w, rn, tn, e.is_compound())
            }
            Expr::ZeroOrMore(e) => self.write_postfix(w, rn, tn, e, '*'),
            Expr::OneOrMore(e) => self.write_postfix(w, rn, tn, e, '+'),
            Expr::Optional(e) => self.write_postfix(w, rn, tn, e, '?'),
            Expr::And(e) => {
                w.write_char('&')?;
                e.write_operand(w, rn, tn, e.is_compound())
            }
            Expr::Not(e) => {
                w.write_char('!')?;
                e.write_operand(w, rn, tn, e.is_compound())
            }
            Expr::Rule(ridx) => w.write_str(&rn(*ridx)),
            Expr::Tag(e, tidx) => {
                e.write_operand(w, rn, tn, true)?;
                write!(w, "->{}", tn(*tidx))
            }
            Expr::ErrorResume {
                primary,
                sync,
                policy,
            } => {
                let name = match policy {
                    ResumePolicy::SkipAfter => "resume",
                    ResumePolicy::SkipTo => "resume_before",
                };
                write!(w, "{}(", name)?;
                primary.write_with(w, rn, tn)?;
                w.write_str(", ")?;
                sync.write_with(w, rn, tn)?;
                w.write_char(')')
            }
            Expr::Error { code, skip } => {
                write!(w, "error({}", code)?;
                if let Some(e) = skip {
                    w.write_str(", ")?;
                    e.write_with(w, rn, tn)?;
                }
                w.write_char(')')
            }
        }
    }

    fn is_compound(&self) -> bool {
        matches!(
            self,
            Expr::Seq(_)
                | Expr::Choice(_)
                | Expr::Repeat(..)
                | Expr::ZeroOrMore(_)
                | Expr::OneOrMore(_)
                | Expr::Optional(_)
                | Expr::And(_)
                | Expr::Not(_)
                | Expr::Tag(..)
        )
    }

    fn write_operand<W: Write>(
        &self,
        w: &mut W,
        rn: &dyn Fn(RIdx<StorageT>) -> String,
        tn: &dyn Fn(TIdx<StorageT>) -> String,
        parens: bool,
    ) -> fmt::Result {
        if parens {
            w.write_char('(')?;
            self.write_with(w, rn, tn)?;
            w.write_char(')')
        } else {
            self.write_with(w, rn, tn)
        }
    }

    fn write_postfix<W: Write>(
        &self,
        w: &mut W,
        rn: &dyn Fn(RIdx<StorageT>) -> String,
        tn: &dyn Fn(TIdx<StorageT>) -> String,
        e: &Expr<SymT, StorageT>,
        op: char,
    ) -> fmt::Result {
        e.write_operand(w, rn, tn, e.is_compound())?;
        w.write_char(op)
    }
}

impl<SymT: Debug, StorageT: Copy + fmt::Display> fmt::Display for Expr<SymT, StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_with(
            f,
            &|ridx: RIdx<StorageT>| format!("r{}", ridx.0),
            &|tidx: TIdx<StorageT>| format!("t{}", tidx.0),
        )
    }
}
