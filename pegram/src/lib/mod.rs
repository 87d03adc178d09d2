#![allow(clippy::cognitive_complexity)]
#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! A library for building and manipulating Parsing Expression Grammars (PEGs).
//!
//! Terminology used throughout:
//!
//!   * A *symbol* is one element of the input being parsed: normally a `char`, but any type can
//!     be used (e.g. the tags of a token stream).
//!   * An *expression* ([`Expr`]) describes how to match a sequence of symbols.
//!   * A *rule* maps a name to exactly one expression, its *body*. Rules are the only way
//!     expressions can refer to each other, and thus the only source of recursion.
//!   * A *tag* is the name given to a match node when an expression wrapped in [`Expr::Tag`]
//!     succeeds.
//!   * A *grammar* ([`Grammar`]) is an immutable arena of rules plus a table of tag names.
//!
//! pegram makes the following guarantees about grammars:
//!
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive).
//!   * Tags are numbered from `0` to `tags_len() - 1` (inclusive).
//!   * Every [`Expr::Rule`] and [`Expr::Tag`] in a grammar refers to a rule or tag that exists.
//!   * The StorageT type used to store rule and tag indices can be infallibly converted into
//!     usize (see [`RIdx`] and [`TIdx`]).
//!
//! Grammars can be built programmatically with a [`GrammarBuilder`] or read from an EBNF file
//! with [`EbnfGrammar::new()`](ebnf/struct.EbnfGrammar.html#method.new).

pub mod ebnf;
pub mod expr;
pub mod grammar;
mod idxnewtype;
pub mod newlinecache;
pub mod span;

pub use ebnf::EbnfGrammar;
pub use expr::{Expr, ResumePolicy};
pub use grammar::{Grammar, GrammarBuildError, GrammarBuildErrorKind, GrammarBuilder};
pub use newlinecache::NewlineCache;
pub use span::{Span, Spanned, SpansKind};

/// Types specifically for rule and tag indices.
pub use crate::idxnewtype::{RIdx, TIdx};
