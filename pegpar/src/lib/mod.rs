#![allow(clippy::cognitive_complexity)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! `pegpar` executes Parsing Expression Grammars built with
//! [`pegram`](https://crates.io/crates/pegram). It is a backtracking recursive descent parser
//! which supports direct and indirect left recursion, builds a tree of matches as it goes, and can
//! recover from syntax errors at grammar specified synchronisation points.
//!
//! ## Example
//!
//! A left recursive grammar for sums of digits:
//!
//! ```
//! use pegram::{GrammarBuilder, expr::{range, rule, term}};
//! use pegpar::RTParserBuilder;
//!
//! let mut gb = GrammarBuilder::<char>::new();
//! let add_t = gb.tag("Add");
//! let val_t = gb.tag("Val");
//! let add = gb.declare_rule("Add");
//! gb.define_rule(
//!     add,
//!     rule(add)
//!         .then(term('+'))
//!         .then(range('0', '9').tag(val_t))
//!         .tag(add_t)
//!         .or(range('0', '9').tag(val_t)),
//! )
//! .unwrap();
//! let grm = gb.build().unwrap();
//!
//! let input = "1+2+3".chars().collect::<Vec<_>>();
//! let res = RTParserBuilder::new(&grm).parse(&input);
//! assert!(res.success);
//! assert_eq!(
//!     res.nodes[0].pp(&grm, "1+2+3"),
//!     "Add\n    Add\n        Val: 1\n        Val: 2\n    Val: 3\n"
//! );
//! ```
//!
//! Most users will want to write grammars in EBNF (see [`pegram::ebnf`]) and parse them with a
//! [`FrontEnd`], which first turns characters into tokens and then tokens into an AST:
//!
//! ```
//! use pegram::EbnfGrammar;
//! use pegpar::FrontEnd;
//!
//! let grm = EbnfGrammar::new(
//!     "%num = '0'..'9'+ ; %_ws = ' '+ ; sum = sum '+' num | num ;",
//! )
//! .unwrap();
//! let src = "1 + 23".chars().collect::<Vec<_>>();
//! let res = FrontEnd::from_ebnf(&grm).parse(&src);
//! assert!(res.success);
//! assert_eq!(res.tokens.len(), 3);
//! assert_eq!(
//!     res.ast[0].pp(grm.ast_grammar(), &res.token_source(&src[..])),
//!     "sum\n    sum: 1\n"
//! );
//! ```
//!
//! Grammars are immutable and all the state of a parse lives in its [`ParseContext`], so a
//! grammar can be used by any number of parses at once, including on different threads.

mod cfe;
pub mod compare;
mod context;
mod errors;
pub mod node;
pub mod parser;

pub use crate::{
    cfe::{CfeResult, FrontEnd, Token, TokenSource},
    compare::{CaseInsensitive, DefaultComparator, SymbolComparator},
    context::{ParseContext, ParseState},
    errors::{ErrorKind, ParseError},
    node::{Node, NodeSource},
    parser::{ParseResult, Parser, RTParserBuilder},
};

pub use pegram::Span;
