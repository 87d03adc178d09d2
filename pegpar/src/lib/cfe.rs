//! A two stage front end. A character level grammar turns the source into tokens; a token level
//! grammar (whose symbols are the character level grammar's tags) then turns the tokens into an
//! AST.

use std::fmt::{self, Write};

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use pegram::{EbnfGrammar, Grammar, Span, TIdx};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ParseError,
    compare::{DefaultComparator, SymbolComparator},
    node::{Node, NodeSource},
    parser::Parser,
};

/// A token: a top-level match of a character level grammar.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token<StorageT> {
    pub tidx: TIdx<StorageT>,
    /// The span of the token in the source.
    pub span: Span,
}

impl<StorageT> Token<StorageT> {
    /// Return up to `max` symbols of the source this token covers.
    pub fn source_slice<S: NodeSource + ?Sized>(&self, src: &S, max: usize) -> String {
        let mut s = String::new();
        // Writing to a `String` cannot fail.
        src.write_span(&mut s, self.span, max).ok();
        s
    }
}

/// Convert a span over `tokens` to a span over the source they were made from. An empty span
/// after the last token maps to the end of the source.
fn source_span<StorageT>(tokens: &[Token<StorageT>], span: Span, src_len: usize) -> Span {
    let start = tokens
        .get(span.start())
        .map(|t| t.span.start())
        .unwrap_or(src_len);
    if span.is_empty() {
        return Span::new(start, start);
    }
    let end = tokens
        .get(span.end() - 1)
        .map(|t| t.span.end())
        .unwrap_or(src_len);
    Span::new(start, end.max(start))
}

/// Renders spans over tokens (such as those of AST [`Node`]s) as the source the tokens cover.
pub struct TokenSource<'a, StorageT, S: ?Sized> {
    tokens: &'a [Token<StorageT>],
    src: &'a S,
    src_len: usize,
}

impl<'a, StorageT, S: NodeSource + ?Sized> TokenSource<'a, StorageT, S> {
    /// `src_len` is the number of symbols in `src`.
    pub fn new(tokens: &'a [Token<StorageT>], src: &'a S, src_len: usize) -> Self {
        TokenSource {
            tokens,
            src,
            src_len,
        }
    }
}

impl<StorageT, S: NodeSource + ?Sized> NodeSource for TokenSource<'_, StorageT, S> {
    fn write_span(&self, w: &mut dyn Write, span: Span, max: usize) -> fmt::Result {
        self.src
            .write_span(w, source_span(self.tokens, span, self.src_len), max)
    }
}

/// The outcome of [`FrontEnd::parse`]. `N` is the type of AST nodes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CfeResult<StorageT, N> {
    /// Did both stages match all of their input?
    pub success: bool,
    pub tokens: Vec<Token<StorageT>>,
    /// The top-level AST nodes, whose spans are in terms of `tokens`.
    pub ast: Vec<N>,
    /// The errors from both stages, in terms of source positions, sorted by span.
    pub errors: Vec<ParseError>,
    src_len: usize,
}

impl<StorageT, N> CfeResult<StorageT, N> {
    /// Convert a span over [`tokens`](Self::tokens) into a span over the source.
    pub fn source_span(&self, token_span: Span) -> Span {
        source_span(&self.tokens, token_span, self.src_len)
    }

    /// Return a [`NodeSource`] which renders AST nodes using `src`.
    pub fn token_source<'a, S: NodeSource + ?Sized>(
        &'a self,
        src: &'a S,
    ) -> TokenSource<'a, StorageT, S> {
        TokenSource::new(&self.tokens, src, self.src_len)
    }
}

/// Runs a character level grammar and then a token level grammar over a source.
pub struct FrontEnd<'a, SymT, StorageT> {
    token_grm: &'a Grammar<SymT, StorageT>,
    ast_grm: &'a Grammar<TIdx<StorageT>, StorageT>,
    cmp: &'a dyn SymbolComparator<SymT>,
}

impl<'a, SymT: Ord, StorageT: 'static + PrimInt + Unsigned> FrontEnd<'a, SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(
        token_grm: &'a Grammar<SymT, StorageT>,
        ast_grm: &'a Grammar<TIdx<StorageT>, StorageT>,
    ) -> Self {
        FrontEnd {
            token_grm,
            ast_grm,
            cmp: &DefaultComparator,
        }
    }
}

impl<'a, StorageT: 'static + PrimInt + Unsigned> FrontEnd<'a, char, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a front end from the two grammars of an EBNF grammar.
    pub fn from_ebnf(grm: &'a EbnfGrammar<StorageT>) -> Self {
        FrontEnd::new(grm.token_grammar(), grm.ast_grammar())
    }
}

impl<'a, SymT, StorageT: 'static + PrimInt + Unsigned> FrontEnd<'a, SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Compare source symbols with the character level grammar's symbols using `cmp`.
    pub fn comparator(mut self, cmp: &'a dyn SymbolComparator<SymT>) -> Self {
        self.cmp = cmp;
        self
    }

    pub fn parse(&self, src: &[SymT]) -> CfeResult<StorageT, Node<StorageT>> {
        self.parse_with(src, |tidx, span, children| Node {
            tidx,
            span,
            children,
        })
    }

    /// Parse `src`, building the AST with `factory`, which is called with each AST node's tag,
    /// span (over tokens), and already built children.
    pub fn parse_with<N, F>(&self, src: &[SymT], mut factory: F) -> CfeResult<StorageT, N>
    where
        F: FnMut(TIdx<StorageT>, Span, Vec<N>) -> N,
    {
        let tok_res = Parser::new(self.token_grm, self.cmp).parse(src);
        let tokens = tok_res
            .nodes
            .iter()
            .map(|n| Token {
                tidx: n.tidx,
                span: n.span,
            })
            .collect::<Vec<_>>();
        debug!(tokens = tokens.len(), success = tok_res.success, "Tokenized");

        let tidxs = tokens.iter().map(|t| t.tidx).collect::<Vec<_>>();
        let ast_res = Parser::new(self.ast_grm, &DefaultComparator).parse(&tidxs);
        let mut errors = tok_res.errors;
        errors.extend(
            ast_res
                .errors
                .iter()
                .map(|e| ParseError::new(e.kind(), source_span(&tokens, e.span(), src.len()))),
        );
        errors.sort_by_key(|e| e.span());

        let ast = ast_res
            .nodes
            .into_iter()
            .map(|n| build(n, &mut factory))
            .collect();
        CfeResult {
            success: tok_res.success && ast_res.success,
            tokens,
            ast,
            errors,
            src_len: src.len(),
        }
    }
}

fn build<StorageT, N, F>(n: Node<StorageT>, factory: &mut F) -> N
where
    F: FnMut(TIdx<StorageT>, Span, Vec<N>) -> N,
{
    let children = n
        .children
        .into_iter()
        .map(|c| build(c, factory))
        .collect();
    factory(n.tidx, n.span, children)
}

#[cfg(test)]
mod test {
    use super::{FrontEnd, Token, source_span};
    use crate::ErrorKind;
    use pegram::{
        EbnfGrammar, GrammarBuilder, Span, TIdx,
        expr::{choice, one_or_more, range, rule, term, zero_or_more},
    };

    fn tok(s: usize, e: usize) -> Token<u32> {
        Token {
            tidx: TIdx(0),
            span: Span::new(s, e),
        }
    }

    #[test]
    fn test_source_span() {
        let toks = vec![tok(0, 2), tok(3, 4), tok(6, 9)];
        assert_eq!(source_span(&toks, Span::new(0, 2), 10), Span::new(0, 4));
        assert_eq!(source_span(&toks, Span::new(1, 3), 10), Span::new(3, 9));
        assert_eq!(source_span(&toks, Span::new(1, 1), 10), Span::new(3, 3));
        assert_eq!(source_span(&toks, Span::new(3, 3), 10), Span::new(10, 10));
    }

    #[test]
    fn test_token_source_slice() {
        let t = tok(4, 9);
        assert_eq!(t.source_slice("a = b + c", 32), "b + c");
        assert_eq!(t.source_slice("a = b + c", 2), "b ");
    }

    #[test]
    fn test_two_stages() {
        let grm = EbnfGrammar::new(
            "%id = 'a'..'z'+ ; %_ws = ' '+ ; call = id '(' [ id { ',' id } ] ')' ;",
        )
        .unwrap();
        let src = "f(x, yy)".chars().collect::<Vec<_>>();
        let r = FrontEnd::from_ebnf(&grm).parse(&src);
        assert!(r.success);
        assert!(r.errors.is_empty());
        let tg = grm.token_grammar();
        assert_eq!(
            r.tokens
                .iter()
                .map(|t| format!("{} {}", tg.tag_name(t.tidx), t.source_slice(&src[..], 8)))
                .collect::<Vec<_>>(),
            vec!["id f", "'(' (", "id x", "',' ,", "id yy", "')' )"]
        );
        assert_eq!(r.ast.len(), 1);
        assert_eq!(r.ast[0].span, Span::new(0, 6));
        assert_eq!(r.source_span(r.ast[0].span), Span::new(0, 8));
        assert_eq!(
            r.ast[0].pp(grm.ast_grammar(), &r.token_source(&src[..])),
            "call: f(x, yy)\n"
        );
    }

    #[test]
    fn test_errors_remapped() {
        let grm = EbnfGrammar::new("%id = 'a'..'z'+ ; %_ws = ' '+ ; pair = id id ;").unwrap();
        // Stage one fails at the `1`; stage two fails after the only token.
        let r = FrontEnd::from_ebnf(&grm).parse(&"ab 1".chars().collect::<Vec<_>>());
        assert!(!r.success);
        assert_eq!(
            r.errors
                .iter()
                .map(|e| (e.kind(), e.span()))
                .collect::<Vec<_>>(),
            vec![
                (ErrorKind::Syntax, Span::new(3, 4)),
                (ErrorKind::Syntax, Span::new(4, 4))
            ]
        );
    }

    #[test]
    fn test_ast_errors_remapped() {
        let mut tgb = GrammarBuilder::<char>::new();
        let id_t = tgb.tag("id");
        let eq_t = tgb.tag("=");
        let semi_t = tgb.tag(";");
        tgb.rule(
            "^",
            zero_or_more(choice(vec![
                range('a', 'z').tag(id_t),
                term('=').tag(eq_t),
                term(';').tag(semi_t),
                one_or_more(term(' ')),
            ])),
        )
        .unwrap();
        let tg = tgb.build().unwrap();

        let mut agb = GrammarBuilder::<TIdx<u32>>::new();
        let assign_t = agb.tag("ASSIGN");
        let prog = agb.declare_rule("prog");
        let stmt = agb.declare_rule("stmt");
        agb.define_rule(prog, zero_or_more(rule(stmt))).unwrap();
        agb.define_rule(
            stmt,
            term(id_t)
                .then(term(eq_t))
                .then(term(id_t))
                .tag(assign_t)
                .resume_at(term(semi_t)),
        )
        .unwrap();
        let ag = agb.build().unwrap();

        let src = "a = b ; c c ; d = e ;".chars().collect::<Vec<_>>();
        let r = FrontEnd::new(&tg, &ag).parse(&src);
        assert!(r.success);
        assert_eq!(r.tokens.len(), 11);
        // The bad statement's tokens are `c c`.
        assert_eq!(
            r.errors
                .iter()
                .map(|e| (e.kind(), e.span()))
                .collect::<Vec<_>>(),
            vec![(ErrorKind::Syntax, Span::new(8, 11))]
        );
        assert_eq!(
            r.ast
                .iter()
                .map(|n| (ag.tag_name(n.tidx), r.source_span(n.span)))
                .collect::<Vec<_>>(),
            vec![
                ("ASSIGN", Span::new(0, 5)),
                ("ASSIGN", Span::new(14, 19))
            ]
        );
    }

    #[test]
    fn test_factory() {
        #[derive(Debug, PartialEq)]
        struct Sexp(String);

        let grm = EbnfGrammar::new(
            "%num = '0'..'9'+ ; expr = sum ; sum = sum '+' prod | prod ; prod = num ;",
        )
        .unwrap();
        let src = "1+22+3".chars().collect::<Vec<_>>();
        let ag = grm.ast_grammar();
        let r = FrontEnd::from_ebnf(&grm).parse_with(&src, |tidx, _, children: Vec<Sexp>| {
            if children.is_empty() {
                Sexp(ag.tag_name(tidx).to_owned())
            } else {
                Sexp(format!(
                    "({} {})",
                    ag.tag_name(tidx),
                    children
                        .into_iter()
                        .map(|c| c.0)
                        .collect::<Vec<_>>()
                        .join(" ")
                ))
            }
        });
        assert!(r.success);
        assert_eq!(
            r.ast,
            vec![Sexp(
                "(expr (sum (sum (sum prod) prod) prod))".to_owned()
            )]
        );
    }
}
