//! Reading grammars written in EBNF.
//!
//! An EBNF grammar file describes a two-stage parser. Declarations of the form `%name = expr ;`
//! define *tokens*, which are matched against characters; declarations of the form
//! `name = expr ;` define *rules*. The first rule which no token refers to is the start rule, and
//! it and every rule it (transitively) references are matched against the token stream. Rules
//! referenced only from tokens are matched against characters. For example:
//!
//! ```text
//! (* A calculator *)
//! %num = '0'..'9'+ ;
//! %_ws = { ' ' | '\t' | '\n' }+ ;
//! expr = expr '+' term | term ;
//! term = term '*' factor | factor ;
//! factor = '(' expr ')' | num ;
//! ```
//!
//! String and character literals used in rules (`'+'`, `'('` and so on above) become implicit
//! tokens, named by their quoted text. At each position the longest matching token is taken. On
//! a tie literals win, then tokens in the order they were declared. Tokens whose name begins with
//! `_` are matched but do not produce a token, which is how whitespace and comments are
//! discarded.
//!
//! Operators: `|` ordered choice; juxtaposition or `,` sequence; `a - b` matches `a` where `b`
//! does not match; prefix or (immediately) postfix `?` optional, `*` zero or more, `+` one or
//! more, `&` positive lookahead, `!` negative lookahead; `n * e` exactly `n` repetitions of `e`;
//! `( )` grouping, `[ ]` optional group,
//! `{ }` repetition group; `'a'..'z'` character range (tokens only); `_` any single symbol.
//! Literals support the escapes `\n \r \t \v \0 \" \' \\ \xHH \uHHHH`. Comments are written
//! `(* ... *)`.

use indexmap::{IndexMap, IndexSet};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    Span, TIdx,
    expr::{self, Expr},
    grammar::{Grammar, GrammarBuilder},
};

pub mod ast;
mod parser;

pub use parser::{EbnfGrammarError, EbnfGrammarErrorKind};

use self::{
    ast::{EbnfExpr, GrammarAST},
    parser::EbnfParser,
};

/// The name given to the start rule of a token grammar.
pub const TOKENS_RULE: &str = "^";

/// A grammar read from EBNF: a character level grammar producing tokens and a token level grammar
/// producing an AST. The token level grammar's symbols are the token grammar's tags.
#[derive(Clone, Debug)]
pub struct EbnfGrammar<StorageT = u32> {
    token_grm: Grammar<char, StorageT>,
    ast_grm: Grammar<TIdx<StorageT>, StorageT>,
}

impl EbnfGrammar<u32> {
    pub fn new(src: &str) -> Result<Self, Vec<EbnfGrammarError>> {
        EbnfGrammar::new_with_storaget(src)
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> EbnfGrammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Read the EBNF grammar `src`.
    pub fn new_with_storaget(src: &str) -> Result<Self, Vec<EbnfGrammarError>> {
        let mut ep = EbnfParser::new(src.to_string());
        ep.parse()?;
        let ast = ep.ast();
        ast.complete_and_validate()?;
        Lowering::new(&ast).lower()
    }

    /// The grammar which turns characters into tokens.
    pub fn token_grammar(&self) -> &Grammar<char, StorageT> {
        &self.token_grm
    }

    /// The grammar which turns tokens into an AST.
    pub fn ast_grammar(&self) -> &Grammar<TIdx<StorageT>, StorageT> {
        &self.ast_grm
    }
}

fn build_error(e: crate::grammar::GrammarBuildError) -> Vec<EbnfGrammarError> {
    vec![EbnfGrammarError {
        kind: EbnfGrammarErrorKind::Build(e.kind),
        spans: vec![Span::new(0, 0)],
    }]
}

struct Lowering<'a, StorageT> {
    ast: &'a GrammarAST,
    parser_rules: IndexSet<&'a str>,
    /// The text of each implicit token, in the order first seen.
    literals: Vec<String>,
    tok_gb: GrammarBuilder<char, StorageT>,
    /// Maps token names (explicit tokens unadorned, implicit tokens quoted) to their tags.
    tok_tags: IndexMap<String, TIdx<StorageT>>,
}

impl<'a, StorageT: 'static + PrimInt + Unsigned> Lowering<'a, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn new(ast: &'a GrammarAST) -> Self {
        let parser_rules = ast.parser_rules();
        let mut literals = IndexSet::new();
        for n in &parser_rules {
            ast.rules[*n].body.walk(&mut |e| match e {
                EbnfExpr::Char(c, _) => {
                    literals.insert(c.to_string());
                }
                EbnfExpr::String(s, _) if !s.is_empty() => {
                    literals.insert(s.clone());
                }
                _ => (),
            });
        }
        Lowering {
            ast,
            parser_rules,
            literals: literals.into_iter().collect(),
            tok_gb: GrammarBuilder::new(),
            tok_tags: IndexMap::new(),
        }
    }

    fn lower(mut self) -> Result<EbnfGrammar<StorageT>, Vec<EbnfGrammarError>> {
        let ast = self.ast;
        let start = self.tok_gb.declare_rule(TOKENS_RULE);
        let mut alts = Vec::new();
        for lit in &self.literals {
            let tidx = self.tok_gb.tag(&literal_name(lit));
            self.tok_tags.insert(literal_name(lit), tidx);
            let mut cs = lit.chars();
            let e = match (cs.next(), cs.next()) {
                (Some(c), None) => expr::term(c),
                _ => expr::string(lit.chars()),
            };
            alts.push(expr::tag(e, tidx));
        }
        for name in ast.tokens.keys() {
            let ridx = self.tok_gb.declare_rule(&token_rule_name(name));
            if GrammarAST::is_skipped_token(name) {
                alts.push(expr::rule(ridx));
            } else {
                let tidx = self.tok_gb.tag(name);
                self.tok_tags.insert(name.clone(), tidx);
                alts.push(expr::tag(expr::rule(ridx), tidx));
            }
        }
        // The longest token wins. On a tie literals beat explicit tokens, which beat each other in
        // declaration order.
        self.tok_gb
            .define_rule(start, expr::zero_or_more(expr::longest(alts)))
            .map_err(build_error)?;
        for (name, d) in &ast.tokens {
            let ridx = self.tok_gb.declare_rule(&token_rule_name(name));
            let body = self.lower_chars(&d.body);
            self.tok_gb.define_rule(ridx, body).map_err(build_error)?;
        }
        for name in ast.char_rules() {
            let ridx = self.tok_gb.declare_rule(name);
            let body = self.lower_chars(&ast.rules[name].body);
            self.tok_gb.define_rule(ridx, body).map_err(build_error)?;
        }

        let mut ast_gb = GrammarBuilder::<TIdx<StorageT>, StorageT>::new();
        for &name in &self.parser_rules {
            ast_gb.declare_rule(name);
        }
        for &name in &self.parser_rules {
            let body = self.lower_tokens(&mut ast_gb, &ast.rules[name].body);
            let tidx = ast_gb.tag(name);
            let ridx = ast_gb.declare_rule(name);
            ast_gb
                .define_rule(ridx, expr::tag(body, tidx))
                .map_err(build_error)?;
        }

        Ok(EbnfGrammar {
            token_grm: self.tok_gb.build().map_err(build_error)?,
            ast_grm: ast_gb.build().map_err(build_error)?,
        })
    }

    /// Lower an expression matched against characters.
    fn lower_chars(&mut self, e: &EbnfExpr) -> Expr<char, StorageT> {
        match e {
            EbnfExpr::Char(c, _) => expr::term(*c),
            EbnfExpr::String(s, _) => expr::string(s.chars()),
            EbnfExpr::Range(lo, hi, _) => expr::range(*lo, *hi),
            EbnfExpr::Any(_) => expr::any(),
            EbnfExpr::Name(n, _) => {
                if self.ast.rules.contains_key(n) {
                    expr::rule(self.tok_gb.declare_rule(n))
                } else {
                    expr::rule(self.tok_gb.declare_rule(&token_rule_name(n)))
                }
            }
            EbnfExpr::Token(n, _) => expr::rule(self.tok_gb.declare_rule(&token_rule_name(n))),
            EbnfExpr::Seq(es) => expr::seq(es.iter().map(|e| self.lower_chars(e)).collect()),
            EbnfExpr::Choice(es) => expr::choice(es.iter().map(|e| self.lower_chars(e)).collect()),
            EbnfExpr::ZeroOrMore(e) => expr::zero_or_more(self.lower_chars(e)),
            EbnfExpr::OneOrMore(e) => expr::one_or_more(self.lower_chars(e)),
            EbnfExpr::Optional(e) => expr::optional(self.lower_chars(e)),
            EbnfExpr::Repeat(e, n) => expr::repeat(self.lower_chars(e), *n),
            EbnfExpr::And(e) => expr::and(self.lower_chars(e)),
            EbnfExpr::Not(e) => expr::not(self.lower_chars(e)),
            EbnfExpr::Exclude(e, ex) => {
                let e = self.lower_chars(e);
                expr::exclude(e, self.lower_chars(ex))
            }
        }
    }

    /// Lower an expression matched against tokens.
    fn lower_tokens(
        &self,
        gb: &mut GrammarBuilder<TIdx<StorageT>, StorageT>,
        e: &EbnfExpr,
    ) -> Expr<TIdx<StorageT>, StorageT> {
        match e {
            EbnfExpr::Char(c, _) => expr::term(self.tok_tags[&literal_name(&c.to_string())]),
            EbnfExpr::String(s, _) if s.is_empty() => expr::seq(vec![]),
            EbnfExpr::String(s, _) => expr::term(self.tok_tags[&literal_name(s)]),
            EbnfExpr::Range(..) => unreachable!("Rejected by GrammarAST::complete_and_validate"),
            EbnfExpr::Any(_) => expr::any(),
            EbnfExpr::Name(n, _) if self.ast.rules.contains_key(n) => expr::rule(gb.declare_rule(n)),
            EbnfExpr::Name(n, _) | EbnfExpr::Token(n, _) => self.token_ref(n),
            EbnfExpr::Seq(es) => expr::seq(es.iter().map(|e| self.lower_tokens(gb, e)).collect()),
            EbnfExpr::Choice(es) => {
                expr::choice(es.iter().map(|e| self.lower_tokens(gb, e)).collect())
            }
            EbnfExpr::ZeroOrMore(e) => expr::zero_or_more(self.lower_tokens(gb, e)),
            EbnfExpr::OneOrMore(e) => expr::one_or_more(self.lower_tokens(gb, e)),
            EbnfExpr::Optional(e) => expr::optional(self.lower_tokens(gb, e)),
            EbnfExpr::Repeat(e, n) => expr::repeat(self.lower_tokens(gb, e), *n),
            EbnfExpr::And(e) => expr::and(self.lower_tokens(gb, e)),
            EbnfExpr::Not(e) => expr::not(self.lower_tokens(gb, e)),
            EbnfExpr::Exclude(e, ex) => {
                let e = self.lower_tokens(gb, e);
                expr::exclude(e, self.lower_tokens(gb, ex))
            }
        }
    }

    /// A reference to token `n` from a rule. Skipped tokens never reach the token stream, so a
    /// reference to one can never match.
    fn token_ref(&self, n: &str) -> Expr<TIdx<StorageT>, StorageT> {
        match self.tok_tags.get(n) {
            Some(tidx) => expr::term(*tidx),
            None => expr::choice(vec![]),
        }
    }
}

fn literal_name(lit: &str) -> String {
    format!("'{}'", lit)
}

fn token_rule_name(name: &str) -> String {
    format!("%{}", name)
}

#[cfg(test)]
mod test {
    use super::{EbnfGrammar, EbnfGrammarErrorKind, TOKENS_RULE};
    use crate::{
        Spanned, TIdx,
        expr::{self, Expr},
    };

    #[test]
    fn test_token_grammar() {
        let grm = EbnfGrammar::new(
            "%num = digit+ ; %_ws = ' '+ ; sum = num { '+' num } ; digit = '0'..'9' ;",
        )
        .unwrap();
        let tg = grm.token_grammar();
        assert_eq!(tg.rule_name_str(tg.start_rule_idx()), TOKENS_RULE);
        assert_eq!(
            tg.iter_tidxs().map(|t| tg.tag_name(t)).collect::<Vec<_>>(),
            vec!["'+'", "num"]
        );
        assert_eq!(
            tg.pp(),
            concat!(
                "^ = longest(('+')->'+', (%num)->num, %_ws)* ;\n",
                "%num = digit+ ;\n",
                "%_ws = ' '+ ;\n",
                "digit = '0'..'9' ;\n"
            )
        );
    }

    #[test]
    fn test_ast_grammar() {
        let grm = EbnfGrammar::new(
            "%num = '0'..'9'+ ; sum = sum \"+\" num | num ; unused = 'x' ;",
        )
        .unwrap();
        let tg = grm.token_grammar();
        let ag = grm.ast_grammar();
        let plus = tg.tag_idx("'+'").unwrap();
        let num = tg.tag_idx("num").unwrap();
        assert_eq!(tg.tag_idx("'x'"), None);
        assert_eq!(usize::from(ag.rules_len()), 1);
        let sum = ag.rule_idx("sum").unwrap();
        let sum_tag = ag.tag_idx("sum").unwrap();
        let expected: Expr<TIdx<u32>, u32> = expr::tag(
            expr::choice(vec![
                expr::seq(vec![expr::rule(sum), expr::term(plus), expr::term(num)]),
                expr::term(num),
            ]),
            sum_tag,
        );
        assert_eq!(ag.rule_body(sum), &expected);
    }

    #[test]
    fn test_literal_order() {
        let grm = EbnfGrammar::new("%op = '<'+ ; s = '<' | '<=' | op | \"<<=\" | '<' ;").unwrap();
        let tg = grm.token_grammar();
        assert_eq!(
            tg.iter_tidxs().map(|t| tg.tag_name(t)).collect::<Vec<_>>(),
            vec!["'<'", "'<='", "'<<='", "op"]
        );
        assert_eq!(
            tg.pp().lines().next(),
            Some("^ = longest(('<')->'<', (<'<' '='>)->'<=', (<'<' '<' '='>)->'<<=', (%op)->op)* ;")
        );
    }

    #[test]
    fn test_repeat() {
        let grm = EbnfGrammar::new("%hex = 2 * ('0'..'9' | 'a'..'f') ; s = hex 3 * ',' ;").unwrap();
        let tg = grm.token_grammar();
        assert_eq!(
            tg.rule_body(tg.rule_idx("%hex").unwrap()).to_string(),
            "2 * ('0'..'9' | 'a'..'f')"
        );
        let ag = grm.ast_grammar();
        let comma = tg.tag_idx("','").unwrap();
        let hex = tg.tag_idx("hex").unwrap();
        let expected: Expr<TIdx<u32>, u32> = expr::tag(
            expr::seq(vec![expr::term(hex), expr::repeat(expr::term(comma), 3)]),
            ag.tag_idx("s").unwrap(),
        );
        assert_eq!(ag.rule_body(ag.rule_idx("s").unwrap()), &expected);
    }

    #[test]
    fn test_validation_errors() {
        let errs = EbnfGrammar::new("%t = 'a' ;").unwrap_err();
        assert_eq!(errs[0].kind(), &EbnfGrammarErrorKind::NoStartRule);
        let errs = EbnfGrammar::new("s = a %b ;").unwrap_err();
        assert_eq!(
            errs.iter().map(|e| e.kind().clone()).collect::<Vec<_>>(),
            vec![
                EbnfGrammarErrorKind::UnknownRuleRef("a".to_owned()),
                EbnfGrammarErrorKind::UnknownToken("b".to_owned())
            ]
        );
        let errs = EbnfGrammar::new("s = 'a'..'z' ;").unwrap_err();
        assert_eq!(errs[0].kind(), &EbnfGrammarErrorKind::RangeOutsideToken);
        assert_eq!(errs[0].spans()[0].start(), 4);
    }
}
