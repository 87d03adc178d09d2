use std::cmp::Ordering;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use pegram::{Expr, Grammar, RIdx, ResumePolicy, Span};
use tracing::{debug, trace};

use crate::{
    ErrorKind, ParseError,
    compare::{DefaultComparator, SymbolComparator},
    context::{LrState, Match, ParseContext, ParseState},
    node::Node,
};

/// The outcome of parsing an input with [`RTParserBuilder::parse`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseResult<StorageT> {
    /// Did the start rule match the entire input?
    pub success: bool,
    /// The top-level matches, in input order.
    pub nodes: Vec<Node<StorageT>>,
    /// Committed errors, and any errors the successful parse recorded, sorted by span. If the
    /// parse was not successful, this includes a syntax error at `furthest`.
    pub errors: Vec<ParseError>,
    /// The position the start rule stopped at (0 if it failed).
    pub end: usize,
    /// The furthest position the parse reached.
    pub furthest: usize,
}

/// Evaluates the expressions of a grammar against a [`ParseContext`].
///
/// Each `parse_*` function returns `true` if it matched, leaving the context's position after
/// the matched input. If it returns `false` the context is as it was before the call, except for
/// committed errors and the furthest position reached.
///
/// Left recursion is handled by "growing the seed". When a rule is entered at position `p` it
/// first searches for a seed, during which any recursive call to the same rule at `p` fails. If
/// such a call happened and a seed was found, the rule body is repeatedly re-evaluated from `p`
/// with recursive calls at `p` now succeeding with the previous iteration's result. Growth stops
/// when an iteration fails to get further than its predecessor.
///
/// A symbol which fails to match records no error: it only moves the context's furthest position
/// forward. If the whole parse fails, [`parse`](Self::parse) reports a single syntax error at the
/// furthest position. Errors recorded inside [`Expr::And`] and [`Expr::Not`] are discarded with
/// everything else they did.
///
/// Deeply nested input can exhaust the stack, since evaluation is recursive.
pub struct Parser<'a, SymT, StorageT> {
    grm: &'a Grammar<SymT, StorageT>,
    cmp: &'a dyn SymbolComparator<SymT>,
}

impl<'a, SymT, StorageT: 'static + PrimInt + Unsigned> Parser<'a, SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(grm: &'a Grammar<SymT, StorageT>, cmp: &'a dyn SymbolComparator<SymT>) -> Self {
        Parser { grm, cmp }
    }

    pub fn grammar(&self) -> &'a Grammar<SymT, StorageT> {
        self.grm
    }

    /// Create a fresh context for parsing `input` with this parser's grammar.
    pub fn context<'b>(&self, input: &'b [SymT]) -> ParseContext<'b, SymT, StorageT> {
        ParseContext::new(input, usize::from(self.grm.rules_len()))
    }

    /// Parse the whole of `input` starting from the grammar's start rule.
    pub fn parse(&self, input: &[SymT]) -> ParseResult<StorageT> {
        let mut ctx = self.context(input);
        let matched = self.parse_rule(&mut ctx, self.grm.start_rule_idx());
        let success = matched && ctx.at_end();
        let end = ctx.pos();
        let furthest = ctx.furthest().max(end);
        let (nodes, speculative, mut errors) = ctx.into_parts();
        errors.extend(speculative);
        if !success {
            errors.push(ParseError::new(
                ErrorKind::Syntax,
                Span::new(furthest, (furthest + 1).min(input.len())),
            ));
        }
        errors.sort_by_key(|e| e.span());
        ParseResult {
            success,
            nodes,
            errors,
            end,
            furthest,
        }
    }

    pub fn parse_expr(
        &self,
        ctx: &mut ParseContext<'_, SymT, StorageT>,
        e: &Expr<SymT, StorageT>,
    ) -> bool {
        match e {
            Expr::Terminal(sym) => self.parse_sym(ctx, |s| self.eq(s, sym)),
            Expr::String(syms) => {
                let start = ctx.pos();
                for (i, sym) in syms.iter().enumerate() {
                    match ctx.input().get(start + i) {
                        Some(s) if self.eq(s, sym) => (),
                        _ => {
                            ctx.note_failure(start + i);
                            return false;
                        }
                    }
                }
                ctx.advance(syms.len());
                true
            }
            Expr::Range(lo, hi) => self.parse_sym(ctx, |s| {
                self.cmp.compare(s, lo) != Ordering::Less
                    && self.cmp.compare(s, hi) != Ordering::Greater
            }),
            Expr::Set(syms) => self.parse_sym(ctx, |s| syms.iter().any(|x| self.eq(s, x))),
            Expr::Any => self.parse_sym(ctx, |_| true),
            Expr::End => {
                if ctx.at_end() {
                    true
                } else {
                    ctx.note_failure(ctx.pos());
                    false
                }
            }
            Expr::Seq(es) => {
                let st = ctx.state();
                for e in es {
                    if !self.parse_expr(ctx, e) {
                        ctx.rewind(st);
                        return false;
                    }
                }
                true
            }
            Expr::Choice(es) => {
                let st = ctx.state();
                for e in es {
                    if self.parse_expr(ctx, e) {
                        return true;
                    }
                    ctx.rewind(st);
                }
                false
            }
            Expr::Longest(es) => {
                let st = ctx.state();
                let mut best: Option<(usize, Vec<Match<StorageT>>, Vec<ParseError>)> = None;
                for e in es {
                    if self.parse_expr(ctx, e)
                        && best.as_ref().map_or(true, |(end, _, _)| ctx.pos() > *end)
                    {
                        best = Some((
                            ctx.pos(),
                            ctx.matches_split_off(st.matches_len()),
                            ctx.errors_split_off(st.errors_len()),
                        ));
                    }
                    ctx.rewind(st);
                }
                match best {
                    Some((end, matches, errors)) => {
                        ctx.extend(matches, errors);
                        ctx.set_pos(end);
                        true
                    }
                    None => false,
                }
            }
            Expr::Repeat(e, n) => {
                let st = ctx.state();
                for _ in 0..*n {
                    if !self.parse_expr(ctx, e) {
                        ctx.rewind(st);
                        return false;
                    }
                }
                true
            }
            Expr::ZeroOrMore(e) => {
                self.parse_many(ctx, e);
                true
            }
            Expr::OneOrMore(e) => {
                if !self.parse_expr(ctx, e) {
                    return false;
                }
                self.parse_many(ctx, e);
                true
            }
            Expr::Optional(e) => {
                let st = ctx.state();
                if !self.parse_expr(ctx, e) {
                    ctx.rewind(st);
                }
                true
            }
            Expr::And(e) => {
                let st = ctx.state();
                let r = self.parse_expr(ctx, e);
                ctx.rewind(st);
                r
            }
            Expr::Not(e) => {
                let st = ctx.state();
                let r = self.parse_expr(ctx, e);
                ctx.rewind(st);
                !r
            }
            Expr::Rule(ridx) => self.parse_rule(ctx, *ridx),
            Expr::Tag(e, tidx) => {
                let start = ctx.pos();
                let m0 = ctx.matches_len();
                if !self.parse_expr(ctx, e) {
                    return false;
                }
                let child_count = ctx.matches_len() - m0;
                ctx.add_match(*tidx, start, child_count);
                true
            }
            Expr::ErrorResume {
                primary,
                sync,
                policy,
            } => self.parse_resume(ctx, primary, sync, *policy),
            Expr::Error { code, skip } => {
                let start = ctx.pos();
                if let Some(skip) = skip {
                    for p in start..=ctx.input().len() {
                        ctx.set_pos(p);
                        let st = ctx.state();
                        let found = self.parse_expr(ctx, skip);
                        ctx.rewind(st);
                        if found {
                            break;
                        }
                    }
                }
                ctx.add_error(ParseError::new(
                    ErrorKind::User(*code),
                    Span::new(start, ctx.pos()),
                ));
                true
            }
        }
    }

    /// Parse rule `ridx` at the context's current position.
    pub fn parse_rule(
        &self,
        ctx: &mut ParseContext<'_, SymT, StorageT>,
        ridx: RIdx<StorageT>,
    ) -> bool {
        let start = ctx.pos();
        if let Some(f) = ctx.frame_at(ridx, start) {
            match f.state {
                LrState::Reject => {
                    f.lr_detected = true;
                    return false;
                }
                LrState::Accept => {
                    let end = f.end;
                    // Cloning a match only shares its children.
                    let (matches, errors) = (f.matches.clone(), f.errors.clone());
                    ctx.extend(matches, errors);
                    ctx.set_pos(end);
                    return true;
                }
            }
        }

        let st = ctx.state();
        ctx.push_frame(ridx, start);
        if !self.parse_expr(ctx, self.grm.rule_body(ridx)) {
            ctx.pop_frame(ridx);
            ctx.rewind(st);
            return false;
        }
        if ctx.top_frame(ridx).lr_detected {
            self.grow(ctx, ridx, st);
        }
        ctx.pop_frame(ridx);
        true
    }

    /// Grow the seed of the left recursive rule `ridx`, which was entered in state `st` and whose
    /// seed has just been parsed.
    fn grow(
        &self,
        ctx: &mut ParseContext<'_, SymT, StorageT>,
        ridx: RIdx<StorageT>,
        st: ParseState,
    ) {
        debug!(
            rule = self.grm.rule_name_str(ridx),
            start = st.pos(),
            seed_end = ctx.pos(),
            "Growing left recursive rule"
        );
        loop {
            let end = ctx.pos();
            let matches = ctx.matches_split_off(st.matches_len());
            let errors = ctx.errors_split_off(st.errors_len());
            let f = ctx.top_frame(ridx);
            f.state = LrState::Accept;
            f.end = end;
            f.matches = matches;
            f.errors = errors;

            ctx.set_pos(st.pos());
            if self.parse_expr(ctx, self.grm.rule_body(ridx)) && ctx.pos() > end {
                trace!(
                    rule = self.grm.rule_name_str(ridx),
                    end = ctx.pos(),
                    "Left recursive rule grew"
                );
                continue;
            }

            // The last iteration did no better than its predecessor: reinstate the predecessor.
            ctx.rewind(st);
            let f = ctx.top_frame(ridx);
            let matches = std::mem::take(&mut f.matches);
            let errors = std::mem::take(&mut f.errors);
            ctx.extend(matches, errors);
            ctx.set_pos(end);
            break;
        }
    }

    fn parse_resume(
        &self,
        ctx: &mut ParseContext<'_, SymT, StorageT>,
        primary: &Expr<SymT, StorageT>,
        sync: &Expr<SymT, StorageT>,
        policy: ResumePolicy,
    ) -> bool {
        let st0 = ctx.state();
        let primary_ok = self.parse_expr(ctx, primary);
        let st1 = ctx.state();
        if primary_ok && self.parse_expr(ctx, sync) {
            return true;
        }
        ctx.rewind(st1);

        // If `primary` matched then `sync` has already failed at `err_start`.
        let err_start = st1.pos();
        let first = if primary_ok { err_start + 1 } else { err_start };
        for p in first..=ctx.input().len() {
            ctx.rewind(st1);
            ctx.set_pos(p);
            let before_sync = ctx.state();
            if self.parse_expr(ctx, sync) {
                debug!(start = err_start, resume = p, "Recovered from syntax error");
                ctx.commit_error(ParseError::new(ErrorKind::Syntax, Span::new(err_start, p)));
                if policy == ResumePolicy::SkipTo {
                    ctx.rewind(before_sync);
                }
                return true;
            }
        }
        ctx.rewind(st0);
        false
    }

    /// Repeatedly parse `e` until it fails or matches without consuming input.
    fn parse_many(&self, ctx: &mut ParseContext<'_, SymT, StorageT>, e: &Expr<SymT, StorageT>) {
        loop {
            let st = ctx.state();
            if !self.parse_expr(ctx, e) {
                ctx.rewind(st);
                break;
            }
            if ctx.pos() == st.pos() {
                break;
            }
        }
    }

    /// Match one symbol for which `f` returns true.
    fn parse_sym<F: Fn(&SymT) -> bool>(
        &self,
        ctx: &mut ParseContext<'_, SymT, StorageT>,
        f: F,
    ) -> bool {
        match ctx.peek() {
            Some(s) if f(s) => {
                ctx.advance(1);
                true
            }
            _ => {
                ctx.note_failure(ctx.pos());
                false
            }
        }
    }

    fn eq(&self, input: &SymT, grm: &SymT) -> bool {
        self.cmp.compare(input, grm) == Ordering::Equal
    }
}

/// A run-time parser builder.
pub struct RTParserBuilder<'a, SymT, StorageT> {
    grm: &'a Grammar<SymT, StorageT>,
    cmp: &'a dyn SymbolComparator<SymT>,
}

impl<'a, SymT: Ord, StorageT: 'static + PrimInt + Unsigned> RTParserBuilder<'a, SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a builder for `grm` which compares symbols with [`DefaultComparator`].
    pub fn new(grm: &'a Grammar<SymT, StorageT>) -> Self {
        RTParserBuilder {
            grm,
            cmp: &DefaultComparator,
        }
    }
}

impl<'a, SymT, StorageT: 'static + PrimInt + Unsigned> RTParserBuilder<'a, SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Compare input symbols with grammar symbols using `cmp`.
    pub fn comparator(mut self, cmp: &'a dyn SymbolComparator<SymT>) -> Self {
        self.cmp = cmp;
        self
    }

    /// Parse `input`.
    pub fn parse(&self, input: &[SymT]) -> ParseResult<StorageT> {
        Parser::new(self.grm, self.cmp).parse(input)
    }
}
