use std::{error::Error, fmt, fmt::Debug};

use indexmap::{IndexMap, IndexSet};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    RIdx, TIdx,
    expr::Expr,
};

/// The various different possible errors when building a [`Grammar`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GrammarBuildErrorKind {
    /// A rule was given a body more than once.
    RuleAlreadyDefined(String),
    /// A rule was declared but never given a body.
    UndefinedRule(String),
    NoStartRule,
    /// An expression refers to a rule index which is not in the grammar.
    InvalidRuleRef(usize),
    /// An expression refers to a tag index which is not in the grammar.
    InvalidTag(usize),
}

/// Any error from building a [`Grammar`] returns an instance of this struct.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrammarBuildError {
    pub kind: GrammarBuildErrorKind,
}

impl Error for GrammarBuildError {}

impl fmt::Display for GrammarBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for GrammarBuildErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrammarBuildErrorKind::RuleAlreadyDefined(name) => {
                write!(f, "Rule '{}' has already been defined", name)
            }
            GrammarBuildErrorKind::UndefinedRule(name) => {
                write!(f, "Rule '{}' is declared but never defined", name)
            }
            GrammarBuildErrorKind::NoStartRule => write!(f, "No start rule specified"),
            GrammarBuildErrorKind::InvalidRuleRef(i) => {
                write!(f, "Reference to non-existent rule index {}", i)
            }
            GrammarBuildErrorKind::InvalidTag(i) => {
                write!(f, "Reference to non-existent tag index {}", i)
            }
        }
    }
}

/// An immutable, fully resolved grammar: an arena of named rules, each with exactly one body
/// expression, plus a table of tag names. Rules refer to each other via [`RIdx`] handles, so a
/// `Grammar` can be freely shared (including across threads) by any number of concurrent parses.
///
/// `Grammar`s are created with a [`GrammarBuilder`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<SymT, StorageT = u32> {
    /// How many rules does this grammar have?
    rules_len: RIdx<StorageT>,
    /// The name of each rule.
    rule_names: Vec<String>,
    /// The body of each rule; the order is identical to that of `rule_names`.
    rule_bodies: Vec<Expr<SymT, StorageT>>,
    /// The name of each tag.
    tag_names: Vec<String>,
    start_rule: RIdx<StorageT>,
}

impl<SymT, StorageT: 'static + PrimInt + Unsigned> Grammar<SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_ridxs(&self) -> impl Iterator<Item = RIdx<StorageT>> + use<SymT, StorageT> {
        // `as_` is safe here: the builder guarantees every rule index fits in StorageT.
        (0..usize::from(self.rules_len())).map(|x| RIdx(x.as_()))
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx<StorageT>) -> &str {
        &self.rule_names[usize::from(ridx)]
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|x| x == n)
            .map(|x| RIdx(x.as_()))
    }

    /// Return the body of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_body(&self, ridx: RIdx<StorageT>) -> &Expr<SymT, StorageT> {
        &self.rule_bodies[usize::from(ridx)]
    }

    /// The rule a parse starts from.
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// How many tags does this grammar have?
    pub fn tags_len(&self) -> TIdx<StorageT> {
        TIdx(self.tag_names.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.tags_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> + use<SymT, StorageT> {
        (0..self.tag_names.len()).map(|x| TIdx(x.as_()))
    }

    /// Return the name of tag `tidx`. Panics if `tidx` doesn't exist.
    pub fn tag_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.tag_names[usize::from(tidx)]
    }

    /// Return the index of the tag named `n` or `None` if it doesn't exist.
    pub fn tag_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.tag_names
            .iter()
            .position(|x| x == n)
            .map(|x| TIdx(x.as_()))
    }

    /// Is there a path from the `from` rule to the `to` rule through rule references? Note that
    /// recursive rules return `true` for a path from themselves to themselves.
    pub fn has_path(&self, from: RIdx<StorageT>, to: RIdx<StorageT>) -> bool {
        let mut seen = vec![false; usize::from(self.rules_len())];
        let mut todo = vec![from];
        while let Some(ridx) = todo.pop() {
            let mut found = false;
            self.rule_body(ridx).walk(&mut |e| {
                if let Expr::Rule(r) = e {
                    if *r == to {
                        found = true;
                    } else if !seen[usize::from(*r)] {
                        seen[usize::from(*r)] = true;
                        todo.push(*r);
                    }
                }
            });
            if found {
                return true;
            }
        }
        false
    }

    /// For each rule, can it succeed without consuming any input? The result is indexed by
    /// `usize::from(ridx)`.
    pub fn nullable_rules(&self) -> Vec<bool> {
        let mut nullable = vec![false; usize::from(self.rules_len())];
        loop {
            let mut changed = false;
            for ridx in self.iter_ridxs() {
                let i = usize::from(ridx);
                if !nullable[i] && expr_nullable(self.rule_body(ridx), &nullable) {
                    nullable[i] = true;
                    changed = true;
                }
            }
            if !changed {
                return nullable;
            }
        }
    }

    /// Returns the rules which can (directly or indirectly) call themselves without consuming any
    /// input.
    pub fn left_recursive_rules(&self) -> Vec<RIdx<StorageT>> {
        let nullable = self.nullable_rules();
        let lefts = self
            .iter_ridxs()
            .map(|ridx| {
                let mut v = Vec::new();
                left_calls(self.rule_body(ridx), &nullable, &mut v);
                v
            })
            .collect::<Vec<_>>();
        self.iter_ridxs()
            .filter(|&ridx| {
                let mut seen = vec![false; lefts.len()];
                let mut todo = lefts[usize::from(ridx)].clone();
                while let Some(r) = todo.pop() {
                    if r == ridx {
                        return true;
                    }
                    if !seen[usize::from(r)] {
                        seen[usize::from(r)] = true;
                        todo.extend(lefts[usize::from(r)].iter().copied());
                    }
                }
                false
            })
            .collect()
    }
}

impl<SymT: Debug, StorageT: 'static + PrimInt + Unsigned + fmt::Display> Grammar<SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Returns a pretty-printed version of the grammar, one `name = expr ;` line per rule, with
    /// the start rule first.
    pub fn pp(&self) -> String {
        let rn = |ridx: RIdx<StorageT>| self.rule_name_str(ridx).to_owned();
        let tn = |tidx: TIdx<StorageT>| self.tag_name(tidx).to_owned();
        let mut s = String::new();
        let order = std::iter::once(self.start_rule)
            .chain(self.iter_ridxs().filter(|r| *r != self.start_rule));
        for ridx in order {
            s.push_str(self.rule_name_str(ridx));
            s.push_str(" = ");
            // Writing to a `String` cannot fail.
            self.rule_body(ridx).write_with(&mut s, &rn, &tn).ok();
            s.push_str(" ;\n");
        }
        s
    }
}

fn expr_nullable<SymT, StorageT: PrimInt + Unsigned>(
    e: &Expr<SymT, StorageT>,
    nullable: &[bool],
) -> bool {
    match e {
        Expr::Terminal(_) | Expr::Range(..) | Expr::Set(_) | Expr::Any => false,
        Expr::String(syms) => syms.is_empty(),
        Expr::End
        | Expr::ZeroOrMore(_)
        | Expr::Optional(_)
        | Expr::And(_)
        | Expr::Not(_)
        | Expr::Error { .. } => true,
        Expr::Seq(es) => es.iter().all(|e| expr_nullable(e, nullable)),
        Expr::Choice(es) | Expr::Longest(es) => es.iter().any(|e| expr_nullable(e, nullable)),
        Expr::Repeat(e, n) => *n == 0 || expr_nullable(e, nullable),
        Expr::OneOrMore(e) | Expr::Tag(e, _) => expr_nullable(e, nullable),
        Expr::Rule(ridx) => nullable[usize::from(*ridx)],
        Expr::ErrorResume { primary, sync, .. } => {
            expr_nullable(primary, nullable) && expr_nullable(sync, nullable)
        }
    }
}

/// Push every rule `e` may call before it has consumed any input.
fn left_calls<SymT, StorageT: PrimInt + Unsigned>(
    e: &Expr<SymT, StorageT>,
    nullable: &[bool],
    out: &mut Vec<RIdx<StorageT>>,
) {
    match e {
        Expr::Terminal(_)
        | Expr::String(_)
        | Expr::Range(..)
        | Expr::Set(_)
        | Expr::Any
        | Expr::End => (),
        Expr::Seq(es) => {
            for e in es {
                left_calls(e, nullable, out);
                if !expr_nullable(e, nullable) {
                    break;
                }
            }
        }
        Expr::Choice(es) | Expr::Longest(es) => {
            for e in es {
                left_calls(e, nullable, out);
            }
        }
        Expr::Repeat(e, n) => {
            if *n > 0 {
                left_calls(e, nullable, out);
            }
        }
        Expr::ZeroOrMore(e)
        | Expr::OneOrMore(e)
        | Expr::Optional(e)
        | Expr::And(e)
        | Expr::Not(e)
        | Expr::Tag(e, _) => left_calls(e, nullable, out),
        Expr::Rule(ridx) => out.push(*ridx),
        Expr::ErrorResume { primary, sync, .. } => {
            left_calls(primary, nullable, out);
            if expr_nullable(primary, nullable) {
                left_calls(sync, nullable, out);
            }
        }
        Expr::Error { skip, .. } => {
            if let Some(e) = skip {
                left_calls(e, nullable, out);
            }
        }
    }
}

/// Incrementally builds a [`Grammar`].
///
/// Rules are first declared (yielding an [`RIdx`] that expressions can refer to) and later given
/// exactly one body, which is what allows rules to be (mutually) recursive:
///
/// ```
/// use pegram::{GrammarBuilder, expr::{choice, range, rule, term}};
///
/// let mut gb = GrammarBuilder::<char>::new();
/// let parens = gb.declare_rule("Parens");
/// gb.define_rule(
///     parens,
///     choice(vec![
///         term('(').then(rule(parens)).then(term(')')),
///         range('0', '9'),
///     ]),
/// )
/// .unwrap();
/// let grm = gb.build().unwrap();
/// assert_eq!(grm.rule_name_str(grm.start_rule_idx()), "Parens");
/// ```
#[derive(Debug)]
pub struct GrammarBuilder<SymT, StorageT = u32> {
    rules: IndexMap<String, Option<Expr<SymT, StorageT>>>,
    tags: IndexSet<String>,
    start_rule: Option<RIdx<StorageT>>,
}

impl<SymT, StorageT: 'static + PrimInt + Unsigned> Default for GrammarBuilder<SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn default() -> Self {
        GrammarBuilder::new()
    }
}

impl<SymT, StorageT: 'static + PrimInt + Unsigned> GrammarBuilder<SymT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new() -> Self {
        GrammarBuilder {
            rules: IndexMap::new(),
            tags: IndexSet::new(),
            start_rule: None,
        }
    }

    /// Declare a rule called `name` without giving it a body, returning its index. Declaring an
    /// already declared rule returns the existing index.
    ///
    /// # Panics
    ///
    /// If `StorageT` is not big enough to index another rule.
    pub fn declare_rule(&mut self, name: &str) -> RIdx<StorageT> {
        if let Some(i) = self.rules.get_index_of(name) {
            return RIdx(i.as_());
        }
        if self.rules.len() >= num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX) {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        let (i, _) = self.rules.insert_full(name.to_owned(), None);
        RIdx(i.as_())
    }

    /// Give rule `ridx` its body. A rule may only be defined once.
    ///
    /// # Panics
    ///
    /// If `ridx` was not returned by this builder.
    pub fn define_rule(
        &mut self,
        ridx: RIdx<StorageT>,
        body: Expr<SymT, StorageT>,
    ) -> Result<(), GrammarBuildError> {
        let (name, slot) = self
            .rules
            .get_index_mut(usize::from(ridx))
            .expect("Rule index not created by this builder");
        if slot.is_some() {
            return Err(GrammarBuildError {
                kind: GrammarBuildErrorKind::RuleAlreadyDefined(name.clone()),
            });
        }
        *slot = Some(body);
        Ok(())
    }

    /// Declare and define rule `name` in one go.
    pub fn rule(
        &mut self,
        name: &str,
        body: Expr<SymT, StorageT>,
    ) -> Result<RIdx<StorageT>, GrammarBuildError> {
        let ridx = self.declare_rule(name);
        self.define_rule(ridx, body)?;
        Ok(ridx)
    }

    /// Return the index of the tag `name`, creating it if necessary.
    ///
    /// # Panics
    ///
    /// If `StorageT` is not big enough to index another tag.
    pub fn tag(&mut self, name: &str) -> TIdx<StorageT> {
        if let Some(i) = self.tags.get_index_of(name) {
            return TIdx(i.as_());
        }
        if self.tags.len() >= num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX) {
            panic!("StorageT is not big enough to store this grammar's tags.");
        }
        let (i, _) = self.tags.insert_full(name.to_owned());
        TIdx(i.as_())
    }

    /// Set the rule that parsing starts from. Defaults to the first declared rule.
    pub fn set_start(&mut self, ridx: RIdx<StorageT>) {
        self.start_rule = Some(ridx);
    }

    /// Check the grammar and, if it is well formed, return it.
    pub fn build(self) -> Result<Grammar<SymT, StorageT>, GrammarBuildError> {
        let rules_len = self.rules.len();
        let tags_len = self.tags.len();
        let start_rule = match self.start_rule {
            Some(ridx) if usize::from(ridx) < rules_len => ridx,
            Some(ridx) => {
                return Err(GrammarBuildError {
                    kind: GrammarBuildErrorKind::InvalidRuleRef(usize::from(ridx)),
                });
            }
            None if rules_len > 0 => RIdx(0usize.as_()),
            None => {
                return Err(GrammarBuildError {
                    kind: GrammarBuildErrorKind::NoStartRule,
                });
            }
        };
        let mut rule_names = Vec::with_capacity(rules_len);
        let mut rule_bodies = Vec::with_capacity(rules_len);
        for (name, body) in self.rules {
            let body = match body {
                Some(b) => b,
                None => {
                    return Err(GrammarBuildError {
                        kind: GrammarBuildErrorKind::UndefinedRule(name),
                    });
                }
            };
            let mut bad = None;
            body.walk(&mut |e| match e {
                Expr::Rule(r) if usize::from(*r) >= rules_len => {
                    bad.get_or_insert(GrammarBuildErrorKind::InvalidRuleRef(usize::from(*r)));
                }
                Expr::Tag(_, t) if usize::from(*t) >= tags_len => {
                    bad.get_or_insert(GrammarBuildErrorKind::InvalidTag(usize::from(*t)));
                }
                _ => (),
            });
            if let Some(kind) = bad {
                return Err(GrammarBuildError { kind });
            }
            rule_names.push(name);
            rule_bodies.push(body);
        }
        Ok(Grammar {
            rules_len: RIdx(rules_len.as_()),
            rule_names,
            rule_bodies,
            tag_names: self.tags.into_iter().collect(),
            start_rule,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{GrammarBuildErrorKind, GrammarBuilder};
    use crate::{
        RIdx, TIdx,
        expr::{Expr, choice, longest, optional, range, repeat, rule, seq, tag, term},
    };

    #[test]
    fn test_declare_then_define() {
        let mut gb = GrammarBuilder::<char>::new();
        let a = gb.declare_rule("A");
        let b = gb.declare_rule("B");
        assert_eq!(gb.declare_rule("A"), a);
        gb.define_rule(b, term('b')).unwrap();
        gb.define_rule(a, seq(vec![rule(b), rule(a)]).or(term('a')))
            .unwrap();
        let grm = gb.build().unwrap();
        assert_eq!(usize::from(grm.rules_len()), 2);
        assert_eq!(grm.rule_idx("B"), Some(RIdx(1)));
        assert_eq!(grm.rule_name_str(RIdx(0)), "A");
        assert_eq!(grm.start_rule_idx(), RIdx(0));
        assert_eq!(grm.rule_body(b), &Expr::Terminal('b'));
        assert_eq!(grm.rule_idx("C"), None);
    }

    #[test]
    fn test_define_twice() {
        let mut gb = GrammarBuilder::<char>::new();
        let a = gb.rule("A", term('a')).unwrap();
        assert_eq!(
            gb.define_rule(a, term('b')).unwrap_err().kind,
            GrammarBuildErrorKind::RuleAlreadyDefined("A".to_owned())
        );
    }

    #[test]
    fn test_undefined_rule() {
        let mut gb = GrammarBuilder::<char>::new();
        let b = gb.declare_rule("B");
        gb.rule("A", rule(b)).unwrap();
        assert_eq!(
            gb.build().unwrap_err().kind,
            GrammarBuildErrorKind::UndefinedRule("B".to_owned())
        );
        assert_eq!(
            GrammarBuilder::<char>::new().build().unwrap_err().kind,
            GrammarBuildErrorKind::NoStartRule
        );
    }

    #[test]
    fn test_invalid_refs() {
        let mut gb = GrammarBuilder::<char>::new();
        gb.rule("A", rule(RIdx(4))).unwrap();
        assert_eq!(
            gb.build().unwrap_err().kind,
            GrammarBuildErrorKind::InvalidRuleRef(4)
        );
        let mut gb = GrammarBuilder::<char>::new();
        gb.rule("A", tag(term('a'), TIdx(0))).unwrap();
        assert_eq!(
            gb.build().unwrap_err().kind,
            GrammarBuildErrorKind::InvalidTag(0)
        );
    }

    #[test]
    fn test_tags_interned() {
        let mut gb = GrammarBuilder::<char, u8>::new();
        let t1 = gb.tag("Num");
        let t2 = gb.tag("Add");
        assert_eq!(gb.tag("Num"), t1);
        gb.rule("S", tag(term('1'), t1).or(tag(term('+'), t2)))
            .unwrap();
        let grm = gb.build().unwrap();
        assert_eq!(usize::from(grm.tags_len()), 2);
        assert_eq!(grm.tag_name(t2), "Add");
        assert_eq!(grm.tag_idx("Num"), Some(t1));
        assert_eq!(grm.iter_tidxs().collect::<Vec<_>>(), vec![TIdx(0), TIdx(1)]);
    }

    #[test]
    fn test_start_rule() {
        let mut gb = GrammarBuilder::<char>::new();
        gb.rule("A", term('a')).unwrap();
        let b = gb.rule("B", rule(RIdx(0))).unwrap();
        gb.set_start(b);
        let grm = gb.build().unwrap();
        assert_eq!(grm.start_rule_idx(), b);
        assert_eq!(grm.pp(), "B = A ;\nA = 'a' ;\n");
    }

    #[test]
    fn test_left_recursion_analysis() {
        // Add = Add '+' Mul | Mul; Mul = Opt Mul '*' Val | Val; Opt = 'x'?; Val = '0'..'9';
        let mut gb = GrammarBuilder::<char>::new();
        let add = gb.declare_rule("Add");
        let mul = gb.declare_rule("Mul");
        let opt = gb.declare_rule("Opt");
        let val = gb.declare_rule("Val");
        gb.define_rule(
            add,
            choice(vec![seq(vec![rule(add), term('+'), rule(mul)]), rule(mul)]),
        )
        .unwrap();
        gb.define_rule(
            mul,
            choice(vec![
                seq(vec![rule(opt), rule(mul), term('*'), rule(val)]),
                rule(val),
            ]),
        )
        .unwrap();
        gb.define_rule(opt, optional(term('x'))).unwrap();
        gb.define_rule(val, range('0', '9')).unwrap();
        let grm = gb.build().unwrap();
        assert_eq!(grm.nullable_rules(), vec![false, false, true, false]);
        assert_eq!(grm.left_recursive_rules(), vec![add, mul]);
        assert!(grm.has_path(add, val));
        assert!(grm.has_path(mul, mul));
        assert!(!grm.has_path(val, add));
    }

    #[test]
    fn test_longest_and_repeat_analyses() {
        let mut gb = GrammarBuilder::<char>::new();
        let a = gb.declare_rule("A");
        let b = gb.declare_rule("B");
        let c = gb.declare_rule("C");
        gb.define_rule(a, longest(vec![term('x'), seq(vec![rule(a), term('y')])]))
            .unwrap();
        gb.define_rule(b, repeat(rule(c), 0)).unwrap();
        gb.define_rule(c, repeat(seq(vec![rule(c), term('z')]), 2)).unwrap();
        let grm = gb.build().unwrap();
        assert_eq!(grm.nullable_rules(), vec![false, true, false]);
        assert_eq!(grm.left_recursive_rules(), vec![a, c]);
    }
}
