use std::rc::Rc;

use num_traits::{PrimInt, Unsigned};
use pegram::{RIdx, Span, TIdx};

use crate::{ParseError, node::Node};

/// A snapshot of a [`ParseContext`] which can later be returned to with
/// [`ParseContext::rewind`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParseState {
    pos: usize,
    matches_len: usize,
    errors_len: usize,
}

impl ParseState {
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn matches_len(&self) -> usize {
        self.matches_len
    }

    pub fn errors_len(&self) -> usize {
        self.errors_len
    }
}

/// The state of a rule which is being evaluated at a given position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LrState {
    /// The seed is being searched for: recursive calls at the same position fail.
    Reject,
    /// The seed has been found and is being grown: recursive calls at the same position succeed
    /// with the best result so far.
    Accept,
}

/// A match as it is held during a parse. Children are shared, so the best result of a left
/// recursive rule can be handed to each growth iteration without copying the tree beneath it.
#[derive(Clone, Debug)]
pub(crate) struct Match<StorageT> {
    tidx: TIdx<StorageT>,
    span: Span,
    children: Rc<[Match<StorageT>]>,
}

impl<StorageT: PrimInt + Unsigned> Match<StorageT> {
    fn to_node(&self) -> Node<StorageT> {
        Node {
            tidx: self.tidx,
            span: self.span,
            children: self.children.iter().map(|c| c.to_node()).collect(),
        }
    }
}

/// Left recursion bookkeeping for one evaluation of a rule at one position.
#[derive(Debug)]
pub(crate) struct Frame<StorageT> {
    pub(crate) start: usize,
    pub(crate) state: LrState,
    /// Did a recursive call hit this frame while it was in the `Reject` state?
    pub(crate) lr_detected: bool,
    /// The end of the best result so far.
    pub(crate) end: usize,
    /// The matches and (speculative) errors of the best result so far.
    pub(crate) matches: Vec<Match<StorageT>>,
    pub(crate) errors: Vec<ParseError>,
}

/// The mutable state of a single parse: where in the input the parse is, the matches and errors
/// so far, and the left recursion bookkeeping for each rule. A `ParseContext` is used by exactly
/// one parse; the grammar itself is never mutated, so any number of parses of the same grammar
/// can run concurrently, each with its own context.
///
/// Errors come in two flavours. *Speculative* errors are discarded by [`rewind`](Self::rewind)
/// like everything else. *Committed* errors (made by error recovery) are never discarded.
pub struct ParseContext<'a, SymT, StorageT> {
    input: &'a [SymT],
    pos: usize,
    furthest: usize,
    matches: Vec<Match<StorageT>>,
    errors: Vec<ParseError>,
    committed: Vec<ParseError>,
    frames: Vec<Vec<Frame<StorageT>>>,
}

impl<'a, SymT, StorageT: PrimInt + Unsigned> ParseContext<'a, SymT, StorageT> {
    /// Create a context for parsing `input` with a grammar of `rules_len` rules.
    pub fn new(input: &'a [SymT], rules_len: usize) -> Self {
        ParseContext {
            input,
            pos: 0,
            furthest: 0,
            matches: Vec::new(),
            errors: Vec::new(),
            committed: Vec::new(),
            frames: (0..rules_len).map(|_| Vec::new()).collect(),
        }
    }

    pub fn input(&self) -> &'a [SymT] {
        self.input
    }

    /// The current position in the input.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The symbol at the current position, if any.
    pub fn peek(&self) -> Option<&'a SymT> {
        self.input.get(self.pos)
    }

    /// Is the current position at the end of the input?
    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Move the current position to `pos`.
    ///
    /// # Panics
    ///
    /// If `pos` is beyond the end of the input.
    pub fn set_pos(&mut self, pos: usize) {
        assert!(pos <= self.input.len());
        self.pos = pos;
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.set_pos(self.pos + n);
    }

    /// The furthest position at which a symbol failed to match.
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    /// Record that a symbol failed to match at `pos`.
    pub fn note_failure(&mut self, pos: usize) {
        self.furthest = self.furthest.max(pos);
    }

    pub fn state(&self) -> ParseState {
        ParseState {
            pos: self.pos,
            matches_len: self.matches.len(),
            errors_len: self.errors.len(),
        }
    }

    /// Return to a state previously captured with [`state`](Self::state), discarding any matches
    /// and speculative errors made since then. Committed errors are unaffected.
    pub fn rewind(&mut self, st: ParseState) {
        self.pos = st.pos;
        self.matches.truncate(st.matches_len);
        self.errors.truncate(st.errors_len);
    }

    /// The number of matches on the match stack.
    pub fn matches_len(&self) -> usize {
        self.matches.len()
    }

    /// Pop the last `child_count` matches and push a new match with tag `tidx`, spanning from
    /// `start` to the current position, that has them as its children.
    ///
    /// # Panics
    ///
    /// If there are fewer than `child_count` matches.
    pub fn add_match(&mut self, tidx: TIdx<StorageT>, start: usize, child_count: usize) {
        if child_count > self.matches.len() {
            panic!(
                "Can't pop {} children from a match stack of {}",
                child_count,
                self.matches.len()
            );
        }
        let children = self.matches.split_off(self.matches.len() - child_count);
        self.matches.push(Match {
            tidx,
            span: Span::new(start, self.pos),
            children: children.into(),
        });
    }

    /// Add a speculative error.
    pub fn add_error(&mut self, e: ParseError) {
        self.errors.push(e);
    }

    /// Add a committed error. An error identical to one already committed is ignored, since
    /// backtracking can cause the same recovery to be made more than once.
    pub fn commit_error(&mut self, e: ParseError) {
        if !self.committed.contains(&e) {
            self.committed.push(e);
        }
    }

    /// The speculative errors.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn committed_errors(&self) -> &[ParseError] {
        &self.committed
    }

    /// Consume this context, returning its matches, speculative errors, and committed errors.
    pub fn into_parts(self) -> (Vec<Node<StorageT>>, Vec<ParseError>, Vec<ParseError>) {
        let nodes = self.matches.iter().map(|m| m.to_node()).collect();
        (nodes, self.errors, self.committed)
    }

    pub(crate) fn matches_split_off(&mut self, at: usize) -> Vec<Match<StorageT>> {
        self.matches.split_off(at)
    }

    pub(crate) fn errors_split_off(&mut self, at: usize) -> Vec<ParseError> {
        self.errors.split_off(at)
    }

    /// Push a rule's (previously split off) matches and errors.
    pub(crate) fn extend(&mut self, matches: Vec<Match<StorageT>>, errors: Vec<ParseError>) {
        self.matches.extend(matches);
        self.errors.extend(errors);
    }

    /// The frame for rule `ridx` at position `pos`, if that rule is being evaluated there.
    pub(crate) fn frame_at(
        &mut self,
        ridx: RIdx<StorageT>,
        pos: usize,
    ) -> Option<&mut Frame<StorageT>> {
        // Nested evaluations never start before their parent, so only the most recent frames
        // can be at `pos`.
        self.frames[usize::from(ridx)]
            .iter_mut()
            .rev()
            .take_while(|f| f.start >= pos)
            .find(|f| f.start == pos)
    }

    pub(crate) fn push_frame(&mut self, ridx: RIdx<StorageT>, start: usize) {
        self.frames[usize::from(ridx)].push(Frame {
            start,
            state: LrState::Reject,
            lr_detected: false,
            end: start,
            matches: Vec::new(),
            errors: Vec::new(),
        });
    }

    /// The frame most recently pushed for `ridx`.
    ///
    /// # Panics
    ///
    /// If there is no such frame.
    pub(crate) fn top_frame(&mut self, ridx: RIdx<StorageT>) -> &mut Frame<StorageT> {
        self.frames[usize::from(ridx)]
            .last_mut()
            .expect("No frame for rule")
    }

    pub(crate) fn pop_frame(&mut self, ridx: RIdx<StorageT>) -> Option<Frame<StorageT>> {
        self.frames[usize::from(ridx)].pop()
    }
}
