use std::cmp::Ordering;

/// Compares input symbols against the symbols in a grammar's terminals, ranges and sets. Swapping
/// the comparator changes (for example) whether a grammar is case sensitive without changing the
/// grammar.
pub trait SymbolComparator<SymT> {
    /// Compare the input symbol `input` with the grammar symbol `grm`.
    fn compare(&self, input: &SymT, grm: &SymT) -> Ordering;
}

/// Compares symbols with their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultComparator;

impl<SymT: Ord> SymbolComparator<SymT> for DefaultComparator {
    fn compare(&self, input: &SymT, grm: &SymT) -> Ordering {
        input.cmp(grm)
    }
}

/// Compares characters (or ASCII bytes) ignoring case.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaseInsensitive;

impl SymbolComparator<char> for CaseInsensitive {
    fn compare(&self, input: &char, grm: &char) -> Ordering {
        input.to_lowercase().cmp(grm.to_lowercase())
    }
}

impl SymbolComparator<u8> for CaseInsensitive {
    fn compare(&self, input: &u8, grm: &u8) -> Ordering {
        input.to_ascii_lowercase().cmp(&grm.to_ascii_lowercase())
    }
}
