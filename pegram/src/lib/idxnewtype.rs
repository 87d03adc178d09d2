// Generates index types which expose a `usize`/`u32` API while storing a (possibly smaller)
// `StorageT` internally.

use std::mem::size_of;

use num_traits::{self, PrimInt, Unsigned};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> From<$n<T>> for u32 {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<u32>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> $n<T> {
            pub fn as_storaget(&self) -> T {
                self.0
            }
        }
    }
}

IdxNewtype!(
    /// A handle onto a rule in a [`Grammar`](crate::Grammar)'s rule arena.
    ///
    /// `RIdx` can be converted, without loss of precision, to `usize` with `usize::from(ridx)`.
    /// Grammars only hand out `RIdx`s that fit in their `StorageT`.
    RIdx);
IdxNewtype!(
    /// A handle onto a tag name. Tags label the nodes of match trees; in a character level
    /// grammar they are also the token kinds handed on to a token level grammar.
    ///
    /// `TIdx` can be converted, without loss of precision, to `usize` with `usize::from(tidx)`.
    TIdx);
