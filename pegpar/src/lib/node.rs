use std::fmt::{self, Write};

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use pegram::{Grammar, Span, TIdx};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The default number of spaces per level of indentation used by [`Node::pp`].
pub const DEFAULT_TAB_SIZE: usize = 4;
/// The default maximum number of symbols of source [`Node::pp`] prints for a leaf.
pub const DEFAULT_MAX_CHARS: usize = 32;

/// A match: the successful application of an [`Expr::Tag`](pegram::Expr::Tag). `span` covers the
/// positions of the input the tagged expression consumed; `children` are the matches made while
/// parsing it, in input order.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node<StorageT> {
    pub tidx: TIdx<StorageT>,
    pub span: Span,
    pub children: Vec<Node<StorageT>>,
}

/// Something that can render the part of an input a [`Span`] covers.
pub trait NodeSource {
    /// Write at most `max` symbols of the input covered by `span` to `w`.
    fn write_span(&self, w: &mut dyn Write, span: Span, max: usize) -> fmt::Result;
}

impl<SymT: fmt::Display> NodeSource for [SymT] {
    fn write_span(&self, w: &mut dyn Write, span: Span, max: usize) -> fmt::Result {
        for s in self.get(span.start()..span.end()).unwrap_or(&[]).iter().take(max) {
            write!(w, "{}", s)?;
        }
        Ok(())
    }
}

/// Spans over a `str` count `char`s, not bytes.
impl NodeSource for str {
    fn write_span(&self, w: &mut dyn Write, span: Span, max: usize) -> fmt::Result {
        for c in self.chars().skip(span.start()).take(span.len().min(max)) {
            w.write_char(c)?;
        }
        Ok(())
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Write this node, and its children, to `w`: one line per node, indented by
    /// `depth * tab_size` spaces, containing the node's tag name. Leaves are followed by `: ` and
    /// up to `max_chars` symbols of the source they cover (unless `max_chars` is zero).
    #[allow(clippy::too_many_arguments)]
    pub fn print<W: Write, SymT, S: NodeSource + ?Sized>(
        &self,
        w: &mut W,
        grm: &Grammar<SymT, StorageT>,
        src: &S,
        depth: usize,
        tab_size: usize,
        max_chars: usize,
    ) -> fmt::Result {
        write!(
            w,
            "{:indent$}{}",
            "",
            grm.tag_name(self.tidx),
            indent = depth * tab_size
        )?;
        if self.children.is_empty() && max_chars > 0 {
            w.write_str(": ")?;
            src.write_span(w, self.span, max_chars)?;
        }
        w.write_char('\n')?;
        for c in &self.children {
            c.print(w, grm, src, depth + 1, tab_size, max_chars)?;
        }
        Ok(())
    }

    /// Return a pretty-printed version of this node using the default layout.
    pub fn pp<SymT, S: NodeSource + ?Sized>(
        &self,
        grm: &Grammar<SymT, StorageT>,
        src: &S,
    ) -> String {
        let mut s = String::new();
        // Writing to a `String` cannot fail.
        self.print(&mut s, grm, src, 0, DEFAULT_TAB_SIZE, DEFAULT_MAX_CHARS).ok();
        s
    }
}

#[cfg(test)]
mod test {
    use super::{Node, NodeSource};
    use pegram::{GrammarBuilder, Span, TIdx, expr};

    fn leaf(tidx: TIdx<u32>, s: usize, e: usize) -> Node<u32> {
        Node {
            tidx,
            span: Span::new(s, e),
            children: vec![],
        }
    }

    #[test]
    fn test_pp() {
        let mut gb = GrammarBuilder::<char>::new();
        let add = gb.tag("ADD");
        let val = gb.tag("VAL");
        gb.rule("S", expr::any()).unwrap();
        let grm = gb.build().unwrap();
        let n = Node {
            tidx: add,
            span: Span::new(0, 3),
            children: vec![leaf(val, 0, 1), leaf(val, 2, 3)],
        };
        assert_eq!(n.pp(&grm, "1+2"), "ADD\n    VAL: 1\n    VAL: 2\n");
        let src = "1+2".chars().collect::<Vec<_>>();
        let mut s = String::new();
        n.print(&mut s, &grm, &src[..], 1, 2, 0).unwrap();
        assert_eq!(s, "  ADD\n    VAL\n    VAL\n");
    }

    #[test]
    fn test_truncation() {
        let mut s = String::new();
        "abcdef".write_span(&mut s, Span::new(1, 5), 3).unwrap();
        assert_eq!(s, "bcd");
        let mut s = String::new();
        [1u8, 2, 3][..].write_span(&mut s, Span::new(1, 9), 5).unwrap();
        assert_eq!(s, "");
    }
}
