//! Weakest-precondition generation over a passivated flow graph.
//!
//! Folds the graph into one obligation term. Both directions are memoized
//! per block, so every block contributes exactly once no matter the join
//! fan-in:
//!
//! - `post(b)`: what must hold after `b` — the conjunction of `pre(s)` over
//!   the successor blocks, `true` at an exit.
//! - `pre(b)`: `post(b)` for transparent blocks; for `assert c` the
//!   obligation `c ∧ (c ⇒ post)`; for `assume c` the hypothesis
//!   `c ⇒ post`.
//!
//! The implementation's verification condition is `pre(entry)`. Undefined
//! on cyclic graphs; the facade rejects those first.

use veil_tc::{BlockId, FlowGraph};

use crate::term::{TermId, TermOp, TermPool};

/// VC generation options.
#[derive(Copy, Clone, Debug, Default)]
pub struct VcOptions {
    /// Treat asserted conditions as assumed: `pre` of an assert degenerates
    /// to a plain conjunction without the implication.
    pub assume_asserts: bool,
}

/// The logical contribution of one block.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BlockTerm {
    /// No assert/assume command; the block is transparent.
    Transparent,
    Assert(TermId),
    Assume(TermId),
}

/// Per-block terms, indexed by [`BlockId`].
#[derive(Debug)]
pub struct BlockTerms {
    terms: Vec<BlockTerm>,
}

impl BlockTerms {
    /// All-transparent terms for a graph of `len` blocks.
    pub fn new(len: usize) -> Self {
        BlockTerms { terms: vec![BlockTerm::Transparent; len] }
    }

    pub fn set(&mut self, b: BlockId, term: BlockTerm) {
        self.terms[b.index()] = term;
    }

    pub fn get(&self, b: BlockId) -> BlockTerm {
        self.terms[b.index()]
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// The memoized weakest-precondition fold.
pub struct WeakestPrecondition<'a> {
    graph: &'a FlowGraph,
    terms: &'a BlockTerms,
    options: VcOptions,
    pre_cache: Vec<Option<TermId>>,
    post_cache: Vec<Option<TermId>>,
}

impl<'a> WeakestPrecondition<'a> {
    pub fn new(graph: &'a FlowGraph, terms: &'a BlockTerms, options: VcOptions) -> Self {
        let n = graph.block_count();
        WeakestPrecondition {
            graph,
            terms,
            options,
            pre_cache: vec![None; n],
            post_cache: vec![None; n],
        }
    }

    /// The verification obligation: `pre` of the entry block.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn vc(&mut self, entry: BlockId, pool: &mut TermPool) -> TermId {
        self.pre(entry, pool)
    }

    fn pre(&mut self, b: BlockId, pool: &mut TermPool) -> TermId {
        if let Some(t) = self.pre_cache[b.index()] {
            return t;
        }
        let post = self.post(b, pool);
        let r = match self.terms.get(b) {
            BlockTerm::Transparent => post,
            BlockTerm::Assert(cond) => {
                if self.options.assume_asserts {
                    pool.mk(TermOp::And, vec![cond, post])
                } else {
                    let implied = pool.mk(TermOp::Implies, vec![cond, post]);
                    pool.mk(TermOp::And, vec![cond, implied])
                }
            }
            BlockTerm::Assume(cond) => pool.mk(TermOp::Implies, vec![cond, post]),
        };
        self.pre_cache[b.index()] = Some(r);
        r
    }

    fn post(&mut self, b: BlockId, pool: &mut TermPool) -> TermId {
        if let Some(t) = self.post_cache[b.index()] {
            return t;
        }
        let mut parts = Vec::new();
        for &s in self.graph.succs(b) {
            parts.push(self.pre(s, pool));
        }
        let r = match parts.len() {
            0 => TermId::TRUE,
            1 => parts[0],
            _ => pool.mk(TermOp::And, parts),
        };
        self.post_cache[b.index()] = Some(r);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_ir::{Block, Body, Span, StringInterner, SuccRef};

    fn graph(interner: &mut StringInterner, blocks: &[(&str, &[&str])]) -> FlowGraph {
        let body = Body {
            locals: vec![],
            blocks: blocks
                .iter()
                .map(|(name, succs)| Block {
                    name: interner.intern(name),
                    cmd: None,
                    succs: succs
                        .iter()
                        .map(|s| SuccRef { name: interner.intern(s), span: Span::DUMMY })
                        .collect(),
                    span: Span::DUMMY,
                })
                .collect(),
        };
        let (graph, errors) = FlowGraph::build(&body);
        assert!(errors.is_empty());
        graph
    }

    #[test]
    fn assume_then_assert_composes_the_spec_shape() {
        // b1: assume P; b2: assert Q; with edge b1 -> b2.
        let mut interner = StringInterner::new();
        let g = graph(&mut interner, &[("b1", &["b2"]), ("b2", &[])]);
        let mut pool = TermPool::new();
        let p = pool.mk_var(interner.intern("P"));
        let q = pool.mk_var(interner.intern("Q"));
        let mut terms = BlockTerms::new(2);
        terms.set(BlockId::from_raw(0), BlockTerm::Assume(p));
        terms.set(BlockId::from_raw(1), BlockTerm::Assert(q));

        let mut wp = WeakestPrecondition::new(&g, &terms, VcOptions::default());
        let vc = wp.vc(BlockId::from_raw(0), &mut pool);

        // pre(b2) = Q and (Q implies true); pre(b1) = P implies pre(b2).
        let q_implies_true = pool.mk(TermOp::Implies, vec![q, TermId::TRUE]);
        let pre_b2 = pool.mk(TermOp::And, vec![q, q_implies_true]);
        let expected = pool.mk(TermOp::Implies, vec![p, pre_b2]);
        assert_eq!(vc, expected);
    }

    #[test]
    fn assume_asserts_drops_the_implication() {
        let mut interner = StringInterner::new();
        let g = graph(&mut interner, &[("b1", &[])]);
        let mut pool = TermPool::new();
        let q = pool.mk_var(interner.intern("Q"));
        let mut terms = BlockTerms::new(1);
        terms.set(BlockId::from_raw(0), BlockTerm::Assert(q));

        let mut wp =
            WeakestPrecondition::new(&g, &terms, VcOptions { assume_asserts: true });
        let vc = wp.vc(BlockId::from_raw(0), &mut pool);
        let expected = pool.mk(TermOp::And, vec![q, TermId::TRUE]);
        assert_eq!(vc, expected);
    }

    #[test]
    fn exit_blocks_post_is_true() {
        let mut interner = StringInterner::new();
        let g = graph(&mut interner, &[("b1", &[])]);
        let mut pool = TermPool::new();
        let terms = BlockTerms::new(1);
        let mut wp = WeakestPrecondition::new(&g, &terms, VcOptions::default());
        let vc = wp.vc(BlockId::from_raw(0), &mut pool);
        assert_eq!(vc, TermId::TRUE);
    }

    #[test]
    fn diamond_joins_share_one_computation() {
        // entry -> (left, right) -> join: the join's pre must be computed
        // once; both branch posts are the same term handle.
        let mut interner = StringInterner::new();
        let g = graph(
            &mut interner,
            &[("entry", &["left", "right"]), ("left", &["join"]), ("right", &["join"]), ("join", &[])],
        );
        let mut pool = TermPool::new();
        let a = pool.mk_var(interner.intern("A"));
        let b = pool.mk_var(interner.intern("B"));
        let c = pool.mk_var(interner.intern("C"));
        let mut terms = BlockTerms::new(4);
        terms.set(BlockId::from_raw(1), BlockTerm::Assume(a));
        terms.set(BlockId::from_raw(2), BlockTerm::Assume(b));
        terms.set(BlockId::from_raw(3), BlockTerm::Assert(c));

        let mut wp = WeakestPrecondition::new(&g, &terms, VcOptions::default());
        let vc = wp.vc(BlockId::from_raw(0), &mut pool);

        let c_implies_true = pool.mk(TermOp::Implies, vec![c, TermId::TRUE]);
        let pre_join = pool.mk(TermOp::And, vec![c, c_implies_true]);
        let pre_left = pool.mk(TermOp::Implies, vec![a, pre_join]);
        let pre_right = pool.mk(TermOp::Implies, vec![b, pre_join]);
        let expected = pool.mk(TermOp::And, vec![pre_left, pre_right]);
        assert_eq!(vc, expected);
    }
}
