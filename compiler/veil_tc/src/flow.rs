//! Block-level control-flow graphs.
//!
//! One graph per implementation body. All blocks are registered before any
//! edge is resolved, so forward references are legal. Unresolved successor
//! names are errors; unreachable blocks are warnings — unreachable code
//! does not block verification.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use veil_ir::{Body, Name, Program, Span};

use crate::error::TcError;

/// Index of a block within one flow graph.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        BlockId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// The flow graph of one implementation body. Built once, read-only after.
#[derive(Debug, Default)]
pub struct FlowGraph {
    names: Vec<Name>,
    spans: Vec<Span>,
    by_name: FxHashMap<Name, BlockId>,
    succs: Vec<SmallVec<[BlockId; 2]>>,
    preds: Vec<SmallVec<[BlockId; 2]>>,
}

impl FlowGraph {
    /// Build the graph for `body`, reporting unresolved successors and
    /// warning about unreachable blocks.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(body: &Body) -> (FlowGraph, Vec<TcError>) {
        let mut graph = FlowGraph::default();
        let mut errors = Vec::new();

        // Register every block before resolving edges.
        for (i, block) in body.blocks.iter().enumerate() {
            let id = BlockId::from_raw(u32::try_from(i).expect("too many blocks"));
            graph.names.push(block.name);
            graph.spans.push(block.span);
            graph.by_name.insert(block.name, id);
            graph.succs.push(SmallVec::new());
            graph.preds.push(SmallVec::new());
        }

        for (i, block) in body.blocks.iter().enumerate() {
            let from = BlockId::from_raw(i as u32);
            for succ in &block.succs {
                match graph.by_name.get(&succ.name) {
                    Some(&to) => {
                        graph.succs[from.index()].push(to);
                        graph.preds[to.index()].push(from);
                    }
                    None => {
                        errors.push(TcError::MissingBlockTarget {
                            name: succ.name,
                            span: succ.span,
                        });
                    }
                }
            }
        }

        for unreached in graph.unreachable_blocks() {
            errors.push(TcError::UnreachableBlock {
                name: graph.names[unreached.index()],
                span: graph.spans[unreached.index()],
            });
        }

        (graph, errors)
    }

    /// Number of blocks.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.names.len()
    }

    /// The entry block (the body's first block), if the body is non-empty.
    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        if self.names.is_empty() {
            None
        } else {
            Some(BlockId::from_raw(0))
        }
    }

    /// Resolve a block by name.
    pub fn block_id(&self, name: Name) -> Option<BlockId> {
        self.by_name.get(&name).copied()
    }

    /// The name of a block.
    #[inline]
    pub fn name(&self, b: BlockId) -> Name {
        self.names[b.index()]
    }

    /// Successor blocks.
    #[inline]
    pub fn succs(&self, b: BlockId) -> &[BlockId] {
        &self.succs[b.index()]
    }

    /// Predecessor blocks.
    #[inline]
    pub fn preds(&self, b: BlockId) -> &[BlockId] {
        &self.preds[b.index()]
    }

    /// All block ids in body order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.names.len()).map(|i| BlockId::from_raw(i as u32))
    }

    /// Blocks not reachable from the entry block by a depth-first walk.
    fn unreachable_blocks(&self) -> Vec<BlockId> {
        let Some(entry) = self.entry() else {
            return Vec::new();
        };
        let mut seen = vec![false; self.block_count()];
        let mut stack = vec![entry];
        seen[entry.index()] = true;
        while let Some(b) = stack.pop() {
            for &s in self.succs(b) {
                if !seen[s.index()] {
                    seen[s.index()] = true;
                    stack.push(s);
                }
            }
        }
        self.blocks().filter(|b| !seen[b.index()]).collect()
    }

    /// Whether the graph contains a directed cycle.
    pub fn has_cycle(&self) -> bool {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.block_count()];
        for start in self.blocks() {
            if color[start.index()] != Color::White {
                continue;
            }
            let mut stack: Vec<(BlockId, usize)> = vec![(start, 0)];
            color[start.index()] = Color::Gray;
            while let Some(&mut (node, ref mut cursor)) = stack.last_mut() {
                let edges = self.succs(node);
                if *cursor < edges.len() {
                    let next = edges[*cursor];
                    *cursor += 1;
                    match color[next.index()] {
                        Color::Gray => return true,
                        Color::White => {
                            color[next.index()] = Color::Gray;
                            stack.push((next, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node.index()] = Color::Black;
                    stack.pop();
                }
            }
        }
        false
    }
}

/// Flow graphs for every implementation in a program, indexed by the
/// implementation's position.
#[derive(Debug, Default)]
pub struct FlowGraphs {
    graphs: Vec<FlowGraph>,
}

impl FlowGraphs {
    /// Build a graph for every implementation body.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build_all(program: &Program) -> (FlowGraphs, Vec<TcError>) {
        let mut graphs = Vec::with_capacity(program.implementations.len());
        let mut errors = Vec::new();
        for im in &program.implementations {
            let (graph, mut errs) = FlowGraph::build(&im.body);
            graphs.push(graph);
            errors.append(&mut errs);
        }
        (FlowGraphs { graphs }, errors)
    }

    /// The graph for the implementation at `impl_idx`.
    pub fn graph(&self, impl_idx: usize) -> &FlowGraph {
        &self.graphs[impl_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_ir::{Block, StringInterner, SuccRef};

    fn body(interner: &mut StringInterner, blocks: &[(&str, &[&str])]) -> Body {
        let blocks = blocks
            .iter()
            .enumerate()
            .map(|(i, (name, succs))| Block {
                name: interner.intern(name),
                cmd: None,
                succs: succs
                    .iter()
                    .map(|s| SuccRef { name: interner.intern(s), span: Span::new(i as u32, i as u32 + 1) })
                    .collect(),
                span: Span::new(i as u32 * 10, i as u32 * 10 + 1),
            })
            .collect();
        Body { locals: vec![], blocks }
    }

    #[test]
    fn forward_references_are_legal() {
        let mut interner = StringInterner::new();
        let body = body(&mut interner, &[("a", &["c"]), ("c", &[])]);
        let (graph, errors) = FlowGraph::build(&body);
        assert!(errors.is_empty());
        let a = graph.block_id(interner.intern("a")).unwrap();
        let c = graph.block_id(interner.intern("c")).unwrap();
        assert_eq!(graph.succs(a), &[c]);
        assert_eq!(graph.preds(c), &[a]);
    }

    #[test]
    fn missing_successor_is_an_error() {
        let mut interner = StringInterner::new();
        let body = body(&mut interner, &[("a", &["nowhere"])]);
        let (_, errors) = FlowGraph::build(&body);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TcError::MissingBlockTarget { .. }));
    }

    #[test]
    fn unreachable_block_reported_once_as_warning() {
        let mut interner = StringInterner::new();
        let body = body(
            &mut interner,
            &[("a", &["b"]), ("b", &[]), ("dead", &["b"]), ("deader", &["dead"])],
        );
        let (_, errors) = FlowGraph::build(&body);
        let unreachable: Vec<_> = errors
            .iter()
            .filter(|e| matches!(e, TcError::UnreachableBlock { .. }))
            .collect();
        assert_eq!(unreachable.len(), 2);
        assert!(errors.iter().all(TcError::is_warning));
    }

    #[test]
    fn fully_reachable_graph_reports_nothing() {
        let mut interner = StringInterner::new();
        let body = body(&mut interner, &[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        let (graph, errors) = FlowGraph::build(&body);
        assert!(errors.is_empty());
        assert!(!graph.has_cycle());
    }

    #[test]
    fn cycles_are_detected() {
        let mut interner = StringInterner::new();
        let body = body(&mut interner, &[("a", &["b"]), ("b", &["a"])]);
        let (graph, errors) = FlowGraph::build(&body);
        assert!(errors.is_empty());
        assert!(graph.has_cycle());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut interner = StringInterner::new();
        let body = body(&mut interner, &[("a", &["a"])]);
        let (graph, _) = FlowGraph::build(&body);
        assert!(graph.has_cycle());
    }

    #[test]
    fn empty_body_has_no_entry() {
        let body = Body::default();
        let (graph, errors) = FlowGraph::build(&body);
        assert!(errors.is_empty());
        assert_eq!(graph.entry(), None);
    }
}
