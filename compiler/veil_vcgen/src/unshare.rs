//! DAG un-sharing: bounding the printed size of a shared term.
//!
//! A verification condition is a DAG with heavy sharing; printed naively it
//! can explode exponentially. This pass rebuilds the term top-down and, for
//! every connective sub-term shared by enough parents, substitutes a fresh
//! leaf and emits a defining axiom instead of expanding the sub-term in
//! place.
//!
//! Polarity is tracked while rebuilding: descending into the antecedent of
//! an `implies` flips it. A leaf seen only positively is defined by
//! `leaf ⇒ def`, only negatively by `def ⇒ leaf`, and under both polarities
//! by a full `iff` — one-directional definitions keep the solver's search
//! space smaller.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::term::{TermData, TermId, TermOp, TermPool};

/// Un-sharing configuration.
#[derive(Copy, Clone, Debug)]
pub struct UnshareOptions {
    /// Inlining slack: a shared child is expanded in place when
    /// `size * (parents - 1) <= parents + threshold`. Raising it trades
    /// axiom count for tree size.
    pub threshold: i64,
}

impl Default for UnshareOptions {
    fn default() -> Self {
        UnshareOptions { threshold: 0 }
    }
}

/// The un-sharing pass over one verification condition.
pub struct DeSharifier<'p> {
    pool: &'p mut TermPool,
    options: UnshareOptions,
    /// Distinct parents per connective node, one counting pass.
    parents: FxHashMap<TermId, u32>,
    dag_to_leaf: FxHashMap<TermId, TermId>,
    leaf_to_tree: FxHashMap<TermId, TermId>,
    leaf_parity: FxHashMap<TermId, bool>,
    parity_mismatch: FxHashSet<TermId>,
    size_cache: FxHashMap<TermId, u64>,
}

impl<'p> DeSharifier<'p> {
    pub fn new(pool: &'p mut TermPool, options: UnshareOptions) -> Self {
        DeSharifier {
            pool,
            options,
            parents: FxHashMap::default(),
            dag_to_leaf: FxHashMap::default(),
            leaf_to_tree: FxHashMap::default(),
            leaf_parity: FxHashMap::default(),
            parity_mismatch: FxHashSet::default(),
            size_cache: FxHashMap::default(),
        }
    }

    /// Un-share `root`, returning the rebuilt tree and the defining axioms
    /// for every leaf the tree actually uses.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(mut self, root: TermId) -> (TermId, Vec<TermId>) {
        self.count_parents(root);
        let tree = self.rebuild(root, true);
        let axioms = self.axioms(tree);
        (tree, axioms)
    }

    // ========================================
    // Counting
    // ========================================

    fn count_parents(&mut self, root: TermId) {
        let mut seen = FxHashSet::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            let children = self.pool.children(node).to_vec();
            for child in children {
                if !self.pool.is_connective(child) {
                    continue;
                }
                *self.parents.entry(child).or_insert(0) += 1;
                stack.push(child);
            }
        }
    }

    /// Approximate print size of a tree: one per node.
    fn size(&mut self, t: TermId) -> u64 {
        if let Some(&s) = self.size_cache.get(&t) {
            return s;
        }
        let children = self.pool.children(t).to_vec();
        let mut s = 1;
        for c in children {
            s += self.size(c);
        }
        self.size_cache.insert(t, s);
        s
    }

    // ========================================
    // Rebuilding
    // ========================================

    fn rebuild(&mut self, dag: TermId, parity: bool) -> TermId {
        if let Some(&leaf) = self.dag_to_leaf.get(&dag) {
            self.set_parity(leaf, parity);
            return self.leaf_to_tree[&leaf];
        }
        let TermData::App { op, args } = self.pool.data(dag).clone() else {
            return dag;
        };

        let mut new_children = Vec::with_capacity(args.len());
        for (i, &child) in args.iter().enumerate() {
            if !self.pool.is_connective(child) {
                new_children.push(child);
                continue;
            }
            let child_parity = if i == 0 && op == TermOp::Implies { !parity } else { parity };
            let new_child = self.rebuild(child, child_parity);
            let size = self.size(new_child) as i64;
            let parents = i64::from(self.parents.get(&child).copied().unwrap_or(0));
            if size * (parents - 1) <= parents + self.options.threshold {
                new_children.push(new_child);
            } else {
                new_children.push(self.dag_to_leaf[&child]);
            }
        }

        let tree = self.pool.mk(op, new_children);
        let leaf = self.pool.mk_leaf();
        self.dag_to_leaf.insert(dag, leaf);
        self.leaf_to_tree.insert(leaf, tree);
        self.set_parity(leaf, parity);
        tree
    }

    fn set_parity(&mut self, leaf: TermId, parity: bool) {
        if let Some(&previous) = self.leaf_parity.get(&leaf) {
            if previous != parity {
                self.parity_mismatch.insert(leaf);
            }
        }
        self.leaf_parity.insert(leaf, parity);
    }

    // ========================================
    // Axioms
    // ========================================

    /// One defining axiom per leaf reachable from the rebuilt tree,
    /// including leaves used inside other leaves' definitions.
    fn axioms(&mut self, tree: TermId) -> Vec<TermId> {
        let mut used = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_used(tree, &mut seen, &mut used);
        used.sort_by_key(|l| l.raw());

        let mut axioms = Vec::with_capacity(used.len());
        for leaf in used {
            let def = self.leaf_to_tree[&leaf];
            let axiom = if self.parity_mismatch.contains(&leaf) {
                self.pool.mk(TermOp::Iff, vec![leaf, def])
            } else if self.leaf_parity[&leaf] {
                self.pool.mk(TermOp::Implies, vec![leaf, def])
            } else {
                self.pool.mk(TermOp::Implies, vec![def, leaf])
            };
            axioms.push(axiom);
        }
        axioms
    }

    fn collect_used(&self, t: TermId, seen: &mut FxHashSet<TermId>, used: &mut Vec<TermId>) {
        if !seen.insert(t) {
            return;
        }
        for &c in self.pool.children(t) {
            if self.pool.is_connective(c) {
                self.collect_used(c, seen, used);
            } else if self.pool.is_leaf(c) && self.leaf_to_tree.contains_key(&c) {
                if seen.insert(c) {
                    used.push(c);
                    self.collect_used(self.leaf_to_tree[&c], seen, used);
                }
            }
        }
    }
}
