//! The solver term pool.
//!
//! Terms are the logical formulas handed to the SMT boundary. They form a
//! DAG, not a tree: the pool interns structurally, so equal sub-terms are
//! the same node and term identity is a stable `u32` handle. Terms are
//! built bottom-up and never mutated, which keeps the DAG cycle-free by
//! construction.
//!
//! Leaves introduced by un-sharing are the one exception to interning:
//! each [`TermPool::mk_leaf`] call yields a distinct node.

use std::fmt;

use rustc_hash::FxHashMap;

use veil_ir::{Name, StringInterner};

/// Handle of a term node.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TermId(u32);

impl TermId {
    /// The constant `true`.
    pub const TRUE: TermId = TermId(0);
    /// The constant `false`.
    pub const FALSE: TermId = TermId(1);
    /// The `null` reference.
    pub const NULL: TermId = TermId(2);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermId({})", self.0)
    }
}

/// Operators of applied terms.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TermOp {
    And,
    Or,
    Implies,
    Iff,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Subtype,
    Select,
    Store,
}

impl TermOp {
    /// Operator name as it prints.
    pub fn as_str(self) -> &'static str {
        match self {
            TermOp::And => "and",
            TermOp::Or => "or",
            TermOp::Implies => "implies",
            TermOp::Iff => "iff",
            TermOp::Not => "not",
            TermOp::Eq => "=",
            TermOp::Ne => "distinct",
            TermOp::Lt => "<",
            TermOp::Le => "<=",
            TermOp::Gt => ">",
            TermOp::Ge => ">=",
            TermOp::Add => "+",
            TermOp::Sub => "-",
            TermOp::Mul => "*",
            TermOp::Div => "div",
            TermOp::Mod => "mod",
            TermOp::Neg => "neg",
            TermOp::Subtype => "<:",
            TermOp::Select => "select",
            TermOp::Store => "store",
        }
    }
}

/// Term node payloads.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TermData {
    True,
    False,
    Null,
    Int(i64),
    /// A program variable or constant.
    Var(Name),
    /// Operator application.
    App { op: TermOp, args: Vec<TermId> },
    /// Uninterpreted function application.
    Fun { name: Name, args: Vec<TermId> },
    /// Quantified formula; `args` holds the single body term.
    Quant { forall: bool, vars: Vec<Name>, args: Vec<TermId> },
    /// Fresh un-sharing leaf; identity is `id`, never interned.
    Leaf { id: u32 },
}

/// The interning term arena.
pub struct TermPool {
    map: FxHashMap<TermData, u32>,
    terms: Vec<TermData>,
    next_leaf: u32,
}

impl TermPool {
    /// Create a pool with `true`, `false`, and `null` pre-interned at the
    /// fixed [`TermId`] constants.
    pub fn new() -> Self {
        let mut pool =
            TermPool { map: FxHashMap::default(), terms: Vec::with_capacity(256), next_leaf: 0 };
        for data in [TermData::True, TermData::False, TermData::Null] {
            pool.intern(data);
        }
        pool
    }

    fn intern(&mut self, data: TermData) -> TermId {
        if let Some(&idx) = self.map.get(&data) {
            return TermId(idx);
        }
        let idx = u32::try_from(self.terms.len()).expect("term pool overflow");
        self.map.insert(data.clone(), idx);
        self.terms.push(data);
        TermId(idx)
    }

    /// Build an operator application. Structural interning: building the
    /// same application twice yields the same handle.
    pub fn mk(&mut self, op: TermOp, args: Vec<TermId>) -> TermId {
        self.intern(TermData::App { op, args })
    }

    /// An integer literal term.
    pub fn mk_int(&mut self, value: i64) -> TermId {
        self.intern(TermData::Int(value))
    }

    /// A variable reference term.
    pub fn mk_var(&mut self, name: Name) -> TermId {
        self.intern(TermData::Var(name))
    }

    /// An uninterpreted function application.
    pub fn mk_fun(&mut self, name: Name, args: Vec<TermId>) -> TermId {
        self.intern(TermData::Fun { name, args })
    }

    /// A quantified formula.
    pub fn mk_quant(&mut self, forall: bool, vars: Vec<Name>, body: TermId) -> TermId {
        self.intern(TermData::Quant { forall, vars, args: vec![body] })
    }

    /// A fresh un-sharing leaf. Distinct on every call.
    pub fn mk_leaf(&mut self) -> TermId {
        let id = self.next_leaf;
        self.next_leaf += 1;
        let idx = u32::try_from(self.terms.len()).expect("term pool overflow");
        self.terms.push(TermData::Leaf { id });
        TermId(idx)
    }

    /// The payload of a term.
    #[inline]
    pub fn data(&self, t: TermId) -> &TermData {
        &self.terms[t.index()]
    }

    /// Child handles, empty for atoms.
    pub fn children(&self, t: TermId) -> &[TermId] {
        match self.data(t) {
            TermData::App { args, .. }
            | TermData::Fun { args, .. }
            | TermData::Quant { args, .. } => args,
            _ => &[],
        }
    }

    /// Whether the node is a logical connective the un-sharing pass
    /// traverses (and/or/implies).
    pub fn is_connective(&self, t: TermId) -> bool {
        matches!(
            self.data(t),
            TermData::App { op: TermOp::And | TermOp::Or | TermOp::Implies, .. }
        )
    }

    /// Whether the node is an un-sharing leaf.
    pub fn is_leaf(&self, t: TermId) -> bool {
        matches!(self.data(t), TermData::Leaf { .. })
    }

    /// Number of nodes in the pool.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Render a term as an s-expression, for logs and tests.
    pub fn display(&self, t: TermId, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.push_term(t, interner, &mut out);
        out
    }

    fn push_term(&self, t: TermId, interner: &StringInterner, out: &mut String) {
        match self.data(t) {
            TermData::True => out.push_str("true"),
            TermData::False => out.push_str("false"),
            TermData::Null => out.push_str("null"),
            TermData::Int(v) => out.push_str(&v.to_string()),
            TermData::Var(name) => out.push_str(interner.lookup(*name)),
            TermData::App { op, args } => {
                out.push('(');
                out.push_str(op.as_str());
                for &a in args {
                    out.push(' ');
                    self.push_term(a, interner, out);
                }
                out.push(')');
            }
            TermData::Fun { name, args } => {
                out.push('(');
                out.push_str(interner.lookup(*name));
                for &a in args {
                    out.push(' ');
                    self.push_term(a, interner, out);
                }
                out.push(')');
            }
            TermData::Quant { forall, vars, args } => {
                out.push('(');
                out.push_str(if *forall { "forall" } else { "exists" });
                out.push_str(" (");
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(interner.lookup(*v));
                }
                out.push_str(") ");
                self.push_term(args[0], interner, out);
                out.push(')');
            }
            TermData::Leaf { id } => {
                out.push_str("unshared$");
                out.push_str(&id.to_string());
            }
        }
    }
}

impl Default for TermPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TermPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermPool").field("terms", &self.terms.len()).finish()
    }
}
