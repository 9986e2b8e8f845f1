//! The declaration tree.
//!
//! Flat AST: nodes live in the [`AstArena`](crate::AstArena) and refer to
//! each other through `u32` index newtypes, never through owning pointers.
//! The tree is strictly tree-shaped — no node is referenced twice from the
//! spine — and is never mutated in place: transforms allocate new nodes and
//! rebuild the parts of the spine that changed, structurally sharing the
//! rest.

use smallvec::SmallVec;

use crate::{CmdId, ExprId, Name, Span, Spanned, TyId, TyParamId, VarId};

/// A whole verification unit: the top-level declarations, in source order.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub types: Vec<TypeDecl>,
    pub consts: Vec<ConstDecl>,
    /// Global variables (the declarations live in the var arena).
    pub globals: Vec<VarId>,
    pub axioms: Vec<Axiom>,
    pub functions: Vec<FunctionDecl>,
    pub procedures: Vec<Procedure>,
    pub implementations: Vec<Implementation>,
}

/// User type declaration, possibly a synonym for another type.
#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub name: Name,
    /// `Some` for `type T = ..;` synonyms, `None` for opaque types.
    pub synonym: Option<TyId>,
    pub span: Span,
}

/// Constant declaration.
#[derive(Clone, Debug)]
pub struct ConstDecl {
    pub name: Name,
    pub ty: TyId,
    pub span: Span,
}

/// Variable declaration: globals, parameters, results, locals, and
/// quantifier-bound variables all share this node.
#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: Name,
    pub ty: TyId,
    /// Type parameters scoping over `ty` for generic variable declarations.
    pub ty_params: Vec<TyParamId>,
    pub span: Span,
}

/// A type parameter declaration (the binder identity generic bindings are
/// keyed on).
#[derive(Clone, Debug)]
pub struct TyParamDecl {
    pub name: Name,
    pub span: Span,
}

/// An axiom; its body must type as bool.
#[derive(Clone, Debug)]
pub struct Axiom {
    pub ty_params: Vec<TyParamId>,
    pub expr: ExprId,
    pub span: Span,
}

/// A procedure/function/implementation signature.
#[derive(Clone, Debug)]
pub struct Signature {
    pub name: Name,
    pub ty_params: Vec<TyParamId>,
    pub params: Vec<VarId>,
    pub results: Vec<VarId>,
    pub span: Span,
}

/// An uninterpreted function declaration.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub sig: Signature,
    pub span: Span,
}

/// Specification clause kinds on procedures.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SpecKind {
    Requires,
    Ensures,
    Modifies,
}

/// One `requires`/`ensures`/`modifies` clause.
#[derive(Clone, Debug)]
pub struct Spec {
    pub kind: SpecKind,
    pub free: bool,
    pub ty_params: Vec<TyParamId>,
    /// The condition for requires/ensures; for modifies, an identifier.
    pub expr: ExprId,
    pub span: Span,
}

/// A procedure signature plus its specification.
#[derive(Clone, Debug)]
pub struct Procedure {
    pub sig: Signature,
    pub specs: Vec<Spec>,
    pub span: Span,
}

/// An executable body bound to a procedure signature; the unit flow graphs
/// and verification conditions are built over.
#[derive(Clone, Debug)]
pub struct Implementation {
    pub sig: Signature,
    pub body: Body,
    pub span: Span,
}

/// An implementation body: local declarations plus blocks. The first block
/// is the entry block.
#[derive(Clone, Debug, Default)]
pub struct Body {
    pub locals: Vec<VarId>,
    pub blocks: Vec<Block>,
}

/// A named successor reference at the end of a block.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SuccRef {
    pub name: Name,
    pub span: Span,
}

/// A block: at most one command and a list of successor names.
#[derive(Clone, Debug)]
pub struct Block {
    pub name: Name,
    pub cmd: Option<CmdId>,
    pub succs: SmallVec<[SuccRef; 2]>,
    pub span: Span,
}

/// A command node.
#[derive(Clone, Debug)]
pub struct Command {
    pub kind: CmdKind,
    pub span: Span,
}

/// Command variants.
#[derive(Clone, Debug)]
pub enum CmdKind {
    /// `lhs := rhs` — the left-hand side is an identifier atom.
    Assign { lhs: ExprId, rhs: ExprId },
    Assert { ty_params: Vec<TyParamId>, expr: ExprId },
    Assume { ty_params: Vec<TyParamId>, expr: ExprId },
    /// `call r1, .. := p(e1, ..)`.
    Call {
        proc: Name,
        ty_args: Vec<TyId>,
        results: Vec<ExprId>,
        args: Vec<ExprId>,
    },
}

/// An expression node.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    /// Integer negation.
    Neg,
    /// Boolean negation.
    Not,
}

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Ge,
    Gt,
    Eq,
    Ne,
    And,
    Or,
    Implies,
    Iff,
    /// The explicit partial-order test `<:`.
    Subtype,
}

/// Quantifier kinds.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum QuantKind {
    Forall,
    Exists,
}

/// Expression variants.
#[derive(Clone, Debug)]
pub enum ExprKind {
    /// Identifier atom, with optional explicit generic arguments.
    Id { name: Name, ty_args: Vec<TyId> },
    Int(i64),
    Bool(bool),
    Null,
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    /// `old(e)` — the pre-state value of `e`.
    Old(ExprId),
    /// Function application.
    Fun {
        name: Name,
        ty_args: Vec<TyId>,
        args: Vec<ExprId>,
    },
    Quant {
        kind: QuantKind,
        ty_params: Vec<TyParamId>,
        bound: Vec<VarId>,
        body: ExprId,
    },
    /// Map/array read `m[e1, ..]`.
    Select { map: ExprId, indexes: Vec<ExprId> },
    /// Map/array update `m[e1, .. := v]`, yielding the updated map.
    Update {
        map: ExprId,
        indexes: Vec<ExprId>,
        value: ExprId,
    },
    /// Type ascription `cast(e, T)`.
    Cast { operand: ExprId, ty: TyId },
}
