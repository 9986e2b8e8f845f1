//! Veil IR - the data model shared by every pipeline stage.
//!
//! This crate contains:
//! - [`Span`] for source locations
//! - [`Name`] / [`StringInterner`] for interned identifiers
//! - the declaration tree ([`Program`] down to [`Expr`]) stored in an
//!   [`AstArena`]
//! - type nodes ([`Ty`]) with pre-allocated primitives
//!
//! # Design
//!
//! - **Intern everything**: strings are `Name(u32)`.
//! - **Flatten everything**: no `Box<Expr>`; children are `u32` ids into the
//!   arena, which also gives later stages cheap side tables keyed by id.
//! - **Immutable tree**: stages annotate through side maps and transforms
//!   rebuild the spine, so no stage ever observes a half-mutated tree.

mod arena;
mod ast;
mod display;
mod name;
mod span;
mod ty;

pub use arena::{AstArena, CmdId, ExprId, TyId, TyParamId, VarId};
pub use ast::{
    Axiom, BinaryOp, Block, Body, CmdKind, Command, ConstDecl, Expr, ExprKind, FunctionDecl,
    Implementation, Procedure, Program, QuantKind, Signature, Spec, SpecKind, SuccRef, TyParamDecl,
    TypeDecl, UnaryOp, VarDecl,
};
pub use name::{Name, StringInterner};
pub use span::{Span, Spanned};
pub use ty::{PrimTy, Ty, TyKind};
