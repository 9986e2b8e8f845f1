//! Lowering passivated bodies to solver terms.
//!
//! After passivation a block carries at most one assert/assume command over
//! a pure expression; this module translates those conditions into the term
//! pool, producing the per-block terms the weakest-precondition fold
//! consumes. Maps lower to `select`/`store`, the SMT vocabulary.

use veil_ir::{AstArena, Body, CmdKind, ExprId, ExprKind, UnaryOp};
use veil_tc::BlockId;

use crate::error::VcError;
use crate::term::{TermId, TermOp, TermPool};
use crate::wp::{BlockTerm, BlockTerms};

/// Translate every block command of a passivated body.
#[tracing::instrument(level = "debug", skip_all)]
pub fn lower_body(
    body: &Body,
    arena: &AstArena,
    pool: &mut TermPool,
) -> Result<BlockTerms, VcError> {
    let mut terms = BlockTerms::new(body.blocks.len());
    for (i, block) in body.blocks.iter().enumerate() {
        let Some(cmd) = block.cmd else { continue };
        let term = match &arena.cmd(cmd).kind {
            CmdKind::Assert { expr, .. } => BlockTerm::Assert(lower_expr(*expr, arena, pool)?),
            CmdKind::Assume { expr, .. } => BlockTerm::Assume(lower_expr(*expr, arena, pool)?),
            CmdKind::Assign { .. } => return Err(VcError::AssignInBody),
            CmdKind::Call { .. } => return Err(VcError::CallInBody),
        };
        terms.set(BlockId::from_raw(i as u32), term);
    }
    Ok(terms)
}

/// Translate one pure expression.
pub fn lower_expr(expr: ExprId, arena: &AstArena, pool: &mut TermPool) -> Result<TermId, VcError> {
    let node = arena.expr(expr);
    Ok(match &node.kind {
        ExprKind::Id { name, .. } => pool.mk_var(*name),
        ExprKind::Int(v) => pool.mk_int(*v),
        ExprKind::Bool(true) => TermId::TRUE,
        ExprKind::Bool(false) => TermId::FALSE,
        ExprKind::Null => TermId::NULL,
        ExprKind::Unary { op, operand } => {
            let t = lower_expr(*operand, arena, pool)?;
            let op = match op {
                UnaryOp::Neg => TermOp::Neg,
                UnaryOp::Not => TermOp::Not,
            };
            pool.mk(op, vec![t])
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = lower_expr(*lhs, arena, pool)?;
            let r = lower_expr(*rhs, arena, pool)?;
            pool.mk(binary_op(*op), vec![l, r])
        }
        ExprKind::Old(_) => return Err(VcError::OldInBody),
        ExprKind::Fun { name, args, .. } => {
            let mut lowered = Vec::with_capacity(args.len());
            for &a in args {
                lowered.push(lower_expr(a, arena, pool)?);
            }
            pool.mk_fun(*name, lowered)
        }
        ExprKind::Quant { kind, bound, body, .. } => {
            let vars = bound.iter().map(|&v| arena.var(v).name).collect();
            let b = lower_expr(*body, arena, pool)?;
            pool.mk_quant(matches!(kind, veil_ir::QuantKind::Forall), vars, b)
        }
        ExprKind::Select { map, indexes } => {
            let mut args = Vec::with_capacity(indexes.len() + 1);
            args.push(lower_expr(*map, arena, pool)?);
            for &i in indexes {
                args.push(lower_expr(i, arena, pool)?);
            }
            pool.mk(TermOp::Select, args)
        }
        ExprKind::Update { map, indexes, value } => {
            let mut args = Vec::with_capacity(indexes.len() + 2);
            args.push(lower_expr(*map, arena, pool)?);
            for &i in indexes {
                args.push(lower_expr(i, arena, pool)?);
            }
            args.push(lower_expr(*value, arena, pool)?);
            pool.mk(TermOp::Store, args)
        }
        ExprKind::Cast { operand, .. } => lower_expr(*operand, arena, pool)?,
    })
}

fn binary_op(op: veil_ir::BinaryOp) -> TermOp {
    use veil_ir::BinaryOp as B;
    match op {
        B::Add => TermOp::Add,
        B::Sub => TermOp::Sub,
        B::Mul => TermOp::Mul,
        B::Div => TermOp::Div,
        B::Mod => TermOp::Mod,
        B::Lt => TermOp::Lt,
        B::Le => TermOp::Le,
        B::Ge => TermOp::Ge,
        B::Gt => TermOp::Gt,
        B::Eq => TermOp::Eq,
        B::Ne => TermOp::Ne,
        B::And => TermOp::And,
        B::Or => TermOp::Or,
        B::Implies => TermOp::Implies,
        B::Iff => TermOp::Iff,
        B::Subtype => TermOp::Subtype,
    }
}
