//! Verification-condition generation for the Veil verifier.
//!
//! Runs only over implementations the semantic stages accepted without
//! errors. The stages, per implementation:
//!
//! 1. [`passivate`] — assignment elimination by variable versioning
//!    (requires acyclic flow; cyclic bodies are skipped, not broken).
//! 2. [`lower`] — passivated block commands to solver terms.
//! 3. [`wp`] — the memoized weakest-precondition fold into one obligation.
//! 4. [`unshare`] — bounding the obligation's printed size with named
//!    leaves plus defining axioms.
//!
//! The term pool ([`TermPool`]) is the SMT boundary: structurally interned
//! handles a downstream solver integration consumes.

mod error;
mod lower;
mod passivate;
mod term;
mod unshare;
mod wp;

pub use error::VcError;
pub use lower::{lower_body, lower_expr};
pub use passivate::passivate_implementation;
pub use term::{TermData, TermId, TermOp, TermPool};
pub use unshare::{DeSharifier, UnshareOptions};
pub use wp::{BlockTerm, BlockTerms, VcOptions, WeakestPrecondition};

use veil_ir::{AstArena, Implementation, StringInterner};
use veil_tc::{FlowGraph, SymbolTable};

/// Generate the verification condition of one implementation:
/// passivation, lowering, and the weakest-precondition fold.
///
/// # Errors
///
/// Fails on bodies the pipeline cannot handle: empty, cyclic, or still
/// containing calls.
#[tracing::instrument(level = "debug", skip_all)]
pub fn implementation_vc(
    im: &Implementation,
    graph: &FlowGraph,
    symbols: &SymbolTable,
    arena: &mut AstArena,
    interner: &mut StringInterner,
    pool: &mut TermPool,
    options: VcOptions,
) -> Result<TermId, VcError> {
    let Some(entry) = graph.entry() else {
        return Err(VcError::EmptyBody);
    };
    if graph.has_cycle() {
        return Err(VcError::CyclicFlowGraph);
    }
    // Passivation skips exactly two shapes; cycles were just ruled out.
    let passivated = passivate_implementation(im, graph, symbols, arena, interner)
        .ok_or(VcError::CallInBody)?;
    let terms = lower_body(&passivated.body, arena, pool)?;
    let mut wp = WeakestPrecondition::new(graph, &terms, options);
    Ok(wp.vc(entry, pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_ir::{
        BinaryOp, Block, Body, CmdKind, Command, Expr, ExprKind, Procedure, Program, Signature,
        Span, SuccRef, TyId, VarDecl,
    };
    use veil_tc::{check_program, TcOptions};

    /// Build `implementation p() { b1: x := 1; goto b2; b2: assert x == 1; }`
    /// and run the whole pipeline end to end.
    #[test]
    fn end_to_end_assignment_becomes_an_assumption() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();

        let x = interner.intern("x");
        let xv = arena.alloc_var(VarDecl { name: x, ty: TyId::INT, ty_params: vec![], span: Span::DUMMY });
        let x_lhs = arena.alloc_expr(Expr::new(ExprKind::Id { name: x, ty_args: vec![] }, Span::DUMMY));
        let one = arena.alloc_expr(Expr::new(ExprKind::Int(1), Span::DUMMY));
        let c1 = arena.alloc_cmd(Command {
            kind: CmdKind::Assign { lhs: x_lhs, rhs: one },
            span: Span::DUMMY,
        });
        let x_read = arena.alloc_expr(Expr::new(ExprKind::Id { name: x, ty_args: vec![] }, Span::DUMMY));
        let one2 = arena.alloc_expr(Expr::new(ExprKind::Int(1), Span::DUMMY));
        let eq = arena.alloc_expr(Expr::new(
            ExprKind::Binary { op: BinaryOp::Eq, lhs: x_read, rhs: one2 },
            Span::DUMMY,
        ));
        let c2 = arena.alloc_cmd(Command {
            kind: CmdKind::Assert { ty_params: vec![], expr: eq },
            span: Span::DUMMY,
        });

        let p = interner.intern("p");
        let sig = Signature { name: p, ty_params: vec![], params: vec![], results: vec![], span: Span::DUMMY };
        program.procedures.push(Procedure { sig: sig.clone(), specs: vec![], span: Span::DUMMY });
        program.implementations.push(Implementation {
            sig,
            body: Body {
                locals: vec![xv],
                blocks: vec![
                    Block {
                        name: interner.intern("b1"),
                        cmd: Some(c1),
                        succs: [SuccRef { name: interner.intern("b2"), span: Span::DUMMY }]
                            .into_iter()
                            .collect(),
                        span: Span::DUMMY,
                    },
                    Block {
                        name: interner.intern("b2"),
                        cmd: Some(c2),
                        succs: Default::default(),
                        span: Span::DUMMY,
                    },
                ],
            },
            span: Span::DUMMY,
        });

        let out = check_program(&program, &mut arena, &interner, TcOptions::default());
        assert!(!out.has_errors(), "{:?}", out.errors);

        let mut pool = TermPool::new();
        let vc = implementation_vc(
            &program.implementations[0],
            out.flow.graph(0),
            &out.symbols,
            &mut arena,
            &mut interner,
            &mut pool,
            VcOptions::default(),
        )
        .expect("pipeline succeeds");

        // Both blocks mention the same passivated equality x$$1 == 1, so
        // interning collapses them to one handle t, and the obligation is
        // t implies (t and (t implies true)).
        let x1 = pool.mk_var(interner.intern("x$$1"));
        let lit = pool.mk_int(1);
        let t = pool.mk(TermOp::Eq, vec![x1, lit]);
        let t_implies_true = pool.mk(TermOp::Implies, vec![t, TermId::TRUE]);
        let pre_b2 = pool.mk(TermOp::And, vec![t, t_implies_true]);
        let expected = pool.mk(TermOp::Implies, vec![t, pre_b2]);
        assert_eq!(vc, expected, "vc: {}", pool.display(vc, &interner));
    }

    #[test]
    fn calls_left_in_a_body_are_rejected() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();

        let q = interner.intern("q");
        let qsig = Signature { name: q, ty_params: vec![], params: vec![], results: vec![], span: Span::DUMMY };
        program.procedures.push(Procedure { sig: qsig, specs: vec![], span: Span::DUMMY });

        let call = arena.alloc_cmd(Command {
            kind: CmdKind::Call { proc: q, ty_args: vec![], results: vec![], args: vec![] },
            span: Span::DUMMY,
        });
        let p = interner.intern("p");
        let sig = Signature { name: p, ty_params: vec![], params: vec![], results: vec![], span: Span::DUMMY };
        program.procedures.push(Procedure { sig: sig.clone(), specs: vec![], span: Span::DUMMY });
        program.implementations.push(Implementation {
            sig,
            body: Body {
                locals: vec![],
                blocks: vec![Block {
                    name: interner.intern("b1"),
                    cmd: Some(call),
                    succs: Default::default(),
                    span: Span::DUMMY,
                }],
            },
            span: Span::DUMMY,
        });

        let out = check_program(&program, &mut arena, &interner, TcOptions::default());
        assert!(!out.has_errors(), "{:?}", out.errors);

        let mut pool = TermPool::new();
        let result = implementation_vc(
            &program.implementations[0],
            out.flow.graph(0),
            &out.symbols,
            &mut arena,
            &mut interner,
            &mut pool,
            VcOptions::default(),
        );
        assert_eq!(result, Err(VcError::CallInBody));
    }

    #[test]
    fn cyclic_bodies_are_rejected_by_the_facade() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();

        let p = interner.intern("p");
        let sig = Signature { name: p, ty_params: vec![], params: vec![], results: vec![], span: Span::DUMMY };
        program.procedures.push(Procedure { sig: sig.clone(), specs: vec![], span: Span::DUMMY });
        program.implementations.push(Implementation {
            sig,
            body: Body {
                locals: vec![],
                blocks: vec![Block {
                    name: interner.intern("loop"),
                    cmd: None,
                    succs: [SuccRef { name: interner.intern("loop"), span: Span::DUMMY }]
                        .into_iter()
                        .collect(),
                    span: Span::DUMMY,
                }],
            },
            span: Span::DUMMY,
        });

        let out = check_program(&program, &mut arena, &interner, TcOptions::default());
        assert!(!out.has_errors());

        let mut pool = TermPool::new();
        let result = implementation_vc(
            &program.implementations[0],
            out.flow.graph(0),
            &out.symbols,
            &mut arena,
            &mut interner,
            &mut pool,
            VcOptions::default(),
        );
        assert_eq!(result, Err(VcError::CyclicFlowGraph));
    }
}
