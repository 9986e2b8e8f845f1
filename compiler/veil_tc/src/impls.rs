//! Implementation-to-procedure matching.
//!
//! Every implementation must name a declared procedure and agree with its
//! signature; matching also produces the positional parameter map later
//! stages use to relate implementation state to the procedure's contract.

use rustc_hash::FxHashMap;

use veil_ir::{AstArena, Name, Program, StringInterner, TyId, TyKind, VarId};

use crate::error::TcError;
use crate::globals::Globals;

/// The maps produced by implementation matching.
#[derive(Debug, Default)]
pub struct ImplMap {
    /// Implementation index to procedure index.
    pub procs: FxHashMap<usize, usize>,
    /// Implementation parameter/result to the corresponding procedure
    /// parameter/result, positionally.
    pub params: FxHashMap<VarId, VarId>,
}

impl ImplMap {
    /// The procedure an implementation belongs to.
    pub fn proc_of(&self, impl_idx: usize) -> Option<usize> {
        self.procs.get(&impl_idx).copied()
    }
}

/// Match every implementation against its procedure.
#[tracing::instrument(level = "debug", skip_all)]
pub fn check_implementations(
    program: &Program,
    arena: &AstArena,
    globals: &Globals,
    interner: &StringInterner,
) -> (ImplMap, Vec<TcError>) {
    let mut map = ImplMap::default();
    let mut errors = Vec::new();

    for (i, im) in program.implementations.iter().enumerate() {
        let Some(p) = globals.proc_of(im.sig.name) else {
            errors.push(TcError::NoSuchProcedure { name: im.sig.name, span: im.sig.span });
            continue;
        };
        let proc = &program.procedures[p];

        let counts = [
            (im.sig.ty_params.len(), proc.sig.ty_params.len(), "type parameter"),
            (im.sig.params.len(), proc.sig.params.len(), "parameter"),
            (im.sig.results.len(), proc.sig.results.len(), "result"),
        ];
        let mut count_mismatch = false;
        for (found, declared, what) in counts {
            if found != declared {
                count_mismatch = true;
                errors.push(TcError::SignatureMismatch {
                    name: im.sig.name,
                    span: im.sig.span,
                    detail: format!(
                        "procedure declares {declared} {what}(s), implementation has {found}"
                    ),
                });
            }
        }
        if count_mismatch {
            continue;
        }

        // Rename the procedure's type parameters into the implementation's
        // before comparing declared types, so `<a>` matches `<b>` when used
        // consistently.
        let mut rename: FxHashMap<Name, Name> = FxHashMap::default();
        for (&pp, &ip) in proc.sig.ty_params.iter().zip(&im.sig.ty_params) {
            rename.insert(arena.ty_param(pp).name, arena.ty_param(ip).name);
        }

        map.procs.insert(i, p);
        let pairs = im
            .sig
            .params
            .iter()
            .zip(&proc.sig.params)
            .chain(im.sig.results.iter().zip(&proc.sig.results));
        for (&iv, &pv) in pairs {
            let ivd = arena.var(iv);
            let pvd = arena.var(pv);
            if !tys_match(arena, ivd.ty, pvd.ty, &rename) {
                errors.push(TcError::SignatureMismatch {
                    name: im.sig.name,
                    span: ivd.span,
                    detail: format!(
                        "`{}` has type {}, procedure declares {}",
                        interner.lookup(ivd.name),
                        arena.display_ty(ivd.ty, interner),
                        arena.display_ty(pvd.ty, interner),
                    ),
                });
            }
            map.params.insert(iv, pv);
        }
    }

    (map, errors)
}

/// Structural type equality for signature matching. `where` clauses are
/// ignored; user-type names on the procedure side go through `rename`.
fn tys_match(arena: &AstArena, a: TyId, b: TyId, rename: &FxHashMap<Name, Name>) -> bool {
    let a = strip_dep(arena, a);
    let b = strip_dep(arena, b);
    match (&arena.ty(a).kind, &arena.ty(b).kind) {
        (TyKind::Prim(pa), TyKind::Prim(pb)) => pa == pb,
        (TyKind::Map { indexes: ia, elem: ea }, TyKind::Map { indexes: ib, elem: eb }) => {
            ia.len() == ib.len()
                && ia.iter().zip(ib).all(|(&x, &y)| tys_match(arena, x, y, rename))
                && tys_match(arena, *ea, *eb, rename)
        }
        (TyKind::User { name: na, args: aa }, TyKind::User { name: nb, args: ab }) => {
            let nb = rename.get(nb).copied().unwrap_or(*nb);
            *na == nb
                && aa.len() == ab.len()
                && aa.iter().zip(ab).all(|(&x, &y)| tys_match(arena, x, y, rename))
        }
        (
            TyKind::Indexed { index: ia, payload: pa },
            TyKind::Indexed { index: ib, payload: pb },
        ) => tys_match(arena, *ia, *ib, rename) && tys_match(arena, *pa, *pb, rename),
        (TyKind::Tuple(ea), TyKind::Tuple(eb)) => {
            ea.len() == eb.len()
                && ea.iter().zip(eb).all(|(&x, &y)| tys_match(arena, x, y, rename))
        }
        _ => false,
    }
}

fn strip_dep(arena: &AstArena, mut ty: TyId) -> TyId {
    while let TyKind::Dep { base, .. } = arena.ty(ty).kind {
        ty = base;
    }
    ty
}
