//! Human-readable type rendering for diagnostics.

use crate::ty::{PrimTy, TyKind};
use crate::{AstArena, StringInterner, TyId};

impl AstArena {
    /// Render a type the way it reads in source. `where` clauses render as
    /// their base type; diagnostics never show the predicate.
    pub fn display_ty(&self, ty: TyId, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.push_ty(ty, interner, &mut out);
        out
    }

    fn push_ty(&self, ty: TyId, interner: &StringInterner, out: &mut String) {
        match &self.ty(ty).kind {
            TyKind::Prim(p) => out.push_str(match p {
                PrimTy::Bool => "bool",
                PrimTy::Int => "int",
                PrimTy::Ref => "ref",
                PrimTy::Name => "name",
                PrimTy::Any => "any",
                PrimTy::Error => "<error>",
            }),
            TyKind::Map { indexes, elem } => {
                out.push('[');
                for (i, idx) in indexes.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.push_ty(*idx, interner, out);
                }
                out.push(']');
                self.push_ty(*elem, interner, out);
            }
            TyKind::User { name, args } => {
                out.push_str(interner.lookup(*name));
                for arg in args {
                    out.push(' ');
                    self.push_ty(*arg, interner, out);
                }
            }
            TyKind::Indexed { index, payload } => {
                out.push('<');
                self.push_ty(*index, interner, out);
                out.push('>');
                self.push_ty(*payload, interner, out);
            }
            TyKind::Tuple(elems) => {
                out.push('(');
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.push_ty(*elem, interner, out);
                }
                out.push(')');
            }
            TyKind::Dep { base, .. } => self.push_ty(*base, interner, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Span, Ty};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_map_and_user_types() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let field = interner.intern("Field");
        let user = arena.alloc_ty(Ty::new(
            TyKind::User { name: field, args: vec![TyId::INT] },
            Span::DUMMY,
        ));
        let map = arena.alloc_ty(Ty::new(
            TyKind::Map { indexes: vec![TyId::REF, user], elem: TyId::BOOL },
            Span::DUMMY,
        ));
        assert_eq!(arena.display_ty(map, &interner), "[ref, Field int]bool");
    }

    #[test]
    fn where_clause_is_invisible() {
        let mut arena = AstArena::new();
        let interner = StringInterner::new();
        let pred = arena.alloc_expr(crate::Expr::new(crate::ExprKind::Bool(true), Span::DUMMY));
        let dep = arena.alloc_ty(Ty::new(TyKind::Dep { base: TyId::INT, pred }, Span::DUMMY));
        assert_eq!(arena.display_ty(dep, &interner), "int");
    }
}
