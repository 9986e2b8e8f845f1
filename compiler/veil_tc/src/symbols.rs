//! Symbol resolution: use sites to declarations.
//!
//! Builds the use-to-definition relation the later stages consume. Once
//! built, the [`SymbolTable`] is read-only: nothing after this stage may
//! add or change a binding.
//!
//! Scoping: implementation parameters, results, and locals shadow globals;
//! quantifier-bound variables shadow everything; type parameters resolve
//! innermost-first.

use rustc_hash::FxHashMap;

use veil_ir::{
    AstArena, CmdId, CmdKind, ExprId, ExprKind, Name, Program, TyId, TyKind, TyParamId, VarId,
};

use crate::error::TcError;
use crate::globals::{Globals, IdDef};

/// What a type use resolves to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TyDef {
    /// A user type declaration (index into `program.types`).
    Decl(usize),
    /// A type parameter of an enclosing declaration.
    Param(TyParamId),
}

/// The finalized use-to-definition maps.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Identifier atoms to their declarations.
    pub ids: FxHashMap<ExprId, IdDef>,
    /// Function applications to function declarations.
    pub funcs: FxHashMap<ExprId, usize>,
    /// Call commands to procedure declarations.
    pub procs: FxHashMap<CmdId, usize>,
    /// User-type occurrences to type declarations or type parameters.
    pub ty_uses: FxHashMap<TyId, TyDef>,
}

impl SymbolTable {
    /// The variable an identifier atom resolves to, if it is a variable.
    pub fn var_of(&self, expr: ExprId) -> Option<VarId> {
        match self.ids.get(&expr) {
            Some(IdDef::Var(v)) => Some(*v),
            _ => None,
        }
    }

    /// The type parameter a type occurrence resolves to, if any.
    pub fn ty_param_of(&self, ty: TyId) -> Option<TyParamId> {
        match self.ty_uses.get(&ty) {
            Some(TyDef::Param(p)) => Some(*p),
            _ => None,
        }
    }
}

/// Builds the symbol table for one program.
pub struct SymbolTableBuilder<'a> {
    program: &'a Program,
    arena: &'a AstArena,
    globals: &'a Globals,
    var_scopes: Vec<FxHashMap<Name, IdDef>>,
    ty_scopes: Vec<FxHashMap<Name, TyParamId>>,
    table: SymbolTable,
    errors: Vec<TcError>,
}

impl<'a> SymbolTableBuilder<'a> {
    /// Resolve every use site in `program`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(
        program: &'a Program,
        arena: &'a AstArena,
        globals: &'a Globals,
    ) -> (SymbolTable, Vec<TcError>) {
        let mut builder = SymbolTableBuilder {
            program,
            arena,
            globals,
            var_scopes: Vec::new(),
            ty_scopes: Vec::new(),
            table: SymbolTable::default(),
            errors: Vec::new(),
        };
        builder.run();
        (builder.table, builder.errors)
    }

    fn run(&mut self) {
        for td in &self.program.types {
            if let Some(body) = td.synonym {
                self.resolve_ty(body);
            }
        }
        for cd in &self.program.consts {
            self.resolve_ty(cd.ty);
        }
        for &vid in &self.program.globals {
            self.resolve_var_decl(vid);
        }
        for ax in &self.program.axioms {
            self.push_ty_scope(&ax.ty_params);
            self.resolve_expr(ax.expr);
            self.pop_ty_scope();
        }
        for fd in &self.program.functions {
            self.push_ty_scope(&fd.sig.ty_params);
            for &v in fd.sig.params.iter().chain(&fd.sig.results) {
                self.resolve_var_decl(v);
            }
            self.pop_ty_scope();
        }
        for pd in &self.program.procedures {
            self.push_ty_scope(&pd.sig.ty_params);
            for &v in pd.sig.params.iter().chain(&pd.sig.results) {
                self.resolve_var_decl(v);
            }
            self.push_var_scope(pd.sig.params.iter().chain(&pd.sig.results));
            for spec in &pd.specs {
                self.push_ty_scope(&spec.ty_params);
                self.resolve_expr(spec.expr);
                self.pop_ty_scope();
            }
            self.pop_var_scope();
            self.pop_ty_scope();
        }
        for im in &self.program.implementations {
            self.push_ty_scope(&im.sig.ty_params);
            for &v in im.sig.params.iter().chain(&im.sig.results).chain(&im.body.locals) {
                self.resolve_var_decl(v);
            }
            self.push_var_scope(
                im.sig.params.iter().chain(&im.sig.results).chain(&im.body.locals),
            );
            for block in &im.body.blocks {
                if let Some(cmd) = block.cmd {
                    self.resolve_cmd(cmd);
                }
            }
            self.pop_var_scope();
            self.pop_ty_scope();
        }
    }

    // ========================================
    // Scopes
    // ========================================

    fn push_ty_scope(&mut self, params: &[TyParamId]) {
        let mut frame = FxHashMap::default();
        for &p in params {
            frame.insert(self.arena.ty_param(p).name, p);
        }
        self.ty_scopes.push(frame);
    }

    fn pop_ty_scope(&mut self) {
        self.ty_scopes.pop();
    }

    fn push_var_scope(&mut self, vars: impl Iterator<Item = &'a VarId>) {
        let mut frame = FxHashMap::default();
        for &v in vars {
            frame.insert(self.arena.var(v).name, IdDef::Var(v));
        }
        self.var_scopes.push(frame);
    }

    fn pop_var_scope(&mut self) {
        self.var_scopes.pop();
    }

    fn lookup_var(&self, name: Name) -> Option<IdDef> {
        for frame in self.var_scopes.iter().rev() {
            if let Some(&def) = frame.get(&name) {
                return Some(def);
            }
        }
        self.globals.id_of(name)
    }

    fn lookup_ty_param(&self, name: Name) -> Option<TyParamId> {
        for frame in self.ty_scopes.iter().rev() {
            if let Some(&p) = frame.get(&name) {
                return Some(p);
            }
        }
        None
    }

    // ========================================
    // Resolution
    // ========================================

    fn resolve_var_decl(&mut self, vid: VarId) {
        let vd = self.arena.var(vid);
        self.push_ty_scope(&vd.ty_params);
        self.resolve_ty(vd.ty);
        self.pop_ty_scope();
    }

    fn resolve_ty(&mut self, ty: TyId) {
        match &self.arena.ty(ty).kind {
            TyKind::Prim(_) => {}
            TyKind::Map { indexes, elem } => {
                for &i in indexes {
                    self.resolve_ty(i);
                }
                self.resolve_ty(*elem);
            }
            TyKind::User { name, args } => {
                for &a in args {
                    self.resolve_ty(a);
                }
                if let Some(p) = self.lookup_ty_param(*name) {
                    self.table.ty_uses.insert(ty, TyDef::Param(p));
                } else if let Some(decl) = self.globals.type_of(*name) {
                    self.table.ty_uses.insert(ty, TyDef::Decl(decl));
                } else {
                    self.errors
                        .push(TcError::UndefinedType { name: *name, span: self.arena.ty(ty).span });
                }
            }
            TyKind::Indexed { index, payload } => {
                self.resolve_ty(*index);
                self.resolve_ty(*payload);
            }
            TyKind::Tuple(elems) => {
                for &e in elems {
                    self.resolve_ty(e);
                }
            }
            TyKind::Dep { base, pred } => {
                self.resolve_ty(*base);
                self.resolve_expr(*pred);
            }
        }
    }

    fn resolve_expr(&mut self, expr: ExprId) {
        match &self.arena.expr(expr).kind {
            ExprKind::Id { name, ty_args } => {
                for &t in ty_args {
                    self.resolve_ty(t);
                }
                match self.lookup_var(*name) {
                    Some(def) => {
                        self.table.ids.insert(expr, def);
                    }
                    None => self.errors.push(TcError::UndefinedName {
                        name: *name,
                        span: self.arena.expr(expr).span,
                    }),
                }
            }
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Null => {}
            ExprKind::Unary { operand, .. } | ExprKind::Old(operand) => {
                self.resolve_expr(*operand);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(*lhs);
                self.resolve_expr(*rhs);
            }
            ExprKind::Fun { name, ty_args, args } => {
                for &t in ty_args {
                    self.resolve_ty(t);
                }
                for &a in args {
                    self.resolve_expr(a);
                }
                match self.globals.func_of(*name) {
                    Some(f) => {
                        self.table.funcs.insert(expr, f);
                    }
                    None => self.errors.push(TcError::UndefinedName {
                        name: *name,
                        span: self.arena.expr(expr).span,
                    }),
                }
            }
            ExprKind::Quant { ty_params, bound, body, .. } => {
                self.push_ty_scope(ty_params);
                for &v in bound {
                    self.resolve_var_decl(v);
                }
                let mut frame = FxHashMap::default();
                for &v in bound {
                    frame.insert(self.arena.var(v).name, IdDef::Var(v));
                }
                self.var_scopes.push(frame);
                self.resolve_expr(*body);
                self.pop_var_scope();
                self.pop_ty_scope();
            }
            ExprKind::Select { map, indexes } => {
                self.resolve_expr(*map);
                for &i in indexes {
                    self.resolve_expr(i);
                }
            }
            ExprKind::Update { map, indexes, value } => {
                self.resolve_expr(*map);
                for &i in indexes {
                    self.resolve_expr(i);
                }
                self.resolve_expr(*value);
            }
            ExprKind::Cast { operand, ty } => {
                self.resolve_expr(*operand);
                self.resolve_ty(*ty);
            }
        }
    }

    fn resolve_cmd(&mut self, cmd: CmdId) {
        match &self.arena.cmd(cmd).kind {
            CmdKind::Assign { lhs, rhs } => {
                self.resolve_expr(*lhs);
                self.resolve_expr(*rhs);
            }
            CmdKind::Assert { ty_params, expr } | CmdKind::Assume { ty_params, expr } => {
                self.push_ty_scope(ty_params);
                self.resolve_expr(*expr);
                self.pop_ty_scope();
            }
            CmdKind::Call { proc, ty_args, results, args } => {
                for &t in ty_args {
                    self.resolve_ty(t);
                }
                for &r in results {
                    self.resolve_expr(r);
                }
                for &a in args {
                    self.resolve_expr(a);
                }
                match self.globals.proc_of(*proc) {
                    Some(p) => {
                        self.table.procs.insert(cmd, p);
                    }
                    None => self.errors.push(TcError::UndefinedName {
                        name: *proc,
                        span: self.arena.cmd(cmd).span,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::GlobalsCollector;
    use veil_ir::{
        Axiom, Block, Body, Expr, Implementation, Procedure, QuantKind, Signature, Span,
        StringInterner, Ty, TyParamDecl, VarDecl,
    };

    fn id(arena: &mut AstArena, name: Name) -> ExprId {
        arena.alloc_expr(Expr::new(ExprKind::Id { name, ty_args: vec![] }, Span::DUMMY))
    }

    fn run(program: &Program, arena: &AstArena) -> (SymbolTable, Vec<TcError>) {
        let (globals, errors) = GlobalsCollector::collect(program, arena);
        assert!(errors.is_empty(), "{errors:?}");
        SymbolTableBuilder::build(program, arena, &globals)
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();
        let ghost = interner.intern("ghost");
        let use_site = id(&mut arena, ghost);
        program.axioms.push(Axiom { ty_params: vec![], expr: use_site, span: Span::DUMMY });

        let (table, errors) = run(&program, &arena);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TcError::UndefinedName { name, .. } if name == ghost));
        assert!(table.ids.is_empty());
    }

    #[test]
    fn locals_shadow_globals() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();
        let x = interner.intern("x");
        let global = arena.alloc_var(VarDecl {
            name: x,
            ty: veil_ir::TyId::INT,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        program.globals.push(global);

        let local = arena.alloc_var(VarDecl {
            name: x,
            ty: veil_ir::TyId::BOOL,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        let use_site = id(&mut arena, x);
        let cmd = arena.alloc_cmd(veil_ir::Command {
            kind: CmdKind::Assume { ty_params: vec![], expr: use_site },
            span: Span::DUMMY,
        });
        let p = interner.intern("p");
        let sig = Signature {
            name: p,
            ty_params: vec![],
            params: vec![],
            results: vec![],
            span: Span::DUMMY,
        };
        program.procedures.push(Procedure { sig: sig.clone(), specs: vec![], span: Span::DUMMY });
        program.implementations.push(Implementation {
            sig,
            body: Body {
                locals: vec![local],
                blocks: vec![Block {
                    name: interner.intern("b1"),
                    cmd: Some(cmd),
                    succs: Default::default(),
                    span: Span::DUMMY,
                }],
            },
            span: Span::DUMMY,
        });

        let (table, errors) = run(&program, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(table.var_of(use_site), Some(local));
    }

    #[test]
    fn quantifier_bound_variables_shadow_everything() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();
        let x = interner.intern("x");
        let global = arena.alloc_var(VarDecl {
            name: x,
            ty: veil_ir::TyId::INT,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        program.globals.push(global);

        let bound = arena.alloc_var(VarDecl {
            name: x,
            ty: veil_ir::TyId::REF,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        let body = id(&mut arena, x);
        let quant = arena.alloc_expr(Expr::new(
            ExprKind::Quant { kind: QuantKind::Forall, ty_params: vec![], bound: vec![bound], body },
            Span::DUMMY,
        ));
        program.axioms.push(Axiom { ty_params: vec![], expr: quant, span: Span::DUMMY });

        let (table, errors) = run(&program, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(table.var_of(body), Some(bound));
    }

    #[test]
    fn type_uses_resolve_to_params_or_declarations() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();

        // type Heap; function f<a>(x: a, h: Heap) returns (r: a);
        let heap = interner.intern("Heap");
        program.types.push(veil_ir::TypeDecl { name: heap, synonym: None, span: Span::DUMMY });
        let a = interner.intern("a");
        let a_decl = arena.alloc_ty_param(TyParamDecl { name: a, span: Span::DUMMY });
        let a_use = arena.alloc_ty(Ty::new(TyKind::User { name: a, args: vec![] }, Span::DUMMY));
        let heap_use =
            arena.alloc_ty(Ty::new(TyKind::User { name: heap, args: vec![] }, Span::DUMMY));
        let a_result =
            arena.alloc_ty(Ty::new(TyKind::User { name: a, args: vec![] }, Span::DUMMY));
        let x = arena.alloc_var(VarDecl {
            name: interner.intern("x"),
            ty: a_use,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        let h = arena.alloc_var(VarDecl {
            name: interner.intern("h"),
            ty: heap_use,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        let r = arena.alloc_var(VarDecl {
            name: interner.intern("r"),
            ty: a_result,
            ty_params: vec![],
            span: Span::DUMMY,
        });
        program.functions.push(veil_ir::FunctionDecl {
            sig: Signature {
                name: interner.intern("f"),
                ty_params: vec![a_decl],
                params: vec![x, h],
                results: vec![r],
                span: Span::DUMMY,
            },
            span: Span::DUMMY,
        });

        let (table, errors) = run(&program, &arena);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(table.ty_uses.get(&a_use), Some(&TyDef::Param(a_decl)));
        assert_eq!(table.ty_uses.get(&a_result), Some(&TyDef::Param(a_decl)));
        assert_eq!(table.ty_uses.get(&heap_use), Some(&TyDef::Decl(0)));
        assert_eq!(table.ty_param_of(a_use), Some(a_decl));
    }

    #[test]
    fn unknown_types_are_reported() {
        let mut arena = AstArena::new();
        let mut interner = StringInterner::new();
        let mut program = Program::default();
        let wat = interner.intern("Wat");
        let ty = arena.alloc_ty(Ty::new(TyKind::User { name: wat, args: vec![] }, Span::DUMMY));
        program.consts.push(veil_ir::ConstDecl {
            name: interner.intern("c"),
            ty,
            span: Span::DUMMY,
        });
        let (_, errors) = run(&program, &arena);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TcError::UndefinedType { name, .. } if name == wat));
    }
}
