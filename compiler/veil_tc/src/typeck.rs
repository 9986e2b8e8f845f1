//! The type checker.
//!
//! Walks expressions bottom-up, assigning every visited node exactly one
//! type (cached, so shared queries are O(1)). Comparison is structural via
//! the subtype relation `sub`; `strip` removes `where` refinements and
//! collapses one-element tuples before any comparison. Free generic type
//! variables unify instead of failing: comparing a free variable against
//! another type binds it for the rest of its scope, and the bindings that
//! resolved to concrete types are exported per tree node as the implicit
//! specialization.
//!
//! Errors accumulate; the error type absorbs in every comparison so one bad
//! subexpression does not cascade.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};

use veil_ir::{
    AstArena, BinaryOp, CmdId, CmdKind, ExprId, ExprKind, PrimTy, Program, Span, StringInterner,
    Ty, TyId, TyKind, TyParamId, UnaryOp, VarId,
};

use crate::error::TcError;
use crate::globals::IdDef;
use crate::scopes::TyVarScopes;
use crate::symbols::SymbolTable;

/// Type checker configuration.
#[derive(Copy, Clone, Debug)]
pub struct TcOptions {
    /// Accept deprecated constructs: an indexed type where its bare payload
    /// is expected, and plain `name` where an indexed `name` is expected.
    pub accept_old: bool,
    /// Seed for the symmetric unification tie-break. The tie-break is
    /// cosmetic (either choice is sound) and the resolved identity is not
    /// canonical; the seed only makes runs reproducible.
    pub unify_seed: u64,
}

impl Default for TcOptions {
    fn default() -> Self {
        TcOptions { accept_old: false, unify_seed: 123 }
    }
}

/// The expression-to-type cache, the checker's main product.
#[derive(Debug, Default)]
pub struct ExprTypes {
    map: FxHashMap<ExprId, TyId>,
}

impl ExprTypes {
    /// The type assigned to an expression, if it was visited.
    pub fn get(&self, expr: ExprId) -> Option<TyId> {
        self.map.get(&expr).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A tree node that opened a generic binding scope.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SpecSite {
    Expr(ExprId),
    Cmd(CmdId),
}

/// Implicit specializations: per scope-owning node, the type variables that
/// were inferred to concrete types while checking it.
#[derive(Debug, Default)]
pub struct ImplicitSpec {
    map: FxHashMap<SpecSite, Vec<(TyParamId, TyId)>>,
}

impl ImplicitSpec {
    /// The specializations recorded against a node.
    pub fn at(&self, site: SpecSite) -> &[(TyParamId, TyId)] {
        self.map.get(&site).map(Vec::as_slice).unwrap_or(&[])
    }

    fn record(&mut self, site: SpecSite, resolved: Vec<(TyParamId, TyId)>) {
        self.map.insert(site, resolved);
    }
}

/// The type checker for one program.
pub struct TypeChecker<'a> {
    program: &'a Program,
    arena: &'a mut AstArena,
    interner: &'a StringInterner,
    symbols: &'a SymbolTable,
    options: TcOptions,
    rng: StdRng,
    types: ExprTypes,
    bindings: TyVarScopes,
    /// Type parameters currently introduced by an enclosing declaration;
    /// those are rigid, everything else unifies.
    enclosing: Vec<FxHashSet<TyParamId>>,
    implicit: ImplicitSpec,
    errors: Vec<TcError>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        program: &'a Program,
        arena: &'a mut AstArena,
        interner: &'a StringInterner,
        symbols: &'a SymbolTable,
        options: TcOptions,
    ) -> Self {
        TypeChecker {
            program,
            arena,
            interner,
            symbols,
            options,
            rng: StdRng::seed_from_u64(options.unify_seed),
            types: ExprTypes::default(),
            bindings: TyVarScopes::new(),
            enclosing: Vec::new(),
            implicit: ImplicitSpec::default(),
            errors: Vec::new(),
        }
    }

    /// Check the whole program.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(mut self) -> (ExprTypes, ImplicitSpec, Vec<TcError>) {
        let program = self.program;
        for &v in &program.globals {
            self.check_var_decl_preds(v);
        }
        for cd in &program.consts {
            self.check_ty_preds(cd.ty);
        }
        for ax in &program.axioms {
            self.enclosing_push(&ax.ty_params);
            let t = self.check_expr(ax.expr);
            let span = self.arena.expr(ax.expr).span;
            self.check(t, TyId::BOOL, span);
            self.enclosing_pop();
        }
        for fd in &program.functions {
            self.enclosing_push(&fd.sig.ty_params);
            for &v in fd.sig.params.iter().chain(&fd.sig.results) {
                self.check_var_decl_preds(v);
            }
            self.enclosing_pop();
        }
        for pd in &program.procedures {
            self.enclosing_push(&pd.sig.ty_params);
            for &v in pd.sig.params.iter().chain(&pd.sig.results) {
                self.check_var_decl_preds(v);
            }
            for spec in &pd.specs {
                match spec.kind {
                    veil_ir::SpecKind::Requires | veil_ir::SpecKind::Ensures => {
                        self.enclosing_push(&spec.ty_params);
                        let t = self.check_expr(spec.expr);
                        let span = self.arena.expr(spec.expr).span;
                        self.check(t, TyId::BOOL, span);
                        self.enclosing_pop();
                    }
                    // Modifies lists identifiers, not conditions.
                    veil_ir::SpecKind::Modifies => {}
                }
            }
            self.enclosing_pop();
        }
        for im in &program.implementations {
            self.enclosing_push(&im.sig.ty_params);
            for &v in im.sig.params.iter().chain(&im.sig.results).chain(&im.body.locals) {
                self.check_var_decl_preds(v);
            }
            for block in &im.body.blocks {
                if let Some(cmd) = block.cmd {
                    self.check_cmd(cmd);
                }
            }
            self.enclosing_pop();
        }
        (self.types, self.implicit, self.errors)
    }

    // ========================================
    // Stripping and resolution
    // ========================================

    /// Remove `where` refinements and collapse one-element tuples; applied
    /// before any comparison.
    pub fn strip(&self, mut ty: TyId) -> TyId {
        loop {
            match &self.arena.ty(ty).kind {
                TyKind::Dep { base, .. } => ty = *base,
                TyKind::Tuple(elems) if elems.len() == 1 => ty = elems[0],
                _ => return ty,
            }
        }
    }

    fn is_error_ty(&self, ty: TyId) -> bool {
        self.arena.ty(self.strip(ty)).is_error()
    }

    fn prim_of(&self, ty: TyId) -> Option<PrimTy> {
        match self.arena.ty(ty).kind {
            TyKind::Prim(p) => Some(p),
            _ => None,
        }
    }

    fn as_indexed(&self, ty: TyId) -> Option<(TyId, TyId)> {
        match self.arena.ty(ty).kind {
            TyKind::Indexed { index, payload } => Some((index, payload)),
            _ => None,
        }
    }

    /// The type parameter a type occurrence denotes, if any.
    fn ty_var_decl(&self, ty: TyId) -> Option<TyParamId> {
        self.symbols.ty_param_of(ty)
    }

    /// A type-variable occurrence is free (unifiable) when its binder is
    /// not on the enclosing-declaration stack.
    fn is_ty_var(&self, ty: TyId) -> bool {
        match self.ty_var_decl(ty) {
            Some(p) => !self.enclosing.iter().any(|f| f.contains(&p)),
            None => false,
        }
    }

    /// Follow bindings to the most-resolved form, compressing as it goes.
    fn real_type(&mut self, mut ty: TyId) -> TyId {
        loop {
            let Some(p) = self.ty_var_decl(ty) else { return ty };
            let Some(next) = self.bindings.get(p) else { return ty };
            self.bindings.bind(p, next);
            ty = next;
        }
    }

    /// Substitute resolved types for known type variables, rebuilding only
    /// the parts that change.
    fn subst_real_type(&mut self, ty: TyId) -> TyId {
        let kind = self.arena.ty(ty).kind.clone();
        match kind {
            TyKind::Tuple(elems) => {
                let new: Vec<TyId> = elems.iter().map(|&e| self.subst_real_type(e)).collect();
                if new == elems {
                    ty
                } else {
                    self.alloc_like(ty, TyKind::Tuple(new))
                }
            }
            TyKind::Map { indexes, elem } => {
                let new_idx: Vec<TyId> = indexes.iter().map(|&i| self.subst_real_type(i)).collect();
                let new_elem = self.subst_real_type(elem);
                if new_idx == indexes && new_elem == elem {
                    ty
                } else {
                    self.alloc_like(ty, TyKind::Map { indexes: new_idx, elem: new_elem })
                }
            }
            TyKind::Indexed { index, payload } => {
                let new_index = self.subst_real_type(index);
                let new_payload = self.subst_real_type(payload);
                if new_index == index && new_payload == payload {
                    ty
                } else {
                    self.alloc_like(ty, TyKind::Indexed { index: new_index, payload: new_payload })
                }
            }
            TyKind::Dep { base, pred } => {
                let new_base = self.subst_real_type(base);
                if new_base == base {
                    ty
                } else {
                    self.alloc_like(ty, TyKind::Dep { base: new_base, pred })
                }
            }
            TyKind::Prim(_) | TyKind::User { .. } => self.real_type(ty),
        }
    }

    fn alloc_like(&mut self, like: TyId, kind: TyKind) -> TyId {
        let span = self.arena.ty(like).span;
        self.arena.alloc_ty(Ty::new(kind, span))
    }

    /// The first free type variable anywhere inside `ty`, if any.
    fn find_free_var(&self, ty: TyId) -> Option<TyParamId> {
        if self.is_ty_var(ty) {
            return self.ty_var_decl(ty);
        }
        match &self.arena.ty(ty).kind {
            TyKind::Prim(_) | TyKind::User { .. } => None,
            TyKind::Map { indexes, elem } => indexes
                .iter()
                .find_map(|&i| self.find_free_var(i))
                .or_else(|| self.find_free_var(*elem)),
            TyKind::Indexed { index, payload } => {
                self.find_free_var(*index).or_else(|| self.find_free_var(*payload))
            }
            TyKind::Tuple(elems) => elems.iter().find_map(|&e| self.find_free_var(e)),
            TyKind::Dep { base, .. } => self.find_free_var(*base),
        }
    }

    /// Substitute known type variables and require the result to be fully
    /// concrete. An unresolved variable is a specialization error; the
    /// error type is returned so downstream checks do not cascade.
    fn check_real_type(&mut self, ty: TyId, span: Span) -> TyId {
        let ty = self.subst_real_type(ty);
        if let Some(p) = self.find_free_var(ty) {
            self.errors.push(TcError::RequiresSpecialization {
                ty: self.display(ty),
                span,
                decl: self.arena.ty_param(p).span,
            });
            return TyId::ERROR;
        }
        ty
    }

    // ========================================
    // Subtyping and unification
    // ========================================

    /// The structural subtype relation: `a` usable where `b` is expected.
    /// A comparison that reaches a free type variable unifies and succeeds.
    pub fn sub(&mut self, a: TyId, b: TyId) -> bool {
        let a = self.strip(a);
        let b = self.strip(b);

        if a == b {
            return true;
        }
        // The error type absorbs: do not trickle errors up.
        if self.is_error_ty(a) || self.is_error_ty(b) {
            return true;
        }
        if self.prim_of(b) == Some(PrimTy::Any) {
            return true;
        }

        let a = self.real_type(a);
        let b = self.real_type(b);
        if self.is_ty_var(a) || self.is_ty_var(b) {
            self.equal_ty_var(a, b);
            return true;
        }

        // Compatibility with deprecated syntax, only in accept-old mode.
        if self.options.accept_old {
            // Allow <X>T to be used where T is expected.
            if let Some((_, payload)) = self.as_indexed(a) {
                if self.as_indexed(b).is_none() && self.sub(payload, b) {
                    return true;
                }
            }
            // Allow "name" where "<*>name" is expected.
            if self.prim_of(a) == Some(PrimTy::Name) {
                if let Some((_, payload)) = self.as_indexed(b) {
                    if self.prim_of(self.strip(payload)) == Some(PrimTy::Name) {
                        return true;
                    }
                }
            }
        }

        let ka = self.arena.ty(a).kind.clone();
        let kb = self.arena.ty(b).kind.clone();
        match (ka, kb) {
            (TyKind::Prim(pa), TyKind::Prim(pb)) => pa == pb,
            (TyKind::Map { indexes: ia, elem: ea }, TyKind::Map { indexes: ib, elem: eb }) => {
                if ia.len() != ib.len() {
                    return false;
                }
                // Index types are contravariant, the element is covariant.
                for (&x, &y) in ia.iter().zip(&ib) {
                    if !self.sub(y, x) {
                        return false;
                    }
                }
                self.sub(ea, eb)
            }
            (TyKind::User { name: na, .. }, TyKind::User { name: nb, .. }) => na == nb,
            (
                TyKind::Indexed { index: ia, payload: pa },
                TyKind::Indexed { index: ib, payload: pb },
            ) => self.sub(ia, ib) && self.sub(ib, ia) && self.sub(pa, pb),
            (TyKind::Tuple(ea), TyKind::Tuple(eb)) => {
                if ea.len() != eb.len() {
                    return false;
                }
                for (&x, &y) in ea.iter().zip(&eb) {
                    if !self.sub(x, y) {
                        return false;
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Unify two types of which at least one is a free variable. The
    /// symmetric case picks the absorbing side at random; either choice is
    /// sound and the resolved identity is not canonical.
    fn equal_ty_var(&mut self, a: TyId, b: TyId) {
        let a_var = self.is_ty_var(a);
        let b_var = self.is_ty_var(b);
        if !a_var && !b_var {
            return;
        }
        let (a, b) = if !a_var || (b_var && self.rng.gen::<bool>()) { (b, a) } else { (a, b) };
        let var = self.ty_var_decl(a).expect("tie-break selected a non-variable");
        if self.ty_var_decl(b) != Some(var) {
            tracing::debug!(
                var = self.interner.lookup(self.arena.ty_param(var).name),
                ty = %self.display(b),
                "binding type variable"
            );
            debug_assert!(self.bindings.depth() > 0, "no open generic binding scope");
            self.bindings.bind(var, b);
        }
    }

    /// Report when `a` cannot be used where `b` is expected.
    pub fn check(&mut self, a: TyId, b: TyId, span: Span) {
        if self.sub(a, b) {
            return;
        }
        let found = self.display(a);
        let expected = self.display(b);
        self.errors.push(TcError::NotSubtype { found, expected, span });
    }

    /// Like `check`, but for operators whose operands must agree.
    pub fn check_exact(&mut self, a: TyId, b: TyId, span: Span) {
        // TODO: arguably this should require both directions; kept loose
        // because tightening it rejects programs that currently verify.
        if self.sub(a, b) || self.sub(b, a) {
            return;
        }
        let lhs = self.display(a);
        let rhs = self.display(b);
        self.errors.push(TcError::UnrelatedTypes { lhs, rhs, span });
    }

    // ========================================
    // Generic scopes
    // ========================================

    fn ty_var_enter(&mut self) {
        self.bindings.push();
    }

    fn ty_var_exit(&mut self, site: SpecSite) {
        let frame = self.bindings.pop();
        let mut resolved: Vec<(TyParamId, TyId)> =
            frame.into_iter().filter(|&(_, t)| !self.is_ty_var(t)).collect();
        if !resolved.is_empty() {
            resolved.sort_by_key(|&(p, _)| p);
            self.implicit.record(site, resolved);
        }
    }

    fn enclosing_push(&mut self, params: &[TyParamId]) {
        self.enclosing.push(params.iter().copied().collect());
    }

    fn enclosing_pop(&mut self) {
        self.enclosing.pop();
    }

    /// Bind explicitly supplied generic arguments to the declaration's type
    /// parameters, positionally.
    fn map_explicit_generics(&mut self, params: &[TyParamId], args: &[TyId]) {
        if params.len() < args.len() {
            let span = self.arena.ty(args[params.len()]).span;
            self.errors.push(TcError::TooManyGenericArguments { span });
            return;
        }
        for (&p, &a) in params.iter().zip(args) {
            self.bindings.bind(p, a);
        }
    }

    // ========================================
    // Expressions
    // ========================================

    /// Check an expression, computing and caching its type.
    pub fn check_expr(&mut self, expr: ExprId) -> TyId {
        if let Some(t) = self.types.get(expr) {
            return t;
        }
        let node = self.arena.expr(expr).clone();
        let span = node.span;
        let t = match node.kind {
            ExprKind::Id { ty_args, .. } => match self.symbols.ids.get(&expr).copied() {
                Some(IdDef::Var(v)) => {
                    let vd = self.arena.var(v).clone();
                    self.ty_var_enter();
                    self.map_explicit_generics(&vd.ty_params, &ty_args);
                    let t = self.check_real_type(vd.ty, span);
                    self.ty_var_exit(SpecSite::Expr(expr));
                    t
                }
                Some(IdDef::Const(c)) => self.program.consts[c].ty,
                // Unresolved uses were reported by symbol resolution.
                None => TyId::ERROR,
            },
            ExprKind::Int(_) => TyId::INT,
            ExprKind::Bool(_) => TyId::BOOL,
            ExprKind::Null => TyId::REF,
            ExprKind::Unary { op, operand } => {
                let t0 = self.check_expr(operand);
                let t = self.strip(t0);
                let operand_span = self.arena.expr(operand).span;
                match op {
                    UnaryOp::Neg => {
                        self.check(t, TyId::INT, operand_span);
                        TyId::INT
                    }
                    UnaryOp::Not => {
                        self.check(t, TyId::BOOL, operand_span);
                        TyId::BOOL
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lt = self.check_expr(lhs);
                let l = self.strip(lt);
                let rt = self.check_expr(rhs);
                let r = self.strip(rt);
                let lspan = self.arena.expr(lhs).span;
                let rspan = self.arena.expr(rhs).span;
                match op {
                    BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Mod => {
                        self.check(l, TyId::INT, lspan);
                        self.check(r, TyId::INT, rspan);
                        TyId::INT
                    }
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Gt => {
                        self.check(l, TyId::INT, lspan);
                        self.check(r, TyId::INT, rspan);
                        TyId::BOOL
                    }
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Implies | BinaryOp::Iff => {
                        self.check(l, TyId::BOOL, lspan);
                        self.check(r, TyId::BOOL, rspan);
                        TyId::BOOL
                    }
                    BinaryOp::Subtype => {
                        self.check(l, r, lspan);
                        TyId::BOOL
                    }
                    BinaryOp::Eq | BinaryOp::Ne => {
                        // Equality compares within its own binding scope so
                        // both operands specialize consistently.
                        self.ty_var_enter();
                        self.check_exact(l, r, span);
                        self.ty_var_exit(SpecSite::Expr(expr));
                        TyId::BOOL
                    }
                }
            }
            ExprKind::Old(inner) => self.check_expr(inner),
            ExprKind::Fun { ty_args, args, .. } => match self.symbols.funcs.get(&expr).copied() {
                Some(f) => {
                    let sig = self.program.functions[f].sig.clone();
                    self.ty_var_enter();
                    self.map_explicit_generics(&sig.ty_params, &ty_args);
                    let actuals: Vec<TyId> = args
                        .iter()
                        .map(|&a| {
                            let t = self.check_expr(a);
                            self.strip(t)
                        })
                        .collect();
                    let formals: Vec<TyId> = sig
                        .params
                        .iter()
                        .map(|&v| {
                            let t = self.arena.var(v).ty;
                            self.strip(t)
                        })
                        .collect();
                    let at = self.mk_tuple(actuals);
                    let fat = self.mk_tuple(formals);
                    self.check(at, fat, span);
                    let results: Vec<TyId> = sig.results.iter().map(|&v| self.arena.var(v).ty).collect();
                    let rt = self.mk_tuple(results);
                    let rt = self.check_real_type(rt, span);
                    let rt = self.strip(rt);
                    self.ty_var_exit(SpecSite::Expr(expr));
                    rt
                }
                None => TyId::ERROR,
            },
            ExprKind::Quant { ty_params, bound, body, .. } => {
                self.enclosing_push(&ty_params);
                for &v in &bound {
                    self.check_var_decl_preds(v);
                }
                let t = self.check_expr(body);
                let body_span = self.arena.expr(body).span;
                self.check(t, TyId::BOOL, body_span);
                self.enclosing_pop();
                TyId::BOOL
            }
            ExprKind::Select { map, indexes } => {
                let mt0 = self.check_expr(map);
                let mt = self.strip(mt0);
                if self.is_error_ty(mt) {
                    TyId::ERROR
                } else {
                    match self.arena.ty(mt).kind.clone() {
                        TyKind::Map { indexes: declared, elem } => {
                            self.ty_var_enter();
                            let actual: Vec<TyId> =
                                indexes.iter().map(|&i| self.check_expr(i)).collect();
                            let at = self.mk_tuple(actual);
                            let dt = self.mk_tuple(declared);
                            self.check(at, dt, span);
                            let et = self.check_real_type(elem, span);
                            self.ty_var_exit(SpecSite::Expr(expr));
                            et
                        }
                        _ => {
                            let found = self.display(mt);
                            let map_span = self.arena.expr(map).span;
                            self.errors.push(TcError::NotAMapOrArray { found, span: map_span });
                            TyId::ERROR
                        }
                    }
                }
            }
            ExprKind::Update { map, indexes, value } => {
                self.ty_var_enter();
                let mt0 = self.check_expr(map);
                let mt = self.strip(mt0);
                let actual: Vec<TyId> = indexes
                    .iter()
                    .map(|&i| {
                        let t = self.check_expr(i);
                        self.strip(t)
                    })
                    .collect();
                let vt0 = self.check_expr(value);
                let vt = self.strip(vt0);
                let any_error = self.is_error_ty(mt)
                    || self.is_error_ty(vt)
                    || actual.iter().any(|&t| self.is_error_ty(t));
                let t = if any_error {
                    TyId::ERROR
                } else {
                    match self.arena.ty(mt).kind.clone() {
                        TyKind::Map { indexes: declared, elem } => {
                            let at = self.mk_tuple(actual);
                            let dt = self.mk_tuple(declared);
                            self.check(at, dt, span);
                            let value_span = self.arena.expr(value).span;
                            self.check(vt, elem, value_span);
                            mt
                        }
                        _ => {
                            let found = self.display(mt);
                            let map_span = self.arena.expr(map).span;
                            self.errors.push(TcError::NotAMapOrArray { found, span: map_span });
                            TyId::ERROR
                        }
                    }
                };
                self.ty_var_exit(SpecSite::Expr(expr));
                t
            }
            ExprKind::Cast { operand, ty } => {
                self.check_expr(operand);
                ty
            }
        };
        self.types.map.insert(expr, t);
        t
    }

    // ========================================
    // Commands and declarations
    // ========================================

    /// Check one command.
    pub fn check_cmd(&mut self, cmd: CmdId) {
        let node = self.arena.cmd(cmd).clone();
        let span = node.span;
        match node.kind {
            CmdKind::Assign { lhs, rhs } => {
                let lt0 = self.check_expr(lhs);
                let lt = self.strip(lt0);
                let rt0 = self.check_expr(rhs);
                let rt = self.strip(rt0);
                self.ty_var_enter();
                self.check(rt, lt, span);
                self.ty_var_exit(SpecSite::Cmd(cmd));
            }
            CmdKind::Assert { ty_params, expr } | CmdKind::Assume { ty_params, expr } => {
                self.enclosing_push(&ty_params);
                let t = self.check_expr(expr);
                self.check(t, TyId::BOOL, span);
                self.enclosing_pop();
            }
            CmdKind::Call { ty_args, results, args, .. } => {
                let Some(&p) = self.symbols.procs.get(&cmd) else {
                    // Unresolved calls were reported by symbol resolution.
                    return;
                };
                let sig = self.program.procedures[p].sig.clone();
                self.ty_var_enter();
                self.map_explicit_generics(&sig.ty_params, &ty_args);

                // Actual arguments against the formals.
                let actuals: Vec<TyId> = args
                    .iter()
                    .map(|&a| {
                        let t = self.check_expr(a);
                        self.strip(t)
                    })
                    .collect();
                let formals: Vec<TyId> = sig
                    .params
                    .iter()
                    .map(|&v| {
                        let t = self.arena.var(v).ty;
                        self.strip(t)
                    })
                    .collect();
                let at = self.mk_tuple(actuals);
                let fat = self.mk_tuple(formals);
                self.check(at, fat, span);

                // Declared results against the assigned identifiers.
                let assigned: Vec<TyId> = results
                    .iter()
                    .map(|&r| {
                        let t = self.check_expr(r);
                        self.strip(t)
                    })
                    .collect();
                let declared: Vec<TyId> = sig
                    .results
                    .iter()
                    .map(|&v| {
                        let t = self.arena.var(v).ty;
                        self.strip(t)
                    })
                    .collect();
                let lt = self.mk_tuple(assigned);
                let rt = self.mk_tuple(declared);
                self.check(rt, lt, span);

                self.ty_var_exit(SpecSite::Cmd(cmd));
            }
        }
    }

    /// Check the `where` predicates inside a variable declaration's type.
    fn check_var_decl_preds(&mut self, var: VarId) {
        let vd = self.arena.var(var).clone();
        self.enclosing_push(&vd.ty_params);
        self.check_ty_preds(vd.ty);
        self.enclosing_pop();
    }

    fn check_ty_preds(&mut self, ty: TyId) {
        let kind = self.arena.ty(ty).kind.clone();
        match kind {
            TyKind::Prim(_) | TyKind::User { .. } => {}
            TyKind::Map { indexes, elem } => {
                for i in indexes {
                    self.check_ty_preds(i);
                }
                self.check_ty_preds(elem);
            }
            TyKind::Indexed { index, payload } => {
                self.check_ty_preds(index);
                self.check_ty_preds(payload);
            }
            TyKind::Tuple(elems) => {
                for e in elems {
                    self.check_ty_preds(e);
                }
            }
            TyKind::Dep { base, pred } => {
                let t = self.check_expr(pred);
                let pred_span = self.arena.expr(pred).span;
                self.check(t, TyId::BOOL, pred_span);
                self.check_ty_preds(base);
            }
        }
    }

    // ========================================
    // Helpers
    // ========================================

    fn mk_tuple(&mut self, elems: Vec<TyId>) -> TyId {
        self.arena.alloc_ty(Ty::new(TyKind::Tuple(elems), Span::DUMMY))
    }

    fn display(&self, ty: TyId) -> String {
        self.arena.display_ty(ty, self.interner)
    }

    /// Tear down the checker, returning everything it computed. `run`
    /// drives a whole program; this is for callers (and tests) that drive
    /// `check_expr`/`check_cmd` directly.
    pub fn finish(self) -> (ExprTypes, ImplicitSpec, Vec<TcError>) {
        (self.types, self.implicit, self.errors)
    }
}
