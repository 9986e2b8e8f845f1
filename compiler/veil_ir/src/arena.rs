//! Arena storage for tree nodes.
//!
//! All nodes live in one [`AstArena`] per verification run; ids are plain
//! `u32` indices. Primitive types are pre-allocated at fixed ids so the
//! type checker can refer to `bool`/`int`/`error` without allocating
//! (and so `TyId` equality works for them like reference equality did in
//! pointer-based representations).

use std::fmt;

use crate::ast::{Command, Expr, TyParamDecl, VarDecl};
use crate::ty::{PrimTy, Ty, TyKind};
use crate::Span;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                $name(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id! {
    /// Index of an expression node.
    ExprId
}
define_id! {
    /// Index of a type node.
    TyId
}
define_id! {
    /// Index of a command node.
    CmdId
}
define_id! {
    /// Index of a variable declaration.
    VarId
}
define_id! {
    /// Index of a type parameter declaration.
    TyParamId
}

impl TyId {
    /// Pre-allocated `bool`.
    pub const BOOL: TyId = TyId(0);
    /// Pre-allocated `int`.
    pub const INT: TyId = TyId(1);
    /// Pre-allocated `ref`.
    pub const REF: TyId = TyId(2);
    /// Pre-allocated `name`.
    pub const NAME: TyId = TyId(3);
    /// Pre-allocated `any`.
    pub const ANY: TyId = TyId(4);
    /// Pre-allocated `error`.
    pub const ERROR: TyId = TyId(5);
}

/// Arena for all tree nodes of one run.
pub struct AstArena {
    exprs: Vec<Expr>,
    tys: Vec<Ty>,
    cmds: Vec<Command>,
    vars: Vec<VarDecl>,
    ty_params: Vec<TyParamDecl>,
}

impl AstArena {
    /// Create an arena with the primitive types pre-allocated at the fixed
    /// [`TyId`] constants.
    pub fn new() -> Self {
        let primitives = [
            PrimTy::Bool,  // 0 = TyId::BOOL
            PrimTy::Int,   // 1 = TyId::INT
            PrimTy::Ref,   // 2 = TyId::REF
            PrimTy::Name,  // 3 = TyId::NAME
            PrimTy::Any,   // 4 = TyId::ANY
            PrimTy::Error, // 5 = TyId::ERROR
        ];
        let tys = primitives
            .into_iter()
            .map(|p| Ty::new(TyKind::Prim(p), Span::DUMMY))
            .collect();
        AstArena {
            exprs: Vec::new(),
            tys,
            cmds: Vec::new(),
            vars: Vec::new(),
            ty_params: Vec::new(),
        }
    }

    // ========================================
    // Allocation
    // ========================================

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::from_raw(u32::try_from(self.exprs.len()).expect("expr arena overflow"));
        self.exprs.push(expr);
        id
    }

    pub fn alloc_ty(&mut self, ty: Ty) -> TyId {
        let id = TyId::from_raw(u32::try_from(self.tys.len()).expect("ty arena overflow"));
        self.tys.push(ty);
        id
    }

    pub fn alloc_cmd(&mut self, cmd: Command) -> CmdId {
        let id = CmdId::from_raw(u32::try_from(self.cmds.len()).expect("cmd arena overflow"));
        self.cmds.push(cmd);
        id
    }

    pub fn alloc_var(&mut self, var: VarDecl) -> VarId {
        let id = VarId::from_raw(u32::try_from(self.vars.len()).expect("var arena overflow"));
        self.vars.push(var);
        id
    }

    pub fn alloc_ty_param(&mut self, decl: TyParamDecl) -> TyParamId {
        let id = TyParamId::from_raw(
            u32::try_from(self.ty_params.len()).expect("ty param arena overflow"),
        );
        self.ty_params.push(decl);
        id
    }

    // ========================================
    // Access
    // ========================================

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: TyId) -> &Ty {
        &self.tys[id.index()]
    }

    #[inline]
    pub fn cmd(&self, id: CmdId) -> &Command {
        &self.cmds[id.index()]
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.index()]
    }

    #[inline]
    pub fn ty_param(&self, id: TyParamId) -> &TyParamDecl {
        &self.ty_params[id.index()]
    }

    /// The primitive id for a primitive kind.
    #[inline]
    pub fn prim(&self, prim: PrimTy) -> TyId {
        match prim {
            PrimTy::Bool => TyId::BOOL,
            PrimTy::Int => TyId::INT,
            PrimTy::Ref => TyId::REF,
            PrimTy::Name => TyId::NAME,
            PrimTy::Any => TyId::ANY,
            PrimTy::Error => TyId::ERROR,
        }
    }
}

impl Default for AstArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AstArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstArena")
            .field("exprs", &self.exprs.len())
            .field("tys", &self.tys.len())
            .field("cmds", &self.cmds.len())
            .field("vars", &self.vars.len())
            .field("ty_params", &self.ty_params.len())
            .finish()
    }
}
