//! Scope stack for generic type-variable bindings.
//!
//! Entering a generic context pushes a fresh frame; bindings always go into
//! the innermost frame, lookups search outward. Pushes and pops are paired
//! by the type checker's `ty_var_enter`/`ty_var_exit` wrappers, which also
//! export the frame's concrete bindings on exit.

use rustc_hash::FxHashMap;

use veil_ir::{TyId, TyParamId};

/// A stack of type-variable binding frames.
#[derive(Debug, Default)]
pub struct TyVarScopes {
    frames: Vec<FxHashMap<TyParamId, TyId>>,
}

impl TyVarScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a generic context.
    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Leave a generic context, returning the bindings it made.
    ///
    /// # Panics
    ///
    /// Panics on an unmatched pop; pushes and pops are paired by
    /// construction in the type checker.
    pub fn pop(&mut self) -> FxHashMap<TyParamId, TyId> {
        self.frames.pop().expect("unmatched type variable scope pop")
    }

    /// The binding of a variable, searching innermost-first.
    pub fn get(&self, var: TyParamId) -> Option<TyId> {
        self.frames.iter().rev().find_map(|f| f.get(&var).copied())
    }

    /// Bind a variable in the innermost frame. Re-binding in the same frame
    /// overwrites, which resolution uses for path compression; binding a
    /// conflicting type is ruled out by the caller comparing first.
    pub fn bind(&mut self, var: TyParamId, ty: TyId) {
        self.frames
            .last_mut()
            .expect("type variable binding outside any generic scope")
            .insert(var, ty);
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
