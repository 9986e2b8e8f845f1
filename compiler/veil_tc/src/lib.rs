//! Semantic analysis for the Veil verifier.
//!
//! The stages, in pipeline order:
//!
//! 1. [`globals`] — namespaces for types, procedures/functions, and
//!    constants/variables; duplicate names; type synonym cycles.
//! 2. [`symbols`] — use-to-definition resolution, finalized before anything
//!    downstream reads it.
//! 3. [`impls`] — implementation-to-procedure matching.
//! 4. [`flow`] — per-body control-flow graphs.
//! 5. [`typeck`] — structural, generics-aware type checking.
//!
//! [`check_program`] runs them gated: a stage that reports errors
//! short-circuits the rest, so later stages never see unresolved or
//! mismatched input. Warnings (unreachable blocks) do not gate.

mod error;
mod flow;
mod globals;
mod impls;
mod scopes;
mod symbols;
mod typeck;

pub use error::{has_errors, TcError};
pub use flow::{BlockId, FlowGraph, FlowGraphs};
pub use globals::{Globals, GlobalsCollector, IdDef};
pub use impls::{check_implementations, ImplMap};
pub use scopes::TyVarScopes;
pub use symbols::{SymbolTable, SymbolTableBuilder, TyDef};
pub use typeck::{ExprTypes, ImplicitSpec, SpecSite, TcOptions, TypeChecker};

use veil_ir::{AstArena, Program, StringInterner};

/// Everything the semantic stages computed for one program.
#[derive(Debug)]
pub struct TcOutput {
    pub globals: Globals,
    pub symbols: SymbolTable,
    pub impls: ImplMap,
    pub flow: FlowGraphs,
    pub types: ExprTypes,
    pub implicit: ImplicitSpec,
    /// All accumulated problems, in stage order. Warnings included.
    pub errors: Vec<TcError>,
}

impl TcOutput {
    /// Whether any hard error was reported. Only when this is false may
    /// verification-condition generation proceed.
    pub fn has_errors(&self) -> bool {
        has_errors(&self.errors)
    }
}

/// Run all semantic stages over one program, gated on errors.
#[tracing::instrument(level = "debug", skip_all)]
pub fn check_program(
    program: &Program,
    arena: &mut AstArena,
    interner: &StringInterner,
    options: TcOptions,
) -> TcOutput {
    let mut out = TcOutput {
        globals: Globals::default(),
        symbols: SymbolTable::default(),
        impls: ImplMap::default(),
        flow: FlowGraphs::default(),
        types: ExprTypes::default(),
        implicit: ImplicitSpec::default(),
        errors: Vec::new(),
    };

    // Globals and symbol resolution gate together: the symbol table is only
    // meaningful over a program whose global names are sane.
    let (globals, mut errs) = GlobalsCollector::collect(program, arena);
    out.globals = globals;
    out.errors.append(&mut errs);
    let (symbols, mut errs) = SymbolTableBuilder::build(program, arena, &out.globals);
    out.symbols = symbols;
    out.errors.append(&mut errs);
    if has_errors(&out.errors) {
        return out;
    }

    let (impls, mut errs) = check_implementations(program, arena, &out.globals, interner);
    out.impls = impls;
    out.errors.append(&mut errs);
    if has_errors(&out.errors) {
        return out;
    }

    let (flow, mut errs) = FlowGraphs::build_all(program);
    out.flow = flow;
    out.errors.append(&mut errs);
    if has_errors(&out.errors) {
        return out;
    }

    let checker = TypeChecker::new(program, arena, interner, &out.symbols, options);
    let (types, implicit, mut errs) = checker.run();
    out.types = types;
    out.implicit = implicit;
    out.errors.append(&mut errs);
    out
}
