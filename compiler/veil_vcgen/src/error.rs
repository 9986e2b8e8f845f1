//! Errors of the verification-condition stages.
//!
//! These are precondition violations, not user diagnostics: the semantic
//! stages must have run cleanly before anything here executes, so every
//! variant names an input shape the pipeline was not supposed to hand us.

use thiserror::Error;

/// Why a verification condition could not be generated.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum VcError {
    #[error("implementation body has no blocks")]
    EmptyBody,
    #[error("control-flow graph has a cycle; passivation requires acyclic flow")]
    CyclicFlowGraph,
    #[error("body still contains call commands; desugar calls before verification")]
    CallInBody,
    #[error("assignment command survived passivation")]
    AssignInBody,
    #[error("`old` expression survived passivation")]
    OldInBody,
}
