//! Diagnostics for the Veil verifier.
//!
//! Stages accumulate problems instead of failing fast inside a stage; this
//! crate provides the structured value they accumulate into. Rendering is
//! intentionally absent — a reporting layer consumes these.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
