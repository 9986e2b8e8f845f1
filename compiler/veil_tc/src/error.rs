//! Errors of the semantic stages.
//!
//! Every variant carries the offending location and the payload a reporting
//! layer needs; type payloads are pre-rendered strings so errors stay
//! independent of the arena they were produced from.

use veil_diagnostic::{Diagnostic, ErrorCode};
use veil_ir::{Name, Span, StringInterner};

/// A problem found by globals collection, symbol resolution, implementation
/// matching, flow graph construction, or type checking.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TcError {
    /// A name was declared twice within one namespace group.
    DuplicateName { name: Name, span: Span, first: Span },
    /// The type synonym graph has at least one cycle. Reported once per
    /// program, not per participating type.
    TypeSynonymCycle { span: Span },
    /// An identifier, function, or procedure use has no declaration.
    UndefinedName { name: Name, span: Span },
    /// A type name has no declaration.
    UndefinedType { name: Name, span: Span },
    /// An implementation names a procedure that was never declared.
    NoSuchProcedure { name: Name, span: Span },
    /// An implementation's signature disagrees with its procedure's.
    SignatureMismatch { name: Name, span: Span, detail: String },
    /// A block's successor list names a block that does not exist.
    MissingBlockTarget { name: Name, span: Span },
    /// A block cannot be reached from the entry block. A warning:
    /// unreachable code does not block verification.
    UnreachableBlock { name: Name, span: Span },
    /// `found` cannot be used where `expected` is required.
    NotSubtype { found: String, expected: String, span: Span },
    /// Neither side of an exact comparison is usable as the other.
    UnrelatedTypes { lhs: String, rhs: String, span: Span },
    /// A use site left a generic type variable unresolved.
    RequiresSpecialization { ty: String, span: Span, decl: Span },
    /// More explicit generic arguments than declared type parameters.
    TooManyGenericArguments { span: Span },
    /// Select/update applied to something that is not a map.
    NotAMapOrArray { found: String, span: Span },
}

impl TcError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            TcError::DuplicateName { .. } => ErrorCode::E0101,
            TcError::TypeSynonymCycle { .. } => ErrorCode::E0102,
            TcError::UndefinedName { .. } => ErrorCode::E0201,
            TcError::UndefinedType { .. } => ErrorCode::E0202,
            TcError::NoSuchProcedure { .. } => ErrorCode::E0301,
            TcError::SignatureMismatch { .. } => ErrorCode::E0302,
            TcError::MissingBlockTarget { .. } => ErrorCode::E0401,
            TcError::UnreachableBlock { .. } => ErrorCode::W0402,
            TcError::NotSubtype { .. } => ErrorCode::E0501,
            TcError::UnrelatedTypes { .. } => ErrorCode::E0502,
            TcError::RequiresSpecialization { .. } => ErrorCode::E0503,
            TcError::TooManyGenericArguments { .. } => ErrorCode::E0504,
            TcError::NotAMapOrArray { .. } => ErrorCode::E0505,
        }
    }

    /// Whether this is a warning (does not gate later stages).
    pub fn is_warning(&self) -> bool {
        self.code().is_warning()
    }

    /// The primary location.
    pub fn span(&self) -> Span {
        match self {
            TcError::DuplicateName { span, .. }
            | TcError::TypeSynonymCycle { span }
            | TcError::UndefinedName { span, .. }
            | TcError::UndefinedType { span, .. }
            | TcError::NoSuchProcedure { span, .. }
            | TcError::SignatureMismatch { span, .. }
            | TcError::MissingBlockTarget { span, .. }
            | TcError::UnreachableBlock { span, .. }
            | TcError::NotSubtype { span, .. }
            | TcError::UnrelatedTypes { span, .. }
            | TcError::RequiresSpecialization { span, .. }
            | TcError::TooManyGenericArguments { span }
            | TcError::NotAMapOrArray { span, .. } => *span,
        }
    }

    /// Convert to a diagnostic for the reporting layer.
    pub fn to_diagnostic(&self, interner: &StringInterner) -> Diagnostic {
        let code = self.code();
        match self {
            TcError::DuplicateName { name, span, first } => Diagnostic::error(code)
                .with_message(format!("name `{}` is already defined", interner.lookup(*name)))
                .with_label(*span, "redefined here")
                .with_secondary_label(*first, "first defined here")
                .with_note("the first definition stays in effect"),
            TcError::TypeSynonymCycle { span } => Diagnostic::error(code)
                .with_message("type synonym definitions form a cycle")
                .with_label(*span, "cycle detected in this program"),
            TcError::UndefinedName { name, span } => Diagnostic::error(code)
                .with_message(format!("undefined name `{}`", interner.lookup(*name)))
                .with_label(*span, "not found in this scope"),
            TcError::UndefinedType { name, span } => Diagnostic::error(code)
                .with_message(format!("undefined type `{}`", interner.lookup(*name)))
                .with_label(*span, "no such type"),
            TcError::NoSuchProcedure { name, span } => Diagnostic::error(code)
                .with_message(format!(
                    "implementation of undeclared procedure `{}`",
                    interner.lookup(*name)
                ))
                .with_label(*span, "no procedure with this name"),
            TcError::SignatureMismatch { name, span, detail } => Diagnostic::error(code)
                .with_message(format!(
                    "implementation signature does not match procedure `{}`",
                    interner.lookup(*name)
                ))
                .with_label(*span, detail.clone()),
            TcError::MissingBlockTarget { name, span } => Diagnostic::error(code)
                .with_message(format!("no block named `{}`", interner.lookup(*name)))
                .with_label(*span, "unresolved successor"),
            TcError::UnreachableBlock { name, span } => Diagnostic::warning(code)
                .with_message(format!("block `{}` is unreachable", interner.lookup(*name)))
                .with_label(*span, "never named as a successor of a reachable block"),
            TcError::NotSubtype { found, expected, span } => Diagnostic::error(code)
                .with_message(format!("found type {found} instead of {expected}"))
                .with_label(*span, format!("expected {expected}")),
            TcError::UnrelatedTypes { lhs, rhs, span } => Diagnostic::error(code)
                .with_message(format!("unrelated types: {lhs} and {rhs}"))
                .with_label(*span, "operands must have related types"),
            TcError::RequiresSpecialization { ty, span, decl } => Diagnostic::error(code)
                .with_message(format!("type {ty} requires specialization"))
                .with_label(*span, "generic type variable not resolved at this use")
                .with_secondary_label(*decl, "type variable declared here"),
            TcError::TooManyGenericArguments { span } => Diagnostic::error(code)
                .with_message("too many generic arguments")
                .with_label(*span, "exceeds the declared type parameters"),
            TcError::NotAMapOrArray { found, span } => Diagnostic::error(code)
                .with_message(format!("found type {found}, must be an array or map"))
                .with_label(*span, "indexed here"),
        }
    }
}

/// Whether a list of stage results contains any hard error.
pub fn has_errors(errors: &[TcError]) -> bool {
    errors.iter().any(|e| !e.is_warning())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_block_is_a_warning() {
        let e = TcError::UnreachableBlock { name: Name::EMPTY, span: Span::DUMMY };
        assert!(e.is_warning());
        assert!(!has_errors(&[e]));
    }

    #[test]
    fn diagnostics_carry_the_code() {
        let mut interner = StringInterner::new();
        let n = interner.intern("x");
        let e = TcError::DuplicateName {
            name: n,
            span: Span::new(5, 6),
            first: Span::new(1, 2),
        };
        let d = e.to_diagnostic(&interner);
        assert_eq!(d.code, ErrorCode::E0101);
        assert_eq!(d.primary_span(), Some(Span::new(5, 6)));
    }
}
