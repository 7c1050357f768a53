//! Problem codes for everything the interpreter can report.
//!
//! The `Problem` enumeration is generated from `resources/problem-codes.csv`
//! by the build script.
use std::fmt;

/// The category of a problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// The text could not be tokenized or parsed.
    Syntax,
    /// A named reference could not be resolved, or was declared twice.
    Link,
    /// Capability mismatch, range violation or incompatible types.
    Type,
    /// A runtime argument is not acceptable (index, divisor, ...).
    Argument,
    /// An item is used somewhere its capabilities do not allow.
    Context,
    /// The interpreter's own invariants do not hold.
    Internal,
    /// Storage could not be provided.
    Memory,
}

impl ProblemKind {
    /// Returns true if problems of this kind leave the interpreter in a
    /// state that cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProblemKind::Internal | ProblemKind::Memory)
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProblemKind::Syntax => "syntax error",
            ProblemKind::Link => "link error",
            ProblemKind::Type => "type error",
            ProblemKind::Argument => "argument error",
            ProblemKind::Context => "context error",
            ProblemKind::Internal => "internal error",
            ProblemKind::Memory => "memory error",
        };
        f.write_str(name)
    }
}

include!(concat!(env!("OUT_DIR"), "/problems.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_when_division_by_zero_then_argument_kind() {
        assert_eq!(Problem::DivisionByZero.code(), "A0001");
        assert_eq!(Problem::DivisionByZero.kind(), ProblemKind::Argument);
    }

    #[test]
    fn is_fatal_when_internal_then_true() {
        assert!(Problem::InternalInvariant.kind().is_fatal());
        assert!(Problem::StorageTooLarge.kind().is_fatal());
        assert!(!Problem::UnresolvedType.kind().is_fatal());
    }
}
