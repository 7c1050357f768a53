//! Errors from operations on values and types.
//!
//! Operations on values do not know where in the source they happen, so
//! they return a `ValueError`. The invocable that performed the operation
//! converts the error into a `Diagnostic` at its own location.
use stplc_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;
use thiserror::Error;

use crate::value::Operation;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValueError {
    #[error("{kind} value does not support {operation}")]
    NotSupported {
        operation: Operation,
        kind: &'static str,
    },
    #[error("{left} and {right} cannot be combined by {operation}")]
    IncompatibleOperands {
        operation: Operation,
        left: &'static str,
        right: &'static str,
    },
    #[error("expected a value of type {expected} but found {found}")]
    IncompatibleTypes { expected: String, found: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} overflowed")]
    Overflow(Operation),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{value} is outside the range of {ty}")]
    OutOfRange { value: String, ty: String },
    #[error("expected {expected} array indexes but found {found}")]
    IndexCount { expected: usize, found: usize },
    #[error("index {index} is outside the range {min}..{max}")]
    IndexOutOfRange { index: i128, min: i128, max: i128 },
    #[error("expected {expected} initial values but found {found}")]
    InitializerCount { expected: usize, found: usize },
    #[error("initializer does not set member {0}")]
    MissingMember(String),
    #[error("{ty} has no member {member}")]
    UnknownMember { ty: String, member: String },
    #[error("{value} is not a value of {ty}")]
    UnknownEnumValue { value: String, ty: String },
    #[error("{0} is a constant")]
    ConstantTarget(String),
    #[error("address {0} is outside the memory area")]
    AddressOutOfRange(String),
    #[error("address {address} cannot hold a value of type {ty}")]
    AddressMismatch { address: String, ty: String },
    #[error("{0} contains itself")]
    Recursive(String),
    #[error("value of {0} requires more storage than is addressable")]
    StorageTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl ValueError {
    pub fn problem(&self) -> Problem {
        match self {
            ValueError::NotSupported { .. } => Problem::NotSupported,
            ValueError::IncompatibleOperands { .. } => Problem::IncompatibleTypes,
            ValueError::IncompatibleTypes { .. } => Problem::IncompatibleTypes,
            ValueError::DivisionByZero => Problem::DivisionByZero,
            ValueError::Overflow(_) => Problem::Overflow,
            ValueError::InvalidArgument(_) => Problem::InvalidArgument,
            ValueError::OutOfRange { .. } => Problem::ValueOutOfRange,
            ValueError::IndexCount { .. } => Problem::IndexCount,
            ValueError::IndexOutOfRange { .. } => Problem::IndexOutOfRange,
            ValueError::InitializerCount { .. } => Problem::InitializerCount,
            ValueError::MissingMember(_) => Problem::MissingMember,
            ValueError::UnknownMember { .. } => Problem::UnknownMember,
            ValueError::UnknownEnumValue { .. } => Problem::UnknownEnumValue,
            ValueError::ConstantTarget(_) => Problem::ConstantTarget,
            ValueError::AddressOutOfRange(_) => Problem::AddressOutOfRange,
            ValueError::AddressMismatch { .. } => Problem::AddressTypeMismatch,
            ValueError::Recursive(_) => Problem::RecursiveCycle,
            ValueError::StorageTooLarge(_) => Problem::StorageTooLarge,
            ValueError::Internal(_) => Problem::InternalInvariant,
        }
    }

    /// Converts the error into a diagnostic at the span.
    pub fn at(self, span: &SourceSpan) -> Diagnostic {
        let diagnostic =
            Diagnostic::problem(self.problem(), Label::span(span.clone(), self.to_string()));
        match &self {
            ValueError::MissingMember(member) => diagnostic.with_context("member", member),
            ValueError::UnknownMember { member, .. } => diagnostic.with_context("member", member),
            _ => diagnostic,
        }
    }

    /// Converts the error into a diagnostic for a binary operation with the
    /// left operand as the primary location.
    pub fn between(self, left: &SourceSpan, right: &SourceSpan) -> Diagnostic {
        self.at(left)
            .with_secondary(Label::span(right.clone(), "Right operand"))
    }
}
