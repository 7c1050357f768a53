//! Items shared between the Structured Text front end and the interpreter:
//! source positions, identifiers and diagnostics.
pub mod core;
pub mod diagnostic;
