//! Links compilation units of IEC 61131-3 Structured Text into a library
//! and executes programs from the library with resumable, single-stepping
//! execution.
//!
//! Linking runs as a sequence of stages (see [`stages`]). The
//! [`interpreter::Interpreter`] drives linking, execution and queries.

// Allow large errors because errors carry diagnostics.
#![allow(clippy::result_large_err)]

pub mod array;
pub mod builder;
pub mod builtin;
pub mod call;
pub mod class;
pub mod cursor;
pub mod elementary;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod issues;
pub mod library;
mod link_calls;
mod link_fb_headers;
mod link_merge_units;
mod link_pou_headers;
mod link_references;
mod link_statements;
mod link_types;
mod link_variables;
pub mod machine;
pub mod memory;
pub mod node;
pub mod options;
pub mod qualified;
pub mod query;
pub mod resolver;
pub mod stages;
pub mod stmt;
pub mod structure;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod unit;
pub mod value;
pub mod variable;

#[cfg(test)]
#[ctor::ctor]
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
