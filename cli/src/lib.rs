//! Command line front end for the Structured Text interpreter.
pub mod cli;
pub mod logger;
mod render;
