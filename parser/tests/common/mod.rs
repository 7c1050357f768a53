//! Shared helpers for tests that parse, link and run Structured Text.
#![allow(dead_code)]

use stplc_dsl::{core::FileId, core::Id, diagnostic::Diagnostic};
use stplc_parser::{options::ParseOptions, parse_query, parse_unit};
use stplc_runtime::{interpreter::Interpreter, options::Options, unit::CompilationUnit};
use stplc_test::read_shared_resource;

/// Parses the source as a unit in a file with the name.
pub fn unit(name: &str, source: &str) -> CompilationUnit {
    parse_unit(source, &ParseOptions::new(FileId::from_string(name)))
        .unwrap_or_else(|d| panic!("{} does not parse: {:?}", name, d))
}

/// Parses a shared test resource.
pub fn resource(name: &'static str) -> CompilationUnit {
    unit(name, &read_shared_resource(name))
}

/// Links the units with the options.
pub fn try_link(units: Vec<CompilationUnit>, options: Options) -> Result<Interpreter, Vec<Diagnostic>> {
    let mut interpreter = Interpreter::new(options);
    interpreter.link(units)?;
    Ok(interpreter)
}

/// Links the units and starts the program.
pub fn started(units: Vec<CompilationUnit>, program: &str) -> Interpreter {
    let mut interpreter = try_link(units, Options::default()).unwrap_or_else(|d| panic!("link failed: {:?}", d));
    interpreter.start(&Id::from(program)).unwrap();
    interpreter
}

/// Runs the query and returns the displayed result.
pub fn query(interpreter: &mut Interpreter, text: &str) -> String {
    let query = parse_query(text).unwrap();
    interpreter
        .query(query)
        .unwrap_or_else(|d| panic!("query {} failed: {:?}", text, d))
}

/// The problem codes of the diagnostics.
pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
    diagnostics.iter().map(|d| d.code()).collect()
}
