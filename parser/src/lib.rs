//! Structured Text front end. Converts source text into compilation units
//! and queries for the runtime.
// Allow large errors because errors carry diagnostics.
#![allow(clippy::result_large_err)]

mod ast;
mod lexer;
mod literal;
mod lower;
pub mod options;
mod parser;
pub mod token;

use log::debug;
use options::ParseOptions;
use stplc_dsl::{core::FileId, diagnostic::Diagnostic};
use stplc_runtime::{query::Query, unit::CompilationUnit};
use token::Token;

/// Tokenize Structured Text.
///
/// Returns a list of tokens and a list of diagnostics. This does not return a result
/// because parsing continues even if there are token errors.
pub fn tokenize(source: &str, file_id: &FileId) -> (Vec<Token>, Vec<Diagnostic>) {
    lexer::tokenize(source, file_id)
}

/// Parses a source file into a compilation unit.
///
/// Invalid tokens and invalid direct addresses are recorded in the
/// diagnostics of the unit. Invalid literals and text that does not follow
/// the grammar are errors.
pub fn parse_unit(source: &str, options: &ParseOptions) -> Result<CompilationUnit, Vec<Diagnostic>> {
    let (tokens, errors) = tokenize(source, &options.file_id);
    let invalid = literal::check(&tokens);
    if !invalid.is_empty() {
        return Err(errors.into_iter().chain(invalid).collect());
    }
    let elements = parser::parse_elements(&tokens).map_err(|e| {
        let mut all = errors.clone();
        all.push(e);
        all
    })?;
    debug!("Parsed {} with {} elements", options.file_id, elements.len());
    Ok(lower::lower_unit(elements, &options.file_id, errors))
}

/// Parses the text of a query such as `P.x` or `P.x := 5`.
pub fn parse_query(text: &str) -> Result<Query, Vec<Diagnostic>> {
    let (tokens, errors) = tokenize(text, &FileId::default());
    if !errors.is_empty() {
        return Err(errors);
    }
    let invalid = literal::check(&tokens);
    if !invalid.is_empty() {
        return Err(invalid);
    }
    let query = parser::parse_query(&tokens).map_err(|e| vec![e])?;
    Ok(lower::lower_query(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_problems::Problem;

    #[test]
    fn parse_unit_when_invalid_token_then_unit_has_diagnostic() {
        let unit = parse_unit(
            "PROGRAM P VAR x : INT; END_VAR ? x := 1; END_PROGRAM",
            &ParseOptions::default(),
        )
        .unwrap();
        assert!(unit.has_errors());
        assert_eq!(unit.diagnostics[0].code(), Problem::UnexpectedToken.code());
    }

    #[test]
    fn parse_unit_when_syntax_error_then_err() {
        let diagnostics = parse_unit("PROGRAM P x := ; END_PROGRAM", &ParseOptions::default()).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Problem::SyntaxError.code());
    }

    #[test]
    fn parse_unit_when_invalid_literal_then_err() {
        let diagnostics = parse_unit(
            "PROGRAM P VAR t : TIME; END_VAR t := T#15; END_PROGRAM",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Problem::InvalidLiteral.code());
    }

    #[test]
    fn parse_query_when_invalid_token_then_err() {
        assert!(parse_query("P.x ?").is_err());
    }
}
