//! Lexer for IEC 61131-3 Structured Text. The lexer transforms text into
//! tokens (tokens are the input to the parser).
//!
//! Whitespace and comments do not produce tokens. Pragmas are not
//! supported.
use logos::Logos;
use stplc_dsl::{
    core::{FileId, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::token::{Token, TokenType};

/// Tokenize Structured Text.
///
/// Returns a list of tokens and a list of diagnostics. This does not return a result
/// because parsing continues with the valid tokens so that the context of an invalid
/// token is also reported.
pub fn tokenize(source: &str, file_id: &FileId) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut lexer = TokenType::lexer(source);

    while let Some(token) = lexer.next() {
        let range = lexer.span();
        let span = SourceSpan::range(range.start, range.end).with_file_id(file_id);
        match token {
            Ok(token_type) => tokens.push(Token {
                token_type,
                span,
                text: lexer.slice().into(),
            }),
            Err(_) => diagnostics.push(Diagnostic::problem(
                Problem::UnexpectedToken,
                Label::span(
                    span,
                    format!(
                        "The text '{}' is not valid Structured Text at this location.",
                        lexer.slice()
                    ),
                ),
            )),
        }
    }

    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_test::read_shared_resource;

    fn assert_no_err(name: &str) {
        let source = read_shared_resource(name);
        let (tokens, diagnostics) = tokenize(&source, &FileId::from_string(name));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(!tokens.is_empty());
    }

    #[test]
    fn tokenize_types() {
        assert_no_err("types.st");
    }

    #[test]
    fn tokenize_counter() {
        assert_no_err("counter.st");
    }

    #[test]
    fn tokenize_statements() {
        assert_no_err("statements.st");
    }

    #[test]
    fn tokenize_when_invalid_then_diagnostic_and_remaining_tokens() {
        let (tokens, diagnostics) = tokenize("x ? y", &FileId::default());
        assert_eq!(tokens.len(), 2);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Problem::UnexpectedToken.code());
        assert_eq!(diagnostics[0].primary.span.start, 2);
    }

    #[test]
    fn tokenize_when_tokens_then_spans_have_file_id() {
        let file_id = FileId::from_string("main.st");
        let (tokens, _) = tokenize("a := 1;", &file_id);
        assert_eq!(tokens[1].token_type, TokenType::Assignment);
        assert_eq!(tokens[1].span.start, 2);
        assert_eq!(tokens[1].span.file_id, file_id);
    }
}
