//! Provides definitions of tokens from IEC 61131-3 Structured Text.
use std::fmt;

use logos::{FilterResult, Lexer, Logos};
use stplc_dsl::core::SourceSpan;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub span: SourceSpan,
    pub text: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.text, self.token_type.describe())
    }
}

/// Skips a block comment up to the first `*)`. A comment that is not
/// closed is an error.
fn block_comment(lex: &mut Lexer<TokenType>) -> FilterResult<(), ()> {
    match lex.remainder().find("*)") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(())
        }
    }
}

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenType {
    #[token("(*", block_comment)]
    #[regex(r"//[^\r\n]*", logos::skip)]
    Comment,

    // Grouping and other markers
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Period,
    #[token("..")]
    Range,
    #[token("#")]
    Hash,

    // Literals
    #[regex(r"[0-9][0-9_]*")]
    Integer,
    #[regex(r"(2|8|16)#[0-9a-fA-F_]+")]
    BasedInteger,
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    Real,
    #[regex(r"'([^'$]|\$.)*'")]
    String,
    #[regex(r"(t|time)#-?[0-9][0-9a-z_.]*", ignore(case))]
    Duration,
    #[regex(r"(d|date)#[0-9]+-[0-9]+-[0-9]+", ignore(case))]
    Date,
    #[regex(r"(tod|time_of_day)#[0-9]+:[0-9]+:[0-9]+(\.[0-9]+)?", ignore(case))]
    TimeOfDay,
    #[regex(
        r"(dt|date_and_time)#[0-9]+-[0-9]+-[0-9]+-[0-9]+:[0-9]+:[0-9]+(\.[0-9]+)?",
        ignore(case)
    )]
    DateAndTime,
    #[regex(r"%[IQMiqm][XBWDLxbwdl]?[0-9]+(\.[0-9]+)?")]
    DirectAddress,
    #[token("TRUE", ignore(case))]
    True,
    #[token("FALSE", ignore(case))]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // Data types
    #[token("TYPE", ignore(case))]
    Type,
    #[token("END_TYPE", ignore(case))]
    EndType,
    #[token("STRUCT", ignore(case))]
    Struct,
    #[token("END_STRUCT", ignore(case))]
    EndStruct,
    #[token("ARRAY", ignore(case))]
    Array,
    #[token("OF", ignore(case))]
    Of,

    // Declarations and initialization
    #[token("VAR", ignore(case))]
    Var,
    #[token("VAR_INPUT", ignore(case))]
    VarInput,
    #[token("VAR_OUTPUT", ignore(case))]
    VarOutput,
    #[token("VAR_IN_OUT", ignore(case))]
    VarInOut,
    #[token("VAR_EXTERNAL", ignore(case))]
    VarExternal,
    #[token("VAR_GLOBAL", ignore(case))]
    VarGlobal,
    #[token("VAR_TEMP", ignore(case))]
    VarTemp,
    #[token("END_VAR", ignore(case))]
    EndVar,
    #[token("CONSTANT", ignore(case))]
    Constant,
    #[token("RETAIN", ignore(case))]
    Retain,
    #[token("AT", ignore(case))]
    At,
    #[token(":=")]
    Assignment,
    #[token("=>")]
    RightArrow,

    // Program organization units
    #[token("PROGRAM", ignore(case))]
    Program,
    #[token("END_PROGRAM", ignore(case))]
    EndProgram,
    #[token("FUNCTION", ignore(case))]
    Function,
    #[token("END_FUNCTION", ignore(case))]
    EndFunction,
    #[token("FUNCTION_BLOCK", ignore(case))]
    FunctionBlock,
    #[token("END_FUNCTION_BLOCK", ignore(case))]
    EndFunctionBlock,

    // Operators
    #[token("OR", ignore(case))]
    Or,
    #[token("XOR", ignore(case))]
    Xor,
    #[token("AND", ignore(case))]
    #[token("&")]
    And,
    #[token("NOT", ignore(case))]
    Not,
    #[token("MOD", ignore(case))]
    Mod,
    #[token("=")]
    Equal,
    #[token("<>")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("**")]
    Power,

    // Statements
    #[token("IF", ignore(case))]
    If,
    #[token("THEN", ignore(case))]
    Then,
    #[token("ELSIF", ignore(case))]
    Elsif,
    #[token("ELSE", ignore(case))]
    Else,
    #[token("END_IF", ignore(case))]
    EndIf,
    #[token("CASE", ignore(case))]
    Case,
    #[token("END_CASE", ignore(case))]
    EndCase,
    #[token("FOR", ignore(case))]
    For,
    #[token("TO", ignore(case))]
    To,
    #[token("BY", ignore(case))]
    By,
    #[token("DO", ignore(case))]
    Do,
    #[token("END_FOR", ignore(case))]
    EndFor,
    #[token("WHILE", ignore(case))]
    While,
    #[token("END_WHILE", ignore(case))]
    EndWhile,
    #[token("REPEAT", ignore(case))]
    Repeat,
    #[token("UNTIL", ignore(case))]
    Until,
    #[token("END_REPEAT", ignore(case))]
    EndRepeat,
    #[token("EXIT", ignore(case))]
    Exit,
    #[token("RETURN", ignore(case))]
    Return,
}

impl TokenType {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenType::Comment => "comment",
            TokenType::Integer | TokenType::BasedInteger => "integer literal",
            TokenType::Real => "real literal",
            TokenType::String => "string literal",
            TokenType::Duration => "duration literal",
            TokenType::Date => "date literal",
            TokenType::TimeOfDay => "time of day literal",
            TokenType::DateAndTime => "date and time literal",
            TokenType::DirectAddress => "direct address",
            TokenType::Identifier => "identifier",
            TokenType::LeftParen
            | TokenType::RightParen
            | TokenType::LeftBracket
            | TokenType::RightBracket
            | TokenType::Comma
            | TokenType::Semicolon
            | TokenType::Colon
            | TokenType::Period
            | TokenType::Range
            | TokenType::Hash
            | TokenType::Assignment
            | TokenType::RightArrow => "punctuation",
            TokenType::Or
            | TokenType::Xor
            | TokenType::And
            | TokenType::Not
            | TokenType::Mod
            | TokenType::Equal
            | TokenType::NotEqual
            | TokenType::Less
            | TokenType::Greater
            | TokenType::LessEqual
            | TokenType::GreaterEqual
            | TokenType::Plus
            | TokenType::Minus
            | TokenType::Star
            | TokenType::Slash
            | TokenType::Power => "operator",
            _ => "keyword",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn types(source: &str) -> Vec<TokenType> {
        TokenType::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[rstest]
    #[case("end_var", TokenType::EndVar)]
    #[case("End_Var", TokenType::EndVar)]
    #[case("T#1s", TokenType::Duration)]
    #[case("time#1h_30m", TokenType::Duration)]
    #[case("D#2024-01-31", TokenType::Date)]
    #[case("TOD#12:00:01", TokenType::TimeOfDay)]
    #[case("DT#2024-01-31-12:00:01", TokenType::DateAndTime)]
    #[case("16#FF", TokenType::BasedInteger)]
    #[case("1_000", TokenType::Integer)]
    #[case("1.5E3", TokenType::Real)]
    #[case("%MW15", TokenType::DirectAddress)]
    #[case("%IX0.1", TokenType::DirectAddress)]
    #[case("'it$'s'", TokenType::String)]
    #[case("variable", TokenType::Identifier)]
    fn lexer_when_single_token_then_type(#[case] source: &str, #[case] expected: TokenType) {
        assert_eq!(types(source), vec![expected]);
    }

    #[test]
    fn lexer_when_range_then_not_real() {
        assert_eq!(
            types("1..3"),
            vec![TokenType::Integer, TokenType::Range, TokenType::Integer]
        );
    }

    #[rstest]
    #[case("(* a *) x")]
    #[case("(* a. *) x")]
    #[case("(**) x")]
    #[case("(* f(a) * b *) x")]
    #[case("(* first\n   second *)\nx")]
    #[case("(* a *) (* b *) x")]
    fn lexer_when_block_comment_then_skipped(#[case] source: &str) {
        assert_eq!(types(source), vec![TokenType::Identifier]);
    }

    #[test]
    fn lexer_when_block_comment_not_closed_then_error() {
        let tokens: Vec<_> = TokenType::lexer("x (* open").collect();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].is_err());
    }

    #[test]
    fn lexer_when_comments_then_skipped() {
        assert_eq!(
            types("(* block\n comment *) x // line\n"),
            vec![TokenType::Identifier]
        );
    }

    #[test]
    fn lexer_when_typed_literal_then_prefix_hash_value() {
        assert_eq!(
            types("INT#-5"),
            vec![
                TokenType::Identifier,
                TokenType::Hash,
                TokenType::Minus,
                TokenType::Integer
            ]
        );
    }

    #[test]
    fn lexer_when_invalid_character_then_error() {
        assert!(TokenType::lexer("?").next().unwrap().is_err());
    }
}
