//! Primary parser for IEC 61131-3 Structured Text. The parser transforms
//! tokens into the syntax tree.
//!
//! The lexer has already removed whitespace and comments.
//!
//! Rules generally follow the production rules of the standard
//! (Appendix B). Parts of a rule name following two underscores (__) are
//! variations on a production rule.
extern crate peg;

use peg::parser;
use peg::Parse;
use peg::ParseElem;
use peg::RuleResult;
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;
use stplc_runtime::{
    expr::{BinaryOp, UnaryOp},
    library::PouKind,
    value::{Member, Repeated, Value},
    variable::Section,
};

use crate::ast::*;
use crate::literal;
use crate::token::{Token, TokenType};

/// Parses the declarations of a source file.
pub fn parse_elements(tokens: &[Token]) -> Result<Vec<Element>, Diagnostic> {
    st_parser::unit(&SliceByRef(tokens), tokens).map_err(|e| syntax_error(tokens, e))
}

/// Parses a query.
pub fn parse_query(tokens: &[Token]) -> Result<QueryStmt, Diagnostic> {
    st_parser::query(&SliceByRef(tokens), tokens).map_err(|e| syntax_error(tokens, e))
}

fn syntax_error(tokens: &[Token], error: peg::error::ParseError<usize>) -> Diagnostic {
    let expected = Vec::from_iter(error.expected.tokens()).join(", ");
    let (span, found) = match tokens.get(error.location) {
        Some(token) => (token.span.clone(), token.to_string()),
        None => {
            let span = tokens
                .last()
                .map(|t| SourceSpan::join(&t.span, &t.span))
                .unwrap_or_default();
            (span, "end of input".to_string())
        }
    };
    Diagnostic::problem(
        Problem::SyntaxError,
        Label::span(span, format!("Expected one of: {}. Found {}", expected, found)),
    )
}

/// The span from the first token at `start` to the last token before
/// `end`.
fn span_of(tokens: &[Token], start: usize, end: usize) -> SourceSpan {
    let first = tokens.get(start);
    let last = end.checked_sub(1).and_then(|i| tokens.get(i));
    match (first, last) {
        (Some(first), Some(last)) if end > start => SourceSpan::join(&first.span, &last.span),
        (Some(first), _) => SourceSpan::range(first.span.start, first.span.start)
            .with_file_id(&first.span.file_id),
        _ => SourceSpan::default(),
    }
}

/// The default implementation of the parsing traits for `[T]` expects `T` to be
/// `Copy`, as in the `[u8]` or simple enum cases. This wrapper exposes the
/// elements by `&T` reference, which is `Copy`.
pub struct SliceByRef<'a, T>(pub &'a [T]);

impl<T> Parse for SliceByRef<'_, T> {
    type PositionRepr = usize;
    fn start(&self) -> usize {
        0
    }

    fn is_eof(&self, pos: usize) -> bool {
        pos >= self.0.len()
    }

    fn position_repr(&self, pos: usize) -> usize {
        pos
    }
}

impl<'a, T: 'a> ParseElem<'a> for SliceByRef<'a, T> {
    type Element = &'a T;

    fn parse_elem(&'a self, pos: usize) -> RuleResult<&'a T> {
        match self.0[pos..].first() {
            Some(c) => RuleResult::Matched(pos + 1, c),
            None => RuleResult::Failed,
        }
    }
}

fn merge(qualifiers: Vec<Qualifiers>) -> Qualifiers {
    qualifiers
        .into_iter()
        .fold(Qualifiers::default(), |acc, q| Qualifiers {
            constant: acc.constant || q.constant,
            retain: acc.retain || q.retain,
        })
}

parser! {
  grammar st_parser<'a>(tokens: &'a [Token]) for SliceByRef<'a, Token> {

    /// Helper rule to match a particular type of token.
    rule tok(ty: TokenType) -> &'input Token = token:[t if t.token_type == ty] { token }

    /// Matches the rule and returns the span of the tokens it matched.
    rule spanned<T>(r: rule<T>) -> (T, SourceSpan) = s:position!() v:r() e:position!() { (v, span_of(tokens, s, e)) }

    rule semicolon() -> () = tok(TokenType::Semicolon) ()
    rule comma() -> () = tok(TokenType::Comma) ()

    // B.0 Programming model
    pub rule unit() -> Vec<Element> = elements:element()* { elements }

    rule element() -> Element =
      t:data_type_declaration() { Element::Types(t) }
      / g:global_var_declarations() { Element::Globals(g) }
      / p:program_organization_unit() { Element::Pou(p) }

    // B.1.1 Letters, digits and identifier
    rule identifier() -> Id = i:tok(TokenType::Identifier) {
      Id::from(i.text.as_str()).with_position(i.span.clone())
    }

    // B.1.2 Constants
    rule integer() -> i128 =
      i:tok(TokenType::Integer) {? literal::integer(&i.text) }
      / i:tok(TokenType::BasedInteger) {? literal::based_integer(&i.text) }
    rule signed_integer() -> i128 =
      tok(TokenType::Minus) i:integer() { -i }
      / tok(TokenType::Plus)? i:integer() { i }
    rule real() -> f64 = r:tok(TokenType::Real) {? literal::real(&r.text) }

    /// Constants that do not start with a sign.
    rule unsigned_constant() -> Value =
      r:real() { Value::Real(r) }
      / i:integer() { Value::Integer(i) }
      / tok(TokenType::True) { Value::Bool(true) }
      / tok(TokenType::False) { Value::Bool(false) }
      / s:tok(TokenType::String) {? literal::string(&s.text).map(Value::String) }
      / d:tok(TokenType::Duration) {? literal::duration(&d.text).map(Value::Duration) }
      / d:tok(TokenType::Date) {? literal::date(&d.text).map(Value::Date) }
      / t:tok(TokenType::TimeOfDay) {? literal::time_of_day(&t.text).map(Value::TimeOfDay) }
      / d:tok(TokenType::DateAndTime) {? literal::date_and_time(&d.text).map(Value::DateAndTime) }
    rule constant() -> Value =
      tok(TokenType::Minus) r:real() { Value::Real(-r) }
      / tok(TokenType::Minus) i:integer() { Value::Integer(-i) }
      / tok(TokenType::Plus)? c:unsigned_constant() { c }
    /// The value after the `#` of a typed literal such as `INT#5` or `Color#Red`.
    rule typed_value() -> Value = c:constant() { c } / name:identifier() { Value::Enumeration(name) }

    // B.1.3 Data types
    rule data_type_declaration() -> Vec<TypeDecl> =
      tok(TokenType::Type) declarations:(d:type_declaration() semicolon() { d })+ tok(TokenType::EndType) { declarations }
    rule type_declaration() -> TypeDecl = name:identifier() tok(TokenType::Colon) kind:type_declaration__kind() {
      let span = name.span.clone();
      TypeDecl { name, kind, span }
    }
    rule type_declaration__kind() -> TypeDeclKind =
      tok(TokenType::Struct) members:(m:structure_element_declaration() semicolon() { m })+ tok(TokenType::EndStruct) {
        TypeDeclKind::Struct { members }
      }
      / values:enumerated_specification() initializer:(tok(TokenType::Assignment) v:identifier() { v })? {
        TypeDeclKind::Enumeration { values, initializer }
      }
      / s:subrange_specification() initializer:initializer()? {
        TypeDeclKind::Subrange { base: s.0, min: s.1, max: s.2, initializer }
      }
      / a:array_specification() initializer:initializer()? {
        TypeDeclKind::Array { element: a.0, dimensions: a.1, initializer }
      }
      / parent:identifier() initializer:initializer()? { TypeDeclKind::Alias { parent, initializer } }
    rule enumerated_specification() -> Vec<Id> =
      tok(TokenType::LeftParen) values:(identifier() ++ comma()) tok(TokenType::RightParen) { values }
    rule subrange_specification() -> (Id, i128, i128) =
      base:identifier() tok(TokenType::LeftParen) min:signed_integer() tok(TokenType::Range) max:signed_integer() tok(TokenType::RightParen) {
        (base, min, max)
      }
    rule array_specification() -> (TypeExpr, Vec<(i128, i128)>) =
      tok(TokenType::Array) tok(TokenType::LeftBracket) dimensions:(subrange() ++ comma()) tok(TokenType::RightBracket) tok(TokenType::Of) element:spec() {
        (element, dimensions)
      }
    rule subrange() -> (i128, i128) = min:signed_integer() tok(TokenType::Range) max:signed_integer() { (min, max) }
    rule structure_element_declaration() -> MemberDecl = name:identifier() tok(TokenType::Colon) ty:spec() initializer:initializer()? {
      let span = name.span.clone();
      MemberDecl { name, ty, initializer, span }
    }
    /// A type in a variable or member declaration, which may be anonymous.
    rule spec() -> TypeExpr =
      a:array_specification() { TypeExpr::Array { element: Box::new(a.0), dimensions: a.1 } }
      / s:subrange_specification() { TypeExpr::Subrange { base: s.0, min: s.1, max: s.2 } }
      / name:identifier() { TypeExpr::Named(name) }

    // Initial values
    rule initializer() -> Value = tok(TokenType::Assignment) v:initial_value() { v }
    rule initial_value() -> Value =
      tok(TokenType::LeftBracket) items:(array_initial_element() ++ comma()) tok(TokenType::RightBracket) { Value::ArrayInit(items) }
      / tok(TokenType::LeftParen) members:(structure_element_initialization() ++ comma()) tok(TokenType::RightParen) { Value::Struct(members) }
      / identifier() tok(TokenType::Hash) v:typed_value() { v }
      / c:constant() { c }
      / name:identifier() { Value::Enumeration(name) }
    rule array_initial_element() -> Repeated =
      count:integer() tok(TokenType::LeftParen) value:initial_value() tok(TokenType::RightParen) {?
        usize::try_from(count).map(|count| Repeated { count, value }).map_err(|_| "repeat count")
      }
      / value:initial_value() { Repeated { count: 1, value } }
    rule structure_element_initialization() -> Member =
      name:identifier() tok(TokenType::Assignment) value:initial_value() { Member { name, value } }

    // B.1.4.3 Declarations and initialization
    rule section() -> Section =
      tok(TokenType::Var) { Section::Local }
      / tok(TokenType::VarInput) { Section::Input }
      / tok(TokenType::VarOutput) { Section::Output }
      / tok(TokenType::VarInOut) { Section::InOut }
      / tok(TokenType::VarExternal) { Section::External }
      / tok(TokenType::VarTemp) { Section::Temp }
    rule qualifiers() -> Qualifiers = q:(
      tok(TokenType::Constant) { Qualifiers { constant: true, retain: false } }
      / tok(TokenType::Retain) { Qualifiers { constant: false, retain: true } }
    )* { merge(q) }
    rule var_declarations() -> VarBlock =
      section:section() qualifiers:qualifiers() vars:(v:var_declaration() semicolon() { v })* tok(TokenType::EndVar) {
        VarBlock { section, qualifiers, vars }
      }
    rule global_var_declarations() -> VarBlock =
      tok(TokenType::VarGlobal) qualifiers:qualifiers() vars:(v:var_declaration() semicolon() { v })* tok(TokenType::EndVar) {
        VarBlock { section: Section::Global, qualifiers, vars }
      }
    rule var_declaration() -> VarDeclGroup =
      s:position!() names:(identifier() ++ comma())
      address:(tok(TokenType::At) a:tok(TokenType::DirectAddress) { (a.text.clone(), a.span.clone()) })?
      tok(TokenType::Colon) ty:spec() initializer:initializer()? e:position!() {
        VarDeclGroup { names, address, ty, initializer, span: span_of(tokens, s, e) }
      }

    // B.1.5 Program organization units
    rule program_organization_unit() -> PouDecl =
      tok(TokenType::Program) name:identifier() blocks:var_declarations()* body:statement_list() tok(TokenType::EndProgram) {
        let span = name.span.clone();
        PouDecl { kind: PouKind::Program, name, returns: None, blocks, body, span }
      }
      / tok(TokenType::FunctionBlock) name:identifier() blocks:var_declarations()* body:statement_list() tok(TokenType::EndFunctionBlock) {
        let span = name.span.clone();
        PouDecl { kind: PouKind::FunctionBlock, name, returns: None, blocks, body, span }
      }
      / tok(TokenType::Function) name:identifier() tok(TokenType::Colon) returns:spec() blocks:var_declarations()* body:statement_list() tok(TokenType::EndFunction) {
        let span = name.span.clone();
        PouDecl { kind: PouKind::Function, name, returns: Some(returns), blocks, body, span }
      }

    // B.3.1 Expressions
    pub rule expression() -> Expr = precedence!{
      x:(@) tok(TokenType::Or) y:@ { Expr::binary(BinaryOp::Or, x, y) }
      --
      x:(@) tok(TokenType::Xor) y:@ { Expr::binary(BinaryOp::Xor, x, y) }
      --
      x:(@) tok(TokenType::And) y:@ { Expr::binary(BinaryOp::And, x, y) }
      --
      x:(@) tok(TokenType::Equal) y:@ { Expr::binary(BinaryOp::Eq, x, y) }
      x:(@) tok(TokenType::NotEqual) y:@ { Expr::binary(BinaryOp::Ne, x, y) }
      --
      x:(@) tok(TokenType::Less) y:@ { Expr::binary(BinaryOp::Lt, x, y) }
      x:(@) tok(TokenType::Greater) y:@ { Expr::binary(BinaryOp::Gt, x, y) }
      x:(@) tok(TokenType::LessEqual) y:@ { Expr::binary(BinaryOp::Le, x, y) }
      x:(@) tok(TokenType::GreaterEqual) y:@ { Expr::binary(BinaryOp::Ge, x, y) }
      --
      x:(@) tok(TokenType::Plus) y:@ { Expr::binary(BinaryOp::Add, x, y) }
      x:(@) tok(TokenType::Minus) y:@ { Expr::binary(BinaryOp::Sub, x, y) }
      --
      x:(@) tok(TokenType::Star) y:@ { Expr::binary(BinaryOp::Mul, x, y) }
      x:(@) tok(TokenType::Slash) y:@ { Expr::binary(BinaryOp::Div, x, y) }
      x:(@) tok(TokenType::Mod) y:@ { Expr::binary(BinaryOp::Mod, x, y) }
      --
      t:tok(TokenType::Minus) x:@ { Expr::unary(UnaryOp::Negate, &t.span, x) }
      t:tok(TokenType::Not) x:@ { Expr::unary(UnaryOp::Not, &t.span, x) }
      --
      x:@ tok(TokenType::Power) y:(@) { Expr::binary(BinaryOp::Pow, x, y) }
      --
      p:primary_expression() { p }
    }
    rule primary_expression() -> Expr =
      tok(TokenType::LeftParen) e:expression() tok(TokenType::RightParen) { e }
      / t:spanned(<typed_literal()>) { let ((ty, value), span) = t; Expr::Typed(ty, value, span) }
      / c:spanned(<unsigned_constant()>) { Expr::Constant(c.0, c.1) }
      / c:spanned(<function_call()>) { let ((name, args), span) = c; Expr::Call(name, args, span) }
      / q:variable() { Expr::Variable(q) }
    rule typed_literal() -> (Id, Value) = ty:identifier() tok(TokenType::Hash) value:typed_value() { (ty, value) }
    rule function_call() -> (Id, Vec<Arg>) =
      name:identifier() tok(TokenType::LeftParen) args:(param_assignment() ** comma()) tok(TokenType::RightParen) { (name, args) }
    rule param_assignment() -> Arg =
      name:identifier() tok(TokenType::Assignment) value:expression() { Arg { name: Some(name), value, output: false } }
      / name:identifier() tok(TokenType::RightArrow) target:variable() { Arg { name: Some(name), value: Expr::Variable(target), output: true } }
      / value:expression() { Arg { name: None, value, output: false } }

    // B.1.4 Variables
    rule variable() -> Qualified = s:position!() segments:(segment() ++ tok(TokenType::Period)) e:position!() {
      Qualified { segments, span: span_of(tokens, s, e) }
    }
    rule segment() -> Segment =
      s:position!() name:identifier() indexes:(tok(TokenType::LeftBracket) i:(expression() ++ comma()) tok(TokenType::RightBracket) { i })? e:position!() {
        Segment { name, indexes: indexes.unwrap_or_default(), span: span_of(tokens, s, e) }
      }

    // B.3.2 Statements
    rule statement_list() -> Vec<Stmt> = items:statement_item()* { items.into_iter().flatten().collect() }
    rule statement_item() -> Option<Stmt> =
      s:structured_statement() semicolon()? { Some(s) }
      / s:simple_statement() semicolon() { Some(s) }
      / semicolon() { None }
    rule simple_statement() -> Stmt = s:spanned(<simple_statement__kind()>) { Stmt { kind: s.0, span: s.1 } }
    rule simple_statement__kind() -> StmtKind =
      target:variable() tok(TokenType::Assignment) value:expression() { StmtKind::Assign { target, value } }
      / c:function_call() { StmtKind::Call { name: c.0, args: c.1 } }
      / tok(TokenType::Exit) { StmtKind::Exit }
      / tok(TokenType::Return) { StmtKind::Return }
    rule structured_statement() -> Stmt = s:spanned(<structured_statement__kind()>) { Stmt { kind: s.0, span: s.1 } }
    rule structured_statement__kind() -> StmtKind =
      if_statement() / case_statement() / for_statement() / while_statement() / repeat_statement()
    rule else_statements() -> Vec<Stmt> = tok(TokenType::Else) s:statement_list() { s }
    rule if_statement() -> StmtKind =
      tok(TokenType::If) condition:expression() tok(TokenType::Then) body:statement_list()
      elsifs:(tok(TokenType::Elsif) c:expression() tok(TokenType::Then) b:statement_list() { (c, b) })*
      otherwise:else_statements()? tok(TokenType::EndIf) {
        let mut branches = vec![(condition, body)];
        branches.extend(elsifs);
        StmtKind::If { branches, otherwise }
      }
    rule case_statement() -> StmtKind =
      tok(TokenType::Case) selector:expression() tok(TokenType::Of) arms:case_element()* otherwise:else_statements()? tok(TokenType::EndCase) {
        StmtKind::Case { selector, arms, otherwise }
      }
    rule case_element() -> CaseArm = labels:(case_list_element() ++ comma()) tok(TokenType::Colon) body:statement_list() {
      CaseArm { labels, body }
    }
    rule case_list_element() -> CaseLabel =
      low:case_value() tok(TokenType::Range) high:case_value() { CaseLabel::Range(low, high) }
      / v:case_value() { CaseLabel::Value(v) }
    rule case_value() -> Expr =
      c:spanned(<constant()>) { Expr::Constant(c.0, c.1) }
      / q:variable() { Expr::Variable(q) }
    rule for_statement() -> StmtKind =
      tok(TokenType::For) control:variable() tok(TokenType::Assignment) start:expression() tok(TokenType::To) end:expression()
      step:(tok(TokenType::By) e:expression() { e })? tok(TokenType::Do) body:statement_list() tok(TokenType::EndFor) {
        StmtKind::For { control, start, end, step, body }
      }
    rule while_statement() -> StmtKind =
      tok(TokenType::While) condition:expression() tok(TokenType::Do) body:statement_list() tok(TokenType::EndWhile) {
        StmtKind::While { condition, body }
      }
    rule repeat_statement() -> StmtKind =
      tok(TokenType::Repeat) body:statement_list() tok(TokenType::Until) condition:expression() tok(TokenType::EndRepeat) {
        StmtKind::Repeat { body, condition }
      }

    // Queries
    pub rule query() -> QueryStmt =
      a:spanned(<query__assign()>) semicolon()? { let ((target, value), span) = a; QueryStmt::Assign(target, value, span) }
      / e:expression() semicolon()? { QueryStmt::Read(e) }
    rule query__assign() -> (Qualified, Expr) = target:variable() tok(TokenType::Assignment) value:expression() { (target, value) }
  }
}
