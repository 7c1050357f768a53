//! Transforms the syntax tree into an unlinked compilation unit.
//!
//! Every reference in the tree becomes an entry in a reference pool of the
//! unit through the builders of the runtime.
use stplc_dsl::{
    core::{FileId, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;
use stplc_runtime::{
    array::Dimension,
    builder::{BodyBuilder, MemberSpec, PouBuilder, TypeSpec, UnitBuilder, VarSpec},
    call::Argument,
    class::ValueClass,
    memory::DirectAddress,
    node::NodeId,
    qualified,
    query::Query,
    stmt,
    unit::CompilationUnit,
};

use crate::ast::*;

pub fn lower_unit(
    elements: Vec<Element>,
    file_id: &FileId,
    diagnostics: Vec<Diagnostic>,
) -> CompilationUnit {
    let mut unit = UnitBuilder::new(file_id.clone());
    for diagnostic in diagnostics {
        unit.diagnostic(diagnostic);
    }
    for element in elements {
        match element {
            Element::Types(types) => {
                for decl in types {
                    declare_type(&mut unit, decl);
                }
            }
            Element::Globals(block) => {
                for spec in var_specs(&mut unit, block) {
                    unit.declare_global(spec);
                }
            }
            Element::Pou(pou) => {
                let builder = pou_builder(&mut unit, pou);
                unit.add_pou(builder);
            }
        }
    }
    unit.build()
}

pub fn lower_query(query: QueryStmt) -> Query {
    let mut body = BodyBuilder::new();
    let root = match query {
        QueryStmt::Read(e) => expression(&mut body, e),
        QueryStmt::Assign(target, value, span) => {
            let target = variable(&mut body, target);
            let value = expression(&mut body, value);
            body.assign(target, value, span)
        }
    };
    body.set_root(root);
    body.query()
}

fn type_spec(ty: TypeExpr) -> TypeSpec {
    match ty {
        TypeExpr::Named(name) => TypeSpec::Named(name),
        TypeExpr::Subrange { base, min, max } => TypeSpec::Subrange { base, min, max },
        TypeExpr::Array {
            element,
            dimensions,
        } => TypeSpec::Array {
            element: Box::new(type_spec(*element)),
            dimensions: dimensions_of(dimensions),
        },
    }
}

fn dimensions_of(dimensions: Vec<(i128, i128)>) -> Vec<Dimension> {
    dimensions
        .into_iter()
        .map(|(min, max)| Dimension::new(min, max))
        .collect()
}

fn declare_type(unit: &mut UnitBuilder, decl: TypeDecl) {
    let TypeDecl { name, kind, span } = decl;
    match kind {
        TypeDeclKind::Alias {
            parent,
            initializer,
        } => unit.declare_alias(name, parent, initializer, span),
        TypeDeclKind::Enumeration {
            values,
            initializer,
        } => unit.declare_enumeration(name, values, initializer, span),
        TypeDeclKind::Subrange {
            base,
            min,
            max,
            initializer,
        } => unit.declare_subrange(name, base, min, max, initializer, span),
        TypeDeclKind::Array {
            element,
            dimensions,
            initializer,
        } => unit.declare_array(
            name,
            type_spec(element),
            dimensions_of(dimensions),
            initializer,
            span,
        ),
        TypeDeclKind::Struct { members } => {
            let members = members
                .into_iter()
                .map(|m| MemberSpec {
                    name: m.name,
                    ty: type_spec(m.ty),
                    initializer: m.initializer,
                    span: m.span,
                })
                .collect();
            unit.declare_struct(name, members, span)
        }
    }
}

/// One specification for each name in the block. A direct address that is
/// not valid is reported and the variable is declared without it.
fn var_specs(unit: &mut UnitBuilder, block: VarBlock) -> Vec<VarSpec> {
    let mut class = ValueClass::empty();
    if block.qualifiers.constant {
        class |= ValueClass::CONSTANT;
    }
    if block.qualifiers.retain {
        class |= ValueClass::RETAIN;
    }

    let mut specs = vec![];
    for group in block.vars {
        let address = group.address.and_then(|(text, span)| {
            match text.parse::<DirectAddress>() {
                Ok(address) => Some(address),
                Err(_) => {
                    unit.diagnostic(Diagnostic::problem(
                        Problem::InvalidAddress,
                        Label::span(span, format!("{} is not a valid direct address", text)),
                    ));
                    None
                }
            }
        });
        for name in group.names {
            let span = name.span.clone();
            specs.push(
                VarSpec::new(name, block.section, type_spec(group.ty.clone()), span)
                    .with_class(class)
                    .with_initializer(group.initializer.clone())
                    .with_address(address),
            );
        }
    }
    specs
}

fn pou_builder(unit: &mut UnitBuilder, pou: PouDecl) -> PouBuilder {
    let PouDecl {
        kind,
        name,
        returns,
        blocks,
        body,
        span,
    } = pou;
    let mut builder = PouBuilder::new(name, kind, span.clone());
    if let Some(returns) = returns {
        builder.returns(type_spec(returns));
    }
    for block in blocks {
        for spec in var_specs(unit, block) {
            builder.var(spec);
        }
    }
    let root = statements(builder.body(), body, &span);
    builder.body().set_root(root);
    builder
}

/// Lowers the statements into a list. An empty list is placed at the
/// start of the enclosing element.
fn statements(body: &mut BodyBuilder, stmts: Vec<Stmt>, enclosing: &SourceSpan) -> NodeId {
    let span = match (stmts.first(), stmts.last()) {
        (Some(first), Some(last)) => SourceSpan::join(&first.span, &last.span),
        _ => enclosing.clone(),
    };
    let ids = stmts.into_iter().map(|s| statement(body, s)).collect();
    body.list(ids, span)
}

fn statement(body: &mut BodyBuilder, stmt: Stmt) -> NodeId {
    let Stmt { kind, span } = stmt;
    match kind {
        StmtKind::Assign { target, value } => {
            let target = variable(body, target);
            let value = expression(body, value);
            body.assign(target, value, span)
        }
        StmtKind::Call { name, args } => {
            let args = arguments(body, args);
            body.call(name, args, span)
        }
        StmtKind::If {
            branches,
            otherwise,
        } => {
            let branches = branches
                .into_iter()
                .map(|(condition, stmts)| {
                    let condition = expression(body, condition);
                    (condition, statements(body, stmts, &span))
                })
                .collect();
            let otherwise = otherwise.map(|stmts| statements(body, stmts, &span));
            body.if_then(branches, otherwise, span)
        }
        StmtKind::Case {
            selector,
            arms,
            otherwise,
        } => {
            let selector = expression(body, selector);
            let arms = arms
                .into_iter()
                .map(|arm| {
                    let labels = arm
                        .labels
                        .into_iter()
                        .map(|label| match label {
                            CaseLabel::Value(v) => stmt::CaseLabel::Value(expression(body, v)),
                            CaseLabel::Range(low, high) => {
                                let low = expression(body, low);
                                stmt::CaseLabel::Range(low, expression(body, high))
                            }
                        })
                        .collect();
                    stmt::CaseArm {
                        labels,
                        body: statements(body, arm.body, &span),
                    }
                })
                .collect();
            let otherwise = otherwise.map(|stmts| statements(body, stmts, &span));
            body.case(selector, arms, otherwise, span)
        }
        StmtKind::For {
            control,
            start,
            end,
            step,
            body: stmts,
        } => {
            let control = variable(body, control);
            let start = expression(body, start);
            let end = expression(body, end);
            let step = step.map(|e| expression(body, e));
            let inner = statements(body, stmts, &span);
            body.for_loop(control, start, end, step, inner, span)
        }
        StmtKind::While {
            condition,
            body: stmts,
        } => {
            let condition = expression(body, condition);
            let inner = statements(body, stmts, &span);
            body.while_loop(condition, inner, span)
        }
        StmtKind::Repeat {
            body: stmts,
            condition,
        } => {
            let inner = statements(body, stmts, &span);
            let condition = expression(body, condition);
            body.repeat(inner, condition, span)
        }
        StmtKind::Exit => body.exit(span),
        StmtKind::Return => body.return_(span),
    }
}

fn expression(body: &mut BodyBuilder, expr: Expr) -> NodeId {
    match expr {
        Expr::Constant(value, span) => body.literal(value, span),
        Expr::Typed(ty, value, span) => body.typed_literal(ty, value, span),
        Expr::Variable(q) => variable(body, q),
        Expr::Unary(op, operand, span) => {
            let operand = expression(body, *operand);
            body.unary(op, operand, span)
        }
        Expr::Binary(op, left, right, span) => {
            let left = expression(body, *left);
            let right = expression(body, *right);
            body.binary(op, left, right, span)
        }
        Expr::Call(name, args, span) => {
            let args = arguments(body, args);
            body.call(name, args, span)
        }
    }
}

fn arguments(body: &mut BodyBuilder, args: Vec<Arg>) -> Vec<Argument> {
    args.into_iter()
        .map(|arg| Argument {
            name: arg.name,
            value: expression(body, arg.value),
            output: arg.output,
        })
        .collect()
}

fn variable(body: &mut BodyBuilder, q: Qualified) -> NodeId {
    let segments = q
        .segments
        .into_iter()
        .map(|segment| {
            let indexes = segment
                .indexes
                .into_iter()
                .map(|e| expression(body, e))
                .collect();
            qualified::Segment::new(segment.name, segment.span).with_indexes(indexes)
        })
        .collect();
    body.variable(segments, q.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::{parse_elements, parse_query};
    use stplc_runtime::node::NodeKind;
    use stplc_runtime::types::TypeKind;

    fn unit(source: &str) -> CompilationUnit {
        let file_id = FileId::from_string("lower.st");
        let (tokens, _) = tokenize(source, &file_id);
        lower_unit(parse_elements(&tokens).unwrap(), &file_id, vec![])
    }

    #[test]
    fn lower_unit_when_multiple_names_then_one_var_each() {
        let unit = unit("PROGRAM P VAR a, b : INT := 1; END_VAR END_PROGRAM");
        let names: Vec<_> = unit.pous[0].vars.iter().map(|v| v.name.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn lower_unit_when_inline_array_then_type_named_after_var() {
        let unit = unit("PROGRAM P VAR a : ARRAY[1..3] OF INT; END_VAR END_PROGRAM");
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.types[0].name.to_string(), "P.a");
        assert!(matches!(unit.types[0].kind, TypeKind::Array { .. }));
    }

    #[test]
    fn lower_unit_when_invalid_address_then_diagnostic() {
        let unit = unit("VAR_GLOBAL x AT %MX1 : BOOL; END_VAR");
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].code(), Problem::InvalidAddress.code());
        assert_eq!(unit.globals.len(), 1);
    }

    #[test]
    fn lower_unit_when_function_then_return_variable() {
        let unit = unit("FUNCTION Twice : INT VAR_INPUT x : INT; END_VAR Twice := x * 2; END_FUNCTION");
        let pou = &unit.pous[0];
        assert_eq!(pou.vars.len(), 2);
        let result = pou.return_var().unwrap();
        assert_eq!(pou.vars[result].name.to_string(), "Twice");
    }

    #[test]
    fn lower_unit_when_body_then_root_is_list_with_references() {
        let unit = unit("PROGRAM P VAR x : INT; END_VAR x := x + 1; END_PROGRAM");
        let pou = &unit.pous[0];
        let root = pou.body.root().unwrap();
        assert!(matches!(pou.body.node(root).unwrap().kind, NodeKind::List(_)));
        assert_eq!(pou.pools.body.variables.len(), 2);
    }

    #[test]
    fn lower_query_when_assignment_then_root_is_assign() {
        let (tokens, _) = tokenize("P.x := 2", &FileId::default());
        let query = lower_query(parse_query(&tokens).unwrap());
        let root = query.body.root().unwrap();
        assert!(matches!(query.body.node(root).unwrap().kind, NodeKind::Assign(_)));
        assert_eq!(query.pools.variables.len(), 1);
    }
}
