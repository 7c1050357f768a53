//! Literals and operator expressions.
use stplc_dsl::{
    core::Id,
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::class::ValueClass;
use crate::elementary;
use crate::error::ValueError;
use crate::node::{Body, Invocable, NodeId, Step, StepContext, Verified, VerifyContext};
use crate::types::TypeTable;
use crate::value::{Operation, Value};

/// A constant value. A typed literal such as `INT#5` names its type,
/// which is resolved when the literal is verified.
#[derive(Clone, Debug)]
pub struct Literal {
    pub value: Value,
    pub type_name: Option<Id>,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            type_name: None,
        }
    }

    pub fn typed(type_name: Id, value: Value) -> Self {
        Self {
            value,
            type_name: Some(type_name),
        }
    }
}

impl Invocable for Literal {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        let span = body.span(id);
        match &self.type_name {
            Some(name) => {
                let ty = ctx.types().lookup(name).ok_or_else(|| {
                    Diagnostic::problem(
                        Problem::UnresolvedType,
                        Label::span(span.clone(), format!("Type {} is not declared", name)),
                    )
                })?;
                self.value = ctx.types().override_type(ty, &self.value).map_err(|e| e.at(&span))?;
                body.set_probe(id, Some(ty), ValueClass::CONSTANT, self.value.clone())?;
            }
            None => {
                // Enumeration values bound by name already carry their type.
                let ty = body.node(id)?.ty;
                let class = match ty {
                    Some(_) => ValueClass::CONSTANT,
                    None => ValueClass::CONSTANT | ValueClass::TEMPORARY,
                };
                body.set_probe(id, ty, class, self.value.clone())?;
            }
        }
        Ok(Verified::Node)
    }

    fn step(&mut self, _: NodeId, _: &mut Body, _: &mut StepContext) -> Result<Step, Diagnostic> {
        Ok(Step::Finished)
    }

    fn children(&self) -> Vec<NodeId> {
        vec![]
    }

    fn is_constant(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl UnaryOp {
    fn operation(&self) -> Operation {
        match self {
            UnaryOp::Negate => Operation::Negate,
            UnaryOp::Not => Operation::Not,
        }
    }

    fn apply(&self, operand: &Value) -> Result<Value, ValueError> {
        let mut value = operand.create_temp_from();
        match self {
            UnaryOp::Negate => value.negate()?,
            UnaryOp::Not => value.not()?,
        }
        Ok(value)
    }
}

#[derive(Clone, Debug)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: NodeId,
}

impl Unary {
    pub fn new(op: UnaryOp, operand: NodeId) -> Self {
        Self { op, operand }
    }
}

impl Invocable for Unary {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.operand, ctx)?;
        let span = body.span(id);
        let operand = body.node(self.operand)?;
        if !operand.result.supports(self.op.operation()) {
            return Err(ValueError::NotSupported {
                operation: self.op.operation(),
                kind: operand.result.kind_name(),
            }
            .at(&span));
        }
        if body.is_literal(self.operand) {
            let value = self.op.apply(&operand.result).map_err(|e| e.at(&span))?;
            return Ok(Verified::Constant(value));
        }
        let ty = operand.ty;
        let probe = operand.result.create_temp_from();
        body.set_probe(id, ty, ValueClass::TEMPORARY, probe)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if body.step(self.operand, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        let value = self
            .op
            .apply(body.result(self.operand)?)
            .map_err(|e| e.at(&body.span(id)))?;
        body.set_result(id, value)?;
        Ok(Step::Finished)
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.operand]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    fn operation(&self) -> Operation {
        match self {
            BinaryOp::Add => Operation::Plus,
            BinaryOp::Sub => Operation::Minus,
            BinaryOp::Mul => Operation::Multiply,
            BinaryOp::Div => Operation::Divide,
            BinaryOp::Mod => Operation::Modulus,
            BinaryOp::Pow => Operation::Power,
            BinaryOp::And => Operation::And,
            BinaryOp::Or => Operation::Or,
            BinaryOp::Xor => Operation::Xor,
            BinaryOp::Eq | BinaryOp::Ne => Operation::Equals,
            BinaryOp::Lt | BinaryOp::Ge => Operation::Lesser,
            BinaryOp::Gt | BinaryOp::Le => Operation::Greater,
        }
    }

    pub fn evaluate(&self, left: &Value, right: &Value, epsilon: f64) -> Result<Value, ValueError> {
        let result = match self {
            BinaryOp::Eq => Value::Bool(left.equals(right, epsilon)?),
            BinaryOp::Ne => Value::Bool(!left.equals(right, epsilon)?),
            BinaryOp::Lt => Value::Bool(left.lesser(right)?),
            BinaryOp::Gt => Value::Bool(left.greater(right)?),
            BinaryOp::Le => Value::Bool(!left.greater(right)?),
            BinaryOp::Ge => Value::Bool(!left.lesser(right)?),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                let mut value = left.create_temp_from();
                value.logical(self.operation(), right)?;
                value
            }
            _ => {
                let mut value = left.create_temp_from();
                value.arithmetic(self.operation(), right)?;
                value
            }
        };
        Ok(result)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum BinaryState {
    #[default]
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: NodeId,
    pub right: NodeId,
    state: BinaryState,
}

impl Binary {
    pub fn new(op: BinaryOp, left: NodeId, right: NodeId) -> Self {
        Self {
            op,
            left,
            right,
            state: BinaryState::Left,
        }
    }

    fn check_operands(&self, body: &Body, types: &TypeTable) -> Result<(), Diagnostic> {
        let left = body.node(self.left)?;
        let right = body.node(self.right)?;
        if let (Some(a), Some(b)) = (left.ty, right.ty) {
            if !types.compatible(a, b) {
                return Err(ValueError::IncompatibleTypes {
                    expected: types.name_of(a),
                    found: types.name_of(b),
                }
                .between(&left.span, &right.span));
            }
        }
        let operation = self.op.operation();
        if left.result.operates_with(operation, &right.result) {
            return Ok(());
        }
        let error = if !left.result.supports(operation) {
            ValueError::NotSupported {
                operation,
                kind: left.result.kind_name(),
            }
        } else {
            ValueError::IncompatibleOperands {
                operation,
                left: left.result.kind_name(),
                right: right.result.kind_name(),
            }
        };
        Err(error.between(&left.span, &right.span))
    }
}

impl Invocable for Binary {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.left, ctx)?;
        body.verify(self.right, ctx)?;
        self.check_operands(body, ctx.types())?;

        let left = body.node(self.left)?;
        let right = body.node(self.right)?;
        if body.is_literal(self.left) && body.is_literal(self.right) {
            let value = self
                .op
                .evaluate(&left.result, &right.result, ctx.options.real_epsilon)
                .map_err(|e| e.between(&left.span, &right.span))?;
            return Ok(Verified::Constant(value));
        }

        let (ty, probe) = if self.op.is_comparison() {
            (ctx.types().elementary(&elementary::BOOL), Value::Bool(false))
        } else {
            // An untyped operand takes the type of the operand that has one.
            let probe = match (left.ty, right.ty) {
                (None, Some(_)) => right.result.create_temp_from(),
                _ => left.result.create_temp_from(),
            };
            (left.ty.or(right.ty), probe)
        };
        body.set_probe(id, ty, ValueClass::TEMPORARY, probe)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == BinaryState::Left {
            if body.step(self.left, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            self.state = BinaryState::Right;
        }
        if body.step(self.right, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        self.state = BinaryState::Left;

        let left = body.node(self.left)?;
        let right = body.node(self.right)?;
        let value = self
            .op
            .evaluate(&left.result, &right.result, ctx.options.real_epsilon)
            .map_err(|e| e.between(&left.span, &right.span))?;
        body.set_result(id, value)?;
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.state = BinaryState::Left;
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.left, self.right]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use stplc_dsl::core::SourceSpan;
    use crate::test_support::Fixture;
    use rstest::rstest;

    fn literal(body: &mut Body, value: Value) -> NodeId {
        body.add(NodeKind::Literal(Literal::new(value)), SourceSpan::default())
    }

    fn verify(fixture: &Fixture, body: &mut Body, id: NodeId) -> Result<(), Diagnostic> {
        let mut ctx = VerifyContext::new(&fixture.library, None, &fixture.options);
        body.verify(id, &mut ctx)
    }

    #[rstest]
    #[case(BinaryOp::Add, Value::Integer(2), Value::Integer(3), Value::Integer(5))]
    #[case(BinaryOp::Mod, Value::Integer(7), Value::Integer(3), Value::Integer(1))]
    #[case(BinaryOp::Le, Value::Integer(3), Value::Integer(3), Value::Bool(true))]
    #[case(BinaryOp::Ne, Value::Real(1.0), Value::Real(1.00001), Value::Bool(false))]
    #[case(BinaryOp::Xor, Value::Bool(true), Value::Bool(true), Value::Bool(false))]
    fn evaluate_when_operands_then_result(
        #[case] op: BinaryOp,
        #[case] left: Value,
        #[case] right: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(op.evaluate(&left, &right, 1e-4).unwrap(), expected);
    }

    #[test]
    fn verify_when_constant_division_by_zero_then_error() {
        let fixture = Fixture::new();
        let mut body = Body::default();
        let left = literal(&mut body, Value::Integer(1));
        let right = literal(&mut body, Value::Integer(0));
        let id = body.add(
            NodeKind::Binary(Binary::new(BinaryOp::Div, left, right)),
            SourceSpan::default(),
        );
        let err = verify(&fixture, &mut body, id).unwrap_err();
        assert_eq!(err.code(), Problem::DivisionByZero.code());
    }

    #[test]
    fn verify_when_bool_plus_integer_then_incompatible_operands() {
        let fixture = Fixture::new();
        let mut body = Body::default();
        let left = literal(&mut body, Value::Bool(true));
        let right = literal(&mut body, Value::Integer(1));
        let id = body.add(
            NodeKind::Binary(Binary::new(BinaryOp::Add, left, right)),
            SourceSpan::default(),
        );
        assert!(verify(&fixture, &mut body, id).is_err());
    }

    #[test]
    fn verify_when_typed_literal_out_of_range_then_error() {
        let fixture = Fixture::new();
        let mut body = Body::default();
        let id = body.add(
            NodeKind::Literal(Literal::typed(Id::from("SINT"), Value::Integer(300))),
            SourceSpan::default(),
        );
        let err = verify(&fixture, &mut body, id).unwrap_err();
        assert_eq!(err.code(), Problem::ValueOutOfRange.code());
    }

    #[test]
    fn verify_when_not_of_integer_literal_then_folds() {
        let fixture = Fixture::new();
        let mut body = Body::default();
        let operand = literal(&mut body, Value::Bool(false));
        let id = body.add(
            NodeKind::Unary(Unary::new(UnaryOp::Not, operand)),
            SourceSpan::default(),
        );
        verify(&fixture, &mut body, id).unwrap();
        assert_eq!(body.result(id).unwrap(), &Value::Bool(true));
    }
}
