//! The invocable protocol that every expression and statement implements.
//!
//! The nodes of a body live in an arena and refer to their children by
//! `NodeId`. Each node keeps an explicit state that says where its next
//! `step` resumes. A node steps its children directly: when a child returns
//! `Step::InProgress` the node returns `Step::InProgress` as well, and the
//! next `step` of the root descends again to the same child. Only calls
//! hand control to another body, through the cursor.
//!
//! While a node is stepped or verified its kind is moved out of the arena
//! so that the node may freely borrow the body to reach its children.
use std::mem;

use log::trace;
use stplc_dsl::{core::SourceSpan, diagnostic::Diagnostic};

use crate::call::Call;
use crate::class::ValueClass;
use crate::cursor::Cursor;
use crate::expr::{Binary, Literal, Unary};
use crate::library::{Library, Pou};
use crate::machine::{InstanceId, Machine};
use crate::options::Options;
use crate::qualified::Variable;
use crate::stmt::{Assign, Case, Exit, For, If, List, Repeat, Return, While};
use crate::types::{TypeId, TypeTable};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The result of advancing a node by one micro-step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The node produced its result and is ready to start again.
    Finished,
    /// The node must be stepped again to make progress.
    InProgress,
}

/// The result of verifying a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Verified {
    Node,
    /// The node does not need to be stepped and evaluates to the value.
    /// The node is replaced with a literal.
    Constant(Value),
}

/// Context for checking a body before it is executed.
pub struct VerifyContext<'a> {
    pub library: &'a Library,
    /// The POU that owns the body. Queries have no POU.
    pub pou: Option<&'a Pou>,
    pub options: &'a Options,
    /// The number of loops that enclose the node being verified.
    pub loop_depth: usize,
    /// Problems in statements that did not stop verification of the
    /// statements around them.
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> VerifyContext<'a> {
    pub fn new(library: &'a Library, pou: Option<&'a Pou>, options: &'a Options) -> Self {
        Self {
            library,
            pou,
            options,
            loop_depth: 0,
            diagnostics: vec![],
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.library.types
    }
}

/// Context for advancing a body.
pub struct StepContext<'a> {
    pub library: &'a Library,
    pub machine: &'a mut Machine,
    pub cursor: &'a mut Cursor,
    pub options: &'a Options,
    /// The instance that owns the body being stepped. Queries have no
    /// instance.
    pub instance: Option<InstanceId>,
}

impl StepContext<'_> {
    pub fn types(&self) -> &TypeTable {
        &self.library.types
    }

    pub fn instance(&self, span: &SourceSpan) -> Result<InstanceId, Diagnostic> {
        self.instance
            .ok_or_else(|| Diagnostic::internal(span, "Statement executed outside of an instance"))
    }
}

/// The protocol for expressions and statements.
pub trait Invocable {
    /// Checks the node and its children before execution. Sets the type,
    /// class and a probe result (a value of the result type) on the node.
    fn verify(
        &mut self,
        id: NodeId,
        body: &mut Body,
        ctx: &mut VerifyContext,
    ) -> Result<Verified, Diagnostic>;

    /// Prepares the node for execution once the whole body is verified.
    /// Children are allocated before their parent.
    fn allocate(&mut self, _id: NodeId, _body: &mut Body, _types: &TypeTable) -> Result<(), Diagnostic> {
        Ok(())
    }

    /// Advances the node by one micro-step.
    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic>;

    /// Rewinds the node to its start state.
    fn reset(&mut self) {}

    fn children(&self) -> Vec<NodeId>;

    /// Returns true if the node never needs to be stepped.
    fn is_constant(&self) -> bool {
        false
    }
}

/// The kind of a node that is moved out of the arena while it is in use.
#[derive(Clone, Debug)]
pub struct Vacant;

impl Invocable for Vacant {
    fn verify(&mut self, id: NodeId, body: &mut Body, _: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        Err(vacant(id, body))
    }

    fn step(&mut self, id: NodeId, body: &mut Body, _: &mut StepContext) -> Result<Step, Diagnostic> {
        Err(vacant(id, body))
    }

    fn children(&self) -> Vec<NodeId> {
        vec![]
    }
}

fn vacant(id: NodeId, body: &Body) -> Diagnostic {
    Diagnostic::internal(&body.span(id), format!("Node {} is its own descendant", id.0))
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Literal(Literal),
    Variable(Variable),
    Unary(Unary),
    Binary(Binary),
    Call(Call),
    List(List),
    Assign(Assign),
    If(If),
    Case(Case),
    For(For),
    While(While),
    Repeat(Repeat),
    Exit(Exit),
    Return(Return),
    Vacant(Vacant),
}

impl NodeKind {
    fn invocable(&mut self) -> &mut dyn Invocable {
        match self {
            NodeKind::Literal(n) => n,
            NodeKind::Variable(n) => n,
            NodeKind::Unary(n) => n,
            NodeKind::Binary(n) => n,
            NodeKind::Call(n) => n,
            NodeKind::List(n) => n,
            NodeKind::Assign(n) => n,
            NodeKind::If(n) => n,
            NodeKind::Case(n) => n,
            NodeKind::For(n) => n,
            NodeKind::While(n) => n,
            NodeKind::Repeat(n) => n,
            NodeKind::Exit(n) => n,
            NodeKind::Return(n) => n,
            NodeKind::Vacant(n) => n,
        }
    }

    fn as_invocable(&self) -> &dyn Invocable {
        match self {
            NodeKind::Literal(n) => n,
            NodeKind::Variable(n) => n,
            NodeKind::Unary(n) => n,
            NodeKind::Binary(n) => n,
            NodeKind::Call(n) => n,
            NodeKind::List(n) => n,
            NodeKind::Assign(n) => n,
            NodeKind::If(n) => n,
            NodeKind::Case(n) => n,
            NodeKind::For(n) => n,
            NodeKind::While(n) => n,
            NodeKind::Repeat(n) => n,
            NodeKind::Exit(n) => n,
            NodeKind::Return(n) => n,
            NodeKind::Vacant(n) => n,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: SourceSpan,
    /// The type of the result. Untyped literals and their combinations
    /// have no type.
    pub ty: Option<TypeId>,
    pub class: ValueClass,
    /// The result of the last evaluation, or the probe set by `verify`.
    pub result: Value,
}

/// The nodes of one statement body. Each function block instance owns a
/// copy so that instances keep separate execution state.
#[derive(Clone, Debug, Default)]
pub struct Body {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Body {
    pub fn add(&mut self, kind: NodeKind, span: SourceSpan) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span,
            ty: None,
            class: ValueClass::TEMPORARY,
            result: Value::Void,
        });
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, Diagnostic> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| Diagnostic::internal(&SourceSpan::builtin(), format!("No node {}", id.0)))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, Diagnostic> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| Diagnostic::internal(&SourceSpan::builtin(), format!("No node {}", id.0)))
    }

    pub fn span(&self, id: NodeId) -> SourceSpan {
        self.nodes
            .get(id.0)
            .map(|n| n.span.clone())
            .unwrap_or_else(SourceSpan::builtin)
    }

    pub fn result(&self, id: NodeId) -> Result<&Value, Diagnostic> {
        self.node(id).map(|n| &n.result)
    }

    pub fn set_result(&mut self, id: NodeId, value: Value) -> Result<(), Diagnostic> {
        self.node_mut(id)?.result = value;
        Ok(())
    }

    /// Records what verification learned about the result of the node.
    pub fn set_probe(
        &mut self,
        id: NodeId,
        ty: Option<TypeId>,
        class: ValueClass,
        probe: Value,
    ) -> Result<(), Diagnostic> {
        let node = self.node_mut(id)?;
        node.ty = ty;
        node.class = class;
        node.result = probe;
        Ok(())
    }

    pub fn is_literal(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0).map(|n| &n.kind), Some(NodeKind::Literal(_)))
    }

    /// The variable when the node is a variable reference.
    pub fn variable(&self, id: NodeId) -> Option<&Variable> {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(NodeKind::Variable(variable)) => Some(variable),
            _ => None,
        }
    }

    fn take(&mut self, id: NodeId) -> Result<NodeKind, Diagnostic> {
        let node = self.node_mut(id)?;
        Ok(mem::replace(&mut node.kind, NodeKind::Vacant(Vacant)))
    }

    fn restore(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.kind = kind;
        }
    }

    pub fn verify(&mut self, id: NodeId, ctx: &mut VerifyContext) -> Result<(), Diagnostic> {
        let mut kind = self.take(id)?;
        let result = kind.invocable().verify(id, self, ctx);
        match result {
            Ok(Verified::Constant(value)) => {
                trace!("Folded node {} to {}", id.0, value);
                let node = self.node_mut(id)?;
                node.kind = NodeKind::Literal(Literal::new(value.clone()));
                node.class = ValueClass::CONSTANT | ValueClass::TEMPORARY;
                node.result = value;
                Ok(())
            }
            Ok(Verified::Node) => {
                self.restore(id, kind);
                Ok(())
            }
            Err(diagnostic) => {
                self.restore(id, kind);
                Err(diagnostic)
            }
        }
    }

    pub fn allocate(&mut self, id: NodeId, types: &TypeTable) -> Result<(), Diagnostic> {
        let children = self.node(id)?.kind.as_invocable().children();
        for child in children {
            self.allocate(child, types)?;
        }
        let mut kind = self.take(id)?;
        let result = kind.invocable().allocate(id, self, types);
        self.restore(id, kind);
        result
    }

    pub fn step(&mut self, id: NodeId, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        let mut kind = self.take(id)?;
        let result = kind.invocable().step(id, self, ctx);
        self.restore(id, kind);
        result
    }

    /// Rewinds every node to its start state. Results are kept.
    pub fn reset(&mut self) {
        for node in self.nodes.iter_mut() {
            node.kind.invocable().reset();
        }
    }

    pub fn is_constant(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0)
            .map(|n| n.kind.as_invocable().is_constant())
            .unwrap_or(false)
    }
}

/// Steps the children in order starting at `next`. Returns `Finished`
/// once every child has finished. `next` records the progress so that a
/// finished child is not stepped again when stepping resumes.
pub fn step_children(
    children: &[NodeId],
    next: &mut usize,
    body: &mut Body,
    ctx: &mut StepContext,
) -> Result<Step, Diagnostic> {
    while let Some(child) = children.get(*next) {
        match body.step(*child, ctx)? {
            Step::InProgress => return Ok(Step::InProgress),
            Step::Finished => *next += 1,
        }
    }
    Ok(Step::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Literal};
    use crate::test_support::{run_to_completion, Fixture};

    #[test]
    fn verify_when_children_are_literals_then_folds_to_literal() {
        let fixture = Fixture::new();
        let mut body = Body::default();
        let left = body.add(NodeKind::Literal(Literal::new(Value::Integer(6))), SourceSpan::default());
        let right = body.add(NodeKind::Literal(Literal::new(Value::Integer(7))), SourceSpan::default());
        let product = body.add(
            NodeKind::Binary(Binary::new(BinaryOp::Mul, left, right)),
            SourceSpan::default(),
        );
        let mut ctx = VerifyContext::new(&fixture.library, None, &fixture.options);
        body.verify(product, &mut ctx).unwrap();
        assert!(body.is_literal(product));
        assert_eq!(body.result(product).unwrap(), &Value::Integer(42));
    }

    #[test]
    fn step_when_node_is_vacant_then_internal_error() {
        let mut fixture = Fixture::new();
        let mut body = Body::default();
        let id = body.add(NodeKind::Vacant(Vacant), SourceSpan::default());
        let err = run_to_completion(&mut fixture, &mut body, id).unwrap_err();
        assert!(err.is_fatal());
    }
}
