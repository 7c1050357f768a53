//! Builds compilation units.
//!
//! A front end describes declarations and bodies through the builders and
//! the builders register every reference to another declaration in the
//! matching pool. Types written inline in a declaration, such as
//! `x : ARRAY[1..3] OF INT`, are declared as types of their own named after
//! the declaration (`Main.x`). Those names contain a dot and so cannot clash
//! with a declared name.
use stplc_dsl::{
    core::{FileId, Id, SourceSpan},
    diagnostic::Diagnostic,
};

use crate::array::Dimension;
use crate::call::{Argument, Call};
use crate::class::ValueClass;
use crate::expr::{Binary, BinaryOp, Literal, Unary, UnaryOp};
use crate::library::{
    BodyPools, ExternalPool, ExternalReferrer, Owner, Pou, PouKind, TypePool, TypeReferrer,
    TypeSlot,
};
use crate::link_calls::bind_call;
use crate::link_references::{bind_external, bind_variable};
use crate::link_types::{bind_type, check_alias, check_array_bounds, check_subrange};
use crate::link_variables::check_address;
use crate::memory::DirectAddress;
use crate::node::{Body, NodeId, NodeKind};
use crate::qualified::{Segment, Variable};
use crate::query::Query;
use crate::stmt::{Assign, Case, CaseArm, Exit, For, If, List, Repeat, Return, While};
use crate::structure::StructMember;
use crate::types::{Type, TypeKind, TypeRef};
use crate::unit::CompilationUnit;
use crate::value::Value;
use crate::variable::{Section, VarDecl, VarKind};

/// The scope name for types declared inline by global variables.
const GLOBAL_SCOPE: &str = "VAR_GLOBAL";

/// A type as written in a declaration.
#[derive(Clone, Debug)]
pub enum TypeSpec {
    Named(Id),
    Subrange { base: Id, min: i128, max: i128 },
    Array {
        element: Box<TypeSpec>,
        dimensions: Vec<Dimension>,
    },
}

impl TypeSpec {
    pub fn named(name: &str) -> Self {
        TypeSpec::Named(Id::from(name))
    }
}

#[derive(Clone, Debug)]
pub struct MemberSpec {
    pub name: Id,
    pub ty: TypeSpec,
    pub initializer: Option<Value>,
    pub span: SourceSpan,
}

#[derive(Clone, Debug)]
pub struct VarSpec {
    pub name: Id,
    pub section: Section,
    pub ty: TypeSpec,
    pub class: ValueClass,
    pub initializer: Option<Value>,
    pub address: Option<DirectAddress>,
    pub span: SourceSpan,
}

impl VarSpec {
    pub fn new(name: Id, section: Section, ty: TypeSpec, span: SourceSpan) -> Self {
        Self {
            name,
            section,
            ty,
            class: ValueClass::empty(),
            initializer: None,
            address: None,
            span,
        }
    }

    pub fn with_class(mut self, class: ValueClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_initializer(mut self, initializer: Option<Value>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn with_address(mut self, address: Option<DirectAddress>) -> Self {
        self.address = address;
        self
    }
}

pub struct UnitBuilder {
    unit: CompilationUnit,
}

impl UnitBuilder {
    pub fn new(file_id: FileId) -> Self {
        Self {
            unit: CompilationUnit::new(file_id),
        }
    }

    fn push_type(&mut self, name: Id, kind: TypeKind, span: SourceSpan) {
        self.unit.types.push(Type { name, kind, span });
    }

    /// Returns a reference to the type, declaring the type first when it
    /// is written inline.
    fn type_ref(&mut self, spec: TypeSpec, path: &str, span: &SourceSpan) -> TypeRef {
        match spec {
            TypeSpec::Named(name) => TypeRef::named(name),
            TypeSpec::Subrange { base, min, max } => {
                let name = Id::from(path).with_position(span.clone());
                self.declare_subrange(name.clone(), base, min, max, None, span.clone());
                TypeRef::named(name)
            }
            TypeSpec::Array {
                element,
                dimensions,
            } => {
                let name = Id::from(path).with_position(span.clone());
                self.declare_array(name.clone(), *element, dimensions, None, span.clone());
                TypeRef::named(name)
            }
        }
    }

    pub fn declare_alias(&mut self, name: Id, parent: Id, initializer: Option<Value>, span: SourceSpan) {
        self.unit.type_pool.add_two_step(
            parent.clone(),
            TypeReferrer::Type {
                ty: name.clone(),
                slot: TypeSlot::Parent,
            },
            span.clone(),
            bind_type,
            check_alias,
        );
        self.push_type(
            name,
            TypeKind::Alias {
                parent: TypeRef::named(parent),
                initializer,
            },
            span,
        );
    }

    pub fn declare_enumeration(
        &mut self,
        name: Id,
        values: Vec<Id>,
        initializer: Option<Id>,
        span: SourceSpan,
    ) {
        self.push_type(name, TypeKind::Enumeration { values, initializer }, span);
    }

    pub fn declare_subrange(
        &mut self,
        name: Id,
        base: Id,
        min: i128,
        max: i128,
        initializer: Option<Value>,
        span: SourceSpan,
    ) {
        self.unit.type_pool.add_two_step(
            base.clone(),
            TypeReferrer::Type {
                ty: name.clone(),
                slot: TypeSlot::Base,
            },
            span.clone(),
            bind_type,
            check_subrange,
        );
        self.push_type(
            name,
            TypeKind::Subrange {
                base: TypeRef::named(base),
                min,
                max,
                initializer,
            },
            span,
        );
    }

    pub fn declare_array(
        &mut self,
        name: Id,
        element: TypeSpec,
        dimensions: Vec<Dimension>,
        initializer: Option<Value>,
        span: SourceSpan,
    ) {
        let element = self.type_ref(element, &format!("{}.element", name), &span);
        self.unit.type_pool.add_two_step(
            element.name.clone(),
            TypeReferrer::Type {
                ty: name.clone(),
                slot: TypeSlot::Element,
            },
            span.clone(),
            bind_type,
            check_array_bounds,
        );
        self.push_type(
            name,
            TypeKind::Array {
                element,
                dimensions,
                initializer,
            },
            span,
        );
    }

    pub fn declare_struct(&mut self, name: Id, members: Vec<MemberSpec>, span: SourceSpan) {
        let mut declared = vec![];
        for (position, member) in members.into_iter().enumerate() {
            let ty = self.type_ref(member.ty, &format!("{}.{}", name, member.name), &member.span);
            self.unit.type_pool.add(
                ty.name.clone(),
                TypeReferrer::Type {
                    ty: name.clone(),
                    slot: TypeSlot::Member(position),
                },
                member.span.clone(),
                bind_type,
            );
            declared.push(StructMember {
                name: member.name,
                ty,
                initializer: member.initializer,
                span: member.span,
            });
        }
        self.push_type(name, TypeKind::Struct { members: declared }, span);
    }

    /// Creates the declaration and registers its type reference, its
    /// external reference and its address check.
    fn declare_var(
        &mut self,
        spec: VarSpec,
        owner: Owner,
        pool: &mut TypePool,
        externals: &mut ExternalPool,
        position: usize,
    ) -> VarDecl {
        let scope = match &owner {
            Owner::Global => GLOBAL_SCOPE.to_string(),
            Owner::Pou(pou) => pou.to_string(),
        };
        let ty = self.type_ref(spec.ty, &format!("{}.{}", scope, spec.name), &spec.span);
        let referrer = TypeReferrer::Variable {
            owner: owner.clone(),
            name: spec.name.clone(),
        };
        pool.add(ty.name.clone(), referrer.clone(), spec.span.clone(), bind_type);

        let mut class = spec.class;
        let kind = if spec.section == Section::External {
            class |= ValueClass::EXTERNAL;
            if let Owner::Pou(pou) = &owner {
                externals.add(
                    spec.name.clone(),
                    ExternalReferrer {
                        pou: pou.clone(),
                        var: position,
                    },
                    spec.span.clone(),
                    bind_external,
                );
            }
            VarKind::External { global: None }
        } else if let Some(address) = spec.address {
            pool.add_post_resolve(referrer, spec.span.clone(), check_address);
            VarKind::Direct(address)
        } else {
            VarKind::Owned
        };

        VarDecl::new(spec.name, spec.section, ty, spec.span)
            .with_class(class)
            .with_initializer(spec.initializer)
            .with_kind(kind)
    }

    pub fn declare_global(&mut self, spec: VarSpec) {
        let mut pool = std::mem::take(&mut self.unit.global_pool);
        let mut externals = ExternalPool::new();
        let position = self.unit.globals.len();
        let decl = self.declare_var(spec, Owner::Global, &mut pool, &mut externals, position);
        self.unit.globals.push(decl);
        self.unit.global_pool = pool;
    }

    pub fn add_pou(&mut self, builder: PouBuilder) {
        let PouBuilder {
            name,
            kind,
            returns,
            vars,
            body,
            span,
        } = builder;
        let mut pou = Pou::new(name.clone(), kind, span.clone());
        let owner = Owner::Pou(name.clone());
        for spec in vars {
            let position = pou.vars.len();
            let decl = self.declare_var(
                spec,
                owner.clone(),
                &mut pou.pools.header,
                &mut pou.pools.externals,
                position,
            );
            pou.vars.push(decl);
        }
        if let Some(returns) = returns {
            let spec = VarSpec::new(name.clone(), Section::Return, returns, span);
            let position = pou.vars.len();
            let decl = self.declare_var(
                spec,
                owner,
                &mut pou.pools.header,
                &mut pou.pools.externals,
                position,
            );
            pou.vars.push(decl);
        }
        let (body, pools) = body.finish();
        pou.body = body;
        pou.pools.body = pools;
        self.unit.pous.push(pou);
    }

    /// Records a problem found while reading the source.
    pub fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.unit.diagnostics.push(diagnostic);
    }

    pub fn build(self) -> CompilationUnit {
        self.unit
    }
}

pub struct PouBuilder {
    name: Id,
    kind: PouKind,
    returns: Option<TypeSpec>,
    vars: Vec<VarSpec>,
    body: BodyBuilder,
    span: SourceSpan,
}

impl PouBuilder {
    pub fn new(name: Id, kind: PouKind, span: SourceSpan) -> Self {
        Self {
            name,
            kind,
            returns: None,
            vars: vec![],
            body: BodyBuilder::new(),
            span,
        }
    }

    /// Sets the result type of a function.
    pub fn returns(&mut self, ty: TypeSpec) {
        self.returns = Some(ty);
    }

    pub fn var(&mut self, spec: VarSpec) {
        self.vars.push(spec);
    }

    pub fn body(&mut self) -> &mut BodyBuilder {
        &mut self.body
    }
}

/// Builds a body of nodes. Every constructor returns the identifier of the
/// new node for use as a child of later nodes.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    body: Body,
    pools: BodyPools,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: NodeKind, span: SourceSpan) -> NodeId {
        self.body.add(kind, span)
    }

    pub fn literal(&mut self, value: Value, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Literal(Literal::new(value)), span)
    }

    /// A literal with a type prefix such as `INT#5`.
    pub fn typed_literal(&mut self, ty: Id, value: Value, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Literal(Literal::typed(ty, value)), span)
    }

    pub fn variable(&mut self, segments: Vec<Segment>, span: SourceSpan) -> NodeId {
        let first = segments.first().map(|s| (s.name.clone(), s.span.clone()));
        let id = self.add(NodeKind::Variable(Variable::new(segments)), span);
        if let Some((name, span)) = first {
            self.pools.variables.add(name, id, span, bind_variable);
        }
        id
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Unary(Unary::new(op, operand)), span)
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Binary(Binary::new(op, left, right)), span)
    }

    pub fn call(&mut self, name: Id, args: Vec<Argument>, span: SourceSpan) -> NodeId {
        let id = self.add(NodeKind::Call(Call::new(name.clone(), args)), span.clone());
        self.pools.calls.add(name, id, span, bind_call);
        id
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Assign(Assign::new(target, value)), span)
    }

    pub fn list(&mut self, statements: Vec<NodeId>, span: SourceSpan) -> NodeId {
        self.add(NodeKind::List(List::new(statements)), span)
    }

    pub fn if_then(
        &mut self,
        branches: Vec<(NodeId, NodeId)>,
        otherwise: Option<NodeId>,
        span: SourceSpan,
    ) -> NodeId {
        self.add(NodeKind::If(If::new(branches, otherwise)), span)
    }

    pub fn case(
        &mut self,
        selector: NodeId,
        arms: Vec<CaseArm>,
        otherwise: Option<NodeId>,
        span: SourceSpan,
    ) -> NodeId {
        self.add(NodeKind::Case(Case::new(selector, arms, otherwise)), span)
    }

    pub fn for_loop(
        &mut self,
        control: NodeId,
        start: NodeId,
        end: NodeId,
        step: Option<NodeId>,
        body: NodeId,
        span: SourceSpan,
    ) -> NodeId {
        self.add(NodeKind::For(For::new(control, start, end, step, body)), span)
    }

    pub fn while_loop(&mut self, condition: NodeId, body: NodeId, span: SourceSpan) -> NodeId {
        self.add(NodeKind::While(While::new(condition, body)), span)
    }

    pub fn repeat(&mut self, body: NodeId, condition: NodeId, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Repeat(Repeat::new(body, condition)), span)
    }

    pub fn exit(&mut self, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Exit(Exit), span)
    }

    pub fn return_(&mut self, span: SourceSpan) -> NodeId {
        self.add(NodeKind::Return(Return), span)
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.body.set_root(root);
    }

    pub fn finish(self) -> (Body, BodyPools) {
        (self.body, self.pools)
    }

    pub fn query(self) -> Query {
        Query {
            body: self.body,
            pools: self.pools,
        }
    }
}
