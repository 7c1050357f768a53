//! Variable references such as `x`, `s.member`, `a[i, j]` and `P.fb.Q`.
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::array::{self, Dimension};
use crate::class::{TypeClass, ValueClass};
use crate::error::ValueError;
use crate::library::{Library, PouId, VarRef};
use crate::machine::{InstanceId, Machine, Place};
use crate::node::{step_children, Body, Invocable, NodeId, Step, StepContext, Verified, VerifyContext};
use crate::types::{TypeId, TypeKind, TypeTable};
use crate::value::{FbRef, Operation, Value};
use crate::variable;

/// One name in a qualified reference together with its array indexes.
#[derive(Clone, Debug)]
pub struct Segment {
    pub name: Id,
    pub indexes: Vec<NodeId>,
    pub span: SourceSpan,
}

impl Segment {
    pub fn new(name: Id, span: SourceSpan) -> Self {
        Self {
            name,
            indexes: vec![],
            span,
        }
    }

    pub fn with_indexes(mut self, indexes: Vec<NodeId>) -> Self {
        self.indexes = indexes;
        self
    }
}

/// How to reach the next value from the current one.
#[derive(Clone, Debug, PartialEq)]
enum Selector {
    Member(usize),
    /// An array element given by the indexes `first..first + count`.
    Element {
        dimensions: Vec<Dimension>,
        first: usize,
        count: usize,
    },
    /// A variable of a program or function block instance.
    Var(usize),
}

/// A selector with the indexes evaluated.
#[derive(Clone, Debug, PartialEq)]
enum Hop {
    Child(usize),
    Var(usize),
}

/// What the reference denotes part way through the segments.
#[derive(Clone, Copy, Debug)]
enum Scope {
    Value(TypeId),
    Pou(PouId),
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub segments: Vec<Segment>,
    /// The variable that the first segment names. Set when references are
    /// resolved.
    pub root: Option<VarRef>,
    selectors: Vec<Selector>,
    /// The index expressions of every segment in order.
    indexes: Vec<NodeId>,
    /// The hops when every index is a constant.
    fixed: Option<Vec<Hop>>,
    next: usize,
    /// Where the value was found by the last step.
    pub place: Option<Place>,
}

impl Variable {
    pub fn new(segments: Vec<Segment>) -> Self {
        let indexes = segments.iter().flat_map(|s| s.indexes.iter().copied()).collect();
        Self {
            segments,
            root: None,
            selectors: vec![],
            indexes,
            fixed: None,
            next: 0,
            place: None,
        }
    }

    /// The reference as written, such as `P.fb.Q`.
    pub fn name(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.name.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Returns true if the reference is a single name without indexes.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1 && self.indexes.is_empty()
    }

    fn select(
        &mut self,
        library: &Library,
        scope: Scope,
        segment: &Segment,
        class: &mut ValueClass,
    ) -> Result<Scope, Diagnostic> {
        let types = &library.types;
        let pou = match scope {
            Scope::Pou(pou) => pou,
            Scope::Value(ty) => {
                if let Some((position, member)) = types.member_of(ty, &segment.name).map_err(|e| e.at(&segment.span))? {
                    self.selectors.push(Selector::Member(position));
                    return Ok(Scope::Value(member));
                }
                match types.function_block_of(ty).map_err(|e| e.at(&segment.span))? {
                    Some(pou) => pou,
                    None => {
                        let error = match types.kind_of(ty).map_err(|e| e.at(&segment.span))? {
                            TypeKind::Struct { .. } => ValueError::UnknownMember {
                                ty: types.name_of(ty),
                                member: segment.name.to_string(),
                            },
                            _ => ValueError::NotSupported {
                                operation: Operation::SubVariable,
                                kind: "non-structured",
                            },
                        };
                        return Err(error.at(&segment.span));
                    }
                }
            }
        };

        let declaration = library
            .pou(pou)
            .ok_or_else(|| Diagnostic::internal(&segment.span, "Reference to a POU that does not exist"))?;
        let var = declaration.find_var(&segment.name).ok_or_else(|| {
            Diagnostic::problem(
                Problem::UnresolvedVariable,
                Label::span(
                    segment.span.clone(),
                    format!("{} is not a variable of {}", segment.name, declaration.name),
                ),
            )
        })?;
        let decl = &declaration.vars[var];
        *class = decl.class;
        self.selectors.push(Selector::Var(var));
        Ok(Scope::Value(decl.ty.id().map_err(|e| e.at(&segment.span))?))
    }

    fn hops(&self, body: &Body, span: &SourceSpan) -> Result<Vec<Hop>, Diagnostic> {
        self.selectors
            .iter()
            .map(|selector| match selector {
                Selector::Member(position) => Ok(Hop::Child(*position)),
                Selector::Var(var) => Ok(Hop::Var(*var)),
                Selector::Element {
                    dimensions,
                    first,
                    count,
                } => {
                    let values = self.indexes[*first..*first + *count]
                        .iter()
                        .map(|index| {
                            body.result(*index)?
                                .integer()
                                .map_err(|e| e.at(&body.span(*index)))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let flat = array::flat_index(dimensions, &values).map_err(|e| e.at(span))?;
                    Ok(Hop::Child(flat))
                }
            })
            .collect()
    }
}

fn require_integer(body: &Body, id: NodeId, types: &TypeTable) -> Result<(), Diagnostic> {
    let node = body.node(id)?;
    let integer = match node.ty {
        Some(ty) => types
            .class_of(ty)
            .map(|c| c.intersects(TypeClass::ANY_INT))
            .unwrap_or(false),
        None => matches!(node.result, Value::Integer(_)),
    };
    if integer {
        return Ok(());
    }
    Err(ValueError::IncompatibleTypes {
        expected: "an integer index".to_string(),
        found: node.result.kind_name().to_string(),
    }
    .at(&node.span))
}

impl Invocable for Variable {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        let span = body.span(id);
        let root = self
            .root
            .ok_or_else(|| Diagnostic::internal(&span, format!("{} is not resolved", self.name())))?;
        for index in self.indexes.iter() {
            body.verify(*index, ctx)?;
            require_integer(body, *index, ctx.types())?;
        }

        let library = ctx.library;
        let types = &library.types;
        let (mut scope, mut class) = match root {
            VarRef::Local(var) => {
                let decl = ctx
                    .pou
                    .and_then(|pou| pou.vars.get(var))
                    .ok_or_else(|| Diagnostic::internal(&span, format!("No local variable {}", var)))?;
                (Scope::Value(decl.ty.id().map_err(|e| e.at(&span))?), decl.class)
            }
            VarRef::Global(global) => {
                let decl = library
                    .globals
                    .get(global)
                    .ok_or_else(|| Diagnostic::internal(&span, format!("No global variable {}", global)))?;
                (Scope::Value(decl.ty.id().map_err(|e| e.at(&span))?), decl.class)
            }
            VarRef::Program(pou) => (Scope::Pou(pou), ValueClass::empty()),
        };

        self.selectors.clear();
        let segments = self.segments.clone();
        let mut first = 0;
        for (position, segment) in segments.iter().enumerate() {
            if position > 0 {
                scope = self.select(library, scope, segment, &mut class)?;
            }
            if segment.indexes.is_empty() {
                continue;
            }
            let count = segment.indexes.len();
            let Scope::Value(ty) = scope else {
                return Err(ValueError::NotSupported {
                    operation: Operation::Index,
                    kind: "program",
                }
                .at(&segment.span));
            };
            let Some((element, dimensions)) = types.array_of(ty).map_err(|e| e.at(&segment.span))? else {
                return Err(ValueError::NotSupported {
                    operation: Operation::Index,
                    kind: "non-array",
                }
                .at(&segment.span));
            };
            if dimensions.len() != count {
                return Err(ValueError::IndexCount {
                    expected: dimensions.len(),
                    found: count,
                }
                .at(&segment.span));
            }
            self.selectors.push(Selector::Element {
                dimensions: dimensions.to_vec(),
                first,
                count,
            });
            first += count;
            scope = Scope::Value(element);
        }

        let Scope::Value(ty) = scope else {
            return Err(Diagnostic::problem(
                Problem::NotAssignable,
                Label::span(span, format!("Program {} is not a value", self.name())),
            ));
        };
        let probe = types.create_value_of(ty, None).map_err(|e| e.at(&span))?;
        body.set_probe(id, Some(ty), class.difference(ValueClass::TEMPORARY), probe)?;
        Ok(Verified::Node)
    }

    fn allocate(&mut self, id: NodeId, body: &mut Body, _: &TypeTable) -> Result<(), Diagnostic> {
        if self.indexes.iter().all(|index| body.is_literal(*index)) {
            self.fixed = Some(self.hops(body, &body.span(id))?);
        }
        Ok(())
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        let span = body.span(id);
        if self.fixed.is_none() && step_children(&self.indexes, &mut self.next, body, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        self.next = 0;

        let root = self
            .root
            .ok_or_else(|| Diagnostic::internal(&span, format!("{} is not resolved", self.name())))?;
        let hops = match &self.fixed {
            Some(hops) => hops.clone(),
            None => self.hops(body, &span)?,
        };
        let place = locate(ctx.library, ctx.machine, ctx.instance, root, &hops).map_err(|e| e.at(&span))?;
        let value = load(ctx.library, ctx.machine, &place).map_err(|e| e.at(&span))?;
        body.set_result(id, value)?;
        self.place = Some(place);
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.next = 0;
        self.place = None;
    }

    fn children(&self) -> Vec<NodeId> {
        self.indexes.clone()
    }
}

enum At {
    Place(Place),
    Instance(InstanceId),
}

/// Finds where the value of the reference is stored.
fn locate(
    library: &Library,
    machine: &Machine,
    instance: Option<InstanceId>,
    root: VarRef,
    hops: &[Hop],
) -> Result<Place, ValueError> {
    let mut at = match root {
        VarRef::Local(var) => {
            let instance =
                instance.ok_or_else(|| ValueError::Internal("local variable outside of an instance".to_string()))?;
            At::Place(machine.place_of(library, instance, var)?)
        }
        VarRef::Global(global) => At::Place(Place::global(global)),
        VarRef::Program(pou) => At::Instance(machine.program(pou)?),
    };
    for hop in hops {
        at = match (at, hop) {
            (At::Place(mut place), Hop::Child(position)) => {
                place.path.push(*position);
                At::Place(place)
            }
            (At::Place(place), Hop::Var(var)) => match machine.value(&place)? {
                Value::FunctionBlock(FbRef {
                    instance: Some(instance),
                    ..
                }) => At::Place(machine.place_of(library, *instance, *var)?),
                other => {
                    return Err(ValueError::Internal(format!(
                        "{} value is not a bound function block",
                        other.kind_name()
                    )))
                }
            },
            (At::Instance(instance), Hop::Var(var)) => At::Place(machine.place_of(library, instance, *var)?),
            (At::Instance(_), Hop::Child(_)) => {
                return Err(ValueError::Internal("element of a program instance".to_string()))
            }
        };
    }
    match at {
        At::Place(place) => Ok(place),
        At::Instance(_) => Err(ValueError::Internal("program instance is not a value".to_string())),
    }
}

/// Reads the value at the place. Directly addressed variables are read
/// from memory first.
pub fn load(library: &Library, machine: &mut Machine, place: &Place) -> Result<Value, ValueError> {
    if place.path.is_empty() {
        machine.sync_direct(library, &place.slot, false)?;
    }
    machine.value(place).cloned()
}

/// Assigns the value at the place. Directly addressed variables are
/// written to memory afterwards.
pub fn store(
    library: &Library,
    machine: &mut Machine,
    place: &Place,
    ty: Option<TypeId>,
    class: ValueClass,
    name: &str,
    source: &Value,
) -> Result<(), ValueError> {
    let target = machine.value_mut(place)?;
    variable::assign(&library.types, ty, class, name, target, source)?;
    if place.path.is_empty() {
        machine.sync_direct(library, &place.slot, true)?;
    }
    Ok(())
}

/// Reads the variable of a reference without indexes, for example the
/// function block instance that a call invokes.
pub fn locate_var(
    library: &Library,
    machine: &Machine,
    instance: Option<InstanceId>,
    root: VarRef,
) -> Result<Place, ValueError> {
    locate(library, machine, instance, root, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::test_support::{run_to_completion, Fixture};

    fn reference(body: &mut Body, names: &[&str], root: VarRef) -> NodeId {
        let segments = names
            .iter()
            .map(|n| Segment::new(Id::from(n), SourceSpan::default()))
            .collect();
        let mut variable = Variable::new(segments);
        variable.root = Some(root);
        body.add(NodeKind::Variable(variable), SourceSpan::default())
    }

    #[test]
    fn verify_when_unknown_member_then_error_names_member() {
        let fixture = Fixture::with_point_global();
        let mut body = Body::default();
        let id = reference(&mut body, &["origin", "z"], VarRef::Global(0));
        let mut ctx = VerifyContext::new(&fixture.library, None, &fixture.options);
        let err = body.verify(id, &mut ctx).unwrap_err();
        assert_eq!(err.code(), Problem::UnknownMember.code());
        assert!(err.description().contains("member=z"));
    }

    #[test]
    fn step_when_member_then_value_and_place() {
        let mut fixture = Fixture::with_point_global();
        let mut body = Body::default();
        let id = reference(&mut body, &["origin", "y"], VarRef::Global(0));
        {
            let mut ctx = VerifyContext::new(&fixture.library, None, &fixture.options);
            body.verify(id, &mut ctx).unwrap();
        }
        body.allocate(id, &fixture.library.types).unwrap();
        run_to_completion(&mut fixture, &mut body, id).unwrap();
        assert_eq!(body.result(id).unwrap(), &Value::Integer(7));
        assert_eq!(
            body.variable(id).unwrap().place,
            Some(Place {
                slot: crate::machine::Slot::Global(0),
                path: vec![1]
            })
        );
    }

    #[test]
    fn verify_when_index_count_wrong_then_error() {
        let fixture = Fixture::with_array_global();
        let mut body = Body::default();
        let one = body.add(
            NodeKind::Literal(crate::expr::Literal::new(Value::Integer(1))),
            SourceSpan::default(),
        );
        let two = body.add(
            NodeKind::Literal(crate::expr::Literal::new(Value::Integer(2))),
            SourceSpan::default(),
        );
        let mut variable =
            Variable::new(vec![Segment::new(Id::from("table"), SourceSpan::default()).with_indexes(vec![one, two])]);
        variable.root = Some(VarRef::Global(0));
        let id = body.add(NodeKind::Variable(variable), SourceSpan::default());
        let mut ctx = VerifyContext::new(&fixture.library, None, &fixture.options);
        let err = body.verify(id, &mut ctx).unwrap_err();
        assert_eq!(err.code(), Problem::IndexCount.code());
    }
}
