//! Statements.
//!
//! A statement list announces every statement before stepping it so that
//! execution can pause at statement boundaries. Loops return
//! `Step::InProgress` after each iteration so that every iteration counts
//! towards the micro-step limit of the cycle.
use stplc_dsl::diagnostic::{Diagnostic, Label};
use stplc_problems::Problem;

use crate::class::{TypeClass, ValueClass};
use crate::cursor::Pending;
use crate::error::ValueError;
use crate::node::{step_children, Body, Invocable, NodeId, Step, StepContext, Verified, VerifyContext};
use crate::qualified;
use crate::types::TypeTable;
use crate::value::{Operation, Value};
use crate::variable;

fn require_class(body: &Body, id: NodeId, types: &TypeTable, class: TypeClass) -> Result<bool, Diagnostic> {
    let node = body.node(id)?;
    Ok(match node.ty {
        Some(ty) => types
            .class_of(ty)
            .map(|c| c.intersects(class))
            .unwrap_or(false),
        None => match node.result {
            Value::Bool(_) => class.contains(TypeClass::BOOL),
            Value::Integer(_) => class.intersects(TypeClass::ANY_INT),
            _ => false,
        },
    })
}

fn require_condition(body: &Body, id: NodeId, types: &TypeTable) -> Result<(), Diagnostic> {
    if require_class(body, id, types, TypeClass::BOOL)? {
        return Ok(());
    }
    Err(Diagnostic::problem(
        Problem::ConditionNotBool,
        Label::span(body.span(id), "Condition is not BOOL"),
    ))
}

fn require_integer(body: &Body, id: NodeId, types: &TypeTable, what: &str) -> Result<(), Diagnostic> {
    if require_class(body, id, types, TypeClass::ANY_INT)? {
        return Ok(());
    }
    let node = body.node(id)?;
    Err(ValueError::IncompatibleTypes {
        expected: format!("an integer {}", what),
        found: node.result.kind_name().to_string(),
    }
    .at(&node.span))
}

fn truth(body: &Body, id: NodeId) -> Result<bool, Diagnostic> {
    body.result(id)?.bool().map_err(|e| e.at(&body.span(id)))
}

#[derive(Clone, Debug)]
pub struct List {
    pub statements: Vec<NodeId>,
    position: usize,
    announced: bool,
}

impl List {
    pub fn new(statements: Vec<NodeId>) -> Self {
        Self {
            statements,
            position: 0,
            announced: false,
        }
    }
}

impl Invocable for List {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        for statement in self.statements.iter() {
            if let Err(diagnostic) = body.verify(*statement, ctx) {
                ctx.diagnostics.push(diagnostic);
            }
        }
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, _: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        while let Some(statement) = self.statements.get(self.position).copied() {
            if !self.announced {
                self.announced = true;
                ctx.cursor.pause_at(body.span(statement));
                return Ok(Step::InProgress);
            }
            if body.step(statement, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            self.position += 1;
            self.announced = false;
            if ctx.cursor.pending() != Pending::None {
                break;
            }
        }
        self.reset();
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.position = 0;
        self.announced = false;
    }

    fn children(&self) -> Vec<NodeId> {
        self.statements.clone()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum AssignState {
    #[default]
    Target,
    Value,
}

#[derive(Clone, Debug)]
pub struct Assign {
    pub target: NodeId,
    pub value: NodeId,
    state: AssignState,
}

impl Assign {
    pub fn new(target: NodeId, value: NodeId) -> Self {
        Self {
            target,
            value,
            state: AssignState::Target,
        }
    }
}

impl Invocable for Assign {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.target, ctx)?;
        let Some(variable) = body.variable(self.target) else {
            return Err(Diagnostic::problem(
                Problem::NotAssignable,
                Label::span(body.span(self.target), "Target of the assignment is not a variable"),
            ));
        };
        let name = variable.name();
        body.verify(self.value, ctx)?;

        let target = body.node(self.target)?;
        let value = body.node(self.value)?;
        if target.class.is_constant() {
            return Err(ValueError::ConstantTarget(name).at(&target.span));
        }
        if let Value::FunctionBlock(_) = target.result {
            return Err(ValueError::NotSupported {
                operation: Operation::Assign,
                kind: target.result.kind_name(),
            }
            .at(&target.span));
        }
        variable::assignable_from(ctx.types(), target.ty, value.ty, value.class, &value.result)
            .map_err(|e| e.at(&value.span))?;
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == AssignState::Target {
            if body.step(self.target, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            self.state = AssignState::Value;
        }
        if body.step(self.value, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        self.state = AssignState::Target;

        let span = body.span(id);
        let target = body.node(self.target)?;
        let (ty, class) = (target.ty, target.class);
        let variable = body
            .variable(self.target)
            .ok_or_else(|| Diagnostic::internal(&span, "Target of the assignment is not a variable"))?;
        let place = variable
            .place
            .as_ref()
            .ok_or_else(|| Diagnostic::internal(&span, "Target of the assignment was not located"))?;
        let value = body.result(self.value)?;
        qualified::store(ctx.library, ctx.machine, place, ty, class, &variable.name(), value)
            .map_err(|e| e.at(&span))?;
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.state = AssignState::Target;
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.target, self.value]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BranchState {
    Condition(usize),
    Body(NodeId),
}

/// `IF ... ELSIF ... ELSE ... END_IF`
#[derive(Clone, Debug)]
pub struct If {
    /// Conditions and the statements they guard.
    pub branches: Vec<(NodeId, NodeId)>,
    pub otherwise: Option<NodeId>,
    state: BranchState,
}

impl If {
    pub fn new(branches: Vec<(NodeId, NodeId)>, otherwise: Option<NodeId>) -> Self {
        Self {
            branches,
            otherwise,
            state: BranchState::Condition(0),
        }
    }
}

impl Invocable for If {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        for (condition, statements) in self.branches.iter() {
            body.verify(*condition, ctx)?;
            require_condition(body, *condition, ctx.types())?;
            body.verify(*statements, ctx)?;
        }
        if let Some(otherwise) = self.otherwise {
            body.verify(otherwise, ctx)?;
        }
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, _: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        loop {
            match self.state {
                BranchState::Condition(branch) => {
                    let Some((condition, statements)) = self.branches.get(branch).copied() else {
                        match self.otherwise {
                            Some(otherwise) => {
                                self.state = BranchState::Body(otherwise);
                                continue;
                            }
                            None => break,
                        }
                    };
                    if body.step(condition, ctx)? == Step::InProgress {
                        return Ok(Step::InProgress);
                    }
                    self.state = if truth(body, condition)? {
                        BranchState::Body(statements)
                    } else {
                        BranchState::Condition(branch + 1)
                    };
                }
                BranchState::Body(statements) => {
                    if body.step(statements, ctx)? == Step::InProgress {
                        return Ok(Step::InProgress);
                    }
                    break;
                }
            }
        }
        self.reset();
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.state = BranchState::Condition(0);
    }

    fn children(&self) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self.branches.iter().flat_map(|(c, s)| [*c, *s]).collect();
        children.extend(self.otherwise);
        children
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseLabel {
    Value(NodeId),
    Range(NodeId, NodeId),
}

#[derive(Clone, Debug)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaseState {
    Selector,
    Body(NodeId),
}

/// `CASE selector OF labels: statements ... ELSE ... END_CASE`
#[derive(Clone, Debug)]
pub struct Case {
    pub selector: NodeId,
    pub arms: Vec<CaseArm>,
    pub otherwise: Option<NodeId>,
    state: CaseState,
}

impl Case {
    pub fn new(selector: NodeId, arms: Vec<CaseArm>, otherwise: Option<NodeId>) -> Self {
        Self {
            selector,
            arms,
            otherwise,
            state: CaseState::Selector,
        }
    }

    fn labels(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.arms.iter().flat_map(|arm| {
            arm.labels.iter().flat_map(|label| match label {
                CaseLabel::Value(v) => vec![*v],
                CaseLabel::Range(low, high) => vec![*low, *high],
            })
        })
    }

    fn matches(&self, body: &Body, label: &CaseLabel) -> Result<bool, Diagnostic> {
        let selector = body.result(self.selector)?;
        let span = body.span(self.selector);
        let matched = match label {
            CaseLabel::Value(value) => selector.equals(body.result(*value)?, 0.0),
            CaseLabel::Range(low, high) => {
                let (low, high) = (body.result(*low)?, body.result(*high)?);
                selector
                    .lesser(low)
                    .and_then(|below| Ok(!below && !selector.greater(high)?))
            }
        };
        matched.map_err(|e| e.at(&span))
    }
}

impl Invocable for Case {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.selector, ctx)?;
        if !require_class(body, self.selector, ctx.types(), TypeClass::ANY_INT | TypeClass::ENUMERATION)? {
            let node = body.node(self.selector)?;
            return Err(ValueError::IncompatibleTypes {
                expected: "an integer or enumerated selector".to_string(),
                found: node.result.kind_name().to_string(),
            }
            .at(&node.span));
        }
        let labels: Vec<NodeId> = self.labels().collect();
        for label in labels {
            body.verify(label, ctx)?;
            if !body.is_constant(label) {
                return Err(Diagnostic::problem(
                    Problem::NotConstant,
                    Label::span(body.span(label), "Case label must be a constant"),
                ));
            }
            let selector = body.node(self.selector)?;
            let node = body.node(label)?;
            if !selector.result.comparable_to(&node.result) {
                return Err(ValueError::IncompatibleOperands {
                    operation: Operation::Equals,
                    left: selector.result.kind_name(),
                    right: node.result.kind_name(),
                }
                .between(&selector.span, &node.span));
            }
        }
        for arm in self.arms.iter() {
            body.verify(arm.body, ctx)?;
        }
        if let Some(otherwise) = self.otherwise {
            body.verify(otherwise, ctx)?;
        }
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, _: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == CaseState::Selector {
            if body.step(self.selector, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            let mut chosen = self.otherwise;
            'arms: for arm in self.arms.iter() {
                for label in arm.labels.iter() {
                    if self.matches(body, label)? {
                        chosen = Some(arm.body);
                        break 'arms;
                    }
                }
            }
            match chosen {
                Some(statements) => self.state = CaseState::Body(statements),
                None => return Ok(Step::Finished),
            }
        }
        if let CaseState::Body(statements) = self.state {
            if body.step(statements, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
        }
        self.reset();
        Ok(Step::Finished)
    }

    fn reset(&mut self) {
        self.state = CaseState::Selector;
    }

    fn children(&self) -> Vec<NodeId> {
        let mut children = vec![self.selector];
        children.extend(self.labels());
        children.extend(self.arms.iter().map(|a| a.body));
        children.extend(self.otherwise);
        children
    }
}

/// How a loop reacts to a finished iteration.
fn after_iteration(ctx: &mut StepContext, id: NodeId) -> Result<Option<Step>, Diagnostic> {
    match ctx.cursor.pending() {
        Pending::None => Ok(None),
        Pending::Exit => {
            ctx.cursor.clear_pending();
            leave(ctx, id);
            Ok(Some(Step::Finished))
        }
        Pending::Return => {
            leave(ctx, id);
            Ok(Some(Step::Finished))
        }
    }
}

fn enter(ctx: &mut StepContext, id: NodeId, body: &Body) -> Result<(), Diagnostic> {
    let instance = ctx.instance(&body.span(id))?;
    ctx.cursor.push_exit_context(instance, id);
    Ok(())
}

fn leave(ctx: &mut StepContext, id: NodeId) {
    if let Some(instance) = ctx.instance {
        ctx.cursor.pop_exit_context(instance, id);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ForState {
    Prepare,
    Body,
}

/// `FOR control := start TO end BY step DO ... END_FOR`
///
/// The bounds and the step are evaluated once when the loop starts and
/// the number of iterations is computed from them. The control variable
/// is assigned the start value on entry and is not advanced afterwards.
#[derive(Clone, Debug)]
pub struct For {
    pub control: NodeId,
    pub start: NodeId,
    pub end: NodeId,
    pub step: Option<NodeId>,
    pub body: NodeId,
    operands: Vec<NodeId>,
    next: usize,
    remaining: i128,
    state: ForState,
}

impl For {
    pub fn new(control: NodeId, start: NodeId, end: NodeId, step: Option<NodeId>, body: NodeId) -> Self {
        let mut operands = vec![control, start, end];
        operands.extend(step);
        Self {
            control,
            start,
            end,
            step,
            body,
            operands,
            next: 0,
            remaining: 0,
            state: ForState::Prepare,
        }
    }

    fn integer(body: &Body, id: NodeId) -> Result<i128, Diagnostic> {
        body.result(id)?.integer().map_err(|e| e.at(&body.span(id)))
    }

    /// Evaluates the bounds, assigns the start value and counts the
    /// iterations.
    fn start(&mut self, id: NodeId, body: &Body, ctx: &mut StepContext) -> Result<i128, Diagnostic> {
        let start = Self::integer(body, self.start)?;
        let end = Self::integer(body, self.end)?;
        let increment = match self.step {
            Some(step) => Self::integer(body, step)?,
            None => 1,
        };
        if increment == 0 {
            return Err(ValueError::InvalidArgument("FOR step must not be 0".to_string())
                .at(&self.step.map(|s| body.span(s)).unwrap_or_else(|| body.span(id))));
        }

        let control = body.node(self.control)?;
        let variable = body
            .variable(self.control)
            .ok_or_else(|| Diagnostic::internal(&control.span, "FOR control is not a variable"))?;
        let place = variable
            .place
            .as_ref()
            .ok_or_else(|| Diagnostic::internal(&control.span, "FOR control was not located"))?;
        qualified::store(
            ctx.library,
            ctx.machine,
            place,
            control.ty,
            control.class,
            &variable.name(),
            &Value::Integer(start),
        )
        .map_err(|e| e.at(&control.span))?;

        let count = if increment > 0 && end >= start {
            (end - start) / increment + 1
        } else if increment < 0 && start >= end {
            (start - end) / -increment + 1
        } else {
            0
        };
        Ok(count)
    }
}

impl Invocable for For {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.control, ctx)?;
        let span = body.span(self.control);
        if body.variable(self.control).is_none() {
            return Err(Diagnostic::problem(
                Problem::NotAssignable,
                Label::span(span, "FOR control is not a variable"),
            ));
        }
        require_integer(body, self.control, ctx.types(), "control variable")?;
        let control = body.node(self.control)?;
        if control.class.is_constant() {
            let name = body.variable(self.control).map(|v| v.name()).unwrap_or_default();
            return Err(ValueError::ConstantTarget(name).at(&span));
        }

        let mut bounds = vec![(self.start, "start"), (self.end, "end")];
        bounds.extend(self.step.map(|s| (s, "step")));
        for (bound, what) in bounds {
            body.verify(bound, ctx)?;
            require_integer(body, bound, ctx.types(), what)?;
            let control = body.node(self.control)?;
            let node = body.node(bound)?;
            variable::assignable_from(ctx.types(), control.ty, node.ty, node.class, &node.result)
                .map_err(|e| e.at(&node.span))?;
        }

        ctx.loop_depth += 1;
        let result = body.verify(self.body, ctx);
        ctx.loop_depth -= 1;
        result?;

        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == ForState::Prepare {
            if step_children(&self.operands, &mut self.next, body, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            self.next = 0;
            self.remaining = self.start(id, body, ctx)?;
            if self.remaining <= 0 {
                self.reset();
                return Ok(Step::Finished);
            }
            enter(ctx, id, body)?;
            self.state = ForState::Body;
        }

        if body.step(self.body, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        if let Some(step) = after_iteration(ctx, id)? {
            self.reset();
            return Ok(step);
        }
        self.remaining -= 1;
        if self.remaining <= 0 {
            leave(ctx, id);
            self.reset();
            return Ok(Step::Finished);
        }
        Ok(Step::InProgress)
    }

    fn reset(&mut self) {
        self.next = 0;
        self.remaining = 0;
        self.state = ForState::Prepare;
    }

    fn children(&self) -> Vec<NodeId> {
        let mut children = self.operands.clone();
        children.push(self.body);
        children
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Condition,
    Body,
}

/// `WHILE condition DO ... END_WHILE`
#[derive(Clone, Debug)]
pub struct While {
    pub condition: NodeId,
    pub body: NodeId,
    entered: bool,
    state: LoopState,
}

impl While {
    pub fn new(condition: NodeId, body: NodeId) -> Self {
        Self {
            condition,
            body,
            entered: false,
            state: LoopState::Condition,
        }
    }
}

impl Invocable for While {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.verify(self.condition, ctx)?;
        require_condition(body, self.condition, ctx.types())?;
        ctx.loop_depth += 1;
        let result = body.verify(self.body, ctx);
        ctx.loop_depth -= 1;
        result?;
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == LoopState::Condition {
            if body.step(self.condition, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            if !truth(body, self.condition)? {
                if self.entered {
                    leave(ctx, id);
                }
                self.reset();
                return Ok(Step::Finished);
            }
            if !self.entered {
                enter(ctx, id, body)?;
                self.entered = true;
            }
            self.state = LoopState::Body;
        }

        if body.step(self.body, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        if let Some(step) = after_iteration(ctx, id)? {
            self.reset();
            return Ok(step);
        }
        self.state = LoopState::Condition;
        Ok(Step::InProgress)
    }

    fn reset(&mut self) {
        self.entered = false;
        self.state = LoopState::Condition;
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.condition, self.body]
    }
}

/// `REPEAT ... UNTIL condition END_REPEAT`
#[derive(Clone, Debug)]
pub struct Repeat {
    pub body: NodeId,
    pub condition: NodeId,
    entered: bool,
    state: LoopState,
}

impl Repeat {
    pub fn new(body: NodeId, condition: NodeId) -> Self {
        Self {
            body,
            condition,
            entered: false,
            state: LoopState::Body,
        }
    }
}

impl Invocable for Repeat {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        ctx.loop_depth += 1;
        let result = body.verify(self.body, ctx);
        ctx.loop_depth -= 1;
        result?;
        body.verify(self.condition, ctx)?;
        require_condition(body, self.condition, ctx.types())?;
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        if self.state == LoopState::Body {
            if !self.entered {
                enter(ctx, id, body)?;
                self.entered = true;
            }
            if body.step(self.body, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            if let Some(step) = after_iteration(ctx, id)? {
                self.reset();
                return Ok(step);
            }
            self.state = LoopState::Condition;
        }

        if body.step(self.condition, ctx)? == Step::InProgress {
            return Ok(Step::InProgress);
        }
        if truth(body, self.condition)? {
            leave(ctx, id);
            self.reset();
            return Ok(Step::Finished);
        }
        self.state = LoopState::Body;
        Ok(Step::InProgress)
    }

    fn reset(&mut self) {
        self.entered = false;
        self.state = LoopState::Body;
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.body, self.condition]
    }
}

/// `EXIT` leaves the innermost loop.
#[derive(Clone, Debug, Default)]
pub struct Exit;

impl Invocable for Exit {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        if ctx.loop_depth == 0 {
            return Err(Diagnostic::problem(
                Problem::ExitOutsideLoop,
                Label::span(body.span(id), "EXIT is not inside a loop"),
            ));
        }
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        let span = body.span(id);
        let instance = ctx.instance(&span)?;
        match ctx.cursor.innermost_exit() {
            Some(context) if context.instance == instance => {
                ctx.cursor.set_pending(Pending::Exit);
                Ok(Step::Finished)
            }
            _ => Err(Diagnostic::internal(&span, "EXIT without an executing loop")),
        }
    }

    fn children(&self) -> Vec<NodeId> {
        vec![]
    }
}

/// `RETURN` finishes the body of the POU.
#[derive(Clone, Debug, Default)]
pub struct Return;

impl Invocable for Return {
    fn verify(&mut self, id: NodeId, body: &mut Body, _: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
        Ok(Verified::Node)
    }

    fn step(&mut self, _: NodeId, _: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        ctx.cursor.set_pending(Pending::Return);
        Ok(Step::Finished)
    }

    fn children(&self) -> Vec<NodeId> {
        vec![]
    }
}
