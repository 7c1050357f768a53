//! The interpreter: links compilation units, starts a program and executes
//! it one cycle or one statement at a time.
//!
//! Execution advances by micro-steps. Each micro-step steps the root of the
//! body of the current instance once. A call switches the cursor to the
//! callee, so the following micro-steps advance the callee's body until its
//! root finishes and control returns to the caller.
use std::mem;

use log::{debug, info, trace};
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::cursor::Cursor;
use crate::issues::Issues;
use crate::library::{Library, PouId, PouKind};
use crate::link_calls::resolve_calls;
use crate::link_references::resolve_variables;
use crate::link_statements::prepare;
use crate::machine::Machine;
use crate::memory::DirectMemory;
use crate::node::{NodeKind, Step, StepContext};
use crate::options::Options;
use crate::query::Query;
use crate::stages;
use crate::unit::CompilationUnit;

/// What one completed cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub micro_steps: u64,
}

/// Where single-stepping stopped.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// Stopped at the start of the statement.
    Paused(SourceSpan),
    /// The program body finished. The next step starts a new cycle.
    CycleComplete,
    /// The cycle was abandoned.
    Failed(Diagnostic),
}

enum Advance {
    Progress,
    Statement(SourceSpan),
    CycleComplete,
}

fn context_problem(problem: Problem, message: &str) -> Diagnostic {
    Diagnostic::problem(problem, Label::span(SourceSpan::builtin(), message))
}

pub struct Interpreter {
    options: Options,
    library: Option<Library>,
    machine: Machine,
    cursor: Cursor,
    started: Option<PouId>,
    /// Micro-steps taken in the cycle in progress.
    steps: u64,
    issues: Issues,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Interpreter {
    pub fn new(options: Options) -> Self {
        let mut machine = Machine::default();
        machine.memory = DirectMemory::new(options.memory_size);
        Self {
            options,
            library: None,
            machine,
            cursor: Cursor::new(),
            started: None,
            steps: 0,
            issues: Issues::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Links the compilation units into the program that the interpreter
    /// runs. Replaces anything linked before.
    pub fn link(&mut self, units: Vec<CompilationUnit>) -> Result<(), Vec<Diagnostic>> {
        info!("Linking {} compilation units", units.len());
        self.library = None;
        self.started = None;
        self.cursor.clear();
        let library = match stages::link(units, &self.options) {
            Ok(library) => library,
            Err(diagnostics) => {
                self.issues.extend(diagnostics.iter().cloned());
                return Err(diagnostics);
            }
        };
        let memory = mem::take(&mut self.machine.memory);
        match Machine::new(&library, memory) {
            Ok(machine) => self.machine = machine,
            Err(e) => return Err(vec![self.record(e.at(&SourceSpan::builtin()))]),
        }
        self.library = Some(library);
        Ok(())
    }

    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }

    /// Resets every variable to its initial value and prepares to run the
    /// program from the start of its body.
    pub fn start(&mut self, name: &Id) -> Result<(), Diagnostic> {
        let Some(library) = self.library.as_ref() else {
            return Err(self.record(context_problem(Problem::NotLinked, "Link before starting")));
        };
        let program = library
            .find_pou(name)
            .filter(|id| library.pou(*id).map(|p| p.kind == PouKind::Program).unwrap_or(false));
        let Some(program) = program else {
            let diagnostic = Diagnostic::problem(
                Problem::UnresolvedProgram,
                Label::span(name.span.clone(), format!("{} is not a program", name)),
            );
            return Err(self.record(diagnostic));
        };

        let memory = mem::take(&mut self.machine.memory);
        let machine = Machine::new(library, memory).map_err(|e| e.at(&SourceSpan::builtin()));
        let machine = match machine {
            Ok(machine) => machine,
            Err(diagnostic) => return Err(self.record(diagnostic)),
        };
        let instance = machine
            .program(program)
            .map_err(|e| e.at(&SourceSpan::builtin()));
        let instance = match instance {
            Ok(instance) => instance,
            Err(diagnostic) => return Err(self.record(diagnostic)),
        };
        self.machine = machine;
        self.cursor.prime(instance);
        self.started = Some(program);
        self.steps = 0;
        info!("Started program {}", name);
        Ok(())
    }

    fn record(&mut self, diagnostic: Diagnostic) -> Diagnostic {
        self.issues.push(diagnostic.clone());
        diagnostic
    }

    fn ready(&mut self) -> Result<(), Diagnostic> {
        if self.library.is_none() {
            return Err(self.record(context_problem(Problem::NotLinked, "Nothing is linked")));
        }
        if self.started.is_none() {
            return Err(self.record(context_problem(Problem::NotStarted, "Start a program first")));
        }
        Ok(())
    }

    /// Abandons the cycle in progress. The next cycle starts from the
    /// beginning of the program body with the variables as they are.
    fn fail(&mut self, diagnostic: Diagnostic) -> Diagnostic {
        debug!("Cycle failed after {} micro-steps: {}", self.steps, diagnostic);
        self.machine.reset_bodies();
        self.steps = 0;
        if let Some(instance) = self.started.and_then(|p| self.machine.program(p).ok()) {
            self.cursor.prime(instance);
        }
        self.record(diagnostic)
    }

    fn advance(&mut self) -> Result<Advance, Diagnostic> {
        let (Some(library), Some(program)) = (self.library.as_ref(), self.started) else {
            return Err(context_problem(Problem::NotStarted, "Start a program first"));
        };
        self.steps += 1;
        if self.steps > self.options.max_micro_steps_per_cycle {
            return Err(context_problem(
                Problem::StepLimitExceeded,
                &format!(
                    "Cycle did not finish within {} micro-steps",
                    self.options.max_micro_steps_per_cycle
                ),
            ));
        }

        let current = self
            .cursor
            .current()
            .ok_or_else(|| Diagnostic::internal(&SourceSpan::builtin(), "Cursor has no current instance"))?;
        let mut body = self
            .machine
            .take_body(current)
            .map_err(|e| e.at(&SourceSpan::builtin()))?;
        let result = match body.root() {
            None => Ok(Step::Finished),
            Some(root) => {
                let mut ctx = StepContext {
                    library,
                    machine: &mut self.machine,
                    cursor: &mut self.cursor,
                    options: &self.options,
                    instance: Some(current),
                };
                body.step(root, &mut ctx)
            }
        };
        self.machine.put_body(current, body);

        match result? {
            Step::InProgress => match self.cursor.take_pause() {
                Some(span) => Ok(Advance::Statement(span)),
                None => Ok(Advance::Progress),
            },
            Step::Finished => {
                self.cursor.clear_pending();
                if let Some(caller) = self.cursor.return_to_caller() {
                    trace!("Returned to instance {}", caller.0);
                    return Ok(Advance::Progress);
                }
                let instance = self
                    .machine
                    .program(program)
                    .map_err(|e| e.at(&SourceSpan::builtin()))?;
                self.cursor.prime(instance);
                Ok(Advance::CycleComplete)
            }
        }
    }

    /// Runs the program until its body finishes. A cycle that was paused
    /// by single-stepping continues from where it stopped.
    pub fn run_cycle(&mut self) -> Result<CycleReport, Diagnostic> {
        self.ready()?;
        debug!("Cycle start");
        loop {
            match self.advance() {
                Ok(Advance::CycleComplete) => {
                    let report = CycleReport {
                        micro_steps: self.steps,
                    };
                    self.steps = 0;
                    debug!("Cycle complete after {} micro-steps", report.micro_steps);
                    return Ok(report);
                }
                Ok(Advance::Progress | Advance::Statement(_)) => {}
                Err(diagnostic) => return Err(self.fail(diagnostic)),
            }
        }
    }

    /// Advances until a statement starts at a call depth accepted by
    /// `stop`, given the depth now and when stepping began.
    fn step_until(&mut self, stop: fn(usize, usize) -> bool) -> StepOutcome {
        if let Err(diagnostic) = self.ready() {
            return StepOutcome::Failed(diagnostic);
        }
        let start = self.cursor.depth();
        loop {
            match self.advance() {
                Ok(Advance::Statement(span)) if stop(self.cursor.depth(), start) => {
                    return StepOutcome::Paused(span)
                }
                Ok(Advance::CycleComplete) => {
                    self.steps = 0;
                    return StepOutcome::CycleComplete;
                }
                Ok(_) => {}
                Err(diagnostic) => return StepOutcome::Failed(self.fail(diagnostic)),
            }
        }
    }

    /// Runs to the next statement, stepping over calls.
    pub fn step(&mut self) -> StepOutcome {
        self.step_until(|depth, start| depth <= start)
    }

    /// Runs to the next statement, including statements of called POUs.
    pub fn step_in(&mut self) -> StepOutcome {
        self.step_until(|_, _| true)
    }

    /// Runs until the current POU returns to its caller and the caller
    /// reaches its next statement.
    pub fn step_out(&mut self) -> StepOutcome {
        self.step_until(|depth, start| depth < start)
    }

    /// Evaluates the query against the current variables and formats the
    /// result. An assignment query shows the assigned variable afterwards.
    ///
    /// A query may call standard functions but no user functions or
    /// function blocks.
    pub fn query(&mut self, query: Query) -> Result<String, Vec<Diagnostic>> {
        let result = self.evaluate(query);
        if let Err(diagnostics) = &result {
            self.issues.extend(diagnostics.iter().cloned());
        }
        result
    }

    fn evaluate(&mut self, query: Query) -> Result<String, Vec<Diagnostic>> {
        let Some(library) = self.library.as_ref() else {
            return Err(vec![context_problem(Problem::NotLinked, "Nothing is linked")]);
        };
        let Query { mut body, mut pools } = query;
        resolve_variables(library, None, &mut body, &mut pools.variables)?;
        resolve_calls(library, None, &mut body, &mut pools.calls)?;
        for (_, node) in body.iter() {
            if let NodeKind::Call(call) = &node.kind {
                if !call.is_builtin() {
                    return Err(vec![Diagnostic::problem(
                        Problem::NotConstant,
                        Label::span(
                            node.span.clone(),
                            format!("Query cannot call {}", call.name),
                        ),
                    )]);
                }
            }
        }
        prepare(library, None, &mut body, &self.options)?;
        let Some(root) = body.root() else {
            return Err(vec![context_problem(Problem::NoContent, "Query is empty")]);
        };

        let mut cursor = Cursor::new();
        let mut finished = false;
        for _ in 0..self.options.max_micro_steps_per_cycle {
            let mut ctx = StepContext {
                library,
                machine: &mut self.machine,
                cursor: &mut cursor,
                options: &self.options,
                instance: None,
            };
            if body.step(root, &mut ctx).map_err(|d| vec![d])? == Step::Finished {
                finished = true;
                break;
            }
        }
        if !finished {
            return Err(vec![context_problem(
                Problem::StepLimitExceeded,
                "Query did not finish",
            )]);
        }

        let node = body.node(root).map_err(|d| vec![d])?;
        let value = match &node.kind {
            NodeKind::Assign(assign) => {
                let place = body
                    .variable(assign.target)
                    .and_then(|v| v.place.clone())
                    .ok_or_else(|| vec![Diagnostic::internal(&node.span, "Assignment has no target")])?;
                self.machine
                    .value(&place)
                    .map_err(|e| vec![e.at(&node.span)])?
                    .clone()
            }
            _ => node.result.clone(),
        };
        self.machine
            .display(library, &value)
            .map_err(|e| vec![e.at(&node.span)])
    }

    pub fn memory(&self) -> &DirectMemory {
        &self.machine.memory
    }

    pub fn memory_mut(&mut self) -> &mut DirectMemory {
        &mut self.machine.memory
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    pub fn is_fatal(&self) -> bool {
        self.issues.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BodyBuilder, PouBuilder, TypeSpec, UnitBuilder, VarSpec};
    use crate::call::Argument;
    use crate::expr::BinaryOp;
    use crate::memory::Area;
    use crate::qualified::Segment;
    use crate::value::Value;
    use crate::variable::Section;
    use stplc_dsl::core::FileId;

    fn at(start: usize) -> SourceSpan {
        SourceSpan::range(start, start + 1)
    }

    fn var(body: &mut BodyBuilder, path: &[&str]) -> crate::node::NodeId {
        let segments = path
            .iter()
            .map(|name| Segment::new(Id::from(name), SourceSpan::default()))
            .collect();
        body.variable(segments, SourceSpan::default())
    }

    fn local(name: &str, ty: &str) -> VarSpec {
        VarSpec::new(Id::from(name), Section::Local, TypeSpec::named(ty), SourceSpan::default())
    }

    fn query(interpreter: &mut Interpreter, path: &[&str]) -> String {
        let mut body = BodyBuilder::new();
        let root = var(&mut body, path);
        body.set_root(root);
        interpreter.query(body.query()).unwrap()
    }

    fn interpreter(unit: UnitBuilder, options: Options) -> Interpreter {
        let mut interpreter = Interpreter::new(options);
        interpreter.link(vec![unit.build()]).unwrap();
        interpreter.start(&Id::from("P")).unwrap();
        interpreter
    }

    /// `PROGRAM P VAR x : DINT := 0; END_VAR FOR x := 1 TO 3 DO x := x * 2; END_FOR END_PROGRAM`
    fn doubling_program() -> UnitBuilder {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        pou.var(local("x", "DINT").with_initializer(Some(Value::Integer(0))));
        let b = pou.body();
        let control = var(b, &["x"]);
        let first = b.literal(Value::Integer(1), SourceSpan::default());
        let last = b.literal(Value::Integer(3), SourceSpan::default());
        let target = var(b, &["x"]);
        let operand = var(b, &["x"]);
        let two = b.literal(Value::Integer(2), SourceSpan::default());
        let product = b.binary(BinaryOp::Mul, operand, two, SourceSpan::default());
        let assign = b.assign(target, product, at(30));
        let inner = b.list(vec![assign], at(30));
        let for_loop = b.for_loop(control, first, last, None, inner, at(10));
        let root = b.list(vec![for_loop], at(10));
        b.set_root(root);
        unit.add_pou(pou);
        unit
    }

    #[test]
    fn run_cycle_when_for_loop_doubles_then_query_shows_eight() {
        let mut interpreter = interpreter(doubling_program(), Options::default());
        let report = interpreter.run_cycle().unwrap();
        assert!(report.micro_steps > 3);
        assert_eq!(query(&mut interpreter, &["P", "x"]), "8");
    }

    #[test]
    fn start_when_restarted_then_variables_reset() {
        let mut interpreter = interpreter(doubling_program(), Options::default());
        interpreter.run_cycle().unwrap();
        interpreter.start(&Id::from("p")).unwrap();
        assert_eq!(query(&mut interpreter, &["P", "x"]), "0");
    }

    #[test]
    fn run_cycle_when_not_started_then_not_started() {
        let mut interpreter = Interpreter::default();
        interpreter.link(vec![doubling_program().build()]).unwrap();
        let diagnostic = interpreter.run_cycle().unwrap_err();
        assert_eq!(diagnostic.code(), Problem::NotStarted.code());
        assert_eq!(interpreter.issues().len(), 1);
    }

    #[test]
    fn run_cycle_when_not_linked_then_not_linked() {
        let mut interpreter = Interpreter::default();
        let diagnostic = interpreter.run_cycle().unwrap_err();
        assert_eq!(diagnostic.code(), Problem::NotLinked.code());
    }

    #[test]
    fn start_when_unknown_program_then_unresolved_program() {
        let mut interpreter = Interpreter::default();
        interpreter.link(vec![doubling_program().build()]).unwrap();
        let diagnostic = interpreter.start(&Id::from("Missing")).unwrap_err();
        assert_eq!(diagnostic.code(), Problem::UnresolvedProgram.code());
    }

    #[test]
    fn step_when_two_statements_then_pauses_at_each() {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        pou.var(local("a", "INT"));
        let b = pou.body();
        let target = var(b, &["a"]);
        let one = b.literal(Value::Integer(1), SourceSpan::default());
        let first = b.assign(target, one, at(10));
        let target = var(b, &["a"]);
        let two = b.literal(Value::Integer(2), SourceSpan::default());
        let second = b.assign(target, two, at(20));
        let root = b.list(vec![first, second], at(10));
        b.set_root(root);
        unit.add_pou(pou);
        let mut interpreter = interpreter(unit, Options::default());

        assert!(matches!(interpreter.step(), StepOutcome::Paused(span) if span.start == 10));
        assert_eq!(query(&mut interpreter, &["P", "a"]), "0");
        assert!(matches!(interpreter.step(), StepOutcome::Paused(span) if span.start == 20));
        assert_eq!(query(&mut interpreter, &["P", "a"]), "1");
        assert!(matches!(interpreter.step(), StepOutcome::CycleComplete));
        assert_eq!(query(&mut interpreter, &["P", "a"]), "2");
    }

    #[test]
    fn run_cycle_when_endless_loop_then_step_limit_exceeded() {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        let b = pou.body();
        let condition = b.literal(Value::Bool(true), SourceSpan::default());
        let inner = b.list(vec![], SourceSpan::default());
        let forever = b.while_loop(condition, inner, SourceSpan::default());
        let root = b.list(vec![forever], SourceSpan::default());
        b.set_root(root);
        unit.add_pou(pou);
        let mut interpreter = interpreter(unit, Options::default().with_max_micro_steps_per_cycle(100));

        let diagnostic = interpreter.run_cycle().unwrap_err();
        assert_eq!(diagnostic.code(), Problem::StepLimitExceeded.code());
        assert!(!interpreter.is_fatal());
    }

    /// `y := 10 / x` with `x` initially zero.
    fn division_program() -> UnitBuilder {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        pou.var(local("x", "INT"));
        pou.var(local("y", "INT"));
        let b = pou.body();
        let target = var(b, &["y"]);
        let ten = b.literal(Value::Integer(10), SourceSpan::default());
        let divisor = var(b, &["x"]);
        let quotient = b.binary(BinaryOp::Div, ten, divisor, SourceSpan::default());
        let assign = b.assign(target, quotient, SourceSpan::default());
        let root = b.list(vec![assign], SourceSpan::default());
        b.set_root(root);
        unit.add_pou(pou);
        unit
    }

    #[test]
    fn run_cycle_when_division_by_zero_then_cycle_fails_and_next_cycle_runs() {
        let mut interpreter = interpreter(division_program(), Options::default());
        let diagnostic = interpreter.run_cycle().unwrap_err();
        assert_eq!(diagnostic.code(), Problem::DivisionByZero.code());
        assert_eq!(interpreter.issues().len(), 1);

        let mut assign = BodyBuilder::new();
        let target = var(&mut assign, &["P", "x"]);
        let two = assign.literal(Value::Integer(2), SourceSpan::default());
        let root = assign.assign(target, two, SourceSpan::default());
        assign.set_root(root);
        assert_eq!(interpreter.query(assign.query()).unwrap(), "2");

        interpreter.run_cycle().unwrap();
        assert_eq!(query(&mut interpreter, &["P", "y"]), "5");
    }

    /// `FUNCTION_BLOCK Counter VAR_INPUT inc : INT; END_VAR VAR_OUTPUT total : INT; END_VAR
    /// total := total + inc;` called twice from `P`.
    fn counter_program() -> UnitBuilder {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        let mut counter = PouBuilder::new(Id::from("Counter"), PouKind::FunctionBlock, SourceSpan::default());
        counter.var(VarSpec::new(Id::from("inc"), Section::Input, TypeSpec::named("INT"), SourceSpan::default()));
        counter.var(VarSpec::new(Id::from("total"), Section::Output, TypeSpec::named("INT"), SourceSpan::default()));
        let b = counter.body();
        let target = var(b, &["total"]);
        let left = var(b, &["total"]);
        let right = var(b, &["inc"]);
        let sum = b.binary(BinaryOp::Add, left, right, SourceSpan::default());
        let assign = b.assign(target, sum, at(50));
        let root = b.list(vec![assign], at(50));
        b.set_root(root);
        unit.add_pou(counter);

        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        pou.var(local("c", "Counter"));
        let b = pou.body();
        let mut calls = vec![];
        for (amount, start) in [(2, 10), (3, 20)] {
            let value = b.literal(Value::Integer(amount), SourceSpan::default());
            let argument = Argument {
                name: Some(Id::from("inc")),
                value,
                output: false,
            };
            calls.push(b.call(Id::from("c"), vec![argument], at(start)));
        }
        let root = b.list(calls, at(10));
        b.set_root(root);
        unit.add_pou(pou);
        unit
    }

    #[test]
    fn run_cycle_when_function_block_called_twice_then_instance_keeps_state() {
        let mut interpreter = interpreter(counter_program(), Options::default());
        interpreter.run_cycle().unwrap();
        assert_eq!(query(&mut interpreter, &["P", "c", "total"]), "5");
        interpreter.run_cycle().unwrap();
        assert_eq!(query(&mut interpreter, &["P", "c", "total"]), "10");
    }

    #[test]
    fn step_in_when_call_then_pauses_inside_function_block() {
        let mut interpreter = interpreter(counter_program(), Options::default());
        assert!(matches!(interpreter.step_in(), StepOutcome::Paused(span) if span.start == 10));
        assert!(matches!(interpreter.step_in(), StepOutcome::Paused(span) if span.start == 50));
        assert!(matches!(interpreter.step_out(), StepOutcome::Paused(span) if span.start == 20));
        assert!(matches!(interpreter.step(), StepOutcome::CycleComplete));
        assert_eq!(query(&mut interpreter, &["P", "c", "total"]), "5");
    }

    #[test]
    fn query_when_function_block_instance_then_shows_interface() {
        let mut interpreter = interpreter(counter_program(), Options::default());
        interpreter.run_cycle().unwrap();
        assert_eq!(query(&mut interpreter, &["P", "c"]), "(inc:3,total:5)");
    }

    #[test]
    fn query_when_user_function_call_then_not_constant() {
        let mut unit = doubling_program();
        let mut twice = PouBuilder::new(Id::from("Twice"), PouKind::Function, SourceSpan::default());
        twice.returns(TypeSpec::named("INT"));
        unit.add_pou(twice);
        let mut interpreter = interpreter(unit, Options::default());

        let mut body = BodyBuilder::new();
        let root = body.call(Id::from("Twice"), vec![], SourceSpan::default());
        body.set_root(root);
        let diagnostics = interpreter.query(body.query()).unwrap_err();
        assert_eq!(diagnostics[0].code(), Problem::NotConstant.code());
        assert_eq!(interpreter.issues().len(), 1);
    }

    #[test]
    fn query_when_name_not_declared_then_recorded_in_issues() {
        let mut interpreter = interpreter(doubling_program(), Options::default());
        let mut body = BodyBuilder::new();
        let root = var(&mut body, &["nosuch"]);
        body.set_root(root);

        let diagnostics = interpreter.query(body.query()).unwrap_err();
        assert_eq!(interpreter.issues().len(), diagnostics.len());
        assert!(!interpreter.issues().is_empty());
        assert!(!interpreter.is_fatal());
    }

    #[test]
    fn query_when_not_linked_then_recorded_in_issues() {
        let mut interpreter = Interpreter::default();
        let diagnostics = interpreter.query(BodyBuilder::new().query()).unwrap_err();
        assert_eq!(diagnostics[0].code(), Problem::NotLinked.code());
        assert_eq!(interpreter.issues().len(), 1);
    }

    #[test]
    fn memory_when_direct_output_assigned_then_visible_to_host() {
        let mut unit = UnitBuilder::new(FileId::from_string("p.st"));
        unit.declare_global(
            VarSpec::new(Id::from("lamp"), Section::Global, TypeSpec::named("BOOL"), SourceSpan::default())
                .with_address(Some("%QX0.1".parse().unwrap())),
        );
        let mut pou = PouBuilder::new(Id::from("P"), PouKind::Program, SourceSpan::default());
        let b = pou.body();
        let target = var(b, &["lamp"]);
        let on = b.literal(Value::Bool(true), SourceSpan::default());
        let assign = b.assign(target, on, SourceSpan::default());
        let root = b.list(vec![assign], SourceSpan::default());
        b.set_root(root);
        unit.add_pou(pou);
        let mut interpreter = interpreter(unit, Options::default());

        interpreter.run_cycle().unwrap();
        assert_eq!(interpreter.memory().area(Area::Output)[0], 0b10);
    }
}
