//! Invocation of functions, function block instances and standard
//! functions.
//!
//! Arguments are copied into the callee's input variables before the
//! callee runs and outputs (including `VAR_IN_OUT`) are copied back to
//! the caller's variables after the callee finishes.
use log::trace;
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::class::ValueClass;
use crate::library::{Callee, Pou, VarRef};
use crate::machine::{InstanceId, Place};
use crate::node::{step_children, Body, Invocable, NodeId, Step, StepContext, Verified, VerifyContext};
use crate::qualified;
use crate::value::{FbRef, Value};
use crate::variable::{self, Section};

/// An argument as written in the call: positional `e`, named `p := e`
/// or output `p => v`.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Option<Id>,
    pub value: NodeId,
    pub output: bool,
}

/// An argument matched to a parameter of the callee.
#[derive(Clone, Debug)]
struct Binding {
    param: usize,
    arg: NodeId,
    /// Copy the argument into the parameter before the call.
    input: bool,
    /// Copy the parameter into the argument after the call.
    output: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum CallState {
    #[default]
    Args,
    Invoke,
    Await(InstanceId),
}

#[derive(Clone, Debug)]
pub struct Call {
    pub name: Id,
    pub args: Vec<Argument>,
    /// Set when references are resolved.
    pub callee: Option<Callee>,
    bindings: Vec<Binding>,
    arg_nodes: Vec<NodeId>,
    next: usize,
    state: CallState,
}

impl Call {
    pub fn new(name: Id, args: Vec<Argument>) -> Self {
        let arg_nodes = args.iter().map(|a| a.value).collect();
        Self {
            name,
            args,
            callee: None,
            bindings: vec![],
            arg_nodes,
            next: 0,
            state: CallState::Args,
        }
    }

    /// Returns true if the call is to a standard function.
    pub fn is_builtin(&self) -> bool {
        matches!(self.callee, Some(Callee::Builtin(_)))
    }

    fn bind(&self, pou: &Pou, body: &Body, ctx: &VerifyContext, span: &SourceSpan) -> Result<Vec<Binding>, Diagnostic> {
        let types = ctx.types();
        let inputs: Vec<usize> = pou.inputs().collect();
        let mut positional = 0;
        let mut bindings = vec![];
        for arg in self.args.iter() {
            let arg_span = body.span(arg.value);
            let param = match &arg.name {
                None => {
                    let param = inputs.get(positional).copied().ok_or_else(|| {
                        Diagnostic::problem(
                            Problem::ArgumentCount,
                            Label::span(
                                span.clone(),
                                format!("{} takes {} inputs", pou.name, inputs.len()),
                            ),
                        )
                    })?;
                    positional += 1;
                    param
                }
                Some(name) => {
                    let param = pou
                        .find_var(name)
                        .filter(|p| {
                            let section = pou.vars[*p].section;
                            if arg.output {
                                section.is_output()
                            } else {
                                section.is_input()
                            }
                        })
                        .ok_or_else(|| {
                            Diagnostic::problem(
                                Problem::UnknownArgument,
                                Label::span(
                                    arg_span.clone(),
                                    format!("{} has no parameter {}", pou.name, name),
                                ),
                            )
                        })?;
                    param
                }
            };

            let decl = &pou.vars[param];
            let node = body.node(arg.value)?;
            let writes_back = arg.output || decl.section == Section::InOut;
            if writes_back {
                if body.variable(arg.value).is_none() {
                    return Err(Diagnostic::problem(
                        Problem::NotAssignable,
                        Label::span(arg_span, format!("Argument for {} must be a variable", decl.name)),
                    ));
                }
                if node.class.is_constant() {
                    return Err(crate::error::ValueError::ConstantTarget(
                        body.variable(arg.value).map(|v| v.name()).unwrap_or_default(),
                    )
                    .at(&arg_span));
                }
                variable::assignable_from(types, node.ty, decl.ty.id, ValueClass::empty(), &decl.default)
                    .map_err(|e| e.at(&arg_span))?;
            }
            if !arg.output {
                variable::assignable_from(types, decl.ty.id, node.ty, node.class, &node.result)
                    .map_err(|e| e.at(&arg_span))?;
            }
            bindings.push(Binding {
                param,
                arg: arg.value,
                input: !arg.output,
                output: writes_back,
            });
        }
        Ok(bindings)
    }

    fn instance_of(&self, ctx: &StepContext, var: VarRef, span: &SourceSpan) -> Result<InstanceId, Diagnostic> {
        let place = qualified::locate_var(ctx.library, ctx.machine, ctx.instance, var).map_err(|e| e.at(span))?;
        match ctx.machine.value(&place).map_err(|e| e.at(span))? {
            Value::FunctionBlock(FbRef {
                instance: Some(instance),
                ..
            }) => Ok(*instance),
            _ => Err(Diagnostic::internal(span, format!("{} is not bound to an instance", self.name))),
        }
    }

    /// Copies the inputs into the callee and transfers control to it.
    fn invoke(
        &mut self,
        instance: InstanceId,
        function: bool,
        body: &Body,
        ctx: &mut StepContext,
        span: &SourceSpan,
    ) -> Result<Step, Diagnostic> {
        if ctx.cursor.is_active(instance) {
            return Err(Diagnostic::problem(
                Problem::NotInvocable,
                Label::span(span.clone(), format!("{} is already executing", self.name)),
            ));
        }
        if function {
            ctx.machine.reset_frame(ctx.library, instance).map_err(|e| e.at(span))?;
        }
        let pou = ctx.machine.instance(instance).map_err(|e| e.at(span))?.pou;
        let declaration = ctx
            .library
            .pou(pou)
            .ok_or_else(|| Diagnostic::internal(span, format!("No POU for {}", self.name)))?;
        for binding in self.bindings.iter().filter(|b| b.input) {
            let decl = &declaration.vars[binding.param];
            let value = body.result(binding.arg)?;
            qualified::store(
                ctx.library,
                ctx.machine,
                &Place::instance(instance, binding.param),
                decl.ty.id,
                decl.class.difference(ValueClass::CONSTANT),
                decl.name.original(),
                value,
            )
            .map_err(|e| e.at(&body.span(binding.arg)))?;
        }
        trace!("Invoke {} as instance {}", self.name, instance.0);
        ctx.cursor.switch_current(instance);
        self.state = CallState::Await(instance);
        Ok(Step::InProgress)
    }

    /// Copies the outputs back to the caller once the callee finished.
    fn complete(&mut self, id: NodeId, instance: InstanceId, body: &mut Body, ctx: &mut StepContext) -> Result<(), Diagnostic> {
        let span = body.span(id);
        let pou = ctx.machine.instance(instance).map_err(|e| e.at(&span))?.pou;
        let declaration = ctx
            .library
            .pou(pou)
            .ok_or_else(|| Diagnostic::internal(&span, format!("No POU for {}", self.name)))?;
        for binding in self.bindings.iter().filter(|b| b.output) {
            let value = ctx
                .machine
                .value(&Place::instance(instance, binding.param))
                .map_err(|e| e.at(&span))?
                .clone();
            let node = body.node(binding.arg)?;
            let (ty, class, arg_span) = (node.ty, node.class, node.span.clone());
            let variable = body
                .variable(binding.arg)
                .ok_or_else(|| Diagnostic::internal(&arg_span, "Output argument is not a variable"))?;
            let place = variable
                .place
                .clone()
                .ok_or_else(|| Diagnostic::internal(&arg_span, "Output argument was not located"))?;
            qualified::store(ctx.library, ctx.machine, &place, ty, class, &variable.name(), &value)
                .map_err(|e| e.at(&arg_span))?;
        }
        let result = match declaration.return_var() {
            Some(var) => ctx
                .machine
                .value(&Place::instance(instance, var))
                .map_err(|e| e.at(&span))?
                .clone(),
            None => Value::Void,
        };
        body.set_result(id, result)?;
        Ok(())
    }
}

impl Invocable for Call {
    fn verify(&mut self, id: NodeId, body: &mut Body, ctx: &mut VerifyContext) -> Result<Verified, Diagnostic> {
        let span = body.span(id);
        for arg in self.arg_nodes.iter() {
            body.verify(*arg, ctx)?;
        }
        let callee = self
            .callee
            .ok_or_else(|| Diagnostic::internal(&span, format!("Call to {} is not resolved", self.name)))?;
        let library = ctx.library;

        match callee {
            Callee::Builtin(builtin) => {
                if let Some(arg) = self.args.iter().find(|a| a.name.is_some() || a.output) {
                    return Err(Diagnostic::problem(
                        Problem::UnknownArgument,
                        Label::span(
                            body.span(arg.value),
                            format!("{} takes only positional arguments", builtin.name()),
                        ),
                    ));
                }
                if !builtin.accepts(self.args.len()) {
                    return Err(Diagnostic::problem(
                        Problem::ArgumentCount,
                        Label::span(
                            span,
                            format!("{} does not take {} arguments", builtin.name(), self.args.len()),
                        ),
                    ));
                }
                let mut types = vec![];
                let mut probes = vec![];
                for arg in self.arg_nodes.iter() {
                    let node = body.node(*arg)?;
                    types.push(node.ty);
                    probes.push(node.result.clone());
                }
                if self.arg_nodes.iter().all(|a| body.is_literal(*a)) {
                    let value = builtin.evaluate(&probes).map_err(|e| e.at(&span))?;
                    return Ok(Verified::Constant(value));
                }
                let ty = builtin.result_type(ctx.types(), &types);
                let probe = match ty {
                    Some(ty) => ctx.types().create_value_of(ty, None).map_err(|e| e.at(&span))?,
                    None => probes.first().map(|p| p.create_temp_from()).unwrap_or(Value::Void),
                };
                body.set_probe(id, ty, ValueClass::TEMPORARY, probe)?;
            }
            Callee::Function(pou) => {
                let declaration = library
                    .pou(pou)
                    .ok_or_else(|| Diagnostic::internal(&span, format!("No POU for {}", self.name)))?;
                self.bindings = self.bind(declaration, body, ctx, &span)?;
                let (ty, probe) = match declaration.return_var().map(|v| &declaration.vars[v]) {
                    Some(decl) => (decl.ty.id, decl.default.clone()),
                    None => (None, Value::Void),
                };
                body.set_probe(id, ty, ValueClass::TEMPORARY, probe)?;
            }
            Callee::Instance(var) => {
                let decl = match var {
                    VarRef::Local(v) => ctx.pou.and_then(|p| p.vars.get(v)),
                    VarRef::Global(g) => library.globals.get(g),
                    VarRef::Program(_) => None,
                };
                let fb = match decl.and_then(|d| d.ty.id) {
                    Some(ty) => library.types.function_block_of(ty).map_err(|e| e.at(&span))?,
                    None => None,
                };
                let declaration = fb.and_then(|pou| library.pou(pou)).ok_or_else(|| {
                    Diagnostic::problem(
                        Problem::NotAFunctionBlock,
                        Label::span(span.clone(), format!("{} is not a function block instance", self.name)),
                    )
                })?;
                self.bindings = self.bind(declaration, body, ctx, &span)?;
                body.set_probe(id, None, ValueClass::TEMPORARY, Value::Void)?;
            }
        }
        Ok(Verified::Node)
    }

    fn step(&mut self, id: NodeId, body: &mut Body, ctx: &mut StepContext) -> Result<Step, Diagnostic> {
        let span = body.span(id);
        if self.state == CallState::Args {
            if step_children(&self.arg_nodes, &mut self.next, body, ctx)? == Step::InProgress {
                return Ok(Step::InProgress);
            }
            self.next = 0;
            self.state = CallState::Invoke;
        }

        match self.state {
            CallState::Invoke => {
                let callee = self
                    .callee
                    .ok_or_else(|| Diagnostic::internal(&span, format!("Call to {} is not resolved", self.name)))?;
                match callee {
                    Callee::Builtin(builtin) => {
                        let args = self
                            .arg_nodes
                            .iter()
                            .map(|a| body.result(*a).cloned())
                            .collect::<Result<Vec<_>, _>>()?;
                        let value = builtin.evaluate(&args).map_err(|e| e.at(&span))?;
                        body.set_result(id, value)?;
                        self.reset();
                        Ok(Step::Finished)
                    }
                    Callee::Function(pou) => {
                        let instance = ctx.machine.function(pou).map_err(|e| e.at(&span))?;
                        self.invoke(instance, true, body, ctx, &span)
                    }
                    Callee::Instance(var) => {
                        let instance = self.instance_of(ctx, var, &span)?;
                        self.invoke(instance, false, body, ctx, &span)
                    }
                }
            }
            CallState::Await(instance) => {
                self.complete(id, instance, body, ctx)?;
                self.reset();
                Ok(Step::Finished)
            }
            CallState::Args => Err(Diagnostic::internal(&span, "Call arguments are not evaluated")),
        }
    }

    fn reset(&mut self) {
        self.next = 0;
        self.state = CallState::Args;
    }

    fn children(&self) -> Vec<NodeId> {
        self.arg_nodes.clone()
    }
}
