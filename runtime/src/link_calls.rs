//! Resolves the names of calls to functions, function block instances and
//! standard functions.
//!
//! A variable of the calling POU hides a global variable with the same
//! name, which hides a function; a function hides a standard function.
//! Whether the variable actually holds a function block instance is
//! checked when the call is verified.
use std::collections::HashMap;
use std::mem;

use log::trace;
use stplc_dsl::{
    core::Id,
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::builtin;
use crate::library::{CallPool, Callee, Library, PouId, PouKind, VarRef};
use crate::node::{Body, NodeId, NodeKind};
use crate::resolver::Reference;
use crate::stages::{finish, Linker};
use crate::variable::Section;

pub fn bind_call(
    body: &mut Body,
    reference: &Reference<NodeId>,
    found: Option<&Callee>,
) -> Result<(), Diagnostic> {
    let Some(callee) = found else {
        return Err(Diagnostic::problem(
            Problem::UnresolvedFunction,
            Label::span(
                reference.span.clone(),
                format!("{} is not a function or function block instance", reference.text()),
            ),
        ));
    };
    let node = body.node_mut(reference.referrer)?;
    let NodeKind::Call(call) = &mut node.kind else {
        return Err(Diagnostic::internal(&reference.span, "Call reference is not a call node"));
    };
    call.callee = Some(*callee);
    Ok(())
}

/// The names that a body may call. Later entries hide earlier ones.
pub fn symbols(library: &Library, pou: Option<PouId>) -> HashMap<Id, Callee> {
    let mut table = HashMap::new();
    for (name, function) in builtin::all() {
        table.insert(Id::from(name), Callee::Builtin(function));
    }
    for id in library.pou_ids() {
        if let Some(declaration) = library.pou(id) {
            if declaration.kind == PouKind::Function {
                table.insert(declaration.name.clone(), Callee::Function(id));
            }
        }
    }
    for (position, global) in library.globals.iter().enumerate() {
        table.insert(global.name.clone(), Callee::Instance(VarRef::Global(position)));
    }
    if let Some(declaration) = pou.and_then(|id| library.pou(id)) {
        for (position, var) in declaration.vars.iter().enumerate() {
            if var.section == Section::Return {
                continue;
            }
            table.insert(var.name.clone(), Callee::Instance(VarRef::Local(position)));
        }
    }
    table
}

/// Resolves the calls of a body that belongs to the POU, or of a query
/// when there is no POU.
pub fn resolve_calls(
    library: &Library,
    pou: Option<PouId>,
    body: &mut Body,
    pool: &mut CallPool,
) -> Result<(), Vec<Diagnostic>> {
    pool.reset_resolved();
    pool.resolve(&symbols(library, pou));
    pool.trigger_resolve_callbacks(body)
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let library = &mut linker.library;
    let mut diagnostics = vec![];
    for id in library.pou_ids().collect::<Vec<_>>() {
        let Some(pou) = library.pou_mut(id) else {
            continue;
        };
        trace!("Resolving calls of {}", pou.name);
        let mut body = mem::take(&mut pou.body);
        let mut pool = mem::take(&mut pou.pools.body.calls);
        if let Err(errors) = resolve_calls(library, Some(id), &mut body, &mut pool) {
            diagnostics.extend(errors);
        }
        if let Some(pou) = library.pou_mut(id) {
            pou.body = body;
            pou.pools.body.calls = pool;
        }
    }
    finish(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::Builtin;
    use crate::call::Call;
    use crate::library::Pou;
    use crate::options::Options;
    use crate::types::TypeRef;
    use crate::unit::CompilationUnit;
    use crate::variable::VarDecl;
    use stplc_dsl::core::{FileId, SourceSpan};

    fn call(pou: &mut Pou, name: &str) -> NodeId {
        let id = pou.body.add(
            NodeKind::Call(Call::new(Id::from(name), vec![])),
            SourceSpan::default(),
        );
        pou.pools
            .body
            .calls
            .add(Id::from(name), id, SourceSpan::default(), bind_call);
        id
    }

    fn callee(linker: &Linker, pou: usize, node: NodeId) -> Option<Callee> {
        match &linker.library.pous[pou].body.node(node).unwrap().kind {
            NodeKind::Call(call) => call.callee,
            _ => None,
        }
    }

    fn linker(unit: CompilationUnit) -> Linker {
        let mut linker = Linker::new(vec![unit], &Options::default());
        crate::link_merge_units::apply(&mut linker).unwrap();
        linker
    }

    #[test]
    fn apply_when_standard_function_then_builtin() {
        let mut unit = CompilationUnit::new(FileId::from_string("calls.st"));
        let mut main = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        let node = call(&mut main, "abs");
        unit.pous.push(main);

        let mut linker = linker(unit);
        apply(&mut linker).unwrap();
        assert_eq!(callee(&linker, 0, node), Some(Callee::Builtin(Builtin::Abs)));
    }

    #[test]
    fn apply_when_user_function_named_as_standard_then_user_function() {
        let mut unit = CompilationUnit::new(FileId::from_string("calls.st"));
        unit.pous.push(Pou::new(Id::from("ABS"), PouKind::Function, SourceSpan::default()));
        let mut main = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        let node = call(&mut main, "abs");
        unit.pous.push(main);

        let mut linker = linker(unit);
        apply(&mut linker).unwrap();
        assert_eq!(callee(&linker, 1, node), Some(Callee::Function(PouId(0))));
    }

    #[test]
    fn apply_when_local_instance_then_instance() {
        let mut unit = CompilationUnit::new(FileId::from_string("calls.st"));
        let mut main = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        main.vars.push(VarDecl::new(
            Id::from("timer"),
            Section::Local,
            TypeRef::named(Id::from("TON")),
            SourceSpan::default(),
        ));
        let node = call(&mut main, "Timer");
        unit.pous.push(main);

        let mut linker = linker(unit);
        apply(&mut linker).unwrap();
        assert_eq!(
            callee(&linker, 0, node),
            Some(Callee::Instance(VarRef::Local(0)))
        );
    }

    #[test]
    fn apply_when_name_unknown_then_unresolved_function() {
        let mut unit = CompilationUnit::new(FileId::from_string("calls.st"));
        let mut main = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        call(&mut main, "missing");
        unit.pous.push(main);

        let mut linker = linker(unit);
        let diagnostics = apply(&mut linker).unwrap_err();
        assert_eq!(diagnostics[0].code(), Problem::UnresolvedFunction.code());
    }
}
