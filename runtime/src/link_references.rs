//! Resolves the names that bodies use to refer to variables, and connects
//! `VAR_EXTERNAL` declarations to global variables.
//!
//! A name in a body is looked up first among the variables of the POU,
//! then among the global variables, then the programs (for qualified names
//! such as `Main.count`) and finally the values of enumerated types.
use std::collections::HashMap;
use std::mem;

use log::trace;
use stplc_dsl::{
    core::Id,
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::class::ValueClass;
use crate::expr::Literal;
use crate::library::{
    ExternalReferrer, Library, PouId, PouKind, Symbol, VarRef, VariablePool,
};
use crate::node::{Body, NodeId, NodeKind};
use crate::resolver::Reference;
use crate::stages::{finish, Linker};
use crate::types::TypeKind;
use crate::value::Value;
use crate::variable::VarKind;

/// Connects the external declaration to the global variable.
pub fn bind_external(
    library: &mut Library,
    reference: &Reference<ExternalReferrer>,
    found: Option<&usize>,
) -> Result<(), Diagnostic> {
    let Some(global) = found else {
        return Err(Diagnostic::problem(
            Problem::UnresolvedGlobal,
            Label::span(
                reference.span.clone(),
                format!("No global variable {}", reference.text()),
            ),
        )
        .with_context_id("pou", &reference.referrer.pou));
    };
    let decl = library
        .find_pou(&reference.referrer.pou)
        .and_then(|id| library.pou_mut(id))
        .and_then(|pou| pou.vars.get_mut(reference.referrer.var))
        .ok_or_else(|| Diagnostic::internal(&reference.span, "External declaration does not exist"))?;
    decl.kind = VarKind::External {
        global: Some(*global),
    };
    Ok(())
}

/// Wires the variable node to what the name refers to. A simple name of an
/// enumerated value becomes a literal of the enumerated type.
pub fn bind_variable(
    body: &mut Body,
    reference: &Reference<NodeId>,
    found: Option<&Symbol>,
) -> Result<(), Diagnostic> {
    let unresolved = || {
        Diagnostic::problem(
            Problem::UnresolvedVariable,
            Label::span(
                reference.span.clone(),
                format!("{} is not declared", reference.text()),
            ),
        )
    };
    let Some(symbol) = found else {
        return Err(unresolved());
    };
    let node = body.node_mut(reference.referrer)?;
    let NodeKind::Variable(variable) = &mut node.kind else {
        return Err(Diagnostic::internal(
            &reference.span,
            "Variable reference is not a variable node",
        ));
    };
    match symbol {
        Symbol::Var(var) => {
            variable.root = Some(*var);
        }
        Symbol::EnumValue(ty) => {
            if !variable.is_simple() {
                return Err(unresolved());
            }
            let value = Value::Enumeration(variable.segments[0].name.clone());
            node.kind = NodeKind::Literal(Literal::new(value.clone()));
            node.ty = Some(*ty);
            node.class = ValueClass::CONSTANT;
            node.result = value;
        }
    }
    Ok(())
}

/// The names visible to a body. Later entries hide earlier ones.
pub fn symbols(library: &Library, pou: Option<PouId>) -> HashMap<Id, Symbol> {
    let mut table = HashMap::new();
    for (id, ty) in library.types.iter() {
        if let TypeKind::Enumeration { values, .. } = &ty.kind {
            for value in values {
                table.insert(value.clone(), Symbol::EnumValue(id));
            }
        }
    }
    for id in library.pou_ids() {
        if let Some(declaration) = library.pou(id) {
            if declaration.kind == PouKind::Program {
                table.insert(declaration.name.clone(), Symbol::Var(VarRef::Program(id)));
            }
        }
    }
    for (position, global) in library.globals.iter().enumerate() {
        table.insert(global.name.clone(), Symbol::Var(VarRef::Global(position)));
    }
    if let Some(declaration) = pou.and_then(|id| library.pou(id)) {
        for (position, var) in declaration.vars.iter().enumerate() {
            table.insert(var.name.clone(), Symbol::Var(VarRef::Local(position)));
        }
    }
    table
}

/// Resolves the variable references of a body that belongs to the POU, or
/// of a query when there is no POU.
pub fn resolve_variables(
    library: &Library,
    pou: Option<PouId>,
    body: &mut Body,
    pool: &mut VariablePool,
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
        let mut externals = mem::take(&mut pou.pools.externals);
        externals.resolve(library.global_table());
        if let Err(errors) = externals.trigger_resolve_callbacks(library) {
            diagnostics.extend(errors);
        }
        if let Some(pou) = library.pou_mut(id) {
            pou.pools.externals = externals;
        }
    }

    for id in library.pou_ids().collect::<Vec<_>>() {
        let Some(pou) = library.pou_mut(id) else {
            continue;
        };
        trace!("Resolving variable references of {}", pou.name);
        let mut body = mem::take(&mut pou.body);
        let mut pool = mem::take(&mut pou.pools.body.variables);
        if let Err(errors) = resolve_variables(library, Some(id), &mut body, &mut pool) {
            diagnostics.extend(errors);
        }
        if let Some(pou) = library.pou_mut(id) {
            pou.body = body;
            pou.pools.body.variables = pool;
        }
    }
    finish(diagnostics)
}
