//! Resolves the types of global variables and creates their initial values.
use std::mem;

use log::trace;
use stplc_dsl::diagnostic::Diagnostic;

use crate::library::{Library, TypeReferrer};
use crate::memory;
use crate::resolver::Reference;
use crate::stages::{finish, Linker};
use crate::variable::VarKind;

/// Checks that a directly addressed variable fits in the memory areas and
/// that the address size matches the type.
pub fn check_address(
    library: &mut Library,
    reference: &Reference<TypeReferrer>,
) -> Result<(), Diagnostic> {
    let TypeReferrer::Variable { owner, name } = &reference.referrer else {
        return Err(Diagnostic::internal(&reference.span, "Expected a variable"));
    };
    let Some(decl) = library.var(owner, name) else {
        return Err(Diagnostic::internal(
            &reference.span,
            format!("Variable {} is not declared", name),
        ));
    };
    let VarKind::Direct(address) = &decl.kind else {
        return Ok(());
    };
    let ty = decl.ty.id().map_err(|e| e.at(&decl.span))?;
    memory::check_address(&library.types, ty, address, library.memory_size)
        .map_err(|e| e.at(&reference.span).with_context_id("variable", name))
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let mut pool = mem::take(&mut linker.global_pool);
    pool.resolve(&linker.library.types);
    let result = pool.trigger_resolve_callbacks(&mut linker.library);
    linker.global_pool = pool;
    result?;

    let library = &mut linker.library;
    let mut diagnostics = vec![];
    for global in library.globals.iter_mut() {
        trace!("Creating initial value of global {}", global.name);
        if let Err(error) = global.create_value(&library.types) {
            diagnostics.push(error.at(&global.span).with_context_id("variable", &global.name));
        }
    }
    finish(diagnostics)
}
