//! Merges the declarations of every compilation unit into the library.
//!
//! A name may be declared only once across all units. A second
//! declaration of a type, global variable or POU is a link error that
//! points at both declarations; the first declaration is kept.
use std::mem;

use log::trace;
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::stages::{finish, Linker};

fn duplicate(name: &Id, span: &SourceSpan, first: SourceSpan) -> Diagnostic {
    Diagnostic::problem(
        Problem::DuplicateDeclaration,
        Label::span(span.clone(), format!("{} is already declared", name)),
    )
    .with_secondary(Label::span(first, "First declaration"))
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let mut diagnostics = vec![];
    let units = mem::take(&mut linker.units);
    for unit in units {
        trace!(
            "Merging {} types, {} globals and {} POUs",
            unit.types.len(),
            unit.globals.len(),
            unit.pous.len()
        );
        let library = &mut linker.library;
        for ty in unit.types {
            let (name, span) = (ty.name.clone(), ty.span.clone());
            if let Err(existing) = library.types.add(ty) {
                let first = library
                    .types
                    .get(existing)
                    .map(|t| t.span.clone())
                    .unwrap_or_else(|_| SourceSpan::builtin());
                diagnostics.push(duplicate(&name, &span, first));
            }
        }
        for global in unit.globals {
            let (name, span) = (global.name.clone(), global.span.clone());
            if let Err(existing) = library.add_global(global) {
                let first = library.globals[existing].span.clone();
                diagnostics.push(duplicate(&name, &span, first));
            }
        }
        for pou in unit.pous {
            let (name, span) = (pou.name.clone(), pou.span.clone());
            if let Err(first) = library.add_pou(pou) {
                diagnostics.push(duplicate(&name, &span, first));
            }
        }
        linker.type_pool.append(unit.type_pool);
        linker.global_pool.append(unit.global_pool);
    }
    finish(diagnostics)
}
