//! Resolves the references between user declared types and checks the
//! declarations once every reference is known.
//!
//! A type may not contain itself. Containment follows alias parents,
//! subrange bases, array elements and structure members; the check runs on
//! the graph of those edges so that every type in a cycle is reported once.
use std::{collections::HashSet, mem};

use log::trace;
use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use stplc_dsl::diagnostic::{Diagnostic, Label};
use stplc_problems::Problem;

use crate::class::TypeClass;
use crate::error::ValueError;
use crate::library::{Library, TypeReferrer};
use crate::resolver::Reference;
use crate::stages::{finish, Linker};
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

/// Wires the reference to the resolved type.
pub fn bind_type(
    library: &mut Library,
    reference: &Reference<TypeReferrer>,
    found: Option<&TypeId>,
) -> Result<(), Diagnostic> {
    let Some(found) = found else {
        return Err(Diagnostic::problem(
            Problem::UnresolvedType,
            Label::span(reference.span.clone(), format!("{} is not a type", reference.text())),
        ));
    };
    let Some(type_ref) = library.type_ref_mut(&reference.referrer) else {
        return Err(Diagnostic::internal(
            &reference.span,
            format!("No declaration holds the reference to {}", reference.text()),
        ));
    };
    type_ref.id = Some(*found);
    Ok(())
}

fn declared(library: &Library, reference: &Reference<TypeReferrer>) -> Result<TypeId, Diagnostic> {
    let TypeReferrer::Type { ty, .. } = &reference.referrer else {
        return Err(Diagnostic::internal(&reference.span, "Expected a type declaration"));
    };
    library
        .types
        .lookup(ty)
        .ok_or_else(|| Diagnostic::internal(&reference.span, format!("{} is not declared", ty)))
}

/// Checks that the initial value of an alias fits the parent type.
pub fn check_alias(library: &mut Library, reference: &Reference<TypeReferrer>) -> Result<(), Diagnostic> {
    let id = declared(library, reference)?;
    let types = &library.types;
    let TypeKind::Alias {
        parent,
        initializer: Some(initializer),
    } = &types.get(id).map_err(|e| e.at(&reference.span))?.kind
    else {
        return Ok(());
    };
    let parent = parent.id().map_err(|e| e.at(&reference.span))?;
    types
        .can_hold(parent, initializer)
        .map_err(|e| e.at(&reference.span))
}

/// Checks that a subrange narrows an integer type.
pub fn check_subrange(
    library: &mut Library,
    reference: &Reference<TypeReferrer>,
) -> Result<(), Diagnostic> {
    let id = declared(library, reference)?;
    let types = &library.types;
    let ty = types.get(id).map_err(|e| e.at(&reference.span))?;
    let TypeKind::Subrange {
        base,
        min,
        max,
        initializer,
    } = &ty.kind
    else {
        return Ok(());
    };
    let invalid = |message: String| {
        Diagnostic::problem(
            Problem::InvalidSubrange,
            Label::span(ty.span.clone(), message),
        )
        .with_context_id("type", &ty.name)
    };

    let base = base.id().map_err(|e| e.at(&reference.span))?;
    let class = types.class_of(base).map_err(|e| e.at(&reference.span))?;
    if !TypeClass::ANY_INT.intersects(class) {
        return Err(invalid(format!(
            "Subrange base {} is not an integer type",
            types.name_of(base)
        )));
    }
    if min > max {
        return Err(invalid(format!("Lower limit {} is above upper limit {}", min, max)));
    }
    for limit in [*min, *max] {
        if types.can_hold(base, &Value::Integer(limit)).is_err() {
            return Err(invalid(format!(
                "Limit {} is outside of {}",
                limit,
                types.name_of(base)
            )));
        }
    }
    if let Some(initializer) = initializer {
        types.can_hold(id, initializer).map_err(|e| e.at(&ty.span))?;
    }
    Ok(())
}

/// Checks that every dimension of an array has its lower bound at or below
/// its upper bound.
pub fn check_array_bounds(
    library: &mut Library,
    reference: &Reference<TypeReferrer>,
) -> Result<(), Diagnostic> {
    let id = declared(library, reference)?;
    let ty = library.types.get(id).map_err(|e| e.at(&reference.span))?;
    let TypeKind::Array { dimensions, .. } = &ty.kind else {
        return Ok(());
    };
    for dimension in dimensions {
        if dimension.min > dimension.max {
            return Err(Diagnostic::problem(
                Problem::InvalidArrayBounds,
                Label::span(
                    ty.span.clone(),
                    format!("Bounds {}..{} are empty", dimension.min, dimension.max),
                ),
            )
            .with_context_id("type", &ty.name));
        }
    }
    Ok(())
}

/// Finds types that contain themselves.
pub(crate) fn find_cycles(library: &Library) -> Vec<Diagnostic> {
    let mut graph: DiGraphMap<TypeId, ()> = DiGraphMap::new();
    for (id, _) in library.types.iter() {
        graph.add_node(id);
        for inner in library.types.contained(id) {
            graph.add_edge(id, inner, ());
        }
    }

    let mut diagnostics = vec![];
    let mut reported = HashSet::new();
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1
            || component
                .first()
                .map(|id| graph.contains_edge(*id, *id))
                .unwrap_or(false);
        if !cyclic {
            continue;
        }
        let mut members = component.clone();
        members.sort();
        for id in members {
            if !reported.insert(id) {
                continue;
            }
            if let Ok(ty) = library.types.get(id) {
                diagnostics.push(
                    Diagnostic::problem(
                        Problem::RecursiveCycle,
                        Label::span(ty.span.clone(), format!("{} contains itself", ty.name)),
                    )
                    .with_context_id("type", &ty.name),
                );
            }
        }
    }
    diagnostics
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let mut pool = mem::take(&mut linker.type_pool);
    pool.resolve(&linker.library.types);
    let result = pool.trigger_resolve_callbacks(&mut linker.library);
    linker.type_pool = pool;
    result?;

    finish(find_cycles(&linker.library))?;

    // Every user type must be able to produce its default value.
    let mut diagnostics = vec![];
    for (id, ty) in linker.library.types.iter() {
        if matches!(ty.kind, TypeKind::Elementary(_) | TypeKind::FunctionBlock(_)) {
            continue;
        }
        trace!("Creating default value of {}", ty.name);
        if let Err(error) = linker.library.types.create_value_of(id, None) {
            diagnostics.push(default_error(error, ty));
        }
    }
    finish(diagnostics)
}

fn default_error(error: ValueError, ty: &crate::types::Type) -> Diagnostic {
    error.at(&ty.span).with_context_id("type", &ty.name)
}
