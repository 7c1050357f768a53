//! Function block headers are linked in two passes. The first resolves the
//! types of the declared variables so that other declarations may contain
//! instances. The second, once every reference is known, checks that no
//! function block contains an instance of itself and creates the initial
//! values.
use log::trace;
use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use stplc_dsl::diagnostic::{Diagnostic, Label};
use stplc_problems::Problem;

use crate::library::{Library, PouId, PouKind};
use crate::link_pou_headers::{create_values, resolve_header};
use crate::stages::{finish, Linker};

fn function_blocks(library: &Library) -> Vec<PouId> {
    library
        .pou_ids()
        .filter(|id| {
            library
                .pou(*id)
                .map(|p| p.kind == PouKind::FunctionBlock)
                .unwrap_or(false)
        })
        .collect()
}

pub fn resolve(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let library = &mut linker.library;
    let mut diagnostics = vec![];
    for id in function_blocks(library) {
        if let Err(errors) = resolve_header(library, id) {
            diagnostics.extend(errors);
        }
    }
    finish(diagnostics)
}

/// Finds function blocks that contain an instance of themselves, directly
/// or through other function blocks. The problem is reported at the
/// declaration that closes the cycle.
fn find_cycles(library: &Library, blocks: &[PouId]) -> Result<(), Vec<Diagnostic>> {
    let mut graph: DiGraphMap<PouId, usize> = DiGraphMap::new();
    for id in blocks {
        graph.add_node(*id);
        let Some(pou) = library.pou(*id) else {
            continue;
        };
        for (position, var) in pou.vars.iter().enumerate() {
            let Some(ty) = var.ty.id else {
                continue;
            };
            let mut contained = vec![];
            library
                .types
                .function_blocks_in(ty, &mut contained)
                .map_err(|e| vec![e.at(&var.span)])?;
            for inner in contained {
                graph.add_edge(*id, inner, position);
            }
        }
    }

    let mut diagnostics = vec![];
    for component in tarjan_scc(&graph) {
        let mut members = component.clone();
        members.sort();
        for id in members.iter() {
            let Some(pou) = library.pou(*id) else {
                continue;
            };
            for (_, target, position) in graph.edges(*id) {
                if !members.contains(&target) {
                    continue;
                }
                let Some(var) = pou.vars.get(*position) else {
                    continue;
                };
                diagnostics.push(
                    Diagnostic::problem(
                        Problem::RecursiveCycle,
                        Label::span(
                            var.span.clone(),
                            format!("Instance {} makes {} contain itself", var.name, pou.name),
                        ),
                    )
                    .with_context_id("function block", &pou.name),
                );
            }
        }
    }
    finish(diagnostics)
}

pub fn finalize(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let library = &mut linker.library;
    let blocks = function_blocks(library);
    find_cycles(library, &blocks)?;

    let mut diagnostics = vec![];
    for id in blocks {
        trace!("Creating initial values of function block {}", id.0);
        diagnostics.extend(create_values(library, id));
    }
    finish(diagnostics)
}
