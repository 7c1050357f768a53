//! Verifies the body of every POU and prepares it for execution.
use std::mem;

use log::{debug, trace};
use stplc_dsl::diagnostic::Diagnostic;

use crate::library::{Library, PouId};
use crate::node::{Body, VerifyContext};
use crate::options::Options;
use crate::stages::{finish, Linker};

/// Verifies the body in the scope of the POU, or of no POU for a query,
/// and allocates it when verification found no problems.
pub fn prepare(
    library: &Library,
    pou: Option<PouId>,
    body: &mut Body,
    options: &Options,
) -> Result<(), Vec<Diagnostic>> {
    let Some(root) = body.root() else {
        return Ok(());
    };
    let declaration = pou.and_then(|id| library.pou(id));
    let mut ctx = VerifyContext::new(library, declaration, options);
    if let Err(diagnostic) = body.verify(root, &mut ctx) {
        ctx.diagnostics.push(diagnostic);
    }
    finish(ctx.diagnostics)?;
    body.allocate(root, &library.types).map_err(|d| vec![d])
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let library = &mut linker.library;
    let mut diagnostics = vec![];
    for id in library.pou_ids().collect::<Vec<_>>() {
        let Some(pou) = library.pou_mut(id) else {
            continue;
        };
        trace!("Verifying body of {} with {} nodes", pou.name, pou.body.len());
        let mut body = mem::take(&mut pou.body);
        if let Err(errors) = prepare(library, Some(id), &mut body, &linker.options) {
            debug!("Body of POU {} has {} problems", id.0, errors.len());
            diagnostics.extend(errors);
        }
        if let Some(pou) = library.pou_mut(id) {
            pou.body = body;
        }
    }
    finish(diagnostics)
}
