//! Linking: turns compilation units into a library that can execute.
//!
//! Linking runs a fixed sequence of stages. Each stage reports every
//! problem it finds, and linking stops after the first stage that found a
//! problem because later stages assume a consistent library.
use log::{debug, info};
use stplc_dsl::{
    core::SourceSpan,
    diagnostic::{Diagnostic, Label},
};
use stplc_problems::Problem;

use crate::library::{Library, TypePool};
use crate::options::Options;
use crate::unit::CompilationUnit;
use crate::{
    link_calls, link_fb_headers, link_merge_units, link_pou_headers, link_references,
    link_statements, link_types, link_variables,
};

/// The state shared by the link stages.
pub struct Linker {
    pub options: Options,
    pub library: Library,
    /// Units that have not been merged yet.
    pub units: Vec<CompilationUnit>,
    /// References between type declarations from every unit.
    pub type_pool: TypePool,
    /// References from global variables from every unit.
    pub global_pool: TypePool,
}

impl Linker {
    pub fn new(units: Vec<CompilationUnit>, options: &Options) -> Self {
        Self {
            library: Library::new(options.memory_size),
            options: options.clone(),
            units,
            type_pool: TypePool::new(),
            global_pool: TypePool::new(),
        }
    }
}

type Stage = fn(&mut Linker) -> Result<(), Vec<Diagnostic>>;

const STAGES: [(&str, Stage); 9] = [
    ("merge units", link_merge_units::apply),
    ("types", link_types::apply),
    ("function block headers", link_fb_headers::resolve),
    ("global variables", link_variables::apply),
    ("variable references", link_references::apply),
    ("function block values", link_fb_headers::finalize),
    ("function and program headers", link_pou_headers::apply),
    ("calls", link_calls::apply),
    ("statements", link_statements::apply),
];

/// Links the compilation units into a library.
///
/// Units with syntax errors are not linked unless the options allow it.
/// In that case the syntax errors are returned together with a problem
/// that says linking was skipped.
pub fn link(units: Vec<CompilationUnit>, options: &Options) -> Result<Library, Vec<Diagnostic>> {
    let Some(first) = units.first() else {
        return Err(vec![Diagnostic::problem(
            Problem::NoContent,
            Label::span(SourceSpan::builtin(), "Nothing to link"),
        )]);
    };

    let syntax: Vec<Diagnostic> = units.iter().flat_map(|u| u.diagnostics.iter().cloned()).collect();
    if !syntax.is_empty() && !options.resolve_links_on_parse_error {
        let file_id = units
            .iter()
            .find(|u| u.has_errors())
            .map(|u| u.file_id.clone())
            .unwrap_or_else(|| first.file_id.clone());
        let mut diagnostics = syntax;
        diagnostics.push(Diagnostic::problem(
            Problem::ParseErrorsPresent,
            Label::file(file_id, "Fix the syntax errors before linking"),
        ));
        return Err(diagnostics);
    }

    let mut linker = Linker::new(units, options);
    for (name, stage) in STAGES.iter() {
        debug!("Link stage {}", name);
        if let Err(diagnostics) = stage(&mut linker) {
            info!("Link stage {} found {} problems", name, diagnostics.len());
            return Err(diagnostics);
        }
    }
    Ok(linker.library)
}

/// Collects the problems of one stage.
pub fn finish(diagnostics: Vec<Diagnostic>) -> Result<(), Vec<Diagnostic>> {
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}
