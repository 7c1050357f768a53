//! Resolves the variable declarations of functions and programs and
//! creates the initial value of every variable.
use std::mem;

use log::trace;
use stplc_dsl::diagnostic::{Diagnostic, Label};
use stplc_problems::Problem;

use crate::library::{Library, PouId, PouKind};
use crate::stages::{finish, Linker};
use crate::variable::VarKind;

/// Resolves the types named by the declarations of the POU.
pub(crate) fn resolve_header(library: &mut Library, id: PouId) -> Result<(), Vec<Diagnostic>> {
    let Some(pou) = library.pou_mut(id) else {
        return Ok(());
    };
    trace!("Resolving header of {}", pou.name);
    let mut pool = mem::take(&mut pou.pools.header);
    pool.resolve(&library.types);
    let result = pool.trigger_resolve_callbacks(library);
    if let Some(pou) = library.pou_mut(id) {
        pou.pools.header = pool;
    }
    result
}

/// Creates the initial value of every variable of the POU. An external
/// variable starts with the value of its global variable, which must have
/// a compatible type.
pub(crate) fn create_values(library: &mut Library, id: PouId) -> Vec<Diagnostic> {
    let types = &library.types;
    let globals = &library.globals;
    let Some(pou) = library.pous.get_mut(id.0) else {
        return vec![];
    };

    let mut diagnostics = vec![];
    for decl in pou.vars.iter_mut() {
        let external = match &decl.kind {
            VarKind::External { global } => Some(*global),
            VarKind::Owned | VarKind::Direct(_) => None,
        };
        let result = match external {
            None => decl.create_value(types),
            Some(None) => {
                diagnostics.push(Diagnostic::internal(&decl.span, "External is not bound"));
                continue;
            }
            Some(Some(g)) => {
                let Some(global) = globals.get(g) else {
                    diagnostics.push(Diagnostic::internal(&decl.span, "External refers to a missing global"));
                    continue;
                };
                match (decl.ty.id(), global.ty.id()) {
                    (Ok(local), Ok(shared)) if types.compatible(local, shared) => {
                        decl.default = global.default.clone();
                        Ok(())
                    }
                    (Ok(local), Ok(shared)) => {
                        diagnostics.push(
                            Diagnostic::problem(
                                Problem::IncompatibleTypes,
                                Label::span(
                                    decl.span.clone(),
                                    format!(
                                        "External {} is {} but the global variable is {}",
                                        decl.name,
                                        types.name_of(local),
                                        types.name_of(shared)
                                    ),
                                ),
                            )
                            .with_secondary(Label::span(global.span.clone(), "Global variable")),
                        );
                        continue;
                    }
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
        };
        if let Err(error) = result {
            diagnostics.push(error.at(&decl.span).with_context_id("variable", &decl.name));
        }
    }
    diagnostics
}

pub fn apply(linker: &mut Linker) -> Result<(), Vec<Diagnostic>> {
    let library = &mut linker.library;
    let headers: Vec<PouId> = library
        .pou_ids()
        .filter(|id| {
            library
                .pou(*id)
                .map(|p| p.kind != PouKind::FunctionBlock)
                .unwrap_or(false)
        })
        .collect();

    let mut diagnostics = vec![];
    for id in headers.iter() {
        if let Err(errors) = resolve_header(library, *id) {
            diagnostics.extend(errors);
        }
    }
    finish(diagnostics)?;

    let mut diagnostics = vec![];
    for id in headers {
        diagnostics.extend(create_values(library, id));
    }
    finish(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ExternalReferrer, Owner, Pou, TypeReferrer};
    use crate::link_references::bind_external;
    use crate::link_types::bind_type;
    use crate::options::Options;
    use crate::types::TypeRef;
    use crate::unit::CompilationUnit;
    use crate::value::Value;
    use crate::variable::{Section, VarDecl};
    use stplc_dsl::core::{FileId, Id, SourceSpan};

    fn declare(pou: &mut Pou, name: &str, section: Section, ty: &str) {
        let mut decl = VarDecl::new(
            Id::from(name),
            section,
            TypeRef::named(Id::from(ty)),
            SourceSpan::default(),
        );
        if section == Section::External {
            decl = decl.with_kind(VarKind::External { global: None });
            pou.pools.externals.add(
                Id::from(name),
                ExternalReferrer {
                    pou: pou.name.clone(),
                    var: pou.vars.len(),
                },
                SourceSpan::default(),
                bind_external,
            );
        }
        pou.pools.header.add(
            Id::from(ty),
            TypeReferrer::Variable {
                owner: Owner::Pou(pou.name.clone()),
                name: Id::from(name),
            },
            SourceSpan::default(),
            bind_type,
        );
        pou.vars.push(decl);
    }

    fn link(unit: CompilationUnit) -> Result<Linker, Vec<Diagnostic>> {
        let mut linker = Linker::new(vec![unit], &Options::default());
        crate::link_merge_units::apply(&mut linker)?;
        crate::link_types::apply(&mut linker)?;
        crate::link_variables::apply(&mut linker)?;
        crate::link_references::apply(&mut linker)?;
        apply(&mut linker)?;
        Ok(linker)
    }

    fn with_global(ty: &str, initializer: Value) -> CompilationUnit {
        let mut unit = CompilationUnit::new(FileId::from_string("headers.st"));
        let global = VarDecl::new(
            Id::from("limit"),
            Section::Global,
            TypeRef::named(Id::from(ty)),
            SourceSpan::default(),
        )
        .with_initializer(Some(initializer));
        unit.globals.push(global);
        unit.global_pool.add(
            Id::from(ty),
            TypeReferrer::Variable {
                owner: Owner::Global,
                name: Id::from("limit"),
            },
            SourceSpan::default(),
            bind_type,
        );
        unit
    }

    #[test]
    fn apply_when_external_compatible_then_takes_global_value() {
        let mut unit = with_global("INT", Value::Integer(12));
        let mut pou = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        declare(&mut pou, "limit", Section::External, "INT");
        declare(&mut pou, "count", Section::Local, "DINT");
        unit.pous.push(pou);

        let linker = link(unit).unwrap();
        let pou = &linker.library.pous[0];
        assert_eq!(pou.vars[0].default, Value::Integer(12));
        assert_eq!(pou.vars[1].default, Value::Integer(0));
    }

    #[test]
    fn apply_when_external_type_differs_then_incompatible_types() {
        let mut unit = with_global("INT", Value::Integer(12));
        let mut pou = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        declare(&mut pou, "limit", Section::External, "BOOL");
        unit.pous.push(pou);

        let diagnostics = link(unit).err().unwrap();
        assert_eq!(diagnostics[0].code(), Problem::IncompatibleTypes.code());
    }

    #[test]
    fn apply_when_local_type_unknown_then_unresolved_type() {
        let mut unit = CompilationUnit::new(FileId::from_string("headers.st"));
        let mut pou = Pou::new(Id::from("Main"), PouKind::Program, SourceSpan::default());
        declare(&mut pou, "count", Section::Local, "COUNTER");
        unit.pous.push(pou);

        let diagnostics = link(unit).err().unwrap();
        assert_eq!(diagnostics[0].code(), Problem::UnresolvedType.code());
    }
}
