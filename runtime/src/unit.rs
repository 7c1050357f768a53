//! A compilation unit: the unlinked declarations from one source file.
use stplc_dsl::{core::FileId, diagnostic::Diagnostic};

use crate::library::{Pou, TypePool};
use crate::types::Type;
use crate::variable::VarDecl;

/// The declarations of one source together with the references they make.
///
/// Nothing in a compilation unit refers by position to anything outside of
/// it. References to other declarations are entries in the pools and are
/// resolved only once every unit has been merged into a library.
#[derive(Debug, Default)]
pub struct CompilationUnit {
    pub file_id: FileId,
    pub types: Vec<Type>,
    pub globals: Vec<VarDecl>,
    pub pous: Vec<Pou>,
    /// References from type declarations to other types.
    pub type_pool: TypePool,
    /// References from global variables to their types and the checks of
    /// direct addresses.
    pub global_pool: TypePool,
    /// Problems found while producing the unit, for example syntax errors.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationUnit {
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            ..Default::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
