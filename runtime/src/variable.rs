//! Variable declarations and the rules for assigning to variables.
use stplc_dsl::core::{Id, SourceSpan};

use crate::class::ValueClass;
use crate::error::ValueError;
use crate::memory::DirectAddress;
use crate::types::{TypeId, TypeRef, TypeTable};
use crate::value::{Operation, Value};

/// The declaration section of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Input,
    Output,
    InOut,
    Local,
    Temp,
    External,
    Global,
    /// The implicit variable that holds the result of a function.
    Return,
}

impl Section {
    /// Returns true if the variable is a parameter that a caller may set.
    pub fn is_input(&self) -> bool {
        matches!(self, Section::Input | Section::InOut)
    }

    /// Returns true if the variable is a parameter that a caller may read
    /// back after the call.
    pub fn is_output(&self) -> bool {
        matches!(self, Section::Output | Section::InOut)
    }
}

/// How the variable stores its value.
#[derive(Clone, Debug, PartialEq)]
pub enum VarKind {
    /// The variable owns its value.
    Owned,
    /// The variable forwards to a global variable (`VAR_EXTERNAL`). The
    /// index of the global is set when the reference is resolved.
    External { global: Option<usize> },
    /// The variable owns its value and synchronizes the value with direct
    /// memory when read and written.
    Direct(DirectAddress),
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: Id,
    pub section: Section,
    pub ty: TypeRef,
    pub class: ValueClass,
    pub initializer: Option<Value>,
    pub kind: VarKind,
    /// The value of the variable when a program starts. Created when the
    /// header of the declaring scope is finalized.
    pub default: Value,
    pub span: SourceSpan,
}

impl VarDecl {
    pub fn new(name: Id, section: Section, ty: TypeRef, span: SourceSpan) -> Self {
        Self {
            name,
            section,
            ty,
            class: ValueClass::empty(),
            initializer: None,
            kind: VarKind::Owned,
            default: Value::Void,
            span,
        }
    }

    pub fn with_class(mut self, class: ValueClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_initializer(mut self, initializer: Option<Value>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn with_kind(mut self, kind: VarKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_constant(&self) -> bool {
        self.class.is_constant()
    }

    /// Creates the default value from the type and the initializer.
    pub fn create_value(&mut self, types: &TypeTable) -> Result<(), ValueError> {
        self.default = types.create_value_of(self.ty.id()?, self.initializer.as_ref())?;
        Ok(())
    }
}

/// Assigns the source value into the target.
///
/// A constant target cannot be assigned. A temporary or untyped target
/// takes a copy of the source. Otherwise the source must be acceptable for
/// the type of the target and is converted to the type.
pub fn assign(
    types: &TypeTable,
    ty: Option<TypeId>,
    class: ValueClass,
    name: &str,
    target: &mut Value,
    source: &Value,
) -> Result<(), ValueError> {
    if class.is_constant() {
        return Err(ValueError::ConstantTarget(name.to_string()));
    }
    if !target.supports(Operation::Assign) {
        return Err(ValueError::NotSupported {
            operation: Operation::Assign,
            kind: target.kind_name(),
        });
    }
    match ty {
        Some(ty) if !class.is_temporary() => {
            *target = types.coerce(ty, source)?;
        }
        _ => {
            *target = source.create_temp_from();
        }
    }
    Ok(())
}

/// Checks before executing that a value with the source type and class may
/// be assigned to a target of the target type.
///
/// Constant sources also have their value checked against the target type
/// so that out of range literals are found before execution.
pub fn assignable_from(
    types: &TypeTable,
    target: Option<TypeId>,
    source_ty: Option<TypeId>,
    source_class: ValueClass,
    source: &Value,
) -> Result<(), ValueError> {
    let Some(target) = target else {
        return Ok(());
    };
    if let Some(source_ty) = source_ty {
        if !types.compatible(target, source_ty) {
            return Err(ValueError::IncompatibleTypes {
                expected: types.name_of(target),
                found: types.name_of(source_ty),
            });
        }
    }
    if source_class.is_constant() {
        types.can_hold(target, source)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(types: &TypeTable) -> TypeId {
        types.lookup(&Id::from("INT")).unwrap()
    }

    #[test]
    fn assign_when_constant_target_then_constant_target_error() {
        let types = TypeTable::new();
        let mut target = Value::Integer(1);
        let result = assign(
            &types,
            Some(int(&types)),
            ValueClass::CONSTANT,
            "K",
            &mut target,
            &Value::Integer(2),
        );
        assert_eq!(result, Err(ValueError::ConstantTarget("K".to_string())));
        assert_eq!(target, Value::Integer(1));
    }

    #[test]
    fn assign_when_temporary_then_unchecked_copy() {
        let types = TypeTable::new();
        let mut target = Value::Integer(0);
        assign(
            &types,
            Some(int(&types)),
            ValueClass::TEMPORARY,
            "t",
            &mut target,
            &Value::Integer(1_000_000),
        )
        .unwrap();
        assert_eq!(target, Value::Integer(1_000_000));
    }

    #[test]
    fn assign_when_out_of_range_then_error_and_unchanged() {
        let types = TypeTable::new();
        let mut target = Value::Integer(3);
        let result = assign(
            &types,
            Some(int(&types)),
            ValueClass::empty(),
            "x",
            &mut target,
            &Value::Integer(40_000),
        );
        assert!(matches!(result, Err(ValueError::OutOfRange { .. })));
        assert_eq!(target, Value::Integer(3));
    }

    #[test]
    fn assignable_from_when_constant_literal_out_of_range_then_error() {
        let types = TypeTable::new();
        let result = assignable_from(
            &types,
            Some(int(&types)),
            None,
            ValueClass::CONSTANT | ValueClass::TEMPORARY,
            &Value::Integer(70_000),
        );
        assert!(result.is_err());
    }

    #[test]
    fn assignable_from_when_bool_into_int_then_incompatible() {
        let types = TypeTable::new();
        let bool = types.lookup(&Id::from("BOOL")).unwrap();
        let result = assignable_from(
            &types,
            Some(int(&types)),
            Some(bool),
            ValueClass::empty(),
            &Value::Bool(true),
        );
        assert!(matches!(result, Err(ValueError::IncompatibleTypes { .. })));
    }
}
