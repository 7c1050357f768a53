//! Type descriptors and the table of types known to a library.
//!
//! A type is created once per declaration. Only the references a type holds
//! to other types change after creation and only while linking. Values of a
//! type are created through the table so that references to other types can
//! be followed.
use std::collections::HashMap;

use stplc_dsl::core::{Id, SourceSpan};

use crate::array::{self, Dimension};
use crate::class::TypeClass;
use crate::elementary::{self, Elementary};
use crate::error::ValueError;
use crate::library::PouId;
use crate::resolver::SymbolTable;
use crate::structure::{self, StructMember};
use crate::value::{FbRef, Operation, Value};

/// Types nested deeper than this are assumed to contain themselves.
const MAX_NESTING: usize = 64;

/// Arrays with more elements than this cannot be allocated.
const MAX_ELEMENTS: usize = 1 << 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// A reference by name to a type. The identifier is filled in when the
/// reference is resolved.
#[derive(Clone, Debug)]
pub struct TypeRef {
    pub name: Id,
    pub id: Option<TypeId>,
}

impl TypeRef {
    pub fn named(name: Id) -> Self {
        Self { name, id: None }
    }

    pub fn resolved(name: Id, id: TypeId) -> Self {
        Self { name, id: Some(id) }
    }

    /// Returns the type identifier or an error if the reference was never
    /// resolved.
    pub fn id(&self) -> Result<TypeId, ValueError> {
        self.id
            .ok_or_else(|| ValueError::Internal(format!("type {} is not resolved", self.name)))
    }
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Elementary(&'static Elementary),
    Alias {
        parent: TypeRef,
        initializer: Option<Value>,
    },
    Enumeration {
        values: Vec<Id>,
        initializer: Option<Id>,
    },
    Subrange {
        base: TypeRef,
        min: i128,
        max: i128,
        initializer: Option<Value>,
    },
    Array {
        element: TypeRef,
        dimensions: Vec<Dimension>,
        initializer: Option<Value>,
    },
    Struct {
        members: Vec<StructMember>,
    },
    FunctionBlock(PouId),
}

#[derive(Clone, Debug)]
pub struct Type {
    pub name: Id,
    pub kind: TypeKind,
    pub span: SourceSpan,
}

/// The types of a library indexed by identifier and by name.
#[derive(Clone, Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    names: HashMap<Id, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Creates a table that contains the elementary types.
    pub fn new() -> Self {
        let mut table = Self {
            types: vec![],
            names: HashMap::new(),
        };
        for descriptor in elementary::ELEMENTARY_TYPES {
            let id = TypeId(table.types.len());
            table.types.push(Type {
                name: Id::from(descriptor.name).with_position(SourceSpan::builtin()),
                kind: TypeKind::Elementary(descriptor),
                span: SourceSpan::builtin(),
            });
            for name in elementary::names_of(descriptor) {
                table.names.insert(Id::from(name), id);
            }
        }
        table
    }

    /// Adds the type. If the name is already declared, returns the type
    /// that has the name.
    pub fn add(&mut self, ty: Type) -> Result<TypeId, TypeId> {
        if let Some(existing) = self.names.get(&ty.name) {
            return Err(*existing);
        }
        let id = TypeId(self.types.len());
        self.names.insert(ty.name.clone(), id);
        self.types.push(ty);
        Ok(id)
    }

    pub fn lookup(&self, name: &Id) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> Result<&Type, ValueError> {
        self.types
            .get(id.0)
            .ok_or_else(|| ValueError::Internal(format!("no type with id {}", id.0)))
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        self.types.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types.iter().enumerate().map(|(i, ty)| (TypeId(i), ty))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn name_of(&self, id: TypeId) -> String {
        self.get(id)
            .map(|ty| ty.name.to_string())
            .unwrap_or_else(|_| format!("<type {}>", id.0))
    }

    /// Finds the identifier of the elementary type.
    pub fn elementary(&self, descriptor: &'static Elementary) -> Option<TypeId> {
        self.lookup(&Id::from(descriptor.name))
    }

    pub fn class_of(&self, id: TypeId) -> Result<TypeClass, ValueError> {
        self.class_at(id, 0)
    }

    fn class_at(&self, id: TypeId, depth: usize) -> Result<TypeClass, ValueError> {
        if depth > MAX_NESTING {
            return Err(ValueError::Recursive(self.name_of(id)));
        }
        let class = match &self.get(id)?.kind {
            TypeKind::Elementary(descriptor) => descriptor.class,
            TypeKind::Alias { parent, .. } => {
                self.class_at(parent.id()?, depth + 1)? | TypeClass::DERIVED
            }
            TypeKind::Subrange { base, .. } => {
                self.class_at(base.id()?, depth + 1)? | TypeClass::DERIVED
            }
            TypeKind::Enumeration { .. } => TypeClass::ENUMERATION,
            TypeKind::Array { .. } => TypeClass::ARRAY,
            TypeKind::Struct { .. } => TypeClass::STRUCT,
            TypeKind::FunctionBlock(_) => TypeClass::FUNCTION_BLOCK,
        };
        Ok(class)
    }

    /// Follows aliases to the type that defines the representation.
    pub fn root_of(&self, id: TypeId) -> Result<TypeId, ValueError> {
        let mut current = id;
        for _ in 0..=MAX_NESTING {
            match &self.get(current)?.kind {
                TypeKind::Alias { parent, .. } => current = parent.id()?,
                _ => return Ok(current),
            }
        }
        Err(ValueError::Recursive(self.name_of(id)))
    }

    /// The kind of the type after following aliases.
    pub fn kind_of(&self, id: TypeId) -> Result<&TypeKind, ValueError> {
        Ok(&self.get(self.root_of(id)?)?.kind)
    }

    /// Follows aliases and subranges to the elementary type, if any.
    pub fn elementary_of(&self, id: TypeId) -> Result<Option<&'static Elementary>, ValueError> {
        let mut current = id;
        for _ in 0..=MAX_NESTING {
            match &self.get(current)?.kind {
                TypeKind::Elementary(descriptor) => return Ok(Some(*descriptor)),
                TypeKind::Alias { parent, .. } => current = parent.id()?,
                TypeKind::Subrange { base, .. } => current = base.id()?,
                _ => return Ok(None),
            }
        }
        Err(ValueError::Recursive(self.name_of(id)))
    }

    /// Tests whether values of one type may be used where the other type
    /// is expected.
    ///
    /// Types are compatible when their classes are equal ignoring the
    /// derived marker. Enumerations, arrays, structures and function blocks
    /// must in addition have the same root type.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        let (Ok(class_a), Ok(class_b)) = (self.class_of(a), self.class_of(b)) else {
            return false;
        };
        if !class_a.compatible(&class_b) {
            return false;
        }
        if class_a.is_nominal() {
            return matches!((self.root_of(a), self.root_of(b)), (Ok(x), Ok(y)) if x == y);
        }
        true
    }

    /// Creates a value of the type. The value is the default value for the
    /// type when there is no initial value.
    pub fn create_value_of(&self, id: TypeId, init: Option<&Value>) -> Result<Value, ValueError> {
        self.create_at(id, init, 0)
    }

    fn create_at(&self, id: TypeId, init: Option<&Value>, depth: usize) -> Result<Value, ValueError> {
        if depth > MAX_NESTING {
            return Err(ValueError::Recursive(self.name_of(id)));
        }
        let ty = self.get(id)?;
        match &ty.kind {
            TypeKind::Elementary(descriptor) => match init {
                Some(value) => {
                    descriptor.can_hold(value)?;
                    Ok(descriptor.coerce(value))
                }
                None => Ok(descriptor.default_value()),
            },
            TypeKind::Alias {
                parent,
                initializer,
            } => self.create_at(parent.id()?, init.or(initializer.as_ref()), depth + 1),
            TypeKind::Subrange {
                base,
                min,
                max,
                initializer,
            } => {
                let lowest = Value::Integer(*min);
                let value = self.create_at(
                    base.id()?,
                    Some(init.or(initializer.as_ref()).unwrap_or(&lowest)),
                    depth + 1,
                )?;
                let v = value.integer()?;
                if v < *min || v > *max {
                    return Err(ValueError::OutOfRange {
                        value: value.to_string(),
                        ty: ty.name.to_string(),
                    });
                }
                Ok(value)
            }
            TypeKind::Enumeration {
                values,
                initializer,
            } => {
                let chosen = match (init, initializer) {
                    (Some(Value::Enumeration(v)), _) => v,
                    (Some(other), _) => {
                        return Err(ValueError::IncompatibleTypes {
                            expected: ty.name.to_string(),
                            found: other.kind_name().to_string(),
                        })
                    }
                    (None, Some(v)) => v,
                    (None, None) => values.first().ok_or_else(|| {
                        ValueError::Internal(format!("enumeration {} has no values", ty.name))
                    })?,
                };
                values
                    .iter()
                    .find(|v| *v == chosen)
                    .map(|v| Value::Enumeration(v.clone()))
                    .ok_or_else(|| ValueError::UnknownEnumValue {
                        value: chosen.to_string(),
                        ty: ty.name.to_string(),
                    })
            }
            TypeKind::Array {
                element,
                dimensions,
                initializer,
            } => {
                let element = element.id()?;
                let total = array::total_entries(dimensions);
                if total > MAX_ELEMENTS {
                    return Err(ValueError::StorageTooLarge(ty.name.to_string()));
                }
                match init.or(initializer.as_ref()) {
                    None => {
                        let value = self.create_at(element, None, depth + 1)?;
                        Ok(Value::Array(vec![value; total]))
                    }
                    Some(Value::ArrayInit(items)) => {
                        let supplied = array::expand_initializer(dimensions, items)?;
                        self.create_elements(element, &supplied, depth)
                    }
                    Some(Value::Array(supplied)) => {
                        if supplied.len() != total {
                            return Err(ValueError::InitializerCount {
                                expected: total,
                                found: supplied.len(),
                            });
                        }
                        self.create_elements(element, supplied, depth)
                    }
                    Some(other) => Err(ValueError::IncompatibleTypes {
                        expected: ty.name.to_string(),
                        found: other.kind_name().to_string(),
                    }),
                }
            }
            TypeKind::Struct { members } => {
                let create = |member: &StructMember, value: Option<&Value>| {
                    self.create_at(member.ty.id()?, value, depth + 1)
                };
                match init {
                    None => structure::defaults(members, create).map(Value::Struct),
                    Some(Value::Struct(supplied)) => {
                        structure::initialize(&ty.name, members, supplied, create)
                            .map(Value::Struct)
                    }
                    Some(other) => Err(ValueError::IncompatibleTypes {
                        expected: ty.name.to_string(),
                        found: other.kind_name().to_string(),
                    }),
                }
            }
            TypeKind::FunctionBlock(pou) => match init {
                None => Ok(Value::FunctionBlock(FbRef {
                    pou: *pou,
                    instance: None,
                })),
                Some(Value::FunctionBlock(reference)) if reference.pou == *pou => {
                    Ok(Value::FunctionBlock(*reference))
                }
                Some(other) => Err(ValueError::NotSupported {
                    operation: Operation::Assign,
                    kind: other.kind_name(),
                }),
            },
        }
    }

    fn create_elements(
        &self,
        element: TypeId,
        supplied: &[Value],
        depth: usize,
    ) -> Result<Value, ValueError> {
        supplied
            .iter()
            .map(|v| self.create_at(element, Some(v), depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// Tests whether the value is acceptable for the type.
    pub fn can_hold(&self, id: TypeId, value: &Value) -> Result<(), ValueError> {
        self.create_value_of(id, Some(value)).map(|_| ())
    }

    /// Converts an acceptable value into the representation of the type.
    pub fn coerce(&self, id: TypeId, value: &Value) -> Result<Value, ValueError> {
        self.create_value_of(id, Some(value))
    }

    /// Binds a type to a value that was created without one (a literal).
    pub fn override_type(&self, id: TypeId, value: &Value) -> Result<Value, ValueError> {
        self.coerce(id, value)
    }

    /// Resets the value to the default for the type. Function block
    /// instances that the value refers to are kept.
    pub fn reset_value(&self, id: TypeId, value: &mut Value) -> Result<(), ValueError> {
        let mut fresh = self.create_value_of(id, None)?;
        keep_instances(value, &mut fresh);
        *value = fresh;
        Ok(())
    }

    /// Finds the position and type of a structure member.
    pub fn member_of(&self, id: TypeId, name: &Id) -> Result<Option<(usize, TypeId)>, ValueError> {
        match self.kind_of(id)? {
            TypeKind::Struct { members } => match members.iter().position(|m| &m.name == name) {
                Some(position) => Ok(Some((position, members[position].ty.id()?))),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// The element type and dimensions of an array type.
    pub fn array_of(&self, id: TypeId) -> Result<Option<(TypeId, &[Dimension])>, ValueError> {
        match self.kind_of(id)? {
            TypeKind::Array {
                element,
                dimensions,
                ..
            } => Ok(Some((element.id()?, dimensions.as_slice()))),
            _ => Ok(None),
        }
    }

    /// The function block declaration of a function block type.
    pub fn function_block_of(&self, id: TypeId) -> Result<Option<PouId>, ValueError> {
        match self.kind_of(id)? {
            TypeKind::FunctionBlock(pou) => Ok(Some(*pou)),
            _ => Ok(None),
        }
    }

    /// The types that a value of the type directly contains.
    pub fn contained(&self, id: TypeId) -> Vec<TypeId> {
        let Ok(ty) = self.get(id) else {
            return vec![];
        };
        match &ty.kind {
            TypeKind::Alias { parent, .. } => parent.id.into_iter().collect(),
            TypeKind::Subrange { base, .. } => base.id.into_iter().collect(),
            TypeKind::Array { element, .. } => element.id.into_iter().collect(),
            TypeKind::Struct { members } => members.iter().filter_map(|m| m.ty.id).collect(),
            _ => vec![],
        }
    }

    /// Collects the function blocks that a value of the type contains.
    pub fn function_blocks_in(&self, id: TypeId, found: &mut Vec<PouId>) -> Result<(), ValueError> {
        self.function_blocks_at(id, found, 0)
    }

    fn function_blocks_at(
        &self,
        id: TypeId,
        found: &mut Vec<PouId>,
        depth: usize,
    ) -> Result<(), ValueError> {
        if depth > MAX_NESTING {
            return Err(ValueError::Recursive(self.name_of(id)));
        }
        if let TypeKind::FunctionBlock(pou) = &self.get(id)?.kind {
            found.push(*pou);
            return Ok(());
        }
        for inner in self.contained(id) {
            self.function_blocks_at(inner, found, depth + 1)?;
        }
        Ok(())
    }
}

impl SymbolTable<TypeId> for TypeTable {
    fn lookup(&self, name: &Id) -> Option<TypeId> {
        TypeTable::lookup(self, name)
    }
}

/// Copies function block instance bindings from the old value into the
/// fresh value wherever both hold the same function block.
pub fn keep_instances(old: &Value, fresh: &mut Value) {
    match (old, fresh) {
        (Value::FunctionBlock(old), Value::FunctionBlock(fresh)) if old.pou == fresh.pou => {
            fresh.instance = old.instance;
        }
        (Value::Array(old), Value::Array(fresh)) => {
            for (o, f) in old.iter().zip(fresh.iter_mut()) {
                keep_instances(o, f);
            }
        }
        (Value::Struct(old), Value::Struct(fresh)) => {
            for (o, f) in old.iter().zip(fresh.iter_mut()) {
                keep_instances(&o.value, &mut f.value);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Member;
    use stplc_problems::ProblemKind;

    fn elementary_ref(table: &TypeTable, name: &str) -> TypeRef {
        let id = table.lookup(&Id::from(name)).unwrap();
        TypeRef::resolved(Id::from(name), id)
    }

    fn add_struct(table: &mut TypeTable) -> TypeId {
        let members = vec![
            StructMember {
                name: Id::from("a"),
                ty: elementary_ref(table, "INT"),
                initializer: None,
                span: SourceSpan::default(),
            },
            StructMember {
                name: Id::from("b"),
                ty: elementary_ref(table, "BOOL"),
                initializer: None,
                span: SourceSpan::default(),
            },
        ];
        table
            .add(Type {
                name: Id::from("S"),
                kind: TypeKind::Struct { members },
                span: SourceSpan::default(),
            })
            .unwrap()
    }

    fn member(name: &str, value: Value) -> Member {
        Member {
            name: Id::from(name),
            value,
        }
    }

    #[test]
    fn create_value_of_when_struct_initializer_then_displays_members() {
        let mut table = TypeTable::new();
        let id = add_struct(&mut table);
        let init = Value::Struct(vec![
            member("a", Value::Integer(5)),
            member("b", Value::Bool(true)),
        ]);
        let value = table.create_value_of(id, Some(&init)).unwrap();
        assert_eq!(value.display().unwrap(), "(a:5,b:true)");
    }

    #[test]
    fn can_hold_when_struct_initializer_missing_member_then_type_error_naming_member() {
        let mut table = TypeTable::new();
        let id = add_struct(&mut table);
        let init = Value::Struct(vec![member("a", Value::Integer(5))]);
        let err = table.can_hold(id, &init).unwrap_err();
        assert_eq!(err, ValueError::MissingMember("b".to_string()));
        let diagnostic = err.at(&SourceSpan::default());
        assert_eq!(diagnostic.kind(), ProblemKind::Type);
        assert!(diagnostic.description().contains("member=b"));
    }

    #[test]
    fn compatible_when_alias_of_elementary_then_true() {
        let mut table = TypeTable::new();
        let alias = table
            .add(Type {
                name: Id::from("SPEED"),
                kind: TypeKind::Alias {
                    parent: elementary_ref(&table, "INT"),
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        let int = table.lookup(&Id::from("INT")).unwrap();
        let bool = table.lookup(&Id::from("BOOL")).unwrap();
        assert!(table.compatible(alias, int));
        assert!(!table.compatible(alias, bool));
    }

    #[test]
    fn compatible_when_different_structs_then_false() {
        let mut table = TypeTable::new();
        let first = add_struct(&mut table);
        let second = table
            .add(Type {
                name: Id::from("OTHER"),
                kind: TypeKind::Struct { members: vec![] },
                span: SourceSpan::default(),
            })
            .unwrap();
        assert!(!table.compatible(first, second));
        assert!(table.compatible(first, first));
    }

    #[test]
    fn create_value_of_when_subrange_without_initializer_then_minimum() {
        let mut table = TypeTable::new();
        let id = table
            .add(Type {
                name: Id::from("PERCENT"),
                kind: TypeKind::Subrange {
                    base: elementary_ref(&table, "INT"),
                    min: 5,
                    max: 100,
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        assert_eq!(table.create_value_of(id, None).unwrap(), Value::Integer(5));
        assert!(matches!(
            table.can_hold(id, &Value::Integer(101)),
            Err(ValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn create_value_of_when_enumeration_then_first_value() {
        let mut table = TypeTable::new();
        let id = table
            .add(Type {
                name: Id::from("COLOR"),
                kind: TypeKind::Enumeration {
                    values: vec![Id::from("RED"), Id::from("GREEN")],
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        assert_eq!(
            table.create_value_of(id, None).unwrap(),
            Value::Enumeration(Id::from("RED"))
        );
        assert!(matches!(
            table.can_hold(id, &Value::Enumeration(Id::from("BLUE"))),
            Err(ValueError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn class_of_when_alias_cycle_then_recursive() {
        let mut table = TypeTable::new();
        let a = table
            .add(Type {
                name: Id::from("A"),
                kind: TypeKind::Alias {
                    parent: TypeRef::named(Id::from("B")),
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        let b = table
            .add(Type {
                name: Id::from("B"),
                kind: TypeKind::Alias {
                    parent: TypeRef::resolved(Id::from("A"), a),
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        if let Some(Type {
            kind: TypeKind::Alias { parent, .. },
            ..
        }) = table.get_mut(a)
        {
            parent.id = Some(b);
        }
        assert!(matches!(table.class_of(a), Err(ValueError::Recursive(_))));
    }

    #[test]
    fn lookup_when_short_form_then_elementary() {
        let table = TypeTable::new();
        assert_eq!(
            table.lookup(&Id::from("TOD")),
            table.lookup(&Id::from("TIME_OF_DAY"))
        );
    }
}
