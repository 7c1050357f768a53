//! Structure members and structure initializers.
use stplc_dsl::core::{Id, SourceSpan};

use crate::error::ValueError;
use crate::types::TypeRef;
use crate::value::{Member, Value};

/// A member declared in a `STRUCT ... END_STRUCT` type.
#[derive(Clone, Debug)]
pub struct StructMember {
    pub name: Id,
    pub ty: TypeRef,
    pub initializer: Option<Value>,
    pub span: SourceSpan,
}

/// Creates the members of a structure value from an initializer.
///
/// The initializer must name every declared member and must not name a
/// member that is not declared. `create` produces the value of one member
/// from the initial value for the member.
pub fn initialize<F>(
    type_name: &Id,
    declared: &[StructMember],
    initializer: &[Member],
    mut create: F,
) -> Result<Vec<Member>, ValueError>
where
    F: FnMut(&StructMember, Option<&Value>) -> Result<Value, ValueError>,
{
    if let Some(unknown) = initializer
        .iter()
        .find(|m| !declared.iter().any(|d| d.name == m.name))
    {
        return Err(ValueError::UnknownMember {
            ty: type_name.to_string(),
            member: unknown.name.to_string(),
        });
    }

    declared
        .iter()
        .map(|decl| {
            let supplied = initializer
                .iter()
                .find(|m| m.name == decl.name)
                .ok_or_else(|| ValueError::MissingMember(decl.name.to_string()))?;
            Ok(Member {
                name: decl.name.clone(),
                value: create(decl, Some(&supplied.value))?,
            })
        })
        .collect()
}

/// Creates the members of a structure value from the member declarations.
pub fn defaults<F>(declared: &[StructMember], mut create: F) -> Result<Vec<Member>, ValueError>
where
    F: FnMut(&StructMember, Option<&Value>) -> Result<Value, ValueError>,
{
    declared
        .iter()
        .map(|decl| {
            Ok(Member {
                name: decl.name.clone(),
                value: create(decl, decl.initializer.as_ref())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<StructMember> {
        vec![
            StructMember {
                name: Id::from("a"),
                ty: TypeRef::named(Id::from("INT")),
                initializer: None,
                span: SourceSpan::default(),
            },
            StructMember {
                name: Id::from("b"),
                ty: TypeRef::named(Id::from("BOOL")),
                initializer: Some(Value::Bool(true)),
                span: SourceSpan::default(),
            },
        ]
    }

    fn copy(_: &StructMember, value: Option<&Value>) -> Result<Value, ValueError> {
        Ok(value.cloned().unwrap_or(Value::Integer(0)))
    }

    #[test]
    fn initialize_when_member_missing_then_missing_member() {
        let init = vec![Member {
            name: Id::from("A"),
            value: Value::Integer(5),
        }];
        let result = initialize(&Id::from("S"), &members(), &init, copy);
        assert_eq!(result, Err(ValueError::MissingMember("b".to_string())));
    }

    #[test]
    fn initialize_when_unknown_member_then_unknown_member() {
        let init = vec![Member {
            name: Id::from("c"),
            value: Value::Integer(5),
        }];
        assert!(matches!(
            initialize(&Id::from("S"), &members(), &init, copy),
            Err(ValueError::UnknownMember { .. })
        ));
    }

    #[test]
    fn defaults_when_member_initializer_then_used() {
        let values = defaults(&members(), copy).unwrap();
        assert_eq!(values[0].value, Value::Integer(0));
        assert_eq!(values[1].value, Value::Bool(true));
    }
}
