//! Standard functions that are evaluated natively rather than from POU
//! bodies.
use phf::phf_map;
use stplc_dsl::core::Id;

use crate::elementary;
use crate::error::ValueError;
use crate::types::{TypeId, TypeTable};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    Sqrt,
    Min,
    Max,
    Limit,
    Sel,
}

static BUILTINS: phf::Map<&'static str, Builtin> = phf_map! {
    "abs" => Builtin::Abs,
    "sqrt" => Builtin::Sqrt,
    "min" => Builtin::Min,
    "max" => Builtin::Max,
    "limit" => Builtin::Limit,
    "sel" => Builtin::Sel,
};

/// Finds the standard function with the name.
pub fn find(name: &Id) -> Option<Builtin> {
    BUILTINS.get(name.lower_case()).copied()
}

pub fn all() -> impl Iterator<Item = (&'static str, Builtin)> {
    BUILTINS.entries().map(|(name, builtin)| (*name, *builtin))
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Abs => "ABS",
            Builtin::Sqrt => "SQRT",
            Builtin::Min => "MIN",
            Builtin::Max => "MAX",
            Builtin::Limit => "LIMIT",
            Builtin::Sel => "SEL",
        }
    }

    /// Returns true if the function takes the number of arguments.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Builtin::Abs | Builtin::Sqrt => count == 1,
            Builtin::Min | Builtin::Max => count >= 2,
            Builtin::Limit | Builtin::Sel => count == 3,
        }
    }

    /// The type of the result given the types of the arguments.
    pub fn result_type(&self, types: &TypeTable, args: &[Option<TypeId>]) -> Option<TypeId> {
        match self {
            Builtin::Sqrt => args
                .first()
                .copied()
                .flatten()
                .or_else(|| types.elementary(&elementary::LREAL)),
            Builtin::Sel => args.iter().skip(1).find_map(|ty| *ty),
            _ => args.iter().find_map(|ty| *ty),
        }
    }

    pub fn evaluate(&self, args: &[Value]) -> Result<Value, ValueError> {
        if !self.accepts(args.len()) {
            return Err(ValueError::InvalidArgument(format!(
                "{} does not take {} arguments",
                self.name(),
                args.len()
            )));
        }
        match (self, args) {
            (Builtin::Abs, [value]) => match value {
                Value::Integer(v) => v
                    .checked_abs()
                    .map(Value::Integer)
                    .ok_or(ValueError::Overflow(crate::value::Operation::Negate)),
                Value::Real(v) => Ok(Value::Real(v.abs())),
                other => Err(ValueError::InvalidArgument(format!(
                    "ABS requires a number but found {}",
                    other.kind_name()
                ))),
            },
            (Builtin::Sqrt, [value]) => {
                let v = value.real()?;
                if v < 0.0 {
                    return Err(ValueError::InvalidArgument(format!(
                        "SQRT of negative value {}",
                        v
                    )));
                }
                Ok(Value::Real(v.sqrt()))
            }
            (Builtin::Min, [first, rest @ ..]) => {
                let mut result = first;
                for value in rest {
                    if value.lesser(result)? {
                        result = value;
                    }
                }
                Ok(result.clone())
            }
            (Builtin::Max, [first, rest @ ..]) => {
                let mut result = first;
                for value in rest {
                    if value.greater(result)? {
                        result = value;
                    }
                }
                Ok(result.clone())
            }
            (Builtin::Limit, [min, value, max]) => {
                if value.lesser(min)? {
                    Ok(min.clone())
                } else if value.greater(max)? {
                    Ok(max.clone())
                } else {
                    Ok(value.clone())
                }
            }
            (Builtin::Sel, [selector, first, second]) => {
                if selector.bool()? {
                    Ok(second.clone())
                } else {
                    Ok(first.clone())
                }
            }
            _ => Err(ValueError::Internal(format!("{} arguments", self.name()))),
        }
    }
}
