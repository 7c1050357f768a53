//! Elementary type descriptors.
//!
//! Elementary types are immutable and shared, so each is a static
//! descriptor rather than an allocated type.
use phf::phf_map;
use time::macros::{date, datetime, time};
use time::Duration;

use crate::class::TypeClass;
use crate::error::ValueError;
use crate::value::{BitString, Value};

#[derive(Debug, PartialEq)]
pub enum ElementaryKind {
    Bool,
    Integer { min: i128, max: i128 },
    Bits,
    Real,
    String,
    Duration,
    Date,
    TimeOfDay,
    DateAndTime,
}

#[derive(Debug, PartialEq)]
pub struct Elementary {
    pub name: &'static str,
    pub class: TypeClass,
    pub kind: ElementaryKind,
    /// Size in bits for types that have a fixed size, otherwise 0.
    pub bits: u32,
}

macro_rules! integer_type {
    ($id:ident, $name:literal, $class:expr, $ty:ty, $bits:literal) => {
        pub static $id: Elementary = Elementary {
            name: $name,
            class: $class,
            kind: ElementaryKind::Integer {
                min: <$ty>::MIN as i128,
                max: <$ty>::MAX as i128,
            },
            bits: $bits,
        };
    };
}

macro_rules! simple_type {
    ($id:ident, $name:literal, $class:expr, $kind:expr, $bits:literal) => {
        pub static $id: Elementary = Elementary {
            name: $name,
            class: $class,
            kind: $kind,
            bits: $bits,
        };
    };
}

simple_type!(BOOL, "BOOL", TypeClass::BOOL, ElementaryKind::Bool, 1);
integer_type!(SINT, "SINT", TypeClass::SIGNED, i8, 8);
integer_type!(INT, "INT", TypeClass::SIGNED, i16, 16);
integer_type!(DINT, "DINT", TypeClass::SIGNED, i32, 32);
integer_type!(LINT, "LINT", TypeClass::SIGNED, i64, 64);
integer_type!(USINT, "USINT", TypeClass::UNSIGNED, u8, 8);
integer_type!(UINT, "UINT", TypeClass::UNSIGNED, u16, 16);
integer_type!(UDINT, "UDINT", TypeClass::UNSIGNED, u32, 32);
integer_type!(ULINT, "ULINT", TypeClass::UNSIGNED, u64, 64);
simple_type!(BYTE, "BYTE", TypeClass::BIT_STRING, ElementaryKind::Bits, 8);
simple_type!(WORD, "WORD", TypeClass::BIT_STRING, ElementaryKind::Bits, 16);
simple_type!(DWORD, "DWORD", TypeClass::BIT_STRING, ElementaryKind::Bits, 32);
simple_type!(LWORD, "LWORD", TypeClass::BIT_STRING, ElementaryKind::Bits, 64);
simple_type!(REAL, "REAL", TypeClass::REAL, ElementaryKind::Real, 32);
simple_type!(LREAL, "LREAL", TypeClass::REAL, ElementaryKind::Real, 64);
simple_type!(STRING, "STRING", TypeClass::STRING, ElementaryKind::String, 0);
simple_type!(WSTRING, "WSTRING", TypeClass::STRING, ElementaryKind::String, 0);
simple_type!(TIME, "TIME", TypeClass::DURATION, ElementaryKind::Duration, 0);
simple_type!(DATE, "DATE", TypeClass::DATE, ElementaryKind::Date, 0);
simple_type!(
    TIME_OF_DAY,
    "TIME_OF_DAY",
    TypeClass::TIME_OF_DAY,
    ElementaryKind::TimeOfDay,
    0
);
simple_type!(
    DATE_AND_TIME,
    "DATE_AND_TIME",
    TypeClass::DATE_AND_TIME,
    ElementaryKind::DateAndTime,
    0
);

/// Every elementary type, in the order they are registered in a type table.
pub static ELEMENTARY_TYPES: [&Elementary; 21] = [
    &BOOL,
    &SINT,
    &INT,
    &DINT,
    &LINT,
    &USINT,
    &UINT,
    &UDINT,
    &ULINT,
    &BYTE,
    &WORD,
    &DWORD,
    &LWORD,
    &REAL,
    &LREAL,
    &STRING,
    &WSTRING,
    &TIME,
    &DATE,
    &TIME_OF_DAY,
    &DATE_AND_TIME,
];

/// Lower case names (including the short forms) of elementary types.
static ELEMENTARY_NAMES: phf::Map<&'static str, &'static Elementary> = phf_map! {
    "bool" => &BOOL,
    "sint" => &SINT,
    "int" => &INT,
    "dint" => &DINT,
    "lint" => &LINT,
    "usint" => &USINT,
    "uint" => &UINT,
    "udint" => &UDINT,
    "ulint" => &ULINT,
    "byte" => &BYTE,
    "word" => &WORD,
    "dword" => &DWORD,
    "lword" => &LWORD,
    "real" => &REAL,
    "lreal" => &LREAL,
    "string" => &STRING,
    "wstring" => &WSTRING,
    "time" => &TIME,
    "date" => &DATE,
    "time_of_day" => &TIME_OF_DAY,
    "tod" => &TIME_OF_DAY,
    "date_and_time" => &DATE_AND_TIME,
    "dt" => &DATE_AND_TIME,
};

/// Finds the elementary type by its lower case name.
pub fn find(lower_case_name: &str) -> Option<&'static Elementary> {
    ELEMENTARY_NAMES.get(lower_case_name).copied()
}

/// Returns the names (including short forms) that refer to the type.
pub fn names_of(elementary: &'static Elementary) -> impl Iterator<Item = &'static str> {
    ELEMENTARY_NAMES
        .entries()
        .filter(move |(_, e)| std::ptr::eq(**e, elementary))
        .map(|(name, _)| *name)
}

impl Elementary {
    pub fn default_value(&self) -> Value {
        match self.kind {
            ElementaryKind::Bool => Value::Bool(false),
            ElementaryKind::Integer { .. } => Value::Integer(0),
            ElementaryKind::Bits => Value::Bits(BitString::new(0, self.bits)),
            ElementaryKind::Real => Value::Real(0.0),
            ElementaryKind::String => Value::String(String::new()),
            ElementaryKind::Duration => Value::Duration(Duration::ZERO),
            ElementaryKind::Date => Value::Date(date!(1970 - 01 - 01)),
            ElementaryKind::TimeOfDay => Value::TimeOfDay(time!(00:00)),
            ElementaryKind::DateAndTime => Value::DateAndTime(datetime!(1970-01-01 00:00)),
        }
    }

    fn out_of_range(&self, value: &Value) -> ValueError {
        ValueError::OutOfRange {
            value: value.to_string(),
            ty: self.name.to_string(),
        }
    }

    fn mismatch(&self, value: &Value) -> ValueError {
        ValueError::IncompatibleTypes {
            expected: self.name.to_string(),
            found: value.kind_name().to_string(),
        }
    }

    /// Tests whether the value is acceptable for the type.
    pub fn can_hold(&self, value: &Value) -> Result<(), ValueError> {
        match (&self.kind, value) {
            (ElementaryKind::Bool, Value::Bool(_)) => Ok(()),
            (ElementaryKind::Integer { min, max }, Value::Integer(v)) => {
                if min <= v && v <= max {
                    Ok(())
                } else {
                    Err(self.out_of_range(value))
                }
            }
            (ElementaryKind::Bits, Value::Bits(b)) => {
                if b.value <= BitString::new(u64::MAX, self.bits).value {
                    Ok(())
                } else {
                    Err(self.out_of_range(value))
                }
            }
            (ElementaryKind::Bits, Value::Integer(v)) => {
                let max = BitString::new(u64::MAX, self.bits).value as i128;
                if 0 <= *v && *v <= max {
                    Ok(())
                } else {
                    Err(self.out_of_range(value))
                }
            }
            (ElementaryKind::Real, Value::Real(v)) => {
                if self.bits == 32 && v.is_finite() && v.abs() > f32::MAX as f64 {
                    Err(self.out_of_range(value))
                } else {
                    Ok(())
                }
            }
            (ElementaryKind::Real, Value::Integer(_)) => Ok(()),
            (ElementaryKind::String, Value::String(_)) => Ok(()),
            (ElementaryKind::Duration, Value::Duration(_)) => Ok(()),
            (ElementaryKind::Date, Value::Date(_)) => Ok(()),
            (ElementaryKind::TimeOfDay, Value::TimeOfDay(_)) => Ok(()),
            (ElementaryKind::DateAndTime, Value::DateAndTime(_)) => Ok(()),
            _ => Err(self.mismatch(value)),
        }
    }

    /// Converts an acceptable value into the representation of the type.
    pub fn coerce(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (ElementaryKind::Real, Value::Integer(v)) => Value::Real(*v as f64),
            (ElementaryKind::Bits, Value::Integer(v)) => {
                Value::Bits(BitString::new(*v as u64, self.bits))
            }
            (ElementaryKind::Bits, Value::Bits(b)) => {
                Value::Bits(BitString::new(b.value, self.bits))
            }
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn find_when_short_form_then_same_descriptor() {
        let tod = find("tod").unwrap();
        assert!(std::ptr::eq(tod, &TIME_OF_DAY));
    }

    #[test]
    fn can_hold_when_bool_into_int_then_incompatible() {
        assert!(matches!(
            INT.can_hold(&Value::Bool(true)),
            Err(ValueError::IncompatibleTypes { .. })
        ));
    }

    #[test]
    fn coerce_when_integer_into_byte_then_bit_string() {
        assert_eq!(BYTE.coerce(&Value::Integer(255)), Value::Bits(BitString::new(255, 8)));
        assert!(BYTE.can_hold(&Value::Integer(256)).is_err());
    }

    proptest! {
        #[test]
        fn can_hold_when_integer_then_true_iff_in_bounds(v in -70_000i128..70_000) {
            let held = INT.can_hold(&Value::Integer(v)).is_ok();
            prop_assert_eq!(held, (i16::MIN as i128) <= v && v <= (i16::MAX as i128));
        }

        #[test]
        fn can_hold_when_unsigned_then_true_iff_in_bounds(v in -10i128..300) {
            let held = USINT.can_hold(&Value::Integer(v)).is_ok();
            prop_assert_eq!(held, (0..=255).contains(&v));
        }
    }
}
