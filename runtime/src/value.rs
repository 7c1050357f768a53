//! Runtime values and the capabilities each kind of value offers.
//!
//! A value only exposes the operations that are meaningful for its kind.
//! Asking a value for an operation it does not have returns
//! `ValueError::NotSupported` so callers can report the problem instead of
//! failing.
//!
//! Arithmetic and logical operations mutate the left operand in place. The
//! left operand is unchanged when an operation fails.
use std::cmp::Ordering;
use std::fmt;

use bitflags::bitflags;
use stplc_dsl::core::Id;
use time::{Date, Duration, PrimitiveDateTime, Time};

use crate::error::ValueError;
use crate::library::PouId;
use crate::machine::InstanceId;

/// The operations that a value may support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Display,
    Assign,
    Equals,
    Greater,
    Lesser,
    Negate,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    Power,
    Not,
    And,
    Or,
    Xor,
    Integer,
    Real,
    Bool,
    String,
    Duration,
    Date,
    TimeOfDay,
    DateAndTime,
    Enumeration,
    SubVariable,
    Index,
}

impl Operation {
    fn capability(&self) -> Capabilities {
        match self {
            Operation::Display => Capabilities::DISPLAY,
            Operation::Assign => Capabilities::ASSIGN,
            Operation::Equals => Capabilities::EQUALS,
            Operation::Greater | Operation::Lesser => Capabilities::ORDER,
            Operation::Negate => Capabilities::NEGATE,
            Operation::Plus => Capabilities::PLUS,
            Operation::Minus => Capabilities::MINUS,
            Operation::Multiply => Capabilities::MULTIPLY,
            Operation::Divide => Capabilities::DIVIDE,
            Operation::Modulus => Capabilities::MODULUS,
            Operation::Power => Capabilities::POWER,
            Operation::Not => Capabilities::NOT,
            Operation::And | Operation::Or | Operation::Xor => Capabilities::LOGICAL,
            Operation::Integer => Capabilities::INTEGER,
            Operation::Real => Capabilities::REAL,
            Operation::Bool => Capabilities::BOOL,
            Operation::String => Capabilities::STRING,
            Operation::Duration => Capabilities::DURATION,
            Operation::Date => Capabilities::DATE,
            Operation::TimeOfDay => Capabilities::TIME_OF_DAY,
            Operation::DateAndTime => Capabilities::DATE_AND_TIME,
            Operation::Enumeration => Capabilities::ENUMERATION,
            Operation::SubVariable => Capabilities::SUB_VARIABLE,
            Operation::Index => Capabilities::INDEX,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Display => "display",
            Operation::Assign => "assignment",
            Operation::Equals => "equality",
            Operation::Greater => "greater than",
            Operation::Lesser => "less than",
            Operation::Negate => "negation",
            Operation::Plus => "addition",
            Operation::Minus => "subtraction",
            Operation::Multiply => "multiplication",
            Operation::Divide => "division",
            Operation::Modulus => "modulus",
            Operation::Power => "power",
            Operation::Not => "NOT",
            Operation::And => "AND",
            Operation::Or => "OR",
            Operation::Xor => "XOR",
            Operation::Integer => "integer conversion",
            Operation::Real => "real conversion",
            Operation::Bool => "boolean conversion",
            Operation::String => "string conversion",
            Operation::Duration => "duration conversion",
            Operation::Date => "date conversion",
            Operation::TimeOfDay => "time of day conversion",
            Operation::DateAndTime => "date and time conversion",
            Operation::Enumeration => "enumeration conversion",
            Operation::SubVariable => "member access",
            Operation::Index => "array indexing",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// The set of operations a value supports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const DISPLAY = 1 << 0;
        const ASSIGN = 1 << 1;
        const EQUALS = 1 << 2;
        const ORDER = 1 << 3;
        const NEGATE = 1 << 4;
        const PLUS = 1 << 5;
        const MINUS = 1 << 6;
        const MULTIPLY = 1 << 7;
        const DIVIDE = 1 << 8;
        const MODULUS = 1 << 9;
        const POWER = 1 << 10;
        const NOT = 1 << 11;
        const LOGICAL = 1 << 12;
        const INTEGER = 1 << 13;
        const REAL = 1 << 14;
        const BOOL = 1 << 15;
        const STRING = 1 << 16;
        const DURATION = 1 << 17;
        const DATE = 1 << 18;
        const TIME_OF_DAY = 1 << 19;
        const DATE_AND_TIME = 1 << 20;
        const ENUMERATION = 1 << 21;
        const SUB_VARIABLE = 1 << 22;
        const INDEX = 1 << 23;

        const SCALAR = Self::DISPLAY.bits() | Self::ASSIGN.bits() | Self::EQUALS.bits();
        const ORDERED = Self::SCALAR.bits() | Self::ORDER.bits();
    }
}

/// A bit string (`BYTE`, `WORD`, ...) with its width in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitString {
    pub value: u64,
    pub width: u32,
}

impl BitString {
    pub fn new(value: u64, width: u32) -> Self {
        let bits = BitString { value: 0, width };
        BitString {
            value: value & bits.mask(),
            width,
        }
    }

    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }
}

/// A member of a structure value.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub name: Id,
    pub value: Value,
}

/// An item in an array initializer: `count(value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Repeated {
    pub count: usize,
    pub value: Value,
}

/// Refers to a function block instance. The instance is bound when the
/// owning variable is instantiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FbRef {
    pub pou: PouId,
    pub instance: Option<InstanceId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// No value, such as the result of a function without a return type.
    Void,
    Bool(bool),
    Integer(i128),
    Bits(BitString),
    Real(f64),
    String(String),
    Duration(Duration),
    Date(Date),
    TimeOfDay(Time),
    DateAndTime(PrimitiveDateTime),
    Enumeration(Id),
    /// Array elements in row-major order.
    Array(Vec<Value>),
    /// Structure members in declaration order. A structure initializer is
    /// also a `Struct` with only the members it names.
    Struct(Vec<Member>),
    /// An array initializer that has not been expanded against a type.
    ArrayInit(Vec<Repeated>),
    FunctionBlock(FbRef),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "VOID",
            Value::Bool(_) => "BOOL",
            Value::Integer(_) => "integer",
            Value::Bits(_) => "bit string",
            Value::Real(_) => "real",
            Value::String(_) => "STRING",
            Value::Duration(_) => "TIME",
            Value::Date(_) => "DATE",
            Value::TimeOfDay(_) => "TIME_OF_DAY",
            Value::DateAndTime(_) => "DATE_AND_TIME",
            Value::Enumeration(_) => "enumerated",
            Value::Array(_) => "array",
            Value::Struct(_) => "structure",
            Value::ArrayInit(_) => "array initializer",
            Value::FunctionBlock(_) => "function block",
        }
    }

    /// Returns the operations this value supports.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Value::Void => Capabilities::empty(),
            Value::Bool(_) => {
                Capabilities::SCALAR | Capabilities::NOT | Capabilities::LOGICAL | Capabilities::BOOL
            }
            Value::Integer(_) => {
                Capabilities::ORDERED
                    | Capabilities::NEGATE
                    | Capabilities::PLUS
                    | Capabilities::MINUS
                    | Capabilities::MULTIPLY
                    | Capabilities::DIVIDE
                    | Capabilities::MODULUS
                    | Capabilities::POWER
                    | Capabilities::INTEGER
                    | Capabilities::REAL
            }
            Value::Bits(_) => {
                Capabilities::ORDERED
                    | Capabilities::NOT
                    | Capabilities::LOGICAL
                    | Capabilities::INTEGER
            }
            Value::Real(_) => {
                Capabilities::ORDERED
                    | Capabilities::NEGATE
                    | Capabilities::PLUS
                    | Capabilities::MINUS
                    | Capabilities::MULTIPLY
                    | Capabilities::DIVIDE
                    | Capabilities::POWER
                    | Capabilities::REAL
            }
            Value::String(_) => Capabilities::ORDERED | Capabilities::STRING,
            Value::Duration(_) => {
                Capabilities::ORDERED
                    | Capabilities::NEGATE
                    | Capabilities::PLUS
                    | Capabilities::MINUS
                    | Capabilities::MULTIPLY
                    | Capabilities::DIVIDE
                    | Capabilities::DURATION
            }
            Value::Date(_) => Capabilities::ORDERED | Capabilities::MINUS | Capabilities::DATE,
            Value::TimeOfDay(_) => {
                Capabilities::ORDERED
                    | Capabilities::PLUS
                    | Capabilities::MINUS
                    | Capabilities::TIME_OF_DAY
            }
            Value::DateAndTime(_) => {
                Capabilities::ORDERED
                    | Capabilities::PLUS
                    | Capabilities::MINUS
                    | Capabilities::DATE_AND_TIME
            }
            Value::Enumeration(_) => Capabilities::SCALAR | Capabilities::ENUMERATION,
            Value::Array(_) => Capabilities::DISPLAY | Capabilities::ASSIGN | Capabilities::INDEX,
            Value::Struct(_) => {
                Capabilities::DISPLAY | Capabilities::ASSIGN | Capabilities::SUB_VARIABLE
            }
            Value::ArrayInit(_) => Capabilities::DISPLAY | Capabilities::ASSIGN,
            Value::FunctionBlock(_) => Capabilities::DISPLAY | Capabilities::SUB_VARIABLE,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.capabilities().contains(operation.capability())
    }

    fn require(&self, operation: Operation) -> Result<(), ValueError> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(ValueError::NotSupported {
                operation,
                kind: self.kind_name(),
            })
        }
    }

    fn incompatible(&self, operation: Operation, rhs: &Value) -> ValueError {
        ValueError::IncompatibleOperands {
            operation,
            left: self.kind_name(),
            right: rhs.kind_name(),
        }
    }

    /// Produces an untyped scratch copy used to hold the result of an
    /// operation.
    pub fn create_temp_from(&self) -> Value {
        self.clone()
    }

    pub fn display(&self) -> Result<String, ValueError> {
        self.require(Operation::Display)?;
        Ok(self.to_string())
    }

    pub fn integer(&self) -> Result<i128, ValueError> {
        match self {
            Value::Integer(v) => Ok(*v),
            Value::Bits(b) => Ok(b.value as i128),
            _ => Err(not_supported(Operation::Integer, self)),
        }
    }

    pub fn real(&self) -> Result<f64, ValueError> {
        match self {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            _ => Err(not_supported(Operation::Real, self)),
        }
    }

    pub fn bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => Err(not_supported(Operation::Bool, self)),
        }
    }

    pub fn string(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(v) => Ok(v.as_str()),
            _ => Err(not_supported(Operation::String, self)),
        }
    }

    pub fn duration(&self) -> Result<Duration, ValueError> {
        match self {
            Value::Duration(v) => Ok(*v),
            _ => Err(not_supported(Operation::Duration, self)),
        }
    }

    pub fn date(&self) -> Result<Date, ValueError> {
        match self {
            Value::Date(v) => Ok(*v),
            _ => Err(not_supported(Operation::Date, self)),
        }
    }

    pub fn tod(&self) -> Result<Time, ValueError> {
        match self {
            Value::TimeOfDay(v) => Ok(*v),
            _ => Err(not_supported(Operation::TimeOfDay, self)),
        }
    }

    pub fn date_tod(&self) -> Result<PrimitiveDateTime, ValueError> {
        match self {
            Value::DateAndTime(v) => Ok(*v),
            _ => Err(not_supported(Operation::DateAndTime, self)),
        }
    }

    pub fn enumeration(&self) -> Result<&Id, ValueError> {
        match self {
            Value::Enumeration(v) => Ok(v),
            _ => Err(not_supported(Operation::Enumeration, self)),
        }
    }

    /// Pre-flight check that `equals` can compare the values.
    pub fn comparable_to(&self, other: &Value) -> bool {
        self.equals(other, 0.0).is_ok()
    }

    /// Pre-flight check that the operation can combine the values.
    ///
    /// Errors that depend on the particular values (such as division by
    /// zero) do not make the values inoperable.
    pub fn operates_with(&self, operation: Operation, other: &Value) -> bool {
        let mut probe = self.create_temp_from();
        let result = match operation {
            Operation::Equals => return self.comparable_to(other),
            Operation::Greater | Operation::Lesser => return self.ordering(other).is_ok(),
            Operation::And | Operation::Or | Operation::Xor => probe.logical(operation, other),
            _ => probe.arithmetic(operation, other),
        };
        !matches!(
            result,
            Err(ValueError::NotSupported { .. })
                | Err(ValueError::IncompatibleOperands { .. })
                | Err(ValueError::Internal(_))
        )
    }

    /// Tests equality. Reals are equal when they differ by less than
    /// `epsilon`.
    pub fn equals(&self, other: &Value, epsilon: f64) -> Result<bool, ValueError> {
        self.require(Operation::Equals)?;
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
            (Value::Bits(a), Value::Bits(b)) => Ok(a.value == b.value),
            (Value::Bits(a), Value::Integer(b)) | (Value::Integer(b), Value::Bits(a)) => {
                Ok(a.value as i128 == *b)
            }
            (Value::Real(_), Value::Real(_) | Value::Integer(_))
            | (Value::Integer(_), Value::Real(_)) => {
                Ok((self.real()? - other.real()?).abs() < epsilon)
            }
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Duration(a), Value::Duration(b)) => Ok(a == b),
            (Value::Date(a), Value::Date(b)) => Ok(a == b),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Ok(a == b),
            (Value::DateAndTime(a), Value::DateAndTime(b)) => Ok(a == b),
            (Value::Enumeration(a), Value::Enumeration(b)) => Ok(a == b),
            _ => Err(self.incompatible(Operation::Equals, other)),
        }
    }

    fn ordering(&self, other: &Value) -> Result<Ordering, ValueError> {
        self.require(Operation::Greater)?;
        let ordering = match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Bits(a), Value::Bits(b)) => Some(a.value.cmp(&b.value)),
            (Value::Real(_), Value::Real(_) | Value::Integer(_))
            | (Value::Integer(_), Value::Real(_)) => self.real()?.partial_cmp(&other.real()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Some(a.cmp(b)),
            (Value::DateAndTime(a), Value::DateAndTime(b)) => Some(a.cmp(b)),
            _ => return Err(self.incompatible(Operation::Greater, other)),
        };
        ordering.ok_or_else(|| ValueError::InvalidArgument("values are not ordered".into()))
    }

    pub fn greater(&self, other: &Value) -> Result<bool, ValueError> {
        Ok(self.ordering(other)? == Ordering::Greater)
    }

    pub fn lesser(&self, other: &Value) -> Result<bool, ValueError> {
        Ok(self.ordering(other)? == Ordering::Less)
    }

    pub fn negate(&mut self) -> Result<(), ValueError> {
        self.require(Operation::Negate)?;
        let result = match self {
            Value::Integer(v) => Value::Integer(
                v.checked_neg()
                    .ok_or(ValueError::Overflow(Operation::Negate))?,
            ),
            Value::Real(v) => Value::Real(-*v),
            Value::Duration(d) => Value::Duration(duration_from_nanos(
                -d.whole_nanoseconds(),
                Operation::Negate,
            )?),
            _ => return Err(not_supported(Operation::Negate, self)),
        };
        *self = result;
        Ok(())
    }

    pub fn not(&mut self) -> Result<(), ValueError> {
        self.require(Operation::Not)?;
        let result = match self {
            Value::Bool(v) => Value::Bool(!*v),
            Value::Bits(b) => Value::Bits(BitString::new(!b.value, b.width)),
            _ => return Err(not_supported(Operation::Not, self)),
        };
        *self = result;
        Ok(())
    }

    pub fn plus(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Plus, rhs)
    }

    pub fn minus(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Minus, rhs)
    }

    pub fn multiply(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Multiply, rhs)
    }

    pub fn divide(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Divide, rhs)
    }

    pub fn modulus(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Modulus, rhs)
    }

    pub fn to_power(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.arithmetic(Operation::Power, rhs)
    }

    pub fn and(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.logical(Operation::And, rhs)
    }

    pub fn or(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.logical(Operation::Or, rhs)
    }

    pub fn xor(&mut self, rhs: &Value) -> Result<(), ValueError> {
        self.logical(Operation::Xor, rhs)
    }

    /// Applies an arithmetic operation with this value as the left operand.
    pub fn arithmetic(&mut self, operation: Operation, rhs: &Value) -> Result<(), ValueError> {
        self.require(operation)?;
        let result = match (&*self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => {
                Value::Integer(integer_arithmetic(operation, *a, *b)?)
            }
            (Value::Real(_), Value::Real(_) | Value::Integer(_))
            | (Value::Integer(_), Value::Real(_)) => {
                if operation == Operation::Modulus {
                    return Err(self.incompatible(operation, rhs));
                }
                Value::Real(real_arithmetic(operation, self.real()?, rhs.real()?)?)
            }
            (Value::Duration(a), Value::Duration(b)) => match operation {
                Operation::Plus => Value::Duration(
                    a.checked_add(*b).ok_or(ValueError::Overflow(operation))?,
                ),
                Operation::Minus => Value::Duration(
                    a.checked_sub(*b).ok_or(ValueError::Overflow(operation))?,
                ),
                _ => return Err(self.incompatible(operation, rhs)),
            },
            (Value::Duration(a), Value::Integer(_) | Value::Real(_)) => {
                Value::Duration(scale_duration(operation, *a, rhs)?)
            }
            (Value::TimeOfDay(t), Value::Duration(d)) => match operation {
                Operation::Plus => Value::TimeOfDay(*t + *d),
                Operation::Minus => Value::TimeOfDay(*t - *d),
                _ => return Err(self.incompatible(operation, rhs)),
            },
            (Value::DateAndTime(t), Value::Duration(d)) => match operation {
                Operation::Plus => Value::DateAndTime(
                    t.checked_add(*d).ok_or(ValueError::Overflow(operation))?,
                ),
                Operation::Minus => Value::DateAndTime(
                    t.checked_sub(*d).ok_or(ValueError::Overflow(operation))?,
                ),
                _ => return Err(self.incompatible(operation, rhs)),
            },
            (Value::Date(a), Value::Date(b)) if operation == Operation::Minus => {
                Value::Duration(*a - *b)
            }
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) if operation == Operation::Minus => {
                Value::Duration(*a - *b)
            }
            (Value::DateAndTime(a), Value::DateAndTime(b)) if operation == Operation::Minus => {
                Value::Duration(*a - *b)
            }
            _ => return Err(self.incompatible(operation, rhs)),
        };
        *self = result;
        Ok(())
    }

    /// Applies a logical (bitwise for bit strings) operation with this value
    /// as the left operand.
    pub fn logical(&mut self, operation: Operation, rhs: &Value) -> Result<(), ValueError> {
        self.require(operation)?;
        let combine = |a: u64, b: u64| match operation {
            Operation::And => Ok(a & b),
            Operation::Or => Ok(a | b),
            Operation::Xor => Ok(a ^ b),
            _ => Err(ValueError::Internal(format!("{} is not logical", operation))),
        };
        let result = match (&*self, rhs) {
            (Value::Bool(a), Value::Bool(b)) => {
                Value::Bool(combine(*a as u64, *b as u64)? != 0)
            }
            (Value::Bits(a), Value::Bits(b)) => {
                Value::Bits(BitString::new(combine(a.value, b.value)?, a.width.max(b.width)))
            }
            (Value::Bits(a), Value::Integer(b)) if *b >= 0 => {
                Value::Bits(BitString::new(combine(a.value, *b as u64)?, a.width))
            }
            _ => return Err(self.incompatible(operation, rhs)),
        };
        *self = result;
        Ok(())
    }

    /// Finds the position of a structure member.
    pub fn member_index(&self, name: &Id) -> Option<usize> {
        match self {
            Value::Struct(members) => members.iter().position(|m| &m.name == name),
            _ => None,
        }
    }

    /// Navigates to a structure member by name.
    pub fn sub_variable(&self, name: &Id) -> Result<&Value, ValueError> {
        self.require(Operation::SubVariable)?;
        match self {
            Value::Struct(members) => members
                .iter()
                .find(|m| &m.name == name)
                .map(|m| &m.value)
                .ok_or_else(|| ValueError::UnknownMember {
                    ty: self.kind_name().to_string(),
                    member: name.to_string(),
                }),
            _ => Err(not_supported(Operation::SubVariable, self)),
        }
    }

    /// Navigates to an array element by flat index.
    pub fn index(&self, flat: usize) -> Result<&Value, ValueError> {
        self.require(Operation::Index)?;
        self.child(flat)
    }

    /// Navigates by position into an array element or a structure member.
    pub fn child(&self, position: usize) -> Result<&Value, ValueError> {
        let found = match self {
            Value::Array(elements) => elements.get(position),
            Value::Struct(members) => members.get(position).map(|m| &m.value),
            _ => return Err(not_supported(Operation::Index, self)),
        };
        found.ok_or_else(|| ValueError::Internal(format!("no element at {}", position)))
    }

    pub fn child_mut(&mut self, position: usize) -> Result<&mut Value, ValueError> {
        let kind = self.kind_name();
        let found = match self {
            Value::Array(elements) => elements.get_mut(position),
            Value::Struct(members) => members.get_mut(position).map(|m| &mut m.value),
            _ => {
                return Err(ValueError::NotSupported {
                    operation: Operation::Index,
                    kind,
                })
            }
        };
        found.ok_or_else(|| ValueError::Internal(format!("no element at {}", position)))
    }
}

fn not_supported(operation: Operation, value: &Value) -> ValueError {
    ValueError::NotSupported {
        operation,
        kind: value.kind_name(),
    }
}

fn integer_arithmetic(operation: Operation, a: i128, b: i128) -> Result<i128, ValueError> {
    let result = match operation {
        Operation::Plus => a.checked_add(b),
        Operation::Minus => a.checked_sub(b),
        Operation::Multiply => a.checked_mul(b),
        Operation::Divide => {
            if b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_div(b)
        }
        Operation::Modulus => {
            if b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_rem(b)
        }
        Operation::Power => {
            if b < 0 {
                return Err(ValueError::InvalidArgument(
                    "integer power requires a non-negative exponent".into(),
                ));
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
        _ => {
            return Err(ValueError::Internal(format!(
                "{} is not arithmetic",
                operation
            )))
        }
    };
    result.ok_or(ValueError::Overflow(operation))
}

fn real_arithmetic(operation: Operation, a: f64, b: f64) -> Result<f64, ValueError> {
    match operation {
        Operation::Plus => Ok(a + b),
        Operation::Minus => Ok(a - b),
        Operation::Multiply => Ok(a * b),
        Operation::Divide => {
            if b == 0.0 {
                return Err(ValueError::DivisionByZero);
            }
            Ok(a / b)
        }
        Operation::Power => {
            let result = a.powf(b);
            if result.is_nan() {
                Err(ValueError::InvalidArgument(format!(
                    "{} ** {} is not a number",
                    a, b
                )))
            } else if result.is_infinite() {
                Err(ValueError::Overflow(operation))
            } else {
                Ok(result)
            }
        }
        _ => Err(ValueError::Internal(format!(
            "{} is not real arithmetic",
            operation
        ))),
    }
}

fn scale_duration(operation: Operation, d: Duration, rhs: &Value) -> Result<Duration, ValueError> {
    let nanos = d.whole_nanoseconds();
    let scaled = match (operation, rhs) {
        (Operation::Multiply, Value::Integer(b)) => nanos.checked_mul(*b),
        (Operation::Divide, Value::Integer(b)) => {
            if *b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            nanos.checked_div(*b)
        }
        (Operation::Multiply, Value::Real(b)) => real_to_nanos(nanos as f64 * b),
        (Operation::Divide, Value::Real(b)) => {
            if *b == 0.0 {
                return Err(ValueError::DivisionByZero);
            }
            real_to_nanos(nanos as f64 / b)
        }
        _ => {
            return Err(ValueError::IncompatibleOperands {
                operation,
                left: "TIME",
                right: rhs.kind_name(),
            })
        }
    };
    duration_from_nanos(scaled.ok_or(ValueError::Overflow(operation))?, operation)
}

fn real_to_nanos(value: f64) -> Option<i128> {
    if value.is_finite() && value.abs() < i64::MAX as f64 * 1e9 {
        Some(value.round() as i128)
    } else {
        None
    }
}

/// Builds a duration from a count of nanoseconds.
pub fn duration_from_nanos(nanos: i128, operation: Operation) -> Result<Duration, ValueError> {
    let seconds = i64::try_from(nanos / 1_000_000_000).map_err(|_| ValueError::Overflow(operation))?;
    // The remainder is always within +/- 1e9 so it fits an i32.
    let subsec = (nanos % 1_000_000_000) as i32;
    Ok(Duration::new(seconds, subsec))
}

fn write_duration(f: &mut fmt::Formatter<'_>, d: &Duration) -> fmt::Result {
    f.write_str("T#")?;
    if d.is_negative() {
        f.write_str("-")?;
    }
    let d = d.abs();
    if d.is_zero() {
        return f.write_str("0s");
    }
    let parts = [
        (d.whole_days(), "d"),
        (d.whole_hours() % 24, "h"),
        (d.whole_minutes() % 60, "m"),
        (d.whole_seconds() % 60, "s"),
        (i64::from(d.subsec_milliseconds()), "ms"),
    ];
    for (amount, unit) in parts {
        if amount != 0 {
            write!(f, "{}{}", amount, unit)?;
        }
    }
    let micros = d.subsec_microseconds() % 1000;
    if micros != 0 {
        write!(f, "{}us", micros)?;
    }
    Ok(())
}

fn write_time(f: &mut fmt::Formatter<'_>, t: &Time) -> fmt::Result {
    write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())?;
    if t.millisecond() != 0 {
        write!(f, ".{:03}", t.millisecond())?;
    }
    Ok(())
}

fn write_date(f: &mut fmt::Formatter<'_>, d: &Date) -> fmt::Result {
    write!(f, "{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Bits(b) => write!(f, "{}", b.value),
            Value::Real(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
            Value::Duration(d) => write_duration(f, d),
            Value::Date(d) => {
                f.write_str("D#")?;
                write_date(f, d)
            }
            Value::TimeOfDay(t) => {
                f.write_str("TOD#")?;
                write_time(f, t)
            }
            Value::DateAndTime(dt) => {
                f.write_str("DT#")?;
                write_date(f, &dt.date())?;
                f.write_str("-")?;
                write_time(f, &dt.time())
            }
            Value::Enumeration(id) => write!(f, "{}", id),
            Value::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str("]")
            }
            Value::Struct(members) => {
                f.write_str("(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", member.name, member.value)?;
                }
                f.write_str(")")
            }
            Value::ArrayInit(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if item.count == 1 {
                        write!(f, "{}", item.value)?;
                    } else {
                        write!(f, "{}({})", item.count, item.value)?;
                    }
                }
                f.write_str("]")
            }
            Value::FunctionBlock(_) => f.write_str("<instance>"),
        }
    }
}
