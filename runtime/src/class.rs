//! Classification bit sets for types and values.
use bitflags::bitflags;

bitflags! {
    /// Semantic categories of a type used to decide compatibility.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TypeClass: u32 {
        const BOOL = 1 << 0;
        const SIGNED = 1 << 1;
        const UNSIGNED = 1 << 2;
        const REAL = 1 << 3;
        const BIT_STRING = 1 << 4;
        const STRING = 1 << 5;
        const DURATION = 1 << 6;
        const DATE = 1 << 7;
        const TIME_OF_DAY = 1 << 8;
        const DATE_AND_TIME = 1 << 9;
        const ENUMERATION = 1 << 10;
        const ARRAY = 1 << 11;
        const STRUCT = 1 << 12;
        const FUNCTION_BLOCK = 1 << 13;
        /// Marks a user declared type derived from another type.
        const DERIVED = 1 << 31;

        const ANY_INT = Self::SIGNED.bits() | Self::UNSIGNED.bits();
        const ANY_NUM = Self::ANY_INT.bits() | Self::REAL.bits();
    }
}

impl TypeClass {
    /// The default compatibility rule: classes are compatible when they are
    /// equal ignoring the derived marker.
    pub fn compatible(&self, other: &TypeClass) -> bool {
        self.difference(TypeClass::DERIVED) == other.difference(TypeClass::DERIVED)
    }

    /// Returns true if values of the class have identity beyond their
    /// category (so that two types of the same class are not necessarily
    /// compatible).
    pub fn is_nominal(&self) -> bool {
        self.intersects(
            TypeClass::ENUMERATION
                | TypeClass::ARRAY
                | TypeClass::STRUCT
                | TypeClass::FUNCTION_BLOCK,
        )
    }
}

bitflags! {
    /// The storage class of a value.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ValueClass: u8 {
        /// Holds an intermediate result. Exempt from type and range checks.
        const TEMPORARY = 1 << 0;
        /// Cannot be assigned to. Range checked when assigned from.
        const CONSTANT = 1 << 1;
        /// Aliases a global variable.
        const EXTERNAL = 1 << 2;
        /// Retained across warm restarts.
        const RETAIN = 1 << 3;
    }
}

impl ValueClass {
    pub fn is_temporary(&self) -> bool {
        self.contains(ValueClass::TEMPORARY)
    }

    pub fn is_constant(&self) -> bool {
        self.contains(ValueClass::CONSTANT)
    }
}
