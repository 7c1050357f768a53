//! Direct memory: the input, output and marker areas that directly
//! addressed variables (`AT %IX0.0`) are synchronized with.
use std::fmt;
use std::str::FromStr;

use crate::elementary::{Elementary, ElementaryKind};
use crate::error::ValueError;
use crate::types::{TypeId, TypeTable};
use crate::value::{BitString, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Area {
    Input,
    Output,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressSize {
    Bit,
    Byte,
    Word,
    DWord,
    LWord,
}

impl AddressSize {
    pub fn bits(&self) -> u32 {
        match self {
            AddressSize::Bit => 1,
            AddressSize::Byte => 8,
            AddressSize::Word => 16,
            AddressSize::DWord => 32,
            AddressSize::LWord => 64,
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            AddressSize::Bit | AddressSize::Byte => 1,
            AddressSize::Word => 2,
            AddressSize::DWord => 4,
            AddressSize::LWord => 8,
        }
    }
}

/// A direct address such as `%IX0.1`, `%QB2` or `%MW4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectAddress {
    pub area: Area,
    pub size: AddressSize,
    pub byte: usize,
    /// The bit within the byte. Only meaningful for bit addresses.
    pub bit: u8,
}

impl FromStr for DirectAddress {
    type Err = ValueError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidArgument(format!("{} is not a direct address", text));
        let rest = text.strip_prefix('%').ok_or_else(invalid)?;
        let mut chars = rest.chars();
        let area = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('I') => Area::Input,
            Some('Q') => Area::Output,
            Some('M') => Area::Memory,
            _ => return Err(invalid()),
        };
        let rest = chars.as_str();
        let (size, location) = match rest.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('X') => (AddressSize::Bit, &rest[1..]),
            Some('B') => (AddressSize::Byte, &rest[1..]),
            Some('W') => (AddressSize::Word, &rest[1..]),
            Some('D') => (AddressSize::DWord, &rest[1..]),
            Some('L') => (AddressSize::LWord, &rest[1..]),
            Some(c) if c.is_ascii_digit() => (AddressSize::Bit, rest),
            _ => return Err(invalid()),
        };

        let (byte, bit) = match (size, location.split_once('.')) {
            (AddressSize::Bit, Some((byte, bit))) => (byte, bit),
            (AddressSize::Bit, None) => return Err(invalid()),
            (_, None) => (location, "0"),
            (_, Some(_)) => return Err(invalid()),
        };
        let byte = byte.parse::<usize>().map_err(|_| invalid())?;
        let bit = bit.parse::<u8>().map_err(|_| invalid())?;
        if bit > 7 {
            return Err(invalid());
        }
        Ok(DirectAddress {
            area,
            size,
            byte,
            bit,
        })
    }
}

impl fmt::Display for DirectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let area = match self.area {
            Area::Input => 'I',
            Area::Output => 'Q',
            Area::Memory => 'M',
        };
        match self.size {
            AddressSize::Bit => write!(f, "%{}X{}.{}", area, self.byte, self.bit),
            AddressSize::Byte => write!(f, "%{}B{}", area, self.byte),
            AddressSize::Word => write!(f, "%{}W{}", area, self.byte),
            AddressSize::DWord => write!(f, "%{}D{}", area, self.byte),
            AddressSize::LWord => write!(f, "%{}L{}", area, self.byte),
        }
    }
}

/// The byte addressable memory areas.
#[derive(Clone, Debug, Default)]
pub struct DirectMemory {
    inputs: Vec<u8>,
    outputs: Vec<u8>,
    markers: Vec<u8>,
}

impl DirectMemory {
    pub fn new(size: usize) -> Self {
        Self {
            inputs: vec![0; size],
            outputs: vec![0; size],
            markers: vec![0; size],
        }
    }

    pub fn area(&self, area: Area) -> &[u8] {
        match area {
            Area::Input => &self.inputs,
            Area::Output => &self.outputs,
            Area::Memory => &self.markers,
        }
    }

    pub fn area_mut(&mut self, area: Area) -> &mut [u8] {
        match area {
            Area::Input => &mut self.inputs,
            Area::Output => &mut self.outputs,
            Area::Memory => &mut self.markers,
        }
    }

    fn range(&self, address: &DirectAddress) -> Result<std::ops::Range<usize>, ValueError> {
        let end = address.byte.checked_add(address.size.bytes());
        match end {
            Some(end) if end <= self.area(address.area).len() => Ok(address.byte..end),
            _ => Err(ValueError::AddressOutOfRange(address.to_string())),
        }
    }

    /// Reads the bits at the address. Multi-byte values are little endian.
    pub fn read(&self, address: &DirectAddress) -> Result<u64, ValueError> {
        let range = self.range(address)?;
        let bytes = &self.area(address.area)[range];
        if address.size == AddressSize::Bit {
            return Ok(u64::from((bytes[0] >> address.bit) & 1));
        }
        Ok(bytes
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
    }

    /// Writes the bits to the address. Multi-byte values are little endian.
    pub fn write(&mut self, address: &DirectAddress, bits: u64) -> Result<(), ValueError> {
        let range = self.range(address)?;
        let bytes = &mut self.area_mut(address.area)[range];
        if address.size == AddressSize::Bit {
            let mask = 1u8 << address.bit;
            if bits & 1 == 1 {
                bytes[0] |= mask;
            } else {
                bytes[0] &= !mask;
            }
            return Ok(());
        }
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (bits >> (8 * i)) as u8;
        }
        Ok(())
    }
}

fn mismatch(address: &DirectAddress, types: &TypeTable, ty: TypeId) -> ValueError {
    ValueError::AddressMismatch {
        address: address.to_string(),
        ty: types.name_of(ty),
    }
}

fn addressable(
    types: &TypeTable,
    ty: TypeId,
    address: &DirectAddress,
) -> Result<&'static Elementary, ValueError> {
    let descriptor = types
        .elementary_of(ty)?
        .ok_or_else(|| mismatch(address, types, ty))?;
    let fits = match (&descriptor.kind, address.size) {
        (ElementaryKind::Bool, AddressSize::Bit) => true,
        (ElementaryKind::Integer { .. } | ElementaryKind::Bits, size) => {
            size != AddressSize::Bit && descriptor.bits == size.bits()
        }
        _ => false,
    };
    if fits {
        Ok(descriptor)
    } else {
        Err(mismatch(address, types, ty))
    }
}

/// Checks that a variable of the type can be located at the address in
/// areas of the size.
pub fn check_address(
    types: &TypeTable,
    ty: TypeId,
    address: &DirectAddress,
    memory_size: usize,
) -> Result<(), ValueError> {
    addressable(types, ty, address)?;
    match address.byte.checked_add(address.size.bytes()) {
        Some(end) if end <= memory_size => Ok(()),
        _ => Err(ValueError::AddressOutOfRange(address.to_string())),
    }
}

/// Copies between the value of a directly addressed variable and the
/// memory. When `write` is true the value is copied to memory, otherwise
/// the value is replaced with the contents of the memory.
pub fn sync_direct_memory(
    types: &TypeTable,
    ty: TypeId,
    value: &mut Value,
    address: &DirectAddress,
    memory: &mut DirectMemory,
    write: bool,
) -> Result<(), ValueError> {
    let descriptor = addressable(types, ty, address)?;
    if write {
        let bits = match value {
            Value::Bool(v) => u64::from(*v),
            // Two's complement truncation to the width of the type.
            Value::Integer(v) => BitString::new(*v as u64, descriptor.bits).value,
            Value::Bits(b) => b.value,
            _ => return Err(mismatch(address, types, ty)),
        };
        return memory.write(address, bits);
    }

    let bits = memory.read(address)?;
    *value = match descriptor.kind {
        ElementaryKind::Bool => Value::Bool(bits != 0),
        ElementaryKind::Integer { min, .. } if min < 0 => {
            let shift = 64 - descriptor.bits;
            Value::Integer(i128::from(((bits << shift) as i64) >> shift))
        }
        ElementaryKind::Integer { .. } => Value::Integer(i128::from(bits)),
        ElementaryKind::Bits => Value::Bits(BitString::new(bits, descriptor.bits)),
        _ => return Err(mismatch(address, types, ty)),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_dsl::core::Id;

    fn address(text: &str) -> DirectAddress {
        text.parse().unwrap()
    }

    #[test]
    fn parse_when_bit_address_then_area_byte_and_bit() {
        let parsed = address("%IX2.3");
        assert_eq!(parsed.area, Area::Input);
        assert_eq!(parsed.size, AddressSize::Bit);
        assert_eq!((parsed.byte, parsed.bit), (2, 3));
        assert_eq!(parsed.to_string(), "%IX2.3");
    }

    #[test]
    fn parse_when_word_address_then_word() {
        assert_eq!(address("%mw4").size, AddressSize::Word);
        assert!("%QX1".parse::<DirectAddress>().is_err());
        assert!("%QX1.8".parse::<DirectAddress>().is_err());
    }

    #[test]
    fn sync_direct_memory_when_signed_word_then_sign_extended() {
        let types = TypeTable::new();
        let int = types.lookup(&Id::from("INT")).unwrap();
        let mut memory = DirectMemory::new(8);
        let mw = address("%MW2");
        let mut value = Value::Integer(-2);
        sync_direct_memory(&types, int, &mut value, &mw, &mut memory, true).unwrap();
        assert_eq!(memory.area(Area::Memory)[2..4], [0xFEu8, 0xFF]);

        let mut read = Value::Integer(0);
        sync_direct_memory(&types, int, &mut read, &mw, &mut memory, false).unwrap();
        assert_eq!(read, Value::Integer(-2));
    }

    #[test]
    fn sync_direct_memory_when_bit_then_only_that_bit_changes() {
        let types = TypeTable::new();
        let bool = types.lookup(&Id::from("BOOL")).unwrap();
        let mut memory = DirectMemory::new(1);
        memory.area_mut(Area::Output)[0] = 0b0000_0001;
        let mut value = Value::Bool(true);
        sync_direct_memory(&types, bool, &mut value, &address("%QX0.2"), &mut memory, true)
            .unwrap();
        assert_eq!(memory.area(Area::Output)[0], 0b0000_0101);
    }

    #[test]
    fn check_address_when_size_differs_from_type_then_mismatch() {
        let types = TypeTable::new();
        let int = types.lookup(&Id::from("INT")).unwrap();
        assert!(matches!(
            check_address(&types, int, &address("%IB0"), 16),
            Err(ValueError::AddressMismatch { .. })
        ));
        assert!(matches!(
            check_address(&types, int, &address("%IW15"), 16),
            Err(ValueError::AddressOutOfRange(_))
        ));
        assert!(check_address(&types, int, &address("%IW14"), 16).is_ok());
    }
}
