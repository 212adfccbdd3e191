//! Sparse byte-addressable data memory.
//!
//! Backing storage is a byte map, so a handful of stores near the stack
//! top and a handful near the data floor cost the same. Unwritten bytes
//! read as zero; bytes stored as zero are evicted to keep the map sparse.

use std::collections::HashMap;

use crate::defs::AccessSize;
use crate::error::CoreError;

/// Little-endian sparse data memory with a configurable floor below which
/// every access is rejected.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DataMemory {
    bytes: HashMap<u64, u8>,
    floor: u64,
}

impl DataMemory {
    /// Creates an empty memory rejecting accesses below `floor`.
    #[must_use]
    pub fn new(floor: u64) -> Self {
        Self {
            bytes: HashMap::new(),
            floor,
        }
    }

    /// The minimum legal byte address.
    #[must_use]
    pub const fn floor(&self) -> u64 {
        self.floor
    }

    /// Discards all stored bytes.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Number of bytes currently resident in the backing map.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Reads `size` bytes starting at `address`, little-endian, zero for
    /// any byte never written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AddressBelowFloor`] if any byte of the access
    /// falls below the floor.
    pub fn read(&self, address: u64, size: AccessSize) -> Result<u64, CoreError> {
        let mut value = 0u64;
        for i in 0..size.bytes() {
            let byte_address = self.checked(address, i)?;
            let byte = self.bytes.get(&byte_address).copied().unwrap_or(0);
            value |= u64::from(byte) << (i * 8);
        }
        Ok(value)
    }

    /// Writes the low `size` bytes of `value` starting at `address`,
    /// little-endian.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AddressBelowFloor`] if any byte of the access
    /// falls below the floor. A failed write stores nothing.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write(&mut self, address: u64, value: u64, size: AccessSize) -> Result<(), CoreError> {
        // Validate the whole span first so a partial write never lands.
        for i in 0..size.bytes() {
            self.checked(address, i)?;
        }
        for i in 0..size.bytes() {
            let byte_address = address.wrapping_add(i);
            let byte = (value >> (i * 8)) as u8;
            if byte == 0 {
                self.bytes.remove(&byte_address);
            } else {
                self.bytes.insert(byte_address, byte);
            }
        }
        Ok(())
    }

    fn checked(&self, address: u64, offset: u64) -> Result<u64, CoreError> {
        let byte_address = address.wrapping_add(offset);
        if byte_address < self.floor {
            return Err(CoreError::AddressBelowFloor {
                address: byte_address,
                floor: self.floor,
            });
        }
        Ok(byte_address)
    }
}

#[cfg(test)]
mod tests {
    use super::DataMemory;
    use crate::defs::AccessSize;
    use crate::error::CoreError;
    use proptest::prelude::*;

    const FLOOR: u64 = 0x0050_0000;

    #[test]
    fn unwritten_memory_reads_zero() {
        let memory = DataMemory::new(FLOOR);
        assert_eq!(memory.read(FLOOR + 64, AccessSize::Double), Ok(0));
        assert_eq!(memory.resident_bytes(), 0);
    }

    #[test]
    fn doubleword_roundtrip_is_little_endian() {
        let mut memory = DataMemory::new(FLOOR);
        memory
            .write(FLOOR, 0x0102_0304_0506_0708, AccessSize::Double)
            .expect("in range");
        assert_eq!(memory.read(FLOOR, AccessSize::Byte), Ok(0x08));
        assert_eq!(memory.read(FLOOR + 7, AccessSize::Byte), Ok(0x01));
        assert_eq!(
            memory.read(FLOOR, AccessSize::Double),
            Ok(0x0102_0304_0506_0708)
        );
    }

    #[test]
    fn narrow_writes_truncate_the_value() {
        let mut memory = DataMemory::new(FLOOR);
        memory
            .write(FLOOR, 0xFFFF_FFFF_FFFF_ABCD, AccessSize::Half)
            .expect("in range");
        assert_eq!(memory.read(FLOOR, AccessSize::Half), Ok(0xABCD));
        assert_eq!(memory.read(FLOOR, AccessSize::Double), Ok(0xABCD));
    }

    #[test]
    fn access_below_floor_is_rejected() {
        let mut memory = DataMemory::new(FLOOR);
        assert_eq!(
            memory.read(FLOOR - 1, AccessSize::Byte),
            Err(CoreError::AddressBelowFloor {
                address: FLOOR - 1,
                floor: FLOOR
            })
        );
        // A doubleword straddling the floor fails even though its last
        // byte is legal; the span check covers every byte.
        assert!(memory.write(FLOOR - 4, 1, AccessSize::Double).is_err());
        assert_eq!(memory.resident_bytes(), 0);
    }

    #[test]
    fn zero_stores_evict_resident_bytes() {
        let mut memory = DataMemory::new(FLOOR);
        memory
            .write(FLOOR, u64::MAX, AccessSize::Double)
            .expect("in range");
        assert_eq!(memory.resident_bytes(), 8);
        memory.write(FLOOR, 0, AccessSize::Double).expect("in range");
        assert_eq!(memory.resident_bytes(), 0);
    }

    #[test]
    fn unaligned_access_is_permitted() {
        let mut memory = DataMemory::new(FLOOR);
        memory
            .write(FLOOR + 3, 0x1234_5678, AccessSize::Word)
            .expect("in range");
        assert_eq!(memory.read(FLOOR + 3, AccessSize::Word), Ok(0x1234_5678));
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_masked_value(
            offset in 0u64..4096,
            value: u64,
        ) {
            let mut memory = DataMemory::new(FLOOR);
            for size in [AccessSize::Byte, AccessSize::Half, AccessSize::Word, AccessSize::Double] {
                memory.write(FLOOR + offset, value, size).expect("in range");
                let mask = if size.bits() == 64 { u64::MAX } else { (1u64 << size.bits()) - 1 };
                prop_assert_eq!(memory.read(FLOOR + offset, size), Ok(value & mask));
            }
        }
    }
}
