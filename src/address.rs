//! S7 memory areas and word addresses.
//!
//! The control panel stores the winch output as a symbolic word name such as
//! `QW4`. Before a write can be encoded, that name is parsed into an
//! [`S7Address`]: the memory area, the data block number (0 outside DB
//! access) and the byte offset of the word inside the area.
//!
//! # Memory Areas Overview
//!
//! | Area | Prefix | S7 code |
//! |------|--------|:-------:|
//! | Inputs (process image) | I | 0x81 |
//! | Outputs (process image) | Q | 0x82 |
//! | Flags (merkers) | M | 0x83 |
//! | Data blocks | DB | 0x84 |
//!
//! # Example
//!
//! ```
//! use winch_link::{MemoryArea, S7Address};
//!
//! let addr: S7Address = "QW4".parse().unwrap();
//! assert_eq!(addr.area, MemoryArea::Outputs);
//! assert_eq!(addr.byte_offset, 4);
//! assert_eq!(addr.to_string(), "QW4");
//! ```

use std::str::FromStr;

use crate::error::{Result, WinchError};
use crate::validate::validate_mem_address;

/// Memory areas addressable through S7 read/write jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryArea {
    /// Process image of the inputs.
    Inputs,
    /// Process image of the outputs.
    Outputs,
    /// Flag (merker) memory.
    Flags,
    /// Data block memory.
    DataBlock,
}

impl MemoryArea {
    /// Returns the S7 area code used in the item address.
    pub(crate) fn code(self) -> u8 {
        match self {
            MemoryArea::Inputs => 0x81,
            MemoryArea::Outputs => 0x82,
            MemoryArea::Flags => 0x83,
            MemoryArea::DataBlock => 0x84,
        }
    }

    /// Returns the mnemonic prefix used in symbolic addresses.
    pub fn prefix(self) -> &'static str {
        match self {
            MemoryArea::Inputs => "I",
            MemoryArea::Outputs => "Q",
            MemoryArea::Flags => "M",
            MemoryArea::DataBlock => "DB",
        }
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Location of one 16-bit word in PLC memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct S7Address {
    /// Memory area holding the word.
    pub area: MemoryArea,
    /// Data block number, 0 unless `area` is `DataBlock`.
    pub db_number: u16,
    /// Byte offset of the word's high byte inside the area.
    pub byte_offset: u16,
}

impl S7Address {
    /// Creates an output word address (`QW<byte_offset>`).
    pub fn output_word(byte_offset: u16) -> Self {
        Self {
            area: MemoryArea::Outputs,
            db_number: 0,
            byte_offset,
        }
    }

    /// Bit offset of the word, as carried in the 24-bit S7 item address.
    pub(crate) fn bit_offset(self) -> u32 {
        u32::from(self.byte_offset) << 3
    }
}

impl FromStr for S7Address {
    type Err = WinchError;

    /// Parses an output word name accepted by [`validate_mem_address`].
    fn from_str(s: &str) -> Result<Self> {
        if !validate_mem_address(s) {
            return Err(WinchError::invalid_config(
                "winch",
                format!("'{s}' is not an output word in QW1-QW99"),
            ));
        }
        let offset = s[2..]
            .parse::<u16>()
            .map_err(|e| WinchError::invalid_config("winch", e.to_string()))?;
        Ok(Self::output_word(offset))
    }
}

impl std::fmt::Display for S7Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.area {
            MemoryArea::DataBlock => write!(f, "DB{}.DBW{}", self.db_number, self.byte_offset),
            area => write!(f, "{}W{}", area, self.byte_offset),
        }
    }
}
