//! Tag translation table.
//!
//! The UI addresses the winch output by the symbolic tag [`WINCH_TAG`]; the
//! concrete word behind it is user-configurable, so the table is rebuilt
//! from the connection config every time a session is established. It holds
//! exactly one entry.

use crate::address::S7Address;
use crate::error::{Result, WinchError};

/// Symbolic tag of the winch speed output.
pub const WINCH_TAG: &str = "WINCH";

/// Single-entry mapping from a symbolic tag to a PLC word address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    tag: String,
    address: S7Address,
}

impl TagTable {
    /// Creates a table mapping `tag` to `address`.
    pub fn new(tag: impl Into<String>, address: S7Address) -> Self {
        Self {
            tag: tag.into(),
            address,
        }
    }

    /// Creates the winch table from an output word name such as `QW4`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `winch` is not a valid output word.
    pub fn for_winch(winch: &str) -> Result<Self> {
        Ok(Self::new(WINCH_TAG, winch.parse()?))
    }

    /// Resolves `tag` to its address.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTag` if `tag` is not the mapped tag.
    pub fn resolve(&self, tag: &str) -> Result<S7Address> {
        if tag == self.tag {
            Ok(self.address)
        } else {
            Err(WinchError::UnknownTag {
                tag: tag.to_string(),
            })
        }
    }

    /// Returns the mapped tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the mapped address.
    pub fn address(&self) -> S7Address {
        self.address
    }
}
