//! Error types for the winch link.

use std::io;
use thiserror::Error;

/// Result type alias for winch link operations.
pub type Result<T> = std::result::Result<T, WinchError>;

/// Errors that can occur while configuring, connecting to, or writing to the PLC.
#[derive(Debug, Error)]
pub enum WinchError {
    /// A configuration field is missing or malformed. Raised before any network I/O.
    #[error("Invalid config '{field}': {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: String,
        /// Description of why the field is invalid.
        reason: String,
    },

    /// The TCP connection or the S7 handshake failed.
    #[error("Could not connect to PLC at {target}: {reason}")]
    Connection {
        /// Address that was being connected to.
        target: String,
        /// Description of the failure.
        reason: String,
    },

    /// A fire-and-forget write failed on the transport.
    #[error("Lost connection to PLC while writing {address}: {reason}")]
    Write {
        /// PLC address the write was aimed at.
        address: String,
        /// Description of the failure.
        reason: String,
    },

    /// The PLC answered a fire-and-forget write but refused it. The session
    /// stays up.
    #[error("PLC rejected write to {address}: {reason}")]
    WriteRejected {
        /// PLC address the write was aimed at.
        address: String,
        /// Description of the rejection.
        reason: String,
    },

    /// Reading or writing persisted settings failed.
    #[error("Could not persist settings to {path}: {reason}")]
    Persistence {
        /// Settings file path.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// Operation requires an established session.
    #[error("Not connected to PLC")]
    NotConnected,

    /// Another connect attempt has not finished yet.
    #[error("A connection attempt is already in progress")]
    ConnectInProgress,

    /// Tag name has no entry in the translation table.
    #[error("Unknown tag '{tag}'")]
    UnknownTag {
        /// The tag that could not be resolved.
        tag: String,
    },

    /// Telegram received from the PLC is malformed.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// The PLC rejected the job.
    #[error("PLC error: class 0x{class:02X}, code 0x{code:02X}")]
    PlcError {
        /// Error class from the ack header, or 0 for an item-level failure.
        class: u8,
        /// Error code from the ack header, or the item return code.
        code: u8,
    },

    /// PDU reference mismatch between request and response.
    #[error("PDU reference mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    PduRefMismatch {
        /// Reference sent with the job.
        expected: u16,
        /// Reference echoed by the PLC.
        received: u16,
    },

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// The peer closed the TCP connection.
    #[error("Connection closed by the PLC")]
    ConnectionClosed,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WinchError {
    /// Creates a new `InvalidConfig` error.
    ///
    /// # Example
    ///
    /// ```
    /// use winch_link::WinchError;
    ///
    /// let err = WinchError::invalid_config("ip", "not an IPv4 address");
    /// assert_eq!(err.to_string(), "Invalid config 'ip': not an IPv4 address");
    /// ```
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Connection` error.
    pub fn connection(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new `Write` error.
    pub fn write(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Write {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new `WriteRejected` error.
    pub fn write_rejected(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::WriteRejected {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new `Persistence` error.
    pub fn persistence(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use winch_link::WinchError;
    ///
    /// let err = WinchError::invalid_response("telegram too short");
    /// ```
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `PlcError` from an error class and code.
    pub fn plc_error(class: u8, code: u8) -> Self {
        Self::PlcError { class, code }
    }

    /// Creates a new `PduRefMismatch` error.
    pub fn pdu_ref_mismatch(expected: u16, received: u16) -> Self {
        Self::PduRefMismatch { expected, received }
    }

    /// Returns true when the error means the socket can no longer be trusted.
    ///
    /// PLC-level rejections leave the session usable; everything on the
    /// transport side does not.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionClosed
                | Self::Io(_)
                | Self::InvalidResponse { .. }
                | Self::PduRefMismatch { .. }
        )
    }
}
