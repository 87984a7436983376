//! S7 response parsing and validation.
//!
//! A response telegram is laid out as:
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | TPKT | 4 bytes | version, reserved, total length |
//! | COTP | 3 bytes | data TPDU header |
//! | S7 header | 12 bytes | ack-data header with error class/code |
//! | Parameters | `param_len` | echo of the job function |
//! | Data | `data_len` | per-item return codes and payload |
//!
//! A write item succeeded if its return code is 0xFF.
//!
//! # Example
//!
//! ```
//! use winch_link::S7Response;
//!
//! let bytes = [
//!     0x03, 0x00, 0x00, 0x16,             // TPKT
//!     0x02, 0xF0, 0x80,                   // COTP
//!     0x32, 0x03, 0x00, 0x00, 0x00, 0x02, // S7 ack-data, pdu ref 2
//!     0x00, 0x02, 0x00, 0x01, 0x00, 0x00, // lengths, no error
//!     0x05, 0x01,                         // write var, 1 item
//!     0xFF,                               // item success
//! ];
//!
//! let response = S7Response::from_bytes(&bytes).unwrap();
//! assert_eq!(response.header.pdu_ref, 2);
//! assert!(response.check_write_ack().is_ok());
//! ```

use crate::command::{FN_SETUP_COMMUNICATION, FN_WRITE_VAR};
use crate::error::{Result, WinchError};
use crate::header::{
    check_cotp_data_header, MessageType, S7Header, TpktHeader, COTP_CONNECTION_CONFIRM,
    ISO_HEADER_SIZE, TPKT_HEADER_SIZE,
};

/// Item return code reported for a successful write.
pub const ITEM_SUCCESS: u8 = 0xFF;
/// Item return code for an address outside the area.
pub const ITEM_INVALID_ADDRESS: u8 = 0x05;
/// Item return code for an object that does not exist.
pub const ITEM_NOT_FOUND: u8 = 0x0A;

/// Checks that `data` is a COTP connection confirm.
///
/// # Errors
///
/// Returns `InvalidResponse` if the telegram is malformed or is not a CC TPDU.
pub fn check_connection_confirm(data: &[u8]) -> Result<()> {
    let tpkt = TpktHeader::from_bytes(data)?;
    if data.len() < usize::from(tpkt.length) || data.len() < TPKT_HEADER_SIZE + 2 {
        return Err(WinchError::invalid_response("connection confirm truncated"));
    }
    let tpdu = data[TPKT_HEADER_SIZE + 1] & 0xF0;
    if tpdu != COTP_CONNECTION_CONFIRM {
        return Err(WinchError::invalid_response(format!(
            "expected COTP connection confirm, got TPDU 0x{tpdu:02X}"
        )));
    }
    Ok(())
}

/// Parsed S7 response.
#[derive(Debug, Clone)]
pub struct S7Response {
    /// Response header.
    pub header: S7Header,
    /// Parameter part.
    pub params: Vec<u8>,
    /// Data part.
    pub data: Vec<u8>,
}

impl S7Response {
    /// Parses a complete response telegram, TPKT header included.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if any layer is malformed, the telegram is
    /// shorter than its headers announce, or it is not an ack.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let tpkt = TpktHeader::from_bytes(data)?;
        let total = usize::from(tpkt.length);
        if data.len() < total {
            return Err(WinchError::invalid_response(format!(
                "telegram truncated: header announces {} bytes, got {}",
                total,
                data.len()
            )));
        }
        if total < ISO_HEADER_SIZE {
            return Err(WinchError::invalid_response("telegram too short for COTP"));
        }
        check_cotp_data_header(&data[TPKT_HEADER_SIZE..total])?;

        let pdu = &data[ISO_HEADER_SIZE..total];
        let header = S7Header::from_bytes(pdu)?;
        if header.message_type == MessageType::Job {
            return Err(WinchError::invalid_response("expected an ack, got a job"));
        }

        let params_start = header.size();
        let data_start = params_start + usize::from(header.param_len);
        let data_end = data_start + usize::from(header.data_len);
        if pdu.len() < data_end {
            return Err(WinchError::invalid_response(format!(
                "S7 PDU truncated: expected {} bytes, got {}",
                data_end,
                pdu.len()
            )));
        }

        Ok(Self {
            header,
            params: pdu[params_start..data_start].to_vec(),
            data: pdu[data_start..data_end].to_vec(),
        })
    }

    /// Checks the header error class and code.
    ///
    /// # Errors
    ///
    /// Returns `PlcError` if the PLC reported a header-level error.
    pub fn check_error(&self) -> Result<()> {
        if self.header.is_success() {
            Ok(())
        } else {
            Err(WinchError::plc_error(
                self.header.error_class,
                self.header.error_code,
            ))
        }
    }

    /// Extracts the PDU length granted by a setup-communication ack.
    ///
    /// # Errors
    ///
    /// Returns `PlcError` for a rejected setup and `InvalidResponse` if the
    /// ack is malformed or grants a zero-length PDU.
    pub fn negotiated_pdu_length(&self) -> Result<u16> {
        self.check_error()?;
        if self.params.len() < 8 || self.params[0] != FN_SETUP_COMMUNICATION {
            return Err(WinchError::invalid_response(
                "not a setup-communication ack",
            ));
        }
        let length = u16::from_be_bytes([self.params[6], self.params[7]]);
        if length == 0 {
            return Err(WinchError::invalid_response("PLC granted a zero PDU length"));
        }
        Ok(length)
    }

    /// Checks a write-var ack for a single item.
    ///
    /// # Errors
    ///
    /// Returns `PlcError` (class 0, item return code as code) if the item was
    /// rejected, and `InvalidResponse` if the ack is malformed.
    pub fn check_write_ack(&self) -> Result<()> {
        self.check_error()?;
        if self.params.first() != Some(&FN_WRITE_VAR) {
            return Err(WinchError::invalid_response("not a write-var ack"));
        }
        match self.data.first() {
            Some(&ITEM_SUCCESS) => Ok(()),
            Some(&code) => Err(WinchError::plc_error(0, code)),
            None => Err(WinchError::invalid_response("write-var ack without item")),
        }
    }
}
