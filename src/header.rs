//! Framing headers for S7 communication over ISO-on-TCP.
//!
//! Every telegram exchanged with the PLC is wrapped in three layers:
//!
//! | Layer | Size | Content |
//! |-------|------|---------|
//! | TPKT (RFC 1006) | 4 bytes | version 3, reserved, total length (BE) |
//! | COTP (ISO 8073) | 3 bytes for data TPDUs | length 2, type DT (0xF0), EOT (0x80) |
//! | S7 | 10 bytes (job) or 12 bytes (ack) | protocol id 0x32, ROSCTR, PDU reference, lengths |
//!
//! The COTP connection request/confirm TPDUs used during the handshake carry
//! a variable COTP part and no S7 header; they are built in
//! [`command`](crate::command) and checked in [`response`](crate::response).
//!
//! # Example
//!
//! ```
//! use winch_link::{S7Header, TpktHeader};
//!
//! let tpkt = TpktHeader::new(37);
//! assert_eq!(tpkt.to_bytes(), [0x03, 0x00, 0x00, 0x25]);
//!
//! let header = S7Header::job(0x0001, 14, 6);
//! assert_eq!(header.to_bytes().len(), 10);
//! ```

use crate::error::{Result, WinchError};

/// TPKT header size in bytes.
pub const TPKT_HEADER_SIZE: usize = 4;
/// COTP data TPDU header size in bytes.
pub const COTP_DATA_HEADER_SIZE: usize = 3;
/// Combined TPKT + COTP data header size.
pub const ISO_HEADER_SIZE: usize = TPKT_HEADER_SIZE + COTP_DATA_HEADER_SIZE;
/// S7 job header size in bytes.
pub const S7_JOB_HEADER_SIZE: usize = 10;
/// S7 ack-data header size in bytes (job header + error class/code).
pub const S7_ACK_HEADER_SIZE: usize = 12;

pub(crate) const TPKT_VERSION: u8 = 0x03;
pub(crate) const COTP_CONNECTION_REQUEST: u8 = 0xE0;
pub(crate) const COTP_CONNECTION_CONFIRM: u8 = 0xD0;
pub(crate) const COTP_DATA: u8 = 0xF0;
pub(crate) const COTP_EOT: u8 = 0x80;
pub(crate) const S7_PROTOCOL_ID: u8 = 0x32;

/// S7 message type (ROSCTR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Request sent by the client.
    Job,
    /// Acknowledgement without data.
    Ack,
    /// Acknowledgement carrying parameters/data.
    AckData,
}

impl MessageType {
    fn code(self) -> u8 {
        match self {
            MessageType::Job => 0x01,
            MessageType::Ack => 0x02,
            MessageType::AckData => 0x03,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(MessageType::Job),
            0x02 => Ok(MessageType::Ack),
            0x03 => Ok(MessageType::AckData),
            other => Err(WinchError::invalid_response(format!(
                "unknown S7 message type 0x{other:02X}"
            ))),
        }
    }
}

/// TPKT header carrying the total telegram length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpktHeader {
    /// Total telegram length including this header.
    pub length: u16,
}

impl TpktHeader {
    /// Creates a header for a telegram of `length` bytes.
    pub fn new(length: u16) -> Self {
        Self { length }
    }

    /// Serializes the header.
    pub fn to_bytes(self) -> [u8; TPKT_HEADER_SIZE] {
        let [hi, lo] = self.length.to_be_bytes();
        [TPKT_VERSION, 0x00, hi, lo]
    }

    /// Parses a header from the first four bytes of `data`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the data is too short, the version is not
    /// 3, or the length cannot even hold the header itself.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < TPKT_HEADER_SIZE {
            return Err(WinchError::invalid_response(format!(
                "TPKT header too short: expected {} bytes, got {}",
                TPKT_HEADER_SIZE,
                data.len()
            )));
        }
        if data[0] != TPKT_VERSION {
            return Err(WinchError::invalid_response(format!(
                "unexpected TPKT version 0x{:02X}",
                data[0]
            )));
        }
        let length = u16::from_be_bytes([data[2], data[3]]);
        if usize::from(length) < TPKT_HEADER_SIZE {
            return Err(WinchError::invalid_response(format!(
                "TPKT length {length} shorter than its header"
            )));
        }
        Ok(Self { length })
    }

    /// Number of bytes that follow the TPKT header.
    pub fn payload_len(self) -> usize {
        usize::from(self.length) - TPKT_HEADER_SIZE
    }
}

/// Serializes the COTP data TPDU header (single, final fragment).
pub(crate) fn cotp_data_header() -> [u8; COTP_DATA_HEADER_SIZE] {
    [0x02, COTP_DATA, COTP_EOT]
}

/// Checks a COTP data TPDU header at the start of `data`.
pub(crate) fn check_cotp_data_header(data: &[u8]) -> Result<()> {
    if data.len() < COTP_DATA_HEADER_SIZE {
        return Err(WinchError::invalid_response("COTP header too short"));
    }
    if data[0] != 0x02 || data[1] != COTP_DATA {
        return Err(WinchError::invalid_response(format!(
            "expected COTP data TPDU, got type 0x{:02X}",
            data[1]
        )));
    }
    if data[2] != COTP_EOT {
        return Err(WinchError::invalid_response("fragmented COTP data TPDU"));
    }
    Ok(())
}

/// S7 PDU header.
///
/// Jobs carry 10 bytes; ack-data responses add the error class and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7Header {
    /// Message type (ROSCTR).
    pub message_type: MessageType,
    /// PDU reference echoed by the PLC in its response.
    pub pdu_ref: u16,
    /// Length of the parameter part.
    pub param_len: u16,
    /// Length of the data part.
    pub data_len: u16,
    /// Error class (acks only).
    pub error_class: u8,
    /// Error code (acks only).
    pub error_code: u8,
}

impl S7Header {
    /// Creates a job header.
    pub fn job(pdu_ref: u16, param_len: u16, data_len: u16) -> Self {
        Self {
            message_type: MessageType::Job,
            pdu_ref,
            param_len,
            data_len,
            error_class: 0,
            error_code: 0,
        }
    }

    /// Returns the serialized size of this header.
    pub fn size(self) -> usize {
        match self.message_type {
            MessageType::Job => S7_JOB_HEADER_SIZE,
            MessageType::Ack | MessageType::AckData => S7_ACK_HEADER_SIZE,
        }
    }

    /// Serializes the header.
    pub fn to_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(S7_PROTOCOL_ID);
        bytes.push(self.message_type.code());
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes.extend_from_slice(&self.pdu_ref.to_be_bytes());
        bytes.extend_from_slice(&self.param_len.to_be_bytes());
        bytes.extend_from_slice(&self.data_len.to_be_bytes());
        if self.message_type != MessageType::Job {
            bytes.push(self.error_class);
            bytes.push(self.error_code);
        }
        bytes
    }

    /// Parses a header from the start of an S7 PDU.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the PDU is too short, the protocol id is
    /// not 0x32 or the message type is unknown.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < S7_JOB_HEADER_SIZE {
            return Err(WinchError::invalid_response(format!(
                "S7 header too short: expected at least {} bytes, got {}",
                S7_JOB_HEADER_SIZE,
                data.len()
            )));
        }
        if data[0] != S7_PROTOCOL_ID {
            return Err(WinchError::invalid_response(format!(
                "unexpected S7 protocol id 0x{:02X}",
                data[0]
            )));
        }
        let message_type = MessageType::from_code(data[1])?;
        let mut header = Self {
            message_type,
            pdu_ref: u16::from_be_bytes([data[4], data[5]]),
            param_len: u16::from_be_bytes([data[6], data[7]]),
            data_len: u16::from_be_bytes([data[8], data[9]]),
            error_class: 0,
            error_code: 0,
        };
        if message_type != MessageType::Job {
            if data.len() < S7_ACK_HEADER_SIZE {
                return Err(WinchError::invalid_response("S7 ack header truncated"));
            }
            header.error_class = data[10];
            header.error_code = data[11];
        }
        Ok(header)
    }

    /// Returns true if the ack reports no error.
    pub fn is_success(self) -> bool {
        self.error_class == 0 && self.error_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpkt_to_bytes() {
        assert_eq!(TpktHeader::new(22).to_bytes(), [0x03, 0x00, 0x00, 0x16]);
        assert_eq!(TpktHeader::new(0x0123).to_bytes(), [0x03, 0x00, 0x01, 0x23]);
    }

    #[test]
    fn test_tpkt_from_bytes() {
        let header = TpktHeader::from_bytes(&[0x03, 0x00, 0x00, 0x16]).unwrap();
        assert_eq!(header.length, 22);
        assert_eq!(header.payload_len(), 18);
    }

    #[test]
    fn test_tpkt_rejects_bad_version() {
        assert!(TpktHeader::from_bytes(&[0x02, 0x00, 0x00, 0x16]).is_err());
    }

    #[test]
    fn test_tpkt_rejects_short_length() {
        assert!(TpktHeader::from_bytes(&[0x03, 0x00, 0x00, 0x03]).is_err());
        assert!(TpktHeader::from_bytes(&[0x03, 0x00]).is_err());
    }

    #[test]
    fn test_cotp_data_header() {
        assert_eq!(cotp_data_header(), [0x02, 0xF0, 0x80]);
        assert!(check_cotp_data_header(&[0x02, 0xF0, 0x80]).is_ok());
        assert!(check_cotp_data_header(&[0x02, 0xF0, 0x00]).is_err());
        assert!(check_cotp_data_header(&[0x11, 0xD0, 0x80]).is_err());
    }

    #[test]
    fn test_s7_job_header_to_bytes() {
        let header = S7Header::job(0x0102, 14, 6);
        assert_eq!(
            header.to_bytes(),
            vec![0x32, 0x01, 0x00, 0x00, 0x01, 0x02, 0x00, 0x0E, 0x00, 0x06]
        );
    }

    #[test]
    fn test_s7_ack_header_from_bytes() {
        let bytes = [0x32, 0x03, 0x00, 0x00, 0x00, 0x07, 0x00, 0x02, 0x00, 0x01, 0x81, 0x04];
        let header = S7Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.message_type, MessageType::AckData);
        assert_eq!(header.pdu_ref, 7);
        assert_eq!(header.param_len, 2);
        assert_eq!(header.data_len, 1);
        assert_eq!(header.error_class, 0x81);
        assert_eq!(header.error_code, 0x04);
        assert!(!header.is_success());
    }

    #[test]
    fn test_s7_header_rejects_wrong_protocol() {
        let bytes = [0x33, 0x03, 0x00, 0x00, 0x00, 0x07, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00];
        assert!(S7Header::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_s7_ack_header_truncated() {
        let bytes = [0x32, 0x03, 0x00, 0x00, 0x00, 0x07, 0x00, 0x02, 0x00, 0x01];
        assert!(S7Header::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_s7_header_roundtrip() {
        let header = S7Header::job(0xBEEF, 8, 0);
        let parsed = S7Header::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }
}
