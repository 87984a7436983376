//! S7 request telegrams.
//!
//! The link only ever sends three kinds of telegram:
//!
//! - [`ConnectionRequest`] - COTP CR opening the ISO transport connection
//! - [`SetupCommunicationCommand`] - S7 job negotiating the PDU size
//! - [`WriteWordCommand`] - S7 write-var job carrying one 16-bit word
//!
//! Each command serializes itself into a complete telegram, TPKT header
//! included, ready to be handed to the transport.
//!
//! # Example
//!
//! ```
//! use winch_link::{S7Address, WriteWordCommand};
//!
//! let cmd = WriteWordCommand::new(0x0001, S7Address::output_word(4), 20601);
//! let bytes = cmd.to_bytes();
//! assert_eq!(bytes.len(), 37);
//! ```

use crate::address::S7Address;
use crate::header::{
    cotp_data_header, S7Header, TpktHeader, COTP_CONNECTION_REQUEST, TPKT_HEADER_SIZE,
};

/// PDU size requested during setup-communication.
pub const REQUESTED_PDU_LENGTH: u16 = 480;

/// Local TSAP presented by the link.
pub const LOCAL_TSAP: u16 = 0x0100;

pub(crate) const FN_SETUP_COMMUNICATION: u8 = 0xF0;
pub(crate) const FN_WRITE_VAR: u8 = 0x05;

const CONNECTION_REQUEST_LEN: usize = 22;
const SETUP_PARAM_LEN: u16 = 8;
const WRITE_PARAM_LEN: u16 = 14;
const WRITE_DATA_LEN: u16 = 6;

const VAR_SPEC: u8 = 0x12;
const VAR_SPEC_LEN: u8 = 0x0A;
const SYNTAX_ID_S7ANY: u8 = 0x10;
const TRANSPORT_SIZE_WORD: u8 = 0x04;
const DATA_TRANSPORT_BYTE: u8 = 0x04;

/// Role the link presents to the CPU when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionType {
    /// Programming device.
    #[default]
    Pg,
    /// Operator panel.
    Op,
    /// Generic S7 basic connection.
    Basic,
}

impl ConnectionType {
    fn code(self) -> u16 {
        match self {
            ConnectionType::Pg => 0x01,
            ConnectionType::Op => 0x02,
            ConnectionType::Basic => 0x03,
        }
    }
}

/// Computes the remote TSAP addressing the CPU in `rack`/`slot`.
///
/// # Example
///
/// ```
/// use winch_link::{remote_tsap, ConnectionType};
///
/// // S7-300 CPU in rack 0, slot 2
/// assert_eq!(remote_tsap(ConnectionType::Pg, 0, 2), 0x0102);
/// ```
pub fn remote_tsap(connection_type: ConnectionType, rack: u8, slot: u8) -> u16 {
    (connection_type.code() << 8) | (u16::from(rack) * 0x20 + u16::from(slot))
}

fn frame(pdu: Vec<u8>) -> Vec<u8> {
    let length = (TPKT_HEADER_SIZE + pdu.len()) as u16;
    let mut bytes = Vec::with_capacity(usize::from(length));
    bytes.extend_from_slice(&TpktHeader::new(length).to_bytes());
    bytes.extend(pdu);
    bytes
}

/// COTP connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// TSAP of the link.
    pub local_tsap: u16,
    /// TSAP of the CPU.
    pub remote_tsap: u16,
}

impl ConnectionRequest {
    /// Creates a connection request between the given TSAPs.
    pub fn new(local_tsap: u16, remote_tsap: u16) -> Self {
        Self {
            local_tsap,
            remote_tsap,
        }
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let [lt_hi, lt_lo] = self.local_tsap.to_be_bytes();
        let [rt_hi, rt_lo] = self.remote_tsap.to_be_bytes();
        let cotp = vec![
            (CONNECTION_REQUEST_LEN - TPKT_HEADER_SIZE - 1) as u8,
            COTP_CONNECTION_REQUEST,
            0x00,
            0x00, // destination reference
            0x00,
            0x01, // source reference
            0x00, // class 0
            0xC0,
            0x01,
            0x0A, // TPDU size 1024
            0xC1,
            0x02,
            lt_hi,
            lt_lo,
            0xC2,
            0x02,
            rt_hi,
            rt_lo,
        ];
        frame(cotp)
    }
}

/// S7 setup-communication job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunicationCommand {
    pdu_ref: u16,
    max_amq_calling: u16,
    max_amq_called: u16,
    pdu_length: u16,
}

impl SetupCommunicationCommand {
    /// Creates a setup job requesting `pdu_length` and a single outstanding job
    /// in each direction.
    pub fn new(pdu_ref: u16, pdu_length: u16) -> Self {
        Self {
            pdu_ref,
            max_amq_calling: 1,
            max_amq_called: 1,
            pdu_length,
        }
    }

    /// Returns the PDU reference of this job.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Serializes the job.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pdu = cotp_data_header().to_vec();
        pdu.extend(S7Header::job(self.pdu_ref, SETUP_PARAM_LEN, 0).to_bytes());
        pdu.push(FN_SETUP_COMMUNICATION);
        pdu.push(0x00);
        pdu.extend_from_slice(&self.max_amq_calling.to_be_bytes());
        pdu.extend_from_slice(&self.max_amq_called.to_be_bytes());
        pdu.extend_from_slice(&self.pdu_length.to_be_bytes());
        frame(pdu)
    }
}

/// S7 write-var job writing one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWordCommand {
    pdu_ref: u16,
    address: S7Address,
    value: u16,
}

impl WriteWordCommand {
    /// Creates a job writing `value` to `address`.
    pub fn new(pdu_ref: u16, address: S7Address, value: u16) -> Self {
        Self {
            pdu_ref,
            address,
            value,
        }
    }

    /// Returns the PDU reference of this job.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Serializes the job.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pdu = cotp_data_header().to_vec();
        pdu.extend(S7Header::job(self.pdu_ref, WRITE_PARAM_LEN, WRITE_DATA_LEN).to_bytes());

        // Parameter: one item, S7ANY pointer to a single WORD
        pdu.push(FN_WRITE_VAR);
        pdu.push(0x01);
        pdu.extend_from_slice(&[VAR_SPEC, VAR_SPEC_LEN, SYNTAX_ID_S7ANY, TRANSPORT_SIZE_WORD]);
        pdu.extend_from_slice(&1u16.to_be_bytes());
        pdu.extend_from_slice(&self.address.db_number.to_be_bytes());
        pdu.push(self.address.area.code());
        pdu.extend_from_slice(&self.address.bit_offset().to_be_bytes()[1..]);

        // Data: return code, transport size, length in bits, value
        pdu.push(0x00);
        pdu.push(DATA_TRANSPORT_BYTE);
        pdu.extend_from_slice(&16u16.to_be_bytes());
        pdu.extend_from_slice(&self.value.to_be_bytes());
        frame(pdu)
    }
}
