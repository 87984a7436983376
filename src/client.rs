//! Synchronous S7 client.
//!
//! This module provides the [`Client`] struct, which speaks just enough of
//! the S7 protocol to drive an output word:
//! - ISO transport connection (COTP CR/CC) with rack/slot addressing
//! - PDU size negotiation (setup-communication)
//! - Single-word write-var jobs with PDU reference checking
//!
//! Each operation produces exactly 1 request and 1 response. No retries,
//! no reconnection; the [`SessionManager`](crate::SessionManager) decides
//! what to do when an exchange fails.
//!
//! # Example
//!
//! ```no_run
//! use winch_link::{Client, ClientConfig, S7Address};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 1));
//! let mut client = Client::connect(&config)?;
//!
//! client.write_word(S7Address::output_word(4), 13734)?;
//! client.disconnect();
//! # Ok::<(), winch_link::WinchError>(())
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::debug;

use crate::address::S7Address;
use crate::command::{
    remote_tsap, ConnectionRequest, ConnectionType, SetupCommunicationCommand, WriteWordCommand,
    LOCAL_TSAP, REQUESTED_PDU_LENGTH,
};
use crate::error::{Result, WinchError};
use crate::response::{check_connection_confirm, S7Response};
use crate::transport::{TcpTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_S7_PORT, DEFAULT_TIMEOUT};

/// Default rack of the CPU.
pub const DEFAULT_RACK: u8 = 0;
/// Default slot of the CPU (S7-300 layout).
pub const DEFAULT_SLOT: u8 = 2;

/// Configuration for connecting an S7 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// PLC socket address.
    pub plc_addr: SocketAddr,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout for each exchange.
    pub timeout: Duration,
    /// Role presented to the CPU.
    pub connection_type: ConnectionType,
    /// CPU rack.
    pub rack: u8,
    /// CPU slot.
    pub slot: u8,
}

impl ClientConfig {
    /// Creates a configuration for the PLC at `plc_ip` with default port,
    /// timeouts, and rack 0 / slot 2.
    ///
    /// # Example
    ///
    /// ```
    /// use winch_link::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 1));
    /// assert_eq!(config.plc_addr.port(), 102);
    /// ```
    pub fn new(plc_ip: Ipv4Addr) -> Self {
        Self {
            plc_addr: SocketAddr::from((plc_ip, DEFAULT_S7_PORT)),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            connection_type: ConnectionType::default(),
            rack: DEFAULT_RACK,
            slot: DEFAULT_SLOT,
        }
    }

    /// Sets a custom PLC port (default is 102).
    pub fn with_port(mut self, port: u16) -> Self {
        self.plc_addr.set_port(port);
        self
    }

    /// Sets the TCP connect timeout (default is 5 seconds).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read/write timeout (default is 2 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the CPU rack and slot.
    ///
    /// # Example
    ///
    /// ```
    /// use winch_link::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// // S7-1200/1500 CPUs sit in rack 0, slot 1
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 0, 1))
    ///     .with_rack_slot(0, 1);
    /// ```
    pub fn with_rack_slot(mut self, rack: u8, slot: u8) -> Self {
        self.rack = rack;
        self.slot = slot;
        self
    }

    /// Sets the connection type (default is PG).
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Remote TSAP derived from connection type, rack and slot.
    pub fn remote_tsap(&self) -> u16 {
        remote_tsap(self.connection_type, self.rack, self.slot)
    }
}

/// S7 client owning one ISO-on-TCP connection.
pub struct Client {
    transport: TcpTransport,
    pdu_length: u16,
    pdu_ref: u16,
}

impl Client {
    /// Connects to the PLC and negotiates the PDU size.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the TCP connection fails, and
    /// `InvalidResponse`/`PlcError` if the CPU rejects the ISO connection or
    /// the setup-communication job.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let mut transport =
            TcpTransport::connect(config.plc_addr, config.connect_timeout, config.timeout)?;

        let request = ConnectionRequest::new(LOCAL_TSAP, config.remote_tsap());
        let confirm = transport.send_receive(&request.to_bytes())?;
        check_connection_confirm(&confirm)?;
        debug!(
            "ISO connection to {} confirmed (remote TSAP 0x{:04X})",
            config.plc_addr,
            config.remote_tsap()
        );

        let mut client = Self {
            transport,
            pdu_length: 0,
            pdu_ref: 0,
        };
        let pdu_ref = client.next_pdu_ref();
        let setup = SetupCommunicationCommand::new(pdu_ref, REQUESTED_PDU_LENGTH);
        let response = client.exchange(&setup.to_bytes(), pdu_ref)?;
        client.pdu_length = response.negotiated_pdu_length()?;
        debug!(
            "S7 session with {} negotiated PDU length {}",
            config.plc_addr, client.pdu_length
        );

        Ok(client)
    }

    fn next_pdu_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    /// Sends a job and returns its ack, checking the PDU reference.
    fn exchange(&mut self, data: &[u8], expected_ref: u16) -> Result<S7Response> {
        let bytes = self.transport.send_receive(data)?;
        let response = S7Response::from_bytes(&bytes)?;
        if response.header.pdu_ref != expected_ref {
            return Err(WinchError::pdu_ref_mismatch(
                expected_ref,
                response.header.pdu_ref,
            ));
        }
        Ok(response)
    }

    /// Writes one word to PLC memory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Communication fails or times out
    /// - The ack is malformed or echoes a different PDU reference
    /// - The PLC rejects the item (`PlcError`)
    pub fn write_word(&mut self, address: S7Address, value: u16) -> Result<()> {
        let pdu_ref = self.next_pdu_ref();
        let cmd = WriteWordCommand::new(pdu_ref, address, value);

        let response = self.exchange(&cmd.to_bytes(), pdu_ref)?;
        response.check_write_ack()
    }

    /// Closes the connection.
    pub fn disconnect(self) {
        self.transport.shutdown();
    }

    /// PDU length granted by the PLC.
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    /// Returns the remote PLC address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.transport.remote_addr()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("pdu_length", &self.pdu_length)
            .finish()
    }
}
