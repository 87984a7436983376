//! TCP transport layer for S7 communication.
//!
//! This module provides the [`TcpTransport`] struct which handles the socket
//! side of ISO-on-TCP: connecting with a bounded timeout, sending telegrams
//! and reading back exactly one TPKT-framed telegram per request. It knows
//! about TPKT lengths and nothing about S7.
//!
//! # Constants
//!
//! - [`DEFAULT_S7_PORT`] - ISO-on-TCP port (102)
//! - [`DEFAULT_CONNECT_TIMEOUT`] - TCP connect timeout (5 seconds)
//! - [`DEFAULT_TIMEOUT`] - read/write timeout (2 seconds)
//!
//! # Example
//!
//! ```no_run
//! use winch_link::TcpTransport;
//! use std::time::Duration;
//!
//! let mut transport = TcpTransport::connect(
//!     "192.168.0.1:102".parse().unwrap(),
//!     Duration::from_secs(5),
//!     Duration::from_secs(2),
//! ).unwrap();
//!
//! let request = vec![0x03, 0x00, 0x00, 0x16, /* ... COTP CR */];
//! let response = transport.send_receive(&request);
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Result, WinchError};
use crate::header::{TpktHeader, TPKT_HEADER_SIZE};

/// ISO-on-TCP port used by S7 PLCs.
pub const DEFAULT_S7_PORT: u16 = 102;

/// Default timeout for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for socket reads and writes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP transport for S7 communication.
///
/// Handles blocking request/response exchanges over one connected socket.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpTransport {
    /// Connects to `plc_addr`.
    ///
    /// # Arguments
    ///
    /// * `plc_addr` - Socket address of the PLC (IP:port)
    /// * `connect_timeout` - Upper bound for the TCP handshake
    /// * `timeout` - Read/write timeout for subsequent exchanges
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the handshake does not finish in time and `Io`
    /// for refused or unreachable targets.
    pub fn connect(
        plc_addr: SocketAddr,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&plc_addr, connect_timeout).map_err(map_io)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            remote_addr: plc_addr,
        })
    }

    /// Sends a telegram and receives the response telegram.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The send fails
    /// - The receive times out (`WinchError::Timeout`)
    /// - The PLC closes the connection (`WinchError::ConnectionClosed`)
    /// - The response does not start with a valid TPKT header
    pub fn send_receive(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.stream.write_all(data).map_err(map_io)?;
        self.receive()
    }

    /// Reads one complete TPKT-framed telegram.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let mut head = [0u8; TPKT_HEADER_SIZE];
        self.stream.read_exact(&mut head).map_err(map_io)?;
        let tpkt = TpktHeader::from_bytes(&head)?;

        let mut telegram = vec![0u8; usize::from(tpkt.length)];
        telegram[..TPKT_HEADER_SIZE].copy_from_slice(&head);
        self.stream
            .read_exact(&mut telegram[TPKT_HEADER_SIZE..])
            .map_err(map_io)?;
        Ok(telegram)
    }

    /// Shuts the socket down in both directions, ignoring errors.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Returns the remote PLC address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

fn map_io(e: io::Error) -> WinchError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => WinchError::Timeout,
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => WinchError::ConnectionClosed,
        _ => WinchError::Io(e),
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}
