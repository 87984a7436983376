//! # Winch Link
//!
//! Drives the speed of a PLC-controlled winch from a control panel, over
//! Siemens S7 communication (ISO-on-TCP, port 102).
//!
//! The panel sets a speed; the link maps it onto the PLC's analog output word
//! and writes it in the background. Transport failures do not interrupt the
//! caller. They are published to subscribed handlers and the session drops
//! back to disconnected until the user reconnects.
//!
//! ## Features
//!
//! - **Single session**: at most one PLC connection, serialized connects
//! - **Fire-and-forget writes**: `set_speed` never blocks on the network, last write wins
//! - **Validated settings**: IP and output word checked before any I/O
//! - **No panics**: all errors returned as `Result<T, WinchError>`
//! - **Persisted settings**: JSON-lines config store
//! - **Node-API binding** behind the `napi` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use winch_link::{ConnectionConfig, WinchLink};
//!
//! fn main() -> winch_link::Result<()> {
//!     let link = WinchLink::new();
//!     link.on_write_error(|err| eprintln!("{err}"));
//!
//!     link.connect(&ConnectionConfig::new("192.168.0.1", "QW4"))?;
//!
//!     // -2.0 (full pay-out) ..= 2.0 (full haul-in)
//!     link.set_speed(1.0)?;
//!     link.stop()?;
//!
//!     link.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Speed Mapping
//!
//! | Speed | Output word |
//! |------:|------------:|
//! | -2.0 | 0 |
//! | -1.0 | 6867 |
//! | 0.0 | 13734 |
//! | 1.0 | 20601 |
//! | 2.0 | 27468 |
//!
//! Values outside the range are clamped; NaN maps to 0.
//!
//! ```
//! use winch_link::{map_speed, SpeedScale};
//!
//! assert_eq!(map_speed(100.0, 2.0, 27468), 27468);
//! assert_eq!(SpeedScale::new(1.0, 1000).to_output(0.5), 750);
//! ```
//!
//! ## Session States
//!
//! ```no_run
//! use winch_link::{ConnectionConfig, SessionState, WinchLink};
//!
//! let link = WinchLink::new();
//! assert_eq!(link.status(), SessionState::Disconnected);
//!
//! if link.connect(&ConnectionConfig::new("192.168.0.1", "QW4")).is_ok() {
//!     assert_eq!(link.status(), SessionState::Connected);
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use winch_link::{ConnectionConfig, WinchError, WinchLink};
//!
//! let link = WinchLink::new();
//! match link.connect(&ConnectionConfig::new("192.168.0.1", "QW4")) {
//!     Ok(()) => println!("connected"),
//!     Err(WinchError::InvalidConfig { field, reason }) => {
//!         println!("fix {field}: {reason}");
//!     }
//!     Err(WinchError::Connection { target, reason }) => {
//!         println!("{target} unreachable: {reason}");
//!     }
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use winch_link::{ConnectionType, SessionSettings, SpeedScale, WinchLink};
//! use std::time::Duration;
//!
//! let settings = SessionSettings::default()
//!     .with_connect_timeout(Duration::from_secs(3)) // default: 5s
//!     .with_timeout(Duration::from_secs(1))         // default: 2s
//!     .with_rack_slot(0, 1)                         // S7-1200/1500
//!     .with_connection_type(ConnectionType::Op);
//!
//! let link = WinchLink::with_settings(settings, SpeedScale::default());
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod address;
mod client;
mod command;
mod config;
mod error;
mod header;
mod link;
#[cfg(feature = "napi")]
mod napi;
mod notify;
mod response;
mod scaling;
mod session;
mod tag;
mod transport;
mod validate;

// Public re-exports
pub use address::{MemoryArea, S7Address};
pub use client::{Client, ClientConfig, DEFAULT_RACK, DEFAULT_SLOT};
pub use command::{
    remote_tsap, ConnectionRequest, ConnectionType, SetupCommunicationCommand, WriteWordCommand,
    LOCAL_TSAP, REQUESTED_PDU_LENGTH,
};
pub use config::{ConfigStore, ConnectionConfig, JsonLinesConfigStore, PlcTarget};
pub use error::{Result, WinchError};
pub use header::{
    MessageType, S7Header, TpktHeader, COTP_DATA_HEADER_SIZE, ISO_HEADER_SIZE,
    S7_ACK_HEADER_SIZE, S7_JOB_HEADER_SIZE, TPKT_HEADER_SIZE,
};
pub use link::WinchLink;
pub use notify::{SubscriptionId, WriteErrorNotifier};
pub use response::{
    check_connection_confirm, S7Response, ITEM_INVALID_ADDRESS, ITEM_NOT_FOUND, ITEM_SUCCESS,
};
pub use scaling::{map_speed, SpeedScale, DEFAULT_MAX_OUT, DEFAULT_SPEED_RANGE};
pub use session::{SessionManager, SessionSettings, SessionState};
pub use tag::{TagTable, WINCH_TAG};
pub use transport::{TcpTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_S7_PORT, DEFAULT_TIMEOUT};
pub use validate::{validate_ip, validate_mem_address};
