//! Facade called by the control panel.
//!
//! [`WinchLink`] owns the one [`SessionManager`] of the application and turns
//! user actions into session operations: it validates settings before any
//! network I/O, converts speeds into register values and forwards write
//! failures to the UI's handlers.
//!
//! # Example
//!
//! ```no_run
//! use winch_link::{ConnectionConfig, WinchLink};
//!
//! let link = WinchLink::new();
//! link.on_write_error(|err| eprintln!("{err}"));
//!
//! link.connect(&ConnectionConfig::new("192.168.0.1", "QW4"))?;
//! link.set_speed(1.0)?; // writes 20601 to QW4
//! link.stop()?;
//! link.disconnect();
//! # Ok::<(), winch_link::WinchError>(())
//! ```

use log::debug;

use crate::config::ConnectionConfig;
use crate::error::{Result, WinchError};
use crate::notify::SubscriptionId;
use crate::scaling::SpeedScale;
use crate::session::{SessionManager, SessionSettings, SessionState};
use crate::tag::WINCH_TAG;

/// Single-winch link between the UI and the PLC.
#[derive(Debug)]
pub struct WinchLink {
    session: SessionManager,
    scale: SpeedScale,
}

impl Default for WinchLink {
    fn default() -> Self {
        Self::new()
    }
}

impl WinchLink {
    /// Creates a link with default transport settings and speed scale.
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default(), SpeedScale::default())
    }

    /// Creates a link with custom transport settings and speed scale.
    pub fn with_settings(settings: SessionSettings, scale: SpeedScale) -> Self {
        Self {
            session: SessionManager::new(settings),
            scale,
        }
    }

    /// Connects to the PLC described by `config`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if a field is unset or malformed; nothing is sent
    /// - `ConnectInProgress` if another connect has not returned yet
    /// - `Connection` if the PLC cannot be reached or refuses the session
    pub fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        let target = config.validate()?;
        self.session.connect(&target)
    }

    /// Closes the PLC session. Never fails.
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Sends a new winch speed.
    ///
    /// The speed is clamped to the configured range and converted to the
    /// output register value. The write itself happens in the background;
    /// failures reach the [`on_write_error`](Self::on_write_error) handlers.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if no session is established.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        let value = self.scale.to_output(speed);
        debug!("Speed {speed} -> output {value}");
        self.session.write_tag(WINCH_TAG, value)
    }

    /// Sends speed zero.
    pub fn stop(&self) -> Result<()> {
        self.set_speed(0.0)
    }

    /// Subscribes to asynchronous write failures.
    ///
    /// Handlers run on the session's I/O thread.
    pub fn on_write_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WinchError) + Send + Sync + 'static,
    {
        self.session.on_write_error(handler)
    }

    /// Removes a handler registered with [`on_write_error`](Self::on_write_error).
    pub fn remove_write_error_handler(&self, id: SubscriptionId) -> bool {
        self.session.remove_write_error_handler(id)
    }

    /// Current session state.
    pub fn status(&self) -> SessionState {
        self.session.state()
    }

    /// True while a session is established.
    pub fn is_connected(&self) -> bool {
        self.status() == SessionState::Connected
    }

    /// Speed scale applied by [`set_speed`](Self::set_speed).
    pub fn scale(&self) -> SpeedScale {
        self.scale
    }

    /// Underlying session manager.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}
