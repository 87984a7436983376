//! Connection settings and their persistence.
//!
//! The control panel keeps the last entered PLC address and winch output in a
//! file holding one newline-terminated JSON record. Every save replaces the
//! file. Files with several records are still read, and the last readable
//! one wins.
//!
//! ```text
//! {"ip":"192.168.0.1","winch":"QW4"}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use winch_link::{ConfigStore, ConnectionConfig, JsonLinesConfigStore};
//!
//! let store = JsonLinesConfigStore::new("config.json");
//! store.save(&ConnectionConfig::new("192.168.0.1", "QW4"))?;
//!
//! let config = store.load().unwrap_or_default();
//! assert!(config.is_complete());
//! # Ok::<(), winch_link::WinchError>(())
//! ```

use std::fs;
use std::io;
use std::net::{AddrParseError, Ipv4Addr};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::address::S7Address;
use crate::error::{Result, WinchError};
use crate::validate::{validate_ip, validate_mem_address};

/// PLC address and winch output word as entered by the user.
///
/// Either field may be unset. A config can only be used to connect once both
/// fields are set and valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// IPv4 address of the PLC, dotted-quad.
    pub ip: Option<String>,
    /// Output word driving the winch, e.g. `QW4`.
    pub winch: Option<String>,
}

impl ConnectionConfig {
    /// Creates a config with both fields set.
    pub fn new(ip: impl Into<String>, winch: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            winch: Some(winch.into()),
        }
    }

    /// Returns the config with every invalid field replaced by `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use winch_link::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::new("300.0.0.1", "QW4").sanitized();
    /// assert_eq!(config.ip, None);
    /// assert_eq!(config.winch.as_deref(), Some("QW4"));
    /// ```
    pub fn sanitized(self) -> Self {
        Self {
            ip: self.ip.filter(|ip| validate_ip(ip)),
            winch: self.winch.filter(|winch| validate_mem_address(winch)),
        }
    }

    /// True if both fields are set and valid.
    pub fn is_complete(&self) -> bool {
        matches!(&self.ip, Some(ip) if validate_ip(ip))
            && matches!(&self.winch, Some(winch) if validate_mem_address(winch))
    }

    /// Checks both fields and resolves them into a connect target.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a field is unset ("connection settings not
    /// defined") or fails validation.
    pub fn validate(&self) -> Result<PlcTarget> {
        let (Some(ip), Some(winch)) = (&self.ip, &self.winch) else {
            let field = if self.ip.is_none() { "ip" } else { "winch" };
            return Err(WinchError::invalid_config(
                field,
                "connection settings not defined",
            ));
        };

        if !validate_ip(ip) {
            return Err(WinchError::invalid_config(
                "ip",
                format!("'{ip}' is not a valid IPv4 address"),
            ));
        }
        let ip: Ipv4Addr = ip
            .parse()
            .map_err(|e: AddrParseError| WinchError::invalid_config("ip", e.to_string()))?;

        Ok(PlcTarget {
            ip,
            winch: winch.parse()?,
        })
    }
}

/// Validated connection target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlcTarget {
    /// PLC address.
    pub ip: Ipv4Addr,
    /// Word written with the winch speed.
    pub winch: S7Address,
}

/// Storage of the last used connection settings.
pub trait ConfigStore {
    /// Returns the latest stored config, or `None` if nothing usable is stored.
    ///
    /// Invalid fields of the stored record come back as `None`.
    fn load(&self) -> Option<ConnectionConfig>;

    /// Stores `config` as the latest record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if either field is unset or invalid, and
    /// `Persistence` if the record cannot be written.
    fn save(&self, config: &ConnectionConfig) -> Result<()>;
}

/// File-backed [`ConfigStore`] holding one JSON record per line.
#[derive(Debug, Clone)]
pub struct JsonLinesConfigStore {
    path: PathBuf,
}

impl JsonLinesConfigStore {
    /// Creates a store backed by the file at `path`. The file is created on
    /// the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, reason: impl std::fmt::Display) -> WinchError {
        WinchError::persistence(self.path.display().to_string(), reason)
    }
}

impl ConfigStore for JsonLinesConfigStore {
    fn load(&self) -> Option<ConnectionConfig> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No stored settings at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read settings from {}: {}", self.path.display(), e);
                return None;
            }
        };

        let mut skipped = 0;
        for line in contents.lines().rev().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<ConnectionConfig>(line) {
                Ok(config) => {
                    if skipped > 0 {
                        warn!(
                            "Skipped {} unreadable settings record(s) in {}",
                            skipped,
                            self.path.display()
                        );
                    }
                    return Some(config.sanitized());
                }
                Err(e) => {
                    debug!("Unreadable settings record: {e}");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("No readable settings record in {}", self.path.display());
        }
        None
    }

    fn save(&self, config: &ConnectionConfig) -> Result<()> {
        config.validate()?;

        let mut line = serde_json::to_string(config).map_err(|e| self.persistence_error(e))?;
        line.push('\n');

        fs::write(&self.path, line).map_err(|e| self.persistence_error(e))?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
