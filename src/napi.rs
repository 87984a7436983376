//! Node-API binding for the Electron control panel.
//!
//! Exposes one `WinchController` class per window. `connect` and `disconnect`
//! return promises resolved on the libuv thread pool; `setSpeed` never blocks
//! the JavaScript thread.

use std::sync::Arc;

use napi::bindgen_prelude::*;
use napi::threadsafe_function::{
    ErrorStrategy, ThreadSafeCallContext, ThreadsafeFunction, ThreadsafeFunctionCallMode,
};
use napi::JsFunction;
use napi_derive::napi;

use crate::config::{ConfigStore, ConnectionConfig, JsonLinesConfigStore};
use crate::error::WinchError;
use crate::link::WinchLink;
use crate::notify::SubscriptionId;

fn to_napi(err: WinchError) -> Error {
    Error::new(Status::GenericFailure, err.to_string())
}

fn join_error(err: tokio::task::JoinError) -> Error {
    Error::new(Status::GenericFailure, format!("background task failed: {err}"))
}

/// Connection settings as seen from JavaScript.
#[napi(object)]
pub struct JsConnectionConfig {
    /// PLC IPv4 address.
    pub ip: Option<String>,
    /// Winch output word.
    pub winch: Option<String>,
}

impl From<JsConnectionConfig> for ConnectionConfig {
    fn from(js: JsConnectionConfig) -> Self {
        Self {
            ip: js.ip,
            winch: js.winch,
        }
    }
}

impl From<ConnectionConfig> for JsConnectionConfig {
    fn from(config: ConnectionConfig) -> Self {
        Self {
            ip: config.ip,
            winch: config.winch,
        }
    }
}

/// Winch link handle exported to JavaScript.
#[napi]
pub struct WinchController {
    link: Arc<WinchLink>,
    store: JsonLinesConfigStore,
}

#[napi]
impl WinchController {
    /// Creates a controller persisting its settings at `config_path`.
    #[napi(constructor)]
    pub fn new(config_path: String) -> Self {
        Self {
            link: Arc::new(WinchLink::new()),
            store: JsonLinesConfigStore::new(config_path),
        }
    }

    /// Connects to the PLC. Rejects with the connection error message.
    #[napi]
    pub async fn connect(&self, config: JsConnectionConfig) -> Result<()> {
        let link = Arc::clone(&self.link);
        let config = ConnectionConfig::from(config);
        tokio::task::spawn_blocking(move || link.connect(&config))
            .await
            .map_err(join_error)?
            .map_err(to_napi)
    }

    /// Closes the PLC session.
    #[napi]
    pub async fn disconnect(&self) -> Result<()> {
        let link = Arc::clone(&self.link);
        tokio::task::spawn_blocking(move || link.disconnect())
            .await
            .map_err(join_error)
    }

    /// Queues a speed write.
    #[napi]
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        self.link.set_speed(speed).map_err(to_napi)
    }

    /// Queues a stop.
    #[napi]
    pub fn stop(&self) -> Result<()> {
        self.link.stop().map_err(to_napi)
    }

    /// `"disconnected"`, `"connecting"` or `"connected"`.
    #[napi]
    pub fn status(&self) -> String {
        self.link.status().to_string()
    }

    /// Registers `callback(message)` for write failures. Returns an id for
    /// `offWriteError`.
    #[napi]
    pub fn on_write_error(&self, callback: JsFunction) -> Result<i64> {
        let tsfn: ThreadsafeFunction<String, ErrorStrategy::Fatal> = callback
            .create_threadsafe_function(0, |ctx: ThreadSafeCallContext<String>| {
                ctx.env.create_string(&ctx.value).map(|s| vec![s])
            })?;
        let id = self.link.on_write_error(move |err| {
            tsfn.call(err.to_string(), ThreadsafeFunctionCallMode::NonBlocking);
        });
        i64::try_from(id.0).map_err(|e| Error::new(Status::GenericFailure, e.to_string()))
    }

    /// Removes a write-failure callback.
    #[napi]
    pub fn off_write_error(&self, id: i64) -> bool {
        u64::try_from(id)
            .map(|id| self.link.remove_write_error_handler(SubscriptionId(id)))
            .unwrap_or(false)
    }

    /// Latest stored settings, with invalid fields unset.
    #[napi]
    pub fn load_config(&self) -> Option<JsConnectionConfig> {
        self.store.load().map(JsConnectionConfig::from)
    }

    /// Validates and stores settings.
    #[napi]
    pub fn save_config(&self, config: JsConnectionConfig) -> Result<()> {
        self.store
            .save(&ConnectionConfig::from(config))
            .map_err(to_napi)
    }
}

/// Checks an IPv4 literal.
#[napi]
pub fn validate_ip(ip: String) -> bool {
    crate::validate::validate_ip(&ip)
}

/// Checks a winch output word name.
#[napi]
pub fn validate_mem_address(address: String) -> bool {
    crate::validate::validate_mem_address(&address)
}
