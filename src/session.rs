//! Lifecycle of the single PLC session.
//!
//! The [`SessionManager`] owns at most one S7 connection and moves through
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +-------- error ---------+                  |
//!      +------ disconnect / transport failure -----+
//! ```
//!
//! `connect` and `disconnect` block until the transport has confirmed. Once
//! connected, the socket belongs to a dedicated I/O thread; [`write_tag`]
//! only queues a job for it and returns. The I/O thread always writes the
//! newest queued value and drops older ones. When a write fails on the
//! transport, the session falls back to `Disconnected` and the failure is
//! published once through the [`WriteErrorNotifier`].
//!
//! Disconnecting during a pending connect waits until that attempt has given
//! up its socket; a connect issued meanwhile fails with `ConnectInProgress`.
//!
//! Every established session gets a fresh generation number. Failures
//! raised by an I/O thread whose generation is no longer current (because
//! the UI disconnected or reconnected meanwhile) are logged and dropped.
//!
//! [`write_tag`]: SessionManager::write_tag

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::address::S7Address;
use crate::client::{Client, ClientConfig, DEFAULT_RACK, DEFAULT_SLOT};
use crate::command::ConnectionType;
use crate::config::PlcTarget;
use crate::error::{Result, WinchError};
use crate::notify::{SubscriptionId, WriteErrorNotifier};
use crate::tag::{TagTable, WINCH_TAG};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_S7_PORT, DEFAULT_TIMEOUT};

/// Observable state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// A connect call is waiting for the PLC.
    Connecting,
    /// Handshake completed, writes are accepted.
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}

/// Transport parameters shared by every connection the session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// TCP port of the PLC.
    pub port: u16,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout of each exchange.
    pub timeout: Duration,
    /// Role presented to the CPU.
    pub connection_type: ConnectionType,
    /// CPU rack.
    pub rack: u8,
    /// CPU slot.
    pub slot: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_S7_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            connection_type: ConnectionType::default(),
            rack: DEFAULT_RACK,
            slot: DEFAULT_SLOT,
        }
    }
}

impl SessionSettings {
    /// Sets a custom PLC port (default is 102).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
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

    /// Sets the CPU rack and slot (default is 0/2).
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

    /// Builds the client configuration for the PLC at `ip`.
    pub fn client_config(&self, ip: Ipv4Addr) -> ClientConfig {
        ClientConfig::new(ip)
            .with_port(self.port)
            .with_connect_timeout(self.connect_timeout)
            .with_timeout(self.timeout)
            .with_connection_type(self.connection_type)
            .with_rack_slot(self.rack, self.slot)
    }
}

#[derive(Debug, Clone, Copy)]
struct WriteJob {
    address: S7Address,
    value: u16,
}

enum IoCommand {
    Write(WriteJob),
    Close,
}

struct ActiveSession {
    generation: u64,
    target: SocketAddr,
    tags: TagTable,
    jobs: Sender<IoCommand>,
    worker: JoinHandle<()>,
}

impl ActiveSession {
    /// Stops the I/O thread and waits until it has closed the socket.
    fn shutdown(self) {
        let _ = self.jobs.send(IoCommand::Close);
        drop(self.jobs);
        if self.worker.thread().id() == thread::current().id() {
            // Called from a notification handler; the loop exits on Close.
            return;
        }
        if self.worker.join().is_err() {
            warn!("I/O thread for {} panicked", self.target);
        }
    }
}

enum Slot {
    Disconnected,
    Connecting(u64),
    /// A disconnect is waiting for the pending attempt to close its socket.
    Cancelling(u64),
    Connected(ActiveSession),
}

struct Inner {
    slot: Mutex<Slot>,
    /// Signalled when a cancelled attempt has settled.
    settled: Condvar,
    notifier: WriteErrorNotifier,
    generation: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tears down the session of `generation` after a transport failure and
    /// publishes `error`, unless that session is already gone.
    fn fail(&self, generation: u64, error: WinchError) {
        let failed = {
            let mut slot = self.lock();
            let current =
                matches!(&*slot, Slot::Connected(active) if active.generation == generation);
            if current {
                match std::mem::replace(&mut *slot, Slot::Disconnected) {
                    Slot::Connected(active) => Some(active),
                    _ => None,
                }
            } else {
                None
            }
        };

        match failed {
            Some(active) => {
                warn!("Session with {} dropped: {}", active.target, error);
                // Detach: this runs on the session's own I/O thread.
                drop(active);
                self.notifier.notify(&error);
            }
            None => debug!("Ignoring failure of stale session {generation}: {error}"),
        }
    }

    /// Ends the pending attempt of `generation` without a session and wakes
    /// a disconnect waiting on it.
    fn abandon_attempt(&self, slot: &mut MutexGuard<'_, Slot>, generation: u64) {
        let cancelled = matches!(**slot, Slot::Cancelling(g) if g == generation);
        if cancelled || matches!(**slot, Slot::Connecting(g) if g == generation) {
            **slot = Slot::Disconnected;
        }
        if cancelled {
            self.settled.notify_all();
        }
    }
}

fn io_loop(mut client: Client, jobs: Receiver<IoCommand>, inner: Arc<Inner>, generation: u64) {
    'run: while let Ok(command) = jobs.recv() {
        let mut job = match command {
            IoCommand::Write(job) => job,
            IoCommand::Close => break,
        };
        // Last write wins: skip values superseded while the previous write ran.
        for newer in jobs.try_iter() {
            match newer {
                IoCommand::Write(newer) => job = newer,
                IoCommand::Close => break 'run,
            }
        }

        debug!("Writing {} to {}", job.value, job.address);
        match client.write_word(job.address, job.value) {
            Ok(()) => {}
            Err(e) if e.is_transport_failure() => {
                client.disconnect();
                inner.fail(generation, WinchError::write(job.address.to_string(), e));
                return;
            }
            Err(e) => {
                warn!("PLC rejected write of {} to {}: {}", job.value, job.address, e);
                inner
                    .notifier
                    .notify(&WinchError::write_rejected(job.address.to_string(), e));
            }
        }
    }
    client.disconnect();
    debug!("I/O thread of session {generation} finished");
}

/// Owner of the single PLC connection.
///
/// # Example
///
/// ```no_run
/// use winch_link::{ConnectionConfig, SessionManager, SessionSettings, WINCH_TAG};
///
/// let session = SessionManager::new(SessionSettings::default());
/// session.on_write_error(|err| eprintln!("{err}"));
///
/// let target = ConnectionConfig::new("192.168.0.1", "QW4").validate()?;
/// session.connect(&target)?;
/// session.write_tag(WINCH_TAG, 13734)?;
/// session.disconnect();
/// # Ok::<(), winch_link::WinchError>(())
/// ```
pub struct SessionManager {
    settings: SessionSettings,
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Creates a disconnected session manager.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::Disconnected),
                settled: Condvar::new(),
                notifier: WriteErrorNotifier::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Opens a session to `target` and installs the winch tag translation.
    ///
    /// An existing session is closed first; the translation table is always
    /// rebuilt from `target`.
    ///
    /// # Errors
    ///
    /// - `ConnectInProgress` if another connect call has not returned yet, or
    ///   a disconnect is still cancelling one
    /// - `Connection` if the TCP connection or the S7 handshake fails, or if
    ///   `disconnect` was called before the handshake finished
    pub fn connect(&self, target: &PlcTarget) -> Result<()> {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = {
            let mut slot = self.inner.lock();
            if matches!(*slot, Slot::Connecting(_) | Slot::Cancelling(_)) {
                return Err(WinchError::ConnectInProgress);
            }
            std::mem::replace(&mut *slot, Slot::Connecting(generation))
        };
        if let Slot::Connected(active) = previous {
            info!("Closing session with {} before reconnecting", active.target);
            active.shutdown();
        }

        let config = self.settings.client_config(target.ip);
        let target_name = config.plc_addr.to_string();
        info!("Connecting to PLC at {target_name}");

        let client = match Client::connect(&config) {
            Ok(client) => client,
            Err(e) => {
                let mut slot = self.inner.lock();
                self.inner.abandon_attempt(&mut slot, generation);
                warn!("Connection to {target_name} failed: {e}");
                return Err(WinchError::connection(target_name, e));
            }
        };

        let mut slot = self.inner.lock();
        if !matches!(*slot, Slot::Connecting(g) if g == generation) {
            client.disconnect();
            self.inner.abandon_attempt(&mut slot, generation);
            return Err(WinchError::connection(
                target_name,
                "connection attempt cancelled",
            ));
        }

        let (jobs, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("winch-link-io".to_string())
            .spawn(move || io_loop(client, rx, inner, generation));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                *slot = Slot::Disconnected;
                return Err(WinchError::connection(target_name, e));
            }
        };

        let tags = TagTable::new(WINCH_TAG, target.winch);
        info!(
            "Connected to PLC at {}, {} -> {}",
            target_name,
            tags.tag(),
            tags.address()
        );
        *slot = Slot::Connected(ActiveSession {
            generation,
            target: config.plc_addr,
            tags,
            jobs,
            worker,
        });
        Ok(())
    }

    /// Closes the session. Idempotent; never fails.
    ///
    /// Waits for an in-flight write to finish or time out. Calling this
    /// while a connect is pending makes that connect fail, and returns once
    /// the attempt has closed its socket.
    pub fn disconnect(&self) {
        let mut slot = self.inner.lock();
        let previous = std::mem::replace(&mut *slot, Slot::Disconnected);
        match previous {
            Slot::Connected(active) => {
                drop(slot);
                let target = active.target;
                active.shutdown();
                info!("Disconnected from PLC at {target}");
            }
            Slot::Connecting(generation) | Slot::Cancelling(generation) => {
                *slot = Slot::Cancelling(generation);
                info!("Cancelling pending connection attempt");
                let _settled = self
                    .inner
                    .settled
                    .wait_while(slot, |s| matches!(s, Slot::Cancelling(g) if *g == generation))
                    .unwrap_or_else(PoisonError::into_inner);
                info!("Pending connection attempt cancelled");
            }
            Slot::Disconnected => debug!("Disconnect requested while already disconnected"),
        }
    }

    /// Queues a write of `value` to the address behind `tag`.
    ///
    /// Returns as soon as the job is queued. Transport failures are
    /// delivered through [`on_write_error`](Self::on_write_error), never here.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if no session is established
    /// - `UnknownTag` if `tag` is not in the translation table
    pub fn write_tag(&self, tag: &str, value: u16) -> Result<()> {
        let slot = self.inner.lock();
        match &*slot {
            Slot::Connected(active) => {
                let address = active.tags.resolve(tag)?;
                active
                    .jobs
                    .send(IoCommand::Write(WriteJob { address, value }))
                    .map_err(|_| WinchError::NotConnected)
            }
            _ => Err(WinchError::NotConnected),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        match &*self.inner.lock() {
            Slot::Disconnected => SessionState::Disconnected,
            Slot::Connecting(_) | Slot::Cancelling(_) => SessionState::Connecting,
            Slot::Connected(_) => SessionState::Connected,
        }
    }

    /// Translation table of the established session.
    pub fn tag_table(&self) -> Option<TagTable> {
        match &*self.inner.lock() {
            Slot::Connected(active) => Some(active.tags.clone()),
            _ => None,
        }
    }

    /// Subscribes to asynchronous write failures.
    pub fn on_write_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WinchError) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(handler)
    }

    /// Removes a write-failure subscription.
    pub fn remove_write_error_handler(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    /// Transport settings used for new connections.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}
