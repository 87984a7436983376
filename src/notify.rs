//! One-way notification channel for asynchronous write failures.
//!
//! Speed writes are fire-and-forget, so their failures cannot be returned to
//! the caller. Instead the session publishes them to every subscribed
//! handler. Handlers run on the session's I/O thread and must not block.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use winch_link::{WinchError, WriteErrorNotifier};
//!
//! let notifier = WriteErrorNotifier::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let id = notifier.subscribe(move |_err| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! notifier.notify(&WinchError::write("QW4", "socket closed"));
//! assert!(notifier.unsubscribe(id));
//! notifier.notify(&WinchError::write("QW4", "socket closed"));
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::WinchError;

type Handler = Arc<dyn Fn(&WinchError) + Send + Sync>;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Registry of write-failure handlers.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct WriteErrorNotifier {
    handlers: Arc<Mutex<Vec<(SubscriptionId, Handler)>>>,
    next_id: Arc<AtomicU64>,
}

impl WriteErrorNotifier {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` and returns its subscription id.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WinchError) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a subscription. Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// Delivers `error` to every current subscriber.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe from inside the callback.
    pub fn notify(&self, error: &WinchError) {
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(error);
        }
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for WriteErrorNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteErrorNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
