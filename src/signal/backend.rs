//! # Transport capability of a signal.
//!
//! [`SignalBackend`] is the seam between the orchestration core and whatever
//! actually moves values (a control-system protocol, a bus, a simulator).
//! The core never assumes how an address resolves to a live connection.
//!
//! ## Contract
//! - `connect` may be slow; callers race it against their cancellation token
//! - `subscribe` delivers the **current** reading first, then every change
//! - callbacks may run on any thread and must not block

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use super::reading::Reading;

/// Global counter for subscription tokens.
static SUBSCRIPTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Token identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocates a fresh, process-unique token.
    pub fn next() -> Self {
        Self(SUBSCRIPTION_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// Error reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Result alias for transport calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Callback receiving typed readings from a transport.
pub type ReadingCallback<T> = Arc<dyn Fn(&Reading<T>) + Send + Sync>;

/// Transport for one typed value channel.
#[async_trait]
pub trait SignalBackend<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Source address reported for `address` (e.g. with a protocol scheme).
    fn source(&self, address: &str) -> String {
        address.to_string()
    }

    /// Establishes the connection to `address`.
    async fn connect(&self, address: &str) -> BackendResult<()>;

    /// Fetches a fresh reading.
    async fn fetch(&self) -> BackendResult<Reading<T>>;

    /// Writes `value`; with `wait` the call returns once the write completed.
    async fn put(&self, value: T, wait: bool) -> BackendResult<()>;

    /// Starts a monitor delivering readings to `callback`.
    fn subscribe(&self, callback: ReadingCallback<T>) -> SubscriptionId;

    /// Stops a monitor. Unknown tokens are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
