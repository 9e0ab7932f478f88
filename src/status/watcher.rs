//! # Progress watchers for long-running statuses.
//!
//! A [`Watchers`] list is handed to an operation when its [`AsyncStatus`](crate::AsyncStatus)
//! is built with [`AsyncStatus::with_watchers`](crate::AsyncStatus::with_watchers).
//! The operation calls [`Watchers::notify`] whenever it has progress to report
//! (e.g. every readback update during a move); callers attach sinks through
//! [`AsyncStatus::watch`](crate::AsyncStatus::watch).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use devicevisor::{WatcherUpdate, Watchers};
//!
//! let watchers = Watchers::new();
//! watchers.push(|u: &WatcherUpdate| assert_eq!(u.target, 10.0));
//! watchers.notify(&WatcherUpdate {
//!     name: "x".into(),
//!     current: 2.5,
//!     initial: 0.0,
//!     target: 10.0,
//!     unit: "mm".into(),
//!     precision: 3,
//!     time_elapsed: Duration::from_millis(120),
//! });
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::util::lock;

/// Progress snapshot delivered to every watcher.
#[derive(Clone, Debug, PartialEq)]
pub struct WatcherUpdate {
    /// Name of the device reporting progress.
    pub name: String,
    /// Current position/value.
    pub current: f64,
    /// Value at the start of the operation.
    pub initial: f64,
    /// Value the operation is heading for.
    pub target: f64,
    /// Engineering units of the values.
    pub unit: String,
    /// Display precision (digits after the decimal point).
    pub precision: u32,
    /// Time since the operation started.
    pub time_elapsed: Duration,
}

impl WatcherUpdate {
    /// Fraction of the distance covered so far, clamped to `0.0..=1.0`.
    ///
    /// Returns `1.0` when `initial == target`.
    pub fn fraction(&self) -> f64 {
        let span = self.target - self.initial;
        if span == 0.0 {
            return 1.0;
        }
        ((self.current - self.initial) / span).clamp(0.0, 1.0)
    }
}

/// A single progress sink.
pub type WatcherFn = Arc<dyn Fn(&WatcherUpdate) + Send + Sync>;

/// Shared, ordered list of progress sinks.
///
/// Cheap to clone; all clones share the same list.
#[derive(Clone, Default)]
pub struct Watchers {
    list: Arc<Mutex<Vec<WatcherFn>>>,
}

impl Watchers {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sink.
    pub fn push(&self, watcher: impl Fn(&WatcherUpdate) + Send + Sync + 'static) {
        lock(&self.list).push(Arc::new(watcher));
    }

    /// Delivers `update` to every sink in registration order.
    ///
    /// Sinks are called outside the lock, so a sink may register more sinks.
    pub fn notify(&self, update: &WatcherUpdate) {
        let sinks: Vec<WatcherFn> = lock(&self.list).clone();
        for sink in sinks {
            sink(update);
        }
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        lock(&self.list).len()
    }

    /// Returns true if no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Watchers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchers").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn update(current: f64) -> WatcherUpdate {
        WatcherUpdate {
            name: "stage-x".into(),
            current,
            initial: 0.0,
            target: 4.0,
            unit: "mm".into(),
            precision: 2,
            time_elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_notify_reaches_every_sink() {
        let hits = Arc::new(AtomicUsize::new(0));
        let watchers = Watchers::new();
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            watchers.push(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        watchers.clone().notify(&update(1.0));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(update(1.0).fraction(), 0.25);
        assert_eq!(update(-3.0).fraction(), 0.0);
        assert_eq!(update(9.0).fraction(), 1.0);
    }
}
