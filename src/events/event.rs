//! # Connection lifecycle events emitted by the device collector.
//!
//! The [`EventKind`] enum classifies events in two groups:
//! - **Collection events**: one bulk connect pass (starting, per-device outcome, timeout, finished)
//! - **Subscriber events**: diagnostics about the subscribers themselves (overflow, panic)
//!
//! The [`Event`] struct carries the metadata: timestamp, device name, reason,
//! timeout and failure count.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use devicevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DeviceNotConnected)
//!     .with_device("stage")
//!     .with_reason("x: sim://BL01:X");
//!
//! assert_eq!(ev.kind, EventKind::DeviceNotConnected);
//! assert_eq!(ev.device.as_deref(), Some("stage"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of collector events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `device`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `device`: subscriber name
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    // === Collection events ===
    /// A bulk connect pass is starting.
    ///
    /// Sets:
    /// - `timeout_ms`: deadline of the pass, if any
    ConnectStarting,

    /// Device connected.
    ///
    /// Sets:
    /// - `device`: registered device name
    DeviceConnected,

    /// Device did not connect.
    ///
    /// Sets:
    /// - `device`: registered device name
    /// - `reason`: rendered [`NotConnected`](crate::NotConnected) report
    DeviceNotConnected,

    /// Deadline hit; pending connections were cancelled.
    ///
    /// Sets:
    /// - `timeout_ms`: the deadline
    ConnectTimedOut,

    /// The pass finished.
    ///
    /// Sets:
    /// - `failed`: number of devices that did not connect
    /// - `reason`: the failure summary when `failed > 0`
    CollectFinished,
}

/// Collector event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Registered device name (or subscriber name for subscriber events).
    pub device: Option<Arc<str>>,
    /// Human-readable reason (failure report, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Number of failed devices.
    pub failed: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            device: None,
            reason: None,
            timeout_ms: None,
            failed: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a device name.
    #[inline]
    pub fn with_device(mut self, device: impl Into<Arc<str>>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches the number of failed devices.
    #[inline]
    pub fn with_failed(mut self, n: usize) -> Self {
        self.failed = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_device(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_device(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ConnectStarting);
        let b = Event::new(EventKind::CollectFinished);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::ConnectTimedOut).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn test_overflow_helper() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
