//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] distributes events to every subscriber concurrently
//! without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked (to all)
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, logged and re-emitted as `SubscriberOverflow`
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//!
//! Workers only hold a weak handle on the queues, so [`SubscriberSet::shutdown`]
//! closes them by dropping the set's own handle.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::util::panic_message;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

type Channels = Arc<Vec<SubscriberChannel>>;

/// Fan-out coordinator for collector event subscribers.
pub struct SubscriberSet {
    channels: Channels,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Queue capacity is [`Subscribe::queue_capacity`] or `default_capacity`,
    /// at least 1.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, default_capacity: usize) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut receivers = Vec::with_capacity(subs.len());

        for sub in &subs {
            let cap = sub.queue_capacity().unwrap_or(default_capacity).max(1);
            let (tx, rx) = mpsc::channel::<Arc<Event>>(cap);
            channels.push(SubscriberChannel {
                name: sub.name(),
                sender: tx,
            });
            receivers.push(rx);
        }
        let channels: Channels = Arc::new(channels);

        let workers = subs
            .into_iter()
            .zip(receivers)
            .map(|(sub, mut rx)| {
                let siblings: Weak<Vec<SubscriberChannel>> = Arc::downgrade(&channels);
                tokio::spawn(async move {
                    while let Some(ev) = rx.recv().await {
                        let fut = sub.on_event(ev.as_ref());
                        if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
                            let info = panic_message(&*panic_err);
                            log::error!("subscriber {:?} panicked: {info}", sub.name());
                            if let Some(channels) = siblings.upgrade() {
                                emit_to(&channels, Arc::new(Event::subscriber_panicked(sub.name(), info)));
                            }
                        }
                    }
                })
            })
            .collect();

        Self { channels, workers }
    }

    /// Emits an event to all subscribers (clones the event).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// - Uses `try_send` (non-blocking)
    /// - On queue full or closed: drops the event for that subscriber and
    ///   emits `SubscriberOverflow` (never for an overflow event itself)
    pub fn emit_arc(&self, event: Arc<Event>) {
        emit_to(&self.channels, event);
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true when there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops the channel senders (workers see the channel closed after
    ///    draining what is queued)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

fn emit_to(channels: &[SubscriberChannel], event: Arc<Event>) {
    let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);
    let mut overflowed = Vec::new();

    for channel in channels {
        match channel.sender.try_send(Arc::clone(&event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => overflowed.push((channel.name, "full")),
            Err(mpsc::error::TrySendError::Closed(_)) => overflowed.push((channel.name, "closed")),
        }
    }
    if is_overflow_evt {
        return;
    }
    for (name, reason) in overflowed {
        log::warn!("subscriber {name:?} dropped an event ({reason})");
        emit_to(channels, Arc::new(Event::subscriber_overflow(name, reason)));
    }
}
