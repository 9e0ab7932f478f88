//! # Core subscriber trait
//!
//! `Subscribe` is the reporting hook of bulk connection. Each subscriber is
//! driven by a dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   collector nor other subscribers.
//! - Each subscriber may declare its queue capacity via
//!   [`Subscribe::queue_capacity`]; otherwise the collector's configured
//!   capacity applies. On overflow, events for that subscriber are **dropped** (warn).
//!
//! ## Example
//! ```rust
//! use devicevisor::{Event, EventKind, Subscribe};
//!
//! struct Pager;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::DeviceNotConnected {
//!             // page the beamline scientist...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "pager" }
//!     fn queue_capacity(&self) -> Option<usize> { Some(64) }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue; `None` uses the
    /// collector's configured capacity.
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
