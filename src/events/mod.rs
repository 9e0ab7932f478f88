//! Collector events: classification and payload.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! ## Quick reference
//! - **Publisher**: [`DeviceCollector`](crate::DeviceCollector), plus `SubscriberSet`
//!   workers for overflow/panic diagnostics.
//! - **Consumers**: any [`Subscribe`](crate::Subscribe) implementor passed to the collector.

mod event;

pub use event::{Event, EventKind};
