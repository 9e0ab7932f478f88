//! # devicevisor
//!
//! **Devicevisor** coordinates many independent, possibly slow or unreliable
//! asynchronous devices as one logical unit.
//!
//! It provides primitives to name and connect device trees in parallel, track
//! long-running operations as cancellable statuses, turn push-style value
//! subscriptions into streams, and merge per-device state into composite
//! readings. Transports are pluggable; an in-memory simulated transport ships
//! with the crate so whole device trees run in tests.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   DeviceCollector [(name, device), ...]  ── events ──► SubscriberSet ──► LogWriter / custom
//!          │ set_name + connect (deadline)
//!          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StandardReadable (composite)                                    │
//! │  - explicit ordered children                                     │
//! │  - read list: primary (re-keyed) ─► cached ─► uncached           │
//! │  - config list                                                   │
//! └──────┬──────────────────┬──────────────────┬─────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ SignalR  │       │ SignalRW │       │ SignalR  │  typed leaf devices
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        ▼                  ▼                  ▼
//!   SignalBackend (transport seam)   or   SimSignalBackend (sim = true)
//! ```
//!
//! ### Connecting
//! ```text
//! device.connect(prefix, sim, ctx)
//!   └─► connect_children: one child token per child, all concurrent
//!         ├─ Ok            ─► nothing reported
//!         └─ NotConnected  ─► nested under the child's attribute name
//!
//! cancel(ctx)  ─► pending leaves report their source address
//! ```
//!
//! ### Operations
//! ```text
//! signal.set(v, wait) ──► AsyncStatus ──► join / cancel / add_callback / watch
//! observe_value(&signal) ──► Stream<T>   (unsubscribes on drop)
//! wait_for_value(&signal, Match, timeout)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                               |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------------|
//! | **Statuses**      | Cancellable handles with callbacks and progress watchers.    | [`AsyncStatus`], [`Watchers`], [`WatcherUpdate`] |
//! | **Device tree**   | Set-once names, weak parents, explicit children.             | [`Device`], [`DeviceCore`], [`Child`]            |
//! | **Connection**    | Parallel connect with hierarchical failure reports.          | [`connect_children`], [`NotConnected`]           |
//! | **Bulk connect**  | Soft, reporting bulk naming and connection.                  | [`DeviceCollector`], [`CollectReport`]           |
//! | **Signals**       | Typed read/write capability, caching, subscriptions.         | [`SignalR`], [`SignalW`], [`SignalRW`]           |
//! | **Streams**       | Push-to-pull value bridge and predicate waits.               | [`observe_value`], [`wait_for_value`]            |
//! | **Composites**    | Merged read/describe/stage over child signals.               | [`StandardReadable`]                             |
//! | **Subscriber API**| Hook into bulk connect events.                               | [`Subscribe`]                                    |
//! | **Errors**        | Typed errors for statuses, signals and waits.                | [`StatusError`], [`SignalError`], [`WaitError`]  |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use devicevisor::{
//!     AsyncReadable, CollectorConfig, DeviceCollector, Match, SignalR, SignalRW, StandardReadable,
//!     set_sim_value, wait_for_value,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let setpoint = SignalRW::<f64>::sim("Setpoint");
//!     let readback = SignalR::<f64>::sim("Readback");
//!     let x = StandardReadable::builder("X:")
//!         .primary("readback", readback.clone())
//!         .child("setpoint", Arc::new(setpoint.clone()))
//!         .build();
//!
//!     let cfg = CollectorConfig { sim: true, prefix: "BL01:".into(), ..Default::default() };
//!     let report = DeviceCollector::new(cfg).add("x", x.clone()).collect().await;
//!     assert!(report.is_ok());
//!
//!     setpoint.set(1.5, true).await?;
//!     set_sim_value(&readback, 1.5);
//!     wait_for_value(&readback, Match::eq(1.5), Some(Duration::from_secs(1))).await?;
//!
//!     let reading = x.read().await?;
//!     assert_eq!(reading["x"].value, serde_json::json!(1.5));
//!     Ok(())
//! }
//! ```

mod capabilities;
mod config;
mod connect;
mod device;
mod error;
mod events;
mod readable;
mod signal;
mod status;
mod subscribers;
mod util;

// ---- Public re-exports ----

pub use capabilities::{AsyncReadable, Configurable, Movable, Stageable, Subscribable, ValueCallback};
pub use config::CollectorConfig;
pub use connect::{
    CollectReport, ConnectFuture, DeviceCollector, NotConnected, connect_children, connect_with_timeout,
    wait_for_connection,
};
pub use device::{Child, Device, DeviceCore, child_name};
pub use error::{SignalError, StatusError, WaitError};
pub use events::{Event, EventKind};
pub use readable::{Renamed, StandardReadable, StandardReadableBuilder, Uncached, merge_gathered};
pub use signal::{
    Access, BackendError, BackendResult, CanRead, CanWrite, Descriptor, Descriptors, Match, ObserveValue, Read,
    ReadWrite, Reading, ReadingCallback, Readings, ReadingsCallback, Signal, SignalBackend, SignalR, SignalRW,
    SignalValue, SignalW, SimSignalBackend, SubscriptionId, Write, observe_value, set_sim_put_proceeds,
    set_sim_value, timestamp_now, wait_for_value,
};
pub use status::{AsyncStatus, WatcherFn, WatcherUpdate, Watchers};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
