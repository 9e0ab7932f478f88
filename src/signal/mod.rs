//! # Signals: typed leaf devices over a pluggable transport.
//!
//! - [`Signal`] / [`SignalR`] / [`SignalW`] / [`SignalRW`] - typed value channels
//! - [`SignalBackend`] - the transport seam; [`SimSignalBackend`] ships in-crate
//! - [`Reading`] / [`Descriptor`] - timestamped values and their metadata
//! - [`observe_value`] / [`wait_for_value`] - push-to-pull value bridge

mod backend;
mod observe;
mod reading;
#[allow(clippy::module_inception)]
mod signal;
mod sim;

pub use backend::{BackendError, BackendResult, ReadingCallback, SignalBackend, SubscriptionId};
pub use observe::{Match, ObserveValue, observe_value, wait_for_value};
pub use reading::{Descriptor, Descriptors, Reading, Readings, timestamp_now};
pub use signal::{
    Access, CanRead, CanWrite, Read, ReadWrite, ReadingsCallback, Signal, SignalR, SignalRW,
    SignalValue, SignalW, Write, set_sim_put_proceeds, set_sim_value,
};
pub use sim::SimSignalBackend;
