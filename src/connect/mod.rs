//! # Connection orchestration.
//!
//! - [`NotConnected`] - hierarchical failure report
//! - [`wait_for_connection`] / [`connect_children`] / [`connect_with_timeout`] - raising path
//! - [`DeviceCollector`] / [`CollectReport`] - soft bulk path that reports instead of raising

mod collector;
mod orchestrator;
mod report;

pub use collector::{CollectReport, DeviceCollector};
pub use orchestrator::{ConnectFuture, connect_children, connect_with_timeout, wait_for_connection};
pub use report::NotConnected;
