//! # Long-running operation handles.
//!
//! - [`AsyncStatus`] - cancellable, observable handle over one spawned operation
//! - [`Watchers`] / [`WatcherUpdate`] - progress reporting for motion-like operations

#[allow(clippy::module_inception)]
mod status;
mod watcher;

pub use status::AsyncStatus;
pub use watcher::{WatcherFn, WatcherUpdate, Watchers};
