//! # Capability traits.
//!
//! A device variant implements zero or more of these independent traits;
//! callers dispatch on capability presence (e.g. [`AsyncReadable::as_stageable`])
//! rather than on a class hierarchy.
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`AsyncReadable`] | `read()` / `describe()` returning name-keyed maps |
//! | [`Configurable`] | `read_configuration()` / `describe_configuration()` |
//! | [`Stageable`] | `stage()` / `unstage()` (start/stop cached reads) |
//! | [`Subscribable`] | push-style value subscriptions |
//! | [`Movable`] | `set(value)` returning an [`AsyncStatus`] |

use std::sync::Arc;

use async_trait::async_trait;

use crate::device::Device;
use crate::error::SignalError;
use crate::signal::{Descriptors, Readings, SubscriptionId};
use crate::status::AsyncStatus;

/// Value-change callback.
pub type ValueCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Something that produces name-keyed readings.
#[async_trait]
pub trait AsyncReadable: Send + Sync {
    /// Current readings keyed by name.
    async fn read(&self) -> Result<Readings, SignalError>;

    /// Metadata for the keys produced by [`read`](AsyncReadable::read).
    async fn describe(&self) -> Result<Descriptors, SignalError>;

    /// Stage capability of this readable, if it has one.
    fn as_stageable(&self) -> Option<&dyn Stageable> {
        None
    }
}

/// Something with a separate configuration reading.
#[async_trait]
pub trait Configurable: Send + Sync {
    /// Configuration readings keyed by name.
    async fn read_configuration(&self) -> Result<Readings, SignalError>;

    /// Metadata for the configuration readings.
    async fn describe_configuration(&self) -> Result<Descriptors, SignalError>;
}

/// Start/stop cached-read mode.
///
/// Both calls return every object they affected, the receiver first.
pub trait Stageable {
    /// Begins cached-read mode.
    fn stage(&self) -> Vec<Arc<dyn Device>>;

    /// Ends cached-read mode. Never fails, even if [`stage`](Stageable::stage)
    /// was not called.
    fn unstage(&self) -> Vec<Arc<dyn Device>>;
}

/// Push-style value notifications.
pub trait Subscribable<T>: Send + Sync {
    /// Registers `callback` for every new value; returns a token for [`clear_sub`](Subscribable::clear_sub).
    fn subscribe_value(&self, callback: ValueCallback<T>) -> SubscriptionId;

    /// Removes a subscription. Unknown tokens are ignored.
    fn clear_sub(&self, id: SubscriptionId);
}

/// Something that can be driven to a new value.
pub trait Movable<T> {
    /// Starts moving to `value`; the status completes when the move is done.
    fn set(&self, value: T) -> AsyncStatus;
}
