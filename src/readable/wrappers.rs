//! Read-list adapters used by [`StandardReadable`](crate::StandardReadable).
//!
//! - [`Renamed`] re-keys a readable's output to the name of the owning device
//!   (the "primary" child).
//! - [`Uncached`] forces fresh reads from a signal, even while it is staged.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::capabilities::{AsyncReadable, Stageable};
use crate::device::Device;
use crate::error::SignalError;
use crate::signal::{CanRead, Descriptors, Readings, Signal, SignalValue};

/// Presents `readable` under the name of `device`.
pub struct Renamed {
    readable: Arc<dyn AsyncReadable>,
    device: Weak<dyn Device>,
}

impl Renamed {
    /// Wraps `readable`; its keys are replaced by `device`'s name.
    pub fn new(readable: Arc<dyn AsyncReadable>, device: Weak<dyn Device>) -> Self {
        Self { readable, device }
    }

    fn rename<V>(&self, map: IndexMap<String, V>) -> IndexMap<String, V> {
        let name = self
            .device
            .upgrade()
            .map(|d| d.name().to_string())
            .unwrap_or_default();
        map.into_values().map(|v| (name.clone(), v)).collect()
    }
}

#[async_trait]
impl AsyncReadable for Renamed {
    async fn read(&self) -> Result<Readings, SignalError> {
        Ok(self.rename(self.readable.read().await?))
    }

    async fn describe(&self) -> Result<Descriptors, SignalError> {
        Ok(self.rename(self.readable.describe().await?))
    }

    fn as_stageable(&self) -> Option<&dyn Stageable> {
        Some(self)
    }
}

impl Stageable for Renamed {
    fn stage(&self) -> Vec<Arc<dyn Device>> {
        self.readable
            .as_stageable()
            .map(|s| s.stage())
            .unwrap_or_default()
    }

    fn unstage(&self) -> Vec<Arc<dyn Device>> {
        self.readable
            .as_stageable()
            .map(|s| s.unstage())
            .unwrap_or_default()
    }
}

/// Reads `signal` with `cached = Some(false)` every time.
///
/// Has no stage capability: staging a composite does not start a monitor for it.
pub struct Uncached<T, A> {
    signal: Signal<T, A>,
}

impl<T: SignalValue, A: CanRead> Uncached<T, A> {
    /// Wraps `signal`.
    pub fn new(signal: Signal<T, A>) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl<T: SignalValue, A: CanRead> AsyncReadable for Uncached<T, A> {
    async fn read(&self) -> Result<Readings, SignalError> {
        self.signal.read_cached(Some(false)).await
    }

    async fn describe(&self) -> Result<Descriptors, SignalError> {
        self.signal.describe_signal().await
    }
}
