//! # In-memory simulated transport.
//!
//! [`SimSignalBackend`] holds the value locally. It is what a signal switches to
//! when connected with `sim = true`, which makes whole device trees testable
//! without a live transport.
//!
//! - [`set_value`](SimSignalBackend::set_value) pushes a new value to monitors
//! - [`set_put_proceeds`](SimSignalBackend::set_put_proceeds) holds waiting puts
//!   back, to simulate a slow write
//! - source addresses are reported as `sim://<address>`

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use super::backend::{BackendResult, ReadingCallback, SignalBackend, SubscriptionId};
use super::reading::Reading;
use crate::util::lock;

struct SimState<T> {
    reading: Reading<T>,
    listeners: Vec<(SubscriptionId, ReadingCallback<T>)>,
}

/// Simulated transport serving a locally held value.
pub struct SimSignalBackend<T> {
    state: Mutex<SimState<T>>,
    put_proceeds: watch::Sender<bool>,
}

impl<T> SimSignalBackend<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Creates a backend holding `T::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_value(T::default())
    }

    /// Creates a backend holding `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        let (put_proceeds, _rx) = watch::channel(true);
        Self {
            state: Mutex::new(SimState {
                reading: Reading::now(value),
                listeners: Vec::new(),
            }),
            put_proceeds,
        }
    }

    /// Replaces the value and notifies every monitor.
    pub fn set_value(&self, value: T) {
        self.set_reading(Reading::now(value));
    }

    /// Replaces the whole reading (value, timestamp, severity) and notifies monitors.
    pub fn set_reading(&self, reading: Reading<T>) {
        let listeners: Vec<ReadingCallback<T>> = {
            let mut state = lock(&self.state);
            state.reading = reading.clone();
            state.listeners.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for cb in listeners {
            cb(&reading);
        }
    }

    /// Current value.
    pub fn value(&self) -> T {
        lock(&self.state).reading.value.clone()
    }

    /// When false, `put(_, wait = true)` blocks until this is set back to true.
    pub fn set_put_proceeds(&self, proceeds: bool) {
        self.put_proceeds.send_replace(proceeds);
    }

    /// Number of active monitors.
    pub fn monitor_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

impl<T> Default for SimSignalBackend<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> SignalBackend<T> for SimSignalBackend<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn source(&self, address: &str) -> String {
        format!("sim://{address}")
    }

    async fn connect(&self, _address: &str) -> BackendResult<()> {
        Ok(())
    }

    async fn fetch(&self) -> BackendResult<Reading<T>> {
        Ok(lock(&self.state).reading.clone())
    }

    async fn put(&self, value: T, wait: bool) -> BackendResult<()> {
        self.set_value(value);
        if wait {
            let mut rx = self.put_proceeds.subscribe();
            let _ = rx.wait_for(|proceeds| *proceeds).await;
        }
        Ok(())
    }

    fn subscribe(&self, callback: ReadingCallback<T>) -> SubscriptionId {
        let id = SubscriptionId::next();
        let current = {
            let mut state = lock(&self.state);
            state.listeners.push((id, callback.clone()));
            state.reading.clone()
        };
        callback(&current);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.state).listeners.retain(|(sid, _)| *sid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_subscribe_delivers_current_then_updates() {
        let sim = SimSignalBackend::with_value(1i64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let id = sim.subscribe(Arc::new(move |r: &Reading<i64>| s.lock().unwrap().push(r.value)));
        sim.set_value(2);
        sim.unsubscribe(id);
        sim.set_value(3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(sim.monitor_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_put_waits_for_proceeds() {
        let sim = Arc::new(SimSignalBackend::<f64>::new());
        sim.set_put_proceeds(false);

        let put = tokio::spawn({
            let sim = Arc::clone(&sim);
            async move { sim.put(4.0, true).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!put.is_finished());
        assert_eq!(sim.value(), 4.0);

        sim.set_put_proceeds(true);
        put.await.unwrap().unwrap();
    }

    #[test]
    fn test_source_has_sim_scheme() {
        let sim = SimSignalBackend::<bool>::new();
        assert_eq!(sim.source("BL01:X"), "sim://BL01:X");
    }
}
