//! # Typed signals with read/write capability in the type.
//!
//! [`Signal<T, A>`] is a leaf [`Device`] exposing one value of type `T` over a
//! [`SignalBackend`]. The access marker `A` decides which operations exist:
//!
//! | Alias | Marker | `read` / `subscribe` / `stage` | `set` |
//! |-------|--------|:---:|:---:|
//! | [`SignalR<T>`] | [`Read`] | yes | no |
//! | [`SignalW<T>`] | [`Write`] | no | yes |
//! | [`SignalRW<T>`] | [`ReadWrite`] | yes | yes |
//!
//! Signals are cheap handles (cloning shares the same channel). They do not
//! implement `PartialEq`, `Ord` or `Hash`: comparing two signals is rejected at
//! compile time; compare their values instead.
//!
//! ## Caching
//! ```text
//! staged || subscribers > 0   ──► backend monitor active, last reading cached
//! otherwise                   ──► no monitor, reads go to the backend
//!
//! read_cached(None)        → cache if monitored, else fresh fetch
//! read_cached(Some(false)) → always fresh fetch
//! read_cached(Some(true))  → cache; NotCached if not monitored
//! ```
//!
//! ## Delivery
//! Every reading gets a sequence number. Callbacks run outside the subscriber
//! list lock, in subscription order, and each subscriber sees a given reading at
//! most once and never an older one after a newer one. A callback may subscribe
//! to or unsubscribe from its own signal; once `clear_sub` returns, the removed
//! callback is not called again. A callback must not synchronously write its
//! own signal through a transport that delivers inline (such as the simulated one).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::backend::{ReadingCallback, SignalBackend, SubscriptionId};
use super::reading::{Descriptor, Descriptors, Reading, Readings};
use super::sim::SimSignalBackend;
use crate::capabilities::{AsyncReadable, Movable, Stageable, Subscribable, ValueCallback};
use crate::connect::NotConnected;
use crate::device::{Device, DeviceCore};
use crate::error::{SignalError, StatusError};
use crate::status::AsyncStatus;
use crate::util::lock;

/// Bounds every signal value type satisfies.
pub trait SignalValue: Clone + Default + std::fmt::Debug + Serialize + Send + Sync + 'static {}

impl<T> SignalValue for T where T: Clone + Default + std::fmt::Debug + Serialize + Send + Sync + 'static {}

mod sealed {
    pub trait Sealed {}
}

/// Access marker of a signal.
pub trait Access: sealed::Sealed + Send + Sync + 'static {}

/// Marker for access kinds that can be read.
pub trait CanRead: Access {}

/// Marker for access kinds that can be written.
pub trait CanWrite: Access {}

/// Read-only access.
#[derive(Debug)]
pub enum Read {}

/// Write-only access.
#[derive(Debug)]
pub enum Write {}

/// Read-write access.
#[derive(Debug)]
pub enum ReadWrite {}

impl sealed::Sealed for Read {}
impl sealed::Sealed for Write {}
impl sealed::Sealed for ReadWrite {}
impl Access for Read {}
impl Access for Write {}
impl Access for ReadWrite {}
impl CanRead for Read {}
impl CanRead for ReadWrite {}
impl CanWrite for Write {}
impl CanWrite for ReadWrite {}

/// Signal that can be read and monitored.
pub type SignalR<T> = Signal<T, Read>;
/// Signal that can be set.
pub type SignalW<T> = Signal<T, Write>;
/// Signal that can be both read and set.
pub type SignalRW<T> = Signal<T, ReadWrite>;

/// Callback receiving name-keyed readings.
pub type ReadingsCallback = Arc<dyn Fn(&Readings) + Send + Sync>;

enum Listener<T> {
    Value(ValueCallback<T>),
    Readings(ReadingsCallback),
}

/// One registered listener with its own delivery cursor.
struct Subscriber<T> {
    id: SubscriptionId,
    listener: Listener<T>,
    active: AtomicBool,
    delivered: Mutex<u64>,
}

impl<T> Subscriber<T> {
    fn wants_readings(&self) -> bool {
        matches!(self.listener, Listener::Readings(_))
    }

    /// Hands reading number `seq` to the callback unless it already saw it (or a
    /// later one) or was removed in the meantime.
    fn offer(&self, seq: u64, reading: &Reading<T>, readings: Option<&Readings>) {
        let mut delivered = lock(&self.delivered);
        if seq <= *delivered || !self.active.load(Ordering::Acquire) {
            return;
        }
        *delivered = seq;
        match &self.listener {
            Listener::Value(cb) => cb(&reading.value),
            Listener::Readings(cb) => {
                if let Some(readings) = readings {
                    cb(readings);
                }
            }
        }
    }
}

struct Monitor<T> {
    staged: bool,
    listeners: Vec<Arc<Subscriber<T>>>,
    backend_sub: Option<(Arc<dyn SignalBackend<T>>, SubscriptionId)>,
    /// A backend subscription is being opened outside the lock.
    starting: bool,
    /// Bumped on every start; readings from older backend subscriptions are dropped.
    generation: u64,
    seq: u64,
    reading: Option<Reading<T>>,
}

impl<T> Monitor<T> {
    fn wanted(&self) -> bool {
        self.staged || !self.listeners.is_empty()
    }

    fn running(&self, generation: u64) -> bool {
        self.generation == generation && (self.starting || self.backend_sub.is_some())
    }
}

enum MonitorChange<T> {
    Start(Arc<dyn SignalBackend<T>>, u64),
    Stop(Arc<dyn SignalBackend<T>>, SubscriptionId),
}

struct SignalInner<T> {
    core: DeviceCore,
    suffix: String,
    backend: Arc<dyn SignalBackend<T>>,
    sim: Arc<SimSignalBackend<T>>,
    active: Mutex<Option<Arc<dyn SignalBackend<T>>>>,
    source: Mutex<String>,
    monitor: Mutex<Monitor<T>>,
    handle: Mutex<Weak<dyn Device>>,
}

impl<T: SignalValue> SignalInner<T> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn backend(&self) -> Result<Arc<dyn SignalBackend<T>>, SignalError> {
        lock(&self.active)
            .clone()
            .ok_or_else(|| SignalError::Disconnected {
                signal: self.name().to_string(),
            })
    }

    fn backend_error(&self, error: impl std::fmt::Display) -> SignalError {
        SignalError::Backend {
            signal: self.name().to_string(),
            error: error.to_string(),
        }
    }

    fn encode(&self, reading: &Reading<T>) -> Option<Readings> {
        match reading.to_json() {
            Ok(r) => Some(Readings::from([(self.name().to_string(), r)])),
            Err(e) => {
                log::warn!("signal {:?}: cannot encode reading: {e}", self.name());
                None
            }
        }
    }

    /// Called by the backend monitor of `generation` for every new reading.
    ///
    /// Callbacks run without the monitor lock held, in subscription order.
    fn deliver(&self, generation: u64, reading: &Reading<T>) {
        let (seq, listeners) = {
            let mut monitor = lock(&self.monitor);
            if !monitor.running(generation) {
                return;
            }
            monitor.seq += 1;
            monitor.reading = Some(reading.clone());
            (monitor.seq, monitor.listeners.clone())
        };
        let readings = if listeners.iter().any(|s| s.wants_readings()) {
            self.encode(reading)
        } else {
            None
        };
        for subscriber in &listeners {
            subscriber.offer(seq, reading, readings.as_ref());
        }
    }

    /// Starts or stops the backend monitor to match staged/subscriber state.
    ///
    /// Only one caller opens a backend subscription at a time; callers arriving
    /// meanwhile leave the reconciliation to it.
    fn sync_monitor(self: &Arc<Self>) {
        loop {
            let change = {
                let mut monitor = lock(&self.monitor);
                if monitor.starting {
                    return;
                }
                match (monitor.wanted(), monitor.backend_sub.is_some()) {
                    (true, false) => {
                        let Ok(backend) = self.backend() else {
                            return;
                        };
                        monitor.starting = true;
                        monitor.generation += 1;
                        MonitorChange::Start(backend, monitor.generation)
                    }
                    (false, true) => match monitor.backend_sub.take() {
                        Some((backend, id)) => {
                            monitor.reading = None;
                            MonitorChange::Stop(backend, id)
                        }
                        None => return,
                    },
                    _ => return,
                }
            };
            match change {
                MonitorChange::Start(backend, generation) => {
                    let weak: Weak<Self> = Arc::downgrade(self);
                    let callback: ReadingCallback<T> = Arc::new(move |reading: &Reading<T>| {
                        if let Some(inner) = weak.upgrade() {
                            inner.deliver(generation, reading);
                        }
                    });
                    let id = backend.subscribe(callback);
                    let mut monitor = lock(&self.monitor);
                    monitor.starting = false;
                    monitor.backend_sub = Some((backend, id));
                }
                MonitorChange::Stop(backend, id) => backend.unsubscribe(id),
            }
        }
    }
}

/// Typed value channel; see the [module docs](self) for capabilities and caching.
pub struct Signal<T, A> {
    inner: Arc<SignalInner<T>>,
    _access: PhantomData<fn() -> A>,
}

impl<T, A> Clone for Signal<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _access: PhantomData,
        }
    }
}

impl<T: SignalValue, A: Access> std::fmt::Debug for Signal<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.inner.name())
            .field("source", &self.source())
            .finish()
    }
}

impl<T: SignalValue, A: Access> Signal<T, A> {
    /// Creates a signal whose address is `prefix + suffix` at connect time.
    ///
    /// `backend` is used for real connections; `connect(.., sim = true, ..)`
    /// switches to a built-in [`SimSignalBackend`] instead.
    pub fn new(suffix: impl Into<String>, backend: Arc<dyn SignalBackend<T>>) -> Self {
        Self::build(suffix.into(), backend, Arc::new(SimSignalBackend::new()))
    }

    /// Creates a signal backed only by the simulated transport.
    pub fn sim(suffix: impl Into<String>) -> Self {
        let sim = Arc::new(SimSignalBackend::new());
        Self::build(suffix.into(), sim.clone(), sim)
    }

    fn build(
        suffix: String,
        backend: Arc<dyn SignalBackend<T>>,
        sim: Arc<SimSignalBackend<T>>,
    ) -> Self {
        let handle: Weak<dyn Device> = Weak::<Self>::new();
        Self {
            inner: Arc::new(SignalInner {
                core: DeviceCore::new(),
                suffix,
                backend,
                sim,
                active: Mutex::new(None),
                source: Mutex::new(String::new()),
                monitor: Mutex::new(Monitor {
                    staged: false,
                    listeners: Vec::new(),
                    backend_sub: None,
                    starting: false,
                    generation: 0,
                    seq: 0,
                    reading: None,
                }),
                handle: Mutex::new(handle),
            }),
            _access: PhantomData,
        }
    }

    /// Source address, `""` until connected.
    pub fn source(&self) -> String {
        lock(&self.inner.source).clone()
    }

    /// The simulated transport of this signal.
    pub fn sim_backend(&self) -> &Arc<SimSignalBackend<T>> {
        &self.inner.sim
    }

    /// Returns true once `connect` succeeded.
    pub fn is_connected(&self) -> bool {
        lock(&self.inner.active).is_some()
    }

    /// Returns true while the backend monitor is running (staged or subscribed).
    pub fn is_monitored(&self) -> bool {
        lock(&self.inner.monitor).backend_sub.is_some()
    }

    /// Number of active value/reading subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.monitor).listeners.len()
    }
}

impl<T: SignalValue, A: CanRead> Signal<T, A> {
    /// Typed reading, honouring the caching rules in the [module docs](self).
    pub async fn read_reading(&self, cached: Option<bool>) -> Result<Reading<T>, SignalError> {
        let monitored = self.is_monitored();
        if cached.unwrap_or(monitored) {
            let cached_reading = lock(&self.inner.monitor).reading.clone();
            if let Some(reading) = cached_reading {
                return Ok(reading);
            }
            if cached == Some(true) && !monitored {
                return Err(SignalError::NotCached {
                    signal: self.inner.name().to_string(),
                });
            }
        }
        let backend = self.inner.backend()?;
        backend
            .fetch()
            .await
            .map_err(|e| self.inner.backend_error(e))
    }

    /// Current value.
    pub async fn get_value(&self, cached: Option<bool>) -> Result<T, SignalError> {
        Ok(self.read_reading(cached).await?.value)
    }

    /// Single-entry reading map keyed by the signal name.
    pub async fn read_cached(&self, cached: Option<bool>) -> Result<Readings, SignalError> {
        let reading = self.read_reading(cached).await?;
        let json = reading.to_json().map_err(|e| SignalError::Encode {
            signal: self.inner.name().to_string(),
            error: e.to_string(),
        })?;
        Ok(Readings::from([(self.inner.name().to_string(), json)]))
    }

    /// Single-entry descriptor map keyed by the signal name.
    pub async fn describe_signal(&self) -> Result<Descriptors, SignalError> {
        let readings = self.read_cached(None).await?;
        Ok(readings
            .into_iter()
            .map(|(name, r)| (name, Descriptor::from_value(self.source(), &r.value)))
            .collect())
    }

    /// Subscribes to reading maps (`{name: reading}`) instead of raw values.
    pub fn subscribe(&self, callback: impl Fn(&Readings) + Send + Sync + 'static) -> SubscriptionId {
        self.add_listener(Listener::Readings(Arc::new(callback)))
    }

    fn add_listener(&self, listener: Listener<T>) -> SubscriptionId {
        let subscriber = Arc::new(Subscriber {
            id: SubscriptionId::next(),
            listener,
            active: AtomicBool::new(true),
            delivered: Mutex::new(0),
        });
        let current = {
            let mut monitor = lock(&self.inner.monitor);
            monitor.listeners.push(Arc::clone(&subscriber));
            monitor.reading.clone().map(|reading| (monitor.seq, reading))
        };
        if let Some((seq, reading)) = current {
            let readings = if subscriber.wants_readings() {
                self.inner.encode(&reading)
            } else {
                None
            };
            subscriber.offer(seq, &reading, readings.as_ref());
        }
        self.inner.sync_monitor();
        subscriber.id
    }
}

impl<T: SignalValue, A: CanRead> Subscribable<T> for Signal<T, A> {
    fn subscribe_value(&self, callback: ValueCallback<T>) -> SubscriptionId {
        self.add_listener(Listener::Value(callback))
    }

    fn clear_sub(&self, id: SubscriptionId) {
        lock(&self.inner.monitor).listeners.retain(|s| {
            if s.id == id {
                s.active.store(false, Ordering::Release);
            }
            s.id != id
        });
        self.inner.sync_monitor();
    }
}

impl<T: SignalValue, A: Access> Signal<T, A> {
    /// This signal as a shared device handle.
    ///
    /// While any returned handle is alive, every call returns that same `Arc`,
    /// so `stage()` and `unstage()` entries compare equal with [`Arc::ptr_eq`].
    pub fn as_device(&self) -> Arc<dyn Device> {
        let mut handle = lock(&self.inner.handle);
        if let Some(me) = handle.upgrade() {
            return me;
        }
        let me: Arc<dyn Device> = Arc::new(self.clone());
        *handle = Arc::downgrade(&me);
        me
    }
}

impl<T: SignalValue, A: CanRead> Stageable for Signal<T, A> {
    fn stage(&self) -> Vec<Arc<dyn Device>> {
        lock(&self.inner.monitor).staged = true;
        self.inner.sync_monitor();
        vec![self.as_device()]
    }

    fn unstage(&self) -> Vec<Arc<dyn Device>> {
        lock(&self.inner.monitor).staged = false;
        self.inner.sync_monitor();
        vec![self.as_device()]
    }
}

#[async_trait]
impl<T: SignalValue, A: CanRead> AsyncReadable for Signal<T, A> {
    async fn read(&self) -> Result<Readings, SignalError> {
        self.read_cached(None).await
    }

    async fn describe(&self) -> Result<Descriptors, SignalError> {
        self.describe_signal().await
    }

    fn as_stageable(&self) -> Option<&dyn Stageable> {
        Some(self)
    }
}

impl<T: SignalValue, A: CanWrite> Signal<T, A> {
    /// Writes `value`; the status completes when the backend reports the put done
    /// (immediately after sending when `wait` is false).
    pub fn set(&self, value: T, wait: bool) -> AsyncStatus {
        let inner = Arc::clone(&self.inner);
        AsyncStatus::new(async move {
            let backend = inner.backend()?;
            backend
                .put(value, wait)
                .await
                .map_err(|e| StatusError::from(inner.backend_error(e)))
        })
    }
}

impl<T: SignalValue, A: CanWrite> Movable<T> for Signal<T, A> {
    fn set(&self, value: T) -> AsyncStatus {
        Signal::set(self, value, true)
    }
}

#[async_trait]
impl<T: SignalValue, A: Access> Device for Signal<T, A> {
    fn core(&self) -> &DeviceCore {
        &self.inner.core
    }

    async fn connect(
        &self,
        prefix: &str,
        sim: bool,
        ctx: CancellationToken,
    ) -> Result<(), NotConnected> {
        let address = format!("{prefix}{}", self.inner.suffix);
        let backend: Arc<dyn SignalBackend<T>> = if sim {
            self.inner.sim.clone()
        } else {
            Arc::clone(&self.inner.backend)
        };
        let source = backend.source(&address);
        *lock(&self.inner.source) = source.clone();

        let res = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(NotConnected::leaf(source.clone())),
            r = backend.connect(&address) => {
                r.map_err(|e| NotConnected::leaf(format!("{source}: {e}")))
            }
        };
        if res.is_ok() {
            *lock(&self.inner.active) = Some(backend);
            self.inner.sync_monitor();
        } else {
            log::debug!("signal {:?} did not connect to {source}", self.inner.name());
        }
        res
    }
}

/// Pushes `value` through the simulated transport of `signal`.
///
/// Subscribers and cached readings see the value exactly as if it came from a
/// real transport.
pub fn set_sim_value<T: SignalValue, A: Access>(signal: &Signal<T, A>, value: T) {
    signal.sim_backend().set_value(value);
}

/// Controls whether waiting puts on the simulated transport complete.
pub fn set_sim_put_proceeds<T: SignalValue, A: Access>(signal: &Signal<T, A>, proceeds: bool) {
    signal.sim_backend().set_put_proceeds(proceeds);
}
