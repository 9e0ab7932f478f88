//! # StandardReadable: a composite that reads, describes and stages its signals.
//!
//! Built once with an explicit, ordered list of children:
//!
//! ```text
//! StandardReadable::builder("BL01:X:")
//!     .primary("readback", readback)      read[0], re-keyed to the composite's name
//!     .read("limit", limit)               cached reads, in call order
//!     .read_uncached("temp", temp)        fresh reads, after the cached ones
//!     .config("velocity", velocity)       read_configuration()
//!     .name("x")
//!     .build()
//! ```
//!
//! ## Lifecycle
//! ```text
//! unstaged ──stage()──► staged ──unstage()──► unstaged   (re-enterable)
//! ```
//! `stage()` and `unstage()` return `[self, ..what each read/config entry staged]`.
//! Entries without a stage capability (uncached reads) are skipped.
//!
//! ## Reading
//! `read()` / `describe()` gather every read entry concurrently and merge the
//! maps in construction order; later keys win. The configuration variants do the
//! same over the config list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::merge::merge_gathered;
use super::wrappers::{Renamed, Uncached};
use crate::capabilities::{AsyncReadable, Configurable, Stageable};
use crate::connect::{NotConnected, connect_children};
use crate::device::{Child, Device, DeviceCore};
use crate::error::SignalError;
use crate::signal::{CanRead, Descriptors, Readings, Signal, SignalValue};

/// Composite device presenting its signals through one read/describe/stage contract.
pub struct StandardReadable {
    core: DeviceCore,
    prefix: String,
    children: Vec<Child>,
    read: Vec<Arc<dyn AsyncReadable>>,
    config: Vec<Arc<dyn AsyncReadable>>,
    staged: AtomicBool,
}

impl StandardReadable {
    /// Starts a builder; `prefix` is appended to the connect prefix of every child.
    pub fn builder(prefix: impl Into<String>) -> StandardReadableBuilder {
        StandardReadableBuilder {
            prefix: prefix.into(),
            name: String::new(),
            children: Vec::new(),
            primary: None,
            read: Vec::new(),
            uncached: Vec::new(),
            config: Vec::new(),
        }
    }

    /// Prefix given at construction.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true between `stage()` and `unstage()`.
    pub fn is_staged(&self) -> bool {
        self.staged.load(Ordering::Acquire)
    }

    fn entries(&self) -> impl Iterator<Item = &Arc<dyn AsyncReadable>> {
        self.read.iter().chain(self.config.iter())
    }
}

impl std::fmt::Debug for StandardReadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardReadable")
            .field("name", &self.name())
            .field("prefix", &self.prefix)
            .field("children", &self.children)
            .field("staged", &self.is_staged())
            .finish()
    }
}

#[async_trait]
impl Device for StandardReadable {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn children(&self) -> Vec<Child> {
        self.children.clone()
    }

    async fn connect(&self, prefix: &str, sim: bool, ctx: CancellationToken) -> Result<(), NotConnected> {
        connect_children(self, &format!("{prefix}{}", self.prefix), sim, &ctx).await
    }
}

impl Stageable for StandardReadable {
    fn stage(&self) -> Vec<Arc<dyn Device>> {
        self.staged.store(true, Ordering::Release);
        let mut staged: Vec<Arc<dyn Device>> = self.core.this().into_iter().collect();
        for entry in self.entries() {
            if let Some(s) = entry.as_stageable() {
                staged.extend(s.stage());
            }
        }
        staged
    }

    fn unstage(&self) -> Vec<Arc<dyn Device>> {
        self.staged.store(false, Ordering::Release);
        let mut unstaged: Vec<Arc<dyn Device>> = self.core.this().into_iter().collect();
        for entry in self.entries() {
            if let Some(s) = entry.as_stageable() {
                unstaged.extend(s.unstage());
            }
        }
        unstaged
    }
}

#[async_trait]
impl AsyncReadable for StandardReadable {
    async fn read(&self) -> Result<Readings, SignalError> {
        merge_gathered(self.read.iter().map(|r| r.read())).await
    }

    async fn describe(&self) -> Result<Descriptors, SignalError> {
        merge_gathered(self.read.iter().map(|r| r.describe())).await
    }

    fn as_stageable(&self) -> Option<&dyn Stageable> {
        Some(self)
    }
}

#[async_trait]
impl Configurable for StandardReadable {
    async fn read_configuration(&self) -> Result<Readings, SignalError> {
        merge_gathered(self.config.iter().map(|r| r.read())).await
    }

    async fn describe_configuration(&self) -> Result<Descriptors, SignalError> {
        merge_gathered(self.config.iter().map(|r| r.describe())).await
    }
}

/// Builder for [`StandardReadable`].
///
/// Every signal passed to a read/config method is also registered as a child
/// under its attribute name. Passing the same device twice under one attribute
/// registers it once.
///
/// # Panics
/// Each method panics if `attr` is already registered to a different device.
#[must_use]
pub struct StandardReadableBuilder {
    prefix: String,
    name: String,
    children: Vec<Child>,
    primary: Option<Arc<dyn AsyncReadable>>,
    read: Vec<Arc<dyn AsyncReadable>>,
    uncached: Vec<Arc<dyn AsyncReadable>>,
    config: Vec<Arc<dyn AsyncReadable>>,
}

impl StandardReadableBuilder {
    fn register(&mut self, attr: &str, device: Arc<dyn Device>) {
        match self.children.iter().find(|c| c.attr == attr) {
            None => self.children.push(Child::new(attr, device)),
            Some(existing) => assert!(
                Arc::ptr_eq(&existing.device, &device),
                "attribute {attr:?} is already registered to a different device"
            ),
        }
    }

    /// Registers a child device that is neither read nor configured.
    pub fn child(mut self, attr: &str, device: Arc<dyn Device>) -> Self {
        self.register(attr, device);
        self
    }

    /// Designates the headline signal, read under the composite's own name.
    ///
    /// A second call replaces the first primary (the child stays registered).
    pub fn primary<T: SignalValue, A: CanRead>(mut self, attr: &str, signal: Signal<T, A>) -> Self {
        self.register(attr, signal.as_device());
        self.primary = Some(Arc::new(signal));
        self
    }

    /// Adds a signal to `read()`, served from cache while staged.
    pub fn read<T: SignalValue, A: CanRead>(mut self, attr: &str, signal: Signal<T, A>) -> Self {
        self.register(attr, signal.as_device());
        self.read.push(Arc::new(signal));
        self
    }

    /// Adds any readable device (e.g. a nested composite) to `read()`.
    pub fn read_readable<D>(mut self, attr: &str, device: Arc<D>) -> Self
    where
        D: Device + AsyncReadable,
    {
        self.register(attr, device.clone());
        self.read.push(device);
        self
    }

    /// Adds a signal to `read()` that is always fetched fresh.
    pub fn read_uncached<T: SignalValue, A: CanRead>(mut self, attr: &str, signal: Signal<T, A>) -> Self {
        self.register(attr, signal.as_device());
        self.uncached.push(Arc::new(Uncached::new(signal)));
        self
    }

    /// Adds a signal to `read_configuration()`.
    pub fn config<T: SignalValue, A: CanRead>(mut self, attr: &str, signal: Signal<T, A>) -> Self {
        self.register(attr, signal.as_device());
        self.config.push(Arc::new(signal));
        self
    }

    /// Names the composite (and its children) right after construction.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the composite. Read order: primary, cached reads, uncached reads.
    pub fn build(self) -> Arc<StandardReadable> {
        let Self {
            prefix,
            name,
            children,
            primary,
            read,
            uncached,
            config,
        } = self;

        let readable = Arc::new_cyclic(|me: &Weak<StandardReadable>| {
            let me: Weak<dyn Device> = me.clone();
            let core = DeviceCore::new();
            core.bind(me.clone());

            let mut entries: Vec<Arc<dyn AsyncReadable>> = Vec::with_capacity(read.len() + uncached.len() + 1);
            if let Some(primary) = primary {
                entries.push(Arc::new(Renamed::new(primary, me)));
            }
            entries.extend(read);
            entries.extend(uncached);

            StandardReadable {
                core,
                prefix,
                children,
                read: entries,
                config,
                staged: AtomicBool::new(false),
            }
        });
        readable.set_name(&name);
        readable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use crate::signal::{SignalR, SignalRW, observe_value, set_sim_value};
    use crate::status::{AsyncStatus, WatcherUpdate};
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    async fn connect(device: &dyn Device, prefix: &str) {
        device
            .connect(prefix, true, CancellationToken::new())
            .await
            .unwrap();
    }

    fn names(devices: &[Arc<dyn Device>]) -> Vec<String> {
        devices.iter().map(|d| d.name().to_string()).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_primary_is_rekeyed_to_composite_name() {
        let readback = SignalR::<f64>::sim("Readback");
        let limit = SignalR::<bool>::sim("Limit");
        let x = StandardReadable::builder("X:")
            .primary("readback", readback.clone())
            .read("limit", limit.clone())
            .name("x")
            .build();
        connect(x.as_ref(), "BL01:").await;
        set_sim_value(&readback, 2.5);

        let r = x.read().await.unwrap();
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["x", "x-limit"]);
        assert_eq!(r["x"].value, json!(2.5));
        assert_eq!(r["x-limit"].value, json!(false));

        let d = x.describe().await.unwrap();
        assert_eq!(d["x"].source, "sim://BL01:X:Readback");
        assert_eq!(d["x-limit"].dtype, "boolean");
        assert_eq!(readback.name(), "x-readback");
        assert_eq!(readback.parent().map(|p| p.name().to_string()).as_deref(), Some("x"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_stage_returns_self_then_children_in_order() {
        let readback = SignalR::<f64>::sim("Readback");
        let count = SignalR::<i64>::sim("Count");
        let velocity = SignalRW::<f64>::sim("Velocity");
        let x = StandardReadable::builder("")
            .primary("readback", readback.clone())
            .read("count", count.clone())
            .config("velocity", velocity.clone())
            .name("x")
            .build();
        connect(x.as_ref(), "").await;

        let staged = x.stage();
        assert_eq!(names(&staged), vec!["x", "x-readback", "x-count", "x-velocity"]);
        assert!(x.is_staged());
        assert!(readback.is_monitored() && count.is_monitored() && velocity.is_monitored());

        let unstaged = x.unstage();
        assert_eq!(names(&unstaged), vec!["x", "x-readback", "x-count", "x-velocity"]);
        assert!(!readback.is_monitored());
        // Tolerant when nothing is staged.
        assert_eq!(x.unstage().len(), 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_uncached_entry_is_not_staged_and_reads_fresh() {
        let count = SignalR::<i64>::sim("Count");
        let temp = SignalR::<f64>::sim("Temp");
        let det = StandardReadable::builder("DET:")
            .read("count", count.clone())
            .read_uncached("temp", temp.clone())
            .name("det")
            .build();
        connect(det.as_ref(), "").await;

        assert_eq!(names(&det.stage()), vec!["det", "det-count"]);
        assert!(!temp.is_monitored());
        set_sim_value(&temp, 21.5);
        let r = det.read().await.unwrap();
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["det-count", "det-temp"]);
        assert_eq!(r["det-temp"].value, json!(21.5));
        det.unstage();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_configuration_uses_config_list() {
        let mode = SignalRW::<String>::sim("Mode");
        let value = SignalR::<f64>::sim("Value");
        let sensor = StandardReadable::builder("SENSOR:")
            .read("value", value)
            .config("mode", mode.clone())
            .name("sensor")
            .build();
        connect(sensor.as_ref(), "BL01:").await;
        mode.set("High Energy".to_string(), true).await.unwrap();

        let conf = sensor.read_configuration().await.unwrap();
        assert_eq!(conf.keys().collect::<Vec<_>>(), vec!["sensor-mode"]);
        assert_eq!(conf["sensor-mode"].value, json!("High Energy"));
        let d = sensor.describe_configuration().await.unwrap();
        assert_eq!(d["sensor-mode"].source, "sim://BL01:SENSOR:Mode");
        assert!(!sensor.read().await.unwrap().contains_key("sensor-mode"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_nested_composites_compose_names_and_prefixes() {
        let x_rbv = SignalR::<f64>::sim("Readback");
        let y_rbv = SignalR::<f64>::sim("Readback");
        let x = StandardReadable::builder("X:").primary("readback", x_rbv.clone()).build();
        let y = StandardReadable::builder("Y:").primary("readback", y_rbv.clone()).build();
        let stage = StandardReadable::builder("STAGE:")
            .read_readable("x", x.clone())
            .child("y", y.clone())
            .name("stage")
            .build();
        connect(stage.as_ref(), "BL01:").await;

        assert_eq!(x_rbv.name(), "stage-x-readback");
        assert_eq!(y.name(), "stage-y");
        assert_eq!(y_rbv.source(), "sim://BL01:STAGE:Y:Readback");
        assert_eq!(names(&stage.stage()), vec!["stage", "stage-x", "stage-x-readback"]);
        assert_eq!(stage.read().await.unwrap().keys().collect::<Vec<_>>(), vec!["stage-x"]);
        stage.unstage();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_read_of_disconnected_composite_fails() {
        let x = StandardReadable::builder("X:")
            .primary("readback", SignalR::<f64>::sim("Readback"))
            .name("x")
            .build();
        let err = x.read().await.unwrap_err();
        assert_eq!(err.as_label(), "signal_disconnected");
    }

    /// Motor-like composite: moves the setpoint and follows the readback.
    struct Mover {
        base: Arc<StandardReadable>,
        setpoint: SignalRW<f64>,
        readback: SignalR<f64>,
    }

    impl Mover {
        fn new(prefix: &str, name: &str) -> Self {
            let setpoint = SignalRW::<f64>::sim("Setpoint");
            let readback = SignalR::<f64>::sim("Readback");
            let base = StandardReadable::builder(prefix)
                .primary("readback", readback.clone())
                .child("setpoint", Arc::new(setpoint.clone()))
                .config("velocity", SignalRW::<f64>::sim("Velocity"))
                .config("units", SignalR::<String>::sim("Readback.EGU"))
                .name(name)
                .build();
            Self {
                base,
                setpoint,
                readback,
            }
        }

        fn set(&self, target: f64) -> AsyncStatus {
            let setpoint = self.setpoint.clone();
            let readback = self.readback.clone();
            let name = self.base.name().to_string();
            AsyncStatus::with_watchers(move |watchers| async move {
                let start = Instant::now();
                let initial = setpoint.get_value(None).await?;
                setpoint.set(target, false).await?;
                let mut positions = observe_value(&readback);
                while let Some(current) = positions.next().await {
                    watchers.notify(&WatcherUpdate {
                        name: name.clone(),
                        current,
                        initial,
                        target,
                        unit: "mm".into(),
                        precision: 3,
                        time_elapsed: start.elapsed(),
                    });
                    if (current - target).abs() < 1e-9 {
                        return Ok(());
                    }
                }
                Err(StatusError::failed("readback stream closed"))
            })
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_mover_reports_progress_until_readback_arrives() {
        let mover = Mover::new("BL01:X:", "x");
        connect(mover.base.as_ref(), "").await;

        let status = mover.set(1.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        status.watch(move |u: &WatcherUpdate| s.lock().unwrap().push((u.name.clone(), u.current)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!status.done());
        set_sim_value(&mover.readback, 0.5);
        set_sim_value(&mover.readback, 1.0);
        status.join().await.unwrap();

        assert!(status.success());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("x".to_string(), 0.0), ("x".to_string(), 0.5), ("x".to_string(), 1.0)]
        );
        assert_eq!(mover.setpoint.sim_backend().value(), 1.0);
        assert_eq!(mover.readback.subscriber_count(), 0);
        assert_eq!(mover.base.read().await.unwrap()["x"].value, json!(1.0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancelled_move_releases_readback_subscription() {
        let mover = Mover::new("BL01:X:", "x");
        connect(mover.base.as_ref(), "").await;

        let status = mover.set(5.0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mover.readback.subscriber_count(), 1);

        status.cancel();
        assert_eq!(status.join().await, Err(StatusError::Cancelled));
        assert!(!status.success());
        assert_eq!(mover.readback.subscriber_count(), 0);
    }

    #[test]
    #[should_panic(expected = "already registered to a different device")]
    fn test_attribute_reused_for_another_signal_is_rejected() {
        let _ = StandardReadable::builder("SENSOR:")
            .read("value", SignalR::<f64>::sim("Value"))
            .config("value", SignalR::<f64>::sim("Other"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_same_signal_under_one_attribute_is_registered_once() {
        let value = SignalRW::<f64>::sim("Value");
        let sensor = StandardReadable::builder("SENSOR:")
            .read("value", value.clone())
            .config("value", value.clone())
            .name("sensor")
            .build();
        assert_eq!(sensor.children().len(), 1);
        connect(sensor.as_ref(), "BL01:").await;
        value.set(3.0, true).await.unwrap();

        assert_eq!(value.name(), "sensor-value");
        assert_eq!(sensor.read().await.unwrap()["sensor-value"].value, json!(3.0));
        assert_eq!(sensor.read_configuration().await.unwrap()["sensor-value"].value, json!(3.0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_read_keys_follow_declaration_order() {
        let d = StandardReadable::builder("D:")
            .read("z", SignalR::<f64>::sim("Z"))
            .read("a", SignalR::<f64>::sim("A"))
            .name("d")
            .build();
        connect(d.as_ref(), "").await;
        assert_eq!(d.read().await.unwrap().keys().collect::<Vec<_>>(), vec!["d-z", "d-a"]);
        assert_eq!(d.describe().await.unwrap().keys().collect::<Vec<_>>(), vec!["d-z", "d-a"]);
    }
}
