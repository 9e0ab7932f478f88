//! # Soft bulk naming and connection of top-level devices.
//!
//! [`DeviceCollector`] takes explicit `(name, device)` pairs, names them and
//! connects them all in parallel within a deadline. Failures are **reported,
//! not raised**: they go to the subscribers, to `log::error!` and into the
//! returned [`CollectReport`], so setup can continue with partial results.
//!
//! ```text
//! collect()
//!   ├─► set_name(name) for each device            (cfg.set_name)
//!   ├─► ConnectStarting
//!   ├─► wait_for_connection([(name, connect), ..]) raced against cfg.timeout
//!   │      └─ deadline hit ─► ConnectTimedOut, cancel, await the rest
//!   ├─► DeviceConnected / DeviceNotConnected per device (registration order)
//!   └─► CollectFinished
//! ```
//!
//! [`CollectReport::into_result`] turns the soft outcome back into the raising
//! form when a caller prefers it.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use devicevisor::{CollectorConfig, DeviceCollector, SignalR};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let temperature = SignalR::<f64>::sim("TEMP");
//!     let cfg = CollectorConfig { sim: true, prefix: "BL01:".into(), ..Default::default() };
//!
//!     let report = DeviceCollector::new(cfg)
//!         .add("temperature", Arc::new(temperature.clone()))
//!         .collect()
//!         .await;
//!
//!     assert!(report.is_ok());
//!     assert_eq!(temperature.source(), "sim://BL01:TEMP");
//! }
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{ConnectFuture, wait_for_connection};
use super::report::NotConnected;
use crate::config::CollectorConfig;
use crate::device::Device;
use crate::events::{Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Outcome of one [`DeviceCollector::collect`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Devices that connected, in registration order.
    pub connected: Vec<String>,
    /// Devices that did not connect, in registration order.
    pub failures: Vec<(String, NotConnected)>,
    /// Whether the deadline was hit.
    pub timed_out: bool,
}

impl CollectReport {
    /// Returns true when every device connected.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the devices that did not connect.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Human-readable failure summary, `None` when everything connected.
    ///
    /// ```text
    /// 2 Devices did not connect:
    ///   det: NotConnected: sim://BL01:DET
    ///   stage: NotConnected
    ///     x: ca://BL01:X
    ///     y: ca://BL01:Y
    /// ```
    pub fn summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let mut msg = format!("{} Devices did not connect:", self.failures.len());
        for (name, report) in &self.failures {
            let lines = report.lines();
            if let [only] = lines.as_slice() {
                let _ = write!(msg, "\n  {name}: NotConnected: {only}");
            } else {
                let _ = write!(msg, "\n  {name}: NotConnected");
                for line in lines {
                    let _ = write!(msg, "\n    {line}");
                }
            }
        }
        Some(msg)
    }

    /// Raising view: `Err` with one entry per failed device.
    pub fn into_result(self) -> Result<Vec<String>, NotConnected> {
        if self.failures.is_empty() {
            Ok(self.connected)
        } else {
            Err(NotConnected::Children(self.failures))
        }
    }
}

/// Builder for a bulk naming/connection pass over explicit `(name, device)` pairs.
pub struct DeviceCollector {
    cfg: CollectorConfig,
    devices: Vec<(String, Arc<dyn Device>)>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DeviceCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new(cfg: CollectorConfig) -> Self {
        Self {
            cfg,
            devices: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Registers a device under `name`.
    #[must_use]
    pub fn add(mut self, name: impl Into<String>, device: Arc<dyn Device>) -> Self {
        self.devices.push((name.into(), device));
        self
    }

    /// Adds event subscribers (the reporting hook).
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Names and connects every registered device; never fails.
    pub async fn collect(self) -> CollectReport {
        let set = SubscriberSet::new(self.subscribers, self.cfg.queue_capacity);

        if self.cfg.set_name {
            for (name, device) in &self.devices {
                device.set_name(name);
            }
        }

        let mut report = CollectReport::default();
        if self.cfg.connect && !self.devices.is_empty() {
            report = connect_all(&self.devices, &self.cfg, &set).await;
        }

        if let Some(summary) = report.summary() {
            log::error!("{summary}");
            set.emit(
                &Event::new(EventKind::CollectFinished)
                    .with_failed(report.failures.len())
                    .with_reason(summary),
            );
        } else {
            set.emit(&Event::new(EventKind::CollectFinished).with_failed(0));
        }
        set.shutdown().await;
        report
    }
}

async fn connect_all(
    devices: &[(String, Arc<dyn Device>)],
    cfg: &CollectorConfig,
    set: &SubscriberSet,
) -> CollectReport {
    let timeout = cfg.connect_timeout();
    let mut starting = Event::new(EventKind::ConnectStarting);
    if let Some(t) = timeout {
        starting = starting.with_timeout(t);
    }
    set.emit(&starting);

    let ctx = CancellationToken::new();
    let pending: Vec<(String, ConnectFuture<'_>)> = devices
        .iter()
        .map(|(name, device)| {
            (
                name.clone(),
                device.connect(&cfg.prefix, cfg.sim, ctx.child_token()),
            )
        })
        .collect();
    let connect = wait_for_connection(pending);
    tokio::pin!(connect);

    let mut timed_out = false;
    let res = match timeout {
        Some(dur) => {
            tokio::select! {
                res = &mut connect => res,
                _ = time::sleep(dur) => {
                    timed_out = true;
                    log::warn!("devices did not connect within {dur:?}, cancelling");
                    set.emit(&Event::new(EventKind::ConnectTimedOut).with_timeout(dur));
                    ctx.cancel();
                    connect.await
                }
            }
        }
        None => connect.await,
    };

    let failures = match res {
        Ok(()) => Vec::new(),
        Err(report) => report.into_entries("devices"),
    };
    let mut connected = Vec::new();
    for (name, _) in devices {
        match failures.iter().find(|(n, _)| n == name) {
            Some((_, report)) => set.emit(
                &Event::new(EventKind::DeviceNotConnected)
                    .with_device(name.as_str())
                    .with_reason(report.to_string()),
            ),
            None => {
                set.emit(&Event::new(EventKind::DeviceConnected).with_device(name.as_str()));
                connected.push(name.clone());
            }
        }
    }

    CollectReport {
        connected,
        failures,
        timed_out,
    }
}
