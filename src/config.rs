//! # Bulk-connect configuration.
//!
//! [`CollectorConfig`] controls what a [`DeviceCollector`](crate::DeviceCollector)
//! does with its devices: naming, connecting, simulation, address prefix,
//! deadline and the queue size of the event subscribers.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use devicevisor::CollectorConfig;
//!
//! let mut cfg = CollectorConfig::default();
//! cfg.sim = true;
//! cfg.prefix = "BL01:".into();
//! cfg.timeout = Duration::from_secs(2);
//!
//! assert_eq!(cfg.connect_timeout(), Some(Duration::from_secs(2)));
//! ```

use std::time::Duration;

/// Configuration of one bulk naming/connection pass.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Name each device after its registered name.
    pub set_name: bool,
    /// Connect the devices.
    pub connect: bool,
    /// Connect through simulated transports.
    pub sim: bool,
    /// Prefix passed to every device's connect.
    pub prefix: String,
    /// Deadline for the whole connection pass (0 = no deadline).
    pub timeout: Duration,
    /// Default queue capacity of event subscribers.
    pub queue_capacity: usize,
}

impl Default for CollectorConfig {
    /// Provides a default configuration:
    /// - `set_name = true`, `connect = true`, `sim = false`
    /// - `prefix = ""`
    /// - `timeout = 10s`
    /// - `queue_capacity = 1024`
    fn default() -> Self {
        Self {
            set_name: true,
            connect: true,
            sim: false,
            prefix: String::new(),
            timeout: Duration::from_secs(10),
            queue_capacity: 1024,
        }
    }
}

impl CollectorConfig {
    /// Returns the connection deadline, or `None` when `timeout` is zero.
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }
}
