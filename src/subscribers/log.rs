//! # LogWriter: collector events through the `log` facade
//!
//! A minimal subscriber that renders incoming [`Event`]s as log records.
//! Which backend prints them is up to the application.
//!
//! ## Example output
//! ```text
//! INFO  [connect-starting] timeout_ms=10000
//! DEBUG [connected] device="det"
//! ERROR [not-connected] device="stage" report="x: sim://BL01:X"
//! WARN  [timeout] timeout_ms=10000
//! INFO  [collect-finished] failed=1
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let device = e.device.as_deref().unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ConnectStarting => {
                log::info!("[connect-starting] timeout_ms={:?}", e.timeout_ms);
            }
            EventKind::DeviceConnected => {
                log::debug!("[connected] device={device:?}");
            }
            EventKind::DeviceNotConnected => {
                log::error!("[not-connected] device={device:?} report={reason:?}");
            }
            EventKind::ConnectTimedOut => {
                log::warn!("[timeout] timeout_ms={:?}", e.timeout_ms);
            }
            EventKind::CollectFinished => {
                log::info!("[collect-finished] failed={:?}", e.failed);
            }
            EventKind::SubscriberOverflow => {
                log::warn!("[subscriber-overflow] subscriber={device} reason={reason}");
            }
            EventKind::SubscriberPanicked => {
                log::error!("[subscriber-panicked] subscriber={device} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
