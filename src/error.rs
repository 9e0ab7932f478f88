//! Error types used by devicevisor statuses, signals and waits.
//!
//! This module defines three error enums:
//!
//! - [`StatusError`]: outcome of a failed or cancelled [`AsyncStatus`](crate::AsyncStatus).
//! - [`SignalError`]: errors raised while reading or writing a signal.
//! - [`WaitError`]: errors raised by [`wait_for_value`](crate::wait_for_value).
//!
//! Connection failures have their own hierarchical report type,
//! [`NotConnected`](crate::NotConnected).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by an [`AsyncStatus`](crate::AsyncStatus).
///
/// Cloneable so every joiner of the same status observes the same outcome.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The wrapped operation returned an error.
    #[error("operation failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The wrapped operation exceeded its deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The status was cancelled before the operation finished.
    #[error("status cancelled")]
    Cancelled,

    /// The task driving the operation panicked.
    #[error("operation panicked: {error}")]
    Panicked {
        /// Panic payload rendered as text.
        error: String,
    },
}

impl StatusError {
    /// Shorthand for [`StatusError::Failed`] from anything displayable.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        StatusError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use devicevisor::StatusError;
    ///
    /// assert_eq!(StatusError::Cancelled.as_label(), "status_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StatusError::Failed { .. } => "status_failed",
            StatusError::Timeout { .. } => "status_timeout",
            StatusError::Cancelled => "status_cancelled",
            StatusError::Panicked { .. } => "status_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StatusError::Failed { error } => format!("error: {error}"),
            StatusError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            StatusError::Cancelled => "cancelled".to_string(),
            StatusError::Panicked { error } => format!("panic: {error}"),
        }
    }

    /// Indicates whether the status ended because somebody asked it to stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StatusError::Cancelled)
    }
}

/// # Errors produced by signal access.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The signal was used before `connect` succeeded.
    #[error("signal {signal:?} is not connected")]
    Disconnected {
        /// Name of the signal.
        signal: String,
    },

    /// A cached read was requested while the signal is not monitored.
    #[error("signal {signal:?} is not monitored, no cached value available")]
    NotCached {
        /// Name of the signal.
        signal: String,
    },

    /// The transport reported an error.
    #[error("signal {signal:?}: {error}")]
    Backend {
        /// Name of the signal.
        signal: String,
        /// The transport error message.
        error: String,
    },

    /// The value could not be converted into a reading.
    #[error("signal {signal:?}: cannot encode value: {error}")]
    Encode {
        /// Name of the signal.
        signal: String,
        /// The serializer error message.
        error: String,
    },
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::Disconnected { .. } => "signal_disconnected",
            SignalError::NotCached { .. } => "signal_not_cached",
            SignalError::Backend { .. } => "signal_backend",
            SignalError::Encode { .. } => "signal_encode",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

impl From<SignalError> for StatusError {
    fn from(e: SignalError) -> Self {
        StatusError::failed(e)
    }
}

/// # Errors produced while waiting for a signal value.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// No matching value arrived before the deadline.
    #[error("timed out after {timeout:?} waiting for {signal:?} to match")]
    Timeout {
        /// Name of the observed signal.
        signal: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The value stream ended before a matching value arrived.
    #[error("value stream of {signal:?} closed before a match")]
    Closed {
        /// Name of the observed signal.
        signal: String,
    },
}

impl WaitError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use devicevisor::WaitError;
    /// use std::time::Duration;
    ///
    /// let err = WaitError::Timeout { signal: "det-count".into(), timeout: Duration::from_millis(50) };
    /// assert_eq!(err.as_label(), "wait_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Timeout { .. } => "wait_timeout",
            WaitError::Closed { .. } => "wait_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WaitError::Timeout { signal, timeout } => {
                format!("signal={signal} timeout={timeout:?}")
            }
            WaitError::Closed { signal } => format!("signal={signal} closed"),
        }
    }
}

impl From<WaitError> for StatusError {
    fn from(e: WaitError) -> Self {
        match e {
            WaitError::Timeout { timeout, .. } => StatusError::Timeout { timeout },
            other => StatusError::failed(other),
        }
    }
}
