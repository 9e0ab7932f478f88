//! # Push-to-pull bridge for signal values.
//!
//! [`observe_value`] turns the callback-style [`Subscribable`] capability into a
//! [`Stream`] of values:
//!
//! ```text
//! first poll ──► subscribe_value(tx) ──► values queue in an unbounded FIFO
//! next()     ──► oldest queued value (waits if empty)
//! drop       ──► clear_sub(id), exactly once
//! ```
//!
//! Dropping the stream is the only release path, so it also covers a consumer
//! that was cancelled, timed out or panicked.
//!
//! [`wait_for_value`] consumes such a stream until a value satisfies a [`Match`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::backend::SubscriptionId;
use crate::capabilities::Subscribable;
use crate::device::Device;
use crate::error::WaitError;

/// Stream of values produced by a subscribable device.
///
/// Created by [`observe_value`]. Infinite and non-restartable.
pub struct ObserveValue<T> {
    signal: Arc<dyn Subscribable<T>>,
    sub: Option<(SubscriptionId, mpsc::UnboundedReceiver<T>)>,
}

impl<T: Clone + Send + 'static> ObserveValue<T> {
    /// Wraps `signal` without subscribing yet.
    pub fn new(signal: Arc<dyn Subscribable<T>>) -> Self {
        Self { signal, sub: None }
    }

    /// Returns true once the first poll registered the subscription.
    pub fn is_subscribed(&self) -> bool {
        self.sub.is_some()
    }
}

impl<T: Clone + Send + 'static> Stream for ObserveValue<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let signal = &this.signal;
        let (_, rx) = this.sub.get_or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = signal.subscribe_value(Arc::new(move |v: &T| {
                let _ = tx.send(v.clone());
            }));
            (id, rx)
        });
        rx.poll_recv(cx)
    }
}

impl<T> Drop for ObserveValue<T> {
    fn drop(&mut self) {
        if let Some((id, _)) = self.sub.take() {
            self.signal.clear_sub(id);
        }
    }
}

/// Observes every value `signal` produces, starting with its current value.
///
/// # Example
/// ```
/// use futures::StreamExt;
/// use tokio_util::sync::CancellationToken;
/// use devicevisor::{Device, SignalR, observe_value, set_sim_value};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let count = SignalR::<i64>::sim("Count");
///     count.set_name("det-count");
///     count.connect("", true, CancellationToken::new()).await.unwrap();
///
///     let mut values = observe_value(&count);
///     assert_eq!(values.next().await, Some(0));
///     set_sim_value(&count, 5);
///     assert_eq!(values.next().await, Some(5));
/// }
/// ```
pub fn observe_value<T, S>(signal: &S) -> ObserveValue<T>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + Clone + 'static,
{
    ObserveValue::new(Arc::new(signal.clone()))
}

/// Condition a value must satisfy in [`wait_for_value`].
pub struct Match<T>(Box<dyn Fn(&T) -> bool + Send + Sync>);

impl<T: Send + Sync + 'static> Match<T> {
    /// Matches values equal to `expected`.
    pub fn eq(expected: T) -> Self
    where
        T: PartialEq,
    {
        Self(Box::new(move |v| *v == expected))
    }

    /// Matches values for which `f` returns true.
    pub fn predicate(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Tests `value` against this condition.
    pub fn matches(&self, value: &T) -> bool {
        (self.0)(value)
    }
}

impl<T> std::fmt::Debug for Match<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Match(..)")
    }
}

/// Waits until `signal` produces a value accepted by `matcher`.
///
/// `timeout = None` waits forever. The subscription is released on every
/// outcome, including when the returned future is dropped.
///
/// # Errors
/// - [`WaitError::Timeout`] when no value matched in time;
/// - [`WaitError::Closed`] when the value stream ended first.
pub async fn wait_for_value<T, S>(
    signal: &S,
    matcher: Match<T>,
    timeout: Option<Duration>,
) -> Result<(), WaitError>
where
    T: Clone + Send + Sync + 'static,
    S: Subscribable<T> + Device + Clone + 'static,
{
    let mut values = observe_value(signal);
    let wait = async {
        while let Some(value) = values.next().await {
            if matcher.matches(&value) {
                return Ok(());
            }
        }
        Err(WaitError::Closed {
            signal: signal.name().to_string(),
        })
    };
    match timeout {
        None => wait.await,
        Some(limit) => tokio::time::timeout(limit, wait).await.unwrap_or_else(|_| {
            Err(WaitError::Timeout {
                signal: signal.name().to_string(),
                timeout: limit,
            })
        }),
    }
}
