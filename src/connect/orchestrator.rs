//! # Parallel connection of child devices.
//!
//! ```text
//!   connect_children(device, prefix, sim, ctx)
//!        │  one child token per child
//!        ▼
//!   wait_for_connection([(attr, child.connect(..)), ...])
//!        │  join_all: every child reaches a terminal state
//!        ▼
//!   Ok(())  or  NotConnected::Children([(attr, report), ...])   (registration order)
//! ```
//! - Zero children succeed trivially.
//! - One failing child never short-circuits the others.
//! - Cancelling `ctx` cancels every child token; children still pending report
//!   their sources and the orchestrator waits for all of them before returning.
//!
//! [`connect_with_timeout`] is the raising entry point bounded by a deadline.

use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::report::NotConnected;
use crate::device::Device;

/// A child's pending connect operation.
pub type ConnectFuture<'a> = BoxFuture<'a, Result<(), NotConnected>>;

/// Awaits every named connect operation and aggregates the failures.
///
/// # Example
/// ```
/// use futures::FutureExt;
/// use devicevisor::{NotConnected, wait_for_connection};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let err = wait_for_connection(vec![
///         ("ok".to_string(), async { Ok(()) }.boxed()),
///         ("bad".to_string(), async { Err(NotConnected::leaf("sim://BAD")) }.boxed()),
///     ])
///     .await
///     .unwrap_err();
///     assert_eq!(err.to_string(), "bad: sim://BAD");
///
///     assert!(wait_for_connection(vec![]).await.is_ok());
/// }
/// ```
pub async fn wait_for_connection(children: Vec<(String, ConnectFuture<'_>)>) -> Result<(), NotConnected> {
    let (names, futures): (Vec<String>, Vec<ConnectFuture<'_>>) = children.into_iter().unzip();
    let failed: Vec<(String, NotConnected)> = names
        .into_iter()
        .zip(join_all(futures).await)
        .filter_map(|(name, res)| res.err().map(|report| (name, report)))
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(NotConnected::Children(failed))
    }
}

/// Connects every registered child of `device` in parallel.
///
/// Children are keyed by their attribute name. Each child gets a child token of
/// `ctx`, so cancelling `ctx` reaches every still-pending child.
pub async fn connect_children(
    device: &dyn Device,
    prefix: &str,
    sim: bool,
    ctx: &CancellationToken,
) -> Result<(), NotConnected> {
    let children = device.children();
    let pending = children
        .iter()
        .map(|child| {
            (
                child.attr.clone(),
                child.device.connect(prefix, sim, ctx.child_token()),
            )
        })
        .collect();
    wait_for_connection(pending).await
}

/// Connects `device`, cancelling the attempt when `timeout` elapses.
///
/// `None` or a zero timeout waits forever. On expiry the connection is
/// cancelled and awaited, so the returned report names every device that had
/// not connected yet.
pub async fn connect_with_timeout(
    device: &dyn Device,
    prefix: &str,
    sim: bool,
    timeout: Option<Duration>,
) -> Result<(), NotConnected> {
    let ctx = CancellationToken::new();
    let connect = device.connect(prefix, sim, ctx.clone());
    tokio::pin!(connect);

    if let Some(dur) = timeout.filter(|d| *d > Duration::ZERO) {
        tokio::select! {
            res = &mut connect => return res,
            _ = time::sleep(dur) => {
                log::debug!("connect of {:?} timed out after {dur:?}, cancelling", device.name());
                ctx.cancel();
            }
        }
    }
    connect.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Child, DeviceCore};
    use crate::signal::{BackendResult, Reading, ReadingCallback, SignalBackend, SignalR, SubscriptionId};
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};

    /// Transport whose connect never finishes; counts how many were dropped.
    #[derive(Default)]
    struct Unreachable {
        cancelled: AtomicUsize,
    }

    struct CountOnDrop<'a>(&'a AtomicUsize);

    impl Drop for CountOnDrop<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SignalBackend<f64> for Unreachable {
        fn source(&self, address: &str) -> String {
            format!("ca://{address}")
        }
        async fn connect(&self, _address: &str) -> BackendResult<()> {
            let _guard = CountOnDrop(&self.cancelled);
            std::future::pending().await
        }
        async fn fetch(&self) -> BackendResult<Reading<f64>> {
            Ok(Reading::now(0.0))
        }
        async fn put(&self, _value: f64, _wait: bool) -> BackendResult<()> {
            Ok(())
        }
        fn subscribe(&self, _callback: ReadingCallback<f64>) -> SubscriptionId {
            SubscriptionId::next()
        }
        fn unsubscribe(&self, _id: SubscriptionId) {}
    }

    struct Group {
        core: DeviceCore,
        children: Vec<Child>,
    }

    impl Group {
        fn new(children: Vec<Child>) -> Arc<Self> {
            Arc::new_cyclic(|me: &Weak<Group>| {
                let core = DeviceCore::new();
                let me: Weak<dyn Device> = me.clone();
                core.bind(me);
                Group { core, children }
            })
        }
    }

    #[async_trait]
    impl Device for Group {
        fn core(&self) -> &DeviceCore {
            &self.core
        }
        fn children(&self) -> Vec<Child> {
            self.children.clone()
        }
        async fn connect(&self, prefix: &str, sim: bool, ctx: CancellationToken) -> Result<(), NotConnected> {
            connect_children(self, prefix, sim, &ctx).await
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_zero_children_succeed() {
        assert!(wait_for_connection(Vec::new()).await.is_ok());
        let empty = Group::new(Vec::new());
        assert!(connect_with_timeout(empty.as_ref(), "", true, None).await.is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_report_names_exactly_the_failing_children() {
        for n in 0..=5usize {
            for mask in 0..(1u32 << n) {
                let fails = |i: usize| mask & (1 << i) != 0;
                let futures: Vec<(String, ConnectFuture<'_>)> = (0..n)
                    .map(|i| {
                        let failing = fails(i);
                        let fut = async move {
                            if failing {
                                Err(NotConnected::leaf(format!("sim://dev{i}")))
                            } else {
                                Ok(())
                            }
                        };
                        (format!("dev{i}"), fut.boxed())
                    })
                    .collect();
                let expected: Vec<String> = (0..n).filter(|i| fails(*i)).map(|i| format!("dev{i}")).collect();

                match wait_for_connection(futures).await {
                    Ok(()) => assert!(expected.is_empty(), "n={n} mask={mask:b}"),
                    Err(err) => assert_eq!(err.failed_names(), expected, "n={n} mask={mask:b}"),
                }
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_report_keeps_registration_order() {
        let slow = async {
            time::sleep(Duration::from_millis(20)).await;
            Err(NotConnected::leaf("first"))
        };
        let fast = async { Err(NotConnected::leaf("second")) };
        let err = wait_for_connection(vec![("a".into(), slow.boxed()), ("b".into(), fast.boxed())])
            .await
            .unwrap_err();
        assert_eq!(err.lines(), vec!["a: first", "b: second"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_timeout_cancels_pending_children_only() {
        let backend = Arc::new(Unreachable::default());
        let velocity = SignalR::<f64>::new("Velo", backend.clone());
        let stop = SignalR::<f64>::new("Stop", backend.clone());
        let readback = SignalR::<f64>::sim("RBV");
        let y = SignalR::<f64>::sim("Y");
        let x = Group::new(vec![
            Child::new("readback", readback.as_device()),
            Child::new("velocity", velocity.as_device()),
        ]);
        let stage = Group::new(vec![
            Child::new("x", x.clone()),
            Child::new("y", y.as_device()),
            Child::new("stop_", stop.as_device()),
        ]);
        stage.set_name("stage");

        // `sim = false`: the sim-only signals use their simulated transport as the real one.
        let err = connect_with_timeout(stage.as_ref(), "BL01:", false, Some(Duration::from_millis(30)))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "x: velocity: ca://BL01:Velo\nstop_: ca://BL01:Stop"
        );
        assert_eq!(backend.cancelled.load(Ordering::SeqCst), 2);
        assert!(readback.is_connected() && y.is_connected());
        assert!(!velocity.is_connected() && !stop.is_connected());
        assert_eq!(readback.source(), "sim://BL01:RBV");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_prefix_builds_source_addresses() {
        let readback = SignalR::<f64>::sim("RBV");
        let x = Group::new(vec![Child::new("readback", Arc::new(readback.clone()))]);
        connect_with_timeout(x.as_ref(), "BL01:X:", true, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(readback.source(), "sim://BL01:X:RBV");
    }
}
