//! # AsyncStatus: cancellable handle over one spawned operation.
//!
//! [`AsyncStatus`] spawns the wrapped future immediately and records its outcome.
//!
//! ## States
//! ```text
//! pending ──► succeeded
//!        ├──► failed     (operation returned Err / panicked)
//!        └──► cancelled  (cancel() observed at the next suspension point)
//! ```
//! Terminal states are irreversible. On the terminal transition every queued
//! callback runs exactly once, in registration order.
//!
//! ## Rules
//! - `add_callback` on a finished status runs the callback **synchronously**
//! - `success()` before `done()` is a programming error and panics
//! - any number of tasks may `join()` the same status; all get the same outcome
//! - the runtime is either the current one ([`AsyncStatus::new`]) or an
//!   explicit handle ([`AsyncStatus::new_on`])
//!
//! ## Example
//! ```rust
//! use devicevisor::{AsyncStatus, StatusError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let status = AsyncStatus::new(async { Ok::<_, StatusError>(()) });
//!     status.clone().await.unwrap();
//!     assert!(status.done());
//!     assert!(status.success());
//! }
//! ```

use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::StatusError;
use crate::status::watcher::{WatcherUpdate, Watchers};
use crate::util::{lock, panic_message};

type Callback = Box<dyn FnOnce(&AsyncStatus) + Send + 'static>;

enum State {
    Pending(Vec<Callback>),
    Done(Result<(), StatusError>),
}

struct Inner {
    state: Mutex<State>,
    done: watch::Sender<bool>,
    cancel: CancellationToken,
    watchers: Option<Watchers>,
}

/// Observable, cancellable handle to one in-flight operation.
///
/// Cloning yields another handle to the same operation.
#[derive(Clone)]
pub struct AsyncStatus {
    inner: Arc<Inner>,
}

impl AsyncStatus {
    /// Spawns `fut` on the current tokio runtime and tracks it.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime (same as [`tokio::spawn`]).
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<(), StatusError>> + Send + 'static,
    {
        Self::new_on(&Handle::current(), fut)
    }

    /// Spawns `fut` on the given runtime handle and tracks it.
    pub fn new_on<F>(handle: &Handle, fut: F) -> Self
    where
        F: Future<Output = Result<(), StatusError>> + Send + 'static,
    {
        let status = Self::pending(None);
        status.drive(handle, fut);
        status
    }

    /// Builds the operation with a [`Watchers`] list it can report progress into,
    /// then spawns it on the current runtime.
    ///
    /// Sinks added later through [`watch`](Self::watch) land in the same list.
    pub fn with_watchers<M, F>(make: M) -> Self
    where
        M: FnOnce(Watchers) -> F,
        F: Future<Output = Result<(), StatusError>> + Send + 'static,
    {
        let watchers = Watchers::new();
        let fut = make(watchers.clone());
        let status = Self::pending(Some(watchers));
        status.drive(&Handle::current(), fut);
        status
    }

    /// A status that has already succeeded.
    pub fn completed() -> Self {
        let status = Self::pending(None);
        status.finish(Ok(()));
        status
    }

    /// A status that has already failed with `error`.
    pub fn failed(error: StatusError) -> Self {
        let status = Self::pending(None);
        status.finish(Err(error));
        status
    }

    fn pending(watchers: Option<Watchers>) -> Self {
        let (done, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Vec::new())),
                done,
                cancel: CancellationToken::new(),
                watchers,
            }),
        }
    }

    fn drive<F>(&self, handle: &Handle, fut: F)
    where
        F: Future<Output = Result<(), StatusError>> + Send + 'static,
    {
        let me = self.clone();
        let cancel = self.inner.cancel.clone();
        handle.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StatusError::Cancelled),
                res = AssertUnwindSafe(fut).catch_unwind() => match res {
                    Ok(r) => r,
                    Err(payload) => Err(StatusError::Panicked {
                        error: panic_message(&*payload),
                    }),
                },
            };
            me.finish(outcome);
        });
    }

    /// Moves to the terminal state and runs queued callbacks (once).
    fn finish(&self, outcome: Result<(), StatusError>) {
        let callbacks = {
            let mut state = lock(&self.inner.state);
            match std::mem::replace(&mut *state, State::Done(outcome)) {
                State::Pending(callbacks) => callbacks,
                State::Done(first) => {
                    *state = State::Done(first);
                    return;
                }
            }
        };
        self.inner.done.send_replace(true);
        for cb in callbacks {
            cb(self);
        }
    }

    fn outcome(&self) -> Option<Result<(), StatusError>> {
        match &*lock(&self.inner.state) {
            State::Pending(_) => None,
            State::Done(outcome) => Some(outcome.clone()),
        }
    }

    /// Waits until the status is terminal and returns the outcome.
    pub async fn join(&self) -> Result<(), StatusError> {
        let mut rx = self.inner.done.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|done| *done).await;
        self.outcome().unwrap_or(Err(StatusError::Cancelled))
    }

    /// Requests cancellation of the wrapped operation.
    ///
    /// The operation is dropped at its next suspension point; the status then
    /// ends as [`StatusError::Cancelled`]. Has no effect on a finished status.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Returns true once the status is terminal.
    pub fn done(&self) -> bool {
        matches!(&*lock(&self.inner.state), State::Done(_))
    }

    /// Returns true if the operation completed without error or cancellation.
    ///
    /// Failures are logged at error level and cancellation at debug level (the
    /// error itself stays available via [`join`](Self::join)).
    ///
    /// # Panics
    /// Panics if the status has not completed yet.
    pub fn success(&self) -> bool {
        match self.outcome() {
            Some(Ok(())) => true,
            Some(Err(e)) if e.is_cancelled() => {
                log::debug!("status was cancelled");
                false
            }
            Some(Err(e)) => {
                log::error!("failed status: {e}");
                false
            }
            None => panic!("status has not completed yet"),
        }
    }

    /// Like [`success`](Self::success) but returns `None` while pending.
    pub fn try_success(&self) -> Option<bool> {
        self.outcome().map(|o| o.is_ok())
    }

    /// The failure of a finished status, if any.
    pub fn error(&self) -> Option<StatusError> {
        self.outcome().and_then(Result::err)
    }

    /// Registers a callback for the terminal transition.
    ///
    /// Runs immediately if the status is already done; otherwise queued and run
    /// exactly once, in registration order, right after the terminal transition.
    pub fn add_callback(&self, callback: impl FnOnce(&AsyncStatus) + Send + 'static) {
        {
            let mut state = lock(&self.inner.state);
            if let State::Pending(callbacks) = &mut *state {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback(self);
    }

    /// Adds a progress watcher.
    ///
    /// Only statuses created through [`with_watchers`](Self::with_watchers) report
    /// progress; for the others this is a no-op.
    pub fn watch(&self, watcher: impl Fn(&WatcherUpdate) + Send + Sync + 'static) {
        if let Some(watchers) = &self.inner.watchers {
            watchers.push(watcher);
        }
    }
}

impl IntoFuture for AsyncStatus {
    type Output = Result<(), StatusError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.join().await })
    }
}

impl std::fmt::Debug for AsyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncStatus")
            .field("done", &self.done())
            .field("outcome", &self.outcome())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "current_thread")]
    async fn test_success_after_completion() {
        let status = AsyncStatus::new(async { Ok(()) });
        status.join().await.unwrap();
        assert!(status.done());
        assert!(status.success());
        assert_eq!(status.try_success(), Some(true));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failure_is_visible_in_success_and_join() {
        let status = AsyncStatus::new(async { Err(StatusError::failed("motor stalled")) });
        let err = status.join().await.unwrap_err();
        assert_eq!(err, StatusError::failed("motor stalled"));
        assert!(!status.success());
        assert_eq!(status.error(), Some(err));
    }

    #[tokio::test(flavor = "current_thread")]
    #[should_panic(expected = "status has not completed yet")]
    async fn test_success_before_done_panics() {
        let (_tx, rx) = oneshot::channel::<()>();
        let status = AsyncStatus::new(async move {
            let _ = rx.await;
            Ok(())
        });
        let _ = status.success();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_try_success_is_none_while_pending() {
        let (tx, rx) = oneshot::channel::<()>();
        let status = AsyncStatus::new(async move {
            let _ = rx.await;
            Ok(())
        });
        assert_eq!(status.try_success(), None);
        tx.send(()).unwrap();
        status.join().await.unwrap();
        assert_eq!(status.try_success(), Some(true));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancel_converts_to_false_and_cancelled() {
        let status = AsyncStatus::new(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        tokio::task::yield_now().await;
        status.cancel();
        assert_eq!(status.join().await, Err(StatusError::Cancelled));
        assert!(!status.success());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_callbacks_fire_once_in_registration_order() {
        let (tx, rx) = oneshot::channel::<()>();
        let status = AsyncStatus::new(async move {
            let _ = rx.await;
            Ok(())
        });

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            status.add_callback(move |s| {
                assert!(s.done());
                order.lock().unwrap().push(i);
            });
        }
        assert!(order.lock().unwrap().is_empty());

        tx.send(()).unwrap();
        status.join().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_callback_on_done_status_runs_synchronously() {
        let status = AsyncStatus::completed();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        status.add_callback(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = Arc::clone(&hits);
        status.add_callback(move |_| {
            h.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_callbacks_fire_on_cancel() {
        let status = AsyncStatus::new(std::future::pending());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        status.add_callback(move |s| {
            assert_eq!(s.try_success(), Some(false));
            h.fetch_add(1, Ordering::SeqCst);
        });
        status.cancel();
        let _ = status.join().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_panicking_operation_fails_status() {
        let status = AsyncStatus::new(async {
            if true {
                panic!("limit switch");
            }
            Ok(())
        });
        match status.join().await {
            Err(StatusError::Panicked { error }) => assert_eq!(error, "limit switch"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_many_joiners_see_same_outcome() {
        let status = AsyncStatus::new(async { Err(StatusError::failed("nope")) });
        let (a, b) = tokio::join!(status.join(), status.clone().into_future());
        assert_eq!(a, b);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_watchers_receive_progress() {
        let (tx, rx) = oneshot::channel::<()>();
        let status = AsyncStatus::with_watchers(|watchers| async move {
            let _ = rx.await;
            watchers.notify(&WatcherUpdate {
                name: "x".into(),
                current: 1.0,
                initial: 0.0,
                target: 2.0,
                unit: "mm".into(),
                precision: 1,
                time_elapsed: Duration::ZERO,
            });
            Ok(())
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        status.watch(move |u| s.lock().unwrap().push(u.fraction()));
        tx.send(()).unwrap();
        status.join().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.5]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_watch_without_watchers_is_ignored() {
        let status = AsyncStatus::completed();
        status.watch(|_| panic!("never called"));
        assert!(status.success());
    }

    #[test]
    fn test_new_on_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let status = AsyncStatus::new_on(rt.handle(), async { Ok(()) });
        rt.block_on(status.join()).unwrap();
        assert!(status.success());
    }
}
