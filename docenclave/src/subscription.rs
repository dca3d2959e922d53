//! Cancellable change subscriptions.
//!
//! Live values (counters, active-session count, identity) travel over
//! `tokio::sync::watch` channels. [`Subscription::watch_with`] forwards them to
//! a callback on a background task; the returned handle owns that task.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running subscription.
///
/// The callback stops being invoked once [`Subscription::unsubscribe`] is
/// called or the handle is dropped.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Deliver the current value of `rx` to `callback`, then every change.
    ///
    /// Forwarding ends when the sender side is dropped. Must be called from
    /// within a tokio runtime.
    pub fn watch_with<T, F>(mut rx: watch::Receiver<T>, mut callback: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut(T) + Send + 'static,
    {
        Self::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            callback(initial);

            while rx.changed().await.is_ok() {
                let value = rx.borrow_and_update().clone();
                callback(value);
            }
        })
    }

    /// Run `forward` as the subscription's task.
    pub(crate) fn spawn<F>(forward: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(forward)),
        }
    }

    /// A subscription with nothing behind it.
    pub fn inert() -> Self {
        Self { task: None }
    }

    /// Check whether the forwarding task is still running.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop delivering changes.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
