//! One-shot bridge from an external interrupt to the watch loop.

use std::future::{pending, Future};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

/// Background task that waits for an interrupt and fires a [`CancellationTrigger`] once.
///
/// Dropping the listener stops it; a trigger whose listener is gone never fires.
#[derive(Debug)]
pub struct CancellationListener {
    handle: JoinHandle<()>,
}

impl CancellationListener {
    /// Spawn a listener that fires once `signal` resolves.
    pub fn spawn<F>(signal: F) -> (Self, CancellationTrigger)
    where
        F: Future + Send + 'static,
        F::Output: Send,
    {
        let (sender, receiver) = oneshot::channel();
        let handle = tokio::spawn(async move {
            signal.await;
            if sender.send(()).is_ok() {
                tracing::info!("interrupt received; cancelling watch");
            }
        });
        (
            Self { handle },
            CancellationTrigger {
                receiver: Some(receiver),
                fired: false,
            },
        )
    }

    /// Listen for Ctrl-C on the current process.
    pub fn ctrl_c() -> (Self, CancellationTrigger) {
        Self::spawn(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "failed to listen for ctrl-c; watch cannot be interrupted");
                pending::<()>().await;
            }
        })
    }
}

impl Drop for CancellationListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Receiving half of the cancellation signal, owned by the watch loop.
#[derive(Debug)]
pub struct CancellationTrigger {
    receiver: Option<oneshot::Receiver<()>>,
    fired: bool,
}

impl CancellationTrigger {
    /// A trigger with no listener behind it.
    pub fn never() -> Self {
        Self {
            receiver: None,
            fired: false,
        }
    }

    /// Resolve once the interrupt has been delivered; stays pending otherwise.
    ///
    /// Cancel-safe: dropping the returned future keeps the trigger armed.
    pub async fn cancelled(&mut self) {
        if self.fired {
            return;
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return pending().await;
        };
        let outcome = receiver.await;
        self.receiver = None;
        match outcome {
            Ok(()) => self.fired = true,
            Err(_) => pending().await,
        }
    }

    /// Non-blocking check used after work that could not be interrupted.
    pub fn is_cancelled(&mut self) -> bool {
        if self.fired {
            return true;
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(()) => {
                self.receiver = None;
                self.fired = true;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                self.receiver = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::{CancellationListener, CancellationTrigger};

    #[tokio::test(start_paused = true)]
    async fn functional_listener_fires_trigger_once_signal_resolves() {
        let (listener, mut trigger) =
            CancellationListener::spawn(sleep(Duration::from_millis(500)));
        assert!(!trigger.is_cancelled());

        timeout(Duration::from_secs(1), trigger.cancelled())
            .await
            .expect("trigger should fire after the signal");
        assert!(trigger.is_cancelled());
        // Latched: a second wait returns immediately.
        timeout(Duration::from_millis(1), trigger.cancelled())
            .await
            .expect("fired trigger stays fired");

        tokio::task::yield_now().await;
        assert!(listener.handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn regression_dropped_listener_never_fires() {
        let (listener, mut trigger) =
            CancellationListener::spawn(sleep(Duration::from_millis(100)));
        drop(listener);

        let waited = timeout(Duration::from_secs(5), trigger.cancelled()).await;
        assert!(waited.is_err(), "aborted listener must not cancel");
        assert!(!trigger.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn unit_never_trigger_stays_pending() {
        let mut trigger = CancellationTrigger::never();
        assert!(!trigger.is_cancelled());
        let waited = timeout(Duration::from_secs(60), trigger.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn regression_interrupted_wait_keeps_trigger_armed() {
        let (_listener, mut trigger) =
            CancellationListener::spawn(sleep(Duration::from_millis(300)));
        let early = timeout(Duration::from_millis(100), trigger.cancelled()).await;
        assert!(early.is_err());

        sleep(Duration::from_millis(500)).await;
        assert!(trigger.is_cancelled());
    }
}
