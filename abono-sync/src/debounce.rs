//! Trailing-edge debouncing of rapidly changing input.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Collapses bursts of values into one propagation per quiet period.
///
/// Each `schedule` replaces the pending value and restarts the timer; only
/// the most recent value is ever delivered. Cancelling or dropping the gate
/// discards whatever is pending. Requires a Tokio runtime.
pub struct DebounceGate<T> {
    delay: Duration,
    sink: Sink<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> DebounceGate<T> {
    pub fn new<F>(delay: Duration, sink: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            delay,
            sink: Arc::new(sink),
            pending: None,
        }
    }

    /// A gate whose propagations arrive on the returned channel.
    pub fn channel(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Self::new(delay, move |value| {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(value);
        });
        (gate, rx)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, value: T) {
        self.schedule_with_delay(value, self.delay);
    }

    pub fn schedule_with_delay(&mut self, value: T, delay: Duration) {
        self.cancel();
        let sink = self.sink.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink(value);
        }));
    }

    /// Drop the pending value, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for DebounceGate<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> fmt::Debug for DebounceGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceGate")
            .field("delay", &self.delay)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
