//! Cancellable debounce timer
//!
//! Each call to [`Debouncer::call`] cancels the pending timer and starts a
//! new one. Only a timer that runs its full delay uninterrupted delivers its
//! value.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Debouncer plus the receiver of values whose timer fired
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                pending: None,
                tx,
            },
            rx,
        )
    }

    /// Schedule `value`, superseding any pending one
    pub fn call(&mut self, value: T) {
        self.cancel();

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let tx = self.tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => trace!("Debounced call superseded"),
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(value);
                }
            }
        });
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}
