//! Single-slot debounce timer.
//!
//! Every [`Debouncer::arm`] replaces the pending timer, so a burst of Keep
//! mutations produces exactly one tick, `delay` after the last one.  Ticks
//! are delivered on a channel; the receiver calls [`Debouncer::claim`] before
//! acting, which both clears the slot and discards ticks from timers that
//! were replaced after they had already fired.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

/// Fired when the quiet period after the last `arm()` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTick(u64);

#[derive(Debug)]
struct Pending {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    fire_tx: mpsc::UnboundedSender<DebounceTick>,
    pending: Option<Pending>,
    generation: u64,
}

impl Debouncer {
    pub fn new(delay: Duration, fire_tx: mpsc::UnboundedSender<DebounceTick>) -> Self {
        Self {
            delay,
            fire_tx,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Applies to the next `arm()`; a pending timer keeps its deadline.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Cancel any pending timer and start a new one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self) -> DebounceTick {
        self.cancel();
        self.generation += 1;
        let tick = DebounceTick(self.generation);

        let delay = self.delay;
        let tx = self.fire_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver may already be gone during shutdown.
            let _ = tx.send(tick);
        })
        .abort_handle();

        trace!(generation = self.generation, ?delay, "debounce armed");
        self.pending = Some(Pending {
            generation: self.generation,
            handle,
        });
        tick
    }

    /// Disarm the pending timer.  Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a delivered tick.  Clears the slot and returns `true` only when
    /// `tick` belongs to the timer that is still pending.
    pub fn claim(&mut self, tick: DebounceTick) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == tick.0 => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
