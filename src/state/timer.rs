//! Per-room cancellation signals and the countdown driven by the phase loop.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::watch, time::timeout};

/// Result of waiting on a [`PhaseSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was set before the wait elapsed.
    Cancelled,
    /// The wait elapsed without the signal being set.
    TimedOut,
}

/// Result of a full countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// The signal stopped the countdown; `remaining` is the last tick emitted.
    Cancelled {
        /// Seconds left on the last emitted tick.
        remaining: u32,
    },
    /// Every tick down to zero was emitted.
    Elapsed,
}

/// Cancellation flag scoped to one room phase.
///
/// Setting it is idempotent and safe after the countdown already finished.
#[derive(Clone)]
pub struct PhaseSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl PhaseSignal {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Stop the countdown currently observing this signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Clear the flag at the start of a phase.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Non-blocking poll.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait up to `limit` for the signal to be set.
    pub async fn wait(&self, limit: Duration) -> WaitOutcome {
        let mut rx = self.tx.subscribe();
        match timeout(limit, rx.wait_for(|cancelled| *cancelled)).await {
            Ok(Ok(_)) => WaitOutcome::Cancelled,
            // The sender lives as long as `self`, so a closed channel cannot happen here.
            Ok(Err(_)) | Err(_) => WaitOutcome::TimedOut,
        }
    }
}

/// One lazily created signal per room.
#[derive(Default)]
pub struct PhaseSignals {
    signals: DashMap<String, PhaseSignal>,
}

impl PhaseSignals {
    /// Create an empty set of signals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal of `room_id`, created on first use.
    pub fn signal(&self, room_id: &str) -> PhaseSignal {
        self.signals
            .entry(room_id.to_string())
            .or_insert_with(PhaseSignal::new)
            .clone()
    }

    /// Set the signal of `room_id`.
    pub fn cancel(&self, room_id: &str) {
        self.signal(room_id).cancel();
    }

    /// Forget the signal of a room whose phase loop ended.
    pub fn release(&self, room_id: &str) {
        self.signals.remove(room_id);
    }
}

/// Count down from `seconds` to zero inclusive, calling `on_tick` once per `tick`.
///
/// After each tick the countdown waits up to `tick` for the signal; a set
/// signal ends the countdown before any further tick is emitted.
pub async fn run_countdown<F>(
    signal: &PhaseSignal,
    seconds: u32,
    tick: Duration,
    mut on_tick: F,
) -> CountdownOutcome
where
    F: FnMut(u32),
{
    let mut last = seconds;
    for remaining in (0..=seconds).rev() {
        if signal.is_cancelled() {
            return CountdownOutcome::Cancelled { remaining: last };
        }
        on_tick(remaining);
        last = remaining;
        if signal.wait(tick).await == WaitOutcome::Cancelled {
            return CountdownOutcome::Cancelled { remaining };
        }
    }
    CountdownOutcome::Elapsed
}
