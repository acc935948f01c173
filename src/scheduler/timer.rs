//! Single-shot transition timer
//!
//! At most one timer is armed at a time. Arming always cancels the previous
//! timer first. Every arm and every cancel bumps a generation counter, and a
//! fire is only delivered when it carries the current generation, so a fire
//! that raced with `cancel` (already queued when the task was aborted) is
//! discarded instead of mutating scheduler state.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A delivered timer fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// Cancellable one-shot timer backed by a spawned sleep
#[derive(Debug)]
pub struct TransitionTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    armed_delay: Option<Duration>,
    sender: mpsc::UnboundedSender<TimerFired>,
    receiver: mpsc::UnboundedReceiver<TimerFired>,
}

impl Default for TransitionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionTimer {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            handle: None,
            armed_delay: None,
            sender,
            receiver,
        }
    }

    /// Arm for `delay`, replacing any armed timer; returns the new generation
    pub fn arm(&mut self, delay: Duration) -> u64 {
        self.cancel();

        let generation = self.generation;
        let sender = self.sender.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver lives as long as the timer itself
            let _ = sender.send(TimerFired { generation });
        }));
        self.armed_delay = Some(delay);

        tracing::trace!(generation, delay_ms = delay.as_millis() as u64, "Timer armed");
        generation
    }

    /// Cancel the armed timer, if any; idempotent
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        self.armed_delay = None;
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Delay of the currently armed timer
    pub fn armed_delay(&self) -> Option<Duration> {
        self.armed_delay
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the armed timer to fire
    ///
    /// Stale fires are skipped. Pends forever while nothing is armed.
    /// Cancel safe.
    pub async fn fired(&mut self) -> TimerFired {
        loop {
            match self.receiver.recv().await {
                Some(fired) if fired.generation == self.generation && self.handle.is_some() => {
                    self.handle = None;
                    self.armed_delay = None;
                    return fired;
                }
                Some(stale) => {
                    tracing::trace!(generation = stale.generation, "Discarding stale timer fire");
                }
                None => std::future::pending::<()>().await,
            }
        }
    }
}

impl Drop for TransitionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
