//! Automatic acquisition loop.
//!
//! Fetches until the feed returns at least one spread. An empty answer schedules
//! one retry after the configured delay; a failure or a populated answer ends the
//! loop. Later fetches are manual (see [`SpreadAcquirer::fetch_spreads`]) and
//! never re-arm it.
//!
//! Teardown is cooperative: [`PollHandle::stop`] (or dropping the handle) flips a
//! watch flag that the loop checks before each fetch, after each empty answer and
//! while waiting out the retry delay. An in-flight request is never aborted, but
//! once it resolves nothing further is scheduled.

use crate::shared::{feed::DEFAULT_RETRY_DELAY, state::SpreadAcquirer};
use derive_more::Display;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

/// Why the automatic loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StopReason {
    #[display("populated ({count} spreads)")]
    Populated { count: usize },
    #[display("fetch failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
}

/// Observable state of the automatic loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollState {
    #[display("idle")]
    Idle,
    #[display("fetching (attempt {attempt})")]
    Fetching { attempt: u32 },
    #[display("empty feed, retry {attempt} scheduled")]
    RetryScheduled { attempt: u32 },
    #[display("stopped: {_0}")]
    Stopped(StopReason),
}

impl PollState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, PollState::Stopped(_))
    }
}

/// Drives a [`SpreadAcquirer`] until the feed is populated
#[derive(Debug, Clone)]
pub struct Poller {
    acquirer: SpreadAcquirer,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(acquirer: SpreadAcquirer) -> Self {
        Self {
            acquirer,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Set the delay between an empty answer and the next attempt
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Start the loop on the current runtime
    pub fn spawn(self) -> PollHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PollState::Idle);

        let task = tokio::spawn(async move { self.run(cancel_rx, state_tx).await });

        PollHandle {
            cancel_tx,
            state_rx,
            task,
        }
    }

    async fn run(
        self,
        mut cancel_rx: watch::Receiver<bool>,
        state_tx: watch::Sender<PollState>,
    ) -> PollState {
        let finish = |reason: StopReason| {
            info!(%reason, "spread poll loop stopped");
            let state = PollState::Stopped(reason);
            state_tx.send_replace(state);
            state
        };

        let mut attempt = 1;
        loop {
            if is_cancelled(&cancel_rx) {
                return finish(StopReason::Cancelled);
            }

            state_tx.send_replace(PollState::Fetching { attempt });
            debug!(attempt, mode = %self.acquirer.mode(), "polling spread feed");

            match self.acquirer.fetch_spreads().await {
                Ok(0) => {
                    // Torn down while the request was in flight
                    if is_cancelled(&cancel_rx) {
                        return finish(StopReason::Cancelled);
                    }

                    state_tx.send_replace(PollState::RetryScheduled { attempt });
                    info!(attempt, delay = ?self.retry_delay, "spread feed empty, retry scheduled");

                    let cancelled = tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => false,
                        _ = cancelled(&mut cancel_rx) => true,
                    };
                    if cancelled {
                        return finish(StopReason::Cancelled);
                    }
                    attempt += 1;
                }
                Ok(count) => return finish(StopReason::Populated { count }),
                Err(_) => return finish(StopReason::Failed),
            }
        }
    }
}

/// A dropped handle counts as teardown
fn is_cancelled(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow() || cancel_rx.has_changed().is_err()
}

async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
}

/// Owner of a running poll loop; dropping it tears the loop down
#[derive(Debug)]
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<PollState>,
    task: JoinHandle<PollState>,
}

impl PollHandle {
    /// Request teardown; idempotent
    pub fn stop(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn state(&self) -> PollState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end on its own
    pub async fn join(self) -> PollState {
        let Self {
            cancel_tx, task, ..
        } = self;
        let state = match task.await {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "spread poll task aborted");
                PollState::Stopped(StopReason::Cancelled)
            }
        };
        drop(cancel_tx);
        state
    }

    /// Stop the loop and wait for it to end
    pub async fn shutdown(self) -> PollState {
        self.stop();
        self.join().await
    }
}
