//! # Link-Loss Failsafe
//!
//! Watches the heartbeat stream from the ground client. Once heartbeats
//! stop for longer than the timeout, the watchdog raises the
//! return-to-home indicator, stops whatever command is in flight and
//! submits a return-to-home through the normal command gate. The next
//! heartbeat clears the indicator.

use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use super::{ticker, Executor, Outcome};
use crate::message::Action;

/// Request id used for failsafe-issued commands
pub const FAILSAFE_REQUEST_ID: u32 = 1;

/// Heartbeat watchdog
#[derive(Debug)]
pub struct LinkWatchdog {
    executor: Executor,
    timeout: Duration,
    /// Return-to-home decided but not yet admitted through the gate
    pending: bool,
}

impl LinkWatchdog {
    pub fn new(executor: Executor, timeout: Duration) -> Self {
        Self {
            executor,
            timeout,
            pending: false,
        }
    }

    /// Whether heartbeats were seen and have since gone quiet
    pub fn link_lost(&self) -> bool {
        self.executor
            .last_heartbeat()
            .map_or(false, |last| Instant::now().duration_since(last) > self.timeout)
    }

    /// Evaluate the link once
    ///
    /// Returns the outcome of the return-to-home command when one was
    /// submitted. A dropped submission is retried on the next poll.
    pub async fn poll(&mut self) -> Option<Outcome> {
        if !self.link_lost() {
            self.pending = false;
            return None;
        }

        if !self.executor.request_return_to_home() {
            warn!(
                "No heartbeat for over {} ms, returning to home",
                self.timeout.as_millis()
            );
            self.pending = true;
        }

        if !self.pending {
            return None;
        }

        // A command admitted since the last poll re-armed the run flag
        self.executor.stop();
        let outcome = self
            .executor
            .execute(FAILSAFE_REQUEST_ID, Action::SetReturnToHome)
            .await;
        if outcome != Outcome::Dropped {
            info!(?outcome, "Failsafe return-to-home finished");
            self.pending = false;
        }
        Some(outcome)
    }

    /// Poll once per `tick` forever
    pub async fn run(mut self, tick: Duration) {
        info!(
            "Link watchdog armed, heartbeat timeout {} ms",
            self.timeout.as_millis()
        );
        let mut ticker = ticker(tick);
        loop {
            ticker.tick().await;
            self.poll().await;
        }
    }
}
