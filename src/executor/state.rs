//! # Executor State
//!
//! Shared run flag, last-command record and the per-transition retry
//! deadlines owned by whoever holds the command gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::Instant;

use crate::message::Pose;

/// Cooperative cancellation flag polled by every command loop
///
/// Set when a mutating command starts; cleared by an external stop.
#[derive(Debug, Clone, Default)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Id of the most recent mutating command and whether it has finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastCommand {
    pub id: u32,
    pub completed: bool,
}

/// Earliest time the next service request may be sent, per transition
///
/// Kept across invocations so a repeated command resumes the same cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryDeadlines {
    pub offboard: Option<Instant>,
    pub arm: Option<Instant>,
    pub return_to_home: Option<Instant>,
}

/// State only the command-gate holder may touch
#[derive(Debug, Default)]
pub struct CommandSlot {
    /// Setpoint streamed while engaging offboard and tracked by `GOTO`
    pub target_pose: Pose,
    pub deadlines: RetryDeadlines,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flag_shared_between_clones() {
        let flag = RunFlag::new();
        let other = flag.clone();
        assert!(!flag.is_running());

        flag.start();
        assert!(other.is_running());

        other.stop();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LastCommand::default(), LastCommand { id: 0, completed: false });
        let slot = CommandSlot::default();
        assert_eq!(slot.deadlines, RetryDeadlines::default());
        assert_eq!(slot.target_pose, Pose::default());
    }
}
