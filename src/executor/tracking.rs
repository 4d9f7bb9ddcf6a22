//! # GOTO Tracking
//!
//! Streams the target pose every tick until the vehicle converges on it.
//! Unlike the mode transitions there is no cool-down: the setpoint has to
//! keep flowing for the flight stack to keep following it.

use tracing::{info, warn};

use super::state::RunFlag;
use super::{ticker, ExecutorSettings, LoopExit};
use crate::gateway::FlightGateway;
use crate::message::Pose;
use crate::navigation::ConvergenceCheck;

/// Track `target` until convergence or until `running` is cleared
pub async fn track_pose(
    gateway: &dyn FlightGateway,
    settings: &ExecutorSettings,
    running: &RunFlag,
    target: &Pose,
) -> LoopExit {
    let mut check = ConvergenceCheck::new(settings.distance_tolerance, settings.yaw_tolerance);
    let mut ticker = ticker(settings.tick);

    loop {
        if let Some(actual) = gateway.local_pose().await {
            if check.check(target, &actual) {
                info!(
                    x = target.position.x,
                    y = target.position.y,
                    z = target.position.z,
                    "target reached"
                );
                return LoopExit::Reached;
            }
        }

        gateway.set_local_pose(target).await;

        if !running.is_running() {
            warn!("goto cancelled");
            return LoopExit::Cancelled;
        }

        ticker.tick().await;
    }
}
