//! # Retry-Gated Mode Transitions
//!
//! Offboard engage, arming and return-to-home share one loop: poll the
//! flight state every tick and, outside the cool-down window, ask the
//! gateway for the transition until the state shows it happened.
//!
//! ```text
//! IDLE -> POLLING -> (RETRYING <-> POLLING) -> REACHED | CANCELLED
//! ```
//!
//! There is no retry ceiling. A refused or failed request only pushes the
//! next attempt out by the cool-down; the loop ends when the state is
//! reached or the run flag is cleared.

use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, warn};

use super::state::RunFlag;
use super::{ticker, ExecutorSettings, LoopExit};
use crate::error::{CommanderError, Result};
use crate::gateway::{FlightGateway, ServiceRequest, MODE_OFFBOARD, MODE_RETURN_TO_LAUNCH};
use crate::message::{FlightState, Pose};

/// Gateway-side state changes driven by a retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Offboard,
    Arm,
    ReturnToHome,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Offboard => "offboard",
            Transition::Arm => "arm",
            Transition::ReturnToHome => "return-to-home",
        }
    }

    /// Whether the reported state already satisfies the transition
    pub fn is_reached(&self, state: Option<&FlightState>) -> bool {
        let Some(state) = state else {
            return false;
        };
        match self {
            Transition::Offboard => state.mode == MODE_OFFBOARD,
            Transition::Arm => state.armed,
            Transition::ReturnToHome => state.mode == MODE_RETURN_TO_LAUNCH,
        }
    }

    pub fn service_request(&self) -> ServiceRequest {
        match self {
            Transition::Offboard => ServiceRequest::SetMode {
                custom_mode: MODE_OFFBOARD.to_string(),
            },
            Transition::Arm => ServiceRequest::Arming { arm: true },
            Transition::ReturnToHome => ServiceRequest::SetMode {
                custom_mode: MODE_RETURN_TO_LAUNCH.to_string(),
            },
        }
    }

    /// Offboard is only accepted while the stack receives a live setpoint stream
    pub fn streams_setpoints(&self) -> bool {
        matches!(self, Transition::Offboard)
    }
}

/// Issue the transition request once
///
/// # Errors
///
/// - `NotAccepted` if the gateway refused the request
/// - `Transport` if the call did not go through
pub async fn request_transition(gateway: &dyn FlightGateway, transition: Transition) -> Result<()> {
    let request = transition.service_request();
    let response = gateway.call_service(request.clone()).await?;
    if !response.accepted {
        return Err(CommanderError::NotAccepted(request.to_string()));
    }
    Ok(())
}

/// Publish `setpoint` once per tick for one burst
///
/// Returns `false` if the run flag was cleared part-way.
async fn stream_setpoints(
    gateway: &dyn FlightGateway,
    settings: &ExecutorSettings,
    running: &RunFlag,
    setpoint: &Pose,
    ticker: &mut Interval,
) -> bool {
    for _ in 0..settings.setpoint_burst {
        if !running.is_running() {
            return false;
        }
        gateway.set_local_pose(setpoint).await;
        ticker.tick().await;
    }
    true
}

/// Drive `transition` until the gateway reports it or `running` is cleared
///
/// `deadline` is the earliest time the next request may be sent; it is
/// pushed out by one cool-down whenever a request is refused or fails.
/// `setpoint` is streamed ahead of each offboard request.
pub async fn run_transition(
    transition: Transition,
    gateway: &dyn FlightGateway,
    settings: &ExecutorSettings,
    running: &RunFlag,
    deadline: &mut Option<Instant>,
    setpoint: &Pose,
) -> LoopExit {
    let mut ticker = ticker(settings.tick);

    loop {
        let state = gateway.state().await;
        if transition.is_reached(state.as_ref()) {
            info!(transition = transition.name(), "transition reached");
            return LoopExit::Reached;
        }

        if !running.is_running() {
            warn!(transition = transition.name(), "transition cancelled");
            return LoopExit::Cancelled;
        }

        if deadline.map_or(false, |not_before| Instant::now() < not_before) {
            ticker.tick().await;
            continue;
        }

        debug!(
            transition = transition.name(),
            mode = state.as_ref().map(|s| s.mode.as_str()),
            "requesting transition"
        );

        if transition.streams_setpoints()
            && !stream_setpoints(gateway, settings, running, setpoint, &mut ticker).await
        {
            continue;
        }

        if let Err(e) = request_transition(gateway, transition).await {
            error!(transition = transition.name(), "{}", e);
            *deadline = Some(Instant::now() + settings.cooldown);
        }

        ticker.tick().await;
    }
}
