//! # Gateway Module
//!
//! Boundary to the flight-control stack: state and pose queries, setpoint
//! publishing and the mode / arming services.
//!
//! The executor only sees the [`FlightGateway`] trait. [`sim::SimulatedGateway`]
//! is a stand-in vehicle for bench runs and tests.

pub mod sim;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{FlightState, GpsFix, Pose, Transform};

/// Flight mode name for offboard (setpoint-following) control
pub const MODE_OFFBOARD: &str = "OFFBOARD";

/// Flight mode name for autonomous return to launch
pub const MODE_RETURN_TO_LAUNCH: &str = "AUTO.RTL";

/// Service call issued to the flight stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    /// `set_mode` with a custom mode name
    SetMode { custom_mode: String },
    /// `arming` with the requested arm state
    Arming { arm: bool },
}

impl ServiceRequest {
    /// Service name on the flight stack
    pub fn service_name(&self) -> &'static str {
        match self {
            ServiceRequest::SetMode { .. } => "set_mode",
            ServiceRequest::Arming { .. } => "arming",
        }
    }
}

impl fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRequest::SetMode { custom_mode } => write!(f, "{}({})", self.service_name(), custom_mode),
            ServiceRequest::Arming { arm } => write!(f, "{}({})", self.service_name(), arm),
        }
    }
}

/// Reply of a service call that reached the flight stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceResponse {
    pub accepted: bool,
}

/// Interface to the flight-control stack
///
/// Queries return `None` when the stack has not produced a value yet.
/// `call_service` fails with `CommanderError::Transport` when the call cannot
/// be delivered; an explicit refusal is `Ok` with `accepted == false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlightGateway: Send + Sync {
    /// Current mode and arming state
    async fn state(&self) -> Option<FlightState>;

    /// Current pose in the local frame
    async fn local_pose(&self) -> Option<Pose>;

    /// Current global position fix
    async fn global_fix(&self) -> Option<GpsFix>;

    /// Map to body frame transform, when the stack publishes one
    async fn frame_transform(&self) -> Option<Transform> {
        None
    }

    /// Publish a local position setpoint (fire-and-forget)
    async fn set_local_pose(&self, pose: &Pose);

    /// Call a mode or arming service
    async fn call_service(&self, request: ServiceRequest) -> Result<ServiceResponse>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        let mode = ServiceRequest::SetMode { custom_mode: MODE_OFFBOARD.to_string() };
        assert_eq!(mode.service_name(), "set_mode");
        assert_eq!(mode.to_string(), "set_mode(OFFBOARD)");

        let arm = ServiceRequest::Arming { arm: true };
        assert_eq!(arm.service_name(), "arming");
        assert_eq!(arm.to_string(), "arming(true)");
    }

    #[tokio::test]
    async fn test_default_frame_transform_is_absent() {
        let gateway = mocks::ScriptedGateway::new("MANUAL", false);
        assert!(gateway.frame_transform().await.is_none());
    }
}
