//! # Replies
//!
//! Heartbeat reply sent back to the ground client.

use serde::{Deserialize, Serialize};

use super::types::{FlightState, GpsFix, Pose, Transform};
use crate::error::DecodeError;

/// Serialized telemetry sources; a field is absent when its source had no value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_mode_state: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_pose: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_fix: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_transform: Option<Vec<u8>>,
}

impl TelemetrySnapshot {
    pub fn flight_state(&self) -> Option<FlightState> {
        decode_field(&self.flight_mode_state)
    }

    pub fn pose(&self) -> Option<Pose> {
        decode_field(&self.local_pose)
    }

    pub fn gps(&self) -> Option<GpsFix> {
        decode_field(&self.gps_fix)
    }

    pub fn transform(&self) -> Option<Transform> {
        decode_field(&self.frame_transform)
    }
}

fn decode_field<T: serde::de::DeserializeOwned>(field: &Option<Vec<u8>>) -> Option<T> {
    field.as_deref().and_then(|bytes| serde_json::from_slice(bytes).ok())
}

/// Heartbeat reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Wall-clock seconds since the Unix epoch
    pub timestamp: i64,
    pub telemetry: TelemetrySnapshot,
    pub last_command_id: u32,
    pub last_command_completed: bool,
}

impl Reply {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
