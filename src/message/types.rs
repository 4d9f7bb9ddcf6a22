//! # Flight Data Types
//!
//! Pose, vehicle state and GPS fix as exchanged with the flight-stack gateway.

use serde::{Deserialize, Serialize};

/// Position in the local frame (meters)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Orientation quaternion
///
/// Not required to be normalized on the wire; consumers renormalize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Rotation of `yaw` radians about the vertical axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self { x: 0.0, y: 0.0, z: half.sin(), w: half.cos() }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit quaternion pointing the same way, or identity for a zero quaternion
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Self::IDENTITY;
        }
        Self {
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
            w: self.w / norm,
        }
    }
}

/// Position plus orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Point, orientation: Quaternion) -> Self {
        Self { position, orientation }
    }
}

/// Flight controller state as reported by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightState {
    /// Custom flight mode name (e.g. "MANUAL", "OFFBOARD", "AUTO.RTL")
    pub mode: String,
    pub armed: bool,
    #[serde(default)]
    pub connected: bool,
}

/// Global position fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Fix status (negative means no fix)
    #[serde(default)]
    pub status: i8,
}

/// Rigid transform between two frames (e.g. map to base_link)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub parent_frame: String,
    pub child_frame: String,
    pub translation: Point,
    pub rotation: Quaternion,
}
