//! # Message Module
//!
//! Typed requests from the ground client, replies sent back to it, and the
//! flight-stack data types they carry.

pub mod types;
pub mod request;
pub mod reply;

pub use reply::{Reply, TelemetrySnapshot};
pub use request::{Action, Command, Request};
pub use types::{FlightState, GpsFix, Point, Pose, Quaternion, Transform};
