//! # Navigation Module
//!
//! Heading extraction and the position-convergence check used by `GOTO`.
//!
//! ## Heading
//!
//! Yaw is taken from the roll/pitch/yaw decomposition of the (renormalized)
//! orientation quaternion and wrapped into `[0, 2π)`. Two headings are
//! compared along the shortest arc, so 359° and 1° are 2° apart.

use std::f64::consts::TAU;

use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::message::{Pose, Quaternion};

/// Minimum spacing between convergence diagnostics
const DIAGNOSTIC_INTERVAL: Duration = Duration::from_secs(1);

/// Wrap an angle in radians into `[0, 2π)`
pub fn normalize_yaw(yaw: f64) -> f64 {
    let wrapped = yaw.rem_euclid(TAU);
    // rem_euclid rounds tiny negative angles up to exactly TAU
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Heading of an orientation in `[0, 2π)`
///
/// # Examples
///
/// ```
/// use std::f64::consts::FRAC_PI_2;
/// use uav_commander::message::Quaternion;
/// use uav_commander::navigation::yaw_from_quaternion;
///
/// let yaw = yaw_from_quaternion(&Quaternion::from_yaw(-FRAC_PI_2));
/// assert!((yaw - 3.0 * FRAC_PI_2).abs() < 1e-9);
/// ```
pub fn yaw_from_quaternion(orientation: &Quaternion) -> f64 {
    let q = orientation.normalized();
    let siny_cosp = 2.0 * (q.w * q.z + q.x * q.y);
    let cosy_cosp = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
    normalize_yaw(siny_cosp.atan2(cosy_cosp))
}

/// Shortest angular distance between two headings, in `[0, π]`
pub fn yaw_difference(a: f64, b: f64) -> f64 {
    let diff = (normalize_yaw(a) - normalize_yaw(b)).abs();
    diff.min(TAU - diff)
}

/// Whether `actual` is within tolerance of `desired`
///
/// Both the Euclidean distance and the heading error must be strictly below
/// their tolerances.
pub fn is_at_position(desired: &Pose, actual: &Pose, distance_tol: f64, yaw_tol: f64) -> bool {
    let distance = desired.position.distance(&actual.position);
    let yaw_error = yaw_difference(
        yaw_from_quaternion(&desired.orientation),
        yaw_from_quaternion(&actual.orientation),
    );
    distance < distance_tol && yaw_error < yaw_tol
}

/// Convergence check with throttled diagnostics
#[derive(Debug, Clone)]
pub struct ConvergenceCheck {
    distance_tolerance: f64,
    yaw_tolerance: f64,
    last_log: Option<Instant>,
}

impl ConvergenceCheck {
    pub fn new(distance_tolerance: f64, yaw_tolerance: f64) -> Self {
        Self {
            distance_tolerance,
            yaw_tolerance,
            last_log: None,
        }
    }

    /// Run [`is_at_position`] and log the heading comparison at most once per second
    pub fn check(&mut self, desired: &Pose, actual: &Pose) -> bool {
        let now = Instant::now();
        let due = self
            .last_log
            .map_or(true, |last| now.duration_since(last) >= DIAGNOSTIC_INTERVAL);

        if due {
            let desired_yaw = yaw_from_quaternion(&desired.orientation);
            let actual_yaw = yaw_from_quaternion(&actual.orientation);
            debug!(
                desired_yaw,
                actual_yaw,
                yaw_error = yaw_difference(desired_yaw, actual_yaw),
                distance = desired.position.distance(&actual.position),
                "convergence check"
            );
            self.last_log = Some(now);
        }

        is_at_position(desired, actual, self.distance_tolerance, self.yaw_tolerance)
    }
}
