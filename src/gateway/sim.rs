//! # Simulated Flight Stack
//!
//! A kinematic stand-in for a PX4-style autopilot, used when no real
//! flight stack is attached and by the end-to-end tests.
//!
//! Behavior mirrors the parts of the autopilot the executor depends on:
//! - `OFFBOARD` is only accepted while setpoints are streaming
//! - losing the setpoint stream in `OFFBOARD` drops to `AUTO.LOITER`
//! - `AUTO.RTL` flies back over the origin, descends and disarms
//! - the vehicle moves toward its target at a fixed speed and yaw rate

use std::f64::consts::PI;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use super::{FlightGateway, ServiceRequest, ServiceResponse, MODE_OFFBOARD, MODE_RETURN_TO_LAUNCH};
use crate::config::SimulatorConfig;
use crate::error::Result;
use crate::message::{FlightState, GpsFix, Point, Pose, Quaternion, Transform};
use crate::navigation::yaw_from_quaternion;

/// Mode entered when the offboard setpoint stream stops
pub const MODE_LOITER: &str = "AUTO.LOITER";

const MODE_MANUAL: &str = "MANUAL";

/// Modes the simulated autopilot will switch into
const KNOWN_MODES: &[&str] = &[MODE_MANUAL, "POSCTL", "AUTO.LAND", MODE_LOITER, MODE_RETURN_TO_LAUNCH, MODE_OFFBOARD];

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug)]
struct Vehicle {
    mode: String,
    armed: bool,
    pose: Pose,
    setpoint: Option<Pose>,
    last_setpoint: Option<Instant>,
    last_update: Instant,
}

impl Vehicle {
    fn setpoints_fresh(&self, now: Instant, timeout: Duration) -> bool {
        self.last_setpoint
            .map_or(false, |last| now.duration_since(last) < timeout)
    }
}

/// Simulated gateway
#[derive(Debug)]
pub struct SimulatedGateway {
    config: SimulatorConfig,
    vehicle: Mutex<Vehicle>,
}

impl SimulatedGateway {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            vehicle: Mutex::new(Vehicle {
                mode: MODE_MANUAL.to_string(),
                armed: false,
                pose: Pose::default(),
                setpoint: None,
                last_setpoint: None,
                last_update: Instant::now(),
            }),
        }
    }

    fn setpoint_timeout(&self) -> Duration {
        Duration::from_millis(self.config.setpoint_timeout_ms)
    }

    /// Advance the vehicle to the current time
    fn step(&self, vehicle: &mut Vehicle) {
        let now = Instant::now();
        let dt = now.duration_since(vehicle.last_update).as_secs_f64();
        vehicle.last_update = now;

        if vehicle.mode == MODE_OFFBOARD && !vehicle.setpoints_fresh(now, self.setpoint_timeout()) {
            info!("Simulator: offboard setpoint stream lost, switching to {}", MODE_LOITER);
            vehicle.mode = MODE_LOITER.to_string();
        }

        if !vehicle.armed || dt <= 0.0 {
            return;
        }

        let target = match vehicle.mode.as_str() {
            MODE_OFFBOARD => vehicle.setpoint,
            MODE_RETURN_TO_LAUNCH => Some(self.return_target(&vehicle.pose)),
            _ => None,
        };

        if let Some(target) = target {
            vehicle.pose = self.move_toward(&vehicle.pose, &target, dt);
        }

        if vehicle.mode == MODE_RETURN_TO_LAUNCH && vehicle.pose.position.distance(&Point::default()) < 0.05 {
            info!("Simulator: landed at home, disarming");
            vehicle.armed = false;
        }
    }

    /// Fly over home at the current altitude, then descend
    fn return_target(&self, current: &Pose) -> Pose {
        let horizontal = (current.position.x.powi(2) + current.position.y.powi(2)).sqrt();
        let z = if horizontal > 0.1 { current.position.z } else { 0.0 };
        Pose::new(Point::new(0.0, 0.0, z), current.orientation)
    }

    fn move_toward(&self, current: &Pose, target: &Pose, dt: f64) -> Pose {
        let distance = current.position.distance(&target.position);
        let step = self.config.speed_mps * dt;
        let position = if distance <= step {
            target.position
        } else {
            let ratio = step / distance;
            Point::new(
                current.position.x + (target.position.x - current.position.x) * ratio,
                current.position.y + (target.position.y - current.position.y) * ratio,
                current.position.z + (target.position.z - current.position.z) * ratio,
            )
        };

        let current_yaw = yaw_from_quaternion(&current.orientation);
        let target_yaw = yaw_from_quaternion(&target.orientation);
        let mut error = target_yaw - current_yaw;
        if error > PI {
            error -= 2.0 * PI;
        } else if error < -PI {
            error += 2.0 * PI;
        }
        let max_turn = self.config.yaw_rate_rad_s * dt;
        let orientation = if error.abs() <= max_turn {
            target.orientation
        } else {
            Quaternion::from_yaw(current_yaw + max_turn.copysign(error))
        };

        Pose::new(position, orientation)
    }

    fn to_global(&self, position: &Point) -> GpsFix {
        let home_lat = self.config.home_latitude;
        let lat = home_lat + (position.y / EARTH_RADIUS_M).to_degrees();
        let lon = self.config.home_longitude
            + (position.x / (EARTH_RADIUS_M * home_lat.to_radians().cos())).to_degrees();
        GpsFix {
            latitude: lat,
            longitude: lon,
            altitude: self.config.home_altitude + position.z,
            status: 0,
        }
    }
}

#[async_trait]
impl FlightGateway for SimulatedGateway {
    async fn state(&self) -> Option<FlightState> {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        Some(FlightState {
            mode: vehicle.mode.clone(),
            armed: vehicle.armed,
            connected: true,
        })
    }

    async fn local_pose(&self) -> Option<Pose> {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        Some(vehicle.pose)
    }

    async fn global_fix(&self) -> Option<GpsFix> {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        Some(self.to_global(&vehicle.pose.position))
    }

    async fn frame_transform(&self) -> Option<Transform> {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        Some(Transform {
            parent_frame: "map".to_string(),
            child_frame: "base_link".to_string(),
            translation: vehicle.pose.position,
            rotation: vehicle.pose.orientation,
        })
    }

    async fn set_local_pose(&self, pose: &Pose) {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        vehicle.setpoint = Some(*pose);
        vehicle.last_setpoint = Some(Instant::now());
    }

    async fn call_service(&self, request: ServiceRequest) -> Result<ServiceResponse> {
        let mut vehicle = self.vehicle.lock().await;
        self.step(&mut vehicle);
        let now = Instant::now();

        let accepted = match &request {
            ServiceRequest::SetMode { custom_mode } if custom_mode == MODE_OFFBOARD => {
                vehicle.setpoints_fresh(now, self.setpoint_timeout())
            }
            ServiceRequest::SetMode { custom_mode } => KNOWN_MODES.contains(&custom_mode.as_str()),
            ServiceRequest::Arming { .. } => true,
        };

        if accepted {
            match &request {
                ServiceRequest::SetMode { custom_mode } => vehicle.mode = custom_mode.clone(),
                ServiceRequest::Arming { arm } => vehicle.armed = *arm,
            }
        }

        debug!("Simulator: {} accepted={}", request, accepted);
        Ok(ServiceResponse { accepted })
    }
}
