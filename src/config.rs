//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{CommanderError, Result};
use crate::framing::protocol::{FRAME_OVERHEAD, MAX_DATAGRAM_SIZE};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub failsafe: FailsafeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// UDP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
}

/// Retry loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Poll rate of every transition and tracking loop
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Minimum time between two service requests of the same transition
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Setpoints streamed before each offboard request
    #[serde(default = "default_setpoint_burst")]
    pub setpoint_burst: u32,
}

/// GOTO convergence tolerances
#[derive(Debug, Deserialize, Clone)]
pub struct ToleranceConfig {
    #[serde(default = "default_distance_m")]
    pub distance_m: f64,

    #[serde(default = "default_yaw_deg")]
    pub yaw_deg: f64,
}

/// Link-loss failsafe
#[derive(Debug, Deserialize, Clone)]
pub struct FailsafeConfig {
    #[serde(default = "default_failsafe_enabled")]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; console only when empty
    #[serde(default)]
    pub directory: String,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

/// Simulated flight stack
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_speed_mps")]
    pub speed_mps: f64,

    #[serde(default = "default_yaw_rate_rad_s")]
    pub yaw_rate_rad_s: f64,

    #[serde(default = "default_setpoint_timeout_ms")]
    pub setpoint_timeout_ms: u64,

    #[serde(default = "default_home_latitude")]
    pub home_latitude: f64,

    #[serde(default = "default_home_longitude")]
    pub home_longitude: f64,

    #[serde(default = "default_home_altitude")]
    pub home_altitude: f64,
}

// Default value functions
fn default_bind_addr() -> String { "0.0.0.0:5555".to_string() }
fn default_max_datagram_size() -> usize { MAX_DATAGRAM_SIZE }

fn default_tick_rate_hz() -> u32 { 20 }
fn default_cooldown_ms() -> u64 { 5000 }
fn default_setpoint_burst() -> u32 { 100 }

fn default_distance_m() -> f64 { 0.5 }
fn default_yaw_deg() -> f64 { 0.5 }

fn default_failsafe_enabled() -> bool { true }
fn default_heartbeat_timeout_ms() -> u64 { 10_000 }

fn default_log_level() -> String { "info".to_string() }
fn default_log_file_prefix() -> String { "uav-commander.log".to_string() }

fn default_speed_mps() -> f64 { 2.0 }
fn default_yaw_rate_rad_s() -> f64 { 1.0 }
fn default_setpoint_timeout_ms() -> u64 { 500 }
fn default_home_latitude() -> f64 { 47.397742 }
fn default_home_longitude() -> f64 { 8.545594 }
fn default_home_altitude() -> f64 { 488.0 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_datagram_size: default_max_datagram_size(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            cooldown_ms: default_cooldown_ms(),
            setpoint_burst: default_setpoint_burst(),
        }
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            distance_m: default_distance_m(),
            yaw_deg: default_yaw_deg(),
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            enabled: default_failsafe_enabled(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            speed_mps: default_speed_mps(),
            yaw_rate_rad_s: default_yaw_rate_rad_s(),
            setpoint_timeout_ms: default_setpoint_timeout_ms(),
            home_latitude: default_home_latitude(),
            home_longitude: default_home_longitude(),
            home_altitude: default_home_altitude(),
        }
    }
}

impl TimingConfig {
    /// Duration of one poll tick
    pub fn tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl ToleranceConfig {
    pub fn yaw_rad(&self) -> f64 {
        self.yaw_deg.to_radians()
    }
}

impl FailsafeConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uav_commander::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.is_empty() {
            return Err(invalid("server bind_addr cannot be empty"));
        }

        if self.server.max_datagram_size <= FRAME_OVERHEAD
            || self.server.max_datagram_size > MAX_DATAGRAM_SIZE
        {
            return Err(invalid(format!(
                "max_datagram_size must be between {} and {}",
                FRAME_OVERHEAD + 1,
                MAX_DATAGRAM_SIZE
            )));
        }

        if self.timing.tick_rate_hz == 0 || self.timing.tick_rate_hz > 1000 {
            return Err(invalid("tick_rate_hz must be between 1 and 1000"));
        }

        if self.timing.cooldown_ms > 600_000 {
            return Err(invalid("cooldown_ms must be at most 600000"));
        }

        if self.timing.setpoint_burst > 10_000 {
            return Err(invalid("setpoint_burst must be at most 10000"));
        }

        if !(self.tolerance.distance_m > 0.0 && self.tolerance.distance_m <= 100.0) {
            return Err(invalid("tolerance distance_m must be in (0, 100]"));
        }

        if !(self.tolerance.yaw_deg > 0.0 && self.tolerance.yaw_deg <= 180.0) {
            return Err(invalid("tolerance yaw_deg must be in (0, 180]"));
        }

        if self.failsafe.enabled
            && (self.failsafe.heartbeat_timeout_ms == 0 || self.failsafe.heartbeat_timeout_ms > 600_000)
        {
            return Err(invalid("heartbeat_timeout_ms must be between 1 and 600000"));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!("unknown log level '{}'", self.logging.level)));
        }

        if !self.logging.directory.is_empty() && self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty when directory is set"));
        }

        if self.simulator.speed_mps <= 0.0 || self.simulator.yaw_rate_rad_s <= 0.0 {
            return Err(invalid("simulator speed_mps and yaw_rate_rad_s must be positive"));
        }

        if self.simulator.setpoint_timeout_ms == 0 {
            return Err(invalid("simulator setpoint_timeout_ms must be greater than 0"));
        }

        if !(-90.0..=90.0).contains(&self.simulator.home_latitude)
            || !(-180.0..=180.0).contains(&self.simulator.home_longitude)
        {
            return Err(invalid("simulator home coordinates out of range"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> CommanderError {
    CommanderError::Config(toml::de::Error::custom(message))
}
