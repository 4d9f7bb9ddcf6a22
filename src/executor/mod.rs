//! # Command Executor
//!
//! Routes decoded requests from the ground client.
//!
//! - Mutating commands (`SET_OFFBOARD`, `SET_ARM`, `SET_RETURN_TO_HOME`,
//!   `GOTO`) run one at a time behind a try-lock gate. A command that finds
//!   the gate taken is dropped, not queued, and gets no reply.
//! - `HEARTBEAT` never touches the gate and may run alongside a command.
//!
//! The gate guards a [`CommandSlot`] holding the target pose and the retry
//! deadlines, so only the running command can change them. The last-command
//! record lives in a `watch` channel so heartbeats read `(id, completed)` as
//! one value.

pub mod failsafe;
pub mod heartbeat;
pub mod state;
pub mod tracking;
pub mod transition;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::framing;
use crate::gateway::FlightGateway;
use crate::message::{Action, Command, Request};

use heartbeat::ReplySink;
use state::{CommandSlot, LastCommand, RunFlag};
use transition::Transition;

/// Loop timing and GOTO tolerances
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub tick: Duration,
    pub cooldown: Duration,
    pub setpoint_burst: u32,
    /// Meters
    pub distance_tolerance: f64,
    /// Radians
    pub yaw_tolerance: f64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick: config.timing.tick(),
            cooldown: config.timing.cooldown(),
            setpoint_burst: config.timing.setpoint_burst,
            distance_tolerance: config.tolerance.distance_m,
            yaw_tolerance: config.tolerance.yaw_rad(),
        }
    }
}

/// How a command loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Reached,
    Cancelled,
}

/// What happened to one inbound datagram or request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Mutating command ran until its target state was reached
    Completed,
    /// Mutating command ran until the run flag was cleared
    Cancelled,
    /// Another mutating command held the gate
    Dropped,
    /// Heartbeat reply sent
    Replied,
    /// Heartbeat received but its reply could not be sent
    ReplyFailed,
    /// Unknown command
    Ignored,
    /// Frame or message could not be decoded
    Rejected,
}

/// Poll-tick source shared by all command loops
///
/// The first tick fires one period from now.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

struct Shared {
    gateway: Arc<dyn FlightGateway>,
    settings: ExecutorSettings,
    gate: Mutex<CommandSlot>,
    running: RunFlag,
    last_command: watch::Sender<LastCommand>,
    last_heartbeat: watch::Sender<Option<Instant>>,
    return_to_home_requested: AtomicBool,
}

/// Single-aircraft command executor
///
/// Cheap to clone; clones share the same aircraft state.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("settings", &self.shared.settings)
            .field("last_command", &self.last_command())
            .field("running", &self.shared.running.is_running())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(gateway: Arc<dyn FlightGateway>, settings: ExecutorSettings) -> Self {
        let (last_command, _) = watch::channel(LastCommand::default());
        let (last_heartbeat, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                gateway,
                settings,
                gate: Mutex::new(CommandSlot::default()),
                running: RunFlag::new(),
                last_command,
                last_heartbeat,
                return_to_home_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.shared.settings
    }

    /// Verify, decode and route one datagram
    ///
    /// Integrity and decode failures are logged and the datagram is dropped
    /// without a reply or any state change.
    pub async fn handle_datagram<S: ReplySink + ?Sized>(
        &self,
        datagram: &[u8],
        from: SocketAddr,
        sink: &S,
    ) -> Outcome {
        let payload = match framing::decode(datagram) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(peer = %from, "Dropping datagram: {}", e);
                return Outcome::Rejected;
            }
        };

        let request = match Request::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %from, "Dropping request: {}", e);
                return Outcome::Rejected;
            }
        };

        debug!(peer = %from, id = request.id, command = ?request.command, "Received request");
        self.handle_request(request, from, sink).await
    }

    /// Route a decoded request
    pub async fn handle_request<S: ReplySink + ?Sized>(
        &self,
        request: Request,
        from: SocketAddr,
        sink: &S,
    ) -> Outcome {
        match request.command {
            Command::Heartbeat => self.heartbeat(from, sink).await,
            Command::Unknown => {
                debug!(id = request.id, "Ignoring unknown command");
                Outcome::Ignored
            }
            _ => match request.action() {
                Ok(Some(action)) => self.execute(request.id, action).await,
                Ok(None) => Outcome::Ignored,
                Err(e) => {
                    warn!(peer = %from, id = request.id, "Dropping request: {}", e);
                    Outcome::Rejected
                }
            },
        }
    }

    /// Run one mutating command to completion, or drop it if one is in flight
    pub async fn execute(&self, id: u32, action: Action) -> Outcome {
        let Ok(mut slot) = self.shared.gate.try_lock() else {
            info!(id, ?action, "Command in flight, dropping");
            return Outcome::Dropped;
        };

        self.shared.last_command.send_replace(LastCommand { id, completed: false });
        self.shared.running.start();
        info!(id, ?action, "Executing command");

        let gateway = self.shared.gateway.as_ref();
        let settings = &self.shared.settings;
        let running = &self.shared.running;
        let CommandSlot { target_pose, deadlines } = &mut *slot;

        let exit = match action {
            Action::SetOffboard => {
                transition::run_transition(
                    Transition::Offboard,
                    gateway,
                    settings,
                    running,
                    &mut deadlines.offboard,
                    target_pose,
                )
                .await
            }
            Action::SetArm => {
                transition::run_transition(
                    Transition::Arm,
                    gateway,
                    settings,
                    running,
                    &mut deadlines.arm,
                    target_pose,
                )
                .await
            }
            Action::SetReturnToHome => {
                transition::run_transition(
                    Transition::ReturnToHome,
                    gateway,
                    settings,
                    running,
                    &mut deadlines.return_to_home,
                    target_pose,
                )
                .await
            }
            Action::Goto(target) => {
                *target_pose = target;
                tracking::track_pose(gateway, settings, running, target_pose).await
            }
        };

        self.shared.last_command.send_replace(LastCommand { id, completed: true });
        drop(slot);

        info!(id, ?exit, "Command finished");
        match exit {
            LoopExit::Reached => Outcome::Completed,
            LoopExit::Cancelled => Outcome::Cancelled,
        }
    }

    async fn heartbeat<S: ReplySink + ?Sized>(&self, from: SocketAddr, sink: &S) -> Outcome {
        let timestamp = chrono::Utc::now().timestamp();
        self.shared.last_heartbeat.send_replace(Some(Instant::now()));
        self.shared.return_to_home_requested.store(false, Ordering::SeqCst);

        let telemetry = heartbeat::snapshot(self.shared.gateway.as_ref()).await;
        let reply = heartbeat::build_reply(timestamp, telemetry, self.last_command());

        match heartbeat::send_reply(sink, &reply, from).await {
            Ok(()) => Outcome::Replied,
            Err(e) => {
                warn!(peer = %from, "Failed to send heartbeat reply: {}", e);
                Outcome::ReplyFailed
            }
        }
    }

    /// Clear the run flag; the in-flight command exits at its next poll
    pub fn stop(&self) {
        info!("Stop requested");
        self.shared.running.stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.is_running()
    }

    /// Whether a mutating command currently holds the gate
    pub fn is_busy(&self) -> bool {
        self.shared.gate.try_lock().is_err()
    }

    pub fn last_command(&self) -> LastCommand {
        *self.shared.last_command.borrow()
    }

    /// Watch last-command updates
    pub fn subscribe(&self) -> watch::Receiver<LastCommand> {
        self.shared.last_command.subscribe()
    }

    /// Retry deadlines, or `None` while a command holds the gate
    #[cfg(test)]
    pub(crate) fn retry_deadlines(&self) -> Option<state::RetryDeadlines> {
        self.shared.gate.try_lock().ok().map(|slot| slot.deadlines)
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        *self.shared.last_heartbeat.borrow()
    }

    pub fn return_to_home_requested(&self) -> bool {
        self.shared.return_to_home_requested.load(Ordering::SeqCst)
    }

    /// Raise the return-to-home indicator; returns whether it was already raised
    pub fn request_return_to_home(&self) -> bool {
        self.shared.return_to_home_requested.swap(true, Ordering::SeqCst)
    }
}
