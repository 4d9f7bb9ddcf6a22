//! # Heartbeat Responder
//!
//! Builds the telemetry reply for a heartbeat and sends it back to the
//! client that asked. Each telemetry source is queried once; a source with
//! no value, or one that cannot be serialized, is left out of the reply.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::state::LastCommand;
use crate::error::{FrameError, Result};
use crate::framing;
use crate::framing::protocol::MAX_PAYLOAD_SIZE;
use crate::gateway::FlightGateway;
use crate::message::{Reply, TelemetrySnapshot};

/// Destination for framed reply datagrams
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, frame: &[u8], to: SocketAddr) -> io::Result<()>;
}

fn encode_field<T: Serialize>(name: &str, value: Option<T>) -> Option<Vec<u8>> {
    let value = value?;
    match serde_json::to_vec(&value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(field = name, "dropping telemetry field: {}", e);
            None
        }
    }
}

/// Query every telemetry source once
pub async fn snapshot(gateway: &dyn FlightGateway) -> TelemetrySnapshot {
    TelemetrySnapshot {
        flight_mode_state: encode_field("flight_mode_state", gateway.state().await),
        local_pose: encode_field("local_pose", gateway.local_pose().await),
        gps_fix: encode_field("gps_fix", gateway.global_fix().await),
        frame_transform: encode_field("frame_transform", gateway.frame_transform().await),
    }
}

/// Assemble a reply from a snapshot and the last-command record
pub fn build_reply(timestamp: i64, telemetry: TelemetrySnapshot, last: LastCommand) -> Reply {
    Reply {
        timestamp,
        telemetry,
        last_command_id: last.id,
        last_command_completed: last.completed,
    }
}

/// Frame `reply` and send it to `to`
pub async fn send_reply<S: ReplySink + ?Sized>(sink: &S, reply: &Reply, to: SocketAddr) -> Result<()> {
    let payload = reply.to_bytes().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug!(peer = %to, "Reply size {}", payload.len());
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::Oversized {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        }
        .into());
    }
    let frame = framing::encode(&payload);
    sink.send_reply(&frame, to).await?;
    Ok(())
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Reply sink that records every frame it is given
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn replies(&self) -> Vec<(SocketAddr, Reply)> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(addr, frame)| {
                    let payload = framing::decode(frame).unwrap();
                    (*addr, Reply::parse(payload).unwrap())
                })
                .collect()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send_reply(&self, frame: &[u8], to: SocketAddr) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "mock send failure"));
            }
            self.sent.lock().unwrap().push((to, frame.to_vec()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::RecordingSink;
    use super::*;
    use crate::error::CommanderError;
    use crate::gateway::MockFlightGateway;
    use crate::message::{FlightState, GpsFix, Point, Pose, Quaternion};

    fn client() -> SocketAddr {
        "192.168.1.20:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_all_sources_present() {
        let mut gateway = MockFlightGateway::new();
        gateway.expect_state().times(1).returning(|| {
            Some(FlightState { mode: "OFFBOARD".into(), armed: true, connected: true })
        });
        gateway
            .expect_local_pose()
            .times(1)
            .returning(|| Some(Pose::new(Point::new(1.0, 2.0, 3.0), Quaternion::IDENTITY)));
        gateway.expect_global_fix().times(1).returning(|| {
            Some(GpsFix { latitude: 47.0, longitude: 8.0, altitude: 500.0, status: 0 })
        });
        gateway.expect_frame_transform().times(1).returning(|| None);

        let telemetry = snapshot(&gateway).await;

        assert_eq!(telemetry.flight_state().unwrap().mode, "OFFBOARD");
        assert_eq!(telemetry.pose().unwrap().position, Point::new(1.0, 2.0, 3.0));
        assert_eq!(telemetry.gps().unwrap().altitude, 500.0);
        assert!(telemetry.frame_transform.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_tolerates_absent_sources() {
        let mut gateway = MockFlightGateway::new();
        gateway.expect_state().returning(|| None);
        gateway.expect_local_pose().returning(|| None);
        gateway.expect_global_fix().returning(|| None);
        gateway.expect_frame_transform().returning(|| None);

        let telemetry = snapshot(&gateway).await;
        assert_eq!(telemetry, TelemetrySnapshot::default());
    }

    #[test]
    fn test_build_reply_copies_last_command() {
        let reply = build_reply(123, TelemetrySnapshot::default(), LastCommand { id: 8, completed: true });
        assert_eq!(reply.timestamp, 123);
        assert_eq!(reply.last_command_id, 8);
        assert!(reply.last_command_completed);
    }

    #[tokio::test]
    async fn test_send_reply_frames_payload() {
        let sink = RecordingSink::default();
        let reply = build_reply(1, TelemetrySnapshot::default(), LastCommand { id: 3, completed: false });

        send_reply(&sink, &reply, client()).await.unwrap();

        let replies = sink.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, client());
        assert_eq!(replies[0].1, reply);
    }

    #[tokio::test]
    async fn test_send_reply_rejects_oversized_reply() {
        let sink = RecordingSink::default();
        let telemetry = TelemetrySnapshot {
            local_pose: Some(vec![0u8; MAX_PAYLOAD_SIZE]),
            ..Default::default()
        };
        let reply = build_reply(1, telemetry, LastCommand::default());

        let result = send_reply(&sink, &reply, client()).await;

        assert!(matches!(
            result,
            Err(CommanderError::Frame(FrameError::Oversized { max: MAX_PAYLOAD_SIZE, .. }))
        ));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_reply_propagates_io_error() {
        let sink = RecordingSink { fail: true, ..Default::default() };
        let reply = build_reply(1, TelemetrySnapshot::default(), LastCommand::default());
        assert!(send_reply(&sink, &reply, client()).await.is_err());
    }
}
