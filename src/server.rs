//! # UDP Server
//!
//! Owns the client-facing UDP socket. Every received datagram is handed to
//! the executor on its own task, so a long-running command never holds up
//! heartbeats. Replies go back out through the same socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::heartbeat::ReplySink;
use crate::executor::Executor;

#[async_trait]
impl ReplySink for UdpSocket {
    async fn send_reply(&self, frame: &[u8], to: SocketAddr) -> io::Result<()> {
        let sent = self.send_to(frame, to).await?;
        if sent != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }
}

/// Command server bound to one UDP port
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    executor: Executor,
    buffer_size: usize,
}

impl std::fmt::Debug for UdpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpServer")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl UdpServer {
    /// Bind the server socket
    ///
    /// # Arguments
    ///
    /// * `addr` - Local address, e.g. `"0.0.0.0:5555"`
    /// * `executor` - Executor that handles every datagram
    /// * `buffer_size` - Largest datagram accepted
    ///
    /// # Errors
    ///
    /// Returns error if the socket cannot be bound
    pub async fn bind(addr: &str, executor: Executor, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Command server bound to {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            executor,
            buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until the socket fails
    ///
    /// Receive errors caused by a single peer (e.g. ICMP port unreachable
    /// surfacing as `ConnectionReset`) are logged and skipped.
    pub async fn run(&self) -> Result<()> {
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) if is_transient(&e) => {
                    warn!("Receive error, continuing: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            debug!(peer = %peer, "Received {} bytes", len);
            let datagram = Bytes::copy_from_slice(&buffer[..len]);
            let socket = Arc::clone(&self.socket);
            let executor = self.executor.clone();

            tokio::spawn(async move {
                let outcome = executor.handle_datagram(&datagram, peer, socket.as_ref()).await;
                debug!(peer = %peer, ?outcome, "Datagram handled");
            });
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorSettings;
    use crate::framing;
    use crate::gateway::sim::SimulatedGateway;
    use crate::config::SimulatorConfig;
    use crate::message::{Command, Point, Pose, Quaternion, Reply, Request};
    use tokio::time::{timeout, Duration};

    async fn start_server() -> (SocketAddr, Executor) {
        let gateway = Arc::new(SimulatedGateway::new(SimulatorConfig::default()));
        let executor = Executor::new(gateway, ExecutorSettings::default());
        let server = UdpServer::bind("127.0.0.1:0", executor.clone(), 2048).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });
        (addr, executor)
    }

    async fn send(client: &UdpSocket, server: SocketAddr, request: &Request) {
        let frame = framing::encode(&request.to_bytes().unwrap());
        client.send_to(&frame, server).await.unwrap();
    }

    async fn receive_reply(client: &UdpSocket) -> Reply {
        let mut buffer = [0u8; 4096];
        let (len, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buffer))
            .await
            .expect("no reply within 2s")
            .unwrap();
        Reply::parse(framing::decode(&buffer[..len]).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_round_trip() {
        let (server, _) = start_server().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&client, server, &Request::new(1, Command::Heartbeat)).await;
        let reply = receive_reply(&client).await;

        assert_eq!(reply.last_command_id, 0);
        assert!(!reply.last_command_completed);
        let state = reply.telemetry.flight_state().unwrap();
        assert_eq!(state.mode, "MANUAL");
        assert!(reply.telemetry.gps().is_some());
        assert!(reply.telemetry.transform().is_some());
        assert!(reply.timestamp > 1_600_000_000);
    }

    #[tokio::test]
    async fn test_corrupt_datagram_gets_no_reply() {
        let (server, executor) = start_server().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(b"\x00\x00\x00\x10garbage", server).await.unwrap();

        let mut buffer = [0u8; 256];
        let result = timeout(Duration::from_millis(200), client.recv_from(&mut buffer)).await;
        assert!(result.is_err(), "unexpected reply to corrupt datagram");
        assert_eq!(executor.last_command().id, 0);
    }

    #[tokio::test]
    async fn test_command_then_heartbeat_reports_progress() {
        let (server, executor) = start_server().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&client, server, &Request::new(7, Command::SetArm)).await;
        let mut updates = executor.subscribe();
        timeout(Duration::from_secs(2), async {
            while !updates.borrow_and_update().completed {
                updates.changed().await.unwrap();
            }
        })
        .await
        .expect("arming did not complete");

        send(&client, server, &Request::new(8, Command::Heartbeat)).await;
        let reply = receive_reply(&client).await;
        assert_eq!(reply.last_command_id, 7);
        assert!(reply.last_command_completed);
        assert!(reply.telemetry.flight_state().unwrap().armed);

        let target = Pose::new(Point::new(0.1, 0.0, 0.0), Quaternion::IDENTITY);
        send(&client, server, &Request::goto(9, &target).unwrap()).await;
    }
}
