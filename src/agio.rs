//! UDP listener for binary PGN frames sent by the guidance application.
//!
//! Datagrams that start with the `0x80 0x81` header are forwarded whole to
//! the control loop; anything else is dropped here. Validation happens in
//! the decoder on the control loop.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::pgn::protocol::{PGN_HEADER_HI, PGN_HEADER_LO};

/// Largest datagram accepted
const MAX_DATAGRAM_SIZE: usize = 512;

/// Whether `datagram` starts with the binary frame header
pub fn is_binary_frame(datagram: &[u8]) -> bool {
    datagram.len() >= 2 && datagram[0] == PGN_HEADER_HI && datagram[1] == PGN_HEADER_LO
}

/// Bound UDP source of binary frames
#[derive(Debug)]
pub struct FrameSource {
    socket: UdpSocket,
}

impl FrameSource {
    /// Bind to `addr` (e.g. `0.0.0.0:17777`)
    ///
    /// # Errors
    ///
    /// Returns error if the address does not parse or cannot be bound
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(local_addr = ?socket.local_addr().ok(), "Listening for binary frames");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Forward frames to `frames` until the receiver is dropped
    pub async fn run(self, frames: mpsc::Sender<Vec<u8>>) {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut received: u64 = 0;

        loop {
            let (len, peer) = tokio::select! {
                result = self.socket.recv_from(&mut buffer) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port-unreachable and similar transient errors
                        warn!("UDP receive failed: {}", e);
                        continue;
                    }
                },
                _ = frames.closed() => {
                    debug!("Frame channel closed, stopping listener");
                    return;
                }
            };

            let datagram = &buffer[..len];
            if !is_binary_frame(datagram) {
                trace!(%peer, len, "Ignoring non-frame datagram");
                continue;
            }

            received += 1;
            if received == 1 {
                info!(%peer, "Received first binary frame ({} bytes)", len);
            }

            if frames.send(datagram.to_vec()).await.is_err() {
                return;
            }
        }
    }

    /// Run the listener on its own task
    pub fn spawn(self, frames: mpsc::Sender<Vec<u8>>) -> JoinHandle<()> {
        tokio::spawn(self.run(frames))
    }
}
