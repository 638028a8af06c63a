//! Network infrastructure for the client application.
//!
//! Provides the concrete [`DatagramTransport`] over a connected UDP socket.
//!
//! # Why `connect` a UDP socket? (for beginners)
//!
//! UDP is connectionless, but calling `connect` on the socket still helps:
//! the OS records the peer address so plain `send`/`recv` can be used
//! instead of `send_to`/`recv_from`, and datagrams arriving from any other
//! address are silently discarded by the kernel.  That filtering matters
//! here because every accepted datagram feeds the decryption path.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use rmouse_core::protocol::commands::IV_BYTES;
use tokio::{net::UdpSocket, time};
use tracing::debug;

use crate::application::run_session::{DatagramTransport, TransportError};

/// A connected UDP socket carrying session frames to and from one peer.
pub struct UdpTransport {
    socket: UdpSocket,
    /// Receive buffer size: one IV plus one frame block covers the largest
    /// frame the session produces, and the 16-byte salt reply fits too.
    recv_buf_len: usize,
}

impl UdpTransport {
    /// Binds an ephemeral local port and connects it to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if binding or connecting fails.
    pub async fn connect(peer: SocketAddr, frame_block: usize) -> Result<Self, TransportError> {
        let bind_addr: SocketAddr = if peer.is_ipv4() {
            "0.0.0.0:0".parse().map_err(|_| TransportError::Closed)?
        } else {
            "[::]:0".parse().map_err(|_| TransportError::Closed)?
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(peer).await?;
        debug!(%peer, "datagram transport connected");
        Ok(Self {
            socket,
            recv_buf_len: IV_BYTES + frame_block,
        })
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.socket.send(frame).await?;
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = vec![0u8; self.recv_buf_len];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Ok(Err(e)) => Err(TransportError::Io(e)),
            // Timeout is a normal outcome, not an error: it is the clock
            // the session state machine runs on.
            Err(_elapsed) => Ok(None),
        }
    }
}
