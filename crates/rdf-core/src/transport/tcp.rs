//! Socket-style pipe.
//!
//! The host agent listens on the well-known port and accepts exactly one
//! peer (the receiving bootloader's network stack). Once accepted, the
//! connection behaves as the same duplex byte pipe as the accessory variant.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::traits::{TransportChannel, TransportError};

/// Listens for and accepts the single peer connection.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind the listening socket on all interfaces.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;
        info!(port = listener.local_addr().map(|a| a.port()).unwrap_or(port), "Listening");
        Ok(Self { listener })
    }

    /// Port actually bound (differs from the request when binding port 0).
    pub fn local_port(&self) -> Result<u16, TransportError> {
        Ok(self
            .listener
            .local_addr()
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?
            .port())
    }

    /// Block until one peer connects, then stop listening.
    pub fn accept_one(self) -> Result<TcpChannel, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;
        info!(%peer, "Peer connected");
        Ok(TcpChannel::new(stream, peer))
    }
}

pub struct TcpChannel {
    stream: TcpStream,
    peer: SocketAddr,
    connected: AtomicBool,
}

impl TcpChannel {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            connected: AtomicBool::new(true),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn fault(&self, e: std::io::Error) -> TransportError {
        self.connected.store(false, Ordering::SeqCst);
        match e.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => TransportError::Disconnected,
            _ => TransportError::WriteFailed(e.to_string()),
        }
    }
}

impl TransportChannel for TcpChannel {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        match (&self.stream).write(data) {
            Ok(0) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::Disconnected)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.fault(e)),
        }
    }

    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut buf = vec![0u8; max_len];
        match (&self.stream).read(&mut buf) {
            Ok(0) => {
                // Orderly shutdown from the peer.
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::Disconnected)
            }
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::ReadFailed(e.to_string()))
            }
        }
    }

    fn flush(&self) -> Result<(), TransportError> {
        (&self.stream).flush().map_err(|e| self.fault(e))
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            // Unblocks a peer (or a worker) stuck in read/write.
            let _ = self.stream.shutdown(Shutdown::Both);
            debug!(peer = %self.peer, "Socket closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
