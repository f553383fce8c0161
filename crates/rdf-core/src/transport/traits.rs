//! Transport layer abstraction.
//!
//! Defines the `TransportChannel` trait for the duplex byte pipe carrying
//! one transfer, allowing interchangeable implementations (accessory pipe,
//! TCP socket, mock). The session and connection manager contain no
//! transport-specific branching.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Channel disconnected")]
    Disconnected,

    #[error("Accept failed: {0}")]
    AcceptFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which kind of pipe a channel was obtained through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Duplex pipe handed over after a host-driven accessory negotiation.
    Accessory,
    /// TCP connection accepted on the well-known port.
    Socket,
}

impl ChannelKind {
    /// Accessory pipes need an asynchronous platform grant before use;
    /// an accepted socket is usable immediately.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, ChannelKind::Accessory)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Accessory => write!(f, "accessory"),
            ChannelKind::Socket => write!(f, "socket"),
        }
    }
}

/// Abstract duplex byte pipe.
///
/// A channel that reports disconnected is permanently failed: there is no
/// reconnect-and-continue, the owner closes and discards it.
pub trait TransportChannel: Send + Sync {
    /// Write raw bytes, returning how many were written.
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `max_len` raw bytes.
    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Flush any transport-level buffering.
    fn flush(&self) -> Result<(), TransportError>;

    /// Tear the pipe down. Further writes fail with `Disconnected`.
    fn close(&self);

    /// Whether the pipe is still usable.
    fn is_connected(&self) -> bool;

    /// Write the whole buffer or fail.
    fn write_all(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut sent = 0;
        while sent < data.len() {
            let n = self.write(&data[sent..])?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }
            sent += n;
        }
        Ok(())
    }
}
