//! Event system for front-end decoupling.
//!
//! A CLI or GUI subscribes to session events without tight coupling to the
//! protocol engine. Observer callbacks are fire-and-forget: the worker never
//! waits on a front end.

use std::fmt;
use std::sync::mpsc;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Session states.
///
/// `ComputingChecksum`, `SendingHeader` and `Streaming` are the working
/// states; a failure in any of them lands in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    /// No source selected yet.
    Idle,
    /// A job is selected, waiting for `start`.
    SourceSelected,
    /// First pass over the source, computing the digest.
    ComputingChecksum,
    /// Writing the 128-byte handshake header.
    SendingHeader,
    /// Streaming payload chunks.
    Streaming,
    /// Transfer finished, byte-exact.
    Complete,
    /// Run aborted; select/start again to retry.
    Failed,
}

impl FlashState {
    /// Whether a run is currently using the transport.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            FlashState::ComputingChecksum | FlashState::SendingHeader | FlashState::Streaming
        )
    }
}

impl fmt::Display for FlashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashState::Idle => write!(f, "Idle"),
            FlashState::SourceSelected => write!(f, "Source Selected"),
            FlashState::ComputingChecksum => write!(f, "Computing Checksum"),
            FlashState::SendingHeader => write!(f, "Sending Header"),
            FlashState::Streaming => write!(f, "Streaming"),
            FlashState::Complete => write!(f, "Complete"),
            FlashState::Failed => write!(f, "Failed"),
        }
    }
}

/// Coarse error classification carried on `FlashEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PreconditionNotMet,
    SourceUnreadable,
    InvalidHeader,
    HeaderWriteFailed,
    StreamWriteFailed,
    TransportDisconnected,
    PermissionDenied,
    SizeMismatch,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::PreconditionNotMet => write!(f, "precondition not met"),
            ErrorKind::SourceUnreadable => write!(f, "source unreadable"),
            ErrorKind::InvalidHeader => write!(f, "invalid header"),
            ErrorKind::HeaderWriteFailed => write!(f, "header write failed"),
            ErrorKind::StreamWriteFailed => write!(f, "stream write failed"),
            ErrorKind::TransportDisconnected => write!(f, "transport disconnected"),
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::SizeMismatch => write!(f, "size mismatch"),
        }
    }
}

/// Events emitted by the flash session and connection manager.
#[derive(Debug, Clone)]
pub enum FlashEvent {
    /// Session state changed.
    StatusChanged { from: FlashState, to: FlashState },
    /// Progress update; `percent` is 0..=100 and non-decreasing within a run.
    Progress { percent: u8, bytes_sent: u64 },
    /// Log line for display.
    Log { level: LogLevel, message: String },
    /// Terminal failure of the current run.
    Error { kind: ErrorKind, message: String },
}

/// Observer trait for receiving session events.
///
/// Implement this in the front-end layer.
pub trait FlashObserver: Send + Sync {
    fn on_event(&self, event: &FlashEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FlashObserver for NullObserver {
    fn on_event(&self, _event: &FlashEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FlashObserver for TracingObserver {
    fn on_event(&self, event: &FlashEvent) {
        match event {
            FlashEvent::StatusChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "State changed");
            }
            FlashEvent::Progress { percent, bytes_sent } => {
                tracing::debug!(percent = percent, bytes = bytes_sent, "Progress");
            }
            FlashEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            FlashEvent::Error { kind, message } => {
                tracing::error!(kind = %kind, "Error: {}", message);
            }
        }
    }
}

/// Observer that forwards events into an mpsc channel.
///
/// Sends are fire-and-forget; a hung or dropped receiver never blocks the
/// worker.
pub struct SenderObserver {
    sender: mpsc::Sender<FlashEvent>,
}

impl SenderObserver {
    pub fn new() -> (Self, mpsc::Receiver<FlashEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl FlashObserver for SenderObserver {
    fn on_event(&self, event: &FlashEvent) {
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_states() {
        assert!(FlashState::ComputingChecksum.is_running());
        assert!(FlashState::SendingHeader.is_running());
        assert!(FlashState::Streaming.is_running());
        assert!(!FlashState::Idle.is_running());
        assert!(!FlashState::SourceSelected.is_running());
        assert!(!FlashState::Complete.is_running());
        assert!(!FlashState::Failed.is_running());
    }

    #[test]
    fn test_sender_observer_forwards() {
        let (observer, receiver) = SenderObserver::new();
        observer.on_event(&FlashEvent::Progress {
            percent: 50,
            bytes_sent: 512,
        });

        match receiver.try_recv().unwrap() {
            FlashEvent::Progress { percent, bytes_sent } => {
                assert_eq!(percent, 50);
                assert_eq!(bytes_sent, 512);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
