//! Flash session - the transfer state machine.
//!
//! One run moves through `ComputingChecksum -> SendingHeader -> Streaming`
//! on a single background worker thread, with `Failed` reachable from each
//! working state. The transport is only borrowed for the run: the connection
//! manager keeps ownership and the session never closes a healthy channel.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::checksum::compute_checksum;
use crate::connection::ConnectionManager;
use crate::events::{ErrorKind, FlashEvent, FlashObserver, FlashState, TracingObserver};
use crate::protocol::constants::{CHUNK_SIZE, DEFAULT_TARGET_LABEL};
use crate::protocol::header::{HeaderError, RdfHeader};
use crate::source::ImageSource;
use crate::transport::{TransportChannel, TransportError};

#[derive(Error, Debug)]
pub enum FlashError {
    #[error("Start rejected: {0}")]
    PreconditionNotMet(String),

    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("Header write failed: {0}")]
    HeaderWriteFailed(String),

    #[error("Stream write failed: {0}")]
    StreamWriteFailed(String),

    #[error("Transport disconnected")]
    TransportDisconnected,

    #[error("Transport authorization denied")]
    PermissionDenied,

    #[error("Source size mismatch: declared {declared}, read {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
}

impl FlashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlashError::PreconditionNotMet(_) => ErrorKind::PreconditionNotMet,
            FlashError::SourceUnreadable(_) => ErrorKind::SourceUnreadable,
            FlashError::Header(_) => ErrorKind::InvalidHeader,
            FlashError::HeaderWriteFailed(_) => ErrorKind::HeaderWriteFailed,
            FlashError::StreamWriteFailed(_) => ErrorKind::StreamWriteFailed,
            FlashError::TransportDisconnected => ErrorKind::TransportDisconnected,
            FlashError::PermissionDenied => ErrorKind::PermissionDenied,
            FlashError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }

    /// Whether the channel itself faulted and must be abandoned.
    fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            FlashError::TransportDisconnected
                | FlashError::HeaderWriteFailed(_)
                | FlashError::StreamWriteFailed(_)
        )
    }
}

/// Configuration for a flash session front end.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the image file.
    pub image_path: Option<String>,
    /// Target subvolume label; defaults to "@core" when absent.
    pub target_label: Option<String>,
    /// Port for the socket-style transport.
    pub listen_port: Option<u16>,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// One selected transfer: the source plus its placement metadata.
///
/// Replaced wholesale by `select_source`; read-only during a run.
#[derive(Clone)]
pub struct FlashJob {
    pub source: Arc<dyn ImageSource>,
    pub size: u64,
    pub name: String,
    pub target_label: String,
}

impl FlashJob {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        let size = source.size();
        let name = source.name();
        Self {
            source,
            size,
            name,
            target_label: DEFAULT_TARGET_LABEL.to_string(),
        }
    }

    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }
}

/// Capacity-1 run slot.
///
/// The slot, not a busy flag read by callers, is the authority on whether a
/// run is in flight: acquisition is a single compare-exchange, so there is
/// no gap between "is a run active" and "start one".
struct RunSlot {
    active: AtomicBool,
}

impl RunSlot {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    fn try_acquire(self: &Arc<Self>) -> Option<RunGuard> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                slot: Arc::clone(self),
            })
    }
}

struct RunGuard {
    slot: Arc<RunSlot>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::SeqCst);
    }
}

struct SessionShared<O: FlashObserver> {
    observer: Arc<O>,
    state: Mutex<SessionState>,
}

struct SessionState {
    state: FlashState,
    job: Option<FlashJob>,
}

impl<O: FlashObserver> SessionShared<O> {
    fn set_state(&self, to: FlashState) {
        let from = {
            let mut guard = self.state.lock().unwrap();
            std::mem::replace(&mut guard.state, to)
        };
        if from != to {
            self.observer
                .on_event(&FlashEvent::StatusChanged { from, to });
        }
    }
}

/// The flash session.
pub struct FlashSession<O: FlashObserver> {
    shared: Arc<SessionShared<O>>,
    slot: Arc<RunSlot>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlashSession<TracingObserver> {
    /// Create a session with the default tracing observer.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }
}

impl Default for FlashSession<TracingObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: FlashObserver + 'static> FlashSession<O> {
    /// Create a session with a custom observer.
    pub fn with_observer(observer: Arc<O>) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                observer,
                state: Mutex::new(SessionState {
                    state: FlashState::Idle,
                    job: None,
                }),
            }),
            slot: Arc::new(RunSlot::new()),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FlashState {
        self.shared.state.lock().unwrap().state
    }

    /// Select the source for the next run, replacing any previous selection.
    ///
    /// Rejected while a run is in flight and for zero-length sources.
    pub fn select_source(&self, job: FlashJob) -> Result<(), FlashError> {
        if job.size == 0 {
            return Err(FlashError::SourceUnreadable(
                "zero-length source has no payload".into(),
            ));
        }

        let from = {
            let mut guard = self.shared.state.lock().unwrap();
            if guard.state.is_running() {
                return Err(FlashError::PreconditionNotMet(
                    "cannot change source during a run".into(),
                ));
            }
            info!(name = %job.name, size = job.size, label = %job.target_label, "Source selected");
            guard.job = Some(job);
            std::mem::replace(&mut guard.state, FlashState::SourceSelected)
        };
        if from != FlashState::SourceSelected {
            self.shared.observer.on_event(&FlashEvent::StatusChanged {
                from,
                to: FlashState::SourceSelected,
            });
        }
        Ok(())
    }

    /// Start a run on the background worker.
    ///
    /// Rejected synchronously, with no state change, when no source is
    /// selected, no transport is connected, or a run is already in flight.
    pub fn start(&self, manager: &ConnectionManager) -> Result<(), FlashError> {
        let channel = manager.active_channel().ok_or_else(|| {
            FlashError::PreconditionNotMet("no transport connected".into())
        })?;
        self.start_on(channel)
    }

    /// Start a run on an explicit channel. Same preconditions as `start`.
    pub fn start_on(&self, channel: Arc<dyn TransportChannel>) -> Result<(), FlashError> {
        if !channel.is_connected() {
            return Err(FlashError::PreconditionNotMet(
                "transport is not connected".into(),
            ));
        }

        let job = {
            let guard = self.shared.state.lock().unwrap();
            guard
                .job
                .clone()
                .ok_or_else(|| FlashError::PreconditionNotMet("no source selected".into()))?
        };

        // The slot is acquired before any state change; a second caller
        // loses the compare-exchange and is rejected, never queued.
        let run_guard = self.slot.try_acquire().ok_or_else(|| {
            FlashError::PreconditionNotMet("a run is already in progress".into())
        })?;

        self.shared.set_state(FlashState::ComputingChecksum);
        self.log(format!("Starting transfer of {} ({} bytes)", job.name, job.size));

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || {
            let _guard = run_guard;
            match run_transfer(&shared, &job, channel.as_ref()) {
                Ok(()) => {
                    shared.set_state(FlashState::Complete);
                    shared.observer.on_event(&FlashEvent::Log {
                        level: crate::events::LogLevel::Info,
                        message: format!("Transfer complete: {} bytes", job.size),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Run failed");
                    if e.is_transport_fault() {
                        channel.close();
                    }
                    shared.observer.on_event(&FlashEvent::Error {
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    shared.set_state(FlashState::Failed);
                }
            }
        });

        let mut worker = self.worker.lock().unwrap();
        if let Some(stale) = worker.take() {
            // Previous run finished (the slot was free); reap its thread.
            let _ = stale.join();
        }
        *worker = Some(handle);
        Ok(())
    }

    /// Block until the current run (if any) finishes.
    pub fn wait(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn log(&self, message: String) {
        self.shared.observer.on_event(&FlashEvent::Log {
            level: crate::events::LogLevel::Info,
            message,
        });
    }
}

/// The worker body: checksum pass, header, payload stream.
fn run_transfer<O: FlashObserver>(
    shared: &SessionShared<O>,
    job: &FlashJob,
    channel: &dyn TransportChannel,
) -> Result<(), FlashError> {
    // Pass 1: digest. Nothing is sent if this fails.
    let mut stream = job
        .source
        .open_stream()
        .map_err(|e| FlashError::SourceUnreadable(e.to_string()))?;
    let checksum = compute_checksum(stream.as_mut())
        .map_err(|e| FlashError::SourceUnreadable(e.to_string()))?;
    if checksum.bytes_read != job.size {
        return Err(FlashError::SizeMismatch {
            declared: job.size,
            actual: checksum.bytes_read,
        });
    }

    // Header, in one logical write.
    shared.set_state(FlashState::SendingHeader);
    let header = RdfHeader::new(job.size, checksum.digest.to_vec(), job.target_label.clone());
    let record = header.encode()?;
    channel.write_all(&record).map_err(|e| match e {
        TransportError::Disconnected => FlashError::TransportDisconnected,
        other => FlashError::HeaderWriteFailed(other.to_string()),
    })?;
    info!(size = job.size, label = %job.target_label, "Header sent");

    // Pass 2: payload. `take` caps the wire at the declared size even if
    // the source grew since the checksum pass.
    shared.set_state(FlashState::Streaming);
    let stream = job
        .source
        .open_stream()
        .map_err(|e| FlashError::SourceUnreadable(e.to_string()))?;
    let mut stream = stream.take(job.size);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    let mut last_percent: u8 = 0;

    loop {
        let n = stream
            .read(&mut buf)
            .map_err(|e| FlashError::SourceUnreadable(e.to_string()))?;
        if n == 0 {
            break;
        }

        channel.write_all(&buf[..n]).map_err(|e| match e {
            TransportError::Disconnected => FlashError::TransportDisconnected,
            other => FlashError::StreamWriteFailed(other.to_string()),
        })?;
        total += n as u64;

        let percent = ((total * 100) / job.size) as u8;
        if percent > last_percent && percent < 100 {
            shared.observer.on_event(&FlashEvent::Progress {
                percent,
                bytes_sent: total,
            });
            last_percent = percent;
        }
    }

    channel.flush().map_err(|e| match e {
        TransportError::Disconnected => FlashError::TransportDisconnected,
        other => FlashError::StreamWriteFailed(other.to_string()),
    })?;

    if total != job.size {
        return Err(FlashError::SizeMismatch {
            declared: job.size,
            actual: total,
        });
    }

    // 100 goes out exactly once, after the final chunk is flushed.
    shared.observer.on_event(&FlashEvent::Progress {
        percent: 100,
        bytes_sent: total,
    });
    Ok(())
}
