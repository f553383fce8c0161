//! rdf-core: host-side engine for the RDF image transfer protocol.
//!
//! Streams a locally stored disk/OS image to a receiving bootloader over a
//! duplex byte pipe, framed by a fixed 128-byte handshake header carrying
//! size, SHA-256 checksum, and placement metadata.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Header codec and wire constants
//! - **Checksum**: Streaming SHA-256 over the source
//! - **Source**: Abstract readable-source capability (file, in-memory)
//! - **Transport**: Duplex pipe abstraction (accessory, TCP, mock)
//! - **Connection**: Lifecycle of the single active transport
//! - **Events**: Observer pattern for front-end decoupling
//! - **Session**: The transfer state machine
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rdf_core::connection::ConnectionManager;
//! use rdf_core::events::TracingObserver;
//! use rdf_core::session::{FlashJob, FlashSession};
//! use rdf_core::source::FileSource;
//! use rdf_core::transport::{ChannelKind, TcpAcceptor};
//!
//! let observer = Arc::new(TracingObserver);
//! let manager = ConnectionManager::new(observer);
//!
//! let channel = TcpAcceptor::bind(rdf_core::DEFAULT_LISTEN_PORT)
//!     .and_then(|a| a.accept_one())
//!     .expect("accept failed");
//! manager.on_channel_available(ChannelKind::Socket, Arc::new(channel));
//!
//! let session = FlashSession::new();
//! let source = Arc::new(FileSource::open("core.img").expect("open failed"));
//! session.select_source(FlashJob::new(source)).expect("select failed");
//! session.start(&manager).expect("start rejected");
//! session.wait();
//! ```

pub mod checksum;
pub mod connection;
pub mod events;
pub mod protocol;
pub mod session;
pub mod source;
pub mod transport;

// Re-exports for convenience
pub use checksum::{ChecksumResult, compute_checksum};
pub use connection::{ConnectionManager, TransportSession};
pub use events::{ErrorKind, FlashEvent, FlashObserver, FlashState, LogLevel, TracingObserver};
pub use protocol::constants::{CHUNK_SIZE, DEFAULT_LISTEN_PORT, DEFAULT_TARGET_LABEL, HEADER_SIZE};
pub use protocol::{HeaderError, RdfHeader};
pub use session::{FlashError, FlashJob, FlashSession, SessionConfig};
pub use source::{FileSource, ImageSource, MemorySource};
pub use transport::{
    AccessoryChannel, ChannelKind, MockChannel, TcpAcceptor, TcpChannel, TransportChannel,
    TransportError,
};
