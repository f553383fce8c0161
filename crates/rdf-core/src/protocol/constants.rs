//! RDF transfer protocol constants.

/// Header magic bytes: "RDF!"
pub const RDF_MAGIC: [u8; 4] = [0x52, 0x44, 0x46, 0x21];

/// Total size of the handshake header on the wire.
pub const HEADER_SIZE: usize = 128;

/// Length of the SHA-256 digest carried in the header.
pub const CHECKSUM_LEN: usize = 32;

/// Length of the zero-padded target label field.
pub const TARGET_LABEL_LEN: usize = 64;

/// Length of the trailing reserved field.
pub const RESERVED_LEN: usize = 20;

/// Chunk size for checksum computation and payload streaming (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Subvolume the receiver writes into unless the job overrides it.
pub const DEFAULT_TARGET_LABEL: &str = "@core";

/// Well-known port the socket-style transport listens on (0x5244, "RD").
pub const DEFAULT_LISTEN_PORT: u16 = 21060;
