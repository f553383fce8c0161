//! RDF wire protocol: constants and the handshake header codec.

pub mod constants;
pub mod header;

pub use header::{HeaderError, RdfHeader};
