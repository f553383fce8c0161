//! Streaming SHA-256 checksum computation.
//!
//! The header carries the digest ahead of the payload, so the source is read
//! twice in full: once here, once when streaming. That doubles I/O for large
//! images; a trailer-checksum protocol variant would avoid it, but the
//! receiver expects the digest up front, so the double read stays.

use std::io::Read;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::protocol::constants::CHUNK_SIZE;

/// Result of one checksum pass: the digest plus the number of bytes the
/// stream actually yielded. The caller compares the count against the
/// declared image size before any header byte goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumResult {
    pub digest: [u8; 32],
    pub bytes_read: u64,
}

/// Consume `stream` once, feeding every chunk into an incremental SHA-256.
///
/// The stream is forward-only; no seeking or rewinding is assumed.
pub fn compute_checksum(stream: &mut dyn Read) -> std::io::Result<ChecksumResult> {
    compute_checksum_chunked(stream, CHUNK_SIZE)
}

fn compute_checksum_chunked(
    stream: &mut dyn Read,
    chunk_size: usize,
) -> std::io::Result<ChecksumResult> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size];
    let mut total: u64 = 0;

    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    let digest: [u8; 32] = hasher.finalize().into();
    debug!(bytes = total, "Checksum pass complete");
    Ok(ChecksumResult {
        digest,
        bytes_read: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_sha256() {
        let data = b"0123456789";
        let result = compute_checksum(&mut &data[..]).unwrap();
        assert_eq!(result.bytes_read, 10);
        assert_eq!(result.digest[..], Sha256::digest(data)[..]);
    }

    #[test]
    fn test_digest_independent_of_chunk_size() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        let a = compute_checksum_chunked(&mut &data[..], 64 * 1024).unwrap();
        let b = compute_checksum_chunked(&mut &data[..], 777).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.bytes_read, data.len() as u64);
    }

    #[test]
    fn test_read_failure_propagates() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("backing store vanished"))
            }
        }

        assert!(compute_checksum(&mut FailingReader).is_err());
    }

    #[test]
    fn test_empty_stream() {
        let result = compute_checksum(&mut std::io::empty()).unwrap();
        assert_eq!(result.bytes_read, 0);
        assert_eq!(result.digest[..], Sha256::digest([])[..]);
    }
}
