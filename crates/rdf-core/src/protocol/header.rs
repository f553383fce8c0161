//! RDF handshake header codec.
//!
//! The header is a fixed 128-byte record sent once per transfer, before any
//! payload byte:
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 4    | magic "RDF!" |
//! | 4      | 8    | image size (u64 LE) |
//! | 12     | 32   | SHA-256 of the payload |
//! | 44     | 64   | target label, UTF-8, zero-padded |
//! | 108    | 20   | reserved (zero) |
//!
//! Decoding belongs to the receiving bootloader; the host side only encodes.

use byteorder::{LittleEndian, WriteBytesExt};
use thiserror::Error;

use super::constants::{CHECKSUM_LEN, HEADER_SIZE, RDF_MAGIC, RESERVED_LEN, TARGET_LABEL_LEN};

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Checksum must be exactly {expected} bytes, got {actual}")]
    InvalidChecksumLength { expected: usize, actual: usize },

    #[error("Target label too long: {actual} bytes, limit {limit}")]
    LabelTooLong { actual: usize, limit: usize },
}

/// The RDF handshake header.
///
/// `encode` is pure and deterministic: the same inputs always produce the
/// same 128 bytes. Labels longer than the field are an error, never
/// truncated, since the receiver takes the field verbatim as a subvolume
/// name.
#[derive(Debug, Clone)]
pub struct RdfHeader {
    pub image_size: u64,
    pub checksum: Vec<u8>,
    pub target_label: String,
}

impl RdfHeader {
    pub const SIZE: usize = HEADER_SIZE;

    pub fn new(image_size: u64, checksum: Vec<u8>, target_label: impl Into<String>) -> Self {
        Self {
            image_size,
            checksum,
            target_label: target_label.into(),
        }
    }

    /// Encode to the 128-byte wire record.
    pub fn encode(&self) -> Result<[u8; HEADER_SIZE], HeaderError> {
        if self.checksum.len() != CHECKSUM_LEN {
            return Err(HeaderError::InvalidChecksumLength {
                expected: CHECKSUM_LEN,
                actual: self.checksum.len(),
            });
        }

        let label = self.target_label.as_bytes();
        if label.len() > TARGET_LABEL_LEN {
            return Err(HeaderError::LabelTooLong {
                actual: label.len(),
                limit: TARGET_LABEL_LEN,
            });
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&RDF_MAGIC);
        buf.write_u64::<LittleEndian>(self.image_size).unwrap();
        buf.extend_from_slice(&self.checksum);
        buf.extend_from_slice(label);
        buf.resize(HEADER_SIZE - RESERVED_LEN, 0); // pad label field
        buf.resize(HEADER_SIZE, 0); // reserved

        let mut record = [0u8; HEADER_SIZE];
        record.copy_from_slice(&buf);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn digest(data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    #[test]
    fn test_encode_field_offsets() {
        let checksum = vec![0xAB; 32];
        let header = RdfHeader::new(0x1122334455667788, checksum.clone(), "@core");
        let bytes = header.encode().unwrap();

        assert_eq!(bytes.len(), 128);
        assert_eq!(&bytes[0..4], &[0x52, 0x44, 0x46, 0x21]);
        assert_eq!(&bytes[4..12], &0x1122334455667788u64.to_le_bytes());
        assert_eq!(&bytes[12..44], checksum.as_slice());
        assert_eq!(&bytes[44..49], b"@core");
        assert!(bytes[49..108].iter().all(|&b| b == 0));
        assert!(bytes[108..128].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let header = RdfHeader::new(4096, vec![7; 32], "@core");
        assert_eq!(header.encode().unwrap(), header.encode().unwrap());
    }

    #[test]
    fn test_label_zero_padded() {
        let label = "x".repeat(64);
        let header = RdfHeader::new(1, vec![0; 32], label.clone());
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[44..108], label.as_bytes());

        let short = RdfHeader::new(1, vec![0; 32], "ab").encode().unwrap();
        assert_eq!(&short[44..46], b"ab");
        assert!(short[46..108].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_label_too_long_rejected() {
        let header = RdfHeader::new(1, vec![0; 32], "x".repeat(65));
        assert!(matches!(
            header.encode(),
            Err(HeaderError::LabelTooLong { actual: 65, limit: 64 })
        ));
    }

    #[test]
    fn test_invalid_checksum_length_rejected() {
        for len in [0, 31, 33] {
            let header = RdfHeader::new(1, vec![0; len], "@core");
            assert!(matches!(
                header.encode(),
                Err(HeaderError::InvalidChecksumLength { expected: 32, .. })
            ));
        }
    }

    #[test]
    fn test_known_ten_byte_image() {
        // The reference scenario: 10 ASCII digits targeting "@core".
        let payload = b"0123456789";
        let header = RdfHeader::new(payload.len() as u64, digest(payload), "@core");
        let bytes = header.encode().unwrap();

        assert_eq!(&bytes[0..4], &[0x52, 0x44, 0x46, 0x21]);
        assert_eq!(&bytes[4..12], &10u64.to_le_bytes());
        assert_eq!(&bytes[12..44], digest(payload).as_slice());
        assert_eq!(&bytes[44..49], b"@core");
        assert!(bytes[49..128].iter().all(|&b| b == 0));
    }
}
