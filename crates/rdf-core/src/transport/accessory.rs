//! Accessory-style pipe.
//!
//! The platform performs the accessory-mode negotiation and hands this
//! process an already-open duplex byte pipe (typically a device node file
//! descriptor). This channel just wraps the two halves; it never initiates
//! or re-runs the negotiation.

use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::traits::{TransportChannel, TransportError};

pub struct AccessoryChannel {
    reader: Mutex<Box<dyn Read + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    connected: AtomicBool,
}

impl AccessoryChannel {
    /// Wrap an already-open read half and write half.
    pub fn from_parts(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
        }
    }

    /// Wrap a duplex device node, cloning the descriptor for the read half.
    pub fn from_file(file: File) -> io::Result<Self> {
        let read_half = file.try_clone()?;
        info!("Accessory pipe opened");
        Ok(Self::from_parts(Box::new(read_half), Box::new(file)))
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl TransportChannel for AccessoryChannel {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        self.ensure_connected()?;
        let mut writer = self.writer.lock().unwrap();
        match writer.write(data) {
            Ok(0) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::Disconnected)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::WriteFailed(e.to_string()))
            }
        }
    }

    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected()?;
        let mut reader = self.reader.lock().unwrap();
        let mut buf = vec![0u8; max_len];
        let n = reader.read(&mut buf).map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            TransportError::ReadFailed(e.to_string())
        })?;
        buf.truncate(n);
        Ok(buf)
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let mut writer = self.writer.lock().unwrap();
        writer
            .flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!("Accessory pipe closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_through_pipe() {
        let sink: Vec<u8> = Vec::new();
        let channel = AccessoryChannel::from_parts(Box::new(std::io::empty()), Box::new(sink));

        assert!(channel.is_connected());
        assert_eq!(channel.write(b"abc").unwrap(), 3);
        channel.flush().unwrap();
    }

    #[test]
    fn test_closed_pipe_rejects_io() {
        let channel =
            AccessoryChannel::from_parts(Box::new(std::io::empty()), Box::new(Vec::new()));
        channel.close();

        assert!(!channel.is_connected());
        assert!(matches!(
            channel.write(b"abc"),
            Err(TransportError::Disconnected)
        ));
        assert!(matches!(channel.read(16), Err(TransportError::Disconnected)));
    }
}
