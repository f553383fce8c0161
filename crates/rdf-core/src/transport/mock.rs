//! Mock transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{TransportChannel, TransportError};

/// Mock channel for unit testing the session and connection manager.
///
/// Captures every write, can serve scripted reads, and can simulate a
/// disconnect either immediately or after a byte budget is exhausted
/// (mid-stream cable pull).
pub struct MockChannel {
    write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    read_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    connected: Arc<Mutex<bool>>,
    /// Remaining bytes accepted before the channel "dies"; `None` = unlimited.
    write_budget: Arc<Mutex<Option<u64>>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            write_log: Arc::new(Mutex::new(Vec::new())),
            read_queue: Arc::new(Mutex::new(VecDeque::new())),
            connected: Arc::new(Mutex::new(true)),
            write_budget: Arc::new(Mutex::new(None)),
        }
    }

    /// All captured writes, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    /// Total payload bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.write_log
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.len() as u64)
            .sum()
    }

    /// Queue data to be returned by the next `read`.
    pub fn queue_read(&self, data: &[u8]) {
        self.read_queue.lock().unwrap().push_back(data.to_vec());
    }

    /// Simulate the peer vanishing.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    /// Accept only `bytes` more before failing with `Disconnected`.
    pub fn fail_after(&self, bytes: u64) {
        *self.write_budget.lock().unwrap() = Some(bytes);
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportChannel for MockChannel {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }

        let mut budget = self.write_budget.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining < data.len() as u64 {
                *self.connected.lock().unwrap() = false;
                return Err(TransportError::Disconnected);
            }
            *remaining -= data.len() as u64;
        }

        self.write_log.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    fn read(&self, _max_len: usize) -> Result<Vec<u8>, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.read_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::ReadFailed("no queued data".into()))
    }

    fn flush(&self) -> Result<(), TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    fn close(&self) {
        *self.connected.lock().unwrap() = false;
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}
