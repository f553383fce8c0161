//! Readable image sources.
//!
//! The session never touches filesystem paths directly; it only sees the
//! `ImageSource` capability, so content-provider style virtual sources work
//! the same as plain files. Sources are forward-only: `open_stream` hands
//! back a fresh stream each time, and the session reads it once per pass.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Abstract readable source of image bytes.
pub trait ImageSource: Send + Sync {
    /// Declared payload size in bytes.
    fn size(&self) -> u64;

    /// Display name for logs and events.
    fn name(&self) -> String;

    /// Open a fresh forward-only stream over the content.
    fn open_stream(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// A source backed by a regular file.
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /// Stat the file and capture its size as the declared image size.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }
}

impl ImageSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn open_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// In-memory source for tests and demos.
pub struct MemorySource {
    name: String,
    data: Arc<Vec<u8>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }
}

impl ImageSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn open_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        let data = Arc::clone(&self.data);
        Ok(Box::new(ArcReader { data, pos: 0 }))
    }
}

struct ArcReader {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl Read for ArcReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}
