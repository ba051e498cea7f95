//! Non-blocking file reader adapter: reads into a fixed chunk buffer per
//! step and folds `WouldBlock`/`Ok(0)` into a single "iterate" signal.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

/// One step of reading, plus the "give me the finished buffer" surface.
/// `iterate` returns `true` on end-of-stream *or* error — the adapter does
/// not distinguish the two outward, so both fold into the same completion
/// path.
pub trait NbioReader: Send {
    fn begin_read(&mut self);
    fn iterate(&mut self) -> bool;
    fn bytes(&self) -> Option<Arc<[u8]>>;
}

pub trait NbioBackend: Send + Sync {
    type Reader: NbioReader;

    fn open(&self, path: &str) -> Option<Self::Reader>;
}

/// Reads a file in `chunk_size`-sized steps, buffering everything read so
/// far. `bytes()` only returns `Some` once reading has finished, matching
/// `get_ptr`'s "borrow full buffer after finish" contract.
pub struct StdFileReader {
    file: Option<File>,
    buffer: Vec<u8>,
    chunk_size: usize,
    done: bool,
}

impl StdFileReader {
    fn new(file: File, chunk_size: usize) -> Self {
        Self { file: Some(file), buffer: Vec::new(), chunk_size, done: false }
    }
}

impl NbioReader for StdFileReader {
    fn begin_read(&mut self) {
        // Arming is a no-op here: the file is already open and positioned
        // at the start; `iterate` performs the actual reads.
    }

    fn iterate(&mut self) -> bool {
        if self.done {
            return true;
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => {
                self.done = true;
                return true;
            }
        };
        match file.read(&mut chunk) {
            Ok(0) => {
                self.done = true;
                true
            }
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                false
            }
            Err(_) => {
                self.done = true;
                true
            }
        }
    }

    fn bytes(&self) -> Option<Arc<[u8]>> {
        if self.done {
            Some(Arc::from(self.buffer.as_slice()))
        } else {
            None
        }
    }
}

pub struct StdNbioBackend {
    pub chunk_size: usize,
}

impl StdNbioBackend {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Default for StdNbioBackend {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl NbioBackend for StdNbioBackend {
    type Reader = StdFileReader;

    fn open(&self, path: &str) -> Option<Self::Reader> {
        let file = File::open(path).ok()?;
        Some(StdFileReader::new(file, self.chunk_size))
    }
}
