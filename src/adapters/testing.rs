//! Deterministic mock adapters, exposed publicly the way `denoland-deno`
//! carries a first-class `test_util` crate: these are generally useful to
//! any downstream consumer wiring up pipeline tests, not just this crate's
//! own suite.

use std::sync::Arc;

use super::http::{HttpBackend, HttpConnection, HttpTransfer};
use super::nbio::{NbioBackend, NbioReader};
use super::png::{PngBackend, PngDecoder, ProcessResult};

/// An in-memory NBIO reader that yields `bytes_per_step`-sized chunks of a
/// fixed byte buffer, or fails immediately if `fail` is set.
pub struct MockNbioReader {
    data: Vec<u8>,
    cursor: usize,
    bytes_per_step: usize,
    fail: bool,
    done: bool,
}

impl NbioReader for MockNbioReader {
    fn begin_read(&mut self) {}

    fn iterate(&mut self) -> bool {
        if self.done {
            return true;
        }
        if self.fail {
            self.done = true;
            return true;
        }
        let end = (self.cursor + self.bytes_per_step).min(self.data.len());
        self.cursor = end;
        if self.cursor >= self.data.len() {
            self.done = true;
            true
        } else {
            false
        }
    }

    fn bytes(&self) -> Option<Arc<[u8]>> {
        if self.done {
            Some(Arc::from(self.data.as_slice()))
        } else {
            None
        }
    }
}

pub struct MockNbioBackend {
    pub bytes_per_step: usize,
    pub fail_open: bool,
    pub file: Vec<u8>,
}

impl NbioBackend for MockNbioBackend {
    type Reader = MockNbioReader;

    fn open(&self, _path: &str) -> Option<Self::Reader> {
        if self.fail_open {
            return None;
        }
        Some(MockNbioReader {
            data: self.file.clone(),
            cursor: 0,
            bytes_per_step: self.bytes_per_step.max(1),
            fail: false,
            done: false,
        })
    }
}

/// A PNG decoder double whose parse and process results are scripted up
/// front, so decode-error scenarios don't depend on
/// feeding a genuinely malformed byte buffer through the real adapter.
pub struct MockPngDecoder {
    iterate_steps: usize,
    process_result: ProcessResult,
    width: u32,
    height: u32,
}

impl PngDecoder for MockPngDecoder {
    fn start(&mut self) -> bool {
        true
    }

    fn iterate(&mut self, _buffer: &[u8], cursor: &mut usize) -> bool {
        *cursor += 1;
        *cursor >= self.iterate_steps
    }

    fn has_ihdr(&self) -> bool {
        true
    }

    fn has_idat(&self) -> bool {
        true
    }

    fn has_iend(&self) -> bool {
        true
    }

    fn process(&mut self, pixels: &mut Vec<u32>, width: &mut u32, height: &mut u32) -> ProcessResult {
        // Scripted result repeats identically on every call, matching
        // `ChunkPngDecoder`'s own idempotence (its `produced` guard only
        // ever reaches the success path, so an error response never flips).
        match self.process_result {
            ProcessResult::Error | ProcessResult::ErrorEnd => self.process_result,
            other => {
                *width = self.width;
                *height = self.height;
                pixels.resize((self.width as usize) * (self.height as usize), 0xff00_0000);
                other
            }
        }
    }
}

pub struct MockPngBackend {
    pub iterate_steps: usize,
    pub process_result: ProcessResult,
    pub width: u32,
    pub height: u32,
}

impl Default for MockPngBackend {
    fn default() -> Self {
        Self { iterate_steps: 1, process_result: ProcessResult::End, width: 2, height: 2 }
    }
}

impl PngBackend for MockPngBackend {
    type Decoder = MockPngDecoder;

    fn new_decoder(&self, _buffer: Arc<[u8]>) -> Self::Decoder {
        MockPngDecoder {
            iterate_steps: self.iterate_steps,
            process_result: self.process_result,
            width: self.width,
            height: self.height,
        }
    }
}

/// A connection/transfer pair that settles after a fixed number of
/// `iterate`/`update` calls and replays a canned body.
pub struct MockHttpConnection {
    steps_remaining: u32,
    /// When set, `iterate` settles (returns `true`) without ever reaching
    /// `is_done`, modeling a connect that fails after the attempt settles.
    settle_as_error: bool,
}

impl HttpConnection for MockHttpConnection {
    fn iterate(&mut self) -> bool {
        if self.settle_as_error {
            return true;
        }
        if self.steps_remaining == 0 {
            return true;
        }
        self.steps_remaining -= 1;
        self.steps_remaining == 0
    }

    fn is_done(&self) -> bool {
        !self.settle_as_error && self.steps_remaining == 0
    }
}

pub struct MockHttpTransfer {
    body: Vec<u8>,
    steps_remaining: u32,
    done: bool,
}

impl HttpTransfer for MockHttpTransfer {
    fn update(&mut self, pos: &mut usize, total: &mut usize) -> bool {
        if !self.done {
            if self.steps_remaining > 0 {
                self.steps_remaining -= 1;
            }
            if self.steps_remaining == 0 {
                self.done = true;
            }
        }
        *pos = if self.done { self.body.len() } else { 0 };
        *total = self.body.len();
        self.done
    }

    fn data(&mut self, accept_incomplete: bool) -> Option<Vec<u8>> {
        if self.done || accept_incomplete {
            Some(self.body.clone())
        } else {
            None
        }
    }
}

pub struct MockHttpBackend {
    pub connection_steps: u32,
    pub transfer_steps: u32,
    pub body: Vec<u8>,
    pub fail_connect: bool,
    /// When set, the produced connection settles without ever completing
    /// (`iterate` returns `true`, `is_done` stays `false`).
    pub connect_settles_as_error: bool,
}

impl Default for MockHttpBackend {
    fn default() -> Self {
        Self {
            connection_steps: 1,
            transfer_steps: 1,
            body: Vec::new(),
            fail_connect: false,
            connect_settles_as_error: false,
        }
    }
}

impl HttpBackend for MockHttpBackend {
    type Connection = MockHttpConnection;
    type Transfer = MockHttpTransfer;

    fn connection_new(&self, _url: &str) -> Option<Self::Connection> {
        if self.fail_connect {
            return None;
        }
        Some(MockHttpConnection {
            steps_remaining: self.connection_steps.max(1),
            settle_as_error: self.connect_settles_as_error,
        })
    }

    fn new_transfer(&self, _connection: Self::Connection) -> Option<Self::Transfer> {
        Some(MockHttpTransfer {
            body: self.body.clone(),
            steps_remaining: self.transfer_steps.max(1),
            done: false,
        })
    }
}

/// A recording [`crate::callbacks::CoreUpdaterSink`] for tests that don't
/// want to touch the filesystem.
#[derive(Default)]
pub struct RecordingCoreUpdaterSink {
    pub listed: std::sync::Mutex<Vec<Vec<String>>>,
    pub downloaded: std::sync::Mutex<Vec<(String, Vec<u8>)>>,
}

impl crate::callbacks::CoreUpdaterSink for RecordingCoreUpdaterSink {
    fn on_list(&self, entries: Vec<String>) {
        self.listed.lock().unwrap().push(entries);
    }

    fn on_download(&self, destination: &str, body: &[u8]) {
        self.downloaded.lock().unwrap().push((destination.to_string(), body.to_vec()));
    }
}

/// A recording [`crate::callbacks::MenuUi`] for tests.
#[derive(Default)]
pub struct RecordingMenuUi {
    pub loaded: std::sync::Mutex<Vec<crate::callbacks::Texture>>,
    pub freed: std::sync::Mutex<u32>,
}

impl crate::callbacks::MenuUi for RecordingMenuUi {
    fn load_background(&self, texture: crate::callbacks::Texture) {
        self.loaded.lock().unwrap().push(texture);
    }

    fn texture_free(&self, _texture: &crate::callbacks::Texture) {
        *self.freed.lock().unwrap() += 1;
    }
}
