//! C3: two-phase PNG-like streaming decoder adapter.
//!
//! The chunk-framing walk (length + type + data + CRC, cursor advanced by
//! `4 + 4 + chunk.size + 4`) is the real, load-bearing part of this
//! adapter and is implemented faithfully. Pixel production in the process
//! phase is a minimal stand-in: the actual PNG codec internals (zlib
//! inflate, scanline filtering) are an explicit non-goal, so `process`
//! only needs to exercise the `ProcessResult` state machine, not decode
//! real image data.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Next,
    End,
    Error,
    ErrorEnd,
}

pub trait PngDecoder: Send {
    /// `load_image_argb_start`.
    fn start(&mut self) -> bool;

    /// One `load_image_argb_iterate` step over the shared buffer, advancing
    /// `cursor` by the chunk's on-wire length. Returns `true` when parsing
    /// should stop (finished or fused error, per the adapter's own
    /// bookkeeping).
    fn iterate(&mut self, buffer: &[u8], cursor: &mut usize) -> bool;

    fn has_ihdr(&self) -> bool;
    fn has_idat(&self) -> bool;
    fn has_iend(&self) -> bool;

    /// `load_image_argb_process`.
    fn process(&mut self, pixels: &mut Vec<u32>, width: &mut u32, height: &mut u32) -> ProcessResult;
}

pub trait PngBackend: Send + Sync {
    type Decoder: PngDecoder;

    fn new_decoder(&self, buffer: Arc<[u8]>) -> Self::Decoder;
}

const PNG_SIGNATURE_LEN: usize = 8;
const CHUNK_HEADER_LEN: usize = 8; // length(4) + type(4)
const CHUNK_CRC_LEN: usize = 4;

pub struct ChunkPngDecoder {
    buffer: Arc<[u8]>,
    has_ihdr: bool,
    has_idat: bool,
    has_iend: bool,
    width: u32,
    height: u32,
    produced: bool,
}

impl ChunkPngDecoder {
    pub fn new(buffer: Arc<[u8]>) -> Self {
        Self {
            buffer,
            has_ihdr: false,
            has_idat: false,
            has_iend: false,
            width: 0,
            height: 0,
            produced: false,
        }
    }
}

impl PngDecoder for ChunkPngDecoder {
    fn start(&mut self) -> bool {
        true
    }

    fn iterate(&mut self, buffer: &[u8], cursor: &mut usize) -> bool {
        if *cursor == 0 && buffer.len() >= PNG_SIGNATURE_LEN {
            *cursor = PNG_SIGNATURE_LEN;
        }
        if *cursor + CHUNK_HEADER_LEN > buffer.len() {
            // Truncated stream: fused with "finished" per the adapter's own
            // success/error fusion.
            return true;
        }
        let len = u32::from_be_bytes(buffer[*cursor..*cursor + 4].try_into().unwrap()) as usize;
        let kind = &buffer[*cursor + 4..*cursor + 8];

        match kind {
            b"IHDR" => {
                self.has_ihdr = true;
                let data_start = *cursor + CHUNK_HEADER_LEN;
                if len >= 8 && data_start + 8 <= buffer.len() {
                    self.width = u32::from_be_bytes(buffer[data_start..data_start + 4].try_into().unwrap());
                    self.height = u32::from_be_bytes(buffer[data_start + 4..data_start + 8].try_into().unwrap());
                }
            }
            b"IDAT" => self.has_idat = true,
            b"IEND" => self.has_iend = true,
            _ => {}
        }

        *cursor += CHUNK_HEADER_LEN + len + CHUNK_CRC_LEN;
        self.has_ihdr && self.has_idat && self.has_iend
    }

    fn has_ihdr(&self) -> bool {
        self.has_ihdr
    }

    fn has_idat(&self) -> bool {
        self.has_idat
    }

    fn has_iend(&self) -> bool {
        self.has_iend
    }

    fn process(&mut self, pixels: &mut Vec<u32>, width: &mut u32, height: &mut u32) -> ProcessResult {
        if !(self.has_ihdr && self.has_idat && self.has_iend) {
            return ProcessResult::ErrorEnd;
        }
        if self.produced {
            return ProcessResult::End;
        }
        if self.width == 0 || self.height == 0 {
            return ProcessResult::Error;
        }
        *width = self.width;
        *height = self.height;
        pixels.clear();
        pixels.resize((self.width as usize) * (self.height as usize), 0xff00_0000);
        self.produced = true;
        ProcessResult::End
    }
}

pub struct ChunkPngBackend;

impl PngBackend for ChunkPngBackend {
    type Decoder = ChunkPngDecoder;

    fn new_decoder(&self, buffer: Arc<[u8]>) -> Self::Decoder {
        ChunkPngDecoder::new(buffer)
    }
}
