//! Outbound collaborator contracts and their production
//! implementations. Each pipeline (C5-C7) is generic over one of these
//! traits so the same state machine drives both a real adapter and a
//! deterministic test double (`adapters::testing`).

pub mod http;
pub mod nbio;
pub mod png;
pub mod testing;

pub use http::{HttpBackend, HttpConnection, HttpTransfer, MioHttpBackend};
pub use nbio::{NbioBackend, NbioReader, StdFileReader, StdNbioBackend};
pub use png::{ChunkPngBackend, ChunkPngDecoder, PngBackend, PngDecoder, ProcessResult};
