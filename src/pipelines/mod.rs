pub mod http;
pub mod nbio;

pub use http::HttpPipeline;
pub use nbio::{ImagePhase, NbioPhase, NbioPipeline};
