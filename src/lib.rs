pub mod adapters;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod lexer;
pub mod message_queue;
pub mod pipelines;
pub mod prelude;
pub mod runloop;

pub use config::Settings;
pub use error::{CleanError, Result};
pub use runloop::{DataRunloop, RequestType};
