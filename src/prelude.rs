pub use crate::config::Settings;
pub use crate::error::Result;
pub use crate::message_queue::{MessageQueue, QueuedRequest, Request, RequestError};

pub use proxy_log::{debug, errors, info, trace, warn};

pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;
