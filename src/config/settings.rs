use derive_yaml::FromYaml;
use std::path::Path;

use crate::config::FromYaml;
use crate::error::Result;

pub const DEFAULT_THREADED_DATA_RUNLOOP_ENABLE: bool = false;
pub const DEFAULT_NBIO_POS_INCREMENT: u32 = 5;
pub const DEFAULT_IMAGE_POS_INCREMENT: u32 = 0; // 0 means "derive from read length / 2"
pub const DEFAULT_IMAGE_PROCESSING_POS_INCREMENT: u32 = 0; // 0 means "derive from read length / 4"
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Runtime tuning knobs for a [`crate::runloop::DataRunloop`].
///
/// `threaded_data_runloop_enable` is the only knob the distilled
/// specification names; the rest are the bounded step counts it otherwise
/// fixes as constants, exposed here because the same config stack can carry
/// them for free.
#[derive(Debug, Clone, FromYaml)]
pub struct Settings {
    pub threaded_data_runloop_enable: bool,
    pub nbio_pos_increment: u32,
    pub image_pos_increment: u32,
    pub image_processing_pos_increment: u32,
    pub queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threaded_data_runloop_enable: DEFAULT_THREADED_DATA_RUNLOOP_ENABLE,
            nbio_pos_increment: DEFAULT_NBIO_POS_INCREMENT,
            image_pos_increment: DEFAULT_IMAGE_POS_INCREMENT,
            image_processing_pos_increment: DEFAULT_IMAGE_PROCESSING_POS_INCREMENT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(input: &str) -> crate::config::ParseResult<Self> {
        Self::from_str(input)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw).map_err(|e| e.to_string().into())
    }

    /// `pos_increment` for a single NBIO read chunk, falling back to the
    /// hardcoded default when not overridden (0 is not a valid step count).
    pub fn nbio_pos_increment(&self) -> u32 {
        if self.nbio_pos_increment == 0 {
            DEFAULT_NBIO_POS_INCREMENT
        } else {
            self.nbio_pos_increment
        }
    }

    /// `Some(n)` overrides the image pipeline's derived-from-buffer-length
    /// `pos_increment`; `None` (the `0` default) preserves the default
    /// `len / 2` derivation.
    pub fn image_pos_increment_override(&self) -> Option<u32> {
        (self.image_pos_increment != 0).then_some(self.image_pos_increment)
    }

    /// Same as [`Self::image_pos_increment_override`] for the processing
    /// phase's `len / 4` derivation.
    pub fn image_processing_pos_increment_override(&self) -> Option<u32> {
        (self.image_processing_pos_increment != 0).then_some(self.image_processing_pos_increment)
    }
}
