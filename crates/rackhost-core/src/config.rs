//! Routing graph configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on host-side audio ports per direction.
pub const MAX_GRAPH_CHANNELS: u32 = 64;

/// Configuration shared by both topologies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub sample_rate: f64,
    /// Frames per audio block.
    pub buffer_size: u32,
    /// Host audio input ports.
    pub inputs: u32,
    /// Host audio output ports.
    pub outputs: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            buffer_size: 512,
            inputs: 2,
            outputs: 2,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer_size must be non-zero".into()));
        }
        if self.inputs > MAX_GRAPH_CHANNELS || self.outputs > MAX_GRAPH_CHANNELS {
            return Err(Error::InvalidConfig(format!(
                "channel count {}x{} exceeds {}",
                self.inputs, self.outputs, MAX_GRAPH_CHANNELS
            )));
        }
        Ok(())
    }
}
