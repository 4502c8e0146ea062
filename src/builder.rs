//! Builder for configuring and constructing an [`Engine`].

use std::sync::Arc;

use crate::core::{ConnectionEvent, GraphConfig, NodeGraphBackend, Topology};
use crate::engine::{EngineCallback, MidiLinkDriver};
use crate::{Engine, Error, Result};

/// Routing mode, fixed for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    /// Two-in/two-out plugin chain with a dynamic connection table.
    #[default]
    Rack,
    /// Arbitrary wiring owned by an external node graph.
    Patchbay,
}

/// MIDI links need a driver; without one every MIDI connect fails. Patchbay
/// mode needs a node graph backend.
///
/// # Example
///
/// ```ignore
/// use rackhost::prelude::*;
///
/// let engine = Engine::builder()
///     .sample_rate(48000.0)
///     .buffer_size(256)
///     .inputs(4)
///     .outputs(4)
///     .on_connection(|event| println!("{event:?}"))
///     .build()?;
/// ```
pub struct EngineBuilder {
    config: GraphConfig,
    mode: ProcessMode,
    midi_driver: Option<Box<dyn MidiLinkDriver>>,
    backend: Option<Box<dyn NodeGraphBackend>>,
    callback: Option<EngineCallback>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: GraphConfig::default(),
            mode: ProcessMode::Rack,
            midi_driver: None,
            backend: None,
            callback: None,
        }
    }
}

impl EngineBuilder {
    /// Default: 44100.0
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn buffer_size(mut self, frames: u32) -> Self {
        self.config.buffer_size = frames;
        self
    }

    /// Default: 2
    pub fn inputs(mut self, count: u32) -> Self {
        self.config.inputs = count;
        self
    }

    /// Default: 2
    pub fn outputs(mut self, count: u32) -> Self {
        self.config.outputs = count;
        self
    }

    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: ProcessMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn midi_driver(mut self, driver: impl MidiLinkDriver + 'static) -> Self {
        self.midi_driver = Some(Box::new(driver));
        self
    }

    /// Also switches the mode to [`ProcessMode::Patchbay`].
    pub fn patchbay(mut self, backend: impl NodeGraphBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self.mode = ProcessMode::Patchbay;
        self
    }

    /// Called on the control thread after each connection change.
    pub fn on_connection<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<Engine> {
        let topology = match self.mode {
            ProcessMode::Rack => Topology::Rack,
            ProcessMode::Patchbay => Topology::Patchbay(self.backend.ok_or(Error::MissingBackend)?),
        };
        Engine::new(
            self.config,
            self.mode,
            topology,
            self.midi_driver,
            self.callback,
        )
    }
}
