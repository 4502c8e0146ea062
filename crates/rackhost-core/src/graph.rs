//! Topology dispatcher.
//!
//! [`EngineGraph`] owns exactly one routing engine, chosen at [`create`] and
//! fixed until [`destroy`]. Reconfiguration drops the ready flag for its
//! duration and leaves it down if it fails; audio callers must treat a graph
//! that is not ready as silent.
//!
//! [`create`]: EngineGraph::create
//! [`destroy`]: EngineGraph::destroy

use std::sync::Arc;

use parking_lot::Mutex;

use crate::lockfree::AtomicFlag;
use crate::patchbay::{NodeGraphBackend, PatchbayGraph};
use crate::processor::ProcessContext;
use crate::rack::RackGraph;
use crate::{Error, GraphConfig, Result};

/// Topology selected at creation.
pub enum Topology {
    Rack,
    Patchbay(Box<dyn NodeGraphBackend>),
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rack => f.write_str("Rack"),
            Self::Patchbay(_) => f.write_str("Patchbay"),
        }
    }
}

enum GraphState {
    Idle,
    Rack(Arc<RackGraph>),
    Patchbay(Mutex<PatchbayGraph>),
}

pub struct EngineGraph {
    ready: AtomicFlag,
    state: GraphState,
}

/// Clears the ready flag for the span of a reconfiguration.
struct NotReady<'a>(&'a AtomicFlag);

impl<'a> NotReady<'a> {
    fn enter(flag: &'a AtomicFlag) -> Self {
        flag.set(false);
        Self(flag)
    }

    /// The graph is ready again only if the reconfiguration succeeded.
    fn leave<T>(self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.0.set(true);
        }
        result
    }
}

impl EngineGraph {
    pub fn new() -> Self {
        Self {
            ready: AtomicFlag::new(false),
            state: GraphState::Idle,
        }
    }

    /// Builds the selected engine and marks the graph ready.
    pub fn create(&mut self, topology: Topology, config: &GraphConfig) -> Result<()> {
        if !matches!(self.state, GraphState::Idle) {
            return Err(Error::AlreadyCreated);
        }
        config.validate()?;

        self.state = match topology {
            Topology::Rack => GraphState::Rack(Arc::new(RackGraph::new(
                config.buffer_size,
                config.inputs,
                config.outputs,
            )?)),
            Topology::Patchbay(backend) => {
                GraphState::Patchbay(Mutex::new(PatchbayGraph::new(config, backend)?))
            }
        };
        self.ready.set(true);

        tracing::debug!(
            "Engine graph created ({}): {} Hz, {} frames, {}x{}",
            if self.is_rack() { "rack" } else { "patchbay" },
            config.sample_rate,
            config.buffer_size,
            config.inputs,
            config.outputs
        );
        Ok(())
    }

    /// Releases the engine. Calling it on a graph that was never created is a no-op.
    pub fn destroy(&mut self) {
        if !self.is_created() {
            return;
        }
        self.ready.set(false);
        self.state = GraphState::Idle;
        tracing::debug!("Engine graph destroyed");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn is_created(&self) -> bool {
        !matches!(self.state, GraphState::Idle)
    }

    pub fn is_rack(&self) -> bool {
        matches!(self.state, GraphState::Rack(_))
    }

    pub fn set_buffer_size(&self, buffer_size: u32) -> Result<()> {
        self.ensure_created()?;
        let not_ready = NotReady::enter(&self.ready);

        let result = match &self.state {
            GraphState::Rack(rack) => rack.set_buffer_size(buffer_size),
            GraphState::Patchbay(patchbay) => patchbay.lock().set_buffer_size(buffer_size),
            GraphState::Idle => Err(Error::NotCreated),
        };
        not_ready.leave(result)
    }

    /// The rack has no sample-rate dependent state.
    pub fn set_sample_rate(&self, sample_rate: f64) -> Result<()> {
        self.ensure_created()?;
        let not_ready = NotReady::enter(&self.ready);

        if let GraphState::Patchbay(patchbay) = &self.state {
            patchbay.lock().set_sample_rate(sample_rate);
        }
        not_ready.leave(Ok(()))
    }

    pub fn set_offline(&self, offline: bool) -> Result<()> {
        self.ensure_created()?;
        let not_ready = NotReady::enter(&self.ready);

        match &self.state {
            GraphState::Rack(rack) => rack.set_offline(offline),
            GraphState::Patchbay(patchbay) => patchbay.lock().set_offline(offline),
            GraphState::Idle => {}
        }
        not_ready.leave(Ok(()))
    }

    pub fn rack(&self) -> Result<&Arc<RackGraph>> {
        match &self.state {
            GraphState::Rack(rack) => Ok(rack),
            GraphState::Patchbay(_) => Err(Error::WrongTopology { expected: "rack" }),
            GraphState::Idle => Err(Error::NotCreated),
        }
    }

    pub fn patchbay(&self) -> Result<&Mutex<PatchbayGraph>> {
        match &self.state {
            GraphState::Patchbay(patchbay) => Ok(patchbay),
            GraphState::Rack(_) => Err(Error::WrongTopology {
                expected: "patchbay",
            }),
            GraphState::Idle => Err(Error::NotCreated),
        }
    }

    /// Runs one block on whichever engine is active. Does not consult the
    /// ready flag; that is the caller's job.
    pub fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        input: &[&[f32]],
        output: &mut [&mut [f32]],
        frames: usize,
    ) {
        match &self.state {
            GraphState::Rack(rack) => rack.process_helper(ctx, input, output, frames),
            GraphState::Patchbay(patchbay) => {
                if let Some(mut patchbay) = patchbay.try_lock() {
                    patchbay.process(ctx.events, input, output, frames);
                }
            }
            GraphState::Idle => {}
        }
    }

    /// Runs the plugin chain directly on two channels. Rack topology only.
    pub fn process_rack(
        &self,
        ctx: &mut ProcessContext<'_>,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        frames: usize,
    ) -> Result<()> {
        let rack = self.rack()?;
        rack.process(ctx, input, output, frames);
        Ok(())
    }

    fn ensure_created(&self) -> Result<()> {
        if self.is_created() {
            Ok(())
        } else {
            Err(Error::NotCreated)
        }
    }
}

impl Default for EngineGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EngineGraph {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for EngineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topology = match &self.state {
            GraphState::Idle => "idle",
            GraphState::Rack(_) => "rack",
            GraphState::Patchbay(_) => "patchbay",
        };
        f.debug_struct("EngineGraph")
            .field("ready", &self.ready.get())
            .field("topology", &topology)
            .finish()
    }
}
