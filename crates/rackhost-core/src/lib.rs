//! Real-time audio/MIDI routing core for a plugin host.
//!
//! # Primary API
//!
//! - [`EngineGraph`] / [`Topology`]: topology dispatcher (create, configure, process)
//! - [`RackGraph`]: fixed-topology routing with a dynamic connection table
//! - [`PatchbayGraph`] / [`NodeGraphBackend`]: adapter for an external node graph
//! - [`RackProcessor`] / [`PluginSlot`]: hosted processors and their chain metadata
//! - [`RackHost`]: services the rack graph consumes from the surrounding engine
//!
//! # Example
//!
//! ```ignore
//! use rackhost_core::prelude::*;
//!
//! let mut graph = EngineGraph::new();
//! graph.create(Topology::Rack, &GraphConfig::default())?;
//!
//! let rack = graph.rack()?;
//! rack.connect(&host, PortGroup::AudioIn.raw(), 0, PortGroup::Engine.raw(), 1)?;
//! rack.connect(&host, PortGroup::Engine.raw(), 3, PortGroup::AudioOut.raw(), 0)?;
//!
//! // Audio thread
//! if graph.is_ready() {
//!     graph.process(&mut ProcessContext::new(&plugins, &mut events), &inputs, &mut outputs, frames);
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{GraphConfig, MAX_GRAPH_CHANNELS};

pub mod events;
pub use events::{
    ControlEvent, EngineEvent, EngineEvents, EventBuffer, EventKind, MidiData, MAX_ENGINE_EVENTS,
};

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

mod processor;
pub use processor::{shared, PeakLevels, PluginSlot, ProcessContext, RackProcessor, SharedProcessor};

mod host;
pub use host::{ConnectionEvent, RackHost};

pub mod rack;
pub use rack::{
    address_to_name, name_to_address, Connection, ConnectionId, MidiPortNames, PortAddress,
    PortGroup, RackGraph, RackPort,
};

pub mod patchbay;
pub use patchbay::{MidiBuffer, NodeGraphBackend, PatchbayGraph};

mod graph;
pub use graph::{EngineGraph, Topology};

pub mod prelude {
    pub use crate::{
        ConnectionEvent, ConnectionId, ControlEvent, EngineEvent, EngineEvents, EngineGraph,
        GraphConfig, PluginSlot, PortAddress, PortGroup, ProcessContext, RackGraph, RackHost,
        RackPort, RackProcessor, Topology,
    };
}
