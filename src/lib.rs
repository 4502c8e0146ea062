//! # rackhost - Plugin Host Routing Engine
//!
//! Audio/MIDI routing for a plugin host, built around `rackhost-core`.
//!
//! ## Architecture
//!
//! rackhost is an umbrella crate that coordinates:
//! - **rackhost-core** - Routing graphs (rack, patchbay adapter), plugin chain, event queues
//! - **Engine** - Plugin list, MIDI link driver, connection notifications, last-error reporting
//!
//! ## Quick Start
//!
//! ```ignore
//! use rackhost::prelude::*;
//!
//! let engine = Engine::builder()
//!     .sample_rate(48000.0)
//!     .buffer_size(256)
//!     .build()?;
//!
//! engine.add_plugin(shared(MyGain::new()));
//! engine.restore_patchbay_connection("AudioIn:1", "Rack:AudioIn1")?;
//! engine.restore_patchbay_connection("Rack:AudioOut1", "AudioOut:1")?;
//!
//! // From the audio callback
//! engine.process(&inputs, &mut outputs, frames);
//! ```

/// Re-export of rackhost-core for direct access
pub use rackhost_core as core;

// Core types
pub use rackhost_core::{
    // Events
    ControlEvent,
    EngineEvent,
    EngineEvents,
    EventKind,
    MidiData,

    // Graphs
    EngineGraph,
    GraphConfig,
    NodeGraphBackend,
    PatchbayGraph,
    RackGraph,
    Topology,

    // Addressing
    ConnectionEvent,
    ConnectionId,
    PortAddress,
    PortGroup,
    RackPort,

    // Processors
    shared,
    PluginSlot,
    RackProcessor,
    SharedProcessor,
};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::{EngineBuilder, ProcessMode};
pub use engine::{Engine, EngineCallback, MidiLinkDriver};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{Engine, EngineBuilder, MidiLinkDriver, ProcessMode};

    // Essential types
    pub use crate::core::{
        shared, ConnectionEvent, ConnectionId, ControlEvent, EngineEvent, EngineEvents,
        GraphConfig, PortGroup, RackPort, RackProcessor,
    };
}
