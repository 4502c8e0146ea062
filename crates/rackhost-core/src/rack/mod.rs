//! Fixed-topology ("rack") routing graph.
//!
//! Two audio inputs, two audio outputs, one MIDI input and one MIDI output on
//! the engine side, each linkable to any number of host ports, feeding a single
//! linear plugin chain.
//!
//! # Locking
//!
//! ```text
//! Control thread                        Audio thread
//!   connect / disconnect / clear          process_helper
//!        │                                     │
//!        └──────► ReentrantMutex<RackAudio> ◄──┘
//!                   ├─ RefCell<PortLists>      (in1, in2, out1, out2)
//!                   └─ RefCell<StagingBuffers> (in, in scratch, out)
//!
//!   Mutex<ConnectionList>, RwLock<MidiPortNames>: control thread only
//! ```
//!
//! The audio thread takes the staging lock for the whole block, so port list
//! edits never land mid-block. Plugins are locked per block with `try_lock`.

mod chain;
mod connections;
pub mod ports;
mod staging;

pub use connections::{Connection, ConnectionId, ConnectionList, MidiPortNames};
pub use ports::{address_to_name, name_to_address, PortAddress, PortGroup, RackPort};

use parking_lot::{Mutex, ReentrantMutex, RwLock, RwLockReadGuard};

use crate::host::{ConnectionEvent, RackHost};
use crate::lockfree::AtomicFlag;
use crate::processor::ProcessContext;
use crate::{Error, Result};
use staging::{RackAudio, StagingBuffers};

pub struct RackGraph {
    inputs: u32,
    outputs: u32,
    offline: AtomicFlag,
    audio: ReentrantMutex<RackAudio>,
    connections: Mutex<ConnectionList>,
    midi: RwLock<MidiPortNames>,
}

impl RackGraph {
    /// `inputs`/`outputs` are the host's audio port counts.
    pub fn new(buffer_size: u32, inputs: u32, outputs: u32) -> Result<Self> {
        let graph = Self {
            inputs,
            outputs,
            offline: AtomicFlag::new(false),
            audio: ReentrantMutex::new(RackAudio::default()),
            connections: Mutex::new(ConnectionList::new()),
            midi: RwLock::new(MidiPortNames::new()),
        };
        graph.set_buffer_size(buffer_size)?;
        Ok(graph)
    }

    pub fn inputs(&self) -> u32 {
        self.inputs
    }

    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    /// Reallocates the staging buffers. Connections are untouched.
    ///
    /// The old buffers are released first; if allocation fails the graph is
    /// left without buffers and processing is a no-op until a later resize
    /// succeeds.
    pub fn set_buffer_size(&self, buffer_size: u32) -> Result<()> {
        let audio = self.audio.lock();
        let mut buffers = audio
            .buffers
            .try_borrow_mut()
            .map_err(|_| Error::BuffersBusy)?;

        *buffers = StagingBuffers::default();
        let with_io = self.inputs > 0 || self.outputs > 0;
        match StagingBuffers::allocate(buffer_size as usize, with_io) {
            Ok(allocated) => {
                *buffers = allocated;
                tracing::debug!("Rack staging buffers resized to {} frames", buffer_size);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Rack staging buffer allocation failed: {}", err);
                Err(err)
            }
        }
    }

    /// Frames per staging buffer, 0 when unallocated.
    pub fn buffer_size(&self) -> usize {
        let audio = self.audio.lock();
        let frames = audio.buffers.try_borrow().map(|b| b.frames()).unwrap_or(0);
        frames
    }

    /// Whether the staging buffers are allocated.
    pub fn is_ready(&self) -> bool {
        self.buffer_size() > 0
    }

    /// Offline rendering waits for busy plugins instead of skipping them.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.get()
    }

    // ------------------------------------------------------------------
    // MIDI port names

    pub fn register_midi_port(&self, is_input: bool, port: u32, name: &str) {
        self.midi.write().insert(is_input, port, name);
    }

    pub fn unregister_midi_port(&self, is_input: bool, port: u32) -> bool {
        self.midi.write().remove(is_input, port)
    }

    pub fn midi_ports(&self) -> RwLockReadGuard<'_, MidiPortNames> {
        self.midi.read()
    }

    pub fn name_to_address(&self, name: &str) -> Option<PortAddress> {
        name_to_address(name, &self.midi.read())
    }

    pub fn port_name(&self, address: PortAddress) -> Option<String> {
        address.full_name(&self.midi.read())
    }

    // ------------------------------------------------------------------
    // Connections

    /// Links an engine pseudo-port to a host port, given raw group/port ids.
    ///
    /// Exactly one side must be in the engine group and the other side must be
    /// the external group matching that pseudo-port. Nothing changes on failure.
    pub fn connect(
        &self,
        host: &dyn RackHost,
        group_a: u32,
        port_a: u32,
        group_b: u32,
        port_b: u32,
    ) -> Result<ConnectionId> {
        let engine = PortGroup::Engine.raw();
        let engine_first = match (group_a == engine, group_b == engine) {
            (true, true) => return Err(invalid("both sides are engine ports")),
            (false, false) => return Err(invalid("neither side is an engine port")),
            (first, _) => first,
        };
        let (rack_raw, other_group, other_port) = if engine_first {
            (port_a, group_b, port_b)
        } else {
            (port_b, group_a, port_a)
        };

        let rack_port = RackPort::from_raw(rack_raw)
            .ok_or_else(|| invalid(format!("engine port {rack_raw} out of range")))?;
        let other_group = PortGroup::from_raw(other_group)
            .filter(|g| g.is_external())
            .ok_or_else(|| invalid(format!("group {other_group} out of range")))?;

        let rack = PortAddress::engine(rack_port);
        let other = PortAddress::new(other_group, other_port);
        if engine_first {
            self.connect_addresses(host, rack, other)
        } else {
            self.connect_addresses(host, other, rack)
        }
    }

    /// Typed form of [`RackGraph::connect`]; `a`/`b` orientation is preserved.
    pub fn connect_addresses(
        &self,
        host: &dyn RackHost,
        a: PortAddress,
        b: PortAddress,
    ) -> Result<ConnectionId> {
        let (rack_port, other) = connections::resolve_endpoints(a, b)
            .ok_or_else(|| invalid("exactly one side must be an engine port"))?;

        if other.group != rack_port.peer_group() {
            tracing::warn!(
                "Rejected rack connection {:?} <-> {:?}: group mismatch",
                rack_port,
                other.group
            );
            return Err(invalid(format!(
                "{} cannot be linked to group {:?}",
                rack_port.full_name(),
                other.group
            )));
        }

        if !self.link(host, rack_port, other.port) {
            return Err(invalid(format!(
                "could not link {} to {:?} port {}",
                rack_port.full_name(),
                other.group,
                other.port
            )));
        }

        let connection = self.connections.lock().push(a, b);
        tracing::debug!(
            "Rack connection {} added: {}",
            connection.id,
            connection.correlation()
        );
        host.notify(ConnectionEvent::Added {
            id: connection.id,
            correlation: connection.correlation(),
        });
        Ok(connection.id)
    }

    /// Removes a connection after tearing down its underlying link.
    pub fn disconnect(&self, host: &dyn RackHost, id: ConnectionId) -> Result<()> {
        let connection = {
            let connections = self.connections.lock();
            connections
                .get(id)
                .copied()
                .ok_or(Error::ConnectionNotFound(id))?
        };

        let (rack_port, other) = connection
            .resolve()
            .ok_or_else(|| invalid(format!("connection {id} has no engine port")))?;

        if !self.unlink(host, rack_port, other.port) {
            tracing::warn!("Rack connection {} could not be unlinked", id);
            return Err(Error::UnlinkFailed(id));
        }

        self.connections.lock().remove(id);
        tracing::debug!("Rack connection {} removed", id);
        host.notify(ConnectionEvent::Removed { id });
        Ok(())
    }

    /// Connects two full port names, as stored by a saved session.
    pub fn restore_connection(
        &self,
        host: &dyn RackHost,
        source: &str,
        target: &str,
    ) -> Result<ConnectionId> {
        let (a, b) = {
            let midi = self.midi.read();
            let a = name_to_address(source, &midi)
                .ok_or_else(|| Error::InvalidPortName(source.to_owned()))?;
            let b = name_to_address(target, &midi)
                .ok_or_else(|| Error::InvalidPortName(target.to_owned()))?;
            (a, b)
        };
        self.connect_addresses(host, a, b)
    }

    /// Drops every connection, every audio port registration and both MIDI
    /// name tables. No notifications are sent.
    pub fn clear_connections(&self) {
        self.connections.lock().clear();
        {
            let audio = self.audio.lock();
            audio.ports.borrow_mut().clear();
        }
        self.midi.write().clear();
        tracing::debug!("Rack connections cleared");
    }

    /// `(source, target)` labels for each connection. Inputs to the engine are
    /// listed as the source, outputs as the target.
    pub fn connection_names(&self) -> Vec<(String, String)> {
        let connections = self.connections.lock();
        let midi = self.midi.read();

        connections
            .iter()
            .filter_map(|connection| {
                let (rack_port, other) = connection.resolve()?;
                let engine_name = rack_port.full_name().to_owned();
                let other_name = other.full_name(&midi)?;
                Some(if rack_port.is_input() {
                    (other_name, engine_name)
                } else {
                    (engine_name, other_name)
                })
            })
            .collect()
    }

    /// Snapshot of the connection table.
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.lock().iter().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn link(&self, host: &dyn RackHost, rack_port: RackPort, other_port: u32) -> bool {
        match rack_port {
            RackPort::MidiIn => self
                .midi_name(true, other_port)
                .is_some_and(|name| host.connect_midi_in_port(&name)),
            RackPort::MidiOut => self
                .midi_name(false, other_port)
                .is_some_and(|name| host.connect_midi_out_port(&name)),
            audio_port => {
                let audio = self.audio.lock();
                let linked = audio.ports.borrow_mut().append(audio_port, other_port);
                linked
            }
        }
    }

    fn unlink(&self, host: &dyn RackHost, rack_port: RackPort, other_port: u32) -> bool {
        match rack_port {
            RackPort::MidiIn => self
                .midi_name(true, other_port)
                .is_some_and(|name| host.disconnect_midi_in_port(&name)),
            RackPort::MidiOut => self
                .midi_name(false, other_port)
                .is_some_and(|name| host.disconnect_midi_out_port(&name)),
            audio_port => {
                let audio = self.audio.lock();
                let unlinked = audio.ports.borrow_mut().remove_one(audio_port, other_port);
                unlinked
            }
        }
    }

    /// Owned so the name table is not locked while the host is called.
    fn midi_name(&self, is_input: bool, port: u32) -> Option<String> {
        self.midi.read().name(is_input, port).map(str::to_owned)
    }

    // ------------------------------------------------------------------
    // Audio thread

    /// Runs the plugin chain on two channels, bypassing host port fan-in/out.
    pub fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        frames: usize,
    ) {
        let audio = self.audio.lock();
        let Ok(mut buffers) = audio.buffers.try_borrow_mut() else {
            return;
        };
        if frames > buffers.frames()
            || input.iter().any(|ch| ch.len() < frames)
            || output.iter().any(|ch| ch.len() < frames)
        {
            return;
        }
        chain::run(
            ctx,
            &mut buffers.in_buf_tmp,
            input,
            output,
            frames,
            self.offline.get(),
        );
    }

    /// Mixes connected host inputs into the staging inputs, runs the chain,
    /// and adds the staging outputs into every connected host output.
    ///
    /// Host output buffers are accumulated into, never cleared. The staging
    /// lock is held for the whole block.
    pub fn process_helper(
        &self,
        ctx: &mut ProcessContext<'_>,
        input: &[&[f32]],
        output: &mut [&mut [f32]],
        frames: usize,
    ) {
        let audio = self.audio.lock();
        let Ok(mut buffers) = audio.buffers.try_borrow_mut() else {
            return;
        };
        if !buffers.has_io() || frames > buffers.frames() {
            return;
        }
        let StagingBuffers {
            in_buf,
            in_buf_tmp,
            out_buf,
        } = &mut *buffers;

        {
            let ports = audio.ports.borrow();
            if !input.is_empty() && self.inputs > 0 {
                staging::mix_inputs(&ports, input, self.inputs, in_buf, frames);
            } else {
                in_buf[0][..frames].fill(0.0);
                in_buf[1][..frames].fill(0.0);
            }
        }

        let [in0, in1] = &*in_buf;
        let [out0, out1] = &mut *out_buf;
        chain::run(
            ctx,
            in_buf_tmp,
            [&in0[..frames], &in1[..frames]],
            [&mut out0[..frames], &mut out1[..frames]],
            frames,
            self.offline.get(),
        );

        let ports = audio.ports.borrow();
        staging::mix_outputs(&ports, out_buf, output, self.outputs, frames);
    }
}

impl std::fmt::Debug for RackGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RackGraph")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("offline", &self.offline.get())
            .field("connections", &self.connection_count())
            .finish()
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConnection(reason.into())
}
