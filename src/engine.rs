//! Engine that owns the routing graph, the plugin chain and the event queues.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::builder::ProcessMode;
use crate::core::{
    ConnectionEvent, ConnectionId, EngineEvent, EngineEvents, EngineGraph, GraphConfig,
    PluginSlot, ProcessContext, RackHost, SharedProcessor, Topology,
};
use crate::{Error, Result};

/// Connection notification callback.
pub type EngineCallback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Links engine MIDI pseudo-ports to host MIDI ports, by display name.
pub trait MidiLinkDriver: Send {
    fn connect_input(&mut self, name: &str) -> bool;

    fn disconnect_input(&mut self, name: &str) -> bool;

    fn connect_output(&mut self, name: &str) -> bool;

    fn disconnect_output(&mut self, name: &str) -> bool;
}

/// Main routing engine.
///
/// Control methods take `&self` and may be called while another thread runs
/// [`Engine::process`]. Failures are returned and also recorded as the
/// engine's [`last_error`](Engine::last_error).
///
/// # Example
///
/// ```ignore
/// use rackhost::prelude::*;
///
/// let engine = Engine::builder().inputs(2).outputs(2).build()?;
/// engine.add_plugin(shared(MyGain::new()));
///
/// engine.restore_patchbay_connection("AudioIn:1", "Rack:AudioIn1")?;
/// engine.restore_patchbay_connection("Rack:AudioOut1", "AudioOut:1")?;
///
/// // Audio thread
/// engine.process(&inputs, &mut outputs, frames);
/// ```
pub struct Engine {
    mode: ProcessMode,
    config: Mutex<GraphConfig>,

    graph: EngineGraph,

    /// Published to the audio thread; rebuilt on every edit.
    plugins: ArcSwap<Vec<PluginSlot>>,
    plugins_edit: Mutex<()>,

    events: Mutex<EngineEvents>,

    midi_driver: Mutex<Option<Box<dyn MidiLinkDriver>>>,
    callback: Option<EngineCallback>,
    last_error: Mutex<String>,
}

impl Engine {
    pub fn builder() -> crate::EngineBuilder {
        crate::EngineBuilder::default()
    }

    pub(crate) fn new(
        config: GraphConfig,
        mode: ProcessMode,
        topology: Topology,
        midi_driver: Option<Box<dyn MidiLinkDriver>>,
        callback: Option<EngineCallback>,
    ) -> Result<Self> {
        let mut graph = EngineGraph::new();
        graph.create(topology, &config)?;

        Ok(Self {
            mode,
            config: Mutex::new(config),
            graph,
            plugins: ArcSwap::from_pointee(Vec::new()),
            plugins_edit: Mutex::new(()),
            events: Mutex::new(EngineEvents::new()),
            midi_driver: Mutex::new(midi_driver),
            callback,
            last_error: Mutex::new(String::new()),
        })
    }

    pub fn mode(&self) -> ProcessMode {
        self.mode
    }

    /// Current configuration, including any buffer size or sample rate change.
    pub fn config(&self) -> GraphConfig {
        self.config.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.graph.is_ready()
    }

    pub fn graph(&self) -> &EngineGraph {
        &self.graph
    }

    /// Description of the most recent failure, empty if none yet.
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    fn record<T>(&self, result: rackhost_core::Result<T>) -> Result<T> {
        result.map_err(|err| self.fail(err.into()))
    }

    fn fail(&self, err: Error) -> Error {
        tracing::warn!("{}", err);
        *self.last_error.lock() = err.to_string();
        err
    }

    // ------------------------------------------------------------------
    // Plugin chain

    /// Appends a processor to the end of the chain and returns its index.
    pub fn add_plugin(&self, processor: SharedProcessor) -> usize {
        let _edit = self.plugins_edit.lock();
        let current = self.plugins.load();
        let mut slots = (**current).clone();
        let index = slots.len();
        slots.push(PluginSlot::new(processor));
        self.plugins.store(Arc::new(slots));

        tracing::debug!("Added plugin {}", index);
        index
    }

    /// Removes a processor; later processors shift down by one.
    pub fn remove_plugin(&self, index: usize) -> Result<SharedProcessor> {
        let _edit = self.plugins_edit.lock();
        let current = self.plugins.load();
        if index >= current.len() {
            return Err(self.fail(Error::InvalidSlot(index)));
        }
        let mut slots = (**current).clone();
        let slot = slots.remove(index);
        self.plugins.store(Arc::new(slots));

        tracing::debug!("Removed plugin {}", index);
        Ok(slot.processor().clone())
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.load().len()
    }

    /// `[in_left, in_right, out_left, out_right]` as of the last processed block.
    pub fn plugin_peaks(&self, index: usize) -> Option<[f32; 4]> {
        let slots = self.plugins.load();
        let peaks = slots.get(index)?.peaks();
        let [in_l, in_r] = peaks.ins();
        let [out_l, out_r] = peaks.outs();
        Some([in_l, in_r, out_l, out_r])
    }

    // ------------------------------------------------------------------
    // Events

    /// Queues an event for the next block. Returns `false` when the queue is full.
    pub fn queue_event(&self, event: EngineEvent) -> bool {
        self.events.lock().input.push(event)
    }

    /// Events produced by the last processed block.
    pub fn output_events(&self) -> Vec<EngineEvent> {
        self.events.lock().output.iter().copied().collect()
    }

    // ------------------------------------------------------------------
    // Connections

    pub fn register_midi_port(&self, is_input: bool, port: u32, name: &str) -> Result<()> {
        let rack = self.record(self.graph.rack())?;
        rack.register_midi_port(is_input, port, name);
        Ok(())
    }

    pub fn unregister_midi_port(&self, is_input: bool, port: u32) -> Result<bool> {
        let rack = self.record(self.graph.rack())?;
        Ok(rack.unregister_midi_port(is_input, port))
    }

    pub fn patchbay_connect(
        &self,
        group_a: u32,
        port_a: u32,
        group_b: u32,
        port_b: u32,
    ) -> Result<ConnectionId> {
        let rack = self.record(self.graph.rack())?;
        self.record(rack.connect(self, group_a, port_a, group_b, port_b))
    }

    pub fn patchbay_disconnect(&self, id: ConnectionId) -> Result<()> {
        let rack = self.record(self.graph.rack())?;
        self.record(rack.disconnect(self, id))
    }

    /// `(source, target)` full port names of every connection.
    pub fn patchbay_connections(&self) -> Result<Vec<(String, String)>> {
        let rack = self.record(self.graph.rack())?;
        Ok(rack.connection_names())
    }

    pub fn restore_patchbay_connection(&self, source: &str, target: &str) -> Result<ConnectionId> {
        let rack = self.record(self.graph.rack())?;
        self.record(rack.restore_connection(self, source, target))
    }

    /// Not supported by either topology.
    pub fn patchbay_refresh(&self) -> Result<()> {
        Err(self.fail(rackhost_core::Error::Unsupported.into()))
    }

    pub fn clear_connections(&self) -> Result<()> {
        let rack = self.record(self.graph.rack())?;
        rack.clear_connections();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Configuration

    pub fn set_buffer_size(&self, frames: u32) -> Result<()> {
        self.record(self.graph.set_buffer_size(frames))?;
        self.config.lock().buffer_size = frames;
        Ok(())
    }

    pub fn set_sample_rate(&self, sample_rate: f64) -> Result<()> {
        self.record(self.graph.set_sample_rate(sample_rate))?;
        self.config.lock().sample_rate = sample_rate;
        Ok(())
    }

    pub fn set_offline(&self, offline: bool) -> Result<()> {
        self.record(self.graph.set_offline(offline))
    }

    // ------------------------------------------------------------------
    // Audio thread

    /// Processes one block. Host outputs are overwritten.
    ///
    /// Produces silence while the graph is not ready or while a control call
    /// holds the event queues. Queued input events are consumed.
    pub fn process(&self, input: &[&[f32]], output: &mut [&mut [f32]], frames: usize) {
        for channel in output.iter_mut() {
            let len = frames.min(channel.len());
            channel[..len].fill(0.0);
        }
        if !self.graph.is_ready() {
            return;
        }
        let Some(mut events) = self.events.try_lock() else {
            return;
        };

        let plugins = self.plugins.load();
        let mut ctx = ProcessContext::new(&plugins, &mut events);
        self.graph.process(&mut ctx, input, output, frames);
        events.input.clear();
    }

    /// Runs the plugin chain directly on two channels, bypassing the
    /// connection table. Rack mode only.
    pub fn process_rack(
        &self,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        frames: usize,
    ) -> Result<()> {
        let Some(mut events) = self.events.try_lock() else {
            return Ok(());
        };
        let plugins = self.plugins.load();
        let mut ctx = ProcessContext::new(&plugins, &mut events);
        self.graph
            .process_rack(&mut ctx, input, output, frames)
            .map_err(Error::from)?;
        events.input.clear();
        Ok(())
    }
}

impl RackHost for Engine {
    fn connect_midi_in_port(&self, name: &str) -> bool {
        self.midi_driver
            .lock()
            .as_mut()
            .is_some_and(|driver| driver.connect_input(name))
    }

    fn disconnect_midi_in_port(&self, name: &str) -> bool {
        self.midi_driver
            .lock()
            .as_mut()
            .is_some_and(|driver| driver.disconnect_input(name))
    }

    fn connect_midi_out_port(&self, name: &str) -> bool {
        self.midi_driver
            .lock()
            .as_mut()
            .is_some_and(|driver| driver.connect_output(name))
    }

    fn disconnect_midi_out_port(&self, name: &str) -> bool {
        self.midi_driver
            .lock()
            .as_mut()
            .is_some_and(|driver| driver.disconnect_output(name))
    }

    fn notify(&self, event: ConnectionEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode)
            .field("graph", &self.graph)
            .field("plugins", &self.plugin_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ControlEvent, PortGroup};

    #[derive(Default)]
    struct LoopbackDriver {
        inputs: Vec<String>,
    }

    impl MidiLinkDriver for LoopbackDriver {
        fn connect_input(&mut self, name: &str) -> bool {
            self.inputs.push(name.to_owned());
            true
        }
        fn disconnect_input(&mut self, name: &str) -> bool {
            let before = self.inputs.len();
            self.inputs.retain(|n| n != name);
            self.inputs.len() != before
        }
        fn connect_output(&mut self, _name: &str) -> bool {
            true
        }
        fn disconnect_output(&mut self, _name: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_connect_failure_sets_last_error() {
        let engine = Engine::builder().build().unwrap();
        let engine_group = PortGroup::Engine.raw();

        assert!(engine
            .patchbay_connect(engine_group, 1, engine_group, 3)
            .is_err());
        assert!(engine.last_error().starts_with("Invalid rack connection"));
    }

    #[test]
    fn test_refresh_is_unsupported() {
        let engine = Engine::builder().build().unwrap();
        assert_eq!(
            engine.patchbay_refresh(),
            Err(Error::Core(rackhost_core::Error::Unsupported))
        );
        assert_eq!(engine.last_error(), "Unsupported operation");
    }

    #[test]
    fn test_disconnect_unknown_id_reports_not_found() {
        let engine = Engine::builder().build().unwrap();
        let err = engine.patchbay_disconnect(ConnectionId(42)).unwrap_err();
        assert_eq!(err, Error::Core(rackhost_core::Error::ConnectionNotFound(ConnectionId(42))));
        assert_eq!(engine.last_error(), "Failed to find connection 42");
    }

    #[test]
    fn test_midi_connection_through_driver() {
        let engine = Engine::builder()
            .midi_driver(LoopbackDriver::default())
            .build()
            .unwrap();
        engine.register_midi_port(true, 0, "Keys").unwrap();

        let id = engine
            .restore_patchbay_connection("MidiIn:Keys", "Rack:MidiIn")
            .unwrap();
        assert_eq!(
            engine.patchbay_connections().unwrap(),
            vec![("MidiIn:Keys".to_string(), "Rack:MidiIn".to_string())]
        );
        engine.patchbay_disconnect(id).unwrap();
        assert!(engine.patchbay_connections().unwrap().is_empty());
    }

    #[test]
    fn test_midi_connect_without_driver_fails() {
        let engine = Engine::builder().build().unwrap();
        engine.register_midi_port(false, 0, "Synth").unwrap();
        assert!(engine
            .restore_patchbay_connection("Rack:MidiOut", "MidiOut:Synth")
            .is_err());
    }

    #[test]
    fn test_remove_plugin_out_of_range() {
        let engine = Engine::builder().build().unwrap();
        assert_eq!(engine.remove_plugin(0).err(), Some(Error::InvalidSlot(0)));
        assert_eq!(engine.plugin_peaks(0), None);
    }

    #[test]
    fn test_queued_events_are_consumed() {
        let engine = Engine::builder().buffer_size(16).build().unwrap();
        assert!(engine.queue_event(EngineEvent::control(0, 0, ControlEvent::AllSoundOff)));

        let inp = [0.0f32; 16];
        let mut a = [0.0f32; 16];
        let mut b = [0.0f32; 16];
        {
            let host_in: [&[f32]; 2] = [&inp, &inp];
            let mut host_out: [&mut [f32]; 2] = [&mut a, &mut b];
            engine.process(&host_in, &mut host_out, 16);
        }
        assert!(engine.events.lock().input.is_empty());
    }

    #[test]
    fn test_set_buffer_size_updates_config() {
        let engine = Engine::builder().build().unwrap();
        engine.set_buffer_size(128).unwrap();
        assert_eq!(engine.config().buffer_size, 128);
        assert!(engine.is_ready());
    }
}
