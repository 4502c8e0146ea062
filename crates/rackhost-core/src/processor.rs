//! Hosted processor contract and per-slot chain metadata.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::events::EngineEvents;
use crate::lockfree::AtomicFloat;

/// A hosted processing unit as seen by the plugin chain.
///
/// Exclusive access is provided by the [`Mutex`] wrapping each processor in a
/// [`PluginSlot`]; a processor that is being reconfigured simply holds its own
/// lock and is skipped by the realtime chain until it releases it.
pub trait RackProcessor: Send {
    fn is_enabled(&self) -> bool;

    fn audio_in_count(&self) -> u32;

    fn audio_out_count(&self) -> u32;

    fn midi_out_count(&self) -> u32;

    /// Called once per block before [`RackProcessor::process`].
    fn init_buffers(&mut self) {}

    /// Reads `events.input`, writes `events.output`.
    fn process(
        &mut self,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        events: &mut EngineEvents,
        frames: usize,
    );
}

/// Shared handle to a hosted processor.
pub type SharedProcessor = Arc<Mutex<dyn RackProcessor>>;

/// Wraps a processor for use in a [`PluginSlot`].
pub fn shared<P: RackProcessor + 'static>(processor: P) -> SharedProcessor {
    Arc::new(Mutex::new(processor))
}

/// Peak levels of one slot, written by the audio thread every block.
#[derive(Debug, Default)]
pub struct PeakLevels {
    ins: [AtomicFloat; 2],
    outs: [AtomicFloat; 2],
}

impl PeakLevels {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn ins(&self) -> [f32; 2] {
        [self.ins[0].get(), self.ins[1].get()]
    }

    #[inline]
    pub fn outs(&self) -> [f32; 2] {
        [self.outs[0].get(), self.outs[1].get()]
    }

    #[inline]
    pub(crate) fn set_ins(&self, left: f32, right: f32) {
        self.ins[0].set(left);
        self.ins[1].set(right);
    }

    #[inline]
    pub(crate) fn set_outs(&self, left: f32, right: f32) {
        self.outs[0].set(left);
        self.outs[1].set(right);
    }
}

/// One position in the processing chain.
///
/// Cloning is cheap (two `Arc` clones).
#[derive(Clone)]
pub struct PluginSlot {
    processor: SharedProcessor,
    peaks: Arc<PeakLevels>,
}

impl PluginSlot {
    pub fn new(processor: SharedProcessor) -> Self {
        Self {
            processor,
            peaks: Arc::new(PeakLevels::new()),
        }
    }

    pub fn processor(&self) -> &SharedProcessor {
        &self.processor
    }

    pub fn peaks(&self) -> &Arc<PeakLevels> {
        &self.peaks
    }

    /// Blocks in offline mode, never blocks otherwise.
    #[inline]
    pub(crate) fn acquire(&self, offline: bool) -> Option<MutexGuard<'_, dyn RackProcessor>> {
        if offline {
            Some(self.processor.lock())
        } else {
            self.processor.try_lock()
        }
    }
}

impl std::fmt::Debug for PluginSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSlot")
            .field("peaks", &self.peaks)
            .finish()
    }
}

/// Block-level inputs to the chain owned by the surrounding engine.
pub struct ProcessContext<'a> {
    pub plugins: &'a [PluginSlot],
    pub events: &'a mut EngineEvents,
}

impl<'a> ProcessContext<'a> {
    pub fn new(plugins: &'a [PluginSlot], events: &'a mut EngineEvents) -> Self {
        Self { plugins, events }
    }
}
