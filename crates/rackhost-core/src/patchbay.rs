//! Arbitrary-topology ("patchbay") adapter.
//!
//! The node graph itself is external; [`PatchbayGraph`] owns the audio and MIDI
//! block buffers it runs on and bridges them to the engine's event queues.

use crate::events::{EngineEvent, EngineEvents, MidiData, MAX_ENGINE_EVENTS, MIDI_DATA_SIZE};
use crate::{Error, GraphConfig, Result};

/// External node-graph engine driven by [`PatchbayGraph`].
pub trait NodeGraphBackend: Send {
    fn set_buffer_size(&mut self, buffer_size: u32);

    fn set_sample_rate(&mut self, sample_rate: f64);

    fn set_non_realtime(&mut self, non_realtime: bool);

    /// Processes one block in place. `audio` has `max(inputs, outputs)`
    /// channels of at least `frames` samples; `midi` holds the incoming events
    /// and is left holding the outgoing ones.
    fn process_block(&mut self, audio: &mut [Vec<f32>], midi: &mut MidiBuffer, frames: usize);
}

/// Timestamped raw MIDI, preallocated.
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    events: Vec<(u32, MidiData)>,
}

impl MidiBuffer {
    pub const CAPACITY: usize = MAX_ENGINE_EVENTS * 2;

    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(Self::CAPACITY),
        }
    }

    /// Returns `false` when full or when `bytes` is not representable.
    pub fn add(&mut self, time: u32, bytes: &[u8]) -> bool {
        if self.events.len() >= Self::CAPACITY {
            return false;
        }
        match MidiData::new(bytes) {
            Some(data) => {
                self.events.push((time, data));
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &MidiData)> {
        self.events.iter().map(|(time, data)| (*time, data))
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PatchbayGraph {
    inputs: u32,
    outputs: u32,
    sample_rate: f64,
    buffer_size: u32,
    audio: Vec<Vec<f32>>,
    midi: MidiBuffer,
    backend: Box<dyn NodeGraphBackend>,
}

impl PatchbayGraph {
    pub fn new(config: &GraphConfig, mut backend: Box<dyn NodeGraphBackend>) -> Result<Self> {
        backend.set_sample_rate(config.sample_rate);
        backend.set_buffer_size(config.buffer_size);

        let channels = config.inputs.max(config.outputs) as usize;
        let audio = allocate_channels(channels, config.buffer_size as usize)?;

        tracing::debug!(
            "Patchbay graph created: {} in, {} out, {} frames",
            config.inputs,
            config.outputs,
            config.buffer_size
        );

        Ok(Self {
            inputs: config.inputs,
            outputs: config.outputs,
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
            audio,
            midi: MidiBuffer::new(),
            backend,
        })
    }

    pub fn inputs(&self) -> u32 {
        self.inputs
    }

    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, buffer_size: u32) -> Result<()> {
        self.audio = allocate_channels(self.audio.len(), buffer_size as usize)?;
        self.buffer_size = buffer_size;
        self.backend.set_buffer_size(buffer_size);
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.backend.set_sample_rate(sample_rate);
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.backend.set_non_realtime(offline);
    }

    /// Runs one block through the node graph.
    ///
    /// Incoming engine events are handed to the graph as raw MIDI; whatever
    /// MIDI the graph leaves behind replaces `events.output`. Host outputs are
    /// overwritten.
    pub fn process(
        &mut self,
        events: &mut EngineEvents,
        input: &[&[f32]],
        output: &mut [&mut [f32]],
        frames: usize,
    ) {
        if frames > self.buffer_size as usize {
            return;
        }

        self.midi.clear();
        let mut bytes = [0u8; MIDI_DATA_SIZE];
        for event in events.input.iter() {
            let size = event.to_midi_bytes(&mut bytes);
            if size > 0 {
                self.midi.add(event.time, &bytes[..size]);
            }
        }

        events.output.clear();

        let inputs = self.inputs as usize;
        for (i, channel) in self.audio.iter_mut().enumerate() {
            let channel = &mut channel[..frames];
            match input.get(i).filter(|_| i < inputs) {
                Some(src) => {
                    let n = src.len().min(frames);
                    channel[..n].copy_from_slice(&src[..n]);
                    channel[n..].fill(0.0);
                }
                None => channel.fill(0.0),
            }
        }

        self.backend
            .process_block(&mut self.audio, &mut self.midi, frames);

        for (dst, src) in output
            .iter_mut()
            .take(self.outputs as usize)
            .zip(&self.audio)
        {
            for (d, s) in dst.iter_mut().zip(&src[..frames]) {
                *d = *s;
            }
        }

        // Capped at the queue capacity; `push` refuses once full.
        for (time, data) in self.midi.iter() {
            if let Some(event) = EngineEvent::from_midi_bytes(time, data.bytes()) {
                if !events.output.push(event) {
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for PatchbayGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchbayGraph")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

fn allocate_channels(channels: usize, frames: usize) -> Result<Vec<Vec<f32>>> {
    let mut audio = Vec::new();
    audio
        .try_reserve_exact(channels)
        .map_err(|_| Error::BufferAllocation { frames })?;
    for _ in 0..channels {
        let mut channel = Vec::new();
        channel
            .try_reserve_exact(frames)
            .map_err(|_| Error::BufferAllocation { frames })?;
        channel.resize(frames, 0.0);
        audio.push(channel);
    }
    Ok(audio)
}
