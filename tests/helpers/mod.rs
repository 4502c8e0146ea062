//! Test helpers and fixtures for rackhost integration tests
//!
//! Mock processors cover the shapes the plugin chain distinguishes: effects
//! with audio inputs, input-less generators, MIDI emitters, and processors
//! that are busy (locked) for a block.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain, sums)

#![allow(dead_code)]

pub mod tolerances;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use parking_lot::Mutex;
use rackhost::prelude::*;
use rackhost::SharedProcessor;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: u32 = 64;

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Rack engine with four host ports per direction and no MIDI driver.
pub fn test_engine() -> Engine {
    Engine::builder()
        .buffer_size(TEST_BUFFER_SIZE)
        .inputs(4)
        .outputs(4)
        .build()
        .expect("Failed to create test engine")
}

/// Copies input to output unchanged.
pub struct PassThrough;

impl RackProcessor for PassThrough {
    fn is_enabled(&self) -> bool {
        true
    }
    fn audio_in_count(&self) -> u32 {
        2
    }
    fn audio_out_count(&self) -> u32 {
        2
    }
    fn midi_out_count(&self) -> u32 {
        0
    }
    fn process(
        &mut self,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        _events: &mut EngineEvents,
        frames: usize,
    ) {
        for (out, inp) in output.into_iter().zip(input) {
            out[..frames].copy_from_slice(&inp[..frames]);
        }
    }
}

/// Scales input by a fixed gain.
pub struct Gain(pub f32);

impl RackProcessor for Gain {
    fn is_enabled(&self) -> bool {
        true
    }
    fn audio_in_count(&self) -> u32 {
        2
    }
    fn audio_out_count(&self) -> u32 {
        2
    }
    fn midi_out_count(&self) -> u32 {
        0
    }
    fn process(
        &mut self,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        _events: &mut EngineEvents,
        frames: usize,
    ) {
        for (out, inp) in output.into_iter().zip(input) {
            for (o, i) in out[..frames].iter_mut().zip(&inp[..frames]) {
                *o = *i * self.0;
            }
        }
    }
}

/// Writes a constant on both channels, ignoring input.
pub struct ConstantGenerator(pub f32);

impl RackProcessor for ConstantGenerator {
    fn is_enabled(&self) -> bool {
        true
    }
    fn audio_in_count(&self) -> u32 {
        0
    }
    fn audio_out_count(&self) -> u32 {
        2
    }
    fn midi_out_count(&self) -> u32 {
        0
    }
    fn process(
        &mut self,
        _input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        _events: &mut EngineEvents,
        frames: usize,
    ) {
        for out in output {
            out[..frames].fill(self.0);
        }
    }
}

/// Emits a program change per block and records how many input events it saw.
#[derive(Default)]
pub struct MidiEmitter {
    pub program: u16,
    pub seen: usize,
}

impl RackProcessor for MidiEmitter {
    fn is_enabled(&self) -> bool {
        true
    }
    fn audio_in_count(&self) -> u32 {
        2
    }
    fn audio_out_count(&self) -> u32 {
        2
    }
    fn midi_out_count(&self) -> u32 {
        1
    }
    fn process(
        &mut self,
        _input: [&[f32]; 2],
        _output: [&mut [f32]; 2],
        events: &mut EngineEvents,
        _frames: usize,
    ) {
        self.seen = events.input.len();
        events
            .output
            .push(EngineEvent::control(0, 0, ControlEvent::MidiProgram(self.program)));
    }
}

/// Counts the input events it was handed; produces silence.
#[derive(Default)]
pub struct EventCounter {
    pub seen: usize,
}

impl RackProcessor for EventCounter {
    fn is_enabled(&self) -> bool {
        true
    }
    fn audio_in_count(&self) -> u32 {
        2
    }
    fn audio_out_count(&self) -> u32 {
        2
    }
    fn midi_out_count(&self) -> u32 {
        0
    }
    fn process(
        &mut self,
        _input: [&[f32]; 2],
        _output: [&mut [f32]; 2],
        events: &mut EngineEvents,
        _frames: usize,
    ) {
        self.seen = events.input.len();
    }
}

/// Runs one block through `engine` with `inputs` host input channels, each
/// filled with the given constant. Returns the host output channels.
pub fn run_block(engine: &Engine, inputs: &[f32], outputs: usize, frames: usize) -> Vec<Vec<f32>> {
    let input_bufs: Vec<Vec<f32>> = inputs.iter().map(|&v| vec![v; frames]).collect();
    let input_refs: Vec<&[f32]> = input_bufs.iter().map(|b| b.as_slice()).collect();

    let mut output_bufs = vec![vec![0.0f32; frames]; outputs];
    {
        let mut output_refs: Vec<&mut [f32]> =
            output_bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
        engine.process(&input_refs, &mut output_refs, frames);
    }
    output_bufs
}

/// Appends a processor and returns a typed handle for inspecting it afterwards.
pub fn add<P: RackProcessor + 'static>(engine: &Engine, processor: P) -> Arc<Mutex<P>> {
    let handle = Arc::new(Mutex::new(processor));
    let slot: SharedProcessor = handle.clone();
    engine.add_plugin(slot);
    handle
}

/// Checks every sample of `buf` against `expected`.
pub fn assert_all_near(buf: &[f32], expected: f32) {
    for &s in buf {
        assert_abs_diff_eq!(s, expected, epsilon = tolerances::FLOAT_EPSILON);
    }
}
