//! Sequential plugin chain.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::EngineEvents;
use crate::processor::ProcessContext;
use crate::rack::staging::{add_into, copy_into};

static MERGE_WARNED: AtomicBool = AtomicBool::new(false);

/// Runs every enabled plugin in order on one block.
///
/// `scratch` holds the local copy of the input; `input` is only read once at
/// the start. Each plugin after the first processed one receives the previous
/// plugin's output as input. A plugin whose lock is held elsewhere is skipped
/// for this block (unless `offline`, where the lock is waited on).
///
/// Callers guarantee every buffer holds at least `frames` samples.
pub(crate) fn run(
    ctx: &mut ProcessContext<'_>,
    scratch: &mut [Vec<f32>; 2],
    input: [&[f32]; 2],
    output: [&mut [f32]; 2],
    frames: usize,
    offline: bool,
) {
    let [tmp0, tmp1] = scratch;
    let tmp0 = &mut tmp0[..frames];
    let tmp1 = &mut tmp1[..frames];
    let [out0, out1] = output;
    let out0 = &mut out0[..frames];
    let out1 = &mut out1[..frames];

    copy_into(tmp0, input[0]);
    copy_into(tmp1, input[1]);
    out0.fill(0.0);
    out1.fill(0.0);
    ctx.events.output.clear();

    let plugins = ctx.plugins;
    let mut processed = false;
    let mut old_midi_out_count = 0;

    for slot in plugins {
        let Some(mut plugin) = slot.acquire(offline) else {
            continue;
        };
        if !plugin.is_enabled() {
            continue;
        }

        if processed {
            tmp0.copy_from_slice(out0);
            tmp1.copy_from_slice(out1);
            out0.fill(0.0);
            out1.fill(0.0);

            if old_midi_out_count == 0 && !ctx.events.input.is_empty() {
                // The block input events stay in place for this plugin.
                if !ctx.events.output.is_empty() {
                    warn_merge_unsupported();
                }
            } else {
                forward_events(ctx.events);
            }
        }

        let audio_in_count = plugin.audio_in_count();
        let audio_out_count = plugin.audio_out_count();
        old_midi_out_count = plugin.midi_out_count();

        plugin.init_buffers();
        plugin.process([&*tmp0, &*tmp1], [&mut *out0, &mut *out1], ctx.events, frames);
        drop(plugin);

        // Generators are layered over the signal that reached them.
        if audio_in_count == 0 {
            add_into(out0, tmp0);
            add_into(out1, tmp1);
        }

        let peaks = slot.peaks();
        if audio_in_count > 0 {
            peaks.set_ins(peak(tmp0), peak(tmp1));
        } else {
            peaks.set_ins(0.0, 0.0);
        }
        if audio_out_count > 0 {
            peaks.set_outs(peak(out0), peak(out1));
        } else {
            peaks.set_outs(0.0, 0.0);
        }

        processed = true;
    }
}

/// Previous outputs become the next inputs.
#[inline]
fn forward_events(events: &mut EngineEvents) {
    let EngineEvents { input, output } = events;
    input.copy_from(output);
    output.clear();
}

/// Sorted merge of the block input with a plugin's output events is not
/// implemented; the output events are left where they are.
#[cold]
fn warn_merge_unsupported() {
    if !MERGE_WARNED.swap(true, Ordering::Relaxed) {
        tracing::warn!("merging carried-over input events with plugin output events is not supported");
    }
}

/// Largest absolute sample, never below 1.0.
#[inline]
pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(1.0f32, |acc, s| acc.max(s.abs()))
}
