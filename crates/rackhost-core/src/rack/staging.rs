//! Staging buffers and per-pseudo-port connection lists.
//!
//! Both live behind the rack graph's single re-entrant lock. They sit in
//! separate cells so that a processor running inside the block can still edit
//! the port lists on the same thread; the buffers stay borrowed for the whole
//! block.

use std::cell::RefCell;

use crate::rack::ports::RackPort;
use crate::{Error, Result};

/// Host port indices linked to each audio pseudo-port.
#[derive(Debug, Default)]
pub(crate) struct PortLists {
    in1: Vec<u32>,
    in2: Vec<u32>,
    out1: Vec<u32>,
    out2: Vec<u32>,
}

impl PortLists {
    fn list_mut(&mut self, port: RackPort) -> Option<&mut Vec<u32>> {
        match port {
            RackPort::AudioIn1 => Some(&mut self.in1),
            RackPort::AudioIn2 => Some(&mut self.in2),
            RackPort::AudioOut1 => Some(&mut self.out1),
            RackPort::AudioOut2 => Some(&mut self.out2),
            RackPort::MidiIn | RackPort::MidiOut => None,
        }
    }

    /// Returns `false` if the index is already registered.
    pub(crate) fn append(&mut self, port: RackPort, index: u32) -> bool {
        match self.list_mut(port) {
            Some(list) if !list.contains(&index) => {
                list.push(index);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove_one(&mut self, port: RackPort, index: u32) -> bool {
        let Some(list) = self.list_mut(port) else {
            return false;
        };
        match list.iter().position(|&p| p == index) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.in1.clear();
        self.in2.clear();
        self.out1.clear();
        self.out2.clear();
    }

    #[inline]
    pub(crate) fn ins(&self) -> [&[u32]; 2] {
        [&self.in1, &self.in2]
    }

    #[inline]
    pub(crate) fn outs(&self) -> [&[u32]; 2] {
        [&self.out1, &self.out2]
    }
}

/// Two channels each of input, input scratch and output.
#[derive(Debug, Default)]
pub(crate) struct StagingBuffers {
    pub(crate) in_buf: [Vec<f32>; 2],
    pub(crate) in_buf_tmp: [Vec<f32>; 2],
    pub(crate) out_buf: [Vec<f32>; 2],
}

impl StagingBuffers {
    /// The scratch pair is always allocated; the in/out pairs only when the
    /// host has audio ports.
    pub(crate) fn allocate(frames: usize, with_io: bool) -> Result<Self> {
        let mut buffers = Self {
            in_buf_tmp: [zeroed(frames)?, zeroed(frames)?],
            ..Default::default()
        };
        if with_io {
            buffers.in_buf = [zeroed(frames)?, zeroed(frames)?];
            buffers.out_buf = [zeroed(frames)?, zeroed(frames)?];
        }
        Ok(buffers)
    }

    #[inline]
    pub(crate) fn frames(&self) -> usize {
        self.in_buf_tmp[1].len()
    }

    #[inline]
    pub(crate) fn has_io(&self) -> bool {
        !self.out_buf[1].is_empty()
    }
}

fn zeroed(frames: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(frames)
        .map_err(|_| Error::BufferAllocation { frames })?;
    buf.resize(frames, 0.0);
    Ok(buf)
}

/// Everything guarded by the staging lock.
#[derive(Debug, Default)]
pub(crate) struct RackAudio {
    pub(crate) ports: RefCell<PortLists>,
    pub(crate) buffers: RefCell<StagingBuffers>,
}

/// Sums every connected host input into its staging channel.
///
/// The first contributor is copied and later ones accumulate; a channel with
/// no usable connection is zeroed.
pub(crate) fn mix_inputs(
    ports: &PortLists,
    host_in: &[&[f32]],
    inputs: u32,
    in_buf: &mut [Vec<f32>; 2],
    frames: usize,
) {
    for (channel, connected) in in_buf.iter_mut().zip(ports.ins()) {
        let channel = &mut channel[..frames];
        let mut first = true;

        for &port in connected {
            if port >= inputs {
                continue;
            }
            let Some(src) = host_in.get(port as usize) else {
                continue;
            };
            if first {
                copy_into(channel, src);
                first = false;
            } else {
                add_into(channel, src);
            }
        }

        if first {
            channel.fill(0.0);
        }
    }
}

/// Adds each staging output channel into every host output linked to it.
pub(crate) fn mix_outputs(
    ports: &PortLists,
    out_buf: &[Vec<f32>; 2],
    host_out: &mut [&mut [f32]],
    outputs: u32,
    frames: usize,
) {
    for (channel, connected) in out_buf.iter().zip(ports.outs()) {
        let channel = &channel[..frames];
        for &port in connected {
            if port >= outputs {
                continue;
            }
            if let Some(dst) = host_out.get_mut(port as usize) {
                add_into(dst, channel);
            }
        }
    }
}

#[inline]
pub(crate) fn copy_into(dst: &mut [f32], src: &[f32]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(0.0);
}

#[inline]
pub(crate) fn add_into(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += *s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_append_rejects_duplicates() {
        let mut ports = PortLists::default();
        assert!(ports.append(RackPort::AudioIn1, 3));
        assert!(!ports.append(RackPort::AudioIn1, 3));
        assert!(ports.append(RackPort::AudioIn2, 3));
        assert!(!ports.append(RackPort::MidiIn, 0));
    }

    #[test]
    fn test_remove_one() {
        let mut ports = PortLists::default();
        ports.append(RackPort::AudioOut2, 1);
        assert!(ports.remove_one(RackPort::AudioOut2, 1));
        assert!(!ports.remove_one(RackPort::AudioOut2, 1));
        assert!(!ports.remove_one(RackPort::MidiOut, 1));
    }

    #[test]
    fn test_allocate_without_io() {
        let buffers = StagingBuffers::allocate(64, false).unwrap();
        assert_eq!(buffers.frames(), 64);
        assert!(!buffers.has_io());
    }

    #[test]
    fn test_allocation_failure_reports_frames() {
        let frames = usize::MAX / 2;
        let err = StagingBuffers::allocate(frames, true).unwrap_err();
        assert_eq!(err, Error::BufferAllocation { frames });
    }

    #[test]
    fn test_mix_inputs_sums_and_zeroes() {
        let mut ports = PortLists::default();
        ports.append(RackPort::AudioIn1, 0);
        ports.append(RackPort::AudioIn1, 1);

        let a = [0.25f32; 8];
        let b = [0.5f32; 8];
        let mut in_buf = [vec![9.0f32; 8], vec![9.0f32; 8]];

        let host: [&[f32]; 2] = [&a, &b];
        mix_inputs(&ports, &host, 2, &mut in_buf, 8);

        for &sample in &in_buf[0] {
            assert_relative_eq!(sample, 0.75);
        }
        assert!(in_buf[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_short_host_input_leaves_no_stale_tail() {
        let mut ports = PortLists::default();
        ports.append(RackPort::AudioIn1, 0);

        let short = [0.5f32; 3];
        let mut in_buf = [vec![7.0f32; 8], vec![7.0f32; 8]];
        let host: [&[f32]; 1] = [&short];
        mix_inputs(&ports, &host, 1, &mut in_buf, 8);

        assert_eq!(&in_buf[0][..3], &[0.5; 3]);
        assert!(in_buf[0][3..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mix_inputs_skips_out_of_range_ports() {
        let mut ports = PortLists::default();
        ports.append(RackPort::AudioIn2, 5);

        let a = [1.0f32; 4];
        let mut in_buf = [vec![3.0f32; 4], vec![3.0f32; 4]];
        let host: [&[f32]; 1] = [&a];
        mix_inputs(&ports, &host, 1, &mut in_buf, 4);

        assert!(in_buf[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mix_outputs_accumulates() {
        let mut ports = PortLists::default();
        ports.append(RackPort::AudioOut1, 0);
        ports.append(RackPort::AudioOut1, 1);

        let out_buf = [vec![0.5f32; 4], vec![0.0f32; 4]];
        let mut host_a = [0.25f32; 4];
        let mut host_b = [1.0f32; 4];
        {
            let mut host: [&mut [f32]; 2] = [&mut host_a, &mut host_b];
            mix_outputs(&ports, &out_buf, &mut host, 2, 4);
        }

        assert!(host_a.iter().all(|&s| (s - 0.75).abs() < 1e-6));
        assert!(host_b.iter().all(|&s| (s - 1.5).abs() < 1e-6));
    }
}
