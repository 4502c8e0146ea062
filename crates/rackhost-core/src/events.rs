//! Fixed-capacity engine event queues.
//!
//! Each queue holds up to [`MAX_ENGINE_EVENTS`] timestamped events and is
//! terminated by the first [`EventKind::Null`] entry. Queues are allocated once
//! and only overwritten afterwards, so they are safe to use on the audio thread.

use midi_msg::MidiMsg;

/// Capacity of one event queue.
pub const MAX_ENGINE_EVENTS: usize = 512;

/// Largest raw MIDI message an [`EngineEvent`] can carry inline.
pub const MIDI_DATA_SIZE: usize = 4;

const STATUS_NOTE_OFF: u8 = 0x80;
const STATUS_CONTROL_CHANGE: u8 = 0xB0;
const STATUS_PROGRAM_CHANGE: u8 = 0xC0;
const STATUS_SYSTEM: u8 = 0xF0;

const CONTROL_BANK_SELECT: u8 = 0x00;
const CONTROL_ALL_SOUND_OFF: u8 = 0x78;
const CONTROL_ALL_NOTES_OFF: u8 = 0x7B;

/// Structured control event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlEvent {
    /// `param` is a MIDI controller number when it is below 0x78; `value` is normalized 0..1.
    Parameter { param: u16, value: f32 },
    MidiBank(u16),
    MidiProgram(u16),
    AllSoundOff,
    AllNotesOff,
}

/// Raw MIDI message stored inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MidiData {
    pub port: u8,
    pub size: u8,
    pub data: [u8; MIDI_DATA_SIZE],
}

impl MidiData {
    /// Returns `None` for empty messages or messages longer than [`MIDI_DATA_SIZE`].
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MIDI_DATA_SIZE {
            return None;
        }
        let mut data = [0u8; MIDI_DATA_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            port: 0,
            size: bytes.len() as u8,
            data,
        })
    }

    /// Encodes a `midi_msg` message. Allocates; control plane only.
    pub fn from_msg(msg: &MidiMsg) -> Option<Self> {
        Self::new(&msg.to_midi())
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum EventKind {
    /// Queue terminator.
    #[default]
    Null,
    Control(ControlEvent),
    Midi(MidiData),
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct EngineEvent {
    /// Frame offset within the current block.
    pub time: u32,
    /// MIDI channel (0-15).
    pub channel: u8,
    pub kind: EventKind,
}

impl EngineEvent {
    pub const NULL: Self = Self {
        time: 0,
        channel: 0,
        kind: EventKind::Null,
    };

    #[inline]
    pub fn control(time: u32, channel: u8, event: ControlEvent) -> Self {
        Self {
            time,
            channel: channel & 0x0F,
            kind: EventKind::Control(event),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, EventKind::Null)
    }

    /// Builds an event from raw MIDI bytes.
    ///
    /// Controller messages become [`ControlEvent`]s (bank select, all sound off
    /// and all notes off are recognized), program changes become
    /// [`ControlEvent::MidiProgram`], anything else is kept as raw MIDI.
    pub fn from_midi_bytes(time: u32, bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        if status < STATUS_NOTE_OFF {
            return None;
        }

        let channel = if status < STATUS_SYSTEM { status & 0x0F } else { 0 };
        let kind = match status & 0xF0 {
            STATUS_CONTROL_CHANGE if bytes.len() >= 3 => {
                let value = bytes[2] & 0x7F;
                EventKind::Control(match bytes[1] {
                    CONTROL_BANK_SELECT => ControlEvent::MidiBank(value as u16),
                    CONTROL_ALL_SOUND_OFF => ControlEvent::AllSoundOff,
                    CONTROL_ALL_NOTES_OFF => ControlEvent::AllNotesOff,
                    control => ControlEvent::Parameter {
                        param: control as u16,
                        value: value as f32 / 127.0,
                    },
                })
            }
            STATUS_PROGRAM_CHANGE if bytes.len() >= 2 => {
                EventKind::Control(ControlEvent::MidiProgram((bytes[1] & 0x7F) as u16))
            }
            _ => EventKind::Midi(MidiData::new(bytes)?),
        };

        Some(Self {
            time,
            channel,
            kind,
        })
    }

    /// Writes the raw MIDI form of this event into `out` and returns its length.
    ///
    /// Returns 0 when the event has no MIDI representation (the sentinel, or a
    /// parameter that is not a MIDI controller).
    pub fn to_midi_bytes(&self, out: &mut [u8; MIDI_DATA_SIZE]) -> usize {
        let ch = self.channel & 0x0F;
        let mut write = |bytes: &[u8]| {
            out[..bytes.len()].copy_from_slice(bytes);
            bytes.len()
        };

        match self.kind {
            EventKind::Null => 0,
            EventKind::Midi(midi) => write(midi.bytes()),
            EventKind::Control(ControlEvent::Parameter { param, value }) => {
                if param >= CONTROL_ALL_SOUND_OFF as u16 || param == CONTROL_BANK_SELECT as u16 {
                    return 0;
                }
                let value = (value.clamp(0.0, 1.0) * 127.0).round() as u8;
                write(&[STATUS_CONTROL_CHANGE | ch, param as u8, value])
            }
            EventKind::Control(ControlEvent::MidiBank(bank)) => write(&[
                STATUS_CONTROL_CHANGE | ch,
                CONTROL_BANK_SELECT,
                bank.min(127) as u8,
            ]),
            EventKind::Control(ControlEvent::MidiProgram(program)) => {
                write(&[STATUS_PROGRAM_CHANGE | ch, program.min(127) as u8])
            }
            EventKind::Control(ControlEvent::AllSoundOff) => {
                write(&[STATUS_CONTROL_CHANGE | ch, CONTROL_ALL_SOUND_OFF, 0])
            }
            EventKind::Control(ControlEvent::AllNotesOff) => {
                write(&[STATUS_CONTROL_CHANGE | ch, CONTROL_ALL_NOTES_OFF, 0])
            }
        }
    }
}

/// One sentinel-terminated event queue.
#[derive(Clone)]
pub struct EventBuffer {
    events: Box<[EngineEvent; MAX_ENGINE_EVENTS]>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            events: Box::new([EngineEvent::NULL; MAX_ENGINE_EVENTS]),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.fill(EngineEvent::NULL);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events[0].is_null()
    }

    pub fn len(&self) -> usize {
        self.events
            .iter()
            .position(EngineEvent::is_null)
            .unwrap_or(MAX_ENGINE_EVENTS)
    }

    /// Iterates up to the first sentinel.
    pub fn iter(&self) -> impl Iterator<Item = &EngineEvent> {
        self.events.iter().take_while(|e| !e.is_null())
    }

    /// Appends after the last event. Returns `false` when the queue is full.
    pub fn push(&mut self, event: EngineEvent) -> bool {
        let len = self.len();
        if len >= MAX_ENGINE_EVENTS || event.is_null() {
            return false;
        }
        self.events[len] = event;
        true
    }

    #[inline]
    pub fn copy_from(&mut self, other: &EventBuffer) {
        self.events.copy_from_slice(&other.events[..]);
    }

    #[inline]
    pub fn as_slice(&self) -> &[EngineEvent] {
        &self.events[..]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [EngineEvent] {
        &mut self.events[..]
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Input/output queue pair handed to each block.
#[derive(Debug, Clone, Default)]
pub struct EngineEvents {
    pub input: EventBuffer,
    pub output: EventBuffer,
}

impl EngineEvents {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_msg::{Channel, ChannelVoiceMsg};

    #[test]
    fn test_empty_buffer() {
        let buffer = EventBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    fn test_push_until_full() {
        let mut buffer = EventBuffer::new();
        let event = EngineEvent::control(0, 0, ControlEvent::AllNotesOff);
        for _ in 0..MAX_ENGINE_EVENTS {
            assert!(buffer.push(event));
        }
        assert!(!buffer.push(event));
        assert_eq!(buffer.len(), MAX_ENGINE_EVENTS);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_push_rejects_sentinel() {
        let mut buffer = EventBuffer::new();
        assert!(!buffer.push(EngineEvent::NULL));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_controller_bytes_become_control_events() {
        let event = EngineEvent::from_midi_bytes(7, &[0xB3, 0x00, 5]).unwrap();
        assert_eq!(event.time, 7);
        assert_eq!(event.channel, 3);
        assert_eq!(event.kind, EventKind::Control(ControlEvent::MidiBank(5)));

        let event = EngineEvent::from_midi_bytes(0, &[0xB0, 0x7B, 0]).unwrap();
        assert_eq!(event.kind, EventKind::Control(ControlEvent::AllNotesOff));

        let event = EngineEvent::from_midi_bytes(0, &[0xC1, 12]).unwrap();
        assert_eq!(event.kind, EventKind::Control(ControlEvent::MidiProgram(12)));
    }

    #[test]
    fn test_note_bytes_stay_raw() {
        let event = EngineEvent::from_midi_bytes(0, &[0x92, 60, 100]).unwrap();
        assert_eq!(event.channel, 2);
        match event.kind {
            EventKind::Midi(midi) => assert_eq!(midi.bytes(), &[0x92, 60, 100]),
            other => panic!("expected raw midi, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_running_status_and_oversized() {
        assert!(EngineEvent::from_midi_bytes(0, &[60, 100]).is_none());
        assert!(EngineEvent::from_midi_bytes(0, &[0xF0, 1, 2, 3, 4, 0xF7]).is_none());
        assert!(EngineEvent::from_midi_bytes(0, &[]).is_none());
    }

    #[test]
    fn test_parameter_to_controller_bytes() {
        let mut out = [0u8; MIDI_DATA_SIZE];
        let event = EngineEvent::control(
            0,
            1,
            ControlEvent::Parameter {
                param: 7,
                value: 1.0,
            },
        );
        assert_eq!(event.to_midi_bytes(&mut out), 3);
        assert_eq!(&out[..3], &[0xB1, 7, 127]);
    }

    #[test]
    fn test_non_midi_parameter_has_no_bytes() {
        let mut out = [0u8; MIDI_DATA_SIZE];
        let event = EngineEvent::control(
            0,
            0,
            ControlEvent::Parameter {
                param: 300,
                value: 0.5,
            },
        );
        assert_eq!(event.to_midi_bytes(&mut out), 0);
        assert_eq!(EngineEvent::NULL.to_midi_bytes(&mut out), 0);
    }

    #[test]
    fn test_midi_data_from_msg() {
        let msg = MidiMsg::ChannelVoice {
            channel: Channel::Ch2,
            msg: ChannelVoiceMsg::NoteOn {
                note: 64,
                velocity: 90,
            },
        };
        let data = MidiData::from_msg(&msg).unwrap();
        assert_eq!(data.bytes(), &[0x91, 64, 90]);
    }
}
