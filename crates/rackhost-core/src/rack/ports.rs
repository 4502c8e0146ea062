//! Rack port addressing.
//!
//! Every rack connection joins one of the engine's own pseudo-ports
//! ([`RackPort`]) to a host port in one of the external groups. Ports are
//! addressed numerically as `(group, port)` and textually as a full port name:
//!
//! ```text
//! Rack:AudioIn1 .. Rack:MidiOut   engine pseudo-ports
//! AudioIn:<n>    AudioOut:<n>     host audio ports, 1-based
//! MidiIn:<name>  MidiOut:<name>   host MIDI ports, by display name
//! ```

use serde::{Deserialize, Serialize};

use super::connections::MidiPortNames;

/// Prefix of every engine pseudo-port name.
pub const ENGINE_PORT_PREFIX: &str = "Rack:";

const AUDIO_IN_PREFIX: &str = "AudioIn:";
const AUDIO_OUT_PREFIX: &str = "AudioOut:";
const MIDI_IN_PREFIX: &str = "MidiIn:";
const MIDI_OUT_PREFIX: &str = "MidiOut:";

/// Port groups, with their raw numeric ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum PortGroup {
    Engine = 0,
    AudioIn = 1,
    AudioOut = 2,
    MidiIn = 3,
    MidiOut = 4,
}

impl PortGroup {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Engine),
            1 => Some(Self::AudioIn),
            2 => Some(Self::AudioOut),
            3 => Some(Self::MidiIn),
            4 => Some(Self::MidiOut),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_external(self) -> bool {
        self != Self::Engine
    }
}

/// The engine's fixed pseudo-ports. Raw id 0 is reserved as "no port".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RackPort {
    AudioIn1 = 1,
    AudioIn2 = 2,
    AudioOut1 = 3,
    AudioOut2 = 4,
    MidiIn = 5,
    MidiOut = 6,
}

impl RackPort {
    pub const ALL: [RackPort; 6] = [
        Self::AudioIn1,
        Self::AudioIn2,
        Self::AudioOut1,
        Self::AudioOut2,
        Self::MidiIn,
        Self::MidiOut,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw.checked_sub(1)? as usize).copied()
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// The only external group this pseudo-port may be linked to.
    pub fn peer_group(self) -> PortGroup {
        match self {
            Self::AudioIn1 | Self::AudioIn2 => PortGroup::AudioIn,
            Self::AudioOut1 | Self::AudioOut2 => PortGroup::AudioOut,
            Self::MidiIn => PortGroup::MidiIn,
            Self::MidiOut => PortGroup::MidiOut,
        }
    }

    /// Inputs feed the engine, so the external side is listed first.
    #[inline]
    pub fn is_input(self) -> bool {
        matches!(self, Self::AudioIn1 | Self::AudioIn2 | Self::MidiIn)
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Self::AudioIn1 => "Rack:AudioIn1",
            Self::AudioIn2 => "Rack:AudioIn2",
            Self::AudioOut1 => "Rack:AudioOut1",
            Self::AudioOut2 => "Rack:AudioOut2",
            Self::MidiIn => "Rack:MidiIn",
            Self::MidiOut => "Rack:MidiOut",
        }
    }

    /// Accepts both `AudioIn1` and `audio-in1` styles.
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "AudioIn1" | "audio-in1" => Some(Self::AudioIn1),
            "AudioIn2" | "audio-in2" => Some(Self::AudioIn2),
            "AudioOut1" | "audio-out1" => Some(Self::AudioOut1),
            "AudioOut2" | "audio-out2" => Some(Self::AudioOut2),
            "MidiIn" | "midi-in" => Some(Self::MidiIn),
            "MidiOut" | "midi-out" => Some(Self::MidiOut),
            _ => None,
        }
    }
}

/// A `(group, port)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    pub group: PortGroup,
    /// Pseudo-port id for [`PortGroup::Engine`], 0-based index otherwise.
    pub port: u32,
}

impl PortAddress {
    pub fn new(group: PortGroup, port: u32) -> Self {
        Self { group, port }
    }

    pub fn engine(port: RackPort) -> Self {
        Self::new(PortGroup::Engine, port.raw())
    }

    pub fn rack_port(&self) -> Option<RackPort> {
        match self.group {
            PortGroup::Engine => RackPort::from_raw(self.port),
            _ => None,
        }
    }

    /// Full name of this address, resolving MIDI ports through `midi`.
    pub fn full_name(&self, midi: &MidiPortNames) -> Option<String> {
        match self.group {
            PortGroup::Engine => address_to_name(*self).map(str::to_owned),
            PortGroup::AudioIn => Some(format!("{AUDIO_IN_PREFIX}{}", self.port as u64 + 1)),
            PortGroup::AudioOut => Some(format!("{AUDIO_OUT_PREFIX}{}", self.port as u64 + 1)),
            PortGroup::MidiIn => midi
                .name(true, self.port)
                .map(|name| format!("{MIDI_IN_PREFIX}{name}")),
            PortGroup::MidiOut => midi
                .name(false, self.port)
                .map(|name| format!("{MIDI_OUT_PREFIX}{name}")),
        }
    }
}

/// Fixed name of an engine pseudo-port; `None` for every other address.
pub fn address_to_name(address: PortAddress) -> Option<&'static str> {
    address.rack_port().map(RackPort::full_name)
}

/// Parses a full port name.
///
/// Numeric suffixes are 1-based and must be a plain positive decimal integer;
/// `0`, signs, whitespace and trailing garbage are all rejected. MIDI suffixes
/// must match a registered display name exactly.
pub fn name_to_address(name: &str, midi: &MidiPortNames) -> Option<PortAddress> {
    if let Some(short) = name.strip_prefix(ENGINE_PORT_PREFIX) {
        return RackPort::from_short_name(short).map(PortAddress::engine);
    }
    if let Some(index) = name.strip_prefix(AUDIO_IN_PREFIX) {
        return parse_port_number(index).map(|port| PortAddress::new(PortGroup::AudioIn, port));
    }
    if let Some(index) = name.strip_prefix(AUDIO_OUT_PREFIX) {
        return parse_port_number(index).map(|port| PortAddress::new(PortGroup::AudioOut, port));
    }
    if let Some(port_name) = name.strip_prefix(MIDI_IN_PREFIX) {
        return midi
            .port_id(true, port_name)
            .map(|port| PortAddress::new(PortGroup::MidiIn, port));
    }
    if let Some(port_name) = name.strip_prefix(MIDI_OUT_PREFIX) {
        return midi
            .port_id(false, port_name)
            .map(|port| PortAddress::new(PortGroup::MidiOut, port));
    }
    None
}

/// 1-based decimal text to a 0-based index.
fn parse_port_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = text.parse::<u64>().ok()?.checked_sub(1)?;
    u32::try_from(index).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_engine_port_names() {
        for port in RackPort::ALL {
            let address = PortAddress::engine(port);
            let name = address_to_name(address).unwrap();
            assert!(name.starts_with(ENGINE_PORT_PREFIX));
            assert_eq!(name_to_address(name, &MidiPortNames::new()), Some(address));
        }
    }

    #[test]
    fn test_external_addresses_have_no_fixed_name() {
        assert_eq!(address_to_name(PortAddress::new(PortGroup::AudioIn, 0)), None);
        assert_eq!(address_to_name(PortAddress::new(PortGroup::Engine, 0)), None);
        assert_eq!(address_to_name(PortAddress::new(PortGroup::Engine, 7)), None);
    }

    #[test]
    fn test_short_name_aliases() {
        let midi = MidiPortNames::new();
        assert_eq!(
            name_to_address("Rack:audio-out2", &midi),
            Some(PortAddress::engine(RackPort::AudioOut2))
        );
        assert_eq!(
            name_to_address("Rack:midi-in", &midi),
            Some(PortAddress::engine(RackPort::MidiIn))
        );
        assert_eq!(name_to_address("Rack:Bogus", &midi), None);
    }

    #[test]
    fn test_audio_numbering_is_one_based() {
        let midi = MidiPortNames::new();
        assert_eq!(
            name_to_address("AudioIn:1", &midi),
            Some(PortAddress::new(PortGroup::AudioIn, 0))
        );
        assert_eq!(
            name_to_address("AudioOut:12", &midi),
            Some(PortAddress::new(PortGroup::AudioOut, 11))
        );
    }

    #[test]
    fn test_zero_and_garbage_suffixes_fail() {
        let midi = MidiPortNames::new();
        for name in [
            "AudioIn:0",
            "AudioIn:",
            "AudioIn:abc",
            "AudioIn:-1",
            "AudioIn:+2",
            "AudioIn: 2",
            "AudioOut:3x",
            "Unknown:1",
            "",
        ] {
            assert_eq!(name_to_address(name, &midi), None, "{name:?} should not parse");
        }
    }

    #[test]
    fn test_midi_names_resolve_through_table() {
        let mut midi = MidiPortNames::new();
        midi.insert(true, 4, "Keystation");
        midi.insert(false, 9, "Synth Out");

        assert_eq!(
            name_to_address("MidiIn:Keystation", &midi),
            Some(PortAddress::new(PortGroup::MidiIn, 4))
        );
        assert_eq!(
            name_to_address("MidiOut:Synth Out", &midi),
            Some(PortAddress::new(PortGroup::MidiOut, 9))
        );
        // Names are looked up per direction.
        assert_eq!(name_to_address("MidiOut:Keystation", &midi), None);
    }

    #[test]
    fn test_last_audio_index_round_trips() {
        let midi = MidiPortNames::new();
        let last = PortAddress::new(PortGroup::AudioIn, u32::MAX);
        let name = last.full_name(&midi).unwrap();
        assert_eq!(name, "AudioIn:4294967296");
        assert_eq!(name_to_address(&name, &midi), Some(last));
        assert_eq!(name_to_address("AudioOut:4294967297", &midi), None);
        assert_eq!(name_to_address("AudioOut:99999999999999999999999", &midi), None);
    }

    #[test]
    fn test_peer_groups() {
        assert_eq!(RackPort::AudioIn2.peer_group(), PortGroup::AudioIn);
        assert_eq!(RackPort::AudioOut1.peer_group(), PortGroup::AudioOut);
        assert_eq!(RackPort::MidiOut.peer_group(), PortGroup::MidiOut);
    }

    proptest! {
        #[test]
        fn audio_names_round_trip(port in any::<u32>(), output in any::<bool>()) {
            let midi = MidiPortNames::new();
            let group = if output { PortGroup::AudioOut } else { PortGroup::AudioIn };
            let address = PortAddress::new(group, port);
            let name = address.full_name(&midi).unwrap();
            prop_assert_eq!(name_to_address(&name, &midi), Some(address));
        }

        #[test]
        fn midi_names_round_trip(port in 0u32..1000, name in "[A-Za-z0-9 _-]{1,24}", input in any::<bool>()) {
            let mut midi = MidiPortNames::new();
            midi.insert(input, port, &name);
            let group = if input { PortGroup::MidiIn } else { PortGroup::MidiOut };
            let address = PortAddress::new(group, port);
            let full = address.full_name(&midi).unwrap();
            prop_assert_eq!(name_to_address(&full, &midi), Some(address));
        }
    }
}
