//! Contract between the rack graph and the surrounding engine.

use crate::rack::ConnectionId;

/// Notification emitted after the connection table changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Added {
        id: ConnectionId,
        /// `"groupA:portA:groupB:portB"` as passed to `connect`.
        correlation: String,
    },
    Removed {
        id: ConnectionId,
    },
}

impl ConnectionEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            Self::Added { id, .. } | Self::Removed { id } => *id,
        }
    }
}

/// Services the rack graph needs from the engine that owns it.
///
/// MIDI links are keyed by the host port's display name. Implementations are
/// called from the control thread, possibly while the staging lock is held.
pub trait RackHost {
    fn connect_midi_in_port(&self, name: &str) -> bool;

    fn disconnect_midi_in_port(&self, name: &str) -> bool;

    fn connect_midi_out_port(&self, name: &str) -> bool;

    fn disconnect_midi_out_port(&self, name: &str) -> bool;

    fn notify(&self, event: ConnectionEvent);
}
