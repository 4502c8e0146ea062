//! Connection table and MIDI port name table.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ports::{PortAddress, PortGroup, RackPort};

/// Connection identifier. Monotonically increasing, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A link between an engine pseudo-port and a host port.
///
/// `a` and `b` keep the orientation the caller used in `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub a: PortAddress,
    pub b: PortAddress,
}

impl Connection {
    /// Splits into the pseudo-port and the external side.
    pub fn resolve(&self) -> Option<(RackPort, PortAddress)> {
        resolve_endpoints(self.a, self.b)
    }

    /// `"groupA:portA:groupB:portB"` with raw numeric ids.
    pub fn correlation(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.a.group.raw(),
            self.a.port,
            self.b.group.raw(),
            self.b.port
        )
    }
}

/// Exactly one side must be a valid engine pseudo-port and the other an external group.
pub(crate) fn resolve_endpoints(a: PortAddress, b: PortAddress) -> Option<(RackPort, PortAddress)> {
    match (a.group, b.group) {
        (PortGroup::Engine, PortGroup::Engine) => None,
        (PortGroup::Engine, _) => a.rack_port().map(|port| (port, b)),
        (_, PortGroup::Engine) => b.rack_port().map(|port| (port, a)),
        _ => None,
    }
}

/// Ordered connection list owned by the rack graph.
#[derive(Debug, Default)]
pub struct ConnectionList {
    last_id: u32,
    list: Vec<Connection>,
}

impl ConnectionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id and appends.
    pub(crate) fn push(&mut self, a: PortAddress, b: PortAddress) -> Connection {
        self.last_id += 1;
        let connection = Connection {
            id: ConnectionId(self.last_id),
            a,
            b,
        };
        self.list.push(connection);
        connection
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.list.iter().find(|c| c.id == id)
    }

    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.list.iter().position(|c| c.id == id)?;
        Some(self.list.remove(index))
    }

    /// Drops every connection. Ids keep counting from where they were.
    pub(crate) fn clear(&mut self) {
        self.list.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn last_id(&self) -> u32 {
        self.last_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PortNameToId {
    port: u32,
    name: String,
}

/// Display names of host MIDI ports, per direction.
///
/// Populated by the surrounding engine; the graph only reads it, apart from
/// clearing it on a full reset.
#[derive(Clone, Debug, Default)]
pub struct MidiPortNames {
    ins: Vec<PortNameToId>,
    outs: Vec<PortNameToId>,
}

impl MidiPortNames {
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, is_input: bool) -> &Vec<PortNameToId> {
        if is_input {
            &self.ins
        } else {
            &self.outs
        }
    }

    fn side_mut(&mut self, is_input: bool) -> &mut Vec<PortNameToId> {
        if is_input {
            &mut self.ins
        } else {
            &mut self.outs
        }
    }

    /// Registers or renames a port.
    pub fn insert(&mut self, is_input: bool, port: u32, name: &str) {
        let side = self.side_mut(is_input);
        match side.iter_mut().find(|p| p.port == port) {
            Some(existing) => existing.name = name.to_owned(),
            None => side.push(PortNameToId {
                port,
                name: name.to_owned(),
            }),
        }
    }

    pub fn remove(&mut self, is_input: bool, port: u32) -> bool {
        let side = self.side_mut(is_input);
        let before = side.len();
        side.retain(|p| p.port != port);
        side.len() != before
    }

    pub fn name(&self, is_input: bool, port: u32) -> Option<&str> {
        self.side(is_input)
            .iter()
            .find(|p| p.port == port)
            .map(|p| p.name.as_str())
    }

    pub fn port_id(&self, is_input: bool, name: &str) -> Option<u32> {
        self.side(is_input)
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.port)
    }

    pub fn clear(&mut self) {
        self.ins.clear();
        self.outs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ins.is_empty() && self.outs.is_empty()
    }
}
