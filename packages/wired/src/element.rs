use std::fmt;

use crate::change::WiredNetworkChange;

/// A point in a level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Something in the world attached to a wired node: a cable, a modem, a
/// computer.
pub trait WiredElement {
    /// The peripherals this element can expose to its network.
    type Peripheral: Clone + PartialEq;
    /// What packets sent over the network carry.
    type Payload: 'static;

    fn level(&self) -> &str;

    fn position(&self) -> Position;

    /// Called whenever the peripherals visible on this element's network
    /// change.
    fn network_changed(&mut self, change: &WiredNetworkChange<Self::Peripheral>);
}

/// Where a packet came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketSender {
    pub level: String,
    pub position: Position,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet<T> {
    pub channel: u16,
    pub reply_channel: u16,
    pub payload: T,
    pub sender: PacketSender,
}

/// A listener for packets arriving at a node, such as an open modem.
pub trait PacketReceiver<T> {
    fn position(&self) -> Position;

    fn range(&self) -> f64;

    fn is_interdimensional(&self) -> bool;

    /// `distance` is the length of wire the packet travelled plus the
    /// distance from its last node to this receiver.
    fn receive_same_dimension(&self, packet: &Packet<T>, distance: f64);

    fn receive_different_dimension(&self, packet: &Packet<T>);
}
