use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::change::WiredNetworkChange;
use crate::element::{Packet, PacketReceiver, WiredElement};
use crate::error::{Result, WiredError};
use crate::slotmap::{Key, SlotMap};

/// A node in a [`WiredGraph`]. Ids of destroyed nodes are never reissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Key);

/// A connected set of nodes. The id of a network which was merged away or
/// split may later be handed to a new network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(Key);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0.index, self.0.generation)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0.index, self.0.generation)
    }
}

/// Which node wins when several nodes on one network expose a peripheral
/// under the same name. The winner depends only on network membership, not
/// on the order nodes joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeripheralPrecedence {
    #[default]
    LowestNode,
    HighestNode,
}

pub type Peripherals<E> = BTreeMap<String, <E as WiredElement>::Peripheral>;

pub type Receiver<E> = Arc<dyn PacketReceiver<<E as WiredElement>::Payload>>;

struct Node<E: WiredElement> {
    element: E,
    network: NetworkId,
    neighbours: BTreeSet<NodeId>,
    peripherals: Peripherals<E>,
    receivers: Vec<Receiver<E>>,
}

#[derive(Debug, Default)]
struct Network {
    nodes: BTreeSet<NodeId>,
}

/// Wired nodes, the cables between them and the networks they form.
///
/// Every node belongs to exactly one network, and two nodes share a network
/// exactly when a path of connections joins them. Each element is told
/// about every change to the peripherals visible on its network.
pub struct WiredGraph<E: WiredElement> {
    nodes: SlotMap<Node<E>>,
    networks: SlotMap<Network>,
    precedence: PeripheralPrecedence,
    changes: Vec<(NodeId, WiredNetworkChange<E::Peripheral>)>,
}

impl<E: WiredElement> Default for WiredGraph<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: WiredElement> WiredGraph<E> {
    pub fn new() -> Self {
        Self::with_precedence(PeripheralPrecedence::default())
    }

    pub fn with_precedence(precedence: PeripheralPrecedence) -> Self {
        Self {
            nodes: SlotMap::new(),
            networks: SlotMap::new(),
            precedence,
            changes: Vec::new(),
        }
    }

    pub fn precedence(&self) -> PeripheralPrecedence {
        self.precedence
    }

    /// Add a node in a network of its own.
    pub fn add_node(&mut self, element: E) -> NodeId {
        let network = NetworkId(self.networks.insert(Network::default()));
        let id = NodeId(self.nodes.insert(Node {
            element,
            network,
            neighbours: BTreeSet::new(),
            peripherals: BTreeMap::new(),
            receivers: Vec::new(),
        }));
        if let Some(network) = self.networks.get_mut(network.0) {
            network.nodes.insert(id);
        }
        id
    }

    /// Detach a node from its network and drop it from the graph.
    pub fn destroy(&mut self, id: NodeId) -> Result<E> {
        self.remove(id)?;
        let node = self.nodes.release(id.0).ok_or(WiredError::UnknownNode(id))?;
        self.networks.release(node.network.0);
        Ok(node.element)
    }

    fn node(&self, id: NodeId) -> Result<&Node<E>> {
        self.nodes.get(id.0).ok_or(WiredError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<E>> {
        self.nodes.get_mut(id.0).ok_or(WiredError::UnknownNode(id))
    }

    fn network(&self, id: NetworkId) -> Result<&Network> {
        self.networks.get(id.0).ok_or(WiredError::UnknownNetwork(id))
    }

    pub fn element(&self, id: NodeId) -> Result<&E> {
        Ok(&self.node(id)?.element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut E> {
        Ok(&mut self.node_mut(id)?.element)
    }

    pub fn network_of(&self, id: NodeId) -> Result<NetworkId> {
        Ok(self.node(id)?.network)
    }

    pub fn same_network(&self, a: NodeId, b: NodeId) -> Result<bool> {
        Ok(self.node(a)?.network == self.node(b)?.network)
    }

    pub fn neighbours(&self, id: NodeId) -> Result<impl Iterator<Item = NodeId> + '_> {
        Ok(self.node(id)?.neighbours.iter().copied())
    }

    pub fn network_nodes(&self, network: NetworkId) -> Result<Vec<NodeId>> {
        Ok(self.network(network)?.nodes.iter().copied().collect())
    }

    pub fn local_peripherals(&self, id: NodeId) -> Result<&Peripherals<E>> {
        Ok(&self.node(id)?.peripherals)
    }

    /// Every peripheral visible from `id`'s network, its own included.
    pub fn visible_peripherals(&self, id: NodeId) -> Result<Peripherals<E>> {
        Ok(self.network_peripherals(self.node(id)?.network))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Every change delivered since the last call, in delivery order.
    pub fn drain_changes(&mut self) -> Vec<(NodeId, WiredNetworkChange<E::Peripheral>)> {
        mem::take(&mut self.changes)
    }

    /// Connect two nodes with a cable, merging their networks if needed.
    /// Returns false if they were already connected, or are the same node.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        let network_a = self.node(a)?.network;
        let network_b = self.node(b)?.network;
        if a == b || self.node(a)?.neighbours.contains(&b) {
            return Ok(false);
        }

        if network_a != network_b {
            self.merge(network_a, network_b);
        }
        self.node_mut(a)?.neighbours.insert(b);
        self.node_mut(b)?.neighbours.insert(a);
        Ok(true)
    }

    /// Cut the cable between two nodes, splitting their network if nothing
    /// else joins them. Returns false if they were not connected.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        self.node(b)?;
        if a == b || !self.node_mut(a)?.neighbours.remove(&b) {
            return Ok(false);
        }
        self.node_mut(b)?.neighbours.remove(&a);

        if let Some(reachable) = self.reachable_from(a, Some(b)) {
            let network = self.node(a)?.network;
            self.split_off(network, reachable);
        }
        Ok(true)
    }

    /// Cut every cable to a node, leaving it alone in a fresh network with no
    /// peripherals. Returns false if it was already alone.
    pub fn remove(&mut self, id: NodeId) -> Result<bool> {
        let network = self.node(id)?.network;
        let size = self.network(network)?.nodes.len();
        if size <= 1 {
            return Ok(false);
        }

        let before = self.network_peripherals(network);
        let node = self.node_mut(id)?;
        let neighbours = mem::take(&mut node.neighbours);
        node.peripherals.clear();
        for neighbour in &neighbours {
            if let Some(neighbour) = self.nodes.get_mut(neighbour.0) {
                neighbour.neighbours.remove(&id);
            }
        }
        if let Some(network) = self.networks.get_mut(network.0) {
            network.nodes.remove(&id);
        }
        let own = NetworkId(self.networks.insert(Network {
            nodes: BTreeSet::from([id]),
        }));
        self.node_mut(id)?.network = own;

        // The rest may have fallen apart. The piece holding the first
        // neighbour keeps the old network.
        let mut pieces = vec![network];
        let mut remaining = neighbours;
        let mut first = true;
        while let Some(&start) = remaining.iter().next() {
            let component = self.reachable_from(start, None).unwrap_or_default();
            remaining.retain(|n| !component.contains(n));
            if mem::take(&mut first) {
                if component.len() == size - 1 {
                    break;
                }
                continue;
            }
            pieces.push(self.detach(network, component));
        }
        if pieces.len() > 1 {
            tracing::debug!(node = %id, pieces = pieces.len(), "removing node split wired network");
        }

        self.broadcast([id], &WiredNetworkChange::removed(before.clone()));
        for piece in pieces {
            let after = self.network_peripherals(piece);
            let nodes = self.network_nodes(piece).unwrap_or_default();
            self.broadcast(nodes, &WiredNetworkChange::between(&before, &after));
        }
        Ok(true)
    }

    /// Replace the peripherals a node exposes.
    pub fn update_peripherals(&mut self, id: NodeId, peripherals: Peripherals<E>) -> Result<()> {
        let network = self.node(id)?.network;
        let before = self.network_peripherals(network);
        self.node_mut(id)?.peripherals = peripherals;
        let after = self.network_peripherals(network);

        let nodes = self.network_nodes(network)?;
        self.broadcast(nodes, &WiredNetworkChange::between(&before, &after));
        Ok(())
    }

    pub fn add_receiver(&mut self, id: NodeId, receiver: Receiver<E>) -> Result<()> {
        self.node_mut(id)?.receivers.push(receiver);
        Ok(())
    }

    /// Returns whether the receiver was attached to the node.
    pub fn remove_receiver(&mut self, id: NodeId, receiver: &Receiver<E>) -> Result<bool> {
        let receivers = &mut self.node_mut(id)?.receivers;
        let before = receivers.len();
        receivers.retain(|r| !Arc::ptr_eq(r, receiver));
        Ok(receivers.len() != before)
    }

    /// Send a packet from `start` to every receiver on its network.
    ///
    /// Packets travel the shortest route along cables. A route crossing into
    /// another level has infinite length and only reaches receivers which
    /// accept interdimensional packets.
    pub fn transmit(
        &self,
        start: NodeId,
        packet: &Packet<E::Payload>,
        range: f64,
        interdimensional: bool,
    ) -> Result<()> {
        let start_node = self.node(start)?;
        let start_point = if start_node.element.level() != packet.sender.level {
            TransmitPoint {
                distance: f64::INFINITY,
                interdimensional: true,
            }
        } else {
            TransmitPoint {
                distance: start_node
                    .element
                    .position()
                    .distance_to(&packet.sender.position),
                interdimensional: false,
            }
        };

        let mut points = BTreeMap::from([(start, start_point)]);
        let mut queue = BinaryHeap::from([Candidate {
            distance: start_point.distance,
            node: start,
        }]);
        while let Some(Candidate { distance, node: id }) = queue.pop() {
            if points.get(&id).is_some_and(|best| distance > best.distance) {
                continue;
            }
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            let level = node.element.level();
            let position = node.element.position();
            for &neighbour_id in &node.neighbours {
                let Some(neighbour) = self.nodes.get(neighbour_id.0) else {
                    continue;
                };
                let next = if neighbour.element.level() != level {
                    TransmitPoint {
                        distance: f64::INFINITY,
                        interdimensional: true,
                    }
                } else {
                    TransmitPoint {
                        distance: distance + position.distance_to(&neighbour.element.position()),
                        interdimensional: false,
                    }
                };

                match points.get_mut(&neighbour_id) {
                    Some(point) if next.distance < point.distance => *point = next,
                    Some(_) => continue,
                    None => {
                        points.insert(neighbour_id, next);
                    }
                }
                queue.push(Candidate {
                    distance: next.distance,
                    node: neighbour_id,
                });
            }
        }

        for (id, point) in points {
            if let Some(node) = self.nodes.get(id.0) {
                node.deliver(packet, point, range, interdimensional);
            }
        }
        Ok(())
    }

    /// Peripherals visible on a network, resolving name clashes by
    /// precedence.
    fn network_peripherals(&self, network: NetworkId) -> Peripherals<E> {
        let mut visible = BTreeMap::new();
        let Some(network) = self.networks.get(network.0) else {
            return visible;
        };
        for id in &network.nodes {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            for (name, peripheral) in &node.peripherals {
                match self.precedence {
                    PeripheralPrecedence::LowestNode => {
                        visible
                            .entry(name.clone())
                            .or_insert_with(|| peripheral.clone());
                    }
                    PeripheralPrecedence::HighestNode => {
                        visible.insert(name.clone(), peripheral.clone());
                    }
                }
            }
        }
        visible
    }

    fn broadcast(
        &mut self,
        nodes: impl IntoIterator<Item = NodeId>,
        change: &WiredNetworkChange<E::Peripheral>,
    ) {
        if change.is_empty() {
            return;
        }
        for id in nodes {
            if let Some(node) = self.nodes.get_mut(id.0) {
                node.element.network_changed(change);
                self.changes.push((id, change.clone()));
            }
        }
    }

    /// Nodes reachable from `start`, or `None` as soon as `target` is found.
    fn reachable_from(&self, start: NodeId, target: Option<NodeId>) -> Option<BTreeSet<NodeId>> {
        let mut reachable = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            for &neighbour in &node.neighbours {
                if Some(neighbour) == target {
                    return None;
                }
                if reachable.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        Some(reachable)
    }

    fn merge(&mut self, a: NetworkId, b: NetworkId) {
        let size = |id: NetworkId| self.networks.get(id.0).map_or(0, |n| n.nodes.len());
        let (into, from) = if size(a) >= size(b) { (a, b) } else { (b, a) };

        let before_into = self.network_peripherals(into);
        let before_from = self.network_peripherals(from);
        let Some(moved) = self.networks.release(from.0) else {
            return;
        };
        let existing = self.network_nodes(into).unwrap_or_default();
        for id in &moved.nodes {
            if let Some(node) = self.nodes.get_mut(id.0) {
                node.network = into;
            }
        }
        if let Some(network) = self.networks.get_mut(into.0) {
            network.nodes.extend(moved.nodes.iter().copied());
        }
        tracing::debug!(
            network = %into,
            joined = moved.nodes.len(),
            existing = existing.len(),
            "merged wired networks"
        );

        let after = self.network_peripherals(into);
        self.broadcast(existing, &WiredNetworkChange::between(&before_into, &after));
        self.broadcast(moved.nodes, &WiredNetworkChange::between(&before_from, &after));
    }

    /// Move `nodes` out of `network` into a new network of their own.
    fn split_off(&mut self, network: NetworkId, nodes: BTreeSet<NodeId>) {
        let before = self.network_peripherals(network);
        let piece = self.detach(network, nodes);
        tracing::debug!(network = %network, piece = %piece, "split wired network");

        for part in [network, piece] {
            let after = self.network_peripherals(part);
            let members = self.network_nodes(part).unwrap_or_default();
            self.broadcast(members, &WiredNetworkChange::between(&before, &after));
        }
    }

    fn detach(&mut self, network: NetworkId, nodes: BTreeSet<NodeId>) -> NetworkId {
        if let Some(network) = self.networks.get_mut(network.0) {
            network.nodes.retain(|id| !nodes.contains(id));
        }
        let ids: Vec<NodeId> = nodes.iter().copied().collect();
        let piece = NetworkId(self.networks.insert(Network { nodes }));
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id.0) {
                node.network = piece;
            }
        }
        piece
    }
}

impl<E: WiredElement> Node<E> {
    fn deliver(&self, packet: &Packet<E::Payload>, point: TransmitPoint, range: f64, interdimensional: bool) {
        for receiver in &self.receivers {
            if !point.interdimensional {
                // Range is symmetric: whichever end has the larger range wins.
                let receive_range = range.max(receiver.range());
                if interdimensional || receiver.is_interdimensional() || point.distance < receive_range {
                    let distance = point.distance + self.element.position().distance_to(&receiver.position());
                    receiver.receive_same_dimension(packet, distance);
                }
            } else if interdimensional || receiver.is_interdimensional() {
                receiver.receive_different_dimension(packet);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TransmitPoint {
    distance: f64,
    interdimensional: bool,
}

/// Min-heap entry for the shortest path search.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    node: NodeId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}
