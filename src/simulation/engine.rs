//! Tick-driven packet forwarding over a fixed topology.
//!
//! Every tick runs three passes: directed link loads are reset, each node
//! forwards the packets it held when the tick began (one hop at most), then
//! each node generates its new traffic. Packets that cannot move are kept at
//! the head of their queue so they go out before later arrivals.

use crate::metrics::{LinkStatus, NodeStatus, StatusSnapshot, TickReport};
use crate::network::{DirectedLinkId, Link, Node, Packet, PacketId};
use crate::topology::{LinkSpec, NodeId, RoutingIndex, Topology, TopologyError};
use crate::traffic::DestinationSource;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("packet at {0} cannot be addressed to itself")]
    SameEndpoints(NodeId),
}

/// Next node and the directed link that reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hop {
    node: usize,
    link: usize,
}

pub struct Engine {
    nodes: Vec<Node>,
    links: Vec<Link>,
    link_slots: HashMap<DirectedLinkId, usize>,
    declared: Vec<LinkSpec>,
    routing: RoutingIndex,
    // routes[from][to], fixed for the engine's lifetime
    routes: Vec<Vec<Option<Hop>>>,
    destinations: Vec<Vec<NodeId>>,
    source: Box<dyn DestinationSource>,
    next_packet: u64,
    tick: u64,
}

impl Engine {
    pub fn new(topology: &Topology, source: Box<dyn DestinationSource>) -> Result<Self, TopologyError> {
        let routing = RoutingIndex::new(topology)?;

        let nodes: Vec<Node> = topology
            .nodes
            .iter()
            .map(|spec| Node::new(spec.id.clone(), spec.traffic_generation_rate))
            .collect();

        let mut links = Vec::with_capacity(topology.links.len() * 2);
        let mut link_slots = HashMap::new();
        for spec in &topology.links {
            let forward = DirectedLinkId::new(spec.from.clone(), spec.to.clone());
            let reverse = forward.reversed();
            for id in [forward, reverse] {
                link_slots.insert(id.clone(), links.len());
                links.push(Link::new(id, spec.capacity));
            }
        }

        let ids = routing.ids();
        let routes: Vec<Vec<Option<Hop>>> = (0..ids.len())
            .map(|from| {
                (0..ids.len())
                    .map(|to| {
                        routing.next_hop(from, to).map(|node| Hop {
                            node,
                            link: link_slots[&DirectedLinkId::new(ids[from].clone(), ids[node].clone())],
                        })
                    })
                    .collect()
            })
            .collect();

        let destinations: Vec<Vec<NodeId>> = ids
            .iter()
            .map(|id| ids.iter().filter(|other| *other != id).cloned().collect())
            .collect();

        debug!(
            "Engine initialised with {} nodes and {} directed links",
            nodes.len(),
            links.len()
        );

        Ok(Self {
            nodes,
            links,
            link_slots,
            declared: topology.links.clone(),
            routing,
            routes,
            destinations,
            source,
            next_packet: 0,
            tick: 0,
        })
    }

    pub fn advance_tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::new(self.tick);

        for link in &mut self.links {
            link.reset();
        }

        // Every queue is taken before any node forwards, so a packet moves at
        // most one hop per tick whatever the node order.
        let pending: Vec<VecDeque<Packet>> = self
            .nodes
            .iter_mut()
            .map(|node| std::mem::take(&mut node.queue))
            .collect();

        for (slot, queue) in pending.into_iter().enumerate() {
            let mut held = VecDeque::new();

            for packet in queue {
                let Ok(target) = self.routing.slot(packet.destination.as_str()) else {
                    // enqueue paths only admit known destinations
                    report.unroutable += 1;
                    held.push_back(packet);
                    continue;
                };

                if target == slot {
                    report.delivered += 1;
                    continue;
                }

                let route = self.routes[slot][target];
                match route {
                    None => {
                        report.unroutable += 1;
                        held.push_back(packet);
                    }
                    Some(hop) if self.links[hop.link].try_reserve() => {
                        report.forwarded += 1;
                        self.nodes[hop.node].queue.push_back(packet);
                    }
                    Some(_) => {
                        report.blocked += 1;
                        held.push_back(packet);
                    }
                }
            }

            let arrivals = std::mem::take(&mut self.nodes[slot].queue);
            held.extend(arrivals);
            self.nodes[slot].queue = held;
        }

        for slot in 0..self.nodes.len() {
            for _ in 0..self.nodes[slot].traffic_generation_rate {
                let packet = self.generate(slot);
                self.nodes[slot].queue.push_back(packet);
                report.generated += 1;
            }
        }

        report.queued = self.total_queued() as u64;
        report.saturated_links = self.links.iter().filter(|l| l.is_saturated()).count() as u64;
        report
    }

    fn generate(&mut self, slot: usize) -> Packet {
        let source = &self.nodes[slot].id;
        let candidates = &self.destinations[slot];
        let pick = self.source.choose(source, candidates) % candidates.len();
        let (source, destination) = (source.clone(), candidates[pick].clone());
        Packet::new(self.allocate_id(), source, destination)
    }

    fn allocate_id(&mut self) -> PacketId {
        let id = PacketId::new(self.next_packet);
        self.next_packet += 1;
        id
    }

    /// Queues a new packet at `at` addressed to `destination`, behind anything
    /// already waiting there.
    pub fn inject(&mut self, at: &str, destination: &str) -> Result<PacketId, EnqueueError> {
        let slot = self
            .routing
            .slot(at)
            .map_err(|_| EnqueueError::UnknownNode(NodeId::from(at)))?;
        let target = self
            .routing
            .slot(destination)
            .map_err(|_| EnqueueError::UnknownNode(NodeId::from(destination)))?;
        if slot == target {
            return Err(EnqueueError::SameEndpoints(NodeId::from(at)));
        }

        let id = self.allocate_id();
        let source = self.nodes[slot].id.clone();
        let destination = self.nodes[target].id.clone();
        self.nodes[slot].queue.push_back(Packet::new(id, source, destination));
        Ok(id)
    }

    pub fn status(&self) -> StatusSnapshot {
        let nodes: BTreeMap<NodeId, NodeStatus> = self
            .nodes
            .iter()
            .map(|node| {
                (
                    node.id.clone(),
                    NodeStatus {
                        id: node.id.clone(),
                        queue_length: node.queue.len(),
                    },
                )
            })
            .collect();

        let links: BTreeMap<String, LinkStatus> = self
            .declared
            .iter()
            .map(|spec| {
                let forward = self.link_load(spec.from.as_str(), spec.to.as_str()).unwrap_or(0);
                let reverse = self.link_load(spec.to.as_str(), spec.from.as_str()).unwrap_or(0);
                let current_load = forward + reverse;
                (
                    spec.key(),
                    LinkStatus {
                        from: spec.from.clone(),
                        to: spec.to.clone(),
                        capacity: spec.capacity,
                        current_load,
                    },
                )
            })
            .collect();

        StatusSnapshot { nodes, links }
    }

    /// Packets forwarded `from -> to` during the last tick. `None` when no
    /// link joins the two nodes.
    pub fn link_load(&self, from: &str, to: &str) -> Option<u32> {
        self.link(&DirectedLinkId::new(from, to)).map(Link::current_load)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: &DirectedLinkId) -> Option<&Link> {
        self.link_slots.get(id).map(|&slot| &self.links[slot])
    }

    pub fn queue(&self, node: &str) -> Option<&VecDeque<Packet>> {
        let slot = self.routing.slot(node).ok()?;
        Some(&self.nodes[slot].queue)
    }

    pub fn total_queued(&self) -> usize {
        self.nodes.iter().map(|node| node.queue.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::{RandomDestinations, ScriptedDestinations};
    use std::collections::HashSet;

    fn quiet(topology: Topology) -> Engine {
        Engine::new(&topology, Box::new(ScriptedDestinations::new(Vec::<NodeId>::new()))).unwrap()
    }

    fn silent_reference() -> Topology {
        let mut topology = Topology::reference();
        for node in &mut topology.nodes {
            node.traffic_generation_rate = 0;
        }
        topology
    }

    fn pair(capacity: u32) -> Topology {
        Topology::empty()
            .with_node("A", 0)
            .with_node("B", 0)
            .with_link("A", "B", capacity)
    }

    fn line() -> Topology {
        Topology::empty()
            .with_node("A", 0)
            .with_node("B", 0)
            .with_node("C", 0)
            .with_link("A", "B", 10)
            .with_link("B", "C", 10)
    }

    #[test]
    fn builds_two_directed_links_per_definition() {
        let engine = quiet(Topology::reference());
        assert_eq!(engine.links().len(), 12);
        let forward = engine.link(&DirectedLinkId::new("A", "B")).unwrap();
        let reverse = engine.link(&DirectedLinkId::new("B", "A")).unwrap();
        assert_eq!(forward.capacity, 100);
        assert_eq!(reverse.capacity, 100);
        assert_eq!(forward.current_load(), 0);
        assert_eq!(engine.total_queued(), 0);
    }

    #[test]
    fn saturated_link_holds_back_packets_in_order() {
        let mut engine = quiet(pair(1));
        let ids: Vec<PacketId> = (0..3).map(|_| engine.inject("A", "B").unwrap()).collect();

        let report = engine.advance_tick();

        let at_b: Vec<PacketId> = engine.queue("B").unwrap().iter().map(|p| p.id).collect();
        let at_a: Vec<PacketId> = engine.queue("A").unwrap().iter().map(|p| p.id).collect();
        assert_eq!(at_b, vec![ids[0]]);
        assert_eq!(at_a, vec![ids[1], ids[2]]);
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.blocked, 2);
        assert_eq!(engine.link(&DirectedLinkId::new("A", "B")).unwrap().current_load(), 1);
    }

    #[test]
    fn directions_do_not_share_capacity() {
        let mut engine = quiet(pair(1));
        engine.inject("A", "B").unwrap();
        engine.inject("B", "A").unwrap();

        let report = engine.advance_tick();
        assert_eq!(report.forwarded, 2);
        assert_eq!(report.blocked, 0);

        let status = engine.status();
        let link = &status.links["A-B"];
        assert_eq!(link.current_load, 2);
        assert_eq!(link.capacity, 1);
    }

    #[test]
    fn packets_advance_one_hop_per_tick() {
        let mut engine = quiet(line());
        let id = engine.inject("A", "C").unwrap();

        engine.advance_tick();
        assert_eq!(engine.queue("B").unwrap().front().map(|p| p.id), Some(id));
        assert!(engine.queue("C").unwrap().is_empty());

        engine.advance_tick();
        assert_eq!(engine.queue("C").unwrap().front().map(|p| p.id), Some(id));

        let report = engine.advance_tick();
        assert_eq!(report.delivered, 1);
        assert_eq!(engine.total_queued(), 0);
    }

    #[test]
    fn arriving_packet_is_delivered_next_tick() {
        // B is processed after A, yet the packet forwarded into B is not
        // consumed until the following tick
        let mut engine = quiet(pair(5));
        engine.inject("A", "B").unwrap();

        let first = engine.advance_tick();
        assert_eq!(first.delivered, 0);
        assert_eq!(engine.queue("B").unwrap().len(), 1);

        let second = engine.advance_tick();
        assert_eq!(second.delivered, 1);
        assert_eq!(second.forwarded, 0);
        assert!(engine.queue("B").unwrap().is_empty());
    }

    #[test]
    fn blocked_packets_stay_ahead_of_arrivals() {
        // C is processed first and forwards into B before B's own traffic to
        // A hits the capacity-1 link
        let topology = Topology::empty()
            .with_node("C", 0)
            .with_node("B", 0)
            .with_node("A", 0)
            .with_link("A", "B", 1)
            .with_link("B", "C", 5);
        let mut engine = quiet(topology);
        let first = engine.inject("B", "A").unwrap();
        let second = engine.inject("B", "A").unwrap();
        let incoming = engine.inject("C", "A").unwrap();

        engine.advance_tick();

        let at_b: Vec<PacketId> = engine.queue("B").unwrap().iter().map(|p| p.id).collect();
        assert_eq!(at_b, vec![second, incoming]);
        assert_eq!(engine.queue("A").unwrap().front().map(|p| p.id), Some(first));
    }

    #[test]
    fn unreachable_destination_waits_forever() {
        let topology = Topology::empty()
            .with_node("A", 0)
            .with_node("B", 0)
            .with_node("C", 0)
            .with_link("A", "B", 3);
        let mut engine = quiet(topology);
        let id = engine.inject("A", "C").unwrap();

        for _ in 0..25 {
            let report = engine.advance_tick();
            assert_eq!(report.unroutable, 1);
        }
        let queue = engine.queue("A").unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, id);
    }

    #[test]
    fn generation_adds_rate_packets_to_the_tail() {
        let topology = Topology::empty()
            .with_node("A", 4)
            .with_node("B", 0)
            .with_node("C", 0);
        let mut engine = Engine::new(&topology, Box::new(RandomDestinations::seeded(11))).unwrap();

        let report = engine.advance_tick();
        assert_eq!(report.generated, 4);

        let queue = engine.queue("A").unwrap();
        assert_eq!(queue.len(), 4);
        assert!(queue.iter().all(|p| p.source.as_str() == "A" && p.destination.as_str() != "A"));

        let ids: HashSet<PacketId> = queue.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn scripted_destinations_drive_generation() {
        let topology = Topology::empty()
            .with_node("A", 2)
            .with_node("B", 0)
            .with_node("C", 0)
            .with_link("A", "B", 10)
            .with_link("B", "C", 10);
        let mut engine =
            Engine::new(&topology, Box::new(ScriptedDestinations::new(["C", "B"]))).unwrap();

        engine.advance_tick();
        let destinations: Vec<&str> = engine
            .queue("A")
            .unwrap()
            .iter()
            .map(|p| p.destination.as_str())
            .collect();
        assert_eq!(destinations, vec!["C", "B"]);
    }

    #[test]
    fn inject_rejects_bad_endpoints() {
        let mut engine = quiet(pair(1));
        assert_eq!(
            engine.inject("A", "A"),
            Err(EnqueueError::SameEndpoints("A".into()))
        );
        assert_eq!(
            engine.inject("Z", "A"),
            Err(EnqueueError::UnknownNode("Z".into()))
        );
        assert_eq!(
            engine.inject("A", "Z"),
            Err(EnqueueError::UnknownNode("Z".into()))
        );
        assert_eq!(engine.total_queued(), 0);
    }

    #[test]
    fn status_reports_queue_lengths_and_declared_links() {
        let mut engine = quiet(silent_reference());
        engine.inject("A", "E").unwrap();
        engine.inject("A", "E").unwrap();

        let before = engine.status();
        assert_eq!(before.nodes["A"].queue_length, 2);
        assert_eq!(before.links.len(), 6);
        assert!(before.links.contains_key("C-E"));
        assert!(!before.links.contains_key("E-C"));

        engine.advance_tick();
        let after = engine.status();
        assert_eq!(after.nodes["C"].queue_length, 2);
        assert_eq!(after.links["A-C"].current_load, 2);
        assert_eq!(after.links["A-B"].current_load, 0);
        // status is a pure read
        assert_eq!(engine.status(), after);
    }

    #[test]
    fn link_load_is_per_direction() {
        let mut engine = quiet(pair(4));
        engine.inject("A", "B").unwrap();
        engine.inject("A", "B").unwrap();
        engine.inject("B", "A").unwrap();
        engine.advance_tick();

        assert_eq!(engine.link_load("A", "B"), Some(2));
        assert_eq!(engine.link_load("B", "A"), Some(1));
        assert_eq!(engine.status().links["A-B"].current_load, 3);
        assert_eq!(engine.link_load("A", "Z"), None);
        assert_eq!(engine.link_load("A", "A"), None);
    }

    #[test]
    fn loads_reset_every_tick() {
        let mut engine = quiet(pair(3));
        engine.inject("A", "B").unwrap();
        engine.advance_tick();
        assert_eq!(engine.status().links["A-B"].current_load, 1);

        engine.advance_tick();
        assert_eq!(engine.status().links["A-B"].current_load, 0);
        assert_eq!(engine.tick(), 2);
    }
}
