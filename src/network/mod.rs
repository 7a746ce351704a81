pub mod packet;

pub use packet::{Packet, PacketId};

use crate::topology::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub traffic_generation_rate: u32,
    pub queue: VecDeque<Packet>,
}

impl Node {
    pub fn new(id: NodeId, traffic_generation_rate: u32) -> Self {
        Self {
            id,
            traffic_generation_rate,
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectedLinkId {
    pub from: NodeId,
    pub to: NodeId,
}

impl DirectedLinkId {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for DirectedLinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// One direction of a physical link. `current_load` counts packets forwarded
/// during the current tick and never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: DirectedLinkId,
    pub capacity: u32,
    current_load: u32,
}

impl Link {
    pub fn new(id: DirectedLinkId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            current_load: 0,
        }
    }

    pub fn current_load(&self) -> u32 {
        self.current_load
    }

    pub fn is_saturated(&self) -> bool {
        self.current_load >= self.capacity
    }

    pub fn reset(&mut self) {
        self.current_load = 0;
    }

    /// Claims one unit of this tick's capacity. Returns false once saturated.
    pub fn try_reserve(&mut self) -> bool {
        if self.is_saturated() {
            return false;
        }
        self.current_load += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_refuses_past_capacity() {
        let mut link = Link::new(DirectedLinkId::new("A", "B"), 2);
        assert!(link.try_reserve());
        assert!(link.try_reserve());
        assert!(!link.try_reserve());
        assert_eq!(link.current_load(), 2);
        assert!(link.is_saturated());

        link.reset();
        assert_eq!(link.current_load(), 0);
        assert!(!link.is_saturated());
    }

    #[test]
    fn reversed_link_id() {
        let id = DirectedLinkId::new("A", "B");
        assert_eq!(id.reversed(), DirectedLinkId::new("B", "A"));
        assert_eq!(id.to_string(), "A->B");
    }
}
