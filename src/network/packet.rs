use crate::topology::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PacketId(u64);

impl PacketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt-{}", self.0)
    }
}

/// A packet never targets the node that generated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub source: NodeId,
    pub destination: NodeId,
}

impl Packet {
    pub fn new(id: PacketId, source: NodeId, destination: NodeId) -> Self {
        debug_assert_ne!(source, destination);
        Self {
            id,
            source,
            destination,
        }
    }
}
