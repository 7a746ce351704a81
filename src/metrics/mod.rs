pub mod logger;

use crate::topology::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one call to `advance_tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub generated: u64,
    pub delivered: u64,
    pub forwarded: u64,
    pub blocked: u64,
    pub unroutable: u64,
    pub queued: u64,
    pub saturated_links: u64,
}

impl TickReport {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Packets that were in a queue at the start of the forwarding pass.
    pub fn processed(&self) -> u64 {
        self.delivered + self.forwarded + self.blocked + self.unroutable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub id: NodeId,
    pub queue_length: usize,
}

/// A physical link as seen by the dashboard. `current_load` is the sum of both
/// directions, so it may exceed `capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub from: NodeId,
    pub to: NodeId,
    pub capacity: u32,
    pub current_load: u32,
}

impl LinkStatus {
    pub fn is_congested(&self) -> bool {
        self.current_load >= self.capacity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub nodes: BTreeMap<NodeId, NodeStatus>,
    pub links: BTreeMap<String, LinkStatus>,
}

impl StatusSnapshot {
    pub fn total_queued(&self) -> usize {
        self.nodes.values().map(|n| n.queue_length).sum()
    }

    pub fn congested_links(&self) -> impl Iterator<Item = (&String, &LinkStatus)> {
        self.links.iter().filter(|(_, link)| link.is_congested())
    }
}
