pub mod routing;

pub use routing::{RoutingError, RoutingIndex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Lets maps keyed by NodeId be queried with a plain &str.
impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub traffic_generation_rate: u32,
}

/// A physical link. Routing treats it as traversable both ways and the engine
/// gives each direction its own `capacity` budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub from: NodeId,
    pub to: NodeId,
    pub capacity: u32,
}

impl LinkSpec {
    /// The `"from-to"` key used by the status snapshot.
    pub fn key(&self) -> String {
        format!("{}-{}", self.from, self.to)
    }

    fn connects(&self, a: &NodeId, b: &NodeId) -> bool {
        (&self.from == a && &self.to == b) || (&self.from == b && &self.to == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("node {0} is declared more than once")]
    DuplicateNode(NodeId),

    #[error("link {link} references unknown node {node}")]
    UnknownNode { link: String, node: NodeId },

    #[error("link {0} connects a node to itself")]
    SelfLoop(String),

    #[error("link {0} has zero capacity")]
    ZeroCapacity(String),

    #[error("link {0} is declared more than once")]
    DuplicateLink(String),

    #[error("node {0} generates traffic but has no other node to send it to")]
    NoDestinations(NodeId),
}

/// Static network description: nodes with their generation rates and the
/// links between them, both kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::reference()
    }
}

impl Topology {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Five node mesh the simulator ships with.
    pub fn reference() -> Self {
        Self::empty()
            .with_node("A", 50)
            .with_node("B", 30)
            .with_node("C", 40)
            .with_node("D", 20)
            .with_node("E", 60)
            .with_link("A", "B", 100)
            .with_link("A", "C", 80)
            .with_link("B", "D", 70)
            .with_link("C", "D", 90)
            .with_link("C", "E", 100)
            .with_link("D", "E", 60)
    }

    pub fn with_node(mut self, id: impl Into<NodeId>, traffic_generation_rate: u32) -> Self {
        self.nodes.push(NodeSpec {
            id: id.into(),
            traffic_generation_rate,
        });
        self
    }

    pub fn with_link(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>, capacity: u32) -> Self {
        self.links.push(LinkSpec {
            from: from.into(),
            to: to.into(),
            capacity,
        });
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology from {}", path.display()))?;
        let topology: Topology = serde_json::from_str(&content)
            .with_context(|| format!("parsing topology in {}", path.display()))?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|node| &node.id)
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(TopologyError::DuplicateNode(node.id.clone()));
            }
        }

        if self.nodes.len() < 2 {
            if let Some(node) = self.nodes.iter().find(|n| n.traffic_generation_rate > 0) {
                return Err(TopologyError::NoDestinations(node.id.clone()));
            }
        }

        for (i, link) in self.links.iter().enumerate() {
            for end in [&link.from, &link.to] {
                if !seen.contains(end) {
                    return Err(TopologyError::UnknownNode {
                        link: link.key(),
                        node: end.clone(),
                    });
                }
            }
            if link.from == link.to {
                return Err(TopologyError::SelfLoop(link.key()));
            }
            if link.capacity == 0 {
                return Err(TopologyError::ZeroCapacity(link.key()));
            }
            if self.links[..i].iter().any(|l| l.connects(&link.from, &link.to)) {
                return Err(TopologyError::DuplicateLink(link.key()));
            }
        }

        Ok(())
    }
}
