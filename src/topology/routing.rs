use super::{NodeId, Topology, TopologyError};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

/// Undirected adjacency view of a [`Topology`], read-only once built.
///
/// Neighbours are stored in the order their links were declared, so the
/// breadth-first search always settles ties the same way.
#[derive(Debug, Clone)]
pub struct RoutingIndex {
    ids: Vec<NodeId>,
    slots: HashMap<NodeId, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl RoutingIndex {
    pub fn new(topology: &Topology) -> Result<Self, TopologyError> {
        topology.validate()?;

        let ids: Vec<NodeId> = topology.node_ids().cloned().collect();
        let slots: HashMap<NodeId, usize> = ids
            .iter()
            .enumerate()
            .map(|(slot, id)| (id.clone(), slot))
            .collect();

        let mut adjacency = vec![Vec::new(); ids.len()];
        for link in &topology.links {
            // validate() guarantees both ends exist
            let (a, b) = (slots[&link.from], slots[&link.to]);
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        Ok(Self {
            ids,
            slots,
            adjacency,
        })
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn slot(&self, id: &str) -> Result<usize, RoutingError> {
        self.slots
            .get(id)
            .copied()
            .ok_or_else(|| RoutingError::UnknownNode(NodeId::from(id)))
    }

    pub fn neighbors(&self, id: &str) -> Result<Vec<&NodeId>, RoutingError> {
        let slot = self.slot(id)?;
        Ok(self.adjacency[slot].iter().map(|&n| &self.ids[n]).collect())
    }

    /// A shortest path from `start` to `end`, both ends included.
    ///
    /// `Ok(None)` when the two nodes are disconnected or identical.
    pub fn shortest_path(&self, start: &str, end: &str) -> Result<Option<Vec<NodeId>>, RoutingError> {
        let from = self.slot(start)?;
        let to = self.slot(end)?;
        Ok(self
            .path_between(from, to)
            .map(|path| path.into_iter().map(|slot| self.ids[slot].clone()).collect()))
    }

    pub(crate) fn path_between(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        if from == to {
            return None;
        }

        let mut parent: Vec<Option<usize>> = vec![None; self.ids.len()];
        let mut visited = vec![false; self.ids.len()];
        let mut frontier = VecDeque::from([from]);
        visited[from] = true;

        while let Some(node) = frontier.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(prev) = parent[cursor] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    parent[next] = Some(node);
                    frontier.push_back(next);
                }
            }
        }

        None
    }

    /// Second node on the shortest path, if there is one.
    pub(crate) fn next_hop(&self, from: usize, to: usize) -> Option<usize> {
        self.path_between(from, to)
            .filter(|path| path.len() >= 2)
            .map(|path| path[1])
    }
}
