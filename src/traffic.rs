use crate::topology::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Picks the destination of each generated packet.
///
/// `candidates` is every node except `source`, in declaration order, and is
/// never empty. The returned value is an index into it; the engine wraps
/// out-of-range indices.
pub trait DestinationSource: Send {
    fn choose(&mut self, source: &NodeId, candidates: &[NodeId]) -> usize;
}

/// Uniform choice over the candidates.
#[derive(Debug)]
pub struct RandomDestinations {
    rng: StdRng,
}

impl RandomDestinations {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl DestinationSource for RandomDestinations {
    fn choose(&mut self, _source: &NodeId, candidates: &[NodeId]) -> usize {
        self.rng.gen_range(0..candidates.len())
    }
}

/// Replays a fixed list of destinations, cycling once exhausted. Entries that
/// are not valid for the current source (the source itself, unknown ids) are
/// skipped.
#[derive(Debug, Clone)]
pub struct ScriptedDestinations {
    script: VecDeque<NodeId>,
}

impl ScriptedDestinations {
    pub fn new<I, T>(script: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
        }
    }
}

impl DestinationSource for ScriptedDestinations {
    fn choose(&mut self, _source: &NodeId, candidates: &[NodeId]) -> usize {
        for _ in 0..self.script.len() {
            let Some(next) = self.script.pop_front() else {
                break;
            };
            let position = candidates.iter().position(|c| *c == next);
            self.script.push_back(next);
            if let Some(position) = position {
                return position;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[&str]) -> Vec<NodeId> {
        ids.iter().map(|&id| NodeId::from(id)).collect()
    }

    #[test]
    fn seeded_sources_repeat() {
        let others = candidates(&["B", "C", "D"]);
        let source = NodeId::from("A");
        let mut first = RandomDestinations::seeded(7);
        let mut second = RandomDestinations::seeded(7);
        for _ in 0..50 {
            let pick = first.choose(&source, &others);
            assert!(pick < others.len());
            assert_eq!(pick, second.choose(&source, &others));
        }
    }

    #[test]
    fn script_cycles_and_skips_invalid_entries() {
        let others = candidates(&["B", "C"]);
        let source = NodeId::from("A");
        let mut script = ScriptedDestinations::new(["C", "A", "B"]);

        assert_eq!(script.choose(&source, &others), 1);
        // "A" is not a candidate, so "B" is used
        assert_eq!(script.choose(&source, &others), 0);
        assert_eq!(script.choose(&source, &others), 1);
    }

    #[test]
    fn empty_script_falls_back_to_first_candidate() {
        let mut script = ScriptedDestinations::new(Vec::<NodeId>::new());
        assert_eq!(script.choose(&NodeId::from("A"), &candidates(&["B"])), 0);
    }
}
