pub mod topology;
pub mod network;
pub mod traffic;
pub mod metrics;
pub mod simulation;
pub mod server;

pub use topology::{Topology, RoutingIndex};
pub use simulation::{Engine, Simulation, SimConfig, SharedEngine};
pub use metrics::{StatusSnapshot, TickReport};

pub mod prelude {
    pub use crate::topology::{NodeId, Topology, RoutingIndex, RoutingError, TopologyError};
    pub use crate::network::{Packet, PacketId};
    pub use crate::traffic::{DestinationSource, RandomDestinations, ScriptedDestinations};
    pub use crate::simulation::{Engine, EnqueueError, Simulation, SimConfig, SharedEngine};
    pub use crate::metrics::{StatusSnapshot, TickReport};
}
