use crate::{err::Result, network::Network};
use serde_json::Value;
use std::fmt::Debug;

/// node id within its population
pub type NodeId = u64;

/// Whether an edge population is internal to the network or feeds it from
/// virtual (spike source) nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Both ends are simulated.
    Recurrent,
    /// Source population holds only virtual nodes.
    Virtual,
}

impl ConnectionType {
    /// Classify a connection between two registered populations.
    ///
    /// Targets consisting only of virtual nodes never get this far; the
    /// network rejects them.
    pub fn between(src: &dyn NodePopulation, trg: &dyn NodePopulation) -> Self {
        if src.virtual_nodes_only() || trg.virtual_nodes_only() {
            ConnectionType::Virtual
        } else {
            ConnectionType::Recurrent
        }
    }
}

pub trait NodePopulation: Debug {
    /// Unique across the network.
    fn name(&self) -> &str;
    /// Members, in population order.
    fn node_ids(&self) -> &[NodeId];
    fn size(&self) -> usize {
        self.node_ids().len()
    }
    /// Virtual and non-virtual nodes side by side.
    fn mixed_nodes(&self) -> bool;
    /// Only virtual nodes, ie never a synaptic target.
    fn virtual_nodes_only(&self) -> bool;
    /// Attribute of one member; `None` if the node or the key is unknown.
    fn attribute(&self, node_id: NodeId, key: &str) -> Option<Value>;
    /// Called once by the network, before the population is registered.
    fn initialize(&mut self, network: &Network) -> Result<()>;
}

pub trait EdgePopulation: Debug {
    fn name(&self) -> &str;
    /// Name of the source node population.
    fn source_nodes(&self) -> &str;
    /// Name of the target node population.
    fn target_nodes(&self) -> &str;
    /// `None` until the network called `set_connection_type`.
    fn connection_type(&self) -> Option<ConnectionType>;
    fn recurrent_connections(&self) -> bool {
        self.connection_type() == Some(ConnectionType::Recurrent)
    }
    fn virtual_connections(&self) -> bool {
        self.connection_type() == Some(ConnectionType::Virtual)
    }
    /// Called once by the network, before the endpoints are checked.
    fn initialize(&mut self, network: &Network) -> Result<()>;
    /// Hand over the resolved endpoints.
    fn set_connection_type(&mut self, src: &dyn NodePopulation, trg: &dyn NodePopulation);
}
