use crate::{
    err::{Error, Result},
    population::{EdgePopulation, NodePopulation},
    reader::{EdgeTable, NodeTable},
    Map,
};
use std::{fmt::Debug, sync::Arc};

/// Key under which `from_config` looks up its adaptors.
pub const DEFAULT_FORMAT: &str = "sonata";

pub trait NodeAdaptor: Debug {
    fn adapt(&self, table: NodeTable) -> Result<Box<dyn NodePopulation>>;
}

pub trait EdgeAdaptor: Debug {
    fn adapt(&self, table: EdgeTable) -> Result<Box<dyn EdgePopulation>>;
}

#[derive(Debug, Default, Clone)]
pub struct AdaptorRegistry {
    nodes: Map<String, Arc<dyn NodeAdaptor>>,
    edges: Map<String, Arc<dyn EdgeAdaptor>>,
}

impl AdaptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_nodes(&mut self, name: &str, adaptor: Arc<dyn NodeAdaptor>) {
        self.nodes.insert(name.to_string(), adaptor);
    }

    pub fn register_edges(&mut self, name: &str, adaptor: Arc<dyn EdgeAdaptor>) {
        self.edges.insert(name.to_string(), adaptor);
    }

    pub fn node_adaptor(&self, name: &str) -> Result<Arc<dyn NodeAdaptor>> {
        self.nodes.get(name).cloned().ok_or_else(|| Error::UnknownAdaptor {
            kind: "node",
            name: name.to_string(),
        })
    }

    pub fn edge_adaptor(&self, name: &str) -> Result<Arc<dyn EdgeAdaptor>> {
        self.edges.get(name).cloned().ok_or_else(|| Error::UnknownAdaptor {
            kind: "edge",
            name: name.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
