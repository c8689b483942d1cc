use std::{path::PathBuf, sync::Arc};

use crate::{
    adaptor::{AdaptorRegistry, EdgeAdaptor, NodeAdaptor, DEFAULT_FORMAT},
    err::{anyhow, Result},
    network::Network,
    population::{ConnectionType, EdgePopulation, NodeId, NodePopulation},
    reader::{Attribute, EdgeTable, EdgeType, NodeTable, NodeType},
    Map,
};
use serde_json::Value;

/// Component holding the `dynamics_params` files of a model type.
///
/// * biophysical  -> biophysical_neuron_models_dir
/// * point_neuron -> point_neuron_models_dir
/// * anything else -> <model_type>_models_dir
fn models_dir(model_type: &str) -> String {
    match model_type {
        "biophysical" => String::from("biophysical_neuron_models_dir"),
        other => format!("{other}_models_dir"),
    }
}

const SYNAPTIC_MODELS_DIR: &str = "synaptic_models_dir";

/// A node population following SONATA conventions: every node references a
/// node type, node level attributes override type level ones.
#[derive(Debug)]
pub struct SonataNodes {
    name: String,
    node_ids: Vec<NodeId>,
    type_ids: Vec<u64>,
    attributes: Vec<Map<String, Attribute>>,
    types: Map<u64, NodeType>,
    /// node id -> row
    index: Map<NodeId, usize>,
    n_virtual: usize,
    /// node type id -> resolved dynamics_params file, filled by `initialize`
    pub dynamics_params: Map<u64, PathBuf>,
}

impl SonataNodes {
    pub fn new(table: NodeTable) -> Result<Self> {
        let NodeTable {
            name,
            node_ids,
            type_ids,
            mut attributes,
            types,
        } = table;
        let size = node_ids.len();
        if size != type_ids.len() {
            return Err(anyhow!("Population {name} has mismatched #node_ids ./. #type_ids").into());
        }
        if attributes.is_empty() {
            attributes.resize_with(size, Map::new);
        } else if attributes.len() != size {
            return Err(anyhow!("Population {name} has mismatched #node_ids ./. #attributes").into());
        }
        let types = types
            .into_iter()
            .map(|ty| (ty.type_id, ty))
            .collect::<Map<_, _>>();
        let mut index = Map::new();
        let mut n_virtual = 0;
        for (row, (id, ty)) in node_ids.iter().zip(type_ids.iter()).enumerate() {
            let ty = types
                .get(ty)
                .ok_or_else(|| anyhow!("Couldn't find node type {ty} in population {name}"))?;
            if ty.is_virtual() {
                n_virtual += 1;
            }
            if index.insert(*id, row).is_some() {
                return Err(anyhow!("Node id {id} appears twice in population {name}").into());
            }
        }
        Ok(Self {
            name,
            node_ids,
            type_ids,
            attributes,
            types,
            index,
            n_virtual,
            dynamics_params: Map::new(),
        })
    }

    pub fn node_type(&self, node_id: NodeId) -> Option<&NodeType> {
        let row = *self.index.get(&node_id)?;
        self.types.get(&self.type_ids[row])
    }

    pub fn is_virtual(&self, node_id: NodeId) -> bool {
        self.node_type(node_id).is_some_and(NodeType::is_virtual)
    }
}

impl NodePopulation for SonataNodes {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    fn mixed_nodes(&self) -> bool {
        self.n_virtual > 0 && self.n_virtual < self.node_ids.len()
    }

    fn virtual_nodes_only(&self) -> bool {
        self.n_virtual > 0 && self.n_virtual == self.node_ids.len()
    }

    fn attribute(&self, node_id: NodeId, key: &str) -> Option<Value> {
        let row = *self.index.get(&node_id)?;
        let ty = self.types.get(&self.type_ids[row])?;
        match key {
            "node_type_id" => Some(Value::from(ty.type_id)),
            "model_type" => Some(Value::from(ty.model_type.as_str())),
            _ => self.attributes[row]
                .get(key)
                .or_else(|| ty.attributes.get(key))
                .map(Value::from),
        }
    }

    fn initialize(&mut self, network: &Network) -> Result<()> {
        for ty in self.types.values() {
            if ty.is_virtual() {
                continue;
            }
            if let Some(Attribute::String(file)) = ty.attributes.get("dynamics_params") {
                let dir = network.get_component(&models_dir(&ty.model_type))?;
                self.dynamics_params
                    .insert(ty.type_id, PathBuf::from(dir).join(file));
            }
        }
        Ok(())
    }
}

/// Edge population following SONATA conventions: a sparse table of
/// (source, target) pairs, each referencing an edge type.
#[derive(Debug)]
pub struct SonataEdges {
    name: String,
    source_pop: String,
    target_pop: String,
    type_ids: Vec<u64>,
    source_ids: Vec<NodeId>,
    target_ids: Vec<NodeId>,
    attributes: Vec<Map<String, Attribute>>,
    types: Map<u64, EdgeType>,
    connection_type: Option<ConnectionType>,
    /// edge type id -> resolved dynamics_params file, filled by `initialize`
    pub dynamics_params: Map<u64, PathBuf>,
}

impl SonataEdges {
    pub fn new(table: EdgeTable) -> Result<Self> {
        let EdgeTable {
            name,
            source_pop,
            target_pop,
            type_ids,
            source_ids,
            target_ids,
            mut attributes,
            types,
        } = table;
        let size = type_ids.len();
        if size != source_ids.len() {
            return Err(anyhow!("Population {name} has mismatched #type_ids ./. #source_ids").into());
        }
        if size != target_ids.len() {
            return Err(anyhow!("Population {name} has mismatched #type_ids ./. #target_ids").into());
        }
        if attributes.is_empty() {
            attributes.resize_with(size, Map::new);
        } else if attributes.len() != size {
            return Err(anyhow!("Population {name} has mismatched #type_ids ./. #attributes").into());
        }
        let types = types
            .into_iter()
            .map(|ty| (ty.type_id, ty))
            .collect::<Map<_, _>>();
        if let Some(ty) = type_ids.iter().find(|ty| !types.contains_key(ty)) {
            return Err(anyhow!("Couldn't find edge type {ty} in population {name}").into());
        }
        Ok(Self {
            name,
            source_pop,
            target_pop,
            type_ids,
            source_ids,
            target_ids,
            attributes,
            types,
            connection_type: None,
            dynamics_params: Map::new(),
        })
    }

    pub fn size(&self) -> usize {
        self.type_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.type_ids.is_empty()
    }

    /// (source node id, target node id) in file order
    pub fn connections(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.source_ids
            .iter()
            .copied()
            .zip(self.target_ids.iter().copied())
    }

    /// Attribute of the edge at `index`; edge level values override the type.
    pub fn attribute(&self, index: usize, key: &str) -> Option<Value> {
        let ty = self.types.get(self.type_ids.get(index)?)?;
        match key {
            "edge_type_id" => Some(Value::from(ty.type_id)),
            _ => self.attributes[index]
                .get(key)
                .or_else(|| ty.attributes.get(key))
                .map(Value::from),
        }
    }
}

impl EdgePopulation for SonataEdges {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_nodes(&self) -> &str {
        &self.source_pop
    }

    fn target_nodes(&self) -> &str {
        &self.target_pop
    }

    fn connection_type(&self) -> Option<ConnectionType> {
        self.connection_type
    }

    fn initialize(&mut self, network: &Network) -> Result<()> {
        for ty in self.types.values() {
            if let Some(Attribute::String(file)) = ty.attributes.get("dynamics_params") {
                let dir = network.get_component(SYNAPTIC_MODELS_DIR)?;
                self.dynamics_params
                    .insert(ty.type_id, PathBuf::from(dir).join(file));
            }
        }
        Ok(())
    }

    fn set_connection_type(&mut self, src: &dyn NodePopulation, trg: &dyn NodePopulation) {
        self.connection_type = Some(ConnectionType::between(src, trg));
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SonataNodeAdaptor;

impl NodeAdaptor for SonataNodeAdaptor {
    fn adapt(&self, table: NodeTable) -> Result<Box<dyn NodePopulation>> {
        Ok(Box::new(SonataNodes::new(table)?))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SonataEdgeAdaptor;

impl EdgeAdaptor for SonataEdgeAdaptor {
    fn adapt(&self, table: EdgeTable) -> Result<Box<dyn EdgePopulation>> {
        Ok(Box::new(SonataEdges::new(table)?))
    }
}

/// Install the SONATA adaptors under the default format key.
pub fn register(registry: &mut AdaptorRegistry) {
    registry.register_nodes(DEFAULT_FORMAT, Arc::new(SonataNodeAdaptor));
    registry.register_edges(DEFAULT_FORMAT, Arc::new(SonataEdgeAdaptor));
}
