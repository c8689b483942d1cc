use std::{path::Path, sync::Arc};

use crate::{
    adaptor::{AdaptorRegistry, EdgeAdaptor, NodeAdaptor, DEFAULT_FORMAT},
    config::ConfigSource,
    err::{Error, Result},
    io::{Io, TracingIo},
    node_set::{NodeFilter, NodeSet, NodeSetSpec, Selection},
    population::{EdgePopulation, NodePopulation},
    reader::Reader,
    sup::Components,
    Map,
};
use serde_json::Value;

/// Simulator specific parts of the build.
///
/// Every hook fails with [`Error::Unimplemented`] unless overridden.
pub trait Simulator {
    fn build_nodes(&mut self, _network: &Network) -> Result<()> {
        Err(Error::Unimplemented("build_nodes"))
    }

    fn build_recurrent_edges(&mut self, _network: &Network) -> Result<()> {
        Err(Error::Unimplemented("build_recurrent_edges"))
    }

    fn build_virtual_connections(&mut self, _network: &Network) -> Result<()> {
        Err(Error::Unimplemented("build_virtual_connections"))
    }
}

/// A simulator providing none of the hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unspecialized;

impl Simulator for Unspecialized {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing registered yet
    Empty,
    /// Populations registered, not built
    Populated,
    /// `build` ran to completion
    Built,
    /// `build` failed half way; the network must be discarded
    Failed,
}

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct Options {
    pub io: Arc<dyn Io>,
    pub adaptors: AdaptorRegistry,
    /// Passed through for the simulator, not interpreted here.
    pub properties: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            io: Arc::new(TracingIo),
            adaptors: AdaptorRegistry::default(),
            properties: Map::new(),
        }
    }
}

impl Options {
    pub fn io(mut self, io: Arc<dyn Io>) -> Self {
        self.io = io;
        self
    }

    pub fn adaptors(mut self, adaptors: AdaptorRegistry) -> Self {
        self.adaptors = adaptors;
        self
    }

    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug)]
pub struct Network {
    io: Arc<dyn Io>,
    components: Components,
    adaptors: AdaptorRegistry,
    /// in registration order
    node_populations: Vec<Box<dyn NodePopulation>>,
    /// reverse mapping Name -> index into node_populations
    node_population_ids: Map<String, usize>,
    node_sets: Map<String, Arc<NodeSet>>,
    /// in registration order, names may repeat
    edge_populations: Vec<Box<dyn EdgePopulation>>,
    properties: Map<String, Value>,
    /// threshold for spike generation, copied from the config
    pub spike_threshold: Option<f64>,
    /// maximum CV length, copied from the config
    pub dl: Option<f64>,
    state: State,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            io: options.io,
            components: Components::new(),
            adaptors: options.adaptors,
            node_populations: Vec::new(),
            node_population_ids: Map::new(),
            node_sets: Map::new(),
            edge_populations: Vec::new(),
            properties: options.properties,
            spike_threshold: None,
            dl: None,
            state: State::Empty,
        }
    }

    pub fn io(&self) -> &dyn Io {
        self.io.as_ref()
    }

    /// Report and hand back a fatal error.
    fn fail(&self, err: Error) -> Error {
        self.io.log_exception(&err);
        err
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn add_component(&mut self, name: &str, path: &str) {
        self.components.insert(name.to_string(), path.to_string());
    }

    pub fn get_component(&self, name: &str) -> Result<&str> {
        self.components
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| self.fail(Error::MissingComponent(name.to_string())))
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn adaptors_mut(&mut self) -> &mut AdaptorRegistry {
        &mut self.adaptors
    }

    pub fn get_node_adaptor(&self, name: &str) -> Result<Arc<dyn NodeAdaptor>> {
        self.adaptors.node_adaptor(name).map_err(|e| self.fail(e))
    }

    pub fn get_edge_adaptor(&self, name: &str) -> Result<Arc<dyn EdgeAdaptor>> {
        self.adaptors.edge_adaptor(name).map_err(|e| self.fail(e))
    }

    pub fn node_populations(&self) -> impl Iterator<Item = &dyn NodePopulation> + '_ {
        self.node_populations.iter().map(|p| p.as_ref())
    }

    /// Lookup without reporting; `None` if not registered.
    pub fn node_population(&self, name: &str) -> Option<&dyn NodePopulation> {
        self.node_population_ids
            .get(name)
            .map(|ix| self.node_populations[*ix].as_ref())
    }

    pub fn get_node_population(&self, name: &str) -> Result<&dyn NodePopulation> {
        self.node_population(name)
            .ok_or_else(|| self.fail(Error::UnknownNodePopulation(name.to_string())))
    }

    pub fn edge_populations(&self) -> impl Iterator<Item = &dyn EdgePopulation> + '_ {
        self.edge_populations.iter().map(|p| p.as_ref())
    }

    /// Edge populations between simulated nodes.
    pub fn recurrent_edges(&self) -> Vec<&dyn EdgePopulation> {
        self.edge_populations()
            .filter(|ep| ep.recurrent_connections())
            .collect()
    }

    /// Edge populations fed by virtual nodes.
    pub fn virtual_edges(&self) -> Vec<&dyn EdgePopulation> {
        self.edge_populations()
            .filter(|ep| ep.virtual_connections())
            .collect()
    }

    /// Registered node set, without reporting.
    pub fn node_set(&self, name: &str) -> Option<&Arc<NodeSet>> {
        self.node_sets.get(name)
    }

    pub fn node_set_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.node_sets.keys().map(String::as_str)
    }

    /// Register a named node set; a later registration under the same name
    /// replaces it. Names of node populations are reserved for their implicit
    /// sets.
    pub fn add_node_set(&mut self, name: &str, filter: NodeFilter) -> Result<Arc<NodeSet>> {
        if self.node_population_ids.contains_key(name) {
            return Err(self.fail(Error::ReservedNodeSet(name.to_string())));
        }
        let set = Arc::new(NodeSet::new(filter));
        self.node_sets.insert(name.to_string(), set.clone());
        Ok(set)
    }

    /// Parse a JSON node set reference, reporting shapes that are neither a
    /// name nor a filter.
    pub fn node_set_spec(&self, value: &Value) -> Result<NodeSetSpec> {
        NodeSetSpec::from_json(value).map_err(|e| self.fail(e))
    }

    /// Members of the node set `node_set`.
    pub fn resolve_node_set(&self, node_set: impl Into<NodeSetSpec>) -> Result<Selection> {
        self.get_node_set(node_set)?.resolve(self)
    }

    /// A registered node set by name, or a fresh, unregistered one for an
    /// inline filter.
    pub fn get_node_set(&self, node_set: impl Into<NodeSetSpec>) -> Result<Arc<NodeSet>> {
        match node_set.into() {
            NodeSetSpec::Name(name) => match self.node_sets.get(&name) {
                Some(set) => Ok(set.clone()),
                None => Err(self.fail(Error::UnknownNodeSet(name))),
            },
            NodeSetSpec::Filter(filter) => Ok(Arc::new(NodeSet::new(filter))),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Built => Err(self.fail(Error::AlreadyBuilt)),
            State::Failed => Err(self.fail(Error::BuildAborted)),
            State::Empty | State::Populated => Ok(()),
        }
    }

    pub fn add_nodes(&mut self, mut node_population: Box<dyn NodePopulation>) -> Result<()> {
        self.ensure_open()?;
        let pop_name = node_population.name().to_string();
        if self.node_population_ids.contains_key(&pop_name) {
            // Make sure there aren't any collisions
            return Err(self.fail(Error::DuplicateNodePopulation(pop_name)));
        }
        if self.node_sets.contains_key(&pop_name) {
            return Err(self.fail(Error::ReservedNodeSet(pop_name)));
        }

        node_population.initialize(self)?;
        let mixed = node_population.mixed_nodes();
        self.node_population_ids
            .insert(pop_name.clone(), self.node_populations.len());
        self.node_populations.push(node_population);
        if mixed {
            // Allowed, but not ideal
            self.io.log_warning(&format!(
                "Node population {pop_name} contains both virtual and non-virtual nodes which can cause \
                 memory and build-time inefficiency. Consider separating virtual nodes into their own population"
            ));
        }

        // Used in inputs/reports when needed to get all nodes belonging to a node population
        self.node_sets.insert(
            pop_name.clone(),
            Arc::new(NodeSet::new(NodeFilter::population(&pop_name))),
        );
        self.state = State::Populated;
        Ok(())
    }

    pub fn add_edges(&mut self, mut edge_population: Box<dyn EdgePopulation>) -> Result<()> {
        self.ensure_open()?;
        edge_population.initialize(self)?;
        let pop_name = edge_population.name().to_string();

        let src_pop_name = edge_population.source_nodes();
        let Some(src_pop) = self.node_population(src_pop_name) else {
            return Err(self.fail(Error::MissingSourcePopulation {
                source_nodes: src_pop_name.to_string(),
                edges: pop_name,
            }));
        };

        // We cannot synapse onto virtual nodes
        let trg_pop_name = edge_population.target_nodes();
        let trg_pop = match self.node_population(trg_pop_name) {
            Some(pop) if !pop.virtual_nodes_only() => pop,
            _ => {
                return Err(self.fail(Error::InvalidTargetPopulation {
                    target_nodes: trg_pop_name.to_string(),
                    edges: pop_name,
                }))
            }
        };

        edge_population.set_connection_type(src_pop, trg_pop);
        self.edge_populations.push(edge_population);
        self.state = State::Populated;
        Ok(())
    }

    /// Nodes first, then recurrent connections. Stops at the first failure
    /// and leaves the network in [`State::Failed`].
    pub fn build<S: Simulator + ?Sized>(&mut self, simulator: &mut S) -> Result<()> {
        self.ensure_open()?;
        self.io.log_info("Building cells.");
        if let Err(e) = simulator.build_nodes(self) {
            self.state = State::Failed;
            return Err(self.fail(e));
        }
        self.io.log_info("Building recurrent connections");
        if let Err(e) = simulator.build_recurrent_edges(self) {
            self.state = State::Failed;
            return Err(self.fail(e));
        }
        self.state = State::Built;
        Ok(())
    }

    pub fn build_virtual_connections<S: Simulator + ?Sized>(&self, simulator: &mut S) -> Result<()> {
        simulator
            .build_virtual_connections(self)
            .map_err(|e| self.fail(e))
    }

    /// Generate a populated, unbuilt network from a config file, JSON value
    /// or a loaded [`Config`](crate::config::Config).
    ///
    /// Adaptors for [`DEFAULT_FORMAT`] must be part of `options`.
    pub fn from_config(
        conf: impl Into<ConfigSource>,
        reader: &dyn Reader,
        options: Options,
    ) -> Result<Self> {
        let mut network = Self::with_options(options);
        let config = conf.into().load().map_err(|e| network.fail(e))?;

        if !config.with_networks() {
            return Err(network.fail(Error::NoNetworks));
        }

        network.spike_threshold = config.spike_threshold();
        network.dl = config.dl();

        for (name, value) in &config.components {
            network.add_component(name, value);
        }

        let gid_map = config.gid_mappings.as_deref();
        let node_adaptor = network.get_node_adaptor(DEFAULT_FORMAT)?;
        for nodes in config.nodes() {
            let populations = reader
                .load_nodes(&nodes.nodes, &nodes.types, gid_map, node_adaptor.as_ref())
                .map_err(|e| network.fail(e))?;
            for node_pop in populations {
                network.add_nodes(node_pop)?;
            }
        }

        // Node ids of internal populations are assumed to be disjoint unless remapped
        let internal = network
            .node_populations()
            .filter(|p| !p.virtual_nodes_only())
            .count();
        if gid_map.is_none() && internal > 1 {
            network.io.log_warning(&format!(
                "{internal} internal node populations and no gid_mappings; node ids may collide across populations"
            ));
        }

        let edge_adaptor = network.get_edge_adaptor(DEFAULT_FORMAT)?;
        for edges in config.edges() {
            let populations = reader
                .load_edges(&edges.edges, &edges.types, edge_adaptor.as_ref())
                .map_err(|e| network.fail(e))?;
            for edge_pop in populations {
                network.add_edges(edge_pop)?;
            }
        }

        for (name, value) in &config.node_sets {
            let filter = NodeFilter::from_json(value).map_err(|e| network.fail(e))?;
            network.add_node_set(name, filter)?;
        }

        network.io.log_info(&format!(
            "Loaded {} node and {} edge populations",
            network.node_populations.len(),
            network.edge_populations.len()
        ));
        Ok(network)
    }

    pub fn from_manifest(_manifest: &Path, options: Options) -> Result<Self> {
        // TODO: Build from model files downloaded from celltypes.brain-map.org
        Err(Self::with_options(options).fail(Error::Unimplemented("from_manifest")))
    }

    pub fn from_builder<B>(_builder: B, options: Options) -> Result<Self> {
        Err(Self::with_options(options).fail(Error::Unimplemented("from_builder")))
    }
}
