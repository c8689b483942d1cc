#![allow(dead_code)]

use simnet::{
    io::Recorder,
    population::{EdgePopulation, NodePopulation},
    reader::{EdgeTable, NodeTable, NodeType},
    sonata::{SonataEdges, SonataNodes},
    Map, Network, Options,
};
use std::sync::Arc;

pub fn node_type(type_id: u64, model_type: &str) -> NodeType {
    NodeType {
        type_id,
        population: None,
        model_type: model_type.to_string(),
        attributes: Map::new(),
    }
}

/// `n_internal` biophysical nodes followed by `n_virtual` virtual ones, ids 0..
pub fn node_table(name: &str, n_internal: usize, n_virtual: usize) -> NodeTable {
    let size = n_internal + n_virtual;
    let mut type_ids = vec![1; n_internal];
    type_ids.extend(std::iter::repeat(2).take(n_virtual));
    NodeTable {
        name: name.to_string(),
        node_ids: (0..size as u64).collect(),
        type_ids,
        attributes: Vec::new(),
        types: vec![node_type(1, "biophysical"), node_type(2, "virtual")],
    }
}

pub fn internal(name: &str, size: usize) -> Box<dyn NodePopulation> {
    Box::new(SonataNodes::new(node_table(name, size, 0)).unwrap())
}

pub fn virtual_only(name: &str, size: usize) -> Box<dyn NodePopulation> {
    Box::new(SonataNodes::new(node_table(name, 0, size)).unwrap())
}

pub fn mixed(name: &str, n_internal: usize, n_virtual: usize) -> Box<dyn NodePopulation> {
    Box::new(SonataNodes::new(node_table(name, n_internal, n_virtual)).unwrap())
}

pub fn edges(name: &str, source: &str, target: &str) -> Box<dyn EdgePopulation> {
    Box::new(
        SonataEdges::new(EdgeTable {
            name: name.to_string(),
            source_pop: source.to_string(),
            target_pop: target.to_string(),
            ..Default::default()
        })
        .unwrap(),
    )
}

pub fn recording() -> (Network, Arc<Recorder>) {
    let io = Arc::new(Recorder::new());
    let network = Network::with_options(Options::default().io(io.clone()));
    (network, io)
}
