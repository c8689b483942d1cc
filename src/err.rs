use thiserror::Error;

pub use anyhow::{anyhow, Context};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that stops the assembly of a network.
///
/// None of these are recoverable: the pipeline returns at the first one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No network component set with name {0}")]
    MissingComponent(String),
    #[error("Unable to load or find node_set \"{0}\"")]
    UnknownNodeSet(String),
    #[error("Node set \"{0}\" refers back to itself")]
    CyclicNodeSet(String),
    #[error("Node set {0} is reserved for the nodes of node population {0}")]
    ReservedNodeSet(String),
    #[error("Node population {0} not found")]
    UnknownNodePopulation(String),
    #[error("There are multiple node populations with name {0}.")]
    DuplicateNodePopulation(String),
    #[error("Source node population {source_nodes} not found. Please update {edges} edges")]
    MissingSourcePopulation { source_nodes: String, edges: String },
    #[error("Node population {target_nodes} does not exist (or consists of only virtual nodes). {edges} edges cannot create connections.")]
    InvalidTargetPopulation { target_nodes: String, edges: String },
    #[error("No {kind} adaptor registered for format {name}")]
    UnknownAdaptor { kind: &'static str, name: String },
    #[error("Could not convert {what} to a configuration: {source:#}")]
    ConfigConversion {
        what: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not find any network files. Unable to build network.")]
    NoNetworks,
    #[error("{0} is not implemented; a simulator must provide it")]
    Unimplemented(&'static str),
    #[error("Network has already been built")]
    AlreadyBuilt,
    #[error("A previous build of this network failed; it must not be built again")]
    BuildAborted,
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("{0:#}")]
    Load(#[from] anyhow::Error),
}
