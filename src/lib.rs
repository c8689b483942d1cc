pub use std::collections::BTreeMap as Map;

pub mod adaptor;
pub mod config;
pub mod err;
pub mod io;
pub mod network;
pub mod node_set;
pub mod population;
pub mod reader;
pub mod sonata;
pub mod sup;

pub use err::{Error, Result};
pub use network::{Network, Options, Simulator, State, Unspecialized};
