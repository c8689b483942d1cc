use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::{
    err::{anyhow, Context, Error, Result},
    sup::{resolve_manifest, Components, Manifest},
    Map,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How to run the simulation / Timestepping
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Run {
    /// Begin of simulation [ms]
    #[serde(default)]
    pub tstart: f64,
    /// End of simulation [ms]
    pub tstop: Option<f64>,
    /// Timestep [ms]
    pub dt: Option<f64>,
    /// maximum CV length [um]
    /// If not given, models or simulators choose
    #[serde(rename = "dL")]
    pub dl: Option<f64>,
    /// Spiking threshold [mV]
    /// If not given, models or simulators choose
    pub spike_threshold: Option<f64>,
}

/// The set of nodes are represented by a vector of Nodes.
/// Each entry specifies a file for node types and node
/// instances.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Nodes {
    #[serde(rename = "nodes_file")]
    pub nodes: String,
    #[serde(rename = "node_types_file")]
    pub types: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Edges {
    #[serde(rename = "edges_file")]
    pub edges: String,
    #[serde(rename = "edge_types_file")]
    pub types: String,
}

impl Edges {
    fn resolve_manifest(&mut self, manifest: &Manifest, base: Option<&Path>) -> anyhow::Result<()> {
        resolve_manifest(&mut self.edges, manifest, base)?;
        resolve_manifest(&mut self.types, manifest, base)
    }
}

impl Nodes {
    fn resolve_manifest(&mut self, manifest: &Manifest, base: Option<&Path>) -> anyhow::Result<()> {
        resolve_manifest(&mut self.nodes, manifest, base)?;
        resolve_manifest(&mut self.types, manifest, base)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Network {
    #[serde(default)]
    pub nodes: Vec<Nodes>,
    #[serde(default)]
    pub edges: Vec<Edges>,
}

impl Network {
    fn resolve_manifest(&mut self, manifest: &Manifest, base: Option<&Path>) -> anyhow::Result<()> {
        self.nodes
            .iter_mut()
            .try_for_each(|n| n.resolve_manifest(manifest, base))?;
        self.edges
            .iter_mut()
            .try_for_each(|n| n.resolve_manifest(manifest, base))
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct NetworkFile {
    #[serde(default)]
    manifest: Manifest,
    #[serde(default)]
    components: Components,
    #[serde(alias = "networks")]
    network: Network,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(untagged)]
enum NetworkOrFile {
    #[default]
    Empty,
    File(String),
    Inline(Network),
}

#[derive(Debug, Deserialize, Serialize)]
struct ConfigRaw {
    #[serde(default)]
    manifest: Manifest,
    #[serde(default)]
    run: Run,
    target_simulator: Option<String>,
    #[serde(alias = "networks", default)]
    network: NetworkOrFile,
    #[serde(default)]
    components: Components,
    #[serde(default)]
    node_sets: Map<String, Value>,
    node_sets_file: Option<String>,
    #[serde(alias = "gids")]
    gid_mappings: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub run: Run,
    pub target_simulator: Option<String>,
    pub components: Components,
    /// `None` if the config declares no network block at all
    pub network: Option<Network>,
    /// Node sets as declared; interpreted by the network when registered.
    pub node_sets: Map<String, Value>,
    /// Identifier remapping table handed to the reader untouched.
    pub gid_mappings: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let path = path
            .canonicalize()
            .with_context(|| format!("Resolving simulation path {path:?}"))?;
        let base_dir = path
            .parent()
            .ok_or_else(|| anyhow!("Couldn't find parent of {path:?}."))?;
        let rd = File::open(&path).with_context(|| format!("Opening {path:?}"))?;
        let raw: ConfigRaw = serde_json::de::from_reader(rd)
            .with_context(|| format!("Parsing simulation {path:?}"))?;
        Self::resolve(raw, Some(base_dir))
    }

    /// From an in-memory dictionary; relative paths stay relative to the
    /// working directory.
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let raw: ConfigRaw = serde_json::from_value(value).context("Parsing simulation")?;
        Self::resolve(raw, None)
    }

    fn resolve(mut raw: ConfigRaw, base: Option<&Path>) -> anyhow::Result<Self> {
        raw.components
            .values_mut()
            .try_for_each(|it| resolve_manifest(it, &raw.manifest, base))?;

        let network = match raw.network {
            NetworkOrFile::Empty => None,
            NetworkOrFile::File(mut file) => {
                resolve_manifest(&mut file, &raw.manifest, base)?;
                let path = PathBuf::from(file);
                let rd = File::open(&path).with_context(|| format!("Opening {path:?}"))?;
                let mut net: NetworkFile = serde_json::de::from_reader(rd)
                    .with_context(|| format!("Parsing network {path:?}"))?;
                let mut manifest = raw.manifest.clone();
                manifest.append(&mut net.manifest);
                let net_base = path.parent().or(base);
                net.components
                    .values_mut()
                    .try_for_each(|it| resolve_manifest(it, &manifest, net_base))?;
                raw.components.append(&mut net.components);
                net.network.resolve_manifest(&manifest, net_base)?;
                Some(net.network)
            }
            NetworkOrFile::Inline(mut net) => {
                net.resolve_manifest(&raw.manifest, base)?;
                Some(net)
            }
        };

        if let Some(mut file) = raw.node_sets_file {
            resolve_manifest(&mut file, &raw.manifest, base)?;
            let rd = File::open(&file).with_context(|| format!("Opening {file:?}"))?;
            let nds: Map<String, Value> = serde_json::de::from_reader(rd)
                .with_context(|| format!("Parsing nodesets {file:?}"))?;
            raw.node_sets.extend(nds);
        }

        if let Some(gids) = raw.gid_mappings.as_mut() {
            resolve_manifest(gids, &raw.manifest, base)?;
        }

        Ok(Config {
            run: raw.run,
            target_simulator: raw.target_simulator,
            components: raw.components,
            network,
            node_sets: raw.node_sets,
            gid_mappings: raw.gid_mappings,
        })
    }

    pub fn with_networks(&self) -> bool {
        self.network.as_ref().is_some_and(|n| !n.nodes.is_empty())
    }

    pub fn nodes(&self) -> &[Nodes] {
        self.network.as_ref().map(|n| n.nodes.as_slice()).unwrap_or(&[])
    }

    pub fn edges(&self) -> &[Edges] {
        self.network.as_ref().map(|n| n.edges.as_slice()).unwrap_or(&[])
    }

    pub fn spike_threshold(&self) -> Option<f64> {
        self.run.spike_threshold
    }

    pub fn dl(&self) -> Option<f64> {
        self.run.dl
    }
}

/// Anything `Network::from_config` knows how to turn into a [`Config`].
#[derive(Debug)]
pub enum ConfigSource {
    Config(Config),
    File(PathBuf),
    Value(Value),
}

impl ConfigSource {
    pub fn load(self) -> Result<Config> {
        match self {
            ConfigSource::Config(config) => Ok(config),
            ConfigSource::File(path) => {
                Config::from_file(&path).map_err(|source| Error::ConfigConversion {
                    what: format!("{path:?} (type \"file\")"),
                    source,
                })
            }
            ConfigSource::Value(value) => {
                let what = format!("{} (type \"{}\")", value, json_type(&value));
                Config::from_value(value).map_err(|source| Error::ConfigConversion { what, source })
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

impl From<Config> for ConfigSource {
    fn from(value: Config) -> Self {
        ConfigSource::Config(value)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(value: PathBuf) -> Self {
        ConfigSource::File(value)
    }
}

impl From<&Path> for ConfigSource {
    fn from(value: &Path) -> Self {
        ConfigSource::File(value.to_path_buf())
    }
}

impl From<&str> for ConfigSource {
    fn from(value: &str) -> Self {
        ConfigSource::File(PathBuf::from(value))
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}
