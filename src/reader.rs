use std::fs::File;

use crate::{
    adaptor::{EdgeAdaptor, NodeAdaptor},
    err::{anyhow, Context, Error, Result},
    population::{EdgePopulation, NodeId, NodePopulation},
    Map,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Attribute {
    Bool(bool),
    Float(f64),
    String(String),
}

impl From<&Attribute> for Value {
    fn from(value: &Attribute) -> Self {
        match value {
            Attribute::Bool(b) => Value::Bool(*b),
            Attribute::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Attribute::String(s) => Value::String(s.clone()),
        }
    }
}

fn drop_nulls(attributes: &mut Map<String, Attribute>) {
    attributes.retain(|_, v| !matches!(v, Attribute::String(s) if s == "NULL"));
}

/// Types are defined in CSV files with one named column for each attribute.
/// Separator is a single space.
/// Columns are:
/// - node_type_id: required; defines the node_type_id of this row.
/// - pop_name: optional; restricts the type to one population. Multiple
///   populations may define the same node_type_id.
/// - model_type: required, and may be defined only in the node_types.csv
/// - any number of additional columns.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeType {
    #[serde(rename = "node_type_id")]
    pub type_id: u64,
    #[serde(rename = "pop_name")]
    pub population: Option<String>,
    pub model_type: String,
    #[serde(flatten)]
    pub attributes: Map<String, Attribute>,
}

impl NodeType {
    pub fn is_virtual(&self) -> bool {
        self.model_type == "virtual"
    }

    fn applies_to(&self, population: &str) -> bool {
        self.population.as_deref().map_or(true, |p| p == population || p == "NULL")
    }
}

/// types are defined in a CSV file of named columns; separator is a single space.
/// - edge_type_id; required
/// - pop_name; optional; handles populations defining the same edge_type_id
/// - any number of additional columns may freely be added.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EdgeType {
    #[serde(rename = "edge_type_id")]
    pub type_id: u64,
    #[serde(rename = "pop_name")]
    pub population: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Attribute>,
}

impl EdgeType {
    fn applies_to(&self, population: &str) -> bool {
        self.population.as_deref().map_or(true, |p| p == population || p == "NULL")
    }
}

/// One node population as found on disk, types not yet joined in.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    pub name: String,
    pub node_ids: Vec<NodeId>,
    pub type_ids: Vec<u64>,
    /// per node overrides of the type attributes
    pub attributes: Vec<Map<String, Attribute>>,
    /// types usable by this population
    pub types: Vec<NodeType>,
}

/// One edge population as found on disk.
#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    pub name: String,
    pub source_pop: String,
    pub target_pop: String,
    pub type_ids: Vec<u64>,
    pub source_ids: Vec<NodeId>,
    pub target_ids: Vec<NodeId>,
    pub attributes: Vec<Map<String, Attribute>>,
    pub types: Vec<EdgeType>,
}

pub trait Reader {
    /// Every node population found in `nodes_file`.
    fn load_nodes(
        &self,
        nodes_file: &str,
        node_types_file: &str,
        gid_map: Option<&str>,
        adaptor: &dyn NodeAdaptor,
    ) -> Result<Vec<Box<dyn NodePopulation>>>;

    /// Every edge population found in `edges_file`.
    fn load_edges(
        &self,
        edges_file: &str,
        edge_types_file: &str,
        adaptor: &dyn EdgeAdaptor,
    ) -> Result<Vec<Box<dyn EdgePopulation>>>;
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    population: String,
    node_id: NodeId,
    node_type_id: u64,
    #[serde(flatten)]
    attributes: Map<String, Attribute>,
}

#[derive(Debug, Deserialize)]
struct EdgeRow {
    population: String,
    edge_type_id: u64,
    source_population: String,
    source_node_id: NodeId,
    target_population: String,
    target_node_id: NodeId,
    #[serde(flatten)]
    attributes: Map<String, Attribute>,
}

/// Reads types and instances from delimited text tables.
///
/// Node instances have the columns
///   population node_id node_type_id [attribute ...]
/// and edge instances
///   population edge_type_id source_population source_node_id target_population target_node_id [attribute ...]
/// Populations appear in the order of their first row.
#[derive(Debug, Clone)]
pub struct CsvReader {
    pub delimiter: u8,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b' ' }
    }
}

impl CsvReader {
    fn read<T: DeserializeOwned>(&self, path: &str, what: &str) -> anyhow::Result<Vec<T>> {
        let rd = File::open(path).with_context(|| format!("Opening {what} {path:?}"))?;
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_reader(rd)
            .deserialize()
            .map(|it| it.map_err(anyhow::Error::from))
            .collect::<anyhow::Result<Vec<T>>>()
            .with_context(|| format!("Parsing {what} {path:?}"))
    }

    pub fn read_node_tables(&self, nodes_file: &str, node_types_file: &str) -> Result<Vec<NodeTable>> {
        let mut types = self.read::<NodeType>(node_types_file, "node types")?;
        types.iter_mut().for_each(|ty| drop_nulls(&mut ty.attributes));

        let mut tables: Vec<NodeTable> = Vec::new();
        let mut index = Map::new();
        for mut row in self.read::<NodeRow>(nodes_file, "node instances")? {
            drop_nulls(&mut row.attributes);
            let ix = *index.entry(row.population.clone()).or_insert_with(|| {
                tables.push(NodeTable {
                    name: row.population.clone(),
                    ..Default::default()
                });
                tables.len() - 1
            });
            let table = &mut tables[ix];
            table.node_ids.push(row.node_id);
            table.type_ids.push(row.node_type_id);
            table.attributes.push(row.attributes);
        }
        for table in tables.iter_mut() {
            table.types = types
                .iter()
                .filter(|ty| ty.applies_to(&table.name))
                .cloned()
                .collect();
        }
        Ok(tables)
    }

    pub fn read_edge_tables(&self, edges_file: &str, edge_types_file: &str) -> Result<Vec<EdgeTable>> {
        let mut types = self.read::<EdgeType>(edge_types_file, "edge types")?;
        types.iter_mut().for_each(|ty| drop_nulls(&mut ty.attributes));

        let mut tables: Vec<EdgeTable> = Vec::new();
        let mut index = Map::new();
        for mut row in self.read::<EdgeRow>(edges_file, "edge instances")? {
            drop_nulls(&mut row.attributes);
            let ix = *index.entry(row.population.clone()).or_insert_with(|| {
                tables.push(EdgeTable {
                    name: row.population.clone(),
                    source_pop: row.source_population.clone(),
                    target_pop: row.target_population.clone(),
                    ..Default::default()
                });
                tables.len() - 1
            });
            let table = &mut tables[ix];
            if table.source_pop != row.source_population || table.target_pop != row.target_population {
                return Err(anyhow!(
                    "Edge population {} in {edges_file:?} connects more than one pair of node populations",
                    table.name
                )
                .into());
            }
            table.type_ids.push(row.edge_type_id);
            table.source_ids.push(row.source_node_id);
            table.target_ids.push(row.target_node_id);
            table.attributes.push(row.attributes);
        }
        for table in tables.iter_mut() {
            table.types = types
                .iter()
                .filter(|ty| ty.applies_to(&table.name))
                .cloned()
                .collect();
        }
        Ok(tables)
    }
}

impl Reader for CsvReader {
    fn load_nodes(
        &self,
        nodes_file: &str,
        node_types_file: &str,
        gid_map: Option<&str>,
        adaptor: &dyn NodeAdaptor,
    ) -> Result<Vec<Box<dyn NodePopulation>>> {
        if let Some(gids) = gid_map {
            return Err(Error::Unsupported(format!(
                "identifier remapping ({gids}) with the CSV reader"
            )));
        }
        self.read_node_tables(nodes_file, node_types_file)?
            .into_iter()
            .map(|table| adaptor.adapt(table))
            .collect()
    }

    fn load_edges(
        &self,
        edges_file: &str,
        edge_types_file: &str,
        adaptor: &dyn EdgeAdaptor,
    ) -> Result<Vec<Box<dyn EdgePopulation>>> {
        self.read_edge_tables(edges_file, edge_types_file)?
            .into_iter()
            .map(|table| adaptor.adapt(table))
            .collect()
    }
}
