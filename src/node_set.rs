use crate::{
    err::{Error, Result},
    network::Network,
    population::{NodeId, NodePopulation},
    Map,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// population name -> selected node ids, in population order
pub type Selection = Map<String, Vec<NodeId>>;

/// Simple nodesets are a dictionary of node attributes and attribute values,
/// either a scalar or an array of scalars.
///
///    "basic_nodeset": {
///        "<Property_Key1>": "<Prop_Val_11>"
///        "<Property_Key2>": ["<Prop_Val_21>", "<Prop_Val_22>", ...],
///    },
///
/// For arrays a node matches if its value matches any of the values. A node
/// is part of the set if it matches all rules. `population` and `node_id` are
/// matched against the node's population name and id. Compound node sets are
/// arrays of node set names and select the union. A plain array of integers
/// selects those node ids in every population.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NodeFilter {
    Ids(Vec<NodeId>),
    Compound(Vec<String>),
    Basic(Map<String, Value>),
}

impl NodeFilter {
    /// Interpret a JSON node set definition.
    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|_| Error::UnknownNodeSet(value.to_string()))
    }

    /// Every node of `population`.
    pub fn population(population: &str) -> Self {
        let mut rules = Map::new();
        rules.insert("population".to_string(), Value::from(population));
        NodeFilter::Basic(rules)
    }
}

/// What `Network::get_node_set` accepts: a registered name or an inline filter.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSetSpec {
    Name(String),
    Filter(NodeFilter),
}

impl NodeSetSpec {
    /// Strings name a set, objects and arrays are inline filters; anything
    /// else is not a node set. Use [`Network::node_set_spec`] to have the
    /// failure reported.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(NodeSetSpec::Name(name.clone())),
            other => NodeFilter::from_json(other).map(NodeSetSpec::Filter),
        }
    }
}

impl From<&str> for NodeSetSpec {
    fn from(value: &str) -> Self {
        NodeSetSpec::Name(value.to_string())
    }
}

impl From<String> for NodeSetSpec {
    fn from(value: String) -> Self {
        NodeSetSpec::Name(value)
    }
}

impl From<NodeFilter> for NodeSetSpec {
    fn from(value: NodeFilter) -> Self {
        NodeSetSpec::Filter(value)
    }
}

impl From<Vec<NodeId>> for NodeSetSpec {
    fn from(value: Vec<NodeId>) -> Self {
        NodeSetSpec::Filter(NodeFilter::Ids(value))
    }
}

impl From<Map<String, Value>> for NodeSetSpec {
    fn from(value: Map<String, Value>) -> Self {
        NodeSetSpec::Filter(NodeFilter::Basic(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    filter: NodeFilter,
}

impl NodeSet {
    pub fn new(filter: NodeFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &NodeFilter {
        &self.filter
    }

    /// Members of every registered population matching this set. Unknown
    /// or cyclic references are reported through the network's sink.
    pub fn resolve(&self, network: &Network) -> Result<Selection> {
        self.select(network).map_err(|e| {
            network.io().log_exception(&e);
            e
        })
    }

    fn select(&self, network: &Network) -> Result<Selection> {
        let mut res = Selection::new();
        for pop in network.node_populations() {
            let mut ids = Vec::new();
            for id in pop.node_ids() {
                if selects(&self.filter, network, pop, *id, &mut Vec::new())? {
                    ids.push(*id);
                }
            }
            if !ids.is_empty() {
                res.insert(pop.name().to_string(), ids);
            }
        }
        Ok(res)
    }

    /// Size of the selection.
    pub fn count(&self, network: &Network) -> Result<usize> {
        Ok(self.resolve(network)?.values().map(Vec::len).sum())
    }
}

fn selects(
    filter: &NodeFilter,
    network: &Network,
    pop: &dyn NodePopulation,
    id: NodeId,
    visiting: &mut Vec<String>,
) -> Result<bool> {
    match filter {
        NodeFilter::Ids(ids) => Ok(ids.contains(&id)),
        NodeFilter::Basic(rules) => Ok(rules.iter().all(|(key, want)| match key.as_str() {
            "population" => value_matches(want, &Value::from(pop.name())),
            "node_id" => value_matches(want, &Value::from(id)),
            _ => pop
                .attribute(id, key)
                .is_some_and(|have| value_matches(want, &have)),
        })),
        NodeFilter::Compound(names) => {
            for name in names {
                if visiting.contains(name) {
                    return Err(Error::CyclicNodeSet(name.clone()));
                }
                let set = network
                    .node_set(name)
                    .ok_or_else(|| Error::UnknownNodeSet(name.clone()))?;
                visiting.push(name.clone());
                let hit = selects(&set.filter, network, pop, id, visiting)?;
                visiting.pop();
                if hit {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Arrays are any-of; numbers compare by value, so 1 matches 1.0.
fn value_matches(want: &Value, have: &Value) -> bool {
    match want {
        Value::Array(wants) => wants.iter().any(|w| scalar_eq(w, have)),
        _ => scalar_eq(want, have),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
