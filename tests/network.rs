mod common;

use common::{edges, internal, mixed, node_type, recording, virtual_only};
use serde_json::json;
use simnet::{
    io::Level,
    network::Network,
    node_set::NodeFilter,
    population::{ConnectionType, EdgePopulation, NodeId, NodePopulation},
    reader::{Attribute, NodeTable},
    sonata::SonataNodes,
    Error, Map, Options, Result, Simulator, State, Unspecialized,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[test]
fn components_last_write_wins() {
    let (mut net, io) = recording();
    net.add_component("synaptic_models_dir", "/a");
    net.add_component("synaptic_models_dir", "/b");
    assert_eq!(net.get_component("synaptic_models_dir").unwrap(), "/b");

    let err = net.get_component("morphologies_dir").unwrap_err();
    assert!(matches!(err, Error::MissingComponent(ref n) if n == "morphologies_dir"));
    assert_eq!(io.count(Level::Exception), 1);
}

#[test]
fn duplicate_node_population() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 3)).unwrap();
    net.add_nodes(virtual_only("lgn", 2)).unwrap();

    let err = net.add_nodes(internal("v1", 7)).unwrap_err();
    assert!(matches!(err, Error::DuplicateNodePopulation(ref n) if n == "v1"));
    assert_eq!(io.count(Level::Exception), 1);

    let names = net.node_populations().map(|p| p.name().to_string()).collect::<Vec<_>>();
    assert_eq!(names, vec!["v1", "lgn"]);
    assert_eq!(net.get_node_population("v1").unwrap().size(), 3);
}

#[test]
fn unknown_node_population() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 3)).unwrap();

    assert!(net.node_population("v2").is_none());
    assert_eq!(io.count(Level::Exception), 0);
    let err = net.get_node_population("v2").unwrap_err();
    assert!(matches!(err, Error::UnknownNodePopulation(ref n) if n == "v2"));
    assert_eq!(io.count(Level::Exception), 1);
}

#[test]
fn implicit_node_set_is_population() {
    let (mut net, _) = recording();
    assert_eq!(net.state(), State::Empty);
    net.add_nodes(internal("v1", 4)).unwrap();
    net.add_nodes(virtual_only("lgn", 2)).unwrap();
    assert_eq!(net.state(), State::Populated);

    for name in ["v1", "lgn"] {
        let set = net.get_node_set(name).unwrap();
        let selection = set.resolve(&net).unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[name], net.get_node_population(name).unwrap().node_ids());
    }
}

#[test]
fn node_set_lookup_is_reference_stable() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 10)).unwrap();
    let registered = net.add_node_set("first", NodeFilter::Ids(vec![0])).unwrap();

    let a = net.get_node_set("first").unwrap();
    let b = net.get_node_set("first").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &registered));

    let adhoc = net.get_node_set(vec![2u64, 5]).unwrap();
    let again = net.get_node_set(vec![2u64, 5]).unwrap();
    assert!(!Arc::ptr_eq(&adhoc, &again));
    assert_eq!(adhoc.resolve(&net).unwrap()["v1"], vec![2, 5]);
    assert_eq!(adhoc.count(&net).unwrap(), 2);
    assert_eq!(net.node_set_names().count(), 2);
    assert_eq!(io.count(Level::Exception), 0);
}

#[test]
fn unknown_node_set() {
    let (net, io) = recording();
    let err = net.get_node_set("nothing").unwrap_err();
    assert!(matches!(err, Error::UnknownNodeSet(ref n) if n == "nothing"));
    assert_eq!(io.count(Level::Exception), 1);
}

#[test]
fn basic_and_compound_node_sets() {
    let (mut net, _) = recording();
    let mut table = common::node_table("v1", 4, 0);
    table.types.push(node_type(3, "point_neuron"));
    table.type_ids = vec![1, 3, 1, 3];
    table.attributes = (0..4)
        .map(|i| {
            let layer = if i < 2 { "L4" } else { "L5" };
            Map::from([("location".to_string(), Attribute::String(layer.into()))])
        })
        .collect();
    net.add_nodes(Box::new(SonataNodes::new(table).unwrap())).unwrap();
    net.add_nodes(internal("lm", 3)).unwrap();

    let bio_l4 = NodeFilter::from_json(&json!({"model_type": "biophysical", "location": ["L4"]})).unwrap();
    net.add_node_set("bio_l4", bio_l4).unwrap();
    let points = NodeFilter::from_json(&json!({"population": "v1", "model_type": "point_neuron"})).unwrap();
    net.add_node_set("points", points).unwrap();
    net.add_node_set("both", NodeFilter::Compound(vec!["bio_l4".into(), "points".into()])).unwrap();

    let sel = net.get_node_set("bio_l4").unwrap().resolve(&net).unwrap();
    assert_eq!(sel["v1"], vec![0]);
    assert!(!sel.contains_key("lm"));

    let sel = net.get_node_set("both").unwrap().resolve(&net).unwrap();
    assert_eq!(sel["v1"], vec![0, 1, 3]);

    let by_id = net
        .get_node_set(Map::from([("node_id".to_string(), json!([1, 2]))]))
        .unwrap()
        .resolve(&net)
        .unwrap();
    assert_eq!(by_id["v1"], vec![1, 2]);
    assert_eq!(by_id["lm"], vec![1, 2]);
}

#[test]
fn cyclic_and_dangling_compound_sets() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 2)).unwrap();
    net.add_node_set("a", NodeFilter::Compound(vec!["b".into()])).unwrap();
    net.add_node_set("b", NodeFilter::Compound(vec!["a".into()])).unwrap();
    net.add_node_set("c", NodeFilter::Compound(vec!["missing".into()])).unwrap();

    let err = net.get_node_set("a").unwrap().resolve(&net).unwrap_err();
    assert!(matches!(err, Error::CyclicNodeSet(_)));
    assert_eq!(io.count(Level::Exception), 1);
    let err = net.get_node_set("c").unwrap().count(&net).unwrap_err();
    assert!(matches!(err, Error::UnknownNodeSet(ref n) if n == "missing"));
    assert_eq!(io.count(Level::Exception), 2);
    let err = net.resolve_node_set("c").unwrap_err();
    assert!(matches!(err, Error::UnknownNodeSet(ref n) if n == "missing"));
    assert_eq!(io.count(Level::Exception), 3);
    assert!(io.messages()[2].1.contains(r#"Unable to load or find node_set "missing""#));
}

#[test]
fn node_set_references_from_json() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 4)).unwrap();

    let spec = net.node_set_spec(&json!({"node_id": [1, 3]})).unwrap();
    assert_eq!(net.resolve_node_set(spec).unwrap()["v1"], vec![1, 3]);
    let spec = net.node_set_spec(&json!("v1")).unwrap();
    assert_eq!(net.resolve_node_set(spec).unwrap()["v1"], vec![0, 1, 2, 3]);
    assert_eq!(io.count(Level::Exception), 0);

    let err = net.node_set_spec(&json!(42)).unwrap_err();
    assert!(matches!(err, Error::UnknownNodeSet(_)));
    assert_eq!(io.count(Level::Exception), 1);
}

#[test]
fn population_names_are_reserved_node_sets() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 4)).unwrap();

    let err = net.add_node_set("v1", NodeFilter::Ids(vec![0])).unwrap_err();
    assert!(matches!(err, Error::ReservedNodeSet(ref n) if n == "v1"));
    assert_eq!(io.count(Level::Exception), 1);
    assert_eq!(net.resolve_node_set("v1").unwrap()["v1"], vec![0, 1, 2, 3]);
}

#[test]
fn populations_cannot_take_over_node_sets() {
    let (mut net, io) = recording();
    net.add_node_set("lgn", NodeFilter::Ids(vec![0])).unwrap();

    let err = net.add_nodes(virtual_only("lgn", 2)).unwrap_err();
    assert!(matches!(err, Error::ReservedNodeSet(ref n) if n == "lgn"));
    assert_eq!(io.count(Level::Exception), 1);
    assert!(net.node_population("lgn").is_none());
    assert_eq!(net.state(), State::Empty);
    assert_eq!(net.get_node_set("lgn").unwrap().filter(), &NodeFilter::Ids(vec![0]));
}

#[test]
fn mixed_population_is_a_warning() {
    let (mut net, io) = recording();
    net.add_nodes(mixed("v1", 3, 2)).unwrap();
    assert_eq!(io.count(Level::Warning), 1);
    assert_eq!(io.count(Level::Exception), 0);
    assert!(io.messages()[0].1.contains("Node population v1 contains both virtual and non-virtual"));
    assert!(net.node_set("v1").is_some());
}

#[test]
fn edges_need_registered_endpoints() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 3)).unwrap();

    let err = net.add_edges(edges("x_v1", "x", "v1")).unwrap_err();
    assert!(matches!(err, Error::MissingSourcePopulation { ref source_nodes, .. } if source_nodes == "x"));

    let err = net.add_edges(edges("v1_x", "v1", "x")).unwrap_err();
    assert!(matches!(err, Error::InvalidTargetPopulation { ref target_nodes, .. } if target_nodes == "x"));

    assert_eq!(net.edge_populations().count(), 0);
    assert_eq!(io.count(Level::Exception), 2);
}

#[test]
fn virtual_targets_are_rejected() {
    let (mut net, _) = recording();
    net.add_nodes(internal("A", 10)).unwrap();
    net.add_nodes(virtual_only("B", 5)).unwrap();

    let err = net.add_edges(edges("A_to_B", "A", "B")).unwrap_err();
    assert!(matches!(err, Error::InvalidTargetPopulation { ref edges, .. } if edges == "A_to_B"));
    assert_eq!(net.edge_populations().count(), 0);

    net.add_edges(edges("B_to_A", "B", "A")).unwrap();
    let all = net.edge_populations().collect::<Vec<_>>();
    assert_eq!(all.len(), 1);
    assert!(!all[0].recurrent_connections());
    assert_eq!(all[0].connection_type(), Some(ConnectionType::Virtual));
    assert!(net.recurrent_edges().is_empty());
    assert_eq!(net.virtual_edges().len(), 1);
}

#[test]
fn recurrent_edges_are_internal_to_internal() {
    let (mut net, _) = recording();
    net.add_nodes(internal("v1", 4)).unwrap();
    net.add_nodes(mixed("lm", 2, 2)).unwrap();
    net.add_nodes(virtual_only("lgn", 4)).unwrap();

    net.add_edges(edges("v1_v1", "v1", "v1")).unwrap();
    net.add_edges(edges("lgn_v1", "lgn", "v1")).unwrap();
    net.add_edges(edges("v1_lm", "v1", "lm")).unwrap();
    // names may repeat
    net.add_edges(edges("v1_v1", "v1", "v1")).unwrap();

    let all = net.edge_populations().map(|e| e.name()).collect::<Vec<_>>();
    assert_eq!(all, vec!["v1_v1", "lgn_v1", "v1_lm", "v1_v1"]);
    let recurrent = net.recurrent_edges().iter().map(|e| e.name()).collect::<Vec<_>>();
    assert_eq!(recurrent, vec!["v1_v1", "v1_lm", "v1_v1"]);
    let virt = net.virtual_edges().iter().map(|e| e.name()).collect::<Vec<_>>();
    assert_eq!(virt, vec!["lgn_v1"]);
}

#[derive(Debug)]
struct Counting {
    ids: Vec<NodeId>,
    calls: Arc<AtomicUsize>,
}

impl NodePopulation for Counting {
    fn name(&self) -> &str {
        "counted"
    }

    fn node_ids(&self) -> &[NodeId] {
        &self.ids
    }

    fn mixed_nodes(&self) -> bool {
        false
    }

    fn virtual_nodes_only(&self) -> bool {
        false
    }

    fn attribute(&self, _node_id: NodeId, _key: &str) -> Option<serde_json::Value> {
        None
    }

    fn initialize(&mut self, network: &Network) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // not registered yet while initializing
        assert!(network.node_population("counted").is_none());
        Ok(())
    }
}

#[test]
fn initialize_runs_once_before_registration() {
    let (mut net, _) = recording();
    let calls = Arc::new(AtomicUsize::new(0));
    net.add_nodes(Box::new(Counting {
        ids: vec![7, 3],
        calls: calls.clone(),
    }))
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = net
        .add_nodes(Box::new(Counting {
            ids: vec![],
            calls: calls.clone(),
        }))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateNodePopulation(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let sel = net.get_node_set("counted").unwrap().resolve(&net).unwrap();
    assert_eq!(sel["counted"], vec![7, 3]);
}

fn with_dynamics(name: &str) -> NodeTable {
    let mut table = common::node_table(name, 2, 0);
    table.types[0].attributes.insert(
        "dynamics_params".into(),
        Attribute::String("Scnn1a_473845048.json".into()),
    );
    table
}

#[test]
fn initialize_binds_components() {
    let (mut net, _) = recording();
    net.add_component("biophysical_neuron_models_dir", "/models/biophys");
    let nodes = SonataNodes::new(with_dynamics("v1")).unwrap();
    net.add_nodes(Box::new(nodes)).unwrap();
    assert!(net.node_population("v1").is_some());
}

#[test]
fn missing_component_stops_registration() {
    let (mut net, io) = recording();
    let err = net
        .add_nodes(Box::new(SonataNodes::new(with_dynamics("v1")).unwrap()))
        .unwrap_err();
    assert!(matches!(err, Error::MissingComponent(ref c) if c == "biophysical_neuron_models_dir"));
    assert!(net.node_population("v1").is_none());
    assert!(net.node_set("v1").is_none());
    assert_eq!(net.state(), State::Empty);
    assert_eq!(io.count(Level::Exception), 1);
}

#[test]
fn dynamics_params_resolved_against_component() {
    let network = {
        let mut net = Network::new();
        net.add_component("biophysical_neuron_models_dir", "/models/biophys");
        net
    };
    let mut nodes = SonataNodes::new(with_dynamics("v1")).unwrap();
    nodes.initialize(&network).unwrap();
    assert_eq!(
        nodes.dynamics_params[&1],
        std::path::PathBuf::from("/models/biophys/Scnn1a_473845048.json")
    );
}

#[test]
fn unspecialized_build_fails_loudly() {
    let (mut net, io) = recording();
    net.add_nodes(internal("v1", 1)).unwrap();

    let err = net.build(&mut Unspecialized).unwrap_err();
    assert!(matches!(err, Error::Unimplemented("build_nodes")));
    assert_eq!(net.state(), State::Failed);
    assert_eq!(io.count(Level::Exception), 1);

    let err = net.build(&mut Unspecialized).unwrap_err();
    assert!(matches!(err, Error::BuildAborted));

    let err = net.build_virtual_connections(&mut Unspecialized).unwrap_err();
    assert!(matches!(err, Error::Unimplemented("build_virtual_connections")));
}

#[derive(Default)]
struct Recording {
    calls: Vec<&'static str>,
    fail_nodes: bool,
}

impl Simulator for Recording {
    fn build_nodes(&mut self, network: &Network) -> Result<()> {
        self.calls.push("nodes");
        assert_eq!(network.node_populations().count(), 2);
        if self.fail_nodes {
            return Err(Error::Unsupported("cells".into()));
        }
        Ok(())
    }

    fn build_recurrent_edges(&mut self, network: &Network) -> Result<()> {
        self.calls.push("recurrent");
        assert_eq!(network.recurrent_edges().len(), 1);
        Ok(())
    }

    fn build_virtual_connections(&mut self, network: &Network) -> Result<()> {
        self.calls.push("virtual");
        assert_eq!(network.virtual_edges().len(), 1);
        Ok(())
    }
}

fn populated() -> Network {
    let mut net = Network::with_options(Options::default().property("optocell", "A"));
    net.add_nodes(internal("v1", 2)).unwrap();
    net.add_nodes(virtual_only("lgn", 2)).unwrap();
    net.add_edges(edges("v1_v1", "v1", "v1")).unwrap();
    net.add_edges(edges("lgn_v1", "lgn", "v1")).unwrap();
    net
}

#[test]
fn build_runs_nodes_then_recurrent_edges() {
    let mut net = populated();
    let mut sim = Recording::default();
    net.build(&mut sim).unwrap();
    net.build_virtual_connections(&mut sim).unwrap();
    assert_eq!(sim.calls, vec!["nodes", "recurrent", "virtual"]);
    assert_eq!(net.state(), State::Built);
    assert_eq!(net.property("optocell"), Some(&json!("A")));

    assert!(matches!(net.build(&mut sim).unwrap_err(), Error::AlreadyBuilt));
    assert!(matches!(
        net.add_nodes(internal("late", 1)).unwrap_err(),
        Error::AlreadyBuilt
    ));
}

#[test]
fn failed_node_build_stops_the_build() {
    let mut net = populated();
    let mut sim = Recording {
        fail_nodes: true,
        ..Default::default()
    };
    let err = net.build(&mut sim).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
    assert_eq!(sim.calls, vec!["nodes"]);
    assert_eq!(net.state(), State::Failed);
}

#[test]
fn placeholders_are_unimplemented() {
    let err = Network::from_manifest(std::path::Path::new("manifest.json"), Options::default()).unwrap_err();
    assert!(matches!(err, Error::Unimplemented("from_manifest")));
    let err = Network::from_builder((), Options::default()).unwrap_err();
    assert!(matches!(err, Error::Unimplemented("from_builder")));
}

#[test]
fn edge_population_sees_concrete_endpoints() {
    #[derive(Debug, Default)]
    struct Probe {
        seen: Option<(String, usize, String, usize)>,
    }
    impl EdgePopulation for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn source_nodes(&self) -> &str {
            "lgn"
        }
        fn target_nodes(&self) -> &str {
            "v1"
        }
        fn connection_type(&self) -> Option<ConnectionType> {
            self.seen.as_ref().map(|_| ConnectionType::Virtual)
        }
        fn initialize(&mut self, _network: &Network) -> Result<()> {
            Ok(())
        }
        fn set_connection_type(&mut self, src: &dyn NodePopulation, trg: &dyn NodePopulation) {
            self.seen = Some((src.name().into(), src.size(), trg.name().into(), trg.size()));
        }
    }

    let (mut net, _) = recording();
    net.add_nodes(internal("v1", 4)).unwrap();
    net.add_nodes(virtual_only("lgn", 6)).unwrap();
    net.add_edges(Box::new(Probe::default())).unwrap();
    assert_eq!(net.virtual_edges().len(), 1);
}
