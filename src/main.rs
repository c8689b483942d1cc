use clap::{Parser, Subcommand};
use std::io::Write;
use simnet::{
    adaptor::AdaptorRegistry,
    err::Context,
    population::ConnectionType,
    reader::CsvReader,
    sonata, Network, Options,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simnet", version, about = "Assemble and check SONATA networks")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load a simulation config and validate its network
    Check {
        /// simulation_config.json
        config: String,
        /// Also resolve and list the node sets
        #[arg(long)]
        node_sets: bool,
        /// Column separator of the CSV tables
        #[arg(long, default_value_t = ' ')]
        delimiter: char,
    },
}

fn check(config: &str, node_sets: bool, delimiter: char, out: &mut impl Write) -> anyhow::Result<()> {
    let delimiter = u8::try_from(delimiter).context("Delimiter must be a single byte")?;
    let mut adaptors = AdaptorRegistry::new();
    sonata::register(&mut adaptors);
    let reader = CsvReader { delimiter };
    let network = Network::from_config(config, &reader, Options::default().adaptors(adaptors))
        .with_context(|| format!("Assembling network from {config}"))?;

    writeln!(out, "Node populations")?;
    for pop in network.node_populations() {
        let kind = if pop.virtual_nodes_only() {
            "virtual"
        } else if pop.mixed_nodes() {
            "mixed"
        } else {
            "internal"
        };
        writeln!(out, "  {:<24} {:>8} nodes  {kind}", pop.name(), pop.size())?;
    }
    writeln!(out, "Edge populations")?;
    for pop in network.edge_populations() {
        let kind = match pop.connection_type() {
            Some(ConnectionType::Recurrent) => "recurrent",
            Some(ConnectionType::Virtual) => "virtual",
            None => "unset",
        };
        writeln!(
            out,
            "  {:<24} {} -> {}  {kind}",
            pop.name(),
            pop.source_nodes(),
            pop.target_nodes()
        )?;
    }
    if node_sets {
        writeln!(out, "Node sets")?;
        for name in network.node_set_names() {
            let count = network
                .get_node_set(name)
                .and_then(|set| set.count(&network))
                .with_context(|| format!("Resolving node set {name}"))?;
            writeln!(out, "  {name:<24} {count:>8} nodes")?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check {
            config,
            node_sets,
            delimiter,
        } => check(&config, node_sets, delimiter, &mut std::io::stdout().lock()),
    }
}
