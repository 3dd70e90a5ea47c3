//! doctrine CLI tool
//!
//! Command-line interface for running belief-graph scenarios through the doctrine loop engine.
//!
//! ## Commands
//!
//! - `simulate <scenario.toml>`: Build a graph from a scenario file, run detection and the
//!   listed resolution attempts, then print loops and recent events
//! - `config`: Print the effective engine configuration; with `--init`, also write it back to
//!   the `--config` file so missing keys are filled in with their defaults
//!
//! ## Scenario files
//!
//! Nodes are named locally so the rest of the file can refer to them:
//!
//! ```toml
//! [[nodes]]
//! name = "a"
//! content = "Order precedes meaning"
//! source = "reflection"
//! contradicts = ["c"]
//!
//! [[connections]]
//! parent = "a"
//! child = "b"
//!
//! [[strengths]]
//! node = "a"
//! value = 0.9
//!
//! [[resolutions]]
//! members = ["a", "b", "c"]
//! method = "tribunal_processing"
//! ```
//!
//! Steps are applied in order: nodes, contradictions, connections, strengths, a full scan, then
//! resolution attempts.

use clap::{Parser, Subcommand};
use doctrine_loop::{
    config::{EngineConfig, EngineConfigProvider, TomlConfigProvider},
    engine::DoctrineEngine,
    properties::{LoopId, NodeId, ResolutionMethod, SourceType},
    DoctrineError,
};
use serde::Deserialize;
use std::{collections::BTreeMap, fs::read_to_string, path::PathBuf};

#[derive(Parser)]
#[command(name = "doctrine")]
#[command(author, version, about = "Detect and resolve self-reinforcing belief loops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file through the engine and report the resulting loops
    Simulate {
        /// Path to the scenario TOML file
        scenario: PathBuf,

        /// Engine configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a JSON snapshot instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the effective engine configuration
    Config {
        /// Engine configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the effective configuration to the config file
        #[arg(long, requires = "config")]
        init: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Scenario {
    nodes: Vec<ScenarioNode>,
    connections: Vec<ScenarioConnection>,
    strengths: Vec<ScenarioStrength>,
    resolutions: Vec<ScenarioResolution>,
}

#[derive(Debug, Deserialize)]
struct ScenarioNode {
    name: String,
    content: String,
    #[serde(default)]
    source: SourceType,
    #[serde(default)]
    contradicts: Vec<String>,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScenarioConnection {
    parent: String,
    child: String,
}

#[derive(Debug, Deserialize)]
struct ScenarioStrength {
    node: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ScenarioResolution {
    members: Vec<String>,
    method: ResolutionMethod,
}

struct Simulation {
    engine: DoctrineEngine,
    names: BTreeMap<String, NodeId>,
}

impl Simulation {
    fn resolve(&self, name: &str) -> Result<NodeId, DoctrineError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| DoctrineError::NotFound(format!("scenario node '{name}'")))
    }

    fn run(engine: DoctrineEngine, scenario: &Scenario) -> Result<Self, DoctrineError> {
        let mut sim = Simulation {
            engine,
            names: BTreeMap::new(),
        };

        for node in scenario.nodes.iter() {
            let id = sim.engine.add_node(node.content.clone(), node.source, []);
            if sim.names.insert(node.name.clone(), id).is_some() {
                return Err(DoctrineError::Custom(format!(
                    "scenario node '{}' is declared twice",
                    node.name
                )));
            }
            for evidence in node.evidence.iter() {
                sim.engine.add_supporting_evidence(&id, evidence.clone())?;
            }
        }
        for node in scenario.nodes.iter() {
            let id = sim.resolve(&node.name)?;
            for other in node.contradicts.iter() {
                sim.engine.add_contradiction(&id, &sim.resolve(other)?)?;
            }
        }
        for connection in scenario.connections.iter() {
            sim.engine
                .add_connection(&sim.resolve(&connection.parent)?, &sim.resolve(&connection.child)?)?;
        }
        for strength in scenario.strengths.iter() {
            sim.engine
                .update_node_strength(&sim.resolve(&strength.node)?, strength.value)?;
        }

        let reported = sim.engine.detect_all_loops();
        tracing::info!("Full scan reported {reported} cycles");

        for resolution in scenario.resolutions.iter() {
            let members = resolution
                .members
                .iter()
                .map(|name| sim.resolve(name))
                .collect::<Result<Vec<_>, _>>()?;
            let loop_id = LoopId::from_members(&members);
            let success = sim
                .engine
                .attempt_loop_resolution(&loop_id, resolution.method)?;
            tracing::info!(
                "{} on [{}]: {}",
                resolution.method,
                resolution.members.join(", "),
                if success { "success" } else { "failure" }
            );
        }
        Ok(sim)
    }

    fn name_of(&self, id: &NodeId) -> String {
        self.names
            .iter()
            .find(|(_, known)| *known == id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn print_table(&self) {
        let loops = self.engine.list_loops();
        println!("{} loop(s)", loops.len());
        for lp in loops.iter() {
            let members = lp
                .nodes
                .iter()
                .map(|id| self.name_of(id))
                .collect::<Vec<_>>()
                .join(" -> ");
            println!(
                "  {} [{members}] status={} strength={:.3} tension={:.3} cycles={} attempts={}",
                lp.id,
                lp.status,
                lp.cycle_strength,
                lp.contradiction_tension,
                lp.cycle_count,
                lp.resolution_attempts.len()
            );
        }

        let events = self.engine.recent_events();
        println!("{} recent event(s)", events.len());
        for event in events.iter() {
            println!("  {}: {}", event.event_type, event.details);
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig, DoctrineError> {
    match path {
        Some(path) => TomlConfigProvider::new(path).get_config(),
        None => Ok(EngineConfig::default()),
    }
}

/// Render the effective configuration, writing it through to `path` first when `init` is set.
fn effective_config(path: Option<PathBuf>, init: bool) -> Result<String, DoctrineError> {
    let Some(path) = path else {
        if init {
            return Err(DoctrineError::Config(
                "--init needs a --config file to write".to_string(),
            ));
        }
        return EngineConfig::default().to_toml_string();
    };
    let provider = TomlConfigProvider::new(path);
    let config = provider.get_config()?;
    if init {
        provider.set_config(&config)?;
        tracing::info!("Wrote engine config to {:?}", provider.path());
    }
    config.to_toml_string()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            json,
        } => {
            let config = load_config(config)?;
            let scenario: Scenario = toml::from_str(&read_to_string(&scenario)?)?;

            // Detection is run explicitly once the scenario is applied.
            let engine = DoctrineEngine::with_runtime(config, None);
            let sim = Simulation::run(engine, &scenario)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&sim.engine.snapshot())?);
            } else {
                sim.print_table();
            }
            Ok(())
        }

        Commands::Config { config, init } => {
            print!("{}", effective_config(config, init)?);
            Ok(())
        }
    }
}
