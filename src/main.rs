use anyhow::Result;
use clap::{Parser, Subcommand};
use papergraph::graph::GraphStore;
use papergraph::ingest::read_document;
use papergraph::llm::{ChatClient, ChatModel};
use papergraph::narrative::NarrativeKind;
use papergraph::{Config, Pipeline};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "papergraph")]
#[command(about = "Build a knowledge graph and research notes from paper text")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a graph and narrative reports from a plain-text paper ("-" reads stdin)
    Process {
        path: PathBuf,

        /// Do not write the extracted graph to the store
        #[arg(long)]
        no_store: bool,

        /// Only build the graph; skip key topics, hypotheses and future work
        #[arg(long)]
        skip_narratives: bool,
    },
    /// Print every stored node and edge as JSON
    Graph,
    /// Delete every stored node and edge
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.papergraph.log_level),
    )
    .init();

    match config.source() {
        Some(path) => log::debug!("Loaded configuration from {}", path.display()),
        None => log::debug!("No config.toml found, using defaults"),
    }

    match cli.command {
        Command::Process {
            path,
            no_store,
            skip_narratives,
        } => run_process(&config, path, no_store, skip_narratives).await,
        Command::Graph => run_graph(&config).await,
        Command::Clear => run_clear(&config).await,
    }
}

/// Open the store or fail the command; store-only commands have nothing to degrade to.
fn open_store(config: &Config) -> Result<GraphStore> {
    let store = GraphStore::open(config.db_path());
    if !store.is_available() {
        anyhow::bail!("Graph store at {} is unavailable", config.db_path().display());
    }
    Ok(store)
}

async fn run_process(
    config: &Config,
    path: PathBuf,
    no_store: bool,
    skip_narratives: bool,
) -> Result<()> {
    let text = read_document(&path)?;
    log::info!("Read {} characters from {}", text.chars().count(), path.display());

    let model: Arc<dyn ChatModel> = Arc::new(ChatClient::new(&config.model, config.api_key()?)?);
    let store = if no_store {
        None
    } else {
        Some(GraphStore::open(config.db_path()))
    };
    let pipeline = Pipeline::from_config(config, model, store);

    let report = if skip_narratives {
        let outcome = pipeline.process_document(&text).await;
        json!({ "graph": outcome })
    } else {
        let analysis = pipeline.analyze(&text).await;
        let mut narratives = Map::new();
        for kind in NarrativeKind::ALL {
            narratives.insert(
                kind.key().to_string(),
                json!({
                    "title": kind.title(),
                    "ok": analysis.narratives.get(kind).is_ok(),
                    "markdown": analysis.narratives.render(kind),
                }),
            );
        }
        json!({ "graph": analysis.graph, "narratives": Value::Object(narratives) })
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    pipeline.shutdown()?;
    Ok(())
}

async fn run_graph(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let graph = store.fetch_all().await?;
    log::info!("{} nodes, {} edges", graph.nodes.len(), graph.edges.len());
    println!("{}", serde_json::to_string_pretty(&graph)?);
    store.close()?;
    Ok(())
}

async fn run_clear(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    store.clear().await?;
    store.close()?;
    Ok(())
}
