use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docrag::api::{self, AppState};
use docrag::config::{Config, DEFAULT_CONFIG_FILE};
use docrag::db::Db;
use docrag::embedder::{self, download};
use docrag::indexer::core::Ingestor;
use docrag::search::SearchService;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrag", version, about = "Semantic search over a documentation corpus")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the collection from a documentation directory
    Ingest {
        /// Root of the documentation corpus (e.g. a react.dev checkout)
        #[arg(long)]
        docs_path: PathBuf,

        /// Swap in the rebuilt collection even if some files failed
        #[arg(long)]
        allow_partial: bool,
    },
    /// Serve the HTTP search API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one query and print the JSON response
    Search {
        query: String,

        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show the collections in the index
    Status,
    /// Fetch the embedding model files without ingesting
    DownloadModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Command::Ingest {
            docs_path,
            allow_partial,
        } => {
            config.validate()?;
            tokio::task::spawn_blocking(move || ingest(&config, &docs_path, allow_partial))
                .await
                .context("ingestion task panicked")??;
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            let state = AppState {
                search: Arc::new(search_service(&config)?),
            };
            api::serve(state, &config.bind_addr()).await?;
        }
        Command::Search { query, k } => {
            config.validate()?;
            let service = search_service(&config)?;
            let response = service.search(&query, k).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Status => {
            let db = Db::open(config.db_path()).context("Failed to open vector index")?;
            for c in db.list_collections()? {
                let dims = c.dimensions.map_or("-".to_string(), |d| d.to_string());
                println!(
                    "{}\t{} chunks\t{} dims\tcreated {}",
                    c.name, c.count, dims, c.created_at
                );
            }
        }
        Command::DownloadModel => {
            let model = config.model.clone();
            tokio::task::spawn_blocking(move || download::download_model_files(&model.repo, &model.dir))
                .await
                .context("download task panicked")??;
        }
    }

    Ok(())
}

fn ingest(config: &Config, docs_path: &std::path::Path, allow_partial: bool) -> Result<()> {
    info!("Ingesting documents from {}...", docs_path.display());

    let mut db = Db::open(config.db_path()).context("Failed to open vector index")?;
    let embedder = embedder::from_config(&config.model);

    let report = Ingestor::from_config(&mut db, embedder.as_ref(), config, allow_partial)?
        .ingest(docs_path)?;

    info!(
        "Documentation ingested successfully. Total chunks: {}",
        report.chunks
    );
    Ok(())
}

fn search_service(config: &Config) -> Result<SearchService> {
    let db = Db::open(config.db_path()).context("Failed to open vector index")?;
    Ok(SearchService::new(
        Arc::new(TokioMutex::new(db)),
        embedder::from_config(&config.model),
        config.collection_name.clone(),
        config.search_top_k,
    ))
}
