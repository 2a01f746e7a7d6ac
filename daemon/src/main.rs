//! BAP daemon: entry point for running the identity indexer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use bap_node::{init_logging, IndexerConfig, IndexerNode, IngestMode, IngestWorker};
use bap_store::ProgressStore;
use bap_store_lmdb::{check_integrity, LmdbEnvironment};
use bap_types::BlockHeight;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bap-daemon", about = "BAP/AIP identity indexer")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BAP_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the index and staging files.
    #[arg(long, env = "BAP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// WebSocket endpoint of the transaction feed.
    #[arg(long, env = "BAP_FEED_ENDPOINT")]
    feed_endpoint: Option<String>,

    /// Feed subscription id.
    #[arg(long, env = "BAP_SUBSCRIPTION_ID")]
    subscription_id: Option<String>,

    /// Lowest block to index.
    #[arg(long, env = "BAP_FROM_BLOCK")]
    from_block: Option<BlockHeight>,

    /// "direct" or "staged".
    #[arg(long, env = "BAP_INGEST_MODE")]
    ingest_mode: Option<String>,

    /// Also index unconfirmed transactions.
    #[arg(long, env = "BAP_INDEX_MEMPOOL")]
    index_mempool: bool,

    /// Disable the RPC server.
    #[arg(long, env = "BAP_DISABLE_RPC")]
    disable_rpc: bool,

    /// RPC server port.
    #[arg(long, env = "BAP_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BAP_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BAP_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the indexer until interrupted.
    Run,
    /// Print the stored checkpoint.
    Progress,
    /// Overwrite the stored checkpoint.
    SetProgress { height: BlockHeight },
    /// Replay one staging file into the index.
    Ingest {
        file: PathBuf,
        /// Checkpoint this height once the file is ingested.
        #[arg(long)]
        height: Option<BlockHeight>,
    },
    /// Check the index database and print a summary.
    Check,
}

fn parse_ingest_mode(raw: &str) -> anyhow::Result<IngestMode> {
    match raw.to_lowercase().as_str() {
        "direct" => Ok(IngestMode::Direct),
        "staged" => Ok(IngestMode::Staged),
        other => bail!("unknown ingest mode '{other}', expected 'direct' or 'staged'"),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<IndexerConfig> {
    let mut config = match &cli.config {
        Some(path) => IndexerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => IndexerConfig::default(),
    };

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(endpoint) = &cli.feed_endpoint {
        config.feed_endpoint = endpoint.clone();
    }
    if let Some(id) = &cli.subscription_id {
        config.subscription_id = id.clone();
    }
    if let Some(height) = cli.from_block {
        config.from_block = height;
    }
    if let Some(mode) = &cli.ingest_mode {
        config.ingest_mode = parse_ingest_mode(mode)?;
    }
    config.index_mempool |= cli.index_mempool;
    if cli.disable_rpc {
        config.enable_rpc = false;
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn open_store(config: &IndexerConfig) -> anyhow::Result<LmdbEnvironment> {
    let path = config.lmdb_path();
    LmdbEnvironment::open(&path, config.lmdb_map_size)
        .with_context(|| format!("opening index at {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level);

    match cli.command {
        Command::Run => {
            tracing::info!(
                "Starting BAP indexer from block {} ({:?} mode, RPC:{})",
                config.from_block,
                config.ingest_mode,
                if config.enable_rpc {
                    config.rpc_port.to_string()
                } else {
                    "off".into()
                },
            );
            let node = IndexerNode::open(config)?;

            let shutdown = node.shutdown_handle();
            tokio::spawn(async move {
                shutdown.wait_for_signal().await;
                tracing::info!("Shutdown signal received, stopping indexer");
            });

            node.run().await?;
            tracing::info!("BAP daemon exited cleanly");
        }
        Command::Progress => {
            let store = open_store(&config)?;
            match store.load_progress()? {
                Some(height) => println!("{height}"),
                None => println!("no checkpoint (indexing starts at {})", config.from_block),
            }
        }
        Command::SetProgress { height } => {
            let store = open_store(&config)?;
            store.save_progress(height)?;
            tracing::info!(height, "checkpoint overwritten");
        }
        Command::Ingest { file, height } => {
            let store = Arc::new(open_store(&config)?);
            let worker = IngestWorker::new(store.clone(), config.max_concurrent_inserts);
            let stats = worker
                .ingest_file(&file)
                .await
                .with_context(|| format!("ingesting {}", file.display()))?;
            println!("ingested {} records in {} lanes", stats.records, stats.lanes);
            if let Some(height) = height {
                store.save_progress(height)?;
                tracing::info!(height, "checkpoint saved");
            }
        }
        Command::Check => {
            let store = open_store(&config)?;
            let report = check_integrity(&store)?;
            println!(
                "{} databases, {} entries",
                report.databases_checked, report.total_entries
            );
            for error in &report.errors {
                println!("error: {error}");
            }
            if !report.is_healthy() {
                bail!("index failed its integrity check");
            }
        }
    }

    Ok(())
}
