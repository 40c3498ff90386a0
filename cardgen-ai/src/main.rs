//! cardgen-ai - Content-to-card pipeline
//!
//! Headless front end for the pipeline:
//! - `generate`: turn a text file into cards (JSON on stdout), optionally
//!   approving them for delivery
//! - `sync`: replay the offline delivery queue, once or on an interval
//! - `status`: report store reachability and queue depth

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cardgen_ai::config::resolve_settings;
use cardgen_ai::models::{Card, GenerationMode};
use cardgen_ai::services::{
    AnkiConnectClient, CardStore, DeliveryQueue, GenerationClient, GenerationOrchestrator,
};
use cardgen_ai::Settings;
use cardgen_common::config::{default_database_path, load_toml_config, resolve_config_path};
use cardgen_common::db::{init_database, SettingsStore};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cardgen-ai
#[derive(Parser, Debug)]
#[command(name = "cardgen-ai")]
#[command(about = "Generate study cards from text and deliver them to a card store")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "CARDGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate cards from a text file ("-" reads stdin)
    Generate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value_t = GenerationMode::Dynamic)]
        mode: GenerationMode,

        /// Tag to apply (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Provenance label stored on every card (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,

        /// Write cards to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Approve generated cards for delivery to the store
        #[arg(long)]
        approve: bool,
    },

    /// Deliver queued cards
    Sync {
        /// Keep running, syncing every `sync_interval_secs` until Ctrl+C
        #[arg(long)]
        watch: bool,
    },

    /// Show store reachability and queue depth
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => Default::default(),
    };

    // RUST_LOG wins over the config file level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting cardgen-ai {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    let settings = resolve_settings(&toml_config);

    match args.command {
        Command::Generate {
            input,
            mode,
            tags,
            source,
            output,
            approve,
        } => {
            let source = source.or_else(|| source_label(&input));
            let cards = generate(&settings, &input, mode, &tags, source.as_deref()).await?;

            write_cards(&cards, output.as_deref())?;

            if approve {
                let queue = open_queue(toml_config.database_path.as_deref(), &settings).await?;
                match queue.on_approved(&cards).await {
                    Some(report) => info!("Delivery: {}", report.summary_line()),
                    None => info!("Auto-sync on approval is disabled; cards were not delivered"),
                }
            }
        }

        Command::Sync { watch } => {
            let queue = Arc::new(open_queue(toml_config.database_path.as_deref(), &settings).await?);

            if watch {
                info!(
                    interval_secs = settings.sync_interval.as_secs(),
                    queued = queue.queue_len().await,
                    "Watching delivery queue"
                );
                let handle = queue.spawn_periodic_sync(settings.sync_interval);
                signal::ctrl_c()
                    .await
                    .context("Failed to listen for Ctrl+C")?;
                handle.abort();
                info!("Sync stopped");
            } else {
                let delivered = queue.process_queue().await;
                info!(
                    delivered,
                    remaining = queue.queue_len().await,
                    "Sync complete"
                );
            }
        }

        Command::Status => {
            let store = AnkiConnectClient::new(&settings.store_url)?;
            let reachable = store.is_reachable().await;
            let queue = open_queue(toml_config.database_path.as_deref(), &settings).await?;

            println!(
                "store:    {} ({})",
                settings.store_url,
                if reachable { "reachable" } else { "unreachable" }
            );
            println!("deck:     {}", settings.deck_name);
            println!("queued:   {}", queue.queue_len().await);
            println!(
                "api key:  {}",
                if settings.credential().is_some() { "configured" } else { "missing" }
            );
        }
    }

    Ok(())
}

async fn generate(
    settings: &Settings,
    input: &Path,
    mode: GenerationMode,
    tags: &[String],
    source: Option<&str>,
) -> Result<Vec<Card>> {
    let content = read_input(input)?;

    let client = GenerationClient::new(&settings.generation_endpoint)?;
    let orchestrator = GenerationOrchestrator::new(Arc::new(client), settings.clone());

    let report = orchestrator
        .generate_with_report(&content, mode, tags, source)
        .await?;

    info!("Generation: {}", report.summary_line());
    Ok(report.cards)
}

async fn open_queue(database_path: Option<&Path>, settings: &Settings) -> Result<DeliveryQueue> {
    let db_path = database_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_database_path);
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let store = AnkiConnectClient::new(&settings.store_url)?;
    let queue = DeliveryQueue::load(
        Arc::new(store),
        Arc::new(SettingsStore::new(pool)),
        settings.clone(),
    )
    .await?;

    Ok(queue)
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }

    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

fn source_label(input: &Path) -> Option<String> {
    if input.as_os_str() == "-" {
        return None;
    }
    input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
}

fn write_cards(cards: &[Card], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(cards)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(cards = cards.len(), "Cards written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
