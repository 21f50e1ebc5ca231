//! `podping` command-line relay.
//!
//! ```text
//! podping [--config relay.toml] watch [--from-block N] [--head] [--json]
//! podping [--config relay.toml] post URL... [--reason update] [--medium podcast] [--dry-run]
//! podping [--config relay.toml] credits [ACCOUNT]
//! ```
//!
//! The signing account comes from `writer.account` or `PODPING_HIVE_ACCOUNT`;
//! the posting key only ever from `PODPING_HIVE_POSTING_KEY`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use podping_relay::blockchain::{CommandSigner, HiveRpcClient, NodeRpc, PostingKey};
use podping_relay::config::{load_or_default, PodpingConfig, ReadMode};
use podping_relay::events::{EventDispatcher, HandlerError};
use podping_relay::lifecycle::signals;
use podping_relay::observability::{logging, metrics};
use podping_relay::reader::{ChainReader, StartFrom};
use podping_relay::resilience::RetryPolicy;
use podping_relay::{ChainWriter, CreditGauge, Medium, NodePool, PodpingError, Reason};

#[derive(Parser)]
#[command(name = "podping")]
#[command(about = "Publish and follow podcast feed notifications on Hive", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the chain and report every notification
    Watch {
        /// Replay from this block instead of starting at the frontier
        #[arg(long)]
        from_block: Option<u64>,
        /// Follow the head block instead of the irreversible one
        #[arg(long)]
        head: bool,
        /// Print each notification as a JSON line on stdout
        #[arg(long)]
        json: bool,
    },
    /// Publish feed URLs
    Post {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value_t = Reason::Update)]
        reason: Reason,
        #[arg(long, default_value_t = Medium::Podcast)]
        medium: Medium,
        /// Validate and pack without submitting
        #[arg(long)]
        dry_run: bool,
    },
    /// Show remaining resource credits
    Credits {
        /// Defaults to the configured writer account
        account: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "podping starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(NodePool::from_config(&config)?);
    let rpc: Arc<dyn NodeRpc> = Arc::new(HiveRpcClient::new(&config.timeouts)?);
    let retry = RetryPolicy::from(&config.retries);

    tracing::info!(
        nodes = config.nodes.len(),
        max_attempts = retry.max_attempts,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Watch { from_block, head, json } => {
            watch(&config, pool, rpc, retry, from_block, head, json).await?
        }
        Commands::Post { urls, reason, medium, dry_run } => {
            post(&config, pool, rpc, retry, &urls, reason, medium, dry_run).await?
        }
        Commands::Credits { account } => {
            let account = account.unwrap_or_else(|| config.writer.account.clone());
            let report = CreditGauge::new(pool, rpc)
                .with_retry_policy(retry)
                .get_credits(&account)
                .await?;
            println!(
                "{}: {:.2}% ({} / {})",
                report.account, report.percentage, report.current_mana, report.max_mana
            );
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn watch(
    config: &PodpingConfig,
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    retry: RetryPolicy,
    from_block: Option<u64>,
    head: bool,
    json: bool,
) -> Result<(), PodpingError> {
    let mut reader_config = config.reader.clone();
    if head {
        reader_config.read_mode = ReadMode::Head;
    }
    let start = from_block.map_or_else(|| StartFrom::from_config(&reader_config), StartFrom::Block);

    let dispatcher = Arc::new(EventDispatcher::new(Duration::from_millis(
        reader_config.handler_timeout_ms,
    )));
    dispatcher.subscribe_fn("stdout", move |event| async move {
        if json {
            let line = serde_json::to_string(&event).map_err(HandlerError::new)?;
            println!("{}", line);
        } else {
            for url in &event {
                println!(
                    "{} {} {} {} {}",
                    event.block_number, event.account, event.medium, event.reason, url
                );
            }
        }
        Ok::<(), HandlerError>(())
    });

    let reader = ChainReader::new(pool, rpc, dispatcher, reader_config).with_retry_policy(retry);
    let handle = reader.handle();

    tokio::spawn(async move {
        signals::ctrl_c().await;
        handle.stop();
    });

    let cursor = reader.run(start).await?;
    let stats = reader.handle().stats();
    tracing::info!(
        cursor,
        blocks = stats.blocks_processed,
        notifications = stats.events_delivered,
        urls = stats.urls_seen,
        "Watch finished"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn post(
    config: &PodpingConfig,
    pool: Arc<NodePool>,
    rpc: Arc<dyn NodeRpc>,
    retry: RetryPolicy,
    urls: &[String],
    reason: Reason,
    medium: Medium,
    dry_run: bool,
) -> Result<(), PodpingError> {
    let dry_run = dry_run || config.writer.dry_run;
    let mut builder = ChainWriter::builder(config.writer.account.clone(), pool, rpc)
        .config(&config.writer)
        .retry_policy(retry)
        .dry_run(dry_run);

    if !dry_run {
        let key = PostingKey::from_env()?;
        let signer = CommandSigner::new(&config.writer.signer_command, key)?;
        builder = builder.signer(Arc::new(signer));
    }

    let writer = builder.build()?;
    match writer.post(urls, reason, medium).await {
        Ok(results) => {
            for result in results {
                println!(
                    "{} block={} urls={}{}",
                    result.transaction_id,
                    result.block_number,
                    result.url_count,
                    if result.dry_run { " (dry run)" } else { "" }
                );
            }
            Ok(())
        }
        Err(err) => {
            for result in &err.completed {
                println!(
                    "{} block={} urls={}",
                    result.transaction_id, result.block_number, result.url_count
                );
            }
            Err(err.error)
        }
    }
}
