use alertbot::api::ApexPublicClient;
use alertbot::config::{AppConfig, StoreBackend};
use alertbot::exchange::{Exchange, PaperExchange};
use alertbot::execution::AlertPipeline;
use alertbot::export::RecordOutcome;
use alertbot::models::Alert;
use alertbot::persistence::{JsonFileStore, PositionStore, RedisPositionStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "alertbot", about = "Turn trading alerts into ApeX Pro orders")]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Config profile; "production" trades mainnet. Falls back to ALERTBOT_ENV
    #[arg(long)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle a single alert given as JSON
    Submit {
        #[arg(long)]
        alert: String,
    },
    /// Handle newline-delimited JSON alerts from stdin, one at a time
    Run,
    /// Print the stored position for a strategy
    Position { strategy: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = match &cli.env {
        Some(env_name) => AppConfig::load_from(&cli.config_dir, env_name),
        None => AppConfig::load(&cli.config_dir),
    }
    .with_context(|| format!("Failed to load config from {:?}", cli.config_dir))?;

    tracing::info!("🚀 alertbot starting ({})", config.network.as_str());

    let store = connect_store(&config).await?;

    match cli.command {
        Command::Position { strategy } => {
            match store.get(&strategy).await? {
                Some(record) => println!(
                    "{}: position={} isFirstOrder={}",
                    strategy, record.position, record.is_first_order
                ),
                None => println!("{}: no trades recorded", strategy),
            }
        }
        Command::Submit { alert } => {
            let pipeline = build_pipeline(&config, store)?;
            let alert: Alert = serde_json::from_str(&alert).context("Invalid alert JSON")?;
            handle_alert(&pipeline, &alert).await?;
        }
        Command::Run => {
            let pipeline = build_pipeline(&config, store)?;
            run_stdin(&pipeline).await?;
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("alertbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect_store(config: &AppConfig) -> Result<Arc<dyn PositionStore>> {
    let store: Arc<dyn PositionStore> = match config.store.backend {
        StoreBackend::File => {
            tracing::info!("Position store: {:?}", config.store.path);
            Arc::new(JsonFileStore::new(config.store.path.clone()))
        }
        StoreBackend::Redis => Arc::new(
            RedisPositionStore::new(&config.store.redis_url)
                .await
                .context("Failed to connect to Redis")?,
        ),
    };
    Ok(store)
}

fn build_pipeline(config: &AppConfig, store: Arc<dyn PositionStore>) -> Result<AlertPipeline> {
    let market_data = ApexPublicClient::new(
        config.exchange_base_url(),
        config.exchange.requests_per_minute,
    )
    .context("Failed to build ApeX client")?;

    let balance = config.exchange.paper_balance.unwrap_or(dec!(1000));
    let exchange: Arc<dyn Exchange> = Arc::new(PaperExchange::new(
        Arc::new(market_data),
        PaperExchange::funded_account(balance),
    ));
    tracing::info!(
        "Exchange: {} over {} (balance {})",
        exchange.name(),
        config.exchange_base_url(),
        balance
    );

    Ok(AlertPipeline::from_config(config, exchange, store))
}

async fn handle_alert(pipeline: &AlertPipeline, alert: &Alert) -> Result<()> {
    let outcome = pipeline.handle(alert).await?;

    match outcome.record {
        Some(RecordOutcome::Logged(row)) => tracing::info!(
            "✅ {} {} {} -> {}",
            row.record.side,
            row.record.size,
            row.record.symbol,
            row.record.status.as_str()
        ),
        Some(RecordOutcome::StillWorking(status)) => {
            tracing::warn!("Order {} still {}", outcome.order.id, status.as_str())
        }
        Some(RecordOutcome::NotFound) => {
            tracing::warn!("Order {} not found after submission", outcome.order.id)
        }
        None => {}
    }

    Ok(())
}

async fn run_stdin(pipeline: &AlertPipeline) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!("Reading alerts from stdin...");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let alert: Alert = match serde_json::from_str(line) {
            Ok(alert) => alert,
            Err(e) => {
                tracing::error!("Skipping malformed alert: {}", e);
                continue;
            }
        };

        if let Err(e) = handle_alert(pipeline, &alert).await {
            tracing::error!("❌ Alert for {} failed: {:#}", alert.strategy, e);
        }
    }

    tracing::info!("👋 stdin closed, stopping");
    Ok(())
}
