use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use hylo_trades::{
    TradeClassifier, TradeScanner, TransactionFetcher, TransactionSnapshot, create_default_config,
    load_config,
};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hylo-trades", about = "Classify Hylo xSOL trades and derive protocol metrics")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify recent transactions of a wallet's xSOL token account
    Trades {
        /// The xSOL token account (not the wallet)
        #[arg(long)]
        account: String,

        /// How many recent transactions to examine
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Classify a transaction snapshot stored as JSON
    Classify {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        account: String,
    },

    /// Read supplies and derive NAV, collateral ratio and leverage
    Metrics {
        /// Total reserve in lamports
        #[arg(long)]
        reserve_lamports: u64,

        /// SOL price in USD
        #[arg(long)]
        sol_usd: String,
    },
}

fn init_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn ensure_config(path: &Path) -> Result<()> {
    if !path.exists() {
        create_default_config(path)?;
        eprintln!("Created default config at {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ensure_config(&cli.config)?;
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    init_logging(&config.log_level);
    info!("Starting Hylo trade tracker with {}", cli.config.display());
    config.log_summary();

    let registry = Arc::new(config.registry);

    match cli.command {
        Command::Trades { account, limit } => {
            let account = Pubkey::from_str(&account)
                .map_err(|e| anyhow!("Invalid token account {}: {}", account, e))?;

            let fetcher = Arc::new(TransactionFetcher::new(&config.monitor));
            let scanner = TradeScanner::new(fetcher, registry, config.monitor.concurrency);
            let report = scanner.scan(&account, limit).await?;

            for trade in &report.trades {
                println!("{}", serde_json::to_string(trade)?);
            }
            for failure in &report.failures {
                warn!("{}: {}", failure.signature, failure.reason);
            }
            info!(
                "{} trades in {} transactions ({} failures)",
                report.trades.len(),
                report.scanned,
                report.failures.len()
            );
        }
        Command::Classify { file, account } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let snapshot = TransactionSnapshot::from_json(&text)
                .with_context(|| format!("Invalid snapshot in {}", file.display()))?;

            let classifier = TradeClassifier::new(registry);
            let result = classifier.classify(&snapshot, &account)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Metrics {
            reserve_lamports,
            sol_usd,
        } => {
            let sol_usd = Decimal::from_str(&sol_usd)
                .map_err(|e| anyhow!("Invalid SOL price {}: {}", sol_usd, e))?;

            let fetcher = TransactionFetcher::new(&config.monitor);
            let snapshot = fetcher
                .protocol_snapshot(&registry.catalog, reserve_lamports, sol_usd)
                .await?;

            match snapshot.derive() {
                Ok(metrics) => {
                    println!("{}", serde_json::to_string_pretty(&metrics)?);
                    info!(
                        "{} ${} / {} ${}",
                        registry.catalog.leveraged().symbol,
                        metrics.leveraged_price_usd(),
                        registry.catalog.stable().symbol,
                        metrics.stable_price_usd()
                    );
                }
                Err(e) => {
                    error!("Protocol state not usable at slot {}: {}", snapshot.slot, e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
