//! Options strategy backtester CLI.
//!
//! # Usage
//!
//! ```bash
//! # Run a backtest and print the summary
//! options-backtest run --config strategy.toml --data quotes.csv
//!
//! # Monthly periods, monthly returns table and a JSON trade log
//! options-backtest run --config strategy.toml --data quotes.csv --monthly --trades-out trades.json
//!
//! # Check a data file loads
//! options-backtest validate --data quotes.csv
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use options_backtest::backtest::BacktestEngine;
use options_backtest::config::RunConfig;
use options_backtest::data::{DataLoader, DataSource, Granularity, Schema};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "options-backtest")]
#[command(about = "Event-driven options strategy backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest with the given configuration
    Run {
        /// Path to TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to options quotes CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Step one period per month instead of the configured granularity
        #[arg(long)]
        monthly: bool,

        /// Write the trade log as JSON
        #[arg(long)]
        trades_out: Option<PathBuf>,
    },

    /// Load a data file and report its periods
    Validate {
        /// Path to options quotes CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Optional configuration providing the column schema
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn cmd_run(
    config_path: PathBuf,
    data_path: PathBuf,
    monthly: bool,
    trades_out: Option<PathBuf>,
) -> Result<()> {
    let mut config = RunConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if monthly {
        config.backtest.granularity = Granularity::Monthly;
    }

    let data = DataLoader::new(config.schema.clone())
        .load_csv(&data_path)
        .with_context(|| format!("Failed to load data {}", data_path.display()))?;

    let granularity = config.backtest.granularity;
    let engine = BacktestEngine::new(config.backtest.clone())
        .with_strategy(config.build_strategy())
        .with_data(data);
    let result = engine.run(granularity)?;

    println!("{}", SEPARATOR);
    println!("Backtest Results");
    println!("{}", SEPARATOR);
    if let Some((start, end)) = result.date_range {
        println!("  Period: {} to {}", start, end);
    }
    println!("  Periods: {} ({:?})", result.periods, result.granularity);
    println!("  Initial capital: {}", result.initial_capital);
    println!("  Final capital: {}", result.final_capital);
    println!("  Orders: {}", result.trade_log.len());
    println!("  Open positions: {}", result.open_positions.len());
    println!("  Skipped entries: {}", result.skipped_entries);
    println!();
    print!("{}", result.summary());

    let monthly_returns = result.monthly_returns();
    if !monthly_returns.is_empty() {
        println!("\nMonthly Returns (%)");
        print!("{}", monthly_returns);
    }
    println!("{}", SEPARATOR);

    if let Some(path) = trades_out {
        let json = serde_json::to_string_pretty(&result.trade_log)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write trade log {}", path.display()))?;
        println!("Trade log written to {}", path.display());
    }

    Ok(())
}

fn cmd_validate(data_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let schema = match config_path {
        Some(path) => RunConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .schema,
        None => Schema::default(),
    };

    let data = DataLoader::new(schema)
        .load_csv(&data_path)
        .with_context(|| format!("Failed to load data {}", data_path.display()))?;

    let dates = data.dates();
    println!("{}", SEPARATOR);
    println!("Data Validation");
    println!("{}", SEPARATOR);
    println!("  File: {}", data_path.display());
    println!("  Quotes: {}", data.total_quotes());
    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        println!("  Date range: {} to {}", first, last);
    }
    println!("  Daily periods: {}", data.iter_dates().ngroups());
    println!("  Monthly periods: {}", data.iter_months().ngroups());
    println!("{}", SEPARATOR);

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("options_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            monthly,
            trades_out,
        } => cmd_run(config, data, monthly, trades_out),
        Commands::Validate { data, config } => cmd_validate(data, config),
    }
}
