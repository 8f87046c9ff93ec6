//! Command-line front end for the market simulator.
//!
//! Loads a JSON simulation config, runs the round loop and prints a
//! per-round table plus a final agent summary. Ctrl-C stops the run
//! cleanly between rounds. `--output` additionally writes the full
//! per-round snapshot history as JSON for downstream analysis.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_sim_core::{
    AgentSeed, MarketSnapshot, RoundResult, SimulationConfig, SimulationDriver,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "market-sim", about = "Repeated double-auction market simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a JSON config file
    Run {
        /// Path to the simulation config
        #[arg(short, long)]
        config: PathBuf,

        /// Write the per-round snapshot history as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a config file without running it
    Check {
        /// Path to the simulation config
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print an example config to stdout
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, output } => run(config, output).await,
        Commands::Check { config } => check(config),
        Commands::ExampleConfig => example_config(),
    }
}

fn load_config(path: &PathBuf) -> Result<SimulationConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: SimulationConfig =
        serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

async fn run(config_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let precision = config.price_precision;

    let mut driver = SimulationDriver::new(config).context("configuration rejected")?;

    let stop = driver.stop_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current round");
            stop.stop();
        }
    });

    let results = driver.run().await.context("simulation failed")?;

    println!("round  orders  trades  volume  clearing price");
    for result in &results {
        println!(
            "{:>5}  {:>6}  {:>6}  {:>6}  {:>14}",
            result.round,
            result.num_orders,
            result.num_transactions,
            result.volume,
            format_price(result.clearing_price, precision),
        );
    }

    print_agent_summary(&driver);
    print_run_summary(&driver, &results, precision);

    if let Some(failure) = driver.first_oracle_failure() {
        warn!(
            round = failure.round,
            agent_id = %failure.agent_id,
            message = %failure.message,
            "at least one oracle call failed during the run"
        );
    }

    if let Some(path) = output {
        write_history(&path, driver.history())?;
        info!(path = %path.display(), "wrote snapshot history");
    }

    Ok(())
}

fn check(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    config.validate().context("configuration rejected")?;
    println!(
        "ok: {} rounds, {} agents",
        config.num_rounds,
        config.agent_roster.len()
    );
    Ok(())
}

fn example_config() -> Result<()> {
    let config = SimulationConfig::new(
        10,
        vec![
            AgentSeed::buyer("buyer_1", 10_000, 2_000),
            AgentSeed::buyer("buyer_2", 8_000, 1_800),
            AgentSeed::seller("seller_1", 10, 1_000),
            AgentSeed::seller("seller_2", 8, 1_200),
        ],
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_agent_summary(driver: &SimulationDriver) {
    println!("\nagent        role    funds       inventory");
    let snapshot = driver.snapshot();
    for agent in &snapshot.agents {
        println!(
            "{:<12} {:<7} {:>10}  {:>9}",
            agent.agent_id,
            agent.role.to_string(),
            format_price(Some(agent.funds), driver.config().price_precision),
            agent.inventory,
        );
    }
}

fn print_run_summary(driver: &SimulationDriver, results: &[RoundResult], precision: u32) {
    let total_volume: i64 = results.iter().map(|r| r.volume).sum();
    let total_trades: usize = results.iter().map(|r| r.num_transactions).sum();
    println!(
        "\n{} rounds, {} trades, {} units, last price {}",
        results.len(),
        total_trades,
        total_volume,
        format_price(driver.state().last_traded_price(), precision),
    );
}

fn write_history(path: &PathBuf, history: &[MarketSnapshot]) -> Result<()> {
    let json = serde_json::to_string_pretty(history)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Render minor units at the configured decimal scale ("-" when absent)
fn format_price(price: Option<i64>, precision: u32) -> String {
    match price {
        None => "-".to_string(),
        Some(p) if precision == 0 => p.to_string(),
        Some(p) => {
            let scale = 10i64.pow(precision);
            let sign = if p < 0 { "-" } else { "" };
            let abs = p.abs();
            format!(
                "{sign}{}.{:0width$}",
                abs / scale,
                abs % scale,
                width = precision as usize
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_two_decimals() {
        assert_eq!(format_price(Some(1_800), 2), "18.00");
        assert_eq!(format_price(Some(1_805), 2), "18.05");
        assert_eq!(format_price(Some(5), 2), "0.05");
        assert_eq!(format_price(Some(-1_800), 2), "-18.00");
        assert_eq!(format_price(None, 2), "-");
    }

    #[test]
    fn test_format_price_zero_precision() {
        assert_eq!(format_price(Some(42), 0), "42");
    }
}
