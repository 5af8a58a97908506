//! chronx-node — the ChronX ledger node binary.
//!
//! Startup sequence:
//!   1. Load configuration
//!   2. Build the TimeOracle, then the L1 ledger and L2 transaction engine
//!      on top of it
//!   3. Build the L3 settlement engine and spawn its periodic loop
//!   4. Run until Ctrl-C, then signal the settlement loop to stop

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use chronx_consensus::SettlementEngine;
use chronx_core::amount::Amount;
use chronx_state::{Ledger, TransactionEngine};
use chronx_timelock::TimeOracle;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "chronx-node",
    version,
    about = "ChronX ledger node — L1 supply ledger, L2 transaction engine, L3 settlement"
)]
struct Args {
    /// Path to the node's JSON configuration file.
    #[arg(long, default_value = "chronx-node.json")]
    config: PathBuf,

    /// Override `batch_size` from the config file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override `settlement_interval` (seconds) from the config file.
    #[arg(long)]
    settlement_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chronx=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("ChronX node starting");

    let mut config = Config::load(&args.config).context("loading node configuration")?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(interval) = args.settlement_interval {
        config.settlement_interval = interval;
    }

    if config.reserve_address != "RESERVE" {
        warn!(
            configured = %config.reserve_address,
            "reserve_address in config does not match the reserved RESERVE address; ignoring"
        );
    }
    if config.fee_address != "FEES" {
        warn!(
            configured = %config.fee_address,
            "fee_address in config does not match the reserved FEES address; ignoring"
        );
    }

    // ── TimeOracle ──────────────────────────────────────────────────────────
    let time_oracle = Arc::new(
        TimeOracle::new(
            config.time_oracle_secret.into_bytes(),
            Duration::from_secs(config.time_oracle_max_drift),
            Duration::from_secs(config.time_oracle_proof_validity),
        )
        .context("constructing time oracle")?,
    );

    // ── L1 ledger ───────────────────────────────────────────────────────────
    let initial_supply = Amount::parse(&config.initial_supply)
        .with_context(|| format!("parsing initial_supply {:?}", config.initial_supply))?;
    let ledger = Arc::new(Ledger::new(
        initial_supply,
        config.min_inflation,
        config.max_inflation,
        &time_oracle,
    ));
    ledger.verify_integrity().context("verifying genesis ledger integrity")?;
    info!(total_supply = %ledger.get_total_supply(), "L1 ledger ready");

    // ── L2 transaction engine ────────────────────────────────────────────────
    let tx_engine = Arc::new(TransactionEngine::new());
    info!("L2 transaction engine ready");

    // ── L3 settlement engine ─────────────────────────────────────────────────
    let settlement_engine = Arc::new(SettlementEngine::new(
        tx_engine.clone(),
        time_oracle.clone(),
        config.batch_size,
        Duration::from_secs(config.settlement_interval),
    ));

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let settlement_task = tokio::spawn(settlement_engine.clone().run(cancel_rx));

    info!("node running — awaiting Ctrl-C");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown requested — stopping settlement loop");

    cancel_tx.send(true).ok();
    settlement_task.await.context("joining settlement loop")?;

    info!("ChronX node stopped");
    Ok(())
}
