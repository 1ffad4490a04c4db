//! Curve Keeper
//!
//! Reads JSON-line commands on stdin, answers on stdout, and streams
//! ledger events to stdout as they happen.

use alloy_primitives::utils::format_ether;
use anyhow::Result;
use curve_keeper::commands::{self, parse_line};
use curve_keeper::sink::run_event_task;
use curve_keeper::{Charts, Keeper, KeeperConfig, Settlement, SimulatedSettlement};
use curve_ledger::SystemClock;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Curve Keeper");

    // Load configuration
    let config = KeeperConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using local defaults", e);
        KeeperConfig::default_local()
    });

    log::info!("Factory: {}", config.factory);
    log::info!("Admin: {}", config.admin);
    log::info!("Settlement deadline: {:?}", config.settlement_deadline());

    let settlement = Arc::new(SimulatedSettlement::new(&config.simulation));
    let charts = Charts::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let keeper = Keeper::new(&config, settlement, Arc::new(SystemClock), events_tx, charts.clone())?;

    tokio::spawn(run_event_task(events_rx, charts, std::io::stdout()));

    log::info!("Keeper service started. Reading commands from stdin...");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status = time::interval(Duration::from_secs(config.status_interval_secs.max(1)));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::info!("stdin closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match parse_line(&line) {
                    Ok(req) => commands::execute(&keeper, req).await,
                    Err(resp) => resp,
                };
                match serde_json::to_string(&response) {
                    Ok(out) => {
                        let mut stdout = std::io::stdout().lock();
                        writeln!(stdout, "{}", out)?;
                    }
                    Err(e) => log::error!("Failed to serialize response: {}", e),
                }
            }
            _ = status.tick() => {
                log_status(&keeper).await;
            }
        }
    }

    Ok(())
}

/// One line per token: state, collected value, pending withdrawals
async fn log_status<S: Settlement>(keeper: &Keeper<S>) {
    let tokens = keeper.tokens();
    if tokens.is_empty() {
        log::debug!("No tokens deployed");
        return;
    }

    for token in tokens {
        let snapshot = match keeper.ledger(&token) {
            Ok(h) => h.snapshot().await,
            Err(e) => Err(e),
        };
        match snapshot {
            Ok(s) => log::info!(
                "{} {:?} collected={} treasury={} pending={} supply={}",
                token,
                s.state,
                format_ether(s.total_collected),
                format_ether(s.treasury),
                format_ether(s.pending_withdrawals),
                format_ether(s.total_supply),
            ),
            Err(e) => log::error!("Status for {} unavailable: {}", token, e),
        }
    }
}
