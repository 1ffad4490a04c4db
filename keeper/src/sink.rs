//! Ledger events out of the actor thread and into charts and stdout

use alloy_primitives::Address;
use curve_ledger::math::to_f64;
use curve_ledger::{Amount, Bar, CandleAggregator, EventSink, LedgerEvent, Resolution};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Event tagged with the token it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenEvent {
    pub token: Address,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

/// `EventSink` that forwards into an unbounded channel
pub struct ChannelSink {
    token: Address,
    tx: mpsc::UnboundedSender<TokenEvent>,
}

impl ChannelSink {
    pub fn new(token: Address, tx: mpsc::UnboundedSender<TokenEvent>) -> Self {
        Self { token, tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: LedgerEvent) {
        if self.tx.send(TokenEvent { token: self.token, event }).is_err() {
            log::debug!("event channel closed, dropping event for {}", self.token);
        }
    }
}

/// Candle aggregators per token, shared between the event task and readers
#[derive(Clone, Default)]
pub struct Charts {
    inner: Arc<Mutex<HashMap<Address, CandleAggregator>>>,
}

impl Charts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, token: Address, initial_eth: Amount, initial_token: Amount, launch_time: u64) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(token, CandleAggregator::new(initial_eth, initial_token, launch_time));
        }
    }

    /// Owned copy of the bars in `[from, to]`
    pub fn bars(&self, token: &Address, resolution: Resolution, from: u64, to: u64) -> Option<Vec<Bar>> {
        let map = self.inner.lock().ok()?;
        map.get(token).map(|agg| agg.get_bars(resolution, from, to).copied().collect())
    }

    pub fn last_bar(&self, token: &Address, resolution: Resolution) -> Option<Bar> {
        let map = self.inner.lock().ok()?;
        map.get(token)?.last_bar(resolution).copied()
    }

    /// Fold one ledger event into the token's chart
    pub fn apply(&self, ev: &TokenEvent) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        let Some(agg) = map.get_mut(&ev.token) else {
            return;
        };
        match &ev.event {
            LedgerEvent::ReservesUpdated { eth_reserve, token_reserve, timestamp } => {
                agg.update_price(*eth_reserve, *token_reserve, *timestamp);
            }
            LedgerEvent::PurchaseExecuted { eth_in, timestamp, .. } => {
                agg.add_volume(to_f64(*eth_in) / 1e18, *timestamp);
            }
            LedgerEvent::SaleExecuted { eth_out, fee, timestamp, .. } => {
                agg.add_volume((to_f64(*eth_out) + to_f64(*fee)) / 1e18, *timestamp);
            }
            _ => {}
        }
    }
}

/// Drain events: update charts, then write each as a JSON line
pub async fn run_event_task<W: Write>(mut rx: mpsc::UnboundedReceiver<TokenEvent>, charts: Charts, mut out: W) {
    while let Some(ev) = rx.recv().await {
        charts.apply(&ev);
        match serde_json::to_string(&ev) {
            Ok(line) => {
                if let Err(e) = writeln!(out, "{}", line) {
                    log::error!("Failed to write event: {}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize event: {}", e),
        }
    }
    log::debug!("event channel closed");
}
