//! External collaborators the ledger calls out to

use alloy_primitives::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::events::LedgerEvent;
use crate::math::Amount;

/// Failure reported by a collaborator; the ledger maps it to its own error kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Moves real value out of the ledger (withdrawals, sweeps)
pub trait ValueTransfer {
    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), CollaboratorError>;
}

/// Creates the external pool at migration and seeds it
pub trait LiquidityPool {
    fn create_and_seed_pool(&mut self, token_amount: Amount, eth_amount: Amount) -> Result<Address, CollaboratorError>;
}

/// Unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Append-only event output
pub trait EventSink: Send {
    fn emit(&mut self, event: LedgerEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock shared between a test and the ledger under test
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Discards events
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: LedgerEvent) {}
}

/// Keeps events in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<LedgerEvent>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<LedgerEvent> {
        self.0.lock().map(|mut v| std::mem::take(&mut *v)).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: LedgerEvent) {
        if let Ok(mut v) = self.0.lock() {
            v.push(event);
        }
    }
}
