//! Settlement: moving real value and creating the migration pool
//!
//! The ledger calls its collaborators synchronously from the actor
//! thread. `SettlementBridge` runs an async `Settlement` on the runtime
//! and bounds every call by a deadline, so a hung settlement surfaces as
//! a failed transfer or a failed hand-off instead of stalling the ledger.

use alloy_primitives::{keccak256, Address};
use curve_ledger::{Amount, CollaboratorError, LiquidityPool, ValueTransfer};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;

use crate::config::SimulationConfig;
use crate::error::KeeperError;

pub trait Settlement: Send + Sync + 'static {
    fn transfer(&self, to: Address, amount: Amount) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    fn create_pool(
        &self,
        token_amount: Amount,
        eth_amount: Amount,
    ) -> impl Future<Output = Result<Address, CollaboratorError>> + Send;
}

impl<S: Settlement> Settlement for Arc<S> {
    fn transfer(&self, to: Address, amount: Amount) -> impl Future<Output = Result<(), CollaboratorError>> + Send {
        (**self).transfer(to, amount)
    }

    fn create_pool(
        &self,
        token_amount: Amount,
        eth_amount: Amount,
    ) -> impl Future<Output = Result<Address, CollaboratorError>> + Send {
        (**self).create_pool(token_amount, eth_amount)
    }
}

/// In-process stand-in with configurable latency and failures
#[derive(Debug, Default)]
pub struct SimulatedSettlement {
    transfer_latency: Duration,
    pool_latency: Duration,
    failing_recipients: Mutex<HashSet<Address>>,
    fail_pool: AtomicBool,
    pools_created: AtomicU64,
    transfers: Mutex<Vec<(Address, Amount)>>,
}

impl SimulatedSettlement {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            transfer_latency: Duration::from_millis(config.transfer_latency_ms),
            pool_latency: Duration::from_millis(config.pool_latency_ms),
            failing_recipients: Mutex::new(config.failing_recipients.iter().copied().collect()),
            fail_pool: AtomicBool::new(config.fail_pool),
            ..Self::default()
        }
    }

    pub fn set_recipient_failing(&self, who: Address, failing: bool) {
        if let Ok(mut set) = self.failing_recipients.lock() {
            if failing {
                set.insert(who);
            } else {
                set.remove(&who);
            }
        }
    }

    pub fn set_pool_failing(&self, failing: bool) {
        self.fail_pool.store(failing, Ordering::SeqCst);
    }

    /// Completed transfers, oldest first
    pub fn transfers(&self) -> Vec<(Address, Amount)> {
        self.transfers.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn pools_created(&self) -> u64 {
        self.pools_created.load(Ordering::SeqCst)
    }

    fn recipient_fails(&self, who: &Address) -> bool {
        self.failing_recipients.lock().map(|s| s.contains(who)).unwrap_or(false)
    }
}

impl Settlement for SimulatedSettlement {
    async fn transfer(&self, to: Address, amount: Amount) -> Result<(), CollaboratorError> {
        if !self.transfer_latency.is_zero() {
            tokio::time::sleep(self.transfer_latency).await;
        }
        if self.recipient_fails(&to) {
            return Err(CollaboratorError(format!("recipient {} rejected transfer", to)));
        }
        if let Ok(mut t) = self.transfers.lock() {
            t.push((to, amount));
        }
        Ok(())
    }

    async fn create_pool(&self, token_amount: Amount, eth_amount: Amount) -> Result<Address, CollaboratorError> {
        if !self.pool_latency.is_zero() {
            tokio::time::sleep(self.pool_latency).await;
        }
        if self.fail_pool.load(Ordering::SeqCst) {
            return Err(CollaboratorError("pool router rejected liquidity".to_string()));
        }
        let n = self.pools_created.fetch_add(1, Ordering::SeqCst);
        log::info!("created pool #{} seeded with {} tokens / {} wei", n, token_amount, eth_amount);
        Ok(Address::from_word(keccak256(n.to_be_bytes())))
    }
}

/// Sync collaborator view of an async `Settlement`. Must be used from a
/// thread outside the runtime's workers.
pub struct SettlementBridge<S> {
    settlement: S,
    handle: Handle,
    deadline: Duration,
}

impl<S: Settlement> SettlementBridge<S> {
    pub fn new(settlement: S, handle: Handle, deadline: Duration) -> Self {
        Self { settlement, handle, deadline }
    }

    fn run<T>(&self, fut: impl Future<Output = Result<T, CollaboratorError>>) -> Result<T, CollaboratorError> {
        let deadline = self.deadline;
        self.handle
            .block_on(async move { tokio::time::timeout(deadline, fut).await })
            .unwrap_or_else(|_| Err(CollaboratorError(KeeperError::DeadlineElapsed(deadline).to_string())))
    }
}

impl<S: Settlement> ValueTransfer for SettlementBridge<S> {
    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), CollaboratorError> {
        self.run(self.settlement.transfer(to, amount))
    }
}

impl<S: Settlement> LiquidityPool for SettlementBridge<S> {
    fn create_and_seed_pool(&mut self, token_amount: Amount, eth_amount: Amount) -> Result<Address, CollaboratorError> {
        self.run(self.settlement.create_pool(token_amount, eth_amount))
    }
}
