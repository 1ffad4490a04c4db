//! Migration trigger: hand curve liquidity to an external pool once
//! collected value crosses the threshold

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::collaborators::LiquidityPool;
use crate::error::LedgerError;
use crate::math::{div_floor, mul, sub, Amount};
use crate::reserves::Reserves;

/// What the pool receives and what the ledger keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub eth_amount: Amount,
    pub token_amount: Amount,
    pub fee: Amount,
}

impl MigrationPlan {
    /// Both sides non-zero; otherwise the pool cannot be seeded yet
    pub fn is_seedable(&self) -> bool {
        !self.eth_amount.is_zero() && !self.token_amount.is_zero()
    }
}

/// Value the ledger holds and what it already owes
#[derive(Debug, Clone, Copy)]
pub struct Holdings {
    pub treasury: Amount,
    pub pending_withdrawals: Amount,
    pub accrued_fees: Amount,
    pub unminted_supply: Amount,
}

pub fn threshold_crossed(total_collected: Amount, threshold: Amount) -> bool {
    total_collected >= threshold
}

/// Size the pool seed from post-trade state.
///
/// - free = treasury - pending withdrawals - accrued fees
/// - fee = min(migration_fee, free)
/// - eth = free - fee
/// - tokens = eth · token_reserve / eth_reserve, capped at unminted supply
///
/// When free value does not exceed the fee the plan is not seedable and
/// the ledger defers migration to a later purchase.
pub fn plan(
    holdings: &Holdings,
    reserves: &Reserves,
    migration_fee: Amount,
) -> Result<MigrationPlan, LedgerError> {
    let free = sub(sub(holdings.treasury, holdings.pending_withdrawals)?, holdings.accrued_fees)?;
    let fee = migration_fee.min(free);
    let eth_amount = sub(free, fee)?;

    let at_spot = div_floor(mul(eth_amount, reserves.token)?, reserves.eth)?;
    let token_amount = at_spot.min(holdings.unminted_supply);

    Ok(MigrationPlan { eth_amount, token_amount, fee })
}

/// Run the external hand-off. Nothing in the ledger changes here; the
/// caller commits only on `Ok`.
pub fn hand_off<P: LiquidityPool + ?Sized>(
    pool: &mut P,
    plan: &MigrationPlan,
) -> Result<Address, LedgerError> {
    if !plan.is_seedable() {
        return Err(LedgerError::PoolCreationFailed("nothing to seed".to_string()));
    }
    pool.create_and_seed_pool(plan.token_amount, plan.eth_amount)
        .map_err(|e| LedgerError::PoolCreationFailed(e.0))
}
