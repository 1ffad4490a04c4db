//! Curve constants, fixed at ledger construction

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::math::{units, Amount, MAX_FEE_BPS, WEI_PER_UNIT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    /// Hard cap on minted tokens (curve buys + pool seed)
    pub total_supply: Amount,

    pub initial_virtual_token_reserve: Amount,

    pub initial_virtual_eth_reserve: Amount,

    /// Collected value at which the curve migrates
    pub migration_threshold: Amount,

    /// Retained from the pool seed at migration
    pub migration_fee: Amount,

    pub min_purchase: Amount,

    pub max_purchase: Amount,

    /// Integer percent, e.g. 10 = 10%
    pub price_impact_limit: u64,

    /// Rate limit window in seconds
    pub rate_limit_interval: u64,

    pub max_actions_in_interval: u32,

    /// Fee on sale proceeds in basis points
    pub trade_fee_bps: u64,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            total_supply: units(1_000_000_000),
            initial_virtual_token_reserve: units(1_060_000_000),
            initial_virtual_eth_reserve: U256::from(16u8) * WEI_PER_UNIT / U256::from(10u8), // 1.6 ETH
            migration_threshold: units(6),
            migration_fee: U256::from(15u8) * WEI_PER_UNIT / U256::from(100u8), // 0.15 ETH
            min_purchase: WEI_PER_UNIT / U256::from(100u8), // 0.01 ETH
            max_purchase: units(50),
            price_impact_limit: 10,
            rate_limit_interval: 60,
            max_actions_in_interval: 3,
            trade_fee_bps: 100,
        }
    }
}

impl CurveParams {
    /// Reject parameter sets the ledger cannot honour
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.initial_virtual_eth_reserve.is_zero() || self.initial_virtual_token_reserve.is_zero() {
            return Err(LedgerError::InvalidConfiguration("virtual reserves must be positive"));
        }
        if self.total_supply.is_zero() {
            return Err(LedgerError::InvalidConfiguration("total supply must be positive"));
        }
        if self.min_purchase.is_zero() || self.min_purchase > self.max_purchase {
            return Err(LedgerError::InvalidConfiguration("purchase bounds must satisfy 0 < min <= max"));
        }
        if self.migration_threshold <= self.migration_fee {
            return Err(LedgerError::InvalidConfiguration("migration threshold must exceed migration fee"));
        }
        if self.price_impact_limit == 0 || self.price_impact_limit > 100 {
            return Err(LedgerError::InvalidConfiguration("price impact limit must be within 1..=100"));
        }
        if self.rate_limit_interval == 0 || self.max_actions_in_interval == 0 {
            return Err(LedgerError::InvalidConfiguration("rate limit window must allow at least one action"));
        }
        if self.trade_fee_bps > MAX_FEE_BPS {
            return Err(LedgerError::FeeTooHigh);
        }
        Ok(())
    }
}
