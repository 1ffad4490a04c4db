//! Constant product bonding curve math (eth·token=k) over virtual reserves

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::math::{add, bps_of, div_ceil, div_floor, mul, ratio_f64, sub, Amount};

/// Virtual reserve pair. Both sides stay strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub eth: Amount,
    pub token: Amount,
}

/// Bounds a quote is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeLimits {
    pub min_purchase: Amount,
    pub max_purchase: Amount,
    /// Integer percent
    pub price_impact_limit: u64,
    pub fee_bps: u64,
}

/// Quote result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Amount paid in (ETH for purchases, tokens for sales)
    pub amount_in: Amount,

    /// Amount paid out after fees (tokens for purchases, ETH for sales)
    pub amount_out: Amount,

    /// Fee withheld from the output (sales only)
    pub fee: Amount,

    /// Truncated percentage of the input-side reserve
    pub impact_pct: Amount,

    /// Reserves after the trade
    pub new_reserves: Reserves,
}

/// `amount * 100 / reserve`, truncating
pub fn price_impact(amount: Amount, reserve: Amount) -> Result<Amount, LedgerError> {
    if reserve.is_zero() {
        return Err(LedgerError::InvalidAmount);
    }
    div_floor(mul(amount, U256::from(100u8))?, reserve)
}

fn check_impact(impact: Amount, limit: u64) -> Result<(), LedgerError> {
    if impact > U256::from(limit) {
        return Err(LedgerError::ExceedsPriceImpact { impact, limit });
    }
    Ok(())
}

impl Reserves {
    pub fn new(eth: Amount, token: Amount) -> Result<Self, LedgerError> {
        if eth.is_zero() || token.is_zero() {
            return Err(LedgerError::InvalidConfiguration("virtual reserves must be positive"));
        }
        Ok(Self { eth, token })
    }

    /// k = eth · token
    pub fn product(&self) -> Result<Amount, LedgerError> {
        mul(self.eth, self.token)
    }

    /// ETH per token, for display and charting
    pub fn spot_price(&self) -> f64 {
        ratio_f64(self.eth, self.token)
    }

    /// Quote buying tokens with `eth_in`
    ///
    /// - eth1 = eth0 + Δeth
    /// - token1 = ⌈k / eth1⌉ (rounded toward the pool)
    /// - Δtoken_out = token0 - token1
    ///
    /// Checked in order: minimum purchase, price impact against the ETH
    /// reserve, maximum purchase.
    pub fn quote_purchase(&self, eth_in: Amount, limits: &TradeLimits) -> Result<Quote, LedgerError> {
        if eth_in.is_zero() || eth_in < limits.min_purchase {
            return Err(LedgerError::InvalidAmount);
        }

        let impact_pct = price_impact(eth_in, self.eth)?;
        check_impact(impact_pct, limits.price_impact_limit)?;

        if eth_in > limits.max_purchase {
            return Err(LedgerError::InvalidAmount);
        }

        let k = self.product()?;
        let new_eth = add(self.eth, eth_in)?;
        let new_token = div_ceil(k, new_eth)?;
        let tokens_out = sub(self.token, new_token)?;
        if tokens_out.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        Ok(Quote {
            amount_in: eth_in,
            amount_out: tokens_out,
            fee: U256::ZERO,
            impact_pct,
            new_reserves: Reserves { eth: new_eth, token: new_token },
        })
    }

    /// Quote selling `tokens_in` back to the curve
    ///
    /// - token1 = token0 + Δtoken
    /// - eth1 = ⌈k / token1⌉
    /// - Δeth_gross = eth0 - eth1
    /// - fee = Δeth_gross · fee_bps / 10_000, kept by the ledger
    ///
    /// The ETH reserve drops by the gross amount; the fee stays in the
    /// treasury as accrued fees.
    pub fn quote_sale(&self, tokens_in: Amount, limits: &TradeLimits) -> Result<Quote, LedgerError> {
        if tokens_in.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let impact_pct = price_impact(tokens_in, self.token)?;
        check_impact(impact_pct, limits.price_impact_limit)?;

        let k = self.product()?;
        let new_token = add(self.token, tokens_in)?;
        let new_eth = div_ceil(k, new_token)?;
        let eth_gross = sub(self.eth, new_eth)?;
        if eth_gross.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let fee = bps_of(eth_gross, limits.fee_bps)?;
        let eth_out = sub(eth_gross, fee)?;

        Ok(Quote {
            amount_in: tokens_in,
            amount_out: eth_out,
            fee,
            impact_pct,
            new_reserves: Reserves { eth: new_eth, token: new_token },
        })
    }
}
