//! Token accounting state machine
//!
//! A `Ledger` is the single owner of one token's curve state. Every
//! mutating operation validates all preconditions and computes the full
//! post-state before touching any field, so a failed call leaves the
//! ledger exactly as it was. Callers serialize access (one owner, or one
//! command queue per token).
//!
//! States: `Active` ⇄ `EmergencyPaused` (admin toggle), `Active` →
//! `Migrated` (terminal, fired by the purchase that crosses the
//! migration threshold).

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::access::{AccessControl, Role};
use crate::collaborators::{Clock, EventSink, LiquidityPool, ValueTransfer};
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::math::{add, sub, Amount, MAX_FEE_BPS};
use crate::migration::{self, Holdings, MigrationPlan};
use crate::params::CurveParams;
use crate::rate_limit::RateLimiter;
use crate::reserves::{price_impact, Quote, Reserves, TradeLimits};
use crate::withdrawals::WithdrawalQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    Active,
    EmergencyPaused,
    Migrated,
}

/// Outcome of a committed buy or sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub fee: Amount,
    pub reserves: Reserves,
    /// Set when this purchase completed the migration
    pub migrated_to: Option<Address>,
}

/// Read-only view of the headline numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub state: LedgerState,
    pub total_supply: Amount,
    pub reserves: Reserves,
    pub total_collected: Amount,
    pub treasury: Amount,
    pub accrued_fees: Amount,
    pub pending_withdrawals: Amount,
    pub trade_fee_bps: u64,
    pub pool: Option<Address>,
}

pub struct Ledger {
    params: CurveParams,
    trade_fee_bps: u64,
    reserves: Reserves,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    withdrawals: WithdrawalQueue,
    rate_limiter: RateLimiter,
    total_collected: Amount,
    /// Real value held on behalf of sellers, fee recipients, and the curve
    treasury: Amount,
    accrued_fees: Amount,
    migrated: bool,
    emergency_mode: bool,
    pool: Option<Address>,
    access: AccessControl,
    clock: Arc<dyn Clock>,
    sink: Box<dyn EventSink>,
}

impl Ledger {
    pub fn new(
        params: CurveParams,
        admin: Address,
        clock: Arc<dyn Clock>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        params.validate()?;
        let reserves = Reserves::new(params.initial_virtual_eth_reserve, params.initial_virtual_token_reserve)?;
        let access = AccessControl::with_admin(admin)?;

        Ok(Self {
            trade_fee_bps: params.trade_fee_bps,
            rate_limiter: RateLimiter::new(params.rate_limit_interval, params.max_actions_in_interval),
            params,
            reserves,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            withdrawals: WithdrawalQueue::new(),
            total_collected: U256::ZERO,
            treasury: U256::ZERO,
            accrued_fees: U256::ZERO,
            migrated: false,
            emergency_mode: false,
            pool: None,
            access,
            clock,
            sink,
        })
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    /// Buy tokens with `eth_in`. If the purchase lifts collected value to
    /// the migration threshold, the pool hand-off runs before anything is
    /// committed; a failed hand-off rejects the whole purchase. When the
    /// free value cannot cover the migration fee the purchase commits and
    /// migration waits for a later threshold-crossing purchase.
    pub fn buy<P: LiquidityPool + ?Sized>(
        &mut self,
        account: Address,
        eth_in: Amount,
        pool: &mut P,
    ) -> Result<TradeReceipt, LedgerError> {
        self.ensure_tradable()?;
        let now = self.clock.now();

        self.rate_limiter.check(&account, now)?;
        let quote = self.reserves.quote_purchase(eth_in, &self.limits())?;

        let new_supply = add(self.total_supply, quote.amount_out)?;
        if new_supply > self.params.total_supply {
            return Err(LedgerError::SupplyExhausted);
        }
        let new_balance = add(self.balance_of(&account), quote.amount_out)?;
        let new_collected = add(self.total_collected, eth_in)?;
        let new_treasury = add(self.treasury, eth_in)?;

        let crossed = migration::threshold_crossed(new_collected, self.params.migration_threshold);
        let migration = if crossed {
            let holdings = Holdings {
                treasury: new_treasury,
                pending_withdrawals: self.withdrawals.total(),
                accrued_fees: self.accrued_fees,
                unminted_supply: sub(self.params.total_supply, new_supply)?,
            };
            let plan =
                migration::plan(&holdings, &quote.new_reserves, self.params.migration_fee)?;
            if plan.is_seedable() {
                let post = MigrationPost {
                    total_supply: add(new_supply, plan.token_amount)?,
                    treasury: sub(new_treasury, plan.eth_amount)?,
                    accrued_fees: add(self.accrued_fees, plan.fee)?,
                };
                let pool_address = migration::hand_off(pool, &plan).map_err(|e| {
                    log::warn!("migration hand-off failed, purchase by {} rolled back: {}", account, e);
                    e
                })?;
                Some((pool_address, plan, post))
            } else {
                log::info!("migration deferred: nothing left to seed after the {} fee", plan.fee);
                None
            }
        } else {
            None
        };

        // Commit
        self.rate_limiter.record(account, now);
        self.reserves = quote.new_reserves;
        self.balances.insert(account, new_balance);
        self.total_supply = new_supply;
        self.total_collected = new_collected;
        self.treasury = new_treasury;

        log::debug!("buy {} eth_in={} tokens_out={}", account, eth_in, quote.amount_out);
        self.sink.emit(LedgerEvent::PurchaseExecuted {
            account,
            eth_in,
            tokens_out: quote.amount_out,
            timestamp: now,
        });
        self.emit_reserves(now);

        let migrated_to = migration.map(|(pool_address, plan, post)| {
            self.commit_migration(pool_address, plan, post);
            pool_address
        });

        Ok(self.receipt(&quote, migrated_to))
    }

    /// Sell `tokens_in` back to the curve. Proceeds are credited to the
    /// withdrawal queue, never pushed.
    pub fn sell(&mut self, account: Address, tokens_in: Amount) -> Result<TradeReceipt, LedgerError> {
        self.ensure_tradable()?;
        let now = self.clock.now();

        let balance = self.balance_of(&account);
        if balance < tokens_in {
            return Err(LedgerError::InsufficientBalance);
        }

        self.rate_limiter.check(&account, now)?;
        // Proceeds are priced before the burn
        let quote = self.reserves.quote_sale(tokens_in, &self.limits())?;

        let new_balance = sub(balance, tokens_in)?;
        let new_supply = sub(self.total_supply, tokens_in)?;
        let new_fees = add(self.accrued_fees, quote.fee)?;

        // Last fallible step; atomic on its own
        self.withdrawals.credit(account, quote.amount_out)?;

        self.rate_limiter.record(account, now);
        self.reserves = quote.new_reserves;
        if new_balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, new_balance);
        }
        self.total_supply = new_supply;
        self.accrued_fees = new_fees;

        log::debug!("sell {} tokens_in={} eth_out={}", account, tokens_in, quote.amount_out);
        self.sink.emit(LedgerEvent::SaleExecuted {
            account,
            tokens_in,
            eth_out: quote.amount_out,
            fee: quote.fee,
            timestamp: now,
        });
        self.emit_reserves(now);
        self.sink.emit(LedgerEvent::WithdrawalQueued { account, amount: quote.amount_out });

        Ok(self.receipt(&quote, None))
    }

    // ------------------------------------------------------------------
    // Withdrawals
    // ------------------------------------------------------------------

    /// Pay out everything owed to `account`. The entry is zeroed before
    /// the transfer and re-credited if the transfer fails. Allowed while
    /// paused and after migration.
    pub fn withdraw<T: ValueTransfer + ?Sized>(
        &mut self,
        account: Address,
        transfer: &mut T,
    ) -> Result<Amount, LedgerError> {
        let owed = self.withdrawals.owed(&account);
        if owed.is_zero() {
            return Err(LedgerError::NothingToWithdraw);
        }
        if self.treasury < owed {
            return Err(LedgerError::InsufficientBalance);
        }

        let amount = self.withdrawals.take(&account)?;
        self.treasury = sub(self.treasury, amount)?;

        match transfer.transfer(account, amount) {
            Ok(()) => {
                self.sink.emit(LedgerEvent::WithdrawalCompleted { account, amount });
                Ok(amount)
            }
            Err(e) => {
                log::warn!("withdrawal of {} to {} failed, re-credited: {}", amount, account, e);
                self.treasury = self.treasury.saturating_add(amount);
                self.withdrawals.restore(account, amount)?;
                Err(LedgerError::TransferFailed(e.0))
            }
        }
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    pub fn set_emergency_mode(&mut self, caller: Address, enabled: bool) -> Result<(), LedgerError> {
        self.access.ensure(Role::Admin, &caller)?;
        self.emergency_mode = enabled;
        log::info!("emergency mode {} by {}", if enabled { "enabled" } else { "disabled" }, caller);
        self.sink.emit(LedgerEvent::EmergencyModeChanged { enabled, by: caller });
        Ok(())
    }

    /// Sweep all held value to the calling admin. Requires emergency
    /// mode. Queued withdrawals stay recorded but are no longer backed.
    pub fn emergency_withdraw<T: ValueTransfer + ?Sized>(
        &mut self,
        caller: Address,
        transfer: &mut T,
    ) -> Result<Amount, LedgerError> {
        self.access.ensure(Role::Admin, &caller)?;
        if !self.emergency_mode {
            return Err(LedgerError::EmergencyModeInactive);
        }
        let amount = self.treasury;
        if amount.is_zero() {
            return Err(LedgerError::NothingToWithdraw);
        }

        let fees = self.accrued_fees;
        self.treasury = U256::ZERO;
        self.accrued_fees = U256::ZERO;

        match transfer.transfer(caller, amount) {
            Ok(()) => {
                log::info!("emergency sweep of {} to {}", amount, caller);
                self.sink.emit(LedgerEvent::EmergencyWithdrawal { to: caller, amount });
                Ok(amount)
            }
            Err(e) => {
                log::warn!("emergency sweep to {} failed: {}", caller, e);
                self.treasury = amount;
                self.accrued_fees = fees;
                Err(LedgerError::TransferFailed(e.0))
            }
        }
    }

    /// Transfer accrued trade and migration fees to the calling admin
    pub fn withdraw_fees<T: ValueTransfer + ?Sized>(
        &mut self,
        caller: Address,
        transfer: &mut T,
    ) -> Result<Amount, LedgerError> {
        self.access.ensure(Role::Admin, &caller)?;
        let amount = self.accrued_fees;
        if amount.is_zero() {
            return Err(LedgerError::NothingToWithdraw);
        }
        if self.treasury < amount {
            return Err(LedgerError::InsufficientBalance);
        }

        self.accrued_fees = U256::ZERO;
        self.treasury = sub(self.treasury, amount)?;

        match transfer.transfer(caller, amount) {
            Ok(()) => {
                self.sink.emit(LedgerEvent::FeesWithdrawn { to: caller, amount });
                Ok(amount)
            }
            Err(e) => {
                log::warn!("fee withdrawal to {} failed, re-credited: {}", caller, e);
                self.accrued_fees = amount;
                self.treasury = self.treasury.saturating_add(amount);
                Err(LedgerError::TransferFailed(e.0))
            }
        }
    }

    /// Lower the sale fee. Increases are rejected.
    pub fn reduce_trade_fee(&mut self, caller: Address, new_bps: u64) -> Result<(), LedgerError> {
        self.access.ensure(Role::Admin, &caller)?;
        if new_bps > MAX_FEE_BPS {
            return Err(LedgerError::FeeTooHigh);
        }
        if new_bps > self.trade_fee_bps {
            return Err(LedgerError::FeeIncrease);
        }
        let old_bps = self.trade_fee_bps;
        self.trade_fee_bps = new_bps;
        self.sink.emit(LedgerEvent::TradeFeeReduced { old_bps, new_bps });
        Ok(())
    }

    pub fn grant_role(&mut self, caller: Address, role: Role, who: Address) -> Result<(), LedgerError> {
        self.access.grant(&caller, role, who)
    }

    pub fn revoke_role(&mut self, caller: Address, role: Role, who: Address) -> Result<(), LedgerError> {
        self.access.revoke(&caller, role, &who)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn state(&self) -> LedgerState {
        if self.migrated {
            LedgerState::Migrated
        } else if self.emergency_mode {
            LedgerState::EmergencyPaused
        } else {
            LedgerState::Active
        }
    }

    pub fn quote_purchase(&self, eth_in: Amount) -> Result<Quote, LedgerError> {
        self.reserves.quote_purchase(eth_in, &self.limits())
    }

    pub fn quote_sale(&self, tokens_in: Amount) -> Result<Quote, LedgerError> {
        self.reserves.quote_sale(tokens_in, &self.limits())
    }

    pub fn price_impact(&self, amount: Amount, reserve: Amount) -> Result<Amount, LedgerError> {
        price_impact(amount, reserve)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(U256::ZERO)
    }

    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn pending_withdrawal(&self, account: &Address) -> Amount {
        self.withdrawals.owed(account)
    }

    pub fn withdrawals(&self) -> &WithdrawalQueue {
        &self.withdrawals
    }

    pub fn action_count(&self, account: &Address) -> u32 {
        self.rate_limiter.action_count(account, self.clock.now())
    }

    pub fn last_action_time(&self, account: &Address) -> Option<u64> {
        self.rate_limiter.last_action_time(account)
    }

    pub fn reserves(&self) -> Reserves {
        self.reserves
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn total_collected(&self) -> Amount {
        self.total_collected
    }

    pub fn treasury(&self) -> Amount {
        self.treasury
    }

    pub fn accrued_fees(&self) -> Amount {
        self.accrued_fees
    }

    pub fn trade_fee_bps(&self) -> u64 {
        self.trade_fee_bps
    }

    pub fn is_migrated(&self) -> bool {
        self.migrated
    }

    pub fn is_emergency_mode(&self) -> bool {
        self.emergency_mode
    }

    pub fn pool_address(&self) -> Option<Address> {
        self.pool
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn has_role(&self, role: Role, who: &Address) -> bool {
        self.access.has_role(role, who)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            state: self.state(),
            total_supply: self.total_supply,
            reserves: self.reserves,
            total_collected: self.total_collected,
            treasury: self.treasury,
            accrued_fees: self.accrued_fees,
            pending_withdrawals: self.withdrawals.total(),
            trade_fee_bps: self.trade_fee_bps,
            pool: self.pool,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_tradable(&self) -> Result<(), LedgerError> {
        if self.migrated {
            return Err(LedgerError::AlreadyMigrated);
        }
        if self.emergency_mode {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    fn limits(&self) -> TradeLimits {
        TradeLimits {
            min_purchase: self.params.min_purchase,
            max_purchase: self.params.max_purchase,
            price_impact_limit: self.params.price_impact_limit,
            fee_bps: self.trade_fee_bps,
        }
    }

    fn emit_reserves(&mut self, now: u64) {
        self.sink.emit(LedgerEvent::ReservesUpdated {
            eth_reserve: self.reserves.eth,
            token_reserve: self.reserves.token,
            timestamp: now,
        });
    }

    fn receipt(&self, quote: &Quote, migrated_to: Option<Address>) -> TradeReceipt {
        TradeReceipt {
            amount_in: quote.amount_in,
            amount_out: quote.amount_out,
            fee: quote.fee,
            reserves: self.reserves,
            migrated_to,
        }
    }

    fn commit_migration(&mut self, pool: Address, plan: MigrationPlan, post: MigrationPost) {
        self.total_supply = post.total_supply;
        self.treasury = post.treasury;
        self.accrued_fees = post.accrued_fees;
        self.pool = Some(pool);
        self.migrated = true;

        log::info!(
            "migrated to pool {}: eth={} tokens={} fee={}",
            pool,
            plan.eth_amount,
            plan.token_amount,
            plan.fee
        );
        self.sink.emit(LedgerEvent::Migrated {
            pool,
            eth_amount: plan.eth_amount,
            token_amount: plan.token_amount,
            fee: plan.fee,
        });
    }
}

/// Ledger fields after migration, computed before the hand-off
#[derive(Debug, Clone, Copy)]
struct MigrationPost {
    total_supply: Amount,
    treasury: Amount,
    accrued_fees: Amount,
}
