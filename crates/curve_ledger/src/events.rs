use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::math::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    PurchaseExecuted {
        account: Address,
        eth_in: Amount,
        tokens_out: Amount,
        timestamp: u64,
    },
    SaleExecuted {
        account: Address,
        tokens_in: Amount,
        eth_out: Amount,
        fee: Amount,
        timestamp: u64,
    },
    ReservesUpdated {
        eth_reserve: Amount,
        token_reserve: Amount,
        timestamp: u64,
    },
    WithdrawalQueued {
        account: Address,
        amount: Amount,
    },
    WithdrawalCompleted {
        account: Address,
        amount: Amount,
    },
    Migrated {
        pool: Address,
        eth_amount: Amount,
        token_amount: Amount,
        fee: Amount,
    },
    EmergencyModeChanged {
        enabled: bool,
        by: Address,
    },
    EmergencyWithdrawal {
        to: Address,
        amount: Amount,
    },
    FeesWithdrawn {
        to: Address,
        amount: Amount,
    },
    TradeFeeReduced {
        old_bps: u64,
        new_bps: u64,
    },
}
