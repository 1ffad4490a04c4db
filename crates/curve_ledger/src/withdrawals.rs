//! Pull-payment queue: sells credit, withdrawals drain

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

use crate::error::LedgerError;
use crate::math::{add, sub, Amount};

/// Balances owed to accounts but not yet transferred
#[derive(Debug, Clone, Default)]
pub struct WithdrawalQueue {
    pending: HashMap<Address, Amount>,
    total: Amount,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount owed to `account`
    pub fn owed(&self, account: &Address) -> Amount {
        self.pending.get(account).copied().unwrap_or(U256::ZERO)
    }

    /// Sum owed across all accounts
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Credit `amount` to `account`
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let new_owed = add(self.owed(&account), amount)?;
        let new_total = add(self.total, amount)?;
        self.pending.insert(account, new_owed);
        self.total = new_total;
        Ok(())
    }

    /// Zero the entry for `account` and return what it held.
    ///
    /// Called before the value transfer; pair with [`restore`](Self::restore)
    /// if the transfer fails.
    pub fn take(&mut self, account: &Address) -> Result<Amount, LedgerError> {
        let owed = self.owed(account);
        if owed.is_zero() {
            return Err(LedgerError::NothingToWithdraw);
        }
        self.total = sub(self.total, owed)?;
        self.pending.remove(account);
        Ok(owed)
    }

    /// Put back an amount taken for a transfer that did not complete
    pub fn restore(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        self.credit(account, amount)
    }

    /// Accounts with a non-zero entry
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.pending.iter()
    }
}
