//! Invariant checking helpers

use alloy_primitives::U256;

use crate::ledger::{Ledger, LedgerState};
use crate::math::Amount;

/// Both virtual reserves strictly positive
pub fn reserves_positive(l: &Ledger) -> bool {
    let r = l.reserves();
    !r.eth.is_zero() && !r.token.is_zero()
}

/// sum(balances) <= total_supply <= supply cap
pub fn supply_covers_balances(l: &Ledger) -> bool {
    let sum = l
        .balances()
        .try_fold(U256::ZERO, |acc, (_, b)| acc.checked_add(*b));
    match sum {
        Some(sum) => sum <= l.total_supply() && l.total_supply() <= l.params().total_supply,
        None => false,
    }
}

/// Pending withdrawal total matches the per-account entries
pub fn pending_total_consistent(l: &Ledger) -> bool {
    let sum: Option<Amount> = l
        .withdrawals()
        .accounts()
        .try_fold(U256::ZERO, |acc, (_, v)| acc.checked_add(*v));
    sum == Some(l.withdrawals().total())
}

/// Held value covers everything owed. Holds until an emergency sweep.
pub fn treasury_covers_obligations(l: &Ledger) -> bool {
    l.withdrawals()
        .total()
        .checked_add(l.accrued_fees())
        .is_some_and(|owed| l.treasury() >= owed)
}

/// A migrated ledger has a pool and no longer reports itself active
pub fn migration_consistent(l: &Ledger) -> bool {
    l.is_migrated() == l.pool_address().is_some() && (l.is_migrated() == (l.state() == LedgerState::Migrated))
}

/// Name of the first violated invariant, if any
pub fn first_violation(l: &Ledger) -> Option<&'static str> {
    if !reserves_positive(l) {
        return Some("reserves_positive");
    }
    if !supply_covers_balances(l) {
        return Some("supply_covers_balances");
    }
    if !pending_total_consistent(l) {
        return Some("pending_total_consistent");
    }
    if !treasury_covers_obligations(l) {
        return Some("treasury_covers_obligations");
    }
    if !migration_consistent(l) {
        return Some("migration_consistent");
    }
    None
}
