use alloy_primitives::Address;
use curve_ledger::LedgerError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    #[error("ledger actor for {0} has stopped")]
    ActorGone(Address),

    #[error("settlement deadline of {0:?} elapsed")]
    DeadlineElapsed(Duration),

    #[error("unknown token {0}")]
    UnknownToken(Address),

    #[error("keeper state lock poisoned")]
    StatePoisoned,

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("failed to encode response: {0}")]
    Encode(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
