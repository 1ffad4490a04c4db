use alloy_primitives::U256;
use thiserror::Error;

/// Every failure the ledger can surface. Variants are stable: callers and
/// indexers match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount is zero or outside the allowed bounds")]
    InvalidAmount,
    #[error("price impact {impact}% exceeds limit of {limit}%")]
    ExceedsPriceImpact { impact: U256, limit: u64 },
    #[error("rate limit exceeded for this interval")]
    ExceededRateLimit,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("token already migrated to external pool")]
    AlreadyMigrated,
    #[error("caller is not authorized")]
    NotAuthorized,
    #[error("value transfer failed: {0}")]
    TransferFailed(String),
    #[error("pool creation failed: {0}")]
    PoolCreationFailed(String),
    #[error("trading is paused (emergency mode)")]
    Paused,
    #[error("emergency mode is not active")]
    EmergencyModeInactive,
    #[error("nothing to withdraw")]
    NothingToWithdraw,
    #[error("purchase would exceed total supply")]
    SupplyExhausted,
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("fee basis points cannot exceed 3000 (30%)")]
    FeeTooHigh,
    #[error("trade fee can only be reduced")]
    FeeIncrease,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("zero address")]
    InvalidAddress,
    #[error("name and symbol must be non-empty")]
    EmptyString,
    #[error("unknown token")]
    UnknownToken,
}
