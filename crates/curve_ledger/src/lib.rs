//! Bonding-curve token ledger
//! Pure state machine: no async, no I/O, checked arithmetic throughout

pub mod access;
pub mod candles;
pub mod collaborators;
pub mod error;
pub mod events;
pub mod factory;
pub mod invariants;
pub mod ledger;
pub mod math;
pub mod migration;
pub mod params;
pub mod rate_limit;
pub mod reserves;
pub mod withdrawals;

// Re-export commonly used types
pub use access::Role;
pub use candles::{Bar, CandleAggregator, Resolution, SubscriptionId};
pub use collaborators::{
    Clock, CollaboratorError, EventSink, LiquidityPool, ManualClock, MemorySink, NullSink, SystemClock, ValueTransfer,
};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use factory::{Deployment, TokenFactory};
pub use ledger::{Ledger, LedgerSnapshot, LedgerState, TradeReceipt};
pub use math::Amount;
pub use params::CurveParams;
pub use reserves::{Quote, Reserves};
