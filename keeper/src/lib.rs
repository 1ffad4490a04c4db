//! Curve Keeper
//!
//! Off-chain host for bonding-curve ledgers: one actor thread per token,
//! deadline-bounded settlement, JSON-lines commands and events.

pub mod actor;
pub mod commands;
pub mod config;
pub mod error;
pub mod service;
pub mod settlement;
pub mod sink;

pub use actor::{AccountView, LedgerActor, LedgerHandle};
pub use config::KeeperConfig;
pub use error::KeeperError;
pub use service::Keeper;
pub use settlement::{Settlement, SettlementBridge, SimulatedSettlement};
pub use sink::{ChannelSink, Charts, TokenEvent};
