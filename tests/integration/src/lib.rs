//! Curve Integration Tests
//!
//! Scenario tests that drive the keeper end to end: factory deploy,
//! ledger actors, simulated settlement, and the event/chart pipeline.

use alloy_primitives::utils::parse_ether;
use alloy_primitives::{Address, U256};
use curve_keeper::sink::run_event_task;
use curve_keeper::{Charts, Keeper, KeeperConfig, LedgerHandle, SimulatedSettlement};
use curve_ledger::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const START: u64 = 1_700_000_000;

pub fn admin() -> Address {
    KeeperConfig::default_local().admin
}

pub fn user(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// Decimal whole-unit string to wei
pub fn eth(s: &str) -> U256 {
    parse_ether(s).expect("valid ether literal")
}

pub struct TestEnv {
    pub keeper: Keeper<SimulatedSettlement>,
    pub settlement: Arc<SimulatedSettlement>,
    pub clock: ManualClock,
    pub charts: Charts,
}

impl TestEnv {
    /// Must be called inside a multi-threaded tokio runtime
    pub fn new(config: KeeperConfig) -> Self {
        let settlement = Arc::new(SimulatedSettlement::new(&config.simulation));
        let clock = ManualClock::new(START);
        let charts = Charts::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_event_task(rx, charts.clone(), std::io::sink()));

        let keeper = Keeper::new(&config, settlement.clone(), Arc::new(clock.clone()), tx, charts.clone())
            .expect("keeper config is valid");
        Self { keeper, settlement, clock, charts }
    }

    pub fn local() -> Self {
        Self::new(KeeperConfig::default_local())
    }

    /// Small migration threshold (0.1 ETH, fee 0.01 ETH)
    pub fn near_migration() -> Self {
        let mut config = KeeperConfig::default_local();
        config.curve.migration_threshold = "0.1".to_string();
        config.curve.migration_fee = "0.01".to_string();
        Self::new(config)
    }

    pub fn deploy(&self, symbol: &str) -> LedgerHandle {
        let d = self.keeper.deploy(admin(), symbol, symbol, admin()).expect("deploy");
        self.keeper.ledger(&d.token).expect("ledger started")
    }

    /// Let the event task catch up
    pub async fn settle_events(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
