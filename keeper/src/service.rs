//! Token registry: the factory plus one ledger actor per deployed token

use alloy_primitives::Address;
use anyhow::{Context, Result};
use curve_ledger::{Clock, CurveParams, Deployment, Ledger, TokenFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::actor::{LedgerActor, LedgerHandle};
use crate::config::KeeperConfig;
use crate::error::KeeperError;
use crate::settlement::{Settlement, SettlementBridge};
use crate::sink::{ChannelSink, Charts, TokenEvent};

pub struct Keeper<S> {
    params: CurveParams,
    deadline: Duration,
    queue_capacity: usize,
    settlement: Arc<S>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    events: mpsc::UnboundedSender<TokenEvent>,
    charts: Charts,
    factory: Mutex<TokenFactory>,
    ledgers: Mutex<HashMap<Address, LedgerHandle>>,
}

impl<S: Settlement> Keeper<S> {
    /// Must be called from within a tokio runtime
    pub fn new(
        config: &KeeperConfig,
        settlement: Arc<S>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<TokenEvent>,
        charts: Charts,
    ) -> Result<Self> {
        let params = config.curve_params()?;
        let factory = TokenFactory::new(config.factory, config.admin).context("Invalid factory admin")?;

        Ok(Self {
            params,
            deadline: config.settlement_deadline(),
            queue_capacity: config.command_queue_capacity,
            settlement,
            clock,
            runtime: Handle::try_current().context("Keeper requires a tokio runtime")?,
            events,
            charts,
            factory: Mutex::new(factory),
            ledgers: Mutex::new(HashMap::new()),
        })
    }

    /// Deploy a token through the factory and start its ledger actor.
    /// The factory only records the token once its actor is running.
    pub fn deploy(
        &self,
        caller: Address,
        name: &str,
        symbol: &str,
        admin: Address,
    ) -> Result<Deployment, KeeperError> {
        let mut factory = self.factory.lock().map_err(|_| KeeperError::StatePoisoned)?;
        let mut staged = factory.clone();
        let deployment = staged.deploy(caller, name, symbol, admin)?;
        let token = deployment.token;

        let ledger = Ledger::new(
            self.params.clone(),
            admin,
            self.clock.clone(),
            Box::new(ChannelSink::new(token, self.events.clone())),
        )?;
        let bridge = SettlementBridge::new(self.settlement.clone(), self.runtime.clone(), self.deadline);
        let (handle, _join) = LedgerActor::new(ledger, bridge)
            .spawn(token, self.queue_capacity)
            .map_err(|e| {
                log::error!("Failed to start ledger actor for {}: {}", token, e);
                KeeperError::ActorGone(token)
            })?;

        self.charts.track(
            token,
            self.params.initial_virtual_eth_reserve,
            self.params.initial_virtual_token_reserve,
            self.clock.now(),
        );
        self.ledgers
            .lock()
            .map_err(|_| KeeperError::StatePoisoned)?
            .insert(token, handle);
        *factory = staged;

        log::info!("Started ledger for {} ({})", deployment.symbol, token);
        Ok(deployment)
    }

    pub fn ledger(&self, token: &Address) -> Result<LedgerHandle, KeeperError> {
        self.ledgers
            .lock()
            .ok()
            .and_then(|l| l.get(token).cloned())
            .ok_or(KeeperError::UnknownToken(*token))
    }

    pub fn is_valid_token(&self, token: &Address) -> bool {
        self.factory.lock().map(|f| f.is_valid_token(token)).unwrap_or(false)
    }

    pub fn tokens(&self) -> Vec<Address> {
        self.factory
            .lock()
            .map(|f| f.deployments().map(|d| d.token).collect())
            .unwrap_or_default()
    }

    pub fn charts(&self) -> &Charts {
        &self.charts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::SimulatedSettlement;
    use curve_ledger::{LedgerError, ManualClock};

    fn keeper() -> Keeper<SimulatedSettlement> {
        let config = KeeperConfig::default_local();
        let settlement = Arc::new(SimulatedSettlement::new(&config.simulation));
        let (tx, _rx) = mpsc::unbounded_channel();
        Keeper::new(&config, settlement, Arc::new(ManualClock::new(0)), tx, Charts::new()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_deploy_leaves_no_registration() {
        let k = keeper();
        let admin = KeeperConfig::default_local().admin;
        let stranger = Address::repeat_byte(0x55);

        assert_eq!(
            k.deploy(stranger, "Frog", "FROG", stranger).err(),
            Some(KeeperError::Ledger(LedgerError::NotAuthorized))
        );
        assert_eq!(
            k.deploy(admin, "Frog", "FROG", Address::ZERO).err(),
            Some(KeeperError::Ledger(LedgerError::InvalidAddress))
        );
        assert!(k.tokens().is_empty());

        // No nonce was consumed by the failures
        let d = k.deploy(admin, "Frog", "FROG", admin).unwrap();
        assert_eq!(d.nonce, 0);
        assert_eq!(k.tokens(), vec![d.token]);
        assert!(k.is_valid_token(&d.token));
        assert_eq!(k.ledger(&d.token).unwrap().token(), d.token);
        assert!(k.charts().last_bar(&d.token, curve_ledger::Resolution::M1).is_some());
    }
}
