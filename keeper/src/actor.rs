//! One ledger, one thread, one command queue
//!
//! The actor thread owns the `Ledger` and applies commands strictly in
//! arrival order, so each operation sees a consistent state and no two
//! operations interleave. Settlement calls block that thread (bounded by
//! the bridge deadline); other tokens' actors are unaffected.

use alloy_primitives::Address;
use curve_ledger::{Amount, Ledger, LedgerError, LedgerSnapshot, Quote, Role, TradeReceipt};
use serde::Serialize;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use crate::error::KeeperError;
use crate::settlement::{Settlement, SettlementBridge};

type Reply<T> = oneshot::Sender<Result<T, LedgerError>>;

/// Per-account view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub balance: Amount,
    pub pending_withdrawal: Amount,
    pub action_count: u32,
    pub last_action_time: Option<u64>,
}

pub enum Command {
    Buy { account: Address, eth_in: Amount, reply: Reply<TradeReceipt> },
    Sell { account: Address, tokens_in: Amount, reply: Reply<TradeReceipt> },
    Withdraw { account: Address, reply: Reply<Amount> },
    SetEmergency { caller: Address, enabled: bool, reply: Reply<()> },
    EmergencyWithdraw { caller: Address, reply: Reply<Amount> },
    WithdrawFees { caller: Address, reply: Reply<Amount> },
    ReduceTradeFee { caller: Address, bps: u64, reply: Reply<()> },
    GrantRole { caller: Address, role: Role, who: Address, reply: Reply<()> },
    RevokeRole { caller: Address, role: Role, who: Address, reply: Reply<()> },
    PriceImpact { amount: Amount, reserve: Amount, reply: Reply<Amount> },
    QuotePurchase { eth_in: Amount, reply: Reply<Quote> },
    QuoteSale { tokens_in: Amount, reply: Reply<Quote> },
    Account { account: Address, reply: oneshot::Sender<AccountView> },
    Snapshot { reply: oneshot::Sender<LedgerSnapshot> },
}

pub struct LedgerActor<S> {
    ledger: Ledger,
    bridge: SettlementBridge<S>,
}

impl<S: Settlement> LedgerActor<S> {
    pub fn new(ledger: Ledger, bridge: SettlementBridge<S>) -> Self {
        Self { ledger, bridge }
    }

    /// Start the actor thread. It exits once every handle is dropped.
    pub fn spawn(self, token: Address, capacity: usize) -> std::io::Result<(LedgerHandle, JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let join = std::thread::Builder::new()
            .name(format!("ledger-{}", token))
            .spawn(move || self.run(rx))?;
        Ok((LedgerHandle { token, tx }, join))
    }

    fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.blocking_recv() {
            self.apply(cmd);
        }
        log::debug!("ledger actor stopped");
    }

    fn apply(&mut self, cmd: Command) {
        // A dropped reply receiver means the caller gave up; the command
        // has still been applied.
        match cmd {
            Command::Buy { account, eth_in, reply } => {
                let _ = reply.send(self.ledger.buy(account, eth_in, &mut self.bridge));
            }
            Command::Sell { account, tokens_in, reply } => {
                let _ = reply.send(self.ledger.sell(account, tokens_in));
            }
            Command::Withdraw { account, reply } => {
                let _ = reply.send(self.ledger.withdraw(account, &mut self.bridge));
            }
            Command::SetEmergency { caller, enabled, reply } => {
                let _ = reply.send(self.ledger.set_emergency_mode(caller, enabled));
            }
            Command::EmergencyWithdraw { caller, reply } => {
                let _ = reply.send(self.ledger.emergency_withdraw(caller, &mut self.bridge));
            }
            Command::WithdrawFees { caller, reply } => {
                let _ = reply.send(self.ledger.withdraw_fees(caller, &mut self.bridge));
            }
            Command::ReduceTradeFee { caller, bps, reply } => {
                let _ = reply.send(self.ledger.reduce_trade_fee(caller, bps));
            }
            Command::GrantRole { caller, role, who, reply } => {
                let _ = reply.send(self.ledger.grant_role(caller, role, who));
            }
            Command::RevokeRole { caller, role, who, reply } => {
                let _ = reply.send(self.ledger.revoke_role(caller, role, who));
            }
            Command::PriceImpact { amount, reserve, reply } => {
                let _ = reply.send(self.ledger.price_impact(amount, reserve));
            }
            Command::QuotePurchase { eth_in, reply } => {
                let _ = reply.send(self.ledger.quote_purchase(eth_in));
            }
            Command::QuoteSale { tokens_in, reply } => {
                let _ = reply.send(self.ledger.quote_sale(tokens_in));
            }
            Command::Account { account, reply } => {
                let _ = reply.send(AccountView {
                    balance: self.ledger.balance_of(&account),
                    pending_withdrawal: self.ledger.pending_withdrawal(&account),
                    action_count: self.ledger.action_count(&account),
                    last_action_time: self.ledger.last_action_time(&account),
                });
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.ledger.snapshot());
            }
        }
    }
}

/// Async front for one ledger actor
#[derive(Clone)]
pub struct LedgerHandle {
    token: Address,
    tx: mpsc::Sender<Command>,
}

impl LedgerHandle {
    pub fn token(&self) -> Address {
        self.token
    }

    pub async fn buy(&self, account: Address, eth_in: Amount) -> Result<TradeReceipt, KeeperError> {
        self.call(|reply| Command::Buy { account, eth_in, reply }).await
    }

    pub async fn sell(&self, account: Address, tokens_in: Amount) -> Result<TradeReceipt, KeeperError> {
        self.call(|reply| Command::Sell { account, tokens_in, reply }).await
    }

    pub async fn withdraw(&self, account: Address) -> Result<Amount, KeeperError> {
        self.call(|reply| Command::Withdraw { account, reply }).await
    }

    pub async fn set_emergency_mode(&self, caller: Address, enabled: bool) -> Result<(), KeeperError> {
        self.call(|reply| Command::SetEmergency { caller, enabled, reply }).await
    }

    pub async fn emergency_withdraw(&self, caller: Address) -> Result<Amount, KeeperError> {
        self.call(|reply| Command::EmergencyWithdraw { caller, reply }).await
    }

    pub async fn withdraw_fees(&self, caller: Address) -> Result<Amount, KeeperError> {
        self.call(|reply| Command::WithdrawFees { caller, reply }).await
    }

    pub async fn reduce_trade_fee(&self, caller: Address, bps: u64) -> Result<(), KeeperError> {
        self.call(|reply| Command::ReduceTradeFee { caller, bps, reply }).await
    }

    pub async fn grant_role(
        &self,
        caller: Address,
        role: Role,
        who: Address,
    ) -> Result<(), KeeperError> {
        self.call(|reply| Command::GrantRole { caller, role, who, reply }).await
    }

    pub async fn revoke_role(
        &self,
        caller: Address,
        role: Role,
        who: Address,
    ) -> Result<(), KeeperError> {
        self.call(|reply| Command::RevokeRole { caller, role, who, reply }).await
    }

    /// Integer percent, truncating
    pub async fn price_impact(&self, amount: Amount, reserve: Amount) -> Result<Amount, KeeperError> {
        self.call(|reply| Command::PriceImpact { amount, reserve, reply }).await
    }

    pub async fn quote_purchase(&self, eth_in: Amount) -> Result<Quote, KeeperError> {
        self.call(|reply| Command::QuotePurchase { eth_in, reply }).await
    }

    pub async fn quote_sale(&self, tokens_in: Amount) -> Result<Quote, KeeperError> {
        self.call(|reply| Command::QuoteSale { tokens_in, reply }).await
    }

    pub async fn account(&self, account: Address) -> Result<AccountView, KeeperError> {
        self.ask(|reply| Command::Account { account, reply }).await
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, KeeperError> {
        self.ask(|reply| Command::Snapshot { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, KeeperError> {
        Ok(self.ask(make).await??)
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, KeeperError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| KeeperError::ActorGone(self.token))?;
        rx.await.map_err(|_| KeeperError::ActorGone(self.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::settlement::SimulatedSettlement;
    use curve_ledger::math::units;
    use curve_ledger::{CurveParams, ManualClock, NullSink};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }

    fn spawn() -> (LedgerHandle, Arc<SimulatedSettlement>) {
        let clock = ManualClock::new(1_700_000_000);
        let ledger = Ledger::new(CurveParams::default(), admin(), Arc::new(clock), Box::new(NullSink)).unwrap();
        let sim = Arc::new(SimulatedSettlement::new(&SimulationConfig::default()));
        let bridge = SettlementBridge::new(sim.clone(), Handle::current(), Duration::from_secs(1));
        let (handle, _join) = LedgerActor::new(ledger, bridge).spawn(Address::repeat_byte(0x70), 8).unwrap();
        (handle, sim)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_commands_round_trip_through_actor() {
        let (h, sim) = spawn();
        let user = Address::repeat_byte(1);

        let r = h.buy(user, units(1) / alloy_primitives::U256::from(100u8)).await.unwrap();
        assert_eq!(h.account(user).await.unwrap().balance, r.amount_out);

        let sold = h.sell(user, r.amount_out).await.unwrap();
        assert_eq!(h.account(user).await.unwrap().pending_withdrawal, sold.amount_out);
        assert_eq!(h.withdraw(user).await.unwrap(), sold.amount_out);
        assert_eq!(sim.transfers(), vec![(user, sold.amount_out)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ledger_errors_pass_through() {
        let (h, _sim) = spawn();
        let user = Address::repeat_byte(1);
        assert_eq!(h.buy(user, units(0)).await, Err(KeeperError::Ledger(LedgerError::InvalidAmount)));
        assert_eq!(
            h.set_emergency_mode(user, true).await,
            Err(KeeperError::Ledger(LedgerError::NotAuthorized))
        );
        assert!(h.snapshot().await.unwrap().reserves.eth > units(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_buys_respect_rate_limit() {
        let (h, _sim) = spawn();
        let user = Address::repeat_byte(1);
        let amount = units(1) / alloy_primitives::U256::from(100u8);

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.buy(user, amount).await })
            })
            .collect();

        let mut ok = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert_eq!(e, KeeperError::Ledger(LedgerError::ExceededRateLimit)),
            }
        }
        assert_eq!(ok, 3);
        assert_eq!(h.account(user).await.unwrap().action_count, 3);
    }
}
