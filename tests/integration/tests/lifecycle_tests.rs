//! Lifecycle scenarios through the keeper: trade, withdraw, migrate, pause

use curve_integration_tests::*;
use curve_keeper::{KeeperConfig, KeeperError};
use curve_ledger::{LedgerError, LedgerState, Resolution};

/// LC-1: Buy, sell, withdraw (happy path)
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_1_buy_sell_withdraw() {
    let env = TestEnv::local();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    let bought = token.buy(alice, eth("0.01")).await.unwrap();
    let snapshot = token.snapshot().await.unwrap();
    assert_eq!(snapshot.reserves.eth, eth("1.61"));
    assert!(snapshot.reserves.token < eth("1060000000"));
    assert_eq!(snapshot.total_supply, bought.amount_out);

    let sold = token.sell(alice, bought.amount_out).await.unwrap();
    let view = token.account(alice).await.unwrap();
    assert_eq!(view.balance, alloy_primitives::U256::ZERO);
    assert_eq!(view.pending_withdrawal, sold.amount_out);
    assert!(sold.amount_out < eth("0.01"), "round trip must not profit");

    assert_eq!(token.withdraw(alice).await.unwrap(), sold.amount_out);
    assert_eq!(
        token.withdraw(alice).await,
        Err(KeeperError::Ledger(LedgerError::NothingToWithdraw))
    );
    assert_eq!(env.settlement.transfers(), vec![(alice, sold.amount_out)]);
}

/// LC-2: Rate limit window, driven by the shared clock
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_2_rate_limit_window() {
    let env = TestEnv::local();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    for _ in 0..3 {
        token.buy(alice, eth("0.01")).await.unwrap();
    }
    assert_eq!(
        token.buy(alice, eth("0.01")).await,
        Err(KeeperError::Ledger(LedgerError::ExceededRateLimit))
    );

    env.clock.advance(60);
    assert!(token.buy(alice, eth("0.01")).await.is_ok());
}

/// LC-3: Failed payout is re-credited and can be retried
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_3_withdrawal_retry_after_failure() {
    let env = TestEnv::local();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    let bought = token.buy(alice, eth("0.05")).await.unwrap();
    token.sell(alice, bought.amount_out).await.unwrap();
    let owed = token.account(alice).await.unwrap().pending_withdrawal;

    env.settlement.set_recipient_failing(alice, true);
    let err = token.withdraw(alice).await.unwrap_err();
    assert!(matches!(err, KeeperError::Ledger(LedgerError::TransferFailed(_))));
    assert_eq!(token.account(alice).await.unwrap().pending_withdrawal, owed);

    env.settlement.set_recipient_failing(alice, false);
    assert_eq!(token.withdraw(alice).await.unwrap(), owed);
    assert_eq!(token.account(alice).await.unwrap().pending_withdrawal, alloy_primitives::U256::ZERO);
}

/// LC-4: Threshold-crossing buy migrates exactly once
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_4_migration() {
    let env = TestEnv::near_migration();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    let r = token.buy(alice, eth("0.16")).await.unwrap();
    assert!(r.migrated_to.is_some());
    assert_eq!(env.settlement.pools_created(), 1);

    let snapshot = token.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LedgerState::Migrated);
    assert_eq!(snapshot.pool, r.migrated_to);

    assert_eq!(
        token.buy(user(0xb0), eth("0.01")).await,
        Err(KeeperError::Ledger(LedgerError::AlreadyMigrated))
    );
    assert_eq!(
        token.sell(alice, r.amount_out).await,
        Err(KeeperError::Ledger(LedgerError::AlreadyMigrated))
    );
    assert_eq!(env.settlement.pools_created(), 1);
}

/// LC-5: A hand-off that misses the settlement deadline rejects the buy
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_5_migration_deadline_rolls_back_buy() {
    let mut config = KeeperConfig::default_local();
    config.curve.migration_threshold = "0.1".to_string();
    config.curve.migration_fee = "0.01".to_string();
    config.settlement_deadline_ms = 50;
    config.simulation.pool_latency_ms = 500;
    let env = TestEnv::new(config);
    let token = env.deploy("SLOW");
    let alice = user(0xa1);

    let before = token.snapshot().await.unwrap();
    let err = token.buy(alice, eth("0.16")).await.unwrap_err();
    match err {
        KeeperError::Ledger(LedgerError::PoolCreationFailed(msg)) => assert!(msg.contains("deadline"), "{}", msg),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(token.snapshot().await.unwrap(), before);
    let view = token.account(alice).await.unwrap();
    assert_eq!(view.balance, alloy_primitives::U256::ZERO);
    assert_eq!(view.action_count, 0);

    // Below threshold still trades normally
    assert!(token.buy(alice, eth("0.01")).await.is_ok());
}

/// LC-6: Failing pool leaves the ledger active until a retry succeeds
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_6_pool_failure_then_retry() {
    let env = TestEnv::near_migration();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    env.settlement.set_pool_failing(true);
    assert!(matches!(
        token.buy(alice, eth("0.16")).await,
        Err(KeeperError::Ledger(LedgerError::PoolCreationFailed(_)))
    ));
    assert_eq!(token.snapshot().await.unwrap().state, LedgerState::Active);

    env.settlement.set_pool_failing(false);
    assert!(token.buy(alice, eth("0.16")).await.unwrap().migrated_to.is_some());
}

/// LC-7: Emergency pause, withdrawals still drain, admin sweep
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_7_emergency_mode() {
    let env = TestEnv::local();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    let bought = token.buy(alice, eth("0.02")).await.unwrap();
    token.sell(alice, bought.amount_out / alloy_primitives::U256::from(2u8)).await.unwrap();

    assert_eq!(
        token.set_emergency_mode(alice, true).await,
        Err(KeeperError::Ledger(LedgerError::NotAuthorized))
    );
    token.set_emergency_mode(admin(), true).await.unwrap();
    assert_eq!(
        token.buy(alice, eth("0.01")).await,
        Err(KeeperError::Ledger(LedgerError::Paused))
    );

    assert!(token.withdraw(alice).await.is_ok());

    let held = token.snapshot().await.unwrap().treasury;
    assert_eq!(token.emergency_withdraw(admin()).await.unwrap(), held);
    assert_eq!(token.snapshot().await.unwrap().treasury, alloy_primitives::U256::ZERO);
}

/// LC-8: Tokens are isolated from each other
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_8_multi_token_isolation() {
    let env = TestEnv::local();
    let frog = env.deploy("FROG");
    let toad = env.deploy("TOAD");
    let alice = user(0xa1);

    assert_ne!(frog.token(), toad.token());
    assert!(env.keeper.is_valid_token(&frog.token()));
    assert_eq!(env.keeper.tokens(), vec![frog.token(), toad.token()]);

    for _ in 0..3 {
        frog.buy(alice, eth("0.01")).await.unwrap();
    }
    // Separate ledgers, separate rate limits
    assert!(toad.buy(alice, eth("0.01")).await.is_ok());
    assert_eq!(toad.snapshot().await.unwrap().total_collected, eth("0.01"));
    assert_eq!(frog.snapshot().await.unwrap().total_collected, eth("0.03"));

    let stranger = user(0x55);
    assert_eq!(env.keeper.ledger(&stranger).err(), Some(KeeperError::UnknownToken(stranger)));
}

/// LC-9: Trades feed the candle charts
#[tokio::test(flavor = "multi_thread")]
async fn test_lc_9_candles_follow_trades() {
    let env = TestEnv::local();
    let token = env.deploy("FROG");
    let alice = user(0xa1);

    let seeded = env.charts.last_bar(&token.token(), Resolution::M1).unwrap();
    token.buy(alice, eth("0.1")).await.unwrap();
    env.clock.advance(120);
    token.buy(alice, eth("0.1")).await.unwrap();
    env.settle_events().await;

    let bars = env.charts.bars(&token.token(), Resolution::M1, 0, u64::MAX).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].volume, 0.1);
    assert!(bars[0].close > seeded.open);
    assert_eq!(bars[1].open, bars[0].close);
    assert!(bars[1].close > bars[0].close);

    let daily = env.charts.last_bar(&token.token(), Resolution::D1).unwrap();
    assert!((daily.volume - 0.2).abs() < 1e-12);
}
