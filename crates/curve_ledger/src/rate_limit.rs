//! Per-account action counter over a fixed window

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LedgerError;

/// Window state for one account, created lazily on its first action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Actions recorded in the current window
    pub action_count: u32,

    /// Window start (unix seconds)
    pub window_start: u64,

    /// Last recorded action (unix seconds)
    pub last_action: u64,
}

impl RateLimitState {
    /// Count as seen at `now`: 0 once the window has lapsed
    fn effective_count(&self, now: u64, interval: u64) -> u32 {
        if now.saturating_sub(self.window_start) >= interval {
            0
        } else {
            self.action_count
        }
    }
}

/// Buys and sells share one counter per account.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: u64,
    max_actions: u32,
    states: HashMap<Address, RateLimitState>,
}

impl RateLimiter {
    pub fn new(interval: u64, max_actions: u32) -> Self {
        Self {
            interval,
            max_actions,
            states: HashMap::new(),
        }
    }

    /// Would an action by `account` at `now` be admitted? Does not mutate.
    pub fn check(&self, account: &Address, now: u64) -> Result<(), LedgerError> {
        let count = self
            .states
            .get(account)
            .map(|s| s.effective_count(now, self.interval))
            .unwrap_or(0);

        if count >= self.max_actions {
            return Err(LedgerError::ExceededRateLimit);
        }
        Ok(())
    }

    /// Record an admitted action. Resets the window first if it lapsed.
    pub fn record(&mut self, account: Address, now: u64) {
        let interval = self.interval;
        let state = self.states.entry(account).or_insert(RateLimitState {
            action_count: 0,
            window_start: now,
            last_action: now,
        });

        if now.saturating_sub(state.window_start) >= interval {
            state.action_count = 0;
            state.window_start = now;
        }

        state.action_count = state.action_count.saturating_add(1);
        state.last_action = now;
    }

    /// Check then record. A rejected action is not counted.
    pub fn check_and_record(&mut self, account: Address, now: u64) -> Result<(), LedgerError> {
        self.check(&account, now)?;
        self.record(account, now);
        Ok(())
    }

    /// Actions counted against `account` in the window containing `now`
    pub fn action_count(&self, account: &Address, now: u64) -> u32 {
        self.states
            .get(account)
            .map(|s| s.effective_count(now, self.interval))
            .unwrap_or(0)
    }

    pub fn last_action_time(&self, account: &Address) -> Option<u64> {
        self.states.get(account).map(|s| s.last_action)
    }

    pub fn state(&self, account: &Address) -> Option<&RateLimitState> {
        self.states.get(account)
    }
}
