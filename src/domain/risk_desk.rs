//! Shared account for strategies evaluating concurrently.
//!
//! The decision and the slot reservation happen under one lock, so two
//! callers cannot both take the last concurrent-position slot.

use chrono::NaiveDateTime;
use std::sync::{Mutex, MutexGuard};

use crate::domain::risk::{AccountState, RiskDecision, RiskManager};
use crate::domain::signal::Signal;

pub struct RiskDesk {
    manager: RiskManager,
    account: Mutex<AccountState>,
}

impl RiskDesk {
    pub fn new(manager: RiskManager, account: AccountState) -> Self {
        RiskDesk {
            manager,
            account: Mutex::new(account),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AccountState> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide and, when approved, reserve the position slot atomically.
    pub fn decide_and_reserve(&self, symbol: &str, signal: &Signal) -> RiskDecision {
        let mut account = self.lock();
        account.roll_day(signal.timestamp);
        let decision = self.manager.decide(symbol, signal, &account);
        if decision.approved {
            self.manager.record_open(&mut account, symbol, signal.timestamp);
        }
        decision
    }

    pub fn record_realized(&self, pnl: f64, at: NaiveDateTime) {
        let mut account = self.lock();
        self.manager.record_realized(&mut account, pnl, at);
    }

    pub fn record_close(&self, symbol: &str, trade_pnl: f64, at: NaiveDateTime) {
        let mut account = self.lock();
        self.manager.record_close(&mut account, symbol, trade_pnl, at);
    }

    /// Give back a reservation whose order never filled.
    pub fn release(&self, symbol: &str) {
        let mut account = self.lock();
        self.manager.release(&mut account, symbol);
    }

    pub fn snapshot(&self) -> AccountState {
        self.lock().clone()
    }
}
