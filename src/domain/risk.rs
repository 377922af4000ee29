//! Account state and the hard-limit risk gate.
//!
//! [`RiskManager::decide`] is a pure function of the signal and the account.
//! Limits come only from [`RiskConfig`]; there is no way to waive them per
//! call. Account mutation happens through the `record_*` methods as
//! positions open and close.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::config::{RiskConfig, TradingConfig};
use crate::domain::signal::Signal;
use crate::ports::lot_port::LotRounding;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountState {
    pub equity: f64,
    pub high_water_mark: f64,
    pub day_start_equity: f64,
    pub daily_pnl: f64,
    pub trading_day: NaiveDate,
    pub trades_today: u32,
    pub consecutive_losses: u32,
    pub cooldown_until: Option<NaiveDateTime>,
    /// Open (or reserved) positions per symbol.
    pub open_positions: BTreeMap<String, usize>,
}

impl AccountState {
    pub fn new(equity: f64, start: NaiveDateTime) -> Self {
        AccountState {
            equity,
            high_water_mark: equity,
            day_start_equity: equity,
            daily_pnl: 0.0,
            trading_day: start.date(),
            trades_today: 0,
            consecutive_losses: 0,
            cooldown_until: None,
            open_positions: BTreeMap::new(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open_positions.values().sum()
    }

    pub fn has_open(&self, symbol: &str) -> bool {
        self.open_positions.get(symbol).is_some_and(|n| *n > 0)
    }

    pub fn in_cooldown(&self, at: NaiveDateTime) -> bool {
        self.cooldown_until.is_some_and(|until| at < until)
    }

    /// Peak-to-current decline in percent.
    pub fn drawdown_pct(&self) -> f64 {
        if self.high_water_mark > 0.0 {
            (self.high_water_mark - self.equity) / self.high_water_mark * 100.0
        } else {
            0.0
        }
    }

    /// Realized loss today as a percentage of the day's starting equity.
    /// Reads zero once `at` falls on a later calendar day.
    pub fn daily_loss_pct(&self, at: NaiveDateTime) -> f64 {
        if at.date() != self.trading_day || self.day_start_equity <= 0.0 {
            return 0.0;
        }
        (-self.daily_pnl / self.day_start_equity * 100.0).max(0.0)
    }

    pub fn trades_on(&self, at: NaiveDateTime) -> u32 {
        if at.date() == self.trading_day {
            self.trades_today
        } else {
            0
        }
    }

    /// Reset the daily counters when `at` starts a new calendar day.
    pub fn roll_day(&mut self, at: NaiveDateTime) {
        let day = at.date();
        if day > self.trading_day {
            self.trading_day = day;
            self.day_start_equity = self.equity;
            self.daily_pnl = 0.0;
            self.trades_today = 0;
        }
    }
}

/// Stable rejection codes, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RejectReason {
    NoSignal,
    DailyDrawdownLimit,
    TotalDrawdownLimit,
    MaxConcurrentPositions,
    Cooldown,
    InvalidStopDistance,
    StopDistanceTooWide,
    RewardRiskTooLow,
    LeverageTooHigh,
    DailyTradeLimit,
    SymbolAlreadyOpen,
    SizeBelowMinimum,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NoSignal => "no_signal",
            RejectReason::DailyDrawdownLimit => "daily_drawdown_limit",
            RejectReason::TotalDrawdownLimit => "total_drawdown_limit",
            RejectReason::MaxConcurrentPositions => "max_concurrent_positions",
            RejectReason::Cooldown => "cooldown",
            RejectReason::InvalidStopDistance => "invalid_stop_distance",
            RejectReason::StopDistanceTooWide => "stop_distance_too_wide",
            RejectReason::RewardRiskTooLow => "reward_risk_too_low",
            RejectReason::LeverageTooHigh => "leverage_too_high",
            RejectReason::DailyTradeLimit => "daily_trade_limit",
            RejectReason::SymbolAlreadyOpen => "symbol_already_open",
            RejectReason::SizeBelowMinimum => "size_below_minimum",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDecision {
    pub approved: bool,
    pub reason: Option<RejectReason>,
    pub size: f64,
    pub leverage: f64,
    /// Equity at risk if the initial stop is hit.
    pub risk_amount: f64,
}

impl RiskDecision {
    fn reject(reason: RejectReason) -> Self {
        RiskDecision {
            approved: false,
            reason: Some(reason),
            size: 0.0,
            leverage: 0.0,
            risk_amount: 0.0,
        }
    }
}

pub struct RiskManager {
    config: RiskConfig,
    reward_r: f64,
    lot: Arc<dyn LotRounding + Send + Sync>,
}

impl RiskManager {
    pub fn new(config: &TradingConfig, lot: Arc<dyn LotRounding + Send + Sync>) -> Self {
        RiskManager {
            config: config.risk.clone(),
            reward_r: config.lifecycle.first_target_r(),
            lot,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Run the ordered check chain; the first failing check decides.
    pub fn decide(&self, symbol: &str, signal: &Signal, account: &AccountState) -> RiskDecision {
        let decision = self.evaluate_checks(symbol, signal, account);
        match decision.reason {
            Some(reason) if reason != RejectReason::NoSignal => {
                log::debug!("{} rejected at {}: {}", symbol, signal.timestamp, reason);
            }
            None => log::debug!(
                "{} approved at {}: size {:.6}, risk {:.2}",
                symbol,
                signal.timestamp,
                decision.size,
                decision.risk_amount
            ),
            _ => {}
        }
        decision
    }

    fn evaluate_checks(&self, symbol: &str, signal: &Signal, account: &AccountState) -> RiskDecision {
        let cfg = &self.config;
        let at = signal.timestamp;

        if signal.side.is_none() {
            return RiskDecision::reject(RejectReason::NoSignal);
        }
        if account.daily_loss_pct(at) >= cfg.max_daily_drawdown_pct {
            return RiskDecision::reject(RejectReason::DailyDrawdownLimit);
        }
        if account.drawdown_pct() >= cfg.max_total_drawdown_pct {
            return RiskDecision::reject(RejectReason::TotalDrawdownLimit);
        }
        if account.open_count() >= cfg.max_concurrent_positions {
            return RiskDecision::reject(RejectReason::MaxConcurrentPositions);
        }
        if account.in_cooldown(at) {
            return RiskDecision::reject(RejectReason::Cooldown);
        }
        if !(signal.stop_distance.is_finite() && signal.stop_distance > 0.0 && signal.entry_price > 0.0) {
            return RiskDecision::reject(RejectReason::InvalidStopDistance);
        }
        if signal.stop_distance_pct() > cfg.max_stop_distance_pct {
            return RiskDecision::reject(RejectReason::StopDistanceTooWide);
        }
        if self.reward_r < cfg.min_reward_risk {
            return RiskDecision::reject(RejectReason::RewardRiskTooLow);
        }
        if cfg.leverage > cfg.max_leverage {
            return RiskDecision::reject(RejectReason::LeverageTooHigh);
        }
        if account.trades_on(at) >= cfg.max_trades_per_day {
            return RiskDecision::reject(RejectReason::DailyTradeLimit);
        }
        if !cfg.allow_pyramiding && account.has_open(symbol) {
            return RiskDecision::reject(RejectReason::SymbolAlreadyOpen);
        }

        let size = self.position_size(signal, account.equity);
        if size <= 0.0 || size < self.lot.min_quantity() {
            return RiskDecision::reject(RejectReason::SizeBelowMinimum);
        }
        RiskDecision {
            approved: true,
            reason: None,
            size,
            leverage: cfg.leverage,
            risk_amount: size * signal.stop_distance,
        }
    }

    /// equity * risk / stop distance, capped by margin, rounded down to a lot.
    fn position_size(&self, signal: &Signal, equity: f64) -> f64 {
        let cfg = &self.config;
        let risk_amount = equity * cfg.risk_per_trade_pct / 100.0;
        let by_risk = risk_amount / signal.stop_distance;
        let max_notional = equity * cfg.leverage * cfg.max_margin_fraction;
        let by_margin = max_notional / signal.entry_price;
        self.lot.round_down(by_risk.min(by_margin))
    }

    /// Reserve a slot for a newly approved position.
    pub fn record_open(&self, account: &mut AccountState, symbol: &str, at: NaiveDateTime) {
        account.roll_day(at);
        account.trades_today += 1;
        *account.open_positions.entry(symbol.to_string()).or_insert(0) += 1;
    }

    /// Apply realized PnL from a full or partial close.
    pub fn record_realized(&self, account: &mut AccountState, pnl: f64, at: NaiveDateTime) {
        account.roll_day(at);
        account.equity += pnl;
        account.daily_pnl += pnl;
        if account.equity > account.high_water_mark {
            account.high_water_mark = account.equity;
        }
    }

    /// Release the slot of a closed position and update the loss streak.
    /// The cooldown arms when the streak reaches the threshold; the streak
    /// then starts over.
    pub fn record_close(
        &self,
        account: &mut AccountState,
        symbol: &str,
        trade_pnl: f64,
        at: NaiveDateTime,
    ) {
        self.release(account, symbol);
        if trade_pnl < 0.0 {
            account.consecutive_losses += 1;
        } else {
            account.consecutive_losses = 0;
        }
        if account.consecutive_losses >= self.config.cooldown_after_losses {
            let until = at + Duration::minutes(self.config.cooldown_minutes);
            log::warn!(
                "{} consecutive losses, entries paused until {}",
                account.consecutive_losses,
                until
            );
            account.cooldown_until = Some(until);
            account.consecutive_losses = 0;
        }
    }

    /// Drop a reservation without counting a trade result.
    pub fn release(&self, account: &mut AccountState, symbol: &str) {
        if let Some(count) = account.open_positions.get_mut(symbol) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                account.open_positions.remove(symbol);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::lot_adapter::StepLotRounding;
    use crate::domain::indicator::VolatilityRegime;
    use crate::domain::signal::Side;
    use chrono::NaiveDate;

    fn ts(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn manager() -> RiskManager {
        let lot = Arc::new(StepLotRounding::new(0.001, 0.001).unwrap());
        RiskManager::new(&TradingConfig::default(), lot)
    }

    fn long_signal(at: NaiveDateTime) -> Signal {
        Signal {
            side: Some(Side::Long),
            candidate: Some(Side::Long),
            confirmations: 6,
            required: 4,
            entry_price: 30_000.0,
            stop_distance: 600.0,
            atr: 300.0,
            regime: VolatilityRegime::Normal,
            ..Signal::none(at)
        }
    }

    #[test]
    fn approves_and_sizes_by_risk() {
        let account = AccountState::new(10_000.0, ts(0, 0));
        let decision = manager().decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert!(decision.approved);
        // 150 risk / 600 per unit = 0.25
        assert!((decision.size - 0.25).abs() < 1e-9);
        assert!(decision.size * 600.0 <= 10_000.0 * 0.015 + 1e-9);
        assert_eq!(decision.leverage, 5.0);
    }

    #[test]
    fn margin_cap_limits_size() {
        let account = AccountState::new(10_000.0, ts(0, 0));
        let mut signal = long_signal(ts(1, 0));
        // Tight stop would ask for 5 units = 150k notional, cap is 50k
        signal.stop_distance = 30.0;
        let decision = manager().decide("BTCUSDT", &signal, &account);
        assert!(decision.approved);
        assert!((decision.size - 50_000.0 / 30_000.0).abs() < 0.001);
    }

    #[test]
    fn no_signal_rejected() {
        let account = AccountState::new(10_000.0, ts(0, 0));
        let decision = manager().decide("BTCUSDT", &Signal::none(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::NoSignal));
    }

    #[test]
    fn daily_drawdown_blocks_and_resets_next_day() {
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        account.daily_pnl = -550.0;
        let m = manager();
        let decision = m.decide("BTCUSDT", &long_signal(ts(9, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::DailyDrawdownLimit));
        assert_eq!(decision.reason.unwrap().as_str(), "daily_drawdown_limit");

        let next_day = NaiveDate::from_ymd_opt(2024, 6, 4)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap();
        assert!(m.decide("BTCUSDT", &long_signal(next_day), &account).approved);
    }

    #[test]
    fn total_drawdown_from_high_water_mark() {
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        account.high_water_mark = 12_000.0;
        account.equity = 10_000.0;
        account.trading_day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let decision = manager().decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::TotalDrawdownLimit));
    }

    #[test]
    fn concurrency_and_pyramiding() {
        let m = manager();
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        m.record_open(&mut account, "BTCUSDT", ts(0, 5));
        let decision = m.decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::SymbolAlreadyOpen));
        assert!(m.decide("ETHUSDT", &long_signal(ts(1, 0)), &account).approved);

        m.record_open(&mut account, "ETHUSDT", ts(0, 10));
        m.record_open(&mut account, "SOLUSDT", ts(0, 15));
        let decision = m.decide("XRPUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::MaxConcurrentPositions));
    }

    #[test]
    fn cooldown_after_loss_streak() {
        let m = manager();
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        for i in 0..3 {
            m.record_open(&mut account, "BTCUSDT", ts(1, i * 10));
            m.record_realized(&mut account, -50.0, ts(1, i * 10 + 5));
            m.record_close(&mut account, "BTCUSDT", -50.0, ts(1, i * 10 + 5));
        }
        assert_eq!(account.cooldown_until, Some(ts(5, 25)));
        assert_eq!(account.consecutive_losses, 0);

        let decision = m.decide("BTCUSDT", &long_signal(ts(5, 24)), &account);
        assert_eq!(decision.reason, Some(RejectReason::Cooldown));
        assert!(m.decide("BTCUSDT", &long_signal(ts(5, 25)), &account).approved);
    }

    #[test]
    fn win_resets_streak() {
        let m = manager();
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        m.record_close(&mut account, "BTCUSDT", -10.0, ts(1, 0));
        m.record_close(&mut account, "BTCUSDT", -10.0, ts(1, 5));
        m.record_close(&mut account, "BTCUSDT", 25.0, ts(1, 10));
        assert_eq!(account.consecutive_losses, 0);
        assert_eq!(account.cooldown_until, None);
    }

    #[test]
    fn wide_stop_rejected() {
        let account = AccountState::new(10_000.0, ts(0, 0));
        let mut signal = long_signal(ts(1, 0));
        signal.stop_distance = 1_200.0;
        let decision = manager().decide("BTCUSDT", &signal, &account);
        assert_eq!(decision.reason, Some(RejectReason::StopDistanceTooWide));
    }

    #[test]
    fn zero_stop_rejected() {
        let account = AccountState::new(10_000.0, ts(0, 0));
        let mut signal = long_signal(ts(1, 0));
        signal.stop_distance = 0.0;
        let decision = manager().decide("BTCUSDT", &signal, &account);
        assert_eq!(decision.reason, Some(RejectReason::InvalidStopDistance));
    }

    #[test]
    fn reward_risk_and_leverage_limits() {
        let lot = Arc::new(StepLotRounding::new(0.001, 0.001).unwrap());
        let account = AccountState::new(10_000.0, ts(0, 0));

        let mut config = TradingConfig::default();
        config.risk.min_reward_risk = 2.0;
        let decision = RiskManager::new(&config, lot.clone()).decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::RewardRiskTooLow));

        let mut config = TradingConfig::default();
        config.risk.leverage = 20.0;
        let decision = RiskManager::new(&config, lot).decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::LeverageTooHigh));
    }

    #[test]
    fn daily_trade_limit() {
        let m = manager();
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        for i in 0..10 {
            m.record_open(&mut account, "BTCUSDT", ts(0, i));
            m.release(&mut account, "BTCUSDT");
        }
        assert_eq!(account.open_count(), 0);
        let decision = m.decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::DailyTradeLimit));
    }

    #[test]
    fn dust_size_rejected() {
        let lot = Arc::new(StepLotRounding::new(1.0, 1.0).unwrap());
        let account = AccountState::new(10_000.0, ts(0, 0));
        let decision = RiskManager::new(&TradingConfig::default(), lot).decide("BTCUSDT", &long_signal(ts(1, 0)), &account);
        assert_eq!(decision.reason, Some(RejectReason::SizeBelowMinimum));
    }

    #[test]
    fn realized_pnl_moves_equity_and_high_water_mark() {
        let m = manager();
        let mut account = AccountState::new(10_000.0, ts(0, 0));
        m.record_realized(&mut account, 500.0, ts(1, 0));
        m.record_realized(&mut account, -200.0, ts(2, 0));
        assert_eq!(account.equity, 10_300.0);
        assert_eq!(account.high_water_mark, 10_500.0);
        assert_eq!(account.daily_pnl, 300.0);
    }
}
