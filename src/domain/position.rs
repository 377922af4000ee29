//! Position lifecycle state machine.
//!
//! `Pending -> Open -> PartiallyClosed(k) -> Closed`. Every mutation is
//! appended to the position's event log; the log is never rewritten.
//! Stop adjustments made while processing a bar only take effect from the
//! following bar.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::domain::config::{ConflictPolicy, LifecycleConfig};
use crate::domain::config_validation::validate_take_profit_tiers;
use crate::domain::error::ScalptraderError;
use crate::domain::execution::{calculate_fee, entry_fill_price, exit_fill_price, ExecutionConfig};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionState {
    Pending,
    Open,
    /// Number of take-profit tiers already hit.
    PartiallyClosed(usize),
    Closed,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Pending => write!(f, "Pending"),
            PositionState::Open => write!(f, "Open"),
            PositionState::PartiallyClosed(k) => write!(f, "PartiallyClosed({})", k),
            PositionState::Closed => write!(f, "Closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfitTier {
    pub r_multiple: f64,
    pub price: f64,
    pub fraction: f64,
    pub hit: bool,
}

/// What placed the current stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopKind {
    Initial,
    Breakeven,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ExitReason {
    StopLoss,
    Breakeven,
    TrailingStop,
    TakeProfit,
    TimeLimit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Breakeven => "breakeven",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TimeLimit => "time_limit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StopKind> for ExitReason {
    fn from(kind: StopKind) -> Self {
        match kind {
            StopKind::Initial => ExitReason::StopLoss,
            StopKind::Breakeven => ExitReason::Breakeven,
            StopKind::Trailing => ExitReason::TrailingStop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PositionEventKind {
    Filled {
        price: f64,
        size: f64,
        stop: f64,
    },
    TakeProfitHit {
        tier: usize,
        price: f64,
        size: f64,
        pnl: f64,
    },
    StopHit {
        kind: StopKind,
        price: f64,
        size: f64,
        pnl: f64,
    },
    BreakevenApplied {
        stop: f64,
    },
    TrailingMoved {
        from: f64,
        to: f64,
    },
    MarketExit {
        reason: ExitReason,
        price: f64,
        size: f64,
        pnl: f64,
    },
    Closed {
        realized_pnl: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEvent {
    pub position_id: u64,
    pub timestamp: NaiveDateTime,
    pub kind: PositionEventKind,
}

impl PositionEvent {
    /// Realized PnL carried by this event, if it closed any size.
    pub fn realized_pnl(&self) -> Option<f64> {
        match self.kind {
            PositionEventKind::TakeProfitHit { pnl, .. }
            | PositionEventKind::StopHit { pnl, .. }
            | PositionEventKind::MarketExit { pnl, .. } => Some(pnl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub state: PositionState,
    pub created_at: NaiveDateTime,
    pub opened_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
    pub entry_price: f64,
    pub size: f64,
    pub remaining_size: f64,
    /// Per-unit risk fixed at creation; one R.
    pub stop_distance: f64,
    pub initial_stop: f64,
    pub stop: f64,
    pub stop_kind: StopKind,
    pub tiers: Vec<TakeProfitTier>,
    pub realized_pnl: f64,
    pub fees_paid: f64,
    pub breakeven_applied: bool,
    pub trailing_active: bool,
    pub best_price: f64,
    pub exit_reason: Option<ExitReason>,
    entry_fee: f64,
    exit_value: f64,
    events: Vec<PositionEvent>,
}

impl Position {
    /// Create an unfilled position. Tier prices are fixed on fill.
    pub fn pending(
        id: u64,
        symbol: &str,
        side: Side,
        size: f64,
        stop_distance: f64,
        created_at: NaiveDateTime,
        lifecycle: &LifecycleConfig,
    ) -> Result<Self, ScalptraderError> {
        if !(size.is_finite() && size > 0.0) {
            return Err(ScalptraderError::InvalidPosition {
                reason: format!("size must be positive, got {}", size),
            });
        }
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(ScalptraderError::InvalidPosition {
                reason: format!("stop distance must be positive, got {}", stop_distance),
            });
        }
        validate_take_profit_tiers(&lifecycle.take_profit_r, &lifecycle.take_profit_fractions)
            .map_err(|e| ScalptraderError::InvalidPosition {
                reason: e.to_string(),
            })?;

        let tiers = lifecycle
            .take_profit_r
            .iter()
            .zip(&lifecycle.take_profit_fractions)
            .map(|(&r_multiple, &fraction)| TakeProfitTier {
                r_multiple,
                price: 0.0,
                fraction,
                hit: false,
            })
            .collect();

        Ok(Position {
            id,
            symbol: symbol.to_string(),
            side,
            state: PositionState::Pending,
            created_at,
            opened_at: None,
            closed_at: None,
            entry_price: 0.0,
            size,
            remaining_size: size,
            stop_distance,
            initial_stop: 0.0,
            stop: 0.0,
            stop_kind: StopKind::Initial,
            tiers,
            realized_pnl: 0.0,
            fees_paid: 0.0,
            breakeven_applied: false,
            trailing_active: false,
            best_price: 0.0,
            exit_reason: None,
            entry_fee: 0.0,
            exit_value: 0.0,
            events: Vec::new(),
        })
    }

    pub fn events(&self) -> &[PositionEvent] {
        &self.events
    }

    pub fn is_closed(&self) -> bool {
        self.state == PositionState::Closed
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            PositionState::Open | PositionState::PartiallyClosed(_)
        )
    }

    pub fn tiers_hit(&self) -> usize {
        self.tiers.iter().filter(|t| t.hit).count()
    }

    /// Initial risk in account currency: one R times the full size.
    pub fn initial_risk(&self) -> f64 {
        self.stop_distance * self.size
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        if !self.is_live() {
            return 0.0;
        }
        (mark - self.entry_price) * self.side.sign() * self.remaining_size
    }

    /// Size-weighted mean exit price over everything closed so far.
    pub fn average_exit_price(&self) -> f64 {
        let closed = self.size - self.remaining_size;
        if closed > 0.0 {
            self.exit_value / closed
        } else {
            0.0
        }
    }

    /// Profit in R of the most favourable price seen.
    fn best_r(&self) -> f64 {
        (self.best_price - self.entry_price) * self.side.sign() / self.stop_distance
    }

    fn is_tighter(&self, candidate: f64) -> bool {
        match self.side {
            Side::Long => candidate > self.stop,
            Side::Short => candidate < self.stop,
        }
    }

    fn reject(&self, action: &'static str) -> ScalptraderError {
        ScalptraderError::InvalidTransition {
            position: self.id,
            from: self.state.to_string(),
            action,
        }
    }

    fn push(&mut self, timestamp: NaiveDateTime, kind: PositionEventKind) -> PositionEvent {
        let event = PositionEvent {
            position_id: self.id,
            timestamp,
            kind,
        };
        self.events.push(event.clone());
        event
    }

    /// Move `Pending -> Open` at `market_price` (slippage and fee applied).
    pub fn fill(
        &mut self,
        market_price: f64,
        at: NaiveDateTime,
        costs: &ExecutionConfig,
    ) -> Result<Vec<PositionEvent>, ScalptraderError> {
        if self.state != PositionState::Pending {
            return Err(self.reject("fill"));
        }
        let price = entry_fill_price(self.side, market_price, costs);
        let sign = self.side.sign();

        self.entry_price = price;
        self.initial_stop = price - sign * self.stop_distance;
        self.stop = self.initial_stop;
        self.best_price = price;
        for tier in &mut self.tiers {
            tier.price = price + sign * tier.r_multiple * self.stop_distance;
        }
        self.entry_fee = calculate_fee(price * self.size, costs);
        self.fees_paid = self.entry_fee;
        self.opened_at = Some(at);
        self.state = PositionState::Open;

        let event = self.push(
            at,
            PositionEventKind::Filled {
                price,
                size: self.size,
                stop: self.stop,
            },
        );
        Ok(vec![event])
    }

    /// Close `qty` at `market_price`; returns (fill price, net pnl).
    fn close_chunk(&mut self, qty: f64, market_price: f64, costs: &ExecutionConfig) -> (f64, f64) {
        let qty = qty.min(self.remaining_size);
        let price = exit_fill_price(self.side, market_price, costs);
        let exit_fee = calculate_fee(price * qty, costs);
        let entry_fee_share = self.entry_fee * qty / self.size;
        let pnl = (price - self.entry_price) * self.side.sign() * qty - exit_fee - entry_fee_share;

        self.remaining_size -= qty;
        if self.remaining_size < self.size * 1e-12 {
            self.remaining_size = 0.0;
        }
        self.realized_pnl += pnl;
        self.fees_paid += exit_fee;
        self.exit_value += price * qty;
        (price, pnl)
    }

    fn finish(&mut self, at: NaiveDateTime, reason: ExitReason, events: &mut Vec<PositionEvent>) {
        self.state = PositionState::Closed;
        self.closed_at = Some(at);
        self.exit_reason = Some(reason);
        let realized_pnl = self.realized_pnl;
        events.push(self.push(at, PositionEventKind::Closed { realized_pnl }));
    }

    fn stop_touched(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.low <= self.stop,
            Side::Short => bar.high >= self.stop,
        }
    }

    fn tier_touched(&self, tier: &TakeProfitTier, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.high >= tier.price,
            Side::Short => bar.low <= tier.price,
        }
    }

    fn exit_at_stop(&mut self, at: NaiveDateTime, costs: &ExecutionConfig, events: &mut Vec<PositionEvent>) {
        let size = self.remaining_size;
        let kind = self.stop_kind;
        let (price, pnl) = self.close_chunk(size, self.stop, costs);
        events.push(self.push(
            at,
            PositionEventKind::StopHit {
                kind,
                price,
                size,
                pnl,
            },
        ));
        self.finish(at, kind.into(), events);
    }

    fn take_profits(&mut self, bar: &Bar, costs: &ExecutionConfig, events: &mut Vec<PositionEvent>) {
        for i in 0..self.tiers.len() {
            if self.tiers[i].hit || !self.tier_touched(&self.tiers[i], bar) {
                continue;
            }
            let last_open_tier = self.tiers.iter().filter(|t| !t.hit).count() == 1;
            let qty = if last_open_tier {
                self.remaining_size
            } else {
                self.tiers[i].fraction * self.size
            };
            let target = self.tiers[i].price;
            let (price, pnl) = self.close_chunk(qty, target, costs);
            self.tiers[i].hit = true;
            events.push(self.push(
                bar.timestamp,
                PositionEventKind::TakeProfitHit {
                    tier: i,
                    price,
                    size: qty,
                    pnl,
                },
            ));

            if self.remaining_size <= 0.0 || self.tiers.iter().all(|t| t.hit) {
                if self.remaining_size > 0.0 {
                    let rest = self.remaining_size;
                    let (price, pnl) = self.close_chunk(rest, target, costs);
                    events.push(self.push(
                        bar.timestamp,
                        PositionEventKind::TakeProfitHit {
                            tier: i,
                            price,
                            size: rest,
                            pnl,
                        },
                    ));
                }
                self.finish(bar.timestamp, ExitReason::TakeProfit, events);
                return;
            }
            self.state = PositionState::PartiallyClosed(self.tiers_hit());
        }
    }

    fn adjust_stop(&mut self, bar: &Bar, lifecycle: &LifecycleConfig, events: &mut Vec<PositionEvent>) {
        self.best_price = match self.side {
            Side::Long => self.best_price.max(bar.high),
            Side::Short => self.best_price.min(bar.low),
        };
        let sign = self.side.sign();
        let best_r = self.best_r();

        if !self.breakeven_applied && best_r >= lifecycle.breakeven_r {
            self.breakeven_applied = true;
            let target = self.entry_price * (1.0 + sign * lifecycle.breakeven_buffer_pct / 100.0);
            if self.is_tighter(target) {
                self.stop = target;
                self.stop_kind = StopKind::Breakeven;
                events.push(self.push(
                    bar.timestamp,
                    PositionEventKind::BreakevenApplied { stop: target },
                ));
            }
        }

        if best_r >= lifecycle.trailing_activation_r {
            self.trailing_active = true;
            let target = self.best_price * (1.0 - sign * lifecycle.trailing_callback_pct / 100.0);
            if self.is_tighter(target) {
                let from = self.stop;
                self.stop = target;
                self.stop_kind = StopKind::Trailing;
                events.push(self.push(
                    bar.timestamp,
                    PositionEventKind::TrailingMoved { from, to: target },
                ));
            }
        }
    }

    /// Close whatever remains at `market_price`.
    pub fn close_at_market(
        &mut self,
        market_price: f64,
        at: NaiveDateTime,
        reason: ExitReason,
        costs: &ExecutionConfig,
    ) -> Result<Vec<PositionEvent>, ScalptraderError> {
        if !self.is_live() {
            return Err(self.reject("close"));
        }
        let mut events = Vec::new();
        let size = self.remaining_size;
        let (price, pnl) = self.close_chunk(size, market_price, costs);
        events.push(self.push(
            at,
            PositionEventKind::MarketExit {
                reason,
                price,
                size,
                pnl,
            },
        ));
        self.finish(at, reason, &mut events);
        Ok(events)
    }
}

/// Advance a live position through one bar.
///
/// Order: stop (or targets first under [`ConflictPolicy::TargetFirst`]),
/// take-profit tiers ascending, breakeven, trailing, then the holding-time
/// limit. Stop moves apply from the next bar.
pub fn on_bar(
    position: &mut Position,
    bar: &Bar,
    lifecycle: &LifecycleConfig,
    costs: &ExecutionConfig,
) -> Result<Vec<PositionEvent>, ScalptraderError> {
    if !position.is_live() {
        return Err(position.reject("update"));
    }
    let mut events = Vec::new();
    let stop_touched = position.stop_touched(bar);

    match lifecycle.conflict_policy {
        ConflictPolicy::StopFirst => {
            if stop_touched {
                position.exit_at_stop(bar.timestamp, costs, &mut events);
                return Ok(events);
            }
            position.take_profits(bar, costs, &mut events);
        }
        ConflictPolicy::TargetFirst => {
            position.take_profits(bar, costs, &mut events);
            if !position.is_closed() && stop_touched {
                position.exit_at_stop(bar.timestamp, costs, &mut events);
            }
        }
    }
    if position.is_closed() {
        return Ok(events);
    }

    position.adjust_stop(bar, lifecycle, &mut events);

    if let (Some(limit), Some(opened_at)) = (lifecycle.max_hold_minutes, position.opened_at) {
        if (bar.timestamp - opened_at).num_minutes() >= limit {
            let mut exit =
                position.close_at_market(bar.close, bar.timestamp, ExitReason::TimeLimit, costs)?;
            events.append(&mut exit);
        }
    }
    Ok(events)
}

/// Closed-position summary for the trade log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub position_id: u64,
    pub symbol: String,
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub fees: f64,
    pub r_multiple: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// `None` unless the position is closed.
    pub fn from_position(position: &Position) -> Option<Self> {
        if !position.is_closed() {
            return None;
        }
        let risk = position.initial_risk();
        Some(TradeRecord {
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            entry_time: position.opened_at?,
            exit_time: position.closed_at?,
            entry_price: position.entry_price,
            exit_price: position.average_exit_price(),
            size: position.size,
            pnl: position.realized_pnl,
            fees: position.fees_paid,
            r_multiple: if risk > 0.0 {
                position.realized_pnl / risk
            } else {
                0.0
            },
            exit_reason: position.exit_reason?,
        })
    }

    pub fn holding_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn t(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }

    fn bar(minutes: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: t(minutes),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn no_trail() -> LifecycleConfig {
        LifecycleConfig {
            breakeven_r: 100.0,
            trailing_activation_r: 100.0,
            ..LifecycleConfig::default()
        }
    }

    fn open_long(lifecycle: &LifecycleConfig) -> Position {
        let mut p = Position::pending(1, "BTCUSDT", Side::Long, 1.0, 600.0, t(0), lifecycle).unwrap();
        p.fill(30_000.0, t(0), &ExecutionConfig::frictionless()).unwrap();
        p
    }

    #[test]
    fn fill_sets_stop_and_tiers() {
        let p = open_long(&LifecycleConfig::default());
        assert_eq!(p.state, PositionState::Open);
        assert_eq!(p.stop, 29_400.0);
        let prices: Vec<f64> = p.tiers.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![30_900.0, 31_500.0, 32_400.0]);
        assert!(matches!(p.events()[0].kind, PositionEventKind::Filled { .. }));
    }

    #[test]
    fn short_fill_puts_stop_above_entry() {
        let mut p = Position::pending(2, "ETHUSDT", Side::Short, 2.0, 50.0, t(0), &LifecycleConfig::default())
            .unwrap();
        p.fill(2_000.0, t(0), &ExecutionConfig::frictionless()).unwrap();
        assert_eq!(p.stop, 2_050.0);
        assert_eq!(p.tiers[0].price, 1_925.0);
    }

    #[test]
    fn first_tier_partially_closes() {
        let lifecycle = no_trail();
        let mut p = open_long(&lifecycle);
        let events = on_bar(&mut p, &bar(5, 30_950.0, 30_100.0, 30_800.0), &lifecycle, &ExecutionConfig::frictionless())
            .unwrap();
        assert_eq!(p.state, PositionState::PartiallyClosed(1));
        assert_relative_eq!(p.remaining_size, 0.5);
        assert_relative_eq!(p.realized_pnl, 450.0);
        assert!(matches!(
            events[0].kind,
            PositionEventKind::TakeProfitHit { tier: 0, price, .. } if price == 30_900.0
        ));
    }

    #[test]
    fn stop_first_on_conflicting_bar() {
        let lifecycle = no_trail();
        let mut p = open_long(&lifecycle);
        on_bar(&mut p, &bar(5, 31_000.0, 29_300.0, 30_000.0), &lifecycle, &ExecutionConfig::frictionless())
            .unwrap();
        assert!(p.is_closed());
        assert_eq!(p.exit_reason, Some(ExitReason::StopLoss));
        assert_relative_eq!(p.realized_pnl, -600.0);
        assert!(p.tiers.iter().all(|t| !t.hit));
    }

    #[test]
    fn target_first_on_conflicting_bar() {
        let lifecycle = LifecycleConfig {
            conflict_policy: ConflictPolicy::TargetFirst,
            ..no_trail()
        };
        let mut p = open_long(&lifecycle);
        on_bar(&mut p, &bar(5, 31_000.0, 29_300.0, 30_000.0), &lifecycle, &ExecutionConfig::frictionless())
            .unwrap();
        assert!(p.is_closed());
        assert!(p.tiers[0].hit);
        // +450 on half, -300 on the rest
        assert_relative_eq!(p.realized_pnl, 150.0);
    }

    #[test]
    fn all_tiers_in_one_bar_close_position() {
        let lifecycle = no_trail();
        let mut p = open_long(&lifecycle);
        on_bar(&mut p, &bar(5, 32_500.0, 30_000.0, 32_450.0), &lifecycle, &ExecutionConfig::frictionless())
            .unwrap();
        assert!(p.is_closed());
        assert_eq!(p.exit_reason, Some(ExitReason::TakeProfit));
        assert_eq!(p.remaining_size, 0.0);
        // 0.5*900 + 0.3*1500 + 0.2*2400
        assert_relative_eq!(p.realized_pnl, 1_380.0, epsilon = 1e-6);
    }

    #[test]
    fn breakeven_applies_from_next_bar() {
        let lifecycle = LifecycleConfig {
            trailing_activation_r: 100.0,
            ..LifecycleConfig::default()
        };
        let mut p = open_long(&lifecycle);
        let costs = ExecutionConfig::frictionless();
        // 0.75R reached; the same bar's low is below entry but above the old stop
        let events = on_bar(&mut p, &bar(5, 30_450.0, 29_500.0, 30_300.0), &lifecycle, &costs).unwrap();
        assert!(!p.is_closed());
        assert!(p.breakeven_applied);
        assert_eq!(p.stop, 30_000.0);
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, PositionEventKind::BreakevenApplied { .. })));

        on_bar(&mut p, &bar(10, 30_100.0, 29_990.0, 30_000.0), &lifecycle, &costs).unwrap();
        assert!(p.is_closed());
        assert_eq!(p.exit_reason, Some(ExitReason::Breakeven));
        assert_relative_eq!(p.realized_pnl, 0.0);
    }

    #[test]
    fn trailing_only_tightens() {
        let lifecycle = LifecycleConfig {
            take_profit_r: vec![10.0],
            take_profit_fractions: vec![1.0],
            ..LifecycleConfig::default()
        };
        let mut p = open_long(&lifecycle);
        let costs = ExecutionConfig::frictionless();
        on_bar(&mut p, &bar(5, 30_700.0, 30_100.0, 30_650.0), &lifecycle, &costs).unwrap();
        assert!(p.trailing_active);
        let trailed = p.stop;
        assert_relative_eq!(trailed, 30_700.0 * 0.996);

        // Pullback that stays above the stop: no loosening
        on_bar(&mut p, &bar(10, 30_600.0, 30_590.0, 30_595.0), &lifecycle, &costs).unwrap();
        assert_eq!(p.stop, trailed);
        assert_eq!(p.stop_kind, StopKind::Trailing);
    }

    #[test]
    fn time_limit_closes_at_bar_close() {
        let lifecycle = LifecycleConfig {
            max_hold_minutes: Some(10),
            ..no_trail()
        };
        let mut p = open_long(&lifecycle);
        let costs = ExecutionConfig::frictionless();
        on_bar(&mut p, &bar(5, 30_100.0, 29_900.0, 30_050.0), &lifecycle, &costs).unwrap();
        assert!(p.is_live());
        on_bar(&mut p, &bar(10, 30_200.0, 29_900.0, 30_100.0), &lifecycle, &costs).unwrap();
        assert!(p.is_closed());
        assert_eq!(p.exit_reason, Some(ExitReason::TimeLimit));
        assert_relative_eq!(p.realized_pnl, 100.0);
    }

    #[test]
    fn fees_are_allocated_per_chunk() {
        let lifecycle = no_trail();
        let costs = ExecutionConfig {
            slippage_pct: 0.0,
            fee_pct: 0.1,
        };
        let mut p = Position::pending(3, "BTCUSDT", Side::Long, 1.0, 600.0, t(0), &lifecycle).unwrap();
        p.fill(30_000.0, t(0), &costs).unwrap();
        on_bar(&mut p, &bar(5, 30_950.0, 30_100.0, 30_800.0), &lifecycle, &costs).unwrap();
        // 450 gross - 15.45 exit fee - 15 entry fee share
        assert_relative_eq!(p.realized_pnl, 450.0 - 15.45 - 15.0, epsilon = 1e-9);
    }

    #[test]
    fn closed_position_rejects_further_updates() {
        let lifecycle = no_trail();
        let mut p = open_long(&lifecycle);
        let costs = ExecutionConfig::frictionless();
        p.close_at_market(30_000.0, t(5), ExitReason::EndOfData, &costs).unwrap();
        let err = on_bar(&mut p, &bar(10, 1.0, 1.0, 1.0), &lifecycle, &costs).unwrap_err();
        assert!(matches!(err, ScalptraderError::InvalidTransition { position: 1, action: "update", .. }));
        let err = p.close_at_market(30_000.0, t(10), ExitReason::EndOfData, &costs).unwrap_err();
        assert!(matches!(err, ScalptraderError::InvalidTransition { action: "close", .. }));
        let err = p.fill(30_000.0, t(10), &costs).unwrap_err();
        assert!(matches!(err, ScalptraderError::InvalidTransition { action: "fill", .. }));
    }

    #[test]
    fn pending_rejects_bad_inputs() {
        let lifecycle = LifecycleConfig::default();
        assert!(Position::pending(1, "X", Side::Long, 0.0, 1.0, t(0), &lifecycle).is_err());
        assert!(Position::pending(1, "X", Side::Long, 1.0, 0.0, t(0), &lifecycle).is_err());
        let bad = LifecycleConfig {
            take_profit_fractions: vec![0.5, 0.3, 0.1],
            ..LifecycleConfig::default()
        };
        let err = Position::pending(1, "X", Side::Long, 1.0, 1.0, t(0), &bad).unwrap_err();
        assert!(matches!(err, ScalptraderError::InvalidPosition { .. }));
    }

    #[test]
    fn trade_record_summarises_closed_position() {
        let lifecycle = no_trail();
        let mut p = open_long(&lifecycle);
        let costs = ExecutionConfig::frictionless();
        assert!(TradeRecord::from_position(&p).is_none());
        on_bar(&mut p, &bar(5, 30_950.0, 30_100.0, 30_800.0), &lifecycle, &costs).unwrap();
        on_bar(&mut p, &bar(10, 30_500.0, 29_300.0, 29_500.0), &lifecycle, &costs).unwrap();
        let record = TradeRecord::from_position(&p).unwrap();
        assert_eq!(record.exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(record.pnl, 450.0 - 300.0);
        assert_relative_eq!(record.r_multiple, 0.25);
        assert_relative_eq!(record.exit_price, (30_900.0 + 29_400.0) / 2.0);
        assert_eq!(record.holding_minutes(), 10);
    }
}
