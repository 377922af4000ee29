//! Bar-by-bar historical replay.
//!
//! A replay feeds the same indicator, confirmation, risk and lifecycle code
//! used live with one symbol's bars in strict chronological order. Each
//! symbol gets its own [`AccountState`]; [`run_symbols`] replays several
//! symbols in parallel.

use chrono::Duration;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::config::TradingConfig;
use crate::domain::confirmation::evaluate;
use crate::domain::error::ScalptraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator_helpers::compute_indicator_sets;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{check_timeline, Bar};
use crate::domain::position::{on_bar, ExitReason, Position, PositionEvent, TradeRecord};
use crate::domain::risk::{AccountState, RejectReason, RiskManager};
use crate::ports::lot_port::LotRounding;

/// When an approved entry is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryFill {
    /// Open of the bar after the signal.
    #[default]
    NextBarOpen,
    /// Close of the signal bar.
    SignalClose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub slippage_pct: f64,
    pub fee_pct: f64,
    pub entry_fill: EntryFill,
    pub bar_interval_minutes: i64,
    pub tolerate_gaps: bool,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            slippage_pct: 0.05,
            fee_pct: 0.04,
            entry_fill: EntryFill::NextBarOpen,
            bar_interval_minutes: 5,
            tolerate_gaps: false,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            slippage_pct: self.slippage_pct,
            fee_pct: self.fee_pct,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(self.bar_interval_minutes)
    }

    /// Bars per year; crypto futures trade around the clock.
    pub fn periods_per_year(&self) -> f64 {
        365.0 * 24.0 * 60.0 / self.bar_interval_minutes as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: chrono::NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub symbol: String,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub events: Vec<PositionEvent>,
    pub rejections: BTreeMap<RejectReason, usize>,
    pub signals_fired: usize,
    pub bars_processed: usize,
    pub gaps_skipped: usize,
    pub cancelled: bool,
    pub final_account: AccountState,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.final_account.equity
    }

    pub fn total_rejections(&self) -> usize {
        self.rejections.values().sum()
    }
}

/// Replay `bars` for `symbol` to the end.
pub fn run(
    symbol: &str,
    bars: &[Bar],
    config: &TradingConfig,
    lot: Arc<dyn LotRounding + Send + Sync>,
) -> Result<BacktestResult, ScalptraderError> {
    run_with_cancel(symbol, bars, config, lot, &AtomicBool::new(false))
}

/// Replay `bars`, stopping before the next bar once `cancel` is set.
///
/// A cancelled result covers exactly the bars processed so far; open
/// positions are left open and marked to market in the equity curve.
pub fn run_with_cancel(
    symbol: &str,
    bars: &[Bar],
    config: &TradingConfig,
    lot: Arc<dyn LotRounding + Send + Sync>,
    cancel: &AtomicBool,
) -> Result<BacktestResult, ScalptraderError> {
    let bt = &config.backtest;
    let timeline = check_timeline(symbol, bars, bt.interval(), bt.tolerate_gaps)?;
    let minimum = config.indicators.warmup_bars() + 1;
    if bars.len() < minimum {
        return Err(ScalptraderError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum,
        });
    }

    log::info!(
        "{}: replaying {} bars, {} gaps, variant {}",
        symbol,
        bars.len(),
        timeline.gaps,
        config.signals.variant
    );

    let enriched = compute_indicator_sets(bars, &config.indicators);
    let costs = bt.execution();
    let manager = RiskManager::new(config, lot);
    let mut replay = Replay {
        symbol,
        config,
        costs,
        manager: &manager,
        account: AccountState::new(bt.initial_capital, bars[0].timestamp),
        open: Vec::new(),
        pending: None,
        next_id: 1,
        trades: Vec::new(),
        events: Vec::new(),
    };

    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut rejections: BTreeMap<RejectReason, usize> = BTreeMap::new();
    let mut signals_fired = 0;
    let mut bars_processed = 0;
    let mut cancelled = false;

    for (i, current) in enriched.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let bar = &current.bar;
        replay.account.roll_day(bar.timestamp);
        replay.fill_pending(bar)?;
        replay.advance_positions(bar)?;

        if i >= 1 {
            let signal = evaluate(current, &enriched[i - 1], &config.signals);
            let last_bar = i + 1 == enriched.len();
            let entry_possible = !(last_bar && bt.entry_fill == EntryFill::NextBarOpen);
            if let (Some(side), true) = (signal.side, entry_possible) {
                signals_fired += 1;
                let decision = manager.decide(symbol, &signal, &replay.account);
                match decision.reason {
                    Some(reason) => *rejections.entry(reason).or_insert(0) += 1,
                    None => replay.enter(side, decision.size, signal.stop_distance, bar)?,
                }
            }
        }

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: replay.marked_equity(bar.close),
        });
        bars_processed += 1;
    }

    if cancelled {
        log::warn!("{}: cancelled after {} bars", symbol, bars_processed);
        if replay.pending.take().is_some() {
            manager.release(&mut replay.account, symbol);
        }
    } else if let Some(last) = bars.last() {
        replay.close_all(last)?;
        if let Some(point) = equity_curve.last_mut() {
            point.equity = replay.account.equity;
        }
    }

    let metrics = Metrics::compute(
        &replay.trades,
        &equity_curve,
        bt.initial_capital,
        bt.periods_per_year(),
        bt.risk_free_rate,
    );
    log::info!(
        "{}: {} trades, final equity {:.2}, {} signals, {} rejected",
        symbol,
        replay.trades.len(),
        replay.account.equity,
        signals_fired,
        rejections.values().sum::<usize>()
    );

    Ok(BacktestResult {
        symbol: symbol.to_string(),
        trades: replay.trades,
        equity_curve,
        metrics,
        events: replay.events,
        rejections,
        signals_fired,
        bars_processed,
        gaps_skipped: timeline.gaps,
        cancelled,
        final_account: replay.account,
    })
}

/// Replay every `(symbol, bars)` pair in parallel, each with its own
/// account. Results come back in input order.
pub fn run_symbols(
    datasets: &[(String, Vec<Bar>)],
    config: &TradingConfig,
    lot: Arc<dyn LotRounding + Send + Sync>,
) -> Vec<(String, Result<BacktestResult, ScalptraderError>)> {
    datasets
        .par_iter()
        .map(|(symbol, bars)| (symbol.clone(), run(symbol, bars, config, lot.clone())))
        .collect()
}

/// Mutable state of one symbol's replay.
struct Replay<'a> {
    symbol: &'a str,
    config: &'a TradingConfig,
    costs: ExecutionConfig,
    manager: &'a RiskManager,
    account: AccountState,
    open: Vec<Position>,
    pending: Option<Position>,
    next_id: u64,
    trades: Vec<TradeRecord>,
    events: Vec<PositionEvent>,
}

impl Replay<'_> {
    fn fill_pending(&mut self, bar: &Bar) -> Result<(), ScalptraderError> {
        if let Some(mut position) = self.pending.take() {
            let events = position.fill(bar.open, bar.timestamp, &self.costs)?;
            self.events.extend(events);
            self.open.push(position);
        }
        Ok(())
    }

    fn advance_positions(&mut self, bar: &Bar) -> Result<(), ScalptraderError> {
        for position in self.open.iter_mut() {
            let events = on_bar(position, bar, &self.config.lifecycle, &self.costs)?;
            for pnl in events.iter().filter_map(PositionEvent::realized_pnl) {
                self.manager.record_realized(&mut self.account, pnl, bar.timestamp);
            }
            self.events.extend(events);
        }
        self.settle_closed(bar);
        Ok(())
    }

    fn settle_closed(&mut self, bar: &Bar) {
        let (closed, open): (Vec<Position>, Vec<Position>) =
            self.open.drain(..).partition(Position::is_closed);
        self.open = open;
        for position in closed {
            self.manager
                .record_close(&mut self.account, &position.symbol, position.realized_pnl, bar.timestamp);
            if let Some(trade) = TradeRecord::from_position(&position) {
                log::debug!(
                    "{} #{} closed {}: pnl {:.2} ({:.2}R)",
                    self.symbol,
                    trade.position_id,
                    trade.exit_reason,
                    trade.pnl,
                    trade.r_multiple
                );
                self.trades.push(trade);
            }
        }
    }

    fn enter(
        &mut self,
        side: crate::domain::signal::Side,
        size: f64,
        stop_distance: f64,
        bar: &Bar,
    ) -> Result<(), ScalptraderError> {
        self.manager.record_open(&mut self.account, self.symbol, bar.timestamp);
        let mut position = Position::pending(
            self.next_id,
            self.symbol,
            side,
            size,
            stop_distance,
            bar.timestamp,
            &self.config.lifecycle,
        )?;
        self.next_id += 1;

        match self.config.backtest.entry_fill {
            EntryFill::SignalClose => {
                let events = position.fill(bar.close, bar.timestamp, &self.costs)?;
                self.events.extend(events);
                self.open.push(position);
            }
            EntryFill::NextBarOpen => self.pending = Some(position),
        }
        Ok(())
    }

    fn marked_equity(&self, mark: f64) -> f64 {
        self.account.equity
            + self
                .open
                .iter()
                .map(|p| p.unrealized_pnl(mark))
                .sum::<f64>()
    }

    fn close_all(&mut self, last: &Bar) -> Result<(), ScalptraderError> {
        for position in self.open.iter_mut() {
            let events =
                position.close_at_market(last.close, last.timestamp, ExitReason::EndOfData, &self.costs)?;
            for pnl in events.iter().filter_map(PositionEvent::realized_pnl) {
                self.manager.record_realized(&mut self.account, pnl, last.timestamp);
            }
            self.events.extend(events);
        }
        self.settle_closed(last);
        Ok(())
    }
}
