//! Performance metrics over a replay's trade log and equity curve.

use std::fmt;

use super::backtest::EquityPoint;
use super::position::TradeRecord;

/// Gross profit over gross loss; undefined when nothing was lost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Defined(f64),
    Undefined,
}

impl ProfitFactor {
    fn from_totals(gross_profit: f64, gross_loss: f64) -> Self {
        if gross_loss > 0.0 {
            ProfitFactor::Defined(gross_profit / gross_loss)
        } else {
            ProfitFactor::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            ProfitFactor::Defined(v) => Some(v),
            ProfitFactor::Undefined => None,
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Defined(v) => write!(f, "{:.2}", v),
            ProfitFactor::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: ProfitFactor,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_r_multiple: f64,
    pub avg_holding_minutes: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        periods_per_year: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            let annualized = (1.0 + total_return).powf(1.0 / years) - 1.0;
            if annualized.is_finite() { annualized } else { 0.0 }
        } else if total_return <= -1.0 {
            -1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let period_rf = risk_free_rate / periods_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, period_rf, periods_per_year);

        let calmar_ratio = if max_drawdown > 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_r = 0.0_f64;
        let mut total_minutes = 0i64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_r += trade.r_multiple;
            total_minutes += trade.holding_minutes();
        }

        let total_trades = trades.len();
        let per_trade = |total: f64| {
            if total_trades > 0 {
                total / total_trades as f64
            } else {
                0.0
            }
        };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: per_trade(trades_won as f64),
            profit_factor: ProfitFactor::from_totals(gross_profit, gross_loss),
            gross_profit,
            gross_loss,
            avg_win: if trades_won > 0 {
                gross_profit / trades_won as f64
            } else {
                0.0
            },
            avg_loss: if trades_lost > 0 {
                gross_loss / trades_lost as f64
            } else {
                0.0
            },
            largest_win,
            largest_loss,
            avg_r_multiple: per_trade(total_r),
            avg_holding_minutes: per_trade(total_minutes as f64),
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    period_rf: f64,
    periods_per_year: f64,
) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let annualizer = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * annualizer
    } else {
        0.0
    };

    // Downside deviation over all periods, not just the losing ones.
    let downside_variance = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside = downside_variance.sqrt();

    let sortino = if downside > 0.0 {
        excess_return / downside * annualizer
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use crate::domain::signal::Side;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: t(5 * i as i64),
                equity,
            })
            .collect()
    }

    fn trade(pnl: f64, r_multiple: f64, minutes: i64) -> TradeRecord {
        TradeRecord {
            position_id: 1,
            symbol: "BTCUSDT".into(),
            side: Side::Long,
            entry_time: t(0),
            exit_time: t(minutes),
            entry_price: 100.0,
            exit_price: 100.0,
            size: 1.0,
            pnl,
            fees: 0.0,
            r_multiple,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn empty_run_is_all_zero() {
        let m = Metrics::compute(&[], &[], 10_000.0, 105_120.0, 0.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, ProfitFactor::Undefined);
    }

    #[test]
    fn profit_factor_and_trade_stats() {
        let trades = vec![trade(300.0, 2.0, 30), trade(-100.0, -1.0, 10), trade(100.0, 0.5, 20)];
        let m = Metrics::compute(&trades, &curve(&[10_000.0, 10_300.0]), 10_000.0, 105_120.0, 0.0);
        assert_eq!(m.total_trades, 3);
        assert_eq!(m.trades_won, 2);
        assert_relative_eq!(m.win_rate, 2.0 / 3.0);
        assert_eq!(m.profit_factor, ProfitFactor::Defined(4.0));
        assert_relative_eq!(m.gross_profit, 400.0);
        assert_relative_eq!(m.gross_loss, 100.0);
        assert_relative_eq!(m.avg_win, 200.0);
        assert_relative_eq!(m.avg_loss, 100.0);
        assert_relative_eq!(m.largest_win, 300.0);
        assert_relative_eq!(m.largest_loss, 100.0);
        assert_relative_eq!(m.avg_r_multiple, 0.5);
        assert_relative_eq!(m.avg_holding_minutes, 20.0);
    }

    #[test]
    fn profit_factor_undefined_without_losses() {
        let m = Metrics::compute(&[trade(50.0, 1.0, 5)], &[], 10_000.0, 105_120.0, 0.0);
        assert_eq!(m.profit_factor, ProfitFactor::Undefined);
        assert_eq!(m.profit_factor.to_string(), "undefined");
        assert_eq!(m.profit_factor.value(), None);
    }

    #[test]
    fn drawdown_depth_and_duration() {
        let m = Metrics::compute(
            &[],
            &curve(&[100.0, 120.0, 90.0, 100.0, 130.0, 117.0]),
            100.0,
            105_120.0,
            0.0,
        );
        assert_relative_eq!(m.max_drawdown, 0.25);
        assert_eq!(m.max_drawdown_duration, 2);
        assert_relative_eq!(m.total_return, 0.17, epsilon = 1e-12);
    }

    #[test]
    fn sharpe_is_annualized_by_sqrt_periods() {
        let values = [100.0, 101.0, 100.5, 102.0, 101.0];
        let m = Metrics::compute(&[], &curve(&values), 100.0, 252.0, 0.0);
        let m2 = Metrics::compute(&[], &curve(&values), 100.0, 1008.0, 0.0);
        assert!(m.sharpe_ratio > 0.0);
        assert_relative_eq!(m2.sharpe_ratio, m.sharpe_ratio * 2.0, epsilon = 1e-9);
        assert!(m.sortino_ratio > 0.0);
    }

    #[test]
    fn flat_curve_has_zero_ratios() {
        let m = Metrics::compute(&[], &curve(&[100.0; 10]), 100.0, 252.0, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.calmar_ratio, 0.0);
    }

    #[test]
    fn calmar_divides_annualized_return_by_drawdown() {
        let m = Metrics::compute(&[], &curve(&[100.0, 80.0, 110.0]), 100.0, 3.0, 0.0);
        // one year of bars: annualized equals total return
        assert_relative_eq!(m.annualized_return, 0.10, epsilon = 1e-12);
        assert_relative_eq!(m.calmar_ratio, 0.10 / 0.20, epsilon = 1e-12);
    }
}
