//! Multi-criterion signal confirmation.
//!
//! A rule set evaluates all six of its criteria for one candidate direction,
//! recording the observed value of each. The signal fires only when the
//! primary criterion passes and at least `required_confirmations` pass.

pub mod mean_reversion;
pub mod trend_crossover;

use std::fmt;
use std::str::FromStr;

use crate::domain::config::{ConfirmationConfig, TradingConfig};
use crate::domain::error::ScalptraderError;
use crate::domain::indicator::{EnrichedBar, VolatilityRegime};
use crate::domain::indicator_helpers::compute_indicator_sets;
use crate::domain::ohlcv::{check_timeline, Bar};
use crate::domain::signal::{Checklist, Criterion, Side, Signal};

use self::mean_reversion::MeanReversion;
use self::trend_crossover::TrendCrossover;

/// Shared contract of the confirmation rule sets.
pub trait RuleSet {
    /// The criterion that must pass for any signal to fire.
    fn primary(&self) -> Criterion;

    /// Direction the checklist is evaluated for on this bar.
    fn candidate(
        &self,
        current: &EnrichedBar,
        previous: &EnrichedBar,
        config: &ConfirmationConfig,
    ) -> Side;

    /// Evaluate every criterion for `side`. Always returns all of them.
    fn checklist(
        &self,
        side: Side,
        current: &EnrichedBar,
        previous: &EnrichedBar,
        config: &ConfirmationConfig,
    ) -> Checklist;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyVariant {
    TrendCrossover,
    MeanReversion,
}

impl StrategyVariant {
    pub fn rule_set(self) -> &'static dyn RuleSet {
        match self {
            StrategyVariant::TrendCrossover => &TrendCrossover,
            StrategyVariant::MeanReversion => &MeanReversion,
        }
    }
}

impl FromStr for StrategyVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trend_crossover" => Ok(StrategyVariant::TrendCrossover),
            "mean_reversion" => Ok(StrategyVariant::MeanReversion),
            other => Err(format!(
                "expected trend_crossover or mean_reversion, got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::TrendCrossover => write!(f, "trend_crossover"),
            StrategyVariant::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

/// Evaluate the configured rule set on `current`, using `previous` for
/// crossover and bounce detection. Unwarmed input yields an empty non-signal.
pub fn evaluate(
    current: &EnrichedBar,
    previous: &EnrichedBar,
    config: &ConfirmationConfig,
) -> Signal {
    if !current.is_warmed() || !previous.is_warmed() {
        return Signal::none(current.bar.timestamp);
    }

    let rules = config.variant.rule_set();
    let candidate = rules.candidate(current, previous, config);
    let checklist = rules.checklist(candidate, current, previous, config);
    let confirmations = checklist.values().filter(|c| c.passed).count();
    let primary_passed = checklist
        .get(&rules.primary())
        .is_some_and(|check| check.passed);
    let fires = primary_passed && confirmations >= config.required_confirmations;

    let ind = &current.indicators;
    let regime = VolatilityRegime::classify(
        ind.atr,
        ind.atr_baseline,
        config.volatility_low_ratio,
        config.volatility_high_ratio,
    );
    let multiplier = regime.atr_multiplier(config.atr_multiplier_min, config.atr_multiplier_max);

    let signal = Signal {
        timestamp: current.bar.timestamp,
        side: fires.then_some(candidate),
        candidate: Some(candidate),
        confirmations,
        required: config.required_confirmations,
        checklist,
        entry_price: current.bar.close,
        stop_distance: ind.atr * multiplier,
        atr: ind.atr,
        regime,
    };

    if signal.fired() {
        log::debug!(
            "{} signal at {}: {}/{} confirmations, regime {}",
            candidate,
            signal.timestamp,
            confirmations,
            config.required_confirmations,
            regime
        );
    }
    signal
}

/// Evaluate the most recent bar of a raw history.
///
/// The history goes through the same timeline checks as a replay, so gaps
/// and out-of-order bars surface as data errors.
pub fn evaluate_latest(
    symbol: &str,
    bars: &[Bar],
    config: &TradingConfig,
) -> Result<Signal, ScalptraderError> {
    let minimum = config.indicators.warmup_bars() + 1;
    if bars.len() < minimum {
        return Err(ScalptraderError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum,
        });
    }
    let bt = &config.backtest;
    check_timeline(symbol, bars, bt.interval(), bt.tolerate_gaps)?;
    let tail_start = bars.len() - 2;
    let enriched = compute_indicator_sets(bars, &config.indicators);
    Ok(evaluate(
        &enriched[tail_start + 1],
        &enriched[tail_start],
        &config.signals,
    ))
}
