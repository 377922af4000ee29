//! Typed trading configuration.
//!
//! Every tunable of the engine lives here, grouped the way the INI file is:
//! `[indicators]`, `[signals]`, `[risk]`, `[lifecycle]` and `[backtest]`.
//! Percentages are expressed in percent (1.5 means 1.5 %).

use std::fmt;

use crate::domain::backtest::{BacktestConfig, EntryFill};
use crate::domain::confirmation::StrategyVariant;
use crate::domain::config_validation::validate_trading_config;
use crate::domain::error::ScalptraderError;
use crate::domain::indicator::stoch_rsi;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub ema_trend: usize,
    pub ema_htf: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub volume_period: usize,
    pub stoch_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_smooth: usize,
    pub volatility_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            ema_fast: 8,
            ema_slow: 21,
            ema_trend: 50,
            ema_htf: 200,
            rsi_period: 14,
            atr_period: 14,
            volume_period: 20,
            stoch_period: 14,
            stoch_k_smooth: 3,
            stoch_d_smooth: 3,
            volatility_period: 50,
        }
    }
}

impl IndicatorConfig {
    /// Number of bars needed before the first bar is fully warmed.
    pub fn warmup_bars(&self) -> usize {
        let ema = self
            .ema_fast
            .max(self.ema_slow)
            .max(self.ema_trend)
            .max(self.ema_htf)
            .saturating_sub(1);
        let rsi = self.rsi_period;
        let atr_baseline = (self.atr_period + self.volatility_period).saturating_sub(2);
        let volume = self.volume_period.saturating_sub(1);
        let stoch = stoch_rsi::first_valid_index(
            self.rsi_period,
            self.stoch_period,
            self.stoch_k_smooth,
            self.stoch_d_smooth,
        );
        ema.max(rsi).max(atr_baseline).max(volume).max(stoch) + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationConfig {
    pub variant: StrategyVariant,
    pub required_confirmations: usize,
    pub trend_distance_pct: f64,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub volume_multiplier: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    /// K level splitting long and short candidates when neither extreme was visited.
    pub stoch_midline: f64,
    /// Volume / average needed by the mean-reversion volume criterion.
    pub reversion_volume_multiplier: f64,
    pub rsi_extreme_low: f64,
    pub rsi_extreme_high: f64,
    pub atr_multiplier_min: f64,
    pub atr_multiplier_max: f64,
    pub volatility_low_ratio: f64,
    pub volatility_high_ratio: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        ConfirmationConfig {
            variant: StrategyVariant::TrendCrossover,
            required_confirmations: 4,
            trend_distance_pct: 0.3,
            rsi_lower: 25.0,
            rsi_upper: 75.0,
            volume_multiplier: 1.2,
            stoch_oversold: 24.0,
            stoch_overbought: 80.0,
            stoch_midline: 50.0,
            reversion_volume_multiplier: 1.0,
            rsi_extreme_low: 15.0,
            rsi_extreme_high: 85.0,
            atr_multiplier_min: 1.5,
            atr_multiplier_max: 2.5,
            volatility_low_ratio: 0.6,
            volatility_high_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_per_trade_pct: f64,
    pub max_daily_drawdown_pct: f64,
    pub max_total_drawdown_pct: f64,
    pub max_concurrent_positions: usize,
    pub cooldown_after_losses: u32,
    pub cooldown_minutes: i64,
    pub max_stop_distance_pct: f64,
    pub min_reward_risk: f64,
    pub leverage: f64,
    pub max_leverage: f64,
    pub max_trades_per_day: u32,
    pub allow_pyramiding: bool,
    pub max_margin_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            risk_per_trade_pct: 1.5,
            max_daily_drawdown_pct: 5.0,
            max_total_drawdown_pct: 15.0,
            max_concurrent_positions: 3,
            cooldown_after_losses: 3,
            cooldown_minutes: 240,
            max_stop_distance_pct: 3.5,
            min_reward_risk: 1.5,
            leverage: 5.0,
            max_leverage: 10.0,
            max_trades_per_day: 10,
            allow_pyramiding: false,
            max_margin_fraction: 1.0,
        }
    }
}

/// Which exit wins when one bar's range touches both the stop and a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    StopFirst,
    TargetFirst,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::StopFirst => write!(f, "stop_first"),
            ConflictPolicy::TargetFirst => write!(f, "target_first"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub take_profit_r: Vec<f64>,
    pub take_profit_fractions: Vec<f64>,
    pub breakeven_r: f64,
    pub breakeven_buffer_pct: f64,
    pub trailing_activation_r: f64,
    pub trailing_callback_pct: f64,
    pub max_hold_minutes: Option<i64>,
    pub conflict_policy: ConflictPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            take_profit_r: vec![1.5, 2.5, 4.0],
            take_profit_fractions: vec![0.5, 0.3, 0.2],
            breakeven_r: 0.7,
            breakeven_buffer_pct: 0.0,
            trailing_activation_r: 1.0,
            trailing_callback_pct: 0.4,
            max_hold_minutes: None,
            conflict_policy: ConflictPolicy::StopFirst,
        }
    }
}

impl LifecycleConfig {
    /// Reward multiple of the nearest target, used for the reward:risk gate.
    pub fn first_target_r(&self) -> f64 {
        self.take_profit_r.first().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradingConfig {
    pub indicators: IndicatorConfig,
    pub signals: ConfirmationConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
    pub backtest: BacktestConfig,
}

/// Build and validate a [`TradingConfig`]; absent keys take their defaults.
pub fn load_trading_config(config: &dyn ConfigPort) -> Result<TradingConfig, ScalptraderError> {
    let trading = TradingConfig {
        indicators: load_indicators(config)?,
        signals: load_signals(config)?,
        risk: load_risk(config)?,
        lifecycle: load_lifecycle(config)?,
        backtest: load_backtest(config)?,
    };
    validate_trading_config(&trading)?;
    Ok(trading)
}

fn load_indicators(config: &dyn ConfigPort) -> Result<IndicatorConfig, ScalptraderError> {
    let d = IndicatorConfig::default();
    let s = "indicators";
    Ok(IndicatorConfig {
        ema_fast: read_usize(config, s, "ema_fast", d.ema_fast)?,
        ema_slow: read_usize(config, s, "ema_slow", d.ema_slow)?,
        ema_trend: read_usize(config, s, "ema_trend", d.ema_trend)?,
        ema_htf: read_usize(config, s, "ema_htf", d.ema_htf)?,
        rsi_period: read_usize(config, s, "rsi_period", d.rsi_period)?,
        atr_period: read_usize(config, s, "atr_period", d.atr_period)?,
        volume_period: read_usize(config, s, "volume_period", d.volume_period)?,
        stoch_period: read_usize(config, s, "stoch_period", d.stoch_period)?,
        stoch_k_smooth: read_usize(config, s, "stoch_k_smooth", d.stoch_k_smooth)?,
        stoch_d_smooth: read_usize(config, s, "stoch_d_smooth", d.stoch_d_smooth)?,
        volatility_period: read_usize(config, s, "volatility_period", d.volatility_period)?,
    })
}

fn load_signals(config: &dyn ConfigPort) -> Result<ConfirmationConfig, ScalptraderError> {
    let d = ConfirmationConfig::default();
    let s = "signals";
    let variant = match config.get_string(s, "variant") {
        None => d.variant,
        Some(raw) => raw
            .trim()
            .parse::<StrategyVariant>()
            .map_err(|reason| ScalptraderError::invalid(s, "variant", reason))?,
    };
    Ok(ConfirmationConfig {
        variant,
        required_confirmations: read_usize(
            config,
            s,
            "required_confirmations",
            d.required_confirmations,
        )?,
        trend_distance_pct: read_f64(config, s, "trend_distance_pct", d.trend_distance_pct)?,
        rsi_lower: read_f64(config, s, "rsi_lower", d.rsi_lower)?,
        rsi_upper: read_f64(config, s, "rsi_upper", d.rsi_upper)?,
        volume_multiplier: read_f64(config, s, "volume_multiplier", d.volume_multiplier)?,
        stoch_oversold: read_f64(config, s, "stoch_oversold", d.stoch_oversold)?,
        stoch_overbought: read_f64(config, s, "stoch_overbought", d.stoch_overbought)?,
        stoch_midline: read_f64(config, s, "stoch_midline", d.stoch_midline)?,
        reversion_volume_multiplier: read_f64(
            config,
            s,
            "reversion_volume_multiplier",
            d.reversion_volume_multiplier,
        )?,
        rsi_extreme_low: read_f64(config, s, "rsi_extreme_low", d.rsi_extreme_low)?,
        rsi_extreme_high: read_f64(config, s, "rsi_extreme_high", d.rsi_extreme_high)?,
        atr_multiplier_min: read_f64(config, s, "atr_multiplier_min", d.atr_multiplier_min)?,
        atr_multiplier_max: read_f64(config, s, "atr_multiplier_max", d.atr_multiplier_max)?,
        volatility_low_ratio: read_f64(
            config,
            s,
            "volatility_low_ratio",
            d.volatility_low_ratio,
        )?,
        volatility_high_ratio: read_f64(
            config,
            s,
            "volatility_high_ratio",
            d.volatility_high_ratio,
        )?,
    })
}

fn load_risk(config: &dyn ConfigPort) -> Result<RiskConfig, ScalptraderError> {
    let d = RiskConfig::default();
    let s = "risk";
    Ok(RiskConfig {
        risk_per_trade_pct: read_f64(config, s, "risk_per_trade_pct", d.risk_per_trade_pct)?,
        max_daily_drawdown_pct: read_f64(
            config,
            s,
            "max_daily_drawdown_pct",
            d.max_daily_drawdown_pct,
        )?,
        max_total_drawdown_pct: read_f64(
            config,
            s,
            "max_total_drawdown_pct",
            d.max_total_drawdown_pct,
        )?,
        max_concurrent_positions: read_usize(
            config,
            s,
            "max_concurrent_positions",
            d.max_concurrent_positions,
        )?,
        cooldown_after_losses: read_usize(
            config,
            s,
            "cooldown_after_losses",
            d.cooldown_after_losses as usize,
        )? as u32,
        cooldown_minutes: read_usize(config, s, "cooldown_minutes", d.cooldown_minutes as usize)?
            as i64,
        max_stop_distance_pct: read_f64(
            config,
            s,
            "max_stop_distance_pct",
            d.max_stop_distance_pct,
        )?,
        min_reward_risk: read_f64(config, s, "min_reward_risk", d.min_reward_risk)?,
        leverage: read_f64(config, s, "leverage", d.leverage)?,
        max_leverage: read_f64(config, s, "max_leverage", d.max_leverage)?,
        max_trades_per_day: read_usize(
            config,
            s,
            "max_trades_per_day",
            d.max_trades_per_day as usize,
        )? as u32,
        allow_pyramiding: config.get_bool(s, "allow_pyramiding", d.allow_pyramiding),
        max_margin_fraction: read_f64(config, s, "max_margin_fraction", d.max_margin_fraction)?,
    })
}

fn load_lifecycle(config: &dyn ConfigPort) -> Result<LifecycleConfig, ScalptraderError> {
    let d = LifecycleConfig::default();
    let s = "lifecycle";
    let conflict_policy = match config.get_string(s, "conflict_policy") {
        None => d.conflict_policy,
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "stop_first" => ConflictPolicy::StopFirst,
            "target_first" => ConflictPolicy::TargetFirst,
            other => {
                return Err(ScalptraderError::invalid(
                    s,
                    "conflict_policy",
                    format!("expected stop_first or target_first, got '{}'", other),
                ));
            }
        },
    };
    let max_hold = read_usize(config, s, "max_hold_minutes", 0)?;
    Ok(LifecycleConfig {
        take_profit_r: read_list(config, s, "take_profit_r", &d.take_profit_r)?,
        take_profit_fractions: read_list(
            config,
            s,
            "take_profit_fractions",
            &d.take_profit_fractions,
        )?,
        breakeven_r: read_f64(config, s, "breakeven_r", d.breakeven_r)?,
        breakeven_buffer_pct: read_f64(config, s, "breakeven_buffer_pct", d.breakeven_buffer_pct)?,
        trailing_activation_r: read_f64(
            config,
            s,
            "trailing_activation_r",
            d.trailing_activation_r,
        )?,
        trailing_callback_pct: read_f64(
            config,
            s,
            "trailing_callback_pct",
            d.trailing_callback_pct,
        )?,
        max_hold_minutes: (max_hold > 0).then_some(max_hold as i64),
        conflict_policy,
    })
}

fn load_backtest(config: &dyn ConfigPort) -> Result<BacktestConfig, ScalptraderError> {
    let d = BacktestConfig::default();
    let s = "backtest";
    let entry_fill = match config.get_string(s, "entry_fill") {
        None => d.entry_fill,
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "next_open" => EntryFill::NextBarOpen,
            "signal_close" => EntryFill::SignalClose,
            other => {
                return Err(ScalptraderError::invalid(
                    s,
                    "entry_fill",
                    format!("expected next_open or signal_close, got '{}'", other),
                ));
            }
        },
    };
    Ok(BacktestConfig {
        initial_capital: read_f64(config, s, "initial_capital", d.initial_capital)?,
        slippage_pct: read_f64(config, s, "slippage_pct", d.slippage_pct)?,
        fee_pct: read_f64(config, s, "fee_pct", d.fee_pct)?,
        entry_fill,
        bar_interval_minutes: read_usize(
            config,
            s,
            "bar_interval_minutes",
            d.bar_interval_minutes as usize,
        )? as i64,
        tolerate_gaps: config.get_bool(s, "tolerate_gaps", d.tolerate_gaps),
        risk_free_rate: read_f64(config, s, "risk_free_rate", d.risk_free_rate)?,
    })
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ScalptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ScalptraderError::invalid(section, key, format!("'{}' is not a number", raw))
            }),
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, ScalptraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            ScalptraderError::invalid(
                section,
                key,
                format!("'{}' is not a non-negative integer", raw),
            )
        }),
    }
}

fn read_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &[f64],
) -> Result<Vec<f64>, ScalptraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default.to_vec());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            item.parse::<f64>().map_err(|_| {
                ScalptraderError::invalid(section, key, format!("'{}' is not a number", item))
            })
        })
        .collect()
}
