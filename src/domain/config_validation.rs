//! Configuration validation.
//!
//! Runs once on the typed [`TradingConfig`] before any backtest or scan, so
//! an invalid parameter never reaches the engine.

use crate::domain::config::{
    ConfirmationConfig, IndicatorConfig, LifecycleConfig, RiskConfig, TradingConfig,
};
use crate::domain::backtest::BacktestConfig;
use crate::domain::error::ScalptraderError;

/// Tolerance for take-profit fractions summing to one.
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-9;

/// Criteria per rule set; the confirmation threshold cannot exceed it.
pub const CRITERIA_PER_VARIANT: usize = 6;

pub fn validate_trading_config(config: &TradingConfig) -> Result<(), ScalptraderError> {
    validate_indicators(&config.indicators)?;
    validate_signals(&config.signals)?;
    validate_risk(&config.risk)?;
    validate_lifecycle(&config.lifecycle)?;
    validate_backtest(&config.backtest)?;
    Ok(())
}

pub fn validate_indicators(config: &IndicatorConfig) -> Result<(), ScalptraderError> {
    let periods = [
        ("ema_fast", config.ema_fast),
        ("ema_slow", config.ema_slow),
        ("ema_trend", config.ema_trend),
        ("ema_htf", config.ema_htf),
        ("rsi_period", config.rsi_period),
        ("atr_period", config.atr_period),
        ("volume_period", config.volume_period),
        ("stoch_period", config.stoch_period),
        ("stoch_k_smooth", config.stoch_k_smooth),
        ("stoch_d_smooth", config.stoch_d_smooth),
        ("volatility_period", config.volatility_period),
    ];
    for (key, value) in periods {
        if value == 0 {
            return Err(ScalptraderError::invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    if config.ema_fast >= config.ema_slow {
        return Err(ScalptraderError::invalid(
            "indicators",
            "ema_fast",
            "ema_fast must be shorter than ema_slow",
        ));
    }
    Ok(())
}

pub fn validate_signals(config: &ConfirmationConfig) -> Result<(), ScalptraderError> {
    let s = "signals";
    if config.required_confirmations == 0 || config.required_confirmations > CRITERIA_PER_VARIANT {
        return Err(ScalptraderError::invalid(
            s,
            "required_confirmations",
            format!("required_confirmations must be between 1 and {}", CRITERIA_PER_VARIANT),
        ));
    }
    validate_band(s, "rsi_lower", config.rsi_lower, config.rsi_upper)?;
    validate_band(s, "stoch_oversold", config.stoch_oversold, config.stoch_overbought)?;
    validate_band(s, "rsi_extreme_low", config.rsi_extreme_low, config.rsi_extreme_high)?;
    if config.trend_distance_pct < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "trend_distance_pct",
            "trend_distance_pct must be non-negative",
        ));
    }
    if config.volume_multiplier < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "volume_multiplier",
            "volume_multiplier must be non-negative",
        ));
    }
    if config.reversion_volume_multiplier < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "reversion_volume_multiplier",
            "reversion_volume_multiplier must be non-negative",
        ));
    }
    if config.stoch_midline <= config.stoch_oversold
        || config.stoch_midline >= config.stoch_overbought
    {
        return Err(ScalptraderError::invalid(
            s,
            "stoch_midline",
            "stoch_midline must lie strictly between stoch_oversold and stoch_overbought",
        ));
    }
    if config.atr_multiplier_min <= 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "atr_multiplier_min",
            "atr_multiplier_min must be positive",
        ));
    }
    if config.atr_multiplier_min > config.atr_multiplier_max {
        return Err(ScalptraderError::invalid(
            s,
            "atr_multiplier_max",
            "atr_multiplier_max must not be below atr_multiplier_min",
        ));
    }
    if config.volatility_low_ratio <= 0.0
        || config.volatility_low_ratio >= config.volatility_high_ratio
    {
        return Err(ScalptraderError::invalid(
            s,
            "volatility_low_ratio",
            "volatility ratios must satisfy 0 < low < high",
        ));
    }
    Ok(())
}

fn validate_band(section: &str, key: &str, lower: f64, upper: f64) -> Result<(), ScalptraderError> {
    if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
        return Err(ScalptraderError::invalid(
            section,
            key,
            format!("band {}..{} must lie within 0..100 with lower < upper", lower, upper),
        ));
    }
    Ok(())
}

fn validate_percent(
    section: &str,
    key: &str,
    value: f64,
) -> Result<(), ScalptraderError> {
    if value <= 0.0 || value > 100.0 {
        return Err(ScalptraderError::invalid(
            section,
            key,
            format!("{} must be in (0, 100]", key),
        ));
    }
    Ok(())
}

pub fn validate_risk(config: &RiskConfig) -> Result<(), ScalptraderError> {
    let s = "risk";
    validate_percent(s, "risk_per_trade_pct", config.risk_per_trade_pct)?;
    validate_percent(s, "max_daily_drawdown_pct", config.max_daily_drawdown_pct)?;
    validate_percent(s, "max_total_drawdown_pct", config.max_total_drawdown_pct)?;
    validate_percent(s, "max_stop_distance_pct", config.max_stop_distance_pct)?;
    if config.max_concurrent_positions == 0 {
        return Err(ScalptraderError::invalid(
            s,
            "max_concurrent_positions",
            "max_concurrent_positions must be at least 1",
        ));
    }
    if config.cooldown_after_losses == 0 {
        return Err(ScalptraderError::invalid(
            s,
            "cooldown_after_losses",
            "cooldown_after_losses must be at least 1",
        ));
    }
    if config.max_trades_per_day == 0 {
        return Err(ScalptraderError::invalid(
            s,
            "max_trades_per_day",
            "max_trades_per_day must be at least 1",
        ));
    }
    if config.min_reward_risk < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "min_reward_risk",
            "min_reward_risk must be non-negative",
        ));
    }
    if config.leverage <= 0.0 {
        return Err(ScalptraderError::invalid(s, "leverage", "leverage must be positive"));
    }
    if config.max_leverage < 1.0 {
        return Err(ScalptraderError::invalid(
            s,
            "max_leverage",
            "max_leverage must be at least 1",
        ));
    }
    if config.max_margin_fraction <= 0.0 || config.max_margin_fraction > 1.0 {
        return Err(ScalptraderError::invalid(
            s,
            "max_margin_fraction",
            "max_margin_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}

/// Check a tier ladder: same length, ascending positive R-multiples,
/// positive fractions summing to one.
pub fn validate_take_profit_tiers(
    r_multiples: &[f64],
    fractions: &[f64],
) -> Result<(), ScalptraderError> {
    let s = "lifecycle";
    if r_multiples.is_empty() {
        return Err(ScalptraderError::invalid(
            s,
            "take_profit_r",
            "at least one take-profit tier is required",
        ));
    }
    if r_multiples.len() != fractions.len() {
        return Err(ScalptraderError::invalid(
            s,
            "take_profit_fractions",
            format!(
                "{} fractions given for {} tiers",
                fractions.len(),
                r_multiples.len()
            ),
        ));
    }
    if r_multiples.iter().any(|r| *r <= 0.0) || r_multiples.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ScalptraderError::invalid(
            s,
            "take_profit_r",
            "R-multiples must be positive and strictly ascending",
        ));
    }
    if fractions.iter().any(|f| *f <= 0.0) {
        return Err(ScalptraderError::invalid(
            s,
            "take_profit_fractions",
            "fractions must be positive",
        ));
    }
    let sum: f64 = fractions.iter().sum();
    if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
        return Err(ScalptraderError::invalid(
            s,
            "take_profit_fractions",
            format!("fractions must sum to 1.0, got {}", sum),
        ));
    }
    Ok(())
}

pub fn validate_lifecycle(config: &LifecycleConfig) -> Result<(), ScalptraderError> {
    let s = "lifecycle";
    validate_take_profit_tiers(&config.take_profit_r, &config.take_profit_fractions)?;
    if config.breakeven_r <= 0.0 {
        return Err(ScalptraderError::invalid(s, "breakeven_r", "breakeven_r must be positive"));
    }
    if config.breakeven_buffer_pct < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "breakeven_buffer_pct",
            "breakeven_buffer_pct must be non-negative",
        ));
    }
    if config.trailing_activation_r <= 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "trailing_activation_r",
            "trailing_activation_r must be positive",
        ));
    }
    if config.trailing_callback_pct <= 0.0 || config.trailing_callback_pct >= 100.0 {
        return Err(ScalptraderError::invalid(
            s,
            "trailing_callback_pct",
            "trailing_callback_pct must be in (0, 100)",
        ));
    }
    Ok(())
}

pub fn validate_backtest(config: &BacktestConfig) -> Result<(), ScalptraderError> {
    let s = "backtest";
    if config.initial_capital <= 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if config.slippage_pct < 0.0 {
        return Err(ScalptraderError::invalid(
            s,
            "slippage_pct",
            "slippage_pct must be non-negative",
        ));
    }
    if config.fee_pct < 0.0 {
        return Err(ScalptraderError::invalid(s, "fee_pct", "fee_pct must be non-negative"));
    }
    if config.bar_interval_minutes <= 0 {
        return Err(ScalptraderError::invalid(
            s,
            "bar_interval_minutes",
            "bar_interval_minutes must be at least 1",
        ));
    }
    if !(0.0..1.0).contains(&config.risk_free_rate) {
        return Err(ScalptraderError::invalid(
            s,
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}
