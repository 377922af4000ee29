//! Fill pricing: slippage against the trader and a percentage fee on
//! every fill.

use crate::domain::signal::Side;

/// Trading costs applied to each simulated fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub slippage_pct: f64,
    pub fee_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_pct: 0.05,
            fee_pct: 0.04,
        }
    }
}

impl ExecutionConfig {
    /// No slippage and no fees.
    pub fn frictionless() -> Self {
        ExecutionConfig {
            slippage_pct: 0.0,
            fee_pct: 0.0,
        }
    }
}

/// Fee on a fill: notional * fee_pct / 100.
pub fn calculate_fee(notional: f64, config: &ExecutionConfig) -> f64 {
    notional.abs() * config.fee_pct / 100.0
}

/// Long entry (buy): market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Short entry (sell): market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_short_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Long exit (sell): market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Short exit (buy to cover): market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_short_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

pub fn entry_fill_price(side: Side, market_price: f64, config: &ExecutionConfig) -> f64 {
    match side {
        Side::Long => apply_slippage_long_entry(market_price, config.slippage_pct),
        Side::Short => apply_slippage_short_entry(market_price, config.slippage_pct),
    }
}

pub fn exit_fill_price(side: Side, market_price: f64, config: &ExecutionConfig) -> f64 {
    match side {
        Side::Long => apply_slippage_long_exit(market_price, config.slippage_pct),
        Side::Short => apply_slippage_short_exit(market_price, config.slippage_pct),
    }
}
