//! Technical indicator implementations.
//!
//! Each calculator produces an [`IndicatorSeries`] aligned one-to-one with
//! its input bars. Points inside the warm-up window carry `valid == false`.
//! [`IndicatorSet`] is the per-bar bundle the confirmation engine reads.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use super::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn invalid(timestamp: NaiveDateTime, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value,
        }
    }

    /// The scalar value, if this point is warmed and single-valued.
    pub fn simple(&self) -> Option<f64> {
        match (self.valid, &self.value) {
            (true, IndicatorValue::Simple(v)) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    StochRsi { raw: f64, k: f64, d: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Sma(usize),
    VolumeSma(usize),
    StochRsi {
        rsi_period: usize,
        stoch_period: usize,
        k_smooth: usize,
        d_smooth: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn simple_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(IndicatorPoint::simple)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::StochRsi {
                rsi_period,
                stoch_period,
                k_smooth,
                d_smooth,
            } => write!(
                f,
                "STOCH_RSI({},{},{},{})",
                rsi_period, stoch_period, k_smooth, d_smooth
            ),
        }
    }
}

/// All indicator values for one bar.
///
/// Values are meaningless while `warmed` is false; consumers must check it
/// before reading anything else.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndicatorSet {
    pub warmed: bool,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub ema_trend: f64,
    pub ema_htf: f64,
    pub rsi: f64,
    pub atr: f64,
    pub atr_baseline: f64,
    pub volume_avg: f64,
    pub stoch_rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
}

impl IndicatorSet {
    pub fn unwarmed() -> Self {
        IndicatorSet::default()
    }

    /// Current volume relative to its rolling average (0 when no average).
    pub fn volume_ratio(&self, volume: f64) -> f64 {
        if self.volume_avg > 0.0 {
            volume / self.volume_avg
        } else {
            0.0
        }
    }
}

/// A bar together with the indicators computed up to and including it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub indicators: IndicatorSet,
}

impl EnrichedBar {
    pub fn is_warmed(&self) -> bool {
        self.indicators.warmed
    }
}

/// Volatility regime from the ratio of current ATR to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    pub fn classify(atr: f64, baseline: f64, low_ratio: f64, high_ratio: f64) -> Self {
        if baseline <= 0.0 {
            return VolatilityRegime::Normal;
        }
        let ratio = atr / baseline;
        if ratio < low_ratio {
            VolatilityRegime::Low
        } else if ratio > high_ratio {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Normal
        }
    }

    /// Pick the ATR stop multiplier for this regime from `[min, max]`.
    pub fn atr_multiplier(self, min: f64, max: f64) -> f64 {
        match self {
            VolatilityRegime::Low => min,
            VolatilityRegime::Normal => (min + max) / 2.0,
            VolatilityRegime::High => max,
        }
    }
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityRegime::Low => write!(f, "low"),
            VolatilityRegime::Normal => write!(f, "normal"),
            VolatilityRegime::High => write!(f, "high"),
        }
    }
}
