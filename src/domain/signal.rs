//! Trade signals and their confirmation checklist.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::indicator::VolatilityRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short; multiplies price moves into PnL.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn label(side: Option<Side>) -> &'static str {
        match side {
            Some(Side::Long) => "LONG",
            Some(Side::Short) => "SHORT",
            None => "NONE",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Side::label(Some(*self)))
    }
}

/// Every criterion either rule set can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Criterion {
    EmaCrossover,
    TrendSide,
    TrendDistance,
    RsiBand,
    VolumeSurge,
    HigherTimeframe,
    StochExtreme,
    StochBounce,
    StochKdCross,
    TrendFilter,
    VolumeAboveAverage,
    RsiNotExtreme,
}

impl Criterion {
    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::EmaCrossover => "ema_crossover",
            Criterion::TrendSide => "trend_side",
            Criterion::TrendDistance => "trend_distance",
            Criterion::RsiBand => "rsi_band",
            Criterion::VolumeSurge => "volume_surge",
            Criterion::HigherTimeframe => "higher_timeframe",
            Criterion::StochExtreme => "stoch_extreme",
            Criterion::StochBounce => "stoch_bounce",
            Criterion::StochKdCross => "stoch_kd_cross",
            Criterion::TrendFilter => "trend_filter",
            Criterion::VolumeAboveAverage => "volume_above_average",
            Criterion::RsiNotExtreme => "rsi_not_extreme",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriterionCheck {
    pub passed: bool,
    pub observed: f64,
}

impl CriterionCheck {
    pub fn new(passed: bool, observed: f64) -> Self {
        CriterionCheck { passed, observed }
    }
}

pub type Checklist = BTreeMap<Criterion, CriterionCheck>;

/// Outcome of one confirmation pass over a bar.
///
/// `side` is set only when the signal fires. `candidate` is the direction
/// the checklist was evaluated for and is `None` on unwarmed bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub side: Option<Side>,
    pub candidate: Option<Side>,
    pub confirmations: usize,
    pub required: usize,
    pub checklist: Checklist,
    pub entry_price: f64,
    pub stop_distance: f64,
    pub atr: f64,
    pub regime: VolatilityRegime,
}

impl Signal {
    /// A non-signal with an empty checklist.
    pub fn none(timestamp: NaiveDateTime) -> Self {
        Signal {
            timestamp,
            side: None,
            candidate: None,
            confirmations: 0,
            required: 0,
            checklist: Checklist::new(),
            entry_price: 0.0,
            stop_distance: 0.0,
            atr: 0.0,
            regime: VolatilityRegime::Normal,
        }
    }

    pub fn fired(&self) -> bool {
        self.side.is_some()
    }

    /// Stop distance as a percentage of the proposed entry.
    pub fn stop_distance_pct(&self) -> f64 {
        if self.entry_price > 0.0 {
            self.stop_distance / self.entry_price * 100.0
        } else {
            f64::INFINITY
        }
    }

    pub fn passed(&self) -> impl Iterator<Item = Criterion> + '_ {
        self.checklist
            .iter()
            .filter(|(_, check)| check.passed)
            .map(|(criterion, _)| *criterion)
    }

    pub fn failed(&self) -> impl Iterator<Item = Criterion> + '_ {
        self.checklist
            .iter()
            .filter(|(_, check)| !check.passed)
            .map(|(criterion, _)| *criterion)
    }
}
