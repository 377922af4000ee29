//! Fast/slow EMA crossover confirmed by trend, momentum and volume.

use crate::domain::config::ConfirmationConfig;
use crate::domain::confirmation::RuleSet;
use crate::domain::indicator::EnrichedBar;
use crate::domain::signal::{Checklist, Criterion, CriterionCheck, Side};

pub struct TrendCrossover;

fn pct_from(price: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        (price - reference) / reference * 100.0
    }
}

impl RuleSet for TrendCrossover {
    fn primary(&self) -> Criterion {
        Criterion::EmaCrossover
    }

    fn candidate(
        &self,
        current: &EnrichedBar,
        _previous: &EnrichedBar,
        _config: &ConfirmationConfig,
    ) -> Side {
        if current.indicators.ema_fast < current.indicators.ema_slow {
            Side::Short
        } else {
            Side::Long
        }
    }

    fn checklist(
        &self,
        side: Side,
        current: &EnrichedBar,
        previous: &EnrichedBar,
        config: &ConfirmationConfig,
    ) -> Checklist {
        let cur = &current.indicators;
        let prev = &previous.indicators;
        let close = current.bar.close;
        let sign = side.sign();

        // Equal EMAs on the current bar are never a cross.
        let crossed = match side {
            Side::Long => prev.ema_fast <= prev.ema_slow && cur.ema_fast > cur.ema_slow,
            Side::Short => prev.ema_fast >= prev.ema_slow && cur.ema_fast < cur.ema_slow,
        };
        let trend_pct = pct_from(close, cur.ema_trend);
        let htf_pct = pct_from(close, cur.ema_htf);
        let volume_ratio = cur.volume_ratio(current.bar.volume);

        let mut checklist = Checklist::new();
        checklist.insert(
            Criterion::EmaCrossover,
            CriterionCheck::new(crossed, cur.ema_fast - cur.ema_slow),
        );
        checklist.insert(
            Criterion::TrendSide,
            CriterionCheck::new(trend_pct * sign > 0.0, trend_pct),
        );
        checklist.insert(
            Criterion::TrendDistance,
            CriterionCheck::new(
                trend_pct * sign >= config.trend_distance_pct,
                trend_pct * sign,
            ),
        );
        checklist.insert(
            Criterion::RsiBand,
            CriterionCheck::new(
                cur.rsi >= config.rsi_lower && cur.rsi <= config.rsi_upper,
                cur.rsi,
            ),
        );
        checklist.insert(
            Criterion::VolumeSurge,
            CriterionCheck::new(volume_ratio >= config.volume_multiplier, volume_ratio),
        );
        checklist.insert(
            Criterion::HigherTimeframe,
            CriterionCheck::new(htf_pct * sign > 0.0, htf_pct),
        );
        checklist
    }
}
