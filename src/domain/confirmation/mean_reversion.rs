//! Stochastic-RSI extremes faded back toward the mean.

use crate::domain::config::ConfirmationConfig;
use crate::domain::confirmation::RuleSet;
use crate::domain::indicator::EnrichedBar;
use crate::domain::signal::{Checklist, Criterion, CriterionCheck, Side};

pub struct MeanReversion;

impl RuleSet for MeanReversion {
    fn primary(&self) -> Criterion {
        Criterion::StochExtreme
    }

    /// Fade the extreme K visited over the two bars. When both or neither
    /// were visited, the side of the midline decides: the previous bar's K
    /// for a full swing, the current K otherwise.
    fn candidate(
        &self,
        current: &EnrichedBar,
        previous: &EnrichedBar,
        config: &ConfirmationConfig,
    ) -> Side {
        let (prev_k, cur_k) = (previous.indicators.stoch_k, current.indicators.stoch_k);
        let visited_oversold = prev_k.min(cur_k) <= config.stoch_oversold;
        let visited_overbought = prev_k.max(cur_k) >= config.stoch_overbought;
        let side_of = |k: f64| {
            if k <= config.stoch_midline {
                Side::Long
            } else {
                Side::Short
            }
        };
        match (visited_oversold, visited_overbought) {
            (true, false) => Side::Long,
            (false, true) => Side::Short,
            (true, true) => side_of(prev_k),
            (false, false) => side_of(cur_k),
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
        let volume_ratio = cur.volume_ratio(current.bar.volume);

        let (extreme, in_extreme) = match side {
            Side::Long => {
                let k = prev.stoch_k.min(cur.stoch_k);
                (k, k <= config.stoch_oversold)
            }
            Side::Short => {
                let k = prev.stoch_k.max(cur.stoch_k);
                (k, k >= config.stoch_overbought)
            }
        };
        let k_change = cur.stoch_k - prev.stoch_k;
        let bounced = k_change * side.sign() > 0.0;
        let kd_crossed = match side {
            Side::Long => prev.stoch_k <= prev.stoch_d && cur.stoch_k > cur.stoch_d,
            Side::Short => prev.stoch_k >= prev.stoch_d && cur.stoch_k < cur.stoch_d,
        };
        let trend_ok = match side {
            Side::Long => close >= cur.ema_trend,
            Side::Short => close <= cur.ema_trend,
        };

        let mut checklist = Checklist::new();
        checklist.insert(
            Criterion::StochExtreme,
            CriterionCheck::new(in_extreme, extreme),
        );
        checklist.insert(Criterion::StochBounce, CriterionCheck::new(bounced, k_change));
        checklist.insert(
            Criterion::StochKdCross,
            CriterionCheck::new(kd_crossed, cur.stoch_k - cur.stoch_d),
        );
        checklist.insert(
            Criterion::TrendFilter,
            CriterionCheck::new(trend_ok, close - cur.ema_trend),
        );
        checklist.insert(
            Criterion::VolumeAboveAverage,
            CriterionCheck::new(volume_ratio >= config.reversion_volume_multiplier, volume_ratio),
        );
        checklist.insert(
            Criterion::RsiNotExtreme,
            CriterionCheck::new(
                cur.rsi > config.rsi_extreme_low && cur.rsi < config.rsi_extreme_high,
                cur.rsi,
            ),
        );
        checklist
    }
}
