//! Assembles per-bar [`IndicatorSet`]s from the individual calculators.

use crate::domain::config::IndicatorConfig;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::{calculate_volume_sma, smooth_series};
use crate::domain::indicator::stoch_rsi::calculate_stoch_rsi;
use crate::domain::indicator::{EnrichedBar, IndicatorSet, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Compute every indicator over `bars` and attach the values to each bar.
///
/// The output has one entry per input bar. A bar is warmed only when every
/// component is valid, so the first `config.warmup_bars() - 1` entries are
/// always unwarmed.
pub fn compute_indicator_sets(bars: &[Bar], config: &IndicatorConfig) -> Vec<EnrichedBar> {
    let ema_fast = calculate_ema(bars, config.ema_fast);
    let ema_slow = calculate_ema(bars, config.ema_slow);
    let ema_trend = calculate_ema(bars, config.ema_trend);
    let ema_htf = calculate_ema(bars, config.ema_htf);
    let rsi = calculate_rsi(bars, config.rsi_period);
    let atr = calculate_atr(bars, config.atr_period);
    let atr_baseline = smooth_series(bars, &atr, config.volatility_period);
    let volume_avg = calculate_volume_sma(bars, config.volume_period);
    let stoch = calculate_stoch_rsi(
        bars,
        config.rsi_period,
        config.stoch_period,
        config.stoch_k_smooth,
        config.stoch_d_smooth,
    );

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let stoch_values = stoch.values.get(i).and_then(|p| match (p.valid, p.value) {
                (true, IndicatorValue::StochRsi { raw, k, d }) => Some((raw, k, d)),
                _ => None,
            });
            let indicators = match (
                ema_fast.simple_at(i),
                ema_slow.simple_at(i),
                ema_trend.simple_at(i),
                ema_htf.simple_at(i),
                rsi.simple_at(i),
                atr.simple_at(i),
                atr_baseline.simple_at(i),
                volume_avg.simple_at(i),
                stoch_values,
            ) {
                (
                    Some(ema_fast),
                    Some(ema_slow),
                    Some(ema_trend),
                    Some(ema_htf),
                    Some(rsi),
                    Some(atr),
                    Some(atr_baseline),
                    Some(volume_avg),
                    Some((stoch_rsi, stoch_k, stoch_d)),
                ) => IndicatorSet {
                    warmed: true,
                    ema_fast,
                    ema_slow,
                    ema_trend,
                    ema_htf,
                    rsi,
                    atr,
                    atr_baseline,
                    volume_avg,
                    stoch_rsi,
                    stoch_k,
                    stoch_d,
                },
                _ => IndicatorSet::unwarmed(),
            };
            EnrichedBar {
                bar: bar.clone(),
                indicators,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + ((i as f64) * 0.3).sin() * 4.0 + i as f64 * 0.05;
                Bar {
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open: close - 0.2,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000.0 + (i % 7) as f64 * 50.0,
                }
            })
            .collect()
    }

    fn small_config() -> IndicatorConfig {
        IndicatorConfig {
            ema_fast: 3,
            ema_slow: 5,
            ema_trend: 8,
            ema_htf: 12,
            rsi_period: 4,
            atr_period: 4,
            volume_period: 5,
            stoch_period: 4,
            stoch_k_smooth: 2,
            stoch_d_smooth: 2,
            volatility_period: 6,
        }
    }

    #[test]
    fn one_set_per_bar() {
        let bars = make_bars(40);
        let sets = compute_indicator_sets(&bars, &small_config());
        assert_eq!(sets.len(), bars.len());
        assert_eq!(sets[7].bar, bars[7]);
    }

    #[test]
    fn warmup_boundary_matches_config() {
        let config = small_config();
        let bars = make_bars(40);
        let sets = compute_indicator_sets(&bars, &config);
        let first = config.warmup_bars() - 1;
        assert!(sets[..first].iter().all(|s| !s.is_warmed()));
        assert!(sets[first..].iter().all(|s| s.is_warmed()));
    }

    #[test]
    fn too_few_bars_never_warm() {
        let config = IndicatorConfig::default();
        let sets = compute_indicator_sets(&make_bars(150), &config);
        assert!(sets.iter().all(|s| !s.is_warmed()));
        assert_eq!(sets[149].indicators, IndicatorSet::unwarmed());
    }

    #[test]
    fn warmed_values_are_populated() {
        let sets = compute_indicator_sets(&make_bars(40), &small_config());
        let last = &sets[39].indicators;
        assert!(last.ema_fast > 0.0 && last.ema_htf > 0.0);
        assert!(last.atr > 0.0 && last.atr_baseline > 0.0);
        assert!(last.volume_avg > 0.0);
        assert!((0.0..=100.0).contains(&last.rsi));
        assert!((0.0..=100.0).contains(&last.stoch_k));
    }
}
