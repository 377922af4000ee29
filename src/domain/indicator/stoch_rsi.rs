//! Stochastic RSI.
//!
//! raw = (RSI - min) / (max - min) * 100 over the stoch window, 50 when the
//! window is flat. K = SMA(raw, k_smooth), D = SMA(K, d_smooth).
//! The point is valid once D is defined.

use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_stoch_rsi(
    bars: &[Bar],
    rsi_period: usize,
    stoch_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::StochRsi {
        rsi_period,
        stoch_period,
        k_smooth,
        d_smooth,
    };
    if stoch_period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let rsi = calculate_rsi(bars, rsi_period);
    let rsi_values: Vec<Option<f64>> = rsi.values.iter().map(IndicatorPoint::simple).collect();

    let raw: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < stoch_period {
                return None;
            }
            let window = &rsi_values[i + 1 - stoch_period..=i];
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for v in window {
                let v = (*v)?;
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let current = rsi_values[i]?;
            if hi - lo > 0.0 {
                Some((current - lo) / (hi - lo) * 100.0)
            } else {
                Some(50.0)
            }
        })
        .collect();

    let k = rolling_mean(&raw, k_smooth);
    let d = rolling_mean(&k, d_smooth);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (raw[i], k[i], d[i]) {
            (Some(raw), Some(k), Some(d)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::StochRsi { raw, k, d },
            },
            _ => IndicatorPoint::invalid(
                bar.timestamp,
                IndicatorValue::StochRsi {
                    raw: 0.0,
                    k: 0.0,
                    d: 0.0,
                },
            ),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Index of the first bar at which the stochastic RSI can be valid.
pub fn first_valid_index(rsi_period: usize, stoch_period: usize, k_smooth: usize, d_smooth: usize) -> usize {
    rsi_period + stoch_period.max(1) + k_smooth.max(1) + d_smooth.max(1) - 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + ((i as f64) * 0.7).sin() * 5.0)
            .collect()
    }

    #[test]
    fn warmup_matches_first_valid_index() {
        let bars = make_bars(&wave(40));
        let series = calculate_stoch_rsi(&bars, 5, 5, 3, 3);
        let first = first_valid_index(5, 5, 3, 3);
        assert_eq!(first, 13);
        assert!(!series.values[first - 1].valid);
        assert!(series.values[first].valid);
    }

    #[test]
    fn values_bounded() {
        let bars = make_bars(&wave(80));
        let series = calculate_stoch_rsi(&bars, 14, 14, 3, 3);
        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::StochRsi { raw, k, d } = point.value {
                for v in [raw, k, d] {
                    assert!((0.0..=100.0).contains(&v), "value {} out of range", v);
                }
            } else {
                panic!("expected StochRsi value");
            }
        }
    }

    #[test]
    fn flat_rsi_window_reads_fifty() {
        // Monotonic rise pins RSI at 100 for the whole window.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let series = calculate_stoch_rsi(&make_bars(&closes), 3, 3, 1, 1);
        let last = series.values.last().unwrap();
        assert!(last.valid);
        assert_eq!(
            last.value,
            IndicatorValue::StochRsi {
                raw: 50.0,
                k: 50.0,
                d: 50.0
            }
        );
    }

    #[test]
    fn k_is_mean_of_raw() {
        let bars = make_bars(&wave(40));
        let series = calculate_stoch_rsi(&bars, 5, 5, 3, 1);
        let raws: Vec<f64> = series.values[30..33]
            .iter()
            .map(|p| match p.value {
                IndicatorValue::StochRsi { raw, .. } => raw,
                _ => f64::NAN,
            })
            .collect();
        if let IndicatorValue::StochRsi { k, d, .. } = series.values[32].value {
            let expected = raws.iter().sum::<f64>() / 3.0;
            assert!((k - expected).abs() < 1e-9);
            assert!((d - k).abs() < 1e-12);
        } else {
            panic!("expected StochRsi value");
        }
    }
}
