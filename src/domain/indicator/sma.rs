//! Simple moving averages.
//!
//! O(n) running-sum window. Volume SMA warms after (n-1) bars; smoothing of
//! another series warms once n consecutive valid inputs exist.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Rolling mean over optional inputs. A window containing any `None`
/// produces `None`.
pub fn rolling_mean(inputs: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(inputs.len());
    if period == 0 {
        out.resize(inputs.len(), None);
        return out;
    }

    let mut sum = 0.0;
    let mut run = 0usize;
    for (i, input) in inputs.iter().enumerate() {
        match input {
            Some(v) => {
                sum += v;
                run += 1;
                if run > period {
                    // run > period implies inputs[i - period] is Some
                    sum -= inputs[i - period].unwrap_or(0.0);
                }
                if run >= period {
                    out.push(Some(sum / period as f64));
                } else {
                    out.push(None);
                }
            }
            None => {
                sum = 0.0;
                run = 0;
                out.push(None);
            }
        }
    }
    out
}

fn to_series(bars: &[Bar], means: Vec<Option<f64>>, indicator_type: IndicatorType) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(means)
        .map(|(bar, mean)| match mean {
            Some(v) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(v),
            },
            None => IndicatorPoint::invalid(bar.timestamp, IndicatorValue::Simple(0.0)),
        })
        .collect();
    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    to_series(
        bars,
        rolling_mean(&volumes, period),
        IndicatorType::VolumeSma(period),
    )
}

/// SMA of an already computed series, e.g. the ATR baseline.
pub fn smooth_series(bars: &[Bar], source: &IndicatorSeries, period: usize) -> IndicatorSeries {
    let inputs: Vec<Option<f64>> = (0..bars.len()).map(|i| source.simple_at(i)).collect();
    to_series(bars, rolling_mean(&inputs, period), IndicatorType::Sma(period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::atr::calculate_atr;
    use chrono::{Duration, NaiveDate};

    fn make_bars(volumes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| Bar {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: 100.0,
                high: 101.0 + i as f64,
                low: 99.0,
                close: 100.0,
                volume,
            })
            .collect()
    }

    #[test]
    fn rolling_mean_basic() {
        let inputs = [Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let out = rolling_mean(&inputs, 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn rolling_mean_restarts_after_gap_in_inputs() {
        let inputs = [Some(1.0), None, Some(3.0), Some(5.0)];
        let out = rolling_mean(&inputs, 2);
        assert_eq!(out, vec![None, None, None, Some(4.0)]);
    }

    #[test]
    fn rolling_mean_zero_period() {
        assert_eq!(rolling_mean(&[Some(1.0)], 0), vec![None]);
    }

    #[test]
    fn volume_sma_values() {
        let bars = make_bars(&[100.0, 200.0, 300.0, 400.0]);
        let series = calculate_volume_sma(&bars, 3);
        assert!(!series.values[1].valid);
        assert_eq!(series.simple_at(2), Some(200.0));
        assert_eq!(series.simple_at(3), Some(300.0));
    }

    #[test]
    fn smoothed_atr_warms_after_both_windows() {
        let bars = make_bars(&[1.0; 8]);
        let atr = calculate_atr(&bars, 3);
        let baseline = smooth_series(&bars, &atr, 4);
        // ATR valid from index 2, baseline needs 4 of them → index 5
        assert!(!baseline.values[4].valid);
        assert!(baseline.values[5].valid);
    }
}
