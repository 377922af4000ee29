//! OHLCV bar representation and timeline checks.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::error::ScalptraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Outcome of scanning a bar sequence for timeline defects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineReport {
    pub gaps: usize,
}

/// Verify bars are strictly ascending and spaced exactly `interval` apart.
///
/// Out-of-order timestamps are always fatal and are reported ahead of any
/// gap. A gap is fatal unless `tolerate_gaps` is set, in which case it is
/// counted and skipped over.
pub fn check_timeline(
    symbol: &str,
    bars: &[Bar],
    interval: Duration,
    tolerate_gaps: bool,
) -> Result<TimelineReport, ScalptraderError> {
    if let Some(pair) = bars
        .windows(2)
        .find(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(ScalptraderError::OutOfOrder {
            symbol: symbol.to_string(),
            previous: pair[0].timestamp,
            current: pair[1].timestamp,
        });
    }

    let mut report = TimelineReport::default();
    for pair in bars.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let step = curr.timestamp - prev.timestamp;
        if step != interval {
            if !tolerate_gaps {
                return Err(ScalptraderError::DataGap {
                    symbol: symbol.to_string(),
                    after: prev.timestamp,
                    next: curr.timestamp,
                });
            }
            log::warn!(
                "{symbol}: skipping gap between {} and {}",
                prev.timestamp,
                curr.timestamp
            );
            report.gaps += 1;
        }
    }

    Ok(report)
}
