//! Market data port.

use chrono::NaiveDateTime;

use crate::domain::error::ScalptraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol` in source order, optionally bounded (inclusive).
    /// Ordering is not repaired here; the replay rejects out-of-order input.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, ScalptraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, ScalptraderError>;
}
