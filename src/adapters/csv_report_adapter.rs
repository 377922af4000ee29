//! CSV export of a replay: `<symbol>_trades.csv` and `<symbol>_equity.csv`.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ScalptraderError;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct TradeRow<'a> {
    position_id: u64,
    symbol: &'a str,
    side: &'static str,
    entry_time: NaiveDateTime,
    exit_time: NaiveDateTime,
    entry_price: f64,
    exit_price: f64,
    size: f64,
    pnl: f64,
    fees: f64,
    r_multiple: f64,
    exit_reason: &'static str,
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn write_trades(&self, result: &BacktestResult, path: &Path) -> Result<(), ScalptraderError> {
        let mut writer = csv::Writer::from_path(path)?;
        for trade in &result.trades {
            writer.serialize(TradeRow {
                position_id: trade.position_id,
                symbol: &trade.symbol,
                side: crate::domain::signal::Side::label(Some(trade.side)),
                entry_time: trade.entry_time,
                exit_time: trade.exit_time,
                entry_price: trade.entry_price,
                exit_price: trade.exit_price,
                size: trade.size,
                pnl: trade.pnl,
                fees: trade.fees,
                r_multiple: trade.r_multiple,
                exit_reason: trade.exit_reason.as_str(),
            })?;
        }
        if result.trades.is_empty() {
            writer.write_record([
                "position_id",
                "symbol",
                "side",
                "entry_time",
                "exit_time",
                "entry_price",
                "exit_price",
                "size",
                "pnl",
                "fees",
                "r_multiple",
                "exit_reason",
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_equity(&self, result: &BacktestResult, path: &Path) -> Result<(), ScalptraderError> {
        let mut writer = csv::Writer::from_path(path)?;
        for point in &result.equity_curve {
            writer.serialize(point)?;
        }
        if result.equity_curve.is_empty() {
            writer.write_record(["timestamp", "equity"])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<Vec<PathBuf>, ScalptraderError> {
        fs::create_dir_all(output_dir)?;
        let trades = output_dir.join(format!("{}_trades.csv", result.symbol));
        let equity = output_dir.join(format!("{}_equity.csv", result.symbol));
        self.write_trades(result, &trades)?;
        self.write_equity(result, &equity)?;
        Ok(vec![trades, equity])
    }
}
