//! Backtest export port.

use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ScalptraderError;

/// Port for writing a replay's trade log and equity curve.
pub trait ReportPort {
    /// Write the result under `output_dir`, returning the files created.
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<Vec<PathBuf>, ScalptraderError>;
}
