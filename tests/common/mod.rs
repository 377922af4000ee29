#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use scalptrader::adapters::lot_adapter::StepLotRounding;
use scalptrader::domain::config::{IndicatorConfig, TradingConfig};
use scalptrader::domain::error::ScalptraderError;
pub use scalptrader::domain::ohlcv::Bar;
use scalptrader::ports::data_port::DataPort;
use scalptrader::ports::lot_port::LotRounding;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, ScalptraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ScalptraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s) && end.is_none_or(|e| b.timestamp <= e))
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScalptraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn at_minutes(minutes: i64) -> NaiveDateTime {
    start() + Duration::minutes(minutes)
}

/// Five-minute bars following a sine wave around 100.
pub fn sine_bars(count: usize, period: f64, amplitude: f64) -> Vec<Bar> {
    let mut prev = 100.0;
    (0..count)
        .map(|i| {
            let close = 100.0 + amplitude * (i as f64 * std::f64::consts::TAU / period).sin();
            let bar = Bar {
                timestamp: at_minutes(5 * i as i64),
                open: prev,
                high: close.max(prev) + 0.5,
                low: close.min(prev) - 0.5,
                close,
                volume: 1_000.0,
            };
            prev = close;
            bar
        })
        .collect()
}

/// Five-minute bars that drift steadily up by `step` per bar.
pub fn trending_bars(count: usize, start_price: f64, step: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let close = start_price + step * i as f64;
            Bar {
                timestamp: at_minutes(5 * i as i64),
                open: close - step,
                high: close + step.abs(),
                low: close - 2.0 * step.abs(),
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

/// Short periods so replays warm up in a handful of bars, with the risk
/// limits relaxed enough that most fired signals are taken.
pub fn fast_config() -> TradingConfig {
    let mut config = TradingConfig::default();
    config.indicators = IndicatorConfig {
        ema_fast: 2,
        ema_slow: 4,
        ema_trend: 6,
        ema_htf: 8,
        rsi_period: 3,
        atr_period: 3,
        volume_period: 3,
        stoch_period: 3,
        stoch_k_smooth: 2,
        stoch_d_smooth: 2,
        volatility_period: 3,
    };
    config.signals.required_confirmations = 1;
    config.risk.max_stop_distance_pct = 10.0;
    config.risk.max_trades_per_day = 1_000;
    config.risk.cooldown_after_losses = 1_000;
    config.risk.max_daily_drawdown_pct = 100.0;
    config.risk.max_total_drawdown_pct = 100.0;
    config
}

pub fn lot() -> Arc<dyn LotRounding + Send + Sync> {
    Arc::new(StepLotRounding::new(0.001, 0.001).unwrap())
}

pub fn write_bars_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut file = fs::File::create(dir.join(format!("{}.csv", symbol))).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for b in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub const FAST_INI: &str = r#"
[indicators]
ema_fast = 2
ema_slow = 4
ema_trend = 6
ema_htf = 8
rsi_period = 3
atr_period = 3
volume_period = 3
stoch_period = 3
stoch_k_smooth = 2
stoch_d_smooth = 2
volatility_period = 3

[signals]
variant = trend_crossover
required_confirmations = 1

[risk]
max_stop_distance_pct = 10.0
max_trades_per_day = 1000
cooldown_after_losses = 1000
max_daily_drawdown_pct = 100
max_total_drawdown_pct = 100

[backtest]
initial_capital = 10000
bar_interval_minutes = 5
"#;
