//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{parse_timestamp, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::lot_adapter::StepLotRounding;
use crate::domain::backtest::{run_symbols, BacktestResult};
use crate::domain::config::{load_trading_config, TradingConfig};
use crate::domain::config_validation::CRITERIA_PER_VARIANT;
use crate::domain::confirmation::evaluate_latest;
use crate::domain::error::ScalptraderError;
use crate::domain::risk::{AccountState, RiskDecision, RiskManager};
use crate::domain::risk_desk::RiskDesk;
use crate::domain::signal::{Side, Signal};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::lot_port::LotRounding;
use crate::ports::report_port::ReportPort;

const KNOWN_SECTIONS: [&str; 5] = ["indicators", "signals", "risk", "lifecycle", "backtest"];

#[derive(Parser, Debug)]
#[command(name = "scalptrader", about = "Leveraged crypto futures decision engine and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical bars through the decision engine
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>.csv files
        #[arg(short, long)]
        data: PathBuf,
        /// Symbols to replay; defaults to [backtest] symbols, then every CSV
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,
        /// Directory for the trade and equity CSVs
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate the latest bar of each symbol against one shared account
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Symbols to scan; approvals reserve slots in the order given
        #[arg(short, long = "symbol", required = true)]
        symbols: Vec<String>,
        /// Account equity to size against; defaults to initial_capital
        #[arg(long)]
        equity: Option<f64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            symbols,
            output,
            start,
            end,
        } => run_backtest(
            &config,
            &data,
            &symbols,
            output.as_deref(),
            start.as_deref(),
            end.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Scan {
            config,
            data,
            symbols,
            equity,
        } => run_scan(&config, &data, &symbols, equity),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load the INI file, build the typed config and the lot rounding.
fn load_engine(
    path: &Path,
) -> Result<(FileConfigAdapter, TradingConfig, Arc<dyn LotRounding + Send + Sync>), ExitCode> {
    let adapter = load_config(path)?;
    let trading = load_trading_config(&adapter).map_err(|e| report(&e))?;
    let lot = StepLotRounding::from_config(&adapter).map_err(|e| report(&e))?;
    Ok((adapter, trading, Arc::new(lot)))
}

fn report(err: &ScalptraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn parse_bound(raw: Option<&str>) -> Result<Option<NaiveDateTime>, ExitCode> {
    raw.map(parse_timestamp).transpose().map_err(|e| report(&e))
}

fn run_backtest(
    config_path: &Path,
    data_dir: &Path,
    symbol_override: &[String],
    output_dir: Option<&Path>,
    start: Option<&str>,
    end: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (adapter, trading, lot) = match load_engine(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let (start, end) = match (parse_bound(start), parse_bound(end)) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(code), _) | (_, Err(code)) => return code,
    };

    let data_port = CsvAdapter::new(data_dir.to_path_buf());
    let symbols = match resolve_symbols(symbol_override, &adapter, &data_port) {
        Ok(s) if !s.is_empty() => s,
        Ok(_) => {
            eprintln!("error: no symbols to backtest");
            return ExitCode::from(5);
        }
        Err(e) => return report(&e),
    };

    let mut datasets = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        match data_port.fetch_bars(symbol, start, end) {
            Ok(bars) => datasets.push((symbol.clone(), bars)),
            Err(e) => eprintln!("warning: skipping {} ({})", symbol, e),
        }
    }
    if datasets.is_empty() {
        eprintln!("error: no valid symbols with data to backtest");
        return ExitCode::from(5);
    }

    eprintln!(
        "Running backtest: {} symbols, variant {}, warm-up {} bars",
        datasets.len(),
        trading.signals.variant,
        trading.indicators.warmup_bars()
    );

    let results = run_symbols(&datasets, &trading, lot);
    let reporter = CsvReportAdapter::new();
    let mut exit = ExitCode::SUCCESS;
    let mut completed = 0;

    for (symbol, outcome) in &results {
        match outcome {
            Ok(result) => {
                completed += 1;
                print_summary(result, trading.backtest.initial_capital);
                if let Some(dir) = output_dir {
                    match reporter.write(result, dir) {
                        Ok(files) => {
                            for file in files {
                                eprintln!("  wrote {}", file.display());
                            }
                        }
                        Err(e) => exit = report(&e),
                    }
                }
            }
            Err(e) if e.is_data() => eprintln!("warning: {} not replayed ({})", symbol, e),
            Err(e) => exit = report(e),
        }
    }

    if completed == 0 {
        eprintln!("error: no symbol could be replayed");
        return ExitCode::from(5);
    }
    exit
}

fn print_summary(result: &BacktestResult, initial_capital: f64) {
    let m = &result.metrics;
    eprintln!("\n=== {} ===", result.symbol);
    if result.cancelled {
        eprintln!("(cancelled after {} bars)", result.bars_processed);
    }
    eprintln!("Bars:             {} ({} gaps skipped)", result.bars_processed, result.gaps_skipped);
    eprintln!("Initial Equity:   {:.2}", initial_capital);
    eprintln!("Final Equity:     {:.2}", result.final_equity());
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Calmar Ratio:     {:.2}", m.calmar_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {}", m.profit_factor);
    eprintln!("Avg R:            {:.2}", m.avg_r_multiple);
    eprintln!("Signals:          {} fired, {} rejected", result.signals_fired, result.total_rejections());
    for (reason, count) in &result.rejections {
        eprintln!("  {}: {}", reason, count);
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (adapter, trading, lot) = match load_engine(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    for section in adapter.sections() {
        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            eprintln!("warning: unrecognised section [{}]", section);
        }
    }

    let lc = &trading.lifecycle;
    eprintln!("\nSignals:");
    eprintln!("  variant:   {}", trading.signals.variant);
    eprintln!(
        "  required:  {} of {}",
        trading.signals.required_confirmations, CRITERIA_PER_VARIANT
    );
    eprintln!("  warm-up:   {} bars", trading.indicators.warmup_bars());
    eprintln!("\nRisk:");
    eprintln!("  risk/trade: {}%", trading.risk.risk_per_trade_pct);
    eprintln!("  leverage:   {}x (max {}x)", trading.risk.leverage, trading.risk.max_leverage);
    eprintln!("  lot step:   min {}", lot.min_quantity());
    eprintln!("\nTake-profit tiers:");
    for (r, fraction) in lc.take_profit_r.iter().zip(&lc.take_profit_fractions) {
        eprintln!("  {:.2}R -> {:.0}%", r, fraction * 100.0);
    }
    eprintln!("  conflict policy: {}", lc.conflict_policy);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_scan(config_path: &Path, data_dir: &Path, symbols: &[String], equity: Option<f64>) -> ExitCode {
    let (_, trading, lot) = match load_engine(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(data_dir.to_path_buf());
    let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();

    let evaluated: Vec<Result<Signal, ScalptraderError>> = symbols
        .par_iter()
        .map(|symbol| {
            let bars = data_port.fetch_bars(symbol, None, None)?;
            evaluate_latest(symbol, &bars, &trading)
        })
        .collect();

    let mut signals = Vec::with_capacity(symbols.len());
    let mut exit = ExitCode::SUCCESS;
    for (symbol, outcome) in symbols.into_iter().zip(evaluated) {
        match outcome {
            Ok(signal) => signals.push((symbol, signal)),
            Err(e) => exit = report(&e),
        }
    }
    if signals.is_empty() {
        return exit;
    }

    let equity = equity.unwrap_or(trading.backtest.initial_capital);
    let (decisions, account) = decide_scans(&signals, &trading, lot, equity);
    for ((symbol, signal), decision) in signals.iter().zip(&decisions) {
        print_signal(symbol, signal);
        match decision.reason {
            None => println!(
                "decision: approved size={:.6} leverage={}x risk={:.2}",
                decision.size, decision.leverage, decision.risk_amount
            ),
            Some(reason) => println!("decision: rejected ({})", reason),
        }
    }
    println!(
        "account: equity={:.2} open={}/{}",
        account.equity,
        account.open_count(),
        trading.risk.max_concurrent_positions
    );
    exit
}

/// Run scanned signals through one [`RiskDesk`] in order, so approvals
/// share the account's slots and limits. Returns the decisions and the
/// account after every reservation.
pub fn decide_scans(
    signals: &[(String, Signal)],
    trading: &TradingConfig,
    lot: Arc<dyn LotRounding + Send + Sync>,
    equity: f64,
) -> (Vec<RiskDecision>, AccountState) {
    let opened = signals
        .iter()
        .map(|(_, s)| s.timestamp)
        .min()
        .unwrap_or_default();
    let desk = RiskDesk::new(RiskManager::new(trading, lot), AccountState::new(equity, opened));
    let decisions = signals
        .iter()
        .map(|(symbol, signal)| desk.decide_and_reserve(symbol, signal))
        .collect();
    (decisions, desk.snapshot())
}

fn print_signal(symbol: &str, signal: &Signal) {
    println!(
        "{} {} side={} confirmations={}/{}",
        symbol,
        signal.timestamp,
        Side::label(signal.side),
        signal.confirmations,
        signal.required
    );
    if let Some(candidate) = signal.candidate {
        println!(
            "candidate={} entry={:.4} stop_distance={:.4} atr={:.4} regime={}",
            candidate, signal.entry_price, signal.stop_distance, signal.atr, signal.regime
        );
    }
    for (criterion, check) in &signal.checklist {
        let mark = if check.passed { "x" } else { " " };
        println!("  [{}] {:<22} {:.4}", mark, criterion.as_str(), check.observed);
    }
}

/// Command-line symbols win, then `[backtest] symbols`, then every CSV.
pub fn resolve_symbols(
    symbol_override: &[String],
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, ScalptraderError> {
    if !symbol_override.is_empty() {
        return Ok(symbol_override.iter().map(|s| s.trim().to_uppercase()).collect());
    }

    if let Some(list) = config.get_string("backtest", "symbols") {
        let symbols: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !symbols.is_empty() {
            return Ok(symbols);
        }
    }

    data_port.list_symbols()
}
