//! Core decision engine: indicators, confirmation, risk, position lifecycle
//! and the historical replay built on them.

pub mod ohlcv;
pub mod error;
pub mod config;
pub mod config_validation;
pub mod indicator;
pub mod indicator_helpers;
pub mod signal;
pub mod confirmation;
pub mod risk;
pub mod risk_desk;
pub mod execution;
pub mod position;
pub mod backtest;
pub mod metrics;
