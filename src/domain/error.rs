//! Domain error types.
//!
//! Risk-limit breaches are not errors: they are ordinary outcomes
//! carried in [`crate::domain::risk::RiskDecision`], never errors.

use chrono::NaiveDateTime;

/// Top-level error type for scalptrader.
#[derive(Debug, thiserror::Error)]
pub enum ScalptraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data gap for {symbol}: bar at {after} followed by {next}")]
    DataGap {
        symbol: String,
        after: NaiveDateTime,
        next: NaiveDateTime,
    },

    #[error("out-of-order bars for {symbol}: {current} does not follow {previous}")]
    OutOfOrder {
        symbol: String,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("invalid transition for position {position}: cannot {action} while {from}")]
    InvalidTransition {
        position: u64,
        from: String,
        action: &'static str,
    },

    #[error("invalid position: {reason}")]
    InvalidPosition { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScalptraderError> for std::process::ExitCode {
    fn from(err: &ScalptraderError) -> Self {
        let code: u8 = match err {
            ScalptraderError::Io(_) | ScalptraderError::Csv(_) => 1,
            ScalptraderError::ConfigParse { .. }
            | ScalptraderError::ConfigMissing { .. }
            | ScalptraderError::ConfigInvalid { .. } => 2,
            ScalptraderError::DataGap { .. }
            | ScalptraderError::OutOfOrder { .. }
            | ScalptraderError::InsufficientData { .. }
            | ScalptraderError::DataSource { .. } => 5,
            ScalptraderError::InvalidTransition { .. } | ScalptraderError::InvalidPosition { .. } => {
                70
            }
        };
        std::process::ExitCode::from(code)
    }
}

impl ScalptraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScalptraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for configuration problems detected before a run starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScalptraderError::ConfigParse { .. }
                | ScalptraderError::ConfigMissing { .. }
                | ScalptraderError::ConfigInvalid { .. }
        )
    }

    /// True for bar-sequence defects (gaps, ordering, warm-up, source failures).
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            ScalptraderError::DataGap { .. }
                | ScalptraderError::OutOfOrder { .. }
                | ScalptraderError::InsufficientData { .. }
                | ScalptraderError::DataSource { .. }
        )
    }
}
