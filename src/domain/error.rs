//! Domain error types.
//!
//! Each pipeline boundary has its own error: [`FetchError`] for the price
//! source, [`SchemaError`] for the validator, [`ForecastError`] for the
//! forecaster. [`TickercastError`] wraps them for the CLI edge.

use chrono::NaiveDate;

use crate::domain::series::Column;
use crate::domain::ticker::{TickerError, TickerSymbol};

/// Why a single ticker could not be loaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchCause {
    #[error("invalid date range {start} to {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rate limited by data source")]
    RateLimited,

    #[error("unknown ticker")]
    UnknownTicker,

    #[error("no rows in requested range")]
    Empty,

    #[error("unexpected response: {0}")]
    Format(String),

    #[error("source unreadable: {0}")]
    Source(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot load {ticker}: {cause}")]
pub struct FetchError {
    pub ticker: TickerSymbol,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(ticker: &TickerSymbol, cause: FetchCause) -> Self {
        Self {
            ticker: ticker.clone(),
            cause,
        }
    }
}

fn join_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A series that does not satisfy the column layout a stage needs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("{ticker}: missing required columns: {}", join_columns(.columns))]
    MissingColumns {
        ticker: TickerSymbol,
        columns: Vec<Column>,
    },

    #[error("{ticker}: column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        ticker: TickerSymbol,
        column: Column,
        expected: usize,
        actual: usize,
    },

    #[error("{ticker}: dates not strictly increasing at row {row} ({date})")]
    UnorderedDates {
        ticker: TickerSymbol,
        row: usize,
        date: NaiveDate,
    },
}

/// Failure reported by a forecast engine while fitting or predicting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("too few observations: have {have}, need {need}")]
    TooFewObservations { have: usize, need: usize },

    #[error("design matrix is singular")]
    Singular,

    #[error("engine returned {actual} rows for {expected} requested dates")]
    ShapeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error("{ticker}: forecast horizon must be positive, got {days} days")]
    InvalidHorizon { ticker: TickerSymbol, days: i64 },

    #[error("{ticker}: cannot fit forecast model: {source}")]
    Fit {
        ticker: TickerSymbol,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Top-level error type for tickercast.
#[derive(Debug, thiserror::Error)]
pub enum TickercastError {
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

    #[error(transparent)]
    InvalidTickers(#[from] TickerError),

    #[error("prediction horizon must be between {min} and {max} years, got {years}")]
    InvalidHorizon { years: u32, min: u32, max: u32 },

    #[error("data source unavailable: {reason}")]
    DataSource { reason: String },

    #[error("no ticker could be loaded ({requested} requested)")]
    NoData { requested: usize },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("failed to write {path}: {reason}")]
    Output { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TickercastError> for std::process::ExitCode {
    fn from(err: &TickercastError) -> Self {
        let code: u8 = match err {
            TickercastError::Io(_)
            | TickercastError::Output { .. }
            | TickercastError::DataSource { .. } => 1,
            TickercastError::ConfigParse { .. }
            | TickercastError::ConfigMissing { .. }
            | TickercastError::ConfigInvalid { .. } => 2,
            TickercastError::InvalidTickers(_) | TickercastError::InvalidHorizon { .. } => 3,
            TickercastError::NoData { .. } | TickercastError::Fetch(_) => 5,
            TickercastError::Schema(_) => 6,
            TickercastError::Forecast(_) => 7,
        };
        std::process::ExitCode::from(code)
    }
}
