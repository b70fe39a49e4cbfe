//! Error taxonomy shared by every pipeline stage.

use chrono::NaiveDate;
use thiserror::Error;

/// Validation failures raised while building a [`TimeSeriesStore`](crate::data::TimeSeriesStore).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store was given no observations.
    #[error("history is empty")]
    Empty,
    /// Dates are not strictly increasing.
    #[error("observation dated {date} is not after the previous date {previous}")]
    OutOfOrder { previous: NaiveDate, date: NaiveDate },
    /// The same date appears twice.
    #[error("duplicate observation for {0}")]
    DuplicateDate(NaiveDate),
    /// One or more calendar days are missing between two observations.
    #[error("gap of {missing_days} day(s) between {after} and {before}")]
    Gap {
        after: NaiveDate,
        before: NaiveDate,
        missing_days: i64,
    },
    /// Demand is negative or not a finite number.
    #[error("invalid demand {value} MW on {date}")]
    InvalidDemand { date: NaiveDate, value: f64 },
}

/// Errors raised by the forecast, trade and risk stages and their collaborators.
///
/// The four domain failures are fatal to a run; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// History is too short for the requested ARIMA order.
    #[error("insufficient data: ARIMA({p},{d},{q}) needs at least {required} observations, got {actual}")]
    InsufficientData {
        p: usize,
        d: usize,
        q: usize,
        required: usize,
        actual: usize,
    },

    /// Model fitting did not converge or produced non-finite output.
    #[error("model fitting did not converge: {0}")]
    NonConvergence(String),

    /// A per-day input series does not line up with the forecast horizon.
    #[error("alignment error: {series} has {actual} entries, forecast horizon has {expected}")]
    Alignment {
        series: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Too few PnL observations to estimate a quantile.
    #[error("insufficient sample: value-at-risk needs at least {required} observations, got {actual}")]
    InsufficientSample { required: usize, actual: usize },

    /// A scalar parameter is outside its valid range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid history: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
