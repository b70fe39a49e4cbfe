//! Electricity demand forecasting, trade PnL simulation and historical VaR.

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
/// CSV persistence for history and the forecast + PnL export.
pub mod io;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod trade;

pub use error::{PipelineError, Result, StoreError};
