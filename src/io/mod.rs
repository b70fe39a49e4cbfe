//! CSV persistence for demand history and forecast/PnL export.

pub mod export;
pub mod history;
