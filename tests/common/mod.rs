//! Shared test fixtures for integration tests.

use chrono::NaiveDate;
use demand_risk::config::PipelineConfig;
use demand_risk::data::{DemandGenerator, TimeSeriesStore};
use demand_risk::forecast::ArimaOrder;

/// First day of every fixture history.
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// Synthetic demand history around `base_mw` (annual cycle, mild trend, seed 42).
pub fn history(days: usize, base_mw: f64) -> TimeSeriesStore {
    seeded_history(days, base_mw, 42)
}

/// Same shape as [`history`] with an explicit noise seed.
pub fn seeded_history(days: usize, base_mw: f64, seed: u64) -> TimeSeriesStore {
    let generator = DemandGenerator::new(base_mw, 0.08 * base_mw, 365.0, 0.0, 5.0, 8.0, seed);
    TimeSeriesStore::new(generator.generate(start_date(), days)).expect("generated history is valid")
}

/// Two years around 500 MW.
pub fn utility_history() -> TimeSeriesStore {
    history(730, 500.0)
}

/// ARIMA(2,1,2), the order used by the utility-scale fixtures.
pub fn utility_order() -> ArimaOrder {
    ArimaOrder::new(2, 1, 2)
}

/// Utility-scale preset trimmed to `days` of history and a `horizon_days` forecast.
pub fn utility_config(days: usize, horizon_days: usize) -> PipelineConfig {
    let mut cfg = PipelineConfig::utility_scale();
    cfg.data.days = days;
    cfg.forecast.horizon_days = horizon_days;
    cfg
}
