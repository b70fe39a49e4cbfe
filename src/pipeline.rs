//! End-to-end run: history → forecast → PnL → VaR.
//!
//! Each stage takes the previous stage's immutable output. Nothing is
//! cached between runs, so identical inputs produce identical outputs.

use tracing::{info, info_span};

use crate::config::PipelineConfig;
use crate::data::TimeSeriesStore;
use crate::error::Result;
use crate::forecast::{ForecastResult, Forecaster};
use crate::io::export::{ForecastPnlRow, forecast_pnl_rows};
use crate::io::history::load_history;
use crate::risk::{VaRResult, expected_shortfall, value_at_risk};
use crate::trade::PnLSeries;

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub store: TimeSeriesStore,
    pub forecast: ForecastResult,
    pub pnl: PnLSeries,
    /// VaR at the headline confidence level.
    pub var: VaRResult,
    /// VaR at every configured level, ascending by confidence.
    pub var_levels: Vec<VaRResult>,
    /// Mean PnL beyond the headline VaR.
    pub expected_shortfall: f64,
}

impl PipelineOutput {
    /// Date-aligned forecast and PnL rows for export.
    ///
    /// # Errors
    ///
    /// Returns an alignment error if the stages disagree on horizon length.
    pub fn rows(&self) -> Result<Vec<ForecastPnlRow>> {
        forecast_pnl_rows(&self.forecast, &self.pnl)
    }
}

/// Builds the history for `cfg`: loads `[data].history_csv` when set,
/// otherwise generates the synthetic series.
///
/// # Errors
///
/// Returns an I/O, CSV or store validation error.
pub fn build_history(cfg: &PipelineConfig) -> Result<TimeSeriesStore> {
    let d = &cfg.data;
    let store = match &d.history_csv {
        Some(path) => load_history(path, d.fill_gaps)?,
        None => TimeSeriesStore::new(cfg.generator().generate(d.start_date, d.days))?,
    };
    info!(
        observations = store.len(),
        first = %store.first_date(),
        last = %store.last_date(),
        mean_mw = store.mean_demand(),
        "history ready"
    );
    Ok(store)
}

/// Runs forecast, trade simulation and risk on an existing history.
///
/// # Errors
///
/// Propagates the first stage error: insufficient data or non-convergence
/// from the forecaster, alignment or invalid input from the simulator, and
/// insufficient sample from the risk estimator.
pub fn run_on_history(cfg: &PipelineConfig, store: TimeSeriesStore) -> Result<PipelineOutput> {
    let order = cfg.order();

    let forecast = {
        let _span = info_span!("forecast", %order).entered();
        Forecaster::new(cfg.forecast_settings()).fit_and_forecast(
            store.observations(),
            cfg.forecast.horizon_days,
            order,
        )?
    };

    let pnl = {
        let _span = info_span!("trade").entered();
        let prices = cfg.price_input(forecast.horizon_start());
        cfg.trade_simulator()
            .simulate(&forecast, cfg.trade.capacity_mw, &prices)?
    };

    let _span = info_span!("risk").entered();
    let var = value_at_risk(&pnl, cfg.risk.confidence_level)?;
    let var_levels = cfg
        .risk_levels()
        .into_iter()
        .map(|cl| value_at_risk(&pnl, cl))
        .collect::<Result<Vec<_>>>()?;
    let expected_shortfall = expected_shortfall(&pnl, cfg.risk.confidence_level)?;

    Ok(PipelineOutput {
        store,
        forecast,
        pnl,
        var,
        var_levels,
        expected_shortfall,
    })
}

/// Builds the history and runs every stage.
///
/// # Errors
///
/// See [`build_history`] and [`run_on_history`].
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<PipelineOutput> {
    let store = build_history(cfg)?;
    run_on_history(cfg, store)
}
