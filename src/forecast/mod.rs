//! Demand forecasting with ARIMA models and confidence bounds.

pub mod arima;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::info;

use crate::data::Observation;
use crate::error::{PipelineError, Result};

pub use arima::{ArimaOrder, FittedArima, SolverSettings};

/// Forecaster configuration.
#[derive(Debug, Clone, Copy)]
pub struct ForecastSettings {
    /// Two-sided coverage of the forecast interval, in (0, 1).
    pub confidence_level: f64,
    pub solver: SolverSettings,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            solver: SolverSettings::default(),
        }
    }
}

/// Point forecast and interval for each day of a horizon.
///
/// Built once per forecast call and never mutated; every sequence has
/// `horizon_length` entries and `lower <= point <= upper` holds day by day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    horizon_start: NaiveDate,
    point_forecast: Vec<f64>,
    lower_bound: Vec<f64>,
    upper_bound: Vec<f64>,
    confidence_level: f64,
    order: ArimaOrder,
}

impl ForecastResult {
    /// Assembles a result from precomputed sequences.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the sequences are empty,
    /// differ in length, or violate `lower <= point <= upper`.
    pub fn new(
        horizon_start: NaiveDate,
        point_forecast: Vec<f64>,
        lower_bound: Vec<f64>,
        upper_bound: Vec<f64>,
        confidence_level: f64,
        order: ArimaOrder,
    ) -> Result<Self> {
        let n = point_forecast.len();
        if n == 0 {
            return Err(PipelineError::InvalidInput(
                "forecast horizon must contain at least one day".into(),
            ));
        }
        if lower_bound.len() != n || upper_bound.len() != n {
            return Err(PipelineError::InvalidInput(format!(
                "bound lengths ({}, {}) differ from point forecast length {n}",
                lower_bound.len(),
                upper_bound.len()
            )));
        }
        let ordered = (0..n)
            .all(|i| lower_bound[i] <= point_forecast[i] && point_forecast[i] <= upper_bound[i]);
        if !ordered {
            return Err(PipelineError::InvalidInput(
                "forecast bounds must satisfy lower <= point <= upper".into(),
            ));
        }
        Ok(Self {
            horizon_start,
            point_forecast,
            lower_bound,
            upper_bound,
            confidence_level,
            order,
        })
    }

    /// First forecast day (the day after the last observation).
    pub fn horizon_start(&self) -> NaiveDate {
        self.horizon_start
    }

    pub fn horizon_length(&self) -> usize {
        self.point_forecast.len()
    }

    pub fn point_forecast(&self) -> &[f64] {
        &self.point_forecast
    }

    pub fn lower_bound(&self) -> &[f64] {
        &self.lower_bound
    }

    pub fn upper_bound(&self) -> &[f64] {
        &self.upper_bound
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Calendar day of horizon step `i`.
    pub fn date(&self, i: usize) -> NaiveDate {
        self.horizon_start + Days::new(i as u64)
    }

    /// One date per horizon day.
    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.horizon_length()).map(|i| self.date(i)).collect()
    }
}

/// Fits a univariate ARIMA model to demand history and forecasts ahead.
///
/// Stateless: each call fits from scratch and returns a fresh result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forecaster {
    settings: ForecastSettings,
}

impl Forecaster {
    pub fn new(settings: ForecastSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Fits the model without forecasting.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InsufficientData`] if history is shorter than `p + d + q + 1`.
    /// - [`PipelineError::InvalidInput`] if history dates are not consecutive days.
    /// - [`PipelineError::NonConvergence`] if the solver fails.
    pub fn fit(&self, history: &[Observation], order: ArimaOrder) -> Result<FittedArima> {
        check_consecutive(history)?;

        let values: Vec<f64> = history.iter().map(|o| o.demand_mw).collect();
        arima::fit(&values, order, &self.settings.solver)
    }

    /// Fits `order` to `history` and forecasts `horizon_days` days past the
    /// last observation.
    ///
    /// # Errors
    ///
    /// Everything [`Forecaster::fit`] returns, plus
    /// [`PipelineError::InvalidInput`] for a zero horizon or a confidence
    /// level outside (0, 1), and [`PipelineError::NonConvergence`] if the
    /// forecast diverges.
    pub fn fit_and_forecast(
        &self,
        history: &[Observation],
        horizon_days: usize,
        order: ArimaOrder,
    ) -> Result<ForecastResult> {
        if horizon_days == 0 {
            return Err(PipelineError::InvalidInput("horizon_days must be > 0".into()));
        }
        let z = z_score(self.settings.confidence_level)?;
        let model = self.fit(history, order)?;
        let Some(last) = history.last() else {
            return Err(PipelineError::InvalidInput("history is empty".into()));
        };

        let path = model.forecast(horizon_days)?;
        let lower = path.point.iter().zip(&path.std_err).map(|(f, s)| f - z * s).collect();
        let upper = path.point.iter().zip(&path.std_err).map(|(f, s)| f + z * s).collect();

        info!(
            %order,
            observations = history.len(),
            horizon_days,
            iterations = model.iterations,
            sigma2 = model.sigma2,
            aic = model.aic,
            "forecast complete"
        );

        ForecastResult::new(
            last.date + Days::new(1),
            path.point,
            lower,
            upper,
            self.settings.confidence_level,
            order,
        )
    }
}

/// Forecasts with default settings (95% interval, default solver limits).
///
/// # Errors
///
/// See [`Forecaster::fit_and_forecast`].
pub fn fit_and_forecast(
    history: &[Observation],
    horizon_days: usize,
    order: ArimaOrder,
) -> Result<ForecastResult> {
    Forecaster::default().fit_and_forecast(history, horizon_days, order)
}

/// Two-sided standard normal quantile for `confidence_level`.
fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(PipelineError::InvalidInput(format!(
            "confidence_level must be in (0, 1), got {confidence_level}"
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

fn check_consecutive(history: &[Observation]) -> Result<()> {
    for pair in history.windows(2) {
        if (pair[1].date - pair[0].date).num_days() != 1 {
            return Err(PipelineError::InvalidInput(format!(
                "history must be consecutive days; {} is followed by {}",
                pair[0].date, pair[1].date
            )));
        }
    }
    Ok(())
}
