//! Daily PnL of a generator selling against forecast demand.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::forecast::ForecastResult;

/// Settlement price over the horizon.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceInput {
    /// Same price every day (currency per MWh).
    Constant(f64),
    /// One price per horizon day; length must match the horizon.
    Series(Vec<f64>),
}

/// Fraction of nameplate capacity realized each day.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityFactor {
    Constant(f64),
    /// One factor per horizon day; length must match the horizon.
    Series(Vec<f64>),
}

impl PriceInput {
    /// Expands to one price per horizon day.
    fn per_day(&self, horizon: usize) -> Result<Vec<f64>> {
        match self {
            Self::Constant(p) => Ok(vec![*p; horizon]),
            Self::Series(s) => aligned(s, horizon, "price_series"),
        }
    }
}

impl CapacityFactor {
    fn per_day(&self, horizon: usize) -> Result<Vec<f64>> {
        match self {
            Self::Constant(c) => Ok(vec![*c; horizon]),
            Self::Series(s) => aligned(s, horizon, "capacity_factor_series"),
        }
    }
}

impl Default for CapacityFactor {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

/// One simulated settlement day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlPoint {
    pub date: NaiveDate,
    /// Realized generation, `capacity_mw * capacity_factor`.
    pub generation_mwh: f64,
    /// Forecast demand the position is settled against.
    pub demand_mwh: f64,
    pub price_per_mwh: f64,
    /// `(generation_mwh - demand_mwh) * price_per_mwh`; negative is a loss.
    pub pnl_value: f64,
}

impl fmt::Display for PnlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} gen={:>8.2} demand={:>8.2} price={:>7.2} pnl={:>11.2}",
            self.date, self.generation_mwh, self.demand_mwh, self.price_per_mwh, self.pnl_value
        )
    }
}

/// Daily PnL aligned one-to-one with a forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnLSeries {
    points: Vec<PnlPoint>,
    currency: String,
}

impl PnLSeries {
    /// Wraps precomputed points; used by the simulator and by tests.
    pub fn new(points: Vec<PnlPoint>, currency: impl Into<String>) -> Self {
        Self {
            points,
            currency: currency.into(),
        }
    }

    pub fn points(&self) -> &[PnlPoint] {
        &self.points
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// PnL values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.pnl_value).collect()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.pnl_value).sum()
    }
}

/// Converts a demand forecast into a daily PnL series.
///
/// Sign convention: long generation, short demand. A day is profitable
/// when generation exceeds forecast demand at the given price.
#[derive(Debug, Clone)]
pub struct TradeSimulator {
    pub capacity_factor: CapacityFactor,
    pub currency: String,
}

impl Default for TradeSimulator {
    fn default() -> Self {
        Self {
            capacity_factor: CapacityFactor::default(),
            currency: "EUR".to_string(),
        }
    }
}

impl TradeSimulator {
    pub fn new(capacity_factor: CapacityFactor, currency: impl Into<String>) -> Self {
        Self {
            capacity_factor,
            currency: currency.into(),
        }
    }

    /// Simulates one PnL point per forecast day.
    ///
    /// # Arguments
    ///
    /// * `forecast` - Demand forecast; the point forecast is the benchmark
    /// * `capacity_mw` - Nameplate generation capacity (must be > 0)
    /// * `prices` - Constant price or one price per horizon day
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidInput`] if `capacity_mw` is not positive.
    /// - [`PipelineError::Alignment`] if a price or capacity-factor series
    ///   length differs from the horizon length.
    pub fn simulate(
        &self,
        forecast: &ForecastResult,
        capacity_mw: f64,
        prices: &PriceInput,
    ) -> Result<PnLSeries> {
        if !(capacity_mw.is_finite() && capacity_mw > 0.0) {
            return Err(PipelineError::InvalidInput(format!(
                "capacity_mw must be > 0, got {capacity_mw}"
            )));
        }
        let n = forecast.horizon_length();
        let price = prices.per_day(n)?;
        let factor = self.capacity_factor.per_day(n)?;

        let points: Vec<PnlPoint> = forecast
            .point_forecast()
            .iter()
            .enumerate()
            .map(|(i, &demand)| {
                let generation = capacity_mw * factor[i];
                PnlPoint {
                    date: forecast.date(i),
                    generation_mwh: generation,
                    demand_mwh: demand,
                    price_per_mwh: price[i],
                    pnl_value: (generation - demand) * price[i],
                }
            })
            .collect();

        let series = PnLSeries::new(points, self.currency.clone());
        info!(
            days = series.len(),
            capacity_mw,
            total_pnl = series.total(),
            currency = %series.currency,
            "trade simulation complete"
        );
        Ok(series)
    }
}

/// Simulates with default settings (capacity factor 1.0, EUR).
///
/// # Errors
///
/// See [`TradeSimulator::simulate`].
pub fn simulate(
    forecast: &ForecastResult,
    capacity_mw: f64,
    prices: &PriceInput,
) -> Result<PnLSeries> {
    TradeSimulator::default().simulate(forecast, capacity_mw, prices)
}

fn aligned(values: &[f64], horizon: usize, series: &'static str) -> Result<Vec<f64>> {
    if values.len() != horizon {
        return Err(PipelineError::Alignment {
            series,
            expected: horizon,
            actual: values.len(),
        });
    }
    Ok(values.to_vec())
}
