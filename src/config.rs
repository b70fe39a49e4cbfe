//! TOML-based pipeline configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Deserialize;
use thiserror::Error;

use crate::data::DemandGenerator;
use crate::forecast::{ArimaOrder, ForecastSettings, SolverSettings};
use crate::trade::{CapacityFactor, PriceInput, TradeSimulator};

/// Top-level pipeline configuration parsed from TOML.
///
/// All fields have defaults matching the baseline preset. Load from
/// TOML with [`PipelineConfig::from_toml_file`] or use
/// [`PipelineConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// History source and synthetic generator parameters.
    #[serde(default)]
    pub data: DataConfig,
    /// Model order, horizon and solver limits.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Generation position and prices.
    #[serde(default)]
    pub trade: TradeConfig,
    /// Value-at-Risk levels.
    #[serde(default)]
    pub risk: RiskConfig,
}

/// History source and synthetic generator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Load history from this CSV instead of generating it.
    pub history_csv: Option<PathBuf>,
    /// Interpolate missing days when loading from CSV.
    pub fill_gaps: bool,
    /// First generated day (`"YYYY-MM-DD"`).
    pub start_date: NaiveDate,
    /// Number of generated days (must be > 0).
    pub days: usize,
    /// Mean demand (MW).
    pub base_mw: f64,
    /// Seasonal amplitude (MW).
    pub amplitude_mw: f64,
    /// Seasonal period (days, must be > 0).
    pub period_days: f64,
    /// Seasonal phase offset (radians).
    pub phase_rad: f64,
    /// Total linear drift across the generated window (MW).
    pub trend_mw: f64,
    /// Gaussian noise standard deviation (MW, >= 0).
    pub noise_std: f64,
    /// Noise seed.
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            history_csv: None,
            fill_gaps: false,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            days: 730,
            base_mw: 100.0,
            amplitude_mw: 20.0,
            period_days: 365.0,
            phase_rad: 0.0,
            trend_mw: 5.0,
            noise_std: 5.0,
            seed: 42,
        }
    }
}

/// Model order, horizon and solver limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Autoregressive order.
    pub p: usize,
    /// Differencing order.
    pub d: usize,
    /// Moving-average order.
    pub q: usize,
    /// Days to forecast past the last observation (must be > 0).
    pub horizon_days: usize,
    /// Forecast interval coverage, in (0, 1).
    pub confidence_level: f64,
    /// Solver iteration cap (must be > 0).
    pub max_iterations: usize,
    /// Solver relative tolerance (must be > 0).
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            p: 5,
            d: 1,
            q: 0,
            horizon_days: 90,
            confidence_level: 0.95,
            max_iterations: 200,
            tolerance: 1e-8,
        }
    }
}

/// Generation position and prices.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TradeConfig {
    /// Nameplate generation capacity (MW, must be > 0).
    pub capacity_mw: f64,
    /// Constant capacity factor (0.0-1.0), used when no series is given.
    pub capacity_factor: f64,
    /// Optional per-day capacity factors; must match the horizon.
    pub capacity_factor_series: Option<Vec<f64>>,
    /// Constant settlement price per MWh, used when no series is given.
    /// With `weekend_price_per_mwh` set this is the weekday price.
    pub price_per_mwh: f64,
    /// Saturday and Sunday price, resolved against the forecast calendar.
    pub weekend_price_per_mwh: Option<f64>,
    /// Optional per-day prices; must match the horizon.
    pub price_series: Option<Vec<f64>>,
    /// Currency label for PnL.
    pub currency: String,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            capacity_mw: 120.0,
            capacity_factor: 1.0,
            capacity_factor_series: None,
            price_per_mwh: 50.0,
            weekend_price_per_mwh: None,
            price_series: None,
            currency: "EUR".to_string(),
        }
    }
}

/// Value-at-Risk levels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Headline VaR confidence level, in (0, 1).
    pub confidence_level: f64,
    /// Additional levels reported alongside the headline figure.
    pub extra_levels: Vec<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            extra_levels: vec![0.90, 0.99],
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"forecast.horizon_days"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl PipelineConfig {
    /// Returns the baseline preset: the original demo's parameters.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the utility-scale preset: demand around 500 MW, ARIMA(2,1,2).
    pub fn utility_scale() -> Self {
        Self {
            data: DataConfig {
                base_mw: 500.0,
                amplitude_mw: 40.0,
                noise_std: 8.0,
                ..DataConfig::default()
            },
            forecast: ForecastConfig {
                p: 2,
                d: 1,
                q: 2,
                ..ForecastConfig::default()
            },
            trade: TradeConfig::default(),
            risk: RiskConfig::default(),
        }
    }

    /// Returns the peak-pricing preset: utility scale with weekday/weekend prices.
    pub fn peak_pricing() -> Self {
        let mut cfg = Self::utility_scale();
        cfg.trade.price_per_mwh = 65.0;
        cfg.trade.weekend_price_per_mwh = Some(38.0);
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "utility_scale", "peak_pricing"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "utility_scale" => Ok(Self::utility_scale()),
            "peak_pricing" => Ok(Self::peak_pricing()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. History length
    /// against model order and series alignment against the horizon are
    /// left to the pipeline stages, which report them as run errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let d = &self.data;
        if d.history_csv.is_none() && d.days == 0 {
            errors.push(ConfigError::new("data.days", "must be > 0"));
        }
        if d.period_days <= 0.0 {
            errors.push(ConfigError::new("data.period_days", "must be > 0"));
        }
        if d.noise_std < 0.0 {
            errors.push(ConfigError::new("data.noise_std", "must be >= 0"));
        }

        let f = &self.forecast;
        if f.horizon_days == 0 {
            errors.push(ConfigError::new("forecast.horizon_days", "must be > 0"));
        }
        if !in_unit_interval(f.confidence_level) {
            errors.push(ConfigError::new("forecast.confidence_level", "must be in (0, 1)"));
        }
        if f.max_iterations == 0 {
            errors.push(ConfigError::new("forecast.max_iterations", "must be > 0"));
        }
        if f.tolerance <= 0.0 {
            errors.push(ConfigError::new("forecast.tolerance", "must be > 0"));
        }

        let t = &self.trade;
        if t.capacity_mw <= 0.0 {
            errors.push(ConfigError::new("trade.capacity_mw", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&t.capacity_factor) {
            errors.push(ConfigError::new("trade.capacity_factor", "must be in [0.0, 1.0]"));
        }
        if let Some(series) = &t.capacity_factor_series {
            if series.iter().any(|cf| !(0.0..=1.0).contains(cf)) {
                errors.push(ConfigError::new(
                    "trade.capacity_factor_series",
                    "every entry must be in [0.0, 1.0]",
                ));
            }
        }
        if t.weekend_price_per_mwh.is_some_and(|p| !p.is_finite()) {
            errors.push(ConfigError::new("trade.weekend_price_per_mwh", "must be finite"));
        }
        if t.currency.trim().is_empty() {
            errors.push(ConfigError::new("trade.currency", "must not be empty"));
        }

        let r = &self.risk;
        if !in_unit_interval(r.confidence_level) {
            errors.push(ConfigError::new("risk.confidence_level", "must be in (0, 1)"));
        }
        if r.extra_levels.iter().any(|cl| !in_unit_interval(*cl)) {
            errors.push(ConfigError::new(
                "risk.extra_levels",
                "every level must be in (0, 1)",
            ));
        }

        errors
    }

    pub fn order(&self) -> ArimaOrder {
        ArimaOrder::new(self.forecast.p, self.forecast.d, self.forecast.q)
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            confidence_level: self.forecast.confidence_level,
            solver: SolverSettings {
                max_iterations: self.forecast.max_iterations,
                tolerance: self.forecast.tolerance,
                ..SolverSettings::default()
            },
        }
    }

    pub fn generator(&self) -> DemandGenerator {
        let d = &self.data;
        DemandGenerator::new(
            d.base_mw,
            d.amplitude_mw,
            d.period_days,
            d.phase_rad,
            d.trend_mw,
            d.noise_std,
            d.seed,
        )
    }

    /// Prices for a horizon starting on `horizon_start`.
    ///
    /// An explicit `price_series` wins; otherwise a weekend price turns the
    /// constant into a calendar schedule over `forecast.horizon_days`.
    pub fn price_input(&self, horizon_start: NaiveDate) -> PriceInput {
        let t = &self.trade;
        match (&t.price_series, t.weekend_price_per_mwh) {
            (Some(series), _) => PriceInput::Series(series.clone()),
            (None, Some(weekend)) => PriceInput::Series(
                (0..self.forecast.horizon_days)
                    .map(|i| match (horizon_start + Days::new(i as u64)).weekday() {
                        Weekday::Sat | Weekday::Sun => weekend,
                        _ => t.price_per_mwh,
                    })
                    .collect(),
            ),
            (None, None) => PriceInput::Constant(t.price_per_mwh),
        }
    }

    pub fn trade_simulator(&self) -> TradeSimulator {
        let factor = match &self.trade.capacity_factor_series {
            Some(series) => CapacityFactor::Series(series.clone()),
            None => CapacityFactor::Constant(self.trade.capacity_factor),
        };
        TradeSimulator::new(factor, self.trade.currency.clone())
    }

    /// Headline level followed by the extra levels, deduplicated, ascending.
    pub fn risk_levels(&self) -> Vec<f64> {
        let mut levels = vec![self.risk.confidence_level];
        levels.extend(self.risk.extra_levels.iter().copied());
        levels.sort_by(f64::total_cmp);
        levels.dedup();
        levels
    }
}

fn in_unit_interval(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = PipelineConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn baseline_matches_original_demo() {
        let cfg = PipelineConfig::baseline();
        assert_eq!(cfg.order(), ArimaOrder::new(5, 1, 0));
        assert_eq!(cfg.forecast.horizon_days, 90);
        assert_eq!(cfg.data.days, 730);
        assert_eq!(cfg.price_input(cfg.data.start_date), PriceInput::Constant(50.0));
        assert_eq!(cfg.trade.capacity_mw, 120.0);
    }

    #[test]
    fn from_preset_unknown() {
        let err = PipelineConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in PipelineConfig::PRESETS {
            let cfg = PipelineConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    fn weekend_flags(cfg: &PipelineConfig, horizon_start: NaiveDate) -> Vec<bool> {
        match cfg.price_input(horizon_start) {
            PriceInput::Series(s) => s.iter().map(|p| *p == 38.0).collect(),
            other => panic!("expected a price series, got {other:?}"),
        }
    }

    #[test]
    fn peak_pricing_follows_the_horizon_calendar() {
        let cfg = PipelineConfig::peak_pricing();
        // 2026-01-03 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap_or_default();
        let flags = weekend_flags(&cfg, saturday);
        assert_eq!(flags.len(), cfg.forecast.horizon_days);
        assert_eq!(&flags[..7], &[true, true, false, false, false, false, false]);

        // shifting the start by one day shifts the schedule
        let sunday = saturday + Days::new(1);
        let shifted = weekend_flags(&cfg, sunday);
        assert_eq!(&shifted[..7], &[true, false, false, false, false, false, true]);
    }

    #[test]
    fn explicit_series_overrides_weekend_price() {
        let mut cfg = PipelineConfig::peak_pricing();
        cfg.trade.price_series = Some(vec![10.0; 3]);
        assert_eq!(
            cfg.price_input(cfg.data.start_date),
            PriceInput::Series(vec![10.0; 3])
        );
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[data]
start_date = "2023-06-01"
days = 400
base_mw = 500.0
amplitude_mw = 30.0
period_days = 365.0
phase_rad = 0.5
trend_mw = 2.0
noise_std = 6.0
seed = 7

[forecast]
p = 2
d = 1
q = 2
horizon_days = 30
confidence_level = 0.9
max_iterations = 100
tolerance = 1e-9

[trade]
capacity_mw = 450.0
capacity_factor = 0.9
price_per_mwh = 62.5
currency = "USD"

[risk]
confidence_level = 0.99
extra_levels = [0.95]
"#;
        let cfg = PipelineConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(PipelineConfig::order), Some(ArimaOrder::new(2, 1, 2)));
        assert_eq!(cfg.as_ref().map(|c| c.data.days), Some(400));
        assert_eq!(
            cfg.as_ref().map(|c| c.data.start_date),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
        assert_eq!(cfg.as_ref().map(|c| &*c.trade.currency), Some("USD"));
        assert_eq!(cfg.as_ref().map(PipelineConfig::risk_levels), Some(vec![0.95, 0.99]));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[forecast]
p = 1
bogus_field = true
"#;
        assert!(PipelineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[data]
seed = 99
"#;
        let cfg = PipelineConfig::from_toml_str(toml).ok();
        // seed overridden
        assert_eq!(cfg.as_ref().map(|c| c.data.seed), Some(99));
        // horizon kept default
        assert_eq!(cfg.as_ref().map(|c| c.forecast.horizon_days), Some(90));
        // trade kept default
        assert_eq!(cfg.as_ref().map(|c| c.trade.capacity_mw), Some(120.0));
    }

    #[test]
    fn validation_catches_zero_horizon() {
        let mut cfg = PipelineConfig::baseline();
        cfg.forecast.horizon_days = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "forecast.horizon_days"));
    }

    #[test]
    fn validation_catches_bad_confidence_levels() {
        let mut cfg = PipelineConfig::baseline();
        cfg.forecast.confidence_level = 1.0;
        cfg.risk.confidence_level = 0.0;
        cfg.risk.extra_levels = vec![1.5];
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "forecast.confidence_level"));
        assert!(errors.iter().any(|e| e.field == "risk.confidence_level"));
        assert!(errors.iter().any(|e| e.field == "risk.extra_levels"));
    }

    #[test]
    fn validation_catches_non_positive_capacity() {
        let mut cfg = PipelineConfig::baseline();
        cfg.trade.capacity_mw = 0.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "trade.capacity_mw"));
    }

    #[test]
    fn misaligned_price_series_is_left_to_the_simulator() {
        let mut cfg = PipelineConfig::baseline();
        cfg.trade.price_series = Some(vec![50.0; 3]);
        assert!(cfg.validate().is_empty());
    }
}
