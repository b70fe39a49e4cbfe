//! Run summary printed after the per-day rows and optionally saved as JSON.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::forecast::ArimaOrder;
use crate::pipeline::PipelineOutput;
use crate::risk::VaRResult;

/// Headline figures of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub history_days: usize,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub mean_demand_mw: f64,
    pub order: ArimaOrder,
    pub horizon_start: NaiveDate,
    pub horizon_days: usize,
    pub forecast_confidence: f64,
    /// Mean of the point forecast (MW).
    pub mean_forecast_mw: f64,
    /// Mean width of the forecast interval (MW).
    pub mean_interval_width_mw: f64,
    pub currency: String,
    pub total_pnl: f64,
    pub worst_day_pnl: f64,
    pub best_day_pnl: f64,
    pub var: VaRResult,
    pub var_levels: Vec<VaRResult>,
    pub expected_shortfall: f64,
}

impl RunSummary {
    /// Summarizes a completed run.
    pub fn from_output(out: &PipelineOutput) -> Self {
        let f = &out.forecast;
        let n = f.horizon_length() as f64;
        let mean_forecast_mw = f.point_forecast().iter().sum::<f64>() / n;
        let mean_interval_width_mw = f
            .upper_bound()
            .iter()
            .zip(f.lower_bound())
            .map(|(u, l)| u - l)
            .sum::<f64>()
            / n;
        let values = out.pnl.values();
        let worst_day_pnl = values.iter().copied().fold(f64::INFINITY, f64::min);
        let best_day_pnl = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            history_days: out.store.len(),
            history_start: out.store.first_date(),
            history_end: out.store.last_date(),
            mean_demand_mw: out.store.mean_demand(),
            order: f.order(),
            horizon_start: f.horizon_start(),
            horizon_days: f.horizon_length(),
            forecast_confidence: f.confidence_level(),
            mean_forecast_mw,
            mean_interval_width_mw,
            currency: out.pnl.currency().to_string(),
            total_pnl: out.pnl.total(),
            worst_day_pnl,
            best_day_pnl,
            var: out.var,
            var_levels: out.var_levels.clone(),
            expected_shortfall: out.expected_shortfall,
        }
    }

    /// Writes the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| PipelineError::Io(e.into()))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(
            f,
            "History:               {} days ({} to {})",
            self.history_days, self.history_start, self.history_end
        )?;
        writeln!(f, "Mean demand:           {:.2} MW", self.mean_demand_mw)?;
        writeln!(f, "Model:                 {}", self.order)?;
        writeln!(
            f,
            "Horizon:               {} days from {}",
            self.horizon_days, self.horizon_start
        )?;
        writeln!(f, "Mean forecast:         {:.2} MW", self.mean_forecast_mw)?;
        writeln!(
            f,
            "Mean {:.0}% interval:    {:.2} MW",
            self.forecast_confidence * 100.0,
            self.mean_interval_width_mw
        )?;
        writeln!(f, "Total PnL:             {:.2} {}", self.total_pnl, self.currency)?;
        writeln!(f, "Worst day PnL:         {:.2} {}", self.worst_day_pnl, self.currency)?;
        writeln!(f, "Best day PnL:          {:.2} {}", self.best_day_pnl, self.currency)?;
        for v in &self.var_levels {
            writeln!(
                f,
                "VaR {:>5.1}%:            {:.2} {}",
                v.confidence_level * 100.0,
                v.value,
                self.currency
            )?;
        }
        write!(
            f,
            "Expected shortfall:    {:.2} {}",
            self.expected_shortfall, self.currency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::run_pipeline;

    fn summary() -> RunSummary {
        let mut cfg = PipelineConfig::baseline();
        cfg.data.days = 90;
        cfg.forecast.p = 1;
        cfg.forecast.horizon_days = 10;
        let out = run_pipeline(&cfg).expect("pipeline");
        RunSummary::from_output(&out)
    }

    #[test]
    fn summary_reflects_run() {
        let s = summary();
        assert_eq!(s.history_days, 90);
        assert_eq!(s.horizon_days, 10);
        assert_eq!(s.order, ArimaOrder::new(1, 1, 0));
        assert!(s.worst_day_pnl <= s.var.value);
        assert!(s.best_day_pnl >= s.worst_day_pnl);
        assert!(s.mean_interval_width_mw >= 0.0);
    }

    #[test]
    fn display_lists_every_var_level() {
        let text = summary().to_string();
        assert!(text.starts_with("--- Run Summary ---"));
        assert!(text.contains("Model:                 ARIMA(1,1,0)"));
        assert_eq!(text.lines().filter(|l| l.starts_with("VaR")).count(), 3);
        assert!(text.contains("Expected shortfall:"));
    }

    #[test]
    fn json_file_parses_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.json");
        let s = summary();
        s.write_json(&path).expect("write json");

        let raw = std::fs::read_to_string(&path).expect("read json");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["horizon_days"], 10);
        assert_eq!(value["order"]["p"], 1);
        assert_eq!(value["var"]["rank"], s.var.rank);
        assert_eq!(value["currency"], "EUR");
    }
}
