use std::path::PathBuf;

use clap::Parser;

/// Forecast electricity demand, simulate a generation position and estimate its VaR.
#[derive(Debug, Parser)]
#[command(name = "demand-risk", version)]
pub struct CliOptions {
    /// Load the run configuration from a TOML file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Use a built-in preset (baseline, utility_scale, peak_pricing)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Override the synthetic data seed
    #[arg(long, conflicts_with = "history_in")]
    pub seed: Option<u64>,

    /// Read demand history from a `date,demand_mw` CSV instead of generating it
    #[arg(long, value_name = "PATH")]
    pub history_in: Option<PathBuf>,

    /// Save the demand history used for the run
    #[arg(long, value_name = "PATH")]
    pub history_out: Option<PathBuf>,

    /// Write the forecast + PnL table as CSV
    #[arg(long, value_name = "PATH")]
    pub export_out: Option<PathBuf>,

    /// Write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,
}

impl CliOptions {
    /// Preset to load when no config file is given.
    pub fn preset_or_default(&self) -> &str {
        self.preset.as_deref().unwrap_or("baseline")
    }
}
