//! demand-risk entry point: CLI wiring and config-driven pipeline run.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use demand_risk::config::PipelineConfig;
use demand_risk::io::export::export_forecast_pnl;
use demand_risk::io::history::save_history;
use demand_risk::pipeline::run_pipeline;
use demand_risk::report::RunSummary;

use crate::cli::CliOptions;

fn load_config(cli: &CliOptions) -> Result<PipelineConfig> {
    // --config takes priority, then --preset, then baseline
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::from_preset(cli.preset_or_default())?,
    };

    if let Some(seed) = cli.seed {
        cfg.data.seed = seed;
    }
    if let Some(path) = &cli.history_in {
        cfg.data.history_csv = Some(path.clone());
    }

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("invalid configuration ({} error(s))", errors.len());
    }
    Ok(cfg)
}

fn run(cli: &CliOptions) -> Result<()> {
    let cfg = load_config(cli)?;
    let out = run_pipeline(&cfg).context("pipeline run failed")?;
    let rows = out.rows()?;

    for r in &rows {
        println!("{r}");
    }
    let summary = RunSummary::from_output(&out);
    println!("\n{summary}");

    if let Some(path) = &cli.history_out {
        save_history(&out.store, path)
            .with_context(|| format!("failed to write history to {}", path.display()))?;
        info!(path = %path.display(), "history written");
    }
    if let Some(path) = &cli.export_out {
        export_forecast_pnl(&rows, path)
            .with_context(|| format!("failed to write CSV to {}", path.display()))?;
        info!(path = %path.display(), "forecast and PnL written");
    }
    if let Some(path) = &cli.summary_json {
        summary
            .write_json(path)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = CliOptions::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
