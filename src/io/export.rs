//! CSV export of the combined forecast and PnL table.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::forecast::ForecastResult;
use crate::trade::PnLSeries;

/// Column header for the forecast + PnL export.
pub const HEADER: &str = "date,point_forecast,lower_bound,upper_bound,pnl_value";

/// One horizon day of the export table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPnlRow {
    pub date: NaiveDate,
    pub point_forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub pnl_value: f64,
}

impl fmt::Display for ForecastPnlRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | forecast {:>9.2} MW [{:>9.2}, {:>9.2}] | pnl {:>11.2}",
            self.date, self.point_forecast, self.lower_bound, self.upper_bound, self.pnl_value
        )
    }
}

/// Joins a forecast and its PnL series into one row per horizon day.
///
/// # Errors
///
/// Returns [`PipelineError::Alignment`] if the PnL series does not have one
/// point per forecast day.
pub fn forecast_pnl_rows(forecast: &ForecastResult, pnl: &PnLSeries) -> Result<Vec<ForecastPnlRow>> {
    if pnl.len() != forecast.horizon_length() {
        return Err(PipelineError::Alignment {
            series: "pnl",
            expected: forecast.horizon_length(),
            actual: pnl.len(),
        });
    }
    Ok(pnl
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| ForecastPnlRow {
            date: p.date,
            point_forecast: forecast.point_forecast()[i],
            lower_bound: forecast.lower_bound()[i],
            upper_bound: forecast.upper_bound()[i],
            pnl_value: p.pnl_value,
        })
        .collect())
}

/// Exports forecast + PnL rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_forecast_pnl(rows: &[ForecastPnlRow], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_forecast_pnl(rows, buf)
}

/// Writes forecast + PnL rows as CSV to any writer.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_forecast_pnl(rows: &[ForecastPnlRow], writer: impl Write) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parses rows previously written by [`write_forecast_pnl`].
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] on a malformed header or row.
pub fn read_forecast_pnl(reader: impl Read) -> Result<Vec<ForecastPnlRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize::<ForecastPnlRow>() {
        rows.push(record?);
    }
    Ok(rows)
}
