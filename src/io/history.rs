//! Demand history persisted as a `date,demand_mw` CSV file.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::data::{Observation, TimeSeriesStore};
use crate::error::Result;

/// Column header for stored history.
pub const HEADER: &str = "date,demand_mw";

/// Saves the store, replacing any existing file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_history(store: &TimeSeriesStore, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_history(store, io::BufWriter::new(file))
}

/// Writes one row per observation in date order.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_history(store: &TimeSeriesStore, writer: impl Write) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for obs in store.observations() {
        wtr.serialize(obs)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Loads history from `path`.
///
/// When `fill_gaps` is set, rows are sorted and missing days interpolated;
/// otherwise the file must already be ordered and gap-free.
///
/// # Errors
///
/// Returns an I/O, CSV or store validation error.
pub fn load_history(path: &Path, fill_gaps: bool) -> Result<TimeSeriesStore> {
    let file = File::open(path)?;
    read_history(io::BufReader::new(file), fill_gaps)
}

/// Reads history from any reader. See [`load_history`].
///
/// # Errors
///
/// Returns a CSV or store validation error.
pub fn read_history(reader: impl Read, fill_gaps: bool) -> Result<TimeSeriesStore> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut observations = Vec::new();
    for record in rdr.deserialize::<Observation>() {
        observations.push(record?);
    }
    let store = if fill_gaps {
        TimeSeriesStore::fill_gaps(observations)?
    } else {
        TimeSeriesStore::new(observations)?
    };
    Ok(store)
}
