//! Demand history: validated storage and synthetic generation.

pub mod store;
/// Seeded synthetic demand generator.
pub mod synthetic;

pub use store::{Observation, TimeSeriesStore};
pub use synthetic::DemandGenerator;
