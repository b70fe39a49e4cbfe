//! Validated daily demand history.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One daily demand reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar day of the reading.
    pub date: NaiveDate,
    /// Average demand over the day (MW, non-negative).
    pub demand_mw: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, demand_mw: f64) -> Self {
        Self { date, demand_mw }
    }
}

/// Ordered, gap-free sequence of daily observations.
///
/// The only way to build a store is through [`TimeSeriesStore::new`] (strict)
/// or [`TimeSeriesStore::fill_gaps`] (interpolating), so every instance
/// satisfies the forecaster's input contract.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use demand_risk::data::{Observation, TimeSeriesStore};
///
/// let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let store = TimeSeriesStore::new(vec![
///     Observation::new(d0, 100.0),
///     Observation::new(d1, 102.5),
/// ])
/// .unwrap();
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.last_date(), d1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesStore {
    observations: Vec<Observation>,
}

impl TimeSeriesStore {
    /// Builds a store, rejecting empty, unordered, duplicated, gapped or
    /// negative input.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] found while scanning in order.
    pub fn new(observations: Vec<Observation>) -> Result<Self, StoreError> {
        if observations.is_empty() {
            return Err(StoreError::Empty);
        }
        for obs in &observations {
            check_demand(obs)?;
        }
        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            let step = (next - prev).num_days();
            if step == 0 {
                return Err(StoreError::DuplicateDate(next));
            }
            if step < 0 {
                return Err(StoreError::OutOfOrder {
                    previous: prev,
                    date: next,
                });
            }
            if step > 1 {
                return Err(StoreError::Gap {
                    after: prev,
                    before: next,
                    missing_days: step - 1,
                });
            }
        }
        Ok(Self { observations })
    }

    /// Builds a store after sorting by date and linearly interpolating any
    /// missing calendar days.
    ///
    /// Duplicates and invalid demand values are still rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for empty input, duplicate dates, or invalid demand.
    pub fn fill_gaps(mut observations: Vec<Observation>) -> Result<Self, StoreError> {
        if observations.is_empty() {
            return Err(StoreError::Empty);
        }
        observations.sort_by_key(|o| o.date);

        let mut filled = Vec::with_capacity(observations.len());
        filled.push(observations[0]);
        for next in observations.iter().skip(1) {
            check_demand(next)?;
            let prev = *filled.last().ok_or(StoreError::Empty)?;
            let step = (next.date - prev.date).num_days();
            if step == 0 {
                return Err(StoreError::DuplicateDate(next.date));
            }
            for k in 1..step {
                let w = k as f64 / step as f64;
                let date = prev.date + Days::new(k as u64);
                let demand_mw = prev.demand_mw + w * (next.demand_mw - prev.demand_mw);
                filled.push(Observation::new(date, demand_mw));
            }
            filled.push(*next);
        }
        let interpolated = filled.len() - observations.len();
        if interpolated > 0 {
            tracing::debug!(interpolated, "filled missing days in history");
        }
        Self::new(filled)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Demand values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.demand_mw).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`; an empty store cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.observations[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.observations[self.observations.len() - 1].date
    }

    /// Mean demand over the whole history (MW).
    pub fn mean_demand(&self) -> f64 {
        self.observations.iter().map(|o| o.demand_mw).sum::<f64>() / self.len() as f64
    }
}

fn check_demand(obs: &Observation) -> Result<(), StoreError> {
    if !obs.demand_mw.is_finite() || obs.demand_mw < 0.0 {
        return Err(StoreError::InvalidDemand {
            date: obs.date,
            value: obs.demand_mw,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date")
    }

    #[test]
    fn accepts_consecutive_days() {
        let store = TimeSeriesStore::new(vec![
            Observation::new(day(1), 10.0),
            Observation::new(day(2), 11.0),
            Observation::new(day(3), 12.0),
        ]);
        let store = store.expect("consecutive history should be valid");
        assert_eq!(store.len(), 3);
        assert_eq!(store.values(), vec![10.0, 11.0, 12.0]);
        assert_eq!(store.first_date(), day(1));
        assert_eq!(store.last_date(), day(3));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(TimeSeriesStore::new(Vec::new()), Err(StoreError::Empty));
    }

    #[test]
    fn rejects_duplicate_date() {
        let err = TimeSeriesStore::new(vec![
            Observation::new(day(1), 10.0),
            Observation::new(day(1), 11.0),
        ]);
        assert_eq!(err, Err(StoreError::DuplicateDate(day(1))));
    }

    #[test]
    fn rejects_out_of_order() {
        let err = TimeSeriesStore::new(vec![
            Observation::new(day(2), 10.0),
            Observation::new(day(1), 11.0),
        ]);
        assert!(matches!(err, Err(StoreError::OutOfOrder { .. })));
    }

    #[test]
    fn rejects_gap() {
        let err = TimeSeriesStore::new(vec![
            Observation::new(day(1), 10.0),
            Observation::new(day(4), 11.0),
        ]);
        assert_eq!(
            err,
            Err(StoreError::Gap {
                after: day(1),
                before: day(4),
                missing_days: 2,
            })
        );
    }

    #[test]
    fn rejects_negative_demand() {
        let err = TimeSeriesStore::new(vec![Observation::new(day(1), -1.0)]);
        assert!(matches!(err, Err(StoreError::InvalidDemand { .. })));
    }

    #[test]
    fn fill_gaps_interpolates_linearly() {
        let store = TimeSeriesStore::fill_gaps(vec![
            Observation::new(day(4), 40.0),
            Observation::new(day(1), 10.0),
        ])
        .expect("gaps should be filled");
        assert_eq!(store.len(), 4);
        let values = store.values();
        assert!((values[1] - 20.0).abs() < 1e-12);
        assert!((values[2] - 30.0).abs() < 1e-12);
        assert_eq!(store.last_date(), day(4));
    }

    #[test]
    fn fill_gaps_still_rejects_duplicates() {
        let err = TimeSeriesStore::fill_gaps(vec![
            Observation::new(day(1), 10.0),
            Observation::new(day(1), 12.0),
        ]);
        assert_eq!(err, Err(StoreError::DuplicateDate(day(1))));
    }
}
