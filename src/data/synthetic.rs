use chrono::{Datelike, Days, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::Normal;

use crate::data::store::Observation;

/// A synthetic generator that models daily electricity demand.
///
/// `DemandGenerator` creates a seasonal sinusoidal demand pattern keyed on
/// the day of the year, adds a linear trend across the generated window,
/// and perturbs each day with Gaussian noise.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use demand_risk::data::synthetic::DemandGenerator;
///
/// let generator = DemandGenerator::new(
///     500.0, // base_mw - average demand
///     40.0,  // amplitude_mw - seasonal swing
///     365.0, // period_days - one cycle per year
///     0.0,   // phase_rad
///     5.0,   // trend_mw - total drift over the window
///     8.0,   // noise_std
///     42,    // seed
/// );
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let history = generator.generate(start, 730);
/// assert_eq!(history.len(), 730);
/// ```
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    /// Baseline demand in megawatts
    pub base_mw: f64,

    /// Amplitude of the seasonal variation in megawatts
    pub amplitude_mw: f64,

    /// Length of one seasonal cycle in days
    pub period_days: f64,

    /// Phase offset of the seasonal pattern in radians
    pub phase_rad: f64,

    /// Total linear drift from the first to the last generated day (MW)
    pub trend_mw: f64,

    /// Standard deviation of the Gaussian noise in megawatts
    pub noise_std: f64,

    /// Seed for the noise generator
    pub seed: u64,
}

impl DemandGenerator {
    /// Creates a new demand generator with the specified parameters.
    ///
    /// Non-positive `period_days` is treated as one day; negative
    /// `noise_std` is treated as zero.
    pub fn new(
        base_mw: f64,
        amplitude_mw: f64,
        period_days: f64,
        phase_rad: f64,
        trend_mw: f64,
        noise_std: f64,
        seed: u64,
    ) -> Self {
        Self {
            base_mw,
            amplitude_mw,
            period_days: if period_days > 0.0 { period_days } else { 1.0 },
            phase_rad,
            trend_mw,
            noise_std: noise_std.max(0.0),
            seed,
        }
    }

    /// Noise-free demand for one day.
    ///
    /// `index` is the position within the generated window and drives the
    /// trend; `date` drives the seasonal term.
    pub fn expected_mw(&self, date: NaiveDate, index: usize, days: usize) -> f64 {
        let angle =
            2.0 * std::f64::consts::PI * f64::from(date.ordinal()) / self.period_days + self.phase_rad;
        let trend = if days > 1 {
            self.trend_mw * index as f64 / (days - 1) as f64
        } else {
            0.0
        };
        self.base_mw + self.amplitude_mw * angle.sin() + trend
    }

    /// Generates `days` consecutive observations starting at `start`.
    ///
    /// Output is deterministic for a fixed seed. Demand is clamped at zero.
    pub fn generate(&self, start: NaiveDate, days: usize) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.noise_std).ok();

        let mut out = Vec::with_capacity(days);
        for i in 0..days {
            let date = start + Days::new(i as u64);
            let eps = match noise {
                Some(dist) if self.noise_std > 0.0 => rng.sample(dist),
                _ => 0.0,
            };
            let mw = self.expected_mw(date, i, days) + eps;
            out.push(Observation::new(date, mw.max(0.0))); // no negative demand
        }
        out
    }
}
