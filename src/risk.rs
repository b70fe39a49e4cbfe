//! Historical-simulation Value-at-Risk on a simulated PnL series.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::trade::PnLSeries;

/// Smallest sample a quantile is estimated from.
pub const MIN_SAMPLE: usize = 2;

/// Guard that keeps `(1 - cl) * N` from rounding up past an exact integer.
const RANK_EPSILON: f64 = 1e-9;

/// A VaR estimate.
///
/// `value` is the signed PnL quantile (losses are negative): the loss not
/// exceeded with probability `confidence_level` over the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VaRResult {
    pub confidence_level: f64,
    /// Number of days in the PnL horizon.
    pub horizon_days: usize,
    /// Signed empirical quantile of daily PnL.
    pub value: f64,
    /// 1-based rank of `value` in the ascending PnL sample.
    pub rank: usize,
    pub sample_size: usize,
}

impl VaRResult {
    /// Loss magnitude (positive), zero if the quantile is a gain.
    pub fn loss(&self) -> f64 {
        (-self.value).max(0.0)
    }
}

impl fmt::Display for VaRResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0}% VaR over {} days: {:.2} (rank {} of {})",
            self.confidence_level * 100.0,
            self.horizon_days,
            self.value,
            self.rank,
            self.sample_size
        )
    }
}

/// Rank of the VaR quantile: `ceil((1 - cl) * n)`, clamped to `[1, n]`.
pub fn quantile_rank(confidence_level: f64, n: usize) -> usize {
    let raw = (1.0 - confidence_level) * n as f64;
    let rank = (raw - RANK_EPSILON).ceil().max(1.0) as usize;
    rank.min(n)
}

/// Historical-simulation VaR of `pnl` at `confidence_level`.
///
/// Sorts PnL ascending and returns the value at rank
/// `ceil((1 - confidence_level) * N)`.
///
/// # Errors
///
/// - [`PipelineError::InsufficientSample`] if the series has fewer than two points.
/// - [`PipelineError::InvalidInput`] if `confidence_level` is outside (0, 1)
///   or a PnL value is not finite.
pub fn value_at_risk(pnl: &PnLSeries, confidence_level: f64) -> Result<VaRResult> {
    let sorted = sorted_sample(pnl, confidence_level)?;
    let rank = quantile_rank(confidence_level, sorted.len());
    let result = VaRResult {
        confidence_level,
        horizon_days: pnl.len(),
        value: sorted[rank - 1],
        rank,
        sample_size: sorted.len(),
    };
    info!(
        confidence_level,
        value = result.value,
        rank,
        "value-at-risk estimated"
    );
    Ok(result)
}

/// Mean of the `rank` worst outcomes, using the same rank rule as
/// [`value_at_risk`].
///
/// # Errors
///
/// Same as [`value_at_risk`].
pub fn expected_shortfall(pnl: &PnLSeries, confidence_level: f64) -> Result<f64> {
    let sorted = sorted_sample(pnl, confidence_level)?;
    let rank = quantile_rank(confidence_level, sorted.len());
    Ok(sorted[..rank].iter().sum::<f64>() / rank as f64)
}

fn sorted_sample(pnl: &PnLSeries, confidence_level: f64) -> Result<Vec<f64>> {
    if pnl.len() < MIN_SAMPLE {
        return Err(PipelineError::InsufficientSample {
            required: MIN_SAMPLE,
            actual: pnl.len(),
        });
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(PipelineError::InvalidInput(format!(
            "confidence_level must be in (0, 1), got {confidence_level}"
        )));
    }
    let mut values = pnl.values();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::InvalidInput(
            "PnL series contains non-finite values".into(),
        ));
    }
    values.sort_by(f64::total_cmp);
    Ok(values)
}
