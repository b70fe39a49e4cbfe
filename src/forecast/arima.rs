//! ARIMA(p,d,q) estimation by conditional sum of squares.
//!
//! The differenced series `w` is modelled as
//!
//! ```text
//! w(t) = c + φ1·w(t-1) + … + φp·w(t-p) + e(t) + θ1·e(t-1) + … + θq·e(t-q)
//! ```
//!
//! Residuals are computed conditionally on the first `p` values (pre-sample
//! shocks are zero) and the sum of their squares is minimised with a damped
//! Gauss-Newton (Levenberg-Marquardt) iteration.
//!
//! The solver works on unconstrained values that map to AR and MA
//! coefficients through partial autocorrelations in (-1, 1), so every
//! iterate has a stationary AR polynomial and an invertible MA polynomial.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Initial damping factor for the solver.
const LAMBDA_INIT: f64 = 1e-3;
/// Damping above which no descent step is left and the fit is accepted as-is.
const LAMBDA_MAX: f64 = 1e12;
/// Damping floor; keeps rank-deficient normal equations well conditioned.
const LAMBDA_MIN: f64 = 1e-10;
/// SSE, relative to the sum of squares of the data, treated as an exact fit.
const EXACT_FIT: f64 = 1e-20;
/// Relative step used for finite-difference derivatives.
const FD_STEP: f64 = 1e-6;

/// ARIMA model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// Autoregressive order.
    pub p: usize,
    /// Differencing order.
    pub d: usize,
    /// Moving-average order.
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Smallest history length accepted for this order (`p + d + q + 1`).
    pub fn min_observations(&self) -> usize {
        self.p + self.d + self.q + 1
    }

    /// Number of estimated coefficients: constant, AR and MA terms.
    pub fn n_params(&self) -> usize {
        1 + self.p + self.q
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Stopping rules for the least-squares solver.
///
/// The search ends as soon as any one test passes. Exhausting
/// `max_iterations` first is a [`PipelineError::NonConvergence`].
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Relative SSE improvement at which an accepted step ends the search.
    pub tolerance: f64,
    /// Step length relative to the parameter norm.
    pub step_tolerance: f64,
    /// Largest cosine between the residuals and any Jacobian column.
    pub gradient_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
            step_tolerance: 1e-8,
            gradient_tolerance: 1e-8,
        }
    }
}

/// A fitted ARIMA model, ready to forecast beyond the end of its history.
#[derive(Debug, Clone)]
pub struct FittedArima {
    pub order: ArimaOrder,
    /// Constant term on the differenced scale.
    pub constant: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Residual variance, degrees-of-freedom corrected where possible.
    pub sigma2: f64,
    /// Gaussian conditional log-likelihood at the optimum.
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Solver iterations spent, including rejected steps.
    pub iterations: usize,
    /// Number of conditional residuals the fit was scored on.
    pub n_residuals: usize,
    /// Last value of each differencing level `0..d`.
    level_tails: Vec<f64>,
    /// Last `p` values of the differenced series.
    diff_tail: Vec<f64>,
    /// Last `q` residuals.
    resid_tail: Vec<f64>,
}

/// Point forecasts with their standard errors, on the original scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPath {
    pub point: Vec<f64>,
    pub std_err: Vec<f64>,
}

/// Fits an ARIMA model to `values` treated as an evenly spaced series.
///
/// # Errors
///
/// - [`PipelineError::InsufficientData`] if `values.len() < p + d + q + 1`.
/// - [`PipelineError::NonConvergence`] if the SSE is not finite or the
///   solver exhausts `settings.max_iterations`.
pub fn fit(values: &[f64], order: ArimaOrder, settings: &SolverSettings) -> Result<FittedArima> {
    let required = order.min_observations();
    if values.len() < required {
        return Err(PipelineError::InsufficientData {
            p: order.p,
            d: order.d,
            q: order.q,
            required,
            actual: values.len(),
        });
    }

    let mut level_tails = Vec::with_capacity(order.d);
    let mut w = values.to_vec();
    for _ in 0..order.d {
        level_tails.push(w[w.len() - 1]);
        w = difference(&w);
    }

    let (p, q) = (order.p, order.q);
    // unconstrained: constant, then AR and MA partial autocorrelations
    let mut params = vec![0.0; order.n_params()];
    params[0] = mean(&w);

    let mut resid = css_residuals(&w, &params, p, q);
    let mut sse = sum_sq(&resid);
    if !sse.is_finite() {
        return Err(PipelineError::NonConvergence(format!(
            "{order}: initial sum of squares is not finite"
        )));
    }

    let sse_floor = EXACT_FIT * sum_sq(&w);
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < settings.max_iterations {
        iterations += 1;

        let jac = jacobian(&w, &params, p, q);
        let e = DVector::from_column_slice(&resid);
        let jte = jac.transpose() * &e;
        let at_optimum = sse <= sse_floor
            || max_cosine(&jac, &jte, e.norm()) <= settings.gradient_tolerance;
        if at_optimum {
            converged = true;
            break;
        }

        let jtj = jac.transpose() * &jac;
        let mut damped = jtj.clone();
        for i in 0..params.len() {
            damped[(i, i)] += lambda * (jtj[(i, i)] + 1.0);
        }
        let Some(chol) = damped.cholesky() else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                converged = true;
                break;
            }
            continue;
        };
        let step = chol.solve(&(-jte));

        let params_norm = DVector::from_column_slice(&params).norm();
        if step.norm() <= settings.step_tolerance * (params_norm + settings.step_tolerance) {
            converged = true;
            break;
        }

        let candidate: Vec<f64> = params.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
        let cand_resid = css_residuals(&w, &candidate, p, q);
        let cand_sse = sum_sq(&cand_resid);

        if cand_sse.is_finite() && cand_sse <= sse {
            let improvement = sse - cand_sse;
            let previous = sse;
            params = candidate;
            resid = cand_resid;
            sse = cand_sse;
            lambda = (lambda / 10.0).max(LAMBDA_MIN);
            if improvement <= settings.tolerance * (previous + settings.tolerance) {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                converged = true;
                break;
            }
        }
    }

    if !converged {
        return Err(PipelineError::NonConvergence(format!(
            "{order}: no convergence after {iterations} iterations (sse = {sse:.6e})"
        )));
    }
    debug!(%order, iterations, sse, "ARIMA fit converged");

    let (constant, ar, ma) = coefficients(&params, p, q);
    let n = resid.len();
    let k = order.n_params();
    let dof = if n > k { n - k } else { n };
    let sigma2 = sse / dof as f64;
    let sigma2_mle = (sse / n as f64).max(f64::MIN_POSITIVE);
    let n_f = n as f64;
    let log_likelihood = -0.5 * n_f * (1.0 + (2.0 * std::f64::consts::PI * sigma2_mle).ln());
    let k_f = k as f64;

    Ok(FittedArima {
        order,
        constant,
        ar,
        ma,
        sigma2,
        log_likelihood,
        aic: -2.0 * log_likelihood + 2.0 * k_f,
        bic: -2.0 * log_likelihood + k_f * n_f.ln(),
        iterations,
        n_residuals: n,
        level_tails,
        diff_tail: w[w.len() - p..].to_vec(),
        resid_tail: resid[resid.len() - q..].to_vec(),
    })
}

impl FittedArima {
    /// Forecasts `horizon` steps past the end of the fitted history.
    ///
    /// Future shocks are set to zero. Standard errors come from the
    /// ψ-weights of `φ(B)(1-B)^d` and the residual variance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NonConvergence`] if any forecast or
    /// standard error is not finite.
    pub fn forecast(&self, horizon: usize) -> Result<ForecastPath> {
        let (p, q) = (self.order.p, self.order.q);

        let mut w_ext = self.diff_tail.clone();
        let mut e_ext = self.resid_tail.clone();
        for _ in 0..horizon {
            let mut f = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                f += phi * w_ext[w_ext.len() - 1 - i];
            }
            for (j, theta) in self.ma.iter().enumerate() {
                f += theta * e_ext[e_ext.len() - 1 - j];
            }
            w_ext.push(f);
            e_ext.push(0.0);
        }
        debug_assert_eq!(e_ext.len(), q + horizon);

        let mut point = w_ext[p..].to_vec();
        for &tail in self.level_tails.iter().rev() {
            point = integrate(&point, tail);
        }

        let psi = psi_weights(&self.ar, &self.ma, self.order.d, horizon);
        let sigma = self.sigma2.sqrt();
        let mut acc = 0.0;
        let std_err: Vec<f64> = psi
            .iter()
            .map(|w| {
                acc += w * w;
                sigma * acc.sqrt()
            })
            .collect();

        if point.iter().chain(std_err.iter()).any(|v| !v.is_finite()) {
            return Err(PipelineError::NonConvergence(format!(
                "{}: forecast diverged over a {horizon}-step horizon",
                self.order
            )));
        }
        Ok(ForecastPath { point, std_err })
    }
}

/// First difference of a series; one element shorter than the input.
pub fn difference(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Cumulative sum starting from `start`; the inverse of [`difference`].
pub fn integrate(diff: &[f64], start: f64) -> Vec<f64> {
    let mut level = start;
    diff.iter()
        .map(|d| {
            level += d;
            level
        })
        .collect()
}

/// ψ-weights `ψ0..ψ(h-1)` of the MA(∞) form of an ARIMA model.
pub fn psi_weights(ar: &[f64], ma: &[f64], d: usize, horizon: usize) -> Vec<f64> {
    // coefficients of φ(B)(1-B)^d as a polynomial in B
    let mut poly = Vec::with_capacity(ar.len() + 1);
    poly.push(1.0);
    poly.extend(ar.iter().map(|phi| -phi));
    for _ in 0..d {
        let mut next = vec![0.0; poly.len() + 1];
        for (i, c) in poly.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        poly = next;
    }
    let phi_star: Vec<f64> = poly.iter().skip(1).map(|c| -c).collect();

    let mut psi = Vec::with_capacity(horizon);
    for j in 0..horizon {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut v = ma.get(j - 1).copied().unwrap_or(0.0);
        for (i, phi) in phi_star.iter().enumerate().take(j) {
            v += phi * psi[j - 1 - i];
        }
        psi.push(v);
    }
    psi
}

/// Maps unconstrained values to the coefficients `a` of a stationary
/// polynomial `1 - a1·B - … - ak·B^k` (Durbin-Levinson on partial
/// autocorrelations `x / sqrt(1 + x²)`).
fn constrain_stationary(free: &[f64]) -> Vec<f64> {
    let mut coeffs: Vec<f64> = Vec::with_capacity(free.len());
    for &x in free {
        let r = x / x.hypot(1.0);
        let prev = coeffs.clone();
        let k = prev.len();
        for j in 0..k {
            coeffs[j] = prev[j] - r * prev[k - 1 - j];
        }
        coeffs.push(r);
    }
    coeffs
}

/// Constant, AR and MA coefficients for an unconstrained parameter vector.
fn coefficients(params: &[f64], p: usize, q: usize) -> (f64, Vec<f64>, Vec<f64>) {
    let ar = constrain_stationary(&params[1..1 + p]);
    // θ(B) = 1 + θ1·B + … is invertible when -θ is a stationary AR polynomial
    let ma = constrain_stationary(&params[1 + p..1 + p + q])
        .into_iter()
        .map(|a| -a)
        .collect();
    (params[0], ar, ma)
}

fn css_residuals(w: &[f64], params: &[f64], p: usize, q: usize) -> Vec<f64> {
    let (c, phi, theta) = coefficients(params, p, q);

    let mut e = vec![0.0; w.len()];
    for t in p..w.len() {
        let mut pred = c;
        for (i, a) in phi.iter().enumerate() {
            pred += a * w[t - 1 - i];
        }
        for (j, b) in theta.iter().enumerate() {
            if t > j {
                pred += b * e[t - 1 - j];
            }
        }
        e[t] = w[t] - pred;
    }
    e.split_off(p)
}

/// Largest `|Jⱼᵀe| / (‖Jⱼ‖·‖e‖)` over the Jacobian columns; zero columns
/// carry no gradient.
fn max_cosine(jac: &DMatrix<f64>, jte: &DVector<f64>, e_norm: f64) -> f64 {
    jac.column_iter()
        .zip(jte.iter())
        .map(|(col, g)| {
            let denom = col.norm() * e_norm;
            if denom > 0.0 { g.abs() / denom } else { 0.0 }
        })
        .fold(0.0, f64::max)
}

fn jacobian(w: &[f64], params: &[f64], p: usize, q: usize) -> DMatrix<f64> {
    let rows = w.len() - p;
    let mut jac = DMatrix::zeros(rows, params.len());
    let mut shifted = params.to_vec();
    for j in 0..params.len() {
        let h = FD_STEP * params[j].abs().max(1.0);
        shifted[j] = params[j] + h;
        let up = css_residuals(w, &shifted, p, q);
        shifted[j] = params[j] - h;
        let down = css_residuals(w, &shifted, p, q);
        shifted[j] = params[j];
        for i in 0..rows {
            jac[(i, j)] = (up[i] - down[i]) / (2.0 * h);
        }
    }
    jac
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rand_distr::StandardNormal;

    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = vec![0.0];
        for t in 1..n {
            let eps: f64 = rng.sample(StandardNormal);
            x.push(phi * x[t - 1] + eps);
        }
        x
    }

    #[test]
    fn difference_and_integrate_are_inverse() {
        let data = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        let diff = difference(&data);
        assert_eq!(diff, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&diff), vec![1.0, 1.0, 1.0]);
        assert_eq!(integrate(&diff, 1.0), vec![3.0, 6.0, 10.0, 15.0]);
    }

    #[test]
    fn psi_weights_of_random_walk_are_ones() {
        let psi = psi_weights(&[], &[], 1, 5);
        assert_eq!(psi, vec![1.0; 5]);
    }

    #[test]
    fn psi_weights_of_ar1_decay_geometrically() {
        let psi = psi_weights(&[0.5], &[], 0, 4);
        assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn psi_weights_of_ma1() {
        let psi = psi_weights(&[], &[0.4], 0, 3);
        assert_eq!(psi, vec![1.0, 0.4, 0.0]);
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let data = ar1_series(0.6, 2000, 7);
        let model = fit(&data, ArimaOrder::new(1, 0, 0), &SolverSettings::default())
            .expect("AR(1) fit should converge");
        assert!((model.ar[0] - 0.6).abs() < 0.1, "phi = {}", model.ar[0]);
        assert!(model.constant.abs() < 0.2, "c = {}", model.constant);
        assert!((model.sigma2 - 1.0).abs() < 0.2, "sigma2 = {}", model.sigma2);
    }

    #[test]
    fn constant_only_model_forecasts_mean() {
        let data = vec![4.0, 6.0, 5.0, 5.0, 4.0, 6.0];
        let model = fit(&data, ArimaOrder::new(0, 0, 0), &SolverSettings::default())
            .expect("mean model should converge");
        assert!((model.constant - 5.0).abs() < 1e-9);
        let path = model.forecast(3).expect("forecast");
        for f in &path.point {
            assert!((f - 5.0).abs() < 1e-9);
        }
        // white noise: constant standard error
        assert!((path.std_err[0] - path.std_err[2]).abs() < 1e-12);
    }

    #[test]
    fn random_walk_with_drift_extrapolates_linearly() {
        let data: Vec<f64> = (0..20).map(|t| 10.0 + 2.0 * t as f64).collect();
        let model = fit(&data, ArimaOrder::new(0, 1, 0), &SolverSettings::default())
            .expect("drift model should converge");
        let path = model.forecast(3).expect("forecast");
        let last = data[data.len() - 1];
        for (h, f) in path.point.iter().enumerate() {
            assert!((f - (last + 2.0 * (h + 1) as f64)).abs() < 1e-9);
        }
    }

    #[test]
    fn second_difference_integrates_from_each_level() {
        // quadratic: constant second difference of 2
        let data: Vec<f64> = (0..15).map(|t| (t * t) as f64).collect();
        let model = fit(&data, ArimaOrder::new(0, 2, 0), &SolverSettings::default())
            .expect("quadratic model should converge");
        let path = model.forecast(2).expect("forecast");
        assert!((path.point[0] - 225.0).abs() < 1e-6);
        assert!((path.point[1] - 256.0).abs() < 1e-6);
    }

    #[test]
    fn standard_errors_grow_with_horizon_when_integrated() {
        let data = ar1_series(0.5, 300, 3);
        let model = fit(&data, ArimaOrder::new(1, 1, 1), &SolverSettings::default())
            .expect("fit should converge");
        let path = model.forecast(10).expect("forecast");
        for pair in path.std_err.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn too_short_history_is_rejected() {
        let err = fit(&[1.0, 2.0, 3.0], ArimaOrder::new(1, 1, 1), &SolverSettings::default());
        assert!(matches!(
            err,
            Err(PipelineError::InsufficientData {
                required: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn iteration_cap_surfaces_non_convergence() {
        let data = ar1_series(0.7, 400, 11);
        let settings = SolverSettings {
            max_iterations: 1,
            ..SolverSettings::default()
        };
        let err = fit(&data, ArimaOrder::new(2, 0, 2), &settings);
        assert!(matches!(err, Err(PipelineError::NonConvergence(_))));
    }

    #[test]
    fn fit_is_deterministic() {
        let data = ar1_series(0.4, 250, 5);
        let order = ArimaOrder::new(2, 1, 1);
        let a = fit(&data, order, &SolverSettings::default()).expect("fit a");
        let b = fit(&data, order, &SolverSettings::default()).expect("fit b");
        assert_eq!(a.ar, b.ar);
        assert_eq!(a.ma, b.ma);
        assert_eq!(a.constant, b.constant);
        assert_eq!(a.forecast(5).ok(), b.forecast(5).ok());
    }

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| 100.0 + 5.0 * rng.sample::<f64, _>(StandardNormal)).collect()
    }

    #[test]
    fn mapped_coefficients_stay_stationary() {
        let a = constrain_stationary(&[40.0]);
        assert!(a[0].abs() < 1.0);
        assert_eq!(constrain_stationary(&[0.0, 0.0]), vec![0.0, 0.0]);

        // AR(2) stationarity triangle
        for free in [[3.0, -2.0], [-5.0, 0.5], [1e6, 1e6], [-1e6, -1e6]] {
            let a = constrain_stationary(&free);
            assert!(a[1].abs() < 1.0, "{a:?}");
            assert!(a[0] + a[1] < 1.0, "{a:?}");
            assert!(a[1] - a[0] < 1.0, "{a:?}");
        }
    }

    #[test]
    fn overdifferenced_noise_fits_an_invertible_ma() {
        // differenced white noise is MA(1) with θ = -1 on the boundary
        for seed in 0..5 {
            let data = white_noise(60, seed);
            let model = fit(&data, ArimaOrder::new(0, 1, 1), &SolverSettings::default())
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            assert!(model.ma[0] > -1.0 && model.ma[0] < 0.0, "theta = {}", model.ma[0]);
            assert!(model.iterations < 200);
        }
    }

    #[test]
    fn mixed_models_converge_on_short_histories() {
        for seed in 0..5 {
            let data = white_noise(60, seed);
            for order in [
                ArimaOrder::new(1, 1, 1),
                ArimaOrder::new(2, 1, 2),
                ArimaOrder::new(1, 0, 1),
                ArimaOrder::new(0, 0, 2),
            ] {
                let model = fit(&data, order, &SolverSettings::default())
                    .unwrap_or_else(|e| panic!("seed {seed} {order}: {e}"));
                let path = model.forecast(10).expect("forecast");
                assert!(path.point.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn minimum_length_fits_converge() {
        let data = white_noise(40, 9);
        for p in 0..=2 {
            for d in 0..=2 {
                for q in 0..=2 {
                    let order = ArimaOrder::new(p, d, q);
                    let n = order.min_observations();
                    let result = fit(&data[..n], order, &SolverSettings::default());
                    assert!(result.is_ok(), "{order} on {n} points: {:?}", result.err());
                }
            }
        }
    }

    #[test]
    fn order_display_and_minimum() {
        let order = ArimaOrder::new(2, 1, 2);
        assert_eq!(order.to_string(), "ARIMA(2,1,2)");
        assert_eq!(order.min_observations(), 6);
        assert_eq!(order.n_params(), 5);
    }
}
