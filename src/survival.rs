//! proportional-hazards survival estimation
//!
//! a Cox model fit by Newton-Raphson on the log partial likelihood, with a
//! Breslow baseline cumulative hazard so each patient gets an individualized
//! curve over the observed follow-up times. fit failures never propagate out
//! of training: the orchestrator absorbs them and the artifact simply carries
//! no survival model.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::{PatientRecord, SurvivalData};
use crate::error::{EngineError, Result};
use crate::linalg::solve_linear_system;

/// hard floor on usable rows; below this no survival model is fit at all
pub const MIN_SURVIVAL_ROWS: usize = 10;

/// variance below this marks a covariate as constant across the fit subset
const ZERO_VARIANCE: f64 = 1e-12;

/// fixed projection horizons, in days
pub const ONE_YEAR_DAYS: f64 = 365.0;
pub const THREE_YEAR_DAYS: f64 = 1095.0;
pub const FIVE_YEAR_DAYS: f64 = 1825.0;

/// where the time-to-event values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// primary recorded follow-up duration
    Recorded,
    /// derived from diagnosis and last-contact dates
    DateDerived,
    /// synthesized as a last resort; output is flagged degraded
    Synthesized,
}

/// resolve a time-to-event value per record, falling back per source
///
/// recorded follow-up wins; date differences are used when no durations are
/// recorded at all; synthesized times are demo-quality only and taint every
/// downstream curve with the degraded flag.
pub fn resolve_event_times(cohort: &[PatientRecord], seed: u64) -> (Vec<Option<f64>>, TimeSource) {
    if cohort.iter().any(|r| r.follow_up_days.is_some()) {
        let times = cohort.iter().map(|r| r.follow_up_days).collect();
        return (times, TimeSource::Recorded);
    }

    let any_dates = cohort
        .iter()
        .any(|r| r.diagnosis_date.is_some() && r.last_contact_date.is_some());
    if any_dates {
        let times = cohort
            .iter()
            .map(|r| match (r.diagnosis_date, r.last_contact_date) {
                (Some(diag), Some(last)) => {
                    let days = (last - diag).num_days();
                    if days > 0 {
                        Some(days as f64)
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .collect();
        return (times, TimeSource::DateDerived);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let times = cohort
        .iter()
        .map(|_| Some(rng.gen_range(30.0..3650.0)))
        .collect();
    (times, TimeSource::Synthesized)
}

/// cleaned survival input: rows with usable times, constant covariates dropped
#[derive(Debug, Clone)]
pub struct SurvivalPrep {
    pub data: SurvivalData,
    /// indices into the full standardized feature vector that survived the
    /// zero-variance filter; persisted so scoring projects consistently
    pub kept_columns: Vec<usize>,
    pub degraded: bool,
}

impl SurvivalPrep {
    /// clean the cohort before the Cox fit
    ///
    /// drops rows with missing or non-positive times, then covariates that
    /// are constant across the remaining rows (they break the hazard-ratio
    /// estimation), then enforces the hard row floor.
    pub fn prepare(
        features: ArrayView2<f64>,
        times: &[Option<f64>],
        events: &[bool],
        degraded: bool,
    ) -> Result<Self> {
        if features.nrows() != times.len() || times.len() != events.len() {
            return Err(EngineError::invalid_dimensions(
                "features, times, and events must have the same length",
            ));
        }

        let usable: Vec<usize> = (0..times.len())
            .filter(|&i| matches!(times[i], Some(t) if t.is_finite() && t > 0.0))
            .collect();

        if usable.len() < MIN_SURVIVAL_ROWS {
            return Err(EngineError::insufficient_data(format!(
                "survival fit needs at least {} usable rows, found {}",
                MIN_SURVIVAL_ROWS,
                usable.len()
            )));
        }

        let kept_columns: Vec<usize> = (0..features.ncols())
            .filter(|&j| {
                let n = usable.len() as f64;
                let mean = usable.iter().map(|&i| features[[i, j]]).sum::<f64>() / n;
                let var = usable
                    .iter()
                    .map(|&i| (features[[i, j]] - mean).powi(2))
                    .sum::<f64>()
                    / n;
                var > ZERO_VARIANCE
            })
            .collect();

        if kept_columns.is_empty() {
            return Err(EngineError::insufficient_data(
                "every covariate is constant across the survival subset",
            ));
        }

        let mut matrix = Array2::zeros((usable.len(), kept_columns.len()));
        for (row, &i) in usable.iter().enumerate() {
            for (col, &j) in kept_columns.iter().enumerate() {
                matrix[[row, col]] = features[[i, j]];
            }
        }

        let fit_times: Vec<f64> = usable
            .iter()
            .map(|&i| times[i].expect("usable rows have times"))
            .collect();
        let fit_events: Vec<bool> = usable.iter().map(|&i| events[i]).collect();

        Ok(Self {
            data: SurvivalData::new(fit_times, fit_events, matrix)?,
            kept_columns,
            degraded,
        })
    }
}

/// one point on a survival curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalPoint {
    pub days: f64,
    pub probability: f64,
}

/// individualized survival curve plus fixed-horizon projections
///
/// the horizon fields take the first curve point at or beyond each horizon;
/// when follow-up ends earlier they clamp to the last observed probability,
/// which extrapolates beyond the data - treat late horizons with care when
/// the curve is short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalCurve {
    pub points: Vec<SurvivalPoint>,
    pub one_year: f64,
    pub three_year: f64,
    pub five_year: f64,
    /// true when the model was fit on synthesized follow-up times
    pub degraded: bool,
}

impl SurvivalCurve {
    fn probability_at(points: &[SurvivalPoint], horizon: f64) -> f64 {
        points
            .iter()
            .find(|p| p.days >= horizon)
            .map(|p| p.probability)
            .unwrap_or_else(|| points.last().map(|p| p.probability).unwrap_or(1.0))
    }
}

/// fitted proportional-hazards model: coefficients + Breslow baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalModel {
    coefficients: Vec<f64>,
    kept_columns: Vec<usize>,
    /// evaluation grid: every observed event/censor time, ascending
    grid_days: Vec<f64>,
    /// baseline cumulative hazard at each grid point
    baseline_cumhaz: Vec<f64>,
    degraded: bool,
}

impl SurvivalModel {
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// individualized curve for one standardized feature vector
    ///
    /// the vector is the full canonical one; the model projects the columns
    /// that survived the zero-variance filter at fit time.
    pub fn predict_curve(&self, z: ArrayView1<f64>) -> Result<SurvivalCurve> {
        let max_col = self.kept_columns.iter().copied().max().unwrap_or(0);
        if z.len() <= max_col {
            return Err(EngineError::invalid_dimensions(format!(
                "feature vector has {} entries, model expects at least {}",
                z.len(),
                max_col + 1
            )));
        }

        let mut lp = 0.0;
        for (coef, &col) in self.coefficients.iter().zip(self.kept_columns.iter()) {
            lp += coef * z[col];
        }
        let hazard_ratio = lp.exp();
        if !hazard_ratio.is_finite() {
            return Err(EngineError::numerical(format!(
                "hazard ratio overflow for linear predictor {}",
                lp
            )));
        }

        let mut points = Vec::with_capacity(self.grid_days.len() + 1);
        points.push(SurvivalPoint {
            days: 0.0,
            probability: 1.0,
        });
        for (&day, &cumhaz) in self.grid_days.iter().zip(self.baseline_cumhaz.iter()) {
            points.push(SurvivalPoint {
                days: day,
                probability: (-cumhaz * hazard_ratio).exp(),
            });
        }

        Ok(SurvivalCurve {
            one_year: SurvivalCurve::probability_at(&points, ONE_YEAR_DAYS),
            three_year: SurvivalCurve::probability_at(&points, THREE_YEAR_DAYS),
            five_year: SurvivalCurve::probability_at(&points, FIVE_YEAR_DAYS),
            points,
            degraded: self.degraded,
        })
    }
}

/// Cox proportional-hazards estimator with optional ridge stabilization
#[derive(Debug, Clone)]
pub struct CoxEstimator {
    l2_penalty: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl Default for CoxEstimator {
    fn default() -> Self {
        Self {
            l2_penalty: 0.0,
            max_iterations: 200,
            tolerance: 1e-7,
        }
    }
}

impl CoxEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_l2_penalty(mut self, penalty: f64) -> Self {
        self.l2_penalty = penalty.max(0.0);
        self
    }

    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// fit coefficients and the Breslow baseline on cleaned survival data
    pub fn fit(&self, prep: &SurvivalPrep) -> Result<SurvivalModel> {
        let beta = self.newton_raphson(&prep.data)?;
        let (grid_days, baseline_cumhaz) = breslow_baseline(&prep.data, beta.view())?;

        Ok(SurvivalModel {
            coefficients: beta.to_vec(),
            kept_columns: prep.kept_columns.clone(),
            grid_days,
            baseline_cumhaz,
            degraded: prep.degraded,
        })
    }

    fn newton_raphson(&self, data: &SurvivalData) -> Result<Array1<f64>> {
        let mut beta = Array1::zeros(data.n_features());
        let mut prev_loglik = f64::NEG_INFINITY;

        for iteration in 0..self.max_iterations {
            let (loglik, gradient, hessian) = likelihood_derivatives(data, &beta)?;

            let penalized_loglik = loglik - 0.5 * self.l2_penalty * beta.dot(&beta);
            if (penalized_loglik - prev_loglik).abs() < self.tolerance {
                return Ok(beta);
            }

            if iteration == self.max_iterations - 1 {
                return Err(EngineError::convergence(
                    "Newton-Raphson failed to converge for the Cox model",
                ));
            }

            let penalized_gradient = &gradient - self.l2_penalty * &beta;
            let mut penalized_hessian = hessian.clone();
            for i in 0..beta.len() {
                penalized_hessian[[i, i]] -= self.l2_penalty;
            }

            match solve_linear_system(&penalized_hessian, &penalized_gradient) {
                Ok(step) => {
                    beta = beta.clone() - step;
                }
                Err(_) => {
                    // singular information matrix: fall back to a small ascent step
                    let step_size = 0.01;
                    beta = beta.clone() + step_size * &penalized_gradient;
                }
            }

            if beta.iter().any(|b| !b.is_finite()) {
                return Err(EngineError::convergence(
                    "coefficients diverged during the Cox fit",
                ));
            }

            prev_loglik = penalized_loglik;
        }

        Ok(beta)
    }
}

/// log partial likelihood with gradient and Hessian
fn likelihood_derivatives(
    data: &SurvivalData,
    beta: &Array1<f64>,
) -> Result<(f64, Array1<f64>, Array2<f64>)> {
    let n_features = data.n_features();
    let mut loglik = 0.0;
    let mut gradient = Array1::zeros(n_features);
    let mut hessian = Array2::zeros((n_features, n_features));

    for &event_time in &data.event_times() {
        let events_at_time: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.times()[i] == event_time && data.events()[i])
            .collect();
        let risk_set: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.times()[i] >= event_time)
            .collect();

        if events_at_time.is_empty() || risk_set.is_empty() {
            continue;
        }

        let (log_sum, weighted_mean, weighted_variance) =
            risk_set_statistics(data, beta, &risk_set)?;

        for &event_idx in &events_at_time {
            let event_linear_pred = data.covariates().row(event_idx).dot(beta);
            loglik += event_linear_pred - log_sum;

            let event_covariates = data.covariates().row(event_idx).to_owned();
            gradient += &(&event_covariates - &weighted_mean);
            hessian -= &weighted_variance;
        }
    }

    Ok((loglik, gradient, hessian))
}

/// exp-weighted mean and covariance of covariates within one risk set
fn risk_set_statistics(
    data: &SurvivalData,
    beta: &Array1<f64>,
    risk_set: &[usize],
) -> Result<(f64, Array1<f64>, Array2<f64>)> {
    let n_features = data.n_features();
    let mut risk_sum = 0.0;
    let mut weighted_covariate_sum = Array1::zeros(n_features);
    let mut weighted_outer_sum = Array2::zeros((n_features, n_features));

    for &i in risk_set {
        let linear_pred = data.covariates().row(i).dot(beta);
        let exp_pred = linear_pred.exp();

        if !exp_pred.is_finite() || exp_pred <= 0.0 {
            return Err(EngineError::numerical(format!(
                "invalid exponential prediction: {}",
                exp_pred
            )));
        }

        risk_sum += exp_pred;
        let covariates_i = data.covariates().row(i).to_owned();
        weighted_covariate_sum += &(exp_pred * &covariates_i);

        for j in 0..n_features {
            for k in 0..n_features {
                weighted_outer_sum[[j, k]] += exp_pred * covariates_i[j] * covariates_i[k];
            }
        }
    }

    if risk_sum <= 0.0 {
        return Err(EngineError::numerical("risk set sum is non-positive"));
    }

    let log_sum = risk_sum.ln();
    let weighted_mean = &weighted_covariate_sum / risk_sum;

    let mut weighted_variance = weighted_outer_sum / risk_sum;
    for i in 0..n_features {
        for j in 0..n_features {
            weighted_variance[[i, j]] -= weighted_mean[i] * weighted_mean[j];
        }
    }

    Ok((log_sum, weighted_mean, weighted_variance))
}

/// Breslow baseline cumulative hazard, evaluated over the observed-time grid
fn breslow_baseline(data: &SurvivalData, beta: ArrayView1<f64>) -> Result<(Vec<f64>, Vec<f64>)> {
    let exp_preds: Vec<f64> = (0..data.n_samples())
        .map(|i| data.covariates().row(i).dot(&beta).exp())
        .collect();
    if exp_preds.iter().any(|p| !p.is_finite()) {
        return Err(EngineError::numerical(
            "hazard ratio overflow while computing the baseline hazard",
        ));
    }

    // hazard increments at each unique event time
    let event_times = data.event_times();
    let mut increments = Vec::with_capacity(event_times.len());
    for &event_time in &event_times {
        let d_k = (0..data.n_samples())
            .filter(|&i| data.times()[i] == event_time && data.events()[i])
            .count() as f64;
        let denom: f64 = (0..data.n_samples())
            .filter(|&i| data.times()[i] >= event_time)
            .map(|i| exp_preds[i])
            .sum();
        if denom <= 0.0 {
            return Err(EngineError::numerical("risk set sum is non-positive"));
        }
        increments.push(d_k / denom);
    }

    // step function over every observed time (event or censoring)
    let grid = data.observed_times();
    let mut cumhaz = Vec::with_capacity(grid.len());
    let mut acc = 0.0;
    let mut next_event = 0;
    for &day in &grid {
        while next_event < event_times.len() && event_times[next_event] <= day {
            acc += increments[next_event];
            next_event += 1;
        }
        cumhaz.push(acc);
    }

    Ok((grid, cumhaz))
}
