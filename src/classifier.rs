//! recurrence classifier: trainable model + parameter-only scoring path
//!
//! the trainable side fits a class-balanced logistic regression with
//! Newton-Raphson / IRLS. the serving side never touches the fitted object:
//! [`LinearScoreParameters`] carries only the intercept, coefficients, and
//! per-feature (mean, std), which is everything a linear model needs to
//! reproduce its probabilities.

use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::features::FeatureSpace;
use crate::linalg::solve_linear_system;

/// probability clamp used inside the log-likelihood only
const PROB_FLOOR: f64 = 1e-12;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// supported training modes
///
/// tree-ensemble names (`random_forest`, `gradient_boosting`) are rejected
/// explicitly: only a linear model can honor the parameter-only scoring
/// contract, so silently training something else is worse than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logistic,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Logistic => "logistic",
        }
    }
}

impl FromStr for ModelKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logistic" => Ok(ModelKind::Logistic),
            other => Err(EngineError::unsupported_model(other)),
        }
    }
}

/// the complete parameter contract for dependency-light scoring
///
/// holds nothing but numbers: feature order, imputation medians, scaling
/// (mean, std) pairs, coefficients, and the intercept. a serving tier can
/// reimplement scoring from the persisted parameter document alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScoreParameters {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearScoreParameters {
    /// closed-form logit over an already-standardized feature vector
    pub fn score_standardized(&self, z: ArrayView1<f64>) -> Result<f64> {
        if z.len() != self.coefficients.len() {
            return Err(EngineError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                z.len()
            )));
        }
        let mut logit = self.intercept;
        for (coef, zj) in self.coefficients.iter().zip(z.iter()) {
            logit += coef * zj;
        }
        Ok(sigmoid(logit))
    }

    /// standardize raw (already-imputed) values with the frozen (mean, std)
    /// pairs, then score
    pub fn score_raw(&self, raw: &[f64]) -> Result<f64> {
        if raw.len() != self.coefficients.len() {
            return Err(EngineError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                raw.len()
            )));
        }
        let z: Array1<f64> = raw
            .iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.stds[j])
            .collect();
        self.score_standardized(z.view())
    }

    /// |coefficient| per feature, descending; reported as feature
    /// importances alongside the metrics
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.coefficients.iter().map(|c| c.abs()))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }
}

/// trainable class-balanced logistic regression
#[derive(Debug, Clone)]
pub struct LogisticModel {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    l2_penalty: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl Default for LogisticModel {
    fn default() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            l2_penalty: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

impl LogisticModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty on the coefficients (never the intercept)
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

    /// fit by Newton-Raphson on the weighted log-likelihood
    ///
    /// `sample_weights` corrects class imbalance; see [`class_weights`].
    pub fn fit(
        &mut self,
        x: ArrayView2<f64>,
        y: &[bool],
        sample_weights: &[f64],
    ) -> Result<&mut Self> {
        let n = x.nrows();
        let p = x.ncols();

        if y.len() != n || sample_weights.len() != n {
            return Err(EngineError::invalid_dimensions(
                "labels and weights must match the number of rows",
            ));
        }
        if n == 0 || p == 0 {
            return Err(EngineError::insufficient_data(
                "cannot fit a classifier on an empty matrix",
            ));
        }

        // beta[0] is the intercept, beta[1..] the feature coefficients
        let mut beta = Array1::zeros(p + 1);
        let mut prev_loglik = f64::NEG_INFINITY;

        for iteration in 0..self.max_iterations {
            let mut gradient = Array1::<f64>::zeros(p + 1);
            let mut information = Array2::zeros((p + 1, p + 1));
            let mut loglik = 0.0;

            for i in 0..n {
                let row = x.row(i);
                let mut eta = beta[0];
                for j in 0..p {
                    eta += beta[j + 1] * row[j];
                }
                let prob = sigmoid(eta);
                let w = sample_weights[i];
                let yi = if y[i] { 1.0 } else { 0.0 };

                let clamped = prob.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
                loglik += w * (yi * clamped.ln() + (1.0 - yi) * (1.0 - clamped).ln());

                let residual = w * (yi - prob);
                let curvature = w * prob * (1.0 - prob);

                gradient[0] += residual;
                information[[0, 0]] += curvature;
                for j in 0..p {
                    gradient[j + 1] += residual * row[j];
                    information[[0, j + 1]] += curvature * row[j];
                    information[[j + 1, 0]] += curvature * row[j];
                    for k in 0..p {
                        information[[j + 1, k + 1]] += curvature * row[j] * row[k];
                    }
                }
            }

            // ridge on the coefficients, never the intercept
            for j in 1..=p {
                gradient[j] -= self.l2_penalty * beta[j];
                information[[j, j]] += self.l2_penalty;
                loglik -= 0.5 * self.l2_penalty * beta[j] * beta[j];
            }

            if !loglik.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
                return Err(EngineError::numerical(
                    "log-likelihood diverged during logistic fit",
                ));
            }

            let step = solve_linear_system(&information, &gradient)?;
            beta += &step;

            let max_step = step.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
            if max_step < self.tolerance || (loglik - prev_loglik).abs() < self.tolerance {
                self.intercept = beta[0];
                self.coefficients = Some(beta.slice(ndarray::s![1..]).to_owned());
                return Ok(self);
            }
            prev_loglik = loglik;

            if iteration == self.max_iterations - 1 {
                return Err(EngineError::convergence(
                    "Newton-Raphson failed to converge for logistic regression",
                ));
            }
        }

        Err(EngineError::convergence(
            "Newton-Raphson failed to converge for logistic regression",
        ))
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        match &self.coefficients {
            Some(coefs) => Ok(coefs.view()),
            None => Err(EngineError::ModelNotTrained),
        }
    }

    pub fn intercept(&self) -> Result<f64> {
        if self.is_fitted() {
            Ok(self.intercept)
        } else {
            Err(EngineError::ModelNotTrained)
        }
    }

    /// recurrence probabilities for standardized feature rows
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;
        if x.ncols() != coefs.len() {
            return Err(EngineError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                coefs.len(),
                x.ncols()
            )));
        }
        let mut probs = Array1::zeros(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut logit = self.intercept;
            for (coef, zj) in coefs.iter().zip(row.iter()) {
                logit += coef * zj;
            }
            probs[i] = sigmoid(logit);
        }
        Ok(probs)
    }

    /// export the parameter-only scoring contract; the exported scorer
    /// reproduces this model's probabilities exactly
    pub fn parameters(&self, space: &FeatureSpace) -> Result<LinearScoreParameters> {
        let coefs = self.coefficients()?;
        Ok(LinearScoreParameters {
            feature_names: space.feature_names().to_vec(),
            means: space.means().to_vec(),
            stds: space.stds().to_vec(),
            coefficients: coefs.to_vec(),
            intercept: self.intercept,
        })
    }
}

/// class-balanced sample weights, `w = n / (2 * n_class)`
pub fn class_weights(y: &[bool]) -> Result<Vec<f64>> {
    let n = y.len();
    let n_pos = y.iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EngineError::insufficient_data(
            "class weighting needs both outcome classes present",
        ));
    }
    let w_pos = n as f64 / (2.0 * n_pos as f64);
    let w_neg = n as f64 / (2.0 * n_neg as f64);
    Ok(y.iter().map(|&l| if l { w_pos } else { w_neg }).collect())
}

/// shuffled train/test split preserving the outcome ratio in both parts
pub fn stratified_split(
    y: &[bool],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(EngineError::invalid_dimensions(
            "test fraction must be in (0, 1)",
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [true, false] {
        let mut indices: Vec<usize> = y
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| if l == class { Some(i) } else { None })
            .collect();
        if indices.len() < 2 {
            return Err(EngineError::insufficient_data(
                "each outcome class needs at least 2 patients to split",
            ));
        }
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
            .clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// stratified, shuffled k-fold assignment; returns (train, validation) index
/// pairs per fold
pub fn stratified_kfold(y: &[bool], k: usize, seed: u64) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(EngineError::invalid_dimensions(
            "cross-validation needs at least 2 folds",
        ));
    }

    let n_pos = y.iter().filter(|&&l| l).count();
    let n_neg = y.len() - n_pos;
    if n_pos < k || n_neg < k {
        return Err(EngineError::insufficient_data(format!(
            "{}-fold CV needs at least {} patients of each outcome class",
            k, k
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; y.len()];

    for class in [true, false] {
        let mut indices: Vec<usize> = y
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| if l == class { Some(i) } else { None })
            .collect();
        indices.shuffle(&mut rng);
        for (slot, idx) in indices.into_iter().enumerate() {
            fold_of[idx] = slot % k;
        }
    }

    let mut folds = Vec::with_capacity(k);
    for fold in 0..k {
        let mut train = Vec::new();
        let mut validation = Vec::new();
        for (i, &f) in fold_of.iter().enumerate() {
            if f == fold {
                validation.push(i);
            } else {
                train.push(i);
            }
        }
        folds.push((train, validation));
    }
    Ok(folds)
}
