//! offline evaluation metrics for the recurrence classifier
//!
//! discrimination (AUC-ROC), calibration (Brier), and threshold metrics are
//! recorded at train time and travel with the persisted artifact so serving
//! can report them without recomputation.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// AUC-ROC by pairwise comparison - the probability that a randomly chosen
/// positive outranks a randomly chosen negative, ties counted as half.
pub fn roc_auc(labels: &[bool], scores: ArrayView1<f64>) -> Result<f64> {
    if labels.len() != scores.len() {
        return Err(EngineError::invalid_dimensions(
            "labels and scores must have same length",
        ));
    }

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EngineError::numerical(
            "AUC is undefined when only one class is present",
        ));
    }

    let mut concordant = 0.0;
    let mut tied = 0.0;
    for (i, &li) in labels.iter().enumerate() {
        if !li {
            continue;
        }
        for (j, &lj) in labels.iter().enumerate() {
            if lj {
                continue;
            }
            if scores[i] > scores[j] {
                concordant += 1.0;
            } else if scores[i] == scores[j] {
                tied += 1.0;
            }
        }
    }

    Ok((concordant + 0.5 * tied) / (n_pos as f64 * n_neg as f64))
}

/// Brier score: mean squared distance between predicted probability and the
/// observed 0/1 outcome. Lower is better; 0.25 is the uninformed baseline.
pub fn brier_score(labels: &[bool], probs: ArrayView1<f64>) -> Result<f64> {
    if labels.len() != probs.len() {
        return Err(EngineError::invalid_dimensions(
            "labels and probabilities must have same length",
        ));
    }
    if labels.is_empty() {
        return Err(EngineError::numerical(
            "Brier score needs at least one sample",
        ));
    }

    let sum: f64 = labels
        .iter()
        .zip(probs.iter())
        .map(|(&l, &p)| {
            let y = if l { 1.0 } else { 0.0 };
            (p - y).powi(2)
        })
        .sum();

    Ok(sum / labels.len() as f64)
}

/// confusion counts at a fixed operating threshold
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(labels: &[bool], probs: ArrayView1<f64>, threshold: f64) -> Result<Self> {
        if labels.len() != probs.len() {
            return Err(EngineError::invalid_dimensions(
                "labels and probabilities must have same length",
            ));
        }

        let mut counts = Self::default();
        for (&label, &prob) in labels.iter().zip(probs.iter()) {
            let predicted = prob >= threshold;
            match (label, predicted) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        Ok(counts)
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positive + self.true_negative) as f64 / total as f64
    }

    pub fn precision(&self) -> f64 {
        let denom = self.true_positive + self.false_positive;
        if denom == 0 {
            return 0.0;
        }
        self.true_positive as f64 / denom as f64
    }

    pub fn recall(&self) -> f64 {
        let denom = self.true_positive + self.false_negative;
        if denom == 0 {
            return 0.0;
        }
        self.true_positive as f64 / denom as f64
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// point-in-time evaluation of a trained classifier, persisted with the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierMetrics {
    pub auc_roc: f64,
    pub brier_score: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// cross-validated AUC over the training portion
    pub cv_auc_mean: f64,
    pub cv_auc_std: f64,
    pub confusion: ConfusionCounts,
}

impl ClassifierMetrics {
    /// evaluate held-out predictions at the given operating threshold
    pub fn evaluate(
        labels: &[bool],
        probs: ArrayView1<f64>,
        threshold: f64,
        cv_aucs: &[f64],
    ) -> Result<Self> {
        let auc_roc = roc_auc(labels, probs)?;
        let brier = brier_score(labels, probs)?;
        let confusion = ConfusionCounts::from_predictions(labels, probs, threshold)?;

        let (cv_auc_mean, cv_auc_std) = mean_std(cv_aucs);

        Ok(Self {
            auc_roc,
            brier_score: brier,
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            cv_auc_mean,
            cv_auc_std,
            confusion,
        })
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
