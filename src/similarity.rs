//! nearest-neighbor retrieval over the standardized cohort
//!
//! distances live in the same standardized feature space the classifier was
//! trained in, so one set of scaling parameters serves both. matches expose a
//! summary projection only - never the full record.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// default number of matches returned per query
pub const DEFAULT_K: usize = 5;

/// anonymized summary of one historical patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub age: Option<f64>,
    pub histologic_grade: Option<f64>,
    pub figo_stage: Option<f64>,
    pub recurrence: bool,
    pub follow_up_days: Option<f64>,
    pub treatment: Option<String>,
}

/// one retrieved neighbor: summary + distance + similarity in (0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPatientMatch {
    pub summary: PatientSummary,
    pub distance: f64,
    pub similarity: f64,
}

/// exhaustive Euclidean index over the historical cohort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityIndex {
    features: Array2<f64>,
    summaries: Vec<PatientSummary>,
}

impl SimilarityIndex {
    /// build the index from standardized cohort features and their summaries
    pub fn fit(features: ArrayView2<f64>, summaries: Vec<PatientSummary>) -> Result<Self> {
        if features.nrows() != summaries.len() {
            return Err(EngineError::invalid_dimensions(format!(
                "feature rows ({}) != summaries ({})",
                features.nrows(),
                summaries.len()
            )));
        }
        Ok(Self {
            features: features.to_owned(),
            summaries,
        })
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// k nearest historical patients by ascending Euclidean distance
    ///
    /// exact distance ties resolve by cohort insertion order. similarity is
    /// `1 / (1 + distance)`, strictly decreasing in distance.
    pub fn query(&self, z: ArrayView1<f64>, k: usize) -> Result<Vec<SimilarPatientMatch>> {
        if self.is_empty() {
            return Err(EngineError::IndexNotBuilt);
        }
        if z.len() != self.features.ncols() {
            return Err(EngineError::invalid_dimensions(format!(
                "query has {} features, index has {}",
                z.len(),
                self.features.ncols()
            )));
        }

        let mut ranked: Vec<(f64, usize)> = self
            .features
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let dist = row
                    .iter()
                    .zip(z.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                (dist, i)
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(ranked
            .into_iter()
            .take(k.min(self.summaries.len()))
            .map(|(distance, i)| SimilarPatientMatch {
                summary: self.summaries[i].clone(),
                distance,
                similarity: 1.0 / (1.0 + distance),
            })
            .collect())
    }
}
