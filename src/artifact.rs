//! versioned model persistence and the serving surface
//!
//! one trained run produces one [`ModelArtifact`]: the feature space, the
//! classifier parameters, the similarity index, and (when the fit succeeded)
//! the survival model, all frozen together so every serving path sees the
//! same preprocessing. two documents land on disk per save:
//!
//! * `artifact.json` - the complete state, read back by [`ModelArtifact::load`]
//! * `params.json` - a slim parameter document with nothing but feature order,
//!   medians, scaling pairs, coefficients, and the intercept, for serving
//!   tiers that reimplement the closed-form score

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{LinearScoreParameters, ModelKind};
use crate::error::Result;
use crate::features::{FeatureSpace, PatientInput};
use crate::metrics::ClassifierMetrics;
use crate::similarity::{SimilarPatientMatch, SimilarityIndex};
use crate::stratify::{ModelInfo, RiskPrediction};
use crate::survival::{SurvivalCurve, SurvivalModel};

pub const ARTIFACT_FILE: &str = "artifact.json";
pub const PARAMS_FILE: &str = "params.json";

/// provenance recorded at train time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub fitted_at: DateTime<Utc>,
    /// crate version that produced the artifact
    pub engine_version: String,
    pub cohort_size: usize,
    pub recurrence_rate: f64,
}

impl ArtifactMetadata {
    pub fn new(cohort_size: usize, recurrence_rate: f64) -> Self {
        Self {
            fitted_at: Utc::now(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            cohort_size,
            recurrence_rate,
        }
    }
}

/// everything one training run produced, frozen together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_space: FeatureSpace,
    pub model_kind: ModelKind,
    pub scorer: LinearScoreParameters,
    pub metrics: ClassifierMetrics,
    pub feature_importances: Vec<(String, f64)>,
    pub similarity: SimilarityIndex,
    /// absent when the survival fit was skipped or failed
    pub survival: Option<SurvivalModel>,
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_kind: self.model_kind,
            auc_roc: self.metrics.auc_roc,
            cohort_size: self.metadata.cohort_size,
            recurrence_rate: self.metadata.recurrence_rate,
            fitted_at: self.metadata.fitted_at,
        }
    }

    /// score one patient: validate, impute, standardize, and stratify
    pub fn score(&self, input: &PatientInput) -> Result<RiskPrediction> {
        input.validate()?;
        let z = self.feature_space.transform(input);
        let probability = self.scorer.score_standardized(z.view())?;
        Ok(RiskPrediction::from_probability(
            probability,
            input,
            self.model_info(),
        ))
    }

    /// k most similar historical patients in the shared standardized space
    pub fn similar_patients(&self, input: &PatientInput, k: usize) -> Result<Vec<SimilarPatientMatch>> {
        input.validate()?;
        let z = self.feature_space.transform(input);
        self.similarity.query(z.view(), k)
    }

    /// individualized survival curve; `None` when no survival model was fit
    pub fn survival_curve(&self, input: &PatientInput) -> Result<Option<SurvivalCurve>> {
        input.validate()?;
        let model = match &self.survival {
            Some(model) => model,
            None => return Ok(None),
        };
        let z = self.feature_space.transform(input);
        Ok(Some(model.predict_curve(z.view())?))
    }

    /// persist both documents into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let artifact_path = dir.join(ARTIFACT_FILE);
        let writer = BufWriter::new(File::create(&artifact_path)?);
        serde_json::to_writer(writer, self)?;

        let params_path = dir.join(PARAMS_FILE);
        let writer = BufWriter::new(File::create(&params_path)?);
        serde_json::to_writer_pretty(writer, &ParameterDocument::from_artifact(self))?;

        info!(
            dir = %dir.display(),
            engine_version = %self.metadata.engine_version,
            "saved model artifact"
        );
        Ok(())
    }

    /// read the full-state document back
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(ARTIFACT_FILE);
        let reader = BufReader::new(File::open(&path)?);
        let artifact: Self = serde_json::from_reader(reader)?;
        info!(
            path = %path.display(),
            engine_version = %artifact.metadata.engine_version,
            "loaded model artifact"
        );
        Ok(artifact)
    }
}

/// slim human-readable parameter document (`params.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDocument {
    pub model_kind: ModelKind,
    pub feature_order: Vec<String>,
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub metrics: ClassifierMetrics,
    pub fitted_at: DateTime<Utc>,
}

impl ParameterDocument {
    pub fn from_artifact(artifact: &ModelArtifact) -> Self {
        Self {
            model_kind: artifact.model_kind,
            feature_order: artifact.scorer.feature_names.clone(),
            medians: artifact.feature_space.medians().to_vec(),
            means: artifact.scorer.means.clone(),
            stds: artifact.scorer.stds.clone(),
            coefficients: artifact.scorer.coefficients.clone(),
            intercept: artifact.scorer.intercept,
            metrics: artifact.metrics.clone(),
            fitted_at: artifact.metadata.fitted_at,
        }
    }

    /// rebuild a standalone scorer from the document alone
    pub fn scorer(&self) -> LinearScoreParameters {
        LinearScoreParameters {
            feature_names: self.feature_order.clone(),
            means: self.means.clone(),
            stds: self.stds.clone(),
            coefficients: self.coefficients.clone(),
            intercept: self.intercept,
        }
    }
}

/// shared handle for concurrent scoring with atomic artifact replacement
///
/// readers clone the inner `Arc` and keep serving off the artifact they
/// grabbed; `swap` installs a retrained artifact for all future requests
/// without ever exposing a half-written state.
#[derive(Debug)]
pub struct ArtifactHandle {
    inner: RwLock<Arc<ModelArtifact>>,
}

impl ArtifactHandle {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            inner: RwLock::new(Arc::new(artifact)),
        }
    }

    /// snapshot of the current artifact for one request
    pub fn current(&self) -> Arc<ModelArtifact> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// atomically replace the served artifact, returning the previous one
    pub fn swap(&self, artifact: ModelArtifact) -> Arc<ModelArtifact> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(artifact))
    }
}
