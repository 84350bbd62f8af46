//! Recurrence risk stratification and survival estimation for endometrial
//! cancer cohorts.
//!
//! The crate trains three coupled components on one tabular cohort and
//! freezes them into a single servable artifact:
//!
//! * a class-balanced logistic classifier over 11 standardized clinical
//!   covariates, stratified into four named risk tiers
//! * an exhaustive nearest-neighbor index for "patients like this one"
//!   retrieval in the same standardized space
//! * a Cox proportional-hazards model with a Breslow baseline for
//!   individualized 1/3/5-year survival projections
//!
//! Missing covariates are imputed with training-cohort medians, so partial
//! inputs score the same way at train and serve time. The persisted artifact
//! carries its own imputation and scaling parameters; a reloaded artifact
//! reproduces probabilities bit for bit.
//!
//! # Example
//!
//! ```no_run
//! use endorisk::{load_cohort, train_artifact, PatientInput, TrainConfig};
//!
//! fn main() -> endorisk::Result<()> {
//!     let cohort = load_cohort("cohort.csv")?;
//!     let (artifact, report) = train_artifact(&cohort, &TrainConfig::default())?;
//!     println!("held-out AUC {:.3}", artifact.metrics.auc_roc);
//!     println!("survival fitted: {}", report.survival_fitted);
//!
//!     let patient = PatientInput {
//!         age: Some(63.0),
//!         histologic_grade: Some(2.0),
//!         figo_stage: Some(5.0),
//!         ..PatientInput::default()
//!     };
//!     let prediction = artifact.score(&patient)?;
//!     println!("{}: {:.1}%", prediction.tier_label, prediction.probability_percent);
//!
//!     artifact.save("model/")?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod classifier;
pub mod data;
pub mod error;
pub mod features;
mod linalg;
pub mod metrics;
pub mod similarity;
pub mod stratify;
pub mod survival;
pub mod train;

pub use artifact::{
    ArtifactHandle, ArtifactMetadata, ModelArtifact, ParameterDocument, ARTIFACT_FILE, PARAMS_FILE,
};
pub use classifier::{
    class_weights, stratified_kfold, stratified_split, LinearScoreParameters, LogisticModel,
    ModelKind,
};
pub use data::{load_cohort, Outcome, PatientRecord, SurvivalData};
pub use error::{EngineError, Result};
pub use features::{feature_names, FeatureSpace, PatientInput, N_FEATURES};
pub use metrics::{brier_score, roc_auc, ClassifierMetrics, ConfusionCounts};
pub use similarity::{PatientSummary, SimilarPatientMatch, SimilarityIndex, DEFAULT_K};
pub use stratify::{risk_factors, ModelInfo, RiskPrediction, RiskTier};
pub use survival::{
    resolve_event_times, CoxEstimator, SurvivalCurve, SurvivalModel, SurvivalPoint, SurvivalPrep,
    TimeSource, MIN_SURVIVAL_ROWS,
};
pub use train::{train_artifact, TrainConfig, TrainingReport};
