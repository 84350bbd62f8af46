//! end-to-end training: one cohort in, one servable artifact out
//!
//! the orchestrator wires the pipeline in a fixed order so every component
//! shares the same frozen preprocessing: stratified split, feature-space fit
//! on the training portion only, class-balanced logistic fit, held-out
//! evaluation plus cross-validated AUC, similarity index over the labeled
//! cohort, and a Cox fit over everyone with a usable time. survival fit
//! failures are absorbed, never fatal.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactMetadata, ModelArtifact};
use crate::classifier::{
    class_weights, stratified_kfold, stratified_split, LogisticModel, ModelKind,
};
use crate::data::{Outcome, PatientRecord};
use crate::error::{EngineError, Result};
use crate::features::FeatureSpace;
use crate::metrics::{roc_auc, ClassifierMetrics};
use crate::similarity::{PatientSummary, SimilarityIndex};
use crate::survival::{resolve_event_times, CoxEstimator, SurvivalPrep, TimeSource};

/// operating threshold for the confusion-matrix metrics
const DECISION_THRESHOLD: f64 = 0.5;

/// knobs for one training run
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub model_kind: ModelKind,
    pub test_fraction: f64,
    pub cv_folds: usize,
    /// seeds the split, the fold assignment, and any synthesized times
    pub seed: u64,
    pub l2_penalty: f64,
    pub survival_l2: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::Logistic,
            test_fraction: 0.25,
            cv_folds: 5,
            seed: 42,
            l2_penalty: 1.0,
            survival_l2: 0.01,
        }
    }
}

/// what the run actually did, for logs and audits
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainingReport {
    pub cohort_size: usize,
    /// rows with a definitively observed outcome
    pub binary_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub recurrence_rate: f64,
    pub cv_aucs: Vec<f64>,
    pub time_source: TimeSource,
    pub survival_fitted: bool,
    pub survival_rows: usize,
}

/// train every component on one cohort and assemble the artifact
pub fn train_artifact(
    cohort: &[PatientRecord],
    config: &TrainConfig,
) -> Result<(ModelArtifact, TrainingReport)> {
    for record in cohort {
        record.input.validate()?;
    }

    // only definitively observed outcomes train the classifier
    let binary: Vec<&PatientRecord> = cohort.iter().filter(|r| r.outcome.is_binary()).collect();
    if binary.len() < 4 {
        return Err(EngineError::insufficient_data(format!(
            "classifier training needs at least 4 labeled rows, found {}",
            binary.len()
        )));
    }
    let labels: Vec<bool> = binary
        .iter()
        .map(|r| r.outcome == Outcome::Recurrence)
        .collect();
    let recurrence_rate =
        labels.iter().filter(|&&l| l).count() as f64 / labels.len() as f64;

    info!(
        cohort_size = cohort.len(),
        binary_rows = binary.len(),
        recurrence_rate,
        "training started"
    );

    let (train_idx, test_idx) = stratified_split(&labels, config.test_fraction, config.seed)?;

    let train_inputs: Vec<_> = train_idx.iter().map(|&i| binary[i].input.clone()).collect();
    let test_inputs: Vec<_> = test_idx.iter().map(|&i| binary[i].input.clone()).collect();
    let y_train: Vec<bool> = train_idx.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<bool> = test_idx.iter().map(|&i| labels[i]).collect();

    // imputation and scaling parameters come from the training portion only
    let train_rows: Vec<_> = train_inputs.iter().map(|input| input.values()).collect();
    let space = FeatureSpace::fit(&train_rows)?;

    let x_train = space.transform_batch(&train_inputs);
    let x_test = space.transform_batch(&test_inputs);

    let weights = class_weights(&y_train)?;
    let mut model = LogisticModel::new().with_l2_penalty(config.l2_penalty);
    model.fit(x_train.view(), &y_train, &weights)?;
    debug!(intercept = model.intercept()?, "classifier fit converged");

    let cv_aucs = match cross_validated_aucs(x_train.view(), &y_train, config) {
        Ok(aucs) => aucs,
        Err(err) => {
            warn!(%err, "cross-validation skipped");
            Vec::new()
        }
    };

    let test_probs = model.predict_proba(x_test.view())?;
    let metrics =
        ClassifierMetrics::evaluate(&y_test, test_probs.view(), DECISION_THRESHOLD, &cv_aucs)?;
    info!(
        auc_roc = metrics.auc_roc,
        brier = metrics.brier_score,
        cv_auc_mean = metrics.cv_auc_mean,
        "held-out evaluation complete"
    );

    let scorer = model.parameters(&space)?;
    let feature_importances = scorer.feature_importances();

    // neighbors are retrieved from the labeled cohort, in the same space
    let binary_inputs: Vec<_> = binary.iter().map(|r| r.input.clone()).collect();
    let binary_features = space.transform_batch(&binary_inputs);
    let summaries: Vec<PatientSummary> = binary
        .iter()
        .map(|r| PatientSummary {
            age: r.input.age,
            histologic_grade: r.input.histologic_grade,
            figo_stage: r.input.figo_stage,
            recurrence: r.outcome == Outcome::Recurrence,
            follow_up_days: r.follow_up_days,
            treatment: r.treatment.clone(),
        })
        .collect();
    let similarity = SimilarityIndex::fit(binary_features.view(), summaries)?;

    // survival uses everyone with a usable time; lost-to-follow-up rows are
    // censored observations, not exclusions
    let (times, time_source) = resolve_event_times(cohort, config.seed);
    let degraded = time_source == TimeSource::Synthesized;
    let events: Vec<bool> = cohort
        .iter()
        .map(|r| r.outcome == Outcome::Recurrence)
        .collect();
    let all_inputs: Vec<_> = cohort.iter().map(|r| r.input.clone()).collect();
    let all_features = space.transform_batch(&all_inputs);

    let mut survival_rows = 0;
    let survival = match SurvivalPrep::prepare(all_features.view(), &times, &events, degraded) {
        Ok(prep) => {
            let estimator = CoxEstimator::new().with_l2_penalty(config.survival_l2);
            match estimator.fit(&prep) {
                Ok(fitted) => {
                    survival_rows = prep.data.n_samples();
                    debug!(
                        rows = survival_rows,
                        covariates = prep.kept_columns.len(),
                        degraded,
                        "survival fit converged"
                    );
                    Some(fitted)
                }
                Err(err) => {
                    warn!(%err, "survival fit failed; artifact ships without curves");
                    None
                }
            }
        }
        Err(err) => {
            warn!(%err, "survival data unusable; artifact ships without curves");
            None
        }
    };

    let report = TrainingReport {
        cohort_size: cohort.len(),
        binary_rows: binary.len(),
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        recurrence_rate,
        cv_aucs,
        time_source,
        survival_fitted: survival.is_some(),
        survival_rows,
    };

    let artifact = ModelArtifact {
        feature_space: space,
        model_kind: config.model_kind,
        scorer,
        metrics,
        feature_importances,
        similarity,
        survival,
        metadata: ArtifactMetadata::new(cohort.len(), recurrence_rate),
    };

    Ok((artifact, report))
}

/// per-fold held-out AUC over the training portion
fn cross_validated_aucs(x: ArrayView2<f64>, y: &[bool], config: &TrainConfig) -> Result<Vec<f64>> {
    let folds = stratified_kfold(y, config.cv_folds, config.seed)?;
    let mut aucs = Vec::with_capacity(folds.len());

    for (fold_train, fold_val) in folds {
        let x_fold: Array2<f64> = x.select(Axis(0), &fold_train);
        let y_fold: Vec<bool> = fold_train.iter().map(|&i| y[i]).collect();
        let weights = class_weights(&y_fold)?;

        let mut fold_model = LogisticModel::new().with_l2_penalty(config.l2_penalty);
        fold_model.fit(x_fold.view(), &y_fold, &weights)?;

        let x_val: Array2<f64> = x.select(Axis(0), &fold_val);
        let y_val: Vec<bool> = fold_val.iter().map(|&i| y[i]).collect();
        let probs: Array1<f64> = fold_model.predict_proba(x_val.view())?;
        aucs.push(roc_auc(&y_val, probs.view())?);
    }

    Ok(aucs)
}
