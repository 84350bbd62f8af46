//! covariate definitions + the fit-once/transform-many feature pipeline
//!
//! the 11 covariates live in one canonical order. every coefficient vector,
//! mean/std pair, and similarity query assumes that order - reordering
//! silently corrupts every dot product downstream, so the order is defined
//! exactly once here and never anywhere else.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// number of clinical/histopathological/molecular covariates
pub const N_FEATURES: usize = 11;

/// std below this is treated as a constant covariate at transform time
const MIN_STD: f64 = 1e-9;

/// static description of one covariate: canonical name + valid domain
#[derive(Debug, Clone, Copy)]
pub struct CovariateSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

/// canonical covariate table, in feature-vector order
pub const COVARIATES: [CovariateSpec; N_FEATURES] = [
    CovariateSpec { name: "age", min: 18.0, max: 100.0 },
    CovariateSpec { name: "bmi", min: 15.0, max: 60.0 },
    CovariateSpec { name: "histologic_grade", min: 1.0, max: 2.0 },
    CovariateSpec { name: "tumor_size_cm", min: 0.0, max: 20.0 },
    CovariateSpec { name: "myometrial_invasion", min: 0.0, max: 3.0 },
    CovariateSpec { name: "lvsi", min: 0.0, max: 1.0 },
    CovariateSpec { name: "cervical_stromal_invasion", min: 0.0, max: 2.0 },
    CovariateSpec { name: "p53_status", min: 1.0, max: 3.0 },
    CovariateSpec { name: "er_percent", min: 0.0, max: 100.0 },
    CovariateSpec { name: "pr_percent", min: 0.0, max: 100.0 },
    CovariateSpec { name: "figo_stage", min: 1.0, max: 10.0 },
];

/// canonical feature names, in order
pub fn feature_names() -> Vec<String> {
    COVARIATES.iter().map(|c| c.name.to_string()).collect()
}

/// a single patient's covariate values; `None` = not provided / missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub age: Option<f64>,
    pub bmi: Option<f64>,
    /// 1 = low grade, 2 = high grade
    pub histologic_grade: Option<f64>,
    pub tumor_size_cm: Option<f64>,
    /// 0 = none, 1 = <50%, 2 = >=50%, 3 = serosa
    pub myometrial_invasion: Option<f64>,
    /// 0 = absent, 1 = present
    pub lvsi: Option<f64>,
    /// 0 = none, 1 = glandular, 2 = stromal
    pub cervical_stromal_invasion: Option<f64>,
    /// 1 = normal, 2 = aberrant, 3 = unknown
    pub p53_status: Option<f64>,
    pub er_percent: Option<f64>,
    pub pr_percent: Option<f64>,
    /// ordinal FIGO 2023 stage, 1 (IA) through 10 (IVB)
    pub figo_stage: Option<f64>,
}

impl PatientInput {
    /// values in canonical covariate order
    pub fn values(&self) -> [Option<f64>; N_FEATURES] {
        [
            self.age,
            self.bmi,
            self.histologic_grade,
            self.tumor_size_cm,
            self.myometrial_invasion,
            self.lvsi,
            self.cervical_stromal_invasion,
            self.p53_status,
            self.er_percent,
            self.pr_percent,
            self.figo_stage,
        ]
    }

    /// check every provided value against its covariate domain
    ///
    /// this is the request-boundary guard: the pipeline itself never clamps,
    /// so out-of-range values must be rejected before they reach `transform`.
    pub fn validate(&self) -> Result<()> {
        for (value, spec) in self.values().iter().zip(COVARIATES.iter()) {
            if let Some(v) = value {
                if !v.is_finite() || *v < spec.min || *v > spec.max {
                    return Err(EngineError::invalid_feature(
                        spec.name,
                        *v,
                        format!("{} to {}", spec.min, spec.max),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// frozen imputation + standardization statistics for the 11 covariates
///
/// fit once on the training subset, then shared by the classifier, the
/// similarity index, and the survival model so all three see identically
/// standardized features. never refit at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpace {
    feature_names: Vec<String>,
    /// per-covariate training medians (imputation table)
    medians: Vec<f64>,
    /// per-covariate means of the imputed training columns
    means: Vec<f64>,
    /// per-covariate stds of the imputed training columns, floored at MIN_STD
    stds: Vec<f64>,
}

impl FeatureSpace {
    /// fit imputation medians and scaling statistics from training rows
    ///
    /// medians come from the non-missing values of each column; means/stds
    /// are then computed over the *imputed* columns, so imputation always
    /// precedes the scaling fit.
    pub fn fit(rows: &[[Option<f64>; N_FEATURES]]) -> Result<Self> {
        if rows.is_empty() {
            return Err(EngineError::insufficient_data(
                "cannot fit feature space on an empty cohort",
            ));
        }

        let mut medians = Vec::with_capacity(N_FEATURES);
        for (j, spec) in COVARIATES.iter().enumerate() {
            let mut observed: Vec<f64> = rows
                .iter()
                .filter_map(|r| r[j])
                .filter(|v| v.is_finite())
                .collect();
            if observed.is_empty() {
                return Err(EngineError::insufficient_data(format!(
                    "covariate `{}` has no observed training values",
                    spec.name
                )));
            }
            observed.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mid = observed.len() / 2;
            let median = if observed.len() % 2 == 0 {
                (observed[mid - 1] + observed[mid]) / 2.0
            } else {
                observed[mid]
            };
            medians.push(median);
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; N_FEATURES];
        let mut stds = vec![0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            let mut sum = 0.0;
            for row in rows {
                sum += row[j].filter(|v| v.is_finite()).unwrap_or(medians[j]);
            }
            means[j] = sum / n;

            let mut sq = 0.0;
            for row in rows {
                let v = row[j].filter(|v| v.is_finite()).unwrap_or(medians[j]);
                sq += (v - means[j]).powi(2);
            }
            // population std, matching the fit-time scaler convention
            stds[j] = (sq / n).sqrt().max(MIN_STD);
        }

        Ok(Self {
            feature_names: feature_names(),
            medians,
            means,
            stds,
        })
    }

    /// rebuild a feature space from persisted statistics
    pub fn from_parts(medians: Vec<f64>, means: Vec<f64>, stds: Vec<f64>) -> Result<Self> {
        if medians.len() != N_FEATURES || means.len() != N_FEATURES || stds.len() != N_FEATURES {
            return Err(EngineError::invalid_dimensions(format!(
                "feature space statistics must have {} entries",
                N_FEATURES
            )));
        }
        let stds = stds.into_iter().map(|s| s.max(MIN_STD)).collect();
        Ok(Self {
            feature_names: feature_names(),
            medians,
            means,
            stds,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// substitute the frozen median for every missing covariate
    pub fn impute(&self, input: &PatientInput) -> [f64; N_FEATURES] {
        let mut raw = [0.0; N_FEATURES];
        for (j, value) in input.values().iter().enumerate() {
            raw[j] = value.filter(|v| v.is_finite()).unwrap_or(self.medians[j]);
        }
        raw
    }

    /// impute then standardize one patient into a fixed-order feature vector
    pub fn transform(&self, input: &PatientInput) -> Array1<f64> {
        let raw = self.impute(input);
        let mut z = Array1::zeros(N_FEATURES);
        for j in 0..N_FEATURES {
            z[j] = (raw[j] - self.means[j]) / self.stds[j];
        }
        z
    }

    /// transform a batch of patients into an (n_samples x 11) matrix
    pub fn transform_batch(&self, inputs: &[PatientInput]) -> Array2<f64> {
        let mut out = Array2::zeros((inputs.len(), N_FEATURES));
        for (i, input) in inputs.iter().enumerate() {
            let z = self.transform(input);
            out.row_mut(i).assign(&z);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(values: [f64; N_FEATURES]) -> [Option<f64>; N_FEATURES] {
        values.map(Some)
    }

    fn small_cohort() -> Vec<[Option<f64>; N_FEATURES]> {
        vec![
            row([55.0, 24.0, 1.0, 2.0, 1.0, 0.0, 0.0, 1.0, 90.0, 85.0, 1.0]),
            row([62.0, 30.0, 1.0, 3.0, 1.0, 0.0, 0.0, 1.0, 80.0, 70.0, 2.0]),
            row([71.0, 33.0, 2.0, 5.0, 2.0, 1.0, 1.0, 2.0, 40.0, 30.0, 5.0]),
            row([68.0, 28.0, 2.0, 4.0, 2.0, 1.0, 2.0, 2.0, 20.0, 15.0, 7.0]),
        ]
    }

    #[test]
    fn fit_computes_medians_of_observed_values() {
        let mut rows = small_cohort();
        rows[0][0] = None; // drop one age
        let space = FeatureSpace::fit(&rows).unwrap();
        // remaining ages: 62, 68, 71 -> median 68
        assert_relative_eq!(space.medians()[0], 68.0, epsilon = 1e-12);
    }

    #[test]
    fn scaling_fit_uses_imputed_columns() {
        let mut rows = small_cohort();
        rows[0][3] = None; // tumor size missing; median of 3,4,5 = 4
        let space = FeatureSpace::fit(&rows).unwrap();
        // imputed column is [4, 3, 5, 4]
        assert_relative_eq!(space.means()[3], 4.0, epsilon = 1e-12);
        let expected_std = (2.0f64 / 4.0).sqrt();
        assert_relative_eq!(space.stds()[3], expected_std, epsilon = 1e-12);
    }

    #[test]
    fn transform_standardizes_and_imputes_missing() {
        let rows = small_cohort();
        let space = FeatureSpace::fit(&rows).unwrap();

        let input = PatientInput {
            age: Some(64.0),
            ..Default::default()
        };
        let z = space.transform(&input);

        assert_relative_eq!(
            z[0],
            (64.0 - space.means()[0]) / space.stds()[0],
            epsilon = 1e-12
        );
        // everything else was imputed with the median, which need not sit at
        // the mean, but the transform must still be finite and deterministic
        let z2 = space.transform(&input);
        assert_eq!(z, z2);
    }

    #[test]
    fn constant_covariate_does_not_divide_by_zero() {
        let mut rows = small_cohort();
        for r in rows.iter_mut() {
            r[5] = Some(0.0); // lvsi constant in training
        }
        let space = FeatureSpace::fit(&rows).unwrap();
        let z = space.transform(&PatientInput::default());
        assert!(z[5].is_finite());
    }

    #[test]
    fn fit_fails_on_empty_cohort() {
        assert!(matches!(
            FeatureSpace::fit(&[]),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn fit_fails_when_covariate_entirely_missing() {
        let mut rows = small_cohort();
        for r in rows.iter_mut() {
            r[7] = None;
        }
        assert!(matches!(
            FeatureSpace::fit(&rows),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let input = PatientInput {
            histologic_grade: Some(3.0),
            ..Default::default()
        };
        match input.validate() {
            Err(EngineError::InvalidFeature { feature, value, .. }) => {
                assert_eq!(feature, "histologic_grade");
                assert_relative_eq!(value, 3.0);
            }
            other => panic!("expected InvalidFeature, got {:?}", other.err()),
        }
    }

    #[test]
    fn validate_accepts_partial_input() {
        let input = PatientInput {
            age: Some(70.0),
            lvsi: Some(1.0),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn canonical_order_is_stable() {
        let names = feature_names();
        assert_eq!(names[0], "age");
        assert_eq!(names[2], "histologic_grade");
        assert_eq!(names[10], "figo_stage");
        assert_eq!(names.len(), N_FEATURES);
    }
}
