//! cohort records and tabular input
//!
//! training consumes one tabular dataset per run: 11 covariates, an outcome
//! code, and the time-to-event fields. blank cells deserialize to `None` and
//! flow through the imputation table later - nothing is filled in here.

use std::path::Path;

use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::features::PatientInput;

/// follow-up outcome code for one historical patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NoRecurrence,
    Recurrence,
    LostToFollowUp,
}

impl Outcome {
    /// decode the dataset's integer outcome column (0 / 1 / 2)
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Outcome::NoRecurrence),
            1 => Ok(Outcome::Recurrence),
            2 => Ok(Outcome::LostToFollowUp),
            other => Err(EngineError::invalid_feature(
                "outcome",
                other as f64,
                "0 (no recurrence), 1 (recurrence) or 2 (lost to follow-up)",
            )),
        }
    }

    /// only definitively observed outcomes participate in classifier training
    pub fn is_binary(&self) -> bool {
        !matches!(self, Outcome::LostToFollowUp)
    }
}

/// one historical patient: covariates, outcome, and follow-up information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub input: PatientInput,
    pub outcome: Outcome,
    /// primary recorded follow-up duration in days
    pub follow_up_days: Option<f64>,
    pub diagnosis_date: Option<NaiveDate>,
    pub last_contact_date: Option<NaiveDate>,
    /// recorded adjuvant treatment, if any; surfaced only in similarity summaries
    pub treatment: Option<String>,
}

/// raw CSV row as it appears in the training dataset
#[derive(Debug, Deserialize)]
struct CohortRow {
    age: Option<f64>,
    bmi: Option<f64>,
    histologic_grade: Option<f64>,
    tumor_size_cm: Option<f64>,
    myometrial_invasion: Option<f64>,
    lvsi: Option<f64>,
    cervical_stromal_invasion: Option<f64>,
    p53_status: Option<f64>,
    er_percent: Option<f64>,
    pr_percent: Option<f64>,
    figo_stage: Option<f64>,
    outcome: Option<i64>,
    follow_up_days: Option<f64>,
    diagnosis_date: Option<NaiveDate>,
    last_contact_date: Option<NaiveDate>,
    treatment: Option<String>,
}

impl CohortRow {
    fn into_record(self) -> Result<PatientRecord> {
        let outcome = match self.outcome {
            Some(code) => Outcome::from_code(code)?,
            // no outcome recorded = follow-up never completed
            None => Outcome::LostToFollowUp,
        };
        Ok(PatientRecord {
            input: PatientInput {
                age: self.age,
                bmi: self.bmi,
                histologic_grade: self.histologic_grade,
                tumor_size_cm: self.tumor_size_cm,
                myometrial_invasion: self.myometrial_invasion,
                lvsi: self.lvsi,
                cervical_stromal_invasion: self.cervical_stromal_invasion,
                p53_status: self.p53_status,
                er_percent: self.er_percent,
                pr_percent: self.pr_percent,
                figo_stage: self.figo_stage,
            },
            outcome,
            follow_up_days: self.follow_up_days,
            diagnosis_date: self.diagnosis_date,
            last_contact_date: self.last_contact_date,
            treatment: self.treatment.filter(|t| !t.trim().is_empty()),
        })
    }
}

/// load a training cohort from a CSV file with the canonical column names
pub fn load_cohort<P: AsRef<Path>>(path: P) -> Result<Vec<PatientRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<CohortRow>() {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// time-to-event data for the survival estimator
///
/// rows are already cleaned (positive finite times) and covariates already
/// standardized by the shared [`crate::features::FeatureSpace`].
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,
    events: Array1<bool>,
    covariates: Array2<f64>,
}

impl SurvivalData {
    pub fn new(times: Vec<f64>, events: Vec<bool>, covariates: Array2<f64>) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(EngineError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(EngineError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if times.iter().any(|&t| t <= 0.0 || !t.is_finite()) {
            return Err(EngineError::insufficient_data(
                "survival times must be positive & finite",
            ));
        }

        Ok(Self {
            times: Array1::from(times),
            events: Array1::from(events),
            covariates,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    pub fn events(&self) -> &[bool] {
        self.events.as_slice().expect("events array is contiguous")
    }

    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// unique event times, ascending
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap());
        times.dedup();
        times
    }

    /// all observed times (event or censoring), unique and ascending;
    /// this is the evaluation grid for individualized survival curves
    pub fn observed_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.times.iter().copied().collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap());
        times.dedup();
        times
    }
}
