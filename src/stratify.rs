//! risk tiers, contributing factors, and follow-up recommendations
//!
//! turns a raw recurrence probability into the clinician-facing payload: a
//! named tier with a display color, the factors in the submitted input that
//! drive risk upward, and the follow-up schedule attached to the tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::ModelKind;
use crate::features::PatientInput;

/// four-level stratification of the recurrence probability
///
/// intervals are half-open on the left boundary: a probability of exactly
/// 0.10 is intermediate, 0.25 is high, 0.50 is very high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Intermediate,
    High,
    VeryHigh,
}

impl RiskTier {
    pub fn from_probability(p: f64) -> Self {
        if p < 0.10 {
            RiskTier::Low
        } else if p < 0.25 {
            RiskTier::Intermediate
        } else if p < 0.50 {
            RiskTier::High
        } else {
            RiskTier::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Intermediate => "Intermediate",
            RiskTier::High => "High",
            RiskTier::VeryHigh => "Very High",
        }
    }

    /// display color used by downstream dashboards
    pub fn color(&self) -> &'static str {
        match self {
            RiskTier::Low => "#10B981",
            RiskTier::Intermediate => "#F59E0B",
            RiskTier::High => "#EF4444",
            RiskTier::VeryHigh => "#7C3AED",
        }
    }

    /// tier-specific follow-up recommendations
    pub fn recommendations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            RiskTier::Low => &[
                "Routine follow-up every 6 months for the first 2 years",
                "Annual gynecologic examination thereafter",
                "Educate the patient on symptoms of recurrence",
            ],
            RiskTier::Intermediate => &[
                "Follow-up every 4 months for the first 2 years",
                "Consider vaginal brachytherapy per institutional protocol",
                "Imaging when symptoms suggest recurrence",
            ],
            RiskTier::High => &[
                "Follow-up every 3 months for the first 2 years",
                "Discuss adjuvant radiotherapy with the tumor board",
                "CT of chest, abdomen and pelvis every 6 months",
            ],
            RiskTier::VeryHigh => &[
                "Follow-up every 2 to 3 months with the multidisciplinary team",
                "Discuss adjuvant chemotherapy combined with radiotherapy",
                "Systemic imaging surveillance every 3 to 6 months",
                "Consider clinical trial enrollment",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

fn figo_stage_name(stage: f64) -> &'static str {
    match stage as i64 {
        1 => "IA",
        2 => "IB",
        3 => "II",
        4 => "III",
        5 => "IIIA",
        6 => "IIIB",
        7 => "IIIC1",
        8 => "IIIC2",
        9 => "IVA",
        _ => "IVB",
    }
}

/// human-readable risk factors present in the submitted input
///
/// only values the caller actually provided participate; imputed values never
/// generate a factor. an empty rule set collapses to a single neutral line so
/// the payload never ships an empty list.
pub fn risk_factors(input: &PatientInput) -> Vec<String> {
    let mut factors = Vec::new();

    if let Some(grade) = input.histologic_grade {
        if grade == 2.0 {
            factors.push("High histologic grade".to_string());
        }
    }
    if let Some(stage) = input.figo_stage {
        if stage >= 5.0 {
            factors.push(format!("Advanced FIGO stage ({})", figo_stage_name(stage)));
        }
    }
    if let Some(size) = input.tumor_size_cm {
        if size > 5.0 {
            factors.push("Tumor size greater than 5 cm".to_string());
        }
    }
    if let Some(mi) = input.myometrial_invasion {
        if mi >= 2.0 {
            factors.push("Deep myometrial invasion".to_string());
        }
    }
    if let Some(lvsi) = input.lvsi {
        if lvsi == 1.0 {
            factors.push("Lymphovascular space invasion present".to_string());
        }
    }
    if let Some(csi) = input.cervical_stromal_invasion {
        if csi == 2.0 {
            factors.push("Cervical stromal invasion".to_string());
        }
    }
    if let Some(p53) = input.p53_status {
        if p53 == 2.0 {
            factors.push("Aberrant p53 expression".to_string());
        }
    }
    if let Some(er) = input.er_percent {
        if er < 10.0 {
            factors.push("Low estrogen receptor expression (below 10%)".to_string());
        }
    }
    if let Some(pr) = input.pr_percent {
        if pr < 10.0 {
            factors.push("Low progesterone receptor expression (below 10%)".to_string());
        }
    }
    if let Some(bmi) = input.bmi {
        if bmi >= 35.0 {
            factors.push("Severe obesity (BMI of 35 or higher)".to_string());
        }
    }
    if let Some(age) = input.age {
        if age > 75.0 {
            factors.push("Age over 75 years".to_string());
        }
    }

    if factors.is_empty() {
        factors.push("No significant risk factors identified".to_string());
    }
    factors
}

/// provenance of the model behind a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_kind: ModelKind,
    pub auc_roc: f64,
    pub cohort_size: usize,
    pub recurrence_rate: f64,
    pub fitted_at: DateTime<Utc>,
}

/// full scoring payload for one patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub probability: f64,
    pub probability_percent: f64,
    pub tier: RiskTier,
    pub tier_label: String,
    pub color: String,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub model: ModelInfo,
}

impl RiskPrediction {
    /// assemble the payload from a probability and the submitted input
    pub fn from_probability(probability: f64, input: &PatientInput, model: ModelInfo) -> Self {
        let tier = RiskTier::from_probability(probability);
        Self {
            probability,
            probability_percent: probability * 100.0,
            tier,
            tier_label: tier.label().to_string(),
            color: tier.color().to_string(),
            risk_factors: risk_factors(input),
            recommendations: tier.recommendations(),
            model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_half_open() {
        assert_eq!(RiskTier::from_probability(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.099), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.10), RiskTier::Intermediate);
        assert_eq!(RiskTier::from_probability(0.249), RiskTier::Intermediate);
        assert_eq!(RiskTier::from_probability(0.25), RiskTier::High);
        assert_eq!(RiskTier::from_probability(0.499), RiskTier::High);
        assert_eq!(RiskTier::from_probability(0.50), RiskTier::VeryHigh);
        assert_eq!(RiskTier::from_probability(1.0), RiskTier::VeryHigh);
    }

    #[test]
    fn every_tier_carries_a_color_and_recommendations() {
        for tier in [
            RiskTier::Low,
            RiskTier::Intermediate,
            RiskTier::High,
            RiskTier::VeryHigh,
        ] {
            assert!(tier.color().starts_with('#'));
            assert!(!tier.recommendations().is_empty());
            assert!(!tier.label().is_empty());
        }
        assert_eq!(RiskTier::Low.color(), "#10B981");
        assert_eq!(RiskTier::VeryHigh.color(), "#7C3AED");
    }

    #[test]
    fn adverse_input_triggers_the_matching_factors() {
        let input = PatientInput {
            age: Some(80.0),
            bmi: Some(36.0),
            histologic_grade: Some(2.0),
            tumor_size_cm: Some(6.5),
            myometrial_invasion: Some(2.0),
            lvsi: Some(1.0),
            cervical_stromal_invasion: Some(2.0),
            p53_status: Some(2.0),
            er_percent: Some(5.0),
            pr_percent: Some(4.0),
            figo_stage: Some(7.0),
        };
        let factors = risk_factors(&input);
        assert_eq!(factors.len(), 11);
        assert!(factors.contains(&"Advanced FIGO stage (IIIC1)".to_string()));
        assert!(factors.contains(&"Lymphovascular space invasion present".to_string()));
    }

    #[test]
    fn missing_values_never_generate_factors() {
        let input = PatientInput {
            age: Some(55.0),
            ..PatientInput::default()
        };
        let factors = risk_factors(&input);
        assert_eq!(
            factors,
            vec!["No significant risk factors identified".to_string()]
        );
    }

    #[test]
    fn favorable_input_gets_the_neutral_fallback() {
        let input = PatientInput {
            age: Some(55.0),
            bmi: Some(28.0),
            histologic_grade: Some(1.0),
            tumor_size_cm: Some(2.0),
            myometrial_invasion: Some(1.0),
            lvsi: Some(0.0),
            cervical_stromal_invasion: Some(0.0),
            p53_status: Some(1.0),
            er_percent: Some(90.0),
            pr_percent: Some(80.0),
            figo_stage: Some(1.0),
        };
        let factors = risk_factors(&input);
        assert_eq!(
            factors,
            vec!["No significant risk factors identified".to_string()]
        );
    }

    #[test]
    fn prediction_payload_is_internally_consistent() {
        let model = ModelInfo {
            model_kind: ModelKind::Logistic,
            auc_roc: 0.82,
            cohort_size: 240,
            recurrence_rate: 0.19,
            fitted_at: Utc::now(),
        };
        let prediction =
            RiskPrediction::from_probability(0.31, &PatientInput::default(), model);
        assert_eq!(prediction.tier, RiskTier::High);
        assert_eq!(prediction.tier_label, "High");
        assert_eq!(prediction.color, "#EF4444");
        assert!((prediction.probability_percent - 31.0).abs() < 1e-9);
        assert!(!prediction.recommendations.is_empty());
    }
}
