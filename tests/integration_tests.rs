//! end-to-end tests: train on a synthetic cohort, persist, reload, serve

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use endorisk::{
    train_artifact, ArtifactHandle, ArtifactMetadata, ClassifierMetrics, ConfusionCounts,
    EngineError, FeatureSpace, LinearScoreParameters, ModelArtifact, ModelKind, Outcome,
    ParameterDocument, PatientInput, PatientRecord, PatientSummary, RiskTier, SimilarityIndex,
    TrainConfig, PARAMS_FILE,
};

/// seeded cohort where adverse pathology drives recurrence and shortens
/// follow-up, so both the classifier and the Cox model have real signal
fn synthetic_cohort(n: usize, seed: u64) -> Vec<PatientRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let aggressive = i % 3 == 0;
            let input = if aggressive {
                PatientInput {
                    age: Some(rng.gen_range(60.0..85.0)),
                    bmi: Some(rng.gen_range(25.0..42.0)),
                    histologic_grade: Some(2.0),
                    tumor_size_cm: Some(rng.gen_range(4.0..9.0)),
                    myometrial_invasion: Some(rng.gen_range(2.0..3.0_f64).round()),
                    lvsi: Some(1.0),
                    cervical_stromal_invasion: Some(if rng.gen_bool(0.5) { 2.0 } else { 1.0 }),
                    p53_status: Some(2.0),
                    er_percent: Some(rng.gen_range(0.0..20.0)),
                    pr_percent: Some(rng.gen_range(0.0..20.0)),
                    figo_stage: Some(rng.gen_range(5.0..10.0_f64).round()),
                }
            } else {
                PatientInput {
                    age: Some(rng.gen_range(40.0..70.0)),
                    bmi: if i % 7 == 0 {
                        None
                    } else {
                        Some(rng.gen_range(20.0..34.0))
                    },
                    histologic_grade: Some(1.0),
                    tumor_size_cm: Some(rng.gen_range(0.5..4.0)),
                    myometrial_invasion: Some(if rng.gen_bool(0.5) { 0.0 } else { 1.0 }),
                    lvsi: Some(0.0),
                    cervical_stromal_invasion: Some(0.0),
                    p53_status: Some(1.0),
                    er_percent: Some(rng.gen_range(60.0..100.0)),
                    pr_percent: Some(rng.gen_range(50.0..100.0)),
                    figo_stage: Some(rng.gen_range(1.0..3.0_f64).round()),
                }
            };

            let recurred = if aggressive {
                rng.gen_bool(0.85)
            } else {
                rng.gen_bool(0.08)
            };
            let outcome = if i % 11 == 10 {
                Outcome::LostToFollowUp
            } else if recurred {
                Outcome::Recurrence
            } else {
                Outcome::NoRecurrence
            };
            let follow_up = if recurred {
                rng.gen_range(90.0..900.0)
            } else {
                rng.gen_range(700.0..2600.0)
            };

            PatientRecord {
                input,
                outcome,
                follow_up_days: Some(follow_up),
                diagnosis_date: None,
                last_contact_date: None,
                treatment: if aggressive {
                    Some("chemoradiation".to_string())
                } else {
                    None
                },
            }
        })
        .collect()
}

fn low_risk_input() -> PatientInput {
    PatientInput {
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
    }
}

fn high_risk_input() -> PatientInput {
    PatientInput {
        age: Some(72.0),
        bmi: Some(35.0),
        histologic_grade: Some(2.0),
        tumor_size_cm: Some(5.0),
        myometrial_invasion: Some(2.0),
        lvsi: Some(1.0),
        cervical_stromal_invasion: Some(1.0),
        p53_status: Some(2.0),
        er_percent: Some(8.0),
        pr_percent: Some(5.0),
        figo_stage: Some(7.0),
    }
}

/// artifact with frozen reference parameters, for boundary-exact assertions
fn reference_artifact() -> ModelArtifact {
    let medians = vec![62.0, 30.0, 1.0, 3.5, 1.0, 0.0, 0.0, 1.0, 85.0, 75.0, 3.0];
    let means = vec![
        61.87, 30.88, 1.21, 3.71, 1.12, 0.19, 0.11, 1.35, 82.44, 73.39, 3.66,
    ];
    let stds = vec![
        14.45, 7.57, 0.41, 4.37, 0.77, 0.39, 0.37, 0.76, 21.45, 24.76, 4.05,
    ];
    let coefficients = vec![0.10, 0.05, 0.90, 0.30, 0.40, 0.60, 0.40, 0.25, -0.50, -0.50, 0.80];

    let feature_space =
        FeatureSpace::from_parts(medians, means.clone(), stds.clone()).unwrap();
    let scorer = LinearScoreParameters {
        feature_names: endorisk::feature_names(),
        means,
        stds,
        coefficients,
        intercept: -2.2,
    };
    let feature_importances = scorer.feature_importances();

    let summaries = vec![
        PatientSummary {
            age: Some(55.0),
            histologic_grade: Some(1.0),
            figo_stage: Some(1.0),
            recurrence: false,
            follow_up_days: Some(1500.0),
            treatment: None,
        },
        PatientSummary {
            age: Some(70.0),
            histologic_grade: Some(2.0),
            figo_stage: Some(7.0),
            recurrence: true,
            follow_up_days: Some(400.0),
            treatment: Some("chemoradiation".to_string()),
        },
    ];
    let features = feature_space.transform_batch(&[low_risk_input(), high_risk_input()]);
    let similarity = SimilarityIndex::fit(features.view(), summaries).unwrap();

    ModelArtifact {
        feature_space,
        model_kind: ModelKind::Logistic,
        scorer,
        metrics: ClassifierMetrics {
            auc_roc: 0.82,
            brier_score: 0.11,
            accuracy: 0.8,
            precision: 0.7,
            recall: 0.75,
            f1: 0.72,
            cv_auc_mean: 0.8,
            cv_auc_std: 0.03,
            confusion: ConfusionCounts::default(),
        },
        feature_importances,
        similarity,
        survival: None,
        metadata: ArtifactMetadata::new(240, 0.19),
    }
}

#[test]
fn trained_artifact_round_trips_through_disk_exactly() {
    let cohort = synthetic_cohort(150, 21);
    let (artifact, _) = train_artifact(&cohort, &TrainConfig::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    artifact.save(dir.path()).unwrap();
    let reloaded = ModelArtifact::load(dir.path()).unwrap();

    for input in [low_risk_input(), high_risk_input()] {
        let before = artifact.score(&input).unwrap();
        let after = reloaded.score(&input).unwrap();
        assert_eq!(before.probability, after.probability);
        assert_eq!(before.tier, after.tier);

        let curve_before = artifact.survival_curve(&input).unwrap().unwrap();
        let curve_after = reloaded.survival_curve(&input).unwrap().unwrap();
        assert_eq!(curve_before.one_year, curve_after.one_year);
        assert_eq!(curve_before.five_year, curve_after.five_year);
    }
}

#[test]
fn parameter_document_alone_reproduces_the_probabilities() {
    let cohort = synthetic_cohort(150, 23);
    let (artifact, _) = train_artifact(&cohort, &TrainConfig::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    artifact.save(dir.path()).unwrap();

    let raw = std::fs::read_to_string(dir.path().join(PARAMS_FILE)).unwrap();
    let document: ParameterDocument = serde_json::from_str(&raw).unwrap();
    assert_eq!(document.feature_order, endorisk::feature_names());
    assert_eq!(document.coefficients.len(), endorisk::N_FEATURES);

    let standalone = document.scorer();
    for input in [low_risk_input(), high_risk_input()] {
        let full = artifact.score(&input).unwrap().probability;
        let imputed = artifact.feature_space.impute(&input);
        let slim = standalone.score_raw(&imputed).unwrap();
        assert_relative_eq!(full, slim, epsilon = 1e-12);
    }
}

#[test]
fn reference_parameters_stratify_the_canonical_scenarios() {
    let artifact = reference_artifact();

    let favorable = artifact.score(&low_risk_input()).unwrap();
    assert_eq!(favorable.tier, RiskTier::Low);
    assert_relative_eq!(favorable.probability, 0.0138, epsilon = 2e-3);
    assert_eq!(
        favorable.risk_factors,
        vec!["No significant risk factors identified".to_string()]
    );

    let adverse = artifact.score(&high_risk_input()).unwrap();
    assert_eq!(adverse.tier, RiskTier::VeryHigh);
    assert!(adverse.probability > 0.9);
    for expected in [
        "High histologic grade",
        "Lymphovascular space invasion present",
        "Advanced FIGO stage (IIIC1)",
    ] {
        assert!(adverse.risk_factors.contains(&expected.to_string()));
    }
    assert_eq!(adverse.color, "#7C3AED");
}

#[test]
fn partial_input_scores_like_its_median_completion() {
    let artifact = reference_artifact();

    let partial = PatientInput {
        age: Some(63.0),
        histologic_grade: Some(2.0),
        ..PatientInput::default()
    };
    let completed_raw = artifact.feature_space.impute(&partial);
    let direct = artifact.score(&partial).unwrap().probability;
    let via_raw = artifact.scorer.score_raw(&completed_raw).unwrap();
    assert_relative_eq!(direct, via_raw, epsilon = 1e-12);
}

#[test]
fn out_of_domain_input_is_rejected() {
    let artifact = reference_artifact();
    let mut input = low_risk_input();
    input.age = Some(150.0);
    assert!(matches!(
        artifact.score(&input),
        Err(EngineError::InvalidFeature { .. })
    ));
}

#[test]
fn similar_patients_come_back_ranked_and_summarized() {
    let cohort = synthetic_cohort(120, 27);
    let (artifact, report) = train_artifact(&cohort, &TrainConfig::default()).unwrap();

    let matches = artifact.similar_patients(&high_risk_input(), 5).unwrap();
    assert_eq!(matches.len(), 5);
    for window in matches.windows(2) {
        assert!(window[0].distance <= window[1].distance);
    }
    assert!(matches
        .iter()
        .all(|m| m.similarity > 0.0 && m.similarity <= 1.0));
    assert!(report.binary_rows >= matches.len());
}

#[test]
fn survival_horizons_are_ordered_and_curves_monotone() {
    let cohort = synthetic_cohort(150, 29);
    let (artifact, _) = train_artifact(&cohort, &TrainConfig::default()).unwrap();

    let curve = artifact.survival_curve(&high_risk_input()).unwrap().unwrap();
    assert_relative_eq!(curve.points[0].probability, 1.0);
    for window in curve.points.windows(2) {
        assert!(window[1].probability <= window[0].probability + 1e-12);
    }
    assert!(curve.one_year >= curve.three_year);
    assert!(curve.three_year >= curve.five_year);
    assert!(!curve.degraded);

    let low = artifact.survival_curve(&low_risk_input()).unwrap().unwrap();
    assert!(low.five_year >= curve.five_year);
}

#[test]
fn handle_swap_is_atomic_for_concurrent_readers() {
    let cohort = synthetic_cohort(120, 31);
    let (artifact, _) = train_artifact(&cohort, &TrainConfig::default()).unwrap();
    let first_probability = artifact.score(&high_risk_input()).unwrap().probability;

    let handle = std::sync::Arc::new(ArtifactHandle::new(artifact));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = std::sync::Arc::clone(&handle);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let artifact = handle.current();
                    let p = artifact.score(&high_risk_input()).unwrap().probability;
                    assert!((0.0..=1.0).contains(&p));
                }
            })
        })
        .collect();

    // retrain with a different seed and swap mid-flight
    let retrained_cohort = synthetic_cohort(120, 33);
    let (retrained, _) = train_artifact(&retrained_cohort, &TrainConfig::default()).unwrap();
    let second_probability = retrained.score(&high_risk_input()).unwrap().probability;
    let previous = handle.swap(retrained);

    for reader in readers {
        reader.join().unwrap();
    }

    // the old snapshot stays usable, new requests see the replacement
    assert_eq!(
        previous.score(&high_risk_input()).unwrap().probability,
        first_probability
    );
    assert_eq!(
        handle.current().score(&high_risk_input()).unwrap().probability,
        second_probability
    );
}
