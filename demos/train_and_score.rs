//! train on a synthetic cohort, score two contrasting patients, and persist
//! the artifact
//!
//! run with `cargo run --example train_and_score`

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use endorisk::{
    train_artifact, Outcome, PatientInput, PatientRecord, TrainConfig,
};

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
                    cervical_stromal_invasion: Some(1.0),
                    p53_status: Some(2.0),
                    er_percent: Some(rng.gen_range(0.0..20.0)),
                    pr_percent: Some(rng.gen_range(0.0..20.0)),
                    figo_stage: Some(rng.gen_range(5.0..10.0_f64).round()),
                }
            } else {
                PatientInput {
                    age: Some(rng.gen_range(40.0..70.0)),
                    bmi: Some(rng.gen_range(20.0..34.0)),
                    histologic_grade: Some(1.0),
                    tumor_size_cm: Some(rng.gen_range(0.5..4.0)),
                    myometrial_invasion: Some(1.0),
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
            PatientRecord {
                input,
                outcome: if recurred {
                    Outcome::Recurrence
                } else {
                    Outcome::NoRecurrence
                },
                follow_up_days: Some(if recurred {
                    rng.gen_range(90.0..900.0)
                } else {
                    rng.gen_range(700.0..2600.0)
                }),
                diagnosis_date: None,
                last_contact_date: None,
                treatment: None,
            }
        })
        .collect()
}

fn main() -> endorisk::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cohort = synthetic_cohort(200, 42);
    let (artifact, report) = train_artifact(&cohort, &TrainConfig::default())?;

    println!("=== Training Report ===");
    println!("cohort size:      {}", report.cohort_size);
    println!("train / test:     {} / {}", report.train_rows, report.test_rows);
    println!("recurrence rate:  {:.1}%", report.recurrence_rate * 100.0);
    println!("held-out AUC:     {:.3}", artifact.metrics.auc_roc);
    println!(
        "cv AUC:           {:.3} +/- {:.3}",
        artifact.metrics.cv_auc_mean, artifact.metrics.cv_auc_std
    );
    println!("survival fitted:  {}", report.survival_fitted);

    println!("\n=== Top Feature Importances ===");
    for (name, weight) in artifact.feature_importances.iter().take(5) {
        println!("  {:<28} {:.3}", name, weight);
    }

    let patients = [
        (
            "favorable pathology",
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
            },
        ),
        (
            "adverse pathology",
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
            },
        ),
    ];

    for (label, input) in &patients {
        let prediction = artifact.score(input)?;
        println!("\n=== {} ===", label);
        println!(
            "risk: {} ({:.1}%)",
            prediction.tier_label, prediction.probability_percent
        );
        for factor in &prediction.risk_factors {
            println!("  factor: {}", factor);
        }

        if let Some(curve) = artifact.survival_curve(input)? {
            println!(
                "recurrence-free survival: 1y {:.1}%  3y {:.1}%  5y {:.1}%{}",
                curve.one_year * 100.0,
                curve.three_year * 100.0,
                curve.five_year * 100.0,
                if curve.degraded { "  (degraded)" } else { "" }
            );
        }

        let neighbors = artifact.similar_patients(input, 3)?;
        println!("most similar historical patients:");
        for m in &neighbors {
            println!(
                "  similarity {:.2}  age {:?}  recurrence {}",
                m.similarity, m.summary.age, m.summary.recurrence
            );
        }
    }

    artifact.save("model")?;
    println!("\nartifact written to ./model");
    Ok(())
}
