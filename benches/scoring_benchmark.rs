use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use endorisk::{
    train_artifact, ModelArtifact, Outcome, PatientInput, PatientRecord, TrainConfig,
};

fn synthetic_cohort(n: usize, seed: u64) -> Vec<PatientRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let aggressive = i % 3 == 0;
            let input = PatientInput {
                age: Some(rng.gen_range(40.0..85.0)),
                bmi: Some(rng.gen_range(20.0..42.0)),
                histologic_grade: Some(if aggressive { 2.0 } else { 1.0 }),
                tumor_size_cm: Some(rng.gen_range(0.5..9.0)),
                myometrial_invasion: Some(if aggressive { 2.0 } else { 1.0 }),
                lvsi: Some(if aggressive { 1.0 } else { 0.0 }),
                cervical_stromal_invasion: Some(0.0),
                p53_status: Some(if aggressive { 2.0 } else { 1.0 }),
                er_percent: Some(rng.gen_range(0.0..100.0)),
                pr_percent: Some(rng.gen_range(0.0..100.0)),
                figo_stage: Some(if aggressive { 7.0 } else { 1.0 }),
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
                follow_up_days: Some(rng.gen_range(90.0..2600.0)),
                diagnosis_date: None,
                last_contact_date: None,
                treatment: None,
            }
        })
        .collect()
}

fn query_input() -> PatientInput {
    PatientInput {
        age: Some(63.0),
        bmi: Some(31.0),
        histologic_grade: Some(2.0),
        tumor_size_cm: Some(4.5),
        myometrial_invasion: Some(2.0),
        lvsi: Some(1.0),
        cervical_stromal_invasion: Some(0.0),
        p53_status: Some(2.0),
        er_percent: Some(40.0),
        pr_percent: Some(30.0),
        figo_stage: Some(5.0),
    }
}

fn trained_artifact(n: usize) -> ModelArtifact {
    let cohort = synthetic_cohort(n, 42);
    let (artifact, _) = train_artifact(&cohort, &TrainConfig::default()).unwrap();
    artifact
}

fn bench_training(c: &mut Criterion) {
    let cohort = synthetic_cohort(200, 42);
    c.bench_function("train_cohort_200", |b| {
        b.iter(|| train_artifact(black_box(&cohort), &TrainConfig::default()).unwrap())
    });
}

fn bench_scoring(c: &mut Criterion) {
    let artifact = trained_artifact(200);
    let input = query_input();
    c.bench_function("score_single_patient", |b| {
        b.iter(|| artifact.score(black_box(&input)).unwrap())
    });
}

fn bench_similarity(c: &mut Criterion) {
    let artifact = trained_artifact(1000);
    let input = query_input();
    c.bench_function("similar_patients_k5_cohort_1000", |b| {
        b.iter(|| artifact.similar_patients(black_box(&input), 5).unwrap())
    });
}

fn bench_survival_curve(c: &mut Criterion) {
    let artifact = trained_artifact(200);
    let input = query_input();
    c.bench_function("survival_curve_single_patient", |b| {
        b.iter(|| artifact.survival_curve(black_box(&input)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_training,
    bench_scoring,
    bench_similarity,
    bench_survival_curve
);
criterion_main!(benches);
