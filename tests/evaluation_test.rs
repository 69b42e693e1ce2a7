//! Integration tests for EER computation, cross-validation and the optimizer

use chrono::Utc;
use std::sync::atomic::AtomicBool;
use synheart_typing_auth::capture::{Acquisition, Keystroke, SensorType};
use synheart_typing_auth::config::{ClassifierConfig, OptimizerConfig};
use synheart_typing_auth::evaluation::optimizer::Dimension;
use synheart_typing_auth::evaluation::{
    calc_eer, cross_validate, cross_validate_parallel, evaluate, optimize, Corpus, Subject,
};
use synheart_typing_auth::EvaluationError;

const INC: f64 = 0.01;

struct XorShift(u64);

impl XorShift {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn acquisition(base: f64, rng: &mut XorShift) -> Acquisition {
    let mut acquisition = Acquisition::new(0, 0, Utc::now());
    acquisition.keystrokes = (0..8)
        .map(|_| {
            let value = base + rng.next_f64();
            Keystroke {
                x: value,
                y: value,
                size: value,
                orientation: value,
                pressure: value,
                down_down_interval: 100.0,
                up_down_interval: (base * 10.0 + rng.next_f64() * 5.0).round(),
                sensors: SensorType::ALL
                    .into_iter()
                    .map(|s| (s, vec![value, value, value]))
                    .collect(),
            }
        })
        .collect();
    acquisition
}

/// Subjects typing around clearly different base values.
fn corpus(subjects: usize) -> Corpus {
    let mut rng = XorShift(0xc0ffee);
    Corpus::new(
        (0..subjects)
            .map(|s| {
                let base = 10.0 * (s + 1) as f64;
                Subject {
                    id: format!("subject{s}"),
                    acquisitions: (0..12).map(|_| acquisition(base, &mut rng)).collect(),
                }
            })
            .collect(),
    )
}

#[test]
fn test_calc_eer() {
    let mut p = Vec::new();
    let mut n = Vec::new();
    assert!(calc_eer(&p, &n, INC).eer.is_nan());

    p.push(0.1);
    n.push(0.2);
    assert_eq!(calc_eer(&p, &n, INC).eer, 0.0);

    p.push(0.2);
    n.push(0.1);
    assert_eq!(calc_eer(&p, &n, INC).eer, 0.5);

    for _ in 0..2 {
        p.push(0.1);
        n.push(0.2);
    }
    assert_eq!(calc_eer(&p, &n, INC).eer, 0.25);

    for _ in 0..2 {
        p.push(0.2);
        n.push(0.1);
    }
    assert_eq!(calc_eer(&p, &n, INC).eer, 0.5);
}

#[test]
fn test_roc_points_are_monotonic() {
    let report = calc_eer(&[0.3, 0.8, 1.5, 2.0], &[0.5, 1.0, 4.0, 9.0], INC);

    for pair in report.points.windows(2) {
        assert!(pair[0].threshold < pair[1].threshold);
        assert!(pair[0].far <= pair[1].far);
        assert!(pair[0].frr >= pair[1].frr);
    }
    let zero_frr = report.zero_frr.unwrap();
    assert_eq!(zero_frr.frr, 0.0);
    assert!(zero_frr.threshold > 2.0);
    assert!(report.zero_far.unwrap().far == 0.0);
}

#[test]
fn test_cross_validation_separates_subjects() {
    let corpus = corpus(3);
    let scores = cross_validate(&corpus, &ClassifierConfig::default()).unwrap();

    // ten enrollment sessions per subject score NotEnoughData
    assert_eq!(scores.genuine.len(), 3 * 2);
    assert_eq!(scores.impostor.len(), 3 * 2 * 12);

    let report = scores.eer(INC);
    assert_eq!(report.eer, 0.0);
    assert!(report.zero_far.is_some());
}

#[test]
fn test_parallel_matches_sequential() {
    let corpus = corpus(4);
    let config = ClassifierConfig::default();

    let sequential = cross_validate(&corpus, &config).unwrap();
    for workers in [1, 3, 8] {
        let parallel = cross_validate_parallel(&corpus, &config, workers).unwrap();
        assert_eq!(parallel, sequential, "workers = {workers}");
    }
}

#[test]
fn test_single_subject_is_rejected() {
    let result = cross_validate(&corpus(1), &ClassifierConfig::default());
    assert!(matches!(result, Err(EvaluationError::EmptyCorpus)));
}

#[test]
fn test_evaluate_report() {
    let corpus = corpus(3);
    let report = evaluate(&corpus, &ClassifierConfig::default(), INC, 2).unwrap();

    assert_eq!(report.subjects, 3);
    assert_eq!(report.acquisitions, 36);
    assert_eq!(report.roc.genuine_count, report.scores.genuine.len());
    assert!(report.summary().contains("EER"));
}

#[test]
fn test_optimize_single_dimension() {
    let corpus = corpus(3);
    let settings = OptimizerConfig {
        workers: 2,
        ..OptimizerConfig::default()
    };
    let cancel = AtomicBool::new(false);

    let report = optimize(
        &corpus,
        &ClassifierConfig::default(),
        &settings,
        &[Dimension::DistanceFunction, Dimension::ClassificationFunction],
        &cancel,
    )
    .unwrap();

    assert_eq!(report.dimensions.len(), 2);
    assert_eq!(report.dimensions[0].candidates.len(), 2);
    assert_eq!(report.dimensions[1].candidates.len(), 4);
    assert_eq!(report.dimensions[0].candidates[0].label, "manhattan");
    assert!(report.best.is_some());
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn test_optimize_cancelled() {
    let corpus = corpus(3);
    let cancel = AtomicBool::new(true);

    let result = optimize(
        &corpus,
        &ClassifierConfig::default(),
        &OptimizerConfig::default(),
        &Dimension::ALL,
        &cancel,
    );
    assert!(matches!(result, Err(EvaluationError::Cancelled)));
}

#[test]
fn test_unusable_config_is_rejected() {
    let corpus = corpus(3);
    let config = ClassifierConfig {
        template_set_size: 0,
        ..ClassifierConfig::default()
    };

    let result = evaluate(&corpus, &config, INC, 2);
    assert!(matches!(result, Err(EvaluationError::Config(_))));

    let result = optimize(
        &corpus,
        &config,
        &OptimizerConfig::default(),
        &[Dimension::DistanceFunction],
        &AtomicBool::new(false),
    );
    assert!(matches!(result, Err(EvaluationError::Config(_))));
}

#[test]
fn test_unusable_interval_is_reported() {
    let mut corpus = corpus(3);
    corpus.subjects[1].acquisitions[4].keystrokes[2].down_down_interval = f64::INFINITY;

    let result = cross_validate(&corpus, &ClassifierConfig::default());
    assert!(matches!(result, Err(EvaluationError::Capture(_))));
}
