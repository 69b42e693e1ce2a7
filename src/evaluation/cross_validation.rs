//! Leave-one-subject-out cross-validation.
//!
//! For every subject a fresh in-memory store is enrolled with that subject's
//! acquisitions (genuine scores), then every other subject is scored against
//! it without being stored (impostor scores). Sentinel scores are dropped.

use super::corpus::Corpus;
use super::roc::{calc_eer, EerReport};
use super::EvaluationError;
use crate::capture::input::ReplayInput;
use crate::capture::session::SessionCapture;
use crate::capture::types::Acquisition;
use crate::config::ClassifierConfig;
use crate::store::{EnrollmentKey, EnrollmentStore, MemoryStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// All study data is enrolled under a single input context.
pub const EVALUATION_CONTEXT: u64 = 0;

/// Genuine and impostor scores of one evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreLists {
    pub genuine: Vec<f64>,
    pub impostor: Vec<f64>,
}

impl ScoreLists {
    pub fn extend(&mut self, other: ScoreLists) {
        self.genuine.extend(other.genuine);
        self.impostor.extend(other.impostor);
    }

    pub fn eer(&self, increment: f64) -> EerReport {
        calc_eer(&self.genuine, &self.impostor, increment)
    }
}

fn key_for(acquisition: &Acquisition) -> EnrollmentKey {
    EnrollmentKey::new(EVALUATION_CONTEXT, acquisition.screen_orientation)
}

fn score_into<S: EnrollmentStore>(
    session: &mut SessionCapture<S>,
    acquisition: &Acquisition,
    discard: bool,
    scores: &mut Vec<f64>,
) -> Result<(), EvaluationError> {
    let mut input = ReplayInput::new(acquisition)?;
    let score = session.run(key_for(acquisition), &mut input, discard)?;
    if let Some(value) = score.and_then(|s| s.value()) {
        scores.push(value);
    }
    Ok(())
}

/// Enroll `genuine` and score every other subject against it.
pub fn evaluate_subject(
    corpus: &Corpus,
    genuine: usize,
    config: &ClassifierConfig,
) -> Result<ScoreLists, EvaluationError> {
    let store = MemoryStore::new();
    let mut session = SessionCapture::new(config.clone(), &store)?;
    let mut scores = ScoreLists::default();

    let Some(subject) = corpus.subjects.get(genuine) else {
        return Ok(scores);
    };

    for acquisition in &subject.acquisitions {
        score_into(&mut session, acquisition, false, &mut scores.genuine)?;
    }

    for (j, other) in corpus.subjects.iter().enumerate() {
        if j == genuine {
            continue;
        }
        for acquisition in &other.acquisitions {
            score_into(&mut session, acquisition, true, &mut scores.impostor)?;
        }
    }

    debug!(
        subject = %subject.id,
        genuine = scores.genuine.len(),
        impostor = scores.impostor.len(),
        "Subject evaluated"
    );
    Ok(scores)
}

fn check_inputs(corpus: &Corpus, config: &ClassifierConfig) -> Result<(), EvaluationError> {
    if corpus.subjects.len() < 2 {
        return Err(EvaluationError::EmptyCorpus);
    }
    config.validate()?;
    Ok(())
}

/// Sequential cross-validation over the whole corpus.
pub fn cross_validate(
    corpus: &Corpus,
    config: &ClassifierConfig,
) -> Result<ScoreLists, EvaluationError> {
    check_inputs(corpus, config)?;

    let mut scores = ScoreLists::default();
    for i in 0..corpus.subjects.len() {
        scores.extend(evaluate_subject(corpus, i, config)?);
    }
    Ok(scores)
}

/// Cross-validation with subjects spread over `workers` threads.
///
/// Scores are merged in subject order, so the result equals
/// [`cross_validate`].
pub fn cross_validate_parallel(
    corpus: &Corpus,
    config: &ClassifierConfig,
    workers: usize,
) -> Result<ScoreLists, EvaluationError> {
    check_inputs(corpus, config)?;

    let count = corpus.subjects.len();
    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<Option<Result<ScoreLists, EvaluationError>>>> =
        Mutex::new((0..count).map(|_| None).collect());

    std::thread::scope(|scope| {
        for _ in 0..workers.clamp(1, count) {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= count {
                    break;
                }
                let result = evaluate_subject(corpus, i, config);
                results.lock().unwrap_or_else(|e| e.into_inner())[i] = Some(result);
            });
        }
    });

    let mut scores = ScoreLists::default();
    for result in results.into_inner().unwrap_or_else(|e| e.into_inner()) {
        if let Some(result) = result {
            scores.extend(result?);
        }
    }
    Ok(scores)
}
