//! Offline evaluation of classifier configurations.
//!
//! Everything here runs in discard mode against fresh in-memory stores and
//! never touches production enrollment data.

pub mod corpus;
pub mod cross_validation;
pub mod optimizer;
pub mod roc;

pub use corpus::{Corpus, Subject};
pub use cross_validation::{cross_validate, cross_validate_parallel, ScoreLists};
pub use optimizer::{optimize, CandidateResult, DimensionReport, OptimizationReport};
pub use roc::{calc_eer, EerReport, RocPoint};

use crate::capture::session::CaptureError;
use crate::config::{ClassifierConfig, ConfigError};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Could not load corpus from {path}: {reason}")]
    Corpus { path: PathBuf, reason: String },
    #[error("Enrollment store error: {0}")]
    Store(#[from] StoreError),
    #[error("Evaluation cancelled")]
    Cancelled,
    #[error("Cross-validation needs at least two subjects")]
    EmptyCorpus,
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Could not replay acquisition: {0}")]
    Capture(CaptureError),
}

impl From<CaptureError> for EvaluationError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Store(e) => EvaluationError::Store(e),
            CaptureError::Config(e) => EvaluationError::Config(e),
            e @ CaptureError::InvalidTiming { .. } => EvaluationError::Capture(e),
        }
    }
}

/// Result of evaluating one configuration over a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub config: ClassifierConfig,
    pub subjects: usize,
    pub acquisitions: usize,
    pub scores: ScoreLists,
    pub roc: EerReport,
}

impl EvaluationReport {
    pub fn summary(&self) -> String {
        let zero_far = self
            .roc
            .zero_far
            .map(|p| format!("{:.4} (FRR {:.4})", p.threshold, p.frr))
            .unwrap_or_else(|| "n/a".to_string());
        let zero_frr = self
            .roc
            .zero_frr
            .map(|p| format!("{:.4} (FAR {:.4})", p.threshold, p.far))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "Subjects: {}\n\
             Acquisitions: {}\n\
             Genuine scores: {}\n\
             Impostor scores: {}\n\
             EER: {:.4} at threshold {:.4}\n\
             Zero-FAR threshold: {}\n\
             Zero-FRR threshold: {}",
            self.subjects,
            self.acquisitions,
            self.roc.genuine_count,
            self.roc.impostor_count,
            self.roc.eer,
            self.roc.eer_threshold,
            zero_far,
            zero_frr,
        )
    }
}

/// Cross-validate `config` over `corpus` and compute its ROC.
pub fn evaluate(
    corpus: &Corpus,
    config: &ClassifierConfig,
    threshold_increment: f64,
    workers: usize,
) -> Result<EvaluationReport, EvaluationError> {
    let scores = cross_validate_parallel(corpus, config, workers)?;
    let roc = scores.eer(threshold_increment);

    info!(
        eer = roc.eer,
        genuine = roc.genuine_count,
        impostor = roc.impostor_count,
        "Evaluation finished"
    );

    Ok(EvaluationReport {
        run_id: Uuid::new_v4(),
        evaluated_at: Utc::now(),
        config: config.clone(),
        subjects: corpus.len(),
        acquisitions: corpus.acquisition_count(),
        scores,
        roc,
    })
}
