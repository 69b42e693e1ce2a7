//! Exhaustive per-dimension parameter search.
//!
//! Each dimension is searched on its own: every candidate differs from the
//! base configuration in that dimension only, and is rated by the EER of a
//! full leave-one-subject-out cross-validation. Candidates are independent,
//! so they are handed to a pool of worker threads over a channel. The search
//! can be cancelled between candidates; a cancelled search yields no report.

use super::corpus::Corpus;
use super::cross_validation::cross_validate;
use super::EvaluationError;
use crate::capture::types::SensorType;
use crate::config::{
    ClassificationFunction, ClassifierConfig, DistanceFunction, OptimizerConfig,
    TemplateSelectionFunction,
};
use crate::core::features::TouchProperty;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A configuration axis searched by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    DistanceFunction,
    ClassificationFunction,
    AcquisitionSetSize,
    /// Selection strategy and template set size, searched jointly
    TemplateSelection,
    Sensors,
    TouchProperties,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::DistanceFunction,
        Dimension::ClassificationFunction,
        Dimension::AcquisitionSetSize,
        Dimension::TemplateSelection,
        Dimension::Sensors,
        Dimension::TouchProperties,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::DistanceFunction => "distance_function",
            Dimension::ClassificationFunction => "classification_function",
            Dimension::AcquisitionSetSize => "acquisition_set_size",
            Dimension::TemplateSelection => "template_selection",
            Dimension::Sensors => "sensors",
            Dimension::TouchProperties => "touch_properties",
        }
    }

    /// Every candidate configuration of this dimension, derived from `base`.
    pub fn candidates(&self, base: &ClassifierConfig, max_acquisition_set_size: usize) -> Vec<Candidate> {
        let dimension = *self;
        let candidate = |label: String, config: ClassifierConfig| Candidate {
            dimension,
            label,
            config,
        };

        match self {
            Dimension::DistanceFunction => DistanceFunction::ALL
                .iter()
                .map(|&f| {
                    let mut config = base.clone();
                    config.distance_function = f;
                    candidate(f.to_string(), config)
                })
                .collect(),
            Dimension::ClassificationFunction => ClassificationFunction::ALL
                .iter()
                .map(|&f| {
                    let mut config = base.clone();
                    config.classification_function = f;
                    candidate(f.to_string(), config)
                })
                .collect(),
            Dimension::AcquisitionSetSize => (2..=max_acquisition_set_size)
                .map(|size| {
                    let mut config = base.clone();
                    config.acquisition_set_size = size;
                    config.template_set_size = base.template_set_size.min(size);
                    candidate(size.to_string(), config)
                })
                .collect(),
            Dimension::TemplateSelection => {
                let mut candidates = Vec::new();
                for function in TemplateSelectionFunction::ALL {
                    let sizes = match function {
                        TemplateSelectionFunction::None => {
                            base.acquisition_set_size..=base.acquisition_set_size
                        }
                        _ => 2..=base.acquisition_set_size,
                    };
                    for size in sizes {
                        let mut config = base.clone();
                        config.enable_template_selection = true;
                        config.template_selection_function = function;
                        config.template_set_size = size;
                        candidates.push(candidate(format!("{function}/{size}"), config));
                    }
                }
                candidates
            }
            Dimension::Sensors => power_set(&SensorType::ALL)
                .into_iter()
                .map(|sensors| {
                    let label = set_label(sensors.iter().map(|s| s.name()));
                    let mut config = base.clone();
                    config.used_sensors = sensors;
                    candidate(label, config)
                })
                .collect(),
            Dimension::TouchProperties => power_set(&TouchProperty::ALL)
                .into_iter()
                .map(|properties| {
                    let label = set_label(properties.iter().map(|p| p.name()));
                    let mut config = base.clone();
                    config.used_touch_properties = properties;
                    candidate(label, config)
                })
                .collect(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Dimension::ALL.iter().map(|d| d.name()).collect();
                format!("unknown dimension '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// All subsets of `items`, the empty set first.
fn power_set<T: Copy + Ord>(items: &[T]) -> Vec<BTreeSet<T>> {
    (0..1usize << items.len())
        .map(|mask| {
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &item)| item)
                .collect()
        })
        .collect()
}

fn set_label<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let label = names.collect::<Vec<_>>().join("+");
    if label.is_empty() {
        "none".to_string()
    } else {
        label
    }
}

/// One configuration to evaluate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub dimension: Dimension,
    pub label: String,
    pub config: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub label: String,
    /// `NaN` when the candidate produced no impostor scores
    pub eer: f64,
    pub config: ClassifierConfig,
}

/// Candidate series of one dimension, in candidate order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionReport {
    pub dimension: Dimension,
    pub candidates: Vec<CandidateResult>,
    pub best: Option<CandidateResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub base: ClassifierConfig,
    pub dimensions: Vec<DimensionReport>,
    /// Lowest EER over every evaluated candidate
    pub best: Option<CandidateResult>,
}

impl OptimizationReport {
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for report in &self.dimensions {
            match &report.best {
                Some(best) => lines.push(format!(
                    "{:<24} best {:<40} EER {:.4} ({} candidates)",
                    report.dimension.name(),
                    best.label,
                    best.eer,
                    report.candidates.len()
                )),
                None => lines.push(format!(
                    "{:<24} no candidate produced an EER",
                    report.dimension.name()
                )),
            }
        }
        lines.join("\n")
    }
}

/// Lowest non-NaN EER; the earliest candidate wins ties.
fn best_of<'a>(results: impl Iterator<Item = &'a CandidateResult>) -> Option<CandidateResult> {
    let mut best: Option<&CandidateResult> = None;
    for result in results.filter(|r| !r.eer.is_nan()) {
        if best.map_or(true, |b| result.eer < b.eer) {
            best = Some(result);
        }
    }
    best.cloned()
}

/// Search `dimensions` around `base`.
///
/// Returns [`EvaluationError::Cancelled`] once `cancel` is set; candidates
/// already running are finished first.
pub fn optimize(
    corpus: &Corpus,
    base: &ClassifierConfig,
    settings: &OptimizerConfig,
    dimensions: &[Dimension],
    cancel: &AtomicBool,
) -> Result<OptimizationReport, EvaluationError> {
    if corpus.subjects.len() < 2 {
        return Err(EvaluationError::EmptyCorpus);
    }
    base.validate()?;

    let started_at = Utc::now();
    let candidates: Vec<Candidate> = dimensions
        .iter()
        .flat_map(|d| d.candidates(base, settings.max_acquisition_set_size))
        .collect();
    let workers = settings.workers.clamp(1, candidates.len().max(1));

    info!(
        candidates = candidates.len(),
        workers,
        dimensions = dimensions.len(),
        "Starting parameter search"
    );

    let (job_tx, job_rx) = bounded::<usize>(workers * 2);
    let (result_tx, result_rx) = unbounded::<(usize, Result<f64, EvaluationError>)>();
    let mut eers: Vec<Option<Result<f64, EvaluationError>>> =
        (0..candidates.len()).map(|_| None).collect();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let candidates = &candidates;
            scope.spawn(move || {
                for i in job_rx.iter() {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let candidate = &candidates[i];
                    let result = cross_validate(corpus, &candidate.config)
                        .map(|scores| scores.eer(settings.threshold_increment).eer);
                    if let Ok(eer) = &result {
                        info!(
                            dimension = %candidate.dimension,
                            candidate = %candidate.label,
                            eer,
                            "Candidate evaluated"
                        );
                    }
                    if result_tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for i in 0..candidates.len() {
            if cancel.load(Ordering::SeqCst) || job_tx.send(i).is_err() {
                break;
            }
        }
        drop(job_tx);

        for (i, result) in result_rx.iter() {
            eers[i] = Some(result);
        }
    });

    if cancel.load(Ordering::SeqCst) {
        warn!("Parameter search cancelled");
        return Err(EvaluationError::Cancelled);
    }

    let mut results: Vec<(Dimension, CandidateResult)> = Vec::with_capacity(candidates.len());
    for (candidate, eer) in candidates.into_iter().zip(eers) {
        let eer = match eer {
            Some(result) => result?,
            None => return Err(EvaluationError::Cancelled),
        };
        results.push((
            candidate.dimension,
            CandidateResult {
                label: candidate.label,
                eer,
                config: candidate.config,
            },
        ));
    }

    let dimensions: Vec<DimensionReport> = dimensions
        .iter()
        .map(|&dimension| {
            let candidates: Vec<CandidateResult> = results
                .iter()
                .filter(|(d, _)| *d == dimension)
                .map(|(_, r)| r.clone())
                .collect();
            let best = best_of(candidates.iter());
            debug!(dimension = %dimension, best = ?best.as_ref().map(|b| &b.label), "Dimension searched");
            DimensionReport {
                dimension,
                candidates,
                best,
            }
        })
        .collect();
    let best = best_of(results.iter().map(|(_, r)| r));

    Ok(OptimizationReport {
        run_id: Uuid::new_v4(),
        started_at,
        finished_at: Utc::now(),
        base: base.clone(),
        dimensions,
        best,
    })
}
