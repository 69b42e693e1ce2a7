//! Authentication scoring of a live acquisition against an enrollment set.

use super::distance::distance;
use super::features::FeatureSet;
use super::float::StoredFloat;
use super::variability::{column, template_dynamics};
use crate::config::{ClassificationFunction, ClassifierConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

/// Authentication score. Lower values are more likely genuine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredFloat", into = "StoredFloat")]
pub enum Score {
    /// The enrollment set is still below capacity
    NotEnoughData,
    /// Live and enrolled feature shapes do not match
    CapturingError,
    Value(f64),
}

impl Score {
    pub const NOT_ENOUGH_DATA: f64 = -1.0;
    pub const CAPTURING_ERROR: f64 = -2.0;

    /// Numeric encoding with the sentinel values for the two error states.
    pub fn as_f64(&self) -> f64 {
        match self {
            Score::NotEnoughData => Self::NOT_ENOUGH_DATA,
            Score::CapturingError => Self::CAPTURING_ERROR,
            Score::Value(v) => *v,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Score::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.value().is_none()
    }
}

impl From<f64> for Score {
    fn from(v: f64) -> Self {
        if v == Self::NOT_ENOUGH_DATA {
            Score::NotEnoughData
        } else if v == Self::CAPTURING_ERROR {
            Score::CapturingError
        } else {
            Score::Value(v)
        }
    }
}

impl From<StoredFloat> for Score {
    fn from(v: StoredFloat) -> Self {
        Score::from(v.0)
    }
}

impl From<Score> for StoredFloat {
    fn from(score: Score) -> Self {
        StoredFloat(score.as_f64())
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.as_f64()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::NotEnoughData => write!(f, "not enough data"),
            Score::CapturingError => write!(f, "capturing error"),
            Score::Value(v) => write!(f, "{v:.4}"),
        }
    }
}

/// Scores live acquisitions with one classifier configuration.
pub struct AuthenticationScorer<'a> {
    config: &'a ClassifierConfig,
}

impl<'a> AuthenticationScorer<'a> {
    pub fn new(config: &'a ClassifierConfig) -> Self {
        Self { config }
    }

    /// Score `live` against the enrolled records.
    ///
    /// `variability` must have been computed from the same `enrollment` with
    /// the same configuration.
    pub fn score(
        &self,
        live: &FeatureSet,
        enrollment: &[FeatureSet],
        variability: &[f64],
        locked: bool,
    ) -> Score {
        if enrollment.is_empty() || (!locked && enrollment.len() < self.config.acquisition_set_size) {
            info!(
                enrolled = enrollment.len(),
                required = self.config.acquisition_set_size,
                "Enrollment set too small for authentication"
            );
            return Score::NotEnoughData;
        }

        let feature_count = enrollment[0].feature_count();
        if live.feature_count() != feature_count {
            error!(
                live = live.feature_count(),
                enrolled = feature_count,
                "Authentication data has wrong feature count"
            );
            return Score::CapturingError;
        }

        let function = self.config.distance_function;
        let mut total = 0.0;
        let mut skipped = 0usize;

        for delta in 0..feature_count {
            let enrolled = column(enrollment, delta);
            let live_matrix = match live.get(delta) {
                Some(m) => m,
                None => return Score::CapturingError,
            };
            let v = variability.get(delta).copied().unwrap_or(f64::NAN);

            let candidates: Vec<usize> = match self.config.classification_function {
                ClassificationFunction::Temp => match template_dynamics(&enrolled, function) {
                    Some(tu) => vec![tu],
                    None => {
                        skipped += 1;
                        continue;
                    }
                },
                _ => (0..enrolled.len()).collect(),
            };

            for &e in &candidates {
                if enrolled[e].len() != live_matrix.len() {
                    error!(
                        feature = delta,
                        live = live_matrix.len(),
                        enrolled = enrolled[e].len(),
                        "Authentication data has wrong sample count"
                    );
                    return Score::CapturingError;
                }
            }

            if v.is_nan() {
                skipped += 1;
                continue;
            }
            if live_matrix.is_empty() || v == 0.0 {
                continue;
            }

            let distances = candidates
                .iter()
                .map(|&e| distance(enrolled[e], live_matrix, function));
            let d = match self.config.classification_function {
                ClassificationFunction::Min => distances.fold(f64::INFINITY, f64::min),
                ClassificationFunction::Max => distances.fold(f64::NEG_INFINITY, f64::max),
                ClassificationFunction::Mean | ClassificationFunction::Temp => {
                    distances.sum::<f64>() / candidates.len() as f64
                }
            };

            total += d / v;
        }

        let used = feature_count - skipped;
        if used == 0 {
            info!("No usable features for authentication");
            return Score::NotEnoughData;
        }

        Score::Value(total / used as f64)
    }
}
