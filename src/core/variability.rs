//! Per-feature variability of an enrollment set.
//!
//! The variability of a feature is the normalisation divisor used by the
//! scorer. `NaN` marks a feature that has no enrolled samples (an untracked
//! sensor or a disabled touch property) and must be skipped.

use super::distance::distance;
use super::features::{FeatureMatrix, FeatureSet};
use crate::config::{ClassificationFunction, DistanceFunction};
use statrs::statistics::Statistics;

/// Matrices of one feature across all enrolled records.
pub(crate) fn column<'a>(enrollment: &'a [FeatureSet], feature: usize) -> Vec<&'a FeatureMatrix> {
    enrollment
        .iter()
        .filter_map(|record| record.get(feature))
        .collect()
}

/// True if the enrollment holds no samples for this feature.
pub(crate) fn is_empty_column(column: &[&FeatureMatrix]) -> bool {
    column.first().map_or(true, |m| m.is_empty())
}

/// Index of the enrolled sample with minimum average distance to all the
/// others (the "template dynamics"). `None` for an empty feature.
pub fn template_dynamics(column: &[&FeatureMatrix], function: DistanceFunction) -> Option<usize> {
    if is_empty_column(column) {
        return None;
    }
    if column.len() == 1 {
        return Some(0);
    }

    let e_count = column.len();
    let mut best = None;
    let mut best_avg = f64::INFINITY;

    for e in 0..e_count {
        let total: f64 = (0..e_count)
            .filter(|&i| i != e)
            .map(|i| distance(column[e], column[i], function))
            .sum();
        let avg = total / (e_count - 1) as f64;
        if avg < best_avg {
            best = Some(e);
            best_avg = avg;
        }
    }

    best
}

/// Variability of a single feature column.
pub fn feature_variability(
    column: &[&FeatureMatrix],
    classification: ClassificationFunction,
    function: DistanceFunction,
) -> f64 {
    if is_empty_column(column) {
        return f64::NAN;
    }

    let e_count = column.len();

    if classification == ClassificationFunction::Temp {
        let Some(tu) = template_dynamics(column, function) else {
            return f64::NAN;
        };
        let total: f64 = (0..e_count)
            .filter(|&e| e != tu)
            .map(|e| distance(column[e], column[tu], function))
            .sum();
        return total / e_count as f64;
    }

    if e_count < 2 {
        return f64::NAN;
    }

    let per_sample: Vec<f64> = (0..e_count)
        .map(|e| {
            let neighbours = (0..e_count)
                .filter(|&i| i != e)
                .map(|i| distance(column[e], column[i], function));
            match classification {
                ClassificationFunction::Min => neighbours.fold(f64::INFINITY, f64::min),
                ClassificationFunction::Max => neighbours.fold(f64::NEG_INFINITY, f64::max),
                _ => neighbours.sum::<f64>() / (e_count - 1) as f64,
            }
        })
        .collect();

    per_sample.iter().mean()
}

/// Variability vector for every slot of the feature layout.
pub fn variability(
    enrollment: &[FeatureSet],
    classification: ClassificationFunction,
    function: DistanceFunction,
) -> Vec<f64> {
    let feature_count = enrollment.first().map_or(0, |r| r.feature_count());

    (0..feature_count)
        .map(|delta| feature_variability(&column(enrollment, delta), classification, function))
        .collect()
}
