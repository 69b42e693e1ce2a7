//! Distances between feature matrices.
//!
//! Both functions expect inputs of identical shape; the scorer checks shapes
//! before calling in here.

use super::features::{FeatureMatrix, FeatureSet};
use crate::config::DistanceFunction;

/// Distance between two points.
pub fn point_distance(a: &[f64], b: &[f64], function: DistanceFunction) -> f64 {
    let pairs = a.iter().zip(b.iter());
    match function {
        DistanceFunction::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        DistanceFunction::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum(),
    }
}

/// Distance between two matrices of one feature, averaged over samples.
///
/// Returns 0 for empty matrices.
pub fn distance(a: &FeatureMatrix, b: &FeatureMatrix, function: DistanceFunction) -> f64 {
    if a.is_empty() {
        return 0.0;
    }

    let total: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(sa, sb)| point_distance(sa, sb, function))
        .sum();

    total / a.len() as f64
}

/// Per-feature distances summed over all features, divided by feature count.
pub fn feature_distance(a: &FeatureSet, b: &FeatureSet, function: DistanceFunction) -> f64 {
    feature_distance_masked(a, b, function, &[])
}

/// Like [`feature_distance`], but features flagged in `skip` are ignored and
/// excluded from the denominator.
pub fn feature_distance_masked(
    a: &FeatureSet,
    b: &FeatureSet,
    function: DistanceFunction,
    skip: &[bool],
) -> f64 {
    let mut total = 0.0;
    let mut used = 0usize;

    for (i, (fa, fb)) in a.matrices().iter().zip(b.matrices()).enumerate() {
        if skip.get(i).copied().unwrap_or(false) {
            continue;
        }
        total += distance(fa, fb, function);
        used += 1;
    }

    if used == 0 {
        0.0
    } else {
        total / used as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> FeatureMatrix {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_manhattan_and_squared_euclidean() {
        let a = matrix(&[&[0.0, 0.0], &[1.0, 1.0]]);
        let b = matrix(&[&[3.0, 4.0], &[1.0, 1.0]]);

        assert_eq!(distance(&a, &b, DistanceFunction::Manhattan), 3.5);
        assert_eq!(distance(&a, &b, DistanceFunction::Euclidean), 12.5);
    }

    #[test]
    fn test_symmetry() {
        let a = matrix(&[&[0.3, -1.2], &[5.0, 2.5], &[0.0, 9.0]]);
        let b = matrix(&[&[1.1, 0.4], &[-2.0, 2.5], &[7.5, 1.0]]);

        for function in DistanceFunction::ALL {
            assert_eq!(distance(&a, &b, function), distance(&b, &a, function));
        }
    }

    #[test]
    fn test_feature_distance_averages_features() {
        let a = FeatureSet::from_matrices(vec![matrix(&[&[1.0]]), matrix(&[&[0.0]])]);
        let b = FeatureSet::from_matrices(vec![matrix(&[&[3.0]]), matrix(&[&[4.0]])]);

        assert_eq!(feature_distance(&a, &b, DistanceFunction::Manhattan), 3.0);
        assert_eq!(
            feature_distance_masked(&a, &b, DistanceFunction::Manhattan, &[true, false]),
            4.0
        );
    }
}
