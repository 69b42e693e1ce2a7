//! Template selection: reduce N enrolled acquisitions to the K best.
//!
//! Every strategy is a pure function of the records (or their pairwise
//! distance matrix) and returns K indices into the input slice. Features
//! with no samples in any record are left out of all distance computations.

use super::dendrogram::Dendrogram;
use super::distance::feature_distance_masked;
use super::features::FeatureSet;
use super::fuzzy::FuzzyCMeans;
use crate::config::{ClassifierConfig, DistanceFunction, TemplateSelectionFunction};

/// Square, symmetric matrix of pairwise record distances.
pub type DistanceMatrix = Vec<Vec<f64>>;

/// Flags features that hold no samples in any record.
pub fn empty_feature_mask(records: &[FeatureSet]) -> Vec<bool> {
    let feature_count = records.first().map_or(0, |r| r.feature_count());
    (0..feature_count)
        .map(|delta| {
            records
                .iter()
                .all(|r| r.get(delta).map_or(true, |m| m.is_empty()))
        })
        .collect()
}

/// Pairwise distances between records over their non-empty features.
pub fn distance_matrix(records: &[FeatureSet], function: DistanceFunction) -> DistanceMatrix {
    let n = records.len();
    let skip = empty_feature_mask(records);
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = feature_distance_masked(&records[i], &records[j], function, &skip);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }

    matrix
}

/// Template selection strategy bound to its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateSelector {
    pub strategy: TemplateSelectionFunction,
    pub template_set_size: usize,
    pub distance_function: DistanceFunction,
}

impl TemplateSelector {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            strategy: config.template_selection_function,
            template_set_size: config.template_set_size,
            distance_function: config.distance_function,
        }
    }

    /// Indices of the records to keep, in selection order.
    ///
    /// With no strategy, or when there is nothing to reduce, every record is kept.
    pub fn select(&self, records: &[FeatureSet]) -> Vec<usize> {
        let n = records.len();
        let k = self.template_set_size.min(n);

        if self.strategy == TemplateSelectionFunction::None || k == n || n < 2 {
            return (0..n).collect();
        }

        match self.strategy {
            TemplateSelectionFunction::MdistMin => {
                mdist(&distance_matrix(records, self.distance_function), k, true)
            }
            TemplateSelectionFunction::MdistMax => {
                mdist(&distance_matrix(records, self.distance_function), k, false)
            }
            TemplateSelectionFunction::Gmms => {
                gmms(&distance_matrix(records, self.distance_function), k)
            }
            TemplateSelectionFunction::Dend => {
                let matrix = distance_matrix(records, self.distance_function);
                Dendrogram::complete_linkage(&matrix).select(k, &matrix)
            }
            TemplateSelectionFunction::FuzzyCMeans => {
                let skip = empty_feature_mask(records);
                let points: Vec<Vec<f64>> = records.iter().map(|r| r.flatten(&skip)).collect();
                FuzzyCMeans::new(k, self.distance_function).select(&points)
            }
            TemplateSelectionFunction::None => (0..n).collect(),
        }
    }
}

/// MDIST: keep the K records with the smallest (or largest) average distance
/// to all other records. Ties go to the lower index.
pub fn mdist(matrix: &DistanceMatrix, k: usize, select_min: bool) -> Vec<usize> {
    let n = matrix.len();
    if n < 2 {
        return (0..n).collect();
    }

    let mut averages: Vec<Option<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(j, row)| {
            let total: f64 = row
                .iter()
                .enumerate()
                .filter(|(m, _)| *m != j)
                .map(|(_, d)| d)
                .sum();
            Some(total / (n - 1) as f64)
        })
        .collect();

    let mut chosen = Vec::with_capacity(k);
    for _ in 0..k.min(n) {
        let mut best: Option<(usize, f64)> = None;
        for (j, avg) in averages.iter().enumerate() {
            let Some(avg) = *avg else { continue };
            let better = match best {
                None => true,
                Some((_, b)) if select_min => avg < b,
                Some((_, b)) => avg > b,
            };
            if better {
                best = Some((j, avg));
            }
        }

        if let Some((j, _)) = best {
            chosen.push(j);
            averages[j] = None;
        }
    }

    chosen
}

/// Greedy Maximum Match Scores: repeatedly take the record with the largest
/// summed distance to the records not chosen yet. Ties go to the later index.
pub fn gmms(matrix: &DistanceMatrix, k: usize) -> Vec<usize> {
    let n = matrix.len();
    let mut s = matrix.clone();
    let mut taken = vec![false; n];
    let mut chosen = Vec::with_capacity(k);

    for _ in 0..k.min(n) {
        let mut j_star = None;
        let mut max_sum = f64::NEG_INFINITY;

        for j in (0..n).filter(|&j| !taken[j]) {
            let sum: f64 = (0..n).filter(|&m| m != j).map(|m| s[j][m]).sum();
            if sum >= max_sum {
                j_star = Some(j);
                max_sum = sum;
            }
        }

        let Some(j) = j_star else { break };
        chosen.push(j);
        taken[j] = true;
        for m in 0..n {
            s[j][m] = 0.0;
            s[m][j] = 0.0;
        }
    }

    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FEATURE_COUNT;

    fn line_matrix(points: &[f64]) -> DistanceMatrix {
        points
            .iter()
            .map(|a| points.iter().map(|b| (a - b).abs()).collect())
            .collect()
    }

    fn record(value: f64) -> FeatureSet {
        let mut matrices = vec![Vec::new(); FEATURE_COUNT];
        matrices[1] = vec![vec![value]];
        FeatureSet::from_matrices(matrices)
    }

    #[test]
    fn test_mdist_min_and_max() {
        // distance sums: 13, 11, 11, 27
        let matrix = line_matrix(&[0.0, 1.0, 2.0, 10.0]);
        assert_eq!(mdist(&matrix, 2, true), vec![1, 2]);
        assert_eq!(mdist(&matrix, 2, false), vec![3, 0]);
    }

    #[test]
    fn test_gmms_never_reselects() {
        let matrix = line_matrix(&[0.0, 1.0, 2.0, 10.0]);
        let chosen = gmms(&matrix, 4);
        assert_eq!(chosen.len(), 4);
        assert_eq!(chosen[0], 3);

        let mut sorted = chosen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_distance_matrix_skips_empty_features() {
        let records: Vec<_> = [1.0, 4.0].iter().map(|&v| record(v)).collect();
        let matrix = distance_matrix(&records, DistanceFunction::Manhattan);
        // only one feature carries data, so it is not diluted by the empty ones
        assert_eq!(matrix[0][1], 3.0);
        assert_eq!(matrix[1][0], 3.0);
        assert_eq!(matrix[0][0], 0.0);
    }

    #[test]
    fn test_selector_cardinality() {
        let records: Vec<_> = [0.0, 0.5, 3.0, 3.2, 9.0, 9.1, 4.0]
            .iter()
            .map(|&v| record(v))
            .collect();

        for strategy in TemplateSelectionFunction::ALL {
            let selector = TemplateSelector {
                strategy,
                template_set_size: 3,
                distance_function: DistanceFunction::Manhattan,
            };
            let chosen = selector.select(&records);
            let expected = if strategy == TemplateSelectionFunction::None { 7 } else { 3 };
            assert_eq!(chosen.len(), expected, "{strategy}");
            assert!(chosen.iter().all(|&i| i < records.len()));
        }
    }
}
