//! Fuzzy C-means clustering of flattened acquisitions.

use crate::config::DistanceFunction;
use tracing::debug;

/// Fuzzy C-means clusterer with deterministic farthest-first seeding.
#[derive(Debug, Clone)]
pub struct FuzzyCMeans {
    clusters: usize,
    metric: DistanceFunction,
    /// Fuzziness exponent, must be > 1
    fuzziness: f64,
    epsilon: f64,
    max_iterations: usize,
}

/// Result of a clustering run.
#[derive(Debug, Clone)]
pub struct FuzzyClustering {
    pub centers: Vec<Vec<f64>>,
    /// `points × clusters` membership degrees, rows sum to 1
    pub memberships: Vec<Vec<f64>>,
    pub iterations: usize,
}

impl FuzzyCMeans {
    pub fn new(clusters: usize, metric: DistanceFunction) -> Self {
        Self {
            clusters,
            metric,
            fuzziness: 2.0,
            epsilon: 1e-3,
            max_iterations: 1000,
        }
    }

    /// Point metric. Euclidean is the true (rooted) distance here.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let pairs = a.iter().zip(b.iter());
        match self.metric {
            DistanceFunction::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            DistanceFunction::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
        }
    }

    fn seed(&self, points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
        let mut chosen = vec![0usize];

        while chosen.len() < k {
            let mut best = None;
            let mut best_dist = f64::NEG_INFINITY;
            for (i, point) in points.iter().enumerate() {
                if chosen.contains(&i) {
                    continue;
                }
                let nearest = chosen
                    .iter()
                    .map(|&c| self.distance(point, &points[c]))
                    .fold(f64::INFINITY, f64::min);
                if nearest > best_dist {
                    best = Some(i);
                    best_dist = nearest;
                }
            }
            match best {
                Some(i) => chosen.push(i),
                None => break,
            }
        }

        chosen.into_iter().map(|i| points[i].clone()).collect()
    }

    fn memberships(&self, points: &[Vec<f64>], centers: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let exponent = 2.0 / (self.fuzziness - 1.0);

        points
            .iter()
            .map(|point| {
                let distances: Vec<f64> = centers.iter().map(|c| self.distance(point, c)).collect();

                if let Some(hit) = distances.iter().position(|&d| d == 0.0) {
                    let mut row = vec![0.0; centers.len()];
                    row[hit] = 1.0;
                    return row;
                }

                distances
                    .iter()
                    .map(|&d_i| {
                        let sum: f64 = distances.iter().map(|&d_j| (d_i / d_j).powf(exponent)).sum();
                        1.0 / sum
                    })
                    .collect()
            })
            .collect()
    }

    fn update_centers(&self, points: &[Vec<f64>], memberships: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
        let dim = points.first().map_or(0, |p| p.len());

        (0..k)
            .map(|c| {
                let mut center = vec![0.0; dim];
                let mut weight_sum = 0.0;
                for (point, row) in points.iter().zip(memberships) {
                    let w = row[c].powf(self.fuzziness);
                    weight_sum += w;
                    for (acc, x) in center.iter_mut().zip(point) {
                        *acc += w * x;
                    }
                }
                if weight_sum > 0.0 {
                    for acc in &mut center {
                        *acc /= weight_sum;
                    }
                }
                center
            })
            .collect()
    }

    /// Cluster `points` into at most `clusters` fuzzy clusters.
    pub fn cluster(&self, points: &[Vec<f64>]) -> FuzzyClustering {
        let k = self.clusters.min(points.len());
        if k == 0 {
            return FuzzyClustering {
                centers: Vec::new(),
                memberships: vec![Vec::new(); points.len()],
                iterations: 0,
            };
        }

        let mut centers = self.seed(points, k);
        let mut memberships = self.memberships(points, &centers);
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            centers = self.update_centers(points, &memberships, k);
            let next = self.memberships(points, &centers);

            let change = memberships
                .iter()
                .flatten()
                .zip(next.iter().flatten())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            memberships = next;

            if change <= self.epsilon {
                break;
            }
        }

        debug!(clusters = k, iterations, "Fuzzy C-means converged");

        FuzzyClustering {
            centers,
            memberships,
            iterations,
        }
    }

    /// One representative per cluster: each center, in order, takes its
    /// closest untaken member. A cluster whose members are all taken (or that
    /// has none) falls back to the closest untaken point overall.
    pub fn select(&self, points: &[Vec<f64>]) -> Vec<usize> {
        let clustering = self.cluster(points);
        self.representatives(points, &clustering)
    }

    fn representatives(&self, points: &[Vec<f64>], clustering: &FuzzyClustering) -> Vec<usize> {
        // hard assignment: cluster with the highest membership degree
        let assigned: Vec<Option<usize>> = clustering
            .memberships
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
                    .map(|(c, _)| c)
            })
            .collect();

        let mut taken = vec![false; points.len()];
        let mut chosen = Vec::with_capacity(clustering.centers.len());

        for (c, center) in clustering.centers.iter().enumerate() {
            let closest = |members_only: bool| {
                points
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !taken[*i] && (!members_only || assigned[*i] == Some(c)))
                    .map(|(i, p)| (i, self.distance(p, center)))
                    .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            };

            let pick = closest(true).or_else(|| closest(false));
            if let Some((i, _)) = pick {
                taken[i] = true;
                chosen.push(i);
            }
        }

        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
            vec![-10.0, 10.0],
            vec![-9.8, 10.2],
        ]
    }

    #[test]
    fn test_memberships_sum_to_one() {
        let clustering = FuzzyCMeans::new(3, DistanceFunction::Euclidean).cluster(&blobs());
        assert_eq!(clustering.centers.len(), 3);
        for row in &clustering.memberships {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_select_one_point_per_blob() {
        for metric in DistanceFunction::ALL {
            let mut chosen = FuzzyCMeans::new(3, metric).select(&blobs());
            assert_eq!(chosen.len(), 3);

            let mut blob_ids: Vec<usize> = chosen.iter().map(|i| i / 2).collect();
            blob_ids.sort_unstable();
            assert_eq!(blob_ids, vec![0, 1, 2]);

            chosen.dedup();
            assert_eq!(chosen.len(), 3);
        }
    }

    #[test]
    fn test_more_clusters_than_points() {
        let points = vec![vec![1.0], vec![2.0]];
        let chosen = FuzzyCMeans::new(5, DistanceFunction::Manhattan).select(&points);
        assert_eq!(chosen.len(), 2);
    }

    #[test]
    fn test_representative_comes_from_own_cluster() {
        // the point at 4 is closer to center 3 but belongs to the second cluster
        let points = vec![vec![0.0], vec![4.0], vec![10.0]];
        let clustering = FuzzyClustering {
            centers: vec![vec![3.0], vec![10.0]],
            memberships: vec![vec![0.9, 0.1], vec![0.4, 0.6], vec![0.0, 1.0]],
            iterations: 1,
        };
        let fcm = FuzzyCMeans::new(2, DistanceFunction::Manhattan);
        assert_eq!(fcm.representatives(&points, &clustering), vec![0, 2]);
    }

    #[test]
    fn test_empty_cluster_falls_back_to_nearest_point() {
        let points = vec![vec![0.0], vec![4.0], vec![10.0]];
        let clustering = FuzzyClustering {
            centers: vec![vec![3.0], vec![10.0]],
            memberships: vec![vec![0.2, 0.8], vec![0.4, 0.6], vec![0.0, 1.0]],
            iterations: 1,
        };
        let fcm = FuzzyCMeans::new(2, DistanceFunction::Manhattan);
        assert_eq!(fcm.representatives(&points, &clustering), vec![1, 2]);
    }
}
