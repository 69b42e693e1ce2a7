//! ROC sweep and equal error rate.
//!
//! Thresholds are `i * increment` for `i = 0, 1, 2, ...`. A score is accepted
//! at threshold `t` when it is strictly below `t`.

use serde::{Deserialize, Serialize};

/// Error rates at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    /// Fraction of impostor scores accepted
    pub far: f64,
    /// Fraction of genuine scores rejected
    pub frr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EerReport {
    /// `NaN` when there are no impostor scores
    pub eer: f64,
    pub eer_threshold: f64,
    /// Smallest threshold with no false accepts that accepts any genuine score
    pub zero_far: Option<RocPoint>,
    /// Threshold at which the sweep stops, with every genuine and impostor
    /// score accepted. `None` without genuine scores.
    pub zero_frr: Option<RocPoint>,
    /// One point per threshold at which the error rates change
    pub points: Vec<RocPoint>,
    pub genuine_count: usize,
    pub impostor_count: usize,
}

/// Sweep thresholds over genuine (`p`) and impostor (`n`) scores.
///
/// The equal error rate is the false accept rate at the first threshold where
/// false accepts catch up with false rejects.
pub fn calc_eer(p: &[f64], n: &[f64], increment: f64) -> EerReport {
    let mut genuine = p.to_vec();
    let mut impostor = n.to_vec();
    genuine.sort_by(f64::total_cmp);
    impostor.sort_by(f64::total_cmp);

    let rate = |count: usize, total: usize| count as f64 / total as f64;
    let below = |sorted: &[f64], t: f64| sorted.partition_point(|&v| v < t);

    let mut report = EerReport {
        eer: f64::NAN,
        eer_threshold: 0.0,
        zero_far: None,
        zero_frr: None,
        points: Vec::new(),
        genuine_count: genuine.len(),
        impostor_count: impostor.len(),
    };

    let mut step: u64 = 0;
    let mut eer_found = false;

    loop {
        let threshold = step as f64 * increment;
        let num_p = below(&genuine, threshold);
        let num_n = below(&impostor, threshold);
        let point = RocPoint {
            threshold,
            far: rate(num_n, impostor.len()),
            frr: 1.0 - rate(num_p, genuine.len()),
        };
        report.points.push(point);

        if !eer_found && (num_n >= genuine.len() - num_p || num_n >= impostor.len()) {
            report.eer = rate(num_n, impostor.len());
            report.eer_threshold = threshold;
            eer_found = true;
        }
        if report.zero_far.is_none() && num_n == 0 && num_p > 0 {
            report.zero_far = Some(point);
        }
        if num_p == genuine.len() && num_n == impostor.len() {
            break;
        }

        // Jump to the first threshold that accepts the next pending score
        let next_score = genuine
            .get(num_p)
            .into_iter()
            .chain(impostor.get(num_n))
            .copied()
            .fold(f64::INFINITY, f64::min);
        if !next_score.is_finite() {
            break;
        }
        let mut next = ((next_score / increment).floor() as u64).max(step + 1);
        while next as f64 * increment <= next_score {
            next += 1;
        }
        step = next;
    }

    if !genuine.is_empty() {
        report.zero_frr = report.points.last().copied();
    }
    report
}
