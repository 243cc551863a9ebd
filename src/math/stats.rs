//! Cross-sectional statistics for CDS bucketing.
//!
//! - bucket aggregates: mean, median, self-weighted mean
//! - `qcut`: equal-count binning on sample quantiles
//!
//! `qcut` places bin edges at the linearly interpolated sample quantiles
//! `k / q` for `k = 0..=q` and assigns each value to the right-closed bin
//! `(e_{k-1}, e_k]`, with the lowest value forced into bin 1. Labels are 1-based.
//!
//! When repeated values collapse two edges onto each other, or leave a bin
//! empty although there are at least `q` values, the values are binned on
//! ordinal ranks instead (ties ordered by position): rank `i` of `n` goes to
//! bin `floor(i * q / n) + 1`. Those bins are equal-count and all occupied.

use crate::domain::AggregationMethod;
use crate::error::{AnalyticsError, AnalyticsResult};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean of `values` weighted by the values themselves: `Σ v² / Σ v`.
pub fn self_weighted_mean(values: &[f64]) -> Option<f64> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| v * v).sum::<f64>() / total)
}

impl AggregationMethod {
    /// Combine the spreads of one (date, quantile) bucket.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        match self {
            AggregationMethod::Mean => mean(values),
            AggregationMethod::Median => median(values),
            AggregationMethod::Weighted => self_weighted_mean(values),
        }
    }
}

/// Assign each value a 1-based quantile label in `1..=q`.
pub fn qcut(values: &[f64], q: usize) -> AnalyticsResult<Vec<usize>> {
    if q == 0 {
        return Err(AnalyticsError::invalid("quantile count must be > 0"));
    }
    if values.is_empty() {
        return Err(AnalyticsError::invalid("cannot bin an empty sample"));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::invalid("cannot bin non-finite values"));
    }

    if values.len() == 1 && q > 1 {
        return Err(AnalyticsError::invalid(format!(
            "cannot form {q} distinct quantile edges from a single value"
        )));
    }

    let edges = quantile_edges(values, q);
    if strictly_increasing(&edges) {
        let labels = assign_bins(values, &edges);
        if values.len() < q || occupies_every_bin(&labels, q) {
            return Ok(labels);
        }
    }
    Ok(ordinal_bins(values, q))
}

/// Linearly interpolated sample quantiles at `k / q`, `k = 0..=q`.
pub fn quantile_edges(values: &[f64], q: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;

    (0..=q)
        .map(|k| {
            let pos = k as f64 / q as f64 * last;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        })
        .collect()
}

fn strictly_increasing(edges: &[f64]) -> bool {
    edges.windows(2).all(|w| w[0] < w[1])
}

fn assign_bins(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let q = edges.len() - 1;
    let upper = &edges[1..];
    values
        .iter()
        .map(|v| upper.partition_point(|e| e < v).min(q - 1) + 1)
        .collect()
}

fn occupies_every_bin(labels: &[usize], q: usize) -> bool {
    let mut seen = vec![false; q];
    for label in labels {
        seen[label - 1] = true;
    }
    seen.into_iter().all(|s| s)
}

fn ordinal_bins(values: &[f64], q: usize) -> Vec<usize> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]).then(a.cmp(b)));
    let mut labels = vec![0; n];
    for (rank, idx) in order.into_iter().enumerate() {
        labels[idx] = rank * q / n + 1;
    }
    labels
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn qcut_makes_equal_count_bins() {
        let values: Vec<f64> = (0..100).map(|i| ((i * 37) % 100) as f64 * 0.001).collect();
        let labels = qcut(&values, 5).unwrap();

        for bin in 1..=5 {
            assert_eq!(labels.iter().filter(|l| **l == bin).count(), 20);
        }
        let lowest = values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(labels[lowest], 1);
    }

    #[test]
    fn qcut_with_exactly_q_values_uses_every_label() {
        let values: Vec<f64> = (1..=20).rev().map(|i| i as f64).collect();
        let labels = qcut(&values, 20).unwrap();
        let distinct: BTreeSet<usize> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
        assert_eq!(labels[19], 1);
        assert_eq!(labels[0], 20);
    }

    #[test]
    fn qcut_falls_back_to_ranks_on_ties() {
        let values = vec![0.01, 0.01, 0.01, 0.01, 0.02, 0.03];
        let labels = qcut(&values, 3).unwrap();
        assert_eq!(labels, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn qcut_uses_every_label_when_ties_leave_a_bin_empty() {
        // Edges stay distinct but the tie at 3bp empties one value bin.
        let values: Vec<f64> = [1, 2, 3, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]
            .iter()
            .map(|bp| f64::from(*bp) * 1e-4)
            .collect();
        assert!(strictly_increasing(&quantile_edges(&values, 20)));

        let labels = qcut(&values, 20).unwrap();
        let distinct: BTreeSet<usize> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
        assert_eq!(labels[0], 1);
        assert_eq!(labels[19], 20);
        // Ties are ordered by position.
        assert_eq!((labels[2], labels[3]), (3, 4));
    }

    #[test]
    fn qcut_keeps_equal_counts_with_many_tied_names() {
        let values: Vec<f64> = (0..60).map(|i| if i % 3 == 0 { 0.01 } else { 0.01 + i as f64 * 1e-4 }).collect();
        let labels = qcut(&values, 20).unwrap();
        for bin in 1..=20 {
            assert_eq!(labels.iter().filter(|l| **l == bin).count(), 3, "bin {bin}");
        }
    }

    #[test]
    fn qcut_rejects_a_single_value_for_many_bins() {
        assert!(qcut(&[0.01], 4).is_err());
        assert!(qcut(&[], 4).is_err());
    }

    #[test]
    fn aggregates() {
        let v = [1.0, 2.0, 3.0, 10.0];
        assert_eq!(mean(&v), Some(4.0));
        assert_eq!(median(&v), Some(2.5));
        assert_eq!(self_weighted_mean(&v), Some(114.0 / 16.0));
        assert_eq!(median(&[]), None);
        assert_eq!(AggregationMethod::Median.apply(&[5.0, 1.0, 3.0]), Some(3.0));
    }
}
