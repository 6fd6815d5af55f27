//! Distribution drift statistics used to validate imputed columns.
//!
//! Both statistics compare a reference sample (the observed values before
//! imputation) with a test sample (the column after imputation).

/// Lower clip for bin proportions, keeps the log ratio finite.
const MIN_PROPORTION: f64 = 0.0001;

/// Percentile of pre-sorted data with linear interpolation between the two
/// closest ranks (`pos = p * (n - 1)`).
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let pos = fraction * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let weight = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

/// Equal-frequency bin edges at percentiles `0, 100/bins, ..., 100` of the
/// reference data, with duplicate edges collapsed. Empty for empty input.
pub fn percentile_edges(reference: &[f64], bins: usize) -> Vec<f64> {
    if reference.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut sorted = reference.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut edges: Vec<f64> = Vec::with_capacity(bins + 1);
    for i in 0..=bins {
        let edge = percentile(&sorted, i as f64 / bins as f64);
        if edges.last() != Some(&edge) {
            edges.push(edge);
        }
    }
    edges
}

/// Proportion of `data` falling in each bin `[e_i, e_{i+1})`, the last bin
/// closed. Values outside the edges are not counted but still weigh in the
/// denominator.
fn bin_proportions(data: &[f64], edges: &[f64]) -> Vec<f64> {
    let n_bins = edges.len() - 1;
    let mut counts = vec![0usize; n_bins];

    for &value in data {
        for i in 0..n_bins {
            let last = i == n_bins - 1;
            if value >= edges[i] && (value < edges[i + 1] || (last && value == edges[i + 1])) {
                counts[i] += 1;
                break;
            }
        }
    }

    let n = data.len() as f64;
    counts
        .iter()
        .map(|&c| (c as f64 / n).max(MIN_PROPORTION))
        .collect()
}

fn psi_from_proportions(reference: &[f64], test: &[f64]) -> f64 {
    reference
        .iter()
        .zip(test)
        .map(|(&p_ref, &p_test)| (p_test - p_ref) * (p_test / p_ref).ln())
        .sum()
}

/// Population Stability Index of `test` against `reference`.
///
/// When every reference value is identical there is a single edge; PSI is
/// then 0 if `test` holds only that value and is computed over the two-bin
/// split {equal, not equal} otherwise. Returns 0 for empty input.
pub fn psi(reference: &[f64], test: &[f64], bins: usize) -> f64 {
    if reference.is_empty() || test.is_empty() {
        return 0.0;
    }

    let edges = percentile_edges(reference, bins);
    if edges.len() == 1 {
        let value = edges[0];
        let equal = test.iter().filter(|&&v| v == value).count();
        if equal == test.len() {
            return 0.0;
        }
        let n = test.len() as f64;
        let reference_props = [1.0, MIN_PROPORTION];
        let test_props = [
            (equal as f64 / n).max(MIN_PROPORTION),
            ((test.len() - equal) as f64 / n).max(MIN_PROPORTION),
        ];
        return psi_from_proportions(&reference_props, &test_props);
    }

    let reference_props = bin_proportions(reference, &edges);
    let test_props = bin_proportions(test, &edges);
    psi_from_proportions(&reference_props, &test_props)
}

/// Empirical CDF of pre-sorted data at `x`.
fn ecdf(sorted: &[f64], x: f64) -> f64 {
    let count = sorted.partition_point(|&v| v <= x);
    count as f64 / sorted.len() as f64
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest absolute gap between
/// the two empirical CDFs over every observed value. Returns 0 for empty
/// input.
pub fn ks_statistic(reference: &[f64], test: &[f64]) -> f64 {
    if reference.is_empty() || test.is_empty() {
        return 0.0;
    }

    let mut ref_sorted = reference.to_vec();
    let mut test_sorted = test.to_vec();
    ref_sorted.sort_by(f64::total_cmp);
    test_sorted.sort_by(f64::total_cmp);

    ref_sorted
        .iter()
        .chain(&test_sorted)
        .map(|&x| (ecdf(&ref_sorted, x) - ecdf(&test_sorted, x)).abs())
        .fold(0.0, f64::max)
}
