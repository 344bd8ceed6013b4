//! Statistical Reducer and the numeric helpers the range code shares with it.

use crate::config::NqOptions;
use crate::data::{Dataset, Value};
use crate::group::group_indices;

/// Aggregation applied by [`reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Median,
}

impl Reduction {
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            Reduction::Mean => mean(values),
            Reduction::Median => median(values),
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Calculate percentile using linear interpolation (pandas-compatible).
/// `p` is a fraction in `[0, 1]`; `sorted_data` must be sorted ascending.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 { return f64::NAN; }
    if n == 1 { return sorted_data[0]; }

    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

/// Quantile of unsorted values, ignoring NaN. `None` for an empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile(&sorted, q))
}

/// Group `data` by `group_columns` and aggregate every other numeric column.
///
/// Non-numeric, non-grouping columns are dropped. Rows are in natural key order,
/// and rows with a missing key do not contribute.
pub fn reduce(data: &Dataset, group_columns: &[String], method: Reduction) -> Dataset {
    let mut keys: Vec<String> = Vec::new();
    for c in group_columns {
        if data.has_column(c) && !keys.contains(c) {
            keys.push(c.clone());
        }
    }
    let value_columns: Vec<String> = data
        .headers()
        .iter()
        .filter(|h| !keys.contains(h) && data.is_numeric(h))
        .cloned()
        .collect();

    let groups = group_indices(data, &keys);
    let mut columns: Vec<(String, Vec<Value>)> = keys
        .iter()
        .chain(value_columns.iter())
        .map(|h| (h.clone(), Vec::with_capacity(groups.len())))
        .collect();

    for (key, rows) in &groups {
        for (i, v) in key.values().iter().enumerate() {
            columns[i].1.push(v.clone());
        }
        let sub = data.take(rows);
        for (j, name) in value_columns.iter().enumerate() {
            let agg = method
                .apply(&sub.numeric_values(name))
                .map(Value::Number)
                .unwrap_or(Value::Missing);
            columns[keys.len() + j].1.push(agg);
        }
    }

    // every column has one entry per group
    Dataset::from_columns(columns).unwrap_or_else(|_| data.empty_like())
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    pub counts: Vec<f64>,
}

impl Histogram {
    pub fn max_count(&self) -> Option<f64> {
        self.counts.iter().copied().reduce(f64::max)
    }
}

/// Bin `values` into `bins` equal-width bins spanning their own min..max.
///
/// The last bin includes its right edge. A degenerate range is widened by 0.5 on
/// each side. With `density`, counts are scaled so the histogram integrates to 1.
pub fn histogram(values: &[f64], bins: usize, density: bool) -> Histogram {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    let (mut lo, mut hi) = match (
        finite.iter().copied().reduce(f64::min),
        finite.iter().copied().reduce(f64::max),
    ) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => (0.0, 1.0),
    };
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * width).collect();
    let mut counts = vec![0.0; bins];
    for v in &finite {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1.0;
    }

    if density && !finite.is_empty() {
        let n = finite.len() as f64;
        for c in counts.iter_mut() {
            *c /= n * width;
        }
    }

    Histogram { edges, counts }
}

/// Standard normal CDF (Abramowitz and Stegun 7.1.26).
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Inverse standard normal CDF (Acklam's rational approximation).
pub fn normal_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Largest sigma worth plotting for a sample of `n` points.
pub fn sigma_limit(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    ((10.0 * normal_ppf(1.0 / n as f64).abs()).trunc() / 10.0).round_ties_even()
}

/// `start, start + step, ...` up to but excluding `stop`.
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// The sigma grid: `[-sigma, -tail)`, `[-tail, tail)`, `[tail, sigma]`.
pub fn sigma_grid(sigma: f64, opts: &NqOptions) -> Vec<f64> {
    let mut grid = arange(-sigma, -opts.tail, opts.step);
    grid.extend(arange(-opts.tail, opts.tail, opts.step));
    grid.extend(arange(opts.tail, sigma + 1e-9, opts.step));
    grid
}

/// Normal-quantile table: for each sigma on the grid, the data's percentile at `Φ(sigma)`.
pub fn normal_quantiles(values: &[f64], opts: &NqOptions) -> Vec<(f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let sigma = opts.sigma.unwrap_or_else(|| sigma_limit(sorted.len()));
    sigma_grid(sigma, opts)
        .into_iter()
        .map(|s| (s, percentile(&sorted, normal_cdf(s))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_pandas_compatible() {
        let data: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        assert_relative_eq!(percentile(&data, 0.25), 3.25);
        assert_relative_eq!(percentile(&data, 0.75), 7.75);
        assert_relative_eq!(percentile(&data, 0.5), 5.5);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_quantile_unsorted() {
        assert_eq!(quantile(&[3.0, 1.0, 2.0], 0.5), Some(2.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_reduce_mean() {
        let data = Dataset::from_csv_str(
            "Die,x,y,Note\n\
             A,1,10,a\n\
             A,1,20,b\n\
             A,2,30,c\n\
             B,1,40,d\n",
        )
        .unwrap();
        let out = reduce(&data, &["Die".to_string(), "x".to_string()], Reduction::Mean);
        assert_eq!(out.headers(), &["Die", "x", "y"]);
        assert_eq!(out.n_rows(), 3);
        assert_eq!(out.numeric_values("y"), vec![15.0, 30.0, 40.0]);
    }

    #[test]
    fn test_reduce_median() {
        let data = Dataset::from_csv_str("g,v\nA,1\nA,2\nA,9\n").unwrap();
        let out = reduce(&data, &["g".to_string()], Reduction::Median);
        assert_eq!(out.numeric_values("v"), vec![2.0]);
    }

    #[test]
    fn test_histogram() {
        let h = histogram(&[0.0, 1.0, 1.0, 2.0, 4.0], 4, false);
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.counts, vec![1.0, 2.0, 1.0, 1.0]);
        assert_eq!(h.max_count(), Some(2.0));
    }

    #[test]
    fn test_histogram_density_integrates_to_one() {
        let h = histogram(&[0.0, 0.5, 1.0, 3.0], 3, true);
        let width = h.edges[1] - h.edges[0];
        assert_relative_eq!(h.counts.iter().sum::<f64>() * width, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_histogram_degenerate() {
        let h = histogram(&[5.0, 5.0], 2, false);
        assert_eq!(h.edges, vec![4.5, 5.0, 5.5]);
        assert_eq!(h.counts, vec![0.0, 2.0]);
    }

    #[test]
    fn test_normal_functions() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(1.96), 0.975, epsilon = 1e-4);
        assert_relative_eq!(normal_ppf(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(normal_ppf(0.001), -3.090232, epsilon = 1e-5);
        assert_relative_eq!(normal_ppf(0.5), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sigma_limit() {
        assert_eq!(sigma_limit(100), 2.0);
        assert_eq!(sigma_limit(1000), 3.0);
        assert_eq!(sigma_limit(1), 0.0);
    }

    #[test]
    fn test_normal_quantiles_grid() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let opts = NqOptions {
            sigma: Some(4.0),
            ..NqOptions::default()
        };
        let table = normal_quantiles(&values, &opts);
        // 5 below the tail, 30 inside, 6 above (4.0 included)
        assert_eq!(table.len(), 41);
        assert_relative_eq!(table[0].0, -4.0);
        assert_relative_eq!(table[table.len() - 1].0, 4.0, epsilon = 1e-9);
        assert!(table.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
