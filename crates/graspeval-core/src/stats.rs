//! Row-wise, NaN-tolerant reductions over stacked run columns.
//!
//! Columns are per-run value vectors of equal length; reductions run
//! across columns for each row index. A NaN cell is excluded from the
//! reduction for its row; a row with no present values reduces to NaN.
//! Standard deviation is the population formula (divide by N).

/// Mean of the present values, NaN when none are present.
pub fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation of the present values, NaN when none
/// are present.
pub fn nan_std(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let mean = nan_mean(values.clone());
    if mean.is_nan() {
        return f64::NAN;
    }
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for v in values {
        if !v.is_nan() {
            let d = v - mean;
            sum_sq += d * d;
            count += 1;
        }
    }
    (sum_sq / count as f64).sqrt()
}

/// Row-wise NaN-tolerant mean across columns. All columns must share
/// one length; the result has that length.
pub fn row_nan_mean(columns: &[Vec<f64>]) -> Vec<f64> {
    row_reduce(columns, |row| nan_mean(row.iter().copied()))
}

/// Row-wise NaN-tolerant population standard deviation across columns.
pub fn row_nan_std(columns: &[Vec<f64>]) -> Vec<f64> {
    row_reduce(columns, |row| nan_std(row.iter().copied()))
}

fn row_reduce(columns: &[Vec<f64>], reduce: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let rows = columns.first().map(|c| c.len()).unwrap_or(0);
    debug_assert!(columns.iter().all(|c| c.len() == rows));
    let mut out = Vec::with_capacity(rows);
    let mut row = Vec::with_capacity(columns.len());
    for i in 0..rows {
        row.clear();
        row.extend(columns.iter().map(|c| c[i]));
        out.push(reduce(&row));
    }
    out
}
