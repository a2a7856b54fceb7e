//! Column kernels behind the table methods.
//!
//! Each kernel maps one column to a column of the same length. NaN marks a
//! missing value and propagates the way pandas does.

/// Rolling window over `values`. A window is computed only when it holds
/// `window` non-NaN values (pandas `min_periods = window`).
pub fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        if slice.iter().all(|v| !v.is_nan()) {
            out[end - 1] = f(slice);
        }
    }
    out
}

pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn sum(xs: &[f64]) -> f64 {
    xs.iter().sum()
}

/// Sample standard deviation (ddof = 1). NaN for fewer than two values.
pub fn std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

pub fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn median(xs: &[f64]) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Smoothing factor for `ewm(span=n)`.
pub fn span_alpha(span: f64) -> f64 {
    2.0 / (span + 1.0)
}

/// Adjusted exponentially weighted mean.
///
/// Weights decay by `1 - alpha` per row, including rows holding NaN, which
/// repeat the previous mean. Leading NaNs stay NaN.
pub fn ewm_mean(values: &[f64], alpha: f64) -> Vec<f64> {
    let decay = 1.0 - alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|&x| {
            num *= decay;
            den *= decay;
            if !x.is_nan() {
                num += x;
                den += 1.0;
            }
            if den > 0.0 { num / den } else { f64::NAN }
        })
        .collect()
}

/// Recursive exponentially weighted mean (`adjust=False`):
/// `y = (1 - alpha) * y_prev + alpha * x`, with the previous weight decaying
/// once per row across NaN gaps.
pub fn ewm_mean_recursive(values: &[f64], alpha: f64) -> Vec<f64> {
    let decay = 1.0 - alpha;
    let mut prev: Option<f64> = None;
    let mut old_weight = 1.0;
    values
        .iter()
        .map(|&x| {
            let Some(y) = prev else {
                if !x.is_nan() {
                    prev = Some(x);
                }
                return x;
            };
            old_weight *= decay;
            if x.is_nan() {
                return y;
            }
            let next = (old_weight * y + alpha * x) / (old_weight + alpha);
            old_weight = 1.0;
            prev = Some(next);
            next
        })
        .collect()
}

/// Move values down by `periods` rows (up when negative), filling with NaN.
pub fn shift(values: &[f64], periods: i64) -> Vec<f64> {
    let n = values.len() as i64;
    (0..n)
        .map(|i| {
            let src = i - periods;
            if (0..n).contains(&src) {
                values[src as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

pub fn diff(values: &[f64], periods: i64) -> Vec<f64> {
    let shifted = shift(values, periods);
    values.iter().zip(shifted).map(|(a, b)| a - b).collect()
}

pub fn pct_change(values: &[f64], periods: i64) -> Vec<f64> {
    let shifted = shift(values, periods);
    values.iter().zip(shifted).map(|(a, b)| a / b - 1.0).collect()
}

pub fn ffill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if !v.is_nan() {
                last = v;
            }
            last
        })
        .collect()
}

pub fn bfill(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.reverse();
    let mut filled = ffill(&out);
    filled.reverse();
    filled
}

/// Running accumulation that skips NaN: NaN rows stay NaN and the running
/// value carries across them.
pub fn accumulate(values: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let mut acc: Option<f64> = None;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return f64::NAN;
            }
            let next = acc.map_or(v, |a| f(a, v));
            acc = Some(next);
            next
        })
        .collect()
}

pub fn cumsum(values: &[f64]) -> Vec<f64> {
    accumulate(values, |a, b| a + b)
}

pub fn cummax(values: &[f64]) -> Vec<f64> {
    accumulate(values, f64::max)
}

pub fn cummin(values: &[f64]) -> Vec<f64> {
    accumulate(values, f64::min)
}
