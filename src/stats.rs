//! Statistical utility functions shared across modules
//!
//! Robust location/scale summaries used by dispersion estimation, Cook's
//! distance filtering, independent filtering and LFC shrinkage.

use std::cmp::Ordering;

use statrs::distribution::{ContinuousCDF, Normal};

/// qnorm(0.975), used when the standard normal cannot be constructed
const QNORM_0975: f64 = 1.959963984540054;

/// Scale constant making the MAD a consistent estimator of the normal sd
const MAD_CONSTANT: f64 = 1.4826;

/// Total order on f64 that sorts NaN last
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Median of the values (sorts in place). Returns NaN for empty input.
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(cmp_f64);
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Squared median absolute deviation, scaled like R's `mad()`
pub fn mad_squared(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = median(values);
    let mut abs_devs: Vec<f64> = values.iter().map(|&x| (x - center).abs()).collect();
    let mad = median(&mut abs_devs) * MAD_CONSTANT;
    mad * mad
}

/// Mean after discarding `floor(n * trim_ratio)` values from each end
pub fn trimmed_mean(values: &mut [f64], trim_ratio: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_by(cmp_f64);
    let k = (n as f64 * trim_ratio).floor() as usize;
    if k * 2 >= n {
        return values.iter().sum::<f64>() / n as f64;
    }
    let kept = &values[k..n - k];
    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Sample quantile with linear interpolation (R's type 7) over sorted input
pub fn quantile_type7(sorted_x: &[f64], p: f64) -> f64 {
    let n = sorted_x.len();
    match n {
        0 => f64::NAN,
        1 => sorted_x[0],
        _ => {
            let h = (n as f64 - 1.0) * p;
            let lo = (h.floor() as usize).min(n - 1);
            let hi = (h.ceil() as usize).min(n - 1);
            sorted_x[lo] + (h - h.floor()) * (sorted_x[hi] - sorted_x[lo])
        }
    }
}

/// Trigamma function (derivative of digamma)
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    if x >= 8.0 {
        let x2 = x * x;
        return 1.0 / x + 0.5 / x2 + 1.0 / (6.0 * x2 * x) - 1.0 / (30.0 * x2 * x2 * x);
    }

    // Recurrence up to the asymptotic range
    let mut result = 0.0;
    let mut z = x;
    while z < 8.0 {
        result += 1.0 / (z * z);
        z += 1.0;
    }
    result + trigamma(z)
}

/// Weighted quantile with normalized weights (Hmisc `wtd.quantile`, `normwt=TRUE`)
///
/// Duplicate x values have their weights aggregated, the cumulative weights
/// are interpolated with a right-continuous step function, and the two
/// order statistics around `1 + (n - 1) * prob` are blended.
pub fn weighted_quantile(x: &[f64], weights: &[f64], prob: f64) -> f64 {
    let mut pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(weights.iter())
        .filter(|(&xi, &wi)| wi > 0.0 && !xi.is_nan() && !wi.is_nan())
        .map(|(&xi, &wi)| (xi, wi))
        .collect();

    if pairs.is_empty() {
        return 0.0;
    }
    pairs.sort_by(|a, b| cmp_f64(&a.0, &b.0));

    let mut unique_x: Vec<f64> = Vec::new();
    let mut agg_weights: Vec<f64> = Vec::new();
    for &(xi, wi) in &pairs {
        match unique_x.last() {
            Some(&last) if last == xi => {
                if let Some(w) = agg_weights.last_mut() {
                    *w += wi;
                }
            }
            _ => {
                unique_x.push(xi);
                agg_weights.push(wi);
            }
        }
    }

    let raw_weight_sum: f64 = pairs.iter().map(|&(_, w)| w).sum();
    let norm_factor = pairs.len() as f64 / raw_weight_sum;
    let mut cumsum = 0.0;
    let cum_weights: Vec<f64> = agg_weights
        .iter()
        .map(|&w| {
            cumsum += w * norm_factor;
            cumsum
        })
        .collect();
    let n = cumsum;

    let order = 1.0 + (n - 1.0) * prob;
    let low = order.floor().max(1.0);
    let high = (low + 1.0).min(n);
    let frac = order - order.floor();

    let q_low = step_interp_right(&cum_weights, &unique_x, low);
    let q_high = step_interp_right(&cum_weights, &unique_x, high);
    (1.0 - frac) * q_low + frac * q_high
}

/// Step interpolation, right-continuous, clamped at both ends
fn step_interp_right(xs: &[f64], ys: &[f64], xout: f64) -> f64 {
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    if xout <= xs[0] {
        return ys[0];
    }
    xs.iter()
        .position(|&x| x >= xout)
        .map(|i| ys[i])
        .unwrap_or(ys[n - 1])
}

/// Prior variance whose normal upper quantile matches the data's
/// weighted upper quantile of |x|.
pub fn match_weighted_upper_quantile_for_variance(x: &[f64], weights: &[f64], upper_quantile: f64) -> f64 {
    let abs_x: Vec<f64> = x.iter().map(|v| v.abs()).collect();
    let q = weighted_quantile(&abs_x, weights, 1.0 - upper_quantile);

    let z = Normal::new(0.0, 1.0)
        .map(|n| n.inverse_cdf(1.0 - upper_quantile / 2.0))
        .unwrap_or(QNORM_0975);
    let sd_est = q / z;
    log::debug!("upper quantile |x|={:.6}, z={:.6}, sd={:.6}", q, z, sd_est);

    let var_est = sd_est * sd_est;
    if var_est <= 0.0 || !var_est.is_finite() {
        1e-6
    } else {
        var_est
    }
}
