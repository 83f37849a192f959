//! Independent filtering on mean normalized counts
//!
//! Genes are filtered by base mean before the BH adjustment. The cutoff is
//! chosen from the number of rejections at each of 50 base-mean quantiles,
//! smoothed with lowess.

use crate::stats::{cmp_f64, median, quantile_type7};
use crate::testing::benjamini_hochberg;

const N_THETA: usize = 50;

/// Adjusted p-values after independent filtering, with the chosen cutoff
#[derive(Debug, Clone)]
pub struct IndependentFilter {
    /// NaN for genes below the cutoff
    pub padj: Vec<f64>,
    /// Quantile of the base means used as the cutoff
    pub theta: f64,
    pub cutoff: f64,
    pub n_rejected: usize,
}

/// Choose the base-mean cutoff that maximizes rejections at `alpha`
///
/// If no quantile yields more than 10 rejections nothing is filtered.
pub fn independent_filtering(base_means: &[f64], pvalues: &[f64], alpha: f64) -> IndependentFilter {
    let n = base_means.len();
    let mut sorted_means: Vec<f64> = base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if n == 0 || sorted_means.is_empty() {
        return IndependentFilter {
            padj: benjamini_hochberg(pvalues),
            theta: 0.0,
            cutoff: 0.0,
            n_rejected: 0,
        };
    }
    sorted_means.sort_by(cmp_f64);

    let lower = base_means.iter().filter(|&&m| m == 0.0).count() as f64 / n as f64;
    let upper = if lower < 0.95 { 0.95 } else { 1.0 };
    let thetas: Vec<f64> = (0..N_THETA)
        .map(|i| lower + (upper - lower) * i as f64 / (N_THETA - 1) as f64)
        .collect();
    let cutoffs: Vec<f64> = thetas.iter().map(|&t| quantile_type7(&sorted_means, t)).collect();

    let adjusted: Vec<Vec<f64>> = cutoffs
        .iter()
        .map(|&cutoff| {
            let kept: Vec<f64> = pvalues
                .iter()
                .zip(base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            benjamini_hochberg(&kept)
        })
        .collect();
    let num_rej: Vec<f64> = adjusted
        .iter()
        .map(|padj| padj.iter().filter(|&&p| p < alpha).count() as f64)
        .collect();

    let best = select_theta(&thetas, &num_rej);
    log::debug!(
        "independent filtering: theta={:.3} cutoff={:.3} rejections={}",
        thetas[best],
        cutoffs[best],
        num_rej[best]
    );
    let n_rejected = num_rej[best] as usize;
    IndependentFilter {
        padj: adjusted.into_iter().nth(best).unwrap_or_default(),
        theta: thetas[best],
        cutoff: cutoffs[best],
        n_rejected,
    }
}

/// First theta whose rejection count gets within one RMSE of the smoothed maximum
fn select_theta(thetas: &[f64], num_rej: &[f64]) -> usize {
    let max_rej = num_rej.iter().copied().fold(0.0, f64::max);
    if max_rej <= 10.0 {
        return 0;
    }
    let fit = lowess(thetas, num_rej, 0.2, 3);
    let residuals: Vec<f64> = num_rej
        .iter()
        .zip(&fit)
        .filter(|(&r, _)| r > 0.0)
        .map(|(r, f)| r - f)
        .collect();
    let rmse = if residuals.is_empty() {
        0.0
    } else {
        (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
    };
    let max_fit = fit.iter().copied().fold(f64::MIN, f64::max);

    [max_fit - rmse, 0.9 * max_fit, 0.8 * max_fit]
        .iter()
        .find_map(|&threshold| num_rej.iter().position(|&r| r > threshold))
        .unwrap_or(0)
}

/// Locally weighted linear regression with tricube weights and
/// `robustness_iters` bisquare reweighting passes
///
/// `x` must be sorted ascending. Each fit uses the `ceil(f * n)` nearest points
/// (at least two).
fn lowess(x: &[f64], y: &[f64], f: f64, robustness_iters: usize) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return y.to_vec();
    }
    let span = ((f * n as f64 + 1e-7) as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for pass in 0..=robustness_iters {
        let mut left = 0;
        for i in 0..n {
            while left + span < n && x[i] - x[left] > x[left + span] - x[i] {
                left += 1;
            }
            let right = left + span - 1;
            fitted[i] = local_fit(x, y, &robustness, x[i], left, right).unwrap_or(y[i]);
        }
        if pass == robustness_iters {
            break;
        }

        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();
        let mut abs_res: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let scale = 6.0 * median(&mut abs_res);
        let mean_abs = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
        if scale < 1e-7 * mean_abs || scale == 0.0 {
            break;
        }
        for (w, r) in robustness.iter_mut().zip(&residuals) {
            let u = r.abs() / scale;
            *w = if u < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 };
        }
    }
    fitted
}

/// Weighted least-squares line through points `left..=right`, evaluated at `x0`
fn local_fit(x: &[f64], y: &[f64], robustness: &[f64], x0: f64, left: usize, right: usize) -> Option<f64> {
    let h = (x0 - x[left]).max(x[right] - x0);
    let weights: Vec<f64> = (left..=right)
        .map(|j| {
            let u = if h > 0.0 { (x[j] - x0).abs() / h } else { 0.0 };
            let tricube = if u < 0.999 { (1.0 - u.powi(3)).powi(3) } else { 0.0 };
            tricube * robustness[j]
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let x_bar: f64 = (left..=right).zip(&weights).map(|(j, w)| w * x[j]).sum::<f64>() / total;
    let y_bar: f64 = (left..=right).zip(&weights).map(|(j, w)| w * y[j]).sum::<f64>() / total;
    let sxx: f64 = (left..=right).zip(&weights).map(|(j, w)| w * (x[j] - x_bar).powi(2)).sum();
    let sxy: f64 = (left..=right)
        .zip(&weights)
        .map(|(j, w)| w * (x[j] - x_bar) * (y[j] - y_bar))
        .sum();
    let range = x[x.len() - 1] - x[0];
    if (sxx / total).sqrt() > 0.001 * range {
        Some(y_bar + sxy / sxx * (x0 - x_bar))
    } else {
        Some(y_bar)
    }
}
