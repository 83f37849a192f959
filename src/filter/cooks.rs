//! Cook's distance outlier filtering
//!
//! Cook's distances use the hat diagonals of the GLM fit and a robust
//! method-of-moments dispersion: `cooks = PearsonRes^2 / p * h / (1 - h)^2`.
//! Only samples from groups with at least three replicates can flag a gene.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::data::{ExpressionDataSet, SampleDesign};
use crate::error::{DgeaError, Result};
use crate::glm::nb_variance;
use crate::model::FittedModel;
use crate::stats::trimmed_mean;

const MIN_ROBUST_DISP: f64 = 0.04;
const MIN_REPLICATES_FOR_COOKS: usize = 3;

/// Dispersion from trimmed within-group variance, floored at 0.04
///
/// Falls back to a trimmed variance over all samples when no group has three
/// replicates.
pub fn robust_method_of_moments_disp(normalized: ArrayView2<f64>, design: &SampleDesign) -> Vec<f64> {
    let cells: Vec<Vec<usize>> = design
        .levels()
        .map(|level| design.samples_in_group(level))
        .filter(|samples| samples.len() >= MIN_REPLICATES_FOR_COOKS)
        .collect();

    normalized
        .outer_iter()
        .map(|row| {
            let values = row.to_vec();
            let variance = if cells.is_empty() {
                trimmed_variance(&values, 1.0 / 8.0, 1.51)
            } else {
                cells
                    .iter()
                    .map(|samples| {
                        let cell: Vec<f64> = samples.iter().map(|&j| values[j]).collect();
                        let (trim, scale) = cell_trim(cell.len());
                        trimmed_variance(&cell, trim, scale)
                    })
                    .fold(0.0, f64::max)
            };
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            if mean > 0.0 {
                ((variance - mean) / (mean * mean)).max(MIN_ROBUST_DISP)
            } else {
                MIN_ROBUST_DISP
            }
        })
        .collect()
}

/// Trim ratio and bias correction for a group of `n` replicates
fn cell_trim(n: usize) -> (f64, f64) {
    if n <= 3 {
        (1.0 / 3.0, 2.04)
    } else if n <= 23 {
        (1.0 / 4.0, 1.86)
    } else {
        (1.0 / 8.0, 1.51)
    }
}

fn trimmed_variance(values: &[f64], trim: f64, scale: f64) -> f64 {
    let center = trimmed_mean(&mut values.to_vec(), trim);
    let mut sq_errors: Vec<f64> = values.iter().map(|v| (v - center).powi(2)).collect();
    scale * trimmed_mean(&mut sq_errors, trim)
}

/// Cook's distance per gene and sample
pub fn cooks_distance(
    counts: ArrayView2<f64>,
    mu: &Array2<f64>,
    hat_diagonals: &Array2<f64>,
    dispersions: &[f64],
    n_coefs: usize,
) -> Array2<f64> {
    let (n_genes, n_samples) = counts.dim();
    let p = n_coefs as f64;
    let rows: Vec<Vec<f64>> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let alpha = dispersions[i];
            (0..n_samples)
                .map(|j| {
                    let m = mu[[i, j]];
                    let h = hat_diagonals[[i, j]];
                    let variance = nb_variance(m, alpha);
                    let pearson_sq = if variance > 0.0 {
                        (counts[[i, j]] - m).powi(2) / variance
                    } else {
                        0.0
                    };
                    if h.is_finite() && h < 1.0 {
                        pearson_sq / p * h / (1.0 - h).powi(2)
                    } else {
                        f64::NAN
                    }
                })
                .collect()
        })
        .collect();

    let mut cooks = Array2::zeros((n_genes, n_samples));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, value) in row.into_iter().enumerate() {
            cooks[[i, j]] = value;
        }
    }
    cooks
}

/// 0.99 quantile of F(p, m - p)
pub fn cooks_cutoff(n_samples: usize, n_coefs: usize) -> f64 {
    if n_samples <= n_coefs {
        return f64::INFINITY;
    }
    match FisherSnedecor::new(n_coefs as f64, (n_samples - n_coefs) as f64) {
        Ok(f) => f.inverse_cdf(0.99),
        Err(_) => f64::INFINITY,
    }
}

/// Genes whose largest Cook's distance exceeds the cutoff
///
/// With exactly two groups a gene is kept when three or more samples have a
/// higher count than the outlying sample.
pub fn cooks_outliers(model: &FittedModel, dataset: &ExpressionDataSet) -> Result<Vec<bool>> {
    model.check_dataset(dataset)?;
    let design = dataset.design();
    let (n_samples, n_coefs) = model.design_matrix().dim();
    if n_samples != dataset.n_samples() {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} samples", n_samples),
            got: format!("{} samples", dataset.n_samples()),
        });
    }

    let eligible: Vec<usize> = (0..n_samples)
        .filter(|&j| design.samples_in_group(design.group_of(j)).len() >= MIN_REPLICATES_FOR_COOKS)
        .collect();
    if eligible.is_empty() {
        log::debug!("no group has {} replicates, Cook's filtering skipped", MIN_REPLICATES_FOR_COOKS);
        return Ok(vec![false; model.n_genes()]);
    }

    let counts = dataset.counts().counts();
    let robust = robust_method_of_moments_disp(dataset.normalized_counts(), design);
    let cooks = cooks_distance(counts, model.mu(), model.hat_diagonals(), &robust, n_coefs);
    let cutoff = cooks_cutoff(n_samples, n_coefs);
    let two_groups = design.n_levels() == 2;

    let outliers: Vec<bool> = (0..model.n_genes())
        .map(|i| {
            let worst = eligible
                .iter()
                .copied()
                .filter(|&j| cooks[[i, j]].is_finite())
                .max_by(|&a, &b| cooks[[i, a]].total_cmp(&cooks[[i, b]]));
            let Some(j) = worst else {
                return false;
            };
            if cooks[[i, j]] <= cutoff {
                return false;
            }
            if two_groups {
                let higher = counts.row(i).iter().filter(|&&c| c > counts[[i, j]]).count();
                return higher < 3;
            }
            true
        })
        .collect();

    log::debug!(
        "Cook's cutoff {:.3}: {} genes flagged",
        cutoff,
        outliers.iter().filter(|&&o| o).count()
    );
    Ok(outliers)
}
