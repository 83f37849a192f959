//! Size factor estimation using the median of ratios method

use ndarray::{Array1, ArrayView2, Axis};

use crate::error::{DgeaError, Result};
use crate::stats::median;

/// Method for size factor estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFactorMethod {
    /// Median of ratios over genes with no zero count
    Ratio,
    /// Geometric means over positive counts only, for matrices where
    /// every gene has a zero somewhere
    PosCounts,
}

/// Estimate one size factor per sample
///
/// Accounts for both sequencing depth and RNA composition: each sample's
/// factor is the median ratio of its counts to the per-gene geometric mean.
pub fn estimate_size_factors(counts: ArrayView2<f64>, method: SizeFactorMethod) -> Result<Array1<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(DgeaError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }

    let geo_means = log_geometric_means(counts, method);
    if geo_means.iter().all(|g| g.is_none()) {
        return Err(DgeaError::SizeFactorFailed {
            reason: match method {
                SizeFactorMethod::Ratio => "No genes with all non-zero counts found",
                SizeFactorMethod::PosCounts => "No genes with positive counts found",
            }
            .to_string(),
        });
    }

    let mut size_factors = Array1::zeros(n_samples);
    for (j, column) in counts.axis_iter(Axis(1)).enumerate() {
        let mut log_ratios: Vec<f64> = column
            .iter()
            .zip(geo_means.iter())
            .filter_map(|(&count, geo)| match geo {
                Some(log_geo) if count > 0.0 => Some(count.ln() - log_geo),
                _ => None,
            })
            .collect();

        size_factors[j] = if log_ratios.is_empty() {
            match method {
                SizeFactorMethod::Ratio => {
                    return Err(DgeaError::SizeFactorFailed {
                        reason: format!("No valid ratios for sample {}", j),
                    })
                }
                SizeFactorMethod::PosCounts => 1.0,
            }
        } else {
            median(&mut log_ratios).exp()
        };
    }

    if method == SizeFactorMethod::PosCounts {
        // Center so the geometric mean of the factors is one
        let log_center = size_factors.iter().map(|x: &f64| x.ln()).sum::<f64>() / n_samples as f64;
        let center = log_center.exp();
        size_factors.mapv_inplace(|x| x / center);
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(DgeaError::SizeFactorFailed {
            reason: "Invalid size factors computed".to_string(),
        });
    }

    Ok(size_factors)
}

/// Log geometric mean per gene, `None` when the gene cannot serve as a reference
fn log_geometric_means(counts: ArrayView2<f64>, method: SizeFactorMethod) -> Vec<Option<f64>> {
    let n_samples = counts.ncols() as f64;
    counts
        .axis_iter(Axis(0))
        .map(|row| match method {
            SizeFactorMethod::Ratio => {
                if row.iter().all(|&x| x > 0.0) {
                    Some(row.iter().map(|x| x.ln()).sum::<f64>() / n_samples)
                } else {
                    None
                }
            }
            SizeFactorMethod::PosCounts => {
                // Sum over positive counts, divided by the total sample count
                let log_sum: f64 = row.iter().filter(|&&x| x > 0.0).map(|x| x.ln()).sum();
                if row.iter().any(|&x| x > 0.0) {
                    Some(log_sum / n_samples)
                } else {
                    None
                }
            }
        })
        .collect()
}
