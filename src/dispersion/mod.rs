//! Dispersion estimation for negative binomial models

mod gene_wise;
mod likelihood;
mod map;
mod trend;

pub use gene_wise::{estimate_dispersion_gene, estimate_gene_dispersions};
pub use map::{estimate_map_dispersions, estimate_prior_variance, fit_map_dispersion};
pub use trend::{fit_dispersion_trend, fit_mean_trend, DispersionTrend};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::ExpressionDataSet;
use crate::error::{DgeaError, Result};
use crate::io::nan_vec;

/// Tunable parameters for dispersion estimation
#[derive(Debug, Clone)]
pub struct DispersionParams {
    /// Lower bound on any dispersion
    pub min_disp: f64,
    /// Log posterior change that ends the line search
    pub disp_tol: f64,
    /// Initial step size of the line search
    pub kappa_0: f64,
    /// Maximum line search iterations
    pub maxit: usize,
    /// Outlier cutoff in standard deviations above the trend
    pub outlier_sd: f64,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            disp_tol: 1e-6,
            kappa_0: 1.0,
            maxit: 100,
            outlier_sd: 2.0,
        }
    }
}

impl DispersionParams {
    /// Upper bound on any dispersion, max(10, n_samples)
    pub fn max_disp(&self, n_samples: usize) -> f64 {
        (n_samples as f64).max(10.0)
    }
}

/// Every stage of the dispersion fit, gene-aligned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersionFit {
    #[serde(with = "nan_vec")]
    pub gene_wise: Vec<f64>,
    #[serde(with = "nan_vec")]
    pub trended: Vec<f64>,
    /// Dispersions used by the GLM
    #[serde(with = "nan_vec")]
    pub final_dispersions: Vec<f64>,
    pub trend: DispersionTrend,
    pub prior_var: f64,
    pub outliers: Vec<bool>,
}

/// Gene-wise estimates, trend and MAP shrinkage for a dataset
///
/// The fit depends on the column space of `design` only, so it is the same for
/// every choice of reference level.
pub fn estimate_dispersions(
    dataset: &ExpressionDataSet,
    design: &Array2<f64>,
    params: &DispersionParams,
) -> Result<DispersionFit> {
    let (n_samples, n_coefs) = design.dim();
    if n_samples <= n_coefs {
        return Err(DgeaError::InvalidDesign {
            reason: format!(
                "{} samples for {} groups leaves no replicates to estimate dispersion",
                n_samples, n_coefs
            ),
        });
    }

    let counts = dataset.counts().counts();
    let (gene_wise, mu) = estimate_gene_dispersions(counts, dataset.size_factors(), design, params);
    log::debug!("gene-wise dispersions estimated for {} genes", gene_wise.len());

    let base_means = dataset.base_means().to_vec();
    let gene_wise = gene_wise.to_vec();
    let trend = fit_dispersion_trend(&base_means, &gene_wise, params.min_disp)?;
    let trended: Vec<f64> = base_means.iter().map(|&m| trend.evaluate(m)).collect();
    log::info!("Dispersion trend: {:?}", trend);

    let (prior_var, var_log_disp_ests) =
        estimate_prior_variance(&gene_wise, &trended, n_samples, n_coefs, params.min_disp);
    let (final_dispersions, outliers) =
        estimate_map_dispersions(counts, &mu, design, &gene_wise, &trended, prior_var, var_log_disp_ests, params);

    let n_outliers = outliers.iter().filter(|&&o| o).count();
    if n_outliers > 0 {
        log::info!("{} genes flagged as dispersion outliers", n_outliers);
    }

    Ok(DispersionFit {
        gene_wise,
        trended,
        final_dispersions,
        trend,
        prior_var,
        outliers,
    })
}

/// Check that a fit lines up with a dataset
pub(crate) fn check_fit(fit: &DispersionFit, n_genes: usize) -> Result<()> {
    if fit.final_dispersions.len() != n_genes || fit.trended.len() != n_genes {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} dispersions", n_genes),
            got: format!("{} dispersions", fit.final_dispersions.len()),
        });
    }
    Ok(())
}
