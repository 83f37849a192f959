//! MAP (Maximum A Posteriori) dispersion estimation
//!
//! Gene-wise estimates are shrunk toward the trend under a log-normal prior
//! whose width is estimated from the spread of the gene-wise estimates around
//! the trend.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use super::likelihood::{GeneLikelihood, LogNormalPrior};
use super::DispersionParams;
use crate::stats::{mad_squared, trigamma};

/// Prior variance floor on log(alpha)
const MIN_PRIOR_VAR: f64 = 0.25;

/// Prior variance of log dispersions and the observed variance of the residuals
///
/// Returns `(prior_var, var_log_disp_ests)`. The prior variance is the
/// observed MAD^2 of `log(gene) - log(trend)` minus the sampling variance
/// expected with `n_samples - n_coefs` residual degrees of freedom, floored
/// at 0.25.
pub fn estimate_prior_variance(
    gene_dispersions: &[f64],
    trended_dispersions: &[f64],
    n_samples: usize,
    n_coefs: usize,
    min_disp: f64,
) -> (f64, f64) {
    let mut log_residuals: Vec<f64> = gene_dispersions
        .iter()
        .zip(trended_dispersions)
        .filter(|(&g, &t)| g.is_finite() && t.is_finite() && g >= 100.0 * min_disp && t > 0.0)
        .map(|(&g, &t)| g.ln() - t.ln())
        .collect();

    if log_residuals.len() < 3 {
        return (MIN_PRIOR_VAR, MIN_PRIOR_VAR);
    }
    let var_log_disp_ests = mad_squared(&mut log_residuals);
    if n_samples <= n_coefs {
        return (MIN_PRIOR_VAR, var_log_disp_ests);
    }

    let expected = trigamma((n_samples - n_coefs) as f64 / 2.0);
    let prior_var = (var_log_disp_ests - expected).max(MIN_PRIOR_VAR);
    log::debug!(
        "dispersion prior: varLogDispEsts={:.4}, expected={:.4}, prior_var={:.4}",
        var_log_disp_ests,
        expected,
        prior_var
    );
    (prior_var, var_log_disp_ests)
}

/// Posterior mode of one gene's dispersion
pub fn fit_map_dispersion(
    counts: &[f64],
    mu: &[f64],
    design: &Array2<f64>,
    gene_disp: f64,
    trend_disp: f64,
    prior_var: f64,
    params: &DispersionParams,
) -> f64 {
    if !trend_disp.is_finite() || trend_disp <= 0.0 {
        return 0.1;
    }
    if !gene_disp.is_finite() {
        return trend_disp;
    }
    let max_disp = params.max_disp(counts.len());

    let start = if gene_disp > 0.1 * trend_disp {
        gene_disp
    } else {
        trend_disp
    };
    let likelihood = GeneLikelihood {
        counts,
        mu,
        design,
        prior: Some(LogNormalPrior {
            mean: trend_disp.ln(),
            variance: prior_var,
        }),
    };
    let search = likelihood.line_search(start, params);
    let disp = if search.converged {
        search.log_alpha.exp()
    } else {
        likelihood.grid_search(params.min_disp, max_disp)
    };
    disp.clamp(params.min_disp, max_disp)
}

/// MAP dispersions for every gene plus the upper-outlier flags
///
/// Genes whose gene-wise estimate lies more than `outlier_sd` standard
/// deviations above the trend keep the gene-wise value.
pub fn estimate_map_dispersions(
    counts: ArrayView2<f64>,
    mu: &Array2<f64>,
    design: &Array2<f64>,
    gene_dispersions: &[f64],
    trended_dispersions: &[f64],
    prior_var: f64,
    var_log_disp_ests: f64,
    params: &DispersionParams,
) -> (Vec<f64>, Vec<bool>) {
    let threshold = params.outlier_sd * var_log_disp_ests.sqrt();

    (0..counts.nrows())
        .into_par_iter()
        .map(|i| {
            let gene = gene_dispersions[i];
            let trend = trended_dispersions[i];
            let outlier = gene.is_finite() && gene > 0.0 && trend > 0.0 && gene.ln() - trend.ln() > threshold;
            if outlier {
                return (gene, true);
            }
            let gene_counts = counts.row(i).to_vec();
            let gene_mu = mu.row(i).to_vec();
            let disp = fit_map_dispersion(&gene_counts, &gene_mu, design, gene, trend, prior_var, params);
            (disp, false)
        })
        .unzip()
}
