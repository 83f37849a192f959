//! GLM fitting using Iteratively Reweighted Least Squares (IRLS)

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use statrs::function::gamma::ln_gamma;

use super::linalg::{invert_spd, solve_spd, xtwx};
use super::negative_binomial::{nb_mean, nb_weight, MAX_LFC_BETA, MIN_MU};
use crate::error::{DgeaError, Result};

/// Default ridge penalty on every coefficient (1e-6 on the log2 scale)
pub const DEFAULT_RIDGE: f64 = 1e-6 / (std::f64::consts::LN_2 * std::f64::consts::LN_2);

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations
    pub maxit: usize,
    /// Relative deviance change that counts as converged
    pub beta_tol: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 100,
            beta_tol: 1e-8,
        }
    }
}

/// Per-gene fit
#[derive(Debug, Clone)]
pub struct GlmFitResult {
    /// Natural-log coefficients
    pub coefficients: Vec<f64>,
    /// Natural-log standard errors from the sandwich covariance
    pub standard_errors: Vec<f64>,
    pub converged: bool,
    pub hat_diagonals: Vec<f64>,
    /// Fitted means, floored at MIN_MU
    pub mu: Vec<f64>,
    pub log_likelihood: f64,
}

/// Fits of every gene, row-aligned with the count matrix
#[derive(Debug, Clone)]
pub struct GlmFits {
    pub coefficients: Array2<f64>,
    pub standard_errors: Array2<f64>,
    pub hat_diagonals: Array2<f64>,
    pub mu: Array2<f64>,
    pub converged: Vec<bool>,
}

/// Ridge vector with the default penalty on every coefficient
pub fn default_ridge(n_coefs: usize) -> Vec<f64> {
    vec![DEFAULT_RIDGE; n_coefs]
}

/// Fit the NB GLM for every gene in parallel
pub fn fit_glm(
    counts: ArrayView2<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    dispersions: &[f64],
    lambda: &[f64],
    params: &GlmFitParams,
) -> Result<GlmFits> {
    let (n_genes, n_samples) = counts.dim();
    let n_coefs = design.ncols();
    if dispersions.len() != n_genes {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} dispersions", n_genes),
            got: format!("{} dispersions", dispersions.len()),
        });
    }
    if design.nrows() != n_samples || size_factors.len() != n_samples || lambda.len() != n_coefs {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} samples and {} coefficients", n_samples, n_coefs),
            got: format!(
                "design {}x{}, {} size factors, {} ridge terms",
                design.nrows(),
                design.ncols(),
                size_factors.len(),
                lambda.len()
            ),
        });
    }

    let results: Vec<GlmFitResult> = (0..n_genes)
        .into_par_iter()
        .map(|i| fit_single_gene(counts.row(i), design, size_factors, dispersions[i], lambda, params))
        .collect();

    let mut fits = GlmFits {
        coefficients: Array2::zeros((n_genes, n_coefs)),
        standard_errors: Array2::zeros((n_genes, n_coefs)),
        hat_diagonals: Array2::zeros((n_genes, n_samples)),
        mu: Array2::zeros((n_genes, n_samples)),
        converged: Vec::with_capacity(n_genes),
    };
    for (i, result) in results.into_iter().enumerate() {
        fits.coefficients.row_mut(i).assign(&Array1::from(result.coefficients));
        fits.standard_errors.row_mut(i).assign(&Array1::from(result.standard_errors));
        fits.hat_diagonals.row_mut(i).assign(&Array1::from(result.hat_diagonals));
        fits.mu.row_mut(i).assign(&Array1::from(result.mu));
        fits.converged.push(result.converged);
    }

    let n_failed = fits.converged.iter().filter(|&&c| !c).count();
    if n_failed > 0 {
        log::warn!("{} genes did not converge in the GLM fit", n_failed);
    }
    Ok(fits)
}

/// log NB(y; mu, size) with size = 1/alpha
fn nb_log_density(y: f64, mu: f64, size: f64) -> f64 {
    let prob = size / (size + mu);
    ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0) + size * prob.ln() + y * (1.0 - prob).ln()
}

fn linear_predictor(design: &Array2<f64>, beta: &[f64], sample: usize) -> f64 {
    design.row(sample).iter().zip(beta).map(|(x, b)| x * b).sum()
}

fn fitted_means(design: &Array2<f64>, size_factors: ArrayView1<f64>, beta: &[f64]) -> Vec<f64> {
    (0..design.nrows())
        .map(|i| nb_mean(linear_predictor(design, beta, i), size_factors[i]).max(MIN_MU))
        .collect()
}

/// Fit one gene with per-coefficient ridge penalties `lambda`
///
/// IRLS from an OLS start on log normalized counts; genes that fail to
/// converge fall back to coordinate-wise Newton on the penalized likelihood.
pub fn fit_single_gene(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    alpha: f64,
    lambda: &[f64],
    params: &GlmFitParams,
) -> GlmFitResult {
    let n_samples = counts.len();
    let n_coefs = design.ncols();
    let size = 1.0 / alpha;

    let log_counts: Array1<f64> = counts
        .iter()
        .zip(size_factors.iter())
        .map(|(&c, &s)| (c / s + 0.1).ln())
        .collect();
    let ols = solve_spd(&xtwx(design, &vec![1.0; n_samples]), design.t().dot(&log_counts).view());
    let mut beta = ols.to_vec();
    if beta.iter().any(|b| !b.is_finite()) {
        beta = vec![0.0; n_coefs];
        beta[0] = (log_counts.mean().unwrap_or(0.0)).max(0.1_f64.ln());
    }

    let mut converged = false;
    let mut dev_old = 0.0;
    for iter in 0..params.maxit {
        let mus = fitted_means(design, size_factors, &beta);
        let weights: Vec<f64> = mus.iter().map(|&mu| nb_weight(mu, alpha)).collect();
        let z: Array1<f64> = (0..n_samples)
            .map(|i| (mus[i] / size_factors[i]).ln() + (counts[i] - mus[i]) / mus[i])
            .collect();

        let mut lhs = xtwx(design, &weights);
        for (j, &l) in lambda.iter().enumerate() {
            lhs[[j, j]] += l;
        }
        let wz: Array1<f64> = z.iter().zip(&weights).map(|(z, w)| z * w).collect();
        beta = solve_spd(&lhs, design.t().dot(&wz).view()).to_vec();

        if beta.iter().any(|b| b.abs() > MAX_LFC_BETA) {
            break;
        }

        let mus = fitted_means(design, size_factors, &beta);
        let dev: f64 = mus
            .iter()
            .zip(counts.iter())
            .map(|(&mu, &y)| -2.0 * nb_log_density(y, mu, size))
            .sum();
        let conv_test = (dev - dev_old).abs() / (dev.abs() + 0.1);
        if conv_test.is_nan() {
            break;
        }
        if iter > 0 && conv_test < params.beta_tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    let stable = beta.iter().all(|b| b.is_finite() && b.abs() <= MAX_LFC_BETA);
    if !converged || !stable {
        let start = if stable { beta.clone() } else { ols.to_vec() };
        let fallback = fit_coordinate_newton(counts, design, size_factors, alpha, lambda, &start);
        beta = fallback.0;
        converged = fallback.1;
    }

    let mu = fitted_means(design, size_factors, &beta);
    let weights: Vec<f64> = mu.iter().map(|&m| nb_weight(m, alpha)).collect();
    let (standard_errors, hat_diagonals) = sandwich_errors_and_hat(design, &weights, lambda);
    let log_likelihood = mu.iter().zip(counts.iter()).map(|(&m, &y)| nb_log_density(y, m, size)).sum();

    GlmFitResult {
        coefficients: beta,
        standard_errors,
        converged,
        hat_diagonals,
        mu,
        log_likelihood,
    }
}

/// Coordinate-wise Newton with Armijo backtracking on the penalized log likelihood
fn fit_coordinate_newton(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    alpha: f64,
    lambda: &[f64],
    start: &[f64],
) -> (Vec<f64>, bool) {
    const MAX_ITER: usize = 5000;
    const TOL: f64 = 1e-8;
    const ARMIJO_C: f64 = 1e-4;

    let size = 1.0 / alpha;
    let objective = |beta: &[f64]| -> f64 {
        let ll: f64 = fitted_means(design, size_factors, beta)
            .iter()
            .zip(counts.iter())
            .map(|(&mu, &y)| nb_log_density(y, mu, size))
            .sum();
        let penalty: f64 = beta.iter().zip(lambda).map(|(b, l)| 0.5 * l * b * b).sum();
        ll - penalty
    };

    let mut beta: Vec<f64> = start.iter().map(|b| b.clamp(-MAX_LFC_BETA, MAX_LFC_BETA)).collect();
    let mut current = objective(&beta);

    for _ in 0..MAX_ITER {
        let start_value = current;
        for j in 0..beta.len() {
            let mus = fitted_means(design, size_factors, &beta);
            let mut grad = -lambda[j] * beta[j];
            let mut hess = -lambda[j];
            for (i, &mu) in mus.iter().enumerate() {
                let x = design[[i, j]];
                grad += (counts[i] - mu) / (1.0 + alpha * mu) * x;
                hess -= nb_weight(mu, alpha) * x * x;
            }
            if hess.abs() < 1e-20 {
                continue;
            }
            let delta = -grad / hess;
            if delta.abs() < 1e-14 {
                continue;
            }

            let old = beta[j];
            let mut step = 1.0;
            let mut improved = false;
            for _ in 0..30 {
                beta[j] = (old + step * delta).clamp(-MAX_LFC_BETA, MAX_LFC_BETA);
                let value = objective(&beta);
                if value >= current + ARMIJO_C * step * grad * delta {
                    current = value;
                    improved = true;
                    break;
                }
                step *= 0.5;
            }
            if !improved {
                beta[j] = old;
            }
        }
        if (current - start_value).abs() / (current.abs() + 0.1) < TOL {
            return (beta, true);
        }
    }
    (beta, false)
}

/// Sandwich standard errors and hat diagonals
///
/// Cov = (X'WX + L)^-1 X'WX (X'WX + L)^-1, h_i = w_i x_i' (X'WX + L)^-1 x_i
fn sandwich_errors_and_hat(design: &Array2<f64>, weights: &[f64], lambda: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let info = xtwx(design, weights);
    let mut ridged = info.clone();
    for (j, &l) in lambda.iter().enumerate() {
        ridged[[j, j]] += l;
    }
    let inv = invert_spd(&ridged);

    let hat = design
        .rows()
        .into_iter()
        .zip(weights)
        .map(|(x, &w)| w * x.dot(&inv.dot(&x)))
        .collect();

    let sigma = inv.dot(&info).dot(&inv);
    let standard_errors = sigma
        .diag()
        .iter()
        .map(|&v| if v > 0.0 { v.sqrt() } else { f64::NAN })
        .collect();
    (standard_errors, hat)
}
