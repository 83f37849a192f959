//! Dispersion trend fitting

use serde::{Deserialize, Serialize};

use crate::error::{DgeaError, Result};
use crate::stats::trimmed_mean;

/// Fitted dispersion-mean relationship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispersionTrend {
    /// dispersion = asympt_disp + extra_pois / mean
    Parametric { asympt_disp: f64, extra_pois: f64 },
    /// Same value for every gene
    Mean { value: f64 },
}

impl DispersionTrend {
    /// Trended dispersion at a given mean of normalized counts
    pub fn evaluate(&self, mean: f64) -> f64 {
        match *self {
            DispersionTrend::Parametric {
                asympt_disp,
                extra_pois,
            } => {
                if mean > 0.0 {
                    asympt_disp + extra_pois / mean
                } else {
                    asympt_disp
                }
            }
            DispersionTrend::Mean { value } => value,
        }
    }
}

/// Fit the trend, falling back to the mean trend when the parametric fit fails
pub fn fit_dispersion_trend(base_means: &[f64], gene_dispersions: &[f64], min_disp: f64) -> Result<DispersionTrend> {
    match fit_parametric_trend(base_means, gene_dispersions, min_disp) {
        Ok(trend) => Ok(trend),
        Err(e) => {
            log::warn!("Parametric dispersion trend failed ({}), using mean trend", e);
            fit_mean_trend(gene_dispersions, min_disp)
        }
    }
}

/// Trimmed mean (trim 0.001) of the gene-wise estimates above 10 * min_disp
pub fn fit_mean_trend(gene_dispersions: &[f64], min_disp: f64) -> Result<DispersionTrend> {
    let mut usable: Vec<f64> = gene_dispersions
        .iter()
        .copied()
        .filter(|&d| d.is_finite() && d > 10.0 * min_disp)
        .collect();
    if usable.is_empty() {
        return Err(DgeaError::TrendFittingFailed {
            reason: "no gene-wise dispersion above the minimum".to_string(),
        });
    }
    Ok(DispersionTrend::Mean {
        value: trimmed_mean(&mut usable, 0.001),
    })
}

/// Parametric fit by iterated Gamma-family GLM with residual filtering
fn fit_parametric_trend(means: &[f64], dispersions: &[f64], min_disp: f64) -> Result<DispersionTrend> {
    const MAX_ITER: usize = 11;

    let data: Vec<(f64, f64)> = means
        .iter()
        .zip(dispersions)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d >= 100.0 * min_disp)
        .map(|(&m, &d)| (m, d))
        .collect();
    if data.len() < 3 {
        return Err(DgeaError::TrendFittingFailed {
            reason: format!("only {} genes usable for the trend", data.len()),
        });
    }

    let mut coefs = (0.1_f64, 1.0_f64);
    for iter in 0..MAX_ITER {
        let good: Vec<(f64, f64)> = data
            .iter()
            .copied()
            .filter(|&(m, d)| {
                let fitted = coefs.0 + coefs.1 / m;
                let residual = d / fitted;
                fitted > 0.0 && residual > 1e-4 && residual < 15.0
            })
            .collect();
        if good.len() < 3 {
            return Err(DgeaError::TrendFittingFailed {
                reason: "not enough genes within the residual window".to_string(),
            });
        }

        let old = coefs;
        let (new_coefs, glm_converged) = fit_gamma_identity(&good, coefs);
        coefs = new_coefs;
        log::debug!(
            "trend iteration {}: {} genes, a0={:.6}, a1={:.6}",
            iter + 1,
            good.len(),
            coefs.0,
            coefs.1
        );

        if coefs.0 <= 0.0 || coefs.1 <= 0.0 {
            return Err(DgeaError::TrendFittingFailed {
                reason: format!("coefficients not positive (a0={:.4}, a1={:.4})", coefs.0, coefs.1),
            });
        }

        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && glm_converged {
            return Ok(DispersionTrend::Parametric {
                asympt_disp: coefs.0,
                extra_pois: coefs.1,
            });
        }
    }

    Err(DgeaError::TrendFittingFailed {
        reason: "dispersion trend did not converge".to_string(),
    })
}

/// Gamma GLM with identity link, `disp ~ 1 + I(1/mean)`
fn fit_gamma_identity(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    const MAX_ITER: usize = 25;
    const TOL: f64 = 1e-8;

    let deviance = |a0: f64, a1: f64| -> f64 {
        data.iter()
            .map(|&(m, d)| {
                let mu = (a0 + a1 / m).max(1e-8);
                2.0 * (-(d / mu).ln() + (d - mu) / mu)
            })
            .sum()
    };

    let (mut a0, mut a1) = start;
    let mut dev_old = deviance(a0, a1);
    for _ in 0..MAX_ITER {
        let (mut sw, mut swx, mut swz, mut swxx, mut swxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(m, d) in data {
            let x = 1.0 / m;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swz += w * d;
            swxx += w * x * x;
            swxz += w * x * d;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swz - swx * swxz) / det;
        a1 = (sw * swxz - swx * swz) / det;

        let dev = deviance(a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < TOL {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}
