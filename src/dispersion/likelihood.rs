//! Cox-Reid adjusted log posterior of log(alpha) and its maximization
//!
//! Shared by the gene-wise estimate (no prior) and the MAP estimate
//! (log-normal prior centred on the trend).

use ndarray::{Array1, Array2};
use statrs::function::gamma::{digamma, ln_gamma};

use super::DispersionParams;
use crate::glm::linalg::{invert_spd, log_det_spd, xtwx};

/// Hard bounds on proposals in log(alpha)
const MIN_LOG_ALPHA_HARD: f64 = -30.0;
const MAX_LOG_ALPHA_HARD: f64 = 10.0;
/// Sufficient decrease constant of the Armijo rule
const ARMIJO_EPSILON: f64 = 1e-4;

/// Normal prior on log(alpha)
#[derive(Debug, Clone, Copy)]
pub struct LogNormalPrior {
    pub mean: f64,
    pub variance: f64,
}

/// One gene's data, with the fitted means held fixed during the search
pub struct GeneLikelihood<'a> {
    pub counts: &'a [f64],
    pub mu: &'a [f64],
    pub design: &'a Array2<f64>,
    pub prior: Option<LogNormalPrior>,
}

/// Outcome of the Armijo line search
#[derive(Debug, Clone, Copy)]
pub struct LineSearch {
    pub log_alpha: f64,
    pub initial_lp: f64,
    pub last_lp: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl GeneLikelihood<'_> {
    fn cr_weights(&self, alpha: f64) -> Vec<f64> {
        self.mu.iter().map(|&m| 1.0 / (1.0 / m.max(1e-10) + alpha)).collect()
    }

    /// Log posterior at log(alpha)
    pub fn log_posterior(&self, log_alpha: f64) -> f64 {
        let alpha = log_alpha.exp();
        let alpha_inv = 1.0 / alpha;

        let ll: f64 = self
            .counts
            .iter()
            .zip(self.mu)
            .map(|(&y, &mu)| {
                let mu = mu.max(1e-10);
                ln_gamma(y + alpha_inv) - ln_gamma(alpha_inv)
                    - y * (mu + alpha_inv).ln()
                    - alpha_inv * (1.0 + mu * alpha).ln()
            })
            .sum();

        let log_det = log_det_spd(&xtwx(self.design, &self.cr_weights(alpha)));
        let cr = if log_det.is_finite() { -0.5 * log_det } else { 0.0 };

        let prior = self
            .prior
            .map_or(0.0, |p| -0.5 * (log_alpha - p.mean).powi(2) / p.variance);
        ll + cr + prior
    }

    /// Derivative of the log posterior with respect to log(alpha)
    pub fn d_log_posterior(&self, log_alpha: f64) -> f64 {
        let alpha = log_alpha.exp();
        let alpha_inv = 1.0 / alpha;

        let ll_sum: f64 = self
            .counts
            .iter()
            .zip(self.mu)
            .map(|(&y, &mu)| {
                let mu = mu.max(1e-10);
                digamma(alpha_inv) + (1.0 + mu * alpha).ln() - mu * alpha / (1.0 + mu * alpha)
                    - digamma(y + alpha_inv)
                    + y / (mu + alpha_inv)
            })
            .sum();
        let ll_part = alpha_inv * alpha_inv * ll_sum;

        // d/dalpha of -0.5 log|X'WX| = -0.5 tr(B^-1 dB), dw = -w^2
        let w = self.cr_weights(alpha);
        let dw: Vec<f64> = w.iter().map(|w| -w * w).collect();
        let b_inv = invert_spd(&xtwx(self.design, &w));
        let db = xtwx(self.design, &dw);
        let trace: f64 = (b_inv * db.t()).sum();
        let cr_part = if trace.is_finite() { -0.5 * trace } else { 0.0 };

        let prior = self.prior.map_or(0.0, |p| -(log_alpha - p.mean) / p.variance);
        (ll_part + cr_part) * alpha + prior
    }

    /// Armijo line search over log(alpha) from `alpha_init`
    pub fn line_search(&self, alpha_init: f64, params: &DispersionParams) -> LineSearch {
        let min_log_alpha = (params.min_disp / 10.0).ln();
        let mut log_alpha = alpha_init.max(1e-10).ln().clamp(MIN_LOG_ALPHA_HARD, MAX_LOG_ALPHA_HARD);
        let initial_lp = self.log_posterior(log_alpha);
        let mut lp = initial_lp;
        let mut dlp = self.d_log_posterior(log_alpha);
        let mut kappa = params.kappa_0;
        let mut accepted = 0;

        for iter in 0..params.maxit {
            let raw = log_alpha + kappa * dlp;
            if raw < MIN_LOG_ALPHA_HARD {
                kappa = (MIN_LOG_ALPHA_HARD - log_alpha) / dlp;
            }
            if raw > MAX_LOG_ALPHA_HARD {
                kappa = (MAX_LOG_ALPHA_HARD - log_alpha) / dlp;
            }
            let proposal = log_alpha + kappa * dlp;
            let lp_new = self.log_posterior(proposal);

            if -lp_new <= -lp - kappa * ARMIJO_EPSILON * dlp * dlp {
                accepted += 1;
                log_alpha = proposal;
                let change = lp_new - lp;
                lp = lp_new;
                if change < params.disp_tol || log_alpha < min_log_alpha {
                    return LineSearch {
                        log_alpha,
                        initial_lp,
                        last_lp: lp,
                        iterations: iter + 1,
                        converged: true,
                    };
                }
                dlp = self.d_log_posterior(log_alpha);
                kappa = (kappa * 1.1).min(params.kappa_0);
                if accepted % 5 == 0 {
                    kappa /= 2.0;
                }
            } else {
                kappa /= 2.0;
            }
        }

        LineSearch {
            log_alpha,
            initial_lp,
            last_lp: lp,
            iterations: params.maxit,
            converged: false,
        }
    }

    /// Coarse-then-fine grid maximization over [min_disp, max_disp]
    pub fn grid_search(&self, min_disp: f64, max_disp: f64) -> f64 {
        const N_GRID: usize = 20;
        let lo = min_disp.ln();
        let hi = max_disp.ln();
        let delta = (hi - lo) / (N_GRID - 1) as f64;

        let coarse: Array1<f64> = (0..N_GRID).map(|i| lo + i as f64 * delta).collect();
        let best_coarse = self.best_on_grid(&coarse);

        let fine_delta = 2.0 * delta / (N_GRID - 1) as f64;
        let fine: Array1<f64> = (0..N_GRID).map(|i| best_coarse - delta + i as f64 * fine_delta).collect();
        self.best_on_grid(&fine).exp()
    }

    fn best_on_grid(&self, grid: &Array1<f64>) -> f64 {
        grid.iter()
            .map(|&la| (la, self.log_posterior(la)))
            .filter(|(_, lp)| lp.is_finite())
            .fold((grid[0], f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> Array2<f64> {
        array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let design = design();
        let counts = [12.0, 30.0, 18.0, 60.0, 95.0, 40.0];
        let mu = [20.0, 20.0, 20.0, 65.0, 65.0, 65.0];
        let prior = LogNormalPrior {
            mean: 0.1_f64.ln(),
            variance: 0.5,
        };
        for prior in [None, Some(prior)] {
            let lik = GeneLikelihood {
                counts: &counts,
                mu: &mu,
                design: &design,
                prior,
            };
            let la = 0.2_f64.ln();
            let h = 1e-5;
            let numeric = (lik.log_posterior(la + h) - lik.log_posterior(la - h)) / (2.0 * h);
            let analytic = lik.d_log_posterior(la);
            assert!((numeric - analytic).abs() < 1e-4 * (1.0 + analytic.abs()));
        }
    }

    #[test]
    fn test_line_search_and_grid_agree() {
        let design = design();
        let counts = [12.0, 30.0, 18.0, 60.0, 95.0, 40.0];
        let mu = [20.0, 20.0, 20.0, 65.0, 65.0, 65.0];
        let lik = GeneLikelihood {
            counts: &counts,
            mu: &mu,
            design: &design,
            prior: None,
        };
        let search = lik.line_search(0.1, &DispersionParams::default());
        assert!(search.converged);
        assert!(search.last_lp >= search.initial_lp);

        let grid = lik.grid_search(1e-8, 10.0);
        assert!((search.log_alpha - grid.ln()).abs() < 0.3);
    }
}
