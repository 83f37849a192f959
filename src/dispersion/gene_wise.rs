//! Gene-wise dispersion estimation using Cox-Reid adjusted profile likelihood

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::likelihood::GeneLikelihood;
use super::DispersionParams;
use crate::glm::linalg::{solve_spd, xtwx};
use crate::glm::MIN_MU;

/// Gene-wise estimates for every gene, with the fitted means they were computed at
///
/// Returns `(dispersions, mu)`; `mu` is genes x samples and is reused by the
/// MAP step.
pub fn estimate_gene_dispersions(
    counts: ArrayView2<f64>,
    size_factors: ArrayView1<f64>,
    design: &Array2<f64>,
    params: &DispersionParams,
) -> (Array1<f64>, Array2<f64>) {
    let (n_genes, n_samples) = counts.dim();
    let sf = size_factors.to_vec();
    let xim = sf.iter().map(|&s| 1.0 / s.max(1e-10)).sum::<f64>() / n_samples as f64;

    let results: Vec<(f64, Vec<f64>)> = (0..n_genes)
        .into_par_iter()
        .map(|i| estimate_dispersion_gene(&counts.row(i).to_vec(), &sf, design, xim, params))
        .collect();

    let mut dispersions = Array1::zeros(n_genes);
    let mut mu = Array2::zeros((n_genes, n_samples));
    for (i, (disp, gene_mu)) in results.into_iter().enumerate() {
        dispersions[i] = disp;
        mu.row_mut(i).assign(&Array1::from(gene_mu));
    }
    (dispersions, mu)
}

/// Dispersion of one gene
///
/// Starts at `min(roughDisp, momentsDisp)`, runs the line search with the
/// group-mean fit held fixed and keeps the start value when the search does not
/// improve the posterior. A search that fails to converge is redone on a grid.
pub fn estimate_dispersion_gene(
    counts: &[f64],
    size_factors: &[f64],
    design: &Array2<f64>,
    xim: f64,
    params: &DispersionParams,
) -> (f64, Vec<f64>) {
    let n_samples = counts.len();
    if counts.iter().all(|&c| c == 0.0) {
        return (f64::NAN, vec![0.0; n_samples]);
    }
    let max_disp = params.max_disp(n_samples);

    let normalized: Vec<f64> = counts.iter().zip(size_factors).map(|(&c, &s)| c / s).collect();
    let fitted = linear_model_fit(&normalized, design);

    let rough = rough_disp_estimate(&normalized, &fitted, design.ncols());
    let moments = moments_disp_estimate(&normalized, xim);
    let alpha_init = rough.min(moments).clamp(params.min_disp, max_disp);

    let mu: Vec<f64> = fitted
        .iter()
        .zip(size_factors)
        .map(|(&m, &s)| (m * s).max(MIN_MU))
        .collect();

    let likelihood = GeneLikelihood {
        counts,
        mu: &mu,
        design,
        prior: None,
    };
    let search = likelihood.line_search(alpha_init, params);
    let no_increase = search.last_lp < search.initial_lp + search.initial_lp.abs() / 1e6;
    let mut disp = if no_increase {
        alpha_init
    } else {
        search.log_alpha.exp()
    };

    let converged = search.iterations < params.maxit && search.iterations != 1;
    if !converged && disp > params.min_disp * 10.0 {
        log::trace!("gene-wise line search stalled after {} steps, using grid", search.iterations);
        disp = likelihood.grid_search(params.min_disp, max_disp);
    }

    (disp.clamp(params.min_disp, max_disp), mu)
}

/// Least-squares fit of normalized counts on the design (group means for `~ group`)
fn linear_model_fit(normalized: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let xtx = xtwx(design, &vec![1.0; normalized.len()]);
    let y = ArrayView1::from(normalized);
    let beta = solve_spd(&xtx, design.t().dot(&y).view());
    design.dot(&beta).to_vec()
}

/// Method-of-moments estimate on the residuals of the linear fit
fn rough_disp_estimate(normalized: &[f64], fitted: &[f64], n_coefs: usize) -> f64 {
    let df = (normalized.len() - n_coefs) as f64;
    let sum: f64 = normalized
        .iter()
        .zip(fitted)
        .map(|(&y, &mu)| {
            let mu = mu.max(1.0);
            ((y - mu).powi(2) - mu) / (mu * mu)
        })
        .sum();
    (sum / df).max(0.0)
}

/// (variance - xim * mean) / mean^2 over the normalized counts
fn moments_disp_estimate(normalized: &[f64], xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.iter().sum::<f64>() / n;
    if mean <= 1e-10 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (var - xim * mean) / (mean * mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> Array2<f64> {
        array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]
    }

    #[test]
    fn test_linear_fit_is_group_mean() {
        let fitted = linear_model_fit(&[1.0, 2.0, 3.0, 10.0, 20.0, 30.0], &design());
        assert!((fitted[0] - 2.0).abs() < 1e-10);
        assert!((fitted[4] - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_all_zero_gene_is_nan() {
        let (disp, mu) = estimate_dispersion_gene(&[0.0; 6], &[1.0; 6], &design(), 1.0, &DispersionParams::default());
        assert!(disp.is_nan());
        assert_eq!(mu, vec![0.0; 6]);
    }

    #[test]
    fn test_noisier_gene_gets_larger_dispersion() {
        let params = DispersionParams::default();
        let sf = [1.0; 6];
        let calm = [98.0, 102.0, 100.0, 199.0, 201.0, 200.0];
        let noisy = [40.0, 180.0, 80.0, 90.0, 400.0, 150.0];
        let (d_calm, _) = estimate_dispersion_gene(&calm, &sf, &design(), 1.0, &params);
        let (d_noisy, _) = estimate_dispersion_gene(&noisy, &sf, &design(), 1.0, &params);
        assert!(d_calm >= params.min_disp);
        assert!(d_noisy > d_calm);
        assert!(d_noisy > 0.1 && d_noisy <= 10.0);
    }

    #[test]
    fn test_estimate_gene_dispersions_shapes() {
        let counts = array![[10.0, 12.0, 9.0, 30.0, 28.0, 35.0], [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
        let sf = Array1::ones(6);
        let (disp, mu) = estimate_gene_dispersions(counts.view(), sf.view(), &design(), &DispersionParams::default());
        assert_eq!(disp.len(), 2);
        assert_eq!(mu.dim(), (2, 6));
        assert!(disp[0].is_finite());
        assert!(disp[1].is_nan());
    }
}
