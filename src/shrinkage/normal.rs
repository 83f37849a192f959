//! Normal-prior log fold change shrinkage
//!
//! 1. Estimate a prior variance per group coefficient from the weighted upper
//!    quantile of the MLE log2 fold changes
//! 2. Refit the GLM with ridge penalty `1 / prior_var` on those coefficients
//! 3. Report the refit coefficient and standard error; test statistics are
//!    left to the MLE fit

use crate::data::ExpressionDataSet;
use crate::error::{DgeaError, Result};
use crate::glm::{fit_glm, GlmFitParams, DEFAULT_RIDGE};
use crate::model::FittedModel;
use crate::stats::match_weighted_upper_quantile_for_variance;

/// Upper quantile of |log2FC| matched by the prior
const UPPER_QUANTILE: f64 = 0.05;

/// Shrunk log2 fold changes for one coefficient
#[derive(Debug, Clone)]
pub struct ShrunkLfc {
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    /// Prior variance of the coefficient on the log2 scale
    pub prior_var: f64,
}

/// Shrink coefficient `coef_idx` of `model` toward zero
pub fn shrink_lfc_normal(
    model: &FittedModel,
    dataset: &ExpressionDataSet,
    coef_idx: usize,
    params: &GlmFitParams,
) -> Result<ShrunkLfc> {
    model.check_dataset(dataset)?;
    let n_coefs = model.design_info().n_coefs();
    if coef_idx == 0 || coef_idx >= n_coefs {
        return Err(DgeaError::InvalidContrast {
            reason: format!("coefficient {} cannot be shrunk", coef_idx),
        });
    }

    let base_means = dataset.base_means();
    let trended = &model.dispersions().trended;
    let nonzero: Vec<usize> = (0..model.n_genes()).filter(|&i| base_means[i] > 0.0).collect();
    if nonzero.is_empty() {
        return Err(DgeaError::EmptyData {
            reason: "every gene has zero counts".to_string(),
        });
    }
    let weights: Vec<f64> = nonzero
        .iter()
        .map(|&i| 1.0 / (1.0 / base_means[i] + trended[i]))
        .collect();

    let log2_e = std::f64::consts::LOG2_E;
    let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
    let mut lambda = vec![DEFAULT_RIDGE; n_coefs];
    let mut prior_vars = vec![f64::NAN; n_coefs];
    for k in 1..n_coefs {
        let coef = model.coefficient(k);
        let (betas, betas_weights): (Vec<f64>, Vec<f64>) = nonzero
            .iter()
            .zip(&weights)
            .map(|(&i, &w)| (coef[i] * log2_e, w))
            .filter(|(b, _)| b.is_finite() && b.abs() < 10.0)
            .unzip();
        let prior_var = if betas.is_empty() {
            1e6
        } else {
            match_weighted_upper_quantile_for_variance(&betas, &betas_weights, UPPER_QUANTILE)
        };
        prior_vars[k] = prior_var;
        lambda[k] = 1.0 / prior_var / ln2_sq;
    }
    log::debug!("LFC prior variances: {:?}", &prior_vars[1..]);

    let fits = fit_glm(
        dataset.counts().counts(),
        model.design_matrix(),
        dataset.size_factors(),
        &model.dispersions().final_dispersions,
        &lambda,
        params,
    )?;

    let mut shrunk = ShrunkLfc {
        log2_fold_changes: vec![0.0; model.n_genes()],
        lfc_se: vec![0.0; model.n_genes()],
        prior_var: prior_vars[coef_idx],
    };
    for &i in &nonzero {
        shrunk.log2_fold_changes[i] = fits.coefficients[[i, coef_idx]] * log2_e;
        shrunk.lfc_se[i] = fits.standard_errors[[i, coef_idx]] * log2_e;
    }
    Ok(shrunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelParams;
    use crate::test_support::{simulated_dataset, UP_IN_TAT};

    #[test]
    fn test_shrinkage_pulls_toward_zero() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        let tat = model.design_info().coef_index("Tat").unwrap();
        let shrunk = shrink_lfc_normal(&model, &dataset, tat, &GlmFitParams::default()).unwrap();

        assert!(shrunk.prior_var > 0.0);
        let mle: Vec<f64> = model.coefficient(tat).iter().map(|b| b * std::f64::consts::LOG2_E).collect();
        let up = shrunk.log2_fold_changes[UP_IN_TAT];
        assert!(up > 0.0 && up < mle[UP_IN_TAT]);
        let total_mle: f64 = mle.iter().map(|b| b.abs()).sum();
        let total_shrunk: f64 = shrunk.log2_fold_changes.iter().map(|b| b.abs()).sum();
        assert!(total_shrunk < total_mle);
        assert!(shrunk.lfc_se.iter().all(|se| se.is_finite() && *se > 0.0));
    }

    #[test]
    fn test_intercept_cannot_be_shrunk() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        assert!(shrink_lfc_normal(&model, &dataset, 0, &GlmFitParams::default()).is_err());
    }
}
