//! Fitted model snapshots
//!
//! A [`FittedModel`] holds the dispersion fit and the per-gene GLM
//! coefficients of `~ group` expressed against one reference level. It is
//! immutable: releveling produces a new snapshot.

use std::path::Path;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::data::ExpressionDataSet;
use crate::dispersion::{check_fit, estimate_dispersions, DispersionFit, DispersionParams};
use crate::error::{DgeaError, Result};
use crate::glm::{create_design_matrix, default_ridge, fit_glm, DesignInfo, GlmFitParams};
use crate::io::{nan_matrix, nan_vec, read_json, write_json};

/// Parameters for a full model fit
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    pub dispersion: DispersionParams,
    pub glm: GlmFitParams,
}

/// Dispersions and GLM coefficients for one reference level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    design_info: DesignInfo,
    design_matrix: Array2<f64>,
    gene_ids: Vec<String>,
    #[serde(with = "nan_vec")]
    size_factors: Vec<f64>,
    dispersions: DispersionFit,
    /// Natural-log coefficients (genes x coefs)
    #[serde(with = "nan_matrix")]
    coefficients: Array2<f64>,
    #[serde(with = "nan_matrix")]
    standard_errors: Array2<f64>,
    #[serde(with = "nan_matrix")]
    hat_diagonals: Array2<f64>,
    #[serde(with = "nan_matrix")]
    mu: Array2<f64>,
    converged: Vec<bool>,
}

impl FittedModel {
    /// Estimate dispersions and fit the GLM with `reference` as the intercept level
    pub fn fit(dataset: &ExpressionDataSet, reference: &str, params: &ModelParams) -> Result<Self> {
        let (design_matrix, design_info) = create_design_matrix(dataset.design(), reference)?;
        log::info!(
            "Fitting ~ group on {} genes x {} samples (reference '{}')",
            dataset.n_genes(),
            dataset.n_samples(),
            reference
        );
        let dispersions = estimate_dispersions(dataset, &design_matrix, &params.dispersion)?;
        Self::fit_coefficients(dataset, design_matrix, design_info, dispersions, &params.glm)
    }

    /// Same model expressed against another reference level
    ///
    /// Dispersions depend only on the column space of the design, which does
    /// not change, so only the coefficients are refit.
    pub fn relevel(&self, dataset: &ExpressionDataSet, reference: &str, params: &GlmFitParams) -> Result<Self> {
        if reference == self.reference() {
            return Ok(self.clone());
        }
        self.check_dataset(dataset)?;
        let (design_matrix, design_info) = create_design_matrix(dataset.design(), reference)?;
        log::info!("Releveling model from '{}' to '{}'", self.reference(), reference);
        Self::fit_coefficients(dataset, design_matrix, design_info, self.dispersions.clone(), params)
    }

    fn fit_coefficients(
        dataset: &ExpressionDataSet,
        design_matrix: Array2<f64>,
        design_info: DesignInfo,
        dispersions: DispersionFit,
        params: &GlmFitParams,
    ) -> Result<Self> {
        check_fit(&dispersions, dataset.n_genes())?;
        let fits = fit_glm(
            dataset.counts().counts(),
            &design_matrix,
            dataset.size_factors(),
            &dispersions.final_dispersions,
            &default_ridge(design_matrix.ncols()),
            params,
        )?;
        Ok(Self {
            design_info,
            design_matrix,
            gene_ids: dataset.gene_ids().to_vec(),
            size_factors: dataset.size_factors().to_vec(),
            dispersions,
            coefficients: fits.coefficients,
            standard_errors: fits.standard_errors,
            hat_diagonals: fits.hat_diagonals,
            mu: fits.mu,
            converged: fits.converged,
        })
    }

    /// Reject a dataset other than the one this snapshot was fitted on
    pub fn check_dataset(&self, dataset: &ExpressionDataSet) -> Result<()> {
        if dataset.gene_ids() != self.gene_ids.as_slice() {
            return Err(DgeaError::InvalidCountMatrix {
                reason: "dataset genes differ from the fitted model".to_string(),
            });
        }
        let same_sf = dataset.n_samples() == self.size_factors.len()
            && dataset
                .size_factors()
                .iter()
                .zip(&self.size_factors)
                .all(|(a, b)| (a - b).abs() <= 1e-12 * a.abs().max(1.0));
        if !same_sf {
            return Err(DgeaError::InvalidCountMatrix {
                reason: "dataset size factors differ from the fitted model".to_string(),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)?;
        log::debug!("Wrote model snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let model: Self = read_json(path)?;
        let n_genes = model.gene_ids.len();
        check_fit(&model.dispersions, n_genes)?;
        if model.coefficients.dim() != (n_genes, model.design_info.n_coefs()) {
            return Err(DgeaError::DimensionMismatch {
                expected: format!("{}x{} coefficients", n_genes, model.design_info.n_coefs()),
                got: format!("{}x{} coefficients", model.coefficients.nrows(), model.coefficients.ncols()),
            });
        }
        Ok(model)
    }

    pub fn reference(&self) -> &str {
        &self.design_info.reference_level
    }

    pub fn design_info(&self) -> &DesignInfo {
        &self.design_info
    }

    pub fn design_matrix(&self) -> &Array2<f64> {
        &self.design_matrix
    }

    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn dispersions(&self) -> &DispersionFit {
        &self.dispersions
    }

    /// Natural-log coefficient column
    pub fn coefficient(&self, coef_idx: usize) -> ArrayView1<'_, f64> {
        self.coefficients.column(coef_idx)
    }

    pub fn standard_error(&self, coef_idx: usize) -> ArrayView1<'_, f64> {
        self.standard_errors.column(coef_idx)
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn hat_diagonals(&self) -> &Array2<f64> {
        &self.hat_diagonals
    }

    pub fn mu(&self) -> &Array2<f64> {
        &self.mu
    }

    pub fn converged(&self) -> &[bool] {
        &self.converged
    }
}
