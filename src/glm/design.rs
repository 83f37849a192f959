//! Design matrix for the single-factor `~ group` model

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::SampleDesign;
use crate::error::{DgeaError, Result};

/// Column layout of a design matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignInfo {
    /// `Intercept`, then `group_<level>_vs_<reference>` per non-reference level
    pub coef_names: Vec<String>,
    /// Level absorbed into the intercept
    pub reference_level: String,
    /// Reference first, then the remaining levels in column order
    pub levels: Vec<String>,
}

impl DesignInfo {
    pub fn n_coefs(&self) -> usize {
        self.coef_names.len()
    }

    /// Column holding the `level` vs reference log fold change
    pub fn coef_index(&self, level: &str) -> Option<usize> {
        if level == self.reference_level {
            return None;
        }
        self.levels.iter().position(|l| l == level)
    }
}

/// Treatment-coded design with `reference` as the intercept level
///
/// Column 0 is all ones; column j marks samples of the j-th non-reference level.
pub fn create_design_matrix(design: &SampleDesign, reference: &str) -> Result<(Array2<f64>, DesignInfo)> {
    if !design.has_level(reference) {
        return Err(DgeaError::InvalidDesignMatrix {
            reason: format!("reference level '{}' is not a sample group", reference),
        });
    }

    let mut levels = vec![reference.to_string()];
    levels.extend(design.levels().filter(|l| *l != reference).map(str::to_string));

    let n_samples = design.n_samples();
    let mut matrix = Array2::zeros((n_samples, levels.len()));
    for i in 0..n_samples {
        matrix[[i, 0]] = 1.0;
        let group = design.group_of(i);
        if let Some(j) = levels.iter().skip(1).position(|l| l == group) {
            matrix[[i, j + 1]] = 1.0;
        }
    }

    let mut coef_names = vec!["Intercept".to_string()];
    coef_names.extend(levels.iter().skip(1).map(|l| format!("group_{}_vs_{}", l, reference)));

    check_full_rank(&matrix)?;
    Ok((
        matrix,
        DesignInfo {
            coef_names,
            reference_level: reference.to_string(),
            levels,
        },
    ))
}

/// Column index for a `numerator` vs `denominator` contrast
///
/// The denominator has to be the reference level of the fit; contrasts against
/// any other level need a refit under that reference.
pub fn contrast_index(info: &DesignInfo, numerator: &str, denominator: &str) -> Result<usize> {
    if numerator == denominator {
        return Err(DgeaError::InvalidContrast {
            reason: format!("numerator and denominator are both '{}'", numerator),
        });
    }
    if denominator != info.reference_level {
        return Err(DgeaError::InvalidContrast {
            reason: format!(
                "denominator '{}' is not the reference level '{}' of this fit",
                denominator, info.reference_level
            ),
        });
    }
    info.coef_index(numerator).ok_or_else(|| DgeaError::InvalidContrast {
        reason: format!("level '{}' not found in the design", numerator),
    })
}

/// Reject rank-deficient design matrices
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let (nrow, ncol) = matrix.dim();
    if nrow == 0 || ncol == 0 {
        return Err(DgeaError::InvalidDesignMatrix {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }
    if qr_rank(matrix) < ncol {
        let zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if zero_column {
            "the model matrix is not full rank: a level has no samples"
        } else {
            "the model matrix is not full rank: columns are linear combinations of each other"
        };
        return Err(DgeaError::InvalidDesignMatrix {
            reason: reason.to_string(),
        });
    }
    Ok(())
}

/// Numerical rank by Householder QR with column pivoting
fn qr_rank(matrix: &Array2<f64>) -> usize {
    let (nrow, ncol) = matrix.dim();
    let k = nrow.min(ncol);
    let mut r = matrix.to_owned();
    let mut col_norms: Vec<f64> = (0..ncol).map(|j| r.column(j).iter().map(|v| v * v).sum()).collect();

    for step in 0..k {
        let pivot = (step..ncol)
            .max_by(|&a, &b| col_norms[a].total_cmp(&col_norms[b]))
            .unwrap_or(step);
        if pivot != step {
            for i in 0..nrow {
                r.swap([i, step], [i, pivot]);
            }
            col_norms.swap(step, pivot);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]].powi(2)).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }
        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]].powi(2)).sum::<f64>();
        if v_norm_sq < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let dot = v0 * r[[step, j]] + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, j]]).sum::<f64>();
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
            col_norms[j] = (col_norms[j] - r[[step, j]].powi(2)).max(0.0);
        }
    }

    let max_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_diag;
    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
