//! Normalized count matrices

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{DgeaError, Result};

/// Counts divided by their sample's size factor
pub fn normalized_counts(counts: ArrayView2<f64>, size_factors: &[f64]) -> Result<Array2<f64>> {
    let n_samples = counts.ncols();
    if size_factors.len() != n_samples {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} size factors", n_samples),
            got: format!("{} size factors", size_factors.len()),
        });
    }

    let mut normalized = counts.to_owned();
    for (mut column, &sf) in normalized.axis_iter_mut(Axis(1)).zip(size_factors) {
        column.mapv_inplace(|c| c / sf);
    }
    Ok(normalized)
}

/// Fragments per million, scaled by each sample's library size
pub fn fpm(counts: ArrayView2<f64>) -> Array2<f64> {
    let library_sizes: Vec<f64> = counts.axis_iter(Axis(1)).map(|col| col.sum()).collect();

    let mut result = counts.to_owned();
    for (mut column, &lib_size) in result.axis_iter_mut(Axis(1)).zip(&library_sizes) {
        let lib_size = lib_size.max(1.0);
        column.mapv_inplace(|c| c * 1e6 / lib_size);
    }
    result
}
