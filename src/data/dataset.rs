//! ExpressionDataSet - filtered counts, design and normalization

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{CountMatrix, SampleDesign};
use crate::error::{DgeaError, Result};
use crate::normalization::{estimate_size_factors, normalized_counts, SizeFactorMethod};

/// Filtered count matrix together with its sample design and size factors
///
/// Size factors are computed once from the full filtered matrix; every model
/// snapshot fitted on this dataset shares them.
#[derive(Debug, Clone)]
pub struct ExpressionDataSet {
    counts: CountMatrix,
    design: SampleDesign,
    size_factors: Array1<f64>,
    /// counts / size factor (genes x samples)
    normalized: Array2<f64>,
    /// Mean of normalized counts per gene
    base_means: Array1<f64>,
    /// Sample variance of normalized counts per gene
    base_vars: Array1<f64>,
}

impl ExpressionDataSet {
    /// Build the dataset and estimate size factors by median of ratios
    pub fn new(counts: CountMatrix, design: SampleDesign) -> Result<Self> {
        design.check_matches(&counts)?;
        if counts.n_genes() == 0 {
            return Err(DgeaError::EmptyData {
                reason: "no genes left after filtering".to_string(),
            });
        }

        let size_factors = match estimate_size_factors(counts.counts(), SizeFactorMethod::Ratio) {
            Ok(sf) => sf,
            Err(DgeaError::SizeFactorFailed { reason }) => {
                log::warn!("Median-of-ratios failed ({}), using positive counts", reason);
                estimate_size_factors(counts.counts(), SizeFactorMethod::PosCounts)?
            }
            Err(e) => return Err(e),
        };

        Self::with_size_factors(counts, design, size_factors)
    }

    /// Build the dataset from previously estimated size factors
    pub fn with_size_factors(counts: CountMatrix, design: SampleDesign, size_factors: Array1<f64>) -> Result<Self> {
        design.check_matches(&counts)?;
        let sf = size_factors.to_vec();
        let normalized = normalized_counts(counts.counts(), &sf)?;

        let n = counts.n_samples() as f64;
        let base_means: Array1<f64> = normalized.axis_iter(Axis(0)).map(|row| row.sum() / n).collect();
        let base_vars: Array1<f64> = normalized
            .axis_iter(Axis(0))
            .zip(base_means.iter())
            .map(|(row, &mean)| row.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0))
            .collect();

        Ok(Self {
            counts,
            design,
            size_factors,
            normalized,
            base_means,
            base_vars,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn gene_ids(&self) -> &[String] {
        self.counts.gene_ids()
    }

    pub fn design(&self) -> &SampleDesign {
        &self.design
    }

    pub fn size_factors(&self) -> ArrayView1<'_, f64> {
        self.size_factors.view()
    }

    pub fn normalized_counts(&self) -> ArrayView2<'_, f64> {
        self.normalized.view()
    }

    pub fn base_means(&self) -> ArrayView1<'_, f64> {
        self.base_means.view()
    }

    pub fn base_vars(&self) -> ArrayView1<'_, f64> {
        self.base_vars.view()
    }
}
