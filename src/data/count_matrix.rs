//! Count matrix representation for RNA-seq data

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{DgeaError, Result};

/// A gene x sample matrix of read counts
#[derive(Debug, Clone, PartialEq)]
pub struct CountMatrix {
    /// Count data (genes x samples)
    counts: Array2<f64>,
    /// Gene identifiers, one per row
    gene_ids: Vec<String>,
    /// Sample identifiers, one per column
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix, validating shape, values and ID uniqueness
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(DgeaError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        if sample_ids.len() != n_samples {
            return Err(DgeaError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(DgeaError::InvalidCountMatrix {
                reason: "Counts must be non-negative finite values".to_string(),
            });
        }

        if let Some(dup) = first_duplicate(&gene_ids) {
            return Err(DgeaError::InvalidCountMatrix {
                reason: format!("duplicate gene ID '{}'", dup),
            });
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(DgeaError::InvalidCountMatrix {
                reason: format!("duplicate sample ID '{}'", dup),
            });
        }

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Keep the genes for which `keep` returns true, preserving order
    pub fn retain_genes<F>(&self, mut keep: F) -> Result<Self>
    where
        F: FnMut(&str, ArrayView1<'_, f64>) -> bool,
    {
        let kept: Vec<usize> = (0..self.n_genes())
            .filter(|&i| keep(&self.gene_ids[i], self.counts.row(i)))
            .collect();
        self.subset_genes(&kept)
    }

    /// Subset to specific genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(0), gene_indices);
        let gene_ids = gene_indices.iter().map(|&i| self.gene_ids[i].clone()).collect();
        Self::new(counts, gene_ids, self.sample_ids.clone())
    }
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().map(String::as_str).find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_count_matrix_creation() {
        let counts = array![[10.0, 20.0, 30.0], [5.0, 15.0, 25.0]];
        let matrix = CountMatrix::new(counts, ids(&["gene1", "gene2"]), ids(&["s1", "s2", "s3"])).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.sample_ids()[2], "s3");
    }

    #[test]
    fn test_negative_counts_rejected() {
        let counts = array![[10.0, -5.0], [5.0, 15.0]];
        let result = CountMatrix::new(counts, ids(&["gene1", "gene2"]), ids(&["s1", "s2"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_gene_rejected() {
        let counts = array![[1.0, 2.0], [3.0, 4.0]];
        let result = CountMatrix::new(counts, ids(&["g", "g"]), ids(&["s1", "s2"]));
        assert!(matches!(result, Err(DgeaError::InvalidCountMatrix { .. })));
    }

    #[test]
    fn test_retain_genes_keeps_order() {
        let counts = array![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [2.0, 3.0]];
        let matrix = CountMatrix::new(counts, ids(&["a", "b", "c", "d"]), ids(&["s1", "s2"])).unwrap();
        let kept = matrix.retain_genes(|_, row| row.iter().any(|&x| x > 0.0)).unwrap();
        assert_eq!(kept.gene_ids(), &ids(&["b", "d"])[..]);
        assert_eq!(kept.counts()[[1, 1]], 3.0);
    }
}
