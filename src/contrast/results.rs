//! Per-gene results of one contrast

use super::plan::ContrastSpec;

/// Shrunk effect sizes for the same genes
#[derive(Debug, Clone)]
pub struct ShrunkColumns {
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
}

/// Wald results for every gene of the dataset, in dataset order
#[derive(Debug, Clone)]
pub struct ContrastResult {
    pub spec: ContrastSpec,
    /// Reference level of the snapshot that produced these numbers
    pub reference: String,
    pub gene_ids: Vec<String>,
    pub base_means: Vec<f64>,
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    pub pvalues: Vec<f64>,
    pub padj: Vec<f64>,
    pub shrunk: Option<ShrunkColumns>,
}

impl ContrastResult {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Genes with a defined adjusted p-value
    pub fn n_tested(&self) -> usize {
        self.padj.iter().filter(|p| p.is_finite()).count()
    }

    pub fn n_significant(&self, alpha: f64, lfc_threshold: f64) -> usize {
        self.padj
            .iter()
            .zip(&self.log2_fold_changes)
            .filter(|(&p, &lfc)| is_significant(p, lfc, alpha, lfc_threshold))
            .count()
    }
}

/// `padj < alpha` and `|log2FC| >= threshold`; undefined values never pass
pub fn is_significant(padj: f64, log2_fold_change: f64, alpha: f64, lfc_threshold: f64) -> bool {
    padj < alpha && log2_fold_change.abs() >= lfc_threshold
}
