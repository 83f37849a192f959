//! Shared fixtures for unit tests

use ndarray::Array2;

use crate::data::{CountMatrix, ExpressionDataSet, SampleDesign};

/// Index of the gene that is 8x higher in Tat than elsewhere
pub const UP_IN_TAT: usize = 0;

/// Three groups (Cys, Tat, Ctl) x 3 replicates, 40 genes
///
/// Every gene follows library depth with a small deterministic wobble, except
/// `UP_IN_TAT`.
pub fn simulated_dataset() -> ExpressionDataSet {
    let samples: Vec<String> = ["Cys1", "Cys2", "Cys3", "Tat1", "Tat2", "Tat3", "Ctl1", "Ctl2", "Ctl3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (gene_ids, counts) = simulated_counts(&samples, 40);
    let matrix = CountMatrix::new(counts, gene_ids, samples.clone()).unwrap();
    let design = SampleDesign::from_sample_names(&samples).unwrap();
    ExpressionDataSet::new(matrix, design).unwrap()
}

/// Gene IDs and a genes x samples count matrix for the given sample names
pub fn simulated_counts(samples: &[String], n_genes: usize) -> (Vec<String>, Array2<f64>) {
    let depth = [1.0, 1.2, 0.9, 1.1, 0.8, 1.0, 1.05, 0.95, 1.15];
    let wobble = [1.0, 0.93, 1.08, 0.97, 1.05, 0.95, 1.02, 0.9, 1.1];
    let mut counts = Array2::zeros((n_genes, samples.len()));
    for g in 0..n_genes {
        let base = 20.0 + 15.0 * g as f64;
        for (j, sample) in samples.iter().enumerate() {
            let effect = if g == UP_IN_TAT && sample.starts_with("Tat") { 8.0 } else { 1.0 };
            let noise = wobble[(j + g) % wobble.len()];
            counts[[g, j]] = (base * depth[j % depth.len()] * effect * noise).round();
        }
    }
    let gene_ids = (0..n_genes).map(|g| format!("ENSG{:05}.1", g)).collect();
    (gene_ids, counts)
}

/// `simulated_dataset` with one extra gene that has zero counts everywhere
pub fn dataset_with_zero_gene() -> ExpressionDataSet {
    let samples: Vec<String> = ["Cys1", "Cys2", "Cys3", "Tat1", "Tat2", "Tat3", "Ctl1", "Ctl2", "Ctl3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (mut gene_ids, counts) = simulated_counts(&samples, 40);
    let mut with_zero = Array2::zeros((41, samples.len()));
    with_zero.slice_mut(ndarray::s![..40, ..]).assign(&counts);
    gene_ids.push("ENSG99999.1".to_string());
    let matrix = CountMatrix::new(with_zero, gene_ids, samples.clone()).unwrap();
    let design = SampleDesign::from_sample_names(&samples).unwrap();
    ExpressionDataSet::new(matrix, design).unwrap()
}
