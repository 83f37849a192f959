//! Most highly expressed genes, for manual curation of the ribosomal list

use std::path::Path;

use ndarray::Axis;

use crate::data::{CountMatrix, GeneAnnotation};
use crate::error::Result;
use crate::io::{format_value, tsv_writer, NA};
use crate::normalization::fpm;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressedGene {
    pub gene_id: String,
    pub gene_name: Option<String>,
    pub gene_type: Option<String>,
    /// Mean counts per million across samples
    pub mean_cpm: f64,
}

/// Top `n` genes by mean CPM, descending; ties broken by gene ID
pub fn top_expressed(matrix: &CountMatrix, annotation: &GeneAnnotation, n: usize) -> Vec<ExpressedGene> {
    let cpm = fpm(matrix.counts());
    let means = cpm.mean_axis(Axis(1));

    let mut order: Vec<usize> = (0..matrix.n_genes()).collect();
    if let Some(means) = &means {
        order.sort_by(|&a, &b| {
            means[b]
                .total_cmp(&means[a])
                .then_with(|| matrix.gene_ids()[a].cmp(&matrix.gene_ids()[b]))
        });
    }

    order
        .into_iter()
        .take(n)
        .map(|i| {
            let gene_id = matrix.gene_ids()[i].clone();
            let info = annotation.get(&gene_id);
            ExpressedGene {
                gene_name: info.map(|g| g.gene_name.clone()),
                gene_type: info.map(|g| g.gene_type.clone()),
                mean_cpm: means.as_ref().map_or(f64::NAN, |m| m[i]),
                gene_id,
            }
        })
        .collect()
}

pub fn write_top_expressed(path: &Path, genes: &[ExpressedGene]) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["gene_id", "gene_name", "gene_type", "mean_cpm"])?;
    for gene in genes {
        writer.write_record([
            gene.gene_id.as_str(),
            gene.gene_name.as_deref().unwrap_or(NA),
            gene.gene_type.as_deref().unwrap_or(NA),
            format_value(gene.mean_cpm).as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
