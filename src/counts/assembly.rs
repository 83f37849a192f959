//! Combine per-sample counts into one matrix and summarize pseudo-rows

use std::path::Path;

use indexmap::IndexMap;
use ndarray::Array2;

use super::filter::is_pseudo_row;
use super::reader::SampleCounts;
use crate::data::CountMatrix;
use crate::error::{DgeaError, Result};
use crate::io::tsv_writer;

/// Row of the summary holding the per-sample sum of gene rows
pub const TOTAL_ASSIGNED: &str = "__total_assigned";

/// Pseudo-row counts per sample plus the total assigned to genes
#[derive(Debug, Clone, PartialEq)]
pub struct CountSummary {
    samples: Vec<String>,
    /// Pseudo-rows in file order, then `__total_assigned`
    rows: IndexMap<String, Vec<u64>>,
}

impl CountSummary {
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn row(&self, name: &str) -> Option<&[u64]> {
        self.rows.get(name).map(Vec::as_slice)
    }

    pub fn row_names(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// `assigned / (assigned + pseudo)` per sample
    pub fn assignment_rates(&self) -> Vec<f64> {
        (0..self.samples.len())
            .map(|j| {
                let assigned = self.rows.get(TOTAL_ASSIGNED).map_or(0, |r| r[j]) as f64;
                let pseudo: u64 = self
                    .rows
                    .iter()
                    .filter(|(name, _)| name.as_str() != TOTAL_ASSIGNED)
                    .map(|(_, r)| r[j])
                    .sum();
                let total = assigned + pseudo as f64;
                if total > 0.0 {
                    assigned / total
                } else {
                    f64::NAN
                }
            })
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = tsv_writer(path)?;
        let mut header = vec!["category".to_string()];
        header.extend(self.samples.iter().cloned());
        writer.write_record(&header)?;
        for (name, values) in &self.rows {
            let mut record = vec![name.clone()];
            record.extend(values.iter().map(u64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Raw matrix (pseudo-rows included) and its summary
#[derive(Debug, Clone)]
pub struct AssembledCounts {
    pub raw: CountMatrix,
    pub summary: CountSummary,
}

/// Combine samples column-wise; every sample must list the same rows in the same order
pub fn assemble_counts(samples: &[SampleCounts]) -> Result<AssembledCounts> {
    let first = samples.first().ok_or_else(|| DgeaError::EmptyData {
        reason: "no samples to assemble".to_string(),
    })?;
    for sample in &samples[1..] {
        check_same_rows(first, sample)?;
    }

    let n_rows = first.gene_ids.len();
    let mut counts = Array2::zeros((n_rows, samples.len()));
    for (j, sample) in samples.iter().enumerate() {
        for (i, &c) in sample.counts.iter().enumerate() {
            counts[[i, j]] = c as f64;
        }
    }
    let sample_ids: Vec<String> = samples.iter().map(|s| s.sample.clone()).collect();
    let raw = CountMatrix::new(counts, first.gene_ids.clone(), sample_ids.clone())?;

    let mut rows: IndexMap<String, Vec<u64>> = IndexMap::new();
    let mut assigned = vec![0u64; samples.len()];
    for (i, gene_id) in first.gene_ids.iter().enumerate() {
        let values: Vec<u64> = samples.iter().map(|s| s.counts[i]).collect();
        if is_pseudo_row(gene_id) {
            rows.insert(gene_id.clone(), values);
        } else {
            for (total, v) in assigned.iter_mut().zip(values) {
                *total += v;
            }
        }
    }
    rows.insert(TOTAL_ASSIGNED.to_string(), assigned);
    let summary = CountSummary {
        samples: sample_ids,
        rows,
    };

    for (sample, rate) in summary.samples().iter().zip(summary.assignment_rates()) {
        log::info!("{}: {:.1}% of reads assigned to genes", sample, 100.0 * rate);
    }
    Ok(AssembledCounts { raw, summary })
}

fn check_same_rows(reference: &SampleCounts, sample: &SampleCounts) -> Result<()> {
    let mismatch = |reason: String| DgeaError::GeneOrderMismatch {
        sample: sample.sample.clone(),
        reference: reference.sample.clone(),
        reason,
    };
    if reference.gene_ids.len() != sample.gene_ids.len() {
        return Err(mismatch(format!(
            "{} rows instead of {}",
            sample.gene_ids.len(),
            reference.gene_ids.len()
        )));
    }
    if let Some((i, (a, b))) = reference
        .gene_ids
        .iter()
        .zip(&sample.gene_ids)
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(mismatch(format!("row {} is '{}' instead of '{}'", i + 1, b, a)));
    }
    Ok(())
}
