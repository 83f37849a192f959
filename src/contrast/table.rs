//! Annotated result tables
//!
//! Columns: `gene_id`, `gene_name`, `gene_type`, `baseMean`, `log2FoldChange`,
//! `lfcSE`, `pvalue`, `padj`, `foldChange`, then `log2FoldChange_MLE` for
//! shrunk tables, then the normalized counts of the numerator samples followed
//! by the denominator samples.

use std::path::Path;

use super::results::{is_significant, ContrastResult};
use crate::data::{ExpressionDataSet, GeneAnnotation};
use crate::error::{DgeaError, Result};
use crate::io::{format_value, tsv_writer, NA};
use crate::stats::cmp_f64;

/// Fixed leading columns of every table
pub const BASE_COLUMNS: [&str; 9] = [
    "gene_id",
    "gene_name",
    "gene_type",
    "baseMean",
    "log2FoldChange",
    "lfcSE",
    "pvalue",
    "padj",
    "foldChange",
];
pub const MLE_COLUMN: &str = "log2FoldChange_MLE";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub gene_id: String,
    pub gene_name: Option<String>,
    pub gene_type: Option<String>,
    pub base_mean: f64,
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub pvalue: f64,
    pub padj: f64,
    /// Unshrunk log2 fold change, present in shrunk tables only
    pub log2_fold_change_mle: Option<f64>,
    pub normalized: Vec<f64>,
}

impl ResultRow {
    pub fn fold_change(&self) -> f64 {
        self.log2_fold_change.exp2()
    }
}

/// Rows sorted by ascending `padj`
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub sample_columns: Vec<String>,
    pub shrunk: bool,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Rows for genes with a defined `padj`, joined with normalized counts
    ///
    /// With `shrunk`, `log2FoldChange`/`lfcSE` come from the shrunk fit and the
    /// MLE is kept in its own column.
    pub fn build(result: &ContrastResult, dataset: &ExpressionDataSet, shrunk: bool) -> Result<Self> {
        let shrunk_columns = match (shrunk, &result.shrunk) {
            (false, _) => None,
            (true, Some(columns)) => Some(columns),
            (true, None) => {
                return Err(DgeaError::InvalidContrast {
                    reason: format!("no shrunk estimates for '{}'", result.spec),
                })
            }
        };
        if dataset.gene_ids() != result.gene_ids.as_slice() {
            return Err(DgeaError::InvalidCountMatrix {
                reason: format!("results of '{}' do not match the dataset genes", result.spec),
            });
        }

        let design = dataset.design();
        let samples: Vec<usize> = design
            .samples_in_group(&result.spec.numerator)
            .into_iter()
            .chain(design.samples_in_group(&result.spec.denominator))
            .collect();
        let normalized = dataset.normalized_counts();

        let mut rows: Vec<ResultRow> = (0..result.n_genes())
            .filter(|&i| result.padj[i].is_finite())
            .map(|i| {
                let (lfc, se, mle) = match shrunk_columns {
                    Some(s) => (s.log2_fold_changes[i], s.lfc_se[i], Some(result.log2_fold_changes[i])),
                    None => (result.log2_fold_changes[i], result.lfc_se[i], None),
                };
                ResultRow {
                    gene_id: result.gene_ids[i].clone(),
                    gene_name: None,
                    gene_type: None,
                    base_mean: result.base_means[i],
                    log2_fold_change: lfc,
                    lfc_se: se,
                    pvalue: result.pvalues[i],
                    padj: result.padj[i],
                    log2_fold_change_mle: mle,
                    normalized: samples.iter().map(|&j| normalized[[i, j]]).collect(),
                }
            })
            .collect();
        rows.sort_by(|a, b| cmp_f64(&a.padj, &b.padj));

        Ok(Self {
            sample_columns: samples.iter().map(|&j| dataset.counts().sample_ids()[j].clone()).collect(),
            shrunk,
            rows,
        })
    }

    /// Fill gene name and type from `annotation`
    ///
    /// Genes without an entry stay `NA`, or fail with `require_annotation`.
    pub fn annotate(&mut self, annotation: &GeneAnnotation, require_annotation: bool) -> Result<()> {
        let mut missing = 0usize;
        for row in &mut self.rows {
            match annotation.get(&row.gene_id) {
                Some(info) => {
                    row.gene_name = Some(info.gene_name.clone());
                    row.gene_type = Some(info.gene_type.clone());
                }
                None if require_annotation => {
                    return Err(DgeaError::MissingAnnotation {
                        gene_id: row.gene_id.clone(),
                    })
                }
                None => {
                    row.gene_name = None;
                    row.gene_type = None;
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            log::debug!("{} genes without annotation", missing);
        }
        Ok(())
    }

    /// Rows with `padj < alpha` and `|log2FoldChange| >= lfc_threshold`
    pub fn significant(&self, alpha: f64, lfc_threshold: f64) -> Self {
        Self {
            sample_columns: self.sample_columns.clone(),
            shrunk: self.shrunk,
            rows: self
                .rows
                .iter()
                .filter(|r| is_significant(r.padj, r.log2_fold_change, alpha, lfc_threshold))
                .cloned()
                .collect(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        if self.shrunk {
            header.push(MLE_COLUMN.to_string());
        }
        header.extend(self.sample_columns.iter().cloned());
        header
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = tsv_writer(path)?;
        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut record = vec![
                row.gene_id.clone(),
                row.gene_name.clone().unwrap_or_else(|| NA.to_string()),
                row.gene_type.clone().unwrap_or_else(|| NA.to_string()),
                format_value(row.base_mean),
                format_value(row.log2_fold_change),
                format_value(row.lfc_se),
                format_value(row.pvalue),
                format_value(row.padj),
                format_value(row.fold_change()),
            ];
            if self.shrunk {
                record.push(format_value(row.log2_fold_change_mle.unwrap_or(f64::NAN)));
            }
            record.extend(row.normalized.iter().map(|&v| format_value(v)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::plan::ContrastSpec;
    use crate::contrast::results::ShrunkColumns;
    use crate::data::{CountMatrix, SampleDesign};
    use ndarray::{array, Array1};
    use tempfile::tempdir;

    fn dataset() -> ExpressionDataSet {
        let samples: Vec<String> = ["Cys1", "Cys2", "Tat1", "Tat2"].iter().map(|s| s.to_string()).collect();
        let matrix = CountMatrix::new(
            array![[10.0, 12.0, 40.0, 44.0], [5.0, 5.0, 5.0, 5.0], [0.0, 0.0, 0.0, 0.0], [100.0, 90.0, 20.0, 30.0]],
            vec!["ENSG1.1".into(), "ENSG2.1".into(), "ENSG3.1".into(), "ENSG4.1".into()],
            samples.clone(),
        )
        .unwrap();
        let design = SampleDesign::from_sample_names(&samples).unwrap();
        ExpressionDataSet::with_size_factors(matrix, design, Array1::ones(4)).unwrap()
    }

    fn result() -> ContrastResult {
        ContrastResult {
            spec: ContrastSpec::new("Tat", "Cys"),
            reference: "Cys".to_string(),
            gene_ids: vec!["ENSG1.1".into(), "ENSG2.1".into(), "ENSG3.1".into(), "ENSG4.1".into()],
            base_means: vec![26.5, 5.0, 0.0, 60.0],
            log2_fold_changes: vec![0.4, 2.0, 0.0, -2.0],
            lfc_se: vec![0.1, 0.5, 0.0, 0.3],
            pvalues: vec![0.001, 0.1, f64::NAN, 1e-5],
            padj: vec![0.01, 0.2, f64::NAN, 0.01],
            shrunk: Some(ShrunkColumns {
                log2_fold_changes: vec![0.3, 1.0, 0.0, -1.5],
                lfc_se: vec![0.1, 0.4, 0.0, 0.3],
            }),
        }
    }

    #[test]
    fn test_build_sorts_and_drops_undefined_padj() {
        let table = ResultTable::build(&result(), &dataset(), false).unwrap();
        let ids: Vec<&str> = table.rows.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["ENSG1.1", "ENSG4.1", "ENSG2.1"]);
        assert_eq!(table.sample_columns, vec!["Tat1", "Tat2", "Cys1", "Cys2"]);
        assert_eq!(table.rows[0].normalized, vec![40.0, 44.0, 10.0, 12.0]);
    }

    #[test]
    fn test_de_subset_rule() {
        let table = ResultTable::build(&result(), &dataset(), false).unwrap();
        let de = table.significant(0.05, 1.5_f64.log2());
        let ids: Vec<&str> = de.rows.iter().map(|r| r.gene_id.as_str()).collect();
        // padj 0.01 / lfc 0.4 and padj 0.2 / lfc 2.0 are both excluded
        assert_eq!(ids, vec!["ENSG4.1"]);
    }

    #[test]
    fn test_shrunk_columns() {
        let table = ResultTable::build(&result(), &dataset(), true).unwrap();
        let row = &table.rows[1];
        assert_eq!(row.gene_id, "ENSG4.1");
        assert_eq!(row.log2_fold_change, -1.5);
        assert_eq!(row.log2_fold_change_mle, Some(-2.0));
        assert_eq!(table.header()[9], MLE_COLUMN);

        let mut unshrunk = result();
        unshrunk.shrunk = None;
        assert!(ResultTable::build(&unshrunk, &dataset(), true).is_err());
    }

    #[test]
    fn test_annotation_join() {
        let annotation = GeneAnnotation::from_records(vec![
            ("ENSG1".to_string(), "TP53".to_string(), "protein_coding".to_string()),
            ("ENSG4".to_string(), "MYC".to_string(), "protein_coding".to_string()),
        ]);
        let mut table = ResultTable::build(&result(), &dataset(), false).unwrap();
        table.annotate(&annotation, false).unwrap();
        let once = table.clone();
        table.annotate(&annotation, false).unwrap();
        assert_eq!(table, once);
        assert_eq!(table.rows[0].gene_name.as_deref(), Some("TP53"));
        assert_eq!(table.rows[2].gene_name, None);

        assert!(matches!(
            table.annotate(&annotation, true),
            Err(DgeaError::MissingAnnotation { .. })
        ));
    }

    #[test]
    fn test_write_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contrasts/Tat_vs_Cys/Tat_vs_Cys_all.tsv");
        let table = ResultTable::build(&result(), &dataset(), false).unwrap();
        table.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "gene_id\tgene_name\tgene_type\tbaseMean\tlog2FoldChange\tlfcSE\tpvalue\tpadj\tfoldChange\tTat1\tTat2\tCys1\tCys2"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("ENSG1.1\tNA\tNA\t26.5\t0.4\t0.1\t0.001\t0.01\t1.3195"));
        assert!(first.ends_with("\t40\t44\t10\t12"));
        assert_eq!(lines.count(), 2);
    }
}
