//! Gene filtering: pseudo-rows, unexpressed genes, curated ribosomal genes

use std::collections::HashSet;
use std::path::Path;

use crate::data::CountMatrix;
use crate::error::Result;
use crate::io::{is_id_header, tsv_reader};

const PSEUDO_ROW_PREFIX: &str = "__";

/// Counter rows such as `__no_feature` that are not genes
pub fn is_pseudo_row(gene_id: &str) -> bool {
    gene_id.starts_with(PSEUDO_ROW_PREFIX)
}

/// Drop a trailing `.<digits>` version: `ENSG00000001.1` -> `ENSG00000001`
pub fn strip_version(gene_id: &str) -> &str {
    match gene_id.rsplit_once('.') {
        Some((base, version)) if !base.is_empty() && !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) => {
            base
        }
        _ => gene_id,
    }
}

/// Version-stripped IDs of genes to exclude from the analysis
#[derive(Debug, Clone, Default)]
pub struct RibosomalExclusions {
    ids: HashSet<String>,
}

impl RibosomalExclusions {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ids: ids.into_iter().map(|id| strip_version(id.as_ref().trim()).to_string()).collect(),
        }
    }

    /// First column of a TSV; a leading `gene_id` style header is skipped
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = tsv_reader(path)?;
        let mut ids = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let id = record.get(0).unwrap_or("").trim();
            if id.is_empty() || (idx == 0 && is_id_header(id)) {
                continue;
            }
            ids.push(id.to_string());
        }
        let exclusions = Self::from_ids(ids);
        log::info!("Loaded {} ribosomal exclusions from {}", exclusions.len(), path.display());
        Ok(exclusions)
    }

    pub fn contains(&self, gene_id: &str) -> bool {
        self.ids.contains(strip_version(gene_id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Number of rows removed by each filter, applied in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub pseudo_rows: usize,
    pub all_zero: usize,
    pub ribosomal: usize,
    pub kept: usize,
}

/// Drop pseudo-rows, genes with no counts in any sample and excluded genes
pub fn filter_counts(raw: &CountMatrix, exclusions: &RibosomalExclusions) -> Result<(CountMatrix, FilterReport)> {
    let mut report = FilterReport::default();
    let filtered = raw.retain_genes(|gene_id, counts| {
        if is_pseudo_row(gene_id) {
            report.pseudo_rows += 1;
            false
        } else if counts.iter().all(|&c| c == 0.0) {
            report.all_zero += 1;
            false
        } else if exclusions.contains(gene_id) {
            report.ribosomal += 1;
            false
        } else {
            true
        }
    })?;
    report.kept = filtered.n_genes();

    log::info!(
        "Filtered counts: {} kept, {} pseudo-rows, {} unexpressed, {} ribosomal removed",
        report.kept,
        report.pseudo_rows,
        report.all_zero,
        report.ribosomal
    );
    Ok((filtered, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("ENSG00000001.1"), "ENSG00000001");
        assert_eq!(strip_version("ENSG00000001.12"), "ENSG00000001");
        assert_eq!(strip_version("ENSG00000001"), "ENSG00000001");
        assert_eq!(strip_version("ENSG00000001_PAR_Y"), "ENSG00000001_PAR_Y");
        assert_eq!(strip_version("gene.a"), "gene.a");
        assert_eq!(strip_version("ENSG1."), "ENSG1.");
    }

    #[test]
    fn test_filter_counts() {
        let raw = CountMatrix::new(
            array![[10.0, 0.0], [0.0, 0.0], [5.0, 5.0], [3.0, 1.0], [0.0, 0.0]],
            ids(&["ENSG00000001.1", "ENSG00000002.1", "ENSG00000003.4", "__no_feature", "ENSG00000004.1"]),
            ids(&["Cys1", "Tat1"]),
        )
        .unwrap();
        let exclusions = RibosomalExclusions::from_ids(["ENSG00000003", "ENSG00000004"]);
        let (filtered, report) = filter_counts(&raw, &exclusions).unwrap();

        assert_eq!(filtered.gene_ids(), &ids(&["ENSG00000001.1"])[..]);
        assert!(filtered.gene_ids().iter().all(|g| !g.starts_with("__")));
        assert_eq!(
            report,
            FilterReport {
                pseudo_rows: 1,
                all_zero: 2,
                ribosomal: 1,
                kept: 1
            }
        );
    }

    #[test]
    fn test_read_exclusions_with_header_and_versions() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\tgene_name").unwrap();
        writeln!(file, "ENSG00000005.3\tRNA5-8SN1").unwrap();
        writeln!(file, "ENSG00000006").unwrap();
        let exclusions = RibosomalExclusions::read(file.path()).unwrap();
        assert_eq!(exclusions.len(), 2);
        assert!(exclusions.contains("ENSG00000005.9"));
        assert!(exclusions.contains("ENSG00000006.1"));
        assert!(!exclusions.contains("gene_id"));
    }
}
