//! Per-sample count files
//!
//! Each file is a two-column TSV of gene ID and integer count, possibly ending
//! with `__`-prefixed pseudo-rows (`__no_feature`, `__ambiguous`, ...).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DgeaError, Result};
use crate::io::tsv_reader;

/// Rows of one count file, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCounts {
    pub sample: String,
    pub gene_ids: Vec<String>,
    pub counts: Vec<u64>,
}

/// File name up to its first `.`
pub fn sample_name_from_path(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty());
    name.map(str::to_string).ok_or_else(|| DgeaError::InvalidCountFile {
        path: path.to_path_buf(),
        line: 0,
        reason: "cannot derive a sample name from the file name".to_string(),
    })
}

pub fn read_count_file(path: &Path) -> Result<SampleCounts> {
    let sample = sample_name_from_path(path)?;
    let invalid = |line: usize, reason: String| DgeaError::InvalidCountFile {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut reader = tsv_reader(path)?;
    let mut gene_ids = Vec::new();
    let mut counts = Vec::new();
    let mut seen = HashSet::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        if record.len() != 2 {
            return Err(invalid(line, format!("expected 2 tab-separated fields, found {}", record.len())));
        }
        let gene_id = record[0].trim();
        if gene_id.is_empty() {
            return Err(invalid(line, "empty gene ID".to_string()));
        }
        let count: u64 = record[1]
            .trim()
            .parse()
            .map_err(|_| invalid(line, format!("'{}' is not a non-negative integer count", &record[1])))?;
        if !seen.insert(gene_id.to_string()) {
            return Err(invalid(line, format!("duplicate gene ID '{}'", gene_id)));
        }
        gene_ids.push(gene_id.to_string());
        counts.push(count);
    }

    if gene_ids.is_empty() {
        return Err(invalid(0, "no count rows".to_string()));
    }
    log::debug!("{}: {} rows from {}", sample, gene_ids.len(), path.display());
    Ok(SampleCounts {
        sample,
        gene_ids,
        counts,
    })
}

/// Regular files in `dir` whose names end with `suffix`, sorted by name
pub fn discover_count_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        return Err(DgeaError::EmptyData {
            reason: format!("no '*{}' count files in {}", suffix, dir.display()),
        });
    }
    log::info!("Found {} count files in {}", files.len(), dir.display());
    Ok(files)
}
