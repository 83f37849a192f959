//! Reversed contrasts derived from written tables
//!
//! `B vs A` is `A vs B` with every log2 fold change negated and `foldChange`
//! recomputed. Significance is never re-derived and all other fields are
//! copied as text.

use std::path::Path;

use crate::error::{DgeaError, Result};
use crate::io::{format_value, tsv_reader, tsv_writer, NA};

const LFC_COLUMNS: [&str; 2] = ["log2FoldChange", "log2FoldChange_MLE"];
const FOLD_CHANGE_COLUMN: &str = "foldChange";

/// A TSV file held as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn read(path: &Path) -> Result<Self> {
        let invalid = |reason: String| DgeaError::InvalidTable {
            path: path.to_path_buf(),
            reason,
        };
        let mut reader = tsv_reader(path)?;
        let mut records = reader.records();
        let header: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Err(invalid("empty file".to_string())),
        };
        let mut rows = Vec::new();
        for (idx, record) in records.enumerate() {
            let record = record?;
            if record.len() != header.len() {
                return Err(invalid(format!(
                    "line {} has {} fields, header has {}",
                    idx + 2,
                    record.len(),
                    header.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { header, rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = tsv_writer(path)?;
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Negate the log2 fold change columns and recompute `foldChange`
pub fn reverse_table(table: &TsvTable, path: &Path) -> Result<TsvTable> {
    let lfc_columns: Vec<usize> = LFC_COLUMNS.iter().filter_map(|c| table.column(c)).collect();
    let primary = table.column(LFC_COLUMNS[0]).ok_or_else(|| DgeaError::InvalidTable {
        path: path.to_path_buf(),
        reason: format!("no {} column", LFC_COLUMNS[0]),
    })?;
    let fold_change = table.column(FOLD_CHANGE_COLUMN);

    let mut reversed = table.clone();
    for (idx, row) in reversed.rows.iter_mut().enumerate() {
        for &col in &lfc_columns {
            row[col] = negate_field(&row[col]).ok_or_else(|| DgeaError::InvalidTable {
                path: path.to_path_buf(),
                reason: format!("line {}: '{}' is not a number", idx + 2, row[col]),
            })?;
        }
        if let Some(col) = fold_change {
            row[col] = match row[primary].parse::<f64>() {
                Ok(lfc) => format_value(lfc.exp2()),
                Err(_) => NA.to_string(),
            };
        }
    }
    Ok(reversed)
}

/// `-x` as text; `NA` stays `NA` and zero is never written as `-0`
fn negate_field(field: &str) -> Option<String> {
    if field == NA {
        return Some(NA.to_string());
    }
    let value: f64 = field.parse().ok()?;
    Some(if value == 0.0 { format_value(0.0) } else { format_value(-value) })
}

/// Read the `A vs B` table at `input` and write `B vs A` to `output`
pub fn reverse_file(input: &Path, output: &Path) -> Result<()> {
    let table = TsvTable::read(input)?;
    let reversed = reverse_table(&table, input)?;
    reversed.write(output)?;
    log::info!("Reversed {} -> {} ({} rows)", input.display(), output.display(), reversed.rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const FORWARD: &str = "gene_id\tgene_name\tgene_type\tbaseMean\tlog2FoldChange\tlfcSE\tpvalue\tpadj\tfoldChange\tlog2FoldChange_MLE\tTat1\tCys1\n\
ENSG1.1\tTP53\tprotein_coding\t26.5\t1.5\t0.2\t0.0001\t0.001\t2.8284271247461903\t1.75\t40\t10\n\
ENSG2.1\tNA\tNA\t10\t0\t0.3\t0.9\t0.95\t1\tNA\t5\t5\n\
ENSG3.1\tMYC\tprotein_coding\t8.25\t-2\t0.4\t0.001\t0.01\t0.25\t-2.5\t1\t7\n";

    #[test]
    fn test_reverse_negates_and_copies() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Tat_vs_Cys_shrunk_all.tsv");
        let output = dir.path().join("rev/Cys_vs_Tat_shrunk_all.tsv");
        fs::write(&input, FORWARD).unwrap();
        reverse_file(&input, &output).unwrap();

        let forward = TsvTable::read(&input).unwrap();
        let reversed = TsvTable::read(&output).unwrap();
        assert_eq!(reversed.header, forward.header);

        let lfc = forward.column("log2FoldChange").unwrap();
        let mle = forward.column("log2FoldChange_MLE").unwrap();
        let fc = forward.column("foldChange").unwrap();
        for (f, r) in forward.rows.iter().zip(&reversed.rows) {
            for col in 0..f.len() {
                if col == lfc || col == mle || col == fc {
                    continue;
                }
                assert_eq!(f[col], r[col]);
            }
            if f[lfc] != "NA" {
                let fwd: f64 = f[lfc].parse().unwrap();
                let rev: f64 = r[lfc].parse().unwrap();
                assert_eq!(rev, -fwd);
                assert_eq!(r[fc].parse::<f64>().unwrap(), rev.exp2());
            }
        }
        assert_eq!(reversed.rows[0][lfc], "-1.5");
        assert_eq!(reversed.rows[0][mle], "-1.75");
        assert_eq!(reversed.rows[1][lfc], "0");
        assert_eq!(reversed.rows[1][fc], "1");
        assert_eq!(reversed.rows[1][mle], "NA");
        assert_eq!(reversed.rows[2][lfc], "2");
        assert_eq!(reversed.rows[2][fc], "4");
    }

    #[test]
    fn test_reverse_twice_restores_effect_sizes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("fwd.tsv");
        fs::write(&input, FORWARD).unwrap();
        let table = TsvTable::read(&input).unwrap();
        let twice = reverse_table(&reverse_table(&table, &input).unwrap(), &input).unwrap();
        let lfc = table.column("log2FoldChange").unwrap();
        for (a, b) in table.rows.iter().zip(&twice.rows) {
            assert_eq!(a[lfc], b[lfc]);
        }
    }

    #[test]
    fn test_reverse_rejects_bad_tables() {
        let dir = tempdir().unwrap();
        let no_lfc = dir.path().join("no_lfc.tsv");
        fs::write(&no_lfc, "gene_id\tpadj\nENSG1\t0.1\n").unwrap();
        assert!(reverse_file(&no_lfc, &dir.path().join("out.tsv")).is_err());

        let ragged = dir.path().join("ragged.tsv");
        fs::write(&ragged, "gene_id\tlog2FoldChange\nENSG1\n").unwrap();
        assert!(matches!(TsvTable::read(&ragged), Err(DgeaError::InvalidTable { .. })));

        let text = dir.path().join("text.tsv");
        fs::write(&text, "gene_id\tlog2FoldChange\nENSG1\tup\n").unwrap();
        assert!(reverse_file(&text, &dir.path().join("out2.tsv")).is_err());
    }
}
