//! Tab-separated reading and writing

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::{ArrayView1, ArrayView2};

use crate::data::GeneAnnotation;
use crate::error::{DgeaError, Result};

/// Written in place of missing or non-finite values
pub const NA: &str = "NA";

/// Header names accepted as the ID column of annotation and exclusion files
const ID_HEADERS: [&str; 3] = ["gene_id", "id", "ensembl_gene_id"];

/// Shortest round-trip formatting, `NA` for non-finite values
pub fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{}", value)
    } else {
        NA.to_string()
    }
}

/// Whether a first-row ID names a header column
pub fn is_id_header(field: &str) -> bool {
    ID_HEADERS.iter().any(|h| field.trim().eq_ignore_ascii_case(h))
}

/// TSV writer on a new file, creating parent directories
///
/// Fields are written verbatim, matching `tsv_reader`, which does not
/// interpret quotes.
pub fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(BufWriter::new(file)))
}

/// TSV reader without header handling; rows may vary in width
pub fn tsv_reader(path: &Path) -> Result<csv::Reader<File>> {
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?)
}

/// Write a labelled numeric matrix (rows x columns)
pub fn write_matrix(
    path: &Path,
    index_header: &str,
    row_ids: &[String],
    col_ids: &[String],
    values: ArrayView2<f64>,
) -> Result<()> {
    if values.dim() != (row_ids.len(), col_ids.len()) {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{}x{} matrix", row_ids.len(), col_ids.len()),
            got: format!("{}x{} matrix", values.nrows(), values.ncols()),
        });
    }
    let mut writer = tsv_writer(path)?;
    let mut header = StringRecord::new();
    header.push_field(index_header);
    for id in col_ids {
        header.push_field(id);
    }
    writer.write_record(&header)?;

    for (id, row) in row_ids.iter().zip(values.rows()) {
        let mut record = StringRecord::new();
        record.push_field(id);
        for &v in row {
            record.push_field(&format_value(v));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Two-column `sample`/`size_factor` table
pub fn write_size_factors(path: &Path, sample_ids: &[String], size_factors: ArrayView1<f64>) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["sample", "size_factor"])?;
    for (sample, &sf) in sample_ids.iter().zip(size_factors) {
        writer.write_record([sample.as_str(), format_value(sf).as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Annotation table: gene ID, gene name, gene type; header row optional
pub fn read_annotation(path: &Path) -> Result<GeneAnnotation> {
    let mut reader = tsv_reader(path)?;
    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let first = row.get(0).unwrap_or("").trim();
        if first.is_empty() || first.starts_with('#') || (idx == 0 && is_id_header(first)) {
            continue;
        }
        if row.len() < 3 {
            return Err(DgeaError::InvalidTable {
                path: path.to_path_buf(),
                reason: format!("line {}: expected gene_id, gene_name and gene_type", idx + 1),
            });
        }
        records.push((first.to_string(), row[1].trim().to_string(), row[2].trim().to_string()));
    }
    let annotation = GeneAnnotation::from_records(records);
    log::info!("Loaded annotation for {} genes from {}", annotation.len(), path.display());
    Ok(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(10.0), "10");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(format_value(f64::NAN), "NA");
        assert_eq!(format_value(f64::INFINITY), "NA");
    }

    #[test]
    fn test_write_matrix_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/matrix.tsv");
        let ids = vec!["g1".to_string(), "g2".to_string()];
        let cols = vec!["A1".to_string(), "B1".to_string()];
        write_matrix(&path, "gene_id", &ids, &cols, array![[1.0, 2.5], [0.0, f64::NAN]].view()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "gene_id\tA1\tB1\ng1\t1\t2.5\ng2\t0\tNA\n");
    }

    #[test]
    fn test_read_annotation_with_and_without_header() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\tgene_name\tgene_type").unwrap();
        writeln!(file, "ENSG1.2\tTP53\tprotein_coding").unwrap();
        writeln!(file, "ENSG2\tRNA5S1\trRNA").unwrap();
        let annotation = read_annotation(file.path()).unwrap();
        assert_eq!(annotation.len(), 2);
        assert_eq!(annotation.get("ENSG2").unwrap().gene_name, "RNA5S1");

        let mut bare = NamedTempFile::new().unwrap();
        writeln!(bare, "ENSG3\tMYC\tprotein_coding").unwrap();
        assert_eq!(read_annotation(bare.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_read_annotation_rejects_short_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ENSG3\tMYC").unwrap();
        assert!(matches!(read_annotation(file.path()), Err(DgeaError::InvalidTable { .. })));
    }
}
