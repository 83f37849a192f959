//! Error types for rust_dgea

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the DGEA pipeline
#[derive(Error, Debug)]
pub enum DgeaError {
    #[error("Invalid count file {path}:{line}: {reason}")]
    InvalidCountFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Gene rows of sample '{sample}' do not match sample '{reference}': {reason}")]
    GeneOrderMismatch {
        sample: String,
        reference: String,
        reason: String,
    },

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid sample design: {reason}")]
    InvalidDesign { reason: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("No annotation for gene {gene_id}")]
    MissingAnnotation { gene_id: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid table {path}: {reason}")]
    InvalidTable { path: PathBuf, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Size factor estimation failed: {reason}")]
    SizeFactorFailed { reason: String },

    #[error("Trend fitting failed: {reason}")]
    TrendFittingFailed { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DgeaError>;
