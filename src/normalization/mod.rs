//! Normalization methods for RNA-seq count data

mod counts;
mod size_factors;

pub use counts::{fpm, normalized_counts};
pub use size_factors::{estimate_size_factors, SizeFactorMethod};
