//! rust_dgea: differential gene expression analysis of RNA-seq counts
//!
//! Per-sample count files are combined, filtered and normalized with
//! median-of-ratios size factors. A negative binomial GLM of `~ group` with
//! shrunken dispersions is fitted once per reference level, and each contrast
//! is tested with a Wald test, filtered and written as result tables.
//!
//! # Example
//!
//! ```ignore
//! use rust_dgea::config::PipelineConfig;
//! use rust_dgea::pipeline::run_analysis;
//!
//! let config = PipelineConfig::load(Path::new("plan.json"))?;
//! let summary = run_analysis(&config)?;
//! ```

pub mod cli;
pub mod config;
pub mod contrast;
pub mod counts;
pub mod data;
pub mod dispersion;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod model;
pub mod normalization;
pub mod pipeline;
pub mod shrinkage;
pub mod stats;
pub mod testing;

#[cfg(test)]
mod test_support;
