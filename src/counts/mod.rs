//! Count assembly and gene filtering
//!
//! Per-sample count files are read, checked for identical gene order and
//! combined into one matrix. Pseudo-rows are summarized, then removed along
//! with unexpressed genes and a curated list of ribosomal genes.

mod assembly;
mod filter;
mod reader;
mod top;

pub use assembly::{assemble_counts, AssembledCounts, CountSummary, TOTAL_ASSIGNED};
pub use filter::{filter_counts, is_pseudo_row, strip_version, FilterReport, RibosomalExclusions};
pub use reader::{discover_count_files, read_count_file, sample_name_from_path, SampleCounts};
pub use top::{top_expressed, write_top_expressed, ExpressedGene};
