//! Input/Output: TSV tables, JSON snapshots and the output layout

mod json;
mod layout;
mod tsv;

pub use json::{nan_matrix, nan_vec, read_json, write_json};
pub use layout::{contrast_label, OutputLayout, TableVariant};
pub use tsv::{format_value, is_id_header, read_annotation, tsv_reader, tsv_writer, write_matrix, write_size_factors, NA};
