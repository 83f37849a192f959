//! Data structures for the expression pipeline

mod annotation;
mod count_matrix;
mod dataset;
mod design;

pub use annotation::{GeneAnnotation, GeneInfo};
pub use count_matrix::CountMatrix;
pub use dataset::ExpressionDataSet;
pub use design::{group_from_sample_name, SampleDesign};
