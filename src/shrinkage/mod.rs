//! Log fold change shrinkage

mod normal;

pub use normal::{shrink_lfc_normal, ShrunkLfc};
