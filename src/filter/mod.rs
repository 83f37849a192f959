//! Filtering of genes before multiple testing correction

mod cooks;
mod independent;

pub use cooks::{cooks_cutoff, cooks_distance, cooks_outliers, robust_method_of_moments_disp};
pub use independent::{independent_filtering, IndependentFilter};
