//! Generalized Linear Model fitting for negative binomial data

mod design;
mod fitting;
pub(crate) mod linalg;
mod negative_binomial;

pub use design::{check_full_rank, contrast_index, create_design_matrix, DesignInfo};
pub use fitting::{default_ridge, fit_glm, fit_single_gene, GlmFitParams, GlmFitResult, GlmFits, DEFAULT_RIDGE};
pub use negative_binomial::{nb_mean, nb_variance, nb_weight, MAX_LFC_BETA, MIN_MU};
