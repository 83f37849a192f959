//! Negative binomial helpers shared by the GLM and dispersion code

/// Floor applied to fitted means before computing IRLS weights
pub const MIN_MU: f64 = 0.5;

/// Iteration stops once any |beta| (natural log scale) exceeds this
pub const MAX_LFC_BETA: f64 = 30.0;

/// Linear predictor clamp, keeps exp() finite
pub const MAX_ETA: f64 = 700.0;

/// Mean of a count given its linear predictor and size factor
pub fn nb_mean(eta: f64, size_factor: f64) -> f64 {
    size_factor * eta.clamp(-MAX_ETA, MAX_ETA).exp()
}

/// Var(Y) = mu + alpha * mu^2
pub fn nb_variance(mu: f64, alpha: f64) -> f64 {
    mu + alpha * mu * mu
}

/// IRLS working weight mu / (1 + alpha * mu)
pub fn nb_weight(mu: f64, alpha: f64) -> f64 {
    mu / (1.0 + alpha * mu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nb_mean_scales_by_size_factor() {
        let mu = nb_mean(2.0, 1.5);
        assert!((mu - 1.5 * 2.0_f64.exp()).abs() < 1e-10);
        assert!(nb_mean(10_000.0, 1.0).is_finite());
    }

    #[test]
    fn test_nb_variance() {
        assert!((nb_variance(10.0, 0.1) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_nb_weight() {
        assert!((nb_weight(10.0, 0.1) - 5.0).abs() < 1e-12);
    }
}
