//! P-value calculation from test statistics

use statrs::function::erf::erfc;

/// Two-sided p-value of a standard normal statistic, `2 * pnorm(-|z|)`
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = calculate_pvalue(2.0);
        let p2 = calculate_pvalue(-2.0);
        assert!((p1 - p2).abs() < 1e-12);
    }

    #[test]
    fn test_pvalue_known_values() {
        assert!((calculate_pvalue(0.0) - 1.0).abs() < 1e-12);
        assert!((calculate_pvalue(1.959963984540054) - 0.05).abs() < 1e-9);
        assert!(calculate_pvalue(f64::NAN).is_nan());
    }

    #[test]
    fn test_pvalue_extreme_statistic_stays_positive() {
        let p = calculate_pvalue(30.0);
        assert!(p > 0.0 && p < 1e-100);
    }
}
