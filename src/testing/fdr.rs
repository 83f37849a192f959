//! Benjamini-Hochberg false discovery rate adjustment

use crate::stats::cmp_f64;

/// BH-adjusted p-values (`p.adjust(method = "BH")`)
///
/// NaN p-values are excluded from the number of tests and stay NaN.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len()).filter(|&i| pvalues[i].is_finite()).collect();
    let m = order.len();
    let mut padj = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return padj;
    }
    order.sort_by(|&a, &b| cmp_f64(&pvalues[a], &pvalues[b]));

    let mut cummin = f64::INFINITY;
    for (rank0, &i) in order.iter().enumerate().rev() {
        let adjusted = (pvalues[i] * m as f64 / (rank0 + 1) as f64).min(1.0);
        cummin = cummin.min(adjusted);
        padj[i] = cummin;
    }
    padj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_known_values() {
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        for adj in &padj {
            assert!((adj - 0.04).abs() < 1e-12);
        }
        let padj = benjamini_hochberg(&[0.001, 0.5, 0.02]);
        assert!((padj[0] - 0.003).abs() < 1e-12);
        assert!((padj[1] - 0.5).abs() < 1e-12);
        assert!((padj[2] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_bh_with_nan() {
        let pvalues = vec![0.01, f64::NAN, 0.03, 0.02];
        let padj = benjamini_hochberg(&pvalues);
        assert!(padj[1].is_nan());
        assert!((padj[0] - 0.03).abs() < 1e-12);
        assert!((padj[2] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_bh_monotone_and_not_below_raw() {
        let pvalues = vec![0.2, 0.001, 0.05, 0.9, 0.01, 0.049];
        let padj = benjamini_hochberg(&pvalues);
        for (p, adj) in pvalues.iter().zip(&padj) {
            assert!(adj >= p && *adj <= 1.0);
        }
        let mut pairs: Vec<(f64, f64)> = pvalues.into_iter().zip(padj).collect();
        pairs.sort_by(|a, b| cmp_f64(&a.0, &b.0));
        assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_bh_all_nan() {
        assert!(benjamini_hochberg(&[f64::NAN, f64::NAN]).iter().all(|p| p.is_nan()));
        assert!(benjamini_hochberg(&[]).is_empty());
    }
}
