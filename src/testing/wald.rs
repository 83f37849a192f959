//! Wald test for differential expression

use ndarray::ArrayView1;

use super::pvalue::calculate_pvalue;
use crate::error::{DgeaError, Result};
use crate::model::FittedModel;

/// Per-gene Wald statistics for one coefficient, on the log2 scale
#[derive(Debug, Clone)]
pub struct WaldTest {
    pub coef_name: String,
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    pub stat: Vec<f64>,
    pub pvalues: Vec<f64>,
}

/// Test coefficient `coef_idx` of `model` against zero
///
/// Genes with zero base mean get log2 fold change 0, standard error 0 and an
/// undefined statistic and p-value.
pub fn wald_test(model: &FittedModel, base_means: ArrayView1<f64>, coef_idx: usize) -> Result<WaldTest> {
    let info = model.design_info();
    if coef_idx == 0 || coef_idx >= info.n_coefs() {
        return Err(DgeaError::InvalidContrast {
            reason: format!(
                "coefficient {} is not a group effect of a {}-coefficient model",
                coef_idx,
                info.n_coefs()
            ),
        });
    }
    if base_means.len() != model.n_genes() {
        return Err(DgeaError::DimensionMismatch {
            expected: format!("{} base means", model.n_genes()),
            got: format!("{} base means", base_means.len()),
        });
    }

    let ln2 = std::f64::consts::LN_2;
    let betas = model.coefficient(coef_idx);
    let ses = model.standard_error(coef_idx);
    let n_genes = model.n_genes();

    let mut test = WaldTest {
        coef_name: info.coef_names[coef_idx].clone(),
        log2_fold_changes: Vec::with_capacity(n_genes),
        lfc_se: Vec::with_capacity(n_genes),
        stat: Vec::with_capacity(n_genes),
        pvalues: Vec::with_capacity(n_genes),
    };
    for i in 0..n_genes {
        if base_means[i] == 0.0 {
            test.log2_fold_changes.push(0.0);
            test.lfc_se.push(0.0);
            test.stat.push(f64::NAN);
            test.pvalues.push(f64::NAN);
            continue;
        }
        let (beta, se) = (betas[i], ses[i]);
        let stat = if se > 0.0 && se.is_finite() { beta / se } else { f64::NAN };
        test.log2_fold_changes.push(beta / ln2);
        test.lfc_se.push(se / ln2);
        test.stat.push(stat);
        test.pvalues.push(calculate_pvalue(stat));
    }

    log::debug!(
        "Wald test on {}: {} genes with a p-value",
        test.coef_name,
        test.pvalues.iter().filter(|p| p.is_finite()).count()
    );
    Ok(test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelParams;
    use crate::test_support::{dataset_with_zero_gene, simulated_dataset, UP_IN_TAT};

    #[test]
    fn test_wald_calls_up_regulated_gene() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        let tat = model.design_info().coef_index("Tat").unwrap();
        let test = wald_test(&model, dataset.base_means(), tat).unwrap();

        assert_eq!(test.coef_name, "group_Tat_vs_Cys");
        assert!(test.log2_fold_changes[UP_IN_TAT] > 2.5);
        assert!(test.pvalues[UP_IN_TAT] < 1e-6);
        assert!(test.stat[UP_IN_TAT] > 0.0);
        assert!(test.pvalues.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_zero_gene_is_untested() {
        let dataset = dataset_with_zero_gene();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        let test = wald_test(&model, dataset.base_means(), 1).unwrap();
        let last = dataset.n_genes() - 1;
        assert_eq!(test.log2_fold_changes[last], 0.0);
        assert_eq!(test.lfc_se[last], 0.0);
        assert!(test.pvalues[last].is_nan());
    }

    #[test]
    fn test_intercept_is_rejected() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        assert!(wald_test(&model, dataset.base_means(), 0).is_err());
        assert!(wald_test(&model, dataset.base_means(), 3).is_err());
    }
}
