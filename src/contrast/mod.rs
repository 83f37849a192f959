//! Contrast extraction, result tables and reversed contrasts
//!
//! A contrast is read from a [`FittedModel`] whose reference level is the
//! contrast's denominator. The snapshot is passed in explicitly and checked.

mod plan;
mod results;
mod reverse;
mod table;

pub use plan::{ContrastPlan, ContrastSpec, ReferenceBatch};
pub use results::{is_significant, ContrastResult, ShrunkColumns};
pub use reverse::{reverse_file, reverse_table, TsvTable};
pub use table::{ResultRow, ResultTable, BASE_COLUMNS, MLE_COLUMN};

use crate::data::{ExpressionDataSet, GeneAnnotation};
use crate::error::{DgeaError, Result};
use crate::filter::{cooks_outliers, independent_filtering};
use crate::glm::{contrast_index, GlmFitParams};
use crate::io::{OutputLayout, TableVariant};
use crate::model::FittedModel;
use crate::shrinkage::shrink_lfc_normal;
use crate::testing::{benjamini_hochberg, wald_test};

/// Options for turning a snapshot into result tables
#[derive(Debug, Clone)]
pub struct ContrastParams {
    /// Significance level for independent filtering and the DE tables
    pub alpha: f64,
    /// Minimum |log2FoldChange| of the DE tables
    pub lfc_threshold: f64,
    pub shrink: bool,
    pub independent_filtering: bool,
    pub cooks_filter: bool,
    pub require_annotation: bool,
    pub glm: GlmFitParams,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            lfc_threshold: 1.5_f64.log2(),
            shrink: true,
            independent_filtering: true,
            cooks_filter: true,
            require_annotation: false,
            glm: GlmFitParams::default(),
        }
    }
}

/// The tables of one contrast; shrunk tables exist when shrinkage ran
#[derive(Debug, Clone)]
pub struct ContrastTables {
    pub spec: ContrastSpec,
    pub reference: String,
    pub all: ResultTable,
    pub de: ResultTable,
    pub shrunk_all: Option<ResultTable>,
    pub shrunk_de: Option<ResultTable>,
}

impl ContrastTables {
    pub fn get(&self, variant: TableVariant) -> Option<&ResultTable> {
        match variant {
            TableVariant::All => Some(&self.all),
            TableVariant::De => Some(&self.de),
            TableVariant::ShrunkAll => self.shrunk_all.as_ref(),
            TableVariant::ShrunkDe => self.shrunk_de.as_ref(),
        }
    }

    /// Write every table to its fixed path; returns the variants written
    pub fn write(&self, layout: &OutputLayout) -> Result<Vec<TableVariant>> {
        let mut written = Vec::new();
        for variant in TableVariant::ALL {
            if let Some(table) = self.get(variant) {
                table.write(&layout.contrast_table(&self.spec.numerator, &self.spec.denominator, variant))?;
                written.push(variant);
            }
        }
        Ok(written)
    }
}

/// Wald test, filtering and optional shrinkage for `spec`
///
/// `model` must have `spec.denominator` as its reference level.
pub fn test_contrast(
    model: &FittedModel,
    dataset: &ExpressionDataSet,
    spec: &ContrastSpec,
    params: &ContrastParams,
) -> Result<ContrastResult> {
    if spec.denominator != model.reference() {
        return Err(DgeaError::InvalidContrast {
            reason: format!(
                "'{}' needs a fit with reference '{}', got '{}'",
                spec,
                spec.denominator,
                model.reference()
            ),
        });
    }
    model.check_dataset(dataset)?;
    let coef_idx = contrast_index(model.design_info(), &spec.numerator, &spec.denominator)?;

    let base_means = dataset.base_means();
    let wald = wald_test(model, base_means, coef_idx)?;
    let mut pvalues = wald.pvalues;

    if params.cooks_filter {
        let outliers = cooks_outliers(model, dataset)?;
        let mut n_removed = 0;
        for (p, &outlier) in pvalues.iter_mut().zip(&outliers) {
            if outlier && p.is_finite() {
                *p = f64::NAN;
                n_removed += 1;
            }
        }
        if n_removed > 0 {
            log::info!("{}: {} genes removed as Cook's outliers", spec, n_removed);
        }
    }

    let base_means = base_means.to_vec();
    let padj = if params.independent_filtering {
        independent_filtering(&base_means, &pvalues, params.alpha).padj
    } else {
        benjamini_hochberg(&pvalues)
    };

    let shrunk = if params.shrink {
        let shrunk = shrink_lfc_normal(model, dataset, coef_idx, &params.glm)?;
        Some(ShrunkColumns {
            log2_fold_changes: shrunk.log2_fold_changes,
            lfc_se: shrunk.lfc_se,
        })
    } else {
        None
    };

    let result = ContrastResult {
        spec: spec.clone(),
        reference: model.reference().to_string(),
        gene_ids: dataset.gene_ids().to_vec(),
        base_means,
        log2_fold_changes: wald.log2_fold_changes,
        lfc_se: wald.lfc_se,
        pvalues,
        padj,
        shrunk,
    };
    log::info!(
        "{}: {} genes tested, {} significant (padj < {}, |log2FC| >= {:.3})",
        spec,
        result.n_tested(),
        result.n_significant(params.alpha, params.lfc_threshold),
        params.alpha,
        params.lfc_threshold
    );
    Ok(result)
}

/// All four annotated tables for `spec` from a snapshot with the matching reference
pub fn extract_contrast(
    model: &FittedModel,
    dataset: &ExpressionDataSet,
    spec: &ContrastSpec,
    annotation: &GeneAnnotation,
    params: &ContrastParams,
) -> Result<ContrastTables> {
    let result = test_contrast(model, dataset, spec, params)?;

    let mut all = ResultTable::build(&result, dataset, false)?;
    all.annotate(annotation, params.require_annotation)?;
    let de = all.significant(params.alpha, params.lfc_threshold);

    let (shrunk_all, shrunk_de) = if result.shrunk.is_some() {
        let mut shrunk_all = ResultTable::build(&result, dataset, true)?;
        shrunk_all.annotate(annotation, params.require_annotation)?;
        let shrunk_de = shrunk_all.significant(params.alpha, params.lfc_threshold);
        (Some(shrunk_all), Some(shrunk_de))
    } else {
        (None, None)
    };

    Ok(ContrastTables {
        spec: spec.clone(),
        reference: result.reference,
        all,
        de,
        shrunk_all,
        shrunk_de,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelParams;
    use crate::test_support::{dataset_with_zero_gene, simulated_dataset, UP_IN_TAT};
    use tempfile::tempdir;

    #[test]
    fn test_reference_must_match_denominator() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        let spec = ContrastSpec::new("Cys", "Tat");
        let err = extract_contrast(&model, &dataset, &spec, &GeneAnnotation::new(), &ContrastParams::default());
        assert!(matches!(err, Err(DgeaError::InvalidContrast { .. })));
    }

    #[test]
    fn test_extract_contrast_tables() {
        let dataset = dataset_with_zero_gene();
        let model = FittedModel::fit(&dataset, "Cys", &ModelParams::default()).unwrap();
        let spec = ContrastSpec::new("Tat", "Cys");
        let params = ContrastParams::default();
        let tables = extract_contrast(&model, &dataset, &spec, &GeneAnnotation::new(), &params).unwrap();

        assert_eq!(tables.reference, "Cys");
        let zero_gene = dataset.gene_ids().last().unwrap();
        assert!(tables.all.rows.iter().all(|r| &r.gene_id != zero_gene));
        assert!(tables.all.rows.windows(2).all(|w| w[0].padj <= w[1].padj));
        assert_eq!(tables.all.rows[0].gene_id, dataset.gene_ids()[UP_IN_TAT]);
        assert!(tables.all.rows[0].log2_fold_change > 2.5);
        assert_eq!(tables.all.sample_columns[..3], ["Tat1", "Tat2", "Tat3"]);

        assert!(tables
            .de
            .rows
            .iter()
            .all(|r| r.padj < params.alpha && r.log2_fold_change.abs() >= params.lfc_threshold));
        let de_ids: Vec<&str> = tables.de.rows.iter().map(|r| r.gene_id.as_str()).collect();
        for row in &tables.all.rows {
            if !is_significant(row.padj, row.log2_fold_change, params.alpha, params.lfc_threshold) {
                assert!(!de_ids.contains(&row.gene_id.as_str()));
            }
        }

        let shrunk = tables.shrunk_all.as_ref().unwrap();
        assert_eq!(shrunk.rows.len(), tables.all.rows.len());
        assert!(shrunk.rows.iter().all(|r| r.log2_fold_change_mle.is_some()));

        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let written = tables.write(&layout).unwrap();
        assert_eq!(written, TableVariant::ALL.to_vec());
        for variant in TableVariant::ALL {
            assert!(layout.contrast_table("Tat", "Cys", variant).exists());
        }
    }

    #[test]
    fn test_without_shrinkage_only_two_tables() {
        let dataset = simulated_dataset();
        let model = FittedModel::fit(&dataset, "Ctl", &ModelParams::default()).unwrap();
        let params = ContrastParams {
            shrink: false,
            independent_filtering: false,
            cooks_filter: false,
            ..ContrastParams::default()
        };
        let tables =
            extract_contrast(&model, &dataset, &ContrastSpec::new("Tat", "Ctl"), &GeneAnnotation::new(), &params)
                .unwrap();
        assert!(tables.shrunk_all.is_none());
        assert_eq!(tables.all.rows.len(), dataset.n_genes());
        assert!(tables.get(TableVariant::ShrunkDe).is_none());
    }
}
