//! Analysis plan loaded by `rust_dgea run`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::contrast::{ContrastParams, ContrastPlan, ContrastSpec};
use crate::error::{DgeaError, Result};
use crate::glm::GlmFitParams;
use crate::io::read_json;

fn default_count_suffix() -> String {
    ".txt".to_string()
}

fn default_alpha() -> f64 {
    0.05
}

fn default_lfc_threshold() -> f64 {
    1.5_f64.log2()
}

fn default_true() -> bool {
    true
}

fn default_top_n() -> usize {
    100
}

/// Inputs, output directory, thresholds and contrasts of one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory of per-sample count files
    pub counts_dir: PathBuf,
    #[serde(default = "default_count_suffix")]
    pub count_suffix: String,
    /// Gene ID, gene name, gene type
    pub annotation: PathBuf,
    /// Curated ribosomal gene IDs; nothing is excluded when absent
    #[serde(default)]
    pub ribosomal_exclusions: Option<PathBuf>,
    pub output_dir: PathBuf,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_lfc_threshold")]
    pub lfc_threshold: f64,
    #[serde(default = "default_true")]
    pub shrink: bool,
    #[serde(default = "default_true")]
    pub independent_filtering: bool,
    #[serde(default = "default_true")]
    pub cooks_filter: bool,
    #[serde(default)]
    pub require_annotation: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    pub contrasts: Vec<ContrastSpec>,
    /// Contrasts derived by negating a written forward table
    #[serde(default)]
    pub reverse: Vec<ContrastSpec>,
}

impl PipelineConfig {
    /// Read and validate a JSON plan
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path).map_err(|e| DgeaError::InvalidConfig {
            reason: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        log::info!(
            "Loaded {} contrasts ({} reversed) from {}",
            config.contrasts.len(),
            config.reverse.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(DgeaError::InvalidConfig {
                reason: format!("alpha must lie in (0, 1), got {}", self.alpha),
            });
        }
        if !(self.lfc_threshold >= 0.0) {
            return Err(DgeaError::InvalidConfig {
                reason: format!("lfc_threshold must be >= 0, got {}", self.lfc_threshold),
            });
        }
        if self.contrasts.is_empty() {
            return Err(DgeaError::InvalidConfig {
                reason: "at least one contrast is required".to_string(),
            });
        }
        self.plan()?.check_reverse(&self.reverse)
    }

    pub fn plan(&self) -> Result<ContrastPlan> {
        ContrastPlan::new(&self.contrasts)
    }

    pub fn contrast_params(&self) -> ContrastParams {
        ContrastParams {
            alpha: self.alpha,
            lfc_threshold: self.lfc_threshold,
            shrink: self.shrink,
            independent_filtering: self.independent_filtering,
            cooks_filter: self.cooks_filter,
            require_annotation: self.require_annotation,
            glm: GlmFitParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("plan.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "counts_dir": "counts",
                "annotation": "annotation.tsv",
                "output_dir": "results",
                "contrasts": [{"numerator": "Tat", "denominator": "Cys"}]
            }"#,
        );
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.count_suffix, ".txt");
        assert_eq!(config.alpha, 0.05);
        assert!((config.lfc_threshold - 0.5849625).abs() < 1e-6);
        assert!(config.shrink && config.independent_filtering && config.cooks_filter);
        assert!(!config.require_annotation);
        assert_eq!(config.top_n, 100);
        assert!(config.ribosomal_exclusions.is_none());
        assert!(config.reverse.is_empty());
        assert_eq!(config.contrast_params().alpha, 0.05);
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "counts_dir": "counts", "annotation": "a.tsv", "output_dir": "out",
                "alpha": 1.5,
                "contrasts": [{"numerator": "Tat", "denominator": "Cys"}]
            }"#,
        );
        assert!(matches!(PipelineConfig::load(&path), Err(DgeaError::InvalidConfig { .. })));

        let path = write_config(
            dir.path(),
            r#"{"counts_dir": "counts", "annotation": "a.tsv", "output_dir": "out", "contrasts": []}"#,
        );
        assert!(matches!(PipelineConfig::load(&path), Err(DgeaError::InvalidConfig { .. })));

        let path = write_config(dir.path(), r#"{"counts_dir": "counts""#);
        assert!(matches!(PipelineConfig::load(&path), Err(DgeaError::InvalidConfig { .. })));
    }

    #[test]
    fn test_reverse_must_mirror_a_contrast() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "counts_dir": "counts", "annotation": "a.tsv", "output_dir": "out",
                "contrasts": [{"numerator": "Tat", "denominator": "Cys"}],
                "reverse": [{"numerator": "Ctl", "denominator": "Tat"}]
            }"#,
        );
        assert!(matches!(PipelineConfig::load(&path), Err(DgeaError::InvalidContrast { .. })));
    }
}
