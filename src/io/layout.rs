//! Fixed output directory layout

use std::path::{Path, PathBuf};

/// Which of the four tables written per contrast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableVariant {
    All,
    De,
    ShrunkAll,
    ShrunkDe,
}

impl TableVariant {
    pub const ALL: [TableVariant; 4] = [
        TableVariant::All,
        TableVariant::De,
        TableVariant::ShrunkAll,
        TableVariant::ShrunkDe,
    ];

    fn suffix(self) -> &'static str {
        match self {
            TableVariant::All => "all",
            TableVariant::De => "DE",
            TableVariant::ShrunkAll => "shrunk_all",
            TableVariant::ShrunkDe => "shrunk_DE",
        }
    }
}

/// Paths of every file the pipeline writes, rooted at the output directory
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_counts(&self) -> PathBuf {
        self.root.join("counts").join("raw_counts.tsv")
    }

    pub fn count_summary(&self) -> PathBuf {
        self.root.join("counts").join("count_summary.tsv")
    }

    pub fn top_expressed(&self) -> PathBuf {
        self.root.join("counts").join("top100_expressed.tsv")
    }

    pub fn filtered_counts(&self) -> PathBuf {
        self.root.join("counts").join("filtered_counts.tsv")
    }

    pub fn size_factors(&self) -> PathBuf {
        self.root.join("normalization").join("size_factors.tsv")
    }

    pub fn normalized_counts(&self) -> PathBuf {
        self.root.join("normalization").join("normalized_counts.tsv")
    }

    pub fn model_snapshot(&self, reference: &str) -> PathBuf {
        self.root.join("model").join(format!("fit_ref-{}.json", reference))
    }

    pub fn contrast_dir(&self, numerator: &str, denominator: &str) -> PathBuf {
        self.root.join("contrasts").join(contrast_label(numerator, denominator))
    }

    /// `<out>/contrasts/<N>_vs_<D>/<N>_vs_<D>_<variant>.tsv`
    pub fn contrast_table(&self, numerator: &str, denominator: &str, variant: TableVariant) -> PathBuf {
        let label = contrast_label(numerator, denominator);
        self.contrast_dir(numerator, denominator)
            .join(format!("{}_{}.tsv", label, variant.suffix()))
    }
}

pub fn contrast_label(numerator: &str, denominator: &str) -> String {
    format!("{}_vs_{}", numerator, denominator)
}
