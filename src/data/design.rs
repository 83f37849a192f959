//! Sample design: which experimental group each sample belongs to

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::CountMatrix;
use crate::error::{DgeaError, Result};

/// Derive the group label of a sample by stripping its trailing replicate digits
///
/// `Tat1` -> `Tat`, `Cys12` -> `Cys`. A name without a trailing digit, or one
/// made only of digits, has no group and is rejected.
pub fn group_from_sample_name(sample: &str) -> Result<String> {
    let group = sample.trim_end_matches(|c: char| c.is_ascii_digit());
    if group.len() == sample.len() {
        return Err(DgeaError::InvalidDesign {
            reason: format!("sample '{}' has no trailing replicate number", sample),
        });
    }
    if group.is_empty() {
        return Err(DgeaError::InvalidDesign {
            reason: format!("sample '{}' has no group prefix", sample),
        });
    }
    Ok(group.to_string())
}

/// Mapping from sample to experimental group (`~ group`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDesign {
    sample_ids: Vec<String>,
    /// Group label per sample, aligned with `sample_ids`
    groups: Vec<String>,
    /// Distinct groups in first-seen order
    levels: IndexSet<String>,
}

impl SampleDesign {
    /// Build a design from explicit (sample, group) pairs
    pub fn new(sample_ids: Vec<String>, groups: Vec<String>) -> Result<Self> {
        if sample_ids.len() != groups.len() {
            return Err(DgeaError::DimensionMismatch {
                expected: format!("{} group labels", sample_ids.len()),
                got: format!("{} group labels", groups.len()),
            });
        }
        let mut seen = IndexSet::new();
        for sample in &sample_ids {
            if !seen.insert(sample.as_str()) {
                return Err(DgeaError::InvalidDesign {
                    reason: format!("sample '{}' appears twice", sample),
                });
            }
        }
        let levels: IndexSet<String> = groups.iter().cloned().collect();
        if levels.len() < 2 {
            return Err(DgeaError::InvalidDesign {
                reason: format!("need at least two groups, found {}", levels.len()),
            });
        }
        Ok(Self {
            sample_ids,
            groups,
            levels,
        })
    }

    /// Derive the design from sample names (trailing replicate digits stripped)
    pub fn from_sample_names(sample_ids: &[String]) -> Result<Self> {
        let groups = sample_ids
            .iter()
            .map(|s| group_from_sample_name(s))
            .collect::<Result<Vec<_>>>()?;
        Self::new(sample_ids.to_vec(), groups)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Group label of the sample at `sample_idx`
    pub fn group_of(&self, sample_idx: usize) -> &str {
        &self.groups[sample_idx]
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Distinct groups in first-seen order
    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(String::as_str)
    }

    pub fn has_level(&self, level: &str) -> bool {
        self.levels.contains(level)
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Column indices of the samples belonging to `level`
    pub fn samples_in_group(&self, level: &str) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.as_str() == level)
            .map(|(i, _)| i)
            .collect()
    }

    /// Check that every count-matrix column has exactly one design entry, in order
    pub fn check_matches(&self, counts: &CountMatrix) -> Result<()> {
        if counts.sample_ids() != self.sample_ids.as_slice() {
            return Err(DgeaError::InvalidDesign {
                reason: format!(
                    "count matrix samples [{}] do not match design samples [{}]",
                    counts.sample_ids().join(", "),
                    self.sample_ids.join(", ")
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_from_sample_name() {
        assert_eq!(group_from_sample_name("Tat1").unwrap(), "Tat");
        assert_eq!(group_from_sample_name("Cys12").unwrap(), "Cys");
        assert_eq!(group_from_sample_name("WT_3").unwrap(), "WT_");
        assert!(group_from_sample_name("Tat").is_err());
        assert!(group_from_sample_name("123").is_err());
    }

    #[test]
    fn test_design_from_sample_names() {
        let design = SampleDesign::from_sample_names(&names(&["Tat1", "Tat2", "Cys1", "Cys2", "Tat3"])).unwrap();
        assert_eq!(design.levels().collect::<Vec<_>>(), vec!["Tat", "Cys"]);
        assert_eq!(design.samples_in_group("Tat"), vec![0, 1, 4]);
        assert_eq!(design.group_of(2), "Cys");
        assert!(design.has_level("Cys"));
        assert!(!design.has_level("WT"));
    }

    #[test]
    fn test_single_group_rejected() {
        let result = SampleDesign::from_sample_names(&names(&["Tat1", "Tat2"]));
        assert!(matches!(result, Err(DgeaError::InvalidDesign { .. })));
    }

    #[test]
    fn test_check_matches_count_columns() {
        use ndarray::array;
        let counts = CountMatrix::new(array![[1.0, 2.0]], names(&["g1"]), names(&["A1", "B1"])).unwrap();
        let design = SampleDesign::from_sample_names(&names(&["A1", "B1"])).unwrap();
        assert!(design.check_matches(&counts).is_ok());

        let swapped = SampleDesign::from_sample_names(&names(&["B1", "A1"])).unwrap();
        assert!(swapped.check_matches(&counts).is_err());
    }
}
