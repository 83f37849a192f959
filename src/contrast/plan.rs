//! Contrast planning by reference level
//!
//! A Wald contrast `N vs D` reads coefficient `N` of a fit whose reference is
//! `D`. Contrasts sharing a denominator form one batch and one refit.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::SampleDesign;
use crate::error::{DgeaError, Result};
use crate::io::contrast_label;

/// `numerator` vs `denominator` group comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContrastSpec {
    pub numerator: String,
    pub denominator: String,
}

impl ContrastSpec {
    pub fn new(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    /// `<numerator>_vs_<denominator>`
    pub fn label(&self) -> String {
        contrast_label(&self.numerator, &self.denominator)
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.denominator.clone(), self.numerator.clone())
    }
}

impl fmt::Display for ContrastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.numerator, self.denominator)
    }
}

/// Contrasts answered by one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBatch {
    pub reference: String,
    pub contrasts: Vec<ContrastSpec>,
}

/// Contrasts grouped by the reference level they need
#[derive(Debug, Clone)]
pub struct ContrastPlan {
    batches: Vec<ReferenceBatch>,
}

impl ContrastPlan {
    /// Batches appear in order of first use of their reference
    pub fn new(contrasts: &[ContrastSpec]) -> Result<Self> {
        if contrasts.is_empty() {
            return Err(DgeaError::InvalidContrast {
                reason: "no contrasts requested".to_string(),
            });
        }
        let mut seen = HashSet::new();
        let mut batches: IndexMap<String, Vec<ContrastSpec>> = IndexMap::new();
        for spec in contrasts {
            if spec.numerator == spec.denominator {
                return Err(DgeaError::InvalidContrast {
                    reason: format!("'{}' compares a group with itself", spec),
                });
            }
            if !seen.insert(spec) {
                return Err(DgeaError::InvalidContrast {
                    reason: format!("'{}' is requested twice", spec),
                });
            }
            batches.entry(spec.denominator.clone()).or_default().push(spec.clone());
        }
        Ok(Self {
            batches: batches
                .into_iter()
                .map(|(reference, contrasts)| ReferenceBatch { reference, contrasts })
                .collect(),
        })
    }

    pub fn batches(&self) -> &[ReferenceBatch] {
        &self.batches
    }

    /// Number of model fits the plan needs, one per distinct reference
    pub fn refit_count(&self) -> usize {
        self.batches.len()
    }

    pub fn contrasts(&self) -> impl Iterator<Item = &ContrastSpec> {
        self.batches.iter().flat_map(|b| b.contrasts.iter())
    }

    pub fn contains(&self, spec: &ContrastSpec) -> bool {
        self.contrasts().any(|c| c == spec)
    }

    /// Every group named by the plan must exist in the design
    pub fn check_levels(&self, design: &SampleDesign) -> Result<()> {
        for spec in self.contrasts() {
            for level in [&spec.numerator, &spec.denominator] {
                if !design.has_level(level) {
                    return Err(DgeaError::InvalidContrast {
                        reason: format!("group '{}' of '{}' has no samples", level, spec),
                    });
                }
            }
        }
        Ok(())
    }

    /// Each reversed contrast must mirror a planned one and not be planned itself
    pub fn check_reverse(&self, reverse: &[ContrastSpec]) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in reverse {
            if !self.contains(&spec.reversed()) {
                return Err(DgeaError::InvalidContrast {
                    reason: format!("reverse '{}' needs the contrast '{}'", spec, spec.reversed()),
                });
            }
            if self.contains(spec) || !seen.insert(spec) {
                return Err(DgeaError::InvalidContrast {
                    reason: format!("'{}' is requested twice", spec),
                });
            }
        }
        Ok(())
    }
}
