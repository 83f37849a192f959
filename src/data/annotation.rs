//! Static gene annotation (gene ID -> gene name, gene type)

use std::collections::HashMap;

use crate::counts::strip_version;

/// Name and biotype of one gene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneInfo {
    pub gene_name: String,
    pub gene_type: String,
}

/// Gene annotation table. Loaded once and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct GeneAnnotation {
    entries: HashMap<String, GeneInfo>,
}

impl GeneAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (gene_id, name, type) records; later duplicates are ignored
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut entries = HashMap::new();
        for (gene_id, gene_name, gene_type) in records {
            entries
                .entry(gene_id)
                .or_insert(GeneInfo { gene_name, gene_type });
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a gene by exact ID, falling back to the version-stripped ID
    pub fn get(&self, gene_id: &str) -> Option<&GeneInfo> {
        self.entries
            .get(gene_id)
            .or_else(|| self.entries.get(strip_version(gene_id)))
    }
}
