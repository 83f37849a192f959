//! End-to-end stages behind the `assemble` and `run` commands

use std::path::Path;

use crate::config::PipelineConfig;
use crate::contrast::{extract_contrast, reverse_file};
use crate::counts::{
    assemble_counts, discover_count_files, filter_counts, read_count_file, top_expressed, write_top_expressed,
    AssembledCounts, RibosomalExclusions,
};
use crate::data::{CountMatrix, ExpressionDataSet, SampleDesign};
use crate::error::Result;
use crate::io::{read_annotation, write_matrix, write_size_factors, OutputLayout, TableVariant};
use crate::model::{FittedModel, ModelParams};

/// Files written for one contrast
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenContrast {
    pub label: String,
    pub reference: String,
    pub variants: Vec<TableVariant>,
    pub reversed: bool,
}

/// What a full run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub n_samples: usize,
    pub n_genes: usize,
    pub refits: usize,
    pub contrasts: Vec<WrittenContrast>,
}

fn read_and_assemble(counts_dir: &Path, suffix: &str, layout: &OutputLayout) -> Result<AssembledCounts> {
    let files = discover_count_files(counts_dir, suffix)?;
    log::info!("Reading {} count files from {}", files.len(), counts_dir.display());
    let samples = files.iter().map(|f| read_count_file(f)).collect::<Result<Vec<_>>>()?;
    let assembled = assemble_counts(&samples)?;

    let raw = &assembled.raw;
    write_matrix(&layout.raw_counts(), "gene_id", raw.gene_ids(), raw.sample_ids(), raw.counts())?;
    assembled.summary.write(&layout.count_summary())?;
    Ok(assembled)
}

fn write_counts(path: &Path, matrix: &CountMatrix) -> Result<()> {
    write_matrix(path, "gene_id", matrix.gene_ids(), matrix.sample_ids(), matrix.counts())
}

/// First phase: combine count files and write the list used to curate ribosomal genes
pub fn run_assembly(
    counts_dir: &Path,
    suffix: &str,
    annotation_path: &Path,
    output_dir: &Path,
    top_n: usize,
) -> Result<CountMatrix> {
    let layout = OutputLayout::new(output_dir);
    let annotation = read_annotation(annotation_path)?;
    let assembled = read_and_assemble(counts_dir, suffix, &layout)?;

    let (filtered, _) = filter_counts(&assembled.raw, &RibosomalExclusions::default())?;
    write_counts(&layout.filtered_counts(), &filtered)?;

    let top = top_expressed(&filtered, &annotation, top_n);
    write_top_expressed(&layout.top_expressed(), &top)?;
    log::info!(
        "Wrote top {} expressed genes to {}",
        top.len(),
        layout.top_expressed().display()
    );
    Ok(filtered)
}

/// Full analysis: counts, normalization, one fit per reference, contrast tables
pub fn run_analysis(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let plan = config.plan()?;
    let params = config.contrast_params();
    let layout = OutputLayout::new(&config.output_dir);

    let annotation = read_annotation(&config.annotation)?;
    let exclusions = match &config.ribosomal_exclusions {
        Some(path) => RibosomalExclusions::read(path)?,
        None => {
            log::warn!("No ribosomal exclusion list given; no genes excluded");
            RibosomalExclusions::default()
        }
    };

    let assembled = read_and_assemble(&config.counts_dir, &config.count_suffix, &layout)?;
    let (filtered, _) = filter_counts(&assembled.raw, &exclusions)?;
    write_counts(&layout.filtered_counts(), &filtered)?;
    write_top_expressed(&layout.top_expressed(), &top_expressed(&filtered, &annotation, config.top_n))?;

    let design = SampleDesign::from_sample_names(filtered.sample_ids())?;
    plan.check_levels(&design)?;
    let dataset = ExpressionDataSet::new(filtered, design)?;
    write_size_factors(&layout.size_factors(), dataset.counts().sample_ids(), dataset.size_factors())?;
    write_matrix(
        &layout.normalized_counts(),
        "gene_id",
        dataset.gene_ids(),
        dataset.counts().sample_ids(),
        dataset.normalized_counts(),
    )?;

    let mut summary = RunSummary {
        n_samples: dataset.n_samples(),
        n_genes: dataset.n_genes(),
        refits: plan.refit_count(),
        contrasts: Vec::new(),
    };

    let mut base: Option<FittedModel> = None;
    for batch in plan.batches() {
        let path = layout.model_snapshot(&batch.reference);
        let model = match &base {
            Some(base) => {
                let releveled = base.relevel(&dataset, &batch.reference, &params.glm)?;
                releveled.save(&path)?;
                releveled
            }
            None => {
                let fit_params = ModelParams {
                    glm: params.glm.clone(),
                    ..ModelParams::default()
                };
                FittedModel::fit(&dataset, &batch.reference, &fit_params)?.save(&path)?;
                FittedModel::load(&path)?
            }
        };
        if base.is_none() {
            base = Some(model.clone());
        }

        for spec in &batch.contrasts {
            let tables = extract_contrast(&model, &dataset, spec, &annotation, &params)?;
            let variants = tables.write(&layout)?;
            log::info!(
                "{}: {} genes in table, {} differentially expressed",
                spec,
                tables.all.rows.len(),
                tables.de.rows.len()
            );
            summary.contrasts.push(WrittenContrast {
                label: spec.label(),
                reference: tables.reference.clone(),
                variants,
                reversed: false,
            });
        }
    }

    for spec in &config.reverse {
        let forward = spec.reversed();
        let variants = summary
            .contrasts
            .iter()
            .find(|c| !c.reversed && c.label == forward.label())
            .map(|c| c.variants.clone())
            .unwrap_or_default();
        for &variant in &variants {
            reverse_file(
                &layout.contrast_table(&forward.numerator, &forward.denominator, variant),
                &layout.contrast_table(&spec.numerator, &spec.denominator, variant),
            )?;
        }
        log::info!("{}: derived from {}", spec, forward);
        summary.contrasts.push(WrittenContrast {
            label: spec.label(),
            reference: forward.denominator.clone(),
            variants,
            reversed: true,
        });
    }

    log::info!(
        "Analysis complete: {} contrasts from {} model fits under {}",
        summary.contrasts.len(),
        summary.refits,
        layout.root().display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::{ContrastSpec, TsvTable};
    use crate::test_support::simulated_counts;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const SAMPLES: [&str; 9] = ["Cys1", "Cys2", "Cys3", "Tat1", "Tat2", "Tat3", "Ctl1", "Ctl2", "Ctl3"];

    fn write_inputs() -> TempDir {
        let dir = tempdir().unwrap();
        let samples: Vec<String> = SAMPLES.iter().map(|s| s.to_string()).collect();
        let (gene_ids, counts) = simulated_counts(&samples, 40);
        let counts_dir = dir.path().join("counts");
        fs::create_dir_all(&counts_dir).unwrap();
        for (j, sample) in samples.iter().enumerate() {
            let mut body = String::new();
            for (i, gene) in gene_ids.iter().enumerate() {
                body.push_str(&format!("{}\t{}\n", gene, counts[[i, j]]));
            }
            body.push_str("ENSG88888.2\t0\n");
            body.push_str(&format!("__no_feature\t{}\n", 50 + j));
            body.push_str("__ambiguous\t7\n");
            fs::write(counts_dir.join(format!("{}.counts.txt", sample)), body).unwrap();
        }
        fs::write(dir.path().join("notes.md"), "not a count file").unwrap();

        let mut annotation = String::from("gene_id\tgene_name\tgene_type\n");
        for (i, gene) in gene_ids.iter().enumerate() {
            annotation.push_str(&format!("{}\tGENE{}\tprotein_coding\n", gene.split('.').next().unwrap(), i));
        }
        fs::write(dir.path().join("annotation.tsv"), annotation).unwrap();
        fs::write(dir.path().join("ribosomal.tsv"), "gene_id\nENSG00039\n").unwrap();
        dir
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            counts_dir: dir.join("counts"),
            count_suffix: ".txt".to_string(),
            annotation: dir.join("annotation.tsv"),
            ribosomal_exclusions: Some(dir.join("ribosomal.tsv")),
            output_dir: dir.join("results"),
            alpha: 0.05,
            lfc_threshold: 1.5_f64.log2(),
            shrink: true,
            independent_filtering: true,
            cooks_filter: true,
            require_annotation: false,
            top_n: 10,
            contrasts: vec![ContrastSpec::new("Tat", "Cys"), ContrastSpec::new("Ctl", "Cys"), ContrastSpec::new("Tat", "Ctl")],
            reverse: vec![ContrastSpec::new("Cys", "Tat")],
        }
    }

    #[test]
    fn test_assembly_writes_curation_inputs() {
        let dir = write_inputs();
        let out = dir.path().join("assembled");
        let filtered = run_assembly(&dir.path().join("counts"), ".txt", &dir.path().join("annotation.tsv"), &out, 5).unwrap();
        assert_eq!(filtered.n_genes(), 40);
        assert!(filtered.gene_ids().iter().all(|g| !g.starts_with("__")));

        let layout = OutputLayout::new(&out);
        let summary = TsvTable::read(&layout.count_summary()).unwrap();
        assert_eq!(summary.rows.len(), 3);
        assert_eq!(summary.rows[0][0], "__no_feature");
        let top = TsvTable::read(&layout.top_expressed()).unwrap();
        assert_eq!(top.header, ["gene_id", "gene_name", "gene_type", "mean_cpm"]);
        assert_eq!(top.rows.len(), 5);
        assert!(layout.raw_counts().exists());
    }

    #[test]
    fn test_full_run_writes_every_table() {
        let dir = write_inputs();
        let config = config(dir.path());
        let summary = run_analysis(&config).unwrap();
        assert_eq!(summary.n_samples, 9);
        assert_eq!(summary.n_genes, 39);
        assert_eq!(summary.refits, 2);
        assert_eq!(summary.contrasts.len(), 4);

        let layout = OutputLayout::new(&config.output_dir);
        assert!(layout.model_snapshot("Cys").exists());
        assert!(layout.model_snapshot("Ctl").exists());
        assert!(layout.size_factors().exists());
        for spec in config.contrasts.iter().chain(&config.reverse) {
            for variant in TableVariant::ALL {
                assert!(layout.contrast_table(&spec.numerator, &spec.denominator, variant).exists());
            }
        }

        let forward = TsvTable::read(&layout.contrast_table("Tat", "Cys", TableVariant::All)).unwrap();
        let reverse = TsvTable::read(&layout.contrast_table("Cys", "Tat", TableVariant::All)).unwrap();
        assert_eq!(forward.header, reverse.header);
        let lfc = forward.column("log2FoldChange").unwrap();
        let padj = forward.column("padj").unwrap();
        assert_eq!(forward.rows[0][0], "ENSG00000.1");
        let up: f64 = forward.rows[0][lfc].parse().unwrap();
        let down: f64 = reverse.rows[0][lfc].parse().unwrap();
        assert!(up > 0.0);
        assert_eq!(up, -down);
        assert_eq!(forward.rows[0][padj], reverse.rows[0][padj]);

        let filtered = TsvTable::read(&layout.filtered_counts()).unwrap();
        assert!(filtered.rows.iter().all(|r| !r[0].starts_with("ENSG00039") && !r[0].starts_with("__")));
    }

    #[test]
    fn test_unknown_group_is_fatal() {
        let dir = write_inputs();
        let mut config = config(dir.path());
        config.contrasts = vec![ContrastSpec::new("Mock", "Cys")];
        config.reverse.clear();
        assert!(run_analysis(&config).is_err());
    }
}
