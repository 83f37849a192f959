//! Command-line interface for rust_dgea

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_dgea")]
#[command(version)]
#[command(about = "Differential gene expression analysis of RNA-seq count files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Combine count files and write the top expressed genes for curation
    #[command(after_long_help = "\
Examples:
  rust_dgea assemble --counts-dir counts/ --annotation annotation.tsv --output results/

Writes counts/raw_counts.tsv, counts/count_summary.tsv, counts/filtered_counts.tsv
and counts/top100_expressed.tsv under the output directory. Curate ribosomal
genes from the top list, then pass them to `run` as ribosomal_exclusions.")]
    Assemble {
        /// Directory holding one two-column count file per sample
        #[arg(short, long)]
        counts_dir: PathBuf,

        /// Annotation TSV: gene ID, gene name, gene type
        #[arg(short, long)]
        annotation: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// File name suffix of count files
        #[arg(short, long, default_value = ".txt")]
        suffix: String,

        /// Number of genes in the expression ranking
        #[arg(long, default_value_t = 100)]
        top_n: usize,
    },

    /// Run the full analysis described by a JSON plan
    #[command(after_long_help = "\
Examples:
  rust_dgea run --config plan.json
  rust_dgea run --config plan.json --output results/ --threads 8 --verbose")]
    Run {
        /// JSON analysis plan
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory, overrides output_dir of the plan
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads for per-gene fitting (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Derive the B vs A table from a written A vs B table
    Reverse {
        /// Forward contrast table
        #[arg(short, long)]
        input: PathBuf,

        /// Reversed table to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from(["rust_dgea", "-v", "run", "--config", "plan.json", "--threads", "4"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { config, output, threads } => {
                assert_eq!(config, PathBuf::from("plan.json"));
                assert!(output.is_none());
                assert_eq!(threads, Some(4));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_assemble_defaults() {
        let cli = Cli::try_parse_from([
            "rust_dgea",
            "assemble",
            "--counts-dir",
            "counts",
            "--annotation",
            "annotation.tsv",
            "--output",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Assemble { suffix, top_n, .. } => {
                assert_eq!(suffix, ".txt");
                assert_eq!(top_n, 100);
            }
            _ => panic!("expected assemble"),
        }
    }
}
