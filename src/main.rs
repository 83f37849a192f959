//! rust_dgea CLI binary

use std::path::Path;

use clap::Parser;
use log::info;
use rust_dgea::cli::{Cli, Commands};
use rust_dgea::config::PipelineConfig;
use rust_dgea::contrast::reverse_file;
use rust_dgea::error::Result;
use rust_dgea::pipeline::{run_analysis, run_assembly};

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Assemble {
            counts_dir,
            annotation,
            output,
            suffix,
            top_n,
        } => run_assembly(&counts_dir, &suffix, &annotation, &output, top_n).map(|_| ()),
        Commands::Run { config, output, threads } => run(&config, output.as_deref(), threads),
        Commands::Reverse { input, output } => reverse_file(&input, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config_path: &Path, output: Option<&Path>, threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads.filter(|&t| t > 0) {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            log::warn!("Could not size the thread pool: {}", e);
        }
    }

    let mut config = PipelineConfig::load(config_path)?;
    if let Some(output) = output {
        config.output_dir = output.to_path_buf();
    }
    let summary = run_analysis(&config)?;
    info!(
        "{} samples, {} genes, {} result sets written to {}",
        summary.n_samples,
        summary.n_genes,
        summary.contrasts.len(),
        config.output_dir.display()
    );
    Ok(())
}
