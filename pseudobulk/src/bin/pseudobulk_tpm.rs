//! pseudobulk_tpm
#![deny(missing_docs)]

use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use pseudobulk::config::DEFAULT_SAMPLE_COLUMN;
use pseudobulk::{CountSource, PipelineConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sum single-cell counts into one pseudo-bulk profile per sample, annotate
/// each gene with its total exon length and write TPM-normalized values.
#[derive(Parser, Debug)]
#[clap(name = "pseudobulk_tpm", version)]
struct Args {
    /// TOML file describing the inputs and outputs. Cannot be combined with
    /// the other input options.
    #[clap(long, conflicts_with_all = ["tenx", "counts_tsv", "gtf", "output_dir"])]
    config: Option<PathBuf>,

    /// 10x feature-barcode matrix folder. Its cells are labeled with the
    /// folder name without a trailing `_10X`. May be repeated.
    #[clap(long = "tenx")]
    tenx: Vec<PathBuf>,

    /// Dense cell x gene TSV with a sample label column. May be repeated.
    #[clap(long = "counts-tsv")]
    counts_tsv: Vec<PathBuf>,

    /// Name of the sample label column in `--counts-tsv` files.
    #[clap(long = "sample-column", default_value = DEFAULT_SAMPLE_COLUMN)]
    sample_column: String,

    /// Genes GTF file, plain or gzipped.
    #[clap(long = "gtf")]
    gtf: Option<PathBuf>,

    /// Folder the two output tables are written to.
    #[clap(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        if let Some(path) = self.config {
            return PipelineConfig::from_toml_path(&path);
        }
        let Some(gtf) = self.gtf else {
            bail!("either --config or --gtf is required");
        };
        let counts = self
            .tenx
            .into_iter()
            .map(|path| CountSource::TenX { path, sample: None })
            .chain(self.counts_tsv.into_iter().map(|path| CountSource::Tsv {
                path,
                sample_column: self.sample_column.clone(),
            }))
            .collect();
        Ok(PipelineConfig::new(counts, gtf, self.output_dir))
    }
}

fn inner_main() -> Result<()> {
    let config = Args::parse().into_config()?;
    let outputs = pseudobulk::run(&config)?;
    info!(
        "{} samples, {} genes retained, {} genes without annotation",
        outputs.samples.len(),
        outputs.genes_retained,
        outputs.genes_dropped.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match inner_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            for c in e.chain().skip(1) {
                eprintln!("\tCaused by: {c}");
            }
            ExitCode::FAILURE
        }
    }
}
