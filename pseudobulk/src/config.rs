//! Pipeline inputs and outputs, loadable from a TOML file.
//!
//! ```toml
//! annotation = "data/Homo_sapiens.GRCh38.113.gtf"
//! output_dir = "results"
//!
//! [[counts]]
//! format = "10x"
//! path = "data/scrnaseq_data/tumor_A_10X"
//!
//! [[counts]]
//! format = "tsv"
//! path = "data/extra_cells.tsv"
//! sample_column = "dataset"
//! ```

use crate::errors::PipelineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use transcriptome::resolve_gtf_path;

pub const DEFAULT_SAMPLE_COLUMN: &str = "dataset";
const DEFAULT_LENGTH_TABLE: &str = "matrix_pseudo_bulk_length.tsv";
const DEFAULT_TPM_TABLE: &str = "matrix_pseudo_bulk_tpm_normalized.tsv";

fn default_sample_column() -> String {
    DEFAULT_SAMPLE_COLUMN.to_string()
}

fn default_length_table() -> String {
    DEFAULT_LENGTH_TABLE.to_string()
}

fn default_tpm_table() -> String {
    DEFAULT_TPM_TABLE.to_string()
}

/// One single-cell count matrix to include in the pseudo-bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum CountSource {
    /// A 10x feature-barcode matrix folder. All of its cells belong to
    /// `sample`, which defaults to the folder name without `_10X`.
    #[serde(rename = "10x")]
    TenX {
        path: PathBuf,
        #[serde(default)]
        sample: Option<String>,
    },
    /// A dense cell x gene table with a sample label column.
    #[serde(rename = "tsv")]
    Tsv {
        path: PathBuf,
        #[serde(default = "default_sample_column")]
        sample_column: String,
    },
}

impl CountSource {
    pub fn path(&self) -> &Path {
        match self {
            CountSource::TenX { path, .. } | CountSource::Tsv { path, .. } => path,
        }
    }

    fn path_mut(&mut self) -> &mut PathBuf {
        match self {
            CountSource::TenX { path, .. } | CountSource::Tsv { path, .. } => path,
        }
    }

    fn exists(&self) -> bool {
        match self {
            CountSource::TenX { path, .. } => path.is_dir(),
            CountSource::Tsv { path, .. } => path.is_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub counts: Vec<CountSource>,
    /// GTF file; a gzipped `<annotation>.gz` is used when the plain file is
    /// absent.
    pub annotation: PathBuf,
    pub output_dir: PathBuf,
    /// File name of the length-annotated count table inside `output_dir`.
    #[serde(default = "default_length_table")]
    pub length_table: String,
    /// File name of the TPM table inside `output_dir`.
    #[serde(default = "default_tpm_table")]
    pub tpm_table: String,
}

impl PipelineConfig {
    pub fn new(counts: Vec<CountSource>, annotation: PathBuf, output_dir: PathBuf) -> Self {
        PipelineConfig {
            counts,
            annotation,
            output_dir,
            length_table: default_length_table(),
            tpm_table: default_tpm_table(),
        }
    }

    /// Load a TOML config. Relative paths in the file are resolved against
    /// the directory containing it.
    pub fn from_toml_path(path: &Path) -> Result<PipelineConfig> {
        let text = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        let mut config: PipelineConfig =
            toml::from_str(&text).with_context(|| path.display().to_string())?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for source in &mut self.counts {
            resolve(source.path_mut());
        }
        resolve(&mut self.annotation);
        resolve(&mut self.output_dir);
    }

    pub fn length_table_path(&self) -> PathBuf {
        self.output_dir.join(&self.length_table)
    }

    pub fn tpm_table_path(&self) -> PathBuf {
        self.output_dir.join(&self.tpm_table)
    }

    /// Check that every input is present before anything is read or written.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.counts.is_empty() {
            return Err(PipelineError::EmptyCountSources);
        }
        if let Some(source) = self.counts.iter().find(|s| !s.exists()) {
            return Err(PipelineError::MissingInput {
                path: source.path().to_path_buf(),
            });
        }
        if resolve_gtf_path(&self.annotation).is_none() {
            return Err(PipelineError::MissingInput {
                path: self.annotation.clone(),
            });
        }
        Ok(())
    }
}
