//! End-to-end run: count matrices -> pseudo-bulk -> gene lengths -> TPM.

use crate::aggregate::aggregate;
use crate::config::{CountSource, PipelineConfig};
use crate::count_matrix::CountMatrix;
use crate::io::{tenx, tsv};
use crate::tpm::{tpm, AnnotatedCounts, TpmTable};
use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::fs::{remove_file, rename};
use std::path::{Path, PathBuf};
use transcriptome::{GeneLengths, GeneTargets};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutputs {
    pub length_table: PathBuf,
    pub tpm_table: PathBuf,
    pub samples: Vec<String>,
    pub genes_retained: usize,
    /// Genes in the count matrix without an exon in the annotation.
    pub genes_dropped: Vec<String>,
}

/// Tables produced in memory before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub counts: AnnotatedCounts,
    pub tpm: TpmTable,
    pub dropped: Vec<String>,
}

/// Read every count source and stack them into one matrix.
pub fn load_counts(sources: &[CountSource]) -> Result<CountMatrix> {
    let parts = sources
        .iter()
        .map(|source| match source {
            CountSource::TenX { path, sample } => tenx::read_10x_mtx(path, sample.as_deref()),
            CountSource::Tsv {
                path,
                sample_column,
            } => tsv::read_dense_tsv(path, sample_column),
        })
        .collect::<Result<Vec<_>>>()?;
    CountMatrix::concat(parts)
}

/// Aggregate by sample, restrict to annotated genes and compute TPM.
pub fn normalize(matrix: &CountMatrix, lengths: &GeneLengths) -> Result<Normalized> {
    let bulk = aggregate(matrix);
    info!(
        "aggregated {} cells into {} samples",
        matrix.num_cells(),
        bulk.samples().len()
    );

    let (counts, dropped) = bulk.annotate(lengths)?;
    if !dropped.is_empty() {
        warn!(
            "{} of {} genes have no exons in the annotation and were excluded",
            dropped.len(),
            bulk.genes().len()
        );
    }

    let tpm = tpm(&counts)?;
    Ok(Normalized {
        counts,
        tpm,
        dropped,
    })
}

/// Run the whole pipeline described by `config`. Inputs are validated up
/// front and both tables are computed before either file is written.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutputs> {
    config.validate()?;

    let matrix = load_counts(&config.counts)?;
    let targets: HashSet<String> = matrix.genes().iter().cloned().collect();
    let (lengths, _) = GeneLengths::from_gtf_path(&config.annotation, GeneTargets::Only(&targets))?;

    let Normalized {
        counts,
        tpm,
        dropped,
    } = normalize(&matrix, &lengths)?;

    let length_table = config.length_table_path();
    let tpm_table = config.tpm_table_path();
    write_outputs(&counts, &tpm, &length_table, &tpm_table)?;
    info!(
        "wrote {} and {}",
        length_table.display(),
        tpm_table.display()
    );

    Ok(PipelineOutputs {
        length_table,
        tpm_table,
        samples: counts.samples().to_vec(),
        genes_retained: counts.genes().len(),
        genes_dropped: dropped,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write both tables under staging names and move them into place together.
/// On failure neither table is left behind.
fn write_outputs(
    counts: &AnnotatedCounts,
    tpm: &TpmTable,
    length_table: &Path,
    tpm_table: &Path,
) -> Result<()> {
    let staged_lengths = staging_path(length_table);
    let staged_tpm = staging_path(tpm_table);
    let result = tsv::write_annotated_counts(&staged_lengths, counts)
        .and_then(|()| tsv::write_tpm(&staged_tpm, tpm))
        .and_then(|()| {
            rename(&staged_lengths, length_table)
                .with_context(|| length_table.display().to_string())
        })
        .and_then(|()| {
            rename(&staged_tpm, tpm_table)
                .with_context(|| tpm_table.display().to_string())
                .map_err(|err| {
                    let _ = remove_file(length_table);
                    err
                })
        });
    if result.is_err() {
        let _ = remove_file(&staged_lengths);
        let _ = remove_file(&staged_tpm);
    }
    result
}
