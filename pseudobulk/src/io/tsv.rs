//! Tab-separated tables: a dense cell x gene count matrix on the way in,
//! the length-annotated counts and TPM tables on the way out.

use super::{open_maybe_gz, parse_count};
use crate::count_matrix::{make_unique, CountMatrix};
use crate::errors::PipelineError;
use crate::tpm::{AnnotatedCounts, TpmTable};
use anyhow::{Context, Result};
use log::info;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const LENGTH_COLUMN: &str = "length";

/// Read a dense count table. The first column holds cell IDs, the column
/// named `sample_column` holds the sample label of each cell and every other
/// column is a gene. Repeated gene headers are made unique with [`make_unique`].
pub fn read_dense_tsv(path: &Path, sample_column: &str) -> Result<CountMatrix> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        }
        .into());
    }
    let malformed = |line: usize, reason: String| PipelineError::MalformedCounts {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(open_maybe_gz(path)?);
    let headers = rdr
        .headers()
        .with_context(|| path.display().to_string())?
        .clone();
    let sample_idx = match headers.iter().position(|h| h == sample_column) {
        Some(i) if i > 0 => i,
        _ => {
            return Err(malformed(1, format!("no sample column named '{sample_column}'")).into())
        }
    };
    let gene_cols: Vec<usize> = (1..headers.len()).filter(|&i| i != sample_idx).collect();
    let mut genes: Vec<String> = gene_cols.iter().map(|&i| headers[i].to_string()).collect();
    make_unique(&mut genes);

    let mut cells = Vec::new();
    let mut samples = Vec::new();
    let mut triplets = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let line = row + 2;
        let record = record.with_context(|| format!("{} line {line}", path.display()))?;
        let sample = record[sample_idx].trim();
        if sample.is_empty() {
            return Err(malformed(line, "empty sample label".to_string()).into());
        }
        for (gene, &col) in gene_cols.iter().enumerate() {
            let value = &record[col];
            let Some(count) = parse_count(value) else {
                return Err(malformed(
                    line,
                    format!(
                        "column '{}': expected a non-negative count, not '{value}'",
                        genes[gene]
                    ),
                )
                .into());
            };
            if count > 0 {
                triplets.push((cells.len(), gene, count));
            }
        }
        cells.push(record[0].to_string());
        samples.push(sample.to_string());
    }

    info!(
        "read {} cells x {} genes from {}",
        cells.len(),
        genes.len(),
        path.display()
    );
    CountMatrix::from_triplets(cells, genes, samples, triplets)
        .with_context(|| path.display().to_string())
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).with_context(|| parent.display().to_string())?;
    }
    let file = File::create(path).with_context(|| path.display().to_string())?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file)))
}

fn finish(path: &Path, wtr: csv::Writer<BufWriter<File>>) -> Result<()> {
    let mut inner = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e.error()))?;
    inner.flush().with_context(|| path.display().to_string())?;
    Ok(())
}

/// Write the gene x sample counts with a trailing `length` column. The header
/// cell above the gene names is left empty.
pub fn write_annotated_counts(path: &Path, table: &AnnotatedCounts) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(
        std::iter::once("")
            .chain(table.samples().iter().map(String::as_str))
            .chain(std::iter::once(LENGTH_COLUMN)),
    )?;
    for ((gene, counts), length) in table
        .genes()
        .iter()
        .zip(table.counts().rows())
        .zip(table.lengths())
    {
        wtr.write_record(
            std::iter::once(gene.clone())
                .chain(counts.iter().map(u64::to_string))
                .chain(std::iter::once(length.to_string())),
        )?;
    }
    finish(path, wtr)
}

/// Write the gene x sample TPM values.
pub fn write_tpm(path: &Path, table: &TpmTable) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(std::iter::once("").chain(table.samples().iter().map(String::as_str)))?;
    for (gene, values) in table.genes().iter().zip(table.values().rows()) {
        wtr.write_record(
            std::iter::once(gene.clone()).chain(values.iter().map(f64::to_string)),
        )?;
    }
    finish(path, wtr)
}
