//! Read a 10x Genomics feature-barcode matrix folder (`matrix.mtx`,
//! `features.tsv` or the older `genes.tsv`, `barcodes.tsv`; each possibly
//! gzipped).

use super::{count_from_f64, find_in_dir, open_maybe_gz};
use crate::count_matrix::{make_unique, CountMatrix};
use crate::errors::PipelineError;
use anyhow::{Context, Result};
use log::info;
use sprs::io::{read_matrix_market_from_bufread, IoError};
use sprs::num_kinds::NumKind;
use sprs::TriMat;
use std::path::{Path, PathBuf};

const TENX_SUFFIX: &str = "_10X";

/// The sample label used for a 10x folder when none is given: the folder
/// name with a trailing `_10X` removed.
pub fn default_sample_name(dir: &Path) -> String {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(TENX_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => name,
    }
}

fn required_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    find_in_dir(dir, names).ok_or_else(|| {
        PipelineError::MissingInput {
            path: dir.join(names[0]),
        }
        .into()
    })
}

fn tsv_records(path: &Path) -> Result<csv::StringRecordsIntoIter<Box<dyn std::io::BufRead>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(open_maybe_gz(path)?)
        .into_records())
}

/// Gene symbols from the second column of `features.tsv`. A file with a
/// single column is taken to hold the names directly.
fn read_features(path: &Path) -> Result<Vec<String>> {
    let mut genes = Vec::new();
    for record in tsv_records(path)? {
        let record = record.with_context(|| path.display().to_string())?;
        let name = record.get(1).or_else(|| record.get(0)).unwrap_or_default();
        if name.is_empty() {
            return Err(PipelineError::MalformedCounts {
                path: path.to_path_buf(),
                line: record.position().map_or(0, |p| p.line() as usize),
                reason: "empty feature name".to_string(),
            }
            .into());
        }
        genes.push(name.to_string());
    }
    Ok(genes)
}

fn read_barcodes(path: &Path) -> Result<Vec<String>> {
    let mut barcodes = Vec::new();
    for record in tsv_records(path)? {
        let record = record.with_context(|| path.display().to_string())?;
        if let Some(bc) = record.get(0).map(str::trim).filter(|bc| !bc.is_empty()) {
            barcodes.push(bc.to_string());
        }
    }
    Ok(barcodes)
}

/// Parse a coordinate Matrix Market file of features x barcodes into
/// `(barcode, feature, count)` triplets, 0-based. Integer files are read
/// directly; real-valued files are accepted when every value is a whole
/// number.
fn read_mtx(
    path: &Path,
    num_features: usize,
    num_barcodes: usize,
) -> Result<Vec<(usize, usize, u64)>> {
    let malformed = |reason: String| PipelineError::MalformedMatrix {
        path: path.to_path_buf(),
        reason,
    };
    let to_error = |err: IoError| -> anyhow::Error {
        match err {
            IoError::Io(err) => anyhow::Error::new(err).context(path.display().to_string()),
            other => malformed(other.to_string()).into(),
        }
    };

    let integer: Result<TriMat<i64>, IoError> =
        read_matrix_market_from_bufread(&mut open_maybe_gz(path)?);
    let (shape, entries): ((usize, usize), Vec<(usize, usize, Option<u64>)>) = match integer {
        Ok(tri) => (
            tri.shape(),
            tri.triplet_iter()
                .map(|(&v, (row, col))| (row, col, u64::try_from(v).ok()))
                .collect(),
        ),
        Err(IoError::MismatchedMatrixMarketRead(_, NumKind::Float)) => {
            let tri: TriMat<f64> =
                read_matrix_market_from_bufread(&mut open_maybe_gz(path)?).map_err(&to_error)?;
            (
                tri.shape(),
                tri.triplet_iter()
                    .map(|(&v, (row, col))| (row, col, count_from_f64(v)))
                    .collect(),
            )
        }
        Err(err) => return Err(to_error(err)),
    };

    if shape.0 != num_features {
        return Err(PipelineError::DimensionMismatch {
            what: "matrix rows (features)",
            expected: num_features,
            found: shape.0,
        }
        .into());
    }
    if shape.1 != num_barcodes {
        return Err(PipelineError::DimensionMismatch {
            what: "matrix columns (barcodes)",
            expected: num_barcodes,
            found: shape.1,
        }
        .into());
    }

    entries
        .into_iter()
        .map(|(feature, barcode, count)| match count {
            Some(count) => Ok((barcode, feature, count)),
            None => Err(malformed(format!(
                "entry ({}, {}) is not a non-negative whole count",
                feature + 1,
                barcode + 1
            ))
            .into()),
        })
        .collect()
}

/// Load a 10x matrix folder. Every cell gets the label `sample`, or
/// [`default_sample_name`] of the folder. Duplicate gene symbols are made
/// unique with [`make_unique`].
pub fn read_10x_mtx(dir: &Path, sample: Option<&str>) -> Result<CountMatrix> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingInput {
            path: dir.to_path_buf(),
        }
        .into());
    }
    let features_path = required_file(dir, &["features.tsv", "genes.tsv"])?;
    let barcodes_path = required_file(dir, &["barcodes.tsv"])?;
    let matrix_path = required_file(dir, &["matrix.mtx"])?;

    let mut genes = read_features(&features_path)?;
    make_unique(&mut genes);
    let cells = read_barcodes(&barcodes_path)?;
    let triplets = read_mtx(&matrix_path, genes.len(), cells.len())?;

    let sample = sample.map_or_else(|| default_sample_name(dir), ToString::to_string);
    info!(
        "read {} cells x {} genes for sample {sample} from {}",
        cells.len(),
        genes.len(),
        dir.display()
    );
    let samples = vec![sample; cells.len()];
    CountMatrix::from_triplets(cells, genes, samples, triplets)
        .with_context(|| dir.display().to_string())
}
