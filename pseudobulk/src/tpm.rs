//! Transcripts-per-million normalization of a gene x sample count table.
//!
//! For each sample, reads per kilobase are `count / (length / 1000)` and
//! TPM is `rpk / (sum(rpk) / 1e6)`, so every sample with any counts sums to
//! one million over the genes in the table.

use crate::errors::PipelineError;
use anyhow::Result;
use log::warn;
use ndarray::{Array1, Array2, Axis};

const PER_MILLION: f64 = 1e6;
const BASES_PER_KB: f64 = 1000.0;

/// Pseudo-bulk counts with genes as rows, restricted to genes that have an
/// annotated exon length.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedCounts {
    genes: Vec<String>,
    samples: Vec<String>,
    /// genes x samples
    counts: Array2<u64>,
    lengths: Vec<u64>,
}

impl AnnotatedCounts {
    pub fn new(
        genes: Vec<String>,
        samples: Vec<String>,
        counts: Array2<u64>,
        lengths: Vec<u64>,
    ) -> Result<AnnotatedCounts> {
        let (rows, cols) = counts.dim();
        for (what, expected, found) in [
            ("gene rows", genes.len(), rows),
            ("sample columns", samples.len(), cols),
            ("gene lengths", genes.len(), lengths.len()),
        ] {
            if expected != found {
                return Err(PipelineError::DimensionMismatch {
                    what,
                    expected,
                    found,
                }
                .into());
            }
        }
        Ok(AnnotatedCounts {
            genes,
            samples,
            counts,
            lengths,
        })
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn lengths(&self) -> &[u64] {
        &self.lengths
    }

    /// Fail on the first gene whose length cannot be used as a divisor.
    pub fn check_lengths(&self) -> Result<(), PipelineError> {
        match self
            .genes
            .iter()
            .zip(&self.lengths)
            .find(|(_, &length)| length == 0)
        {
            Some((gene, &length)) => Err(PipelineError::InvalidLength {
                gene: gene.clone(),
                length,
            }),
            None => Ok(()),
        }
    }
}

/// TPM values, genes x samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TpmTable {
    genes: Vec<String>,
    samples: Vec<String>,
    values: Array2<f64>,
}

impl TpmTable {
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column_sums(&self) -> Vec<f64> {
        self.values.sum_axis(Axis(0)).to_vec()
    }
}

/// Compute TPM for every gene and sample. A zero gene length is an error;
/// a sample without any counts on the table's genes gets a column of zeros.
pub fn tpm(table: &AnnotatedCounts) -> Result<TpmTable, PipelineError> {
    table.check_lengths()?;

    let kilobases: Array1<f64> = table
        .lengths
        .iter()
        .map(|&len| len as f64 / BASES_PER_KB)
        .collect();
    let mut values = table.counts.mapv(|c| c as f64);
    values /= &kilobases.insert_axis(Axis(1));

    for (mut column, sample) in values.axis_iter_mut(Axis(1)).zip(&table.samples) {
        let total = column.sum();
        if total > 0.0 {
            let scale = total / PER_MILLION;
            column.mapv_inplace(|rpk| rpk / scale);
        } else {
            warn!("sample {sample} has no counts on annotated genes; its TPM values are all 0");
        }
    }

    Ok(TpmTable {
        genes: table.genes.clone(),
        samples: table.samples.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn test_two_samples() -> Result<()> {
        let table = AnnotatedCounts::new(
            strings(&["A", "B"]),
            strings(&["s1", "s2"]),
            array![[10, 20], [5, 5]],
            vec![2000, 1000],
        )?;
        let out = tpm(&table)?;
        assert_eq!(out.genes(), table.genes());
        assert_eq!(out.samples(), table.samples());
        let v = out.values();
        assert!(close(v[[0, 0]], 500_000.0));
        assert!(close(v[[1, 0]], 500_000.0));
        assert!(close(v[[0, 1]], 2.0 / 3.0 * 1e6));
        assert!(close(v[[1, 1]], 1.0 / 3.0 * 1e6));
        for sum in out.column_sums() {
            assert!(close(sum, 1e6));
        }
        Ok(())
    }

    #[test]
    fn test_zero_length() -> Result<()> {
        let table = AnnotatedCounts::new(
            strings(&["A", "B", "C"]),
            strings(&["s1"]),
            array![[1], [2], [3]],
            vec![100, 0, 0],
        )?;
        assert_eq!(
            tpm(&table).unwrap_err(),
            PipelineError::InvalidLength {
                gene: "B".to_string(),
                length: 0
            }
        );
        Ok(())
    }

    #[test]
    fn test_empty_sample() -> Result<()> {
        let table = AnnotatedCounts::new(
            strings(&["A", "B"]),
            strings(&["s1", "s2"]),
            array![[0, 4], [0, 0]],
            vec![100, 100],
        )?;
        let out = tpm(&table)?;
        assert_eq!(out.values().column(0).to_vec(), vec![0.0, 0.0]);
        assert!(close(out.values()[[0, 1]], 1e6));
        assert_eq!(out.values()[[1, 1]], 0.0);
        Ok(())
    }

    #[test]
    fn test_shape_checks() {
        let err = AnnotatedCounts::new(
            strings(&["A", "B"]),
            strings(&["s1"]),
            array![[1], [2]],
            vec![100],
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::DimensionMismatch {
                what: "gene lengths",
                expected: 2,
                found: 1
            })
        );
    }

    proptest! {
        #[test]
        fn columns_sum_to_a_million(
            rows in prop::collection::vec(
                (1u64..100_000, prop::collection::vec(0u64..10_000, 3)),
                1..40,
            )
        ) {
            let genes: Vec<String> = (0..rows.len()).map(|i| format!("G{i}")).collect();
            let lengths: Vec<u64> = rows.iter().map(|(len, _)| *len).collect();
            let mut counts = Array2::zeros((rows.len(), 3));
            for (i, (_, row)) in rows.iter().enumerate() {
                for (j, &c) in row.iter().enumerate() {
                    counts[[i, j]] = c;
                }
            }
            let table = AnnotatedCounts::new(genes, strings(&["a", "b", "c"]), counts, lengths).unwrap();
            let out = tpm(&table).unwrap();
            let totals = table.counts().sum_axis(Axis(0));
            for (sum, total) in out.column_sums().into_iter().zip(totals.iter()) {
                if *total > 0 {
                    prop_assert!(close(sum, 1e6), "column sum {}", sum);
                } else {
                    prop_assert_eq!(sum, 0.0);
                }
            }
            prop_assert!(out.values().iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }
}
