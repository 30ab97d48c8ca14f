//! Pseudo-bulk aggregation: sum the counts of all cells sharing a sample
//! label.

use crate::count_matrix::CountMatrix;
use crate::tpm::AnnotatedCounts;
use anyhow::Result;
use ndarray::{Array2, Axis};
use std::collections::HashMap;
use transcriptome::GeneLengths;

/// Summed counts, one row per sample (sorted by label), one column per gene.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoBulk {
    samples: Vec<String>,
    genes: Vec<String>,
    /// samples x genes
    counts: Array2<u64>,
}

impl PseudoBulk {
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    /// Transpose to genes x samples and keep only the genes that have a
    /// length, in count-matrix gene order. Returns the table and the names of
    /// the genes that were dropped for lack of a length.
    pub fn annotate(&self, lengths: &GeneLengths) -> Result<(AnnotatedCounts, Vec<String>)> {
        let (kept, dropped): (Vec<_>, Vec<_>) = self
            .genes
            .iter()
            .enumerate()
            .partition(|(_, gene)| lengths.contains(gene));

        let gene_idx: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
        let counts = self.counts.select(Axis(1), &gene_idx).reversed_axes();
        let genes: Vec<String> = kept.iter().map(|(_, g)| (*g).clone()).collect();
        let gene_lengths = genes
            .iter()
            .map(|g| lengths.get(g).unwrap_or_default())
            .collect();
        let dropped = dropped.into_iter().map(|(_, g)| g.clone()).collect();

        let table = AnnotatedCounts::new(genes, self.samples.clone(), counts, gene_lengths)?;
        Ok((table, dropped))
    }
}

/// Sum the rows of `matrix` by sample label.
pub fn aggregate(matrix: &CountMatrix) -> PseudoBulk {
    let samples: Vec<String> = matrix
        .distinct_samples()
        .into_iter()
        .map(String::from)
        .collect();
    let sample_idx: HashMap<&str, usize> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let mut counts = Array2::<u64>::zeros((samples.len(), matrix.num_genes()));
    for (cell, row) in matrix.matrix().outer_iterator().enumerate() {
        let s = sample_idx[matrix.samples()[cell].as_str()];
        for (gene, &count) in row.iter() {
            counts[[s, gene]] += count;
        }
    }

    PseudoBulk {
        samples,
        genes: matrix.genes().to_vec(),
        counts,
    }
}
