//! Sparse cell-by-gene UMI count matrix with a sample label per cell.

use crate::errors::PipelineError;
use anyhow::Result;
use itertools::Itertools;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct CountMatrix {
    cells: Vec<String>,
    genes: Vec<String>,
    samples: Vec<String>,
    /// cells x genes, CSR
    matrix: CsMat<u64>,
}

impl CountMatrix {
    /// Build a matrix from `(cell, gene, count)` triplets. Repeated
    /// coordinates are summed.
    pub fn from_triplets(
        cells: Vec<String>,
        genes: Vec<String>,
        samples: Vec<String>,
        triplets: impl IntoIterator<Item = (usize, usize, u64)>,
    ) -> Result<CountMatrix> {
        let mut tri: TriMat<u64> = TriMat::new((cells.len(), genes.len()));
        for (cell, gene, count) in triplets {
            if cell >= cells.len() {
                return Err(PipelineError::DimensionMismatch {
                    what: "cells",
                    expected: cells.len(),
                    found: cell + 1,
                }
                .into());
            }
            if gene >= genes.len() {
                return Err(PipelineError::DimensionMismatch {
                    what: "genes",
                    expected: genes.len(),
                    found: gene + 1,
                }
                .into());
            }
            if count > 0 {
                tri.add_triplet(cell, gene, count);
            }
        }
        CountMatrix::new(cells, genes, samples, tri.to_csr())
    }

    pub fn new(
        cells: Vec<String>,
        genes: Vec<String>,
        samples: Vec<String>,
        matrix: CsMat<u64>,
    ) -> Result<CountMatrix> {
        if samples.len() != cells.len() {
            return Err(PipelineError::DimensionMismatch {
                what: "sample labels",
                expected: cells.len(),
                found: samples.len(),
            }
            .into());
        }
        if matrix.rows() != cells.len() {
            return Err(PipelineError::DimensionMismatch {
                what: "matrix rows",
                expected: cells.len(),
                found: matrix.rows(),
            }
            .into());
        }
        if matrix.cols() != genes.len() {
            return Err(PipelineError::DimensionMismatch {
                what: "matrix columns",
                expected: genes.len(),
                found: matrix.cols(),
            }
            .into());
        }
        if let Some(i) = samples.iter().position(String::is_empty) {
            return Err(PipelineError::EmptySampleLabel {
                cell: cells[i].clone(),
            }
            .into());
        }
        let matrix = if matrix.is_csr() {
            matrix
        } else {
            matrix.into_csr()
        };
        Ok(CountMatrix {
            cells,
            genes,
            samples,
            matrix,
        })
    }

    /// Stack the cells of several matrices. Only genes present in every part
    /// are kept, in the order of the first part.
    pub fn concat(parts: Vec<CountMatrix>) -> Result<CountMatrix> {
        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Err(PipelineError::EmptyCountSources.into());
        };
        let rest: Vec<_> = parts.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let shared: HashSet<&str> = rest.iter().fold(
            first.genes.iter().map(String::as_str).collect(),
            |acc, part| {
                let genes: HashSet<&str> = part.genes.iter().map(String::as_str).collect();
                acc.intersection(&genes).copied().collect()
            },
        );
        let genes: Vec<String> = first
            .genes
            .iter()
            .filter(|g| shared.contains(g.as_str()))
            .cloned()
            .collect();
        let gene_idx: HashMap<&str, usize> = genes
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let all_parts = std::iter::once(&first).chain(&rest).collect::<Vec<_>>();
        let total_genes: usize = all_parts.iter().map(|p| p.num_genes()).sum();
        let kept = genes.len() * all_parts.len();
        if kept < total_genes {
            log::info!(
                "merging {} count matrices on {} shared genes",
                all_parts.len(),
                genes.len()
            );
        }

        let mut cells = Vec::new();
        let mut samples = Vec::new();
        let mut triplets = Vec::new();
        for part in all_parts {
            let offset = cells.len();
            let remap: Vec<Option<usize>> = part
                .genes
                .iter()
                .map(|g| gene_idx.get(g.as_str()).copied())
                .collect();
            for (cell, row) in part.matrix.outer_iterator().enumerate() {
                for (gene, &count) in row.iter() {
                    if let Some(new_gene) = remap[gene] {
                        triplets.push((offset + cell, new_gene, count));
                    }
                }
            }
            cells.extend(part.cells.iter().cloned());
            samples.extend(part.samples.iter().cloned());
        }

        CountMatrix::from_triplets(cells, genes, samples, triplets)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Sample label of each cell, parallel to `cells()`.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn matrix(&self) -> &CsMat<u64> {
        &self.matrix
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn get(&self, cell: usize, gene: usize) -> u64 {
        self.matrix.get(cell, gene).copied().unwrap_or(0)
    }

    /// Distinct sample labels in sorted order.
    pub fn distinct_samples(&self) -> Vec<&str> {
        self.samples
            .iter()
            .map(String::as_str)
            .sorted()
            .dedup()
            .collect()
    }
}

/// Rename repeated names in place: the first occurrence is left alone and
/// later ones get `-1`, `-2`, ... appended, skipping any suffixed name that is
/// already taken.
pub fn make_unique(names: &mut [String]) {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    if taken.len() == names.len() {
        return;
    }
    let mut seen = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    for name in names.iter_mut() {
        if seen.insert(name.clone()) {
            continue;
        }
        let suffix = next_suffix.entry(name.clone()).or_insert(1);
        let renamed = loop {
            let candidate = format!("{name}-{suffix}");
            *suffix += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(renamed.clone());
        *name = renamed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    fn dense(m: &CountMatrix) -> Vec<Vec<u64>> {
        (0..m.num_cells())
            .map(|c| (0..m.num_genes()).map(|g| m.get(c, g)).collect())
            .collect()
    }

    #[test]
    fn test_from_triplets() -> Result<()> {
        let m = CountMatrix::from_triplets(
            strings(&["c1", "c2"]),
            strings(&["A", "B", "C"]),
            strings(&["s1", "s1"]),
            vec![(0, 0, 3), (1, 2, 4), (0, 0, 2), (1, 1, 0)],
        )?;
        assert_eq!(dense(&m), vec![vec![5, 0, 0], vec![0, 0, 4]]);
        assert!(m.matrix().is_csr());
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let err = CountMatrix::from_triplets(
            strings(&["c1"]),
            strings(&["A"]),
            strings(&["s1"]),
            vec![(0, 1, 3)],
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::DimensionMismatch {
                what: "genes",
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_label_checks() {
        let err = CountMatrix::from_triplets(
            strings(&["c1", "c2"]),
            strings(&["A"]),
            strings(&["s1"]),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DimensionMismatch { what: "sample labels", .. })
        ));

        let err = CountMatrix::from_triplets(
            strings(&["c1", "c2"]),
            strings(&["A"]),
            strings(&["s1", ""]),
            vec![],
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::EmptySampleLabel { cell: "c2".into() })
        );
    }

    #[test]
    fn test_concat_inner_join() -> Result<()> {
        let a = CountMatrix::from_triplets(
            strings(&["c1"]),
            strings(&["A", "B", "C"]),
            strings(&["s1"]),
            vec![(0, 0, 1), (0, 1, 2), (0, 2, 3)],
        )?;
        let b = CountMatrix::from_triplets(
            strings(&["c1", "c2"]),
            strings(&["C", "D", "A"]),
            strings(&["s2", "s2"]),
            vec![(0, 0, 7), (0, 1, 8), (1, 2, 9)],
        )?;
        let m = CountMatrix::concat(vec![a, b])?;
        assert_eq!(m.genes(), &strings(&["A", "C"])[..]);
        assert_eq!(m.cells(), &strings(&["c1", "c1", "c2"])[..]);
        assert_eq!(m.samples(), &strings(&["s1", "s2", "s2"])[..]);
        assert_eq!(dense(&m), vec![vec![1, 3], vec![0, 7], vec![9, 0]]);
        assert_eq!(m.distinct_samples(), vec!["s1", "s2"]);
        Ok(())
    }

    #[test]
    fn test_concat_empty() {
        let err = CountMatrix::concat(vec![]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::EmptyCountSources)
        );
    }

    #[test]
    fn test_make_unique() {
        let mut names = strings(&["A", "B", "A", "A-1", "A", "B"]);
        make_unique(&mut names);
        assert_eq!(names, strings(&["A", "B", "A-2", "A-1", "A-3", "B-1"]));

        let mut unique = strings(&["X", "Y"]);
        make_unique(&mut unique);
        assert_eq!(unique, strings(&["X", "Y"]));
    }
}
