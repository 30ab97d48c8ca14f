//! Total exonic length per gene symbol, read from a GTF file.
//!
//! Every `exon` line adds `|end - start| + 1` to its gene. Overlapping exons
//! from different transcripts of a gene are all counted, so the total is a
//! sum over exon records and not the length of the merged exon intervals.

use crate::parse_gtf::parse_gtf_line;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Which gene symbols to accumulate lengths for.
#[derive(Debug, Clone, Copy)]
pub enum GeneTargets<'a> {
    All,
    Only(&'a HashSet<String>),
}

impl GeneTargets<'_> {
    fn contains(&self, gene: &str) -> bool {
        match self {
            GeneTargets::All => true,
            GeneTargets::Only(genes) => genes.contains(gene),
        }
    }
}

/// Line counts collected while reading a GTF file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Non-comment, non-blank lines.
    pub records: usize,
    /// Lines skipped because they did not parse.
    pub malformed: usize,
    /// Exon records that contributed to a gene length.
    pub exons_used: usize,
}

/// Map from gene symbol to total exon length. A symbol is only present if at
/// least one exon contributed to it, so every stored length is at least 1.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeneLengths {
    lengths: BTreeMap<String, u64>,
}

impl GeneLengths {
    /// Accumulate exon lengths from GTF text.
    pub fn from_reader(
        reader: impl BufRead,
        targets: GeneTargets<'_>,
    ) -> Result<(GeneLengths, ExtractionSummary)> {
        let mut lengths = BTreeMap::new();
        let mut summary = ExtractionSummary::default();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading GTF line {}", line_num + 1))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            summary.records += 1;

            let rec = match parse_gtf_line(line) {
                Ok(rec) => rec,
                Err(err) => {
                    debug!("skipping GTF line {}: {err}", line_num + 1);
                    summary.malformed += 1;
                    continue;
                }
            };
            if !rec.is_exon() {
                continue;
            }
            let Some(gene) = rec.gene_name() else {
                continue;
            };
            if !targets.contains(gene) {
                continue;
            }

            *lengths.entry(gene.to_string()).or_insert(0) += rec.len();
            summary.exons_used += 1;
        }

        if summary.malformed > 0 {
            warn!(
                "skipped {} of {} GTF records that did not have {} valid columns",
                summary.malformed,
                summary.records,
                crate::parse_gtf::GTF_FIELDS
            );
        }
        info!(
            "computed exon lengths for {} genes from {} exon records",
            lengths.len(),
            summary.exons_used
        );

        Ok((GeneLengths { lengths }, summary))
    }

    /// Read a possibly-compressed GTF file. See [`resolve_gtf_path`].
    pub fn from_gtf_path(
        path: &Path,
        targets: GeneTargets<'_>,
    ) -> Result<(GeneLengths, ExtractionSummary)> {
        let resolved = resolve_gtf_path(path)
            .with_context(|| format!("GTF file not found: {}", path.display()))?;
        let file = File::open(&resolved).with_context(|| resolved.display().to_string())?;
        let result = if is_gzipped(&resolved) {
            GeneLengths::from_reader(BufReader::new(MultiGzDecoder::new(file)), targets)
        } else {
            GeneLengths::from_reader(BufReader::new(file), targets)
        };
        result.with_context(|| resolved.display().to_string())
    }

    pub fn get(&self, gene: &str) -> Option<u64> {
        self.lengths.get(gene).copied()
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.lengths.contains_key(gene)
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Iterate over `(gene, length)` in gene symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.lengths.iter().map(|(gene, &len)| (gene.as_str(), len))
    }
}

impl FromIterator<(String, u64)> for GeneLengths {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        GeneLengths {
            lengths: iter.into_iter().filter(|(_, len)| *len > 0).collect(),
        }
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Locate a GTF file. The path is used as-is when it exists; otherwise the
/// gzipped sibling `<path>.gz` is tried.
pub fn resolve_gtf_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let mut gz = path.as_os_str().to_owned();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    gz.is_file().then_some(gz)
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const GTF: &str = "\
#!genome-build GRCh38.p14
1\thavana\tgene\t11869\t14409\t.\t+\t.\tgene_id \"ENSG00000290825\"; gene_name \"DDX11L2\";
1\thavana\texon\t11869\t12227\t.\t+\t.\tgene_id \"ENSG00000290825\"; transcript_id \"ENST00000456328\"; gene_name \"DDX11L2\";
1\thavana\texon\t12613\t12721\t.\t+\t.\tgene_id \"ENSG00000290825\"; transcript_id \"ENST00000456328\"; gene_name \"DDX11L2\";
1\thavana\texon\t12010\t12057\t.\t+\t.\tgene_id \"ENSG00000223972\"; transcript_id \"ENST00000450305\"; gene_name \"DDX11L1\";
1\thavana\tCDS\t12010\t12057\t.\t+\t0\tgene_id \"ENSG00000223972\"; gene_name \"DDX11L1\";
1\thavana\texon\t14404\t14501\t.\t-\t.\tgene_id \"ENSG00000227232\"; transcript_id \"ENST00000488147\";
";

    fn targets(genes: &[&str]) -> HashSet<String> {
        genes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_sum_exons() -> Result<()> {
        let (lengths, summary) = GeneLengths::from_reader(GTF.as_bytes(), GeneTargets::All)?;
        assert_eq!(lengths.get("DDX11L2"), Some((12227 - 11869 + 1) + (12721 - 12613 + 1)));
        assert_eq!(lengths.get("DDX11L1"), Some(12057 - 12010 + 1));
        assert_eq!(lengths.len(), 2);
        assert_eq!(
            summary,
            ExtractionSummary {
                records: 6,
                malformed: 0,
                exons_used: 3,
            }
        );
        Ok(())
    }

    #[test]
    fn test_targets_filter() -> Result<()> {
        let wanted = targets(&["DDX11L1", "NOT_THERE"]);
        let (lengths, _) = GeneLengths::from_reader(GTF.as_bytes(), GeneTargets::Only(&wanted))?;
        assert_eq!(
            lengths.iter().collect::<Vec<_>>(),
            vec![("DDX11L1", 48)]
        );
        assert!(!lengths.contains("NOT_THERE"));
        Ok(())
    }

    #[test]
    fn overlapping_exons_are_not_merged() -> Result<()> {
        let gtf = "\
chr1\tsrc\texon\t100\t199\t.\t+\t.\tgene_name \"A\"; transcript_id \"t1\";
chr1\tsrc\texon\t150\t249\t.\t+\t.\tgene_name \"A\"; transcript_id \"t2\";
chr1\tsrc\texon\t100\t199\t.\t+\t.\tgene_name \"A\"; transcript_id \"t3\";
";
        let (lengths, _) = GeneLengths::from_reader(gtf.as_bytes(), GeneTargets::All)?;
        assert_eq!(lengths.get("A"), Some(300));
        Ok(())
    }

    #[test]
    fn malformed_lines_are_skipped() -> Result<()> {
        let gtf = "\
chr1\tsrc\texon\t100\t199\t.\t+\tgene_name \"A\";
chr1\tsrc\texon\t1x\t199\t.\t+\t.\tgene_name \"A\";
chr1\tsrc\texon\t1\t10\t.\t+\t.\tgene_name \"B\";

";
        let (lengths, summary) = GeneLengths::from_reader(gtf.as_bytes(), GeneTargets::All)?;
        assert!(!lengths.contains("A"));
        assert_eq!(lengths.get("B"), Some(10));
        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.records, 3);
        Ok(())
    }

    #[test]
    fn from_iter_drops_zero_lengths() {
        let lengths: GeneLengths = [("A".to_string(), 10), ("B".to_string(), 0)]
            .into_iter()
            .collect();
        assert_eq!(lengths.len(), 1);
        assert!(!lengths.contains("B"));
    }

    #[test]
    fn test_gz_fallback() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let gz_path = dir.path().join("genes.gtf.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path)?, Compression::fast());
        encoder.write_all(GTF.as_bytes())?;
        encoder.finish()?;

        let plain_path = dir.path().join("genes.gtf");
        assert_eq!(resolve_gtf_path(&plain_path), Some(gz_path.clone()));
        let (lengths, _) = GeneLengths::from_gtf_path(&plain_path, GeneTargets::All)?;
        assert_eq!(lengths.get("DDX11L1"), Some(48));

        let (direct, _) = GeneLengths::from_gtf_path(&gz_path, GeneTargets::All)?;
        assert_eq!(direct, lengths);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.gtf");
        assert_eq!(resolve_gtf_path(&missing), None);
        let err = GeneLengths::from_gtf_path(&missing, GeneTargets::All).unwrap_err();
        assert!(err.to_string().starts_with("GTF file not found"));
    }
}
