//! Readers for count matrices and writers for the output tables.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub mod tenx;
pub mod tsv;

/// Open a file for reading, decompressing it if the name ends in `.gz`.
pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| path.display().to_string())?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Return the first of `names` that exists in `dir`, trying the gzipped
/// name before the plain one.
pub(crate) fn find_in_dir(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .flat_map(|name| [dir.join(format!("{name}.gz")), dir.join(name)])
        .find(|path| path.is_file())
}

/// Parse a non-negative count. Integral floats such as `3.0` are accepted
/// because table writers often emit summed counts as floats.
pub(crate) fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u64>() {
        return Some(count);
    }
    count_from_f64(value.parse::<f64>().ok()?)
}

/// A float that holds a whole, non-negative number.
pub(crate) fn count_from_f64(float: f64) -> Option<u64> {
    (float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64)
        .then_some(float as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("3.0"), Some(3));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("NaN"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(count_from_f64(4.0), Some(4));
        assert_eq!(count_from_f64(-0.5), None);
    }

    #[test]
    fn test_find_in_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(find_in_dir(dir.path(), &["features.tsv", "genes.tsv"]), None);
        std::fs::write(dir.path().join("genes.tsv"), "")?;
        assert_eq!(
            find_in_dir(dir.path(), &["features.tsv", "genes.tsv"]),
            Some(dir.path().join("genes.tsv"))
        );
        std::fs::write(dir.path().join("features.tsv.gz"), "")?;
        assert_eq!(
            find_in_dir(dir.path(), &["features.tsv", "genes.tsv"]),
            Some(dir.path().join("features.tsv.gz"))
        );
        Ok(())
    }
}
