use std::path::PathBuf;

/// Failures that abort a pipeline run. Wrapped in `anyhow::Error` on the way
/// out; use `downcast_ref::<PipelineError>()` to match on them.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("The required input {path:?} does not exist.")]
    MissingInput { path: PathBuf },

    #[error("No count matrix was specified. Provide at least one 10x directory or counts TSV.")]
    EmptyCountSources,

    #[error(
        "Gene '{gene}' has a length of {length} bases. Every gene used for TPM \
         normalization needs a positive length."
    )]
    InvalidLength { gene: String, length: u64 },

    #[error("Parsing line {line} of {path:?}: {reason}")]
    MalformedCounts {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Could not read the Matrix Market file {path:?}: {reason}")]
    MalformedMatrix { path: PathBuf, reason: String },

    #[error("Expected {expected} {what} but found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Cell {cell} has an empty sample label.")]
    EmptySampleLabel { cell: String },
}
