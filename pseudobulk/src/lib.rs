//! Pseudo-bulk TPM: sum single-cell counts per sample, annotate genes with
//! their exon length and normalize to transcripts per million.

pub mod aggregate;
pub mod config;
pub mod count_matrix;
mod errors;
pub mod io;
pub mod pipeline;
pub mod tpm;

pub use config::{CountSource, PipelineConfig};
pub use errors::PipelineError;
pub use pipeline::{run, PipelineOutputs};
