pub mod gene_length;
pub mod parse_gtf;
pub use gene_length::{resolve_gtf_path, ExtractionSummary, GeneLengths, GeneTargets};
