//! Extraction pipeline: per-file isolation, record assembly, and sequential or pooled runs.

mod assemble;
mod service;
mod types;

pub use assemble::{AssembleOptions, assemble_record};
pub use service::ExtractionPipeline;
pub use types::{ExecutionMode, FileError, SetupError};
