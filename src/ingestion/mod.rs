//! Document ingestion: normalization and chunking

pub mod chunker;
pub mod normalizer;

pub use chunker::Chunker;
pub use normalizer::{NormalizedDocument, Normalizer};
