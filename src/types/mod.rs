//! Core data types shared across the pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, OutlineHeading, RawDocument, Section};
pub use query::{QueryRequest, QueryState};
pub use response::{
    Answer, Citation, IngestFailure, IngestReceipt, IngestReport, IngestStatus, QueryOutcome,
};
