//! # grounded-rag
//!
//! Retrieval-augmented question answering over technical documentation,
//! with verifiable citations back into the source text.
//!
//! Documents go through normalization, structure-aware chunking and
//! embedding into a vector index; queries retrieve the most similar chunks
//! and a language model synthesizes an answer constrained to that context.
//! Every claim carries a citation resolving to an exact character range of
//! an ingested document, and the pipeline declines rather than fabricate
//! when nothing relevant is indexed.
//!
//! ## Quick start
//!
//! ```no_run
//! use grounded_rag::{QueryRequest, RagConfig, RagPipeline, RawDocument};
//!
//! # async fn run() -> grounded_rag::Result<()> {
//! let pipeline = RagPipeline::connect_ollama(RagConfig::default())?;
//!
//! let doc = RawDocument::new("doc://guide.md", "# Guide\nUse the router.\n")
//!     .with_heading("Guide", 1, 0);
//! pipeline.ingest(doc).await?;
//!
//! let outcome = pipeline.answer(QueryRequest::new("How do I use the router?")).await;
//! if let Some(answer) = outcome.answer() {
//!     println!("{} ({} citations)", answer.text, answer.citations.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::RagConfig;
pub use embedding::EmbedderAdapter;
pub use error::{Error, Result};
pub use index::{IndexEntry, MemoryIndex, SearchHit, SearchQuery, VectorIndex};
pub use ingestion::{Chunker, NormalizedDocument, Normalizer};
pub use pipeline::RagPipeline;
pub use providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
pub use retrieval::{RetrievalOptions, RetrievalOutcome, RetrievalResult, Retriever};
pub use types::{
    Answer, Chunk, Citation, Document, IngestReceipt, IngestReport, IngestStatus, QueryOutcome,
    QueryRequest, QueryState, RawDocument, Section,
};
