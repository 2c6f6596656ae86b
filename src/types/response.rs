//! Answer, citation and ingestion receipt types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pointer from an answer back to the supporting source text.
///
/// `char_start..char_end` is a range into the canonical text of the cited
/// document version, suitable for exact highlighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Cited chunk
    pub chunk_id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// Source location of the document
    pub source_uri: String,
    /// Heading breadcrumb of the cited section
    pub section_path: Vec<String>,
    /// Start of the supporting span in the document's canonical text
    pub char_start: usize,
    /// End of the supporting span (exclusive)
    pub char_end: usize,
    /// The supporting text itself
    pub snippet: String,
    /// Retrieval similarity of the cited chunk
    pub score: f32,
}

/// A grounded answer to a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text as produced by the language model
    pub text: String,
    /// Citations in the order the model referenced them
    pub citations: Vec<Citation>,
    /// Every chunk supplied to the synthesizer, for auditability
    pub retrieved_chunk_ids: Vec<Uuid>,
    /// False when the model made claims without any valid citation; the
    /// caller should warn rather than present the answer as authoritative
    pub grounded: bool,
    /// Mean similarity of the cited chunks (0.0 when ungrounded)
    pub confidence: f32,
    /// Wall-clock time spent answering, in milliseconds
    pub elapsed_ms: u64,
}

/// Terminal outcome of a query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// An answer was produced, possibly flagged ungrounded
    Answered(Answer),
    /// No relevant context was found; no answer was attempted
    Declined {
        /// Human-readable explanation
        reason: String,
    },
    /// The query failed
    Failed {
        /// Human-readable explanation
        reason: String,
        /// Whether retrying the query later may succeed
        retryable: bool,
    },
}

impl QueryOutcome {
    /// Declined outcome with the standard no-grounding message
    pub fn no_relevant_context() -> Self {
        Self::Declined {
            reason: "No relevant context found in the indexed documents for this question."
                .to_string(),
        }
    }

    /// The answer, when one was produced
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered(answer) => Some(answer),
            _ => None,
        }
    }
}

/// How an ingestion request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// First version of this source
    New,
    /// New version indexed; the previous version was marked stale
    Updated,
    /// Content hash unchanged; nothing was done
    Unchanged,
}

/// Receipt for one ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Document ID (the existing one for `Unchanged`)
    pub document_id: Uuid,
    /// Document version
    pub version: u32,
    /// Chunks indexed for this version (0 for `Unchanged`)
    pub chunks_indexed: usize,
    /// Resolution of the request
    pub status: IngestStatus,
}

/// Per-document failure inside a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Source that failed
    pub source_uri: String,
    /// Error message
    pub error: String,
}

/// Outcome of a concurrent batch ingestion; failures never abort the batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Receipts for documents that were processed
    pub receipts: Vec<IngestReceipt>,
    /// Documents that were skipped with an error
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Total chunks indexed across the batch
    pub fn total_chunks(&self) -> usize {
        self.receipts.iter().map(|r| r.chunks_indexed).sum()
    }
}
