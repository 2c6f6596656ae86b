//! End-to-end pipeline tests with deterministic in-process providers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use grounded_rag::providers::{EmbeddingProvider, LlmProvider};
use grounded_rag::{
    Error, IngestStatus, MemoryIndex, QueryOutcome, QueryRequest, RagConfig, RagPipeline,
    RawDocument, Result,
};

const VOCAB: &[&str] = &[
    "fastapi",
    "framework",
    "web",
    "modern",
    "routes",
    "define",
    "decorators",
    "register",
    "handler",
    "usage",
    "intro",
];

/// Deterministic bag-of-words embedder over a fixed vocabulary.
///
/// Texts that share no vocabulary with a query get an all-zero vector and
/// therefore a cosine score of zero, which exercises the decline path.
struct VocabEmbedder;

fn vocab_vector(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    VOCAB
        .iter()
        .map(|term| words.iter().filter(|w| *w == term).count() as f32)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vocab_vector(text))
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }

    fn model_id(&self) -> &str {
        "vocab"
    }

    fn model_revision(&self) -> &str {
        "1"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "vocab"
    }
}

/// Embedder that always fails, for ingestion failure paths
struct DownEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::embedding("connection refused"))
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }

    fn model_id(&self) -> &str {
        "vocab"
    }

    fn model_revision(&self) -> &str {
        "1"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Language model returning a fixed response regardless of prompt
struct ScriptedLlm {
    response: String,
}

impl ScriptedLlm {
    fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

const GUIDE_TEXT: &str = "# Intro\n\
FastAPI is a modern web framework for building APIs.\n\
\n\
# Usage\n\
Define routes with decorators. Use @app.get to register a handler.\n";

fn guide_document() -> RawDocument {
    let usage_offset = GUIDE_TEXT.find("# Usage").unwrap();
    RawDocument::new("doc://guide.md", GUIDE_TEXT)
        .with_heading("Intro", 1, 0)
        .with_heading("Usage", 1, usage_offset)
}

fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embedding.retry_base_delay_ms = 1;
    config.embedding.max_retries = 1;
    config
}

fn pipeline_with(llm_response: &str) -> RagPipeline {
    init_tracing();
    RagPipeline::new(
        test_config(),
        Arc::new(VocabEmbedder),
        Arc::new(ScriptedLlm::new(llm_response)),
        Arc::new(MemoryIndex::new()),
    )
    .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn ingest_then_answer_with_citation_into_source_text() {
    let pipeline =
        pipeline_with("Define routes with decorators and register handlers with @app.get [1].");

    let receipt = pipeline.ingest(guide_document()).await.unwrap();
    assert_eq!(receipt.status, IngestStatus::New);
    assert_eq!(receipt.version, 1);
    // one chunk per section at the default chunk size
    assert_eq!(receipt.chunks_indexed, 2);

    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?"))
        .await;
    let answer = outcome.answer().expect("expected an answer");

    assert!(answer.grounded);
    assert!(answer.confidence > 0.0);
    assert_eq!(answer.citations.len(), 1);
    assert!(!answer.retrieved_chunk_ids.is_empty());

    // the citation resolves to an exact range of the ingested text
    let citation = &answer.citations[0];
    assert_eq!(citation.source_uri, "doc://guide.md");
    assert_eq!(citation.section_path, vec!["Usage".to_string()]);
    let document = pipeline.document(citation.document_id).unwrap();
    let cited = &document.raw_text[citation.char_start..citation.char_end];
    assert!(cited.contains("@app.get"));
    assert_eq!(citation.snippet, cited);
}

#[tokio::test]
async fn off_topic_query_is_declined() {
    let pipeline = pipeline_with("should never be used");
    pipeline.ingest(guide_document()).await.unwrap();

    let outcome = pipeline
        .answer(QueryRequest::new("What is the capital of France?"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Declined { .. }));
}

#[tokio::test]
async fn empty_index_declines() {
    let pipeline = pipeline_with("should never be used");
    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Declined { .. }));
}

#[tokio::test]
async fn model_refusal_becomes_declined() {
    let pipeline = pipeline_with("NO_ANSWER");
    pipeline.ingest(guide_document()).await.unwrap();

    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?"))
        .await;
    assert!(matches!(outcome, QueryOutcome::Declined { .. }));
}

#[tokio::test]
async fn uncited_answer_is_flagged_ungrounded() {
    let pipeline = pipeline_with("Routes are defined with decorators.");
    pipeline.ingest(guide_document()).await.unwrap();

    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?"))
        .await;
    let answer = outcome.answer().expect("expected an answer");
    assert!(!answer.grounded);
    assert!(answer.citations.is_empty());
    assert_eq!(answer.confidence, 0.0);
}

#[tokio::test]
async fn hallucinated_citation_identifiers_are_dropped() {
    let pipeline = pipeline_with("Use decorators [1]. Also see the appendix [9].");
    pipeline.ingest(guide_document()).await.unwrap();

    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?"))
        .await;
    let answer = outcome.answer().expect("expected an answer");
    // [9] points at a context block that was never supplied
    assert_eq!(answer.citations.len(), 1);
    assert!(answer.grounded);
}

#[tokio::test]
async fn embedding_failure_fails_ingestion_and_leaves_index_empty() {
    init_tracing();
    let pipeline = RagPipeline::new(
        test_config(),
        Arc::new(DownEmbedder {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(ScriptedLlm::new("unused")),
        Arc::new(MemoryIndex::new()),
    )
    .unwrap();

    let err = pipeline.ingest(guide_document()).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    assert!(err.is_transient());
    assert_eq!(pipeline.indexed_chunks().await.unwrap(), 0);
}

#[tokio::test]
async fn reingestion_versions_documents_and_stales_old_entries() {
    let pipeline = pipeline_with("Answer [1].");

    let first = pipeline.ingest(guide_document()).await.unwrap();
    assert_eq!(first.status, IngestStatus::New);

    // identical content is a no-op
    let unchanged = pipeline.ingest(guide_document()).await.unwrap();
    assert_eq!(unchanged.status, IngestStatus::Unchanged);
    assert_eq!(unchanged.document_id, first.document_id);
    assert_eq!(unchanged.chunks_indexed, 0);

    // changed content bumps the version under a fresh document id
    let updated_text = GUIDE_TEXT.replace("modern web framework", "fast web framework");
    let usage_offset = updated_text.find("# Usage").unwrap();
    let updated_doc = RawDocument::new("doc://guide.md", updated_text)
        .with_heading("Intro", 1, 0)
        .with_heading("Usage", 1, usage_offset);
    let updated = pipeline.ingest(updated_doc).await.unwrap();
    assert_eq!(updated.status, IngestStatus::Updated);
    assert_eq!(updated.version, 2);
    assert_ne!(updated.document_id, first.document_id);

    // only the new version is live; stale entries survive until compaction
    assert_eq!(pipeline.indexed_chunks().await.unwrap(), 2);
    assert_eq!(pipeline.compact().await.unwrap(), 2);

    // the superseded document still resolves for old citations
    let old = pipeline.document(first.document_id).unwrap();
    assert!(old.stale);
    assert_eq!(old.version, 1);
}

#[tokio::test]
async fn batch_ingestion_skips_bad_documents() {
    let pipeline = pipeline_with("Answer [1].");

    let good = guide_document();
    let empty = RawDocument::new("doc://empty.md", "   ");
    let bad_outline = RawDocument::new("doc://bad.md", "short text").with_heading("X", 1, 9999);
    // heading offset inside the two-byte 'é'
    let mid_char = RawDocument::new("doc://midchar.md", "é# A\nbody text\n").with_heading("A", 1, 1);

    let report = pipeline
        .ingest_batch(vec![good, empty, bad_outline, mid_char])
        .await;
    assert_eq!(report.receipts.len(), 1);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.total_chunks(), 2);
    assert!(report
        .failures
        .iter()
        .any(|f| f.source_uri == "doc://empty.md"));
    assert!(report
        .failures
        .iter()
        .any(|f| f.source_uri == "doc://midchar.md"));
}

#[tokio::test]
async fn concurrent_ingest_of_same_source_keeps_one_live_version() {
    let pipeline = pipeline_with("Answer [1].");

    let second_text = GUIDE_TEXT.replace("modern web framework", "small web framework");
    let usage_offset = second_text.find("# Usage").unwrap();
    let second = RawDocument::new("doc://guide.md", second_text)
        .with_heading("Intro", 1, 0)
        .with_heading("Usage", 1, usage_offset);

    let (a, b) = tokio::join!(pipeline.ingest(guide_document()), pipeline.ingest(second));
    let (a, b) = (a.unwrap(), b.unwrap());

    // whichever lands second sees the first and supersedes it
    let mut versions = [a.version, b.version];
    versions.sort_unstable();
    assert_eq!(versions, [1, 2]);
    assert_ne!(a.document_id, b.document_id);
    assert!(matches!(
        (a.status, b.status),
        (IngestStatus::New, IngestStatus::Updated) | (IngestStatus::Updated, IngestStatus::New)
    ));

    // exactly one version's chunks stay live
    assert_eq!(pipeline.indexed_chunks().await.unwrap(), 2);
    assert_eq!(pipeline.compact().await.unwrap(), 2);
}

#[tokio::test]
async fn corrected_outline_reindexes_unchanged_text() {
    let pipeline = pipeline_with("Answer [1].");

    // first pass without any structure
    let flat = RawDocument::new("doc://guide.md", GUIDE_TEXT);
    let first = pipeline.ingest(flat).await.unwrap();
    assert_eq!(first.status, IngestStatus::New);

    // same text with the outline supplied is a content change
    let corrected = pipeline.ingest(guide_document()).await.unwrap();
    assert_eq!(corrected.status, IngestStatus::Updated);
    assert_eq!(corrected.version, 2);
    assert_eq!(corrected.chunks_indexed, 2);
}

#[tokio::test]
async fn query_overrides_respected() {
    let pipeline = pipeline_with("Answer [1].");
    pipeline.ingest(guide_document()).await.unwrap();

    // an impossibly high threshold forces a decline even on topic
    let outcome = pipeline
        .answer(QueryRequest::new("How do I define routes?").with_min_similarity(0.999))
        .await;
    assert!(matches!(outcome, QueryOutcome::Declined { .. }));
}
