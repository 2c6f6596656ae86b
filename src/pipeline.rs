//! Pipeline orchestration: ingestion, versioning and grounded answering
//!
//! The pipeline owns the document registry and wires the normalizer,
//! chunker, embedder, index, retriever and language model together. Each
//! query runs through a small state machine
//! (`Received -> Embedding -> Retrieving -> Synthesizing`) that always
//! terminates in `Answered`, `Declined` or `Failed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::embedding::EmbedderAdapter;
use crate::error::{Error, Result};
use crate::generation::{is_refusal, link_citations, PromptBuilder};
use crate::index::{IndexEntry, MemoryIndex, VectorIndex};
use crate::ingestion::{Chunker, Normalizer};
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::retrieval::{RetrievalOptions, RetrievalOutcome, Retriever};
use crate::types::{
    Answer, Document, IngestFailure, IngestReceipt, IngestReport, IngestStatus, QueryOutcome,
    QueryRequest, QueryState, RawDocument,
};

/// The assembled RAG pipeline
pub struct RagPipeline {
    config: RagConfig,
    normalizer: Normalizer,
    chunker: Chunker,
    embedder: Arc<EmbedderAdapter>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    llm: Arc<dyn LlmProvider>,
    /// Every ingested document version, stale ones included, so citations
    /// issued against old versions keep resolving
    documents: DashMap<Uuid, Document>,
    /// Live document per source URI
    latest_by_uri: DashMap<String, Uuid>,
    /// Per-URI locks serializing ingestion of the same source, so version
    /// reads and bumps cannot race
    ingest_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RagPipeline {
    /// Assemble a pipeline from its parts
    pub fn new(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;
        let embedder = Arc::new(EmbedderAdapter::new(
            embedding_provider,
            config.embedding.clone(),
        ));
        let retriever = Retriever::new(embedder.clone(), index.clone(), config.retrieval.clone());
        Ok(Self {
            chunker: Chunker::new(&config.chunking),
            normalizer: Normalizer::new(),
            embedder,
            index,
            retriever,
            llm,
            documents: DashMap::new(),
            latest_by_uri: DashMap::new(),
            ingest_locks: DashMap::new(),
            config,
        })
    }

    /// Assemble a pipeline against an Ollama server with an in-memory index
    pub fn connect_ollama(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::connect(&config.llm)?;
        Self::new(
            config,
            Arc::new(embedder),
            Arc::new(llm),
            Arc::new(MemoryIndex::new()),
        )
    }

    /// Ingest one document.
    ///
    /// Unchanged content (same hash as the live version of the same source)
    /// is a no-op. Changed content gets a fresh document with a bumped
    /// version; entries of the previous version are marked stale only after
    /// the new version is fully indexed, so queries never observe a gap.
    /// If embedding fails the index is left untouched for this document.
    pub async fn ingest(&self, raw: RawDocument) -> Result<IngestReceipt> {
        let normalized = self.normalizer.normalize(&raw)?;

        // concurrent ingests of the same source run one at a time; two
        // racing writers would otherwise both index as the same version
        // with neither marking the other stale
        let uri_lock = self
            .ingest_locks
            .entry(normalized.source_uri.clone())
            .or_default()
            .clone();
        let _guard = uri_lock.lock().await;

        let previous = self
            .latest_by_uri
            .get(&normalized.source_uri)
            .and_then(|id| self.documents.get(&*id))
            .map(|doc| (doc.id, doc.version, doc.content_hash.clone()));

        if let Some((id, version, hash)) = &previous {
            if *hash == normalized.content_hash {
                tracing::debug!(source_uri = %normalized.source_uri, "content unchanged, skipping");
                return Ok(IngestReceipt {
                    document_id: *id,
                    version: *version,
                    chunks_indexed: 0,
                    status: IngestStatus::Unchanged,
                });
            }
        }

        let version = previous.as_ref().map(|(_, v, _)| v + 1).unwrap_or(1);
        let document = normalized.into_document(version);
        let chunks = self.chunker.chunk_document(&document);
        if chunks.is_empty() {
            return Err(Error::malformed(
                &document.source_uri,
                "document produced no chunks",
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let deadline = Duration::from_secs(self.config.processing.document_timeout_secs);
        let vectors = timeout(deadline, self.embedder.embed_texts(&texts))
            .await
            .map_err(|_| Error::embedding("document embedding timed out"))??;

        let fingerprint = self.embedder.fingerprint();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .filter_map(|(mut chunk, vector)| {
                chunk.embedding = Some(vector);
                IndexEntry::from_chunk(&chunk, &document.source_uri, version, &fingerprint)
            })
            .collect();
        let chunks_indexed = entries.len();
        self.index.upsert_batch(entries).await?;

        // new version is queryable before the old one disappears
        let status = if let Some((old_id, _, _)) = previous {
            self.index.mark_stale(old_id, version).await?;
            if let Some(mut old) = self.documents.get_mut(&old_id) {
                old.stale = true;
            }
            IngestStatus::Updated
        } else {
            IngestStatus::New
        };

        let receipt = IngestReceipt {
            document_id: document.id,
            version,
            chunks_indexed,
            status,
        };
        tracing::info!(
            source_uri = %document.source_uri,
            document_id = %document.id,
            version,
            chunks_indexed,
            ?status,
            "document ingested"
        );
        self.latest_by_uri
            .insert(document.source_uri.clone(), document.id);
        self.documents.insert(document.id, document);
        Ok(receipt)
    }

    /// Ingest a batch of documents concurrently.
    ///
    /// One bad document never aborts the batch; its error lands in the
    /// report's failure list and the rest proceed.
    pub async fn ingest_batch(&self, documents: Vec<RawDocument>) -> IngestReport {
        let workers = self.config.processing.workers();
        tracing::info!(documents = documents.len(), workers, "starting batch ingestion");

        let results: Vec<(String, Result<IngestReceipt>)> =
            stream::iter(documents.into_iter().map(|raw| async move {
                let source_uri = raw.source_uri.clone();
                (source_uri, self.ingest(raw).await)
            }))
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for (source_uri, result) in results {
            match result {
                Ok(receipt) => report.receipts.push(receipt),
                Err(e) => {
                    tracing::warn!(source_uri = %source_uri, error = %e, "document skipped");
                    report.failures.push(IngestFailure {
                        source_uri,
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            ingested = report.receipts.len(),
            failed = report.failures.len(),
            chunks = report.total_chunks(),
            "batch ingestion finished"
        );
        report
    }

    /// Answer a question from the indexed documents.
    ///
    /// Never panics and never returns an ungrounded answer silently: the
    /// outcome is `Answered` (with a `grounded` flag), `Declined` when the
    /// context does not support an answer, or `Failed` with a retryability
    /// hint.
    pub async fn answer(&self, request: QueryRequest) -> QueryOutcome {
        let started = Instant::now();
        tracing::info!(question = %request.question, "query received");
        match self.run_query(&request, started).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let retryable = e.is_transient();
                tracing::error!(question = %request.question, error = %e, retryable, "query failed");
                QueryOutcome::Failed {
                    reason: e.to_string(),
                    retryable,
                }
            }
        }
    }

    async fn run_query(&self, request: &QueryRequest, started: Instant) -> Result<QueryOutcome> {
        let mut state = QueryState::Received;
        tracing::debug!(?state, "query state");
        let deadline = Duration::from_secs(self.config.processing.query_timeout_secs);

        // embedding and search share one call into the retriever
        state = QueryState::Embedding;
        tracing::debug!(?state, "query state");
        let options = RetrievalOptions {
            top_k: request.top_k,
            min_similarity: request.min_similarity,
        };
        let retrieval = timeout(deadline, self.retriever.retrieve(&request.question, options))
            .await
            .map_err(|_| Error::embedding("retrieval timed out"))??;
        state = QueryState::Retrieving;
        tracing::debug!(?state, "query state");

        let hits = match retrieval {
            RetrievalOutcome::Hits(hits) => hits,
            RetrievalOutcome::NoRelevantContext => {
                state = QueryState::Declined;
                tracing::info!(?state, "no relevant context, declining");
                return Ok(QueryOutcome::no_relevant_context());
            }
        };

        state = QueryState::Synthesizing;
        tracing::debug!(?state, hits = hits.len(), "query state");
        let prompt = PromptBuilder::build_grounded_prompt(&request.question, &hits);
        let response = timeout(deadline, self.llm.complete(&prompt))
            .await
            .map_err(|_| Error::llm("generation timed out"))??;

        if is_refusal(&response) {
            state = QueryState::Declined;
            tracing::info!(?state, "model declined to answer from context");
            return Ok(QueryOutcome::Declined {
                reason: "The indexed context does not contain an answer to this question."
                    .to_string(),
            });
        }

        let linked = link_citations(&response, &hits);
        let confidence = if linked.grounded {
            linked.citations.iter().map(|c| c.score).sum::<f32>() / linked.citations.len() as f32
        } else {
            0.0
        };
        if !linked.grounded {
            tracing::warn!(question = %request.question, "answer has no valid citations");
        }

        state = QueryState::Answered;
        tracing::info!(
            ?state,
            citations = linked.citations.len(),
            grounded = linked.grounded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query answered"
        );
        Ok(QueryOutcome::Answered(Answer {
            text: linked.text,
            citations: linked.citations,
            retrieved_chunk_ids: hits.iter().map(|h| h.chunk_id).collect(),
            grounded: linked.grounded,
            confidence,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Look up an ingested document by ID, stale versions included
    pub fn document(&self, id: Uuid) -> Result<Document> {
        self.documents
            .get(&id)
            .map(|doc| doc.clone())
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// Number of live (non-stale) index entries
    pub async fn indexed_chunks(&self) -> Result<usize> {
        self.index.len().await
    }

    /// Drop stale index entries. Returns the number removed.
    pub async fn compact(&self) -> Result<usize> {
        let removed = self.index.compact().await?;
        tracing::info!(removed, "compacted index");
        Ok(removed)
    }

    /// Verify both providers are reachable
    pub async fn health_check(&self) -> Result<bool> {
        let embedding = self.embedder.health_check().await?;
        let llm = self.llm.health_check().await?;
        Ok(embedding && llm)
    }
}
