//! Document, section and chunk types with offset tracking for citations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw parsed content for one document, as produced by an external parser.
///
/// The pipeline never sees source formats (PDF, HTML, Markdown); parsers hand
/// over extracted text plus a structural outline, and everything downstream is
/// polymorphic only over this one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Source location of the document
    pub source_uri: String,
    /// Extracted text
    pub text: String,
    /// Ordered heading outline with byte offsets into `text`
    #[serde(default)]
    pub outline: Vec<OutlineHeading>,
}

impl RawDocument {
    /// Create a raw document without structure
    pub fn new(source_uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            text: text.into(),
            outline: Vec::new(),
        }
    }

    /// Attach a heading to the outline
    pub fn with_heading(mut self, title: impl Into<String>, level: u8, offset: usize) -> Self {
        self.outline.push(OutlineHeading {
            title: title.into(),
            level,
            offset,
        });
        self
    }
}

/// One heading in a raw document's structural outline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineHeading {
    /// Heading text
    pub title: String,
    /// Heading level (1 = top)
    pub level: u8,
    /// Byte offset of the heading within the raw text
    pub offset: usize,
}

/// A contiguous region of a document's canonical text owned by one heading.
///
/// Sections tile the text exactly: the first section starts at 0, each section
/// ends where the next begins, and the last ends at the text length. Text
/// before the first heading is a preamble section with an empty path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Heading breadcrumb from the document root to this section
    pub path: Vec<String>,
    /// Heading level (0 for the preamble)
    pub level: u8,
    /// Start offset into the canonical text (inclusive)
    pub start_offset: usize,
    /// End offset into the canonical text (exclusive)
    pub end_offset: usize,
}

/// A document that has been normalized and ingested.
///
/// Immutable once created. Re-ingesting the same `source_uri` produces a new
/// `Document` with `version + 1`; the old one is marked stale, never deleted,
/// so citations issued against it keep resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Source location
    pub source_uri: String,
    /// Canonical text; all chunk and citation offsets point into this
    pub raw_text: String,
    /// Tiled section structure over `raw_text`
    pub structure: Vec<Section>,
    /// Version, starting at 1 and bumped on re-ingestion
    pub version: u32,
    /// SHA-256 over the canonical text and section structure, for change
    /// detection
    pub content_hash: String,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
    /// Superseded by a newer version of the same source
    pub stale: bool,
}

/// A bounded span of a document's text, the atomic retrievable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// Text content; always equal to `raw_text[start_offset..end_offset]`
    pub text: String,
    /// Start offset into the owning document's canonical text (inclusive)
    pub start_offset: usize,
    /// End offset into the owning document's canonical text (exclusive)
    pub end_offset: usize,
    /// Heading breadcrumb of the section this chunk came from
    pub section_path: Vec<String>,
    /// Position among the document's chunks
    pub sequence_index: u32,
    /// Embedding vector, absent until computed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a new chunk from a span of the document's canonical text
    pub fn new(
        document_id: Uuid,
        text: String,
        start_offset: usize,
        end_offset: usize,
        section_path: Vec<String>,
        sequence_index: u32,
    ) -> Self {
        debug_assert!(start_offset < end_offset);
        Self {
            id: Uuid::new_v4(),
            document_id,
            text,
            start_offset,
            end_offset,
            section_path,
            sequence_index,
            embedding: None,
        }
    }

    /// Character range of this chunk within the owning document
    pub fn char_range(&self) -> (usize, usize) {
        (self.start_offset, self.end_offset)
    }
}
