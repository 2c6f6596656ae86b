//! Canonicalization of parsed documents
//!
//! Offset-based citations are only valid if normalizing the same raw input
//! twice yields byte-identical text. The normalizer therefore does nothing
//! clever: line endings become LF, the text ends with exactly one newline,
//! and heading offsets are remapped onto the canonical text. Running it on
//! already-canonical input is the identity.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::{Document, RawDocument, Section};

/// A document in canonical form, ready for chunking.
///
/// Versioning is the orchestrator's concern; the normalizer only produces
/// stable text, structure and a content hash.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Source location
    pub source_uri: String,
    /// Canonical text
    pub text: String,
    /// Tiled sections over the canonical text
    pub structure: Vec<Section>,
    /// SHA-256 over the canonical text and section structure
    pub content_hash: String,
}

impl NormalizedDocument {
    /// Materialize a versioned `Document`
    pub fn into_document(self, version: u32) -> Document {
        Document {
            id: uuid::Uuid::new_v4(),
            source_uri: self.source_uri,
            raw_text: self.text,
            structure: self.structure,
            version,
            content_hash: self.content_hash,
            ingested_at: chrono::Utc::now(),
            stale: false,
        }
    }
}

/// Converts raw parsed content into canonical form with stable offsets
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Create a normalizer
    pub fn new() -> Self {
        Self
    }

    /// Normalize one raw document.
    ///
    /// Fails with [`Error::MalformedInput`] when the outline cannot be
    /// reconciled with the text; callers skip the document and continue the
    /// batch.
    pub fn normalize(&self, raw: &RawDocument) -> Result<NormalizedDocument> {
        if raw.text.trim().is_empty() {
            return Err(Error::malformed(&raw.source_uri, "document text is empty"));
        }

        let (text, removed) = canonicalize_line_endings(&raw.text);
        let text = ensure_single_trailing_newline(text);

        let mut heading_offsets = Vec::with_capacity(raw.outline.len());
        let mut previous: Option<usize> = None;
        for heading in &raw.outline {
            if heading.offset >= raw.text.len() {
                return Err(Error::malformed(
                    &raw.source_uri,
                    format!(
                        "heading '{}' at offset {} exceeds text length {}",
                        heading.title,
                        heading.offset,
                        raw.text.len()
                    ),
                ));
            }
            if !raw.text.is_char_boundary(heading.offset) {
                return Err(Error::malformed(
                    &raw.source_uri,
                    format!(
                        "heading '{}' offset {} falls inside a multibyte character",
                        heading.title, heading.offset
                    ),
                ));
            }
            let offset = remap_offset(heading.offset, &removed);
            if offset >= text.len() || !text.is_char_boundary(offset) {
                return Err(Error::malformed(
                    &raw.source_uri,
                    format!("heading '{}' falls outside the canonical text", heading.title),
                ));
            }
            if let Some(prev) = previous {
                if offset <= prev {
                    return Err(Error::malformed(
                        &raw.source_uri,
                        format!("heading '{}' is out of order", heading.title),
                    ));
                }
            }
            if heading.level == 0 {
                return Err(Error::malformed(
                    &raw.source_uri,
                    format!("heading '{}' has level 0", heading.title),
                ));
            }
            previous = Some(offset);
            heading_offsets.push(offset);
        }

        let structure = build_sections(&text, &raw.outline, &heading_offsets);
        let content_hash = hash_content(&text, &structure);

        tracing::debug!(
            source_uri = %raw.source_uri,
            sections = structure.len(),
            bytes = text.len(),
            "normalized document"
        );

        Ok(NormalizedDocument {
            source_uri: raw.source_uri.clone(),
            text,
            structure,
            content_hash,
        })
    }
}

/// Hash the canonical text together with the section structure, so that an
/// outline correction over unchanged text still counts as a content change
fn hash_content(text: &str, structure: &[Section]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    for section in structure {
        hasher.update([0xff, section.level]);
        hasher.update(section.start_offset.to_le_bytes());
        hasher.update(section.end_offset.to_le_bytes());
        for part in &section.path {
            hasher.update([0xfe]);
            hasher.update(part.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Replace CRLF and lone CR with LF, returning the canonical text and the
/// byte positions (in the original) that were removed.
fn canonicalize_line_endings(text: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut removed = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                // CRLF: drop the CR, keep the LF
                removed.push(i);
                i += 1;
                continue;
            }
            // lone CR: rewrite in place, no shift
            out.push('\n');
            i += 1;
            continue;
        }
        // advance over one UTF-8 scalar
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    (out, removed)
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

fn ensure_single_trailing_newline(mut text: String) -> String {
    while text.ends_with('\n') {
        text.pop();
    }
    text.push('\n');
    text
}

/// Map an offset in the original text onto the canonical text
fn remap_offset(offset: usize, removed: &[usize]) -> usize {
    let shifted = removed.partition_point(|&p| p < offset);
    offset - shifted
}

/// Tile the canonical text into sections, one per heading plus an optional
/// preamble before the first heading.
fn build_sections(
    text: &str,
    outline: &[crate::types::OutlineHeading],
    offsets: &[usize],
) -> Vec<Section> {
    if offsets.is_empty() {
        return vec![Section {
            path: Vec::new(),
            level: 0,
            start_offset: 0,
            end_offset: text.len(),
        }];
    }

    let mut sections = Vec::with_capacity(offsets.len() + 1);
    if offsets[0] > 0 {
        sections.push(Section {
            path: Vec::new(),
            level: 0,
            start_offset: 0,
            end_offset: offsets[0],
        });
    }

    // breadcrumb stack of (level, title)
    let mut stack: Vec<(u8, String)> = Vec::new();
    for (i, heading) in outline.iter().enumerate() {
        while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
            stack.pop();
        }
        stack.push((heading.level, heading.title.clone()));

        let end = offsets.get(i + 1).copied().unwrap_or(text.len());
        sections.push(Section {
            path: stack.iter().map(|(_, title)| title.clone()).collect(),
            level: heading.level,
            start_offset: offsets[i],
            end_offset: end,
        });
    }
    sections
}
