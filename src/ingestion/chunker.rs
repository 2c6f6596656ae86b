//! Section-aware text chunking with bounded overlap
//!
//! Chunks are exact byte ranges of the document's canonical text: no
//! trimming, no rewriting. That keeps two invariants the rest of the
//! pipeline depends on: every character of the document is covered by at
//! least one chunk, and `chunk.text == raw_text[start..end]` so citations
//! can highlight the supporting span verbatim.
//!
//! Boundaries are deterministic for a fixed document and configuration, so
//! re-chunking for a reindex reproduces identical ranges.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document, Section};

/// A region that must never be split across chunk boundaries (fenced code
/// block). An atomic span longer than the window becomes its own oversized
/// chunk; truncating code is worse than one large chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AtomicSpan {
    start: usize,
    end: usize,
}

impl AtomicSpan {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn contains(&self, offset: usize) -> bool {
        self.start < offset && offset < self.end
    }
}

/// Splits normalized documents into overlapping chunks along their section
/// structure
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker from configuration
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = config.chunk_size.max(16);
        Self {
            chunk_size,
            // overlap strictly below the window size so every step progresses
            overlap: config.overlap().min(chunk_size - 1),
        }
    }

    /// Chunk a document lazily, in section order, from the document start.
    ///
    /// The iterator is finite and not restartable mid-document; chunk
    /// `sequence_index` values increase monotonically across the whole
    /// document.
    pub fn chunk<'a>(&self, document: &'a Document) -> ChunkIter<'a> {
        let spans = find_atomic_spans(&document.raw_text);
        ChunkIter {
            document,
            spans,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            section_index: 0,
            position: 0,
            sequence_index: 0,
        }
    }

    /// Chunk a document into a vector
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(document).collect()
    }
}

/// Lazy chunk sequence over one document
pub struct ChunkIter<'a> {
    document: &'a Document,
    spans: Vec<AtomicSpan>,
    chunk_size: usize,
    overlap: usize,
    section_index: usize,
    position: usize,
    sequence_index: u32,
}

impl<'a> ChunkIter<'a> {
    fn current_section(&self) -> Option<&'a Section> {
        self.document.structure.get(self.section_index)
    }

    /// Atomic span starting exactly at `offset`, clipped to the section
    fn span_starting_at(&self, offset: usize, section_end: usize) -> Option<AtomicSpan> {
        self.spans
            .iter()
            .find(|s| s.start == offset)
            .map(|s| AtomicSpan {
                start: s.start,
                end: s.end.min(section_end),
            })
    }

    fn emit(&mut self, start: usize, end: usize, section: &Section) -> Chunk {
        let text = self.document.raw_text[start..end].to_string();
        let chunk = Chunk::new(
            self.document.id,
            text,
            start,
            end,
            section.path.clone(),
            self.sequence_index,
        );
        self.sequence_index += 1;
        chunk
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            let section = self.current_section()?;
            let (s, e) = (section.start_offset, section.end_offset);

            if self.position >= e || s >= e {
                // section exhausted (or degenerate); move on
                self.section_index += 1;
                if let Some(next) = self.current_section() {
                    self.position = self.position.max(next.start_offset);
                }
                continue;
            }

            let p = self.position;
            let text = &self.document.raw_text;

            // An oversized atomic span starting here becomes its own chunk,
            // with no overlap carried across its edges.
            if let Some(span) = self.span_starting_at(p, e) {
                if span.len() > self.chunk_size {
                    self.position = span.end;
                    return Some(self.emit(span.start, span.end, section));
                }
            }

            let mut end = (p + self.chunk_size).min(e);
            let mut cut_at_span_start = false;
            if end < e {
                if let Some(span) = self
                    .spans
                    .iter()
                    .find(|sp| sp.contains(end))
                    .copied()
                {
                    if span.len() <= self.chunk_size {
                        // small span: pull it whole into this window
                        end = span.end.min(e);
                    } else if span.start > p {
                        // oversized span ahead: stop before it so the next
                        // iteration emits it whole
                        end = span.start;
                        cut_at_span_start = true;
                    } else {
                        end = span.end.min(e);
                    }
                }
            }
            while end < e && !text.is_char_boundary(end) {
                end -= 1;
            }
            debug_assert!(end > p);

            if end >= e {
                self.position = e;
                return Some(self.emit(p, e, section));
            }

            let mut next = if cut_at_span_start {
                end
            } else {
                end.saturating_sub(self.overlap).max(p + 1)
            };
            while next < end && !text.is_char_boundary(next) {
                next += 1;
            }
            // never start a chunk inside an atomic span
            if let Some(span) = self.spans.iter().find(|sp| sp.contains(next)) {
                next = span.end.min(end);
            }
            self.position = next;
            return Some(self.emit(p, end, section));
        }
    }
}

/// Locate fenced code blocks (``` ... ```) in the canonical text. An
/// unterminated fence runs to the end of the text.
fn find_atomic_spans(text: &str) -> Vec<AtomicSpan> {
    let mut spans = Vec::new();
    let mut fence_start: Option<usize> = None;
    let mut line_start = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match fence_start {
                None => fence_start = Some(line_start),
                Some(start) => {
                    spans.push(AtomicSpan {
                        start,
                        end: line_start + line.len(),
                    });
                    fence_start = None;
                }
            }
        }
        line_start += line.len();
    }

    if let Some(start) = fence_start {
        spans.push(AtomicSpan {
            start,
            end: text.len(),
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::ingestion::normalizer::Normalizer;
    use crate::types::RawDocument;

    fn doc_from(text: &str, headings: &[(&str, u8, usize)]) -> Document {
        let mut raw = RawDocument::new("doc://test", text);
        for (title, level, offset) in headings {
            raw = raw.with_heading(*title, *level, *offset);
        }
        Normalizer::new().normalize(&raw).unwrap().into_document(1)
    }

    fn chunker(chunk_size: usize, overlap_fraction: f32) -> Chunker {
        Chunker::new(&ChunkingConfig {
            chunk_size,
            overlap_fraction,
        })
    }

    /// Union of chunk ranges covers the text with no gaps, and overlap stays
    /// within the configured budget.
    fn assert_coverage(doc: &Document, chunks: &[Chunk], max_overlap: usize) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_offset, 0);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.start_offset < chunk.end_offset);
            assert_eq!(
                chunk.text,
                &doc.raw_text[chunk.start_offset..chunk.end_offset]
            );
            assert_eq!(chunk.sequence_index, i as u32);
            if i > 0 {
                let prev = &chunks[i - 1];
                // no gap
                assert!(chunk.start_offset <= prev.end_offset);
                // bounded overlap (small atomic spans may extend a window,
                // never the shared region)
                assert!(prev.end_offset - chunk.start_offset <= max_overlap.max(1) * 2);
            }
        }
        assert_eq!(chunks.last().unwrap().end_offset, doc.raw_text.len());
    }

    #[test]
    fn one_chunk_per_section_when_window_is_large() {
        let text = "# Intro\nFastAPI is a web framework.\n# Usage\nUse @app.get to define a route.\n";
        let usage_offset = text.find("# Usage").unwrap();
        let doc = doc_from(text, &[("Intro", 1, 0), ("Usage", 1, usage_offset)]);

        let chunks = chunker(4096, 0.15).chunk_document(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_path, vec!["Intro"]);
        assert_eq!(chunks[1].section_path, vec!["Usage"]);
        assert!(chunks[1].text.contains("@app.get"));
        assert_coverage(&doc, &chunks, 0);
    }

    #[test]
    fn long_section_splits_with_overlap() {
        let body: String = (0..200).map(|i| format!("word{} ", i)).collect();
        let text = format!("# Long\n{}\n", body);
        let doc = doc_from(&text, &[("Long", 1, 0)]);

        let chunker = chunker(128, 0.15);
        let chunks = chunker.chunk_document(&doc);
        assert!(chunks.len() > 3);
        assert_coverage(&doc, &chunks, chunker.overlap);

        for pair in chunks.windows(2) {
            let shared = pair[0].end_offset.saturating_sub(pair[1].start_offset);
            assert!(shared <= chunker.overlap);
            assert!(shared > 0, "consecutive windows should share context");
        }
    }

    #[test]
    fn rechunking_is_deterministic() {
        let body: String = (0..300).map(|i| format!("token{} ", i)).collect();
        let text = format!("# A\n{}\n# B\n{}\n", body, body);
        let b_offset = text.rfind("# B").unwrap();
        let doc = doc_from(&text, &[("A", 1, 0), ("B", 1, b_offset)]);

        let chunker = chunker(200, 0.2);
        let first: Vec<(usize, usize)> = chunker
            .chunk(&doc)
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        let second: Vec<(usize, usize)> = chunker
            .chunk(&doc)
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_code_block_is_one_chunk() {
        let code_body: String = (0..60).map(|i| format!("let x{} = {};\n", i, i)).collect();
        let text = format!("# Code\nSee below.\n```rust\n{}```\nAfter the block.\n", code_body);
        let doc = doc_from(&text, &[("Code", 1, 0)]);

        let chunker = chunker(128, 0.1);
        let chunks = chunker.chunk_document(&doc);
        assert_coverage(&doc, &chunks, chunker.overlap);

        let fence = chunks
            .iter()
            .find(|c| c.text.starts_with("```rust"))
            .expect("code block should be its own chunk");
        assert!(fence.text.ends_with("```\n"));
        assert!(fence.text.len() > 128);

        // no other chunk splits the fence
        for chunk in &chunks {
            if chunk.id != fence.id {
                assert!(chunk.end_offset <= fence.start_offset || chunk.start_offset >= fence.end_offset);
            }
        }
    }

    #[test]
    fn small_code_block_stays_whole() {
        let filler: String = (0..40).map(|i| format!("w{} ", i)).collect();
        let text = format!("# S\n{}\n```\nlet y = 1;\n```\n{}\n", filler, filler);
        let doc = doc_from(&text, &[("S", 1, 0)]);

        let chunks = chunker(160, 0.1).chunk_document(&doc);
        let fence_start = doc.raw_text.find("```").unwrap();
        let fence_end = doc.raw_text.rfind("```\n").unwrap() + 4;
        for chunk in &chunks {
            let splits_open = chunk.start_offset > fence_start && chunk.start_offset < fence_end;
            let splits_close = chunk.end_offset > fence_start && chunk.end_offset < fence_end;
            assert!(!splits_open && !splits_close, "fence split at {:?}", chunk.char_range());
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let body: String = "héllo wörld ünïcode ".repeat(40);
        let text = format!("# U\n{}\n", body);
        let doc = doc_from(&text, &[("U", 1, 0)]);

        let chunker = chunker(64, 0.15);
        let chunks = chunker.chunk_document(&doc);
        assert_coverage(&doc, &chunks, chunker.overlap);
        for chunk in &chunks {
            assert!(doc.raw_text.is_char_boundary(chunk.start_offset));
            assert!(doc.raw_text.is_char_boundary(chunk.end_offset));
        }
    }

    #[test]
    fn heading_stays_with_following_text() {
        let body: String = (0..100).map(|i| format!("w{} ", i)).collect();
        let text = format!("# First\n{}\n# Second\nshort tail\n", body);
        let second_offset = text.find("# Second").unwrap();
        let doc = doc_from(&text, &[("First", 1, 0), ("Second", 1, second_offset)]);

        let chunks = chunker(100, 0.1).chunk_document(&doc);
        let second_chunk = chunks
            .iter()
            .find(|c| c.section_path == vec!["Second"])
            .unwrap();
        assert!(second_chunk.text.starts_with("# Second"));
    }
}
