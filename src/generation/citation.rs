//! Citation extraction and linking
//!
//! Parses the bracketed identifiers the model was instructed to emit and
//! links them back to the retrieved chunks that were actually supplied in
//! the prompt. Identifiers that do not correspond to a supplied context
//! block are hallucinations and are dropped from the citation list.

use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::retrieval::RetrievalResult;
use crate::types::Citation;

use super::prompt::REFUSAL_MARKER;

fn citation_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("static pattern"))
}

/// Model response with its citations resolved against the supplied context
#[derive(Debug, Clone)]
pub struct LinkedAnswer {
    /// Answer text as returned by the model
    pub text: String,
    /// Citations that resolve to supplied context blocks, in first-mention
    /// order
    pub citations: Vec<Citation>,
    /// Whether at least one claim is backed by a resolvable citation
    pub grounded: bool,
}

/// Whether the model declined to answer from the supplied context.
///
/// The marker must stand alone or be followed by whitespace or
/// punctuation; an answer that merely mentions the marker as part of a
/// longer word is not a refusal.
pub fn is_refusal(response: &str) -> bool {
    match response.trim().strip_prefix(REFUSAL_MARKER) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_' && c != '-'),
        None => false,
    }
}

/// Parse bracketed identifiers from `response`, keeping only those that
/// refer to one of `supplied` context blocks. Identifiers are 1-based;
/// duplicates are collapsed to the first mention.
pub fn parse_cited_blocks(response: &str, supplied: usize) -> Vec<usize> {
    let mut seen = Vec::new();
    for capture in citation_pattern().captures_iter(response) {
        let id: usize = match capture[1].parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        if id == 0 || id > supplied {
            tracing::warn!(id, supplied, "dropping citation of unknown context block");
            continue;
        }
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Link a model response to the retrieval results its prompt was built from
pub fn link_citations(response: &str, results: &[RetrievalResult]) -> LinkedAnswer {
    let cited = parse_cited_blocks(response, results.len());
    let citations: Vec<Citation> = cited
        .iter()
        .map(|&id| citation_for(&results[id - 1]))
        .collect();
    let grounded = !citations.is_empty();
    LinkedAnswer {
        text: response.trim().to_string(),
        citations,
        grounded,
    }
}

fn citation_for(result: &RetrievalResult) -> Citation {
    let meta = &result.metadata;
    Citation {
        chunk_id: result.chunk_id,
        document_id: meta.document_id,
        source_uri: meta.source_uri.clone(),
        section_path: meta.section_path.clone(),
        char_start: meta.char_start,
        char_end: meta.char_end,
        snippet: snippet_of(&meta.text),
        score: result.score,
    }
}

const SNIPPET_GRAPHEMES: usize = 160;

fn snippet_of(text: &str) -> String {
    match text.grapheme_indices(true).nth(SNIPPET_GRAPHEMES) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
