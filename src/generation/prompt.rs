//! Grounded prompt assembly
//!
//! The prompt presents each retrieved chunk under a bracketed numeric
//! identifier and instructs the model to cite those identifiers inline.
//! The identifier syntax is an internal convention shared with the citation
//! parser; it is not part of any external wire format.

use crate::retrieval::RetrievalResult;

/// Exact reply the model is told to produce when the context does not
/// answer the question
pub const REFUSAL_MARKER: &str = "NO_ANSWER";

/// Prompt builder for grounded answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render retrieved chunks as numbered context blocks
    pub fn build_context(results: &[RetrievalResult]) -> String {
        let mut context = String::new();
        for result in results {
            let id = result.rank + 1;
            context.push_str(&format!(
                "[{}] {}\n\nContent:\n{}\n\n---\n\n",
                id,
                Self::format_source_ref(result),
                result.metadata.text
            ));
        }
        context
    }

    fn format_source_ref(result: &RetrievalResult) -> String {
        let mut parts = vec![result.metadata.source_uri.clone()];
        if !result.metadata.section_path.is_empty() {
            parts.push(format!(
                "Section: {}",
                result.metadata.section_path.join(" > ")
            ));
        }
        parts.join(", ")
    }

    /// Build the full grounded prompt for a question
    pub fn build_grounded_prompt(question: &str, results: &[RetrievalResult]) -> String {
        format!(
            r#"You are a documentation assistant that ONLY uses information from the provided context.

RULES:
1. Only use information explicitly stated in the CONTEXT below.
2. If the context does not answer the question, reply with exactly: {refusal}
3. Never use external knowledge or make assumptions beyond the context.
4. Cite the supporting context block after each claim using its bracketed number, e.g. [1] or [2].
5. Stay close to the source text; do not paraphrase in ways that change meaning.

CONTEXT:
{context}
QUESTION: {question}

Answer using only the context above, citing block numbers inline:"#,
            refusal = REFUSAL_MARKER,
            context = Self::build_context(results),
            question = question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntryMetadata;
    use uuid::Uuid;

    fn result(rank: u32, text: &str, section: &[&str]) -> RetrievalResult {
        RetrievalResult {
            chunk_id: Uuid::new_v4(),
            score: 0.9,
            rank,
            metadata: EntryMetadata {
                document_id: Uuid::new_v4(),
                source_uri: "doc://guide.md".to_string(),
                version: 1,
                section_path: section.iter().map(|s| s.to_string()).collect(),
                sequence_index: rank,
                char_start: 0,
                char_end: text.len(),
                text: text.to_string(),
                model_fingerprint: "m@1".to_string(),
                stale: false,
            },
        }
    }

    #[test]
    fn context_blocks_are_numbered_from_one() {
        let results = vec![
            result(0, "first chunk", &["Usage"]),
            result(1, "second chunk", &["Intro"]),
        ];
        let context = PromptBuilder::build_context(&results);
        assert!(context.contains("[1] doc://guide.md, Section: Usage"));
        assert!(context.contains("[2] doc://guide.md, Section: Intro"));
        assert!(context.contains("first chunk"));
    }

    #[test]
    fn prompt_carries_question_and_refusal_marker() {
        let results = vec![result(0, "chunk", &[])];
        let prompt = PromptBuilder::build_grounded_prompt("How does it work?", &results);
        assert!(prompt.contains("How does it work?"));
        assert!(prompt.contains(REFUSAL_MARKER));
        assert!(prompt.contains("chunk"));
    }
}
