//! Answer synthesis: prompt assembly and citation linking

pub mod citation;
pub mod prompt;

pub use citation::{is_refusal, link_citations, parse_cited_blocks, LinkedAnswer};
pub use prompt::{PromptBuilder, REFUSAL_MARKER};
