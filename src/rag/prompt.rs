//! Prompt assembly.
//!
//! Two deterministic templates cover retrieved-context answering: a generic
//! context-block layout, and a structured-source layout for model families
//! that expect explicit per-source delimiters. Which one applies is decided
//! by an injectable [`TemplatePolicy`]; the default pattern-matches the
//! model identifier against a marker list, but callers with better
//! knowledge of their models can supply their own policy instead of relying
//! on name sniffing.

use crate::llm::types::ChatMessage;

use super::store::{ChunkMetadata, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    ContextBlock,
    StructuredSources,
}

pub trait TemplatePolicy: Send + Sync {
    fn select(&self, model_id: &str) -> PromptTemplate;
}

/// Default policy: structured sources for model families known to expect
/// per-source delimiter tokens, generic context blocks otherwise.
pub struct MarkerPolicy {
    markers: Vec<String>,
}

impl MarkerPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl Default for MarkerPolicy {
    fn default() -> Self {
        Self::new(vec!["granite".to_string(), "command-r".to_string()])
    }
}

impl TemplatePolicy for MarkerPolicy {
    fn select(&self, model_id: &str) -> PromptTemplate {
        let id = model_id.to_lowercase();
        if self.markers.iter().any(|m| id.contains(m)) {
            PromptTemplate::StructuredSources
        } else {
            PromptTemplate::ContextBlock
        }
    }
}

/// Human-readable citation for one chunk: document name plus page or row
/// where available.
pub fn citation_label(meta: &ChunkMetadata) -> String {
    match (meta.page_number, meta.row_index) {
        (Some(page), _) => format!("{}, p. {}", meta.document_name, page),
        (None, Some(row)) => format!("{}, row {}", meta.document_name, row),
        (None, None) => meta.document_name.clone(),
    }
}

/// Deduplicated citation list in first-seen order.
pub fn citations(results: &[QueryResult]) -> Vec<String> {
    let mut seen = Vec::new();
    for result in results {
        let label = citation_label(&result.metadata);
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

/// Build the document-grounded prompt for `question`.
///
/// Candidates are re-sorted by descending score here, immediately before
/// assembly — they may have been concatenated from two retrieval passes.
pub fn build_document_prompt(
    question: &str,
    mut results: Vec<QueryResult>,
    template: PromptTemplate,
) -> Vec<ChatMessage> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let sources = citations(&results);
    let system = match template {
        PromptTemplate::ContextBlock => context_block_system(&results, &sources),
        PromptTemplate::StructuredSources => structured_sources_system(&results, &sources),
    };

    vec![ChatMessage::system(system), ChatMessage::user(question)]
}

/// Open-domain prompt for projects without any documents.
pub fn build_conversational_prompt(question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a helpful assistant. The user has not uploaded any \
             documents, so answer from your general knowledge. Be concise \
             and direct.",
        ),
        ChatMessage::user(question),
    ]
}

fn context_block_system(results: &[QueryResult], sources: &[String]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant. Answer the user's question using only \
         the context excerpts below. If the context does not contain the \
         answer, say so.\n\nContext:\n",
    );
    for (idx, result) in results.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", idx + 1, result.text.trim()));
    }
    prompt.push_str("Sources: ");
    prompt.push_str(&sources.join("; "));
    prompt
}

fn structured_sources_system(results: &[QueryResult], sources: &[String]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant. Ground your answer in the sources \
         provided between source tags. Cite sources by their id.\n\n",
    );
    for (idx, result) in results.iter().enumerate() {
        let label = citation_label(&result.metadata);
        prompt.push_str(&format!(
            "<source id=\"{}\" title=\"{}\">\n{}\n</source>\n",
            idx + 1,
            label,
            result.text.trim()
        ));
    }
    prompt.push_str("\nAvailable sources: ");
    prompt.push_str(&sources.join("; "));
    prompt
}
