//! docsage-core: a local document question-answering engine.
//!
//! Documents are chunked, embedded and indexed into a project-scoped vector
//! store; questions are answered by retrieving relevant chunks and streaming
//! a grounded generation through one of three model backends (in-process
//! runtime, LM Studio, Ollama). Reasoning output wrapped in `<think>` tags
//! is split from the visible answer on the fly.
//!
//! The UI layer, chat persistence and raw document parsers are external
//! callers of this crate.

pub mod chunking;
pub mod core;
pub mod kv;
pub mod llm;
pub mod logging;
pub mod rag;

pub use crate::core::config::{AppPaths, Settings};
pub use crate::core::errors::RagError;
pub use crate::kv::{KvStore, MemoryKvStore, SqliteKvStore};
pub use crate::llm::registry::ProviderSet;
pub use crate::llm::types::{GenerationStage, Interrupt, ProviderKind};
pub use crate::rag::{
    DocumentContent, DocumentRef, ExtractedDocument, IngestReceipt, PipelineStage, QueryHooks,
    QueryRequest, RagEngine, VectorStore,
};
