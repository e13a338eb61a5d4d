//! Retrieval-augmented generation pipeline.
//!
//! - `store`: project-scoped vector store with KV persistence
//! - `ingest`: chunk + embed + index extracted documents
//! - `prompt`: template selection and prompt assembly
//! - `engine`: the per-query orchestrator

pub mod engine;
pub mod ingest;
pub mod prompt;
pub mod similarity;
pub mod store;


pub use engine::{DocumentRef, PipelineStage, QueryHooks, QueryRequest, RagEngine};
pub use ingest::{DocumentContent, ExtractedDocument, IngestReceipt};
pub use store::{ChunkMetadata, EmbeddingRecord, QueryResult, VectorStore};
