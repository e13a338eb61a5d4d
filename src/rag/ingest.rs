//! Document ingestion pipeline.
//!
//! Raw format parsing (PDF, spreadsheets, ...) happens outside the engine;
//! ingestion starts from already-extracted text units, chunks them with
//! page/row provenance, embeds the chunks as one batch and writes the
//! records as a single store mutation.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::chunking::chunk_text_yielding;
use crate::core::errors::RagError;
use crate::llm::provider::EmbeddingProvider;
use crate::llm::types::BatchProgressFn;

use super::store::{ChunkMetadata, EmbeddingRecord, VectorStore};

/// Extracted document content, as produced by the external format parsers.
#[derive(Debug, Clone)]
pub enum DocumentContent {
    /// Page-oriented formats (PDF, DOCX); one string per page.
    Pages(Vec<String>),
    /// Row-oriented formats (CSV, XLSX); one string per row.
    Rows(Vec<String>),
    /// Plain text.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub name: String,
    pub content: DocumentContent,
}

#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: String,
    pub chunk_count: usize,
}

pub struct Ingestor {
    store: Arc<VectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

struct PendingChunk {
    text: String,
    page_number: Option<u32>,
    row_index: Option<u32>,
}

impl Ingestor {
    pub fn new(store: Arc<VectorStore>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            store,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk, embed and index one document under `project_id`. Progress runs
    /// 0–100: chunking up to 10, embedding remapped into 10–95, the store
    /// write completes at 100.
    pub async fn ingest(
        &self,
        document: ExtractedDocument,
        project_id: &str,
        embedder: &dyn EmbeddingProvider,
        embedding_model: &str,
        on_progress: Option<&BatchProgressFn>,
    ) -> Result<IngestReceipt, RagError> {
        let report = |pct: f32| {
            if let Some(cb) = on_progress {
                cb(pct);
            }
        };

        let chunks = self.collect_chunks(&document.content).await;
        report(10.0);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embed_progress: BatchProgressFn = {
            let on_progress = on_progress.cloned();
            Arc::new(move |pct: f32| {
                if let Some(cb) = &on_progress {
                    cb(10.0 + pct / 100.0 * 85.0);
                }
            })
        };
        let vectors = embedder
            .embed_batch(&texts, embedding_model, Some(&embed_progress))
            .await?;

        if vectors.len() != texts.len() {
            return Err(RagError::Internal(format!(
                "embedding batch returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(first) = vectors.first() {
            for vector in &vectors {
                if vector.len() != first.len() {
                    return Err(RagError::DimensionMismatch {
                        expected: first.len(),
                        actual: vector.len(),
                    });
                }
            }
        }

        let document_id = Uuid::new_v4().to_string();
        let ingested_at = Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(sequence_index, (chunk, embedding))| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                embedding,
                text: chunk.text,
                metadata: ChunkMetadata {
                    document_id: document_id.clone(),
                    document_name: document.name.clone(),
                    project_id: project_id.to_string(),
                    sequence_index,
                    page_number: chunk.page_number,
                    row_index: chunk.row_index,
                    ingested_at: ingested_at.clone(),
                },
            })
            .collect();

        let chunk_count = records.len();
        self.store.put(records).await?;
        report(100.0);

        tracing::info!(
            "Indexed {} ({} chunks) into project {}",
            document.name,
            chunk_count,
            project_id
        );

        Ok(IngestReceipt {
            document_id,
            chunk_count,
        })
    }

    pub async fn remove_document(&self, document_id: &str) -> Result<usize, RagError> {
        self.store.delete_by_document(document_id).await
    }

    pub async fn remove_project(&self, project_id: &str) -> Result<usize, RagError> {
        self.store.delete_by_project(project_id).await
    }

    /// Split extracted units into chunks with provenance. A document with no
    /// content still yields exactly one (empty) chunk.
    async fn collect_chunks(&self, content: &DocumentContent) -> Vec<PendingChunk> {
        let mut chunks = Vec::new();

        match content {
            DocumentContent::Text(text) => {
                for piece in chunk_text_yielding(text, self.chunk_size, self.chunk_overlap).await {
                    chunks.push(PendingChunk {
                        text: piece,
                        page_number: None,
                        row_index: None,
                    });
                }
            }
            DocumentContent::Pages(pages) => {
                for (idx, page) in pages.iter().enumerate() {
                    let page_number = Some(idx as u32 + 1);
                    for piece in
                        chunk_text_yielding(page, self.chunk_size, self.chunk_overlap).await
                    {
                        chunks.push(PendingChunk {
                            text: piece,
                            page_number,
                            row_index: None,
                        });
                    }
                    tokio::task::yield_now().await;
                }
            }
            DocumentContent::Rows(rows) => {
                for (idx, row) in rows.iter().enumerate() {
                    let row_index = Some(idx as u32 + 1);
                    for piece in
                        chunk_text_yielding(row, self.chunk_size, self.chunk_overlap).await
                    {
                        chunks.push(PendingChunk {
                            text: piece,
                            page_number: None,
                            row_index,
                        });
                    }
                    tokio::task::yield_now().await;
                }
            }
        }

        if chunks.is_empty() {
            chunks.push(PendingChunk {
                text: String::new(),
                page_number: None,
                row_index: None,
            });
        }

        chunks
    }
}
