//! Project-scoped vector store.
//!
//! Records live in memory and are scanned brute-force per query; the full
//! record set is serialized to the key-value boundary on every mutation and
//! restored on startup. A missing or corrupt blob degrades to an empty
//! store. All access goes through one async mutex so a logical sequence of
//! operations observes a consistent snapshot.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::similarity::cosine_similarity;
use crate::core::errors::RagError;
use crate::kv::KvStore;

/// Partition tag applied to records arriving without a project id.
pub const UNKNOWN_PROJECT: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub document_name: String,
    #[serde(default)]
    pub project_id: String,
    pub sequence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    #[serde(default)]
    pub ingested_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// One ranked retrieval hit. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct VerifyReport {
    pub exists: bool,
    pub count: usize,
}

pub struct VectorStore {
    kv: Arc<dyn KvStore>,
    store_key: String,
    records: Mutex<Vec<EmbeddingRecord>>,
}

impl VectorStore {
    /// Open the store, restoring any previously persisted record set.
    pub async fn open(kv: Arc<dyn KvStore>, store_key: impl Into<String>) -> Self {
        let store_key = store_key.into();
        let records = match kv.get(&store_key).await {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<EmbeddingRecord>>(&blob) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!("Discarding corrupt vector store blob: {}", err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!("Could not read vector store blob: {}", err);
                Vec::new()
            }
        };

        if !records.is_empty() {
            tracing::info!("Restored {} embedding records", records.len());
        }

        Self {
            kv,
            store_key,
            records: Mutex::new(records),
        }
    }

    /// Append records. Records without a project id are tagged
    /// [`UNKNOWN_PROJECT`] rather than rejected.
    pub async fn put(&self, records: Vec<EmbeddingRecord>) -> Result<(), RagError> {
        let mut guard = self.records.lock().await;
        for mut record in records {
            if record.metadata.project_id.is_empty() {
                tracing::debug!("Record {} has no project id, tagging as unknown", record.id);
                record.metadata.project_id = UNKNOWN_PROJECT.to_string();
            }
            guard.push(record);
        }
        self.persist(&guard).await
    }

    /// Top-`k` records by cosine similarity, scoped to `project_id` when
    /// given. Ties keep insertion order. Raises `DimensionMismatch` when a
    /// scanned record's vector length differs from the query's — mixed
    /// dimensions mean two embedding providers were crossed, which must not
    /// be papered over.
    pub async fn query(
        &self,
        vector: &[f32],
        k: usize,
        project_id: Option<&str>,
    ) -> Result<Vec<QueryResult>, RagError> {
        let guard = self.records.lock().await;

        let mut scored = Vec::new();
        for record in guard.iter() {
            if let Some(project) = project_id {
                if record.metadata.project_id != project {
                    continue;
                }
            }
            if record.embedding.len() != vector.len() {
                return Err(RagError::DimensionMismatch {
                    expected: vector.len(),
                    actual: record.embedding.len(),
                });
            }
            scored.push(QueryResult {
                chunk_id: record.id.clone(),
                text: record.text.clone(),
                score: cosine_similarity(vector, &record.embedding),
                metadata: record.metadata.clone(),
            });
        }

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k.max(1));
        Ok(scored)
    }

    pub async fn delete_by_document(&self, document_id: &str) -> Result<usize, RagError> {
        let mut guard = self.records.lock().await;
        let before = guard.len();
        guard.retain(|r| r.metadata.document_id != document_id);
        let removed = before - guard.len();
        if removed > 0 {
            self.persist(&guard).await?;
        }
        Ok(removed)
    }

    pub async fn delete_by_project(&self, project_id: &str) -> Result<usize, RagError> {
        let mut guard = self.records.lock().await;
        let before = guard.len();
        guard.retain(|r| r.metadata.project_id != project_id);
        let removed = before - guard.len();
        if removed > 0 {
            self.persist(&guard).await?;
        }
        Ok(removed)
    }

    pub async fn count(&self, project_id: Option<&str>) -> usize {
        let guard = self.records.lock().await;
        match project_id {
            Some(project) => guard
                .iter()
                .filter(|r| r.metadata.project_id == project)
                .count(),
            None => guard.len(),
        }
    }

    /// Cheap existence check used before querying, to distinguish "nothing
    /// indexed" from "nothing matched".
    pub async fn verify(
        &self,
        document_id: Option<&str>,
        project_id: Option<&str>,
    ) -> VerifyReport {
        let guard = self.records.lock().await;
        let count = guard
            .iter()
            .filter(|r| document_id.is_none_or(|d| r.metadata.document_id == d))
            .filter(|r| project_id.is_none_or(|p| r.metadata.project_id == p))
            .count();
        VerifyReport {
            exists: count > 0,
            count,
        }
    }

    /// Drop everything, e.g. when the embedding model changes and all
    /// vectors are invalidated.
    pub async fn clear(&self) -> Result<(), RagError> {
        let mut guard = self.records.lock().await;
        guard.clear();
        self.persist(&guard).await
    }

    async fn persist(&self, records: &[EmbeddingRecord]) -> Result<(), RagError> {
        let blob = serde_json::to_string(records).map_err(RagError::internal)?;
        self.kv.set(&self.store_key, &blob).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn record(id: &str, embedding: Vec<f32>, document: &str, project: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            embedding,
            text: format!("text of {id}"),
            metadata: ChunkMetadata {
                document_id: document.to_string(),
                document_name: format!("{document}.pdf"),
                project_id: project.to_string(),
                sequence_index: 0,
                page_number: None,
                row_index: None,
                ingested_at: String::new(),
            },
        }
    }

    async fn empty_store() -> VectorStore {
        VectorStore::open(MemoryKvStore::shared(), "test-store").await
    }

    #[tokio::test]
    async fn put_then_query_returns_the_record_first_with_score_one() {
        let store = empty_store().await;
        store
            .put(vec![
                record("c1", vec![1.0, 0.0, 0.0], "d1", "p1"),
                record("c2", vec![0.0, 1.0, 0.0], "d1", "p1"),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results[0].chunk_id, "c1");
        assert!(results[0].score > 0.999);
        assert!(results[0].score <= 1.0);
    }

    #[tokio::test]
    async fn query_is_scoped_by_project() {
        let store = empty_store().await;
        store
            .put(vec![
                record("a", vec![1.0, 0.0], "d1", "A"),
                record("b", vec![1.0, 0.0], "d2", "B"),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10, Some("B")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "b");

        let all = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let store = empty_store().await;
        store
            .put(vec![
                record("first", vec![1.0, 0.0], "d1", "p"),
                record("second", vec![1.0, 0.0], "d1", "p"),
                record("third", vec![1.0, 0.0], "d1", "p"),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn mixed_dimensions_raise_instead_of_skipping() {
        let store = empty_store().await;
        store
            .put(vec![record("c1", vec![1.0, 0.0, 0.0], "d1", "p")])
            .await
            .unwrap();

        let err = store.query(&[1.0, 0.0], 10, None).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn delete_by_document_removes_exactly_its_records() {
        let store = empty_store().await;
        store
            .put(vec![
                record("a", vec![1.0], "d1", "p"),
                record("b", vec![1.0], "d1", "p"),
                record("c", vec![1.0], "d2", "p"),
            ])
            .await
            .unwrap();

        let removed = store.delete_by_document("d1").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(None).await, 1);

        let results = store.query(&[1.0], 10, None).await.unwrap();
        assert!(results.iter().all(|r| r.metadata.document_id == "d2"));
    }

    #[tokio::test]
    async fn delete_by_project_scopes_exactly() {
        let store = empty_store().await;
        store
            .put(vec![
                record("a", vec![1.0], "d1", "A"),
                record("b", vec![1.0], "d2", "B"),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_project("A").await.unwrap(), 1);
        assert_eq!(store.count(Some("A")).await, 0);
        assert_eq!(store.count(Some("B")).await, 1);
    }

    #[tokio::test]
    async fn verify_distinguishes_empty_from_populated() {
        let store = empty_store().await;
        let report = store.verify(None, Some("p")).await;
        assert!(!report.exists);
        assert_eq!(report.count, 0);

        store
            .put(vec![record("a", vec![1.0], "d1", "p")])
            .await
            .unwrap();

        let report = store.verify(Some("d1"), Some("p")).await;
        assert!(report.exists);
        assert_eq!(report.count, 1);

        let other = store.verify(Some("d2"), Some("p")).await;
        assert!(!other.exists);
    }

    #[tokio::test]
    async fn records_survive_a_restart_via_the_kv_blob() {
        let kv = MemoryKvStore::shared();

        let store = VectorStore::open(Arc::clone(&kv), "blob").await;
        store
            .put(vec![record("a", vec![0.5, 0.5], "d1", "p")])
            .await
            .unwrap();
        drop(store);

        let reopened = VectorStore::open(kv, "blob").await;
        assert_eq!(reopened.count(None).await, 1);
        let results = reopened.query(&[0.5, 0.5], 1, Some("p")).await.unwrap();
        assert_eq!(results[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn corrupt_blob_degrades_to_an_empty_store() {
        let kv = MemoryKvStore::shared();
        kv.set("blob", "not valid json at all").await.unwrap();

        let store = VectorStore::open(kv, "blob").await;
        assert_eq!(store.count(None).await, 0);
    }

    #[tokio::test]
    async fn empty_project_id_is_tagged_unknown() {
        let store = empty_store().await;
        store
            .put(vec![record("a", vec![1.0], "d1", "")])
            .await
            .unwrap();

        assert_eq!(store.count(Some(UNKNOWN_PROJECT)).await, 1);
    }

    #[tokio::test]
    async fn clear_empties_and_persists() {
        let kv = MemoryKvStore::shared();
        let store = VectorStore::open(Arc::clone(&kv), "blob").await;
        store
            .put(vec![record("a", vec![1.0], "d1", "p")])
            .await
            .unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.count(None).await, 0);

        let reopened = VectorStore::open(kv, "blob").await;
        assert_eq!(reopened.count(None).await, 0);
    }
}
