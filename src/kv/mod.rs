//! Key-value persistence boundary.
//!
//! The vector store serializes its full record set to a single blob under a
//! fixed key. Anything that can hold named string blobs qualifies as a
//! backend; the shipped implementations are an in-memory map (tests,
//! ephemeral sessions) and SQLite (`sqlite` module).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::errors::RagError;

pub mod sqlite;

pub use sqlite::SqliteKvStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RagError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), RagError>;

    async fn remove(&self, key: &str) -> Result<(), RagError>;
}

/// In-memory backend. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn KvStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RagError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RagError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RagError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
