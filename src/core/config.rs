//! Settings and filesystem paths.
//!
//! Settings are loaded from an optional `docsage.toml`; a missing or
//! malformed file falls back to defaults so the engine always starts.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("docsage.db");
        let settings_path = data_dir.join("docsage.toml");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
            settings_path,
        }
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("docsage.db");
        let settings_path = data_dir.join("docsage.toml");
        AppPaths {
            data_dir,
            log_dir,
            db_path,
            settings_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("DOCSAGE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".docsage")
}

/// Engine tunables. Every field has a serde default so partial files work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Multiplier applied to `top_k` for the single zero-result retry.
    #[serde(default = "default_retry_k_factor")]
    pub retry_k_factor: usize,
    /// Minimum cosine score for a chunk to count as relevant.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Key under which the vector store blob is persisted.
    #[serde(default = "default_store_key")]
    pub store_key: String,
    /// Embedding model used when a query does not name one.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_lmstudio_base_url")]
    pub lmstudio_base_url: String,
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

fn default_retry_k_factor() -> usize {
    3
}

fn default_min_score() -> f32 {
    0.25
}

fn default_store_key() -> String {
    "docsage-vector-store".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_lmstudio_base_url() -> String {
    "http://localhost:1234".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            retry_k_factor: default_retry_k_factor(),
            min_score: default_min_score(),
            store_key: default_store_key(),
            embedding_model: default_embedding_model(),
            lmstudio_base_url: default_lmstudio_base_url(),
            ollama_base_url: default_ollama_base_url(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Invalid settings file {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
