//! Provider registry: one embedding and one generation implementation per
//! [`ProviderKind`], selected once per call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::errors::RagError;

use super::local::{LocalProvider, ModelRuntime};
use super::lmstudio::LmStudioProvider;
use super::ollama::OllamaProvider;
use super::provider::{EmbeddingProvider, GenerationProvider};
use super::types::ProviderKind;

#[derive(Default)]
pub struct ProviderSet {
    embedding: HashMap<ProviderKind, Arc<dyn EmbeddingProvider>>,
    generation: HashMap<ProviderKind, Arc<dyn GenerationProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire up the remote providers from settings, plus the local provider
    /// when an in-process runtime is available.
    pub fn from_settings(settings: &Settings, runtime: Option<Arc<dyn ModelRuntime>>) -> Self {
        let mut set = Self::new();

        let lmstudio = Arc::new(LmStudioProvider::new(settings.lmstudio_base_url.clone()));
        set.register_embedding(ProviderKind::LmStudio, Arc::clone(&lmstudio) as _);
        set.register_generation(ProviderKind::LmStudio, lmstudio);

        let ollama = Arc::new(OllamaProvider::new(settings.ollama_base_url.clone()));
        set.register_embedding(ProviderKind::Ollama, Arc::clone(&ollama) as _);
        set.register_generation(ProviderKind::Ollama, ollama);

        if let Some(runtime) = runtime {
            let local = Arc::new(LocalProvider::new(runtime));
            set.register_embedding(ProviderKind::Local, Arc::clone(&local) as _);
            set.register_generation(ProviderKind::Local, local);
        }

        set
    }

    pub fn register_embedding(&mut self, kind: ProviderKind, provider: Arc<dyn EmbeddingProvider>) {
        self.embedding.insert(kind, provider);
    }

    pub fn register_generation(
        &mut self,
        kind: ProviderKind,
        provider: Arc<dyn GenerationProvider>,
    ) {
        self.generation.insert(kind, provider);
    }

    pub fn embedding(&self, kind: ProviderKind) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
        self.embedding.get(&kind).cloned().ok_or_else(|| {
            RagError::BadRequest(format!("no embedding provider for {}", kind.as_str()))
        })
    }

    pub fn generation(&self, kind: ProviderKind) -> Result<Arc<dyn GenerationProvider>, RagError> {
        self.generation.get(&kind).cloned().ok_or_else(|| {
            RagError::BadRequest(format!("no generation provider for {}", kind.as_str()))
        })
    }
}
