//! In-process model provider.
//!
//! The actual inference backend (llama.cpp bindings, candle, ...) lives
//! behind the [`ModelRuntime`] capability; this module owns what the engine
//! cares about: staged load progress, the single-active-model cache with
//! eviction on model switch, token forwarding and cooperative interruption.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::core::errors::RagError;

use super::provider::{EmbeddingProvider, GenerationProvider};
use super::types::{GenerationHooks, GenerationRequest, GenerationStage, StageReporter};

/// Capability interface over an in-process inference backend.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Load the tokenizer for `model_id` into process memory.
    async fn load_tokenizer(&self, model_id: &str) -> Result<(), RagError>;

    /// Load model weights; the returned session owns the loaded
    /// model/tokenizer pair and is dropped to unload it.
    async fn load_model(&self, model_id: &str) -> Result<Arc<dyn ModelSession>, RagError>;
}

/// A loaded model/tokenizer pair.
#[async_trait]
pub trait ModelSession: Send + Sync {
    fn model_id(&self) -> &str;

    async fn warmup(&self) -> Result<(), RagError> {
        Ok(())
    }

    /// Begin token generation; tokens arrive on the returned channel until
    /// the stream ends or the receiver is dropped.
    async fn start_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

#[derive(Default)]
struct ModelCache {
    active: Option<Arc<dyn ModelSession>>,
}

pub struct LocalProvider {
    runtime: Arc<dyn ModelRuntime>,
    cache: Mutex<ModelCache>,
}

impl LocalProvider {
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self {
            runtime,
            cache: Mutex::new(ModelCache::default()),
        }
    }

    /// Return a session for `model_id`, loading it if necessary. A different
    /// loaded model is evicted before the new pair loads; one active model
    /// per process.
    async fn ensure_session(
        &self,
        model_id: &str,
        reporter: &mut StageReporter,
    ) -> Result<Arc<dyn ModelSession>, RagError> {
        let mut cache = self.cache.lock().await;

        if let Some(session) = &cache.active {
            if session.model_id() == model_id {
                reporter.enter(GenerationStage::TokenizerLoad);
                reporter.finish_stage();
                reporter.enter(GenerationStage::ModelLoad);
                reporter.finish_stage();
                reporter.enter(GenerationStage::Warmup);
                reporter.finish_stage();
                return Ok(Arc::clone(session));
            }
            tracing::info!(
                "Evicting loaded model {} for {}",
                session.model_id(),
                model_id
            );
            cache.active = None;
        }

        reporter.enter(GenerationStage::TokenizerLoad);
        self.runtime.load_tokenizer(model_id).await?;
        reporter.finish_stage();

        reporter.enter(GenerationStage::ModelLoad);
        let session = self.runtime.load_model(model_id).await?;
        reporter.finish_stage();

        reporter.enter(GenerationStage::Warmup);
        session.warmup().await?;
        reporter.finish_stage();

        cache.active = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drop any loaded model, e.g. to release memory between sessions.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.active = None;
    }
}

#[async_trait]
impl GenerationProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        hooks: &GenerationHooks,
    ) -> Result<String, RagError> {
        let mut reporter = StageReporter::new(hooks.on_progress.clone());
        let session = self.ensure_session(&request.model_id, &mut reporter).await?;

        reporter.enter(GenerationStage::Generating);
        let mut rx = session.start_generation(&request).await?;

        let budget = request.max_tokens.unwrap_or(1024).max(1);
        let mut text = String::new();
        let mut produced = 0u32;

        while let Some(item) = rx.recv().await {
            if hooks.interrupt.is_raised() {
                tracing::debug!("Generation interrupted after {} tokens", produced);
                break;
            }
            let token = item?;
            hooks.emit_token(&token);
            text.push_str(&token);
            produced += 1;
            reporter.report((produced as f32 / budget as f32 * 100.0).min(99.0));
        }

        reporter.enter(GenerationStage::Complete);
        reporter.finish_stage();
        Ok(text)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError> {
        let mut reporter = StageReporter::new(None);
        let session = self.ensure_session(model_id, &mut reporter).await?;
        session.embed(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ScriptedRuntime {
        tokens: Vec<String>,
        loads: AtomicUsize,
    }

    impl ScriptedRuntime {
        fn new(tokens: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                tokens: tokens.iter().map(|t| t.to_string()).collect(),
                loads: AtomicUsize::new(0),
            })
        }
    }

    struct ScriptedSession {
        model_id: String,
        tokens: Vec<String>,
    }

    #[async_trait]
    impl ModelRuntime for ScriptedRuntime {
        async fn load_tokenizer(&self, _model_id: &str) -> Result<(), RagError> {
            Ok(())
        }

        async fn load_model(&self, model_id: &str) -> Result<Arc<dyn ModelSession>, RagError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedSession {
                model_id: model_id.to_string(),
                tokens: self.tokens.clone(),
            }))
        }
    }

    #[async_trait]
    impl ModelSession for ScriptedSession {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        async fn start_generation(
            &self,
            _request: &GenerationRequest,
        ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
            let (tx, rx) = mpsc::channel(8);
            let tokens = self.tokens.clone();
            tokio::spawn(async move {
                for token in tokens {
                    if tx.send(Ok(token)).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest::new(vec![], model)
    }

    #[tokio::test]
    async fn returned_text_equals_concatenated_tokens() {
        let runtime = ScriptedRuntime::new(&["Hel", "lo ", "there"]);
        let provider = LocalProvider::new(runtime);

        let forwarded: Arc<StdMutex<String>> = Arc::default();
        let sink = Arc::clone(&forwarded);
        let hooks = GenerationHooks {
            on_token: Some(Arc::new(move |tok: &str| {
                sink.lock().unwrap().push_str(tok);
            })),
            ..Default::default()
        };

        let text = provider.generate(request("m1"), &hooks).await.unwrap();
        assert_eq!(text, "Hello there");
        assert_eq!(*forwarded.lock().unwrap(), text);
    }

    #[tokio::test]
    async fn interrupt_returns_partial_prefix_not_an_error() {
        let runtime = ScriptedRuntime::new(&["a", "b", "c", "d"]);
        let provider = LocalProvider::new(runtime);

        let hooks = GenerationHooks::default();
        let interrupt = hooks.interrupt.clone();

        let forwarded: Arc<StdMutex<String>> = Arc::default();
        let sink = Arc::clone(&forwarded);
        let hooks = GenerationHooks {
            on_token: Some(Arc::new(move |tok: &str| {
                sink.lock().unwrap().push_str(tok);
            })),
            interrupt: interrupt.clone(),
            ..hooks
        };

        interrupt.raise();
        let text = provider.generate(request("m1"), &hooks).await.unwrap();

        assert_eq!(text, "");
        assert_eq!(*forwarded.lock().unwrap(), text);
        assert!("abcd".starts_with(&text));
    }

    #[tokio::test]
    async fn model_switch_evicts_and_reloads() {
        let runtime = ScriptedRuntime::new(&["x"]);
        let provider = LocalProvider::new(Arc::clone(&runtime) as Arc<dyn ModelRuntime>);
        let hooks = GenerationHooks::default();

        provider.generate(request("m1"), &hooks).await.unwrap();
        provider.generate(request("m1"), &hooks).await.unwrap();
        assert_eq!(runtime.loads.load(Ordering::SeqCst), 1);

        provider.generate(request("m2"), &hooks).await.unwrap();
        assert_eq!(runtime.loads.load(Ordering::SeqCst), 2);

        provider.generate(request("m1"), &hooks).await.unwrap();
        assert_eq!(runtime.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stages_are_reported_in_order() {
        let runtime = ScriptedRuntime::new(&["t"]);
        let provider = LocalProvider::new(runtime);

        let stages: Arc<StdMutex<Vec<GenerationStage>>> = Arc::default();
        let sink = Arc::clone(&stages);
        let hooks = GenerationHooks {
            on_progress: Some(Arc::new(move |stage, _pct| {
                let mut seen = sink.lock().unwrap();
                if seen.last() != Some(&stage) {
                    seen.push(stage);
                }
            })),
            ..Default::default()
        };

        provider.generate(request("m1"), &hooks).await.unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                GenerationStage::TokenizerLoad,
                GenerationStage::ModelLoad,
                GenerationStage::Warmup,
                GenerationStage::Generating,
                GenerationStage::Complete,
            ]
        );
    }
}
