//! RAG orchestrator.
//!
//! Composes the pipeline per query: embed the question, retrieve scoped
//! candidates, build a model-appropriate prompt, stream generation through
//! the thinking splitter and report staged progress. Projects without
//! documents degrade gracefully to open-domain conversation.

use std::sync::{Arc, Mutex as StdMutex};

use crate::core::config::Settings;
use crate::core::errors::RagError;
use crate::llm::registry::ProviderSet;
use crate::llm::splitter::{ThinkingFn, ThinkingSplitter};
use crate::llm::types::{
    BatchProgressFn, GenerationHooks, GenerationRequest, GenerationStage, Interrupt, ProviderKind,
    TokenFn,
};

use super::ingest::{ExtractedDocument, IngestReceipt, Ingestor};
use super::prompt::{
    build_conversational_prompt, build_document_prompt, MarkerPolicy, TemplatePolicy,
};
use super::store::VectorStore;

/// Pipeline stages in execution order. Progress is remapped linearly:
/// embedding 0–20, retrieval 20–40, prompt build ≈40, generation 40–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Embedding,
    Retrieval,
    PromptBuild,
    Generation,
    Complete,
    Error,
}

pub type PipelineProgressFn = Arc<dyn Fn(PipelineStage, f32) + Send + Sync>;

/// Reference to a document the UI shows in the current scope. The engine
/// only needs to know whether any exist; contents live in the store.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub documents: Vec<DocumentRef>,
    pub model_id: String,
    pub provider: ProviderKind,
    pub embedding_model: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Clone, Default)]
pub struct QueryHooks {
    pub on_progress: Option<PipelineProgressFn>,
    pub on_token: Option<TokenFn>,
    pub on_thinking: Option<ThinkingFn>,
    pub interrupt: Interrupt,
}

pub struct RagEngine {
    settings: Settings,
    store: Arc<VectorStore>,
    ingestor: Ingestor,
    providers: ProviderSet,
    template_policy: Arc<dyn TemplatePolicy>,
}

impl RagEngine {
    pub fn new(settings: Settings, store: Arc<VectorStore>, providers: ProviderSet) -> Self {
        let ingestor = Ingestor::new(
            Arc::clone(&store),
            settings.chunk_size,
            settings.chunk_overlap,
        );
        Self {
            settings,
            store,
            ingestor,
            providers,
            template_policy: Arc::new(MarkerPolicy::default()),
        }
    }

    pub fn with_template_policy(mut self, policy: Arc<dyn TemplatePolicy>) -> Self {
        self.template_policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Answer a question. Recoverable failures come back as user-readable
    /// answer text; dimension mismatches propagate — they mean two embedding
    /// providers were mixed in one project and must not be hidden.
    pub async fn query_documents(
        &self,
        request: QueryRequest,
        hooks: QueryHooks,
    ) -> Result<String, RagError> {
        match self.run_query(&request, &hooks).await {
            Ok(answer) => {
                report(&hooks, PipelineStage::Complete, 100.0);
                Ok(answer)
            }
            Err(err) if err.is_invariant_violation() => Err(err),
            Err(err) => {
                tracing::warn!("Query failed: {}", err);
                report(&hooks, PipelineStage::Error, 100.0);
                Ok(err.user_message())
            }
        }
    }

    /// Index one extracted document. Returns the assigned document id.
    pub async fn ingest(
        &self,
        document: ExtractedDocument,
        project_id: &str,
        provider: ProviderKind,
        embedding_model: Option<&str>,
        on_progress: Option<&BatchProgressFn>,
    ) -> Result<IngestReceipt, RagError> {
        let embedder = self.providers.embedding(provider)?;
        let model = embedding_model.unwrap_or(&self.settings.embedding_model);
        self.ingestor
            .ingest(document, project_id, embedder.as_ref(), model, on_progress)
            .await
    }

    pub async fn remove_document(&self, document_id: &str) -> Result<usize, RagError> {
        self.ingestor.remove_document(document_id).await
    }

    pub async fn remove_project(&self, project_id: &str) -> Result<usize, RagError> {
        self.ingestor.remove_project(project_id).await
    }

    async fn run_query(
        &self,
        request: &QueryRequest,
        hooks: &QueryHooks,
    ) -> Result<String, RagError> {
        let project = request.project_id.as_deref();

        // No documents in scope: answer from general knowledge instead of
        // erroring. Retrieval and prompt build are skipped entirely.
        if request.documents.is_empty() {
            tracing::debug!("No documents in scope, falling back to open conversation");
            let messages = build_conversational_prompt(&request.question);
            return self.generate(messages, request, hooks).await;
        }

        // Documents exist but nothing is indexed: tell the user to
        // (re-)upload rather than pretending nothing matched.
        let index = self.store.verify(None, project).await;
        if !index.exists {
            return Err(RagError::NoDocumentsIndexed);
        }

        report(hooks, PipelineStage::Embedding, 0.0);
        let embedder = self.providers.embedding(request.provider)?;
        let embedding_model = request
            .embedding_model
            .as_deref()
            .unwrap_or(&self.settings.embedding_model);
        let query_vector = embedder.embed(&request.question, embedding_model).await?;
        report(hooks, PipelineStage::Embedding, 20.0);

        report(hooks, PipelineStage::Retrieval, 20.0);
        let top_k = self.settings.top_k.max(1);
        let min_score = self.settings.min_score;
        let relevant = |results: Vec<super::store::QueryResult>| {
            results
                .into_iter()
                .filter(|r| r.score >= min_score)
                .collect::<Vec<_>>()
        };

        let mut results = relevant(self.store.query(&query_vector, top_k, project).await?);
        if results.is_empty() {
            // One retry with a wider net guards against an unlucky k, not
            // against a truly empty corpus.
            let wider = top_k * self.settings.retry_k_factor.max(2);
            tracing::debug!("Zero hits at k={}, retrying once at k={}", top_k, wider);
            results = relevant(self.store.query(&query_vector, wider, project).await?);
        }
        if results.is_empty() {
            return Err(RagError::NoRelevantMatch);
        }
        report(hooks, PipelineStage::Retrieval, 40.0);

        report(hooks, PipelineStage::PromptBuild, 40.0);
        let template = self.template_policy.select(&request.model_id);
        let messages = build_document_prompt(&request.question, results, template);

        self.generate(messages, request, hooks).await
    }

    async fn generate(
        &self,
        messages: Vec<crate::llm::types::ChatMessage>,
        request: &QueryRequest,
        hooks: &QueryHooks,
    ) -> Result<String, RagError> {
        report(hooks, PipelineStage::Generation, 40.0);

        let generator = self.providers.generation(request.provider)?;
        let generation_request = GenerationRequest::new(messages, request.model_id.clone());

        // Fresh splitter per call; state never leaks across queries.
        let splitter = Arc::new(StdMutex::new(ThinkingSplitter::new(
            hooks.on_thinking.clone(),
        )));

        let token_splitter = Arc::clone(&splitter);
        let outer_token = hooks.on_token.clone();
        let on_token: TokenFn = Arc::new(move |token: &str| {
            let visible = token_splitter
                .lock()
                .map(|mut s| s.push(token))
                .unwrap_or_default();
            if visible.is_empty() {
                return;
            }
            if let Some(cb) = &outer_token {
                cb(&visible);
            }
        });

        let outer_progress = hooks.on_progress.clone();
        let last_pct = Arc::new(StdMutex::new(40.0f32));
        let on_progress = outer_progress.map(|cb| {
            let last_pct = Arc::clone(&last_pct);
            Arc::new(move |stage: GenerationStage, pct: f32| {
                let overall = remap_generation_progress(stage, pct);
                let mut last = match last_pct.lock() {
                    Ok(guard) => guard,
                    Err(_) => return,
                };
                let overall = overall.max(*last);
                *last = overall;
                cb(PipelineStage::Generation, overall);
            }) as crate::llm::types::StageProgressFn
        });

        let generation_hooks = GenerationHooks {
            on_progress,
            on_token: Some(on_token),
            interrupt: hooks.interrupt.clone(),
        };

        generator.generate(generation_request, &generation_hooks).await?;

        // Flush the splitter; trailing held-back text is visible output and
        // still goes through the caller's token callback.
        let mut splitter = splitter
            .lock()
            .map_err(|_| RagError::Internal("splitter lock poisoned".to_string()))?;
        let tail = splitter.finish();
        if !tail.is_empty() {
            if let Some(cb) = &hooks.on_token {
                cb(&tail);
            }
        }

        Ok(splitter.answer().to_string())
    }
}

fn report(hooks: &QueryHooks, stage: PipelineStage, percent: f32) {
    if let Some(cb) = &hooks.on_progress {
        cb(stage, percent);
    }
}

/// Remap the provider's per-stage 0–100 into the pipeline's 40–100 band.
fn remap_generation_progress(stage: GenerationStage, pct: f32) -> f32 {
    let (lo, hi) = match stage {
        GenerationStage::TokenizerLoad => (40.0, 44.0),
        GenerationStage::ModelLoad => (44.0, 54.0),
        GenerationStage::Warmup => (54.0, 58.0),
        GenerationStage::Generating => (58.0, 99.0),
        GenerationStage::Complete | GenerationStage::Error => (100.0, 100.0),
    };
    lo + pct.clamp(0.0, 100.0) / 100.0 * (hi - lo)
}
