use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Backend selection, one concrete provider per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    LmStudio,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub model_id: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop: Option<Vec<String>>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>, model_id: impl Into<String>) -> Self {
        Self {
            messages,
            model_id: model_id.into(),
            max_tokens: None,
            temperature: None,
            stop: None,
        }
    }
}

/// Sequential generation stages. Stages never repeat within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStage {
    TokenizerLoad,
    ModelLoad,
    Warmup,
    Generating,
    Complete,
    Error,
}

pub type StageProgressFn = Arc<dyn Fn(GenerationStage, f32) + Send + Sync>;
pub type TokenFn = Arc<dyn Fn(&str) + Send + Sync>;
pub type BatchProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Cooperative cancellation flag, observed at token boundaries.
#[derive(Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Callback bundle handed to a generation call.
#[derive(Clone, Default)]
pub struct GenerationHooks {
    pub on_progress: Option<StageProgressFn>,
    pub on_token: Option<TokenFn>,
    pub interrupt: Interrupt,
}

impl GenerationHooks {
    pub fn emit_token(&self, token: &str) {
        if let Some(cb) = &self.on_token {
            cb(token);
        }
    }
}

/// Enforces the stage-progress contract on behalf of providers: progress is
/// clamped to `[0, 100]`, monotonic within a stage, and stages only advance.
pub struct StageReporter {
    callback: Option<StageProgressFn>,
    stage: GenerationStage,
    last: f32,
}

impl StageReporter {
    pub fn new(callback: Option<StageProgressFn>) -> Self {
        Self {
            callback,
            stage: GenerationStage::TokenizerLoad,
            last: 0.0,
        }
    }

    pub fn enter(&mut self, stage: GenerationStage) {
        if stage > self.stage {
            self.stage = stage;
            self.last = 0.0;
        }
        self.report(0.0);
    }

    pub fn report(&mut self, percent: f32) {
        let percent = percent.clamp(0.0, 100.0).max(self.last);
        self.last = percent;
        if let Some(cb) = &self.callback {
            cb(self.stage, percent);
        }
    }

    pub fn finish_stage(&mut self) {
        self.report(100.0);
    }
}
