//! Ollama REST provider.
//!
//! Same shape as the OpenAI-compatible provider but against Ollama's
//! `/api/chat` (JSON-lines stream) and `/api/embeddings` (single input per
//! call) endpoints.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::RagError;

use super::provider::{EmbeddingProvider, GenerationProvider};
use super::types::{GenerationHooks, GenerationRequest, GenerationStage, StageReporter};

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        hooks: &GenerationHooks,
    ) -> Result<String, RagError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut options = json!({});
        if let Some(t) = request.temperature {
            options["temperature"] = json!(t);
        }
        if let Some(n) = request.max_tokens {
            options["num_predict"] = json!(n);
        }
        if let Some(s) = &request.stop {
            options["stop"] = json!(s);
        }

        let body = json!({
            "model": request.model_id,
            "messages": request.messages,
            "stream": true,
            "options": options,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::provider)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::ProviderUnavailable(format!(
                "chat endpoint error: {}",
                text
            )));
        }

        let mut reporter = StageReporter::new(hooks.on_progress.clone());
        reporter.enter(GenerationStage::Generating);

        let budget = request.max_tokens.unwrap_or(1024).max(1);
        let mut stream = res.bytes_stream();
        let mut pending = String::new();
        let mut text = String::new();
        let mut produced = 0u32;

        'outer: while let Some(item) = stream.next().await {
            let bytes = item.map_err(RagError::provider)?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..newline + 1).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Ok(payload) = serde_json::from_str::<Value>(line) else {
                    continue;
                };
                if let Some(token) = payload["message"]["content"].as_str() {
                    if !token.is_empty() {
                        if hooks.interrupt.is_raised() {
                            break 'outer;
                        }
                        hooks.emit_token(token);
                        text.push_str(token);
                        produced += 1;
                        reporter.report((produced as f32 / budget as f32 * 100.0).min(99.0));
                    }
                }
                if payload["done"].as_bool() == Some(true) {
                    break 'outer;
                }
            }
        }

        reporter.enter(GenerationStage::Complete);
        reporter.finish_stage();
        Ok(text)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({
            "model": model_id,
            "prompt": text,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::provider)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::ProviderUnavailable(format!(
                "embeddings endpoint error: {}",
                text
            )));
        }

        let payload: Value = res.json().await.map_err(RagError::provider)?;
        serde_json::from_value(payload["embedding"].clone())
            .map_err(|_| RagError::ProviderUnavailable("invalid embedding response".to_string()))
    }
}
