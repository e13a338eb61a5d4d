//! OpenAI-compatible chat/completions provider (LM Studio and friends).

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::RagError;

use super::provider::{EmbeddingProvider, GenerationProvider};
use super::types::{BatchProgressFn, GenerationHooks, GenerationRequest, GenerationStage, StageReporter};

/// Items per embeddings request when batching.
const EMBED_BATCH_SIZE: usize = 8;

#[derive(Clone)]
pub struct LmStudioProvider {
    base_url: String,
    client: Client,
}

impl LmStudioProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl GenerationProvider for LmStudioProvider {
    fn name(&self) -> &str {
        "lmstudio"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        hooks: &GenerationHooks,
    ) -> Result<String, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": request.model_id,
            "messages": request.messages,
            "stream": true,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

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
        let mut interrupted = false;

        'outer: while let Some(item) = stream.next().await {
            let bytes = item.map_err(RagError::provider)?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..newline + 1).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "data: [DONE]" {
                    break 'outer;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(payload) = serde_json::from_str::<Value>(data) else {
                    continue;
                };
                let Some(token) = payload["choices"][0]["delta"]["content"].as_str() else {
                    continue;
                };
                if token.is_empty() {
                    continue;
                }
                if hooks.interrupt.is_raised() {
                    interrupted = true;
                    break 'outer;
                }
                hooks.emit_token(token);
                text.push_str(token);
                produced += 1;
                reporter.report((produced as f32 / budget as f32 * 100.0).min(99.0));
            }
        }

        if interrupted {
            tracing::debug!("Generation interrupted after {} tokens", produced);
        }
        reporter.enter(GenerationStage::Complete);
        reporter.finish_stage();
        Ok(text)
    }
}

#[async_trait]
impl EmbeddingProvider for LmStudioProvider {
    fn name(&self) -> &str {
        "lmstudio"
    }

    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError> {
        let vectors = self.embed_request(&[text.to_string()], model_id).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::ProviderUnavailable("empty embeddings response".to_string()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        model_id: &str,
        on_progress: Option<&BatchProgressFn>,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let mut part = self.embed_request(batch, model_id).await?;
            if part.len() != batch.len() {
                return Err(RagError::ProviderUnavailable(format!(
                    "embeddings response returned {} vectors for {} inputs",
                    part.len(),
                    batch.len()
                )));
            }
            vectors.append(&mut part);
            if let Some(cb) = on_progress {
                cb(vectors.len() as f32 / texts.len() as f32 * 100.0);
            }
            tokio::task::yield_now().await;
        }
        Ok(vectors)
    }
}

impl LmStudioProvider {
    async fn embed_request(
        &self,
        inputs: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
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

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        Ok(embeddings)
    }
}
