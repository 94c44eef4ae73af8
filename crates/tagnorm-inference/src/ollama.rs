//! Ollama chat backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use tagnorm_core::{Error, GenerationBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = tagnorm_core::defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = tagnorm_core::defaults::GEN_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = tagnorm_core::defaults::GEN_TIMEOUT_SECS;

/// Positive whole seconds, or the default for anything else.
fn parse_timeout_secs(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(GEN_TIMEOUT_SECS)
}

/// Ollama generation backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
    temperature: f32,
    top_p: f32,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL.to_string(), DEFAULT_GEN_MODEL.to_string())
    }

    /// Create a new Ollama backend with custom configuration.
    ///
    /// The generation timeout still honors `TAGNORM_GEN_TIMEOUT_SECS`.
    pub fn with_config(base_url: String, gen_model: String) -> Self {
        let gen_timeout = parse_timeout_secs(std::env::var("TAGNORM_GEN_TIMEOUT_SECS").ok());
        Self::build(base_url, gen_model, gen_timeout)
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OLLAMA_BASE` | `http://127.0.0.1:11434` |
    /// | `OLLAMA_GEN_MODEL` | `gpt-oss:20b` |
    /// | `TAGNORM_GEN_TIMEOUT_SECS` | `120` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from any key lookup, with the same variables and defaults as
    /// [`OllamaBackend::from_env`]. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base_url = non_blank("OLLAMA_BASE").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            non_blank("OLLAMA_GEN_MODEL").unwrap_or_else(|| DEFAULT_GEN_MODEL.to_string());
        let gen_timeout = parse_timeout_secs(lookup("TAGNORM_GEN_TIMEOUT_SECS"));

        Self::build(base_url, gen_model, gen_timeout)
    }

    fn build(base_url: String, gen_model: String, gen_timeout: u64) -> Self {
        // Every request also carries its own timeout; the client-level one
        // covers connection setup.
        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .unwrap_or_default();

        let base_url = base_url.trim_end_matches('/').to_string();

        info!(
            "Initializing Ollama backend: url={}, gen={}, timeout={}s",
            base_url, gen_model, gen_timeout
        );

        Self {
            client,
            base_url,
            gen_model,
            gen_timeout_secs: gen_timeout,
            temperature: tagnorm_core::defaults::TEMPERATURE,
            top_p: tagnorm_core::defaults::TOP_P,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.gen_timeout_secs = secs.max(1);
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.gen_timeout_secs
    }

    /// Send one non-streaming request to the `/api/chat` endpoint.
    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status,
                tagnorm_core::error::snippet(&body)
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > tagnorm_core::defaults::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Sampling options sent with every request.
#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt).await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(
                tagnorm_core::defaults::HEALTH_TIMEOUT_SECS,
            ))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}


/// Integration tests that require a live Ollama server.
/// Run with: cargo test --package tagnorm-inference --features integration
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_live_health_check() {
        let backend = OllamaBackend::from_env();
        let healthy = backend.health_check().await.expect("health check failed");
        assert!(healthy, "Ollama should be healthy and reachable");
    }

    #[tokio::test]
    async fn test_live_json_array_answer() {
        let backend = OllamaBackend::from_env();
        let response = backend
            .generate_with_system(
                "Answer only with a JSON array of the input tags, lowercased.",
                "{\"tags\":[\"Rock\"]}",
            )
            .await
            .expect("generation failed");
        let items = crate::parse_json_array(crate::Stage::Canonicalize, &response)
            .expect("response should be a JSON array");
        assert!(!items.is_empty());
    }
}
