//! OpenAI-compatible chat completion backend
//!
//! Targets local servers that speak the `/chat/completions` dialect
//! (llama-server, LM Studio, vLLM). Transport and HTTP errors are folded into
//! [`BackendOutcome::Failed`]; nothing escapes as an error.

mod models;
pub use models::*;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client};

use super::{BackendOutcome, GenerationBackend, GenerationRequest};
use crate::config::{OpenAiCompatConfig, ServiceConfig};
use crate::error::{GenerationError, Result};
use crate::util::truncate_string;

const USER_AGENT: &str = concat!("structured-output/", env!("CARGO_PKG_VERSION"));

/// OpenAI-compatible HTTP backend
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend {
    http_client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatBackend {
    /// Create a backend with its own HTTP client
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        if let Some(ref key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| GenerationError::configuration(format!("Invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                GenerationError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    /// Request body for one generation
    pub fn build_request(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt()));

        ChatCompletionRequest {
            model: request.model().to_string(),
            messages,
            temperature: self.config.sampling.temperature,
            top_p: self.config.sampling.top_p,
            max_tokens: self.config.sampling.max_tokens,
            stream: false,
        }
    }

    /// Send a chat completion request
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self.http_client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(GenerationError::backend(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                truncate_string(&body, 512)
            )));
        }

        Ok(response.json::<ChatCompletionResponse>().await?)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &'static str {
        "openai-compat"
    }

    async fn generate(&self, request: &GenerationRequest) -> BackendOutcome {
        let body = self.build_request(request);
        let start = Instant::now();

        let response = match self.chat_completion(&body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                return BackendOutcome::failed(e.to_string());
            }
        };
        debug!("Chat completion returned in {:?}", start.elapsed());

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            warn!("Chat completion returned no content");
            return BackendOutcome::failed("no completion content returned");
        }

        BackendOutcome::completed(content)
    }
}
