use crate::config::LlmSettings;
use crate::constants::{defaults, endpoints};
use crate::error::RelayError;
use crate::llm::sse::decode_body;
use crate::llm::traits::*;
use serde::Serialize;

/// Streaming client for any OpenAI-compatible chat completions endpoint.
/// Defaults to Groq.
pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiGateway {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: defaults::DEFAULT_MODEL.to_string(),
            base_url: endpoints::GROQ_BASE_URL.to_string(),
            max_tokens: defaults::MAX_TOKENS,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(settings.api_key.clone())
            .with_model(settings.model.clone())
            .with_base_url(settings.base_url.clone())
            .with_max_tokens(settings.max_tokens)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            endpoints::CHAT_COMPLETIONS_PATH
        )
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    max_tokens: u32,
    stream: bool,
}

#[async_trait::async_trait]
impl ModelGateway for OpenAiGateway {
    async fn stream(&self, context: &[Turn]) -> Result<FragmentStream, RelayError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: context,
            max_tokens: self.max_tokens,
            stream: true,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("model gateway rejected request ({}): {}", status, text);
            return Err(RelayError::rejected(status.as_u16(), text));
        }

        Ok(decode_body(response.bytes_stream()))
    }
}
