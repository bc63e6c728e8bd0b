//! AnthropicAdapter -- [`CompletionAdapter`] for the Anthropic Messages API.
//!
//! Sends requests to `/v1/messages` with the `x-api-key` and
//! `anthropic-version` headers. HTTP 529 (overloaded) is classified as a
//! transient failure.

use chatroute_core::llm::adapter::CompletionAdapter;
use chatroute_core::llm::credential_pool::CredentialLease;
use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use super::types::{AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse};
use crate::llm::classify::{decode_body, failure_from_response, failure_from_transport};

/// Anthropic Claude adapter.
///
/// Does not derive Debug; keys arrive per call through the lease and are
/// only exposed while building request headers.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    provider_id: String,
    base_url: String,
    model: String,
}

impl AnthropicAdapter {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn new(client: reqwest::Client, provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            provider_id: provider_id.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn to_anthropic_request(&self, request: &AdapterRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_output_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.message.clone(),
            }],
            system: (!request.system_instruction.is_empty())
                .then(|| request.system_instruction.clone()),
            temperature: request.temperature,
        }
    }

    fn to_reply(&self, response: AnthropicResponse) -> Result<AdapterReply, ProviderFailure> {
        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderFailure::malformed(format!(
                "response contained no text (stop_reason: {})",
                response.stop_reason.as_deref().unwrap_or("none")
            )));
        }

        Ok(AdapterReply {
            text,
            tokens_used: response.usage.map(|u| u.input_tokens + u.output_tokens),
            model: Some(response.model.unwrap_or_else(|| self.model.clone())),
        })
    }
}

impl CompletionAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        credential: &CredentialLease,
        request: &AdapterRequest,
    ) -> Result<AdapterReply, ProviderFailure> {
        let body = self.to_anthropic_request(request);

        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", credential.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(failure_from_transport)?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let text = response.text().await.map_err(failure_from_transport)?;
        let parsed: AnthropicResponse = decode_body(&text)?;
        self.to_reply(parsed)
    }
}
