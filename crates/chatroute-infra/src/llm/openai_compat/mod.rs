//! OpenAI-compatible adapter.
//!
//! A single [`OpenAiCompatibleAdapter`] serves OpenAI, Groq, Mistral,
//! OpenRouter and any other `/chat/completions` endpoint via a configurable
//! base URL.

pub mod config;
pub mod types;

use chatroute_core::llm::adapter::CompletionAdapter;
use chatroute_core::llm::credential_pool::CredentialLease;
use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use self::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::llm::classify::{decode_body, failure_from_response, failure_from_transport};

/// Adapter for any OpenAI-compatible API. Bearer token auth.
///
/// Does NOT derive Debug, same as the other adapters.
pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    provider_id: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        client: reqwest::Client,
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &AdapterRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system_instruction.is_empty() {
            messages.push(ChatMessage::new("system", &request.system_instruction));
        }
        messages.push(ChatMessage::new("user", &request.message));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        }
    }

    fn to_reply(&self, response: ChatCompletionResponse) -> Result<AdapterReply, ProviderFailure> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderFailure::malformed("response contained no choices"))?;

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderFailure::malformed(format!(
                "response contained no text (finish_reason: {})",
                choice.finish_reason.as_deref().unwrap_or("none")
            )));
        }

        let tokens_used = response.usage.and_then(|u| {
            u.total_tokens.or_else(|| match (u.prompt_tokens, u.completion_tokens) {
                (None, None) => None,
                (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
            })
        });

        Ok(AdapterReply {
            text,
            tokens_used,
            model: Some(response.model.unwrap_or_else(|| self.model.clone())),
        })
    }
}

impl CompletionAdapter for OpenAiCompatibleAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        credential: &CredentialLease,
        request: &AdapterRequest,
    ) -> Result<AdapterReply, ProviderFailure> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.url())
            .bearer_auth(credential.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(failure_from_transport)?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let text = response.text().await.map_err(failure_from_transport)?;
        let parsed: ChatCompletionResponse = decode_body(&text)?;
        self.to_reply(parsed)
    }
}
