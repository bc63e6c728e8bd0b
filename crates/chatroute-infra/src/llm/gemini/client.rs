//! GeminiAdapter -- [`CompletionAdapter`] for the Gemini `generateContent` API.

use chatroute_core::llm::adapter::CompletionAdapter;
use chatroute_core::llm::credential_pool::CredentialLease;
use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use super::types::{GeminiContent, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::llm::classify::{decode_body, failure_from_response, failure_from_transport};

/// Gemini adapter. The key travels in the `x-goog-api-key` header.
///
/// Does not derive Debug; the HTTP client is shared and credentials are
/// supplied per call.
pub struct GeminiAdapter {
    client: reqwest::Client,
    provider_id: String,
    base_url: String,
    model: String,
}

impl GeminiAdapter {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(client: reqwest::Client, provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            provider_id: provider_id.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Override the base URL (tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn to_gemini_request(request: &AdapterRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: GeminiContent::text(None, &request.system_instruction),
            contents: vec![GeminiContent::text(Some("user"), &request.message)],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            },
        }
    }

    fn to_reply(&self, response: GenerateContentResponse) -> Result<AdapterReply, ProviderFailure> {
        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .or_else(|| response.candidates.first().and_then(|c| c.finish_reason.clone()))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(ProviderFailure::malformed(format!(
                "response contained no text ({reason})"
            )));
        }

        let tokens_used = response.usage_metadata.and_then(|u| {
            u.total_token_count.or_else(|| match (u.prompt_token_count, u.candidates_token_count) {
                (None, None) => None,
                (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
            })
        });

        Ok(AdapterReply {
            text,
            tokens_used,
            model: Some(response.model_version.unwrap_or_else(|| self.model.clone())),
        })
    }
}

impl CompletionAdapter for GeminiAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        credential: &CredentialLease,
        request: &AdapterRequest,
    ) -> Result<AdapterReply, ProviderFailure> {
        let body = Self::to_gemini_request(request);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", credential.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(failure_from_transport)?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let text = response.text().await.map_err(failure_from_transport)?;
        let parsed: GenerateContentResponse = decode_body(&text)?;
        self.to_reply(parsed)
    }
}
