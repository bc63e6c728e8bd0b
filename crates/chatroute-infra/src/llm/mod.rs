//! LLM provider adapters.
//!
//! Concrete implementations of the
//! [`CompletionAdapter`](chatroute_core::llm::adapter::CompletionAdapter) trait defined in
//! `chatroute-core`: Gemini, OpenAI-compatible endpoints and Anthropic.
//!
//! Also provides the adapter factory ([`create_adapter`]) that resolves a
//! [`ProviderConfig`] into a [`BoxCompletionAdapter`], and a connection test
//! ([`test_provider_connection`]) for verifying a single credential.

pub mod anthropic;
pub mod classify;
pub mod gemini;
pub mod openai_compat;

use std::time::Duration;

use chatroute_core::llm::box_adapter::BoxCompletionAdapter;
use chatroute_core::llm::credential_pool::CredentialLease;
use chatroute_types::config::ProviderConfig;
use chatroute_types::error::RouterError;
use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use self::anthropic::AnthropicAdapter;
use self::gemini::GeminiAdapter;
use self::openai_compat::OpenAiCompatibleAdapter;

/// Connect timeout for upstream calls. The overall per-call deadline is
/// enforced by the router.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by every adapter.
pub fn build_http_client() -> Result<reqwest::Client, RouterError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("chatroute/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RouterError::HttpClient(e.to_string()))
}

/// Create a [`BoxCompletionAdapter`] from a [`ProviderConfig`].
///
/// # Errors
///
/// Returns [`RouterError::InvalidProvider`] if the model is empty, the base
/// URL does not parse, or an OpenAI-compatible provider has neither a base
/// URL nor a well-known id.
pub fn create_adapter(
    config: &ProviderConfig,
    client: &reqwest::Client,
) -> Result<BoxCompletionAdapter, RouterError> {
    let invalid = |reason: String| RouterError::InvalidProvider {
        provider: config.id.clone(),
        reason,
    };

    if config.model.trim().is_empty() {
        return Err(invalid("model must not be empty".to_string()));
    }
    if let Some(base_url) = config.base_url.as_deref() {
        validate_base_url(base_url).map_err(invalid)?;
    }

    let client = client.clone();
    let adapter = match config.kind {
        ProviderKind::Gemini => {
            let adapter = GeminiAdapter::new(client, &config.id, &config.model);
            match config.base_url.as_deref() {
                Some(url) => BoxCompletionAdapter::new(adapter.with_base_url(url)),
                None => BoxCompletionAdapter::new(adapter),
            }
        }
        ProviderKind::Anthropic => {
            let adapter = AnthropicAdapter::new(client, &config.id, &config.model);
            match config.base_url.as_deref() {
                Some(url) => BoxCompletionAdapter::new(adapter.with_base_url(url)),
                None => BoxCompletionAdapter::new(adapter),
            }
        }
        ProviderKind::OpenAiCompatible => {
            let base_url = config
                .base_url
                .clone()
                .or_else(|| openai_compat::config::default_base_url(&config.id).map(String::from))
                .ok_or_else(|| {
                    invalid("base_url is required for this openai_compatible provider".to_string())
                })?;
            BoxCompletionAdapter::new(OpenAiCompatibleAdapter::new(
                client,
                &config.id,
                base_url,
                &config.model,
            ))
        }
    };

    Ok(adapter)
}

fn validate_base_url(base_url: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(base_url).map_err(|e| format!("invalid base_url '{base_url}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("base_url must use http or https, got '{other}'")),
    }
}

/// Test one credential by sending a minimal completion request.
///
/// Used by `chatroute status --probe`. The outcome is not fed back into the
/// credential pool.
pub async fn test_provider_connection(
    adapter: &BoxCompletionAdapter,
    credential: &CredentialLease,
) -> Result<AdapterReply, ProviderFailure> {
    let request = AdapterRequest {
        system_instruction: String::new(),
        message: "Hello".to_string(),
        max_output_tokens: 10,
        temperature: 0.0,
    };
    adapter.complete(credential, &request).await
}
