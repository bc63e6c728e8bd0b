//! Request/response types for the LLM provider router.
//!
//! These types model the data shapes that flow between the chat endpoint,
//! the router, and the provider adapters: inbound chat requests, normalized
//! adapter replies, classified provider failures, and status snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Provider name reported in [`ResponseMetadata`] when no upstream call succeeded.
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Business context attached to a chat message.
///
/// `module` names the area of the host application the user is in
/// (e.g. "home", "clientes"). Any other fields sent by the caller are kept
/// in `extra` and forwarded into the instruction block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub module: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatContext {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Inbound request handled by `LlmRouter::process_message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub context: ChatContext,
}

impl ChatRequest {
    /// Convenience constructor for a message in a given module.
    pub fn new(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tenant_id: String::new(),
            user_id: String::new(),
            context: ChatContext::new(module),
        }
    }
}

/// A follow-up operation suggested to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    /// Action kind in `verb-target` form (e.g. "create-cliente").
    pub kind: String,
    /// Short human-readable label for the action.
    pub title: String,
}

impl SuggestedAction {
    pub fn new(kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
        }
    }
}

/// Metadata describing how a [`ChatResponse`] was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Provider id that produced the reply, or [`FALLBACK_PROVIDER`].
    pub provider: String,
    pub tokens_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Set when the caller cancelled the request before any provider replied.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cancelled: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outbound payload returned to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub actions: Vec<SuggestedAction>,
    pub metadata: ResponseMetadata,
}

impl ChatResponse {
    /// Whether this reply came from the deterministic fallback table.
    pub fn is_fallback(&self) -> bool {
        self.metadata.provider == FALLBACK_PROVIDER
    }
}

/// Request handed to a provider adapter for one upstream call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRequest {
    /// Instruction block: persona, language, module, allowed actions.
    pub system_instruction: String,
    /// The user's message text.
    pub message: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Normalized successful reply from a provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterReply {
    /// Raw reply text, possibly ending in an action directive.
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
}

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 429 or a provider-specific quota signal. Rotates the credential.
    QuotaExceeded,
    /// Connection error, timeout, or upstream 5xx. Retried on the same credential.
    TransientNetwork,
    /// The provider answered with something that could not be used.
    MalformedResponse,
    /// The provider rejected the credential (401/403, invalid key).
    AuthRejected,
}

impl FailureKind {
    /// Whether the same request may succeed on a later attempt without
    /// changing anything about the credential itself.
    pub fn retryable(self) -> bool {
        matches!(self, FailureKind::QuotaExceeded | FailureKind::TransientNetwork)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::QuotaExceeded => write!(f, "quota_exceeded"),
            FailureKind::TransientNetwork => write!(f, "transient_network"),
            FailureKind::MalformedResponse => write!(f, "malformed_response"),
            FailureKind::AuthRejected => write!(f, "auth_rejected"),
        }
    }
}

/// A classified failure from a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Retry hint reported by the provider, if any.
    pub retry_after_ms: Option<u64>,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(FailureKind::QuotaExceeded, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TransientNetwork, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AuthRejected, message)
    }

    pub fn with_retry_after(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

/// Upstream API family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini `generateContent`.
    Gemini,
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    /// Anthropic Messages API.
    Anthropic,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAiCompatible => write!(f, "openai_compatible"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai_compatible" | "openai" => Ok(ProviderKind::OpenAiCompatible),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(format!("invalid provider kind: '{other}'")),
        }
    }
}

/// Stable identifier of one credential, e.g. `gemini#2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Default id for the `index`-th (0-based) credential of a provider.
    pub fn indexed(provider_id: &str, index: usize) -> Self {
        Self(format!("{provider_id}#{}", index + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Live,
    /// Quota exhausted; eligible again once its cool-down elapses.
    Exhausted,
    /// Rejected by the provider; excluded for the rest of the process lifetime.
    Disabled,
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialState::Live => write!(f, "live"),
            CredentialState::Exhausted => write!(f, "exhausted"),
            CredentialState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Status of a single credential (for CLI display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatusInfo {
    pub id: CredentialId,
    pub state: CredentialState,
    /// RFC 3339 timestamp of the last quota exhaustion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhausted_since: Option<String>,
    /// Seconds left before an exhausted credential is eligible again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cool_down_remaining_secs: Option<u64>,
}

/// Per-provider credential counts.
///
/// Disabled credentials are included in `exhausted_count` as well as in
/// `disabled_count`, since they can no longer serve requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub live_count: usize,
    pub exhausted_count: usize,
    #[serde(default)]
    pub disabled_count: usize,
    /// Whether at least one credential can be selected right now.
    pub usable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialStatusInfo>,
}

/// Snapshot of every provider, keyed by provider id.
pub type RouterStatus = BTreeMap<String, ProviderStatus>;
