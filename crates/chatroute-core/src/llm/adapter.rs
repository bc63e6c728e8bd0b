//! CompletionAdapter trait definition.
//!
//! One adapter per upstream provider. An adapter turns an [`AdapterRequest`]
//! plus a leased credential into a single HTTP call and classifies whatever
//! comes back into an [`AdapterReply`] or a [`ProviderFailure`].
//!
//! Adapters never retry and never touch the credential pool; rotation and
//! back-off belong to the router.

use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use super::credential_pool::CredentialLease;

/// Trait for upstream LLM backends (Gemini, OpenAI-compatible, Anthropic).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Use
/// [`BoxCompletionAdapter`](super::box_adapter::BoxCompletionAdapter) when
/// the concrete type is chosen at runtime.
///
/// Implementations live in chatroute-infra.
pub trait CompletionAdapter: Send + Sync {
    /// Provider id reported in response metadata (e.g. "gemini", "groq").
    fn provider_id(&self) -> &str;

    /// Wire protocol this adapter speaks.
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent upstream.
    fn model(&self) -> &str;

    /// Perform one completion call with the given credential.
    fn complete(
        &self,
        credential: &CredentialLease,
        request: &AdapterRequest,
    ) -> impl std::future::Future<Output = Result<AdapterReply, ProviderFailure>> + Send;
}
