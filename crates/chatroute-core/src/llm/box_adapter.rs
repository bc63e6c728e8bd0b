//! BoxCompletionAdapter -- object-safe dynamic dispatch wrapper for CompletionAdapter.
//!
//! 1. Define an object-safe `CompletionAdapterDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionAdapterDyn` for all `T: CompletionAdapter`
//! 3. `BoxCompletionAdapter` wraps `Box<dyn CompletionAdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chatroute_types::llm::{AdapterReply, AdapterRequest, ProviderFailure, ProviderKind};

use super::adapter::CompletionAdapter;
use super::credential_pool::CredentialLease;

/// Object-safe version of [`CompletionAdapter`] with boxed futures.
pub trait CompletionAdapterDyn: Send + Sync {
    fn provider_id(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        credential: &'a CredentialLease,
        request: &'a AdapterRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AdapterReply, ProviderFailure>> + Send + 'a>>;
}

/// Blanket implementation: any `CompletionAdapter` automatically implements `CompletionAdapterDyn`.
impl<T: CompletionAdapter> CompletionAdapterDyn for T {
    fn provider_id(&self) -> &str {
        CompletionAdapter::provider_id(self)
    }

    fn kind(&self) -> ProviderKind {
        CompletionAdapter::kind(self)
    }

    fn model(&self) -> &str {
        CompletionAdapter::model(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        credential: &'a CredentialLease,
        request: &'a AdapterRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AdapterReply, ProviderFailure>> + Send + 'a>> {
        Box::pin(self.complete(credential, request))
    }
}

/// Type-erased adapter for runtime provider selection.
///
/// Since `CompletionAdapter` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxCompletionAdapter` provides the same methods and delegates
/// to the inner `CompletionAdapterDyn` trait object.
pub struct BoxCompletionAdapter {
    inner: Box<dyn CompletionAdapterDyn + Send + Sync>,
}

impl BoxCompletionAdapter {
    /// Wrap a concrete `CompletionAdapter` in a type-erased box.
    pub fn new<T: CompletionAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    pub fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    pub fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Perform one completion call with the given credential.
    pub async fn complete(
        &self,
        credential: &CredentialLease,
        request: &AdapterRequest,
    ) -> Result<AdapterReply, ProviderFailure> {
        self.inner.complete_boxed(credential, request).await
    }
}
