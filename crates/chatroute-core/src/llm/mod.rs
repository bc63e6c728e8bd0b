//! LLM routing.
//!
//! - `CompletionAdapter`: RPITIT trait implemented by each upstream provider
//! - `BoxCompletionAdapter`: object-safe wrapper for dynamic dispatch
//! - `CredentialPool` / `QuotaTracker`: per-credential quota state
//! - `LlmRouter`: rotation, failover and fallback for one chat request

pub mod adapter;
pub mod box_adapter;
pub mod credential_pool;
pub mod directive;
pub mod fallback;
pub mod prompt;
pub mod quota;
pub mod router;

pub use adapter::CompletionAdapter;
pub use box_adapter::BoxCompletionAdapter;
pub use credential_pool::{CredentialLease, CredentialPool, CredentialSpec};
pub use fallback::FallbackResponder;
pub use router::{LlmRouter, RoutedProvider, RouterOptions};
