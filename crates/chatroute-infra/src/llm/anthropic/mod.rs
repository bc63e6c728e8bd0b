//! Anthropic Messages API adapter.
//!
//! Provides [`AnthropicAdapter`], the [`CompletionAdapter`](chatroute_core::llm::adapter::CompletionAdapter)
//! for `/v1/messages`.

pub mod client;
pub mod types;

pub use client::AnthropicAdapter;
