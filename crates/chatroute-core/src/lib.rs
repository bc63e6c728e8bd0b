//! Routing logic for chatroute.
//!
//! Credential pool, quota tracking, provider failover and fallback replies.
//! Depends only on `chatroute-types`; concrete HTTP adapters live in
//! `chatroute-infra` and plug in through [`llm::adapter::CompletionAdapter`].

pub mod llm;
