//! Infrastructure layer for chatroute.
//!
//! HTTP adapters for the providers the router can talk to, plus the
//! configuration loader, secret lookup and the router assembly that ties
//! them to `chatroute-core`.

pub mod builder;
pub mod config;
pub mod llm;
pub mod secret;
