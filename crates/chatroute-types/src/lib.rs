//! Shared domain types for chatroute.
//!
//! This crate contains the data shapes used across the workspace: chat
//! requests and responses, adapter requests/replies, the provider failure
//! taxonomy, status snapshots, and the configuration file schema.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod llm;
