//! Google Gemini adapter.
//!
//! Calls the native `generateContent` endpoint. Quota exhaustion shows up as
//! HTTP 429 with status `RESOURCE_EXHAUSTED`; an invalid key as HTTP 400 with
//! reason `API_KEY_INVALID`.

pub mod client;
pub mod types;

pub use client::GeminiAdapter;
