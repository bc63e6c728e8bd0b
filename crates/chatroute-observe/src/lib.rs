//! Observability setup shared by the chatroute binaries.

pub mod genai_attrs;
pub mod span;
pub mod tracing_setup;
