//! Span attribute names for completion calls.
//!
//! The `gen_ai.*` names follow the OpenTelemetry GenAI semantic conventions.
//! The `chatroute.*` names cover routing details those conventions lack.
//! All constants are usable with `Span::record`.
//!
//! Span naming convention: `"{operation} {module}"` (e.g., `"chat clientes"`).

// --- Required attributes ---

/// The name of the operation being performed (e.g., "chat").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The provider that answered (e.g., "gemini"), or "fallback".
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

/// The model that produced the reply, when the provider reports it.
pub const GEN_AI_RESPONSE_MODEL: &str = "gen_ai.response.model";

/// Total tokens consumed by the call, when reported.
pub const GEN_AI_USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";

// --- Routing attributes ---

/// The module the message was sent from (e.g., "clientes").
pub const CHATROUTE_MODULE: &str = "chatroute.module";

/// Whether the reply came from the fallback table.
pub const CHATROUTE_FALLBACK: &str = "chatroute.fallback";

/// Number of actions attached to the reply.
pub const CHATROUTE_ACTIONS: &str = "chatroute.actions";

// --- Operation name values ---

/// Chat message routed through the provider router.
pub const OP_CHAT: &str = "chat";
