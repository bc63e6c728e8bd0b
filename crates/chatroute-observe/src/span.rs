//! The per-message `chat` span.

use tracing::Span;
use tracing::field::Empty;

use crate::genai_attrs::{
    CHATROUTE_ACTIONS, CHATROUTE_FALLBACK, GEN_AI_PROVIDER_NAME, GEN_AI_RESPONSE_MODEL,
    GEN_AI_USAGE_TOTAL_TOKENS, OP_CHAT,
};

/// Open a span for one routed message. Outcome fields start empty and are
/// filled by [`record_reply`].
pub fn chat_span(module: &str) -> Span {
    tracing::info_span!(
        "chat",
        gen_ai.operation.name = OP_CHAT,
        chatroute.module = %module,
        gen_ai.provider.name = Empty,
        gen_ai.response.model = Empty,
        gen_ai.usage.total_tokens = Empty,
        chatroute.fallback = Empty,
        chatroute.actions = Empty,
    )
}

/// Outcome of a routed message, as recorded on its span.
#[derive(Debug, Clone, Copy)]
pub struct ReplySummary<'a> {
    pub provider: &'a str,
    pub model: Option<&'a str>,
    pub tokens_used: Option<u32>,
    pub fallback: bool,
    pub actions: usize,
}

/// Fill the outcome fields of a span opened by [`chat_span`].
pub fn record_reply(span: &Span, reply: ReplySummary<'_>) {
    span.record(GEN_AI_PROVIDER_NAME, reply.provider);
    if let Some(model) = reply.model {
        span.record(GEN_AI_RESPONSE_MODEL, model);
    }
    if let Some(tokens) = reply.tokens_used {
        span.record(GEN_AI_USAGE_TOTAL_TOKENS, tokens);
    }
    span.record(CHATROUTE_FALLBACK, reply.fallback);
    span.record(CHATROUTE_ACTIONS, reply.actions as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_subscriber() {
        let span = chat_span("clientes");
        record_reply(
            &span,
            ReplySummary {
                provider: "gemini",
                model: Some("gemini-2.0-flash"),
                tokens_used: Some(42),
                fallback: false,
                actions: 1,
            },
        );
        assert!(span.is_disabled() || span.metadata().is_some());
    }
}
