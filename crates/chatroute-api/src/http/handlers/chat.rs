//! Chat endpoint.
//!
//! POST /api/v1/chat - Route one message through the provider router.

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use chatroute_types::llm::{ChatRequest, ChatResponse};

use crate::cli::ask::route;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/chat - Answer a chat message.
///
/// Always answers 200 with a reply for a well-formed request; when no
/// provider can answer, the reply comes from the module's fallback table
/// and `metadata.provider` is `"fallback"`.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let response = route(&state, &request).await;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::debug!(
        request_id = %request_id,
        provider = %response.metadata.provider,
        elapsed_ms = elapsed,
        "Chat request answered"
    );

    Ok(Json(ApiResponse::success(response, request_id, elapsed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chatroute_core::llm::fallback::FallbackResponder;
    use chatroute_core::llm::router::LlmRouter;
    use chatroute_types::config::RouterConfig;

    fn fallback_state() -> AppState {
        let config = RouterConfig::default();
        let router = LlmRouter::fallback_only(FallbackResponder::builtin(), &config.settings);
        AppState::new(router, config, PathBuf::from("chatroute.toml"))
    }

    #[tokio::test]
    async fn test_chat_without_providers_uses_fallback() {
        let state = fallback_state();
        let Json(envelope) = chat(State(state), Json(ChatRequest::new("Oi", "clientes")))
            .await
            .unwrap();

        let data = envelope.data.unwrap();
        assert!(data.is_fallback());
        assert!(!data.message.is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let result = chat(State(fallback_state()), Json(ChatRequest::new("   ", "home"))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_shutdown_marks_reply_cancelled() {
        let state = fallback_state();
        state.shutdown.cancel();
        let Json(envelope) = chat(State(state), Json(ChatRequest::new("Oi", "home")))
            .await
            .unwrap();
        let data = envelope.data.unwrap();
        assert!(data.is_fallback());
        assert!(data.metadata.cancelled);
    }
}
