//! `chatroute ask`: one-shot message through the router.

use anyhow::Result;
use console::style;
use tracing::Instrument;

use chatroute_observe::span::{ReplySummary, chat_span, record_reply};
use chatroute_types::llm::{ChatRequest, ChatResponse};

use crate::state::AppState;

/// Route one message and print the reply.
pub async fn ask(
    state: &AppState,
    message: String,
    module: String,
    tenant: String,
    user: String,
    json: bool,
) -> Result<()> {
    let mut request = ChatRequest::new(message, module);
    request.tenant_id = tenant;
    request.user_id = user;

    let response = route(state, &request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_response(&response);
    Ok(())
}

/// Run a request through the router inside a `chat` span.
pub async fn route(state: &AppState, request: &ChatRequest) -> ChatResponse {
    let span = chat_span(&request.context.module);
    let response = state
        .router
        .process_message_with_cancel(request, &state.shutdown)
        .instrument(span.clone())
        .await;

    record_reply(
        &span,
        ReplySummary {
            provider: &response.metadata.provider,
            model: response.metadata.model.as_deref(),
            tokens_used: response.metadata.tokens_used,
            fallback: response.is_fallback(),
            actions: response.actions.len(),
        },
    );
    response
}

fn print_response(response: &ChatResponse) {
    println!();
    println!("  {}", response.message);

    if !response.actions.is_empty() {
        println!();
        for action in &response.actions {
            println!(
                "  {} {} {}",
                style("→").cyan(),
                style(&action.kind).bold(),
                style(&action.title).dim()
            );
        }
    }

    println!();
    let source = if response.is_fallback() {
        style("offline fallback".to_string()).yellow()
    } else {
        match &response.metadata.model {
            Some(model) => style(format!("{} ({model})", response.metadata.provider)).green(),
            None => style(response.metadata.provider.clone()).green(),
        }
    };
    let tokens = response
        .metadata
        .tokens_used
        .map(|t| format!(" · {t} tokens"))
        .unwrap_or_default();
    println!("  {}{}", source, style(tokens).dim());
    println!();
}
