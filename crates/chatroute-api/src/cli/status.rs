//! `chatroute status`: provider and credential health.

use std::collections::HashSet;
use std::time::Instant;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use chatroute_infra::llm::test_provider_connection;
use chatroute_types::llm::{CredentialId, CredentialState, ProviderStatus};

use crate::state::AppState;

/// Outcome of probing one credential.
#[derive(Debug, Serialize)]
pub struct ProbeResult {
    pub provider: String,
    pub credential: CredentialId,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub latency_ms: u64,
}

/// Print provider status, optionally probing every live credential.
pub async fn status(state: &AppState, probe: bool, json: bool) -> Result<()> {
    let status = state.router.providers_status();
    let probes = if probe { probe_credentials(state).await } else { Vec::new() };

    if json {
        let out = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "config": state.config_path.display().to_string(),
            "settings": state.config.settings,
            "providers": status,
            "probes": probes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} chatroute v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("  Config: {}", style(state.config_path.display()).dim());
    println!();

    if state.router.providers().is_empty() {
        println!(
            "  {} No providers configured. Every reply comes from the fallback table.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Live").fg(Color::White),
        Cell::new("Exhausted").fg(Color::White),
        Cell::new("Usable").fg(Color::White),
    ]);

    let empty = ProviderStatus::default();
    for provider in state.router.providers() {
        let counts = status.get(&provider.id).unwrap_or(&empty);
        let usable = if counts.usable {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(provider.priority).fg(Color::Cyan),
            Cell::new(&provider.display_name).fg(Color::White),
            Cell::new(provider.adapter.kind().to_string()).fg(Color::DarkGrey),
            Cell::new(provider.adapter.model()).fg(Color::DarkGrey),
            Cell::new(counts.live_count).fg(Color::Green),
            Cell::new(counts.exhausted_count).fg(if counts.exhausted_count > 0 {
                Color::Yellow
            } else {
                Color::DarkGrey
            }),
            usable,
        ]);
    }
    println!("{table}");

    let disabled: Vec<_> = status
        .values()
        .flat_map(|p| p.credentials.iter())
        .filter(|c| c.state == CredentialState::Disabled)
        .collect();
    if !disabled.is_empty() {
        println!();
        for credential in disabled {
            println!(
                "  {} {} was rejected by its provider",
                style("✗").red(),
                style(&credential.id).bold()
            );
        }
    }

    if !probes.is_empty() {
        println!();
        println!("  {}", style("── Probes ──").dim());
        for result in &probes {
            let mark = if result.ok {
                style("✓").green()
            } else {
                style("✗").red()
            };
            let detail = result.failure.as_deref().unwrap_or("ok");
            println!(
                "  {} {:<20} {:>6}ms  {}",
                mark,
                result.credential.as_str(),
                result.latency_ms,
                style(detail).dim()
            );
        }
    }
    println!();

    Ok(())
}

/// Send a minimal prompt with every live credential.
///
/// Probe outcomes are reported only; they do not change pool state.
async fn probe_credentials(state: &AppState) -> Vec<ProbeResult> {
    let pool = state.router.pool();
    let mut results = Vec::new();

    for provider in state.router.providers() {
        let mut tried = HashSet::new();
        while let Some(lease) =
            pool.next_eligible_excluding(&provider.id, &tried, tokio::time::Instant::now())
        {
            tried.insert(lease.id().clone());

            let start = Instant::now();
            let outcome = test_provider_connection(&provider.adapter, &lease).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            if let Err(failure) = &outcome {
                tracing::debug!(
                    provider = %provider.id,
                    credential = %lease.id(),
                    kind = %failure.kind,
                    "Probe failed"
                );
            }
            results.push(ProbeResult {
                provider: provider.id.clone(),
                credential: lease.id().clone(),
                ok: outcome.is_ok(),
                failure: outcome.err().map(|f| f.to_string()),
                latency_ms,
            });
        }
    }

    results
}
