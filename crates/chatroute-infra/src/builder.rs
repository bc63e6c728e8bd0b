//! Assemble an [`LlmRouter`] from a [`RouterConfig`].

use std::collections::HashSet;
use std::sync::Arc;

use chatroute_core::llm::credential_pool::CredentialPool;
use chatroute_core::llm::fallback::FallbackResponder;
use chatroute_core::llm::prompt::PromptBuilder;
use chatroute_core::llm::router::{LlmRouter, RoutedProvider, RouterOptions};
use chatroute_types::config::RouterConfig;
use chatroute_types::error::RouterError;

use crate::config::resolve_credentials;
use crate::llm::{build_http_client, create_adapter};
use crate::secret::SecretSource;

/// Build a router for every enabled provider in `config`.
///
/// All adapters share one HTTP client. Credentials are resolved through
/// `secrets` and pooled together; module profiles in the config override
/// the built-in fallback profiles.
///
/// Must be called inside a Tokio runtime for the exhaustion sweeper to
/// start. Outside one, exhausted credentials are still re-admitted lazily.
///
/// # Errors
///
/// - [`RouterError::DuplicateProvider`] if two providers share an id
/// - [`RouterError::NoProviders`] if no provider is enabled
/// - any adapter or credential resolution error for an enabled provider
pub fn build_router(
    config: &RouterConfig,
    secrets: &dyn SecretSource,
) -> Result<LlmRouter, RouterError> {
    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.id.as_str()) {
            return Err(RouterError::DuplicateProvider(provider.id.clone()));
        }
    }

    let enabled: Vec<_> = config.providers.iter().filter(|p| p.enabled).collect();
    if enabled.is_empty() {
        return Err(RouterError::NoProviders);
    }

    let client = build_http_client()?;
    let mut providers = Vec::with_capacity(enabled.len());
    let mut specs = Vec::new();

    for provider in enabled {
        let adapter = create_adapter(provider, &client)?;
        let credentials = resolve_credentials(provider, &config.settings, secrets)?;
        tracing::debug!(
            provider = %provider.id,
            kind = %provider.kind,
            model = %provider.model,
            credentials = credentials.len(),
            "Registered provider"
        );
        specs.extend(credentials);

        providers.push(RoutedProvider {
            id: provider.id.clone(),
            display_name: provider
                .display_name
                .clone()
                .unwrap_or_else(|| provider.id.clone()),
            priority: provider.priority,
            max_output_tokens: provider.max_output_tokens,
            temperature: provider.temperature,
            adapter,
        });
    }

    let pool = Arc::new(CredentialPool::new(specs)?);
    tracing::info!(
        providers = providers.len(),
        credentials = pool.len(),
        "Router ready"
    );

    Ok(LlmRouter::new(
        providers,
        pool,
        FallbackResponder::with_overrides(config.modules.clone()),
        PromptBuilder::new(&config.settings),
        RouterOptions::from(&config.settings),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chatroute_types::config::{CredentialConfig, ModuleProfile, ProviderConfig};
    use chatroute_types::llm::{ChatRequest, ProviderKind};

    fn provider(id: &str, priority: u32, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            display_name: None,
            kind: ProviderKind::Gemini,
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            priority,
            enabled,
            cool_down_secs: None,
            max_output_tokens: Some(256),
            temperature: None,
            credentials: vec![CredentialConfig {
                value: Some(format!("{id}-key")),
                ..Default::default()
            }],
            api_keys_env: None,
        }
    }

    fn no_secrets() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn builds_enabled_providers_in_priority_order() {
        let config = RouterConfig {
            providers: vec![
                provider("secondary", 5, true),
                provider("primary", 1, true),
                provider("off", 0, false),
            ],
            ..Default::default()
        };

        let router = build_router(&config, &no_secrets()).unwrap();
        let ids: Vec<&str> = router.providers().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["primary", "secondary"]);
        assert_eq!(router.providers()[0].max_output_tokens, Some(256));
        assert_eq!(router.pool().len(), 2);

        let status = router.providers_status();
        assert!(status.contains_key("primary"));
        assert!(!status.contains_key("off"));
        router.destroy();
    }

    #[tokio::test]
    async fn display_name_defaults_to_id() {
        let mut named = provider("gemini", 0, true);
        named.display_name = Some("Google Gemini".to_string());
        let config = RouterConfig {
            providers: vec![named, provider("groq-like", 1, true)],
            ..Default::default()
        };

        let router = build_router(&config, &no_secrets()).unwrap();
        assert_eq!(router.providers()[0].display_name, "Google Gemini");
        assert_eq!(router.providers()[1].display_name, "groq-like");
        router.destroy();
    }

    #[test]
    fn rejects_duplicate_provider_ids() {
        let config = RouterConfig {
            providers: vec![provider("gemini", 0, true), provider("gemini", 1, false)],
            ..Default::default()
        };
        assert!(matches!(
            build_router(&config, &no_secrets()),
            Err(RouterError::DuplicateProvider(id)) if id == "gemini"
        ));
    }

    #[test]
    fn no_enabled_providers_is_error() {
        let config = RouterConfig {
            providers: vec![provider("gemini", 0, false)],
            ..Default::default()
        };
        assert!(matches!(
            build_router(&config, &no_secrets()),
            Err(RouterError::NoProviders)
        ));
        assert!(matches!(
            build_router(&RouterConfig::default(), &no_secrets()),
            Err(RouterError::NoProviders)
        ));
    }

    #[test]
    fn duplicate_credential_ids_across_providers() {
        let mut a = provider("a", 0, true);
        a.credentials[0].id = Some("shared".to_string());
        let mut b = provider("b", 1, true);
        b.credentials[0].id = Some("shared".to_string());
        let config = RouterConfig {
            providers: vec![a, b],
            ..Default::default()
        };
        assert!(matches!(
            build_router(&config, &no_secrets()),
            Err(RouterError::DuplicateCredential(_))
        ));
    }

    #[test]
    fn missing_env_propagates() {
        let mut gemini = provider("gemini", 0, true);
        gemini.credentials = vec![CredentialConfig {
            env: Some("GEMINI_KEY_1".to_string()),
            ..Default::default()
        }];
        let config = RouterConfig {
            providers: vec![gemini],
            ..Default::default()
        };
        assert!(matches!(
            build_router(&config, &no_secrets()),
            Err(RouterError::MissingEnv { .. })
        ));
    }

    #[tokio::test]
    async fn module_overrides_reach_the_fallback() {
        let mut config = RouterConfig {
            providers: vec![provider("gemini", 0, true)],
            ..Default::default()
        };
        config.modules.push(ModuleProfile {
            name: "oficina".to_string(),
            fallback_reply: "Oficina em modo offline.".to_string(),
            fallback_actions: Vec::new(),
            allowed_actions: Vec::new(),
        });

        let router = build_router(&config, &no_secrets()).unwrap();
        assert!(router.responder().is_known("oficina"));

        let reply = router
            .responder()
            .respond(&ChatRequest::new("oi", "oficina").context);
        assert_eq!(reply.message, "Oficina em modo offline.");
        router.destroy();
    }
}
