//! Configuration loader for chatroute.
//!
//! Reads the router's TOML file and resolves each provider's credential
//! list into [`CredentialSpec`]s. The file is located by, in order: an
//! explicit path, the `CHATROUTE_CONFIG` environment variable, or
//! `{data_dir}/chatroute/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chatroute_core::llm::credential_pool::CredentialSpec;
use chatroute_types::config::{ProviderConfig, RouterConfig, RouterSettings};
use chatroute_types::error::RouterError;
use chatroute_types::llm::CredentialId;

use crate::secret::SecretSource;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CHATROUTE_CONFIG";

/// Platform data directory for chatroute (`~/.local/share/chatroute` on Linux).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatroute")
}

/// Where to look for the config file.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => default_data_dir().join("config.toml"),
    }
}

/// Parse a config document. `origin` is only used in error messages.
pub fn parse_router_config(content: &str, origin: &str) -> Result<RouterConfig, RouterError> {
    toml::from_str::<RouterConfig>(content).map_err(|err| RouterError::ConfigParse {
        path: origin.to_string(),
        reason: err.to_string(),
    })
}

/// Load the config file at `path`.
///
/// # Errors
///
/// [`RouterError::ConfigRead`] if the file cannot be read,
/// [`RouterError::ConfigParse`] if it is not a valid config.
pub async fn load_router_config(path: &Path) -> Result<RouterConfig, RouterError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| RouterError::ConfigRead {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    let config = parse_router_config(&content, &path.display().to_string())?;
    tracing::debug!(
        path = %path.display(),
        providers = config.providers.len(),
        "Loaded router config"
    );
    Ok(config)
}

/// Like [`load_router_config`], but a missing file yields the default
/// (provider-less) config.
pub async fn load_router_config_or_default(path: &Path) -> Result<RouterConfig, RouterError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => load_router_config(path).await,
        _ => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            Ok(RouterConfig::default())
        }
    }
}

/// Resolve a provider's ordered credential list.
///
/// Entries from `credentials` come first, then keys from the comma-separated
/// `api_keys_env` variable. Ids default to `{provider}#{n}` (1-based).
/// Cool-down: per credential, else per provider, else the router default.
///
/// # Errors
///
/// - [`RouterError::MissingEnv`] if a referenced variable is unset
/// - [`RouterError::InvalidProvider`] if an entry has both or neither of `env`/`value`
/// - [`RouterError::MissingCredentials`] if nothing resolves
pub fn resolve_credentials(
    provider: &ProviderConfig,
    settings: &RouterSettings,
    secrets: &dyn SecretSource,
) -> Result<Vec<CredentialSpec>, RouterError> {
    let provider_cool_down = provider.cool_down_secs.unwrap_or(settings.cool_down_secs);
    let missing_env = |var: &str| RouterError::MissingEnv {
        provider: provider.id.clone(),
        var: var.to_string(),
    };
    let mut specs = Vec::new();

    for (n, credential) in provider.credentials.iter().enumerate() {
        let secret = match (&credential.env, &credential.value) {
            (Some(var), None) => secrets.get(var).ok_or_else(|| missing_env(var))?,
            (None, Some(value)) if !value.trim().is_empty() => value.clone(),
            (Some(_), Some(_)) => {
                return Err(RouterError::InvalidProvider {
                    provider: provider.id.clone(),
                    reason: format!("credential {} sets both env and value", n + 1),
                });
            }
            _ => {
                return Err(RouterError::InvalidProvider {
                    provider: provider.id.clone(),
                    reason: format!("credential {} needs an env or value", n + 1),
                });
            }
        };

        let id = credential
            .id
            .as_ref()
            .map(CredentialId::new)
            .unwrap_or_else(|| CredentialId::indexed(&provider.id, specs.len()));
        let cool_down = credential.cool_down_secs.unwrap_or(provider_cool_down);
        specs.push(CredentialSpec::new(
            id,
            &provider.id,
            secret,
            Duration::from_secs(cool_down),
        ));
    }

    if let Some(var) = &provider.api_keys_env {
        let keys = secrets.get(var).ok_or_else(|| missing_env(var))?;
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            specs.push(CredentialSpec::new(
                CredentialId::indexed(&provider.id, specs.len()),
                &provider.id,
                key,
                Duration::from_secs(provider_cool_down),
            ));
        }
    }

    if specs.is_empty() {
        return Err(RouterError::MissingCredentials(provider.id.clone()));
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chatroute_types::config::CredentialConfig;
    use chatroute_types::llm::ProviderKind;
    use tempfile::TempDir;

    fn provider(credentials: Vec<CredentialConfig>, api_keys_env: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: "gemini".to_string(),
            display_name: None,
            kind: ProviderKind::Gemini,
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            priority: 0,
            enabled: true,
            cool_down_secs: Some(90),
            max_output_tokens: None,
            temperature: None,
            credentials,
            api_keys_env: api_keys_env.map(String::from),
        }
    }

    fn env_cred(var: &str) -> CredentialConfig {
        CredentialConfig {
            env: Some(var.to_string()),
            ..Default::default()
        }
    }

    fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn load_router_config_valid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[settings]
cool_down_secs = 30

[[providers]]
id = "gemini"
kind = "gemini"
model = "gemini-2.0-flash"
credentials = [{ env = "GEMINI_KEY_1" }]
"#,
        )
        .await
        .unwrap();

        let config = load_router_config(&path).await.unwrap();
        assert_eq!(config.settings.cool_down_secs, 30);
        assert_eq!(config.providers[0].id, "gemini");
    }

    #[tokio::test]
    async fn load_router_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!").await.unwrap();

        let err = load_router_config(&path).await.unwrap_err();
        assert!(matches!(err, RouterError::ConfigParse { .. }));
    }

    #[tokio::test]
    async fn load_router_config_unknown_kind_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            "[[providers]]\nid = \"x\"\nkind = \"cohere\"\nmodel = \"m\"\n",
        )
        .await
        .unwrap();

        assert!(matches!(
            load_router_config(&path).await,
            Err(RouterError::ConfigParse { .. })
        ));
    }

    #[tokio::test]
    async fn load_router_config_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");

        assert!(matches!(
            load_router_config(&path).await,
            Err(RouterError::ConfigRead { .. })
        ));
        let config = load_router_config_or_default(&path).await.unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn resolve_config_path_prefers_explicit() {
        let path = resolve_config_path(Some(Path::new("/etc/chatroute.toml")));
        assert_eq!(path, PathBuf::from("/etc/chatroute.toml"));
    }

    #[test]
    fn resolve_credentials_env_inline_and_list() {
        let config = provider(
            vec![
                env_cred("GEMINI_KEY_1"),
                CredentialConfig {
                    id: Some("gemini-inline".to_string()),
                    value: Some("inline-key".to_string()),
                    cool_down_secs: Some(10),
                    ..Default::default()
                },
            ],
            Some("GEMINI_API_KEYS"),
        );
        let secrets = secrets(&[("GEMINI_KEY_1", "k1"), ("GEMINI_API_KEYS", "k3, k4,,")]);

        let specs = resolve_credentials(&config, &RouterSettings::default(), &secrets).unwrap();

        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["gemini#1", "gemini-inline", "gemini#3", "gemini#4"]);
        assert_eq!(specs[0].cool_down, Duration::from_secs(90));
        assert_eq!(specs[1].cool_down, Duration::from_secs(10));
        assert!(specs.iter().all(|s| s.provider_id == "gemini"));
    }

    #[test]
    fn resolve_credentials_router_default_cool_down() {
        let mut config = provider(vec![env_cred("K")], None);
        config.cool_down_secs = None;
        let specs =
            resolve_credentials(&config, &RouterSettings::default(), &secrets(&[("K", "v")])).unwrap();
        assert_eq!(specs[0].cool_down, Duration::from_secs(60));
    }

    #[test]
    fn resolve_credentials_missing_env() {
        let config = provider(vec![env_cred("GEMINI_KEY_9")], None);
        let err = resolve_credentials(&config, &RouterSettings::default(), &secrets(&[])).unwrap_err();
        assert!(matches!(err, RouterError::MissingEnv { var, .. } if var == "GEMINI_KEY_9"));
    }

    #[test]
    fn resolve_credentials_rejects_ambiguous_entry() {
        let config = provider(
            vec![CredentialConfig {
                env: Some("K".to_string()),
                value: Some("v".to_string()),
                ..Default::default()
            }],
            None,
        );
        let err = resolve_credentials(&config, &RouterSettings::default(), &secrets(&[("K", "v")]))
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidProvider { .. }));
    }

    #[test]
    fn resolve_credentials_none_configured() {
        let config = provider(Vec::new(), None);
        let err = resolve_credentials(&config, &RouterSettings::default(), &secrets(&[])).unwrap_err();
        assert!(matches!(err, RouterError::MissingCredentials(id) if id == "gemini"));
    }
}
