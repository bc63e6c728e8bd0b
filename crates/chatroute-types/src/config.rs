//! Configuration types for the router.
//!
//! `RouterConfig` represents the top-level `config.toml`: router-wide
//! settings, the ordered provider list with their credentials, and
//! per-module fallback overrides. Every field has a default so an empty
//! file is valid (and produces a fallback-only router).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm::{ProviderKind, SuggestedAction};

/// Top-level router configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub settings: RouterSettings,

    /// Providers in declaration order. Selection order is by `priority`,
    /// then by position in this list.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Overrides and additions to the built-in fallback table.
    #[serde(default)]
    pub modules: Vec<ModuleProfile>,
}

/// Router-wide tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Default cool-down before a quota-exhausted credential is retried.
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: u64,

    /// Upper bound on a single upstream call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Extra attempts on the same credential after a transient network failure.
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,

    /// Base delay of the exponential back-off between transient retries.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// How often the background sweeper re-admits cooled-down credentials.
    /// `0` disables the sweeper (credentials are still re-admitted lazily).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Language the assistant must answer in.
    #[serde(default = "default_language")]
    pub language: String,

    /// Persona sentence placed at the top of the instruction block.
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_cool_down_secs() -> u64 {
    60
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_transient_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_sweep_interval_secs() -> u64 {
    15
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_language() -> String {
    "pt-BR".to_string()
}

fn default_persona() -> String {
    "Você é o assistente virtual de um sistema de gestão empresarial. \
     Responda de forma curta, cordial e objetiva."
        .to_string()
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            cool_down_secs: default_cool_down_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            transient_retries: default_transient_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            language: default_language(),
            persona: default_persona(),
        }
    }
}

/// Configuration for one upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique id reported in response metadata (e.g. "gemini", "groq").
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub kind: ProviderKind,
    /// Override the default base URL for the provider kind.
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    /// Lower = tried first.
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cool-down for this provider's credentials; falls back to the router default.
    #[serde(default)]
    pub cool_down_secs: Option<u64>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Ordered credential list.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    /// Name of an env var holding a comma-separated list of keys, appended
    /// after `credentials`.
    #[serde(default)]
    pub api_keys_env: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// One credential entry. Exactly one of `env` or `value` should be set.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Explicit id; defaults to `{provider}#{n}`.
    #[serde(default)]
    pub id: Option<String>,
    /// Env var holding the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Inline key (development only).
    #[serde(default)]
    pub value: Option<String>,
    /// Per-credential cool-down override.
    #[serde(default)]
    pub cool_down_secs: Option<u64>,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("id", &self.id)
            .field("env", &self.env)
            .field("value", &self.value.as_ref().map(|_| "***"))
            .field("cool_down_secs", &self.cool_down_secs)
            .finish()
    }
}

/// Per-module fallback reply and action vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProfile {
    /// Module name as sent in `context.module`.
    pub name: String,
    /// Canned reply used when no provider answers.
    pub fallback_reply: String,
    #[serde(default)]
    pub fallback_actions: Vec<SuggestedAction>,
    /// Action kinds the assistant may suggest in this module.
    /// Empty means any `verb-target` kind is accepted.
    #[serde(default)]
    pub allowed_actions: Vec<String>,
}
