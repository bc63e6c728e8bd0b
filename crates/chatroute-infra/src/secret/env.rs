//! Environment variable secret source.
//!
//! Key resolution: `CHATROUTE_{KEY}` first, then `KEY` directly, so
//! deployments can namespace keys without changing the config file.

use super::SecretSource;

/// Environment variable secret source.
pub struct EnvSecretSource;

impl EnvSecretSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvSecretSource {
    fn default() -> Self {
        Self::new()
    }
}

fn read_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        Ok(_) => None,
        Err(std::env::VarError::NotPresent) => None,
        // Env var exists but has invalid Unicode -- treat as not found,
        // since keys must be valid strings
        Err(std::env::VarError::NotUnicode(_)) => None,
    }
}

impl SecretSource for EnvSecretSource {
    fn get(&self, key: &str) -> Option<String> {
        read_var(&format!("CHATROUTE_{key}")).or_else(|| read_var(key))
    }
}
