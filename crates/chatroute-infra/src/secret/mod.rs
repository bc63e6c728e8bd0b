//! Secret sources for provider API keys.
//!
//! - `env`: environment variable source (read-only), used in production
//! - `HashMap<String, String>`: in-memory source for tests and embedding

pub mod env;

use std::collections::HashMap;

pub use env::EnvSecretSource;

/// Read-only lookup of a secret value by name.
pub trait SecretSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}
