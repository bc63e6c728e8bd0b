use thiserror::Error;

/// Errors raised while building a router from configuration.
///
/// These are start-up failures: once a router exists, requests never
/// surface an error to the caller.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to read config '{path}': {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("failed to parse config '{path}': {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("no providers configured")]
    NoProviders,

    #[error("provider id '{0}' is configured more than once")]
    DuplicateProvider(String),

    #[error("credential id '{0}' is configured more than once")]
    DuplicateCredential(String),

    #[error("provider '{0}' has no credentials")]
    MissingCredentials(String),

    #[error("provider '{provider}': environment variable '{var}' is not set")]
    MissingEnv { provider: String, var: String },

    #[error("provider '{provider}': {reason}")]
    InvalidProvider { provider: String, reason: String },

    #[error("http client error: {0}")]
    HttpClient(String),
}
