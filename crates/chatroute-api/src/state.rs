//! Application state shared by CLI commands and REST handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chatroute_core::llm::fallback::FallbackResponder;
use chatroute_core::llm::router::LlmRouter;
use chatroute_infra::builder::build_router;
use chatroute_infra::config::{load_router_config, load_router_config_or_default, resolve_config_path};
use chatroute_infra::secret::EnvSecretSource;
use chatroute_types::config::RouterConfig;
use chatroute_types::error::RouterError;

/// Shared application state.
///
/// Cheap to clone; the router itself is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<LlmRouter>,
    pub config: Arc<RouterConfig>,
    pub config_path: PathBuf,
    /// Fired on server shutdown so in-flight requests settle on the fallback.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Load the config and build the router.
    ///
    /// An explicit `--config` path must exist. Without one, a missing file at
    /// the default location yields a provider-less router that always answers
    /// from the fallback table.
    pub async fn init(explicit_config: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(explicit_config);
        let config = if explicit_config.is_some() {
            load_router_config(&config_path).await?
        } else {
            load_router_config_or_default(&config_path).await?
        };

        let router = match build_router(&config, &EnvSecretSource::new()) {
            Ok(router) => router,
            Err(RouterError::NoProviders) => {
                tracing::warn!(
                    path = %config_path.display(),
                    "No enabled providers configured, every reply will come from the fallback table"
                );
                LlmRouter::fallback_only(
                    FallbackResponder::with_overrides(config.modules.clone()),
                    &config.settings,
                )
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::new(router, config, config_path))
    }

    pub fn new(router: LlmRouter, config: RouterConfig, config_path: PathBuf) -> Self {
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
            config_path,
            shutdown: CancellationToken::new(),
        }
    }
}
