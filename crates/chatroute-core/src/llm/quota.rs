//! Quota tracker: feeds adapter outcomes back into the credential pool.
//!
//! A quota failure exhausts the credential, an auth rejection disables it,
//! and everything else leaves the pool untouched. An optional background
//! sweeper re-admits cooled-down credentials on a fixed interval; without
//! it, re-admission still happens lazily on the next selection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use chatroute_types::llm::{AdapterReply, FailureKind, ProviderFailure};

use super::credential_pool::{CredentialLease, CredentialPool};

/// What an observation did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaEvent {
    /// Nothing to record (success, transient or malformed failure).
    Unchanged,
    /// The credential entered its cool-down.
    Exhausted,
    /// The credential was already exhausted or disabled; nothing changed.
    AlreadyPenalized,
    /// The credential was rejected and is out for good.
    Disabled,
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct QuotaTracker {
    pool: Arc<CredentialPool>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl QuotaTracker {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self {
            pool,
            sweeper: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Record the outcome of one adapter call made with `lease`.
    pub fn observe(
        &self,
        lease: &CredentialLease,
        outcome: &Result<AdapterReply, ProviderFailure>,
    ) -> QuotaEvent {
        self.observe_at(lease, outcome, Instant::now())
    }

    pub fn observe_at(
        &self,
        lease: &CredentialLease,
        outcome: &Result<AdapterReply, ProviderFailure>,
        now: Instant,
    ) -> QuotaEvent {
        let Err(failure) = outcome else {
            return QuotaEvent::Unchanged;
        };

        match failure.kind {
            FailureKind::QuotaExceeded => {
                if self.pool.mark_exhausted_at(lease.id(), now) {
                    tracing::warn!(
                        provider = %lease.provider_id(),
                        credential = %lease.id(),
                        error = %failure,
                        "Credential quota exhausted, cooling down"
                    );
                    QuotaEvent::Exhausted
                } else {
                    QuotaEvent::AlreadyPenalized
                }
            }
            FailureKind::AuthRejected => {
                if self.pool.disable(lease.id()) {
                    tracing::error!(
                        provider = %lease.provider_id(),
                        credential = %lease.id(),
                        error = %failure,
                        "Credential rejected by provider, disabled"
                    );
                    QuotaEvent::Disabled
                } else {
                    QuotaEvent::AlreadyPenalized
                }
            }
            FailureKind::TransientNetwork | FailureKind::MalformedResponse => QuotaEvent::Unchanged,
        }
    }

    /// Spawn the background sweeper on the current tokio runtime.
    ///
    /// Returns `false` (and does nothing) if the interval is zero, no runtime
    /// is running, or a sweeper is already active.
    pub fn start_sweeper(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, credential sweeper not started");
            return false;
        };

        let mut guard = self.sweeper.lock().expect("sweeper lock poisoned");
        if guard.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let pool = Arc::clone(&self.pool);
        let token = cancel.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        for id in pool.reactivate_expired(Instant::now()) {
                            tracing::info!(credential = %id, "Credential cool-down elapsed, back in rotation");
                        }
                    }
                }
            }
            tracing::debug!("Credential sweeper stopped");
        });

        tracing::debug!(interval_secs = interval.as_secs_f64(), "Credential sweeper started");
        *guard = Some(Sweeper { cancel, handle });
        true
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .expect("sweeper lock poisoned")
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Stop the sweeper. Safe to call any number of times.
    pub fn shutdown(&self) {
        let sweeper = self.sweeper.lock().expect("sweeper lock poisoned").take();
        if let Some(sweeper) = sweeper {
            sweeper.cancel.cancel();
            sweeper.handle.abort();
        }
    }
}

impl Drop for QuotaTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
