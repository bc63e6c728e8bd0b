//! Credential pool: ordered API keys per provider with quota state.
//!
//! Every credential is `Live`, `Exhausted` (quota hit, waiting out its
//! cool-down) or `Disabled` (rejected by the provider, excluded for the rest
//! of the process). Selection round-robins over the eligible credentials of
//! one provider, starting at the slot after the last one handed out.
//!
//! All state sits behind a single mutex. Selection and cursor advance happen
//! under the same lock, so concurrent requests never claim the same slot of
//! a round, and state transitions are compare-and-set: a credential is only
//! penalized once no matter how many requests observe the same 429.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use chatroute_types::error::RouterError;
use chatroute_types::llm::{
    CredentialId, CredentialState, CredentialStatusInfo, ProviderStatus, RouterStatus,
};

/// Input for building a pool: one credential as read from configuration.
pub struct CredentialSpec {
    pub id: CredentialId,
    pub provider_id: String,
    pub secret: SecretString,
    /// How long the credential stays exhausted after a quota failure.
    pub cool_down: Duration,
}

impl CredentialSpec {
    pub fn new(
        id: CredentialId,
        provider_id: impl Into<String>,
        secret: impl Into<String>,
        cool_down: Duration,
    ) -> Self {
        Self {
            id,
            provider_id: provider_id.into(),
            secret: SecretString::from(secret.into()),
            cool_down,
        }
    }
}

impl fmt::Debug for CredentialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSpec")
            .field("id", &self.id)
            .field("provider_id", &self.provider_id)
            .field("cool_down", &self.cool_down)
            .finish_non_exhaustive()
    }
}

/// A credential handed out for one upstream attempt.
///
/// The secret is only reachable through [`CredentialLease::expose_secret`]
/// and never appears in `Debug` output.
#[derive(Clone)]
pub struct CredentialLease {
    id: CredentialId,
    provider_id: String,
    secret: SecretString,
}

impl CredentialLease {
    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Raw key material, for building the upstream request only.
    pub fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("id", &self.id)
            .field("provider_id", &self.provider_id)
            .field("secret", &"***")
            .finish()
    }
}

struct Slot {
    id: CredentialId,
    secret: SecretString,
    cool_down: Duration,
    state: CredentialState,
    exhausted_at: Option<Instant>,
    exhausted_since: Option<DateTime<Utc>>,
}

impl Slot {
    fn new(spec: CredentialSpec) -> Self {
        Self {
            id: spec.id,
            secret: spec.secret,
            cool_down: spec.cool_down,
            state: CredentialState::Live,
            exhausted_at: None,
            exhausted_since: None,
        }
    }

    /// Effective state at `now`, without mutating anything.
    fn state_at(&self, now: Instant) -> CredentialState {
        match (self.state, self.exhausted_at) {
            (CredentialState::Exhausted, Some(at))
                if now.saturating_duration_since(at) >= self.cool_down =>
            {
                CredentialState::Live
            }
            (state, _) => state,
        }
    }

    /// Re-admit the credential if its cool-down has elapsed. Returns whether
    /// a transition happened.
    fn refresh(&mut self, now: Instant) -> bool {
        if self.state == CredentialState::Exhausted
            && self.state_at(now) == CredentialState::Live
        {
            self.state = CredentialState::Live;
            self.exhausted_at = None;
            self.exhausted_since = None;
            return true;
        }
        false
    }

    fn lease(&self, provider_id: &str) -> CredentialLease {
        CredentialLease {
            id: self.id.clone(),
            provider_id: provider_id.to_string(),
            secret: self.secret.clone(),
        }
    }

    fn status_info(&self, now: Instant) -> CredentialStatusInfo {
        let state = self.state_at(now);
        let cool_down_remaining_secs = match (state, self.exhausted_at) {
            (CredentialState::Exhausted, Some(at)) => {
                let elapsed = now.saturating_duration_since(at);
                Some(self.cool_down.saturating_sub(elapsed).as_secs())
            }
            _ => None,
        };
        CredentialStatusInfo {
            id: self.id.clone(),
            state,
            exhausted_since: match state {
                CredentialState::Exhausted => self.exhausted_since.map(|t| t.to_rfc3339()),
                _ => None,
            },
            cool_down_remaining_secs,
        }
    }
}

struct ProviderSlots {
    provider_id: String,
    slots: Vec<Slot>,
    /// Index of the slot handed out most recently.
    last_used: Option<usize>,
}

/// Process-wide pool of provider credentials.
///
/// Owned by the router through an `Arc` and injected at construction, so
/// tests can build isolated pools with their own cool-downs.
pub struct CredentialPool {
    /// Credential id -> (provider index, slot index). Immutable after construction.
    index: HashMap<CredentialId, (usize, usize)>,
    providers: Mutex<Vec<ProviderSlots>>,
    total: usize,
}

impl CredentialPool {
    /// Build a pool from credential specs. Providers keep the order in which
    /// they first appear; credentials keep their order within a provider.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateCredential`] if two specs share an id.
    pub fn new(specs: Vec<CredentialSpec>) -> Result<Self, RouterError> {
        let mut providers: Vec<ProviderSlots> = Vec::new();
        let mut index = HashMap::new();
        let total = specs.len();

        for spec in specs {
            let provider_idx = match providers
                .iter()
                .position(|p| p.provider_id == spec.provider_id)
            {
                Some(idx) => idx,
                None => {
                    providers.push(ProviderSlots {
                        provider_id: spec.provider_id.clone(),
                        slots: Vec::new(),
                        last_used: None,
                    });
                    providers.len() - 1
                }
            };

            let slot_idx = providers[provider_idx].slots.len();
            if index
                .insert(spec.id.clone(), (provider_idx, slot_idx))
                .is_some()
            {
                return Err(RouterError::DuplicateCredential(spec.id.to_string()));
            }
            providers[provider_idx].slots.push(Slot::new(spec));
        }

        Ok(Self {
            index,
            providers: Mutex::new(providers),
            total,
        })
    }

    /// A pool with no credentials. A router over it always falls back.
    pub fn empty() -> Self {
        Self {
            index: HashMap::new(),
            providers: Mutex::new(Vec::new()),
            total: 0,
        }
    }

    /// Total number of credentials across all providers.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn contains(&self, id: &CredentialId) -> bool {
        self.index.contains_key(id)
    }

    /// Next eligible credential for `provider_id`, round-robin.
    pub fn next_eligible(&self, provider_id: &str) -> Option<CredentialLease> {
        self.next_eligible_excluding(provider_id, &HashSet::new(), Instant::now())
    }

    /// Like [`next_eligible`](Self::next_eligible) at an explicit instant.
    pub fn next_eligible_at(&self, provider_id: &str, now: Instant) -> Option<CredentialLease> {
        self.next_eligible_excluding(provider_id, &HashSet::new(), now)
    }

    /// Next eligible credential for `provider_id`, skipping ids in `tried`.
    ///
    /// The scan starts at the slot after the last one handed out and wraps.
    /// Exhausted credentials whose cool-down has passed are re-admitted
    /// during the scan.
    pub fn next_eligible_excluding(
        &self,
        provider_id: &str,
        tried: &HashSet<CredentialId>,
        now: Instant,
    ) -> Option<CredentialLease> {
        let mut providers = self.providers.lock().expect("credential pool lock poisoned");
        let provider = providers.iter_mut().find(|p| p.provider_id == provider_id)?;

        let len = provider.slots.len();
        let start = provider.last_used.map(|i| (i + 1) % len.max(1)).unwrap_or(0);

        for offset in 0..len {
            let idx = (start + offset) % len;
            let slot = &mut provider.slots[idx];
            if tried.contains(&slot.id) {
                continue;
            }
            if slot.refresh(now) {
                tracing::info!(
                    provider = %provider_id,
                    credential = %slot.id,
                    "credential cool-down elapsed, back in rotation"
                );
            }
            if slot.state == CredentialState::Live {
                provider.last_used = Some(idx);
                return Some(slot.lease(provider_id));
            }
        }

        None
    }

    /// Mark a credential as quota-exhausted now.
    pub fn mark_exhausted(&self, id: &CredentialId) -> bool {
        self.mark_exhausted_at(id, Instant::now())
    }

    /// Mark a credential as quota-exhausted at `at`.
    ///
    /// Returns `true` if the credential transitioned from `Live`. Marking an
    /// already-exhausted (still cooling down) or disabled credential is a
    /// no-op and keeps the original exhaustion time.
    pub fn mark_exhausted_at(&self, id: &CredentialId, at: Instant) -> bool {
        self.with_slot(id, |slot| {
            slot.refresh(at);
            if slot.state != CredentialState::Live {
                return false;
            }
            slot.state = CredentialState::Exhausted;
            slot.exhausted_at = Some(at);
            slot.exhausted_since = Some(Utc::now());
            true
        })
        .unwrap_or(false)
    }

    /// Exclude a credential for the rest of the process lifetime.
    ///
    /// Returns `true` if this call disabled it.
    pub fn disable(&self, id: &CredentialId) -> bool {
        self.with_slot(id, |slot| {
            if slot.state == CredentialState::Disabled {
                return false;
            }
            slot.state = CredentialState::Disabled;
            slot.exhausted_at = None;
            slot.exhausted_since = None;
            true
        })
        .unwrap_or(false)
    }

    /// Re-admit every exhausted credential whose cool-down has elapsed.
    /// Returns the ids that changed state.
    pub fn reactivate_expired(&self, now: Instant) -> Vec<CredentialId> {
        let mut providers = self.providers.lock().expect("credential pool lock poisoned");
        providers
            .iter_mut()
            .flat_map(|p| p.slots.iter_mut())
            .filter_map(|slot| slot.refresh(now).then(|| slot.id.clone()))
            .collect()
    }

    /// Effective state of a credential at `now`.
    pub fn state_at(&self, id: &CredentialId, now: Instant) -> Option<CredentialState> {
        let &(p, s) = self.index.get(id)?;
        let providers = self.providers.lock().expect("credential pool lock poisoned");
        Some(providers[p].slots[s].state_at(now))
    }

    pub fn state(&self, id: &CredentialId) -> Option<CredentialState> {
        self.state_at(id, Instant::now())
    }

    /// Read-only snapshot of every provider in the pool.
    pub fn status(&self) -> RouterStatus {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> RouterStatus {
        let providers = self.providers.lock().expect("credential pool lock poisoned");
        providers
            .iter()
            .map(|provider| {
                let credentials: Vec<CredentialStatusInfo> =
                    provider.slots.iter().map(|s| s.status_info(now)).collect();
                let count = |state: CredentialState| {
                    credentials.iter().filter(|c| c.state == state).count()
                };
                let live_count = count(CredentialState::Live);
                let disabled_count = count(CredentialState::Disabled);
                let status = ProviderStatus {
                    live_count,
                    exhausted_count: count(CredentialState::Exhausted) + disabled_count,
                    disabled_count,
                    usable: live_count > 0,
                    credentials,
                };
                (provider.provider_id.clone(), status)
            })
            .collect()
    }

    fn with_slot<T>(&self, id: &CredentialId, f: impl FnOnce(&mut Slot) -> T) -> Option<T> {
        let &(p, s) = self.index.get(id)?;
        let mut providers = self.providers.lock().expect("credential pool lock poisoned");
        Some(f(&mut providers[p].slots[s]))
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.total)
            .finish_non_exhaustive()
    }
}
