//! LLM router: credential rotation and provider failover for chat requests.
//!
//! For each request the router walks providers in priority order, leasing
//! the next eligible credential from the shared pool and calling the
//! provider's adapter. Quota and auth failures are fed back to the pool
//! through the [`QuotaTracker`]; transient failures are retried on the same
//! credential with back-off before rotating. When nothing is left to try,
//! the [`FallbackResponder`] answers, so a request always resolves.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use chatroute_types::config::RouterSettings;
use chatroute_types::llm::{
    AdapterReply, AdapterRequest, ChatRequest, ChatResponse, CredentialId, FailureKind,
    ProviderFailure, ProviderStatus, ResponseMetadata, RouterStatus,
};

use super::box_adapter::BoxCompletionAdapter;
use super::credential_pool::{CredentialLease, CredentialPool};
use super::directive::parse_reply;
use super::fallback::FallbackResponder;
use super::prompt::PromptBuilder;
use super::quota::QuotaTracker;

/// Upper bound for a single back-off sleep between transient retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Timing and retry knobs for the router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub call_timeout: Duration,
    pub transient_retries: u32,
    pub retry_base_delay: Duration,
    /// `None` disables the background sweeper.
    pub sweep_interval: Option<Duration>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from(&RouterSettings::default())
    }
}

impl From<&RouterSettings> for RouterOptions {
    fn from(settings: &RouterSettings) -> Self {
        Self {
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
            transient_retries: settings.transient_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            sweep_interval: (settings.sweep_interval_secs > 0)
                .then(|| Duration::from_secs(settings.sweep_interval_secs)),
        }
    }
}

/// A provider as the router sees it: its adapter plus ordering and limits.
pub struct RoutedProvider {
    pub id: String,
    pub display_name: String,
    /// Lower = tried first.
    pub priority: u32,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub adapter: BoxCompletionAdapter,
}

impl RoutedProvider {
    pub fn new(adapter: BoxCompletionAdapter, priority: u32) -> Self {
        let id = adapter.provider_id().to_string();
        Self {
            display_name: id.clone(),
            id,
            priority,
            max_output_tokens: None,
            temperature: None,
            adapter,
        }
    }
}

/// Delay before transient retry number `attempt` (0-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

pub struct LlmRouter {
    /// Sorted by priority, ties kept in configuration order.
    providers: Vec<RoutedProvider>,
    pool: Arc<CredentialPool>,
    tracker: QuotaTracker,
    responder: FallbackResponder,
    prompt: PromptBuilder,
    options: RouterOptions,
}

impl LlmRouter {
    /// Create a router. Starts the credential sweeper if an interval is set
    /// and a tokio runtime is running.
    pub fn new(
        mut providers: Vec<RoutedProvider>,
        pool: Arc<CredentialPool>,
        responder: FallbackResponder,
        prompt: PromptBuilder,
        options: RouterOptions,
    ) -> Self {
        providers.sort_by_key(|p| p.priority);

        let tracker = QuotaTracker::new(Arc::clone(&pool));
        if let Some(interval) = options.sweep_interval {
            tracker.start_sweeper(interval);
        }

        tracing::info!(
            providers = providers.len(),
            credentials = pool.len(),
            "LLM router ready"
        );

        Self {
            providers,
            pool,
            tracker,
            responder,
            prompt,
            options,
        }
    }

    /// A router without providers. Every request gets the fallback reply.
    pub fn fallback_only(responder: FallbackResponder, settings: &RouterSettings) -> Self {
        Self::new(
            Vec::new(),
            Arc::new(CredentialPool::empty()),
            responder,
            PromptBuilder::new(settings),
            RouterOptions {
                sweep_interval: None,
                ..RouterOptions::from(settings)
            },
        )
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn providers(&self) -> &[RoutedProvider] {
        &self.providers
    }

    pub fn responder(&self) -> &FallbackResponder {
        &self.responder
    }

    /// Answer a chat request. Never fails: exhaustion yields the module's
    /// fallback reply.
    pub async fn process_message(&self, request: &ChatRequest) -> ChatResponse {
        self.process_message_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`process_message`](Self::process_message), but gives up as soon
    /// as `cancel` fires. The in-flight call is dropped, no credential is
    /// penalized, and the fallback reply is returned with
    /// `metadata.cancelled` set.
    pub async fn process_message_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> ChatResponse {
        let module = request.context.module.as_str();
        let vocabulary = self.responder.allowed_actions(module);
        let budget = self.pool.len();
        let mut tried: HashSet<CredentialId> = HashSet::new();
        let mut last_failure: Option<ProviderFailure> = None;

        while tried.len() < budget {
            if cancel.is_cancelled() {
                return self.cancelled_response(request);
            }

            let Some((provider, lease)) = self.select_credential(&tried) else {
                break;
            };
            tried.insert(lease.id().clone());

            let adapter_request = self.prompt.build(
                request,
                vocabulary,
                provider.max_output_tokens,
                provider.temperature,
            );

            let started = Instant::now();
            let Some(outcome) = self
                .call_with_retries(provider, &lease, &adapter_request, cancel)
                .await
            else {
                tracing::info!(
                    provider = %provider.id,
                    credential = %lease.id(),
                    "Request cancelled, abandoning upstream call"
                );
                return self.cancelled_response(request);
            };

            let latency_ms = started.elapsed().as_millis() as u64;
            let event = self.tracker.observe(&lease, &outcome);
            match outcome {
                Ok(reply) => {
                    tracing::debug!(
                        provider = %provider.id,
                        credential = %lease.id(),
                        latency_ms,
                        "Provider attempt succeeded"
                    );
                    return self.success_response(provider, reply, module);
                }
                Err(failure) => {
                    tracing::warn!(
                        provider = %provider.id,
                        credential = %lease.id(),
                        kind = %failure.kind,
                        latency_ms,
                        error = %failure,
                        quota_event = ?event,
                        "Provider attempt failed, rotating"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        if cancel.is_cancelled() {
            return self.cancelled_response(request);
        }

        tracing::warn!(
            module = %module,
            attempts = tried.len(),
            last_error = last_failure.as_ref().map(|f| f.message.as_str()),
            "All providers exhausted, answering with fallback"
        );
        self.responder.respond(&request.context)
    }

    /// First provider (by priority) that still has an eligible credential not
    /// yet tried in this request.
    fn select_credential(
        &self,
        tried: &HashSet<CredentialId>,
    ) -> Option<(&RoutedProvider, CredentialLease)> {
        let now = Instant::now();
        self.providers.iter().find_map(|provider| {
            match self.pool.next_eligible_excluding(&provider.id, tried, now) {
                Some(lease) => Some((provider, lease)),
                None => {
                    tracing::debug!(provider = %provider.id, "No eligible credential, skipping");
                    None
                }
            }
        })
    }

    /// Call the adapter, retrying transient failures on the same credential.
    /// Returns `None` if the request was cancelled.
    async fn call_with_retries(
        &self,
        provider: &RoutedProvider,
        lease: &CredentialLease,
        request: &AdapterRequest,
        cancel: &CancellationToken,
    ) -> Option<Result<AdapterReply, ProviderFailure>> {
        let mut retry = 0u32;
        loop {
            let start = Instant::now();
            let call = tokio::time::timeout(
                self.options.call_timeout,
                provider.adapter.complete(lease, request),
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                outcome = call => outcome.unwrap_or_else(|_| {
                    Err(ProviderFailure::transient(format!(
                        "no response within {}s",
                        self.options.call_timeout.as_secs_f64()
                    )))
                }),
            };

            let latency_ms = start.elapsed().as_millis() as u64;
            match result {
                Ok(reply) => {
                    tracing::debug!(
                        provider = %provider.id,
                        credential = %lease.id(),
                        latency_ms,
                        tokens_used = reply.tokens_used,
                        "Provider call succeeded"
                    );
                    return Some(Ok(reply));
                }
                Err(failure)
                    if failure.kind == FailureKind::TransientNetwork
                        && retry < self.options.transient_retries =>
                {
                    let delay = failure
                        .retry_after_ms
                        .map(Duration::from_millis)
                        .unwrap_or_else(|| backoff_delay(self.options.retry_base_delay, retry))
                        .min(MAX_RETRY_DELAY);
                    retry += 1;
                    tracing::debug!(
                        provider = %provider.id,
                        credential = %lease.id(),
                        latency_ms,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Transient failure, retrying same credential"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(failure) => {
                    tracing::debug!(
                        provider = %provider.id,
                        credential = %lease.id(),
                        latency_ms,
                        kind = %failure.kind,
                        "Provider call failed"
                    );
                    return Some(Err(failure));
                }
            }
        }
    }

    fn success_response(
        &self,
        provider: &RoutedProvider,
        reply: AdapterReply,
        module: &str,
    ) -> ChatResponse {
        let parsed = parse_reply(&reply.text);
        let vocabulary = self.responder.allowed_actions(module);

        let actions = parsed
            .action
            .into_iter()
            .filter(|action| {
                let allowed = vocabulary.is_empty() || vocabulary.contains(&action.kind);
                if !allowed {
                    tracing::debug!(
                        module = %module,
                        action = %action.kind,
                        "Dropping action outside the module vocabulary"
                    );
                }
                allowed
            })
            .collect();

        ChatResponse {
            message: parsed.text,
            actions,
            metadata: ResponseMetadata {
                provider: provider.id.clone(),
                tokens_used: reply.tokens_used,
                model: reply.model.or_else(|| Some(provider.adapter.model().to_string())),
                cancelled: false,
            },
        }
    }

    fn cancelled_response(&self, request: &ChatRequest) -> ChatResponse {
        let mut response = self.responder.respond(&request.context);
        response.metadata.cancelled = true;
        response
    }

    /// Read-only snapshot of credential health per provider. Providers
    /// without any credential are listed as unusable.
    pub fn providers_status(&self) -> RouterStatus {
        let mut status = self.pool.status();
        for provider in &self.providers {
            status
                .entry(provider.id.clone())
                .or_insert_with(ProviderStatus::default);
        }
        status
    }

    /// Stop background work. Safe to call more than once; requests keep
    /// working afterwards with lazy credential re-admission.
    pub fn destroy(&self) {
        self.tracker.shutdown();
        tracing::debug!("LLM router destroyed");
    }

    pub fn sweeper_running(&self) -> bool {
        self.tracker.sweeper_running()
    }
}

impl std::fmt::Debug for LlmRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmRouter")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            )
            .field("pool", &self.pool)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::future::Future;
    use std::sync::Mutex;

    use chatroute_types::llm::{CredentialState, ProviderKind};

    use crate::llm::adapter::CompletionAdapter;
    use crate::llm::credential_pool::CredentialSpec;

    #[derive(Clone)]
    enum Step {
        Reply(&'static str),
        Fail(FailureKind),
        Hang,
    }

    /// Scripted adapter: each credential id has a queue of steps; the last
    /// step repeats once the queue is drained.
    struct MockAdapter {
        id: String,
        script: Mutex<HashMap<String, VecDeque<Step>>>,
        default: Step,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockAdapter {
        fn new(id: &str, default: Step) -> Self {
            Self {
                id: id.to_string(),
                script: Mutex::new(HashMap::new()),
                default,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn script(self, credential: &str, steps: Vec<Step>) -> Self {
            self.script
                .lock()
                .unwrap()
                .insert(credential.to_string(), steps.into());
            self
        }

        fn calls(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.calls)
        }

        fn next_step(&self, credential: &str) -> Step {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(credential) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap_or_else(|| self.default.clone()),
                None => self.default.clone(),
            }
        }
    }

    impl CompletionAdapter for MockAdapter {
        fn provider_id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAiCompatible
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn complete(
            &self,
            credential: &CredentialLease,
            _request: &AdapterRequest,
        ) -> impl Future<Output = Result<AdapterReply, ProviderFailure>> + Send {
            let credential = credential.id().to_string();
            self.calls.lock().unwrap().push(credential.clone());
            let step = self.next_step(&credential);
            async move {
                match step {
                    Step::Reply(text) => Ok(AdapterReply {
                        text: text.to_string(),
                        tokens_used: Some(42),
                        model: None,
                    }),
                    Step::Fail(kind) => Err(ProviderFailure::new(kind, format!("mock {kind}"))),
                    Step::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Err(ProviderFailure::transient("unreachable"))
                    }
                }
            }
        }
    }

    fn specs(provider: &str, count: usize, cool_down: Duration) -> Vec<CredentialSpec> {
        (0..count)
            .map(|n| {
                CredentialSpec::new(
                    CredentialId::indexed(provider, n),
                    provider,
                    format!("{provider}-{n}"),
                    cool_down,
                )
            })
            .collect()
    }

    fn options() -> RouterOptions {
        RouterOptions {
            call_timeout: Duration::from_secs(30),
            transient_retries: 2,
            retry_base_delay: Duration::from_millis(10),
            sweep_interval: None,
        }
    }

    fn router(adapters: Vec<(MockAdapter, u32)>, specs: Vec<CredentialSpec>) -> LlmRouter {
        router_with(adapters, specs, options())
    }

    fn router_with(
        adapters: Vec<(MockAdapter, u32)>,
        specs: Vec<CredentialSpec>,
        options: RouterOptions,
    ) -> LlmRouter {
        let providers = adapters
            .into_iter()
            .map(|(adapter, priority)| RoutedProvider::new(BoxCompletionAdapter::new(adapter), priority))
            .collect();
        LlmRouter::new(
            providers,
            Arc::new(CredentialPool::new(specs).unwrap()),
            FallbackResponder::builtin(),
            PromptBuilder::new(&RouterSettings::default()),
            options,
        )
    }

    fn cool(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_success_with_directive() {
        let adapter = MockAdapter::new("gemini", Step::Reply("Olá! ACTION_SUGGESTED: query-relatorio-Ver vendas"));
        let router = router(vec![(adapter, 0)], specs("gemini", 1, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.message, "Olá!");
        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.actions[0].kind, "query-relatorio");
        assert_eq!(response.actions[0].title, "Ver vendas");
        assert_eq!(response.metadata.provider, "gemini");
        assert_eq!(response.metadata.tokens_used, Some(42));
        assert_eq!(response.metadata.model.as_deref(), Some("mock-model"));
    }

    #[tokio::test]
    async fn test_all_quota_exhausted_returns_module_fallback() {
        let adapter = MockAdapter::new("gemini", Step::Fail(FailureKind::QuotaExceeded));
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert!(response.is_fallback());
        assert_eq!(response.metadata.provider, "fallback");
        assert_eq!(response.message, FallbackResponder::builtin().profile("home").fallback_reply);
        assert!(!response.metadata.cancelled);

        let status = router.providers_status();
        assert_eq!(status["gemini"].exhausted_count, 2);
        assert_eq!(status["gemini"].live_count, 0);
        assert!(!status["gemini"].usable);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_quota_rotates_to_next_credential() {
        let adapter = MockAdapter::new("gemini", Step::Reply("Resposta"))
            .script("gemini#1", vec![Step::Fail(FailureKind::QuotaExceeded)]);
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.message, "Resposta");
        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1", "gemini#2"]);
        assert_eq!(
            router.pool().state(&CredentialId::new("gemini#1")),
            Some(CredentialState::Exhausted)
        );
    }

    #[tokio::test]
    async fn test_failover_to_lower_priority_provider() {
        let primary = MockAdapter::new("gemini", Step::Fail(FailureKind::QuotaExceeded));
        let secondary = MockAdapter::new("groq", Step::Reply("Do groq"));
        let mut all = specs("gemini", 1, cool(60));
        all.extend(specs("groq", 1, cool(60)));
        // Declared out of order; priority decides.
        let router = router(vec![(secondary, 1), (primary, 0)], all);

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.metadata.provider, "groq");
        assert_eq!(response.message, "Do groq");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_credential_skipped_until_cool_down() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#1", vec![Step::Fail(FailureKind::QuotaExceeded), Step::Reply("ok")]);
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));
        let request = ChatRequest::new("oi", "home");

        router.process_message(&request).await;
        router.process_message(&request).await;
        router.process_message(&request).await;
        // #1 failed, then every request within the cool-down lands on #2.
        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1", "gemini#2", "gemini#2", "gemini#2"]);

        tokio::time::advance(cool(61)).await;
        calls.lock().unwrap().clear();
        router.process_message(&request).await;
        router.process_message(&request).await;
        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1", "gemini#2"]);
    }

    #[tokio::test]
    async fn test_round_robin_across_requests() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"));
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 3, cool(60)));
        let request = ChatRequest::new("oi", "home");

        for _ in 0..3 {
            router.process_message(&request).await;
        }

        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["gemini#1", "gemini#2", "gemini#3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retries_same_credential_without_penalty() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok")).script(
            "gemini#1",
            vec![
                Step::Fail(FailureKind::TransientNetwork),
                Step::Fail(FailureKind::TransientNetwork),
                Step::Reply("depois de duas falhas"),
            ],
        );
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.message, "depois de duas falhas");
        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1"; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhausts_retries_then_rotates() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#1", vec![Step::Fail(FailureKind::TransientNetwork)]);
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.message, "ok");
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["gemini#1", "gemini#1", "gemini#1", "gemini#2"]
        );
        // Transient failures never penalize the credential.
        assert_eq!(
            router.pool().state(&CredentialId::new("gemini#1")),
            Some(CredentialState::Live)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#1", vec![Step::Hang]);
        let router = router_with(
            vec![(adapter, 0)],
            specs("gemini", 2, cool(60)),
            RouterOptions {
                call_timeout: Duration::from_millis(100),
                transient_retries: 0,
                ..options()
            },
        );

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.metadata.provider, "gemini");
        assert_eq!(response.message, "ok");
        assert_eq!(
            router.pool().state(&CredentialId::new("gemini#1")),
            Some(CredentialState::Live)
        );
    }

    #[tokio::test]
    async fn test_auth_rejected_disables_credential() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#1", vec![Step::Fail(FailureKind::AuthRejected)]);
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));
        let request = ChatRequest::new("oi", "home");

        router.process_message(&request).await;
        router.process_message(&request).await;

        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1", "gemini#2", "gemini#2"]);
        let status = router.providers_status();
        assert_eq!(status["gemini"].disabled_count, 1);
        assert_eq!(status["gemini"].exhausted_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_rotates_without_penalty() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#1", vec![Step::Fail(FailureKind::MalformedResponse), Step::Reply("ok")]);
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 2, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "home")).await;

        assert_eq!(response.message, "ok");
        assert_eq!(*calls.lock().unwrap(), vec!["gemini#1", "gemini#2"]);
        assert_eq!(
            router.pool().state(&CredentialId::new("gemini#1")),
            Some(CredentialState::Live)
        );
    }

    #[tokio::test]
    async fn test_every_credential_tried_at_most_once_per_request() {
        let adapter = MockAdapter::new("gemini", Step::Fail(FailureKind::MalformedResponse));
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 3, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "vendas")).await;

        assert!(response.is_fallback());
        assert_eq!(response.actions[0].kind, "create-venda");
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_action_outside_vocabulary_is_dropped() {
        let adapter = MockAdapter::new(
            "gemini",
            Step::Reply("Vamos lá. ACTION_SUGGESTED: create-venda-Nova venda"),
        );
        let router = router(vec![(adapter, 0)], specs("gemini", 1, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "clientes")).await;

        assert_eq!(response.message, "Vamos lá.");
        assert!(response.actions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_module_accepts_any_action() {
        let adapter = MockAdapter::new(
            "gemini",
            Step::Reply("Certo. ACTION_SUGGESTED: create-cliente-Novo cliente João"),
        );
        let router = router(vec![(adapter, 0)], specs("gemini", 1, cool(60)));

        let response = router.process_message(&ChatRequest::new("oi", "crm")).await;

        assert_eq!(response.actions[0].kind, "create-cliente");
        assert_eq!(response.actions[0].title, "Novo cliente João");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_fallback_without_penalty() {
        let adapter = MockAdapter::new("gemini", Step::Hang);
        let router = router(vec![(adapter, 0)], specs("gemini", 1, cool(60)));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let response = router
            .process_message_with_cancel(&ChatRequest::new("oi", "agenda"), &cancel)
            .await;

        assert!(response.is_fallback());
        assert!(response.metadata.cancelled);
        assert_eq!(response.actions[0].kind, "create-compromisso");
        assert_eq!(
            router.pool().state(&CredentialId::new("gemini#1")),
            Some(CredentialState::Live)
        );
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_upstream() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"));
        let calls = adapter.calls();
        let router = router(vec![(adapter, 0)], specs("gemini", 1, cool(60)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let response = router
            .process_message_with_cancel(&ChatRequest::new("oi", "home"), &cancel)
            .await;

        assert!(response.metadata.cancelled);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_only_router() {
        let router = LlmRouter::fallback_only(FallbackResponder::builtin(), &RouterSettings::default());
        let response = router.process_message(&ChatRequest::new("oi", "estoque")).await;
        assert!(response.is_fallback());
        assert!(router.providers_status().is_empty());
    }

    #[tokio::test]
    async fn test_provider_without_credentials_listed_unusable() {
        let router = router(
            vec![(MockAdapter::new("gemini", Step::Reply("ok")), 0), (MockAdapter::new("groq", Step::Reply("ok")), 1)],
            specs("gemini", 1, cool(60)),
        );
        let status = router.providers_status();
        assert!(status["gemini"].usable);
        assert!(!status["groq"].usable);
        assert_eq!(status["groq"].live_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_all_resolve() {
        let adapter = MockAdapter::new("gemini", Step::Reply("ok"))
            .script("gemini#2", vec![Step::Fail(FailureKind::QuotaExceeded)]);
        let router = Arc::new(router(vec![(adapter, 0)], specs("gemini", 4, cool(60))));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let router = Arc::clone(&router);
                tokio::spawn(async move { router.process_message(&ChatRequest::new("oi", "home")).await })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap();
            assert_eq!(response.metadata.provider, "gemini");
        }
        assert_eq!(router.providers_status()["gemini"].exhausted_count, 1);
    }

    #[tokio::test]
    async fn test_destroy_twice_is_safe() {
        let router = router_with(
            vec![(MockAdapter::new("gemini", Step::Reply("ok")), 0)],
            specs("gemini", 1, cool(60)),
            RouterOptions {
                sweep_interval: Some(Duration::from_secs(1)),
                ..options()
            },
        );
        assert!(router.sweeper_running());

        router.destroy();
        router.destroy();
        assert!(!router.sweeper_running());

        // Still answers after destroy.
        let response = router.process_message(&ChatRequest::new("oi", "home")).await;
        assert_eq!(response.metadata.provider, "gemini");
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 10), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(base, 40), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_options_from_settings() {
        let settings = RouterSettings {
            sweep_interval_secs: 0,
            ..RouterSettings::default()
        };
        let options = RouterOptions::from(&settings);
        assert_eq!(options.call_timeout, Duration::from_secs(30));
        assert!(options.sweep_interval.is_none());
        assert!(RouterOptions::default().sweep_interval.is_some());
    }
}
