use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::RequestConfig;
use crate::error::{status_message, OrchestratorError};
use crate::hooks::{DefaultInterceptors, Interceptors, Notifier, SilentNotifier};
use crate::metrics::{OrchestratorMetrics, OrchestratorMetricsSnapshot};
use crate::queue::{CallFactory, QueueCall, QueueEntry, QueueState, RequestToken};
use crate::transport::{Transport, TransportCallbacks, TransportRequest, TransportResponse};
use crate::util::{lock_unpoisoned, resolve_url};
use crate::ReqflowResult;

/// Request orchestrator: turns ad-hoc calls against a callback-based
/// transport into managed traffic with bounded concurrency, debounce,
/// throttle, wait barriers, and retry.
///
/// All queue state is owned by this instance; separate orchestrators
/// never share queues. Cloning is cheap and shares the same instance.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

pub struct OrchestratorBuilder {
    transport: Arc<dyn Transport>,
    base: RequestConfig,
    interceptors: Arc<dyn Interceptors>,
    notifier: Arc<dyn Notifier>,
}

impl OrchestratorBuilder {
    /// Static base configuration merged under every call. `max_queue` set
    /// here becomes the concurrency ceiling.
    pub fn base(mut self, base: RequestConfig) -> Self {
        self.base = base;
        self
    }

    pub fn interceptors(mut self, interceptors: Arc<dyn Interceptors>) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn try_build(self) -> ReqflowResult<Orchestrator> {
        self.base.validate_as_base()?;
        let ceiling = self.base.configured_max_queue();
        Ok(Orchestrator {
            inner: Arc::new(Inner {
                transport: self.transport,
                base: self.base,
                ceiling,
                interceptors: self.interceptors,
                notifier: self.notifier,
                state: Mutex::new(QueueState::default()),
                next_token: AtomicU64::new(1),
                metrics: OrchestratorMetrics::default(),
            }),
        })
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    base: RequestConfig,
    ceiling: Option<usize>,
    interceptors: Arc<dyn Interceptors>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<QueueState>,
    next_token: AtomicU64,
    metrics: OrchestratorMetrics,
}

/// A failure still tied to its originating descriptor; input to the
/// retry state machine and to error resolution.
struct FailedAttempt {
    config: RequestConfig,
    status: Option<StatusCode>,
    data: Value,
}

/// Outcome classification for one attempt. `Direct` failures carry no
/// descriptor and bypass the retry machine entirely.
enum AttemptError {
    Direct(OrchestratorError),
    Rejected(FailedAttempt),
}

impl Orchestrator {
    pub fn builder(transport: Arc<dyn Transport>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            transport,
            base: RequestConfig::default(),
            interceptors: Arc::new(DefaultInterceptors),
            notifier: Arc::new(SilentNotifier),
        }
    }

    /// Issues one logical request. Resolves with the interceptor-shaped
    /// response value, or rejects with the resolved error after any
    /// retries are exhausted.
    pub async fn request(&self, config: RequestConfig) -> ReqflowResult<Value> {
        let merged = config.merged_over(&self.inner.base);
        self.submit(merged).await
    }

    /// `request` plus typed deserialization of the result value.
    pub async fn request_json<T>(&self, config: RequestConfig) -> ReqflowResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.request(config).await?;
        serde_json::from_value(value).map_err(|source| OrchestratorError::Deserialize { source })
    }

    /// Aborts every abortable entry in both queues and removes it.
    /// Entries with `wait` set are left untouched.
    pub fn clear_queue(&self) {
        let aborts = {
            let mut state = lock_unpoisoned(&self.inner.state);
            state.clear()
        };
        self.inner.metrics.record_queue_clear();
        debug!(aborted = aborts.len(), "cleared request queues");
        for handle in aborts {
            handle.abort();
        }
    }

    /// Current `(in_flight, pending)` depths.
    pub fn queue_depths(&self) -> (usize, usize) {
        let state = lock_unpoisoned(&self.inner.state);
        (state.in_flight_len(), state.pending_len())
    }

    pub fn metrics_snapshot(&self) -> OrchestratorMetricsSnapshot {
        let (in_flight, pending) = self.queue_depths();
        self.inner.metrics.snapshot(in_flight, pending)
    }

    /// One pass through the pipeline, recursing on retry. Boxed because
    /// the retry machine re-enters it.
    fn submit(&self, mut config: RequestConfig) -> BoxFuture<'_, ReqflowResult<Value>> {
        Box::pin(async move {
            match self.attempt(&mut config).await {
                Ok(value) => Ok(value),
                Err(AttemptError::Direct(error)) => {
                    if config.is_notify() && !error.is_silent() {
                        self.inner.notifier.show_toast(&error);
                    }
                    self.inner.metrics.record_failed();
                    Err(error)
                }
                Err(AttemptError::Rejected(failed)) => self.run_retry(failed).await,
            }
        })
    }

    async fn attempt(&self, config: &mut RequestConfig) -> Result<Value, AttemptError> {
        self.inner
            .interceptors
            .on_request(config)
            .await
            .map_err(AttemptError::Direct)?;

        // The indicator is shown once per logical request, not per
        // attempt.
        if config.is_loading() && config.is_first_attempt() {
            self.inner.notifier.show_loading();
        }

        let response = self
            .inner
            .execute(config)
            .await
            .map_err(AttemptError::Direct)?;

        match self.inner.interceptors.on_response(&response).await {
            Ok(value) => {
                self.inner.notifier.clear_loading().await;
                self.inner.metrics.record_succeeded();
                Ok(value)
            }
            Err(rejection) => {
                debug!(
                    url = config.url(),
                    error = %rejection,
                    "response interceptor rejected; evaluating retry"
                );
                Err(AttemptError::Rejected(FailedAttempt {
                    config: config.clone(),
                    status: response.status,
                    data: response.data,
                }))
            }
        }
    }

    /// The retry state machine: Evaluating, then either Resubmitting
    /// (delay + fresh admission with the same mutated descriptor) or
    /// Terminal (error resolution, then the last-chance interceptor).
    async fn run_retry(&self, mut failed: FailedAttempt) -> ReqflowResult<Value> {
        if failed.config.retry_active_count.is_none() {
            failed.config.retry_active_count = Some(0);
        }

        // A throttled descriptor must not keep blocking same-url
        // admissions while the retry decision is pending.
        if failed.config.is_throttle() {
            if let Some(token) = failed.config.token {
                let mut state = lock_unpoisoned(&self.inner.state);
                state.remove_in_flight(token);
            }
        }

        let active = failed.config.retry_active_count.unwrap_or(0);
        let terminal = active >= failed.config.effective_retry_count() || !failed.config.is_retry();
        if terminal {
            if let Some(token) = failed.config.token {
                let mut state = lock_unpoisoned(&self.inner.state);
                state.remove_everywhere(token);
            }
            let resolved = self.resolve_failure(&failed).await;
            self.inner.metrics.record_failed();
            return Err(self.inner.interceptors.on_response_error(resolved).await);
        }

        failed.config.retry_active_count = Some(active + 1);
        let delay = failed.config.effective_retry_delay();
        warn!(
            url = failed.config.url(),
            attempt = active + 1,
            max_attempts = failed.config.effective_retry_count(),
            delay_ms = delay.as_millis() as u64,
            "retrying failed request"
        );
        self.inner.metrics.record_retry_scheduled();
        sleep(delay).await;
        self.submit(failed.config).await
    }

    /// Error resolution in fixed priority order: raw payload, then
    /// recognized status, then the generic unknown error. Always yields
    /// the rejection value; display side effects honor `notify`.
    async fn resolve_failure(&self, failed: &FailedAttempt) -> OrchestratorError {
        self.inner.notifier.clear_loading().await;
        if let Some(token) = failed.config.token {
            let mut state = lock_unpoisoned(&self.inner.state);
            state.remove_in_flight(token);
        }

        if !failed.config.is_notify() {
            return OrchestratorError::Payload {
                payload: failed.data.clone(),
            };
        }

        if !payload_is_empty(&failed.data) {
            let resolved = OrchestratorError::Payload {
                payload: failed.data.clone(),
            };
            self.inner.notifier.show_toast(&resolved);
            return resolved;
        }

        if let Some(status) = failed.status {
            if let Some(message) = status_message(status.as_u16()) {
                let resolved = OrchestratorError::Status {
                    status: status.as_u16(),
                    message,
                };
                self.inner.notifier.show_toast(&resolved);
                return resolved;
            }
        }

        error!(
            url = failed.config.url(),
            "backend returned neither an error payload nor a recognized status"
        );
        let resolved = OrchestratorError::Unknown;
        self.inner.notifier.show_toast(&resolved);
        resolved
    }
}

impl Inner {
    /// Runs one transport call: mints the attempt token, wires the
    /// completion callbacks, passes admission and dispatch, then awaits
    /// the outcome. A dropped outcome channel means the entry was
    /// cancelled before it ever started.
    async fn execute(
        self: &Arc<Self>,
        config: &mut RequestConfig,
    ) -> ReqflowResult<TransportResponse> {
        let token = RequestToken::from_raw(self.next_token.fetch_add(1, Ordering::Relaxed));
        config.token = Some(token);

        let request = TransportRequest {
            url: resolve_url(config),
            method: config.effective_method(),
            headers: config.headers().clone(),
            data: config.request_data().cloned(),
        };

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let callbacks = TransportCallbacks::new(
            Box::new(move |outcome| {
                let _ = outcome_tx.send(outcome);
            }),
            Box::new({
                let inner = Arc::clone(self);
                move || inner.finish(token)
            }),
        );
        let transport = Arc::clone(&self.transport);
        let factory: CallFactory = Box::new(move || transport.start(request, callbacks));

        self.admit_and_dispatch(token, config, factory)?;

        match outcome_rx.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) if failure.is_abort() => Err(OrchestratorError::Aborted),
            Ok(Err(failure)) => Err(OrchestratorError::Transport {
                message: failure.message,
            }),
            Err(_) => Err(OrchestratorError::Aborted),
        }
    }

    /// Admission control plus dispatch under one critical section.
    /// Cancelled predecessors are aborted only after the lock is
    /// released.
    fn admit_and_dispatch(
        &self,
        token: RequestToken,
        config: &RequestConfig,
        factory: CallFactory,
    ) -> ReqflowResult<()> {
        let url = config.url().to_owned();
        let method = config.effective_method();
        let mut aborts = Vec::new();

        let admitted = {
            let mut state = lock_unpoisoned(&self.state);
            match state.admit(&url, &method, config.is_throttle()) {
                Err(rejection) => {
                    self.metrics.record_throttle_rejection();
                    Err(rejection)
                }
                Ok(cancelled) => {
                    self.metrics
                        .record_debounce_cancellations(cancelled.len() as u64);
                    aborts = cancelled;

                    let immediate = state.accepts_in_flight(self.ceiling);
                    let call = if immediate {
                        QueueCall::Started(factory())
                    } else {
                        QueueCall::Deferred(factory)
                    };
                    let entry = QueueEntry {
                        url: url.clone(),
                        method,
                        enable_cancel: config.is_enable_cancel(),
                        wait: config.is_wait(),
                        call,
                    };
                    if immediate {
                        state.insert_in_flight(token, entry);
                        self.metrics.record_admitted();
                        debug!(url = %url, ?token, "request started in flight");
                    } else {
                        state.insert_pending(token, entry);
                        self.metrics.record_deferred();
                        debug!(url = %url, ?token, "request deferred to pending queue");
                    }
                    Ok(())
                }
            }
        };

        for handle in aborts {
            handle.abort();
        }
        admitted
    }

    /// Completion hook, invoked exactly once per in-flight completion:
    /// frees the slot, then promotes the oldest pending entry unless a
    /// wait barrier holds.
    fn finish(self: &Arc<Self>, token: RequestToken) {
        let mut state = lock_unpoisoned(&self.state);
        state.remove_in_flight(token);

        if state.barrier_active() {
            return;
        }
        let Some((next_token, entry)) = state.take_oldest_pending() else {
            return;
        };
        let QueueEntry {
            url,
            method,
            enable_cancel,
            wait,
            call,
        } = entry;
        let handle = match call {
            QueueCall::Deferred(start) => start(),
            QueueCall::Started(handle) => handle,
        };
        state.insert_in_flight(
            next_token,
            QueueEntry {
                url,
                method,
                enable_cancel,
                wait,
                call: QueueCall::Started(handle),
            },
        );
        self.metrics.record_promotion();
        debug!(token = ?next_token, "promoted pending request into flight");
    }
}

fn payload_is_empty(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
