use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// Fully-resolved request handed to the transport: final URL with query
/// string already appended, merged headers, and the serialized body.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub data: Option<Value>,
}

/// Raw response reported by the transport. `data` is `Value::Null` when
/// the response carried no body.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub data: Value,
}

impl TransportResponse {
    pub fn new(status: Option<StatusCode>, data: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data,
        }
    }
}

/// Transport-level failure, unrelated to any HTTP status. Aborted calls
/// report the recognized `request:fail abort` message.
#[derive(Clone, Debug)]
pub struct TransportFailure {
    pub message: String,
}

pub(crate) const ABORT_MESSAGE: &str = "request:fail abort";

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn aborted() -> Self {
        Self::new(ABORT_MESSAGE)
    }

    pub fn is_abort(&self) -> bool {
        self.message == ABORT_MESSAGE
    }
}

type OutcomeFn = Box<dyn FnOnce(Result<TransportResponse, TransportFailure>) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// Completion callbacks for one transport call.
///
/// The transport must invoke exactly one of [`succeed`](Self::succeed) /
/// [`fail`](Self::fail), followed by [`complete`](Self::complete), and
/// must deliver them asynchronously with respect to
/// [`Transport::start`]. Extra invocations are ignored.
pub struct TransportCallbacks {
    outcome: Option<OutcomeFn>,
    complete: Option<CompleteFn>,
}

impl TransportCallbacks {
    pub(crate) fn new(outcome: OutcomeFn, complete: CompleteFn) -> Self {
        Self {
            outcome: Some(outcome),
            complete: Some(complete),
        }
    }

    pub fn succeed(&mut self, response: TransportResponse) {
        if let Some(outcome) = self.outcome.take() {
            outcome(Ok(response));
        }
    }

    pub fn fail(&mut self, failure: TransportFailure) {
        if let Some(outcome) = self.outcome.take() {
            outcome(Err(failure));
        }
    }

    pub fn complete(&mut self) {
        if let Some(complete) = self.complete.take() {
            complete();
        }
    }
}

impl std::fmt::Debug for TransportCallbacks {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TransportCallbacks")
            .field("outcome_pending", &self.outcome.is_some())
            .field("complete_pending", &self.complete.is_some())
            .finish()
    }
}

/// Cancellation handle for a started call. `abort` is best-effort: it
/// must no-op rather than error on a handle that never started or has
/// already completed. An aborted call still reports failure/completion
/// through its callbacks, with the recognized abort message.
pub trait TransportHandle: Send {
    fn abort(&self);
}

impl std::fmt::Debug for dyn TransportHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("TransportHandle").finish()
    }
}

/// The underlying request primitive: issues one network call per
/// invocation and reports the outcome through [`TransportCallbacks`].
pub trait Transport: Send + Sync {
    fn start(
        &self,
        request: TransportRequest,
        callbacks: TransportCallbacks,
    ) -> Box<dyn TransportHandle>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TransportCallbacks, TransportFailure, TransportResponse};

    #[test]
    fn abort_failure_is_recognized_by_message() {
        assert!(TransportFailure::aborted().is_abort());
        assert!(!TransportFailure::new("connection reset").is_abort());
    }

    #[test]
    fn callbacks_fire_at_most_once() {
        let mut callbacks = TransportCallbacks::new(
            Box::new(|outcome| assert!(outcome.is_ok())),
            Box::new(|| {}),
        );
        callbacks.succeed(TransportResponse::new(None, json!({ "ok": true })));
        // Second outcome is dropped instead of double-firing.
        callbacks.fail(TransportFailure::new("late failure"));
        callbacks.complete();
        callbacks.complete();
    }
}
