use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::config::RequestConfig;
use crate::error::OrchestratorError;
use crate::transport::TransportResponse;
use crate::ReqflowResult;

/// Caller-supplied request/response hooks.
///
/// `on_request` may mutate or validate the merged config before the call
/// enters admission; its rejection aborts the call without retry.
/// `on_response` transforms a raw transport response into the
/// caller-visible value; its rejection routes the response into the retry
/// state machine. `on_response_error` is the last-chance handler applied
/// once per terminal failure; whatever it returns is what the public call
/// rejects with.
pub trait Interceptors: Send + Sync {
    fn on_request<'a>(
        &'a self,
        config: &'a mut RequestConfig,
    ) -> BoxFuture<'a, ReqflowResult<()>> {
        let _ = config;
        Box::pin(async { Ok(()) })
    }

    fn on_response<'a>(
        &'a self,
        response: &'a TransportResponse,
    ) -> BoxFuture<'a, ReqflowResult<Value>> {
        Box::pin(async move { Ok(response.data.clone()) })
    }

    fn on_response_error(&self, error: OrchestratorError) -> BoxFuture<'_, OrchestratorError> {
        Box::pin(async move { error })
    }
}

/// Pass-through interceptors: the raw response body is the result.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultInterceptors;

impl Interceptors for DefaultInterceptors {}

/// Loading-indicator and toast surface. Everything is fire-and-forget
/// except `clear_loading`, which is awaited before any error display.
pub trait Notifier: Send + Sync {
    fn show_loading(&self) {}

    fn clear_loading(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn show_toast(&self, error: &OrchestratorError) {
        let _ = error;
    }

    fn clear_toast(&self) {}
}

/// No-op notifier for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {}
