use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

use crate::error::OrchestratorError;
use crate::queue::RequestToken;
use crate::ReqflowResult;

pub(crate) const DEFAULT_RETRY_COUNT: u32 = 3;
pub(crate) const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Per-call request options.
///
/// Every option is tri-state internally: unset fields fall back to the
/// orchestrator's base configuration during merge, then to the documented
/// default. Setters follow the builder style, so a call site reads as
/// `RequestConfig::get("/users").retry(true).wait(true)`.
#[derive(Clone, Debug, Default)]
pub struct RequestConfig {
    url: String,
    method: Option<Method>,
    params: Vec<(String, String)>,
    data: Option<Value>,
    headers: HeaderMap,
    base_url: Option<String>,
    prefix: Option<String>,
    retry: Option<bool>,
    retry_count: Option<u32>,
    retry_delay: Option<Duration>,
    loading: Option<bool>,
    notify: Option<bool>,
    enable_cancel: Option<bool>,
    throttle: Option<bool>,
    wait: Option<bool>,
    max_queue: Option<usize>,
    /// Attempts already consumed by the retry machine. The only field
    /// mutated after creation; carried across resubmissions.
    pub(crate) retry_active_count: Option<u32>,
    /// Token of the attempt currently (or last) holding a queue slot.
    pub(crate) token: Option<RequestToken>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url).method(Method::GET)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).method(Method::POST)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn json<T>(self, payload: &T) -> ReqflowResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_value(payload)
            .map_err(|source| OrchestratorError::Serialize { source })?;
        Ok(self.data(data))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay.max(Duration::from_millis(1)));
        self
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn enable_cancel(mut self, enable_cancel: bool) -> Self {
        self.enable_cancel = Some(enable_cancel);
        self
    }

    pub fn throttle(mut self, throttle: bool) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Maximum number of requests executing at once. Read from the base
    /// configuration only; per-call values do not move the ceiling.
    pub fn max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = Some(max_queue);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn effective_method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    pub fn is_retry(&self) -> bool {
        self.retry.unwrap_or(false)
    }

    pub fn effective_retry_count(&self) -> u32 {
        self.retry_count.unwrap_or(DEFAULT_RETRY_COUNT)
    }

    pub fn effective_retry_delay(&self) -> Duration {
        self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.unwrap_or(false)
    }

    pub fn is_notify(&self) -> bool {
        self.notify.unwrap_or(true)
    }

    pub fn is_enable_cancel(&self) -> bool {
        self.enable_cancel.unwrap_or(true)
    }

    pub fn is_throttle(&self) -> bool {
        self.throttle.unwrap_or(false)
    }

    pub fn is_wait(&self) -> bool {
        self.wait.unwrap_or(false)
    }

    pub fn configured_max_queue(&self) -> Option<usize> {
        self.max_queue
    }

    pub(crate) fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub(crate) fn request_data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn base_url_part(&self) -> &str {
        self.base_url.as_deref().unwrap_or("")
    }

    pub(crate) fn prefix_part(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// Overlay this per-call config onto the orchestrator base: any field
    /// set here wins, unset fields inherit the base value. Headers merge
    /// by name with per-call entries taking precedence. Retry bookkeeping
    /// always belongs to the call side.
    pub(crate) fn merged_over(mut self, base: &RequestConfig) -> RequestConfig {
        self.method = self.method.or_else(|| base.method.clone());
        if self.params.is_empty() {
            self.params = base.params.clone();
        }
        self.data = self.data.or_else(|| base.data.clone());
        self.base_url = self.base_url.or_else(|| base.base_url.clone());
        self.prefix = self.prefix.or_else(|| base.prefix.clone());
        self.retry = self.retry.or(base.retry);
        self.retry_count = self.retry_count.or(base.retry_count);
        self.retry_delay = self.retry_delay.or(base.retry_delay);
        self.loading = self.loading.or(base.loading);
        self.notify = self.notify.or(base.notify);
        self.enable_cancel = self.enable_cancel.or(base.enable_cancel);
        self.throttle = self.throttle.or(base.throttle);
        self.wait = self.wait.or(base.wait);
        self.max_queue = self.max_queue.or(base.max_queue);

        self.headers = crate::util::merge_headers(&base.headers, &self.headers);
        self
    }

    /// A retried descriptor has already been merged once; merging again
    /// must not disturb it.
    pub(crate) fn is_first_attempt(&self) -> bool {
        self.retry_active_count.is_none() || self.retry_active_count == Some(0)
    }

    pub(crate) fn validate_as_base(&self) -> ReqflowResult<()> {
        if self.max_queue == Some(0) {
            return Err(OrchestratorError::InvalidConfig {
                message: "max_queue must be at least 1",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::header::{ACCEPT, AUTHORIZATION};
    use http::{HeaderValue, Method};
    use serde_json::json;

    use super::RequestConfig;

    #[test]
    fn defaults_match_documented_values() {
        let config = RequestConfig::new("/users");
        assert_eq!(config.effective_method(), Method::GET);
        assert!(!config.is_retry());
        assert_eq!(config.effective_retry_count(), 3);
        assert_eq!(config.effective_retry_delay(), Duration::from_millis(100));
        assert!(!config.is_loading());
        assert!(config.is_notify());
        assert!(config.is_enable_cancel());
        assert!(!config.is_throttle());
        assert!(!config.is_wait());
        assert_eq!(config.configured_max_queue(), None);
    }

    #[test]
    fn merge_prefers_call_fields_over_base() {
        let base = RequestConfig::new("")
            .base_url("https://api.example.com")
            .retry(true)
            .retry_delay(Duration::from_millis(500))
            .notify(false);
        let merged = RequestConfig::get("/users")
            .retry_delay(Duration::from_millis(50))
            .merged_over(&base);

        assert_eq!(merged.url(), "/users");
        assert_eq!(merged.base_url_part(), "https://api.example.com");
        assert!(merged.is_retry());
        assert_eq!(merged.effective_retry_delay(), Duration::from_millis(50));
        assert!(!merged.is_notify());
    }

    #[test]
    fn merge_overlays_headers_by_name() {
        let base = RequestConfig::new("")
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer base"));
        let merged = RequestConfig::get("/users")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer call"))
            .merged_over(&base);

        assert_eq!(
            merged.headers().get(ACCEPT),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(
            merged.headers().get(AUTHORIZATION),
            Some(&HeaderValue::from_static("Bearer call"))
        );
    }

    #[test]
    fn json_setter_serializes_payload() {
        let config = RequestConfig::post("/items")
            .json(&json!({ "name": "demo" }))
            .expect("plain json payload should serialize");
        assert_eq!(config.request_data(), Some(&json!({ "name": "demo" })));
    }

    #[test]
    fn zero_max_queue_is_rejected_as_base() {
        let base = RequestConfig::new("").max_queue(0);
        assert!(base.validate_as_base().is_err());
        assert!(RequestConfig::new("").max_queue(1).validate_as_base().is_ok());
    }
}
