use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrchestratorErrorCode {
    InvalidConfig,
    FastFail,
    Aborted,
    Transport,
    Payload,
    Status,
    Interceptor,
    Serialize,
    Deserialize,
    Unknown,
}

impl OrchestratorErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "invalid_config",
            Self::FastFail => "fast_fail",
            Self::Aborted => "aborted",
            Self::Transport => "transport",
            Self::Payload => "payload",
            Self::Status => "status",
            Self::Interceptor => "interceptor",
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("orchestrator configuration is invalid: {message}")]
    InvalidConfig { message: &'static str },
    #[error("request:fail fast")]
    FastFail,
    #[error("request:fail abort")]
    Aborted,
    #[error("transport failure: {message}")]
    Transport { message: String },
    #[error("request rejected with payload: {payload}")]
    Payload { payload: Value },
    #[error("http status error {status}: {message}")]
    Status { status: u16, message: &'static str },
    #[error("interceptor rejected request: {message}")]
    Interceptor { message: String },
    #[error("failed to serialize request data: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode response payload: {source}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown error, try again later")]
    Unknown,
}

impl OrchestratorError {
    pub const fn code(&self) -> OrchestratorErrorCode {
        match self {
            Self::InvalidConfig { .. } => OrchestratorErrorCode::InvalidConfig,
            Self::FastFail => OrchestratorErrorCode::FastFail,
            Self::Aborted => OrchestratorErrorCode::Aborted,
            Self::Transport { .. } => OrchestratorErrorCode::Transport,
            Self::Payload { .. } => OrchestratorErrorCode::Payload,
            Self::Status { .. } => OrchestratorErrorCode::Status,
            Self::Interceptor { .. } => OrchestratorErrorCode::Interceptor,
            Self::Serialize { .. } => OrchestratorErrorCode::Serialize,
            Self::Deserialize { .. } => OrchestratorErrorCode::Deserialize,
            Self::Unknown => OrchestratorErrorCode::Unknown,
        }
    }

    /// Fast-fail and abort rejections are recognized by message and never
    /// surface through the global notification hook.
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::FastFail | Self::Aborted)
    }
}

/// Human-readable messages for the fixed set of recognized status codes.
/// Codes outside this table fall through to the generic unknown error.
pub(crate) fn status_message(status: u16) -> Option<&'static str> {
    Some(match status {
        400 => "invalid request parameters",
        401 => "unauthorized, please sign in",
        403 => "access denied by server",
        404 => "404 Not Found",
        405 => "request method not allowed",
        408 => "request timed out",
        500 => "internal server error",
        501 => "service not implemented",
        502 => "bad gateway",
        503 => "service unavailable",
        504 => "gateway timeout",
        505 => "http version not supported",
        _ => return None,
    })
}
