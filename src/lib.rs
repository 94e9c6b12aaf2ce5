//! `reqflow` is a request-orchestration layer for callback-based HTTP
//! transports: it turns ad-hoc request calls into managed traffic with
//! bounded concurrency, ordering barriers, de-duplication, throttling,
//! and automatic retry, while keeping a one-shot async call contract.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use reqflow::prelude::{Orchestrator, RequestConfig};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn transport() -> Arc<dyn reqflow::Transport> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::builder(transport())
//!         .base(
//!             RequestConfig::new("")
//!                 .base_url("https://api.example.com")
//!                 .prefix("/v1")
//!                 .max_queue(4),
//!         )
//!         .try_build()?;
//!
//!     let user: User = orchestrator
//!         .request_json(
//!             RequestConfig::get("/users/1")
//!                 .retry(true)
//!                 .retry_delay(Duration::from_millis(100)),
//!         )
//!         .await?;
//!
//!     println!("fetched {}", user.name);
//!     Ok(())
//! }
//! ```
//!
//! # Traffic shaping per call
//!
//! - `throttle`: reject a request outright while a same-`(url, method)`
//!   entry is queued or in flight.
//! - `enable_cancel` (default on): a new request cancels queued or
//!   in-flight duplicates before it is admitted.
//! - `wait`: once this request is the oldest in flight, nothing else is
//!   promoted until it completes.
//! - `max_queue` (base config): ceiling on concurrent in-flight calls.

mod config;
mod error;
mod hooks;
mod metrics;
mod orchestrator;
mod queue;
mod transport;
mod util;

pub use crate::config::RequestConfig;
pub use crate::error::{OrchestratorError, OrchestratorErrorCode};
pub use crate::hooks::{DefaultInterceptors, Interceptors, Notifier, SilentNotifier};
pub use crate::metrics::OrchestratorMetricsSnapshot;
pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder};
pub use crate::queue::RequestToken;
pub use crate::transport::{
    Transport, TransportCallbacks, TransportFailure, TransportHandle, TransportRequest,
    TransportResponse,
};

pub type ReqflowResult<T> = std::result::Result<T, OrchestratorError>;

pub mod prelude {
    pub use crate::{
        DefaultInterceptors, Interceptors, Notifier, Orchestrator, OrchestratorError,
        OrchestratorErrorCode, OrchestratorMetricsSnapshot, ReqflowResult, RequestConfig,
        SilentNotifier, Transport, TransportCallbacks, TransportFailure, TransportHandle,
        TransportRequest, TransportResponse,
    };
}
