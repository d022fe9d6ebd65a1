//! Rust client for the Belake.ai API.
//!
//! Operations are addressed by a `(resource, operation)` pair resolved against a
//! static registry of request templates. A batch authenticates once (API key ->
//! bearer token) and then dispatches each invocation in order:
//!
//! ```no_run
//! use belake::{Client, Credentials, FailurePolicy, FieldValues, Invocation, OperationKey};
//!
//! # async fn run() -> belake::Result<()> {
//! let client = Client::from_credentials(Credentials::new("https://api.belake.ai", "bk_..."))?;
//! let report = client
//!     .batch(FailurePolicy::Continue)
//!     .run(&[Invocation::new(
//!         OperationKey::parse("chat", "Send Message")?,
//!         FieldValues::new()
//!             .with("agentsIds", "a1")
//!             .with("message", "hello")
//!             .with("language", "en-us"),
//!     )])
//!     .await?;
//! println!("{:?}", report.to_output());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Login endpoint exchanging an API key for a bearer token.
pub const LOGIN_PATH: &str = "/login/api-key-auth";

/// HTTP header carrying the backend's request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Environment variable read by [`Credentials::from_env`].
pub const BACKEND_URL_ENV: &str = "BELAKE_BACKEND_URL";

/// Environment variable read by [`Credentials::from_env`].
pub const API_KEY_ENV: &str = "BELAKE_API_KEY";

/// HTTP header identifying the client library.
pub(crate) const CLIENT_HEADER: &str = "X-Belake-Client";

pub(crate) const DEFAULT_CLIENT_HEADER: &str = concat!("belake-rust/", env!("CARGO_PKG_VERSION"));

pub(crate) const APPLICATION_JSON: &str = "application/json";

mod auth;
mod batch;
mod client;
mod credentials;
mod errors;
mod fields;
mod http;
pub mod registry;
mod telemetry;
pub mod testing;

#[cfg(feature = "blocking")]
mod blocking;

pub use auth::{AuthClient, AuthToken, authenticate};
pub use batch::{
    BatchItem, BatchReport, BatchRunner, CallFailure, CallResult, CancellationFlag, FailurePolicy,
    Invocation,
};
pub use client::{Client, Config, OperationsClient};
pub use credentials::{ApiKey, Credentials};
pub use errors::{
    AuthenticationError, Error, Result, TransportError, TransportErrorKind, UpstreamError,
    ValidationError,
};
pub use fields::FieldValues;
pub use http::{HeaderEntry, HeaderList, RequestOptions};
pub use registry::{Operation, OperationKey, RequestTemplate, Resource};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext};

#[cfg(feature = "blocking")]
pub use blocking::{
    BlockingAuthClient, BlockingBatchRunner, BlockingClient, BlockingConfig,
    BlockingOperationsClient,
};
