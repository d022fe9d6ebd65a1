use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    Method,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use serde_json::Value;

use crate::{
    APPLICATION_JSON, CLIENT_HEADER, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
    auth::{AuthClient, AuthToken},
    batch::{BatchRunner, FailurePolicy, Invocation},
    credentials::{ApiKey, Credentials, normalize_backend_url, require_api_key},
    errors::{Result, TransportError},
    fields::FieldValues,
    http::{HeaderList, RequestOptions, decode_json_body, endpoint_url, header_map},
    registry::{OperationKey, PreparedRequest},
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
};

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Backend root, e.g. `https://api.belake.ai`. Required.
    pub backend_url: Option<String>,
    /// API key exchanged for a bearer token at login. Required.
    pub api_key: Option<ApiKey>,
    /// Value for the `X-Belake-Client` header (defaults to `belake-rust/<version>`).
    pub client_header: Option<String>,
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
    /// Optional metrics callbacks (HTTP latency and outcome).
    pub metrics: Option<MetricsCallbacks>,
}

impl Config {
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            backend_url: Some(credentials.backend_url),
            api_key: Some(credentials.api_key),
            ..Default::default()
        }
    }

    /// Build a config from `BELAKE_BACKEND_URL` and `BELAKE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_credentials(Credentials::from_env()?))
    }
}

impl From<Credentials> for Config {
    fn from(credentials: Credentials) -> Self {
        Self::from_credentials(credentials)
    }
}

/// Async client for the Belake API.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    backend_url: String,
    pub(crate) api_key: ApiKey,
    client_header: Option<String>,
    http: reqwest::Client,
    request_timeout: Duration,
    default_headers: HeaderMap,
    telemetry: Telemetry,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let backend_url = normalize_backend_url(cfg.backend_url.as_deref().unwrap_or_default())?;
        let api_key = require_api_key(cfg.api_key.as_ref())?;

        let default_headers = match &cfg.default_headers {
            Some(list) => header_map(list)?,
            None => HeaderMap::new(),
        };

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|err| TransportError::connect("failed to build http client", err))?,
        };

        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(DEFAULT_CLIENT_HEADER.to_string()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                backend_url,
                api_key,
                client_header,
                http,
                request_timeout,
                default_headers,
                telemetry: Telemetry::new(cfg.metrics),
            }),
        })
    }

    pub fn from_credentials(credentials: Credentials) -> Result<Self> {
        Self::new(Config::from_credentials(credentials))
    }

    /// Normalized backend URL (no trailing slash).
    pub fn backend_url(&self) -> &str {
        &self.inner.backend_url
    }

    pub fn auth(&self) -> AuthClient {
        AuthClient {
            inner: self.inner.clone(),
        }
    }

    pub fn operations(&self) -> OperationsClient {
        OperationsClient {
            inner: self.inner.clone(),
        }
    }

    /// Batch runner that authenticates once and dispatches invocations in order.
    pub fn batch(&self, policy: FailurePolicy) -> BatchRunner {
        BatchRunner::new(self.auth(), self.operations(), policy)
    }
}

/// Dispatches registry operations with an already obtained token.
#[derive(Clone)]
pub struct OperationsClient {
    inner: Arc<ClientInner>,
}

impl OperationsClient {
    pub async fn dispatch(
        &self,
        token: &AuthToken,
        key: &OperationKey,
        fields: &FieldValues,
    ) -> Result<Value> {
        self.dispatch_with_options(token, key, fields, &RequestOptions::default())
            .await
    }

    /// Resolve `key`, apply `fields`, and execute exactly one HTTP call.
    pub async fn dispatch_with_options(
        &self,
        token: &AuthToken,
        key: &OperationKey,
        fields: &FieldValues,
        options: &RequestOptions,
    ) -> Result<Value> {
        let prepared = key.template()?.prepare(fields)?;
        let ctx = RequestContext::new(prepared.method.as_str(), prepared.path.clone())
            .with_operation(*key);
        let builder = self.inner.authorized_request(token, &prepared, options)?;
        let resp = self.inner.send(builder, ctx).await?;
        self.inner.read_json(resp).await
    }

    pub async fn execute(&self, token: &AuthToken, invocation: &Invocation) -> Result<Value> {
        self.dispatch(token, &invocation.key, &invocation.fields)
            .await
    }
}

impl ClientInner {
    /// Base request with JSON content negotiation, client header and default headers.
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = endpoint_url(&self.backend_url, path)?;
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, APPLICATION_JSON)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .timeout(timeout.unwrap_or(self.request_timeout));
        if let Some(client_header) = self.client_header.as_deref() {
            builder = builder.header(CLIENT_HEADER, client_header);
        }
        if !self.default_headers.is_empty() {
            builder = builder.headers(self.default_headers.clone());
        }
        Ok(builder)
    }

    fn authorized_request(
        &self,
        token: &AuthToken,
        prepared: &PreparedRequest,
        options: &RequestOptions,
    ) -> Result<reqwest::RequestBuilder> {
        let mut builder = self.request(prepared.method.clone(), &prepared.path, options.timeout)?;
        if !options.headers.is_empty() {
            builder = builder.headers(header_map(&options.headers)?);
        }
        builder = builder.bearer_auth(token.access_token());
        if let Some(body) = &prepared.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }

    /// Single attempt; the response is returned whatever its status.
    pub(crate) async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: RequestContext,
    ) -> Result<reqwest::Response> {
        let start = Instant::now();
        let pending = builder.send();
        #[cfg(feature = "tracing")]
        let pending = {
            use tracing::Instrument;
            pending.instrument(tracing::debug_span!(
                "belake.http",
                method = %ctx.method,
                path = %ctx.path
            ))
        };

        match pending.await {
            Ok(resp) => {
                let status = resp.status();
                if self.telemetry.http_enabled() {
                    self.telemetry.record_http(HttpRequestMetrics {
                        latency: start.elapsed(),
                        status: Some(status.as_u16()),
                        error: (!status.is_success())
                            .then(|| format!("http {}", status.as_u16())),
                        context: ctx,
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    status = %status,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "request completed"
                );
                Ok(resp)
            }
            Err(err) => {
                if self.telemetry.http_enabled() {
                    self.telemetry.record_http(HttpRequestMetrics {
                        latency: start.elapsed(),
                        status: None,
                        error: Some(err.to_string()),
                        context: ctx,
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                Err(TransportError::from(err).into())
            }
        }
    }

    async fn read_json(&self, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        decode_json_body(status, &headers, &body)
    }
}
