use std::{sync::Arc, time::Duration};

use reqwest::{
    Method,
    blocking::{Client as HttpClient, RequestBuilder, Response},
    header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use serde_json::Value;

use crate::{
    APPLICATION_JSON, CLIENT_HEADER, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, LOGIN_PATH,
    auth::{AuthToken, LoginRequest, parse_login_response},
    batch::{BatchCollector, BatchReport, CancellationFlag, FailurePolicy, Invocation},
    credentials::{ApiKey, Credentials, normalize_backend_url, require_api_key},
    errors::{Result, TransportError},
    fields::FieldValues,
    http::{HeaderList, RequestOptions, decode_json_body, endpoint_url, header_map},
    registry::OperationKey,
};

#[derive(Clone, Debug, Default)]
pub struct BlockingConfig {
    pub backend_url: Option<String>,
    pub api_key: Option<ApiKey>,
    pub client_header: Option<String>,
    pub http_client: Option<HttpClient>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
}

impl BlockingConfig {
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            backend_url: Some(credentials.backend_url),
            api_key: Some(credentials.api_key),
            ..Default::default()
        }
    }
}

/// Blocking client for the Belake API. Must not be created or dropped inside an
/// async runtime.
#[derive(Clone)]
pub struct BlockingClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    backend_url: String,
    api_key: ApiKey,
    client_header: Option<String>,
    http: HttpClient,
    request_timeout: Duration,
    default_headers: HeaderMap,
}

impl BlockingClient {
    pub fn new(cfg: BlockingConfig) -> Result<Self> {
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
            None => HttpClient::builder()
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
            }),
        })
    }

    pub fn from_credentials(credentials: Credentials) -> Result<Self> {
        Self::new(BlockingConfig::from_credentials(credentials))
    }

    pub fn backend_url(&self) -> &str {
        &self.inner.backend_url
    }

    pub fn auth(&self) -> BlockingAuthClient {
        BlockingAuthClient {
            inner: self.inner.clone(),
        }
    }

    pub fn operations(&self) -> BlockingOperationsClient {
        BlockingOperationsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn batch(&self, policy: FailurePolicy) -> BlockingBatchRunner {
        BlockingBatchRunner {
            auth: self.auth(),
            operations: self.operations(),
            policy,
            cancellation: None,
        }
    }
}

#[derive(Clone)]
pub struct BlockingAuthClient {
    inner: Arc<ClientInner>,
}

impl BlockingAuthClient {
    /// Exchange the configured API key for a bearer token. Single attempt.
    pub fn authenticate(&self) -> Result<AuthToken> {
        let req = LoginRequest {
            api_key: self.inner.api_key.as_str(),
        };
        let builder = self.inner.request(Method::POST, LOGIN_PATH, None)?.json(&req);
        let resp = self.inner.send(builder, &Method::POST, LOGIN_PATH)?;
        let status = resp.status();
        let body = resp.bytes()?;
        let result = parse_login_response(status, &body);
        #[cfg(feature = "tracing")]
        if let Err(err) = &result {
            tracing::warn!(error = %err, "login failed");
        }
        result
    }
}

#[derive(Clone)]
pub struct BlockingOperationsClient {
    inner: Arc<ClientInner>,
}

impl BlockingOperationsClient {
    pub fn dispatch(
        &self,
        token: &AuthToken,
        key: &OperationKey,
        fields: &FieldValues,
    ) -> Result<Value> {
        self.dispatch_with_options(token, key, fields, &RequestOptions::default())
    }

    pub fn dispatch_with_options(
        &self,
        token: &AuthToken,
        key: &OperationKey,
        fields: &FieldValues,
        options: &RequestOptions,
    ) -> Result<Value> {
        let prepared = key.template()?.prepare(fields)?;
        let mut builder =
            self.inner
                .request(prepared.method.clone(), &prepared.path, options.timeout)?;
        if !options.headers.is_empty() {
            builder = builder.headers(header_map(&options.headers)?);
        }
        builder = builder.bearer_auth(token.access_token());
        if let Some(body) = &prepared.body {
            builder = builder.json(body);
        }
        let resp = self.inner.send(builder, &prepared.method, &prepared.path)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes()?;
        decode_json_body(status, &headers, &body)
    }

    pub fn execute(&self, token: &AuthToken, invocation: &Invocation) -> Result<Value> {
        self.dispatch(token, &invocation.key, &invocation.fields)
    }
}

#[derive(Clone)]
pub struct BlockingBatchRunner {
    auth: BlockingAuthClient,
    operations: BlockingOperationsClient,
    policy: FailurePolicy,
    cancellation: Option<CancellationFlag>,
}

impl BlockingBatchRunner {
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn run(&self, invocations: &[Invocation]) -> Result<BatchReport> {
        let token = self.auth.authenticate()?;
        self.run_with_token(&token, invocations)
    }

    pub fn run_with_token(
        &self,
        token: &AuthToken,
        invocations: &[Invocation],
    ) -> Result<BatchReport> {
        let mut collector = BatchCollector::new(self.policy, invocations.len());
        for (index, invocation) in invocations.iter().enumerate() {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationFlag::is_cancelled)
            {
                #[cfg(feature = "tracing")]
                tracing::debug!(index, "batch cancelled");
                return Ok(collector.finish(true));
            }
            collector.record(index, self.operations.execute(token, invocation))?;
        }
        Ok(collector.finish(false))
    }
}

impl ClientInner {
    fn request(
        &self,
        method: Method,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<RequestBuilder> {
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

    fn send(&self, builder: RequestBuilder, method: &Method, path: &str) -> Result<Response> {
        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!("belake.http", method = %method, path = %path);
        #[cfg(feature = "tracing")]
        let _guard = span.enter();
        #[cfg(not(feature = "tracing"))]
        let _ = (method, path);

        match builder.send() {
            Ok(resp) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(status = %resp.status(), "request completed");
                Ok(resp)
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                Err(TransportError::from(err).into())
            }
        }
    }
}
