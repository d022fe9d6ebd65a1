//! API key login.
//!
//! The backend exchanges the API key for a short-lived bearer token via
//! `POST /login/api-key-auth`. A token lives for one batch: it is never cached
//! or refreshed by the client.

use std::{fmt, sync::Arc};

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::{
    LOGIN_PATH,
    client::{Client, ClientInner},
    credentials::Credentials,
    errors::{AuthenticationError, Result},
    telemetry::RequestContext,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub api_key: &'a str,
}

/// Bearer token obtained from the login call.
///
/// `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    access_token: String,
    refresh_token: Option<String>,
}

impl AuthToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Refresh token, when the backend returned one. The client never uses it.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"***")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Interpret a login response. Shared by the async and blocking clients.
pub(crate) fn parse_login_response(status: StatusCode, body: &[u8]) -> Result<AuthToken> {
    let text = String::from_utf8_lossy(body).into_owned();
    if !status.is_success() {
        return Err(AuthenticationError::rejected(status, text).into());
    }

    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        return Err(AuthenticationError::missing_token(text).into());
    };
    let token_field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    let Some(access_token) = token_field("access_token") else {
        return Err(AuthenticationError::missing_token(text).into());
    };
    let mut token = AuthToken::new(access_token);
    if let Some(refresh) = token_field("refresh_token") {
        token = token.with_refresh_token(refresh);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct AuthClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl AuthClient {
    /// Exchange the configured API key for a bearer token. Single attempt.
    pub async fn authenticate(&self) -> Result<AuthToken> {
        let req = LoginRequest {
            api_key: self.inner.api_key.as_str(),
        };
        let builder = self.inner.request(Method::POST, LOGIN_PATH, None)?.json(&req);
        let ctx = RequestContext::new(Method::POST.as_str(), LOGIN_PATH);
        let resp = self.inner.send(builder, ctx).await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        let result = parse_login_response(status, &body);
        #[cfg(feature = "tracing")]
        if let Err(err) = &result {
            tracing::warn!(error = %err, "login failed");
        }
        result
    }
}

/// Exchange `credentials` for a bearer token using a default client.
pub async fn authenticate(credentials: &Credentials) -> Result<AuthToken> {
    Client::from_credentials(credentials.clone())?
        .auth()
        .authenticate()
        .await
}
