//! API key credentials for the Belake backend.
//!
//! Credentials are supplied by the caller (or the environment) and never
//! persisted by the client.

use std::fmt;

use reqwest::Url;

use crate::{
    API_KEY_ENV, BACKEND_URL_ENV,
    errors::{Error, Result},
};

/// Secret API key issued by the Belake.ai portal.
///
/// `Debug` output is redacted so keys do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        ApiKey::new(value)
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        ApiKey::new(value)
    }
}

/// Backend URL plus API key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub backend_url: String,
    pub api_key: ApiKey,
}

impl Credentials {
    pub fn new(backend_url: impl Into<String>, api_key: impl Into<ApiKey>) -> Self {
        Self {
            backend_url: backend_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Read `BELAKE_BACKEND_URL` and `BELAKE_API_KEY` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{name} is not set")))
        };
        Ok(Self::new(read(BACKEND_URL_ENV)?, read(API_KEY_ENV)?))
    }
}

/// Trim and validate a backend URL, returning it without a trailing slash.
pub(crate) fn normalize_backend_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("backend url is required".to_string()));
    }
    let url =
        Url::parse(trimmed).map_err(|err| Error::Config(format!("invalid backend url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "backend url must use http or https (got {})",
            url.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn require_api_key(key: Option<&ApiKey>) -> Result<ApiKey> {
    match key {
        Some(key) if !key.is_empty() => Ok(key.clone()),
        _ => Err(Error::Config("api key is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let creds = Credentials::new("https://belake.example", "bk_live_secret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("bk_live_secret"));
        assert!(rendered.contains("ApiKey(***)"));
    }

    #[test]
    fn backend_url_is_trimmed_and_validated() {
        assert_eq!(
            normalize_backend_url(" https://belake.example/api/ ").unwrap(),
            "https://belake.example/api"
        );
        assert!(matches!(normalize_backend_url(""), Err(Error::Config(_))));
        assert!(matches!(normalize_backend_url("   "), Err(Error::Config(_))));
        assert!(matches!(
            normalize_backend_url("not a url"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            normalize_backend_url("ftp://belake.example"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn api_key_must_be_present() {
        assert!(require_api_key(None).is_err());
        assert!(require_api_key(Some(&ApiKey::new("  "))).is_err());
        assert_eq!(
            require_api_key(Some(&ApiKey::new("k"))).unwrap().as_str(),
            "k"
        );
    }

    #[test]
    fn credentials_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (BACKEND_URL_ENV, "https://belake.example"),
            (API_KEY_ENV, "bk_env"),
        ]);
        let creds = Credentials::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.backend_url, "https://belake.example");
        assert_eq!(creds.api_key.as_str(), "bk_env");

        let err = Credentials::from_lookup(|name| {
            (name == BACKEND_URL_ENV).then(|| "https://belake.example".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }
}
