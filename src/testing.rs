//! Helpers for tests that point the client at a mock server.

use crate::{Client, Config, Credentials};

/// API key used by [`test_client`].
pub const TEST_API_KEY: &str = "bk_test_key";

pub fn test_credentials(backend_url: &str) -> Credentials {
    Credentials::new(backend_url, TEST_API_KEY)
}

/// Create a test client configured to use a wiremock server.
pub fn test_client(backend_url: &str) -> Client {
    Client::new(Config::from_credentials(test_credentials(backend_url))).expect("client")
}

/// Blocking counterpart of [`test_client`].
#[cfg(feature = "blocking")]
pub fn test_blocking_client(backend_url: &str) -> crate::BlockingClient {
    crate::BlockingClient::from_credentials(test_credentials(backend_url)).expect("client")
}
