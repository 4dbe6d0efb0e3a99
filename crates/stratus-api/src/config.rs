//! API client configuration.
//!
//! Credentials, the account scope and the endpoint are supplied by the
//! caller (flags, environment, or a host runtime) and threaded through to
//! the HTTP client, and the orchestration logic never interprets them.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Configuration for the control-plane API client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API access key id.
    pub access_key_id: String,

    /// API secret access key.
    pub secret_access_key: String,

    /// Account (contract) service code scoping every call.
    pub account_code: String,

    /// Base endpoint URL.
    #[serde(default = "ApiConfig::default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds. This bounds one HTTP round trip,
    /// not status convergence; convergence deadlines live in the poller.
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    /// Environment variable holding the access key id.
    pub const ENV_ACCESS_KEY: &'static str = "STRATUS_ACCESS_KEY";
    /// Environment variable holding the secret access key.
    pub const ENV_SECRET_KEY: &'static str = "STRATUS_SECRET_KEY";
    /// Environment variable holding the account service code.
    pub const ENV_ACCOUNT_CODE: &'static str = "STRATUS_ACCOUNT_CODE";
    /// Environment variable overriding the endpoint.
    pub const ENV_ENDPOINT: &'static str = "STRATUS_ENDPOINT";

    fn default_endpoint() -> String {
        "https://api.p2.example.jp".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Build a configuration with the default endpoint and timeouts.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        account_code: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            account_code: account_code.into(),
            endpoint: Self::default_endpoint(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }

    /// Load the configuration from environment variables.
    ///
    /// Returns `None` when any of the three required variables is unset.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let mut config = Self::new(
            env::var(Self::ENV_ACCESS_KEY).ok()?,
            env::var(Self::ENV_SECRET_KEY).ok()?,
            env::var(Self::ENV_ACCOUNT_CODE).ok()?,
        );
        if let Ok(endpoint) = env::var(Self::ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        Some(config)
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The per-request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ApiConfig::new("key", "secret", "gis00000001");
        assert_eq!(config.endpoint, "https://api.p2.example.jp");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn endpoint_override() {
        let config =
            ApiConfig::new("key", "secret", "gis00000001").with_endpoint("http://localhost:9999");
        assert_eq!(config.endpoint, "http://localhost:9999");
    }
}
