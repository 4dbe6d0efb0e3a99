//! The control-plane client boundary.
//!
//! Two call shapes cover everything the orchestration layer needs:
//! [`ControlPlane::invoke`] for one-shot mutating or query calls, and
//! [`ControlPlane::get_status`] for the polled status query. Both are
//! single attempts; transport failures propagate immediately and any
//! retrying-until-converged loop belongs to the orchestration layer, not
//! here.

use async_trait::async_trait;
use serde_json::Value;
use stratus_core::{ResourceId, StatusPair};
use thiserror::Error;

use crate::config::ApiConfig;

/// A result type using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the control-plane client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call itself failed (connection, TLS, timeout).
    #[error("transport error calling {operation}: {source}")]
    Transport {
        /// The operation being invoked.
        operation: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The control plane rejected the call.
    #[error("{operation} rejected by control plane ({code}): {message}")]
    Api {
        /// The operation being invoked.
        operation: String,
        /// The vendor error code.
        code: String,
        /// The vendor error message.
        message: String,
    },

    /// The response body could not be interpreted.
    #[error("malformed response from {operation}: {message}")]
    Decode {
        /// The operation being invoked.
        operation: String,
        /// What was wrong with the body.
        message: String,
    },
}

/// The opaque boundary to the remote control plane.
///
/// Implementations are single-attempt: no internal retry, no backoff.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Issue a one-shot call and return the raw result bag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the call cannot be delivered
    /// and [`ApiError::Api`] when the control plane rejects it.
    async fn invoke(&self, operation: &str, params: Value) -> Result<Value>;

    /// Query the (contract, resource) status pair of one resource.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] when the response carries no parsable
    /// status pair, in addition to the [`ControlPlane::invoke`] errors.
    async fn get_status(&self, id: &ResourceId) -> Result<StatusPair>;
}

/// Shape of a vendor error body.
#[derive(Debug, serde::Deserialize)]
struct ErrorResponse {
    error_code: String,
    error_message: String,
}

/// HTTP implementation of [`ControlPlane`].
///
/// Each operation is a JSON POST to `{endpoint}/{operation}` authenticated
/// with the access-key pair.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpControlPlane {
    /// Create a client from the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be constructed.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Create a client reusing an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    /// The account service code every call is scoped to.
    #[must_use]
    pub fn account_code(&self) -> &str {
        &self.config.account_code
    }

    fn transport(operation: &str, source: reqwest::Error) -> ApiError {
        ApiError::Transport {
            operation: operation.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn invoke(&self, operation: &str, params: Value) -> Result<Value> {
        let url = format!("{}/{operation}", self.config.endpoint);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.access_key_id, Some(&self.config.secret_access_key))
            .json(&params)
            .send()
            .await
            .map_err(|e| Self::transport(operation, e))?;

        let http_status = response.status();
        if http_status.is_success() {
            let body: Value = response
                .json()
                .await
                .map_err(|e| Self::transport(operation, e))?;
            tracing::debug!(operation, "control plane call acknowledged");
            Ok(body)
        } else {
            let error = response
                .json::<ErrorResponse>()
                .await
                .map(|e| (e.error_code, e.error_message))
                .unwrap_or_else(|_| (http_status.as_str().to_string(), "no error body".to_string()));

            tracing::error!(
                operation,
                code = %error.0,
                message = %error.1,
                "control plane rejected call"
            );

            Err(ApiError::Api {
                operation: operation.to_string(),
                code: error.0,
                message: error.1,
            })
        }
    }

    async fn get_status(&self, id: &ResourceId) -> Result<StatusPair> {
        let operation = id.kind().status_operation();
        let params = serde_json::json!({
            "gis_service_code": self.config.account_code,
            id.kind().code_parameter(): id.as_str(),
        });

        let body = self.invoke(operation, params).await?;
        parse_status_pair(operation, &body)
    }
}

/// Extract the status pair from a result bag.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when either axis is missing or unknown.
pub fn parse_status_pair(operation: &str, body: &Value) -> Result<StatusPair> {
    let axis = |field: &str| -> Result<&str> {
        body.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Decode {
                operation: operation.to_string(),
                message: format!("missing {field}"),
            })
    };

    let contract = axis("contract_status")?
        .parse()
        .map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            message: format!("contract_status: {e}"),
        })?;
    let resource = axis("resource_status")?
        .parse()
        .map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            message: format!("resource_status: {e}"),
        })?;

    Ok(StatusPair { contract, resource })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stratus_core::{ContractStatus, ResourceStatus};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: &str) -> HttpControlPlane {
        HttpControlPlane::new(
            ApiConfig::new("test-key", "test-secret", "gis00000001").with_endpoint(endpoint),
        )
    }

    #[tokio::test]
    async fn invoke_posts_parameter_bag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/VMAdd"))
            .and(body_partial_json(json!({ "type": "VB0-F1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "service_code": "ivm00000001" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client
            .invoke("VMAdd", json!({ "type": "VB0-F1" }))
            .await
            .unwrap();

        assert_eq!(body["service_code"], "ivm00000001");
    }

    #[tokio::test]
    async fn invoke_surfaces_vendor_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/VMCancel"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "AccessDenied",
                "error_message": "not your contract",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.invoke("VMCancel", json!({})).await.unwrap_err();

        match err {
            ApiError::Api { code, message, .. } => {
                assert_eq!(code, "AccessDenied");
                assert_eq!(message, "not your contract");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invoke_reports_transport_failure() {
        // Nothing listens on this port.
        let client = test_client("http://127.0.0.1:9");
        let err = client.invoke("VMGet", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[tokio::test]
    async fn get_status_dispatches_by_kind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/FwLbGet"))
            .and(body_partial_json(json!({
                "gis_service_code": "gis00000001",
                "ifl_service_code": "ifl00000009",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "contract_status": "InService",
                "resource_status": "Configured",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id: ResourceId = "ifl00000009".parse().unwrap();
        let pair = client.get_status(&id).await.unwrap();

        assert_eq!(pair.contract, ContractStatus::InService);
        assert_eq!(pair.resource, ResourceStatus::Configured);
    }

    #[tokio::test]
    async fn get_status_rejects_unknown_words() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/VMGet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "contract_status": "InService",
                "resource_status": "Defragmenting",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id: ResourceId = "ivm00000001".parse().unwrap();
        let err = client.get_status(&id).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
