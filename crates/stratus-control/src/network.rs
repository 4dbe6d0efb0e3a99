//! Private network lifecycles.
//!
//! A private network is a flat L2 segment; it has no resource-status
//! axis worth waiting on, so convergence only watches the contract
//! axis, at a slower cadence than the device pollers.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use stratus_api::ControlPlane;
use stratus_core::{ContractStatus, ResourceId, StatusTarget};

use crate::error::{ProvisionError, Result};
use crate::poller::{StatusPoller, DEFAULT_DEADLINE};
use crate::types::{decode, parse_id, require_str, PrivateNetworkSpec, PrivateNetworkState};

/// Poll cadence for network contracts.
const NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Orchestrates private network lifecycles.
pub struct PrivateNetworks {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl PrivateNetworks {
    /// Create an orchestrator scoped to `account`.
    pub fn new(client: Arc<dyn ControlPlane>, account: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
            poller: StatusPoller::new(NETWORK_POLL_INTERVAL, DEFAULT_DEADLINE),
        }
    }

    /// Override the convergence poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: StatusPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Provision a network segment from `spec`.
    ///
    /// # Errors
    ///
    /// A failure after allocation carries the allocated identifier; no
    /// rollback is attempted.
    pub async fn create(
        &self,
        spec: &PrivateNetworkSpec,
    ) -> std::result::Result<ResourceId, ProvisionError> {
        tracing::info!("allocating private network");
        let body = self
            .client
            .invoke(
                "PrivateNetworkVAdd",
                json!({ "gis_service_code": self.account }),
            )
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("PrivateNetworkVAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id =
            parse_id("PrivateNetworkVAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.finish(&id, spec).await {
            Ok(()) => {
                tracing::info!(%id, "private network provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    async fn finish(&self, id: &ResourceId, spec: &PrivateNetworkSpec) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::contract_only(ContractStatus::InService),
            )
            .await?;
        if let Some(label) = &spec.label {
            if !label.is_empty() {
                self.set_label(id, label).await?;
            }
        }
        Ok(())
    }

    /// Snapshot the network's observed state.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<PrivateNetworkState> {
        let body = self
            .client
            .invoke(
                "PrivateNetworkVGet",
                json!({
                    "gis_service_code": self.account,
                    "ivl_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: PrivateNetworkGetResponse = decode("PrivateNetworkVGet", &body)?;
        Ok(PrivateNetworkState {
            label: (!wire.label.is_empty()).then_some(wire.label),
            network_address: wire.network_address,
        })
    }

    /// Reconcile the network toward `desired`.
    ///
    /// Only the label can change after provisioning.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut PrivateNetworkState,
        desired: &PrivateNetworkSpec,
    ) -> Result<()> {
        if desired.label != observed.label {
            let label = desired.label.clone().unwrap_or_default();
            self.set_label(id, &label).await?;
            observed.label.clone_from(&desired.label);
        }
        Ok(())
    }

    /// Cancel the network contract.
    ///
    /// The caller is expected to have disconnected every server first;
    /// the control plane rejects the cancellation otherwise.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::info!(%id, "cancelling private network");
        self.client
            .invoke(
                "PrivateNetworkVCancel",
                json!({
                    "gis_service_code": self.account,
                    "ivl_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_label(&self, id: &ResourceId, label: &str) -> Result<()> {
        self.client
            .invoke(
                "PrivateNetworkVLabelSet",
                json!({
                    "gis_service_code": self.account,
                    "ivl_service_code": id.as_str(),
                    "name": label,
                }),
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PrivateNetworkGetResponse {
    #[serde(default)]
    label: String,
    #[serde(default)]
    network_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use stratus_core::{ContractStatus, ResourceStatus, StatusPair};

    const ACCOUNT: &str = "gis00000001";

    #[tokio::test(start_paused = true)]
    async fn create_waits_on_the_contract_axis_only() {
        let plane = Arc::new(MockControlPlane::new(StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::Configuring,
        )));
        plane.queue_response(
            "PrivateNetworkVAdd",
            json!({ "service_code": "ivl00000001" }),
        );

        let spec = PrivateNetworkSpec {
            label: Some("backend".into()),
        };
        let id = PrivateNetworks::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "ivl00000001");
        assert_eq!(
            plane.call_sequence(),
            ["PrivateNetworkVAdd", "PrivateNetworkVLabelSet"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn read_maps_the_segment_snapshot() {
        let plane = Arc::new(MockControlPlane::default());
        plane.queue_response(
            "PrivateNetworkVGet",
            json!({ "label": "backend", "network_address": "10.8.0.0/24" }),
        );
        let id: ResourceId = "ivl00000001".parse().unwrap();

        let state = PrivateNetworks::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .read(&id)
            .await
            .unwrap();

        assert_eq!(state.label.as_deref(), Some("backend"));
        assert_eq!(state.network_address, "10.8.0.0/24");
    }

    #[tokio::test(start_paused = true)]
    async fn update_relabels_only_on_drift() {
        let plane = Arc::new(MockControlPlane::default());
        let id: ResourceId = "ivl00000001".parse().unwrap();
        let mut observed = PrivateNetworkState {
            label: Some("backend".into()),
            network_address: "10.8.0.0/24".into(),
        };
        let networks = PrivateNetworks::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT);

        let same = PrivateNetworkSpec {
            label: Some("backend".into()),
        };
        networks.update(&id, &mut observed, &same).await.unwrap();
        assert!(plane.calls().is_empty());

        let renamed = PrivateNetworkSpec {
            label: Some("frontend".into()),
        };
        networks.update(&id, &mut observed, &renamed).await.unwrap();
        assert_eq!(plane.call_sequence(), ["PrivateNetworkVLabelSet"]);
        assert_eq!(observed.label.as_deref(), Some("frontend"));
    }
}
